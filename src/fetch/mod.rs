// src/fetch/mod.rs
//
// Request flows per data source. Each flow builds the requests a dataset
// needs, hands them to a `Transport`, and feeds the bodies to the matching
// parser in `datasets`.

pub mod http;
pub mod market;
pub mod mops;

#[cfg(test)]
pub mod canned;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

pub use http::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// `application/x-www-form-urlencoded`, fields in order.
    Form(Vec<(String, String)>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub body: Body,
    /// Label of the text encoding to decode the body with, when the source
    /// does not declare the one it uses.
    pub encoding: Option<&'static str>,
    /// Overrides the transport's default timeout.
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: Body::Empty,
            encoding: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn post_form<K, V>(url: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::Post,
            body: Body::Form(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            ..Self::get(url)
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Body::Json(body),
            ..Self::get(url)
        }
    }

    pub fn encoding(mut self, label: &'static str) -> Self {
        self.encoding = Some(label);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Form field value, for assertions on built requests.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            Body::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self.method {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        write!(f, "{} {}", method, self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Final url after redirects.
    pub url: String,
    pub body: String,
}

/// One HTTP exchange. Implementations return decoded text and treat any
/// non-2xx status as an error.
pub trait Transport {
    fn send(&self, request: &Request) -> Result<Response>;
}
