// src/fetch/http.rs

use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use encoding_rs::{Encoding, UTF_8};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER};
use tracing::{debug, info, warn};
use url::Url;

use super::{Body, Method, Request, Response, Transport};
use crate::config::Settings;

/// Blocking HTTP with a cookie jar, one request at a time.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .cookie_store(true)
            .gzip(true)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

/// `Referer` is the url without its query, `Origin` its scheme and host.
fn page_headers(url: &Url) -> (String, String) {
    let mut referer = url.clone();
    referer.set_query(None);
    referer.set_fragment(None);
    (referer.to_string(), url.origin().ascii_serialization())
}

fn charset_of(content_type: &str) -> Option<&str> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        key.eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode with the forced label, else the declared charset, else UTF-8.
/// A byte order mark wins over all of them.
pub fn decode_body(bytes: &[u8], forced: Option<&str>, declared: Option<&str>) -> Result<String> {
    let encoding = match forced {
        Some(label) => Encoding::for_label(label.as_bytes())
            .ok_or_else(|| anyhow!("unknown text encoding `{}`", label))?,
        None => declared
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8),
    };
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!(encoding = used.name(), "body contained undecodable bytes");
    }
    Ok(text.into_owned())
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let url = Url::parse(&request.url).with_context(|| format!("parsing url {}", request.url))?;
        let (referer, origin) = page_headers(&url);

        let mut builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        }
        .header(ACCEPT, "application/json, text/plain, */*")
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .header(REFERER, referer)
        .header(ORIGIN, origin);
        builder = match &request.body {
            Body::Empty => builder,
            Body::Form(fields) => builder.form(fields),
            Body::Json(value) => builder.json(value),
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let started = Instant::now();
        let response = builder
            .send()
            .with_context(|| format!("sending {}", request))?;
        let status = response.status();
        let final_url = response.url().to_string();
        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_of)
            .map(str::to_string);
        let bytes = response
            .bytes()
            .with_context(|| format!("reading body of {}", request))?;
        let body = decode_body(&bytes, request.encoding, declared.as_deref())?;

        if !status.is_success() {
            bail!(
                "{} answered {}: {}",
                request,
                status,
                body.chars().take(300).collect::<String>()
            );
        }
        info!(
            %request,
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched"
        );
        debug!(%final_url, "final url");

        Ok(Response {
            status: status.as_u16(),
            url: final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::BIG5;

    #[test]
    fn referer_and_origin() -> Result<()> {
        let url = Url::parse("https://www.twse.com.tw/exchangeReport/BWIBBU_d?response=json&date=20250124")?;
        let (referer, origin) = page_headers(&url);
        assert_eq!(referer, "https://www.twse.com.tw/exchangeReport/BWIBBU_d");
        assert_eq!(origin, "https://www.twse.com.tw");
        Ok(())
    }

    #[test]
    fn forced_big5_and_declared_charset() -> Result<()> {
        let (bytes, _, _) = BIG5.encode("台積電");
        assert_eq!(decode_body(&bytes, Some("big5"), None)?, "台積電");
        assert_eq!(
            charset_of("text/html; charset=\"Big5\""),
            Some("Big5")
        );
        assert_eq!(decode_body(&bytes, None, Some("Big5"))?, "台積電");
        assert!(decode_body(b"x", Some("klingon"), None).is_err());
        Ok(())
    }

    #[test]
    fn byte_order_mark_is_dropped() -> Result<()> {
        assert_eq!(decode_body(b"\xef\xbb\xbfa,b", None, None)?, "a,b");
        Ok(())
    }
}
