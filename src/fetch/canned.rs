// src/fetch/canned.rs
//
// In-memory transport for flow tests: serves queued bodies in order and
// remembers every request it was sent.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{bail, Result};

use super::{Request, Response, Transport};

#[derive(Default)]
pub struct CannedTransport {
    replies: RefCell<VecDeque<(String, String)>>,
    sent: RefCell<Vec<Request>>,
}

impl CannedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `body` as the answer to the next request, which must target a
    /// url starting with `url_prefix`.
    pub fn reply(self, url_prefix: &str, body: impl Into<String>) -> Self {
        self.replies
            .borrow_mut()
            .push_back((url_prefix.to_string(), body.into()));
        self
    }

    pub fn sent(&self) -> Vec<Request> {
        self.sent.borrow().clone()
    }
}

impl Transport for CannedTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        self.sent.borrow_mut().push(request.clone());
        let Some((prefix, body)) = self.replies.borrow_mut().pop_front() else {
            bail!("no canned reply left for {}", request);
        };
        if !request.url.starts_with(&prefix) {
            bail!("expected a request to {}, got {}", prefix, request);
        }
        Ok(Response {
            status: 200,
            url: request.url.clone(),
            body,
        })
    }
}
