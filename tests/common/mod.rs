// SPDX-License-Identifier: Apache-2.0
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use actix_web::http::StatusCode;
use admingate::transport::{Transport, TransportError, UpstreamRequest, UpstreamResponse};
use serde_json::Value;

#[derive(Default)]
struct Recorded {
    calls: Vec<UpstreamRequest>,
    replies: VecDeque<Result<UpstreamResponse, TransportError>>,
}

/// Transport that records every request and answers from a queue.
///
/// With an empty queue it answers `200 {"success":true,"data":[]}`.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Rc<RefCell<Recorded>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, response: UpstreamResponse) -> &Self {
        self.inner.borrow_mut().replies.push_back(Ok(response));
        self
    }

    pub fn reply_json(&self, status: StatusCode, body: Value) -> &Self {
        self.reply(UpstreamResponse::new(status, body.to_string()))
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.inner
            .borrow_mut()
            .replies
            .push_back(Err(TransportError::Send(message.to_string())));
        self
    }

    pub fn call_count(&self) -> usize {
        self.inner.borrow().calls.len()
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.inner.borrow().calls.clone()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(request);
        inner.replies.pop_front().unwrap_or_else(|| {
            Ok(UpstreamResponse::new(
                StatusCode::OK,
                r#"{"success":true,"data":[]}"#,
            ))
        })
    }
}
