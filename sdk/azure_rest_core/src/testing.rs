//! Test doubles for code built on the pipeline.

use crate::error::ServiceResult;
use crate::pipeline::{Context, Next, Policy, Request, Response};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::sync::Mutex;
use std::time::Duration;

/// Terminal policy that records each request and answers with a canned response.
#[derive(Debug)]
pub struct RecordingTransport {
    status: StatusCode,
    body: Bytes,
    delay: Option<Duration>,
    requests: Mutex<Vec<Request>>,
}

impl RecordingTransport {
    /// Answer every request with `200 OK` and `body`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn with_status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Wait `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Request> {
        self.requests().pop()
    }

    pub fn count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait::async_trait]
impl Policy for RecordingTransport {
    async fn send(
        &self,
        _ctx: &Context,
        request: &mut Request,
        _next: Next<'_>,
    ) -> ServiceResult<Response> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Response::new(self.status, HeaderMap::new(), self.body.clone()))
    }
}
