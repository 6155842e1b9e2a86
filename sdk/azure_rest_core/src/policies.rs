//! Built-in pipeline stages: correlation ids and the reqwest transport.

use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::{Context, Next, Policy, Request, Response};
use reqwest::header::{HeaderName, HeaderValue};

/// Header carrying the per-call correlation id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Attaches a fresh `x-ms-client-request-id` to every call.
///
/// A value set explicitly by the caller is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientRequestIdPolicy;

#[async_trait::async_trait]
impl Policy for ClientRequestIdPolicy {
    async fn send(
        &self,
        ctx: &Context,
        request: &mut Request,
        next: Next<'_>,
    ) -> ServiceResult<Response> {
        if !request.headers().contains_key(CLIENT_REQUEST_ID_HEADER) {
            let id = uuid::Uuid::new_v4().to_string();
            let value = HeaderValue::from_str(&id)
                .map_err(|e| ServiceError::InvalidArgument(format!("client request id: {e}")))?;
            request.insert_header(HeaderName::from_static(CLIENT_REQUEST_ID_HEADER), value);
        }
        next.run(ctx, request).await
    }
}

/// Terminal stage that performs the HTTP exchange with reqwest and buffers
/// the response body.
#[derive(Debug, Clone)]
pub struct TransportPolicy {
    http: reqwest::Client,
}

impl TransportPolicy {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl Policy for TransportPolicy {
    async fn send(
        &self,
        _ctx: &Context,
        request: &mut Request,
        _next: Next<'_>,
    ) -> ServiceResult<Response> {
        let mut builder = self
            .http
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        tracing::debug!(method = %request.method(), url = %request.url(), "sending HTTP request");
        let response = builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        tracing::debug!(status = status.as_u16(), bytes = body.len(), "HTTP response received");
        Ok(Response::new(status, headers, body))
    }
}
