//! Base HTTP client shared by the service crates.
//!
//! [`ServiceClient`] owns the request pipeline for one service endpoint: it
//! builds requests relative to the endpoint, sends them through the policies,
//! and maps error responses to [`ServiceError`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use azure_rest_core::auth::{ApiKeyCredential, APIM_SUBSCRIPTION_KEY_HEADER};
//! use azure_rest_core::client::ServiceClient;
//! use azure_rest_core::pipeline::Context;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ServiceClient::builder()
//!     .credential(ApiKeyCredential::new(
//!         "https://your-resource.cognitiveservices.azure.com",
//!         "your-key",
//!     )?)
//!     .auth_header(APIM_SUBSCRIPTION_KEY_HEADER)
//!     .base_path("formrecognizer/v2.0")
//!     .build()?;
//!
//! let request = client.request(reqwest::Method::GET, "custom/models?op=summary")?;
//! let response = client.send(&Context::new(), request).await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

use crate::auth::{ApiKeyAuthenticationPolicy, ApiKeyCredential, APIM_SUBSCRIPTION_KEY_HEADER};
use crate::codec::JsonModel;
use crate::error::{ServiceError, ServiceResult};
use crate::paging::{Continuable, Pager};
use crate::pipeline::{Context, Pipeline, Policy, Request, Response};
use crate::policies::{ClientRequestIdPolicy, TransportPolicy};
use reqwest::Client as HttpClient;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for one service endpoint.
///
/// The client is cheaply cloneable and can be shared across threads.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    pipeline: Pipeline,
    origin: Url,
    key: SecretString,
}

/// Builder for constructing a [`ServiceClient`].
///
/// Use [`ServiceClient::builder()`] to create a new builder.
#[derive(Debug, Default)]
pub struct ServiceClientBuilder {
    credential: Option<ApiKeyCredential>,
    auth_header: Option<String>,
    base_path: Option<String>,
    http_client: Option<HttpClient>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    policies: Vec<Arc<dyn Policy>>,
    transport: Option<Arc<dyn Policy>>,
}

impl ServiceClient {
    /// Create a new builder for configuring a `ServiceClient`.
    pub fn builder() -> ServiceClientBuilder {
        ServiceClientBuilder::default()
    }

    /// The pipeline every request goes through.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Build a request for a path (optionally with a query) relative to the
    /// service root. `"foo"` and `"/foo"` address the same resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined to the endpoint URL.
    pub fn request(&self, method: Method, path: &str) -> ServiceResult<Request> {
        let url = self
            .origin
            .join(path.trim_start_matches('/'))
            .map_err(|e| ServiceError::InvalidArgument(format!("invalid request path '{path}': {e}")))?;
        Ok(Request::new(method, url))
    }

    /// Build a request carrying `body` as JSON.
    pub fn json_request<T: JsonModel>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> ServiceResult<Request> {
        let mut request = self.request(method, path)?;
        request.set_json(body)?;
        Ok(request)
    }

    /// Build the GET request for a page continuation.
    ///
    /// `previous` is the URL the preceding page was fetched from. Relative
    /// links are resolved against it the way a browser resolves an `href`;
    /// absolute links are used as they are. The result is pinned, so it is
    /// sent to exactly that URL.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if the link cannot be
    /// resolved to a URL.
    pub fn continuation_request(&self, previous: &Url, next_link: &str) -> ServiceResult<Request> {
        let url = previous.join(next_link).map_err(|e| {
            ServiceError::InvalidArgument(format!("invalid continuation link '{next_link}': {e}"))
        })?;
        Ok(Request::pinned(Method::GET, url))
    }

    /// Send a request and fail on non-success status codes.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Api`] when the body is a JSON error envelope,
    /// [`ServiceError::Http`] for any other non-success response, and
    /// whatever the pipeline produces (cancellation, transport failures).
    pub async fn send(&self, ctx: &Context, request: Request) -> ServiceResult<Response> {
        let response = self.pipeline.send(ctx, request).await?;
        self.check_response(response)
    }

    /// Blocking counterpart of [`send`](Self::send).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Runtime`] when called from inside an async
    /// runtime or if the blocking runtime cannot be created, plus everything
    /// [`send`](Self::send) can return.
    pub fn send_blocking(&self, ctx: &Context, request: Request) -> ServiceResult<Response> {
        self.block_on(self.send(ctx, request))
    }

    /// Run an async operation of this client from synchronous code.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Runtime`] when called from inside an async
    /// runtime or if the blocking runtime cannot be created. Otherwise the
    /// future's own result is returned.
    pub fn block_on<T, F>(&self, future: F) -> ServiceResult<T>
    where
        F: Future<Output = ServiceResult<T>>,
    {
        self.pipeline.block_on(future)
    }

    /// Create a pager whose first page is fetched with `first`.
    pub fn pager<P>(&self, ctx: &Context, first: Request) -> Pager<P>
    where
        P: Continuable + Send + 'static,
        P::Item: Send + 'static,
    {
        Pager::new(self.clone(), first, ctx.clone())
    }

    /// Maximum length for error messages kept from response bodies.
    const MAX_ERROR_MESSAGE_LEN: usize = 1000;

    /// Replace every occurrence of the configured key with a marker.
    pub(crate) fn redact(&self, msg: &str) -> String {
        let key = self.key.expose_secret();
        if key.is_empty() {
            return msg.to_string();
        }
        msg.replace(key, "[REDACTED]")
    }

    /// Redact, then truncate to [`Self::MAX_ERROR_MESSAGE_LEN`] bytes.
    pub(crate) fn truncate_message(&self, msg: &str) -> String {
        let redacted = self.redact(msg);

        if redacted.len() > Self::MAX_ERROR_MESSAGE_LEN {
            let mut end = Self::MAX_ERROR_MESSAGE_LEN;
            while !redacted.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated)", &redacted[..end])
        } else {
            redacted
        }
    }

    fn check_response(&self, response: Response) -> ServiceResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = String::from_utf8_lossy(response.body());
        tracing::debug!(status, "service returned an error response");

        if let Ok(error) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err_obj) = error.get("error") {
                return Err(ServiceError::Api {
                    status,
                    code: err_obj
                        .get("code")
                        .and_then(|c| c.as_str())
                        .unwrap_or("unknown")
                        .to_string(),
                    message: self.truncate_message(
                        err_obj
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or(&body),
                    ),
                });
            }
        }

        let message = if body.is_empty() {
            response
                .status()
                .canonical_reason()
                .unwrap_or_default()
                .to_string()
        } else {
            self.truncate_message(&body)
        };
        Err(ServiceError::Http { status, message })
    }
}

impl ServiceClientBuilder {
    /// Set the endpoint and key.
    pub fn credential(mut self, credential: ApiKeyCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the header the key is sent in.
    ///
    /// Defaults to [`APIM_SUBSCRIPTION_KEY_HEADER`].
    pub fn auth_header(mut self, name: impl Into<String>) -> Self {
        self.auth_header = Some(name.into());
        self
    }

    /// Set the versioned base path prefixed to every request path.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Set a custom HTTP client.
    ///
    /// **Note:** If you provide a custom HTTP client, any timeout configuration
    /// via [`connect_timeout`](Self::connect_timeout) or
    /// [`read_timeout`](Self::read_timeout) is ignored.
    pub fn http_client(mut self, client: HttpClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout, covering the whole request/response cycle.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Add a policy. Added policies run after the client-request-id policy
    /// and before authentication, in the order they were added.
    pub fn policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Replace the reqwest transport with another terminal policy.
    pub fn transport(mut self, transport: Arc<dyn Policy>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the `ServiceClient`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No credential is provided
    /// - The authentication policy rejects the header name or key
    /// - The HTTP client cannot be created
    pub fn build(self) -> ServiceResult<ServiceClient> {
        let credential = self.credential.ok_or_else(|| {
            ServiceError::MissingConfig("credential is required".into())
        })?;

        let auth = ApiKeyAuthenticationPolicy::new(
            &credential,
            self.auth_header
                .as_deref()
                .unwrap_or(APIM_SUBSCRIPTION_KEY_HEADER),
            self.base_path.as_deref().unwrap_or_default(),
        )?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let http = match self.http_client {
                    Some(http) => http,
                    None => HttpClient::builder()
                        .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
                        .timeout(self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT))
                        .build()?,
                };
                Arc::new(TransportPolicy::new(http)) as Arc<dyn Policy>
            }
        };

        let mut policies: Vec<Arc<dyn Policy>> = Vec::with_capacity(self.policies.len() + 3);
        policies.push(Arc::new(ClientRequestIdPolicy));
        policies.extend(self.policies);
        policies.push(Arc::new(auth));
        policies.push(transport);

        let mut origin = credential.endpoint().clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        Ok(ServiceClient {
            pipeline: Pipeline::new(policies),
            origin,
            key: credential.key().clone(),
        })
    }
}
