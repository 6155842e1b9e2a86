//! API-key credentials and the authentication policy that applies them.
//!
//! [`ApiKeyAuthenticationPolicy`] re-bases every outgoing request onto the
//! credential's endpoint, prefixes its path with the service's versioned base
//! path, and injects the key under a fixed header.

use crate::error::{ServiceError, ServiceResult};
use crate::pipeline::{Context, Next, Policy, Request, Response};
use reqwest::header::{HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Header used by APIM-fronted Cognitive Services (Form Recognizer and friends).
pub const APIM_SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Header used by Cognitive Search.
pub const API_KEY_HEADER: &str = "api-key";

/// An endpoint plus the key that authorizes requests against it.
#[derive(Clone)]
pub struct ApiKeyCredential {
    endpoint: Url,
    key: SecretString,
}

impl ApiKeyCredential {
    /// Create a credential.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidEndpoint`] if `endpoint` is not an
    /// absolute `http`/`https` URL with a host, and
    /// [`ServiceError::InvalidArgument`] if `key` is empty.
    pub fn new(endpoint: impl AsRef<str>, key: impl Into<String>) -> ServiceResult<Self> {
        let endpoint = parse_endpoint(endpoint.as_ref())?;

        let key = key.into();
        if key.trim().is_empty() {
            return Err(ServiceError::InvalidArgument(
                "api key must not be empty".into(),
            ));
        }

        Ok(Self {
            endpoint,
            key: SecretString::from(key),
        })
    }

    /// The service endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The key, for callers that must place it somewhere themselves.
    pub fn key(&self) -> &SecretString {
        &self.key
    }
}

impl std::fmt::Debug for ApiKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyCredential")
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &"****")
            .finish()
    }
}

fn parse_endpoint(raw: &str) -> ServiceResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ServiceError::InvalidEndpoint(format!("{raw}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ServiceError::InvalidEndpoint(format!(
            "{raw}: scheme must be http or https"
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ServiceError::InvalidEndpoint(format!("{raw}: missing host")));
    }

    Ok(url)
}

/// Join path segments with exactly one `/` between them.
///
/// Leading and trailing slashes on each segment are ignored and empty
/// segments are skipped, so `join_path(&["/a/", "b", "/c"])` is `/a/b/c`.
pub fn join_path(segments: &[&str]) -> String {
    let mut path = String::new();
    for segment in segments {
        let trimmed = segment.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        path.push('/');
        path.push_str(trimmed);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Pipeline stage that points a request at the credential's endpoint and
/// authenticates it with the key.
#[derive(Debug, Clone)]
pub struct ApiKeyAuthenticationPolicy {
    endpoint: Url,
    base_path: String,
    header_name: HeaderName,
    header_value: HeaderValue,
}

impl ApiKeyAuthenticationPolicy {
    /// Build the policy for a credential, header name, and versioned base path.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if the header name is not a
    /// valid HTTP header name or the key cannot be carried in a header.
    pub fn new(
        credential: &ApiKeyCredential,
        header_name: &str,
        base_path: &str,
    ) -> ServiceResult<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes()).map_err(|e| {
            ServiceError::InvalidArgument(format!("invalid header name '{header_name}': {e}"))
        })?;

        let mut header_value = HeaderValue::from_str(credential.key().expose_secret())
            .map_err(|_| {
                ServiceError::InvalidArgument("api key contains invalid header characters".into())
            })?;
        header_value.set_sensitive(true);

        Ok(Self {
            endpoint: credential.endpoint().clone(),
            base_path: base_path.trim_matches('/').to_string(),
            header_name,
            header_value,
        })
    }

    /// The versioned base path every request is placed under.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Re-base `url` onto the endpoint, keeping its query.
    pub fn rewrite(&self, url: &Url) -> Url {
        let mut rewritten = self.endpoint.clone();
        rewritten.set_path(&join_path(&[
            self.endpoint.path(),
            &self.base_path,
            url.path(),
        ]));
        rewritten.set_query(url.query());
        rewritten.set_fragment(None);
        rewritten
    }
}

#[async_trait::async_trait]
impl Policy for ApiKeyAuthenticationPolicy {
    async fn send(
        &self,
        ctx: &Context,
        request: &mut Request,
        next: Next<'_>,
    ) -> ServiceResult<Response> {
        if !request.is_pinned() {
            let rewritten = self.rewrite(request.url());
            request.set_url(rewritten);
        } else if request.url().origin() != self.endpoint.origin() {
            // The key only ever goes to the endpoint it was issued for.
            tracing::debug!(
                host = request.url().host_str().unwrap_or_default(),
                "refusing to send credential to a foreign host",
            );
            return Err(ServiceError::InvalidArgument(format!(
                "continuation link '{}' is outside the service endpoint '{}'",
                request.url().origin().ascii_serialization(),
                self.endpoint.origin().ascii_serialization(),
            )));
        }
        request.insert_header(self.header_name.clone(), self.header_value.clone());

        tracing::trace!(url = %request.url(), "request authenticated");
        next.run(ctx, request).await
    }
}
