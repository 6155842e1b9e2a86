//! Client for the documents of one search index.
//!
//! Requests go to `/indexes/{index}/docs...` on the search service endpoint,
//! authenticate with the `api-key` header and carry the API version as the
//! `api-version` query parameter.
//!
//! # Example
//!
//! ```rust,no_run
//! use azure_search_documents::client::SearchClient;
//! use azure_search_documents::models::{SearchDocument, SearchOptions};
//! use azure_rest_core::pipeline::Context;
//! use futures::TryStreamExt;
//!
//! # async fn example() -> azure_rest_core::ServiceResult<()> {
//! let client = SearchClient::builder()
//!     .endpoint("https://your-service.search.windows.net")
//!     .api_key("your-admin-key")
//!     .index_name("hotels")
//!     .build()?;
//!
//! let pager = client.search::<SearchDocument>(&Context::new(), &SearchOptions::new("pool"))?;
//! let mut hits = pager.items();
//! while let Some(hit) = hits.try_next().await? {
//!     println!("{:.2} {:?}", hit.score, hit.document.get("hotelName"));
//! }
//! # Ok(())
//! # }
//! ```

use crate::models::{
    ensure_object_documents, Fetched, IndexBatch, IndexDocumentsResult, SearchDocumentsResult,
    SearchOptions,
};
use crate::policy::ApiVersionPolicy;
use crate::version::SearchServiceVersion;
use azure_rest_core::auth::{ApiKeyCredential, API_KEY_HEADER};
use azure_rest_core::client::ServiceClient;
use azure_rest_core::error::{ServiceError, ServiceResult};
use azure_rest_core::paging::Pager;
use azure_rest_core::pipeline::{Context, Policy, Request};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Async client bound to a single index.
#[derive(Debug, Clone)]
pub struct SearchClient {
    service: ServiceClient,
    index_name: String,
    version: SearchServiceVersion,
}

/// Builder for [`SearchClient`].
#[derive(Debug, Default)]
pub struct SearchClientBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    index_name: Option<String>,
    version: Option<String>,
    http_client: Option<reqwest::Client>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    transport: Option<Arc<dyn Policy>>,
}

impl SearchClient {
    pub fn builder() -> SearchClientBuilder {
        SearchClientBuilder::default()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn version(&self) -> SearchServiceVersion {
        self.version
    }

    pub fn service_client(&self) -> &ServiceClient {
        &self.service
    }

    /// Request addressed to `/indexes/{index}/docs/{segments..}`.
    ///
    /// Segments are percent-encoded, so document keys may contain any
    /// character.
    fn docs_request(&self, method: Method, segments: &[&str]) -> ServiceResult<Request> {
        let mut request = self.service.request(method, "indexes")?;
        let mut url = request.url().clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::InvalidEndpoint("endpoint cannot be a base URL".into()))?
            .push(&self.index_name)
            .push("docs")
            .extend(segments);
        request.set_url(url);
        Ok(request)
    }

    fn search_request(&self, options: &SearchOptions) -> ServiceResult<Request> {
        let mut request = self.docs_request(Method::GET, &[])?;
        for (key, value) in options.query_pairs() {
            request.append_query(key, &value);
        }
        Ok(request)
    }

    /// Run a query and page through its hits.
    ///
    /// Later pages follow `@odata.nextLink`. No request is made until the
    /// returned pager is polled.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::search::search` with field `index`.
    #[tracing::instrument(
        name = "azure::search::search",
        skip(self, ctx, options),
        fields(index = %self.index_name)
    )]
    pub fn search<T>(
        &self,
        ctx: &Context,
        options: &SearchOptions,
    ) -> ServiceResult<Pager<SearchDocumentsResult<T>>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let first = self.search_request(options)?;
        Ok(self.service.pager(ctx, first))
    }

    /// Run a query and return only its first page, with `@odata.count` and
    /// `@search.coverage` as reported by the service.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::search::search_page` with field `index`.
    #[tracing::instrument(
        name = "azure::search::search_page",
        skip(self, ctx, options),
        fields(index = %self.index_name)
    )]
    pub async fn search_page<T>(
        &self,
        ctx: &Context,
        options: &SearchOptions,
    ) -> ServiceResult<SearchDocumentsResult<T>>
    where
        T: DeserializeOwned,
    {
        let request = self.search_request(options)?;
        let page = self
            .service
            .send(ctx, request)
            .await?
            .read::<SearchDocumentsResult<T>>()?;

        tracing::debug!(hits = page.value.len(), count = ?page.count, "search page fetched");
        Ok(page)
    }

    /// Fetch one document by key.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::search::get_document` with fields `index`
    /// and `key`.
    #[tracing::instrument(
        name = "azure::search::get_document",
        skip(self, ctx),
        fields(index = %self.index_name, key = %key)
    )]
    pub async fn get_document<T>(&self, ctx: &Context, key: &str) -> ServiceResult<T>
    where
        T: DeserializeOwned,
    {
        if key.is_empty() {
            return Err(ServiceError::InvalidArgument("document key cannot be empty".into()));
        }
        if matches!(key, "." | "..") {
            return Err(ServiceError::InvalidArgument(format!(
                "document key '{key}' is not a valid path segment"
            )));
        }
        tracing::debug!("fetching document");

        let request = self.docs_request(Method::GET, &[key])?;
        let Fetched(document) = self.service.send(ctx, request).await?.read::<Fetched<T>>()?;
        Ok(document)
    }

    /// Number of documents in the index.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::search::document_count` with field `index`.
    #[tracing::instrument(
        name = "azure::search::document_count",
        skip(self, ctx),
        fields(index = %self.index_name)
    )]
    pub async fn document_count(&self, ctx: &Context) -> ServiceResult<u64> {
        let request = self.docs_request(Method::GET, &["$count"])?;
        let response = self.service.send(ctx, request).await?;

        // Plain-text body, possibly with a byte order mark.
        let text = String::from_utf8_lossy(response.body());
        let count = serde_json::from_str::<u64>(text.trim_start_matches('\u{feff}').trim())?;

        tracing::debug!(count, "document count fetched");
        Ok(count)
    }

    /// Upload, merge or delete documents in one batch.
    ///
    /// A `207 Multi-Status` answer is not an error: inspect
    /// [`IndexDocumentsResult::failed`] for the actions that did not apply.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] for an empty batch or a
    /// document that does not serialize to a JSON object.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::search::index_documents` with fields
    /// `index` and `actions`.
    #[tracing::instrument(
        name = "azure::search::index_documents",
        skip(self, ctx, batch),
        fields(index = %self.index_name, actions = batch.len())
    )]
    pub async fn index_documents<T>(
        &self,
        ctx: &Context,
        batch: &IndexBatch<T>,
    ) -> ServiceResult<IndexDocumentsResult>
    where
        T: Serialize + Sync,
    {
        if batch.is_empty() {
            return Err(ServiceError::InvalidArgument("index batch cannot be empty".into()));
        }
        ensure_object_documents(batch)?;
        tracing::debug!("submitting index batch");

        let mut request = self.docs_request(Method::POST, &["index"])?;
        request.set_json(batch)?;
        let result = self
            .service
            .send(ctx, request)
            .await?
            .read::<IndexDocumentsResult>()?;

        tracing::debug!(failed = result.failed().count(), "index batch processed");
        Ok(result)
    }
}

impl SearchClientBuilder {
    /// Set the service endpoint, e.g. `https://<name>.search.windows.net`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the admin or query key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the index every operation targets (required).
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    /// Set the API version, e.g. `"2020-06-30"`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set a custom HTTP client. Timeouts set on this builder are then ignored.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Replace the HTTP transport with another terminal policy.
    pub fn transport(mut self, transport: Arc<dyn Policy>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint, key or index name is missing or
    /// invalid, or if the version string is not a supported version.
    pub fn build(self) -> ServiceResult<SearchClient> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| ServiceError::MissingConfig("endpoint is required".into()))?;
        let api_key = self
            .api_key
            .ok_or_else(|| ServiceError::MissingConfig("api_key is required".into()))?;
        let index_name = self
            .index_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ServiceError::MissingConfig("index_name is required".into()))?;
        let version = match self.version {
            Some(v) => v.parse::<SearchServiceVersion>()?,
            None => SearchServiceVersion::default(),
        };

        let mut builder = ServiceClient::builder()
            .credential(ApiKeyCredential::new(endpoint, api_key)?)
            .auth_header(API_KEY_HEADER)
            .policy(Arc::new(ApiVersionPolicy::new(version)));

        if let Some(http) = self.http_client {
            builder = builder.http_client(http);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = self.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(transport) = self.transport {
            builder = builder.transport(transport);
        }

        Ok(SearchClient {
            service: builder.build()?,
            index_name,
            version,
        })
    }
}
