//! Client for the Form Recognizer custom model API.
//!
//! Every request is placed under `/formrecognizer/{version}` on the
//! configured endpoint and authenticated with the `Ocp-Apim-Subscription-Key`
//! header.
//!
//! # Example
//!
//! ```rust,no_run
//! use azure_form_recognizer::client::FormRecognizerClient;
//! use azure_form_recognizer::models::TrainingRequest;
//! use azure_rest_core::pipeline::Context;
//!
//! # async fn example() -> azure_rest_core::ServiceResult<()> {
//! let client = FormRecognizerClient::builder()
//!     .endpoint("https://your-resource.cognitiveservices.azure.com")
//!     .api_key("your-key")
//!     .build()?;
//! let ctx = Context::new();
//!
//! let request = TrainingRequest::builder()
//!     .source("https://account.blob.core.windows.net/forms?sv=...")
//!     .build()?;
//! let operation = client.train_custom_model(&ctx, &request).await?;
//! println!("training model {}", operation.model_id);
//!
//! let models = client.list_custom_models(&ctx)?.collect_items().await?;
//! println!("{} models", models.len());
//! # Ok(())
//! # }
//! ```

use crate::models::{CustomModel, ModelListing, ModelsSummary, TrainingOperation, TrainingRequest};
use crate::version::FormRecognizerVersion;
use azure_rest_core::auth::{ApiKeyCredential, APIM_SUBSCRIPTION_KEY_HEADER};
use azure_rest_core::client::ServiceClient;
use azure_rest_core::codec::{read_json, JsonModel};
use azure_rest_core::error::{ServiceError, ServiceResult};
use azure_rest_core::paging::{BlockingPages, Pager};
use azure_rest_core::pipeline::{Context, Policy, Request};
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const CUSTOM_MODELS_PATH: &str = "custom/models";

/// Async client for the custom model API.
#[derive(Debug, Clone)]
pub struct FormRecognizerClient {
    service: ServiceClient,
    version: FormRecognizerVersion,
}

/// Builder for [`FormRecognizerClient`].
#[derive(Debug, Default)]
pub struct FormRecognizerClientBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    version: Option<String>,
    http_client: Option<reqwest::Client>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    transport: Option<Arc<dyn Policy>>,
}

impl FormRecognizerClient {
    pub fn builder() -> FormRecognizerClientBuilder {
        FormRecognizerClientBuilder::default()
    }

    /// API version this client talks.
    pub fn version(&self) -> FormRecognizerVersion {
        self.version
    }

    /// The underlying service client.
    pub fn service_client(&self) -> &ServiceClient {
        &self.service
    }

    /// Start training a custom model.
    ///
    /// The service answers `201 Created` with the new model's URL in the
    /// `Location` header; training continues in the background. Use
    /// [`get_custom_model`](Self::get_custom_model) to follow its status.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingHeader`] if the response has no
    /// `Location` header.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::form_recognizer::train_custom_model`.
    #[tracing::instrument(
        name = "azure::form_recognizer::train_custom_model",
        skip(self, ctx, request),
        fields(use_label_file = ?request.use_label_file)
    )]
    pub async fn train_custom_model(
        &self,
        ctx: &Context,
        request: &TrainingRequest,
    ) -> ServiceResult<TrainingOperation> {
        tracing::debug!("submitting training request");

        let http_request = self
            .service
            .json_request(Method::POST, CUSTOM_MODELS_PATH, request)?;
        let response = self.service.send(ctx, http_request).await?;

        let model_location = response
            .header_str("Location")
            .map(str::to_string)
            .ok_or_else(|| ServiceError::MissingHeader("Location".into()))?;
        let model_id = model_id_from_location(&model_location)?;

        tracing::debug!(model_id = %model_id, "training submitted");
        Ok(TrainingOperation {
            model_location,
            model_id,
        })
    }

    /// Get a custom model and its training report.
    ///
    /// With `include_keys`, the response also lists the keys extracted per
    /// cluster.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::form_recognizer::get_custom_model` with
    /// field `model_id`.
    #[tracing::instrument(
        name = "azure::form_recognizer::get_custom_model",
        skip(self, ctx),
        fields(model_id = %model_id)
    )]
    pub async fn get_custom_model(
        &self,
        ctx: &Context,
        model_id: &str,
        include_keys: bool,
    ) -> ServiceResult<CustomModel> {
        validate_model_id(model_id)?;
        tracing::debug!("fetching custom model");

        let mut request = self.model_request(Method::GET, model_id)?;
        if include_keys {
            request.append_query("includeKeys", "true");
        }

        let model = self.service.send(ctx, request).await?.read::<CustomModel>()?;
        tracing::debug!(status = ?model.model_info.status, "custom model fetched");
        Ok(model)
    }

    /// List every custom model of the account, page by page.
    ///
    /// No request is made until the returned pager is polled.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::form_recognizer::list_custom_models`.
    #[tracing::instrument(name = "azure::form_recognizer::list_custom_models", skip(self, ctx))]
    pub fn list_custom_models(&self, ctx: &Context) -> ServiceResult<Pager<ModelListing>> {
        let mut first = self.service.request(Method::GET, CUSTOM_MODELS_PATH)?;
        first.append_query("op", "full");
        Ok(self.service.pager(ctx, first))
    }

    /// Get the number of models and the account limit.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::form_recognizer::get_models_summary`.
    #[tracing::instrument(name = "azure::form_recognizer::get_models_summary", skip(self, ctx))]
    pub async fn get_models_summary(&self, ctx: &Context) -> ServiceResult<ModelsSummary> {
        let mut request = self.service.request(Method::GET, CUSTOM_MODELS_PATH)?;
        request.append_query("op", "summary");

        let envelope = self.service.send(ctx, request).await?.read::<SummaryEnvelope>()?;
        tracing::debug!(count = envelope.summary.count, "summary fetched");
        Ok(envelope.summary)
    }

    /// Delete a custom model.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure::form_recognizer::delete_custom_model` with
    /// field `model_id`.
    #[tracing::instrument(
        name = "azure::form_recognizer::delete_custom_model",
        skip(self, ctx),
        fields(model_id = %model_id)
    )]
    pub async fn delete_custom_model(&self, ctx: &Context, model_id: &str) -> ServiceResult<()> {
        validate_model_id(model_id)?;

        let request = self.model_request(Method::DELETE, model_id)?;
        self.service.send(ctx, request).await?;

        tracing::debug!("custom model deleted");
        Ok(())
    }

    /// Request addressing one model; the id is percent-encoded as a single
    /// path segment.
    fn model_request(&self, method: Method, model_id: &str) -> ServiceResult<Request> {
        let mut request = self.service.request(method, CUSTOM_MODELS_PATH)?;
        let mut url = request.url().clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::InvalidEndpoint("endpoint cannot be a base URL".into()))?
            .push(model_id);
        request.set_url(url);
        Ok(request)
    }

    /// Synchronous view of this client.
    pub fn blocking(&self) -> BlockingFormRecognizerClient<'_> {
        BlockingFormRecognizerClient { inner: self }
    }
}

impl FormRecognizerClientBuilder {
    /// Set the resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the subscription key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API version, e.g. `"v2.0"`. Defaults to the latest version.
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
    /// Returns an error if the endpoint or key is missing or invalid, or if
    /// the version string is not a supported version.
    pub fn build(self) -> ServiceResult<FormRecognizerClient> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| ServiceError::MissingConfig("endpoint is required".into()))?;
        let api_key = self
            .api_key
            .ok_or_else(|| ServiceError::MissingConfig("api_key is required".into()))?;
        let version = match self.version {
            Some(v) => v.parse::<FormRecognizerVersion>()?,
            None => FormRecognizerVersion::default(),
        };

        let mut builder = ServiceClient::builder()
            .credential(ApiKeyCredential::new(endpoint, api_key)?)
            .auth_header(APIM_SUBSCRIPTION_KEY_HEADER)
            .base_path(version.base_path());

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

        Ok(FormRecognizerClient {
            service: builder.build()?,
            version,
        })
    }
}

/// Blocking wrapper around a [`FormRecognizerClient`].
///
/// Must not be used from inside an async runtime; calls made there fail
/// with [`ServiceError::Runtime`].
#[derive(Debug, Clone, Copy)]
pub struct BlockingFormRecognizerClient<'a> {
    inner: &'a FormRecognizerClient,
}

impl BlockingFormRecognizerClient<'_> {
    pub fn train_custom_model(
        &self,
        ctx: &Context,
        request: &TrainingRequest,
    ) -> ServiceResult<TrainingOperation> {
        self.inner
            .service
            .block_on(self.inner.train_custom_model(ctx, request))
    }

    pub fn get_custom_model(
        &self,
        ctx: &Context,
        model_id: &str,
        include_keys: bool,
    ) -> ServiceResult<CustomModel> {
        self.inner
            .service
            .block_on(self.inner.get_custom_model(ctx, model_id, include_keys))
    }

    /// Iterate the model listing page by page.
    pub fn list_custom_models(&self, ctx: &Context) -> ServiceResult<BlockingPages<ModelListing>> {
        Ok(self.inner.list_custom_models(ctx)?.blocking_pages())
    }

    pub fn get_models_summary(&self, ctx: &Context) -> ServiceResult<ModelsSummary> {
        self.inner
            .service
            .block_on(self.inner.get_models_summary(ctx))
    }

    pub fn delete_custom_model(&self, ctx: &Context, model_id: &str) -> ServiceResult<()> {
        self.inner
            .service
            .block_on(self.inner.delete_custom_model(ctx, model_id))
    }
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    summary: ModelsSummary,
}

impl JsonModel for SummaryEnvelope {
    const MODEL_NAME: &'static str = "ModelsSummaryEnvelope";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }
}

fn validate_model_id(model_id: &str) -> ServiceResult<()> {
    if model_id.trim().is_empty() {
        return Err(ServiceError::InvalidArgument("model_id cannot be empty".into()));
    }
    if matches!(model_id, "." | "..") {
        return Err(ServiceError::InvalidArgument(format!(
            "model_id '{model_id}' is not a valid path segment"
        )));
    }
    if model_id.contains(['/', '?', '#']) {
        return Err(ServiceError::InvalidArgument(format!(
            "model_id '{model_id}' contains reserved characters"
        )));
    }
    Ok(())
}

fn model_id_from_location(location: &str) -> ServiceResult<String> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::InvalidArgument(format!("no model id in Location '{location}'"))
        })
}
