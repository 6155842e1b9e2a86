//! Request and response models for the custom model API.

use azure_rest_core::codec::{read_json, write_json, JsonModel};
use azure_rest_core::error::{ServiceError, ServiceResult};
use azure_rest_core::paging::{Continuable, Page};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A request to train a custom model from documents in blob storage.
///
/// ```rust
/// use azure_form_recognizer::models::TrainingRequest;
///
/// let request = TrainingRequest::builder()
///     .source("https://account.blob.core.windows.net/forms?sv=...")
///     .prefix("invoices/")
///     .use_label_file(true)
///     .build()
///     .expect("valid request");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRequest {
    /// SAS URL of the container holding the training documents.
    pub source: String,

    #[serde(rename = "sourceFilter", skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<TrainSourceFilter>,

    #[serde(rename = "useLabelFile", skip_serializing_if = "Option::is_none")]
    pub use_label_file: Option<bool>,
}

/// Restricts which blobs in the source container are used for training.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainSourceFilter {
    /// Blob name prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Whether blobs in sub folders of `prefix` are included.
    #[serde(rename = "includeSubFolders", skip_serializing_if = "Option::is_none")]
    pub include_sub_folders: Option<bool>,
}

impl TrainingRequest {
    /// Creates a new builder for a training request.
    pub fn builder() -> TrainingRequestBuilder {
        TrainingRequestBuilder::default()
    }
}

impl JsonModel for TrainingRequest {
    const MODEL_NAME: &'static str = "TrainingRequest";

    fn write(&self) -> ServiceResult<Vec<u8>> {
        write_json(self)
    }
}

/// Builder for [`TrainingRequest`].
#[derive(Debug, Default)]
pub struct TrainingRequestBuilder {
    source: Option<String>,
    prefix: Option<String>,
    include_sub_folders: Option<bool>,
    use_label_file: Option<bool>,
}

impl TrainingRequestBuilder {
    /// Sets the source container URL (required).
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Only train on blobs whose name starts with `prefix`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Include blobs in sub folders of the prefix.
    pub fn include_sub_folders(mut self, include: bool) -> Self {
        self.include_sub_folders = Some(include);
        self
    }

    /// Train with the label files next to each document.
    pub fn use_label_file(mut self, use_label_file: bool) -> Self {
        self.use_label_file = Some(use_label_file);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Builder`] if `source` is missing or empty.
    pub fn build(self) -> ServiceResult<TrainingRequest> {
        let source = self
            .source
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ServiceError::Builder("source is required".into()))?;

        let source_filter = if self.prefix.is_some() || self.include_sub_folders.is_some() {
            Some(TrainSourceFilter {
                prefix: self.prefix,
                include_sub_folders: self.include_sub_folders,
            })
        } else {
            None
        };

        Ok(TrainingRequest {
            source,
            source_filter,
            use_label_file: self.use_label_file,
        })
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Lifecycle state of a custom model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelStatus {
    Creating,
    Ready,
    Invalid,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Basic information about a custom model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    #[serde(rename = "modelId")]
    pub model_id: String,

    pub status: ModelStatus,

    #[serde(rename = "createdDateTime")]
    pub created_date_time: Option<String>,

    #[serde(rename = "lastUpdatedDateTime")]
    pub last_updated_date_time: Option<String>,
}

/// Account-wide model counts.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsSummary {
    /// Current number of trained custom models.
    pub count: u32,

    /// Maximum number of models the account can hold.
    pub limit: u32,

    #[serde(rename = "lastUpdatedDateTime")]
    pub last_updated_date_time: Option<String>,
}

/// One page of the model listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelListing {
    pub summary: Option<ModelsSummary>,

    #[serde(rename = "modelList", default)]
    pub model_list: Vec<ModelInfo>,

    #[serde(rename = "nextLink")]
    pub next_link: Option<String>,
}

impl JsonModel for ModelListing {
    const MODEL_NAME: &'static str = "ModelListing";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }
}

impl Continuable for ModelListing {
    type Item = ModelInfo;

    fn into_page(self) -> Page<ModelInfo> {
        Page::new(self.model_list, self.next_link)
    }
}

/// A custom model with its training report.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomModel {
    #[serde(rename = "modelInfo")]
    pub model_info: ModelInfo,

    /// Keys extracted per cluster, for models trained without labels.
    pub keys: Option<KeysResult>,

    #[serde(rename = "trainResult")]
    pub train_result: Option<TrainResult>,
}

impl JsonModel for CustomModel {
    const MODEL_NAME: &'static str = "CustomModel";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }
}

/// Keys grouped by cluster id.
#[derive(Debug, Clone, Deserialize)]
pub struct KeysResult {
    #[serde(default)]
    pub clusters: HashMap<String, Vec<String>>,
}

/// Report produced by a training run.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainResult {
    #[serde(rename = "trainingDocuments", default)]
    pub training_documents: Vec<TrainingDocumentInfo>,

    /// Per-field accuracy, for models trained with labels.
    pub fields: Option<Vec<FormFieldsReport>>,

    #[serde(rename = "averageModelAccuracy")]
    pub average_model_accuracy: Option<f64>,

    #[serde(default)]
    pub errors: Vec<ErrorInformation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingDocumentInfo {
    #[serde(rename = "documentName")]
    pub document_name: String,

    pub pages: u32,

    #[serde(default)]
    pub errors: Vec<ErrorInformation>,

    /// `succeeded`, `partiallySucceeded` or `failed`.
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormFieldsReport {
    #[serde(rename = "fieldName")]
    pub field_name: String,

    pub accuracy: f64,
}

/// An error reported inside an otherwise successful response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInformation {
    pub code: String,
    pub message: String,
}

/// Result of submitting a training request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingOperation {
    /// URL of the model being trained (the `Location` header).
    pub model_location: String,

    /// Last path segment of `model_location`.
    pub model_id: String,
}
