//! Document, query and indexing models.
//!
//! Documents are generic: any serde type whose JSON form is an object can be
//! searched, fetched and indexed. [`SearchDocument`] is the untyped default.

use azure_rest_core::codec::{read_json, write_json, JsonModel};
use azure_rest_core::error::{ServiceError, ServiceResult};
use azure_rest_core::paging::{Continuable, Page};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// An untyped search document: the document's fields as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchDocument(Map<String, Value>);

impl SearchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field, returning its previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for SearchDocument {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SearchDocument {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A single fetched document.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub(crate) struct Fetched<T>(pub T);

impl<T: DeserializeOwned> JsonModel for Fetched<T> {
    const MODEL_NAME: &'static str = "SearchDocument";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Parameters of a search query.
///
/// ```rust
/// use azure_search_documents::models::SearchOptions;
///
/// let options = SearchOptions::new("luxury")
///     .filter("rating ge 4")
///     .select(["hotelId", "hotelName"])
///     .order_by(["rating desc"])
///     .top(10)
///     .include_total_count(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    pub search_text: Option<String>,
    pub filter: Option<String>,
    pub select: Vec<String>,
    pub order_by: Vec<String>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
    pub include_total_count: bool,
}

impl SearchOptions {
    /// Full text query; `"*"` matches every document.
    pub fn new(search_text: impl Into<String>) -> Self {
        Self {
            search_text: Some(search_text.into()),
            ..Self::default()
        }
    }

    /// OData `$filter` expression.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Fields to return; all retrievable fields when empty.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// `$orderby` clauses such as `"rating desc"`.
    pub fn order_by<I, S>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = clauses.into_iter().map(Into::into).collect();
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Ask the service for the total match count (`@odata.count`).
    pub fn include_total_count(mut self, include: bool) -> Self {
        self.include_total_count = include;
        self
    }

    /// Query parameters for a GET search, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(
            "search",
            self.search_text.clone().unwrap_or_else(|| "*".to_string()),
        )];
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.clone()));
        }
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        if !self.order_by.is_empty() {
            pairs.push(("$orderby", self.order_by.join(",")));
        }
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("$skip", skip.to_string()));
        }
        if self.include_total_count {
            pairs.push(("$count", "true".to_string()));
        }
        pairs
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// One hit of a search query.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult<T = SearchDocument> {
    /// Relevance score.
    #[serde(rename = "@search.score")]
    pub score: f64,

    /// Highlighted fragments per field, when highlighting was requested.
    #[serde(rename = "@search.highlights")]
    pub highlights: Option<HashMap<String, Vec<String>>>,

    #[serde(flatten)]
    pub document: T,
}

/// One page of search results.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct SearchDocumentsResult<T = SearchDocument> {
    /// Total number of matches, when requested.
    #[serde(rename = "@odata.count")]
    pub count: Option<u64>,

    /// Percentage of the index covered by the query.
    #[serde(rename = "@search.coverage")]
    pub coverage: Option<f64>,

    #[serde(default)]
    pub value: Vec<SearchResult<T>>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl<T: DeserializeOwned> JsonModel for SearchDocumentsResult<T> {
    const MODEL_NAME: &'static str = "SearchDocumentsResult";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }
}

impl<T: DeserializeOwned> Continuable for SearchDocumentsResult<T> {
    type Item = SearchResult<T>;

    fn into_page(self) -> Page<SearchResult<T>> {
        Page::new(self.value, self.next_link)
    }
}

// ---------------------------------------------------------------------------
// Indexing
// ---------------------------------------------------------------------------

/// What to do with a document in an [`IndexBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexActionType {
    #[serde(rename = "upload")]
    Upload,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "mergeOrUpload")]
    MergeOrUpload,
    /// Only the key field of the document is needed.
    #[serde(rename = "delete")]
    Delete,
}

/// A document together with the action to apply to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexAction<T = SearchDocument> {
    #[serde(rename = "@search.action")]
    pub action: IndexActionType,

    #[serde(flatten)]
    pub document: T,
}

impl<T> IndexAction<T> {
    pub fn new(action: IndexActionType, document: T) -> Self {
        Self { action, document }
    }
}

/// A batch of index actions, sent in one request.
///
/// ```rust
/// use azure_search_documents::models::{IndexBatch, SearchDocument};
///
/// let doc: SearchDocument = [("hotelId", "1"), ("hotelName", "Fancy Stay")]
///     .into_iter()
///     .collect();
/// let batch = IndexBatch::new().upload([doc]);
/// assert_eq!(batch.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBatch<T = SearchDocument> {
    pub value: Vec<IndexAction<T>>,
}

impl<T> Default for IndexBatch<T> {
    fn default() -> Self {
        Self { value: Vec::new() }
    }
}

impl<T> IndexBatch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, action: IndexAction<T>) -> Self {
        self.value.push(action);
        self
    }

    pub fn upload(self, documents: impl IntoIterator<Item = T>) -> Self {
        self.with_action(IndexActionType::Upload, documents)
    }

    pub fn merge(self, documents: impl IntoIterator<Item = T>) -> Self {
        self.with_action(IndexActionType::Merge, documents)
    }

    pub fn merge_or_upload(self, documents: impl IntoIterator<Item = T>) -> Self {
        self.with_action(IndexActionType::MergeOrUpload, documents)
    }

    pub fn delete(self, documents: impl IntoIterator<Item = T>) -> Self {
        self.with_action(IndexActionType::Delete, documents)
    }

    fn with_action(mut self, action: IndexActionType, documents: impl IntoIterator<Item = T>) -> Self {
        self.value
            .extend(documents.into_iter().map(|doc| IndexAction::new(action, doc)));
        self
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl<T: Serialize> JsonModel for IndexBatch<T> {
    const MODEL_NAME: &'static str = "IndexBatch";

    fn write(&self) -> ServiceResult<Vec<u8>> {
        write_json(self)
    }
}

/// Outcome of an indexing request, one entry per action.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDocumentsResult {
    #[serde(default)]
    pub value: Vec<IndexingResult>,
}

impl IndexDocumentsResult {
    /// Entries whose action did not succeed.
    pub fn failed(&self) -> impl Iterator<Item = &IndexingResult> {
        self.value.iter().filter(|r| !r.succeeded)
    }
}

impl JsonModel for IndexDocumentsResult {
    const MODEL_NAME: &'static str = "IndexDocumentsResult";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexingResult {
    /// Key of the document the action applied to.
    pub key: String,

    #[serde(rename = "status")]
    pub succeeded: bool,

    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,

    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// Checks that every action's document serializes to a JSON object.
pub(crate) fn ensure_object_documents<T: Serialize>(batch: &IndexBatch<T>) -> ServiceResult<()> {
    for action in &batch.value {
        if !serde_json::to_value(&action.document)?.is_object() {
            return Err(ServiceError::InvalidArgument(
                "index documents must serialize to JSON objects".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use azure_rest_core::error::Direction;
    use serde_json::json;

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct Hotel {
        #[serde(rename = "hotelId")]
        hotel_id: String,
        rating: Option<f64>,
    }

    #[test]
    fn search_result_flattens_document_fields() {
        let json = br#"{
            "@odata.count": 2,
            "@search.coverage": 100.0,
            "value": [
                {"@search.score": 1.5, "hotelId": "1", "rating": 4.5},
                {"@search.score": 0.5, "@search.highlights": {"description": ["<em>pool</em>"]}, "hotelId": "2"}
            ],
            "@odata.nextLink": "https://search.example.com/indexes/hotels/docs?api-version=2020-06-30&search=*&$skip=50"
        }"#;

        let result = SearchDocumentsResult::<Hotel>::read(json).expect("should decode");
        assert_eq!(result.count, Some(2));
        assert_eq!(result.value[0].score, 1.5);
        assert_eq!(result.value[0].document.rating, Some(4.5));
        assert_eq!(result.value[1].document.hotel_id, "2");
        assert_eq!(
            result.value[1].highlights.as_ref().unwrap()["description"],
            vec!["<em>pool</em>"]
        );

        let page = result.into_page();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_link.unwrap().ends_with("$skip=50"));
    }

    #[test]
    fn untyped_result_keeps_document_fields_only() {
        let json = br#"{"value": [{"@search.score": 1.0, "hotelId": "1", "tags": ["a"]}]}"#;
        let result = SearchDocumentsResult::<SearchDocument>::read(json).unwrap();
        let doc = &result.value[0].document;

        assert_eq!(doc.get("hotelId"), Some(&json!("1")));
        assert_eq!(doc.get("tags"), Some(&json!(["a"])));
        assert!(doc.get("@search.score").is_none());
        assert!(result.next_link.is_none());
    }

    #[test]
    fn search_options_map_to_odata_parameters() {
        let options = SearchOptions::new("beach")
            .filter("rating gt 3")
            .select(["hotelId", "rating"])
            .order_by(["rating desc", "hotelId"])
            .top(5)
            .skip(10)
            .include_total_count(true);

        assert_eq!(
            options.query_pairs(),
            vec![
                ("search", "beach".to_string()),
                ("$filter", "rating gt 3".to_string()),
                ("$select", "hotelId,rating".to_string()),
                ("$orderby", "rating desc,hotelId".to_string()),
                ("$top", "5".to_string()),
                ("$skip", "10".to_string()),
                ("$count", "true".to_string()),
            ]
        );
    }

    #[test]
    fn default_options_search_everything() {
        assert_eq!(
            SearchOptions::default().query_pairs(),
            vec![("search", "*".to_string())]
        );
    }

    #[test]
    fn index_batch_writes_action_next_to_fields() {
        let batch = IndexBatch::new()
            .upload([Hotel {
                hotel_id: "1".into(),
                rating: Some(4.0),
            }])
            .delete([Hotel {
                hotel_id: "2".into(),
                rating: None,
            }]);

        let written: Value = serde_json::from_slice(&batch.write().unwrap()).unwrap();
        assert_eq!(
            written,
            json!({
                "value": [
                    {"@search.action": "upload", "hotelId": "1", "rating": 4.0},
                    {"@search.action": "delete", "hotelId": "2", "rating": null}
                ]
            })
        );
    }

    #[test]
    fn merge_or_upload_uses_camel_case_action() {
        let doc: SearchDocument = [("hotelId", "9")].into_iter().collect();
        let batch = IndexBatch::new().merge_or_upload([doc]);

        let written = String::from_utf8(batch.write().unwrap()).unwrap();
        assert_eq!(
            written,
            r#"{"value":[{"@search.action":"mergeOrUpload","hotelId":"9"}]}"#
        );
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let batch = IndexBatch::new().upload(["just a string"]);
        let err = ensure_object_documents(&batch).expect_err("not an object");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[test]
    fn index_batch_cannot_be_read() {
        let err = IndexBatch::<SearchDocument>::read(br#"{"value": []}"#).expect_err("write-only");
        assert!(matches!(
            err,
            ServiceError::Unsupported {
                model: "IndexBatch",
                direction: Direction::Read
            }
        ));
    }

    #[test]
    fn indexing_results_report_failures() {
        let json = br#"{"value": [
            {"key": "1", "status": true, "errorMessage": null, "statusCode": 201},
            {"key": "2", "status": false, "errorMessage": "Document not found.", "statusCode": 404}
        ]}"#;

        let result = IndexDocumentsResult::read(json).unwrap();
        let failed: Vec<_> = result.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].key, "2");
        assert_eq!(failed[0].status_code, 404);
        assert_eq!(failed[0].error_message.as_deref(), Some("Document not found."));
    }

    #[test]
    fn results_cannot_be_written() {
        let result = IndexDocumentsResult::read(br#"{"value": []}"#).unwrap();
        assert!(matches!(
            result.write(),
            Err(ServiceError::Unsupported {
                direction: Direction::Write,
                ..
            })
        ));
    }
}
