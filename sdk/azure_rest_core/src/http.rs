//! Request and response values threaded through the pipeline.

use crate::codec::JsonModel;
use crate::error::ServiceResult;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use url::Url;

const APPLICATION_JSON: &str = "application/json";

/// An outgoing request. Policies mutate it in place before transmission.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    pinned: bool,
}

impl Request {
    /// Create a request whose URL will be re-based by authentication policies.
    pub fn new(method: Method, url: Url) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        Self {
            method,
            url,
            headers,
            body: None,
            pinned: false,
        }
    }

    /// Create a request for a server-issued URL (such as a `nextLink`).
    ///
    /// Pinned requests are sent to `url` verbatim; authentication policies
    /// still add their headers.
    pub fn pinned(method: Method, url: Url) -> Self {
        Self {
            pinned: true,
            ..Self::new(method, url)
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Whether the URL must be sent as-is.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Append a query parameter, percent-encoding it.
    pub fn append_query(&mut self, key: &str, value: &str) {
        self.url.query_pairs_mut().append_pair(key, value);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set a header, replacing any previous values for the same name.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Attach a JSON body encoded from `model`.
    pub fn set_json<T: JsonModel>(&mut self, model: &T) -> ServiceResult<()> {
        let encoded = model.write()?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        self.body = Some(Bytes::from(encoded));
        Ok(())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: Option<Url>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            url: None,
        }
    }

    /// Record the URL the request was finally sent to.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// URL the request was sent to, after every policy ran.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the body as `T`.
    pub fn read<T: JsonModel>(&self) -> ServiceResult<T> {
        T::read(&self.body)
    }
}
