//! Supported Form Recognizer API versions.

use azure_rest_core::error::{ServiceError, ServiceResult};
use std::str::FromStr;

/// A Form Recognizer REST API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormRecognizerVersion {
    /// `v2.0`
    V2_0,
    /// `v2.1`
    #[default]
    V2_1,
}

impl FormRecognizerVersion {
    /// Version segment as it appears in request paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2_0 => "v2.0",
            Self::V2_1 => "v2.1",
        }
    }

    /// Path every request of this version is placed under.
    pub fn base_path(self) -> &'static str {
        match self {
            Self::V2_0 => "formrecognizer/v2.0",
            Self::V2_1 => "formrecognizer/v2.1",
        }
    }
}

impl FromStr for FormRecognizerVersion {
    type Err = ServiceError;

    /// Accepts `"v2.0"`/`"2.0"` and `"v2.1"`/`"2.1"`.
    fn from_str(s: &str) -> ServiceResult<Self> {
        match s.trim().trim_start_matches('v') {
            "2.0" => Ok(Self::V2_0),
            "2.1" => Ok(Self::V2_1),
            _ => Err(ServiceError::InvalidArgument(format!(
                "unsupported Form Recognizer API version '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for FormRecognizerVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
