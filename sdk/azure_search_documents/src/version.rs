//! Supported search service API versions.

use azure_rest_core::error::{ServiceError, ServiceResult};
use std::str::FromStr;

/// Query parameter every search request carries.
pub const API_VERSION_PARAM: &str = "api-version";

/// A search service REST API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchServiceVersion {
    /// `2019-05-06`
    V2019_05_06,
    /// `2020-06-30`
    #[default]
    V2020_06_30,
}

impl SearchServiceVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2019_05_06 => "2019-05-06",
            Self::V2020_06_30 => "2020-06-30",
        }
    }
}

impl FromStr for SearchServiceVersion {
    type Err = ServiceError;

    fn from_str(s: &str) -> ServiceResult<Self> {
        match s.trim() {
            "2019-05-06" => Ok(Self::V2019_05_06),
            "2020-06-30" => Ok(Self::V2020_06_30),
            _ => Err(ServiceError::InvalidArgument(format!(
                "unsupported search API version '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for SearchServiceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_versions() {
        assert_eq!(
            "2020-06-30".parse::<SearchServiceVersion>().unwrap(),
            SearchServiceVersion::V2020_06_30
        );
        assert_eq!(
            "2019-05-06".parse::<SearchServiceVersion>().unwrap().to_string(),
            "2019-05-06"
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let err = "2030-01-01".parse::<SearchServiceVersion>().expect_err("unknown");
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }
}
