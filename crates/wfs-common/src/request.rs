//! Typed WFS requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{WfsError, WfsResult};

/// Start index used when neither the page request nor the stored query has one.
pub const DEFAULT_START_INDEX: u64 = 0;

/// Page size used when neither the page request nor the stored query has one.
pub const DEFAULT_COUNT: u64 = 10;

/// Output format used when neither the page request nor the stored query has one.
pub const DEFAULT_OUTPUT_FORMAT: &str = "application/gml+xml; version=3.2";

/// Default WFS version when a request does not state one.
pub const DEFAULT_VERSION: &str = "2.0.0";

/// What a GetFeature request asks the server to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    /// Full feature results.
    #[default]
    Results,
    /// Only the number of matching features.
    Hits,
    /// Counts now, plus a result set token for paging through the results later.
    Index,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Results => "results",
            ResultType::Hits => "hits",
            ResultType::Index => "index",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = WfsError;

    fn from_str(s: &str) -> WfsResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "results" => Ok(ResultType::Results),
            "hits" => Ok(ResultType::Hits),
            "index" => Ok(ResultType::Index),
            other => Err(WfsError::InvalidParameter {
                param: "resultType".to_string(),
                message: format!("unknown result type '{}'", other),
            }),
        }
    }
}

/// A GetFeature query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetFeatureRequest {
    /// Protocol version (e.g. "2.0.0", "1.1.0")
    pub version: String,

    /// Feature types to query
    pub type_names: Vec<String>,

    /// Properties to return; empty means all
    pub property_names: Vec<String>,

    pub result_type: ResultType,

    /// Zero-based index of the first feature to return
    pub start_index: Option<u64>,

    /// Maximum number of features to return
    pub count: Option<u64>,

    /// Output MIME type
    pub output_format: Option<String>,

    /// Base URL of the server answering this request
    pub base_url: Option<String>,
}

impl GetFeatureRequest {
    pub fn new(type_names: Vec<String>) -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            type_names,
            property_names: Vec::new(),
            result_type: ResultType::Results,
            start_index: None,
            count: None,
            output_format: None,
            base_url: None,
        }
    }

    /// Copy of this request asking for a different result type.
    pub fn with_result_type(&self, result_type: ResultType) -> Self {
        Self {
            result_type,
            ..self.clone()
        }
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = Some(base_url.into());
    }

    /// WFS 2.0 encodes counts differently from 1.x.
    pub fn is_wfs2(&self) -> bool {
        self.version.starts_with('2')
    }

    pub fn effective_start_index(&self) -> u64 {
        self.start_index.unwrap_or(DEFAULT_START_INDEX)
    }

    pub fn effective_count(&self) -> u64 {
        self.count.unwrap_or(DEFAULT_COUNT)
    }

    pub fn effective_output_format(&self) -> &str {
        self.output_format.as_deref().unwrap_or(DEFAULT_OUTPUT_FORMAT)
    }
}

/// Request for one page of a stored result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResultsRequest {
    pub result_set_id: String,
    pub start_index: Option<u64>,
    pub count: Option<u64>,
    pub output_format: Option<String>,
    pub result_type: Option<ResultType>,
}

/// Any request the WFS endpoint understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WfsRequest {
    GetCapabilities { version: Option<String> },
    GetFeature(GetFeatureRequest),
    PageResults(PageResultsRequest),
}

impl WfsRequest {
    pub fn operation_name(&self) -> &'static str {
        match self {
            WfsRequest::GetCapabilities { .. } => "GetCapabilities",
            WfsRequest::GetFeature(_) => "GetFeature",
            WfsRequest::PageResults(_) => "PageResults",
        }
    }
}

/// Parse a non-negative integer parameter.
pub fn parse_u64(param: &str, value: &str) -> WfsResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| WfsError::InvalidParameter {
            param: param.to_string(),
            message: format!("expected a non-negative integer, got '{}'", value),
        })
}

/// Split a comma separated list, dropping empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_type_parse_is_case_insensitive() {
        assert_eq!("INDEX".parse::<ResultType>().unwrap(), ResultType::Index);
        assert_eq!(" hits ".parse::<ResultType>().unwrap(), ResultType::Hits);
        assert!("everything".parse::<ResultType>().is_err());
    }

    #[test]
    fn test_with_result_type_keeps_other_fields() {
        let mut request = GetFeatureRequest::new(vec!["topp:states".to_string()]);
        request.count = Some(25);
        request.output_format = Some("application/json".to_string());

        let hits = request.with_result_type(ResultType::Hits);
        assert_eq!(hits.result_type, ResultType::Hits);
        assert_eq!(hits.count, Some(25));
        assert_eq!(hits.type_names, request.type_names);
        assert_eq!(request.result_type, ResultType::Results);
    }

    #[test]
    fn test_effective_defaults() {
        let request = GetFeatureRequest::new(vec!["roads".to_string()]);
        assert_eq!(request.effective_start_index(), DEFAULT_START_INDEX);
        assert_eq!(request.effective_count(), DEFAULT_COUNT);
        assert_eq!(request.effective_output_format(), DEFAULT_OUTPUT_FORMAT);
    }

    #[test]
    fn test_parse_u64_rejects_negative() {
        assert_eq!(parse_u64("count", "25").unwrap(), 25);
        assert!(matches!(
            parse_u64("count", "-1"),
            Err(WfsError::InvalidParameter { .. })
        ));
    }
}
