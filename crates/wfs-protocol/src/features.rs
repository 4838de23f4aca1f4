//! Feature values returned by query execution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single feature: identifier, GeoJSON geometry and flat properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One page of features for a feature type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureResult {
    /// Feature type name the features belong to
    pub type_name: String,
    /// Total number of features matching the query
    pub number_matched: u64,
    /// Features in this page
    pub features: Vec<Feature>,
    /// Link to the next page, if any
    pub next: Option<String>,
    /// Link to the previous page, if any
    pub previous: Option<String>,
}

impl FeatureResult {
    pub fn number_returned(&self) -> u64 {
        self.features.len() as u64
    }
}
