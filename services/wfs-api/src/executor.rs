//! GetFeature query execution.
//!
//! The paging machinery only needs "run this fully populated request and give
//! me the page"; [`FeatureQueryExecutor`] is that seam. [`LayerCatalog`] is the
//! implementation used by the service, serving GeoJSON files from a directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use wfs_common::{GetFeatureRequest, ResultType, WfsError, WfsResult};
use wfs_protocol::{Feature, FeatureResult};

/// Runs GetFeature queries.
#[async_trait]
pub trait FeatureQueryExecutor: Send + Sync {
    /// Execute a query. Hits queries report `number_matched` with no features.
    async fn execute(&self, request: &GetFeatureRequest) -> WfsResult<FeatureResult>;

    /// Names of the feature types that can be queried.
    fn type_names(&self) -> Vec<String>;
}

/// In-memory feature types keyed by qualified name.
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    layers: BTreeMap<String, Vec<Feature>>,
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl LayerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.geojson` / `.json` file under `dir`.
    ///
    /// A file's layer name is its stem, qualified by its parent directory when
    /// nested (`topp/states.geojson` is `topp:states`). Unreadable files are
    /// skipped with a warning.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();

        if !dir.exists() {
            warn!(dir = %dir.display(), "Layer directory does not exist, serving no layers");
            return Ok(catalog);
        }

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || !path
                    .extension()
                    .is_some_and(|e| e == "geojson" || e == "json")
            {
                continue;
            }

            let Some(name) = layer_name(dir, path) else {
                warn!(path = ?path, "Skipping layer with non UTF-8 name");
                continue;
            };

            let parsed = std::fs::read_to_string(path)
                .map_err(WfsError::from)
                .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?))
                .and_then(|value| parse_feature_collection(&value));

            match parsed {
                Ok(features) => {
                    info!(layer = %name, features = features.len(), "Loaded layer");
                    catalog.insert_layer(name, features);
                }
                Err(e) => warn!(path = ?path, error = %e, "Failed to load layer"),
            }
        }

        Ok(catalog)
    }

    /// Add or replace a layer.
    pub fn insert_layer(&mut self, name: impl Into<String>, features: Vec<Feature>) {
        self.layers.insert(name.into(), features);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Find a layer by exact name, then by unqualified name.
    fn resolve(&self, type_name: &str) -> Option<(&str, &[Feature])> {
        if let Some((name, features)) = self.layers.get_key_value(type_name) {
            return Some((name.as_str(), features.as_slice()));
        }
        let wanted = local_part(type_name);
        self.layers
            .iter()
            .find(|(name, _)| local_part(name) == wanted)
            .map(|(name, features)| (name.as_str(), features.as_slice()))
    }
}

#[async_trait]
impl FeatureQueryExecutor for LayerCatalog {
    #[instrument(skip(self, request), fields(type_names = ?request.type_names, result_type = %request.result_type))]
    async fn execute(&self, request: &GetFeatureRequest) -> WfsResult<FeatureResult> {
        let type_name = match request.type_names.as_slice() {
            [single] => single,
            [] => return Err(WfsError::MissingParameter("typeNames".to_string())),
            _ => {
                return Err(WfsError::InvalidParameter {
                    param: "typeNames".to_string(),
                    message: "only one feature type per query is supported".to_string(),
                })
            }
        };

        let (name, features) = self
            .resolve(type_name)
            .ok_or_else(|| WfsError::UnknownTypeName(type_name.clone()))?;

        let mut result = FeatureResult {
            type_name: name.to_string(),
            number_matched: features.len() as u64,
            ..Default::default()
        };

        if request.result_type != ResultType::Hits {
            let start = usize::try_from(request.effective_start_index()).unwrap_or(usize::MAX);
            let count = request
                .count
                .map(|c| usize::try_from(c).unwrap_or(usize::MAX))
                .unwrap_or(usize::MAX);

            result.features = features
                .iter()
                .skip(start)
                .take(count)
                .map(|f| select_properties(f, &request.property_names))
                .collect();
        }

        debug!(
            matched = result.number_matched,
            returned = result.number_returned(),
            "Executed query"
        );
        Ok(result)
    }

    fn type_names(&self) -> Vec<String> {
        self.layers.keys().cloned().collect()
    }
}

fn layer_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let stem = relative.file_stem()?.to_str()?;
    let mut parts: Vec<&str> = relative
        .parent()
        .map(|p| p.iter().filter_map(|c| c.to_str()).collect())
        .unwrap_or_default();
    parts.push(stem);
    Some(parts.join(":"))
}

/// Read the features of a GeoJSON FeatureCollection.
///
/// Features without an `id` are numbered from 1 in file order.
pub fn parse_feature_collection(value: &Value) -> WfsResult<Vec<Feature>> {
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| WfsError::InternalError("not a GeoJSON FeatureCollection".to_string()))?;

    Ok(features
        .iter()
        .enumerate()
        .map(|(i, f)| Feature {
            id: match f.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => (i + 1).to_string(),
            },
            geometry: f.get("geometry").filter(|g| !g.is_null()).cloned(),
            properties: f
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
        .collect())
}

fn select_properties(feature: &Feature, property_names: &[String]) -> Feature {
    if property_names.is_empty() {
        return feature.clone();
    }

    let properties: Map<String, Value> = feature
        .properties
        .iter()
        .filter(|(key, _)| property_names.iter().any(|p| local_part(p) == key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Feature {
        id: feature.id.clone(),
        geometry: feature.geometry.clone(),
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::layers::{layer_dir, point_layer, write_point_layer};

    fn catalog() -> LayerCatalog {
        let mut catalog = LayerCatalog::new();
        catalog.insert_layer(
            "topp:roads",
            parse_feature_collection(&point_layer(25)).unwrap(),
        );
        catalog
    }

    #[tokio::test]
    async fn test_results_are_sliced() {
        let mut request = GetFeatureRequest::new(vec!["topp:roads".to_string()]);
        request.start_index = Some(20);
        request.count = Some(10);

        let result = catalog().execute(&request).await.unwrap();
        assert_eq!(result.number_matched, 25);
        assert_eq!(result.number_returned(), 5);
        assert_eq!(result.features[0].id, "21");
    }

    #[tokio::test]
    async fn test_hits_return_no_features() {
        let request =
            GetFeatureRequest::new(vec!["roads".to_string()]).with_result_type(ResultType::Hits);

        let result = catalog().execute(&request).await.unwrap();
        assert_eq!(result.number_matched, 25);
        assert!(result.features.is_empty());
        assert_eq!(result.type_name, "topp:roads");
    }

    #[tokio::test]
    async fn test_no_count_returns_everything() {
        let request = GetFeatureRequest::new(vec!["roads".to_string()]);
        let result = catalog().execute(&request).await.unwrap();
        assert_eq!(result.number_returned(), 25);
    }

    #[tokio::test]
    async fn test_property_selection() {
        let mut request = GetFeatureRequest::new(vec!["roads".to_string()]);
        request.property_names = vec!["topp:name".to_string()];
        request.count = Some(1);

        let result = catalog().execute(&request).await.unwrap();
        let feature = &result.features[0];
        assert!(feature.properties.contains_key("name"));
        assert!(!feature.properties.contains_key("rank"));
    }

    #[tokio::test]
    async fn test_unknown_type_name() {
        let request = GetFeatureRequest::new(vec!["rivers".to_string()]);
        assert!(matches!(
            catalog().execute(&request).await,
            Err(WfsError::UnknownTypeName(name)) if name == "rivers"
        ));
    }

    #[test]
    fn test_load_from_dir_qualifies_nested_layers() {
        let dir = layer_dir(&[("roads", 3)]);
        std::fs::create_dir(dir.path().join("topp")).unwrap();
        write_point_layer(&dir.path().join("topp"), "states", 2);
        std::fs::write(dir.path().join("broken.geojson"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = LayerCatalog::load_from_dir(dir.path()).unwrap();
        assert_eq!(catalog.type_names(), vec!["roads", "topp:states"]);
    }

    #[test]
    fn test_missing_dir_is_empty_catalog() {
        let catalog = LayerCatalog::load_from_dir(Path::new("/nonexistent/layers")).unwrap();
        assert!(catalog.is_empty());
    }
}
