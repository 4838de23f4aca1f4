//! GeoJSON layer generators.

use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// A GeoJSON FeatureCollection with `n` point features numbered from 1.
pub fn point_layer(n: usize) -> Value {
    let features: Vec<Value> = (1..=n)
        .map(|i| {
            json!({
                "type": "Feature",
                "id": i.to_string(),
                "geometry": { "type": "Point", "coordinates": [i as f64, -(i as f64)] },
                "properties": { "name": format!("feature-{}", i), "rank": i },
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

/// Write a point layer named `name` into `dir` as `<name>.geojson`.
pub fn write_point_layer(dir: &Path, name: &str, n: usize) {
    let path = dir.join(format!("{}.geojson", name));
    std::fs::write(&path, point_layer(n).to_string()).expect("failed to write test layer");
}

/// Temporary directory holding the given point layers.
pub fn layer_dir(layers: &[(&str, usize)]) -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    for (name, n) in layers {
        write_point_layer(dir.path(), name, *n);
    }
    dir
}
