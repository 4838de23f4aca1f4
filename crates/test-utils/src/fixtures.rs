//! Common request fixtures.

/// A token that is well-formed but never issued.
pub const UNKNOWN_TOKEN: &str = "ffffffffffffffffffffffffffffffff";

/// WFS 2.0 GetFeature document for `type_name` with the given result type.
pub fn get_feature_document(type_name: &str, result_type: &str, count: Option<u64>) -> String {
    let count = count
        .map(|c| format!(r#" count="{}""#, c))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:GetFeature service="WFS" version="2.0.0" resultType="{}"{}
    xmlns:wfs="http://www.opengis.net/wfs/2.0"
    xmlns:fes="http://www.opengis.net/fes/2.0">
  <wfs:Query typeNames="{}"/>
</wfs:GetFeature>"#,
        result_type, count, type_name
    )
}

/// WFS 2.0 GetFeature document asking for an index over `type_name`.
pub fn index_document(type_name: &str) -> String {
    get_feature_document(type_name, "index", None)
}

/// KVP pairs for a GetFeature request.
pub fn get_feature_kvp(type_name: &str, result_type: &str) -> Vec<(String, String)> {
    vec![
        ("service".to_string(), "WFS".to_string()),
        ("version".to_string(), "2.0.0".to_string()),
        ("request".to_string(), "GetFeature".to_string()),
        ("typeNames".to_string(), type_name.to_string()),
        ("resultType".to_string(), result_type.to_string()),
    ]
}

/// Extract the `resultSetID` attribute value from a hits response.
pub fn extract_result_set_id(xml: &str) -> Option<String> {
    let start = xml.find(r#"resultSetID=""#)? + r#"resultSetID=""#.len();
    let end = xml[start..].find('"')? + start;
    Some(xml[start..end].to_string())
}
