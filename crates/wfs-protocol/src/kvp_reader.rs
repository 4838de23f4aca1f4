//! Key-value-pair (GET) request reader.

use wfs_common::kvp::RESULT_SET_ID;
use wfs_common::request::{parse_u64, split_list, DEFAULT_VERSION};
use wfs_common::{
    GetFeatureRequest, KvpMap, PageResultsRequest, ResultType, WfsError, WfsRequest, WfsResult,
};

/// Parse a WFS request from KVP parameters.
pub fn read_request(kvp: &KvpMap) -> WfsResult<WfsRequest> {
    if let Some(service) = kvp.get_non_empty("SERVICE") {
        if !service.eq_ignore_ascii_case("WFS") {
            return Err(WfsError::InvalidParameter {
                param: "SERVICE".to_string(),
                message: "SERVICE must be WFS".to_string(),
            });
        }
    }

    let request = kvp
        .get_non_empty("REQUEST")
        .ok_or_else(|| WfsError::MissingParameter("REQUEST".to_string()))?;

    match request.to_uppercase().as_str() {
        "GETCAPABILITIES" => Ok(WfsRequest::GetCapabilities {
            version: kvp.get_any(&["VERSION", "ACCEPTVERSIONS"]).map(String::from),
        }),
        "GETFEATURE" => read_get_feature(kvp).map(WfsRequest::GetFeature),
        "PAGERESULTS" => read_page_results(kvp).map(WfsRequest::PageResults),
        other => Err(WfsError::OperationNotSupported(other.to_string())),
    }
}

/// Parse the GetFeature parameters of a KVP request.
pub fn read_get_feature(kvp: &KvpMap) -> WfsResult<GetFeatureRequest> {
    let type_names = kvp
        .get_any(&["TYPENAMES", "TYPENAME"])
        .map(split_list)
        .filter(|names| !names.is_empty())
        .ok_or_else(|| WfsError::MissingParameter("TYPENAMES".to_string()))?;

    let mut request = GetFeatureRequest::new(type_names);
    request.version = kvp
        .get_non_empty("VERSION")
        .unwrap_or(DEFAULT_VERSION)
        .to_string();
    request.result_type = optional_result_type(kvp)?.unwrap_or_default();
    request.start_index = optional_u64(kvp, &["STARTINDEX"])?;
    request.count = optional_u64(kvp, &["COUNT", "MAXFEATURES"])?;
    request.output_format = kvp.get_non_empty("OUTPUTFORMAT").map(String::from);
    request.property_names = kvp
        .get_non_empty("PROPERTYNAME")
        .map(split_list)
        .unwrap_or_default();

    Ok(request)
}

/// Parse the PageResults parameters of a KVP request.
pub fn read_page_results(kvp: &KvpMap) -> WfsResult<PageResultsRequest> {
    let result_set_id = kvp
        .get_non_empty(RESULT_SET_ID)
        .ok_or_else(|| WfsError::MissingParameter("resultSetID".to_string()))?;

    Ok(PageResultsRequest {
        result_set_id: result_set_id.to_string(),
        start_index: optional_u64(kvp, &["STARTINDEX"])?,
        count: optional_u64(kvp, &["COUNT", "MAXFEATURES"])?,
        output_format: kvp.get_non_empty("OUTPUTFORMAT").map(String::from),
        result_type: optional_result_type(kvp)?,
    })
}

fn optional_u64(kvp: &KvpMap, keys: &[&str]) -> WfsResult<Option<u64>> {
    keys.iter()
        .find_map(|key| kvp.get_non_empty(key).map(|value| (*key, value)))
        .map(|(key, value)| parse_u64(key, value))
        .transpose()
}

fn optional_result_type(kvp: &KvpMap) -> WfsResult<Option<ResultType>> {
    kvp.get_non_empty("RESULTTYPE")
        .map(str::parse::<ResultType>)
        .transpose()
}
