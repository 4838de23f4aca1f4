//! XML (POST body) request reader.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use wfs_common::request::{parse_u64, split_list, DEFAULT_VERSION};
use wfs_common::{GetFeatureRequest, PageResultsRequest, ResultType, WfsError, WfsRequest, WfsResult};

use crate::xml_util::{find_attr, local_attributes, xml_error};

/// Parse a WFS request document.
pub fn read_request(xml: &str) -> WfsResult<WfsRequest> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => return read_root(&mut reader, &e, false),
            Event::Empty(e) => return read_root(&mut reader, &e, true),
            Event::Eof => return Err(WfsError::XmlParse("document has no root element".to_string())),
            _ => {}
        }
    }
}

fn read_root(reader: &mut Reader<&[u8]>, root: &BytesStart<'_>, empty: bool) -> WfsResult<WfsRequest> {
    let attrs = local_attributes(root)?;

    match root.local_name().as_ref() {
        b"GetFeature" => {
            let mut request = get_feature_from_attributes(&attrs)?;
            if !empty {
                read_queries(reader, &mut request)?;
            }
            if request.type_names.is_empty() {
                return Err(WfsError::MissingParameter("typeNames".to_string()));
            }
            Ok(WfsRequest::GetFeature(request))
        }
        b"PageResults" => page_results_from_attributes(&attrs).map(WfsRequest::PageResults),
        b"GetCapabilities" => Ok(WfsRequest::GetCapabilities {
            version: find_attr(&attrs, "version").map(String::from),
        }),
        other => Err(WfsError::OperationNotSupported(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn get_feature_from_attributes(attrs: &[(String, String)]) -> WfsResult<GetFeatureRequest> {
    let mut request = GetFeatureRequest::new(Vec::new());
    request.version = find_attr(attrs, "version")
        .unwrap_or(DEFAULT_VERSION)
        .to_string();

    if let Some(value) = find_attr(attrs, "resultType") {
        request.result_type = value.parse()?;
    }
    if let Some(value) = find_attr(attrs, "startIndex") {
        request.start_index = Some(parse_u64("startIndex", value)?);
    }
    // WFS 1.1 spells the page size maxFeatures
    if let Some(value) = find_attr(attrs, "count").or_else(|| find_attr(attrs, "maxFeatures")) {
        request.count = Some(parse_u64("count", value)?);
    }
    request.output_format = find_attr(attrs, "outputFormat").map(String::from);

    Ok(request)
}

fn page_results_from_attributes(attrs: &[(String, String)]) -> WfsResult<PageResultsRequest> {
    let result_set_id = find_attr(attrs, "resultSetID")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WfsError::MissingParameter("resultSetID".to_string()))?;

    Ok(PageResultsRequest {
        result_set_id: result_set_id.to_string(),
        start_index: find_attr(attrs, "startIndex")
            .map(|v| parse_u64("startIndex", v))
            .transpose()?,
        count: find_attr(attrs, "count")
            .map(|v| parse_u64("count", v))
            .transpose()?,
        output_format: find_attr(attrs, "outputFormat").map(String::from),
        result_type: find_attr(attrs, "resultType")
            .map(str::parse::<ResultType>)
            .transpose()?,
    })
}

/// Collect type names and property names from the `Query` children.
fn read_queries(reader: &mut Reader<&[u8]>, request: &mut GetFeatureRequest) -> WfsResult<()> {
    let mut depth = 1usize;
    let mut in_property = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"Query" => add_type_names(&e, request)?,
                    b"PropertyName" | b"ValueReference" => in_property = true,
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"Query" {
                    add_type_names(&e, request)?;
                }
            }
            Event::Text(t) if in_property => {
                let name = t.unescape().map_err(xml_error)?;
                if !name.trim().is_empty() {
                    request.property_names.push(name.trim().to_string());
                }
            }
            Event::End(_) => {
                in_property = false;
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(WfsError::XmlParse("unexpected end of document".to_string()))
            }
            _ => {}
        }
    }
}

fn add_type_names(query: &BytesStart<'_>, request: &mut GetFeatureRequest) -> WfsResult<()> {
    let attrs = local_attributes(query)?;
    if let Some(names) = find_attr(&attrs, "typeNames").or_else(|| find_attr(&attrs, "typeName")) {
        // Both separators appear in the wild
        for name in split_list(&names.replace(char::is_whitespace, ",")) {
            if !request.type_names.contains(&name) {
                request.type_names.push(name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_wfs2_get_feature() {
        let xml = r#"<?xml version="1.0"?>
<wfs:GetFeature service="WFS" version="2.0.0" resultType="index" count="5" startIndex="10"
    xmlns:wfs="http://www.opengis.net/wfs/2.0" xmlns:fes="http://www.opengis.net/fes/2.0">
  <wfs:Query typeNames="topp:states">
    <fes:ValueReference>STATE_NAME</fes:ValueReference>
  </wfs:Query>
</wfs:GetFeature>"#;

        let WfsRequest::GetFeature(request) = read_request(xml).unwrap() else {
            panic!("expected GetFeature");
        };
        assert_eq!(request.version, "2.0.0");
        assert_eq!(request.type_names, vec!["topp:states"]);
        assert_eq!(request.property_names, vec!["STATE_NAME"]);
        assert_eq!(request.result_type, ResultType::Index);
        assert_eq!(request.count, Some(5));
        assert_eq!(request.start_index, Some(10));
    }

    #[test]
    fn test_read_wfs11_max_features() {
        let xml = r#"<wfs:GetFeature service="WFS" version="1.1.0" maxFeatures="3"
    xmlns:wfs="http://www.opengis.net/wfs"><wfs:Query typeName="roads"/></wfs:GetFeature>"#;

        let WfsRequest::GetFeature(request) = read_request(xml).unwrap() else {
            panic!("expected GetFeature");
        };
        assert_eq!(request.version, "1.1.0");
        assert_eq!(request.count, Some(3));
        assert_eq!(request.type_names, vec!["roads"]);
        assert_eq!(request.result_type, ResultType::Results);
    }

    #[test]
    fn test_read_page_results() {
        let xml = r#"<wfs:PageResults xmlns:wfs="http://www.opengis.net/wfs/2.0"
    resultSetID="0123456789abcdef0123456789abcdef" count="25"/>"#;

        let WfsRequest::PageResults(request) = read_request(xml).unwrap() else {
            panic!("expected PageResults");
        };
        assert_eq!(request.result_set_id, "0123456789abcdef0123456789abcdef");
        assert_eq!(request.count, Some(25));
        assert_eq!(request.start_index, None);
    }

    #[test]
    fn test_get_feature_without_query_is_rejected() {
        let xml = r#"<GetFeature service="WFS" version="2.0.0"/>"#;
        assert!(matches!(
            read_request(xml),
            Err(WfsError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_unknown_root_is_not_supported() {
        let xml = r#"<Transaction service="WFS"/>"#;
        assert!(matches!(
            read_request(xml),
            Err(WfsError::OperationNotSupported(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(read_request("not xml at all"), Err(WfsError::XmlParse(_))));
    }
}
