//! Response document encoding.
//!
//! Only what the paging protocol needs: hits collections, a minimal GML 3.2
//! feature collection, GeoJSON, and stamping a result set token onto a hits
//! document.

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{json, Value};
use std::fmt::Write;
use tracing::warn;

use wfs_common::{GetFeatureRequest, WfsError, WfsResult};

use crate::features::FeatureResult;
use crate::xml_util::{attribute_value_range, element_name_len, tag_content_start, xml_error};

const WFS_20_NS: &str = "http://www.opengis.net/wfs/2.0";
const WFS_11_NS: &str = "http://www.opengis.net/wfs";
const GML_32_NS: &str = "http://www.opengis.net/gml/3.2";

/// Content type of GML 3.2 responses.
pub const GML_32_CONTENT_TYPE: &str = "application/gml+xml; version=3.2";

/// Content type of GeoJSON responses.
pub const GEOJSON_CONTENT_TYPE: &str = "application/json";

/// Attribute carrying the result set token on a hits response.
pub const RESULT_SET_ID_ATTR: &str = "resultSetID";

fn timestamp_str(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Encode a hits-only feature collection.
pub fn encode_hits(request: &GetFeatureRequest, number_matched: u64, timestamp: DateTime<Utc>) -> String {
    if request.is_wfs2() {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><wfs:FeatureCollection xmlns:wfs="{}" xmlns:gml="{}" numberMatched="{}" numberReturned="0" timeStamp="{}"/>"#,
            WFS_20_NS,
            GML_32_NS,
            number_matched,
            timestamp_str(timestamp)
        )
    } else {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><wfs:FeatureCollection xmlns:wfs="{}" numberOfFeatures="{}" timeStamp="{}"/>"#,
            WFS_11_NS,
            number_matched,
            timestamp_str(timestamp)
        )
    }
}

/// Encode a page of features in the requested output format.
///
/// Returns the document and its content type.
pub fn encode_results(
    result: &FeatureResult,
    request: &GetFeatureRequest,
    timestamp: DateTime<Utc>,
) -> WfsResult<(String, &'static str)> {
    let format = request.effective_output_format().to_lowercase();
    if format.contains("json") {
        Ok((encode_geojson(result, timestamp), GEOJSON_CONTENT_TYPE))
    } else if format.contains("gml") || format.contains("xml") {
        Ok((encode_gml(result, timestamp), GML_32_CONTENT_TYPE))
    } else {
        Err(WfsError::UnsupportedFormat(request.effective_output_format().to_string()))
    }
}

/// Encode a page of features as a GML 3.2 feature collection.
pub fn encode_gml(result: &FeatureResult, timestamp: DateTime<Utc>) -> String {
    let element = xml_name(local_part(&result.type_name));
    let mut xml = String::new();

    let _ = write!(
        xml,
        r#"<?xml version="1.0" encoding="UTF-8"?><wfs:FeatureCollection xmlns:wfs="{}" xmlns:gml="{}" numberMatched="{}" numberReturned="{}" timeStamp="{}""#,
        WFS_20_NS,
        GML_32_NS,
        result.number_matched,
        result.number_returned(),
        timestamp_str(timestamp)
    );
    if let Some(next) = &result.next {
        let _ = write!(xml, r#" next="{}""#, escape(next));
    }
    if let Some(previous) = &result.previous {
        let _ = write!(xml, r#" previous="{}""#, escape(previous));
    }
    xml.push('>');

    for feature in &result.features {
        let _ = write!(
            xml,
            r#"<wfs:member><{} gml:id="{}.{}">"#,
            element,
            element,
            escape(&feature.id)
        );
        for (key, value) in &feature.properties {
            let name = xml_name(key);
            match value {
                Value::Null => {}
                Value::String(s) => {
                    let _ = write!(xml, "<{0}>{1}</{0}>", name, escape(s));
                }
                other => {
                    let _ = write!(xml, "<{0}>{1}</{0}>", name, escape(&other.to_string()));
                }
            }
        }
        if let Some(gml) = feature.geometry.as_ref().and_then(geometry_to_gml) {
            let _ = write!(xml, "<geometry>{}</geometry>", gml);
        }
        let _ = write!(xml, "</{}></wfs:member>", element);
    }

    xml.push_str("</wfs:FeatureCollection>");
    xml
}

/// Encode a page of features as a GeoJSON feature collection.
pub fn encode_geojson(result: &FeatureResult, timestamp: DateTime<Utc>) -> String {
    let features: Vec<Value> = result
        .features
        .iter()
        .map(|f| {
            json!({
                "type": "Feature",
                "id": f.id,
                "geometry": f.geometry,
                "properties": f.properties,
            })
        })
        .collect();

    let mut links = Vec::new();
    if let Some(next) = &result.next {
        links.push(json!({ "rel": "next", "href": next }));
    }
    if let Some(previous) = &result.previous {
        links.push(json!({ "rel": "previous", "href": previous }));
    }

    json!({
        "type": "FeatureCollection",
        "numberMatched": result.number_matched,
        "numberReturned": result.number_returned(),
        "timeStamp": timestamp_str(timestamp),
        "features": features,
        "links": links,
    })
    .to_string()
}

/// Result of stamping a token onto a hits document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectOutcome {
    /// The document now carries the token.
    Injected(String),
    /// The document did not have exactly one collection element and is unchanged.
    Skipped { document: String, collections: usize },
}

impl InjectOutcome {
    pub fn into_document(self) -> String {
        match self {
            InjectOutcome::Injected(document) => document,
            InjectOutcome::Skipped { document, .. } => document,
        }
    }
}

/// Set `resultSetID` on the single `FeatureCollection` element of a document.
///
/// Zero or several collection elements leave the document untouched; that is
/// logged, not treated as an error.
pub fn inject_result_set_id(xml: &str, token: &str) -> WfsResult<InjectOutcome> {
    let mut reader = Reader::from_str(xml);
    let mut collections = Vec::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"FeatureCollection" => {
                let end = reader.buffer_position();
                let start = tag_content_start(xml, end, &e).ok_or_else(|| {
                    WfsError::XmlParse("cannot locate FeatureCollection element".to_string())
                })?;
                collections.push(start..start + e.len());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if collections.len() != 1 {
        warn!(
            collections = collections.len(),
            token = %token,
            "Expected exactly one FeatureCollection, not adding resultSetID"
        );
        return Ok(InjectOutcome::Skipped {
            document: xml.to_string(),
            collections: collections.len(),
        });
    }

    let tag_range = collections.remove(0);
    let tag = &xml[tag_range.clone()];
    let token = escape(token);
    let mut stamped = String::with_capacity(xml.len() + token.len() + 16);

    match attribute_value_range(tag, RESULT_SET_ID_ATTR) {
        Some(value) => {
            stamped.push_str(&xml[..tag_range.start + value.start]);
            stamped.push_str(&token);
            stamped.push_str(&xml[tag_range.start + value.end..]);
        }
        None => {
            let insert_at = tag_range.start + element_name_len(tag);
            stamped.push_str(&xml[..insert_at]);
            let _ = write!(stamped, r#" {}="{}""#, RESULT_SET_ID_ATTR, token);
            stamped.push_str(&xml[insert_at..]);
        }
    }

    Ok(InjectOutcome::Injected(stamped))
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Make a property or type name usable as an unprefixed XML element name.
fn xml_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' { c } else { '_' })
        .collect();
    if !out.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        out.insert(0, '_');
    }
    out
}

fn position(coord: &Value) -> Option<String> {
    let coord = coord.as_array()?;
    let parts: Option<Vec<String>> = coord.iter().map(|v| v.as_f64().map(|f| f.to_string())).collect();
    let parts = parts?;
    if parts.len() < 2 {
        return None;
    }
    Some(parts.join(" "))
}

fn pos_list(coords: &Value) -> Option<String> {
    let positions: Option<Vec<String>> = coords.as_array()?.iter().map(position).collect();
    Some(positions?.join(" "))
}

fn polygon_gml(rings: &Value) -> Option<String> {
    let rings = rings.as_array()?;
    let (exterior, interiors) = rings.split_first()?;
    let mut gml = format!(
        "<gml:Polygon><gml:exterior><gml:LinearRing><gml:posList>{}</gml:posList></gml:LinearRing></gml:exterior>",
        pos_list(exterior)?
    );
    for ring in interiors {
        let _ = write!(
            gml,
            "<gml:interior><gml:LinearRing><gml:posList>{}</gml:posList></gml:LinearRing></gml:interior>",
            pos_list(ring)?
        );
    }
    gml.push_str("</gml:Polygon>");
    Some(gml)
}

/// GeoJSON geometry to GML 3.2. Only simple geometries are supported.
fn geometry_to_gml(geometry: &Value) -> Option<String> {
    let coords = geometry.get("coordinates")?;
    match geometry.get("type")?.as_str()? {
        "Point" => Some(format!("<gml:Point><gml:pos>{}</gml:pos></gml:Point>", position(coords)?)),
        "LineString" => Some(format!(
            "<gml:LineString><gml:posList>{}</gml:posList></gml:LineString>",
            pos_list(coords)?
        )),
        "Polygon" => polygon_gml(coords),
        _ => None,
    }
}
