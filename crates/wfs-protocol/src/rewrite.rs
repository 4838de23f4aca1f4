//! Rewriting of `resultType=index` queries.
//!
//! An index query is answered in two phases. The request executed right away
//! is a hits query, and a copy asking for full results is stored so that later
//! PageResults requests can replay it. Neither the public request grammar nor
//! the document the client sent is otherwise changed.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use wfs_common::kvp::{RawKvp, POST_REQUEST, RESULT_TYPE_INDEX};
use wfs_common::{GetFeatureRequest, KvpMap, ResultType, WfsError, WfsRequest, WfsResult};

use crate::xml_util::{attribute_value_range, tag_content_start, xml_error};
use crate::{kvp_reader, xml_reader};

/// The stored form of an index query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredIndexRequest {
    /// The client's document with `resultType="results"`.
    Document(String),
    /// The client's parameters with `RESULTTYPE=results`.
    Kvp(KvpMap),
}

/// Outcome of inspecting an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Not an index query; execute as parsed.
    Unchanged(WfsRequest),
    /// An index query split into the hits query to run now and the stored copy.
    Index {
        executed: GetFeatureRequest,
        stored: StoredIndexRequest,
    },
}

/// Inspect a request document and rewrite it if it asks for `resultType="index"`.
pub fn rewrite_document(xml: &str) -> WfsResult<Rewrite> {
    match xml_reader::read_request(xml)? {
        WfsRequest::GetFeature(request) if request.result_type == ResultType::Index => {
            let stored = set_root_result_type(xml, ResultType::Results)?;
            debug!(type_names = ?request.type_names, "Rewrote index query document");
            Ok(Rewrite::Index {
                executed: request.with_result_type(ResultType::Hits),
                stored: StoredIndexRequest::Document(stored),
            })
        }
        other => Ok(Rewrite::Unchanged(other)),
    }
}

/// KVP counterpart of [`rewrite_document`].
pub fn rewrite_kvp(kvp: &KvpMap) -> WfsResult<Rewrite> {
    match kvp_reader::read_request(kvp)? {
        WfsRequest::GetFeature(request) if request.result_type == ResultType::Index => {
            let mut stored = kvp.clone();
            stored.insert("RESULTTYPE", ResultType::Results.as_str());
            debug!(type_names = ?request.type_names, "Rewrote index query parameters");
            Ok(Rewrite::Index {
                executed: request.with_result_type(ResultType::Hits),
                stored: StoredIndexRequest::Kvp(stored),
            })
        }
        other => Ok(Rewrite::Unchanged(other)),
    }
}

/// Record the stored copy of an index query in the request's parameter maps.
///
/// Documents go into the raw map under `POST_REQUEST`; KVP copies replace the
/// parsed map. Both set the `RESULT_TYPE_INDEX` flag.
pub fn apply_side_channel(stored: StoredIndexRequest, kvp: &mut KvpMap, raw: &mut RawKvp) {
    match stored {
        StoredIndexRequest::Document(document) => {
            raw.insert(POST_REQUEST.to_string(), document);
        }
        StoredIndexRequest::Kvp(stored_kvp) => {
            *kvp = stored_kvp;
        }
    }
    raw.insert(RESULT_TYPE_INDEX.to_string(), "true".to_string());
}

/// Replace the value of the root element's `resultType` attribute.
///
/// Only the attribute value changes; every other byte of the document is kept.
pub fn set_root_result_type(xml: &str, result_type: ResultType) -> WfsResult<String> {
    let mut reader = Reader::from_str(xml);

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        let root = match &event {
            Event::Start(e) | Event::Empty(e) => e,
            Event::Eof => {
                return Err(WfsError::XmlParse("document has no root element".to_string()))
            }
            _ => continue,
        };

        let end = reader.buffer_position();
        let content_start = tag_content_start(xml, end, root)
            .ok_or_else(|| WfsError::XmlParse("cannot locate root element".to_string()))?;
        let tag = &xml[content_start..content_start + root.len()];
        let value = attribute_value_range(tag, "resultType").ok_or_else(|| {
            WfsError::MissingParameter("resultType".to_string())
        })?;

        let mut rewritten = String::with_capacity(xml.len());
        rewritten.push_str(&xml[..content_start + value.start]);
        rewritten.push_str(result_type.as_str());
        rewritten.push_str(&xml[content_start + value.end..]);
        return Ok(rewritten);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- client comment -->
<wfs:GetFeature service="WFS" version="2.0.0" resultType="index" count="5"
    xmlns:wfs="http://www.opengis.net/wfs/2.0">
  <wfs:Query typeNames="topp:states"/>
</wfs:GetFeature>"#;

    #[test]
    fn test_index_document_is_split() {
        let Rewrite::Index { executed, stored } = rewrite_document(INDEX_DOC).unwrap() else {
            panic!("expected index rewrite");
        };

        assert_eq!(executed.result_type, ResultType::Hits);
        assert_eq!(executed.count, Some(5));
        assert_eq!(executed.type_names, vec!["topp:states"]);

        let StoredIndexRequest::Document(document) = stored else {
            panic!("expected stored document");
        };
        assert_eq!(document, INDEX_DOC.replace(r#"resultType="index""#, r#"resultType="results""#));
    }

    #[test]
    fn test_stored_document_reparses_as_results() {
        let Rewrite::Index { stored: StoredIndexRequest::Document(document), .. } =
            rewrite_document(INDEX_DOC).unwrap()
        else {
            panic!("expected stored document");
        };

        let WfsRequest::GetFeature(request) = xml_reader::read_request(&document).unwrap() else {
            panic!("expected GetFeature");
        };
        assert_eq!(request.result_type, ResultType::Results);
        assert_eq!(request.count, Some(5));
    }

    #[test]
    fn test_non_index_documents_pass_through() {
        let doc = INDEX_DOC.replace("index", "hits");
        let Rewrite::Unchanged(WfsRequest::GetFeature(request)) = rewrite_document(&doc).unwrap()
        else {
            panic!("expected unchanged GetFeature");
        };
        assert_eq!(request.result_type, ResultType::Hits);
    }

    #[test]
    fn test_single_quoted_attribute() {
        let doc = r#"<GetFeature resultType='index' service='WFS'><Query typeName='roads'/></GetFeature>"#;
        let rewritten = set_root_result_type(doc, ResultType::Hits).unwrap();
        assert_eq!(
            rewritten,
            r#"<GetFeature resultType='hits' service='WFS'><Query typeName='roads'/></GetFeature>"#
        );
    }

    #[test]
    fn test_kvp_index_rewrite() {
        let kvp: KvpMap = [
            ("REQUEST", "GetFeature"),
            ("TYPENAMES", "roads"),
            ("RESULTTYPE", "index"),
        ]
        .into_iter()
        .collect();

        let Rewrite::Index { executed, stored: StoredIndexRequest::Kvp(stored) } =
            rewrite_kvp(&kvp).unwrap()
        else {
            panic!("expected kvp index rewrite");
        };
        assert_eq!(executed.result_type, ResultType::Hits);
        assert_eq!(stored.get("RESULTTYPE"), Some("results"));
        assert_eq!(stored.get("TYPENAMES"), Some("roads"));
    }

    #[test]
    fn test_side_channel_for_documents() {
        let mut kvp = KvpMap::new();
        let mut raw = RawKvp::new();
        apply_side_channel(
            StoredIndexRequest::Document("<GetFeature/>".to_string()),
            &mut kvp,
            &mut raw,
        );

        assert_eq!(raw.get(POST_REQUEST).map(String::as_str), Some("<GetFeature/>"));
        assert_eq!(raw.get(RESULT_TYPE_INDEX).map(String::as_str), Some("true"));
        assert!(kvp.is_empty());
    }
}
