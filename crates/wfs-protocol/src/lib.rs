//! OGC WFS protocol pieces for resumable result sets.
//!
//! Supports:
//! - GetFeature documents and KVP (WFS 1.1.0 and 2.0.0)
//! - PageResults documents and KVP
//! - Rewriting `resultType="index"` queries into a hits query plus a stored copy
//! - Hits, GML 3.2 and GeoJSON response encoding
//! - A capabilities document advertising result paging

pub mod capabilities;
pub mod exceptions;
pub mod features;
pub mod kvp_reader;
pub mod response;
pub mod rewrite;
mod xml_util;
pub mod xml_reader;

pub use capabilities::encode_capabilities;
pub use exceptions::{error_report, ows_exception_report};
pub use features::{Feature, FeatureResult};
pub use response::{
    encode_geojson, encode_gml, encode_hits, encode_results, inject_result_set_id, InjectOutcome,
};
pub use rewrite::{apply_side_channel, rewrite_document, rewrite_kvp, Rewrite, StoredIndexRequest};
