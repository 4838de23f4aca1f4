//! Serialized copy of the request a result set was created from.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use wfs_common::kvp::{RawKvp, POST_REQUEST, RESULT_TYPE_INDEX};
use wfs_common::{KvpMap, WfsError, WfsResult};

/// Everything needed to replay the original query.
///
/// For document (POST) submissions `document` holds the request text and the
/// query is re-read from it; otherwise the query is rebuilt from the two
/// parameter maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequestSnapshot {
    /// Normalized parameters
    pub kvp: KvpMap,
    /// Parameters exactly as received, without side-channel entries
    pub raw_kvp: RawKvp,
    /// Request document for POST submissions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

impl StoredRequestSnapshot {
    /// Capture a request from its parameter maps.
    ///
    /// The `POST_REQUEST` side channel becomes the document; the
    /// `RESULT_TYPE_INDEX` flag is dropped.
    pub fn capture(kvp: &KvpMap, raw: &RawKvp) -> Self {
        let mut raw_kvp = raw.clone();
        let document = raw_kvp.remove(POST_REQUEST);
        raw_kvp.remove(RESULT_TYPE_INDEX);

        let mut kvp = kvp.clone();
        kvp.remove(POST_REQUEST);
        kvp.remove(RESULT_TYPE_INDEX);

        Self {
            kvp,
            raw_kvp,
            document,
        }
    }

    pub fn is_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn to_bytes(&self) -> WfsResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode a stored snapshot. Anything unreadable is reported as corrupt.
    pub fn from_bytes(token: &str, bytes: &[u8]) -> WfsResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| WfsError::CursorCorrupt {
            token: token.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_moves_document_out_of_raw() {
        let mut raw = RawKvp::new();
        raw.insert("service".to_string(), "WFS".to_string());
        raw.insert(POST_REQUEST.to_string(), "<GetFeature/>".to_string());
        raw.insert(RESULT_TYPE_INDEX.to_string(), "true".to_string());

        let snapshot = StoredRequestSnapshot::capture(&KvpMap::from_raw(&raw), &raw);

        assert_eq!(snapshot.document.as_deref(), Some("<GetFeature/>"));
        assert_eq!(snapshot.raw_kvp.len(), 1);
        assert_eq!(snapshot.kvp.get("SERVICE"), Some("WFS"));
        assert!(!snapshot.kvp.contains(POST_REQUEST));
        assert!(!snapshot.kvp.contains(RESULT_TYPE_INDEX));
    }

    #[test]
    fn test_document_text_survives_encoding() {
        let snapshot = StoredRequestSnapshot {
            document: Some("<a x=\"1\">\n  ünïcode &amp; tabs\t</a>".to_string()),
            ..Default::default()
        };

        let bytes = snapshot.to_bytes().unwrap();
        let decoded = StoredRequestSnapshot::from_bytes("t", &bytes).unwrap();
        assert_eq!(decoded.document, snapshot.document);
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(
            StoredRequestSnapshot::from_bytes("t", b"\x00\x01not json"),
            Err(WfsError::CursorCorrupt { .. })
        ));
    }
}
