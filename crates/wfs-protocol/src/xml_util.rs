//! Small helpers over quick-xml events shared by the readers and rewriters.

use quick_xml::events::BytesStart;
use std::ops::Range;

use wfs_common::{WfsError, WfsResult};

pub(crate) fn xml_error(err: impl std::fmt::Display) -> WfsError {
    WfsError::XmlParse(err.to_string())
}

/// Attributes of an element keyed by local name (namespace prefixes dropped).
pub(crate) fn local_attributes(e: &BytesStart<'_>) -> WfsResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

pub(crate) fn find_attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Byte offset in `xml` where the content of a start tag begins (just past `<`).
///
/// `end` is the reader position right after the tag and `content` the raw
/// bytes quick-xml reported for it.
pub(crate) fn tag_content_start(xml: &str, end: usize, content: &[u8]) -> Option<usize> {
    let content = std::str::from_utf8(content).ok()?;
    xml.get(..end)?.rfind(content)
}

/// Length of the element name at the start of raw tag content.
pub(crate) fn element_name_len(tag: &str) -> usize {
    tag.find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(tag.len())
}

/// Range of an attribute's value (between the quotes) inside raw tag content.
///
/// The attribute is matched on its local name, ignoring ASCII case as
/// [`find_attr`] does, so `wfs:resultType` and `resulttype` both match
/// `resultType`.
pub(crate) fn attribute_value_range(tag: &str, local: &str) -> Option<Range<usize>> {
    let bytes = tag.as_bytes();
    let mut i = element_name_len(tag);

    loop {
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] == b'/' {
            return None;
        }

        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !(bytes[i] as char).is_whitespace() {
            i += 1;
        }
        let name = &tag[name_start..i];

        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            return None;
        }
        i += 1;
        while i < bytes.len() && (bytes[i] as char).is_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || (bytes[i] != b'"' && bytes[i] != b'\'') {
            return None;
        }

        let quote = bytes[i];
        let value_start = i + 1;
        let value_end = value_start + bytes[value_start..].iter().position(|b| *b == quote)?;

        let local_name = name.rsplit(':').next().unwrap_or(name);
        if local_name.eq_ignore_ascii_case(local) && !name.starts_with("xmlns") {
            return Some(value_start..value_end);
        }
        i = value_end + 1;
    }
}
