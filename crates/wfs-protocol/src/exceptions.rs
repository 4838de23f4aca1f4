//! OWS exception reports.

use quick_xml::escape::escape;

use wfs_common::WfsError;

/// Build an OWS 1.1 ExceptionReport document.
pub fn ows_exception_report(code: &str, locator: Option<&str>, text: &str) -> String {
    let locator = locator
        .map(|l| format!(r#" locator="{}""#, escape(l)))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1" version="2.0.0"><ows:Exception exceptionCode="{}"{}><ows:ExceptionText>{}</ows:ExceptionText></ows:Exception></ows:ExceptionReport>"#,
        code,
        locator,
        escape(text)
    )
}

/// Exception report for a service error.
pub fn error_report(err: &WfsError) -> String {
    ows_exception_report(err.ows_exception_code(), err.locator(), &err.to_string())
}
