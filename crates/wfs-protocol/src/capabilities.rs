//! WFS 2.0 capabilities document.
//!
//! Advertises GetFeature, PageResults and the `ImplementsResultPaging`
//! constraint along with the served feature types.

use quick_xml::escape::escape;
use std::fmt::Write;

const OPERATIONS: [&str; 3] = ["GetCapabilities", "GetFeature", "PageResults"];

/// Encode a capabilities document for the given endpoint and feature types.
pub fn encode_capabilities(base_url: &str, type_names: &[String]) -> String {
    let href = escape(base_url);
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><wfs:WFS_Capabilities xmlns:wfs="http://www.opengis.net/wfs/2.0" xmlns:ows="http://www.opengis.net/ows/1.1" xmlns:xlink="http://www.w3.org/1999/xlink" version="2.0.0">"#,
    );

    xml.push_str(
        "<ows:ServiceIdentification><ows:Title>Web Feature Service</ows:Title>\
         <ows:ServiceType>WFS</ows:ServiceType><ows:ServiceTypeVersion>2.0.0</ows:ServiceTypeVersion>\
         </ows:ServiceIdentification>",
    );

    xml.push_str("<ows:OperationsMetadata>");
    for operation in OPERATIONS {
        let _ = write!(
            xml,
            r#"<ows:Operation name="{0}"><ows:DCP><ows:HTTP><ows:Get xlink:href="{1}"/><ows:Post xlink:href="{1}"/></ows:HTTP></ows:DCP></ows:Operation>"#,
            operation, href
        );
    }
    for (constraint, value) in [
        ("ImplementsResultPaging", "TRUE"),
        ("KVPEncoding", "TRUE"),
        ("XMLEncoding", "TRUE"),
    ] {
        let _ = write!(
            xml,
            r#"<ows:Constraint name="{}"><ows:NoValues/><ows:DefaultValue>{}</ows:DefaultValue></ows:Constraint>"#,
            constraint, value
        );
    }
    xml.push_str("</ows:OperationsMetadata>");

    xml.push_str("<wfs:FeatureTypeList>");
    for name in type_names {
        let _ = write!(
            xml,
            "<wfs:FeatureType><wfs:Name>{0}</wfs:Name><wfs:Title>{0}</wfs:Title>\
             <wfs:DefaultCRS>urn:ogc:def:crs:EPSG::4326</wfs:DefaultCRS></wfs:FeatureType>",
            escape(name)
        );
    }
    xml.push_str("</wfs:FeatureTypeList></wfs:WFS_Capabilities>");

    xml
}
