//! Small helpers over `roxmltree` shared by the three parsers.
//!
//! Capability documents mix namespaces freely (OWS, WMTS, xlink, vendor
//! extensions), so elements are matched on their local name only.

use roxmltree::{Document, Node, ParsingOptions};

use super::CapabilitiesError;

/// Namespace of `xlink:href` attributes.
pub(crate) const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Parses a capabilities document.
///
/// WMS 1.1.x documents usually carry a DOCTYPE, so DTDs are accepted.
pub(crate) fn parse_document(text: &str) -> Result<Document<'_>, CapabilitiesError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options).map_err(|e| CapabilitiesError::Xml(e.to_string()))
}

/// True when `node` is an element with local name `name`.
pub(crate) fn is(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// First child element named `name`.
pub(crate) fn child<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> Option<Node<'a, 'input>> {
    node.children().find(|c| is(c, name))
}

/// All child elements named `name`, in document order.
pub(crate) fn children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |c| is(c, name))
}

/// First element named `name` at any depth below `node` (or `node` itself).
pub(crate) fn descendant<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> Option<Node<'a, 'input>> {
    node.descendants().find(|d| is(d, name))
}

/// All elements named `name` at any depth below `node`, in document order.
pub(crate) fn descendants<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.descendants().filter(move |d| is(d, name))
}

/// Trimmed text of a node, if any.
pub(crate) fn text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim)
}

/// Trimmed text of the first child element named `name`.
pub(crate) fn child_text<'a>(node: Node<'a, '_>, name: &'static str) -> Option<&'a str> {
    child(node, name).and_then(text)
}

/// Parsed text of the first child element named `name`.
pub(crate) fn child_parse<T: std::str::FromStr>(
    node: Node<'_, '_>,
    name: &'static str,
) -> Option<T> {
    child_text(node, name).and_then(|v| v.parse().ok())
}

/// Parsed value of attribute `name`.
pub(crate) fn attribute_parse<T: std::str::FromStr>(node: Node<'_, '_>, name: &str) -> Option<T> {
    node.attribute(name).and_then(|v| v.trim().parse().ok())
}

/// `xlink:href` of a node, falling back to an unqualified `href`.
pub(crate) fn href<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attribute((XLINK_NS, "href"))
        .or_else(|| node.attribute("href"))
}

/// `version` attribute of the first element carrying one.
pub(crate) fn version<'a>(doc: &'a Document<'_>) -> Option<&'a str> {
    doc.descendants()
        .filter(|n| n.is_element())
        .find_map(|n| n.attribute("version"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0"?>
<!DOCTYPE WMT_MS_Capabilities SYSTEM "http://example.com/WMS_MS_Capabilities.dtd">
<Root xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:ows="http://www.opengis.net/ows/1.1">
  <ows:Title> Elevation </ows:Title>
  <Item><Name>a</Name><Size>12</Size></Item>
  <Item><Name>b</Name></Item>
  <Deep><Deeper><Link xlink:href="http://example.com/x"/></Deeper></Deep>
  <Plain href="http://example.com/y"/>
  <Versioned version="1.3.0"/>
</Root>"#;

    #[test]
    fn test_parses_document_with_doctype() {
        assert!(parse_document(DOC).is_ok());
    }

    #[test]
    fn test_rejects_malformed_document() {
        let result = parse_document("<Root><Unclosed></Root>");
        assert!(matches!(result, Err(CapabilitiesError::Xml(_))));
    }

    #[test]
    fn test_local_name_matching_ignores_prefix() {
        let doc = parse_document(DOC).unwrap();
        assert_eq!(child_text(doc.root_element(), "Title"), Some("Elevation"));
    }

    #[test]
    fn test_children_in_document_order() {
        let doc = parse_document(DOC).unwrap();
        let names: Vec<_> = children(doc.root_element(), "Item")
            .filter_map(|item| child_text(item, "Name"))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_child_parse() {
        let doc = parse_document(DOC).unwrap();
        let item = child(doc.root_element(), "Item").unwrap();
        assert_eq!(child_parse::<u32>(item, "Size"), Some(12));
        assert_eq!(child_parse::<u32>(item, "Name"), None);
    }

    #[test]
    fn test_href_namespaced_and_plain() {
        let doc = parse_document(DOC).unwrap();
        let link = descendant(doc.root_element(), "Link").unwrap();
        let plain = descendant(doc.root_element(), "Plain").unwrap();
        assert_eq!(href(link), Some("http://example.com/x"));
        assert_eq!(href(plain), Some("http://example.com/y"));
    }

    #[test]
    fn test_version_attribute() {
        let doc = parse_document(DOC).unwrap();
        assert_eq!(version(&doc), Some("1.3.0"));
    }
}
