//! Placemark scanning over a parsed KML tree.
//!
//! KML `description` and `Data/value` fields hold free-form HTML, so image
//! references are pulled out with [`extract_references`] rather than by
//! walking a nested HTML structure.

use roxmltree::{Document, Node};

use crate::file_name::MARKER_PREFIX;
use crate::references::extract_references;

/// `Data` element name that carries photo markup inside `ExtendedData`
const PICTURES_FIELD: &str = "pictures";

/// One placemark that passed the name filter, with its raw image references
/// in order: description first, then `ExtendedData` pictures.
#[derive(Debug, Clone)]
pub struct ScannedPlacemark<'a, 'input> {
    pub name: String,
    pub references: Vec<String>,
    pub node: Node<'a, 'input>,
}

/// Parse KML text. DTDs are tolerated since some exporters emit them.
pub fn parse_kml(text: &str) -> Result<Document<'_>, roxmltree::Error> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
}

/// Collect every named `Placemark` in document order.
///
/// Placemarks without a `name` child are skipped. With `filter_to_marked`,
/// only names starting with the marker prefix are kept.
pub fn scan<'a, 'input>(doc: &'a Document<'input>, filter_to_marked: bool) -> Vec<ScannedPlacemark<'a, 'input>> {
    let mut placemarks = Vec::new();

    for node in doc.descendants().filter(|n| n.has_tag_name("Placemark")) {
        let Some(name_node) = child_element(node, "name") else {
            continue;
        };
        let name = text_content(name_node).trim().to_string();

        if filter_to_marked && !name.starts_with(MARKER_PREFIX) {
            continue;
        }

        let mut references = Vec::new();

        if let Some(description) = child_element(node, "description") {
            references.extend(extract_references(&markup_payload(description)));
        }

        for extended in node.children().filter(|n| n.has_tag_name("ExtendedData")) {
            let pictures = extended
                .descendants()
                .filter(|n| n.has_tag_name("Data") && n.attribute("name") == Some(PICTURES_FIELD));
            for data in pictures {
                if let Some(value) = child_element(data, "value") {
                    references.extend(extract_references(&markup_payload(value)));
                }
            }
        }

        placemarks.push(ScannedPlacemark { name, references, node });
    }

    placemarks
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

/// Concatenated text of all descendant text and CDATA nodes.
fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Text to scan for image references.
///
/// Text-only fields (plain, entity-escaped or CDATA-wrapped HTML) are scanned
/// decoded. Fields with real child elements are scanned as their source markup.
fn markup_payload(node: Node) -> String {
    if node.children().any(|n| n.is_element()) {
        inner_markup(node).to_string()
    } else {
        text_content(node)
    }
}

/// Source text between an element's start and end tags.
fn inner_markup<'input>(node: Node<'_, 'input>) -> &'input str {
    let raw = &node.document().input_text()[node.range()];
    let Some(open_end) = start_tag_end(raw) else {
        return "";
    };
    if raw[..open_end].ends_with("/>") {
        return "";
    }
    match raw.rfind("</") {
        Some(close_start) if close_start >= open_end => &raw[open_end..close_start],
        _ => "",
    }
}

/// Byte offset just past the `>` closing the start tag, skipping quoted
/// attribute values.
fn start_tag_end(raw: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in raw.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '>' => return Some(i + 1),
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Survey</name>
    <Folder>
      <Placemark>
        <name> ?-Pole 12 </name>
        <description><![CDATA[<p>Pole</p><img src="pole12.jpg">]]></description>
        <Point><coordinates>106.8,-6.2,0</coordinates></Point>
      </Placemark>
      <Placemark>
        <name>Other</name>
        <description>&lt;img src="other.jpg"&gt;</description>
      </Placemark>
      <Placemark>
        <description><![CDATA[<img src="orphan.jpg">]]></description>
      </Placemark>
      <Placemark>
        <name>?-Roof</name>
        <ExtendedData>
          <Data name="notes"><value>&lt;img src="ignored.jpg"&gt;</value></Data>
          <Data name="pictures"><value>data:image/png;base64,QUJD</value></Data>
        </ExtendedData>
      </Placemark>
    </Folder>
  </Document>
</kml>"#;

    #[test]
    fn test_scan_filtered() {
        let doc = parse_kml(KML).unwrap();
        let placemarks = scan(&doc, true);

        let names: Vec<&str> = placemarks.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["?-Pole 12", "?-Roof"]);
        assert_eq!(placemarks[0].references, vec!["pole12.jpg"]);
        assert_eq!(placemarks[1].references, vec!["data:image/png;base64,QUJD"]);
        assert!(placemarks[0].node.has_tag_name("Placemark"));
    }

    #[test]
    fn test_scan_all_skips_unnamed() {
        let doc = parse_kml(KML).unwrap();
        let placemarks = scan(&doc, false);

        let names: Vec<&str> = placemarks.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["?-Pole 12", "Other", "?-Roof"]);
        // Entity-escaped HTML is scanned after decoding
        assert_eq!(placemarks[1].references, vec!["other.jpg"]);
    }

    #[test]
    fn test_description_then_pictures_order() {
        let kml = r#"<kml><Placemark><name>x</name>
            <ExtendedData><Data name="pictures"><value><![CDATA[<img src="b.jpg">]]></value></Data></ExtendedData>
            <description><![CDATA[<img src="a.jpg">]]></description>
        </Placemark></kml>"#;
        let doc = parse_kml(kml).unwrap();
        let placemarks = scan(&doc, false);
        assert_eq!(placemarks[0].references, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_description_with_element_children() {
        let kml = r#"<kml><Placemark><name>x</name>
            <description>Photo <img class="thumb" src="inline.jpg"/> here</description>
        </Placemark></kml>"#;
        let doc = parse_kml(kml).unwrap();
        let placemarks = scan(&doc, false);
        assert_eq!(placemarks[0].references, vec!["inline.jpg"]);
    }

    #[test]
    fn test_placemark_without_references() {
        let doc = parse_kml("<kml><Placemark><name>?-Empty</name></Placemark></kml>").unwrap();
        let placemarks = scan(&doc, true);
        assert_eq!(placemarks.len(), 1);
        assert!(placemarks[0].references.is_empty());
    }

    #[test]
    fn test_inner_markup() {
        let doc = parse_kml(r#"<a><b x="1>2"><c/>text</b><d/></a>"#).unwrap();
        let b = doc.descendants().find(|n| n.has_tag_name("b")).unwrap();
        assert_eq!(inner_markup(b), "<c/>text");
        let d = doc.descendants().find(|n| n.has_tag_name("d")).unwrap();
        assert_eq!(inner_markup(d), "");
    }

    #[test]
    fn test_parse_error() {
        assert!(parse_kml("<kml><Placemark></kml>").is_err());
    }
}
