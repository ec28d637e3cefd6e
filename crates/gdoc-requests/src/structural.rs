//! Structural requests: headers, footers, tabs, footnote references.
//!
//! Also home to the request-classification helpers the push orchestrator
//! uses to split the walker's output into dependent batches.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use gdoc_diff::{ChangeNode, ChangeOp};
use gdoc_model::{xml, SegmentType};

use crate::walker::SegmentContext;

/// Generates requests for structural changes.
pub struct StructuralGenerator;

impl StructuralGenerator {
    /// Document tab add/delete.
    pub fn emit_tab(&self, node: &ChangeNode) -> Vec<Value> {
        match node.op {
            ChangeOp::Added => {
                let mut tab_properties = Map::new();
                if let Some(after_xml) = node.after_xml.as_deref() {
                    if let Ok(elem) = xml::parse(after_xml) {
                        if let Some(title) = elem.attr("title") {
                            tab_properties.insert("title".to_string(), json!(title));
                        }
                    }
                }
                vec![json!({
                    "addDocumentTab": { "tabProperties": Value::Object(tab_properties) }
                })]
            }
            ChangeOp::Deleted if !node.node_id.is_empty() => {
                vec![json!({ "deleteTab": { "tabId": node.node_id } })]
            }
            _ => Vec::new(),
        }
    }

    /// Header/footer add/delete on the given tab.
    pub fn emit_header_footer(&self, node: &ChangeNode, tab_id: &str) -> Vec<Value> {
        let Some(segment_type) = node.segment_type() else {
            return Vec::new();
        };

        match node.op {
            ChangeOp::Added => {
                let kind = match segment_type {
                    SegmentType::Header => "createHeader",
                    SegmentType::Footer => "createFooter",
                    _ => return Vec::new(),
                };
                let mut body = Map::new();
                body.insert("type".to_string(), json!("DEFAULT"));
                if !tab_id.is_empty() {
                    // The initial section break anchors the new header/footer
                    // to its tab.
                    body.insert(
                        "sectionBreakLocation".to_string(),
                        json!({ "index": 0, "tabId": tab_id }),
                    );
                }
                vec![json!({ kind: Value::Object(body) })]
            }
            ChangeOp::Deleted => {
                let segment_id = node
                    .segment_id()
                    .filter(|id| !id.is_empty())
                    .unwrap_or(node.node_id.as_str());
                if segment_id.is_empty() {
                    return Vec::new();
                }
                let (kind, id_field) = match segment_type {
                    SegmentType::Header => ("deleteHeader", "headerId"),
                    SegmentType::Footer => ("deleteFooter", "footerId"),
                    _ => return Vec::new(),
                };
                let mut body = Map::new();
                body.insert(id_field.to_string(), json!(segment_id));
                if !tab_id.is_empty() {
                    body.insert("tabId".to_string(), json!(tab_id));
                }
                vec![json!({ kind: Value::Object(body) })]
            }
            _ => Vec::new(),
        }
    }

    /// Delete the 1-unit reference character of a removed footnote.
    ///
    /// The reference position is found by scanning the content block's
    /// pristine XML: visible text plus one newline per closed paragraph
    /// before the `<footnote>` tag.
    pub fn emit_footnote_reference_delete(
        &self,
        node: &ChangeNode,
        content_xml: Option<&str>,
        base_index: usize,
        ctx: &SegmentContext,
    ) -> Vec<Value> {
        if node.op != ChangeOp::Deleted {
            return Vec::new();
        }
        let index = footnote_reference_index(content_xml, &node.node_id, base_index);
        if index == 0 {
            return Vec::new();
        }
        vec![json!({
            "deleteContentRange": { "range": ctx.range(index, index + 1) }
        })]
    }
}

/// UTF-16 position of a footnote reference within a content block.
/// Returns 0 when the reference cannot be located.
fn footnote_reference_index(content_xml: Option<&str>, footnote_id: &str, base_index: usize) -> usize {
    let Some(content_xml) = content_xml else {
        return 0;
    };

    let needle_pos = find_footnote_tag(content_xml, footnote_id);
    let Some(tag_start) = needle_pos else {
        return 0;
    };

    let before = &content_xml[..tag_start];

    // Count visible (non-tag) UTF-16 units before the reference.
    let mut text_length = 0usize;
    let mut in_tag = false;
    for ch in before.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text_length += ch.len_utf16(),
            _ => {}
        }
    }

    // Each closed paragraph before the reference contributed a newline.
    for tag in ["</p>", "</h1>", "</h2>", "</h3>", "</h4>", "</h5>", "</h6>", "</li>", "</title>", "</subtitle>"] {
        text_length += before.matches(tag).count();
    }

    base_index + text_length
}

/// Byte position of `<footnote … id="<id>"` in the XML, if present.
fn find_footnote_tag(content_xml: &str, footnote_id: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = content_xml[search_from..].find("<footnote") {
        let tag_start = search_from + rel;
        let tag_end = content_xml[tag_start..]
            .find('>')
            .map(|e| tag_start + e)
            .unwrap_or(content_xml.len());
        let tag = &content_xml[tag_start..tag_end];
        if tag.contains(&format!("id=\"{footnote_id}\"")) {
            return Some(tag_start);
        }
        search_from = tag_end;
    }
    None
}

// ---------------------------------------------------------------------------
// Request classification
// ---------------------------------------------------------------------------

/// Whether any nested `segmentId` in the value is one of `target_ids`.
pub fn has_segment_id(value: &Value, target_ids: &HashSet<String>) -> bool {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("segmentId") {
                if target_ids.contains(id) {
                    return true;
                }
            }
            map.values().any(|v| has_segment_id(v, target_ids))
        }
        Value::Array(items) => items.iter().any(|v| has_segment_id(v, target_ids)),
        _ => false,
    }
}

/// Split requests into those that don't reference any of the segment ids
/// and those that do.
pub fn separate_by_segment_ids(
    requests: Vec<Value>,
    segment_ids: &HashSet<String>,
) -> (Vec<Value>, Vec<Value>) {
    let mut main: Vec<Value> = Vec::new();
    let mut segment: Vec<Value> = Vec::new();

    for request in requests {
        if has_segment_id(&request, segment_ids) {
            segment.push(request);
        } else {
            main.push(request);
        }
    }

    (main, segment)
}

/// Strip `_placeholderFootnoteId` markers from `createFootnote` requests,
/// returning the placeholders in request order.
pub fn extract_placeholder_footnote_ids(requests: Vec<Value>) -> (Vec<Value>, Vec<String>) {
    let mut placeholders: Vec<String> = Vec::new();
    let mut cleaned: Vec<Value> = Vec::new();

    for mut request in requests {
        if request.get("createFootnote").is_some() {
            let placeholder = request
                .get("_placeholderFootnoteId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(map) = request.as_object_mut() {
                map.remove("_placeholderFootnoteId");
            }
            placeholders.push(placeholder);
        }
        cleaned.push(request);
    }

    (cleaned, placeholders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdoc_diff::NodeKind;

    fn segment_node(
        segment_type: SegmentType,
        segment_id: &str,
        op: ChangeOp,
    ) -> ChangeNode {
        ChangeNode {
            kind: NodeKind::Segment {
                segment_type,
                segment_id: segment_id.to_string(),
                segment_end: 0,
            },
            op,
            node_id: segment_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn added_header_creates_default_header() {
        let node = segment_node(SegmentType::Header, "h1", ChangeOp::Added);
        let requests = StructuralGenerator.emit_header_footer(&node, "t");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["createHeader"]["type"], json!("DEFAULT"));
        assert_eq!(
            requests[0]["createHeader"]["sectionBreakLocation"]["tabId"],
            json!("t")
        );
    }

    #[test]
    fn deleted_footer_references_its_id() {
        let node = segment_node(SegmentType::Footer, "fo1", ChangeOp::Deleted);
        let requests = StructuralGenerator.emit_header_footer(&node, "t");
        assert_eq!(requests[0]["deleteFooter"]["footerId"], json!("fo1"));
        assert_eq!(requests[0]["deleteFooter"]["tabId"], json!("t"));
    }

    #[test]
    fn added_tab_reads_title_from_xml() {
        let node = ChangeNode {
            kind: NodeKind::Tab {
                tab_id: "t2".to_string(),
                tab_title: None,
            },
            op: ChangeOp::Added,
            node_id: "t2".to_string(),
            after_xml: Some(r#"<tab id="t2" title="Notes"><body/></tab>"#.to_string()),
            ..Default::default()
        };
        let requests = StructuralGenerator.emit_tab(&node);
        assert_eq!(
            requests[0]["addDocumentTab"]["tabProperties"]["title"],
            json!("Notes")
        );
    }

    #[test]
    fn footnote_reference_index_counts_text_and_newlines() {
        let xml = r#"<p>one</p>
<p>two<footnote id="f1"><p>n</p></footnote></p>"#;
        // "one" (3) + newline (1) + "two" (3) = 7; base 1 → 8.
        assert_eq!(footnote_reference_index(Some(xml), "f1", 1), 8);
    }

    #[test]
    fn footnote_reference_index_ignores_other_footnotes() {
        let xml = r#"<p>a<footnote id="f0"><p>x</p></footnote>b<footnote id="f1"/></p>"#;
        // Visible before f1: "a" + footnote content "x" + "b" = 3... the
        // scan counts raw visible text, including f0's inline content, plus
        // f0's closed inner paragraph newline.
        let index = footnote_reference_index(Some(xml), "f1", 1);
        assert_eq!(index, 5);
    }

    #[test]
    fn missing_reference_yields_no_request() {
        let node = ChangeNode {
            kind: NodeKind::Segment {
                segment_type: SegmentType::Footnote,
                segment_id: "f9".to_string(),
                segment_end: 0,
            },
            op: ChangeOp::Deleted,
            node_id: "f9".to_string(),
            ..Default::default()
        };
        let ctx = SegmentContext::default();
        let requests = StructuralGenerator.emit_footnote_reference_delete(
            &node,
            Some("<p>no refs here</p>"),
            1,
            &ctx,
        );
        assert!(requests.is_empty());
    }

    #[test]
    fn reference_delete_targets_one_unit() {
        let node = ChangeNode {
            kind: NodeKind::Segment {
                segment_type: SegmentType::Footnote,
                segment_id: "f1".to_string(),
                segment_end: 0,
            },
            op: ChangeOp::Deleted,
            node_id: "f1".to_string(),
            ..Default::default()
        };
        let ctx = SegmentContext {
            tab_id: "t".to_string(),
            ..Default::default()
        };
        let requests = StructuralGenerator.emit_footnote_reference_delete(
            &node,
            Some(r#"<p>see<footnote id="f1"/></p>"#),
            1,
            &ctx,
        );
        assert_eq!(requests.len(), 1);
        let range = &requests[0]["deleteContentRange"]["range"];
        assert_eq!(range["startIndex"], json!(4));
        assert_eq!(range["endIndex"], json!(5));
    }

    #[test]
    fn separate_by_segment_ids_splits_footnote_content() {
        let requests = vec![
            json!({"insertText": {"location": {"index": 1}, "text": "x"}}),
            json!({"insertText": {"location": {"index": 0, "segmentId": "f_new"}, "text": "n"}}),
        ];
        let ids: HashSet<String> = ["f_new".to_string()].into();
        let (main, segment) = separate_by_segment_ids(requests, &ids);
        assert_eq!(main.len(), 1);
        assert_eq!(segment.len(), 1);
        assert_eq!(
            segment[0]["insertText"]["location"]["segmentId"],
            json!("f_new")
        );
    }

    #[test]
    fn extract_placeholders_strips_markers_in_order() {
        let requests = vec![
            json!({"createFootnote": {"location": {"index": 4}}, "_placeholderFootnoteId": "f_a"}),
            json!({"insertText": {"location": {"index": 1}, "text": "x"}}),
            json!({"createFootnote": {"location": {"index": 9}}, "_placeholderFootnoteId": "f_b"}),
        ];
        let (cleaned, placeholders) = extract_placeholder_footnote_ids(requests);
        assert_eq!(placeholders, vec!["f_a".to_string(), "f_b".to_string()]);
        assert!(cleaned
            .iter()
            .all(|r| r.get("_placeholderFootnoteId").is_none()));
        assert_eq!(cleaned.len(), 3);
    }
}
