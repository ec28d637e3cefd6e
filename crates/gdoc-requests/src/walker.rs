//! Backwards walk over the change tree.
//!
//! Visits the tab children of the document node; within a modified segment,
//! children are walked from highest `pristine_start` to lowest so that
//! applying the requests in order never invalidates an index that a later
//! request still needs.

use serde_json::{json, Map, Value};

use gdoc_diff::{ChangeNode, ChangeOp, NodeKind};
use gdoc_model::{xml, Result, SegmentType};
use gdoc_model::xml::XmlElement;

use crate::content::ContentGenerator;
use crate::structural::StructuralGenerator;
use crate::table::TableGenerator;

/// Request-generation state for one segment walk.
#[derive(Debug, Clone, Default)]
pub struct SegmentContext {
    /// `None` for the body; the segment id otherwise.
    pub segment_id: Option<String>,
    /// End index of the pristine segment (0 when unknown).
    pub segment_end: usize,
    /// Owning tab id; stamped into every location and range when non-empty.
    pub tab_id: String,
    /// The insert at the segment end has already re-created the final
    /// newline; later inserts must not strip theirs again.
    pub segment_end_consumed: bool,
    /// The immediate successor in document order is a just-emitted added
    /// table.
    pub followed_by_added_table: bool,
    /// The successor is a non-deleted table/TOC; the trailing newline before
    /// it must survive.
    pub before_structural_element: bool,
    /// Set while generating inside a table cell (segment_end is the cell
    /// end, not the real segment end).
    pub inside_table_cell: bool,
}

impl SegmentContext {
    /// A `Location` value at `index`, scoped to this segment and tab.
    pub fn location(&self, index: usize) -> Value {
        let mut loc = Map::new();
        loc.insert("index".to_string(), json!(index));
        if let Some(segment_id) = self.segment_id.as_deref() {
            if !segment_id.is_empty() {
                loc.insert("segmentId".to_string(), json!(segment_id));
            }
        }
        if !self.tab_id.is_empty() {
            loc.insert("tabId".to_string(), json!(self.tab_id));
        }
        Value::Object(loc)
    }

    /// A `Range` value over `[start, end)`, scoped to this segment and tab.
    pub fn range(&self, start: usize, end: usize) -> Value {
        let mut range = Map::new();
        range.insert("startIndex".to_string(), json!(start));
        range.insert("endIndex".to_string(), json!(end));
        if let Some(segment_id) = self.segment_id.as_deref() {
            if !segment_id.is_empty() {
                range.insert("segmentId".to_string(), json!(segment_id));
            }
        }
        if !self.tab_id.is_empty() {
            range.insert("tabId".to_string(), json!(self.tab_id));
        }
        Value::Object(range)
    }
}

/// Walks the change tree and produces a flat, order-sensitive request list.
pub struct RequestWalker<'a> {
    content_gen: &'a ContentGenerator,
    table_gen: TableGenerator<'a>,
    structural_gen: StructuralGenerator,
}

impl<'a> RequestWalker<'a> {
    pub fn new(
        content_gen: &'a ContentGenerator,
        table_gen: TableGenerator<'a>,
        structural_gen: StructuralGenerator,
    ) -> Self {
        Self {
            content_gen,
            table_gen,
            structural_gen,
        }
    }

    /// Walk the entire change tree and return requests in execution order.
    pub fn walk(&self, root: &ChangeNode) -> Result<Vec<Value>> {
        let mut requests: Vec<Value> = Vec::new();

        for child in &root.children {
            if !matches!(child.kind, NodeKind::Tab { .. }) {
                tracing::warn!(target: "requests", op = %child.op, "skipping non-tab root child");
                continue;
            }
            match child.op {
                ChangeOp::Added => {
                    requests.extend(self.structural_gen.emit_tab(child));
                    requests.extend(self.walk_added_tab(child)?);
                }
                ChangeOp::Deleted => {
                    requests.extend(self.structural_gen.emit_tab(child));
                }
                ChangeOp::Modified => {
                    requests.extend(self.walk_tab(child)?);
                }
                ChangeOp::Unchanged => {}
            }
        }

        tracing::debug!(
            target: "requests",
            tabs = root.children.len(),
            requests = requests.len(),
            "walk complete"
        );
        Ok(requests)
    }

    fn walk_tab(&self, tab_node: &ChangeNode) -> Result<Vec<Value>> {
        let NodeKind::Tab { tab_id, tab_title } = &tab_node.kind else {
            return Ok(Vec::new());
        };
        let mut requests: Vec<Value> = Vec::new();

        if let Some(title) = tab_title {
            if !tab_id.is_empty() {
                requests.push(json!({
                    "updateDocumentTabProperties": {
                        "tabProperties": { "tabId": tab_id, "title": title },
                        "fields": "title",
                    }
                }));
            }
        }

        for seg_node in &tab_node.children {
            let Some(segment_type) = seg_node.segment_type() else {
                continue;
            };

            match seg_node.op {
                ChangeOp::Added | ChangeOp::Deleted => match segment_type {
                    SegmentType::Header | SegmentType::Footer => {
                        requests.extend(self.structural_gen.emit_header_footer(seg_node, tab_id));
                        if seg_node.op == ChangeOp::Added && seg_node.after_xml.is_some() {
                            requests.extend(self.emit_new_segment_content(seg_node, tab_id)?);
                        }
                    }
                    SegmentType::Footnote => {
                        // Creation happens via the inline reference; only the
                        // content insert (routed to the final batch by its
                        // placeholder segment id) is produced here.
                        if seg_node.op == ChangeOp::Added {
                            requests.extend(self.walk_footnote_content(seg_node, tab_id)?);
                        }
                    }
                    SegmentType::Body => {}
                },
                ChangeOp::Modified => {
                    requests.extend(self.walk_segment(seg_node, tab_id)?);
                }
                ChangeOp::Unchanged => {}
            }
        }

        Ok(requests)
    }

    /// Content insertion for a newly created header/footer: the fresh
    /// segment holds a single newline, so walk a synthetic segment with
    /// `segment_end = 1`.
    fn emit_new_segment_content(&self, seg_node: &ChangeNode, tab_id: &str) -> Result<Vec<Value>> {
        let Some(after_xml) = seg_node.after_xml.as_deref() else {
            return Ok(Vec::new());
        };
        let Ok(elem) = xml::parse(after_xml) else {
            return Ok(Vec::new());
        };

        let children = build_content_children(&elem);
        if children.is_empty() {
            return Ok(Vec::new());
        }

        let (Some(segment_type), Some(segment_id)) =
            (seg_node.segment_type(), seg_node.segment_id())
        else {
            return Ok(Vec::new());
        };

        let synthetic = ChangeNode {
            kind: NodeKind::Segment {
                segment_type,
                segment_id: segment_id.to_string(),
                segment_end: 1,
            },
            op: ChangeOp::Modified,
            children,
            ..Default::default()
        };
        self.walk_segment(&synthetic, tab_id)
    }

    /// Content insertion for an added footnote: the requests target the
    /// footnote's placeholder segment id and run in the final batch, after
    /// the real id is known.
    fn walk_footnote_content(&self, fn_node: &ChangeNode, tab_id: &str) -> Result<Vec<Value>> {
        let Some(after_xml) = fn_node.after_xml.as_deref() else {
            return Ok(Vec::new());
        };
        let Ok(elem) = xml::parse(after_xml) else {
            return Ok(Vec::new());
        };
        let children = build_content_children(&elem);
        if children.is_empty() {
            return Ok(Vec::new());
        }
        let Some(segment_id) = fn_node.segment_id() else {
            return Ok(Vec::new());
        };

        let synthetic = ChangeNode {
            kind: NodeKind::Segment {
                segment_type: SegmentType::Footnote,
                segment_id: segment_id.to_string(),
                segment_end: 1,
            },
            op: ChangeOp::Modified,
            children,
            ..Default::default()
        };
        self.walk_segment(&synthetic, tab_id)
    }

    /// Everything-is-new walk for an added tab: body content, then any
    /// header/footer with their contents.
    fn walk_added_tab(&self, tab_node: &ChangeNode) -> Result<Vec<Value>> {
        let NodeKind::Tab { tab_id, .. } = &tab_node.kind else {
            return Ok(Vec::new());
        };
        let Some(after_xml) = tab_node.after_xml.as_deref() else {
            return Ok(Vec::new());
        };
        let Ok(tab_elem) = xml::parse(after_xml) else {
            return Ok(Vec::new());
        };

        let mut requests: Vec<Value> = Vec::new();

        if let Some(body) = tab_elem.find("body") {
            let children = build_content_children(body);
            if !children.is_empty() {
                let seg_node = ChangeNode {
                    kind: NodeKind::Segment {
                        segment_type: SegmentType::Body,
                        segment_id: "body".to_string(),
                        segment_end: 2,
                    },
                    op: ChangeOp::Modified,
                    children,
                    ..Default::default()
                };
                requests.extend(self.walk_segment(&seg_node, tab_id)?);
            }
        }

        for (section_tag, segment_type) in
            [("header", SegmentType::Header), ("footer", SegmentType::Footer)]
        {
            let Some(section_elem) = tab_elem.find(section_tag) else {
                continue;
            };
            let section_id = section_elem.attr("id").unwrap_or_default();
            if section_id.is_empty() {
                continue;
            }

            let hf_node = ChangeNode {
                kind: NodeKind::Segment {
                    segment_type,
                    segment_id: section_id.to_string(),
                    segment_end: 0,
                },
                op: ChangeOp::Added,
                node_id: section_id.to_string(),
                after_xml: Some(section_elem.to_xml()),
                ..Default::default()
            };
            requests.extend(self.structural_gen.emit_header_footer(&hf_node, tab_id));
            requests.extend(self.emit_new_segment_content(&hf_node, tab_id)?);
        }

        Ok(requests)
    }

    fn walk_segment(&self, seg_node: &ChangeNode, tab_id: &str) -> Result<Vec<Value>> {
        let mut requests: Vec<Value> = Vec::new();

        let (Some(segment_type), Some(segment_id)) =
            (seg_node.segment_type(), seg_node.segment_id())
        else {
            return Ok(Vec::new());
        };
        let NodeKind::Segment { segment_end, .. } = seg_node.kind else {
            return Ok(Vec::new());
        };

        let mut ctx = SegmentContext {
            segment_id: (segment_type != SegmentType::Body).then(|| segment_id.to_string()),
            segment_end,
            tab_id: tab_id.to_string(),
            ..Default::default()
        };

        // Sort children by pristine_start DESC for the backwards walk.
        // Secondary key: original position, also DESC — when several blocks
        // share a start index (e.g. additions at the same point), the last
        // block in document order must be emitted first so that earlier
        // inserts push it down into place.
        let mut order: Vec<usize> = (0..seg_node.children.len()).collect();
        order.sort_by(|&a, &b| {
            (seg_node.children[b].pristine_start, b).cmp(&(seg_node.children[a].pristine_start, a))
        });

        let mut followed_by_added_table = false;
        // In the backwards walk a table is processed BEFORE the content
        // block that precedes it in document order.
        let mut before_structural_element = false;

        for idx in order {
            let child = &seg_node.children[idx];
            match &child.kind {
                NodeKind::Table { .. } => {
                    requests.extend(self.table_gen.emit(child, &ctx)?);
                    followed_by_added_table = child.op == ChangeOp::Added;
                    before_structural_element = child.op != ChangeOp::Deleted;
                }
                NodeKind::ContentBlock {
                    before_structural_element: carried_flag,
                } => {
                    // Footnote reference deletions and added-footnote content.
                    for fn_child in &child.children {
                        if fn_child.segment_type() != Some(SegmentType::Footnote) {
                            continue;
                        }
                        match fn_child.op {
                            ChangeOp::Deleted => {
                                let base_index = if child.pristine_start > 0 {
                                    child.pristine_start
                                } else if ctx.segment_id.is_none() {
                                    1
                                } else {
                                    0
                                };
                                requests.extend(self.structural_gen.emit_footnote_reference_delete(
                                    fn_child,
                                    child.before_xml.as_deref(),
                                    base_index,
                                    &ctx,
                                ));
                            }
                            ChangeOp::Added => {
                                requests.extend(self.walk_footnote_content(fn_child, tab_id)?);
                            }
                            // Modified footnote content is covered by the
                            // footnote segment's own diff.
                            _ => {}
                        }
                    }

                    ctx.followed_by_added_table = followed_by_added_table;
                    ctx.before_structural_element = before_structural_element || *carried_flag;
                    let (reqs, consumed) = self.content_gen.emit(child, &ctx)?;
                    requests.extend(reqs);
                    if consumed {
                        ctx.segment_end_consumed = true;
                    }
                    followed_by_added_table = false;
                    before_structural_element = false;
                }
                _ => {}
            }
        }

        Ok(requests)
    }
}

/// Build ADDED content-block and table change nodes from a container
/// element (a segment or cell being created from scratch).
pub(crate) fn build_content_children(container: &XmlElement) -> Vec<ChangeNode> {
    let mut children: Vec<ChangeNode> = Vec::new();
    let mut para_group: Vec<String> = Vec::new();

    fn flush_paras(para_group: &mut Vec<String>, children: &mut Vec<ChangeNode>) {
        if para_group.is_empty() {
            return;
        }
        children.push(ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: false,
            },
            op: ChangeOp::Added,
            after_xml: Some(para_group.join("\n")),
            pristine_start: 1,
            pristine_end: 1,
            ..Default::default()
        });
        para_group.clear();
    }

    fn added_table(xml: String) -> ChangeNode {
        ChangeNode {
            kind: NodeKind::Table { table_start: 1 },
            op: ChangeOp::Added,
            after_xml: Some(xml),
            pristine_start: 1,
            pristine_end: 1,
            ..Default::default()
        }
    }

    for child in container.child_elements() {
        if child.name == "table" {
            flush_paras(&mut para_group, &mut children);
            children.push(added_table(child.to_xml()));
        } else if gdoc_model::parser::is_paragraph_tag(&child.name) {
            para_group.push(child.to_xml());
        } else if child.name == "style" {
            let wrapper_class = child.attr("class").map(str::to_string);
            for styled in child.child_elements() {
                let mut styled = styled.clone();
                if let Some(class) = &wrapper_class {
                    if styled.attr("class").is_none() {
                        styled.set_attr("class", class);
                    }
                }
                if gdoc_model::parser::is_paragraph_tag(&styled.name) {
                    para_group.push(styled.to_xml());
                } else if styled.name == "table" {
                    flush_paras(&mut para_group, &mut children);
                    children.push(added_table(styled.to_xml()));
                }
            }
        }
    }

    flush_paras(&mut para_group, &mut children);
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn walk(root: &ChangeNode) -> Vec<Value> {
        let content_gen = ContentGenerator::new(BTreeMap::new());
        let table_gen = TableGenerator::new(&content_gen, BTreeMap::new());
        let walker = RequestWalker::new(&content_gen, table_gen, StructuralGenerator);
        walker.walk(root).expect("walk")
    }

    fn request_kind(request: &Value) -> &str {
        request
            .as_object()
            .expect("object")
            .keys()
            .find(|k| !k.starts_with('_'))
            .expect("kind")
    }

    fn modified_tab(children: Vec<ChangeNode>) -> ChangeNode {
        ChangeNode {
            kind: NodeKind::Tab {
                tab_id: "t".to_string(),
                tab_title: None,
            },
            op: ChangeOp::Modified,
            node_id: "t".to_string(),
            children,
            ..Default::default()
        }
    }

    fn document(children: Vec<ChangeNode>) -> ChangeNode {
        ChangeNode {
            kind: NodeKind::Document,
            children,
            ..Default::default()
        }
    }

    fn body_segment(segment_end: usize, children: Vec<ChangeNode>) -> ChangeNode {
        ChangeNode {
            kind: NodeKind::Segment {
                segment_type: SegmentType::Body,
                segment_id: "body".to_string(),
                segment_end,
            },
            op: ChangeOp::Modified,
            children,
            ..Default::default()
        }
    }

    fn content_block(op: ChangeOp, start: usize, end: usize, xml: &str) -> ChangeNode {
        let mut node = ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: false,
            },
            op,
            pristine_start: start,
            pristine_end: end,
            ..Default::default()
        };
        match op {
            ChangeOp::Deleted => node.before_xml = Some(xml.to_string()),
            _ => node.after_xml = Some(xml.to_string()),
        }
        node
    }

    #[test]
    fn segment_children_walk_backwards() {
        let root = document(vec![modified_tab(vec![body_segment(
            20,
            vec![
                content_block(ChangeOp::Deleted, 1, 4, "<p>ab</p>"),
                content_block(ChangeOp::Deleted, 10, 13, "<p>cd</p>"),
            ],
        )])]);
        let requests = walk(&root);
        assert_eq!(requests.len(), 2);
        // Higher pristine_start first.
        assert_eq!(
            requests[0]["deleteContentRange"]["range"]["startIndex"],
            json!(10)
        );
        assert_eq!(
            requests[1]["deleteContentRange"]["range"]["startIndex"],
            json!(1)
        );
    }

    #[test]
    fn same_start_blocks_emit_last_position_first() {
        let root = document(vec![modified_tab(vec![body_segment(
            5,
            vec![
                content_block(ChangeOp::Added, 1, 1, "<p>first</p>"),
                content_block(ChangeOp::Added, 1, 1, "<p>second</p>"),
            ],
        )])]);
        let requests = walk(&root);
        let texts: Vec<&str> = requests
            .iter()
            .filter_map(|r| r.get("insertText"))
            .map(|r| r["text"].as_str().expect("text"))
            .collect();
        assert_eq!(texts, vec!["second\n", "first\n"]);
    }

    #[test]
    fn deleted_tab_emits_delete_tab() {
        let root = document(vec![ChangeNode {
            kind: NodeKind::Tab {
                tab_id: "gone".to_string(),
                tab_title: None,
            },
            op: ChangeOp::Deleted,
            node_id: "gone".to_string(),
            ..Default::default()
        }]);
        let requests = walk(&root);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["deleteTab"]["tabId"], json!("gone"));
    }

    #[test]
    fn added_tab_inserts_body_and_header() {
        let root = document(vec![ChangeNode {
            kind: NodeKind::Tab {
                tab_id: "t2".to_string(),
                tab_title: None,
            },
            op: ChangeOp::Added,
            node_id: "t2".to_string(),
            after_xml: Some(concat!(
                r#"<tab id="t2" title="Second">"#,
                r#"<body><p>Hi</p></body>"#,
                r#"<header id="h2"><p>Top</p></header>"#,
                r#"</tab>"#
            )
            .to_string()),
            ..Default::default()
        }]);
        let requests = walk(&root);

        let kinds: Vec<&str> = requests.iter().map(request_kind).collect();
        assert_eq!(kinds[0], "addDocumentTab");
        assert_eq!(
            requests[0]["addDocumentTab"]["tabProperties"]["title"],
            json!("Second")
        );
        assert!(kinds.contains(&"createHeader"));

        let texts: Vec<(&str, Option<&str>)> = requests
            .iter()
            .filter_map(|r| r.get("insertText"))
            .map(|r| {
                (
                    r["text"].as_str().expect("text"),
                    r["location"]["segmentId"].as_str(),
                )
            })
            .collect();
        // Body insert has no segment id; header insert targets h2.
        assert!(texts.contains(&("Hi", None)));
        assert!(texts.contains(&("Top", Some("h2"))));
        // All locations carry the synthetic tab id for later rewriting.
        for request in &requests {
            if let Some(insert) = request.get("insertText") {
                assert_eq!(insert["location"]["tabId"], json!("t2"));
            }
        }
    }

    #[test]
    fn tab_title_change_emits_update() {
        let root = document(vec![ChangeNode {
            kind: NodeKind::Tab {
                tab_id: "t".to_string(),
                tab_title: Some("Renamed".to_string()),
            },
            op: ChangeOp::Modified,
            node_id: "t".to_string(),
            ..Default::default()
        }]);
        let requests = walk(&root);
        assert_eq!(requests.len(), 1);
        let props = &requests[0]["updateDocumentTabProperties"];
        assert_eq!(props["tabProperties"]["title"], json!("Renamed"));
        assert_eq!(props["fields"], json!("title"));
    }

    #[test]
    fn added_footnote_content_targets_placeholder_segment() {
        let fn_child = ChangeNode {
            kind: NodeKind::Segment {
                segment_type: SegmentType::Footnote,
                segment_id: "f_new".to_string(),
                segment_end: 0,
            },
            op: ChangeOp::Added,
            node_id: "f_new".to_string(),
            after_xml: Some(r#"<footnote id="f_new"><p>note</p></footnote>"#.to_string()),
            ..Default::default()
        };
        let mut block = content_block(ChangeOp::Modified, 1, 5, "<p>see</p>");
        block.before_xml = Some("<p>see</p>".to_string());
        block.after_xml =
            Some(r#"<p>see<footnote id="f_new"><p>note</p></footnote></p>"#.to_string());
        block.children.push(fn_child);

        let root = document(vec![modified_tab(vec![body_segment(5, vec![block])])]);
        let requests = walk(&root);

        let footnote_inserts: Vec<&Value> = requests
            .iter()
            .filter(|r| {
                r.get("insertText")
                    .map(|i| i["location"]["segmentId"] == json!("f_new"))
                    .unwrap_or(false)
            })
            .collect();
        assert_eq!(footnote_inserts.len(), 1);
        assert_eq!(
            footnote_inserts[0]["insertText"]["text"],
            json!("note")
        );

        // The inline reference creation also appears, with the placeholder.
        let create = requests
            .iter()
            .find(|r| r.get("createFootnote").is_some())
            .expect("createFootnote");
        assert_eq!(create["_placeholderFootnoteId"], json!("f_new"));
    }

    #[test]
    fn build_content_children_groups_paragraphs_around_tables() {
        let elem = xml::parse(concat!(
            "<body><p>a</p><p>b</p>",
            "<table><tr><td><p>c</p></td></tr></table>",
            "<p>d</p></body>"
        ))
        .expect("parse");
        let children = build_content_children(&elem);
        assert_eq!(children.len(), 3);
        assert!(matches!(children[0].kind, NodeKind::ContentBlock { .. }));
        assert!(matches!(children[1].kind, NodeKind::Table { .. }));
        assert!(matches!(children[2].kind, NodeKind::ContentBlock { .. }));
        assert_eq!(children[0].after_xml.as_deref(), Some("<p>a</p>\n<p>b</p>"));
    }
}
