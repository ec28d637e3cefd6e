//! Change-tree construction.
//!
//! Compares pristine and current block trees and produces a [`ChangeNode`]
//! tree that preserves hierarchy: document → tab → segment →
//! content block / table → row → cell. Only tabs/segments/blocks with
//! changes (or changed descendants) produce nodes.

use std::collections::BTreeSet;

use gdoc_model::{
    xml, DocumentBlock, ParagraphBlock, SegmentBlock, SegmentType, StructuralBlock, TabBlock,
    TableBlock, TableRowBlock,
};

use crate::align::{align_blocks, align_table_rows};
use crate::change::{AlignedPair, ChangeNode, ChangeOp, NodeKind};

/// Builds a change tree from pristine and current [`DocumentBlock`]s.
pub struct TreeDiffer;

impl TreeDiffer {
    /// Diff two document trees. The pristine tree must be indexed.
    pub fn diff(&self, pristine: &DocumentBlock, current: &DocumentBlock) -> ChangeNode {
        let mut root = ChangeNode {
            kind: NodeKind::Document,
            node_id: pristine.doc_id.clone(),
            ..Default::default()
        };

        for (p_tab, c_tab) in match_tabs(pristine, current) {
            match (p_tab, c_tab) {
                (None, Some(c)) => root.children.push(ChangeNode {
                    kind: NodeKind::Tab {
                        tab_id: c.tab_id.clone(),
                        tab_title: None,
                    },
                    op: ChangeOp::Added,
                    node_id: c.tab_id.clone(),
                    after_xml: Some(c.xml.clone()),
                    ..Default::default()
                }),
                (Some(p), None) => root.children.push(ChangeNode {
                    kind: NodeKind::Tab {
                        tab_id: p.tab_id.clone(),
                        tab_title: None,
                    },
                    op: ChangeOp::Deleted,
                    node_id: p.tab_id.clone(),
                    before_xml: Some(p.xml.clone()),
                    ..Default::default()
                }),
                (Some(p), Some(c)) => {
                    if let Some(tab_node) = self.diff_tab(p, c) {
                        root.children.push(tab_node);
                    }
                }
                (None, None) => {}
            }
        }

        root
    }

    fn diff_tab(&self, p_tab: &TabBlock, c_tab: &TabBlock) -> Option<ChangeNode> {
        let mut children: Vec<ChangeNode> = Vec::new();

        for (p_seg, c_seg) in match_segments(p_tab, c_tab) {
            match (p_seg, c_seg) {
                (None, Some(c)) => children.push(ChangeNode {
                    kind: NodeKind::Segment {
                        segment_type: c.segment_type,
                        segment_id: c.segment_id.clone(),
                        segment_end: 0,
                    },
                    op: ChangeOp::Added,
                    node_id: c.segment_id.clone(),
                    after_xml: Some(segment_xml(c)),
                    ..Default::default()
                }),
                (Some(p), None) => children.push(ChangeNode {
                    kind: NodeKind::Segment {
                        segment_type: p.segment_type,
                        segment_id: p.segment_id.clone(),
                        segment_end: p.end_index,
                    },
                    op: ChangeOp::Deleted,
                    node_id: p.segment_id.clone(),
                    before_xml: Some(format!(
                        "<{} id=\"{}\"/>",
                        p.segment_type, p.segment_id
                    )),
                    ..Default::default()
                }),
                (Some(p), Some(c)) => {
                    if let Some(seg_node) = self.diff_segment(p, c) {
                        children.push(seg_node);
                    }
                }
                (None, None) => {}
            }
        }

        let title_changed = p_tab.title != c_tab.title;
        if children.is_empty() && !title_changed {
            return None;
        }

        Some(ChangeNode {
            kind: NodeKind::Tab {
                tab_id: p_tab.tab_id.clone(),
                tab_title: title_changed.then(|| c_tab.title.clone()),
            },
            op: ChangeOp::Modified,
            node_id: p_tab.tab_id.clone(),
            children,
            ..Default::default()
        })
    }

    fn diff_segment(&self, p_seg: &SegmentBlock, c_seg: &SegmentBlock) -> Option<ChangeNode> {
        let children =
            self.diff_structural_elements(&p_seg.children, &c_seg.children, p_seg.start_index);

        if children.is_empty() {
            return None;
        }

        Some(ChangeNode {
            kind: NodeKind::Segment {
                segment_type: p_seg.segment_type,
                segment_id: p_seg.segment_id.clone(),
                segment_end: p_seg.end_index,
            },
            op: ChangeOp::Modified,
            node_id: p_seg.segment_id.clone(),
            children,
            ..Default::default()
        })
    }

    fn diff_structural_elements(
        &self,
        p_children: &[StructuralBlock],
        c_children: &[StructuralBlock],
        seg_start: usize,
    ) -> Vec<ChangeNode> {
        let alignment = align_blocks(p_children, c_children);
        let mut raw: Vec<RawEntry<'_>> = Vec::new();

        for pair in alignment {
            match (pair.pristine_idx, pair.current_idx) {
                (None, Some(j)) => raw.push(RawEntry {
                    op: Some(ChangeOp::Added),
                    pristine: None,
                    current: Some(&c_children[j]),
                    current_idx: Some(j),
                }),
                (Some(i), None) => raw.push(RawEntry {
                    op: Some(ChangeOp::Deleted),
                    pristine: Some(&p_children[i]),
                    current: None,
                    current_idx: None,
                }),
                (Some(i), Some(j)) => {
                    let p_block = &p_children[i];
                    let c_block = &c_children[j];
                    let read_only = matches!(p_block, StructuralBlock::Toc(_))
                        || matches!(c_block, StructuralBlock::Toc(_));
                    let changed =
                        p_block.content_fingerprint() != c_block.content_fingerprint();
                    if read_only && changed {
                        tracing::warn!(
                            target: "differ",
                            "table of contents changed; TOCs are read-only, skipping"
                        );
                    }
                    raw.push(RawEntry {
                        op: (!read_only && changed).then_some(ChangeOp::Modified),
                        pristine: Some(p_block),
                        current: Some(c_block),
                        current_idx: Some(j),
                    });
                }
                (None, None) => {}
            }
        }

        // An empty paragraph deleted right before a surviving table is the
        // mandatory newline preceding the table: reclassify as unchanged.
        for i in 0..raw.len() {
            let is_candidate = raw[i].op == Some(ChangeOp::Deleted)
                && raw[i]
                    .pristine
                    .and_then(StructuralBlock::as_paragraph)
                    .is_some_and(is_empty_paragraph);
            if !is_candidate || i + 1 >= raw.len() {
                continue;
            }
            let next = &raw[i + 1];
            let next_block = next.pristine.or(next.current);
            if matches!(next_block, Some(StructuralBlock::Table(_)))
                && next.op != Some(ChangeOp::Deleted)
            {
                raw[i].op = None;
                raw[i].current = None;
                raw[i].current_idx = None;
            }
        }

        self.group_into_change_nodes(raw, seg_start)
    }

    fn group_into_change_nodes(
        &self,
        raw: Vec<RawEntry<'_>>,
        seg_start: usize,
    ) -> Vec<ChangeNode> {
        let mut nodes: Vec<ChangeNode> = Vec::new();
        let mut grouper = Grouper::new(seg_start);

        for entry in &raw {
            let Some(op) = entry.op else {
                // Unchanged blocks flush the group and track position. An
                // unchanged table or TOC right after a pending group marks
                // the group's trailing newline as structural.
                let block = entry.pristine.or(entry.current);
                if !grouper.group.is_empty()
                    && matches!(
                        block,
                        Some(StructuralBlock::Table(_)) | Some(StructuralBlock::Toc(_))
                    )
                {
                    grouper.flush_before_structural = true;
                }
                grouper.flush(&mut nodes);
                if let Some(p_block) = entry.pristine {
                    if p_block.end_index() > 0 {
                        grouper.last_pristine_end = p_block.end_index();
                    }
                }
                continue;
            };

            let Some(block) = entry.current.or(entry.pristine) else {
                continue;
            };

            match block {
                StructuralBlock::Paragraph(para) => {
                    let p_para = entry.pristine.and_then(StructuralBlock::as_paragraph);
                    let c_para = entry.current.and_then(StructuralBlock::as_paragraph);

                    let is_adjacent = match (grouper.last_current_idx, entry.current_idx) {
                        (Some(last), Some(idx)) => idx == last + 1,
                        _ => true,
                    };
                    let last_tag = grouper
                        .group
                        .last()
                        .and_then(|e| e.current.or(e.pristine))
                        .map(|p| p.tag.clone());
                    let same_type = last_tag.is_none_or(|tag| tag == para.tag);

                    if grouper.group_op == Some(op) && is_adjacent && same_type {
                        grouper.group.push(GroupEntry {
                            pristine: p_para,
                            current: c_para,
                        });
                        if entry.current_idx.is_some() {
                            grouper.last_current_idx = entry.current_idx;
                        }
                    } else {
                        grouper.flush(&mut nodes);
                        grouper.group.push(GroupEntry {
                            pristine: p_para,
                            current: c_para,
                        });
                        grouper.group_op = Some(op);
                        grouper.last_current_idx = entry.current_idx;
                    }
                }
                StructuralBlock::Table(_) => {
                    if !grouper.group.is_empty() && op != ChangeOp::Deleted {
                        grouper.flush_before_structural = true;
                    }
                    grouper.flush(&mut nodes);

                    let p_table = entry.pristine.and_then(StructuralBlock::as_table);
                    let c_table = entry.current.and_then(StructuralBlock::as_table);

                    match op {
                        ChangeOp::Added => {
                            if let Some(c) = c_table {
                                nodes.push(ChangeNode {
                                    kind: NodeKind::Table {
                                        table_start: grouper.last_pristine_end,
                                    },
                                    op: ChangeOp::Added,
                                    node_id: c.table_id.clone(),
                                    after_xml: Some(c.xml.clone()),
                                    pristine_start: grouper.last_pristine_end,
                                    pristine_end: grouper.last_pristine_end,
                                    ..Default::default()
                                });
                            }
                        }
                        ChangeOp::Deleted => {
                            if let Some(p) = p_table {
                                nodes.push(ChangeNode {
                                    kind: NodeKind::Table {
                                        table_start: p.start_index,
                                    },
                                    op: ChangeOp::Deleted,
                                    node_id: p.table_id.clone(),
                                    before_xml: Some(p.xml.clone()),
                                    pristine_start: p.start_index,
                                    pristine_end: p.end_index,
                                    ..Default::default()
                                });
                                grouper.last_pristine_end = p.end_index;
                            }
                        }
                        ChangeOp::Modified => {
                            if let (Some(p), Some(c)) = (p_table, c_table) {
                                if let Some(table_node) = self.diff_table(p, c) {
                                    nodes.push(table_node);
                                }
                                grouper.last_pristine_end = p.end_index;
                            }
                        }
                        ChangeOp::Unchanged => {}
                    }
                }
                StructuralBlock::Toc(_) => {
                    // Read-only: acts as a separator only.
                    if !grouper.group.is_empty() && op != ChangeOp::Deleted {
                        grouper.flush_before_structural = true;
                    }
                    grouper.flush(&mut nodes);
                    if let Some(p_block) = entry.pristine {
                        grouper.last_pristine_end = p_block.end_index();
                    }
                }
            }
        }

        grouper.flush(&mut nodes);
        nodes
    }

    // --- Tables ---

    fn diff_table(&self, p: &TableBlock, c: &TableBlock) -> Option<ChangeNode> {
        let (mut children, col_alignment) = diff_columns(p, c);
        children.extend(self.diff_rows(p, c, &col_alignment));

        let widths_changed = column_widths(p) != column_widths(c);
        if children.is_empty() && !widths_changed {
            return None;
        }

        Some(ChangeNode {
            kind: NodeKind::Table {
                table_start: p.start_index,
            },
            op: ChangeOp::Modified,
            node_id: p.table_id.clone(),
            before_xml: Some(p.xml.clone()),
            after_xml: Some(c.xml.clone()),
            pristine_start: p.start_index,
            pristine_end: p.end_index,
            children,
            ..Default::default()
        })
    }

    fn diff_rows(
        &self,
        p: &TableBlock,
        c: &TableBlock,
        col_alignment: &[AlignedPair],
    ) -> Vec<ChangeNode> {
        let mut changes: Vec<ChangeNode> = Vec::new();
        let row_alignment = align_table_rows(&p.rows, &c.rows);

        let mut last_pristine_end = p.start_index + 1;

        for pair in row_alignment {
            let p_row = pair.pristine_idx.map(|i| &p.rows[i]);
            let c_row = pair.current_idx.map(|j| &c.rows[j]);
            let row_index = pair.current_idx.or(pair.pristine_idx).unwrap_or(0);

            match (p_row, c_row) {
                (None, Some(c_row)) => changes.push(ChangeNode {
                    kind: NodeKind::TableRow { row_index },
                    op: ChangeOp::Added,
                    node_id: c_row.row_id.clone(),
                    after_xml: Some(c_row.xml.clone()),
                    pristine_start: last_pristine_end,
                    pristine_end: last_pristine_end,
                    ..Default::default()
                }),
                (Some(p_row), None) => changes.push(ChangeNode {
                    kind: NodeKind::TableRow { row_index },
                    op: ChangeOp::Deleted,
                    node_id: p_row.row_id.clone(),
                    before_xml: Some(p_row.xml.clone()),
                    pristine_start: p_row.start_index,
                    pristine_end: p_row.end_index,
                    ..Default::default()
                }),
                (Some(p_row), Some(c_row)) => {
                    let cell_children = diff_cells(p_row, c_row, col_alignment);
                    let id_differs = p_row.row_id != c_row.row_id;
                    let content_differs = p_row.xml != c_row.xml;
                    if id_differs || content_differs || !cell_children.is_empty() {
                        changes.push(ChangeNode {
                            kind: NodeKind::TableRow { row_index },
                            op: ChangeOp::Modified,
                            node_id: p_row.row_id.clone(),
                            before_xml: Some(p_row.xml.clone()),
                            after_xml: Some(c_row.xml.clone()),
                            pristine_start: p_row.start_index,
                            pristine_end: p_row.end_index,
                            children: cell_children,
                            ..Default::default()
                        });
                    }
                }
                (None, None) => {}
            }

            if let Some(p_row) = p_row {
                last_pristine_end = p_row.end_index;
            }
        }

        changes
    }
}

// ---------------------------------------------------------------------------
// Grouping state
// ---------------------------------------------------------------------------

struct RawEntry<'a> {
    /// `None` means unchanged — a separator between groups.
    op: Option<ChangeOp>,
    pristine: Option<&'a StructuralBlock>,
    current: Option<&'a StructuralBlock>,
    current_idx: Option<usize>,
}

struct GroupEntry<'a> {
    pristine: Option<&'a ParagraphBlock>,
    current: Option<&'a ParagraphBlock>,
}

struct Grouper<'a> {
    group: Vec<GroupEntry<'a>>,
    group_op: Option<ChangeOp>,
    last_current_idx: Option<usize>,
    last_pristine_end: usize,
    flush_before_structural: bool,
}

impl<'a> Grouper<'a> {
    fn new(seg_start: usize) -> Self {
        Self {
            group: Vec::new(),
            group_op: None,
            last_current_idx: None,
            last_pristine_end: seg_start,
            flush_before_structural: false,
        }
    }

    fn flush(&mut self, nodes: &mut Vec<ChangeNode>) {
        if self.group.is_empty() {
            self.flush_before_structural = false;
            return;
        }
        let Some(op) = self.group_op else {
            self.reset();
            return;
        };

        let mut before_parts: Vec<&str> = Vec::new();
        let mut after_parts: Vec<&str> = Vec::new();
        let mut first_start: Option<usize> = None;
        let mut p_end = 0;

        for entry in &self.group {
            if let Some(p) = entry.pristine {
                before_parts.push(&p.xml);
                if first_start.is_none() {
                    first_start = Some(p.start_index);
                }
                p_end = p.end_index;
                self.last_pristine_end = p.end_index;
            }
            if let Some(c) = entry.current {
                after_parts.push(&c.xml);
            }
        }

        // Added groups have no pristine blocks; anchor them right after the
        // last pristine position seen.
        let (p_start, p_end) = match first_start {
            Some(start) => (start, p_end),
            None => (self.last_pristine_end, self.last_pristine_end),
        };

        let footnote_children = collect_footnote_changes(&self.group);

        nodes.push(ChangeNode {
            kind: NodeKind::ContentBlock {
                before_structural_element: self.flush_before_structural,
            },
            op,
            before_xml: (!before_parts.is_empty()).then(|| before_parts.join("\n")),
            after_xml: (!after_parts.is_empty()).then(|| after_parts.join("\n")),
            pristine_start: p_start,
            pristine_end: p_end,
            children: footnote_children,
            ..Default::default()
        });

        self.reset();
    }

    fn reset(&mut self) {
        self.group.clear();
        self.group_op = None;
        self.last_current_idx = None;
        self.flush_before_structural = false;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn match_tabs<'a>(
    pristine: &'a DocumentBlock,
    current: &'a DocumentBlock,
) -> Vec<(Option<&'a TabBlock>, Option<&'a TabBlock>)> {
    let mut keys: Vec<&str> = Vec::new();
    for tab in pristine.tabs.iter().chain(current.tabs.iter()) {
        if !keys.contains(&tab.tab_id.as_str()) {
            keys.push(&tab.tab_id);
        }
    }

    keys.into_iter()
        .map(|key| {
            (
                pristine.tabs.iter().find(|t| t.tab_id == key),
                current.tabs.iter().find(|t| t.tab_id == key),
            )
        })
        .collect()
}

fn segment_key(seg: &SegmentBlock) -> (String, String) {
    // Headers/footers match by type only — there is at most one default each.
    match seg.segment_type {
        SegmentType::Header | SegmentType::Footer => {
            (seg.segment_type.to_string(), String::new())
        }
        _ => (seg.segment_type.to_string(), seg.segment_id.clone()),
    }
}

fn match_segments<'a>(
    pristine: &'a TabBlock,
    current: &'a TabBlock,
) -> Vec<(Option<&'a SegmentBlock>, Option<&'a SegmentBlock>)> {
    let keys: BTreeSet<(String, String)> = pristine
        .segments
        .iter()
        .chain(current.segments.iter())
        .map(segment_key)
        .collect();

    keys.into_iter()
        .map(|key| {
            (
                pristine.segments.iter().find(|s| segment_key(s) == key),
                current.segments.iter().find(|s| segment_key(s) == key),
            )
        })
        .collect()
}

/// Rebuild a segment's XML from its children, for add/delete nodes.
fn segment_xml(seg: &SegmentBlock) -> String {
    let inner: String = seg.children.iter().map(|b| b.xml().to_string()).collect();
    if inner.is_empty() {
        format!("<{} id=\"{}\"/>", seg.segment_type, seg.segment_id)
    } else {
        format!(
            "<{} id=\"{}\">{}</{}>",
            seg.segment_type, seg.segment_id, inner, seg.segment_type
        )
    }
}

fn collect_footnote_changes(group: &[GroupEntry<'_>]) -> Vec<ChangeNode> {
    let mut p_footnotes: Vec<(String, String)> = Vec::new();
    let mut c_footnotes: Vec<(String, String)> = Vec::new();

    fn insert(map: &mut Vec<(String, String)>, id: &str, xml: &str) {
        if let Some(entry) = map.iter_mut().find(|(key, _)| key == id) {
            entry.1 = xml.to_string();
            return;
        }
        map.push((id.to_string(), xml.to_string()));
    }

    for entry in group {
        if let Some(p) = entry.pristine {
            for footnote in &p.footnotes {
                insert(&mut p_footnotes, &footnote.footnote_id, &footnote.xml);
            }
        }
        if let Some(c) = entry.current {
            for footnote in &c.footnotes {
                insert(&mut c_footnotes, &footnote.footnote_id, &footnote.xml);
            }
        }
    }

    let mut children: Vec<ChangeNode> = Vec::new();

    let footnote_kind = |id: &str| NodeKind::Segment {
        segment_type: SegmentType::Footnote,
        segment_id: id.to_string(),
        segment_end: 0,
    };

    for (id, xml) in &c_footnotes {
        if !p_footnotes.iter().any(|(pid, _)| pid == id) {
            children.push(ChangeNode {
                kind: footnote_kind(id),
                op: ChangeOp::Added,
                node_id: id.clone(),
                after_xml: Some(xml.clone()),
                ..Default::default()
            });
        }
    }

    for (id, xml) in &p_footnotes {
        if !c_footnotes.iter().any(|(cid, _)| cid == id) {
            children.push(ChangeNode {
                kind: footnote_kind(id),
                op: ChangeOp::Deleted,
                node_id: id.clone(),
                before_xml: Some(xml.clone()),
                ..Default::default()
            });
        }
    }

    for (id, p_xml) in &p_footnotes {
        if let Some((_, c_xml)) = c_footnotes.iter().find(|(cid, _)| cid == id) {
            if p_xml != c_xml {
                children.push(ChangeNode {
                    kind: footnote_kind(id),
                    op: ChangeOp::Modified,
                    node_id: id.clone(),
                    before_xml: Some(p_xml.clone()),
                    after_xml: Some(c_xml.clone()),
                    ..Default::default()
                });
            }
        }
    }

    children
}

fn diff_columns(p: &TableBlock, c: &TableBlock) -> (Vec<ChangeNode>, Vec<AlignedPair>) {
    let mut p_id_to_idx: Vec<(&str, usize)> = Vec::new();
    for (i, col) in p.columns.iter().enumerate() {
        if !p_id_to_idx.iter().any(|(id, _)| *id == col.col_id) {
            p_id_to_idx.push((&col.col_id, i));
        }
    }

    let mut matched_p: BTreeSet<usize> = BTreeSet::new();
    let mut alignment: Vec<AlignedPair> = Vec::new();

    for (c_i, col) in c.columns.iter().enumerate() {
        let p_i = p_id_to_idx
            .iter()
            .find(|(id, _)| *id == col.col_id)
            .map(|(_, i)| *i);
        match p_i {
            Some(p_i) if !matched_p.contains(&p_i) => {
                alignment.push(AlignedPair::matched(p_i, c_i));
                matched_p.insert(p_i);
            }
            _ => alignment.push(AlignedPair::added(c_i)),
        }
    }

    for p_i in 0..p.columns.len() {
        if !matched_p.contains(&p_i) {
            alignment.push(AlignedPair::deleted(p_i));
        }
    }

    let mut changes: Vec<ChangeNode> = Vec::new();
    for pair in &alignment {
        match (pair.pristine_idx, pair.current_idx) {
            (None, Some(c_i)) => changes.push(ChangeNode {
                kind: NodeKind::TableColumn { col_index: c_i },
                op: ChangeOp::Added,
                ..Default::default()
            }),
            (Some(p_i), None) => changes.push(ChangeNode {
                kind: NodeKind::TableColumn { col_index: p_i },
                op: ChangeOp::Deleted,
                ..Default::default()
            }),
            _ => {}
        }
    }

    (changes, alignment)
}

fn diff_cells(
    p_row: &TableRowBlock,
    c_row: &TableRowBlock,
    col_alignment: &[AlignedPair],
) -> Vec<ChangeNode> {
    let mut changes: Vec<ChangeNode> = Vec::new();

    let p_cells = &p_row.cells;
    let c_cells = &c_row.cells;

    // Without column definitions, fall back to positional matching.
    let positional: Vec<AlignedPair>;
    let alignment: &[AlignedPair] = if col_alignment.is_empty() {
        let max_cells = p_cells.len().max(c_cells.len());
        positional = (0..max_cells)
            .map(|i| AlignedPair {
                pristine_idx: (i < p_cells.len()).then_some(i),
                current_idx: (i < c_cells.len()).then_some(i),
            })
            .collect();
        &positional
    } else {
        col_alignment
    };

    let cols_added: BTreeSet<usize> = alignment
        .iter()
        .filter(|p| p.pristine_idx.is_none())
        .filter_map(|p| p.current_idx)
        .collect();
    let cols_deleted: BTreeSet<usize> = alignment
        .iter()
        .filter(|p| p.current_idx.is_none())
        .filter_map(|p| p.pristine_idx)
        .collect();

    for pair in alignment {
        let p_cell = pair.pristine_idx.and_then(|i| p_cells.get(i));
        let c_cell = pair.current_idx.and_then(|j| c_cells.get(j));
        let col_index = pair.current_idx.or(pair.pristine_idx).unwrap_or(0);

        // Cells of structurally added/deleted columns are handled by the
        // column operation.
        if cols_added.contains(&col_index) || cols_deleted.contains(&col_index) {
            continue;
        }

        match (p_cell, c_cell) {
            (None, Some(c_cell)) => changes.push(ChangeNode {
                kind: NodeKind::TableCell { col_index },
                op: ChangeOp::Added,
                node_id: c_cell.cell_id.clone(),
                after_xml: Some(c_cell.xml.clone()),
                pristine_start: p_row.end_index,
                pristine_end: p_row.end_index,
                ..Default::default()
            }),
            (Some(p_cell), None) => changes.push(ChangeNode {
                kind: NodeKind::TableCell { col_index },
                op: ChangeOp::Deleted,
                node_id: p_cell.cell_id.clone(),
                before_xml: Some(p_cell.xml.clone()),
                pristine_start: p_cell.start_index,
                pristine_end: p_cell.end_index,
                ..Default::default()
            }),
            (Some(p_cell), Some(c_cell)) => {
                if p_cell.xml.trim() != c_cell.xml.trim() {
                    changes.push(ChangeNode {
                        kind: NodeKind::TableCell { col_index },
                        op: ChangeOp::Modified,
                        node_id: p_cell.cell_id.clone(),
                        before_xml: Some(p_cell.xml.clone()),
                        after_xml: Some(c_cell.xml.clone()),
                        pristine_start: p_cell.start_index,
                        pristine_end: p_cell.end_index,
                        ..Default::default()
                    });
                }
            }
            (None, None) => {}
        }
    }

    changes
}

fn column_widths(table: &TableBlock) -> Vec<(&str, &str)> {
    table
        .columns
        .iter()
        .map(|col| (col.col_id.as_str(), col.width.as_str()))
        .collect()
}

fn is_empty_paragraph(block: &ParagraphBlock) -> bool {
    match xml::parse(&block.xml) {
        Ok(elem) => elem.text_content().trim().is_empty(),
        Err(_) => false,
    }
}
