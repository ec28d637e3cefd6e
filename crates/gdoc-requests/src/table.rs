//! Table request generation.
//!
//! Added tables are inserted empty and populated cell by cell from the
//! bottom-right; deleted tables are a single range delete. Modified tables
//! go through five phases whose fixed order keeps every index valid within
//! one batch:
//!
//! 1. column deletes (highest index first)
//! 2. row deletes (highest index first)
//! 3. cell modifications and row inserts (bottom to top)
//! 4. column inserts (highest index first)
//! 5. column widths (index-stable, may appear anywhere)

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Map, Value};

use gdoc_diff::{ChangeNode, ChangeOp, NodeKind};
use gdoc_model::index::{cell_content_length, table_length};
use gdoc_model::xml::XmlElement;
use gdoc_model::{xml, Result};

use crate::content::ContentGenerator;
use crate::style::{convert_cell_styles, parse_dimension, StyleProps};
use crate::walker::SegmentContext;

// ---------------------------------------------------------------------------
// Structure request builders
// ---------------------------------------------------------------------------

fn table_start_location(table_start: usize, ctx: &SegmentContext) -> Value {
    ctx.location(table_start)
}

fn cell_location(table_start: usize, row_index: usize, col_index: usize, ctx: &SegmentContext) -> Value {
    json!({
        "tableStartLocation": table_start_location(table_start, ctx),
        "rowIndex": row_index,
        "columnIndex": col_index,
    })
}

pub fn insert_table_row_request(
    table_start: usize,
    row_index: usize,
    ctx: &SegmentContext,
    insert_below: bool,
) -> Value {
    json!({
        "insertTableRow": {
            "tableCellLocation": cell_location(table_start, row_index, 0, ctx),
            "insertBelow": insert_below,
        }
    })
}

pub fn delete_table_row_request(table_start: usize, row_index: usize, ctx: &SegmentContext) -> Value {
    json!({
        "deleteTableRow": {
            "tableCellLocation": cell_location(table_start, row_index, 0, ctx),
        }
    })
}

/// `col_index` is the NEW column's desired position: position 0 inserts to
/// the left of column 0, any other position inserts to the right of its
/// predecessor.
pub fn insert_table_column_request(
    table_start: usize,
    row_index: usize,
    col_index: usize,
    ctx: &SegmentContext,
) -> Value {
    if col_index == 0 {
        json!({
            "insertTableColumn": {
                "tableCellLocation": cell_location(table_start, row_index, 0, ctx),
                "insertRight": false,
            }
        })
    } else {
        json!({
            "insertTableColumn": {
                "tableCellLocation": cell_location(table_start, row_index, col_index - 1, ctx),
                "insertRight": true,
            }
        })
    }
}

pub fn delete_table_column_request(
    table_start: usize,
    row_index: usize,
    col_index: usize,
    ctx: &SegmentContext,
) -> Value {
    json!({
        "deleteTableColumn": {
            "tableCellLocation": cell_location(table_start, row_index, col_index, ctx),
        }
    })
}

// ---------------------------------------------------------------------------
// TableGenerator
// ---------------------------------------------------------------------------

/// Generates `batchUpdate` requests for table change nodes.
pub struct TableGenerator<'a> {
    content_gen: &'a ContentGenerator,
    cell_styles: BTreeMap<String, StyleProps>,
}

impl<'a> TableGenerator<'a> {
    pub fn new(content_gen: &'a ContentGenerator, cell_styles: BTreeMap<String, StyleProps>) -> Self {
        Self {
            content_gen,
            cell_styles,
        }
    }

    pub fn emit(&self, node: &ChangeNode, ctx: &SegmentContext) -> Result<Vec<Value>> {
        match node.op {
            ChangeOp::Added => self.add_table(node, ctx),
            ChangeOp::Deleted => Ok(self.delete_table(node, ctx)),
            ChangeOp::Modified => self.modify_table(node, ctx),
            ChangeOp::Unchanged => Ok(Vec::new()),
        }
    }

    // --- ADD ---

    fn add_table(&self, node: &ChangeNode, ctx: &SegmentContext) -> Result<Vec<Value>> {
        let Some(after_xml) = node.after_xml.as_deref() else {
            return Ok(Vec::new());
        };
        let table_elem = xml::parse(after_xml)?;

        let row_elems: Vec<&XmlElement> = table_elem.find_all("tr").collect();
        let rows = row_elems.len();
        let cols = row_elems
            .first()
            .map(|tr| tr.find_all("td").count())
            .unwrap_or(0);

        let mut insert_index = node.pristine_start;
        if ctx.segment_end > 0 && insert_index > ctx.segment_end - 1 {
            insert_index = ctx.segment_end - 1;
        }

        let mut requests: Vec<Value> = Vec::new();

        if insert_index == 0 {
            // No pristine anchor: append at the end of the segment.
            let mut end_location = Map::new();
            end_location.insert(
                "segmentId".to_string(),
                json!(ctx.segment_id.clone().unwrap_or_default()),
            );
            if !ctx.tab_id.is_empty() {
                end_location.insert("tabId".to_string(), json!(ctx.tab_id));
            }
            requests.push(json!({
                "insertTable": {
                    "rows": rows,
                    "columns": cols,
                    "endOfSegmentLocation": Value::Object(end_location),
                }
            }));
            return Ok(requests);
        }

        requests.push(json!({
            "insertTable": {
                "rows": rows,
                "columns": cols,
                "location": ctx.location(insert_index),
            }
        }));

        // Populate cells of the freshly inserted empty table, highest start
        // first so earlier inserts don't move later targets.
        let mut cell_contents: Vec<(usize, usize, String)> = Vec::new();
        for (row_idx, tr) in row_elems.iter().enumerate() {
            for (col_idx, td) in tr.find_all("td").enumerate() {
                let inner: String = td.child_elements().map(XmlElement::to_xml).collect();
                if !inner.is_empty() {
                    cell_contents.push((row_idx, col_idx, inner));
                }
            }
        }

        let cell_starts = new_table_cell_starts(insert_index, rows, cols);
        cell_contents.sort_by(|a, b| {
            let start_a = cell_starts.get(&(a.0, a.1)).copied().unwrap_or(0);
            let start_b = cell_starts.get(&(b.0, b.1)).copied().unwrap_or(0);
            start_b.cmp(&start_a)
        });

        for (row_idx, col_idx, inner) in cell_contents {
            let Some(&cell_start) = cell_starts.get(&(row_idx, col_idx)) else {
                continue;
            };
            requests.extend(self.content_gen.content_insert_requests(
                &inner, ctx, cell_start, true, false,
            )?);
        }

        Ok(requests)
    }

    // --- DELETE ---

    fn delete_table(&self, node: &ChangeNode, ctx: &SegmentContext) -> Vec<Value> {
        let Some(before_xml) = node.before_xml.as_deref() else {
            return Vec::new();
        };
        if node.pristine_start == 0 {
            return Vec::new();
        }
        let Ok(table_elem) = xml::parse(before_xml) else {
            return Vec::new();
        };
        let table_size = table_length(&table_elem);

        vec![json!({
            "deleteContentRange": {
                "range": ctx.range(node.pristine_start, node.pristine_start + table_size),
            }
        })]
    }

    // --- MODIFY (five phases) ---

    fn modify_table(&self, node: &ChangeNode, ctx: &SegmentContext) -> Result<Vec<Value>> {
        let mut requests: Vec<Value> = Vec::new();

        let col_changes: Vec<&ChangeNode> = node
            .children
            .iter()
            .filter(|c| matches!(c.kind, NodeKind::TableColumn { .. }))
            .collect();
        let row_changes: Vec<&ChangeNode> = node
            .children
            .iter()
            .filter(|c| matches!(c.kind, NodeKind::TableRow { .. }))
            .collect();

        // Phase 5 requests are index-stable; emit them up front.
        requests.extend(self.phase_column_widths(node, ctx));

        let NodeKind::Table { table_start } = node.kind else {
            return Ok(requests);
        };
        if table_start == 0 {
            return Ok(requests);
        }

        requests.extend(phase_column_deletes(table_start, &col_changes, ctx));
        requests.extend(phase_row_deletes(table_start, &row_changes, ctx));
        requests.extend(self.phase_cell_mods_and_row_inserts(node, table_start, &row_changes, ctx)?);
        requests.extend(self.phase_column_inserts(node, table_start, &col_changes, ctx)?);

        Ok(requests)
    }

    fn phase_cell_mods_and_row_inserts(
        &self,
        node: &ChangeNode,
        table_start: usize,
        row_changes: &[&ChangeNode],
        ctx: &SegmentContext,
    ) -> Result<Vec<Value>> {
        let mut requests: Vec<Value> = Vec::new();

        let before_table = node
            .before_xml
            .as_deref()
            .and_then(|x| xml::parse(x).ok());
        let after_table = node.after_xml.as_deref().and_then(|x| xml::parse(x).ok());

        let pristine_row_count = before_table
            .as_ref()
            .map(|t| t.find_all("tr").count())
            .unwrap_or(0);
        let last_pristine_row = pristine_row_count.saturating_sub(1);

        let cols_added: BTreeSet<usize> = node
            .children
            .iter()
            .filter(|c| matches!(c.kind, NodeKind::TableColumn { .. }) && c.op == ChangeOp::Added)
            .filter_map(ChangeNode::col_index)
            .collect();
        let cols_deleted: BTreeSet<usize> = node
            .children
            .iter()
            .filter(|c| matches!(c.kind, NodeKind::TableColumn { .. }) && c.op == ChangeOp::Deleted)
            .filter_map(ChangeNode::col_index)
            .collect();

        // Deferred row inserts: (row_index, request, row_xml).
        let mut deferred_row_adds: Vec<(usize, Value, Option<&str>)> = Vec::new();

        let mut sorted_rows: Vec<&&ChangeNode> = row_changes.iter().collect();
        sorted_rows.sort_by(|a, b| b.row_index().cmp(&a.row_index()));

        for row_change in sorted_rows {
            let Some(row_idx) = row_change.row_index() else {
                continue;
            };

            match row_change.op {
                ChangeOp::Added => {
                    let request = if row_idx == 0 || pristine_row_count == 0 {
                        insert_table_row_request(table_start, 0, ctx, false)
                    } else {
                        let anchor = (row_idx - 1).min(last_pristine_row);
                        insert_table_row_request(table_start, anchor, ctx, true)
                    };
                    deferred_row_adds.push((row_idx, request, row_change.after_xml.as_deref()));
                }
                ChangeOp::Modified => {
                    let mut cell_changes: Vec<&ChangeNode> = row_change
                        .children
                        .iter()
                        .filter(|c| matches!(c.kind, NodeKind::TableCell { .. }))
                        .collect();
                    cell_changes.sort_by(|a, b| b.col_index().cmp(&a.col_index()));

                    for cell_change in cell_changes {
                        let Some(col_idx) = cell_change.col_index() else {
                            continue;
                        };
                        if cols_added.contains(&col_idx) || cols_deleted.contains(&col_idx) {
                            continue;
                        }
                        if cell_change.op != ChangeOp::Modified || node.before_xml.is_none() {
                            continue;
                        }

                        let cell_content_idx = cell_change.pristine_start;
                        let cell_end = cell_change.pristine_end;
                        if cell_content_idx == 0 || cell_end < cell_content_idx {
                            continue;
                        }

                        let before_inner = cell_inner_from_xml(cell_change.before_xml.as_deref());
                        let after_inner = cell_inner_from_xml(cell_change.after_xml.as_deref());

                        let content_change = ChangeNode {
                            kind: NodeKind::ContentBlock {
                                before_structural_element: false,
                            },
                            op: ChangeOp::Modified,
                            before_xml: Some(before_inner),
                            after_xml: Some(after_inner),
                            pristine_start: cell_content_idx,
                            pristine_end: cell_end.saturating_sub(1).max(cell_content_idx),
                            ..Default::default()
                        };
                        let cell_ctx = SegmentContext {
                            segment_id: ctx.segment_id.clone(),
                            segment_end: cell_end,
                            tab_id: ctx.tab_id.clone(),
                            inside_table_cell: true,
                            ..Default::default()
                        };
                        let (cell_reqs, _) = self.content_gen.emit(&content_change, &cell_ctx)?;
                        requests.extend(cell_reqs);

                        if let Some(row_index) = row_change.row_index() {
                            if let Some(style_req) = self.cell_style_request(
                                cell_change.after_xml.as_deref(),
                                table_start,
                                row_index,
                                col_idx,
                                ctx,
                            ) {
                                requests.push(style_req);
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        // Emit deferred row inserts, highest index first.
        deferred_row_adds.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, request, _) in &deferred_row_adds {
            requests.push(request.clone());
        }

        // Populate the new rows' cells, right to left within each row.
        if !deferred_row_adds.is_empty() {
            if let Some(after_table) = &after_table {
                let mut adds_asc: Vec<&(usize, Value, Option<&str>)> =
                    deferred_row_adds.iter().collect();
                adds_asc.sort_by_key(|(row_idx, _, _)| *row_idx);

                for (row_idx, _, row_xml) in adds_asc {
                    let Some(row_xml) = row_xml else { continue };
                    let Ok(row_elem) = xml::parse(row_xml) else {
                        continue;
                    };
                    let cells: Vec<&XmlElement> = row_elem.find_all("td").collect();
                    if cells.is_empty() {
                        continue;
                    }
                    let cell_0_start = cell_content_index(after_table, table_start, *row_idx, 0);
                    if cell_0_start == 0 {
                        continue;
                    }
                    for col_idx in (0..cells.len()).rev() {
                        let inner: String =
                            cells[col_idx].child_elements().map(XmlElement::to_xml).collect();
                        if inner.trim().is_empty() {
                            continue;
                        }
                        let cell_start = cell_0_start + 2 * col_idx;
                        requests.extend(self.content_gen.content_insert_requests(
                            &inner, ctx, cell_start, true, false,
                        )?);
                    }
                }
            }
        }

        Ok(requests)
    }

    fn phase_column_inserts(
        &self,
        node: &ChangeNode,
        table_start: usize,
        col_changes: &[&ChangeNode],
        ctx: &SegmentContext,
    ) -> Result<Vec<Value>> {
        let mut requests: Vec<Value> = Vec::new();

        let mut adds: Vec<usize> = col_changes
            .iter()
            .filter(|c| c.op == ChangeOp::Added)
            .filter_map(|c| c.col_index())
            .collect();
        adds.sort_unstable_by(|a, b| b.cmp(a));

        for &col_idx in &adds {
            requests.push(insert_table_column_request(table_start, 0, col_idx, ctx));
        }

        if adds.is_empty() || node.after_xml.is_none() || node.before_xml.is_none() {
            return Ok(requests);
        }
        let Some(after_table) = node.after_xml.as_deref().and_then(|x| xml::parse(x).ok()) else {
            return Ok(requests);
        };
        let Some(before_table) = node.before_xml.as_deref().and_then(|x| xml::parse(x).ok())
        else {
            return Ok(requests);
        };

        let row_count = after_table.find_all("tr").count();

        for &col_idx in &adds {
            for row_idx in (0..row_count).rev() {
                let Some(td) = table_cell(&after_table, row_idx, col_idx) else {
                    continue;
                };
                let inner: String = td.child_elements().map(XmlElement::to_xml).collect();
                if inner.trim().is_empty() {
                    continue;
                }
                let cell_start = if col_idx == 0 {
                    let base = cell_content_index(&before_table, table_start, row_idx, 0);
                    if base == 0 {
                        continue;
                    }
                    base + 2 * row_idx
                } else {
                    let pristine_col = col_idx - 1;
                    let base = cell_content_index(&before_table, table_start, row_idx, pristine_col);
                    if base == 0 {
                        continue;
                    }
                    let pristine_len = pristine_cell_length(&before_table, row_idx, pristine_col);
                    base + pristine_len + 2 * row_idx + 1
                };
                requests.extend(self.content_gen.content_insert_requests(
                    &inner, ctx, cell_start, true, false,
                )?);
            }
        }

        Ok(requests)
    }

    fn phase_column_widths(&self, node: &ChangeNode, ctx: &SegmentContext) -> Vec<Value> {
        let before_widths = column_widths_by_index(node.before_xml.as_deref());
        let after_widths = column_widths_by_index(node.after_xml.as_deref());
        if before_widths == after_widths {
            return Vec::new();
        }

        let NodeKind::Table { table_start } = node.kind else {
            return Vec::new();
        };
        if table_start == 0 {
            return Vec::new();
        }

        let mut requests: Vec<Value> = Vec::new();
        let all_columns: BTreeSet<usize> = before_widths
            .keys()
            .chain(after_widths.keys())
            .copied()
            .collect();

        for col_index in all_columns {
            let before = before_widths.get(&col_index);
            let after = after_widths.get(&col_index);
            if before == after {
                continue;
            }

            let mut props = Map::new();
            let mut fields: Vec<&str> = Vec::new();
            match after.and_then(|w| parse_dimension(w)) {
                Some(width) => {
                    props.insert("widthType".to_string(), json!("FIXED_WIDTH"));
                    props.insert("width".to_string(), width);
                    fields.extend(["widthType", "width"]);
                }
                None => {
                    props.insert("widthType".to_string(), json!("EVENLY_DISTRIBUTED"));
                    fields.push("widthType");
                }
            }

            requests.push(json!({
                "updateTableColumnProperties": {
                    "tableStartLocation": table_start_location(table_start, ctx),
                    "columnIndices": [col_index],
                    "tableColumnProperties": Value::Object(props),
                    "fields": fields.join(","),
                }
            }));
        }

        requests
    }

    fn cell_style_request(
        &self,
        cell_xml: Option<&str>,
        table_start: usize,
        row_index: usize,
        col_index: usize,
        ctx: &SegmentContext,
    ) -> Option<Value> {
        let cell_elem = xml::parse(cell_xml?).ok()?;

        let mut styles: StyleProps = StyleProps::new();
        if let Some(class_name) = cell_elem.attr("class") {
            if let Some(class_props) = self.cell_styles.get(class_name) {
                styles = class_props.clone();
            }
        }
        for (key, value) in &cell_elem.attrs {
            if !matches!(key.as_str(), "id" | "class" | "colspan" | "rowspan") {
                styles.insert(key.clone(), value.clone());
            }
        }

        let (cell_style, fields) = convert_cell_styles(&styles);
        if fields.is_empty() {
            return None;
        }

        Some(json!({
            "updateTableCellStyle": {
                "tableCellStyle": Value::Object(cell_style),
                "tableRange": {
                    "tableCellLocation": cell_location(table_start, row_index, col_index, ctx),
                    "rowSpan": 1,
                    "columnSpan": 1,
                },
                "fields": fields.join(","),
            }
        }))
    }
}

fn phase_column_deletes(
    table_start: usize,
    col_changes: &[&ChangeNode],
    ctx: &SegmentContext,
) -> Vec<Value> {
    let mut deletes: Vec<usize> = col_changes
        .iter()
        .filter(|c| c.op == ChangeOp::Deleted)
        .filter_map(|c| c.col_index())
        .collect();
    deletes.sort_unstable_by(|a, b| b.cmp(a));
    deletes
        .into_iter()
        .map(|col_idx| delete_table_column_request(table_start, 0, col_idx, ctx))
        .collect()
}

fn phase_row_deletes(
    table_start: usize,
    row_changes: &[&ChangeNode],
    ctx: &SegmentContext,
) -> Vec<Value> {
    let mut deletes: Vec<usize> = row_changes
        .iter()
        .filter(|c| c.op == ChangeOp::Deleted)
        .filter_map(|c| c.row_index())
        .collect();
    deletes.sort_unstable_by(|a, b| b.cmp(a));
    deletes
        .into_iter()
        .map(|row_idx| delete_table_row_request(table_start, row_idx, ctx))
        .collect()
}

// ---------------------------------------------------------------------------
// Index helpers
// ---------------------------------------------------------------------------

/// Cell content start indexes for a freshly inserted EMPTY table: every cell
/// holds exactly one default paragraph.
fn new_table_cell_starts(
    insert_location_index: usize,
    rows: usize,
    cols: usize,
) -> BTreeMap<(usize, usize), usize> {
    let mut cell_starts = BTreeMap::new();
    // +1 for the newline the insert creates, +1 for the table start marker.
    let mut idx = insert_location_index + 2;

    for row in 0..rows {
        idx += 1; // row marker
        for col in 0..cols {
            idx += 1; // cell marker
            cell_starts.insert((row, col), idx);
            idx += 1; // default empty paragraph
        }
    }

    cell_starts
}

/// Content start index for a specific cell of a pristine table, or 0 when
/// the cell does not exist.
fn cell_content_index(
    table: &XmlElement,
    table_start: usize,
    target_row: usize,
    target_col: usize,
) -> usize {
    let mut current = table_start + 1; // table start marker

    for (row_idx, tr) in table.find_all("tr").enumerate() {
        current += 1; // row marker
        for (col_idx, td) in tr.find_all("td").enumerate() {
            current += 1; // cell marker
            if row_idx == target_row && col_idx == target_col {
                return current;
            }
            current += cell_content_length(td);
        }
        if row_idx == target_row {
            break;
        }
    }

    0
}

fn table_cell<'e>(table: &'e XmlElement, row: usize, col: usize) -> Option<&'e XmlElement> {
    table.find_all("tr").nth(row)?.find_all("td").nth(col)
}

fn pristine_cell_length(table: &XmlElement, row: usize, col: usize) -> usize {
    table_cell(table, row, col).map(cell_content_length).unwrap_or(1)
}

fn cell_inner_from_xml(cell_xml: Option<&str>) -> String {
    let Some(cell_xml) = cell_xml else {
        return String::new();
    };
    let Ok(elem) = xml::parse(cell_xml) else {
        return String::new();
    };
    elem.child_elements()
        .map(XmlElement::to_xml)
        .collect::<Vec<_>>()
        .join("\n")
}

fn column_widths_by_index(table_xml: Option<&str>) -> BTreeMap<usize, String> {
    let mut widths = BTreeMap::new();
    let Some(table_xml) = table_xml else {
        return widths;
    };
    let Ok(elem) = xml::parse(table_xml) else {
        return widths;
    };
    for col_elem in elem.find_all("col") {
        let index = col_elem.attr("index").and_then(|v| v.parse::<usize>().ok());
        let width = col_elem.attr("width").unwrap_or_default();
        if let Some(index) = index {
            if !width.is_empty() {
                widths.insert(index, width.to_string());
            }
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx() -> SegmentContext {
        SegmentContext {
            segment_id: None,
            segment_end: 50,
            tab_id: String::new(),
            ..Default::default()
        }
    }

    fn emit(node: &ChangeNode) -> Vec<Value> {
        let content_gen = ContentGenerator::new(BTreeMap::new());
        let table_gen = TableGenerator::new(&content_gen, BTreeMap::new());
        table_gen.emit(node, &ctx()).expect("emit")
    }

    fn request_kind(request: &Value) -> &str {
        request
            .as_object()
            .expect("object")
            .keys()
            .find(|k| !k.starts_with('_'))
            .expect("kind")
    }

    fn table_node(op: ChangeOp, table_start: usize) -> ChangeNode {
        ChangeNode {
            kind: NodeKind::Table { table_start },
            op,
            pristine_start: table_start,
            ..Default::default()
        }
    }

    #[test]
    fn added_table_inserts_then_populates_bottom_up() {
        let mut node = table_node(ChangeOp::Added, 5);
        node.after_xml = Some(
            "<table><tr><td><p>a</p></td><td><p>b</p></td></tr></table>".to_string(),
        );
        let requests = emit(&node);

        assert_eq!(request_kind(&requests[0]), "insertTable");
        assert_eq!(requests[0]["insertTable"]["rows"], json!(1));
        assert_eq!(requests[0]["insertTable"]["columns"], json!(2));
        assert_eq!(requests[0]["insertTable"]["location"]["index"], json!(5));

        // Cell starts: idx = 5 + 2 (newline + table marker) + 1 (row marker)
        // = 8; cell (0,0) content at 9, cell (0,1) at 11.
        let inserts: Vec<i64> = requests
            .iter()
            .filter_map(|r| r.get("insertText"))
            .map(|i| i["location"]["index"].as_i64().expect("index"))
            .collect();
        assert_eq!(inserts, vec![11, 9]);
    }

    #[test]
    fn added_table_without_anchor_appends_to_segment() {
        let mut node = table_node(ChangeOp::Added, 0);
        node.after_xml = Some("<table><tr><td/></tr></table>".to_string());
        let requests = emit(&node);
        assert_eq!(requests.len(), 1);
        assert!(requests[0]["insertTable"]["endOfSegmentLocation"].is_object());
    }

    #[test]
    fn deleted_table_is_one_range_delete() {
        let mut node = table_node(ChangeOp::Deleted, 3);
        node.before_xml =
            Some("<table><tr><td><p>x</p></td></tr></table>".to_string());
        node.pristine_end = 9;
        let requests = emit(&node);
        assert_eq!(requests.len(), 1);
        let range = &requests[0]["deleteContentRange"]["range"];
        assert_eq!(range["startIndex"], json!(3));
        // 1 + (1 + (1 + 2)) + 1 = 6 units long.
        assert_eq!(range["endIndex"], json!(9));
    }

    #[test]
    fn five_phase_ordering_holds() {
        let mut node = table_node(ChangeOp::Modified, 1);
        node.before_xml = Some(concat!(
            "<table>",
            r#"<tr id="r0"><td><p>a</p></td><td><p>b</p></td></tr>"#,
            r#"<tr id="r1"><td><p>c</p></td><td><p>d</p></td></tr>"#,
            "</table>"
        )
        .to_string());
        node.after_xml = Some(concat!(
            "<table>",
            r#"<tr id="r0"><td><p>a</p></td></tr>"#,
            r#"<tr id="r2"><td><p>e</p></td></tr>"#,
            "</table>"
        )
        .to_string());
        node.children = vec![
            ChangeNode {
                kind: NodeKind::TableColumn { col_index: 1 },
                op: ChangeOp::Deleted,
                ..Default::default()
            },
            ChangeNode {
                kind: NodeKind::TableRow { row_index: 1 },
                op: ChangeOp::Deleted,
                before_xml: Some(r#"<tr id="r1"><td><p>c</p></td><td><p>d</p></td></tr>"#.into()),
                ..Default::default()
            },
            ChangeNode {
                kind: NodeKind::TableRow { row_index: 1 },
                op: ChangeOp::Added,
                after_xml: Some(r#"<tr id="r2"><td><p>e</p></td></tr>"#.into()),
                ..Default::default()
            },
        ];

        let requests = emit(&node);
        let kinds: Vec<&str> = requests.iter().map(request_kind).collect();

        let col_delete = kinds.iter().position(|k| *k == "deleteTableColumn");
        let row_delete = kinds.iter().position(|k| *k == "deleteTableRow");
        let row_insert = kinds.iter().position(|k| *k == "insertTableRow");
        assert!(col_delete.expect("col delete") < row_delete.expect("row delete"));
        assert!(row_delete.expect("row delete") < row_insert.expect("row insert"));
        // New row content is populated after the structural insert.
        let text_insert = kinds.iter().rposition(|k| *k == "insertText");
        assert!(row_insert.expect("row insert") < text_insert.expect("text insert"));
    }

    #[test]
    fn cell_modification_rewrites_cell_content() {
        let mut node = table_node(ChangeOp::Modified, 1);
        node.before_xml =
            Some(r#"<table><tr id="r0"><td><p>old</p></td></tr></table>"#.to_string());
        node.after_xml =
            Some(r#"<table><tr id="r0"><td><p>new</p></td></tr></table>"#.to_string());
        // Cell content spans 4..8 (table at 1, row marker 2, cell marker 3).
        node.children = vec![ChangeNode {
            kind: NodeKind::TableRow { row_index: 0 },
            op: ChangeOp::Modified,
            before_xml: Some(r#"<tr id="r0"><td><p>old</p></td></tr>"#.into()),
            after_xml: Some(r#"<tr id="r0"><td><p>new</p></td></tr>"#.into()),
            pristine_start: 2,
            pristine_end: 8,
            children: vec![ChangeNode {
                kind: NodeKind::TableCell { col_index: 0 },
                op: ChangeOp::Modified,
                before_xml: Some("<td><p>old</p></td>".into()),
                after_xml: Some("<td><p>new</p></td>".into()),
                pristine_start: 4,
                pristine_end: 8,
                ..Default::default()
            }],
            ..Default::default()
        }];

        let requests = emit(&node);
        let delete = requests
            .iter()
            .find(|r| r.get("deleteContentRange").is_some())
            .expect("delete");
        let range = &delete["deleteContentRange"]["range"];
        // Deletes the old content but never the cell's final newline.
        assert_eq!(range["startIndex"], json!(4));
        assert_eq!(range["endIndex"], json!(7));
        let insert = requests
            .iter()
            .find(|r| r.get("insertText").is_some())
            .expect("insert");
        assert_eq!(insert["insertText"]["text"], json!("new"));
    }

    #[test]
    fn cell_style_request_resolves_cell_class() {
        let content_gen = ContentGenerator::new(BTreeMap::new());
        let mut cell_styles = BTreeMap::new();
        cell_styles.insert(
            "cell-x".to_string(),
            StyleProps::from([("bg".to_string(), "#FF0000".to_string())]),
        );
        let table_gen = TableGenerator::new(&content_gen, cell_styles);
        let request = table_gen
            .cell_style_request(Some(r#"<td class="cell-x"><p>x</p></td>"#), 1, 0, 0, &ctx())
            .expect("style request");
        let style = &request["updateTableCellStyle"];
        assert!(style["tableCellStyle"]["backgroundColor"].is_object());
        assert_eq!(style["fields"], json!("backgroundColor"));
    }

    #[test]
    fn column_width_change_emits_fixed_width() {
        let mut node = table_node(ChangeOp::Modified, 1);
        node.before_xml = Some(
            r#"<table><col id="c1" index="0" width="100pt"/><tr><td/></tr></table>"#.to_string(),
        );
        node.after_xml = Some(
            r#"<table><col id="c1" index="0" width="150pt"/><tr><td/></tr></table>"#.to_string(),
        );
        let requests = emit(&node);
        assert_eq!(requests.len(), 1);
        let props = &requests[0]["updateTableColumnProperties"];
        assert_eq!(props["columnIndices"], json!([0]));
        assert_eq!(props["tableColumnProperties"]["widthType"], json!("FIXED_WIDTH"));
        assert_eq!(
            props["tableColumnProperties"]["width"]["magnitude"],
            json!(150.0)
        );
    }

    #[test]
    fn removed_width_falls_back_to_evenly_distributed() {
        let mut node = table_node(ChangeOp::Modified, 1);
        node.before_xml = Some(
            r#"<table><col id="c1" index="0" width="100pt"/><tr><td/></tr></table>"#.to_string(),
        );
        node.after_xml =
            Some(r#"<table><col id="c1" index="0"/><tr><td/></tr></table>"#.to_string());
        let requests = emit(&node);
        let props = &requests[0]["updateTableColumnProperties"];
        assert_eq!(
            props["tableColumnProperties"]["widthType"],
            json!("EVENLY_DISTRIBUTED")
        );
        assert_eq!(props["fields"], json!("widthType"));
    }
}
