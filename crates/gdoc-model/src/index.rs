//! UTF-16 index calculator.
//!
//! Walks the block tree and assigns `start_index`/`end_index` in place.
//! All lengths are in UTF-16 code units, the coordinate system of the remote
//! document. Must run on the pristine tree before diffing.

use crate::block::{
    DocumentBlock, SegmentBlock, StructuralBlock, TableBlock, TableCellBlock,
};
use crate::parser::is_paragraph_tag;
use crate::xml::{self, XmlElement, XmlNode};

/// Inline tags that consume exactly 1 index unit regardless of content.
pub const SPECIAL_TAGS: [&str; 8] = [
    "hr",
    "pagebreak",
    "columnbreak",
    "image",
    "footnote",
    "person",
    "date",
    "richlink",
];

pub fn is_special_tag(tag: &str) -> bool {
    SPECIAL_TAGS.contains(&tag)
}

/// UTF-16 code unit count of a string.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[derive(Default)]
struct LengthAcc {
    text: usize,
    specials: usize,
    equations: usize,
}

fn accumulate(elem: &XmlElement, acc: &mut LengthAcc) {
    for node in &elem.children {
        match node {
            XmlNode::Text(t) => acc.text += utf16_len(t),
            XmlNode::Element(child) => {
                if is_special_tag(&child.name) {
                    // One unit; the subtree (e.g. footnote content) lives in
                    // another index space.
                    acc.specials += 1;
                } else if child.name == "equation" {
                    acc.equations += child
                        .attr("length")
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(1);
                } else {
                    accumulate(child, acc);
                }
            }
        }
    }
}

/// Length of a paragraph element: text + special units + equation units + 1
/// for the trailing newline.
pub fn paragraph_length(elem: &XmlElement) -> usize {
    let mut acc = LengthAcc::default();
    accumulate(elem, &mut acc);
    acc.text + acc.specials + acc.equations + 1
}

/// Length of a paragraph from its XML string. A fragment that fails to parse
/// is opaque and contributes only its newline.
pub fn paragraph_length_from_xml(para_xml: &str) -> usize {
    match xml::parse(para_xml) {
        Ok(elem) => paragraph_length(&elem),
        Err(err) => {
            tracing::warn!(target: "indexer", %err, "unparseable paragraph, counting as 1");
            1
        }
    }
}

/// Length of a table element: start marker + rows (row marker + cells, each
/// a cell marker + content) + end marker.
pub fn table_length(table_elem: &XmlElement) -> usize {
    let mut length = 1;
    for tr in table_elem.find_all("tr") {
        length += 1;
        for td in tr.find_all("td") {
            length += 1;
            length += cell_content_length(td);
        }
    }
    length + 1
}

/// Content length of a `<td>` element. An empty cell holds one default
/// paragraph and counts 1.
pub fn cell_content_length(td_elem: &XmlElement) -> usize {
    let mut length = 0;
    for child in td_elem.child_elements() {
        if is_paragraph_tag(&child.name) {
            length += paragraph_length(child);
        } else if child.name == "table" {
            length += table_length(child);
        }
    }
    length.max(1)
}

fn toc_length(toc_xml: &str) -> usize {
    let elem = match xml::parse(toc_xml) {
        Ok(elem) => elem,
        Err(_) => return 2,
    };
    let mut length = 1;
    for child in elem.child_elements() {
        if is_paragraph_tag(&child.name) {
            length += paragraph_length(child);
        }
    }
    length + 1
}

/// Computes UTF-16 indexes on the block tree, mutating in place.
pub struct BlockIndexer;

impl BlockIndexer {
    pub fn compute(&self, doc: &mut DocumentBlock) {
        for tab in &mut doc.tabs {
            for segment in &mut tab.segments {
                let start = segment.segment_type.start_index();
                self.index_segment(segment, start);
            }
        }
    }

    fn index_segment(&self, segment: &mut SegmentBlock, start: usize) {
        let mut current = start;
        segment.start_index = current;

        for block in &mut segment.children {
            match block {
                StructuralBlock::Paragraph(para) => {
                    para.start_index = current;
                    para.end_index = current + paragraph_length_from_xml(&para.xml);
                    current = para.end_index;
                }
                StructuralBlock::Table(table) => {
                    table.start_index = current;
                    let length = self.index_table(table);
                    table.end_index = current + length;
                    current = table.end_index;
                }
                StructuralBlock::Toc(toc) => {
                    toc.start_index = current;
                    toc.end_index = current + toc_length(&toc.xml);
                    current = toc.end_index;
                }
            }
        }

        segment.end_index = current;
    }

    fn index_table(&self, table: &mut TableBlock) -> usize {
        let mut current = table.start_index + 1; // after table start marker

        for row in &mut table.rows {
            row.start_index = current;
            current += 1; // row marker

            for cell in &mut row.cells {
                current += 1; // cell marker
                cell.start_index = current;
                let cell_len = self.index_cell_content(cell);
                cell.end_index = current + cell_len;
                current = cell.end_index;
            }

            row.end_index = current;
        }

        current += 1; // table end marker
        current - table.start_index
    }

    fn index_cell_content(&self, cell: &mut TableCellBlock) -> usize {
        if cell.children.is_empty() {
            return 1; // empty cell has a default paragraph with newline
        }

        let mut length = 0;
        let mut current = cell.start_index;
        for child in &mut cell.children {
            match child {
                StructuralBlock::Paragraph(para) => {
                    para.start_index = current;
                    let plen = paragraph_length_from_xml(&para.xml);
                    para.end_index = current + plen;
                    current = para.end_index;
                    length += plen;
                }
                StructuralBlock::Table(nested) => {
                    // Nested tables are measured from XML; only first-class
                    // blocks carry indexes.
                    let nested_len = match xml::parse(&nested.xml) {
                        Ok(elem) => table_length(&elem),
                        Err(_) => 2,
                    };
                    current += nested_len;
                    length += nested_len;
                }
                StructuralBlock::Toc(_) => {}
            }
        }

        length.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::BlockParser;

    fn indexed(doc_xml: &str) -> DocumentBlock {
        let mut doc = BlockParser.parse(doc_xml).expect("parse");
        BlockIndexer.compute(&mut doc);
        doc
    }

    #[test]
    fn utf16_len_counts_code_units() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("é"), 1);
        // Surrogate pair characters count as 2.
        assert_eq!(utf16_len("𝄞"), 2);
        assert_eq!(utf16_len(""), 0);
    }

    #[test]
    fn body_starts_at_one() {
        let doc = indexed(r#"<doc id="d"><tab id="t"><body><p>Hello</p></body></tab></doc>"#);
        let body = &doc.tabs[0].segments[0];
        assert_eq!(body.start_index, 1);
        assert_eq!(body.children[0].start_index(), 1);
        // "Hello" (5) + newline (1)
        assert_eq!(body.children[0].end_index(), 7);
        assert_eq!(body.end_index, 7);
    }

    #[test]
    fn header_starts_at_zero() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><p>b</p></body><header id="h"><p>Top</p></header></tab></doc>"#,
        );
        let header = &doc.tabs[0].segments[1];
        assert_eq!(header.start_index, 0);
        assert_eq!(header.children[0].start_index(), 0);
        assert_eq!(header.end_index, 4);
    }

    #[test]
    fn indexes_are_contiguous() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><p>one</p><h1>two</h1><p></p></body></tab></doc>"#,
        );
        let body = &doc.tabs[0].segments[0];
        for pair in body.children.windows(2) {
            assert_eq!(pair[0].end_index(), pair[1].start_index());
        }
        assert_eq!(body.children[0].start_index(), body.start_index);
        assert_eq!(
            body.children.last().expect("children").end_index(),
            body.end_index
        );
    }

    #[test]
    fn empty_paragraph_has_length_one() {
        let doc = indexed(r#"<doc id="d"><tab id="t"><body><p></p></body></tab></doc>"#);
        let body = &doc.tabs[0].segments[0];
        assert_eq!(body.children[0].end_index() - body.children[0].start_index(), 1);
    }

    #[test]
    fn special_elements_count_one_unit_each() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><p>a<hr/><image id="i"/>b</p></body></tab></doc>"#,
        );
        let para = &doc.tabs[0].segments[0].children[0];
        // "ab" (2) + hr (1) + image (1) + newline (1)
        assert_eq!(para.end_index() - para.start_index(), 5);
    }

    #[test]
    fn equation_contributes_its_length() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><p>x<equation length="4"/></p></body></tab></doc>"#,
        );
        let para = &doc.tabs[0].segments[0].children[0];
        assert_eq!(para.end_index() - para.start_index(), 6);
    }

    #[test]
    fn inline_footnote_counts_one_unit_ignoring_content() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><p>see<footnote id="f"><p>long note body</p></footnote></p></body></tab></doc>"#,
        );
        let para = &doc.tabs[0].segments[0].children[0];
        // "see" (3) + footnote ref (1) + newline (1)
        assert_eq!(para.end_index() - para.start_index(), 5);
    }

    #[test]
    fn comment_refs_are_transparent() {
        let plain = indexed(r#"<doc id="d"><tab id="t"><body><p>same text</p></body></tab></doc>"#);
        let annotated = indexed(
            r#"<doc id="d"><tab id="t"><body><p><comment-ref id="c">same</comment-ref> text</p></body></tab></doc>"#,
        );
        assert_eq!(
            plain.tabs[0].segments[0].end_index,
            annotated.tabs[0].segments[0].end_index
        );
    }

    #[test]
    fn table_length_law() {
        // 2x2 table, each cell one paragraph of one char: cell len = 2.
        let doc = indexed(concat!(
            r#"<doc id="d"><tab id="t"><body><table>"#,
            r#"<tr><td><p>a</p></td><td><p>b</p></td></tr>"#,
            r#"<tr><td><p>c</p></td><td><p>d</p></td></tr>"#,
            r#"</table></body></tab></doc>"#
        ));
        let table = doc.tabs[0].segments[0].children[0]
            .as_table()
            .expect("table");
        // 1 (start) + 2 rows * (1 + 2 cells * (1 + 2)) + 1 (end) = 16
        assert_eq!(table.end_index - table.start_index, 16);
        assert_eq!(table.start_index, 1);
        // First row marker sits right after the table marker.
        assert_eq!(table.rows[0].start_index, 2);
        // First cell content starts after row marker + cell marker.
        assert_eq!(table.rows[0].cells[0].start_index, 4);
        assert_eq!(table.rows[0].cells[0].end_index, 6);
        assert_eq!(table.rows[0].cells[1].start_index, 7);
    }

    #[test]
    fn empty_cell_counts_one() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><table><tr><td/></tr></table></body></tab></doc>"#,
        );
        let table = doc.tabs[0].segments[0].children[0]
            .as_table()
            .expect("table");
        // 1 + (1 + (1 + 1)) + 1 = 5
        assert_eq!(table.end_index - table.start_index, 5);
    }

    #[test]
    fn nested_table_adds_to_cell_length() {
        let doc = indexed(concat!(
            r#"<doc id="d"><tab id="t"><body><table>"#,
            r#"<tr><td><p>x</p><table><tr><td><p>y</p></td></tr></table></td></tr>"#,
            r#"</table></body></tab></doc>"#
        ));
        let table = doc.tabs[0].segments[0].children[0]
            .as_table()
            .expect("table");
        // nested table: 1 + (1 + (1 + 2)) + 1 = 6; cell = 2 + 6 = 8
        // outer: 1 + (1 + (1 + 8)) + 1 = 12
        assert_eq!(table.end_index - table.start_index, 12);
    }

    #[test]
    fn toc_length_brackets_paragraphs() {
        let doc = indexed(
            r#"<doc id="d"><tab id="t"><body><toc><p>ab</p></toc><p>c</p></body></tab></doc>"#,
        );
        let body = &doc.tabs[0].segments[0];
        // toc: 1 + (2 + 1) + 1 = 5, starting at 1
        assert_eq!(body.children[0].end_index(), 6);
        assert_eq!(body.children[1].start_index(), 6);
    }

    #[test]
    fn malformed_paragraph_counts_one() {
        assert_eq!(paragraph_length_from_xml("<p>broken"), 1);
    }
}
