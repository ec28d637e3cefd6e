//! XML → block tree parser.
//!
//! Lifts a semantic document XML string into the typed block tree. Source
//! order is preserved everywhere; indexes are left at 0 for the indexer.

use uuid::Uuid;

use crate::block::{
    ColumnDef, DocumentBlock, FootnoteRef, ParagraphBlock, SegmentBlock, SegmentType,
    StructuralBlock, TabBlock, TableBlock, TableCellBlock, TableRowBlock, TocBlock,
};
use crate::error::Result;
use crate::xml::{self, XmlElement, XmlNode};

/// Paragraph-like element tags.
pub const PARAGRAPH_TAGS: [&str; 10] = [
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "title", "subtitle", "li",
];

pub fn is_paragraph_tag(tag: &str) -> bool {
    PARAGRAPH_TAGS.contains(&tag)
}

/// Parses document XML into a [`DocumentBlock`] tree.
pub struct BlockParser;

impl BlockParser {
    pub fn parse(&self, xml_content: &str) -> Result<DocumentBlock> {
        let root = xml::parse(xml_content)?;

        let mut doc = DocumentBlock {
            doc_id: root.attr("id").unwrap_or_default().to_string(),
            revision: root.attr("revision").unwrap_or_default().to_string(),
            tabs: Vec::new(),
        };

        let tab_elems: Vec<&XmlElement> = root.find_all("tab").collect();
        if tab_elems.is_empty() {
            // Documents without an explicit tab wrapper read as one unnamed tab.
            doc.tabs.push(self.parse_tab(&root));
        } else {
            for tab_elem in tab_elems {
                doc.tabs.push(self.parse_tab(tab_elem));
            }
        }

        Ok(doc)
    }

    fn parse_tab(&self, elem: &XmlElement) -> TabBlock {
        let mut segments = Vec::new();

        if let Some(body) = elem.find("body") {
            segments.push(self.parse_segment(body, SegmentType::Body, "body"));
        }
        for header in elem.find_all("header") {
            let id = header.attr("id").unwrap_or_default().to_string();
            segments.push(self.parse_segment(header, SegmentType::Header, &id));
        }
        for footer in elem.find_all("footer") {
            let id = footer.attr("id").unwrap_or_default().to_string();
            segments.push(self.parse_segment(footer, SegmentType::Footer, &id));
        }
        for footnote in elem.find_all("footnote") {
            let id = footnote.attr("id").unwrap_or_default().to_string();
            segments.push(self.parse_segment(footnote, SegmentType::Footnote, &id));
        }

        TabBlock {
            tab_id: if elem.name == "tab" {
                elem.attr("id").unwrap_or_default().to_string()
            } else {
                String::new()
            },
            title: elem.attr("title").unwrap_or_default().to_string(),
            xml: elem.to_xml(),
            segments,
        }
    }

    fn parse_segment(
        &self,
        elem: &XmlElement,
        segment_type: SegmentType,
        segment_id: &str,
    ) -> SegmentBlock {
        SegmentBlock {
            segment_type,
            segment_id: segment_id.to_string(),
            children: self.parse_structural_elements(elem),
            start_index: 0,
            end_index: 0,
        }
    }

    pub(crate) fn parse_structural_elements(&self, parent: &XmlElement) -> Vec<StructuralBlock> {
        let mut blocks = Vec::new();

        for child in parent.child_elements() {
            let tag = child.name.as_str();

            if is_paragraph_tag(tag) {
                blocks.push(StructuralBlock::Paragraph(self.parse_paragraph(child)));
            } else if tag == "table" {
                blocks.push(StructuralBlock::Table(self.parse_table(child)));
            } else if tag == "toc" {
                blocks.push(StructuralBlock::Toc(TocBlock {
                    xml: child.to_xml(),
                    start_index: 0,
                    end_index: 0,
                }));
            } else if tag == "style" {
                // Style wrapper — transfer class to children lacking their own.
                let wrapper_class = child.attr("class").map(str::to_string);
                for styled in child.child_elements() {
                    let mut styled = styled.clone();
                    if let Some(class) = &wrapper_class {
                        if styled.attr("class").is_none() {
                            styled.set_attr("class", class);
                        }
                    }
                    if is_paragraph_tag(&styled.name) {
                        blocks.push(StructuralBlock::Paragraph(self.parse_paragraph(&styled)));
                    } else if styled.name == "table" {
                        blocks.push(StructuralBlock::Table(self.parse_table(&styled)));
                    }
                }
            } else {
                // Section breaks and other elements are read-only here.
                tracing::debug!(target: "parser", tag, "skipping unrecognized element");
            }
        }

        blocks
    }

    fn parse_paragraph(&self, elem: &XmlElement) -> ParagraphBlock {
        let mut elem = elem.clone();
        ensure_footnote_ids(&mut elem);

        let mut footnotes = Vec::new();
        for descendant in elem.descendants() {
            if descendant.name == "footnote" {
                footnotes.push(FootnoteRef {
                    footnote_id: descendant.attr("id").unwrap_or_default().to_string(),
                    xml: descendant.to_xml(),
                    children_xml: descendant.child_elements().map(XmlElement::to_xml).collect(),
                });
            }
        }

        ParagraphBlock {
            tag: elem.name.clone(),
            xml: elem.to_xml(),
            start_index: 0,
            end_index: 0,
            footnotes,
        }
    }

    fn parse_table(&self, elem: &XmlElement) -> TableBlock {
        let mut columns = Vec::new();
        for col_elem in elem.find_all("col") {
            let position = columns.len();
            let col_id = col_elem
                .attr("id")
                .or_else(|| col_elem.attr("index"))
                .map(str::to_string)
                .unwrap_or_else(|| position.to_string());
            let index = col_elem
                .attr("index")
                .and_then(|v| v.parse().ok())
                .unwrap_or(position);
            columns.push(ColumnDef {
                col_id,
                width: col_elem.attr("width").unwrap_or_default().to_string(),
                index,
            });
        }

        let mut rows = Vec::new();
        for (row_index, tr) in elem.find_all("tr").enumerate() {
            let row_id = tr
                .attr("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("r{row_index}"));

            let mut cells = Vec::new();
            for (col_index, td) in tr.find_all("td").enumerate() {
                let cell_id = td
                    .attr("id")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{row_index},{col_index}"));
                cells.push(TableCellBlock {
                    cell_id,
                    col_index,
                    xml: td.to_xml(),
                    children: self.parse_structural_elements(td),
                    start_index: 0,
                    end_index: 0,
                });
            }

            rows.push(TableRowBlock {
                row_id,
                row_index,
                xml: tr.to_xml(),
                cells,
                start_index: 0,
                end_index: 0,
            });
        }

        TableBlock {
            table_id: elem.attr("id").unwrap_or_default().to_string(),
            xml: elem.to_xml(),
            columns,
            rows,
            start_index: 0,
            end_index: 0,
        }
    }
}

/// Assign ids to inline footnotes that were written without one, so that the
/// push orchestrator has a placeholder to map to the server-assigned id.
fn ensure_footnote_ids(elem: &mut XmlElement) {
    for node in &mut elem.children {
        if let XmlNode::Element(child) = node {
            if child.name == "footnote" && child.attr("id").is_none() {
                child.set_attr("id", &format!("f_{}", Uuid::new_v4().simple()));
            }
            ensure_footnote_ids(child);
        }
    }
}
