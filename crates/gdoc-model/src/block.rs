use serde::{Deserialize, Serialize};

use crate::hash::content_fingerprint;

// ---------------------------------------------------------------------------
// SegmentType
// ---------------------------------------------------------------------------

/// Kinds of document segments. Each segment owns an independent UTF-16 index
/// space: the body starts at index 1 (slot 0 belongs to the initial section
/// break), headers/footers/footnotes start at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Body,
    Header,
    Footer,
    Footnote,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Body => "body",
            SegmentType::Header => "header",
            SegmentType::Footer => "footer",
            SegmentType::Footnote => "footnote",
        }
    }

    /// First usable index in this segment's index space.
    pub fn start_index(&self) -> usize {
        match self {
            SegmentType::Body => 1,
            _ => 0,
        }
    }
}

impl std::fmt::Display for SegmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Paragraphs
// ---------------------------------------------------------------------------

/// An inline footnote reference captured from paragraph XML.
///
/// The reference stays inline in the paragraph (it consumes one index unit
/// there); `children_xml` holds the footnote's content paragraphs, which live
/// in the footnote's own segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootnoteRef {
    pub footnote_id: String,
    pub xml: String,
    pub children_xml: Vec<String>,
}

/// A paragraph-like element (`p`, `h1`..`h6`, `title`, `subtitle`, `li`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParagraphBlock {
    /// The XML tag of this paragraph.
    pub tag: String,
    /// Full XML of the element.
    pub xml: String,
    /// UTF-16 start index, assigned by the indexer.
    pub start_index: usize,
    /// UTF-16 end index (exclusive), assigned by the indexer.
    pub end_index: usize,
    /// Inline footnote references within this paragraph.
    pub footnotes: Vec<FootnoteRef>,
}

impl ParagraphBlock {
    /// Exact-match key: fingerprint of the XML with comment refs stripped.
    pub fn content_fingerprint(&self) -> String {
        content_fingerprint(&self.xml)
    }

    /// Structural-match key, tag-scoped so only like paragraphs pair up.
    pub fn structural_key(&self) -> String {
        format!("para:{}", self.tag)
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A column definition from a `<col>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub col_id: String,
    pub width: String,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCellBlock {
    pub cell_id: String,
    pub col_index: usize,
    pub xml: String,
    /// Nested content: paragraphs and (recursively) tables.
    pub children: Vec<StructuralBlock>,
    /// Start of the cell's content, immediately after the cell marker.
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRowBlock {
    pub row_id: String,
    pub row_index: usize,
    pub xml: String,
    pub cells: Vec<TableCellBlock>,
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableBlock {
    pub table_id: String,
    pub xml: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<TableRowBlock>,
    pub start_index: usize,
    pub end_index: usize,
}

impl TableBlock {
    pub fn content_fingerprint(&self) -> String {
        content_fingerprint(&self.xml)
    }

    /// Tables match structurally by type only.
    pub fn structural_key(&self) -> String {
        "table".to_string()
    }
}

// ---------------------------------------------------------------------------
// Toc
// ---------------------------------------------------------------------------

/// A table-of-contents element. Read-only, but it occupies real index space
/// that must be tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocBlock {
    pub xml: String,
    pub start_index: usize,
    pub end_index: usize,
}

impl TocBlock {
    pub fn content_fingerprint(&self) -> String {
        content_fingerprint(&self.xml)
    }

    pub fn structural_key(&self) -> String {
        "toc".to_string()
    }
}

// ---------------------------------------------------------------------------
// StructuralBlock
// ---------------------------------------------------------------------------

/// A top-level child of a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuralBlock {
    Paragraph(ParagraphBlock),
    Table(TableBlock),
    Toc(TocBlock),
}

impl StructuralBlock {
    pub fn content_fingerprint(&self) -> String {
        match self {
            StructuralBlock::Paragraph(p) => p.content_fingerprint(),
            StructuralBlock::Table(t) => t.content_fingerprint(),
            StructuralBlock::Toc(t) => t.content_fingerprint(),
        }
    }

    pub fn structural_key(&self) -> String {
        match self {
            StructuralBlock::Paragraph(p) => p.structural_key(),
            StructuralBlock::Table(t) => t.structural_key(),
            StructuralBlock::Toc(t) => t.structural_key(),
        }
    }

    pub fn xml(&self) -> &str {
        match self {
            StructuralBlock::Paragraph(p) => &p.xml,
            StructuralBlock::Table(t) => &t.xml,
            StructuralBlock::Toc(t) => &t.xml,
        }
    }

    pub fn start_index(&self) -> usize {
        match self {
            StructuralBlock::Paragraph(p) => p.start_index,
            StructuralBlock::Table(t) => t.start_index,
            StructuralBlock::Toc(t) => t.start_index,
        }
    }

    pub fn end_index(&self) -> usize {
        match self {
            StructuralBlock::Paragraph(p) => p.end_index,
            StructuralBlock::Table(t) => t.end_index,
            StructuralBlock::Toc(t) => t.end_index,
        }
    }

    pub fn as_paragraph(&self) -> Option<&ParagraphBlock> {
        match self {
            StructuralBlock::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&TableBlock> {
        match self {
            StructuralBlock::Table(t) => Some(t),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Segments, tabs, document
// ---------------------------------------------------------------------------

/// A document segment: one independent index space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentBlock {
    pub segment_type: SegmentType,
    pub segment_id: String,
    pub children: Vec<StructuralBlock>,
    pub start_index: usize,
    pub end_index: usize,
}

/// One user-visible document tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabBlock {
    pub tab_id: String,
    pub title: String,
    /// Full `<tab>…</tab>` XML, kept for whole-tab add/delete.
    pub xml: String,
    pub segments: Vec<SegmentBlock>,
}

/// Root of the parsed block tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentBlock {
    pub doc_id: String,
    pub revision: String,
    pub tabs: Vec<TabBlock>,
}
