use gdoc_model::SegmentType;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChangeOp
// ---------------------------------------------------------------------------

/// Change operations detected during diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Unchanged,
    Added,
    Deleted,
    Modified,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Unchanged => "unchanged",
            ChangeOp::Added => "added",
            ChangeOp::Deleted => "deleted",
            ChangeOp::Modified => "modified",
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ChangeOp {
    fn default() -> Self {
        ChangeOp::Unchanged
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Node discriminant plus the extras that only that node type carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Tab {
        tab_id: String,
        /// New title, set only when the title changed on a matched tab.
        tab_title: Option<String>,
    },
    Segment {
        segment_type: SegmentType,
        segment_id: String,
        /// End index of the pristine segment (0 for added segments).
        segment_end: usize,
    },
    ContentBlock {
        /// The group's trailing newline is the newline before a non-deleted
        /// table/TOC, which must never be deleted.
        before_structural_element: bool,
    },
    Table {
        /// Pristine start index of the table (0 when added).
        table_start: usize,
    },
    TableRow {
        row_index: usize,
    },
    TableColumn {
        col_index: usize,
    },
    TableCell {
        col_index: usize,
    },
}

impl Default for NodeKind {
    fn default() -> Self {
        NodeKind::Document
    }
}

// ---------------------------------------------------------------------------
// ChangeNode
// ---------------------------------------------------------------------------

/// A node in the change tree.
///
/// The change tree mirrors the document structure
/// (document → tab → segment → content block / table → row → cell) but only
/// contains nodes that changed or are ancestors of changed nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeNode {
    pub kind: NodeKind,
    pub op: ChangeOp,
    pub node_id: String,
    pub before_xml: Option<String>,
    pub after_xml: Option<String>,
    pub pristine_start: usize,
    pub pristine_end: usize,
    pub children: Vec<ChangeNode>,
}

impl ChangeNode {
    pub fn new(kind: NodeKind, op: ChangeOp) -> Self {
        Self {
            kind,
            op,
            ..Default::default()
        }
    }

    pub fn is_segment(&self) -> bool {
        matches!(self.kind, NodeKind::Segment { .. })
    }

    pub fn segment_type(&self) -> Option<SegmentType> {
        match &self.kind {
            NodeKind::Segment { segment_type, .. } => Some(*segment_type),
            _ => None,
        }
    }

    pub fn segment_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Segment { segment_id, .. } => Some(segment_id.as_str()),
            _ => None,
        }
    }

    pub fn row_index(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::TableRow { row_index } => Some(*row_index),
            _ => None,
        }
    }

    pub fn col_index(&self) -> Option<usize> {
        match &self.kind {
            NodeKind::TableColumn { col_index } | NodeKind::TableCell { col_index } => {
                Some(*col_index)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AlignedPair
// ---------------------------------------------------------------------------

/// A pair of aligned indices from the pristine and current lists.
///
/// - `(Some(i), None)` — pristine\[i\] was deleted
/// - `(None, Some(j))` — current\[j\] was added
/// - `(Some(i), Some(j))` — pristine\[i\] matches current\[j\]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub pristine_idx: Option<usize>,
    pub current_idx: Option<usize>,
}

impl AlignedPair {
    pub fn matched(pristine_idx: usize, current_idx: usize) -> Self {
        Self {
            pristine_idx: Some(pristine_idx),
            current_idx: Some(current_idx),
        }
    }

    pub fn deleted(pristine_idx: usize) -> Self {
        Self {
            pristine_idx: Some(pristine_idx),
            current_idx: None,
        }
    }

    pub fn added(current_idx: usize) -> Self {
        Self {
            pristine_idx: None,
            current_idx: Some(current_idx),
        }
    }
}
