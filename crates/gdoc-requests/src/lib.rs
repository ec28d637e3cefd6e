pub mod content;
pub mod structural;
pub mod style;
pub mod table;
pub mod walker;

pub use content::{ContentGenerator, ParsedContent};
pub use structural::{
    extract_placeholder_footnote_ids, separate_by_segment_ids, StructuralGenerator,
};
pub use table::TableGenerator;
pub use walker::{RequestWalker, SegmentContext};
