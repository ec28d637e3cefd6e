pub mod align;
pub mod change;
pub mod differ;

pub use align::{align_blocks, align_table_rows};
pub use change::*;
pub use differ::TreeDiffer;
