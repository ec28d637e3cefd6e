//! Diff pipeline orchestration.
//!
//! parse both documents → index the pristine tree → diff → walk.

use serde_json::Value;

use gdoc_diff::{ChangeNode, TreeDiffer};
use gdoc_model::{BlockIndexer, BlockParser, Result, StyleSheet};
use gdoc_requests::{ContentGenerator, RequestWalker, StructuralGenerator, TableGenerator};

/// Runs the full diff pipeline on a pair of document XML strings.
pub struct DiffEngine;

impl DiffEngine {
    /// Diff two documents and return `(requests, change_tree)`.
    ///
    /// The request list is already in execution order; an empty list means
    /// the documents are equivalent.
    pub fn diff(
        &self,
        pristine_xml: &str,
        current_xml: &str,
        _pristine_styles: Option<&str>,
        current_styles: Option<&str>,
    ) -> Result<(Vec<Value>, ChangeNode)> {
        let parser = BlockParser;
        let mut pristine_doc = parser.parse(pristine_xml)?;
        let current_doc = parser.parse(current_xml)?;

        BlockIndexer.compute(&mut pristine_doc);

        let change_tree = TreeDiffer.diff(&pristine_doc, &current_doc);

        let sheet = StyleSheet::parse_opt(current_styles)?;
        let content_gen = ContentGenerator::new(sheet.text_styles);
        let table_gen = TableGenerator::new(&content_gen, sheet.cell_styles);
        let walker = RequestWalker::new(&content_gen, table_gen, StructuralGenerator);
        let requests = walker.walk(&change_tree)?;

        tracing::debug!(
            target: "engine",
            tabs = change_tree.children.len(),
            requests = requests.len(),
            "diff complete"
        );

        Ok((requests, change_tree))
    }
}
