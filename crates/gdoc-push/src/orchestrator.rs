//! Three-batch push.
//!
//! The API assigns real ids to new tabs, headers/footers, and footnotes only
//! in the response of the batch that created them, so any request referencing
//! such an id must go in a later batch:
//!
//! - batch 1a: `addDocumentTab` → synthetic tab id → real tab id
//! - batch 1b: `createHeader`/`createFooter` (tab ids rewritten) → real
//!   header/footer ids
//! - batch 2: everything except footnote content (segment/tab ids rewritten);
//!   `createFootnote` replies map placeholder footnote ids to real ids
//! - batch 3: footnote content, prefixed by a delete of each new footnote's
//!   server-created default paragraph
//!
//! The batches form a logical transaction that the server does NOT make
//! atomic; a failure in a later batch leaves earlier batches applied.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use gdoc_diff::ChangeNode;
use gdoc_model::{BlockParser, DocFolder, DocumentBlock, Result, SegmentType};
use gdoc_requests::{extract_placeholder_footnote_ids, separate_by_segment_ids};

use crate::engine::DiffEngine;
use crate::transport::Transport;

/// Result of a push operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushResult {
    pub success: bool,
    pub document_id: String,
    /// Requests applied; on failure, the count from the batches that did
    /// complete.
    pub changes_applied: usize,
    pub message: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Default)]
struct IdMaps {
    tab: HashMap<String, String>,
    header: HashMap<String, String>,
    footer: HashMap<String, String>,
}

/// Drives the diff engine and executes the resulting requests in dependent
/// batches against a [`Transport`].
pub struct PushOrchestrator;

impl PushOrchestrator {
    /// Run the diff on a document folder without pushing.
    pub fn diff_folder(&self, folder: &Path) -> Result<(String, Vec<Value>, ChangeNode)> {
        let doc = DocFolder::load(folder)?;
        let (requests, tree) = DiffEngine.diff(
            &doc.pristine_xml,
            &doc.current_xml,
            doc.pristine_styles.as_deref(),
            doc.current_styles.as_deref(),
        )?;
        Ok((doc.document_id, requests, tree))
    }

    /// Push local changes from a folder using the 3-batch strategy.
    pub fn push(&self, folder: &Path, transport: &mut dyn Transport) -> Result<PushResult> {
        let doc = DocFolder::load(folder)?;
        self.push_folder(&doc, transport)
    }

    /// Push an already-loaded folder.
    pub fn push_folder(
        &self,
        doc: &DocFolder,
        transport: &mut dyn Transport,
    ) -> Result<PushResult> {
        let (requests, _tree) = DiffEngine.diff(
            &doc.pristine_xml,
            &doc.current_xml,
            doc.pristine_styles.as_deref(),
            doc.current_styles.as_deref(),
        )?;

        if requests.is_empty() {
            return Ok(PushResult {
                success: true,
                document_id: doc.document_id.clone(),
                changes_applied: 0,
                message: "No changes to apply".to_string(),
                applied_at: Utc::now(),
            });
        }

        let total = requests.len();
        let mut applied = 0usize;
        let outcome = self.run_batches(doc, requests, transport, &mut applied);

        Ok(match outcome {
            Ok(()) => PushResult {
                success: true,
                document_id: doc.document_id.clone(),
                changes_applied: total,
                message: format!("Applied {total} changes"),
                applied_at: Utc::now(),
            },
            Err(err) => {
                tracing::error!(target: "push", %err, applied, "push aborted");
                PushResult {
                    success: false,
                    document_id: doc.document_id.clone(),
                    changes_applied: applied,
                    message: err.to_string(),
                    applied_at: Utc::now(),
                }
            }
        })
    }

    fn run_batches(
        &self,
        doc: &DocFolder,
        requests: Vec<Value>,
        transport: &mut dyn Transport,
        applied: &mut usize,
    ) -> Result<()> {
        let document_id = doc.document_id.as_str();

        // --- Classify requests into dependent batches ---
        let mut tab_creates: Vec<Value> = Vec::new();
        let mut hf_creates: Vec<Value> = Vec::new();
        let mut other: Vec<Value> = Vec::new();
        for request in requests {
            if request.get("addDocumentTab").is_some() {
                tab_creates.push(request);
            } else if request.get("createHeader").is_some()
                || request.get("createFooter").is_some()
            {
                hf_creates.push(request);
            } else {
                other.push(request);
            }
        }

        // New segment/tab ids: set difference between the parsed documents.
        let parser = BlockParser;
        let pristine_doc = parser.parse(&doc.pristine_xml)?;
        let current_doc = parser.parse(&doc.current_xml)?;
        let new_headers = new_segment_ids(&pristine_doc, &current_doc, SegmentType::Header);
        let new_footers = new_segment_ids(&pristine_doc, &current_doc, SegmentType::Footer);
        let new_tab_ids = new_tab_ids(&pristine_doc, &current_doc);

        let mut maps = IdMaps::default();

        // --- Batch 1a: tab creation → capture real tab ids ---
        if !tab_creates.is_empty() {
            tracing::info!(target: "push", count = tab_creates.len(), "batch 1a: tabs");
            let response = transport.batch_update(document_id, &tab_creates)?;
            *applied += tab_creates.len();
            let mut t_idx = 0;
            for reply in replies(&response) {
                if let Some(add_tab) = reply.get("addDocumentTab") {
                    if let Some(real_id) = add_tab
                        .get("tabProperties")
                        .and_then(|p| p.get("tabId"))
                        .and_then(Value::as_str)
                    {
                        if t_idx < new_tab_ids.len() {
                            maps.tab.insert(new_tab_ids[t_idx].clone(), real_id.to_string());
                        }
                    }
                    t_idx += 1;
                }
            }
        }

        // --- Batch 1b: header/footer creation (tab ids rewritten) ---
        if !hf_creates.is_empty() {
            if !maps.tab.is_empty() {
                for request in &mut hf_creates {
                    rewrite_ids(request, &maps, None);
                }
            }
            tracing::info!(target: "push", count = hf_creates.len(), "batch 1b: headers/footers");
            let response = transport.batch_update(document_id, &hf_creates)?;
            *applied += hf_creates.len();
            let mut h_idx = 0;
            let mut f_idx = 0;
            for reply in replies(&response) {
                if let Some(real_id) = reply
                    .get("createHeader")
                    .and_then(|c| c.get("headerId"))
                    .and_then(Value::as_str)
                {
                    if h_idx < new_headers.len() {
                        maps.header.insert(new_headers[h_idx].clone(), real_id.to_string());
                    }
                    h_idx += 1;
                }
                if let Some(real_id) = reply
                    .get("createFooter")
                    .and_then(|c| c.get("footerId"))
                    .and_then(Value::as_str)
                {
                    if f_idx < new_footers.len() {
                        maps.footer.insert(new_footers[f_idx].clone(), real_id.to_string());
                    }
                    f_idx += 1;
                }
            }
        }

        if !maps.tab.is_empty() || !maps.header.is_empty() || !maps.footer.is_empty() {
            for request in &mut other {
                rewrite_ids(request, &maps, None);
            }
        }

        // --- Batch 2: main content + createFootnote ---
        let (other, footnote_placeholders) = extract_placeholder_footnote_ids(other);
        let placeholder_set: HashSet<String> = footnote_placeholders
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        let (main_requests, mut footnote_requests) =
            separate_by_segment_ids(other, &placeholder_set);

        // Placeholder → tab id, for the batch-3 cleanup ranges.
        let mut footnote_tab_ids: HashMap<String, String> = HashMap::new();
        let mut placeholder_iter = footnote_placeholders.iter();
        for request in &main_requests {
            if let Some(create) = request.get("createFootnote") {
                let tab_id = create
                    .get("location")
                    .and_then(|l| l.get("tabId"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(placeholder) = placeholder_iter.next() {
                    if !placeholder.is_empty() {
                        footnote_tab_ids.insert(placeholder.clone(), tab_id.to_string());
                    }
                }
            }
        }

        let mut footnote_id_map: HashMap<String, String> = HashMap::new();
        if !main_requests.is_empty() {
            tracing::info!(target: "push", count = main_requests.len(), "batch 2: main content");
            let response = transport.batch_update(document_id, &main_requests)?;
            *applied += main_requests.len();
            let mut fn_idx = 0;
            for reply in replies(&response) {
                if let Some(create) = reply.get("createFootnote") {
                    if let Some(real_id) = create.get("footnoteId").and_then(Value::as_str) {
                        if let Some(placeholder) = footnote_placeholders.get(fn_idx) {
                            if !placeholder.is_empty() {
                                footnote_id_map.insert(placeholder.clone(), real_id.to_string());
                            }
                        }
                    }
                    fn_idx += 1;
                }
            }
        }

        // --- Batch 3: footnote content ---
        if !footnote_requests.is_empty() {
            for request in &mut footnote_requests {
                rewrite_ids(request, &maps, Some(&footnote_id_map));
            }

            // The server seeds each new footnote with a default paragraph;
            // remove it before inserting the real content.
            let mut cleanup: Vec<Value> = Vec::new();
            for placeholder in &footnote_placeholders {
                if placeholder.is_empty() {
                    continue;
                }
                let real_id = footnote_id_map
                    .get(placeholder)
                    .map(String::as_str)
                    .unwrap_or(placeholder);
                let mut range = json!({
                    "segmentId": real_id,
                    "startIndex": 0,
                    "endIndex": 1,
                });
                if let Some(tab_id) = footnote_tab_ids.get(placeholder) {
                    if !tab_id.is_empty() {
                        range["tabId"] = json!(tab_id);
                    }
                }
                cleanup.push(json!({ "deleteContentRange": { "range": range } }));
            }

            let batch: Vec<Value> = cleanup.into_iter().chain(footnote_requests).collect();
            tracing::info!(target: "push", count = batch.len(), "batch 3: footnote content");
            transport.batch_update(document_id, &batch)?;
            *applied += batch.len();
        }

        Ok(())
    }
}

fn replies(response: &Value) -> &[Value] {
    response
        .get("replies")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Segment ids of the given type present in current but not in pristine,
/// in current-document order.
fn new_segment_ids(
    pristine: &DocumentBlock,
    current: &DocumentBlock,
    segment_type: SegmentType,
) -> Vec<String> {
    let pristine_ids: HashSet<&str> = pristine
        .tabs
        .iter()
        .flat_map(|t| t.segments.iter())
        .filter(|s| s.segment_type == segment_type)
        .map(|s| s.segment_id.as_str())
        .collect();

    current
        .tabs
        .iter()
        .flat_map(|t| t.segments.iter())
        .filter(|s| s.segment_type == segment_type)
        .filter(|s| !pristine_ids.contains(s.segment_id.as_str()))
        .map(|s| s.segment_id.clone())
        .collect()
}

fn new_tab_ids(pristine: &DocumentBlock, current: &DocumentBlock) -> Vec<String> {
    let pristine_ids: HashSet<&str> = pristine.tabs.iter().map(|t| t.tab_id.as_str()).collect();
    current
        .tabs
        .iter()
        .filter(|t| !pristine_ids.contains(t.tab_id.as_str()))
        .map(|t| t.tab_id.clone())
        .collect()
}

/// Rewrite synthetic `segmentId`/`tabId` values to their server-assigned
/// counterparts, recursively.
fn rewrite_ids(value: &mut Value, maps: &IdMaps, footnote_map: Option<&HashMap<String, String>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let replacement = match key.as_str() {
                    "segmentId" => child.as_str().and_then(|s| {
                        maps.header
                            .get(s)
                            .or_else(|| maps.footer.get(s))
                            .or_else(|| footnote_map.and_then(|m| m.get(s)))
                            .cloned()
                    }),
                    "tabId" => child.as_str().and_then(|s| maps.tab.get(s).cloned()),
                    _ => None,
                };
                if let Some(real_id) = replacement {
                    *child = Value::String(real_id);
                } else {
                    rewrite_ids(child, maps, footnote_map);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_ids(item, maps, footnote_map);
            }
        }
        _ => {}
    }
}
