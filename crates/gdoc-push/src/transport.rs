//! Transport seam.
//!
//! The engine is transport-agnostic: it produces and consumes opaque JSON
//! values. Production transports (HTTP, OAuth, token caching) live outside
//! this workspace; tests use [`MockTransport`].

use std::collections::VecDeque;

use serde_json::{json, Value};

use gdoc_model::{DocError, Result};

/// Remote document API surface the push pipeline depends on.
pub trait Transport {
    /// Apply a batch of mutation requests, returning the raw response.
    /// Requests are applied in order; the engine relies on that.
    fn batch_update(&mut self, document_id: &str, requests: &[Value]) -> Result<Value>;

    /// Fetch the remote document as raw JSON.
    fn get(&mut self, document_id: &str) -> Result<Value>;
}

/// In-memory transport: records every batch and hands out canned replies.
#[derive(Debug, Default)]
pub struct MockTransport {
    /// `(document_id, requests)` per batch_update call, in order.
    pub batches: Vec<(String, Vec<Value>)>,
    /// Responses returned in order; an empty reply list once exhausted.
    pub replies: VecDeque<Value>,
    /// Fail the Nth (0-based) batch_update call, if set.
    pub fail_on_batch: Option<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<Value>) -> Self {
        Self {
            replies: replies.into(),
            ..Self::default()
        }
    }
}

impl Transport for MockTransport {
    fn batch_update(&mut self, document_id: &str, requests: &[Value]) -> Result<Value> {
        if self.fail_on_batch == Some(self.batches.len()) {
            return Err(DocError::Transport("injected batch failure".to_string()));
        }
        self.batches
            .push((document_id.to_string(), requests.to_vec()));
        Ok(self
            .replies
            .pop_front()
            .unwrap_or_else(|| json!({ "replies": [] })))
    }

    fn get(&mut self, _document_id: &str) -> Result<Value> {
        Ok(json!({}))
    }
}
