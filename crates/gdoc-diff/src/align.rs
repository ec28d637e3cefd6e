//! Block alignment.
//!
//! Two-pass alignment over a segment's structural blocks:
//!
//! 1. **Exact content match** — blocks with identical content fingerprints
//!    are paired first, earliest unclaimed pristine block wins.
//! 2. **Structural key match** — remaining blocks pair up by structural key
//!    (`para:<tag>` / `table` / `toc`), again first-unclaimed-wins.
//!
//! The output is interleaved so current-document order is preserved, with
//! deletions flushed between the matches that surround them.

use std::collections::{HashMap, HashSet, VecDeque};

use gdoc_model::{StructuralBlock, TableRowBlock};

use crate::change::AlignedPair;

/// Align two lists of structural blocks.
pub fn align_blocks(pristine: &[StructuralBlock], current: &[StructuralBlock]) -> Vec<AlignedPair> {
    let mut matched_pristine: HashSet<usize> = HashSet::new();
    let mut matched_current: HashSet<usize> = HashSet::new();
    let mut alignment: Vec<(usize, usize)> = Vec::new();

    // -----------------------------------------------------------------------
    // Pass 1: exact content matches
    // -----------------------------------------------------------------------
    let mut pristine_by_content: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, block) in pristine.iter().enumerate() {
        pristine_by_content
            .entry(block.content_fingerprint())
            .or_default()
            .push(i);
    }

    for (j, block) in current.iter().enumerate() {
        if let Some(candidates) = pristine_by_content.get(&block.content_fingerprint()) {
            if let Some(&i) = candidates.iter().find(|i| !matched_pristine.contains(i)) {
                alignment.push((i, j));
                matched_pristine.insert(i);
                matched_current.insert(j);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pass 2: structural key match for remaining unmatched blocks
    // -----------------------------------------------------------------------
    let mut pristine_by_key: HashMap<String, VecDeque<usize>> = HashMap::new();
    for (i, block) in pristine.iter().enumerate() {
        if !matched_pristine.contains(&i) {
            pristine_by_key
                .entry(block.structural_key())
                .or_default()
                .push_back(i);
        }
    }

    for (j, block) in current.iter().enumerate() {
        if matched_current.contains(&j) {
            continue;
        }
        if let Some(candidates) = pristine_by_key.get_mut(&block.structural_key()) {
            if let Some(i) = candidates.pop_front() {
                alignment.push((i, j));
                matched_pristine.insert(i);
                matched_current.insert(j);
            }
        }
    }

    interleave(
        &alignment,
        pristine.len(),
        current.len(),
        &matched_pristine,
        &matched_current,
    )
}

/// Interleave matches, additions, and deletions in current document order.
fn interleave(
    alignment: &[(usize, usize)],
    pristine_len: usize,
    current_len: usize,
    matched_pristine: &HashSet<usize>,
    matched_current: &HashSet<usize>,
) -> Vec<AlignedPair> {
    let c_to_p: HashMap<usize, usize> = alignment.iter().map(|&(p, c)| (c, p)).collect();

    let deleted_p: Vec<usize> = (0..pristine_len)
        .filter(|i| !matched_pristine.contains(i))
        .collect();

    let mut result: Vec<AlignedPair> = Vec::new();
    let mut del_ptr = 0;
    let mut last_matched_p: i64 = -1;

    for c_idx in 0..current_len {
        if let Some(&p_idx) = c_to_p.get(&c_idx) {
            // Flush deletions whose pristine index falls between the
            // previous matched pristine index and this one.
            while del_ptr < deleted_p.len()
                && (deleted_p[del_ptr] as i64) > last_matched_p
                && deleted_p[del_ptr] < p_idx
            {
                result.push(AlignedPair::deleted(deleted_p[del_ptr]));
                del_ptr += 1;
            }
            result.push(AlignedPair::matched(p_idx, c_idx));
            last_matched_p = last_matched_p.max(p_idx as i64);
        } else if !matched_current.contains(&c_idx) {
            result.push(AlignedPair::added(c_idx));
        }
    }

    // Flush remaining deletions.
    while del_ptr < deleted_p.len() {
        result.push(AlignedPair::deleted(deleted_p[del_ptr]));
        del_ptr += 1;
    }

    result
}

/// Align table rows by id, with positional fallback for duplicate ids.
pub fn align_table_rows(
    pristine_rows: &[TableRowBlock],
    current_rows: &[TableRowBlock],
) -> Vec<AlignedPair> {
    let mut p_id_to_indices: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in pristine_rows.iter().enumerate() {
        p_id_to_indices.entry(&row.row_id).or_default().push(i);
    }

    let mut p_id_consumed: HashMap<&str, usize> = HashMap::new();
    let mut matched_p: HashSet<usize> = HashSet::new();
    let mut alignment: Vec<AlignedPair> = Vec::new();

    for (c_i, c_row) in current_rows.iter().enumerate() {
        let slot = p_id_consumed.get(c_row.row_id.as_str()).copied().unwrap_or(0);
        let p_slots = p_id_to_indices
            .get(c_row.row_id.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        if slot < p_slots.len() {
            let p_i = p_slots[slot];
            alignment.push(AlignedPair::matched(p_i, c_i));
            matched_p.insert(p_i);
            p_id_consumed.insert(&c_row.row_id, slot + 1);
        } else {
            alignment.push(AlignedPair::added(c_i));
        }
    }

    for p_i in 0..pristine_rows.len() {
        if !matched_p.contains(&p_i) {
            alignment.push(AlignedPair::deleted(p_i));
        }
    }

    alignment
}
