//! Identity-keyed diffing of section/row trees with LIS-based move detection
use crate::types::*;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashSet;
use std::hash::Hash;

/// Outcome of matching one ordered level (sections, or rows of a section
/// pair) by identity.
struct LevelMatch {
    /// Old indices with no counterpart in the new list.
    deleted: Vec<usize>,
    /// New indices with no counterpart in the old list.
    inserted: Vec<usize>,
    /// Retained entries as (old index, new index), in new order.
    retained: Vec<(usize, usize)>,
    /// Subset of `retained` whose relative order changed.
    moved: HashSet<usize>,
}

fn match_level<'k, K: Hash + Eq + 'k>(
    old_keys: impl Iterator<Item = &'k K>,
    new_keys: impl Iterator<Item = &'k K>,
) -> LevelMatch {
    let old_key_to_idx: IndexMap<&K, usize> = old_keys.enumerate().map(|(i, k)| (k, i)).collect();

    let mut seen_in_new = HashSet::new();
    let mut inserted = Vec::new();
    let mut retained = Vec::new();
    for (new_idx, key) in new_keys.enumerate() {
        match old_key_to_idx.get(key) {
            Some(&old_idx) => {
                seen_in_new.insert(old_idx);
                retained.push((old_idx, new_idx));
            }
            None => inserted.push(new_idx),
        }
    }

    let deleted = old_key_to_idx
        .values()
        .copied()
        .filter(|i| !seen_in_new.contains(i))
        .collect();

    // Entries on a longest increasing run of old positions keep their
    // relative order; everything else is a move.
    let sequence_for_lis: Vec<usize> = retained.iter().map(|&(old, _)| old).collect();
    let lis_old_indices: HashSet<usize> = longest_increasing_subsequence(&sequence_for_lis)
        .into_iter()
        .map(|i| sequence_for_lis[i])
        .collect();
    let moved = sequence_for_lis
        .iter()
        .copied()
        .filter(|old| !lis_old_indices.contains(old))
        .collect();

    LevelMatch {
        deleted,
        inserted,
        retained,
        moved,
    }
}

/// Indices into `seq` of one longest strictly increasing subsequence.
/// O(n log n); empty input yields an empty result.
pub(crate) fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    if seq.is_empty() {
        return Vec::new();
    }

    let mut predecessors = vec![0; seq.len()];
    let mut indices = vec![0; seq.len()];
    let mut length = 0;

    for (i, &value) in seq.iter().enumerate() {
        let mut low = 0;
        let mut high = length;

        while low < high {
            let mid = low + (high - low) / 2;
            if seq[indices[mid]] < value {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        if low > 0 {
            predecessors[i] = indices[low - 1];
        }
        indices[low] = i;

        if low == length {
            length += 1;
        }
    }

    let mut lis = Vec::with_capacity(length);
    let mut k = indices[length - 1];
    for _ in 0..length {
        lis.push(k);
        k = predecessors[k];
    }
    lis.reverse();
    lis
}

/// Computes the [`DiffPlan`] between two well-formed trees.
///
/// Both trees must already have passed [`Tree::validate`]; with duplicate
/// identities the matching is unspecified.
pub struct DiffEngine<'a> {
    old_tree: &'a Tree,
    new_tree: &'a Tree,
    ops: Vec<TableOp>,
}

impl<'a> DiffEngine<'a> {
    pub fn new(old_tree: &'a Tree, new_tree: &'a Tree) -> Self {
        DiffEngine {
            old_tree,
            new_tree,
            ops: Vec::new(),
        }
    }

    pub fn reconcile(mut self) -> DiffPlan {
        self.diff_sections();
        let plan = DiffPlan::new(self.ops);
        debug!(
            "DiffEngine: {} -> {} sections, {} ops",
            self.old_tree.len(),
            self.new_tree.len(),
            plan.len()
        );
        plan
    }

    fn diff_sections(&mut self) {
        let (old_tree, new_tree): (&'a Tree, &'a Tree) = (self.old_tree, self.new_tree);
        let old = &old_tree.sections;
        let new = &new_tree.sections;
        let level = match_level(old.iter().map(|s| &s.id), new.iter().map(|s| &s.id));

        // Rows of inserted/deleted sections travel with their section.
        for index in level.deleted {
            self.ops.push(TableOp::DeleteSection { index });
        }
        for index in level.inserted {
            self.ops.push(TableOp::InsertSection { index });
        }

        for &(old_idx, new_idx) in &level.retained {
            if level.moved.contains(&old_idx) {
                self.ops.push(TableOp::MoveSection {
                    from: old_idx,
                    to: new_idx,
                });
            }
            let (old_section, new_section) = (&old[old_idx], &new[new_idx]);
            if !old_section.same_decorations(new_section) {
                self.ops.push(TableOp::ReloadSection { index: old_idx });
            }
            self.diff_rows(old_idx, old_section, new_idx, new_section);
        }
    }

    fn diff_rows(&mut self, old_s: usize, old: &Section, new_s: usize, new: &Section) {
        if old.rows.is_empty() && new.rows.is_empty() {
            return;
        }

        let level = match_level(old.rows.iter().map(|r| &r.id), new.rows.iter().map(|r| &r.id));

        for row in level.deleted {
            self.ops.push(TableOp::DeleteRow {
                at: IndexPath::new(old_s, row),
            });
        }
        for row in level.inserted {
            self.ops.push(TableOp::InsertRow {
                at: IndexPath::new(new_s, row),
            });
        }
        for &(old_r, new_r) in &level.retained {
            let from = IndexPath::new(old_s, old_r);
            if level.moved.contains(&old_r) {
                self.ops.push(TableOp::MoveRow {
                    from,
                    to: IndexPath::new(new_s, new_r),
                });
            }
            if old.rows[old_r] != new.rows[new_r] {
                self.ops.push(TableOp::ReloadRow { at: from });
            }
        }
    }
}

/// Convenience wrapper around [`DiffEngine`].
pub fn diff(old_tree: &Tree, new_tree: &Tree) -> DiffPlan {
    DiffEngine::new(old_tree, new_tree).reconcile()
}
