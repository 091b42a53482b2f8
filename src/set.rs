//! The persistent decoration tree the rest of the crate is built around.

use std::rc::Rc;

use crate::decoration::{decoration_cmp, Decoration, Descriptor};
use crate::position::{touches_change, Change};
use crate::widget::WidgetHandle;

/// Target leaf fill.
pub const BASE_NODE_SIZE: u32 = 32;
const BASE_NODE_SIZE_SHIFT: u32 = 5;

/// A predicate used by [`DecorationSet::update`] to decide whether an
/// existing decoration inside the filter window survives.
pub type Filter<'a, W> = dyn Fn(u32, u32, &Descriptor<W>) -> bool + 'a;

/// An immutable tree node holding a subset of decorations locally and the
/// rest in child subtrees.
///
/// Every public method returns a new `DecorationSet`; unmodified subtrees
/// are shared with the input via cloned `Rc` pointers rather than copied.
#[derive(Debug, Clone)]
pub struct DecorationSet<W> {
    pub length: u32,
    pub size: u32,
    pub local: Vec<Decoration<W>>,
    pub children: Vec<Rc<DecorationSet<W>>>,
}

impl<W: WidgetHandle> Default for DecorationSet<W> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Checked with `debug_assert!` at the exit of every operation that builds a
/// new node (`update`, `map`, `rebalance`) — a violation here is a bug in
/// this crate, not a caller error, so it is never surfaced through `Error`.
fn check_invariants<W: WidgetHandle>(node: &DecorationSet<W>) {
    debug_assert_eq!(
        node.size,
        node.local.len() as u32 + node.children.iter().map(|c| c.size).sum::<u32>(),
        "size must equal local decorations plus children sizes"
    );
    debug_assert!(
        node.children.iter().map(|c| c.length).sum::<u32>() <= node.length,
        "children lengths must not exceed the node's own length"
    );
    debug_assert!(
        node.local.windows(2).all(|w| decoration_cmp(&w[0], &w[1]) != std::cmp::Ordering::Greater),
        "local must stay sorted by (from, bias)"
    );
    debug_assert!(node.local.iter().all(|d| d.to <= node.length), "local decorations must fit within length");
}

impl<W: WidgetHandle> DecorationSet<W> {
    /// The empty set. Constructing it is a handful of empty `Vec`s, so
    /// there's no need to actually intern a single shared instance.
    pub fn empty() -> Self {
        DecorationSet { length: 0, size: 0, local: Vec::new(), children: Vec::new() }
    }

    /// Builds a fresh set from a batch of decorations.
    pub fn of(decorations: Vec<Decoration<W>>) -> Self {
        Self::empty().update(decorations, None, 0, 0)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Flattens the whole subtree into one decoration-ordered `Vec`. Not on
    /// any hot path — callers needing ordered traversal over a live range
    /// should use [`crate::heap::build_line_elements`] instead.
    pub fn collect(&self) -> Vec<Decoration<W>> {
        let mut out = Vec::with_capacity(self.size as usize);
        self.collect_into(0, &mut out);
        out.sort_by(decoration_cmp);
        out
    }

    fn collect_into(&self, offset: u32, out: &mut Vec<Decoration<W>>) {
        for d in &self.local {
            out.push(Decoration { from: d.from + offset, to: d.to + offset, desc: d.desc.clone() });
        }
        let mut pos = offset;
        for child in &self.children {
            child.collect_into(pos, out);
            pos += child.length;
        }
    }

    /// Adds `new_decorations`, and drops every existing decoration inside
    /// `[filter_from, filter_to]` for which `filter` returns `false`.
    /// `filter = None` keeps everything — the "just add more decorations"
    /// case.
    pub fn update(
        &self,
        new_decorations: Vec<Decoration<W>>,
        filter: Option<&Filter<'_, W>>,
        filter_from: u32,
        filter_to: u32,
    ) -> Self {
        let mut sorted = new_decorations;
        sorted.sort_by(decoration_cmp);
        self.update_rec(&sorted, filter, filter_from as i64, filter_to as i64).0
    }

    /// Returns the updated subtree alongside whether it actually differs
    /// from `self`, so callers can reuse the original `Rc` (rather than
    /// allocating a new one around an unchanged clone) when recursing into
    /// a child produced no real change.
    fn update_rec(
        &self,
        new_decos: &[Decoration<W>],
        filter: Option<&Filter<'_, W>>,
        filter_from: i64,
        filter_to: i64,
    ) -> (Self, bool) {
        let added_max = new_decos.iter().map(|d| d.to).max().unwrap_or(0);
        let new_length = self.length.max(added_max);

        // Step 1: filter locals.
        let mut local_changed = false;
        let mut node_local: Vec<Decoration<W>> = if self.local.is_empty() {
            Vec::new()
        } else {
            let mut kept = Vec::with_capacity(self.local.len());
            for d in &self.local {
                let keep = filter_from > d.to as i64
                    || filter_to < d.from as i64
                    || filter.map_or(true, |f| f(d.from, d.to, &d.desc));
                if keep {
                    kept.push(d.clone());
                } else {
                    local_changed = true;
                }
            }
            kept
        };

        // Step 2: distribute additions across existing children.
        let mut new_children: Vec<Rc<DecorationSet<W>>> = Vec::with_capacity(self.children.len());
        let mut children_changed = false;
        let mut cursor = 0usize;
        let mut pos: u32 = 0;
        for child in &self.children {
            let child_end = pos + child.length;
            let mut bucket: Vec<Decoration<W>> = Vec::new();
            while cursor < new_decos.len() && new_decos[cursor].from < child_end {
                let d = &new_decos[cursor];
                if d.to > child_end {
                    // Straddles this child's boundary: lives at this node instead.
                    node_local.push(Decoration { from: d.from - pos, to: d.to - pos, desc: d.desc.clone() });
                    local_changed = true;
                } else {
                    bucket.push(Decoration { from: d.from - pos, to: d.to - pos, desc: d.desc.clone() });
                }
                cursor += 1;
            }

            let child_filter_from = filter_from - pos as i64;
            let child_filter_to = filter_to - pos as i64;
            let window_intersects = child_filter_from <= child.length as i64 && child_filter_to >= 0;

            if bucket.is_empty() && !window_intersects {
                new_children.push(child.clone());
            } else {
                // Bucket entries all satisfy `to <= child.length` by construction above, so
                // this recursion can never grow the child past its current length.
                let (updated, changed) = child.update_rec(&bucket, filter, child_filter_from, child_filter_to);
                if changed {
                    children_changed = true;
                    new_children.push(Rc::new(updated));
                } else {
                    new_children.push(child.clone());
                }
            }
            pos = child_end;
        }

        // Step 3: anything left over starts past every existing child.
        let remaining = &new_decos[cursor..];
        if !remaining.is_empty() {
            children_changed = true;
            let existing_size: u32 = node_local.len() as u32
                + new_children.iter().map(|c| c.size).sum::<u32>();
            let total_size = existing_size + remaining.len() as u32;
            let child_size = BASE_NODE_SIZE.max(total_size >> BASE_NODE_SIZE_SHIFT);

            let mut i = 0usize;
            while i < remaining.len() {
                let mut end = (i + child_size as usize).min(remaining.len());
                let mut boundary = remaining[i..end].iter().map(|d| d.to).max().unwrap();
                while end < remaining.len() && remaining[end].from < boundary {
                    boundary = boundary.max(remaining[end].to);
                    end += 1;
                }
                let group: Vec<Decoration<W>> = remaining[i..end]
                    .iter()
                    .map(|d| Decoration { from: d.from - pos, to: d.to - pos, desc: d.desc.clone() })
                    .collect();
                let mut child = DecorationSet::empty().update_rec(&group, None, 0, 0).0;
                child.length = child.length.max(boundary - pos);
                pos = boundary;
                new_children.push(Rc::new(child));
                i = end;
            }
        }

        // Early exit: nothing changed anywhere in this subtree.
        if !local_changed && !children_changed {
            return (self.clone(), false);
        }

        node_local.sort_by(decoration_cmp);
        let total_size = node_local.len() as u32 + new_children.iter().map(|c| c.size).sum::<u32>();

        if total_size <= BASE_NODE_SIZE {
            // Step 4: small-node collapse.
            let mut flat = node_local;
            let mut p = 0u32;
            for child in &new_children {
                child.collect_into(p, &mut flat);
                p += child.length;
            }
            flat.sort_by(decoration_cmp);
            let leaf = DecorationSet { length: new_length, size: total_size, local: flat, children: Vec::new() };
            check_invariants(&leaf);
            return (leaf, true);
        }

        let node = DecorationSet { length: new_length, size: total_size, local: node_local, children: new_children };
        let node = rebalance(node);
        check_invariants(&node);
        (node, true)
    }

    /// Maps every surviving decoration through `changes`, sharing any
    /// subtree no change touches.
    pub fn map(&self, changes: &[Change]) -> Self {
        let (set, _escaped, _changed) = self.map_rec(0, changes);
        if set.size == 0 {
            // A full-document deletion collapses to a bare empty leaf, even if
            // the recursive walk left behind zero-size child husks.
            DecorationSet { length: set.length, size: 0, local: Vec::new(), children: Vec::new() }
        } else {
            set
        }
    }

    /// `old_offset` is this subtree's absolute start position in the
    /// document *before* `changes`. Returns the mapped subtree together
    /// with any decorations that escaped its new `[0, length)` — expressed
    /// in this subtree's own new-coordinate space, for the caller to either
    /// absorb as a local or re-escalate further up.
    fn map_rec(&self, old_offset: u32, changes: &[Change]) -> (Self, Vec<Decoration<W>>, bool) {
        let new_offset = boundary_pos(old_offset, changes);
        let new_length = boundary_pos(old_offset + self.length, changes) - new_offset;

        let mut escaped = Vec::new();
        let mut local_changed = false;
        let mut node_local = Vec::with_capacity(self.local.len());
        for d in &self.local {
            match d.map(changes, old_offset, new_offset) {
                Some(mapped) if mapped.from <= new_length && mapped.to <= new_length => {
                    node_local.push(mapped);
                }
                Some(mapped) => {
                    local_changed = true;
                    escaped.push(mapped);
                }
                None => {
                    local_changed = true;
                }
            }
        }
        local_changed |= node_local.len() != self.local.len();

        let mut new_children: Vec<Rc<DecorationSet<W>>> = Vec::with_capacity(self.children.len());
        let mut children_changed = false;
        let mut old_pos = old_offset;
        let mut new_pos = 0u32; // running offset of the next child, relative to this node's new start.
        for child in &self.children {
            let child_old_end = old_pos + child.length;
            if !touches_change(old_pos, child_old_end, changes) {
                let child_new_length = boundary_pos(child_old_end, changes) - boundary_pos(old_pos, changes);
                if child_new_length == child.length {
                    new_children.push(child.clone());
                } else {
                    children_changed = true;
                    let mut shared = (**child).clone();
                    shared.length = child_new_length;
                    new_children.push(Rc::new(shared));
                }
                new_pos += child_new_length;
            } else {
                let (mapped_child, child_escaped, child_changed) = child.map_rec(old_pos, changes);
                let child_new_length = mapped_child.length;
                if child_changed || !child_escaped.is_empty() {
                    children_changed = true;
                    new_children.push(Rc::new(mapped_child));
                } else {
                    new_children.push(child.clone());
                }
                for e in child_escaped {
                    let rel_from = e.from + new_pos;
                    let rel_to = e.to + new_pos;
                    if rel_from <= new_length && rel_to <= new_length {
                        local_changed = true;
                        node_local.push(Decoration { from: rel_from, to: rel_to, desc: e.desc });
                    } else {
                        escaped.push(Decoration { from: rel_from, to: rel_to, desc: e.desc });
                    }
                }
                new_pos += child_new_length;
            }
            old_pos = child_old_end;
        }

        node_local.sort_by(decoration_cmp);
        let total_size = node_local.len() as u32 + new_children.iter().map(|c| c.size).sum::<u32>();
        let length_changed = new_length != self.length;

        if !local_changed && !children_changed && !length_changed {
            return (self.clone(), Vec::new(), false);
        }

        let node = DecorationSet { length: new_length, size: total_size, local: node_local, children: new_children };
        check_invariants(&node);
        (node, escaped, true)
    }
}

/// Maps a tree-boundary position (as opposed to a decoration endpoint) from
/// old document coordinates to new ones. Always sticks to the side after an
/// insertion (`assoc = +1`) and never fails (`track = false`).
fn boundary_pos(pos: u32, changes: &[Change]) -> u32 {
    crate::position::map_pos(pos, changes, 1, false).expect("boundary mapping without track never fails")
}

/// A simplified but invariant-preserving rebalance: drop emptied children,
/// merge adjacent small leaves, and group long runs of undersized children
/// under a wrapper subtree. The "unwrap oversized child" and "pull
/// straddling locals into the new wrapper" steps are folded into the
/// trailing-child construction in `update_rec` instead (which always
/// re-sorts and never produces an oversized child in the first place) —
/// see `DESIGN.md`.
fn rebalance<W: WidgetHandle>(node: DecorationSet<W>) -> DecorationSet<W> {
    let DecorationSet { length, local, children, .. } = node;
    let child_size = BASE_NODE_SIZE.max(
        (local.len() as u32 + children.iter().map(|c| c.size).sum::<u32>()) >> BASE_NODE_SIZE_SHIFT,
    );

    // Pass 1: drop emptied children, folding their length into the previous one.
    let mut pass1: Vec<Rc<DecorationSet<W>>> = Vec::with_capacity(children.len());
    for child in children {
        if child.size == 0 && !pass1.is_empty() {
            let mut prev = (*pass1.last().unwrap()).clone();
            prev.length += child.length;
            *pass1.last_mut().unwrap() = Rc::new(prev);
        } else {
            pass1.push(child);
        }
    }

    // Pass 2: merge adjacent small leaves.
    let mut pass2: Vec<Rc<DecorationSet<W>>> = Vec::with_capacity(pass1.len());
    let mut i = 0;
    while i < pass1.len() {
        let cur = &pass1[i];
        if i + 1 < pass1.len() {
            let next = &pass1[i + 1];
            if cur.is_leaf() && next.is_leaf() && cur.size + next.size <= BASE_NODE_SIZE {
                let mut merged_local = cur.local.clone();
                for d in &next.local {
                    merged_local.push(Decoration { from: d.from + cur.length, to: d.to + cur.length, desc: d.desc.clone() });
                }
                merged_local.sort_by(decoration_cmp);
                pass2.push(Rc::new(DecorationSet {
                    length: cur.length + next.length,
                    size: cur.size + next.size,
                    local: merged_local,
                    children: Vec::new(),
                }));
                i += 2;
                continue;
            }
        }
        pass2.push(cur.clone());
        i += 1;
    }

    // Pass 3: group long runs of undersized children under a wrapper.
    let mut pass3: Vec<Rc<DecorationSet<W>>> = Vec::with_capacity(pass2.len());
    let mut i = 0;
    while i < pass2.len() {
        if pass2[i].size < child_size / 2 {
            let mut j = i;
            let mut acc = 0u32;
            while j < pass2.len() && pass2[j].size < child_size / 2 && acc + pass2[j].size <= child_size {
                acc += pass2[j].size;
                j += 1;
            }
            if j > i + 1 {
                let group = pass2[i..j].to_vec();
                let group_length: u32 = group.iter().map(|c| c.length).sum();
                pass3.push(Rc::new(DecorationSet { length: group_length, size: acc, local: Vec::new(), children: group }));
                i = j;
                continue;
            }
        }
        pass3.push(pass2[i].clone());
        i += 1;
    }

    let size = local.len() as u32 + pass3.iter().map(|c| c.size).sum::<u32>();
    let node = DecorationSet { length, size, local, children: pass3 };
    check_invariants(&node);
    node
}
