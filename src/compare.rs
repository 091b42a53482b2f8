//! Structural comparison between two revisions of a decoration set.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::decoration::{Collapsed, Decoration, Descriptor};
use crate::set::DecorationSet;
use crate::widget::WidgetHandle;

/// Dirty regions closer than this (in either direction) are merged into one
/// pair rather than reported separately.
pub const MIN_RANGE_GAP: u32 = 4;

/// A diff tuple describing how an old-document span maps onto a new-document
/// span. Produced by an external text-diff collaborator; the core only
/// consumes a sorted, non-overlapping sequence of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    pub from_a: u32,
    pub to_a: u32,
    pub from_b: u32,
    pub to_b: u32,
}

/// The result of [`DecorationSet::changed_ranges`]: even-length, ascending
/// `[from, to, from, to, ...]` pairs in new-document coordinates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Changes {
    pub content: Vec<u32>,
    pub height: Vec<u32>,
}

/// Extends `ranges` with `[from, to)`, merging into the last pair when it is
/// within [`MIN_RANGE_GAP`] of it.
fn add_range(ranges: &mut Vec<u32>, from: u32, to: u32) {
    if ranges.len() >= 2 {
        let last_to = ranges[ranges.len() - 1];
        if from <= last_to + MIN_RANGE_GAP {
            let idx = ranges.len() - 1;
            if to > ranges[idx] {
                ranges[idx] = to;
            }
            return;
        }
    }
    ranges.push(from);
    ranges.push(to);
}

/// Merges two already-sorted flat range-pair arrays using `add_range`
/// semantics.
pub fn join_ranges(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut pairs: Vec<(u32, u32)> = a
        .chunks_exact(2)
        .map(|c| (c[0], c[1]))
        .chain(b.chunks_exact(2).map(|c| (c[0], c[1])))
        .collect();
    pairs.sort_unstable_by_key(|p| p.0);
    let mut out = Vec::new();
    for (from, to) in pairs {
        add_range(&mut out, from, to);
    }
    out
}

/// Only range decorations that affect rendering, and only point
/// decorations carrying a widget, can ever produce a visible difference —
/// everything else is irrelevant to `changed_ranges` and is never pushed
/// onto a side's heap at all.
fn interesting<W: WidgetHandle>(desc: &Descriptor<W>) -> bool {
    match desc {
        Descriptor::Range(r) => r.affects_spans(),
        Descriptor::Point(p) => p.widget.is_some(),
    }
}

enum EventKind<W> {
    /// A node not yet descended into; `base` is its absolute offset in the
    /// document this side belongs to.
    Frame { base: u32, node: Rc<DecorationSet<W>> },
    /// A decoration opening, already translated to gap-local coordinates.
    Open(Decoration<W>),
    /// A previously opened range's close, at gap-local position `to`.
    Close { to: i64, desc: Rc<Descriptor<W>> },
}

struct Event<W> {
    pos: i64,
    bias: i64,
    kind: EventKind<W>,
}

impl<W> PartialEq for Event<W> {
    fn eq(&self, other: &Self) -> bool {
        (self.pos, self.bias) == (other.pos, other.bias)
    }
}
impl<W> Eq for Event<W> {}
impl<W> PartialOrd for Event<W> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<W> Ord for Event<W> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.pos, self.bias).cmp(&(other.pos, other.bias))
    }
}

/// Per-document cursor state for one side (`a` or `b`) of a comparison.
struct SideState<W> {
    heap: BinaryHeap<Reverse<Event<W>>>,
    active: Vec<Rc<Descriptor<W>>>,
    widgets: Vec<W>,
    /// Highest `to` (gap-local) of any collapsed range opened so far; `-1`
    /// when nothing is collapsed.
    collapsed_to: i64,
}

impl<W: WidgetHandle> SideState<W> {
    fn new() -> Self {
        SideState { heap: BinaryHeap::new(), active: Vec::new(), widgets: Vec::new(), collapsed_to: -1 }
    }
}

/// Pushes every event reachable from `node` (whose local-coordinate origin
/// sits at absolute position `node_offset`) that falls inside `[gap_from,
/// gap_to]`, translating positions to be relative to `gap_from`. A
/// decoration that started before `gap_from` but is still open is seeded
/// directly into `side.active` instead of as an `Open` event — it has
/// nothing to "open" inside this gap.
fn seed_node<W: WidgetHandle>(
    side: &mut SideState<W>,
    node_offset: u32,
    node: &Rc<DecorationSet<W>>,
    gap_from: u32,
    gap_to: u32,
) {
    for d in &node.local {
        if !interesting(d.desc.as_ref()) {
            continue;
        }
        let to_abs = d.to + node_offset;
        if to_abs < gap_from {
            continue;
        }
        let from_abs = d.from + node_offset;
        if from_abs > gap_to {
            continue;
        }
        if from_abs < gap_from {
            if let Descriptor::Range(r) = d.desc.as_ref() {
                side.active.push(d.desc.clone());
                if let Some(Collapsed::Widget(w)) = &r.collapsed {
                    side.widgets.push(w.clone());
                }
                let rel_to = (to_abs - gap_from) as i64;
                if r.collapsed.is_some() {
                    side.collapsed_to = side.collapsed_to.max(rel_to);
                }
                side.heap.push(Reverse(Event {
                    pos: rel_to,
                    bias: r.end_bias(),
                    kind: EventKind::Close { to: rel_to, desc: d.desc.clone() },
                }));
            }
            continue;
        }
        let rel = Decoration { from: from_abs - gap_from, to: to_abs - gap_from, desc: d.desc.clone() };
        side.heap.push(Reverse(Event { pos: rel.from as i64, bias: d.desc.start_bias(), kind: EventKind::Open(rel) }));
    }

    let mut pos = node_offset;
    for child in &node.children {
        let child_end = pos + child.length;
        if child_end >= gap_from && pos <= gap_to {
            let key = (pos.max(gap_from) - gap_from) as i64;
            side.heap.push(Reverse(Event { pos: key, bias: i64::MIN, kind: EventKind::Frame { base: pos, node: child.clone() } }));
        }
        pos = child_end;
    }
}

fn compare_active_sets<W: WidgetHandle>(x: &[Rc<Descriptor<W>>], y: &[Rc<Descriptor<W>>]) -> bool {
    x.len() == y.len() && x.iter().all(|d| y.iter().any(|o| Rc::ptr_eq(d, o) || d.eq_spec(o)))
}

fn compare_widget_sets<W: WidgetHandle>(x: &[W], y: &[W]) -> bool {
    x.len() == y.len() && x.iter().all(|w| y.iter().any(|o| w.compare(o)))
}

/// Drives a single aligned gap's comparison. `off_b` is the gap's start in
/// new-document coordinates, used to translate the gap-local positions this
/// struct works in back into the coordinates `Changes` is reported in.
struct Comparison<W> {
    a: SideState<W>,
    b: SideState<W>,
    a_gap_from: u32,
    a_gap_to: u32,
    b_gap_from: u32,
    b_gap_to: u32,
    off_b: u32,
    pos: i64,
    end: i64,
    content: Vec<u32>,
    height: Vec<u32>,
}

impl<W: WidgetHandle> Comparison<W> {
    fn new(a: &DecorationSet<W>, off_a: u32, b: &DecorationSet<W>, off_b: u32, len: u32) -> Self {
        let mut side_a = SideState::new();
        seed_node(&mut side_a, 0, &Rc::new(a.clone()), off_a, off_a + len);
        let mut side_b = SideState::new();
        seed_node(&mut side_b, 0, &Rc::new(b.clone()), off_b, off_b + len);
        Comparison {
            a: side_a,
            b: side_b,
            a_gap_from: off_a,
            a_gap_to: off_a + len,
            b_gap_from: off_b,
            b_gap_to: off_b + len,
            off_b,
            pos: 0,
            end: len as i64,
            content: Vec::new(),
            height: Vec::new(),
        }
    }

    fn expand_frame(&mut self, on_a: bool) {
        let top = if on_a { self.a.heap.pop() } else { self.b.heap.pop() };
        if let Some(Reverse(Event { kind: EventKind::Frame { base, node }, .. })) = top {
            if on_a {
                seed_node(&mut self.a, base, &node, self.a_gap_from, self.a_gap_to);
            } else {
                seed_node(&mut self.b, base, &node, self.b_gap_from, self.b_gap_to);
            }
        }
    }

    fn peek_key(&self, on_a: bool) -> Option<(i64, i64)> {
        let heap = if on_a { &self.a.heap } else { &self.b.heap };
        heap.peek().map(|Reverse(e)| (e.pos, e.bias))
    }

    fn is_frame(&self, on_a: bool) -> bool {
        let heap = if on_a { &self.a.heap } else { &self.b.heap };
        matches!(heap.peek(), Some(Reverse(Event { kind: EventKind::Frame { .. }, .. })))
    }

    fn run(mut self) -> (Vec<u32>, Vec<u32>) {
        loop {
            while self.is_frame(true) {
                self.expand_frame(true);
            }
            while self.is_frame(false) {
                self.expand_frame(false);
            }
            let (use_a, key) = match (self.peek_key(true), self.peek_key(false)) {
                (None, None) => break,
                (Some(ka), None) => (true, ka),
                (None, Some(kb)) => (false, kb),
                (Some(ka), Some(kb)) => {
                    if ka <= kb {
                        (true, ka)
                    } else {
                        (false, kb)
                    }
                }
            };
            if key.0 > self.end {
                break;
            }
            let event = if use_a { self.a.heap.pop() } else { self.b.heap.pop() }.unwrap().0;
            match event.kind {
                EventKind::Frame { .. } => unreachable!("frames are drained before picking the minimum"),
                EventKind::Open(d) => self.handle_open(use_a, d),
                EventKind::Close { to, desc } => self.handle_close(use_a, to, desc),
            }
        }
        self.advance_pos(self.end);
        (self.content, self.height)
    }

    fn other_collapsed_to(&self, on_a: bool) -> i64 {
        if on_a {
            self.b.collapsed_to
        } else {
            self.a.collapsed_to
        }
    }

    fn handle_open(&mut self, on_a: bool, d: Decoration<W>) {
        match d.desc.as_ref() {
            Descriptor::Range(r) => {
                self.advance_pos(d.from as i64);
                let collapsed_end = if r.collapsed.is_some() { Some(d.to as i64) } else { None };
                {
                    let side = if on_a { &mut self.a } else { &mut self.b };
                    side.active.push(d.desc.clone());
                    if let Some(Collapsed::Widget(w)) = &r.collapsed {
                        side.widgets.push(w.clone());
                    }
                    if let Some(to) = collapsed_end {
                        side.collapsed_to = side.collapsed_to.max(to);
                    }
                    side.heap.push(Reverse(Event { pos: d.to as i64, bias: r.end_bias(), kind: EventKind::Close { to: d.to as i64, desc: d.desc.clone() } }));
                }
                let this_collapsed_to = if on_a { self.a.collapsed_to } else { self.b.collapsed_to };
                let other_collapsed_to = self.other_collapsed_to(on_a);
                if this_collapsed_to > self.pos && other_collapsed_to > self.pos {
                    self.pos = this_collapsed_to.min(other_collapsed_to).max(self.pos);
                }
            }
            Descriptor::Point(p) => {
                self.advance_pos(d.from as i64);
                if let Some(w) = &p.widget {
                    let side = if on_a { &mut self.a } else { &mut self.b };
                    side.widgets.push(w.clone());
                }
            }
        }
    }

    fn handle_close(&mut self, on_a: bool, to: i64, desc: Rc<Descriptor<W>>) {
        self.advance_pos(to);
        let side = if on_a { &mut self.a } else { &mut self.b };
        if let Some(idx) = side.active.iter().position(|d| Rc::ptr_eq(d, &desc)) {
            side.active.remove(idx);
        }
    }

    /// Flushes whatever difference has accumulated between `self.pos` and
    /// `pos` into `content`/`height`.
    fn advance_pos(&mut self, pos: i64) {
        let pos = pos.min(self.end);
        if pos <= self.pos {
            return;
        }
        if !self.a.widgets.is_empty() || !self.b.widgets.is_empty() {
            if !compare_widget_sets(&self.a.widgets, &self.b.widgets) {
                let at = (self.off_b as i64 + pos) as u32;
                add_range(&mut self.content, at, at);
                add_range(&mut self.height, at, at);
            }
            self.a.widgets.clear();
            self.b.widgets.clear();
        }
        if !compare_active_sets(&self.a.active, &self.b.active) {
            let from = (self.off_b as i64 + self.pos) as u32;
            let to = (self.off_b as i64 + pos) as u32;
            add_range(&mut self.content, from, to);
            let a_collapsed = self.a.collapsed_to > self.pos;
            let b_collapsed = self.b.collapsed_to > self.pos;
            if a_collapsed != b_collapsed {
                add_range(&mut self.height, from, to);
            }
        }
        self.pos = pos;
    }
}

fn compare_gap<W: WidgetHandle>(
    a: &DecorationSet<W>,
    off_a: u32,
    b: &DecorationSet<W>,
    off_b: u32,
    len: u32,
) -> (Vec<u32>, Vec<u32>) {
    Comparison::new(a, off_a, b, off_b, len).run()
}

impl<W: WidgetHandle> DecorationSet<W> {
    /// Compares `self` (the old revision) against `other` (the new one)
    /// across the aligned gaps `diff` leaves between its changed regions,
    /// returning the minimal set of new-document regions whose content or
    /// height needs redrawing.
    ///
    /// This implementation always walks every gap rather than special-casing
    /// "both sides reference the identical subtree at aligned offsets" — see
    /// `DESIGN.md` for why that subtree-sharing fast path was left out.
    pub fn changed_ranges(&self, other: &Self, diff: &[ChangedRange]) -> Changes {
        let mut content = Vec::new();
        let mut height = Vec::new();
        let mut prev_a = 0u32;
        let mut prev_b = 0u32;
        for range in diff {
            let len = range.from_b - prev_b;
            let (gap_content, gap_height) = compare_gap(self, prev_a, other, prev_b, len);
            content = join_ranges(&content, &gap_content);
            height = join_ranges(&height, &gap_height);
            prev_a = range.to_a;
            prev_b = range.to_b;
        }
        let tail = (self.length.saturating_sub(prev_a)).min(other.length.saturating_sub(prev_b));
        let (gap_content, gap_height) = compare_gap(self, prev_a, other, prev_b, tail);
        content = join_ranges(&content, &gap_content);
        height = join_ranges(&height, &gap_height);
        Changes { content, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::RangeDescriptor;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct NoWidget;
    impl WidgetHandle for NoWidget {
        fn eq_spec(&self, _other: &Self) -> bool {
            true
        }
    }

    fn attr_range(from: u32, to: u32) -> Decoration<NoWidget> {
        Decoration::range(from, to, RangeDescriptor { class: Some("x".into()), ..Default::default() }).unwrap()
    }

    fn collapsed_range(from: u32, to: u32) -> Decoration<NoWidget> {
        Decoration::range(from, to, RangeDescriptor { collapsed: Some(Collapsed::Plain), ..Default::default() }).unwrap()
    }

    #[test]
    fn join_ranges_merges_close_pairs() {
        let joined = join_ranges(&[0, 5], &[6, 10]);
        assert_eq!(joined, vec![0, 10]);
        let joined = join_ranges(&[0, 5], &[20, 30]);
        assert_eq!(joined, vec![0, 5, 20, 30]);
    }

    #[test]
    fn removed_range_reports_gaps_around_the_changed_region() {
        let a = DecorationSet::of(vec![attr_range(0, 20)]);
        let b = DecorationSet { length: 30, size: 0, local: Vec::new(), children: Vec::new() };
        let diff = [ChangedRange { from_a: 5, to_a: 15, from_b: 5, to_b: 25 }];
        let changes = a.changed_ranges(&b, &diff);
        assert_eq!(changes.content, vec![0, 5, 25, 30]);
    }

    #[test]
    fn added_collapsed_range_extends_the_dirty_region() {
        let mut a = DecorationSet::of(vec![collapsed_range(3, 50)]);
        a.length = 80;
        let b = a.update(vec![collapsed_range(40, 80)], None, 0, 0);
        let changes = a.changed_ranges(&b, &[]);
        assert_eq!(changes.content, vec![50, 80]);
    }

    #[test]
    fn addition_fully_inside_a_collapsed_range_is_invisible() {
        let mut a = DecorationSet::of(vec![collapsed_range(0, 100)]);
        a.length = 100;
        // Adding an attribute range entirely inside the collapsed span changes
        // nothing on screen: the text is hidden either way.
        let b = a.update(vec![attr_range(40, 60)], None, 0, 0);
        let changes = a.changed_ranges(&b, &[]);
        assert!(changes.content.is_empty(), "{:?}", changes.content);
    }

    #[test]
    fn identical_sets_report_no_changes() {
        let a = DecorationSet::of(vec![attr_range(0, 10), attr_range(20, 30)]);
        let b = a.update(Vec::new(), None, 0, 0);
        let changes = a.changed_ranges(&b, &[]);
        assert!(changes.content.is_empty());
        assert!(changes.height.is_empty());
    }
}
