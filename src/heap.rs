//! Heap-driven merge traversal across one or more sets.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::decoration::{Collapsed, Decoration, Descriptor};
use crate::set::DecorationSet;
use crate::widget::WidgetHandle;

/// Consumed by [`build_line_elements`] as it walks decorations in position
/// order. `open`/`close` track the caller's notion of "currently active
/// range descriptors" — the core only tells it when a range opens or
/// closes, never holds that list itself.
pub trait LineElementBuilder<W: WidgetHandle> {
    /// The cursor has advanced to `pos` with no open collapse in effect.
    fn advance(&mut self, pos: u32);
    /// The cursor has advanced to `pos` while inside a collapsed range.
    fn advance_collapsed(&mut self, pos: u32);
    fn add_widget(&mut self, widget: &W, side: i32);
    fn open(&mut self, desc: Rc<Descriptor<W>>);
    fn close(&mut self, desc: &Rc<Descriptor<W>>);
}

enum EventKind<W> {
    /// A node not yet descended into; opening it pushes its own locals and
    /// its children's frames. `offset` is the node's absolute start.
    Frame { offset: u32, node: Rc<DecorationSet<W>> },
    /// A single local decoration, already resolved to absolute coordinates.
    Item(Decoration<W>),
    /// A previously-opened range, pending its close event at `to`.
    ActiveRange { to: u32, bias: i64, desc: Rc<Descriptor<W>> },
}

struct Event<W> {
    pos: i64,
    bias: i64,
    kind: EventKind<W>,
}

impl<W> Event<W> {
    fn frame(offset: u32, node: Rc<DecorationSet<W>>) -> Self {
        // i64::MIN so a frame opens before any real item at the exact same
        // position — harmless either way, but keeps descent eager.
        Event { pos: offset as i64, bias: i64::MIN, kind: EventKind::Frame { offset, node } }
    }
}

impl<W: WidgetHandle> Event<W> {
    fn item(d: Decoration<W>) -> Self {
        let bias = d.bias();
        Event { pos: d.from as i64, bias, kind: EventKind::Item(d) }
    }

    fn active_range(to: u32, bias: i64, desc: Rc<Descriptor<W>>) -> Self {
        Event { pos: to as i64, bias, kind: EventKind::ActiveRange { to, bias, desc } }
    }
}

impl<W> PartialEq for Event<W> {
    fn eq(&self, other: &Self) -> bool {
        (self.pos, self.bias) == (other.pos, other.bias)
    }
}
impl<W> Eq for Event<W> {}
impl<W> PartialOrd for Event<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<W> Ord for Event<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.pos, self.bias).cmp(&(other.pos, other.bias))
    }
}

/// Pushes every event a node can immediately offer: its own `local`
/// decorations (skipping ones that end before `from`) and a `Frame` for
/// each child whose span reaches at least `from`. Deeper content stays
/// unopened until its frame becomes the heap minimum.
fn open_frame<W: WidgetHandle>(
    heap: &mut BinaryHeap<Reverse<Event<W>>>,
    offset: u32,
    node: &Rc<DecorationSet<W>>,
    from: u32,
) {
    for d in &node.local {
        let to_abs = d.to + offset;
        if to_abs < from {
            continue;
        }
        let from_abs = d.from + offset;
        heap.push(Reverse(Event::item(Decoration { from: from_abs, to: to_abs, desc: d.desc.clone() })));
    }
    let mut pos = offset;
    for child in &node.children {
        let child_end = pos + child.length;
        if child_end >= from {
            heap.push(Reverse(Event::frame(pos, child.clone())));
        }
        pos = child_end;
    }
}

/// Yields decorations intersecting `[from, to]` in position order, merged
/// across every set in `sets`, driving `builder` as it goes.
pub fn build_line_elements<W: WidgetHandle>(
    sets: &[DecorationSet<W>],
    from: u32,
    to: u32,
    builder: &mut dyn LineElementBuilder<W>,
    height_only: bool,
) {
    let mut heap: BinaryHeap<Reverse<Event<W>>> = BinaryHeap::new();
    for set in sets {
        let root = Rc::new(set.clone());
        open_frame(&mut heap, 0, &root, from);
    }

    while let Some(Reverse(event)) = heap.pop() {
        match event.kind {
            EventKind::Frame { offset, node } => open_frame(&mut heap, offset, &node, from),
            EventKind::Item(d) => {
                if d.from > to {
                    break;
                }
                match d.desc.as_ref() {
                    Descriptor::Range(r) => {
                        if r.affects_spans() || (height_only && r.collapsed.is_some()) {
                            builder.advance(d.from);
                            if let Some(collapsed) = &r.collapsed {
                                if let Collapsed::Widget(w) = collapsed {
                                    builder.add_widget(w, 0);
                                }
                                builder.advance_collapsed(d.to.min(to));
                            } else {
                                builder.open(d.desc.clone());
                                heap.push(Reverse(Event::active_range(d.to, r.end_bias(), d.desc.clone())));
                            }
                        }
                    }
                    Descriptor::Point(p) => {
                        if let Some(w) = &p.widget {
                            if !height_only || w.estimated_height() > -1.0 {
                                builder.advance(d.from);
                                builder.add_widget(w, p.side);
                            }
                        }
                    }
                }
            }
            EventKind::ActiveRange { to: close_to, desc, .. } => {
                if close_to >= to {
                    break;
                }
                builder.advance(close_to);
                builder.close(&desc);
            }
        }
    }
    builder.advance(to);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{PointDescriptor, RangeDescriptor};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct NoWidget;
    impl WidgetHandle for NoWidget {
        fn eq_spec(&self, _other: &Self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingBuilder {
        advances: Vec<u32>,
        opened: Vec<()>,
        closed: Vec<()>,
        widgets: Vec<(NoWidget, i32)>,
    }

    impl LineElementBuilder<NoWidget> for RecordingBuilder {
        fn advance(&mut self, pos: u32) {
            self.advances.push(pos);
        }
        fn advance_collapsed(&mut self, pos: u32) {
            self.advances.push(pos);
        }
        fn add_widget(&mut self, widget: &NoWidget, side: i32) {
            self.widgets.push((widget.clone(), side));
        }
        fn open(&mut self, _desc: Rc<Descriptor<NoWidget>>) {
            self.opened.push(());
        }
        fn close(&mut self, _desc: &Rc<Descriptor<NoWidget>>) {
            self.closed.push(());
        }
    }

    fn attr_range(from: u32, to: u32) -> Decoration<NoWidget> {
        let desc = RangeDescriptor { class: Some("x".into()), ..Default::default() };
        Decoration::range(from, to, desc).unwrap()
    }

    #[test]
    fn range_opens_and_closes_once() {
        let set = DecorationSet::of(vec![attr_range(5, 10)]);
        let mut builder = RecordingBuilder::default();
        build_line_elements(&[set], 0, 20, &mut builder, false);
        assert_eq!(builder.opened.len(), 1);
        assert_eq!(builder.closed.len(), 1);
        assert_eq!(builder.advances, vec![5, 10, 20]);
    }

    #[test]
    fn point_widget_is_reported_at_its_position() {
        let desc = PointDescriptor { side: 1, widget: Some(NoWidget), line_attributes: Default::default() };
        let set = DecorationSet::of(vec![Decoration::point(7, desc)]);
        let mut builder = RecordingBuilder::default();
        build_line_elements(&[set], 0, 20, &mut builder, false);
        assert_eq!(builder.widgets.len(), 1);
        assert_eq!(builder.widgets[0].1, 1);
        assert!(builder.advances.contains(&7));
    }

    #[test]
    fn collapsed_range_is_consumed_without_reopening() {
        let desc = RangeDescriptor { collapsed: Some(Collapsed::Plain), ..Default::default() };
        let set = DecorationSet::of(vec![Decoration::range(0, 10, desc).unwrap()]);
        let mut builder = RecordingBuilder::default();
        build_line_elements(&[set], 0, 20, &mut builder, false);
        assert!(builder.opened.is_empty());
        assert!(builder.closed.is_empty());
    }

    #[test]
    fn merges_across_multiple_sets_in_position_order() {
        let a = DecorationSet::of(vec![attr_range(0, 3)]);
        let b = DecorationSet::of(vec![attr_range(5, 8)]);
        let mut builder = RecordingBuilder::default();
        build_line_elements(&[a, b], 0, 20, &mut builder, false);
        assert_eq!(builder.advances, vec![0, 3, 5, 8, 20]);
    }
}
