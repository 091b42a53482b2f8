//! Decorations and their descriptors.

use std::rc::Rc;

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::error::{Error, Result};
use crate::position::{map_pos, Change};
use crate::widget::WidgetHandle;

/// Magnitude used for range biases so they always dominate a point's `side`
/// value in `(from, bias)` sort order.
pub const BIAS_MAGNITUDE: i64 = 2_000_000_000;

/// A key/value attribute pair. Kept as a sorted small-vector rather than a
/// hash map — attribute lists on a decoration are almost always 0–3 entries
/// long, so a linear scan over inline storage is both faster and avoids
/// pulling in a hasher purely to compare tiny maps.
pub type Attributes = SmallVec<[(SmartString, SmartString); 4]>;

fn attributes_eq(a: &Attributes, b: &Attributes) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Whether a collapsed range simply hides its text (`Plain`) or replaces it
/// with a widget.
#[derive(Debug, Clone)]
pub enum Collapsed<W> {
    Plain,
    Widget(W),
}

impl<W: WidgetHandle> Collapsed<W> {
    fn eq_spec(&self, other: &Self) -> bool {
        match (self, other) {
            (Collapsed::Plain, Collapsed::Plain) => true,
            (Collapsed::Widget(a), Collapsed::Widget(b)) => a.compare(b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangeDescriptor<W> {
    pub inclusive_start: bool,
    pub inclusive_end: bool,
    pub attributes: Attributes,
    pub class: Option<SmartString>,
    pub tag_name: Option<SmartString>,
    pub line_attributes: Attributes,
    pub collapsed: Option<Collapsed<W>>,
}

impl<W: WidgetHandle> RangeDescriptor<W> {
    /// Side of an insertion at `from` this decoration's start sticks to.
    pub fn start_bias(&self) -> i64 {
        if self.inclusive_start { -BIAS_MAGNITUDE } else { BIAS_MAGNITUDE }
    }

    /// Side of an insertion at `to` this decoration's end sticks to.
    pub fn end_bias(&self) -> i64 {
        if self.inclusive_end { BIAS_MAGNITUDE } else { -BIAS_MAGNITUDE }
    }

    /// Does this decoration change how the spans/attributes of the text it
    /// covers are rendered? Drives whether `build_line_elements` and
    /// `changed_ranges` need to track it at all.
    pub fn affects_spans(&self) -> bool {
        !self.attributes.is_empty()
            || self.tag_name.is_some()
            || self.class.is_some()
            || self.collapsed.is_some()
    }

    /// Same tag, class, attributes, and collapsed widget.
    pub fn eq_spec(&self, other: &Self) -> bool {
        self.tag_name == other.tag_name
            && self.class == other.class
            && attributes_eq(&self.attributes, &other.attributes)
            && match (&self.collapsed, &other.collapsed) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_spec(b),
                _ => false,
            }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PointDescriptor<W> {
    pub side: i32,
    pub widget: Option<W>,
    pub line_attributes: Attributes,
}

impl<W: WidgetHandle> PointDescriptor<W> {
    pub fn bias(&self) -> i64 {
        self.side as i64
    }
}

#[derive(Debug, Clone)]
pub enum Descriptor<W> {
    Range(RangeDescriptor<W>),
    Point(PointDescriptor<W>),
}

impl<W: WidgetHandle> Descriptor<W> {
    pub fn is_point(&self) -> bool {
        matches!(self, Descriptor::Point(_))
    }

    pub fn as_range(&self) -> Option<&RangeDescriptor<W>> {
        match self {
            Descriptor::Range(r) => Some(r),
            Descriptor::Point(_) => None,
        }
    }

    pub fn as_point(&self) -> Option<&PointDescriptor<W>> {
        match self {
            Descriptor::Point(p) => Some(p),
            Descriptor::Range(_) => None,
        }
    }

    /// Bias used to sort this decoration in a node's `local` array and to
    /// order its opening heap event: a range's `start_bias`, or a point's
    /// (single) `bias`.
    pub fn start_bias(&self) -> i64 {
        match self {
            Descriptor::Range(r) => r.start_bias(),
            Descriptor::Point(p) => p.bias(),
        }
    }

    /// Bias used when a range's closing heap event is ordered, or as the
    /// mapping bias for a decoration's `to` position. Identical to
    /// `start_bias` for points, since a point has no separate end.
    pub fn end_bias(&self) -> i64 {
        match self {
            Descriptor::Range(r) => r.end_bias(),
            Descriptor::Point(p) => p.bias(),
        }
    }

    pub fn affects_spans(&self) -> bool {
        match self {
            Descriptor::Range(r) => r.affects_spans(),
            Descriptor::Point(_) => false,
        }
    }

    /// Only meaningful for `Range` (the only variant ever held in
    /// `active`); returns `false` across variants.
    pub fn eq_spec(&self, other: &Self) -> bool {
        match (self, other) {
            (Descriptor::Range(a), Descriptor::Range(b)) => a.eq_spec(b),
            (Descriptor::Point(_), Descriptor::Point(_)) => false,
            _ => false,
        }
    }
}

/// An immutable `(from, to, descriptor)` annotation. `desc` is `Rc`-wrapped
/// so decorations are cheap to clone and so two decorations sharing a
/// descriptor can be compared by `Rc::ptr_eq` before falling back to
/// `eq_spec`.
#[derive(Debug, Clone)]
pub struct Decoration<W> {
    pub from: u32,
    pub to: u32,
    pub desc: Rc<Descriptor<W>>,
}

impl<W: WidgetHandle> Decoration<W> {
    /// A range decoration. Fails with `InvalidRange` when `from >= to`.
    pub fn range(from: u32, to: u32, desc: RangeDescriptor<W>) -> Result<Self> {
        if from >= to {
            return Err(Error::InvalidRange { from, to });
        }
        Ok(Decoration { from, to, desc: Rc::new(Descriptor::Range(desc)) })
    }

    /// A point decoration. Always succeeds; `from == to == pos`.
    pub fn point(pos: u32, desc: PointDescriptor<W>) -> Self {
        Decoration { from: pos, to: pos, desc: Rc::new(Descriptor::Point(desc)) }
    }

    pub fn is_point(&self) -> bool {
        self.from == self.to
    }

    /// The sort/heap-open bias for this decoration: `(from, bias)` order is
    /// what every `local` array and heap event key uses.
    pub fn bias(&self) -> i64 {
        self.desc.start_bias()
    }

    /// Maps this decoration through `changes`, translating between the
    /// subtree offsets `old_offset` (this decoration's current node) and
    /// `new_offset` (the node it will live in after mapping). Returns
    /// `None` when the decoration doesn't survive — a range collapsed to
    /// empty, or a point whose anchor fell inside a deleted region.
    pub fn map(&self, changes: &[Change], old_offset: u32, new_offset: u32) -> Option<Decoration<W>> {
        match self.desc.as_ref() {
            Descriptor::Range(r) => {
                let from = map_pos(self.from + old_offset, changes, r.start_bias(), false)?;
                let to = map_pos(self.to + old_offset, changes, r.end_bias(), false)?;
                if from < to {
                    Some(Decoration { from: from - new_offset, to: to - new_offset, desc: self.desc.clone() })
                } else {
                    None
                }
            }
            Descriptor::Point(p) => {
                let pos = map_pos(self.from + old_offset, changes, p.bias(), true)?;
                Some(Decoration { from: pos - new_offset, to: pos - new_offset, desc: self.desc.clone() })
            }
        }
    }
}

/// Total order used for every `local` array: `(from, bias)` ascending.
pub fn decoration_cmp<W: WidgetHandle>(a: &Decoration<W>, b: &Decoration<W>) -> std::cmp::Ordering {
    a.from.cmp(&b.from).then(a.bias().cmp(&b.bias()))
}
