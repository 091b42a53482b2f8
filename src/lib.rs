//! A mappable, persistent set of position-annotated decorations over a
//! linear text buffer.
//!
//! Decorations live in an immutable, structurally-shared tree
//! (`DecorationSet`), get remapped through a caller-supplied change log
//! (`DecorationSet::map`), drive an opaque layout builder in position order
//! across one or more sets (`build_line_elements`), and diff against an
//! earlier revision down to the screen regions that actually need
//! redrawing (`DecorationSet::changed_ranges`). No text storage, no undo,
//! no concurrency — see `DESIGN.md`.

mod compare;
mod decoration;
mod error;
mod heap;
mod position;
mod set;
mod widget;

pub use compare::{join_ranges, ChangedRange, Changes, MIN_RANGE_GAP};
pub use decoration::{
    decoration_cmp, Attributes, Collapsed, Decoration, Descriptor, PointDescriptor, RangeDescriptor, BIAS_MAGNITUDE,
};
pub use error::{Error, Result};
pub use heap::{build_line_elements, LineElementBuilder};
pub use position::{map_pos, touches_change, Change, ChangeLog};
pub use set::{DecorationSet, Filter, BASE_NODE_SIZE};
pub use widget::WidgetHandle;
