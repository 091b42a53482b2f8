//! The change log is someone else's problem: the core only consumes a
//! sorted, non-overlapping sequence of `Change`s through [`map_pos`], never
//! produces or stores one.

/// A single primitive edit, already expressed in the coordinate space left
/// behind by every earlier change in the same slice (the same convention a
/// real editor's change log uses: changes are applied in order, and each
/// one's `from`/`to` refer to the document as it stood after its
/// predecessors were applied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub from: u32,
    pub to: u32,
    pub inserted_len: u32,
}

impl Change {
    pub fn new(from: u32, to: u32, inserted_len: u32) -> Self {
        debug_assert!(from <= to);
        Change { from, to, inserted_len }
    }

    /// Net change in document length contributed by this edit.
    pub fn delta(&self) -> i64 {
        self.inserted_len as i64 - (self.to as i64 - self.from as i64)
    }
}

/// A sorted, non-overlapping sequence of [`Change`]s. `map_pos` trusts this
/// and doesn't check for it.
pub trait ChangeLog {
    fn changes(&self) -> &[Change];
}

impl ChangeLog for [Change] {
    fn changes(&self) -> &[Change] {
        self
    }
}

impl ChangeLog for Vec<Change> {
    fn changes(&self) -> &[Change] {
        self
    }
}

/// Maps `pos` through `changes`.
///
/// `assoc` disambiguates at an insertion boundary: negative values stick to
/// the content before the inserted text, non-negative values stick after
/// it. `track`, when set, makes the mapping return `None` the moment `pos`
/// falls strictly inside a change's deleted span, rather than clamping to
/// one edge of it — this is what lets `Decoration::map` drop point
/// decorations whose anchor text was deleted outright.
pub fn map_pos(pos: u32, changes: &[Change], assoc: i64, track: bool) -> Option<u32> {
    let mut pos = pos as i64;
    for ch in changes {
        let from = ch.from as i64;
        let to = ch.to as i64;
        let new_len = ch.inserted_len as i64;

        if pos < from {
            continue;
        }

        if pos > from && pos < to {
            if track {
                return None;
            }
            pos = if assoc < 0 { from } else { from + new_len };
            continue;
        }

        if pos == from {
            if from == to {
                // Zero-width insertion: assoc alone decides which side pos sticks to.
                pos = if assoc < 0 { from } else { from + new_len };
            } else if assoc >= 0 {
                // Left edge of a real replaced range, but this position wants
                // to stick to the inserted content rather than to what came before.
                pos = from + new_len;
            }
            // else: unaffected, stays at `from`.
            continue;
        }

        // pos >= to: shifted by however much this change grew or shrank the document.
        pos += new_len - (to - from);
    }
    Some(pos as u32)
}

/// Does `change` intersect `[from, to]`? Used by `touches_change` below and
/// by `DecorationSet::map`'s child-sharing check.
fn intersects(change: &Change, from: u32, to: u32) -> bool {
    change.to >= from && change.from <= to
}

/// Does any change in `changes` intersect `[from, to]`? Non-intersecting
/// changes that land entirely before the window shift it by their length
/// delta so later comparisons stay in the same coordinate space as
/// `changes`.
pub fn touches_change(mut from: u32, mut to: u32, changes: &[Change]) -> bool {
    for ch in changes {
        if intersects(ch, from, to) {
            return true;
        }
        if ch.from <= from {
            let delta = ch.delta();
            from = (from as i64 + delta).max(0) as u32;
            to = (to as i64 + delta).max(0) as u32;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_points_through_mixed_edits() {
        let changes = [
            Change::new(0, 0, 1),
            Change::new(2, 3, 0),
            Change::new(8, 8, 20),
        ];
        assert_eq!(map_pos(1, &changes, 0, false), Some(2));
        assert_eq!(map_pos(4, &changes, 0, false), Some(4));
        assert_eq!(map_pos(10, &changes, 0, false), Some(30));
    }

    #[test]
    fn maps_range_with_inclusive_bias() {
        let changes = [Change::new(1, 1, 2), Change::new(4, 4, 2)];
        // inclusiveStart => assoc = -B, inclusiveEnd => assoc = +B
        let from = map_pos(1, &changes, -2_000_000_000, false).unwrap();
        let to = map_pos(2, &changes, 2_000_000_000, false).unwrap();
        assert_eq!((from, to), (1, 6));
    }

    #[test]
    fn side_disambiguates_insertion_point() {
        let changes = [Change::new(1, 1, 2)];
        assert_eq!(map_pos(1, &changes, 1, false), Some(3));
        assert_eq!(map_pos(1, &changes, -1, false), Some(1));
    }

    #[test]
    fn track_reports_deletion_with_sentinel() {
        let changes = [Change::new(2, 6, 0)];
        assert_eq!(map_pos(4, &changes, 0, true), None);
        assert_eq!(map_pos(2, &changes, 0, true), Some(2));
        assert_eq!(map_pos(6, &changes, 0, true), Some(2));
    }
}
