//! Widgets are the renderer's problem. The core only stores opaque handles
//! and calls their equality predicate and height estimator.

pub trait WidgetHandle: Clone + std::fmt::Debug {
    /// Would this widget render identically to `other` if swapped in at the
    /// same position?
    fn eq_spec(&self, other: &Self) -> bool;

    /// `DecorationSet<W>` is monomorphic in `W`, so the "same concrete
    /// constructor" half of widget equality is already enforced by the
    /// compiler — `compare` only needs the structural half.
    fn compare(&self, other: &Self) -> bool {
        self.eq_spec(other)
    }

    /// Negative means unknown.
    fn estimated_height(&self) -> f64 {
        -1.0
    }
}
