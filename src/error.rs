use std::fmt;

/// Errors surfaced synchronously by the crate's fallible constructors.
/// Everything else is total; internal invariant violations are bugs,
/// guarded by `debug_assert!` at call sites rather than represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `Decoration::range` was called with `from >= to`.
    InvalidRange { from: u32, to: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRange { from, to } => {
                write!(f, "invalid range decoration: from ({from}) >= to ({to})")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
