//! Typed errors for the diagnosable `try_*` wrappers.
//!
//! The core contract (spec) is null/none-on-failure: `allocate`,
//! `free`, `reallocate`, and `zero_allocate` never return a `Result`.
//! `AllocError` exists so callers who want to know *why* an operation
//! failed — and so log messages have a stable vocabulary — have
//! something richer than a null pointer to reach for.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The heap-growth primitive refused to extend the break.
    #[error("heap growth primitive refused to extend the break")]
    OutOfMemory,

    /// A zero-size request was made to `allocate` or `zero_allocate`,
    /// or a zero count was passed to `zero_allocate`.
    #[error("zero-size allocation request")]
    ZeroSize,

    /// `try_free` was handed a null pointer. `free` itself treats this
    /// as a silent no-op; `try_free` surfaces it instead so a caller
    /// can tell "nothing to do" apart from "freed".
    #[error("null pointer passed where an allocated block was required")]
    NullPointer,

    /// `try_free`/`try_reallocate` were handed a pointer to a block
    /// that is not currently ALLOCATED — most likely a double free.
    #[error("pointer does not refer to a currently allocated block")]
    NotAllocated,
}
