//! The heap-growth primitive: a single monotonic grow-only address
//! range, obtained by moving the process break with `sbrk(2)`.
//!
//! This is the only place in the crate that talks to the operating
//! system; everything above it deals purely in offsets from whatever
//! base address this module hands out.

use libc::{intptr_t, sbrk};
use log::{debug, warn};

/// Extends the heap by `delta` bytes, returning the break *before* the
/// extension (the base address of the freshly available range).
///
/// Returns `None` if the kernel refuses the extension, mirroring
/// `sbrk`'s `(void *) -1` failure sentinel.
pub fn extend(delta: usize) -> Option<usize> {
    let prev = unsafe { sbrk(delta as intptr_t) };
    if prev as usize == usize::MAX {
        warn!("heap extension by {delta} bytes failed");
        return None;
    }
    debug!("heap extended by {delta} bytes, base = {prev:p}");
    Some(prev as usize)
}

/// Returns the current break without moving it.
pub fn current_break() -> usize {
    (unsafe { sbrk(0 as intptr_t) }) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_is_monotonic() {
        let before = current_break();
        let base = extend(64).expect("sbrk should not fail under test");
        assert_eq!(base, before);
        let after = current_break();
        assert!(after >= before + 64);
    }

    #[test]
    fn zero_delta_is_a_no_op_query() {
        let before = current_break();
        let base = extend(0).unwrap();
        assert_eq!(base, before);
        assert_eq!(current_break(), before);
    }
}
