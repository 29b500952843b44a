//! Pointer-width alignment.
//!
//! The allocator never aligns stronger than the platform's pointer
//! width, so unlike a `GlobalAlloc`-backed allocator there is no
//! per-call `Layout::align()` to thread through; there is exactly one
//! alignment, fixed at compile time.

use std::mem;

/// The alignment every block size is rounded up to.
pub const WORD: usize = mem::size_of::<usize>();

/// Rounds `n` up to the next multiple of [`WORD`]. Zero stays zero.
pub const fn align_up(n: usize) -> usize {
    (n + WORD - 1) & !(WORD - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stays_zero() {
        assert_eq!(align_up(0), 0);
    }

    #[test]
    fn already_aligned_is_unchanged() {
        assert_eq!(align_up(WORD), WORD);
        assert_eq!(align_up(WORD * 4), WORD * 4);
    }

    #[test]
    fn rounds_up_to_next_multiple() {
        for i in 0..10 {
            let lo = WORD * i + 1;
            let hi = WORD * (i + 1);
            for size in lo..=hi {
                assert_eq!(align_up(size), hi, "size={size}");
            }
        }
    }
}
