//! The in-band block header.
//!
//! Every region the allocator knows about — whether currently handed
//! out to a client or sitting in the free-region index — is prefixed
//! by one of these. While a block is FREE, `left`/`right`/`parent`/
//! `color` are meaningful tree-node fields; while ALLOCATED they are
//! stale and must not be read.
//!
//! All payload/header pointer arithmetic is confined to this module;
//! the rest of the crate works with `*mut Header` only.

use std::mem;
use std::ptr;

/// RED/BLACK tag, meaningful only while the block sits in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// FREE/ALLOCATED tag, meaningful for the block's entire lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Free,
    Allocated,
}

#[repr(C)]
pub struct Header {
    /// Usable payload size in bytes, always a multiple of [`crate::align::WORD`].
    pub size: usize,
    pub left: *mut Header,
    pub right: *mut Header,
    pub parent: *mut Header,
    pub color: Color,
    pub state: State,
}

/// Size of one header, itself pointer-width aligned since every field
/// is pointer-sized or smaller.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

impl Header {
    /// Writes a freshly-grown header in place at `at`, RED and FREE
    /// with no tree links, ready for `FreeTree::insert`.
    ///
    /// # Safety
    /// `at` must point to at least `HEADER_SIZE + size` writable bytes
    /// obtained from the heap primitive.
    pub unsafe fn write_new(at: *mut Header, size: usize) {
        unsafe {
            (*at).size = size;
            (*at).left = ptr::null_mut();
            (*at).right = ptr::null_mut();
            (*at).parent = ptr::null_mut();
            (*at).color = Color::Red;
            (*at).state = State::Free;
        }
    }
}

/// The payload address for a block whose header lives at `header`.
///
/// # Safety
/// `header` must point to a valid, live `Header`.
pub unsafe fn payload_of(header: *mut Header) -> *mut u8 {
    unsafe { (header as *mut u8).add(HEADER_SIZE) }
}

/// Recovers the header for a payload pointer previously returned by
/// `allocate` / `reallocate` / `zero_allocate`.
///
/// # Safety
/// `payload` must have been produced by this allocator; this function
/// does not and cannot verify that.
pub unsafe fn header_of(payload: *mut u8) -> *mut Header {
    unsafe { payload.sub(HEADER_SIZE) as *mut Header }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_word_aligned() {
        assert_eq!(HEADER_SIZE % crate::align::WORD, 0);
    }

    #[test]
    fn payload_and_header_round_trip() {
        let mut buf = vec![0u8; HEADER_SIZE + 64];
        let header = buf.as_mut_ptr() as *mut Header;
        unsafe {
            Header::write_new(header, 64);
            let payload = payload_of(header);
            assert_eq!(payload as usize, header as usize + HEADER_SIZE);
            assert_eq!(header_of(payload), header);
        }
    }
}
