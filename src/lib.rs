//! # rallocator - a best-fit heap allocator backed by a red-black tree
//!
//! This crate provides a single-threaded heap allocator that services
//! variable-sized allocation requests by growing the process data
//! segment (`sbrk(2)`) and recycling freed regions through a best-fit
//! policy. The pool of currently-free regions is indexed by a
//! red-black tree keyed on `(size, address)`, so best-fit lookup stays
//! logarithmic in the number of free regions rather than linear in the
//! number of blocks ever allocated.
//!
//! ## Crate structure
//!
//! ```text
//!   rallocator
//!   ├── heap   - the sbrk-backed heap-growth primitive
//!   ├── align  - pointer-width alignment
//!   ├── block  - the in-band header, payload/header conversion
//!   ├── tree   - the red-black free-region index
//!   └── error  - AllocError, for callers that want a reason
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use rallocator::Allocator;
//!
//! let mut alloc = Allocator::new();
//!
//! unsafe {
//!     let p = alloc.allocate(size_of::<u64>()) as *mut u64;
//!     assert!(!p.is_null());
//!     p.write(42);
//!     alloc.free(p as *mut u8);
//! }
//! ```
//!
//! ## What this allocator does *not* do
//!
//! No thread safety, no splitting of a larger block to satisfy a
//! smaller request, no coalescing of adjacent free blocks, no heap
//! shrink, no alignment stronger than the platform's pointer width, no
//! hardening against a pointer this allocator never produced. These
//! are explicit design boundaries, not missing features.

pub mod align;
mod block;
pub mod error;
mod heap;
mod tree;

pub use block::{Color, Header, State};
pub use error::AllocError;
pub use tree::FreeTree;

use align::align_up;
use block::{HEADER_SIZE, header_of, payload_of};
use log::{debug, warn};
use std::ptr;

/// A best-fit heap allocator over a single, monotonically-growing
/// address range.
///
/// Each `Allocator` owns its own free-region index; nothing here is
/// implicit process-wide state, unlike the C ancestor this design is
/// based on; callers that want a single shared heap construct one
/// `Allocator` and pass it (or a `&mut` to it) wherever allocation
/// happens.
pub struct Allocator {
    tree: FreeTree,
}

impl Allocator {
    pub const fn new() -> Self {
        Self { tree: FreeTree::new() }
    }

    /// Returns the current heap break, i.e. the high-water mark of the
    /// region this allocator manages.
    pub fn high_water_mark(&self) -> usize {
        heap::current_break()
    }

    /// Reference to the free-region index, mainly for debug printing
    /// (`{:?}`) and invariant checks in tests.
    pub fn free_tree(&self) -> &FreeTree {
        &self.tree
    }

    /// Allocates `size` bytes and returns a pointer to the usable
    /// payload, or null on failure.
    ///
    /// `size == 0` always fails (returns null); this matches the
    /// contract table this allocator is built to, not an
    /// implementation accident.
    ///
    /// # Safety
    /// The returned pointer, once non-null, is valid for `size` bytes
    /// until passed to `free` or `reallocate` on this same allocator.
    pub unsafe fn allocate(&mut self, size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        let size = align_up(size);

        unsafe {
            if let Some(hit) = self.tree.best_fit(size) {
                self.tree.remove(hit);
                (*hit).state = block::State::Allocated;
                debug!("allocate({size}): reused {hit:p} from free index");
                return payload_of(hit);
            }

            let Some(base) = heap::extend(HEADER_SIZE + size) else {
                warn!("allocate({size}): heap growth failed");
                return ptr::null_mut();
            };
            let header = base as *mut Header;
            Header::write_new(header, size);
            (*header).state = block::State::Allocated;
            debug!("allocate({size}): grew heap, new block at {header:p}");
            payload_of(header)
        }
    }

    /// Same contract as [`Allocator::allocate`], but reports *why* a
    /// failure happened instead of collapsing it to null.
    ///
    /// # Safety
    /// Same as [`Allocator::allocate`].
    pub unsafe fn try_allocate(&mut self, size: usize) -> Result<*mut u8, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let p = unsafe { self.allocate(size) };
        if p.is_null() { Err(AllocError::OutOfMemory) } else { Ok(p) }
    }

    /// Frees a block previously returned by `allocate` / `reallocate` /
    /// `zero_allocate`. A null pointer is a no-op. A pointer to a block
    /// that is already FREE is also a no-op — the allocator's only
    /// defense against an obvious double free.
    ///
    /// # Safety
    /// `ptr` must be either null or a pointer this allocator returned
    /// that has not already been freed; passing anything else is
    /// undefined behavior, same as libc `free`.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        unsafe {
            let header = header_of(ptr);
            if (*header).state != block::State::Allocated {
                warn!("free({header:p}): block is not ALLOCATED, ignoring (double free?)");
                return;
            }
            (*header).state = block::State::Free;
            debug!("free({header:p}): returning {} bytes to the free index", (*header).size);
            self.tree.insert(header);
        }
    }

    /// Same contract as [`Allocator::free`], but reports *why* a
    /// pointer was rejected instead of silently ignoring it.
    ///
    /// # Safety
    /// Same as [`Allocator::free`].
    pub unsafe fn try_free(&mut self, ptr: *mut u8) -> Result<(), AllocError> {
        if ptr.is_null() {
            return Err(AllocError::NullPointer);
        }
        unsafe {
            let header = header_of(ptr);
            if (*header).state != block::State::Allocated {
                return Err(AllocError::NotAllocated);
            }
            self.free(ptr);
        }
        Ok(())
    }

    /// Resizes the block at `ptr` to `size` bytes.
    ///
    /// - `size == 0` behaves as `free(ptr)` and returns null.
    /// - `ptr` null behaves as `allocate(size)`.
    /// - Shrinking (`size <= ` the block's current size) returns `ptr`
    ///   unchanged; the block's recorded size is *not* updated, so a
    ///   later grow from the same pointer compares against the
    ///   original size, not the shrunk logical size. This mirrors the
    ///   allocator this crate is descended from and is preserved
    ///   deliberately, not fixed, even though it wastes the shrunk tail
    ///   until the block is freed at its original size.
    /// - Growing allocates a new block, copies the old content, frees
    ///   the old block, and returns the new pointer (or null without
    ///   freeing the old block, if the new allocation fails).
    ///
    /// # Safety
    /// `ptr` must be either null or a pointer this allocator returned
    /// that has not already been freed.
    pub unsafe fn reallocate(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        if size == 0 {
            unsafe { self.free(ptr) };
            return ptr::null_mut();
        }
        if ptr.is_null() {
            return unsafe { self.allocate(size) };
        }

        unsafe {
            let header = header_of(ptr);
            if (*header).state != block::State::Allocated {
                warn!("reallocate({header:p}): block is not ALLOCATED");
                return ptr::null_mut();
            }

            // Compared against the raw request, not `align_up(size)`:
            // `h.size` is already word-aligned, so this agrees with an
            // aligned comparison whenever it matters, but matches the
            // allocator's documented contract literally.
            if size <= (*header).size {
                debug!("reallocate({header:p}): shrink-or-equal, returning in place");
                return ptr;
            }

            let new_ptr = self.allocate(size);
            if new_ptr.is_null() {
                return ptr::null_mut();
            }
            ptr::copy_nonoverlapping(ptr, new_ptr, (*header).size);
            self.free(ptr);
            debug!("reallocate({header:p}): grew into {new_ptr:p}");
            new_ptr
        }
    }

    /// Same contract as [`Allocator::reallocate`], but reports *why* a
    /// failure happened instead of collapsing it to null.
    ///
    /// A non-null `ptr` that is not currently ALLOCATED fails with
    /// [`AllocError::NotAllocated`] rather than the silent null
    /// `reallocate` returns; a null `ptr` still behaves as
    /// `try_allocate(size)`, matching `reallocate`'s allocate-in-place
    /// case.
    ///
    /// # Safety
    /// Same as [`Allocator::reallocate`].
    pub unsafe fn try_reallocate(&mut self, ptr: *mut u8, size: usize) -> Result<*mut u8, AllocError> {
        if ptr.is_null() {
            return unsafe { self.try_allocate(size) };
        }
        unsafe {
            let header = header_of(ptr);
            if (*header).state != block::State::Allocated {
                return Err(AllocError::NotAllocated);
            }
        }
        let p = unsafe { self.reallocate(ptr, size) };
        if size != 0 && p.is_null() {
            return Err(AllocError::OutOfMemory);
        }
        Ok(p)
    }

    /// Allocates space for `count` elements of `elt_size` bytes each,
    /// zero-filled. Either argument being zero is a failure (null).
    ///
    /// `count * elt_size` is computed without an overflow guard, per
    /// this allocator's documented contract; a debug build will trip
    /// the multiplication's overflow check before anything goes wrong,
    /// a release build will not.
    ///
    /// # Safety
    /// Same as [`Allocator::allocate`].
    pub unsafe fn zero_allocate(&mut self, count: usize, elt_size: usize) -> *mut u8 {
        if count == 0 || elt_size == 0 {
            return ptr::null_mut();
        }
        debug_assert!(
            count.checked_mul(elt_size).is_some(),
            "zero_allocate({count}, {elt_size}) overflows usize"
        );
        let total = count.wrapping_mul(elt_size);

        unsafe {
            let p = self.allocate(total);
            if !p.is_null() {
                ptr::write_bytes(p, 0, total);
            }
            p
        }
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
