//! Low-level primitives for arena memory operations.
//!
//! [`RawBuffer`] owns one zero-initialised heap allocation aligned to
//! [`BUFFER_ALIGN`]. It is the only place in the crate that talks to the
//! global allocator directly; every `unsafe` block carries a `SAFETY:`
//! comment.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::slice;

use crate::config::BUFFER_ALIGN;

/// Owned, [`BUFFER_ALIGN`]-aligned byte buffer that can be resized in place
/// or moved by the allocator.
///
/// A zero-length buffer holds no allocation.
pub(crate) struct RawBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: `RawBuffer` uniquely owns its allocation, like `Box<[u8]>`.
unsafe impl Send for RawBuffer {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    /// A buffer with no allocation.
    pub(crate) fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    /// Allocate `len` zeroed bytes. Returns `None` if the host allocator fails.
    pub(crate) fn zeroed(len: usize) -> Option<Self> {
        if len == 0 {
            return Some(Self::empty());
        }
        let layout = Layout::from_size_align(len, BUFFER_ALIGN).ok()?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).map(|ptr| Self { ptr, len })
    }

    /// Resize to `new_len`, preserving the first `min(len, new_len)` bytes
    /// and zeroing any new tail.
    ///
    /// On failure the buffer is left untouched and `false` is returned.
    pub(crate) fn resize(&mut self, new_len: usize) -> bool {
        if new_len == self.len {
            return true;
        }
        if self.len == 0 {
            return match Self::zeroed(new_len) {
                Some(buffer) => {
                    *self = buffer;
                    true
                }
                None => false,
            };
        }
        if new_len == 0 {
            *self = Self::empty();
            return true;
        }
        if Layout::from_size_align(new_len, BUFFER_ALIGN).is_err() {
            return false;
        }
        let old_len = self.len;
        // SAFETY: `ptr` was allocated by the global allocator with
        // `self.layout()`; `new_len` is non-zero and, as checked above,
        // does not overflow `isize` once rounded up to `BUFFER_ALIGN`.
        let ptr = unsafe { alloc::realloc(self.ptr.as_ptr(), self.layout(), new_len) };
        let Some(ptr) = NonNull::new(ptr) else {
            return false;
        };
        self.ptr = ptr;
        self.len = new_len;
        if new_len > old_len {
            self.as_mut_slice()[old_len..].fill(0);
        }
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Address of the first byte (dangling when empty).
    pub(crate) fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    #[cfg(test)]
    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `len` initialised bytes (or dangling
        // and non-null with `len == 0`), and `&self` prevents mutation.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`; `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    fn layout(&self) -> Layout {
        // The layout was validated when the buffer was created or resized.
        Layout::from_size_align(self.len, BUFFER_ALIGN).unwrap_or_else(|_| Layout::new::<u8>())
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        // SAFETY: `ptr` was allocated with `self.layout()` and is not used
        // after this point.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_buffer_is_aligned_and_zero() {
        let buf = RawBuffer::zeroed(100).unwrap();
        assert_eq!(buf.len(), 100);
        assert_eq!(buf.addr() % BUFFER_ALIGN, 0);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_buffer_has_no_bytes() {
        let buf = RawBuffer::zeroed(0).unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn grow_preserves_prefix_and_zeroes_tail() {
        let mut buf = RawBuffer::zeroed(8).unwrap();
        buf.as_mut_slice().fill(0xAB);
        assert!(buf.resize(64));
        assert_eq!(buf.len(), 64);
        assert!(buf.as_slice()[..8].iter().all(|&b| b == 0xAB));
        assert!(buf.as_slice()[8..].iter().all(|&b| b == 0));
        assert_eq!(buf.addr() % BUFFER_ALIGN, 0);
    }

    #[test]
    fn shrink_preserves_prefix() {
        let mut buf = RawBuffer::zeroed(64).unwrap();
        buf.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert!(buf.resize(4));
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn resize_to_and_from_zero() {
        let mut buf = RawBuffer::empty();
        assert!(buf.resize(16));
        assert_eq!(buf.len(), 16);
        assert!(buf.resize(0));
        assert_eq!(buf.len(), 0);
    }
}
