//! Boundary-tag block format: the [`Tag`] word and raw block accessors.
//!
//! Every block starts with a 4-byte header and ends with a 4-byte footer,
//! both holding the full block size (tags included) with the allocated flag
//! packed into bit 0. The block pointer `bp` used throughout the crate is
//! the address of the first payload byte, one word past the header. Free
//! blocks additionally carry two 8-byte list links in the first 16 payload
//! bytes, which is what fixes the minimum block size at 24.

use core::mem::size_of;

/// Tag word size in bytes.
pub const WSIZE: usize = 4;
/// Double word, the alignment unit. Also the per-block tag overhead.
pub const DSIZE: usize = 8;
/// Smallest legal block: header, two list links, footer.
pub const MIN_BLOCK: usize = 2 * WSIZE + 2 * size_of::<*mut u8>();
/// Default heap extension in bytes.
pub const CHUNKSIZE: usize = 4096;
/// Largest block size a 4-byte tag can encode.
pub const MAX_BLOCK: usize = (u32::MAX & !0x7) as usize;

const ALLOC_BIT: u32 = 0x1;
const SIZE_MASK: u32 = !0x7;

/// A header or footer word: block size packed with the allocated bit.
///
/// The low three bits of the word are reserved; bit 0 is the allocated
/// flag and bits 1-2 stay zero. Sizes are whole-block sizes, always a
/// multiple of [`DSIZE`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct Tag {
    word: u32,
}

impl Tag {
    /// Packs `size` and the allocated flag into a tag word.
    ///
    /// # Panics
    /// In debug builds, panics if `size` is not a multiple of [`DSIZE`]
    /// or does not fit in the tag's size field.
    #[inline(always)]
    pub fn new(size: usize, allocated: bool) -> Tag {
        debug_assert_eq!(size % DSIZE, 0, "block sizes are multiples of {DSIZE}");
        debug_assert!(size <= MAX_BLOCK, "block size overflows the tag word");
        Tag {
            word: size as u32 | allocated as u32,
        }
    }

    /// Returns the whole-block size, header and footer included.
    #[inline(always)]
    pub fn size(self) -> usize {
        (self.word & SIZE_MASK) as usize
    }

    /// Returns whether the tagged block is allocated.
    #[inline(always)]
    pub fn is_allocated(self) -> bool {
        self.word & ALLOC_BIT != 0
    }
}

/// Address of the header of the block at `bp`.
///
/// # Safety
/// `bp` must be a block pointer into the heap, i.e. one word past a
/// written header.
#[inline(always)]
pub unsafe fn header(bp: *mut u8) -> *mut Tag {
    bp.sub(WSIZE).cast()
}

/// Address of the footer of the block at `bp`, derived from the header.
///
/// # Safety
/// `bp` must be a block pointer whose header holds the block's true size.
#[inline(always)]
pub unsafe fn footer(bp: *mut u8) -> *mut Tag {
    bp.add(size(bp) - DSIZE).cast()
}

/// Whole-block size read from the header.
///
/// # Safety
/// `bp` must be a block pointer with a written header.
#[inline(always)]
pub unsafe fn size(bp: *mut u8) -> usize {
    (*header(bp)).size()
}

/// Allocated bit read from the header.
///
/// # Safety
/// `bp` must be a block pointer with a written header.
#[inline(always)]
pub unsafe fn is_allocated(bp: *mut u8) -> bool {
    (*header(bp)).is_allocated()
}

/// Writes matching header and footer tags for the block at `bp`.
///
/// The header goes in first so the footer address can be derived from the
/// new size.
///
/// # Safety
/// The span `[bp - 4, bp + size - 4)` must be writable heap memory owned
/// by this block.
#[inline]
pub unsafe fn write_tags(bp: *mut u8, size: usize, allocated: bool) {
    let tag = Tag::new(size, allocated);
    header(bp).write(tag);
    footer(bp).write(tag);
}

/// Block pointer of the next block in address order.
///
/// # Safety
/// `bp` must be a block pointer with a written header; the result is only
/// a valid block pointer while the epilogue has not been passed.
#[inline(always)]
pub unsafe fn next_block(bp: *mut u8) -> *mut u8 {
    bp.add(size(bp))
}

/// Block pointer of the previous block in address order, found through its
/// footer.
///
/// # Safety
/// `bp` must be a block pointer and the preceding block's footer must be
/// written; the prologue stops this from running off the heap's low end.
#[inline(always)]
pub unsafe fn prev_block(bp: *mut u8) -> *mut u8 {
    bp.sub((*prev_footer(bp)).size())
}

/// Address of the preceding block's footer, the word right before `bp`'s
/// header.
///
/// # Safety
/// `bp` must be a block pointer that is not the prologue.
#[inline(always)]
pub unsafe fn prev_footer(bp: *mut u8) -> *mut Tag {
    bp.sub(DSIZE).cast()
}

/// Forward free-list link, stored in the first payload word.
///
/// # Safety
/// `bp` must point at a free block whose links have been written.
#[inline(always)]
pub unsafe fn next_free(bp: *mut u8) -> *mut u8 {
    bp.cast::<*mut u8>().read()
}

/// # Safety
/// `bp` must point at a free block's payload with at least 8 writable bytes.
#[inline(always)]
pub unsafe fn set_next_free(bp: *mut u8, next: *mut u8) {
    bp.cast::<*mut u8>().write(next);
}

/// Backward free-list link, stored in the second payload word.
///
/// # Safety
/// `bp` must point at a free block whose links have been written.
#[inline(always)]
pub unsafe fn prev_free(bp: *mut u8) -> *mut u8 {
    bp.add(DSIZE).cast::<*mut u8>().read()
}

/// # Safety
/// `bp` must point at a free block's payload with at least 16 writable bytes.
#[inline(always)]
pub unsafe fn set_prev_free(bp: *mut u8, prev: *mut u8) {
    bp.add(DSIZE).cast::<*mut u8>().write(prev);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr::null_mut;

    #[repr(C, align(8))]
    struct Arena([u8; 256]);

    #[test]
    fn test_1() {
        let t = Tag::new(24, false);
        assert_eq!(t.size(), 24);
        assert!(!t.is_allocated());

        let t = Tag::new(4096, true);
        assert_eq!(t.size(), 4096);
        assert!(t.is_allocated());

        // Size 0 is the epilogue encoding.
        let t = Tag::new(0, true);
        assert_eq!(t.size(), 0);
        assert!(t.is_allocated());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn test_2() {
        // Should panic because of the multiple-of-8 debug assertion.
        let _t = Tag::new(20, false);
    }

    #[test]
    fn test_3() {
        let mut arena = Arena([0; 256]);
        let bp = unsafe { arena.0.as_mut_ptr().add(DSIZE) };
        unsafe {
            write_tags(bp, 32, true);
            assert_eq!(size(bp), 32);
            assert!(is_allocated(bp));
            assert_eq!(*header(bp), *footer(bp));
            assert_eq!(footer(bp) as usize - header(bp) as usize, 32 - WSIZE);

            write_tags(bp, 32, false);
            assert!(!is_allocated(bp));
            assert_eq!(*header(bp), *footer(bp));
        }
    }

    #[test]
    fn test_4() {
        // Two adjacent blocks navigate to each other through their tags.
        let mut arena = Arena([0; 256]);
        let first = unsafe { arena.0.as_mut_ptr().add(DSIZE) };
        unsafe {
            write_tags(first, 40, true);
            let second = next_block(first);
            assert_eq!(second as usize - first as usize, 40);
            write_tags(second, 24, false);
            assert_eq!(prev_block(second), first);
            assert_eq!(next_block(second) as usize - first as usize, 64);
        }
    }

    #[test]
    fn test_5() {
        let mut arena = Arena([0; 256]);
        let bp = unsafe { arena.0.as_mut_ptr().add(DSIZE) };
        let other = unsafe { arena.0.as_mut_ptr().add(128) };
        unsafe {
            write_tags(bp, 24, false);
            set_next_free(bp, other);
            set_prev_free(bp, null_mut());
            assert_eq!(next_free(bp), other);
            assert_eq!(prev_free(bp), null_mut());

            set_prev_free(bp, other);
            set_next_free(bp, null_mut());
            assert_eq!(prev_free(bp), other);
            assert_eq!(next_free(bp), null_mut());
            // Links live inside the payload, not in the tags.
            assert_eq!(size(bp), 24);
        }
    }
}
