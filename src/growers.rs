//! [`Grower`] trait and structures that implement it.
//!
//! A grower is the allocator's only source of raw bytes: a contiguous
//! region that can grow at its high end and never shrinks. The allocator
//! asks for exact amounts and covers every new byte with block tags, so
//! growers must not round requests up on their own.

use crate::block::DSIZE;

use core::ptr::{null_mut, NonNull};

use libc::{brk, sbrk};

/// Rounds `ptr` up to the next 8-byte boundary, or `None` if that leaves
/// the address space.
#[inline]
fn align_up(ptr: *mut u8) -> Option<*mut u8> {
    let addr = (ptr as usize).checked_add(DSIZE - 1)? & !(DSIZE - 1);
    Some(addr as *mut u8)
}

/// A trait for types that act as a contiguous growable buffer.
///
/// # Safety
/// * copying, cloning, or moving the grower must not invalidate any
///   pointers to the buffer managed by the grower. This generally means
///   that growers should not own but reference their underlying buffers.
/// * `grow` called with a multiple of 8 must return an 8-aligned address,
///   and the buffer must grow by exactly the requested amount.
pub unsafe trait Grower {
    /// Grows the buffer's high end by exactly `size` bytes and returns a
    /// pointer to the first newly added byte, or `Err(())` if the growth
    /// failed, in which case the buffer is unchanged.
    ///
    /// # Safety
    /// Implementors should ensure that `grow(0)` does not grow the buffer
    /// and returns the current high end.
    unsafe fn grow(&mut self, size: usize) -> Result<NonNull<u8>, ()>;

    /// Lowest address of the managed region, or null before the first
    /// growth. Queried by the consistency checker.
    fn heap_lo(&self) -> *mut u8;

    /// One past the highest managed address, or null before the first
    /// growth. Queried by the consistency checker.
    fn heap_hi(&self) -> *mut u8;
}

/// A grower that uses [`libc::brk`] to operate on the end of the
/// process's data segment.
#[derive(Debug)]
pub struct SbrkGrower {
    heap_lo: Option<NonNull<u8>>,
    heap_hi: Option<NonNull<u8>>,
}

impl SbrkGrower {
    #[inline(always)]
    pub const fn new() -> Self {
        SbrkGrower {
            heap_lo: None,
            heap_hi: None,
        }
    }

    /// Tries to initialize the grower by calling `sbrk(0)` to get the
    /// initial heap end, rounded up to 8-byte alignment.
    ///
    /// # Safety
    /// This function is unsafe since it assumes that the grower wasn't
    /// previously initialized and that there aren't any other objects
    /// (growers or not) managing the program break.
    unsafe fn try_init(&mut self) -> Result<(), ()> {
        debug_assert!(self.heap_hi.is_none());
        let heap_end = unsafe { sbrk(0) };
        debug_assert_ne!(heap_end as isize, -1, "Calling sbrk(0) should never fail.");
        debug_assert_ne!(heap_end as usize, 0);
        let aligned = align_up(heap_end.cast()).ok_or(())?;
        let aligned = NonNull::new(aligned).ok_or(())?;
        self.heap_lo = Some(aligned);
        self.heap_hi = Some(aligned);
        Ok(())
    }
}

impl Default for SbrkGrower {
    fn default() -> Self {
        SbrkGrower::new()
    }
}

unsafe impl Grower for SbrkGrower {
    unsafe fn grow(&mut self, size: usize) -> Result<NonNull<u8>, ()> {
        if self.heap_hi.is_none() {
            unsafe { self.try_init()? };
        }
        let heap_end = self.heap_hi.unwrap();
        if size == 0 {
            return Ok(heap_end);
        }
        let new_heap_end = (heap_end.as_ptr() as usize).checked_add(size).ok_or(())? as *mut u8;
        if unsafe { brk(new_heap_end.cast()) == -1 } {
            return Err(());
        }
        self.heap_hi = unsafe { Some(NonNull::new_unchecked(new_heap_end)) };
        Ok(heap_end)
    }

    fn heap_lo(&self) -> *mut u8 {
        self.heap_lo.map_or(null_mut(), NonNull::as_ptr)
    }

    fn heap_hi(&self) -> *mut u8 {
        self.heap_hi.map_or(null_mut(), NonNull::as_ptr)
    }
}
