//! A lock-serialized memory allocator.

use crate::allocators::RawSegMalloc;
use crate::growers::Grower;

use core::alloc::{GlobalAlloc, Layout};
use std::sync::Mutex;

/// A lock-serialized memory allocator.
///
/// This allocator is just a `Mutex` wrapper over [`RawSegMalloc`] so that
/// calls are serialized and the allocator can back a `#[global_allocator]`
/// static. The core stays singlethreaded; the lock only enforces the
/// one-caller-at-a-time contract.
pub struct SegMalloc<G: Grower> {
    inner: Mutex<RawSegMalloc<G>>,
}

impl<G: Grower> SegMalloc<G> {
    /// # Safety
    /// Callers must make sure that the provided grower will be the only
    /// object managing its underlying buffer for the lifetime of the
    /// returned allocator.
    pub const unsafe fn with_grower(grower: G) -> Self {
        SegMalloc {
            inner: Mutex::new(RawSegMalloc::with_grower(grower)),
        }
    }

    /// See [`RawSegMalloc::init`].
    ///
    /// # Safety
    /// See [`RawSegMalloc::init`].
    pub unsafe fn init(&self) -> Result<(), ()> {
        self.inner.lock().unwrap().init()
    }

    /// See [`RawSegMalloc::allocate`].
    ///
    /// # Safety
    /// See [`RawSegMalloc::allocate`].
    pub unsafe fn allocate(&self, size: usize) -> *mut u8 {
        self.inner.lock().unwrap().allocate(size)
    }

    /// See [`RawSegMalloc::free`].
    ///
    /// # Safety
    /// See [`RawSegMalloc::free`].
    pub unsafe fn free(&self, ptr: *mut u8) {
        self.inner.lock().unwrap().free(ptr)
    }

    /// See [`RawSegMalloc::reallocate`].
    ///
    /// # Safety
    /// See [`RawSegMalloc::reallocate`].
    pub unsafe fn reallocate(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.inner.lock().unwrap().reallocate(ptr, size)
    }

    /// See [`RawSegMalloc::zeroed_allocate`].
    ///
    /// # Safety
    /// See [`RawSegMalloc::zeroed_allocate`].
    pub unsafe fn zeroed_allocate(&self, nmemb: usize, size: usize) -> *mut u8 {
        self.inner.lock().unwrap().zeroed_allocate(nmemb, size)
    }

    /// See [`RawSegMalloc::checkheap`].
    ///
    /// # Safety
    /// See [`RawSegMalloc::checkheap`].
    pub unsafe fn checkheap(&self, verbose: bool) {
        self.inner.lock().unwrap().checkheap(verbose)
    }
}

unsafe impl<G: Grower> Sync for SegMalloc<G> {}

//---------------impl GlobalAlloc for SegMalloc---------------//

unsafe impl<G: Grower> GlobalAlloc for SegMalloc<G> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        GlobalAlloc::alloc(&*self.inner.lock().unwrap(), layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        GlobalAlloc::dealloc(&*self.inner.lock().unwrap(), ptr, layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        GlobalAlloc::alloc_zeroed(&*self.inner.lock().unwrap(), layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        GlobalAlloc::realloc(&*self.inner.lock().unwrap(), ptr, layout, new_size)
    }
}
