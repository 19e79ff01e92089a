//! The [`RawSegMalloc`] and [`SegMalloc`] allocators.

pub mod raw_seg_malloc;
pub mod seg_malloc;

pub use raw_seg_malloc::RawSegMalloc;
pub use seg_malloc::SegMalloc;
