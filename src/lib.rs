//! A segregated-fit memory allocator with boundary tags, written in Rust.
//!
//! The allocator manages a single contiguous heap that only ever grows at
//! its high end, recycling freed bytes internally so long-running programs
//! do not keep pushing the break.
//!
//! # Usage
//! To use this crate you can add `seg-malloc` as a dependency in your
//! project's `Cargo.toml`.
//! ```toml
//! [dependencies]
//! seg-malloc = "0.1"
//! ```
//!
//! ```no_run
//! use seg_malloc::SegMalloc;
//! use seg_malloc::growers::SbrkGrower;
//!
//! #[global_allocator]
//! static ALLOCATOR: SegMalloc<SbrkGrower> = unsafe { SegMalloc::with_grower(SbrkGrower::new()) };
//!
//! fn main() {
//!     let v1: Vec<u32> = vec![1, 2, 3];
//!     println!("Sbrk is cool {:?}", v1);
//! }
//! ```
//!
//! # Allocators
//! Two allocators are exported by this crate - [`RawSegMalloc`]
//! and [`SegMalloc`]. [`RawSegMalloc`] is the singlethreaded core with the
//! classic malloc surface ([`allocate`], [`free`], [`reallocate`],
//! [`zeroed_allocate`]); [`SegMalloc`] is a `Mutex` wrapper over it that
//! serializes calls, which is what a `#[global_allocator]` static needs.
//!
//! # Mode of operation
//! The heap is a run of *blocks* between two allocated sentinels, a
//! prologue at the low end and an epilogue header at the high end. Every
//! block carries a 4-byte header and footer encoding its size and an
//! allocated bit; the matching pair lets any block inspect both of its
//! address-neighbours in constant time.
//!
//! ## Segregated free lists
//! Free blocks are kept on eight doubly-linked lists, bucketed by size
//! (up to 32 bytes, 64, 128, and so on, with everything above 2048 in the
//! last bucket). The links live inside the free payload itself, which puts
//! the floor on the block size at 24 bytes. Allocation is first-fit: the
//! search starts at the request's bucket and moves up, so a hit is never
//! smaller than the request and usually close to it.
//!
//! ## Splitting and coalescing
//! A hit larger than the request is split when the tail can stand as a
//! block of its own; the tail goes back on its list. Every freed block is
//! merged with any free address-neighbour before being relisted, so two
//! adjacent free blocks never coexist and fragmentation stays bounded.
//!
//! ## Growers
//! A grower is the allocator's backing buffer. The allocators are generic
//! over their growers, so anything that acts as a contiguous buffer
//! growable at its high end can be plugged in by implementing [`Grower`].
//! [`SbrkGrower`] grows the process data segment and is the grower to use
//! for a global allocator; the test suite plugs in a fixed-size arena
//! instead.
//!
//! When no free block fits, the allocator grows the heap by at least 4096
//! bytes, seeds the new span as one free block and merges it with a free
//! block ending at the old break, so repeated growth does not strand
//! memory.
//!
//! [`RawSegMalloc`]: allocators::RawSegMalloc
//! [`SegMalloc`]: allocators::SegMalloc
//! [`Grower`]: growers::Grower
//! [`SbrkGrower`]: growers::SbrkGrower
//! [`allocate`]: allocators::RawSegMalloc::allocate
//! [`free`]: allocators::RawSegMalloc::free
//! [`reallocate`]: allocators::RawSegMalloc::reallocate
//! [`zeroed_allocate`]: allocators::RawSegMalloc::zeroed_allocate

pub use crate::allocators::RawSegMalloc;
pub use crate::allocators::SegMalloc;

pub mod allocators;
mod block;
mod classes;
mod freelist;
pub mod growers;
