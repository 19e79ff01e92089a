//! Heap and free-list consistency checking.
//!
//! The checker is a diagnostic, not a recovery mechanism: violations are
//! printed to standard output and the heap is left as found. Debug builds
//! run the quiet walk after every heap extension.

use super::RawSegMalloc;
use crate::block::{self, DSIZE, MIN_BLOCK};
use crate::classes::{class_index, CLASS_COUNT};
use crate::growers::Grower;

impl<G: Grower> RawSegMalloc<G> {
    /// Walks the whole heap and every free list, printing each invariant
    /// violation found. With `verbose` set, every block is printed as well.
    ///
    /// # Safety
    /// Callers must ensure the allocator is not re-entered while this runs.
    pub unsafe fn checkheap(&self, verbose: bool) {
        let violations = self.count_violations(verbose);
        if violations != 0 {
            println!("checkheap: {violations} violation(s)");
        }
    }

    /// The walk behind [`checkheap`](Self::checkheap), returning the number
    /// of violations so tests can assert on it.
    ///
    /// # Safety
    /// Callers must ensure the allocator is not re-entered while this runs.
    pub(crate) unsafe fn count_violations(&self, verbose: bool) -> usize {
        let base = *self.base.get();
        if base.is_null() {
            // Nothing to check before initialization.
            return 0;
        }
        let lo = (*self.grower.get()).heap_lo() as usize;
        let hi = (*self.grower.get()).heap_hi() as usize;
        let lists = &*self.lists.get();
        let mut violations = 0;

        if verbose {
            println!("heap [{lo:#x}, {hi:#x}):");
            print_block(base);
        }
        if block::size(base) != DSIZE
            || !block::is_allocated(base)
            || *block::header(base) != *block::footer(base)
        {
            println!("bad prologue at {base:p}");
            violations += 1;
        }

        // Address-ordered walk from the first real block to the epilogue.
        let mut free_in_heap = 0;
        let mut prev_was_free = false;
        let mut bp = block::next_block(base);
        while block::size(bp) > 0 {
            if verbose {
                print_block(bp);
            }
            violations += check_block(bp);

            if block::is_allocated(bp) {
                prev_was_free = false;
            } else {
                free_in_heap += 1;
                if prev_was_free {
                    println!("adjacent free blocks at {bp:p}");
                    violations += 1;
                }
                prev_was_free = true;
                if !list_contains(lists, class_index(block::size(bp)), bp) {
                    println!("free block {bp:p} missing from its class list");
                    violations += 1;
                }
            }
            bp = block::next_block(bp);
        }

        if verbose {
            println!("{bp:p}: EOL");
        }
        if block::size(bp) != 0 || !block::is_allocated(bp) {
            println!("bad epilogue at {bp:p}");
            violations += 1;
        }

        // List-ordered walk: every listed block is free, in the right
        // class, properly doubly linked and inside the heap.
        let mut on_lists = 0;
        for class in 0..CLASS_COUNT {
            let mut prev = core::ptr::null_mut();
            let mut bp = lists.root(class);
            while !bp.is_null() {
                if (bp as usize) < lo || bp as usize >= hi {
                    println!("free-list pointer {bp:p} outside the heap");
                    violations += 1;
                    break;
                }
                on_lists += 1;
                if block::is_allocated(bp) {
                    println!("allocated block {bp:p} on free list {class}");
                    violations += 1;
                }
                if class_index(block::size(bp)) != class {
                    println!("block {bp:p} of size {} on list {class}", block::size(bp));
                    violations += 1;
                }
                if block::prev_free(bp) != prev {
                    println!("broken backward link at {bp:p}");
                    violations += 1;
                }
                prev = bp;
                bp = block::next_free(bp);
            }
        }
        // Together with the membership check above this rules out a block
        // sitting on two lists.
        if on_lists != free_in_heap {
            println!("{on_lists} blocks on the lists, {free_in_heap} free in the heap");
            violations += 1;
        }

        violations
    }
}

/// Per-block invariants: alignment, matching tags, legal size.
unsafe fn check_block(bp: *mut u8) -> usize {
    let mut violations = 0;
    if bp as usize % DSIZE != 0 {
        println!("block {bp:p} is not doubleword aligned");
        violations += 1;
    }
    if *block::header(bp) != *block::footer(bp) {
        println!("header does not match footer at {bp:p}");
        violations += 1;
    }
    let size = block::size(bp);
    if size % DSIZE != 0 || size < MIN_BLOCK {
        println!("illegal block size {size} at {bp:p}");
        violations += 1;
    }
    violations
}

unsafe fn print_block(bp: *mut u8) {
    let tag = *block::header(bp);
    println!(
        "{bp:p}: size {} [{}]",
        tag.size(),
        if tag.is_allocated() { 'a' } else { 'f' },
    );
}

/// Linear scan of one class list for `bp`.
unsafe fn list_contains(lists: &crate::freelist::FreeLists, class: usize, bp: *mut u8) -> bool {
    let mut cur = lists.root(class);
    while !cur.is_null() {
        if cur == bp {
            return true;
        }
        cur = block::next_free(cur);
    }
    false
}
