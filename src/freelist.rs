//! The segregated free-list registry: eight class roots and the link and
//! unlink primitives.
//!
//! Lists are doubly linked through the first 16 payload bytes of each free
//! block and are null-terminated at both ends. Insertion is LIFO at the
//! head of the class picked by the block's size, so a block that grows
//! through coalescing moves to a higher class when it is relinked.

use core::ptr::null_mut;

use crate::block;
use crate::classes::{class_index, CLASS_COUNT};

#[derive(Debug)]
pub struct FreeLists {
    roots: [*mut u8; CLASS_COUNT],
}

impl FreeLists {
    /// Creates a registry with all eight lists empty.
    #[inline]
    pub const fn new() -> Self {
        FreeLists {
            roots: [null_mut(); CLASS_COUNT],
        }
    }

    /// Returns the head of the class list, or null if the list is empty.
    #[inline]
    pub fn root(&self, class: usize) -> *mut u8 {
        self.roots[class]
    }

    /// Pushes the free block at `bp` onto the head of its class list.
    ///
    /// # Safety
    /// `bp` must be a free block whose tags hold its final size, not yet on
    /// any list; its first 16 payload bytes are overwritten with the links.
    pub unsafe fn link(&mut self, bp: *mut u8) {
        let class = class_index(block::size(bp));
        let head = self.roots[class];

        block::set_next_free(bp, head);
        block::set_prev_free(bp, null_mut());
        if !head.is_null() {
            block::set_prev_free(head, bp);
        }
        self.roots[class] = bp;
    }

    /// Removes the free block at `bp` from its class list.
    ///
    /// # Safety
    /// `bp` must be on the list selected by its current header size; callers
    /// that are about to resize a block must unlink it first.
    pub unsafe fn unlink(&mut self, bp: *mut u8) {
        let prev = block::prev_free(bp);
        let next = block::next_free(bp);

        if prev.is_null() {
            self.roots[class_index(block::size(bp))] = next;
        } else {
            block::set_next_free(prev, next);
        }
        if !next.is_null() {
            block::set_prev_free(next, prev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{write_tags, MIN_BLOCK};

    #[repr(C, align(8))]
    struct Arena([u8; 512]);

    /// Lays out `count` minimum-size free blocks in the arena and returns
    /// their block pointers.
    unsafe fn fabricate(arena: &mut Arena, count: usize) -> Vec<*mut u8> {
        assert!(8 + count * MIN_BLOCK <= arena.0.len());
        (0..count)
            .map(|i| {
                let bp = arena.0.as_mut_ptr().add(8 + i * MIN_BLOCK);
                write_tags(bp, MIN_BLOCK, false);
                bp
            })
            .collect()
    }

    #[test]
    fn test_1() {
        let lists = FreeLists::new();
        for class in 0..CLASS_COUNT {
            assert!(lists.root(class).is_null(), "lists should start empty");
        }
    }

    #[test]
    fn test_2() {
        // LIFO order: the last linked block is the root, links chain back.
        let mut arena = Arena([0; 512]);
        let mut lists = FreeLists::new();
        unsafe {
            let blocks = fabricate(&mut arena, 4);
            for &bp in &blocks {
                lists.link(bp);
            }
            // MIN_BLOCK sized blocks all land in class 0.
            assert_eq!(lists.root(0), blocks[3]);
            let mut walked = vec![];
            let mut bp = lists.root(0);
            while !bp.is_null() {
                walked.push(bp);
                bp = block::next_free(bp);
            }
            assert_eq!(walked, vec![blocks[3], blocks[2], blocks[1], blocks[0]]);
            assert!(block::prev_free(lists.root(0)).is_null());
        }
    }

    #[test]
    fn test_3() {
        // Unlinking the head, an interior block, and the tail all keep the
        // list properly doubly linked.
        let mut arena = Arena([0; 512]);
        let mut lists = FreeLists::new();
        unsafe {
            let blocks = fabricate(&mut arena, 3);
            for &bp in &blocks {
                lists.link(bp);
            }

            lists.unlink(blocks[1]); // interior
            assert_eq!(block::next_free(blocks[2]), blocks[0]);
            assert_eq!(block::prev_free(blocks[0]), blocks[2]);

            lists.unlink(blocks[2]); // head
            assert_eq!(lists.root(0), blocks[0]);
            assert!(block::prev_free(blocks[0]).is_null());

            lists.unlink(blocks[0]); // last one standing
            assert!(lists.root(0).is_null());
        }
    }

    #[test]
    fn test_4() {
        // A block is linked into the class of its size, not a fixed list.
        let mut arena = Arena([0; 512]);
        let mut lists = FreeLists::new();
        unsafe {
            let small = arena.0.as_mut_ptr().add(8);
            write_tags(small, 32, false);
            let large = arena.0.as_mut_ptr().add(8 + 32);
            write_tags(large, 128, false);

            lists.link(small);
            lists.link(large);
            assert_eq!(lists.root(0), small);
            assert_eq!(lists.root(2), large);
            assert!(lists.root(1).is_null());

            lists.unlink(large);
            assert!(lists.root(2).is_null());
            assert_eq!(lists.root(0), small);
        }
    }
}
