//! Size-class table for the segregated free lists.

/// Number of segregated lists.
pub const CLASS_COUNT: usize = 8;

/// Maps a whole-block size to its class index.
///
/// Bounds are inclusive: a 64-byte block belongs to class 1, a 65-byte one
/// to class 2. Everything above 2048 bytes lands in the last class.
#[inline]
pub fn class_index(size: usize) -> usize {
    match size {
        0..=32 => 0,
        33..=64 => 1,
        65..=128 => 2,
        129..=256 => 3,
        257..=512 => 4,
        513..=1024 => 5,
        1025..=2048 => 6,
        _ => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_1() {
        assert_eq!(class_index(24), 0);
        assert_eq!(class_index(32), 0);
        assert_eq!(class_index(33), 1);
        assert_eq!(class_index(64), 1);
        assert_eq!(class_index(65), 2);
        assert_eq!(class_index(512), 4);
        assert_eq!(class_index(513), 5);
        assert_eq!(class_index(2048), 6);
        assert_eq!(class_index(2049), 7);
        assert_eq!(class_index(usize::MAX), 7);
    }

    #[test]
    fn test_2() {
        // Every upper bound doubles, so crossing a bound moves up exactly
        // one class.
        let mut bound = 32;
        for class in 0..CLASS_COUNT - 1 {
            assert_eq!(class_index(bound), class);
            assert_eq!(class_index(bound + 1), class + 1);
            bound *= 2;
        }
    }
}
