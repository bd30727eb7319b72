//! Injectable randomness for acknowledgment selection.

/// Source of uniform index choices.
///
/// Seam so that active-mode acknowledgment choice is deterministic under
/// test.
pub trait RandomSource: Send + Sync {
    /// Pick an index in `0..len`. `len` must be non-zero.
    fn pick(&self, len: usize) -> usize;
}

/// Thread-local RNG backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl RandomSource for SystemRandom {
    fn pick(&self, len: usize) -> usize {
        use rand::Rng;
        rand::rng().random_range(0..len)
    }
}

/// Deterministic source returning a fixed index (clamped to range).
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub usize);

impl RandomSource for FixedRandom {
    fn pick(&self, len: usize) -> usize {
        self.0.min(len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_random_stays_in_range() {
        let random = SystemRandom;
        for _ in 0..100 {
            assert!(random.pick(5) < 5);
        }
        assert_eq!(random.pick(1), 0);
    }

    #[test]
    fn test_fixed_random_returns_index() {
        assert_eq!(FixedRandom(3).pick(5), 3);
    }

    #[test]
    fn test_fixed_random_clamps_to_range() {
        assert_eq!(FixedRandom(10).pick(5), 4);
        assert_eq!(FixedRandom(10).pick(0), 0);
    }
}
