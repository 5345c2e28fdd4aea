//! Linear congruential generator for reservoir sampling of local hits.

/// LCG state, advanced as `state = 1103515245 * state + 12345 (mod 2^32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LcgState(pub u32);

impl LcgState {
    /// Start from `seed`.
    pub fn new(seed: u32) -> Self {
        Self(seed)
    }

    /// Advance and return the new state.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence() {
        let mut lcg = LcgState::new(0);
        assert_eq!(lcg.next_u32(), 12_345);
        assert_eq!(lcg.next_u32(), 12_345u32.wrapping_mul(1_103_515_245).wrapping_add(12_345));
    }
}
