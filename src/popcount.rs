//! Bit-parallel Hamming weight ("popcount") of machine integers.

/// Number of set bits in `u`.
///
/// Implemented with the classic SWAR (SIMD within a register) reduction:
/// pairwise, then nibble-wise, then byte-wise sums, collapsed by a single
/// multiply-and-shift. Equivalent to (and ported from) an `hd` Hamming
/// distance helper, with the XOR folded out so that callers compute
/// `hw(a ^ b)` explicitly when they want a distance.
#[inline]
pub fn hw(u: u64) -> u32 {
    const M1: u64 = 0x5555_5555_5555_5555;
    const M2: u64 = 0x3333_3333_3333_3333;
    const M4: u64 = 0x0f0f_0f0f_0f0f_0f0f;
    const H01: u64 = 0x0101_0101_0101_0101;

    let mut t = u;
    t -= (t >> 1) & M1;
    t = (t & M2) + ((t >> 2) & M2);
    t = (t + (t >> 4)) & M4;
    (t.wrapping_mul(H01) >> 56) as u32
}

/// Element-wise Hamming weight over a slice. A pure map over [`hw`].
pub fn hw_vec(xs: &[u64]) -> Vec<u32> {
    xs.iter().copied().map(hw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_has_no_bits() {
        assert_eq!(hw(0), 0);
    }

    #[test]
    fn powers_of_two_have_one_bit() {
        for k in 0..64 {
            assert_eq!(hw(1u64 << k), 1, "1 << {k}");
        }
    }

    #[test]
    fn all_ones_has_64_bits() {
        assert_eq!(hw(u64::MAX), 64);
    }

    #[test]
    fn matches_count_ones_exhaustively_on_random_sample() {
        // Not exhaustive over 2^64, but dense enough to catch any
        // SWAR-constant typo across the byte boundaries.
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..100_000 {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            assert_eq!(hw(state), state.count_ones());
        }
    }

    #[test]
    fn hw_vec_is_pointwise_hw() {
        let xs = [0u64, 1, 3, 7, u64::MAX, 0xdead_beef];
        let ys = hw_vec(&xs);
        assert_eq!(ys, xs.iter().map(|&x| hw(x)).collect::<Vec<_>>());
    }
}
