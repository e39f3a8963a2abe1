//! Deterministic synthesis of simulated side-channel leakage traces.
//!
//! Ported from `cdpa_trace_generation.py`: for each trace, two masked
//! (Boolean-shared) values `X + W` and `Y` are XORed share-by-share, the
//! Hamming weight of each pairwise XOR accumulates into the leakage, and
//! the final unmasked pair contributes the last term.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::config::EngineConfig;
use crate::error::CdpaError;
use crate::popcount::hw;

/// Output of [`generate_traces`]: the known inputs, the leakage samples,
/// and the ground-truth secrets (kept only for harness comparison, never
/// fed back into the attack).
#[derive(Debug, Clone)]
pub struct GeneratedTraces {
    pub data: Vec<u64>,
    pub traces: Vec<f64>,
    pub x: u64,
    pub y: u64,
}

/// Draw a fresh set of traces for the parameters in `cfg`.
///
/// When `seed` is `Some`, the draw is bitwise-deterministic for a fixed
/// `(cfg.bit_count, cfg.share_count, cfg.trace_count, cfg.noise, seed)`
/// tuple, on any platform this crate compiles to. The draw order is fixed
/// and load-bearing for reproducibility:
///
/// 1. `X`, then `Y`, uniform in `[0, 2^b)`.
/// 2. `data[0..N)`, uniform in `[0, 2^b)`.
/// 3. `x_shares[1..d) x [0..N)`, row-major, uniform in `[0, 2^b)`.
/// 4. `y_shares[1..d) x [0..N)`, row-major, uniform in `[0, 2^b)`.
/// 5. If `sigma > 0`, `N` samples from `Normal(0, sigma^2)`, in index order.
pub fn generate_traces(
    cfg: &EngineConfig,
    seed: Option<u64>,
) -> Result<GeneratedTraces, CdpaError> {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let mask = cfg.mask();
    let n = cfg.trace_count as usize;
    let d = cfg.share_count;

    let x = draw_word(&mut rng, mask);
    let y = draw_word(&mut rng, mask);

    let data: Vec<u64> = (0..n).map(|_| draw_word(&mut rng, mask)).collect();

    // x_shares[k][i] and y_shares[k][i] for k in 0..d-1, row-major.
    let mut x_shares = vec![vec![0u64; n]; (d - 1) as usize];
    for row in x_shares.iter_mut() {
        for slot in row.iter_mut() {
            *slot = draw_word(&mut rng, mask);
        }
    }
    let mut y_shares = vec![vec![0u64; n]; (d - 1) as usize];
    for row in y_shares.iter_mut() {
        for slot in row.iter_mut() {
            *slot = draw_word(&mut rng, mask);
        }
    }

    let noise_samples: Option<Vec<f64>> = if cfg.noise > 0.0 {
        let normal = Normal::new(0.0, cfg.noise)?;
        Some((0..n).map(|_| normal.sample(&mut rng)).collect())
    } else {
        None
    };

    let mut delta = vec![0u64; n];
    let mut eta = vec![y; n];
    let mut leakage = vec![0u32; n];
    for i in 0..n {
        delta[i] = x.wrapping_add(data[i]) & mask;
    }
    for k in 0..(d - 1) as usize {
        for i in 0..n {
            leakage[i] += hw(x_shares[k][i] ^ y_shares[k][i]);
            delta[i] ^= x_shares[k][i];
            eta[i] ^= y_shares[k][i];
        }
    }
    for i in 0..n {
        leakage[i] += hw(delta[i] ^ eta[i]);
    }

    let traces: Vec<f64> = match noise_samples {
        Some(noise) => leakage
            .iter()
            .zip(noise)
            .map(|(&l, eps)| l as f64 + eps)
            .collect(),
        None => leakage.iter().map(|&l| l as f64).collect(),
    };

    Ok(GeneratedTraces { data, traces, x, y })
}

/// Uniform draw in `[0, mask]` (i.e. `[0, 2^b)`), matching the reference's
/// `randint(1 << bit_count)` draws.
fn draw_word(rng: &mut StdRng, mask: u64) -> u64 {
    if mask == u64::MAX {
        rng.gen::<u64>()
    } else {
        rng.gen_range(0..=mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagMode;

    fn cfg(b: u32, d: u32, n: u64, noise: f64) -> EngineConfig {
        EngineConfig::new(b, d, n, noise, 1, Some(7), DiagMode::Off, 1).unwrap()
    }

    #[test]
    fn same_seed_is_bitwise_deterministic() {
        let c = cfg(16, 2, 256, 0.0);
        let a = generate_traces(&c, Some(42)).unwrap();
        let b = generate_traces(&c, Some(42)).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
        assert_eq!(a.data, b.data);
        assert_eq!(a.traces, b.traces);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let c = cfg(16, 2, 256, 0.0);
        let a = generate_traces(&c, Some(1)).unwrap();
        let b = generate_traces(&c, Some(2)).unwrap();
        assert!(a.x != b.x || a.y != b.y || a.data != b.data);
    }

    #[test]
    fn unshared_noiseless_traces_are_bounded_by_bit_count() {
        let c = cfg(8, 1, 4096, 0.0);
        let g = generate_traces(&c, Some(3)).unwrap();
        for &t in &g.traces {
            assert!(t >= 0.0 && t <= 8.0, "trace {t} out of [0, b] range");
            assert_eq!(t.fract(), 0.0);
        }
    }

    #[test]
    fn unshared_noiseless_trace_equals_hw_of_xy_xor() {
        let c = cfg(8, 1, 2048, 0.0);
        let g = generate_traces(&c, Some(9)).unwrap();
        for (i, &w) in g.data.iter().enumerate() {
            let mask = c.mask();
            let expected = hw((g.x.wrapping_add(w) & mask) ^ g.y) as f64;
            assert_eq!(g.traces[i], expected);
        }
    }

    #[test]
    fn secrets_respect_bit_width() {
        let c = cfg(5, 3, 1000, 0.0);
        let g = generate_traces(&c, Some(11)).unwrap();
        assert!(g.x < (1 << 5));
        assert!(g.y < (1 << 5));
        for &w in &g.data {
            assert!(w < (1 << 5));
        }
    }

    #[test]
    fn noise_makes_traces_non_integral_in_general() {
        let c = cfg(8, 1, 64, 5.0);
        let g = generate_traces(&c, Some(21)).unwrap();
        assert!(g.traces.iter().any(|t| t.fract() != 0.0));
    }
}
