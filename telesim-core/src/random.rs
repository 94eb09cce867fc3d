//! Sampling helpers on top of the world's random engine.
//!
//! The caller always provides the `rng` so that every random decision of
//! a run is drawn from the single, seedable generator owned by the
//! [`World`]. Any type that implements [`Rng`] can be used.
//!
//! [`World`]: crate::world::World

use crate::measure::{Duration, Intensity};
use rand_core::Rng;
use rand_distr::{Distribution as _, Exp1, Uniform};

/// Draw an exponentially distributed gap with the given rate.
pub fn exponential<R: Rng>(rng: &mut R, rate: Intensity) -> Duration {
    let unit: f64 = Exp1.sample(rng);
    Duration::new(unit / rate.into_f64())
}

/// Pick an index uniformly in `0..len`. Returns `None` when `len == 0`.
pub fn uniform_index<R: Rng>(rng: &mut R, len: usize) -> Option<usize> {
    let range = Uniform::new(0_usize, len).ok()?;
    Some(range.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaChaRng;
    use rand_core::SeedableRng as _;

    fn rng() -> ChaChaRng {
        ChaChaRng::seed_from_u64(42)
    }

    #[test]
    fn exponential_mean() {
        let mut rng = rng();
        let rate = Intensity::new(2.0).unwrap();
        let n = 100_000;
        let sum: f64 = (0..n)
            .map(|_| exponential(&mut rng, rate).into_f64())
            .sum();
        let mean = sum / n as f64;
        assert!((mean - 0.5).abs() < 0.01, "mean was {mean}");
    }

    #[test]
    fn exponential_is_positive() {
        let mut rng = rng();
        let rate = Intensity::new(1.0).unwrap();
        for _ in 0..10_000 {
            assert!(exponential(&mut rng, rate) >= Duration::ZERO);
        }
    }

    #[test]
    fn uniform_index_covers_range() {
        let mut rng = rng();
        let mut hits = [0u32; 4];
        for _ in 0..4_000 {
            hits[uniform_index(&mut rng, 4).unwrap()] += 1;
        }
        for hit in hits {
            assert!(hit > 850 && hit < 1150, "hits were {hits:?}");
        }
        assert_eq!(uniform_index(&mut rng, 0), None);
    }

    #[test]
    fn reproducible_with_same_seed() {
        let rate = Intensity::new(3.0).unwrap();
        let a: Vec<Duration> = {
            let mut rng = ChaChaRng::seed_from_u64(7);
            (0..100).map(|_| exponential(&mut rng, rate)).collect()
        };
        let b: Vec<Duration> = {
            let mut rng = ChaChaRng::seed_from_u64(7);
            (0..100).map(|_| exponential(&mut rng, rate)).collect()
        };
        assert_eq!(a, b);
    }
}
