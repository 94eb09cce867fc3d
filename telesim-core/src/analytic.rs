//! Closed-form loss models.
//!
//! These evaluate the blocking of a single group in isolation, without
//! running the event loop. Offered traffic is expressed in Erlangs
//! (`λ / μ`).

use crate::measure::{Capacity, Count, Probability, ProbabilityError, Size};

/// Unnormalised state probabilities are rescaled once they exceed this.
const RESCALE_ABOVE: f64 = 1e100;

fn rescale(states: &mut [f64]) {
    if let Some(last) = states.last().copied()
        && last > RESCALE_ABOVE
    {
        for state in states.iter_mut() {
            *state /= last;
        }
    }
}

fn normalize(states: &mut [f64]) {
    let sum: f64 = states.iter().sum();
    if sum > 0.0 {
        for state in states.iter_mut() {
            *state /= sum;
        }
    }
}

/// Erlang B: probability that all `capacity` servers of a full
/// availability group are busy under `traffic` Erlangs of Poisson
/// traffic.
///
/// ```
/// # use telesim_core::{analytic::erlang_b, measure::Capacity};
/// let b = erlang_b(Capacity::new(1), 1.0).unwrap();
/// assert_eq!(b.value(), 0.5);
/// ```
pub fn erlang_b(capacity: Capacity, traffic: f64) -> Result<Probability, ProbabilityError> {
    let mut blocking = 1.0;
    for servers in 1..=capacity.into_u64() {
        let servers = servers as f64;
        blocking = traffic * blocking / (servers + traffic * blocking);
    }
    Probability::new(blocking)
}

/// Engset time congestion of a group of `capacity` servers fed by
/// `sources` sources, each offering `traffic_per_idle_source` Erlangs
/// while idle.
pub fn engset(
    capacity: Capacity,
    sources: Count,
    traffic_per_idle_source: f64,
) -> Result<Probability, ProbabilityError> {
    let capacity = capacity.into_u64();
    let sources = sources.into_u64();
    if sources < capacity {
        return Ok(Probability::ZERO);
    }

    let mut states = Vec::with_capacity(capacity as usize + 1);
    states.push(1.0);
    for n in 1..=capacity {
        let previous = states[(n - 1) as usize];
        states.push(previous * (sources - n + 1) as f64 / n as f64 * traffic_per_idle_source);
        rescale(&mut states);
    }
    normalize(&mut states);
    Probability::new(states.last().copied().unwrap_or_default())
}

/// Kaufman–Roberts occupancy distribution of a multi-rate group of
/// `capacity` units.
///
/// `classes` holds, per traffic class, the offered traffic in Erlangs and
/// the units taken by one load. The returned vector holds the probability
/// of every occupancy from `0` to `capacity`.
pub fn kaufman_roberts_distribution(
    capacity: Capacity,
    classes: &[(f64, Size)],
) -> Result<Vec<Probability>, ProbabilityError> {
    let capacity = capacity.into_u64() as usize;
    let mut states = vec![0.0; capacity + 1];
    states[0] = 1.0;

    for n in 1..=capacity {
        let mut state = 0.0;
        for (traffic, size) in classes {
            let size = size.into_u64() as usize;
            if size > 0 && size <= n {
                state += traffic * size as f64 * states[n - size];
            }
        }
        states[n] = state / n as f64;
        rescale(&mut states[..=n]);
    }
    normalize(&mut states);

    states.into_iter().map(Probability::new).collect()
}

/// Per class blocking of a multi-rate group: the probability that fewer
/// than `size` units are free.
///
/// ```
/// # use telesim_core::{analytic::kaufman_roberts_blocking, measure::{Capacity, Size}};
/// let blocking = kaufman_roberts_blocking(
///     Capacity::new(4),
///     &[(1.0, Size::new(1)), (0.5, Size::new(2))],
/// )
/// .unwrap();
/// assert!(blocking[0] < blocking[1]);
/// ```
pub fn kaufman_roberts_blocking(
    capacity: Capacity,
    classes: &[(f64, Size)],
) -> Result<Vec<Probability>, ProbabilityError> {
    let distribution = kaufman_roberts_distribution(capacity, classes)?;
    let capacity = capacity.into_u64() as usize;

    classes
        .iter()
        .map(|(_, size)| {
            let size = size.into_u64() as usize;
            let first_blocked = (capacity + 1).saturating_sub(size.max(1));
            let blocking: f64 = distribution[first_blocked..].iter().map(|p| p.value()).sum();
            // rounding may push the sum right above 1
            Probability::new(blocking.min(1.0))
        })
        .collect()
}
