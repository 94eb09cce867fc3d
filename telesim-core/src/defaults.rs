use crate::measure::Duration;

/// Default seed of the [`World`]'s random engine.
///
/// Two worlds built from the same topology with the same seed and
/// duration produce identical statistics.
///
/// [`World`]: crate::world::World
pub const DEFAULT_SEED: u64 = 0;

/// Default length of one scheduler iteration.
///
/// The clock advances by at least this amount on every call to
/// [`World::next_iteration`], or straight to the next pending event if
/// that is further away.
///
/// ```
/// # use telesim_core::defaults::*;
/// assert_eq!(DEFAULT_TICK_LENGTH.to_string(), "0.5");
/// ```
///
/// [`World::next_iteration`]: crate::world::World::next_iteration
pub const DEFAULT_TICK_LENGTH: Duration = Duration::new(0.5);

/// Default simulated duration used by [`WorldConfig::default`].
///
/// [`WorldConfig::default`]: crate::world::WorldConfig
pub const DEFAULT_DURATION: Duration = Duration::new(10_000.0);

/// Number of topological tiers a [`Group`] may be placed in.
///
/// A group's layer must be strictly lower than this value.
///
/// [`Group`]: crate::group::Group
pub const MAX_LAYERS: u64 = 3;

/// How many groups of a given layer a load may visit before the
/// overflow policies stop offering that layer.
pub const OVERFLOWS_PER_LAYER: usize = 2;

/// Default hop budget of a [`TrafficClass`]: unlimited.
///
/// [`TrafficClass`]: crate::traffic_class::TrafficClass
pub const MAX_PATH_LENGTH: u64 = u64::MAX;

/// Fractions of the run at which [`World::run`] logs a statistics
/// snapshot when not quiet.
///
/// [`World::run`]: crate::world::World::run
pub const PROGRESS_SNAPSHOT_STEP: f64 = 0.25;
