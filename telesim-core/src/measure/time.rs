use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign, Div, Sub},
    str::FromStr,
};

/// A point on the simulation clock.
///
/// The clock starts at [`Time::ZERO`] and is expressed in the same
/// (abstract) unit as the inverse of every [`Intensity`] of the
/// topology. [`Time`] is totally ordered: it is what the event queue
/// sorts on.
///
/// ```
/// # use telesim_core::measure::{Duration, Time};
/// let t = Time::ZERO + Duration::new(1.5);
/// assert_eq!(t - Time::ZERO, Duration::new(1.5));
/// assert!(Time::ZERO < t);
/// ```
///
/// [`Intensity`]: crate::measure::Intensity
#[derive(Debug, Clone, Copy, Default)]
pub struct Time(f64);

/// A span of simulated time (the difference between two [`Time`]s).
#[derive(Debug, Clone, Copy, Default)]
pub struct Duration(f64);

impl Time {
    pub const ZERO: Self = Self(0.0);

    #[inline(always)]
    pub const fn new(time: f64) -> Self {
        Self(time)
    }

    #[inline(always)]
    pub fn into_f64(self) -> f64 {
        self.0
    }

    /// The elapsed [`Duration`] since the start of the simulation.
    #[inline(always)]
    pub fn since_start(self) -> Duration {
        Duration(self.0)
    }
}

impl Duration {
    pub const ZERO: Self = Self(0.0);

    #[inline(always)]
    pub const fn new(duration: f64) -> Self {
        Self(duration)
    }

    #[inline(always)]
    pub fn into_f64(self) -> f64 {
        self.0
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Time {}
impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialEq for Duration {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Duration {}
impl PartialOrd for Duration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Duration {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<Duration> for Time {
    type Output = Time;
    fn add(self, rhs: Duration) -> Self::Output {
        Time(self.0 + rhs.0)
    }
}
impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}
impl Sub for Time {
    type Output = Duration;
    fn sub(self, rhs: Self) -> Self::Output {
        Duration(self.0 - rhs.0)
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Self) -> Self::Output {
        Duration(self.0 + rhs.0)
    }
}
impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}
/// The ratio of two durations, e.g. the fraction of the simulation spent
/// in a blocked state.
impl Div for Duration {
    type Output = f64;
    fn div(self, rhs: Self) -> Self::Output {
        self.0 / rhs.0
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error returned when parsing a [`Duration`] that is not a finite,
/// non-negative number.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid duration `{0}', expecting a finite non-negative number")]
pub struct DurationParseError(String);

impl FromStr for Duration {
    type Err = DurationParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| DurationParseError(s.to_owned()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(DurationParseError(s.to_owned()));
        }
        Ok(Self(value))
    }
}
