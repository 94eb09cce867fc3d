use std::fmt;

/// A validated probability in the range `[0.0, 1.0]`.
///
/// Every ratio reported by the statistics (`P_loss`, `P_block`, ...) and
/// every analytic result goes through [`Probability::new`]; a value
/// outside the range means the bookkeeping is wrong, never that the
/// network is overloaded.
///
/// ```
/// # use telesim_core::measure::Probability;
/// let p = Probability::new(0.25).unwrap();
/// assert_eq!(p.to_string(), "25%");
/// assert!(Probability::new(1.5).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Probability(f64);

/// Error returned when constructing a [`Probability`] with a value
/// outside `[0.0, 1.0]` (including NaN).
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("probability must be in [0.0, 1.0], got {0}")]
pub struct ProbabilityError(pub f64);

impl Probability {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    pub fn new(probability: f64) -> Result<Self, ProbabilityError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ProbabilityError(probability));
        }
        Ok(Self(probability))
    }

    /// `part / (part + rest...)`, `0` when the sum is `0`.
    ///
    /// ```
    /// # use telesim_core::measure::Probability;
    /// let p = Probability::ratio_to_sum(1.0, &[3.0]).unwrap();
    /// assert_eq!(p.value(), 0.25);
    /// assert_eq!(Probability::ratio_to_sum(0.0, &[0.0]).unwrap(), Probability::ZERO);
    /// ```
    pub fn ratio_to_sum(part: f64, rest: &[f64]) -> Result<Self, ProbabilityError> {
        let sum = part + rest.iter().sum::<f64>();
        if sum == 0.0 {
            return Ok(Self::ZERO);
        }
        Self::new(part / sum)
    }

    /// Returns the inner `f64` value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Probability {
    /// Formats as a percentage with up to 2 decimal places.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = self.0 * 100.0;
        if pct.fract() == 0.0 {
            write!(f, "{}%", pct as u64)
        } else {
            write!(f, "{:.2}%", pct)
        }
    }
}
