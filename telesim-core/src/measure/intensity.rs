use crate::measure::Count;
use std::{
    fmt,
    ops::{Div, Mul},
};

/// A rate of events per unit of simulated time.
///
/// Used both for the offered arrival rate of a traffic class
/// (`source_intensity`, λ) and for its service rate (`serve_intensity`,
/// μ). An intensity is always finite and strictly positive, constructed
/// via [`Intensity::new`].
///
/// ```
/// # use telesim_core::measure::{Intensity, IntensityFactor};
/// let lambda = Intensity::new(2.0).unwrap();
/// let mu = Intensity::new(0.5).unwrap();
///
/// // offered traffic in Erlangs
/// assert_eq!(lambda / mu, 4.0);
///
/// // compressed service runs twice as fast
/// let faster = mu * IntensityFactor::new(2.0).unwrap();
/// assert_eq!(faster.into_f64(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Intensity(f64);

/// A multiplier applied to a service [`Intensity`] (see compression
/// ratios on a [`Group`]). Finite and strictly positive.
///
/// [`Group`]: crate::group::Group
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct IntensityFactor(f64);

/// Error returned when an [`Intensity`] or an [`IntensityFactor`] is
/// NaN, infinite, zero or negative.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("intensity must be finite and strictly positive, got {0}")]
pub struct IntensityError(f64);

fn validate(value: f64) -> Result<f64, IntensityError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(IntensityError(value))
    }
}

impl Intensity {
    pub fn new(intensity: f64) -> Result<Self, IntensityError> {
        validate(intensity).map(Self)
    }

    #[inline(always)]
    pub fn into_f64(self) -> f64 {
        self.0
    }

    /// Split the intensity evenly between `sources` independent sources.
    ///
    /// Finite-population streams (Engset, Pascal) draw the renewal gap of
    /// every individual source from this share.
    ///
    /// # Errors
    ///
    /// Fails if `sources` is zero.
    pub fn per_source(self, sources: Count) -> Result<Self, IntensityError> {
        Self::new(self.0 / sources.into_u64() as f64)
    }
}

impl IntensityFactor {
    /// no change to the service intensity
    pub const ONE: Self = Self(1.0);

    pub fn new(factor: f64) -> Result<Self, IntensityError> {
        validate(factor).map(Self)
    }

    #[inline(always)]
    pub fn into_f64(self) -> f64 {
        self.0
    }
}

impl Mul<IntensityFactor> for Intensity {
    type Output = Intensity;
    fn mul(self, rhs: IntensityFactor) -> Self::Output {
        Intensity(self.0 * rhs.0)
    }
}

/// The offered traffic (in Erlangs) of an arrival rate against a service
/// rate.
impl Div for Intensity {
    type Output = f64;
    fn div(self, rhs: Self) -> Self::Output {
        self.0 / rhs.0
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl fmt::Display for IntensityFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid() {
        assert!(Intensity::new(0.0).is_err());
        assert!(Intensity::new(-1.0).is_err());
        assert!(Intensity::new(f64::NAN).is_err());
        assert!(Intensity::new(f64::INFINITY).is_err());
        assert!(IntensityFactor::new(0.0).is_err());
    }

    #[test]
    fn per_source() {
        let lambda = Intensity::new(10.0).unwrap();
        assert_eq!(lambda.per_source(Count::new(4)).unwrap().into_f64(), 2.5);
        assert!(lambda.per_source(Count::ZERO).is_err());
    }

    #[test]
    fn error_display() {
        let err = Intensity::new(-2.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "intensity must be finite and strictly positive, got -2"
        );
    }
}
