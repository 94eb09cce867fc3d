//! Strongly typed scalar units.
//!
//! Every quantity flowing through the engine has its own type so that a
//! [`Size`] can not be added to a [`Time`], or an [`Intensity`] compared
//! to a [`Probability`], by accident.

mod capacity;
mod intensity;
mod probability;
mod time;

pub use self::{
    capacity::{Capacity, Count, Size},
    intensity::{Intensity, IntensityError, IntensityFactor},
    probability::{Probability, ProbabilityError},
    time::{Duration, DurationParseError, Time},
};
