use crate::{
    defaults::MAX_PATH_LENGTH,
    measure::{Intensity, Size},
};
use std::{collections::BTreeMap, fmt};

/// The identifier of a [`TrafficClass`], chosen by whoever assembles the
/// topology (usually the scenario file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrafficClassId(u64);

impl TrafficClassId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TrafficClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// # Class of traffic
///
/// Immutable description shared by every source producing this class and
/// every group serving it. Changing any parameter means registering a new
/// class under a new [`TrafficClassId`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficClass {
    pub id: TrafficClassId,
    /// offered arrival rate (λ)
    pub source_intensity: Intensity,
    /// service rate (μ)
    pub serve_intensity: Intensity,
    /// resource units taken by one load
    pub size: Size,
    /// number of groups a load may visit before it is dropped
    pub max_path_length: u64,
}

impl TrafficClass {
    pub fn new(
        id: TrafficClassId,
        source_intensity: Intensity,
        serve_intensity: Intensity,
        size: Size,
    ) -> Self {
        Self {
            id,
            source_intensity,
            serve_intensity,
            size,
            max_path_length: MAX_PATH_LENGTH,
        }
    }

    pub fn with_max_path_length(mut self, max_path_length: u64) -> Self {
        self.max_path_length = max_path_length;
        self
    }

    /// offered traffic in Erlangs (`λ / μ`)
    pub fn offered_traffic(&self) -> f64 {
        self.source_intensity / self.serve_intensity
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[TrafficClass id={} λ={} μ={} size={}",
            self.id, self.source_intensity, self.serve_intensity, self.size
        )?;
        if self.max_path_length != MAX_PATH_LENGTH {
            write!(f, " max_path={}", self.max_path_length)?;
        }
        write!(f, "]")
    }
}

/// The registry of every [`TrafficClass`] of a topology, ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficClasses(BTreeMap<TrafficClassId, TrafficClass>);

impl TrafficClasses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tc`.
    ///
    /// Returns the already registered class if one with the same id but a
    /// different definition exists; re-registering an identical class is
    /// a no-op.
    pub(crate) fn insert(&mut self, tc: TrafficClass) -> Result<(), TrafficClass> {
        match self.0.get(&tc.id) {
            Some(existing) if existing != &tc => Err(*existing),
            Some(_) => Ok(()),
            None => {
                self.0.insert(tc.id, tc);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: TrafficClassId) -> Option<&TrafficClass> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: TrafficClassId) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrafficClass> {
        self.0.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = TrafficClassId> + '_ {
        self.0.keys().copied()
    }
}
