use std::fmt;

/// Stable handle of a [`Group`] inside its [`Topology`].
///
/// Handles are assigned sequentially when the group is built and index
/// directly into the topology's arena of groups.
///
/// [`Group`]: crate::group::Group
/// [`Topology`]: crate::topology::Topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(usize);

/// Stable handle of a [`SourceStream`] inside its [`Topology`].
///
/// [`SourceStream`]: crate::source::SourceStream
/// [`Topology`]: crate::topology::Topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(usize);

/// # [`Load`] Identifier
///
/// Unique for the whole run: drawn from the same monotonic counter as
/// the [`EventId`]s.
///
/// [`Load`]: crate::load::Load
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadId(u64);

/// # [`Event`] Identifier
///
/// Breaks ties between events scheduled at the same time: the lower id
/// (i.e. the event scheduled first) is processed first.
///
/// [`Event`]: crate::event::Event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl GroupId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl SourceId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl LoadId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl EventId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// A generator of monotonically increasing **unique** identifiers.
///
/// The first identifier handed out is `1`; `0` is never produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct UuidGenerator(u64);

impl UuidGenerator {
    pub(crate) fn new() -> Self {
        Self(0)
    }

    pub(crate) fn generate(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}
impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}
impl fmt::Display for LoadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
