//! The event loop.
//!
//! A [`World`] owns a fully assembled [`Topology`] and the [`Scheduler`]
//! driving it. Running the world advances the clock by ticks and
//! processes every event that became due, until the configured duration
//! has elapsed and every in-flight load has left service.
//!
//! ```
//! use telesim_core::{
//!     measure::{Capacity, Duration, Intensity, Size},
//!     source::SourceModel,
//!     topology::Topology,
//!     traffic_class::{TrafficClass, TrafficClassId},
//!     world::{World, WorldConfig},
//! };
//!
//! let mut topology = Topology::new();
//! let tc = TrafficClass::new(
//!     TrafficClassId::new(1),
//!     Intensity::new(1.0).unwrap(),
//!     Intensity::new(1.0).unwrap(),
//!     Size::new(1),
//! );
//! topology.add_traffic_class(tc).unwrap();
//! let group = topology
//!     .new_group("g")
//!     .set_capacity(Capacity::new(2))
//!     .build()
//!     .unwrap();
//! topology
//!     .new_source("s", tc.id, SourceModel::Poisson)
//!     .attach(group)
//!     .build()
//!     .unwrap();
//!
//! let config = WorldConfig {
//!     duration: Duration::new(100.0),
//!     ..WorldConfig::default()
//! };
//! let mut world = World::new(topology, config);
//! let stats = world.run(true).unwrap();
//! assert_eq!(stats.events_in_queue, 0);
//! ```

mod scheduler;

pub use self::scheduler::Scheduler;
use crate::{
    defaults::{DEFAULT_DURATION, DEFAULT_SEED, DEFAULT_TICK_LENGTH, PROGRESS_SNAPSHOT_STEP},
    event::EventKind,
    id::{EventId, GroupId, LoadId, SourceId},
    measure::{Capacity, Duration, ProbabilityError, Size, Time},
    source::SourceStream,
    stats::{GroupStats, LostServedStats, SourceStats, Stats},
    topology::Topology,
    traffic_class::TrafficClassId,
};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Invariant violated while running: the statistics of the run can no
/// longer be trusted and the run is stopped.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("source ({stream}) ended load {load} while none of its sources was active")]
    ActiveSourceUnderflow { stream: SourceId, load: LoadId },
    #[error(
        "group ({group}) bucket {bucket}: {occupied} occupied + {size} exceeds capacity {capacity}"
    )]
    OverCapacity {
        group: GroupId,
        bucket: usize,
        occupied: Size,
        size: Size,
        capacity: Capacity,
    },
    #[error("group ({group}) bucket {bucket}: releasing {size} with only {occupied} occupied")]
    NegativeOccupancy {
        group: GroupId,
        bucket: usize,
        occupied: Size,
        size: Size,
    },
    #[error("group ({group}) has no bucket {bucket}")]
    UnknownBucket { group: GroupId, bucket: usize },
    #[error("load {load} ends its service but was never admitted")]
    NotServed { load: LoadId },
    #[error("cannot schedule an event at {time}, the clock is already at {now}")]
    ScheduledInPast { time: Time, now: Time },
    #[error("the tick length must be a positive duration, got {0}")]
    InvalidTickLength(Duration),
    #[error("Group ({0}) Not Found")]
    UnknownGroup(GroupId),
    #[error("Source ({0}) Not Found")]
    UnknownSource(SourceId),
    #[error("Traffic class ({0}) Not Found")]
    UnknownTrafficClass(TrafficClassId),
    #[error("Invalid statistics: {0}")]
    Probability(#[from] ProbabilityError),
}

/// Parameters of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// seed of the random engine
    pub seed: u64,
    /// sources stop producing once the clock passes this duration
    pub duration: Duration,
    /// minimum clock advance of one iteration, strictly positive
    pub tick_length: Duration,
}

/// A single simulation run over one [`Topology`].
pub struct World {
    config: WorldConfig,
    scheduler: Scheduler,
    topology: Topology,
    initialized: bool,
}

fn source(topology: &mut Topology, id: SourceId) -> Result<&mut SourceStream, SimulationError> {
    topology
        .source_mut(id)
        .ok_or(SimulationError::UnknownSource(id))
}

impl World {
    pub fn new(topology: Topology, config: WorldConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config.seed),
            config,
            topology,
            initialized: false,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// the simulation clock
    pub fn time(&self) -> Time {
        self.scheduler.time()
    }

    fn finish_time(&self) -> Time {
        Time::ZERO + self.config.duration
    }

    /// Fraction of the configured duration already simulated, in
    /// `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let duration = self.config.duration.into_f64();
        if duration <= 0.0 {
            return 1.0;
        }
        (self.time().into_f64() / duration).min(1.0)
    }

    /// Let every source stream plan its first events.
    ///
    /// Only the first call has an effect.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        for source in self.topology.sources_mut() {
            source.init(&mut self.scheduler);
        }
        debug!(
            sources = self.topology.sources().len(),
            events = self.scheduler.pending(),
            "world initialised"
        );
    }

    /// Queue an event from outside the topology's own sources.
    pub fn schedule(&mut self, time: Time, kind: EventKind) -> Result<EventId, SimulationError> {
        let now = self.scheduler.time();
        if time < now {
            return Err(SimulationError::ScheduledInPast { time, now });
        }
        Ok(self.scheduler.schedule(time, kind))
    }

    /// Advance the clock by one tick, or up to the next pending event if
    /// it is further away, then process every event that became due.
    ///
    /// Once the clock passes the configured duration every source is
    /// paused; the queued events keep being processed.
    ///
    /// Returns `false` when the run is over. Fails without touching the
    /// clock if the configured tick length is not positive.
    pub fn next_iteration(&mut self) -> Result<bool, SimulationError> {
        self.config.check_tick_length()?;
        let ticked = self.scheduler.time() + self.config.tick_length;
        let next = match self.scheduler.next_event_time() {
            Some(next_event) => ticked.max(next_event),
            None => ticked,
        };
        self.scheduler.advance_to(next);

        let finish = self.finish_time();
        if next > finish {
            for source in self.topology.sources_mut() {
                if !source.is_paused() {
                    debug!(time = %next, source = %source.id(), "pause");
                    source.pause();
                }
            }
        }

        self.process_event()?;
        Ok(next <= finish || self.scheduler.has_pending())
    }

    /// Process, in order, every event due at the current clock.
    pub fn process_event(&mut self) -> Result<(), SimulationError> {
        while let Some((event, skipped)) = self.scheduler.pop_due() {
            let owner = event.owner();
            if skipped {
                trace!(time = %event.time, "skipped {event}");
                source(&mut self.topology, owner)?.on_skip(event.id);
                continue;
            }
            trace!(time = %event.time, "processing {event}");

            match event.kind {
                EventKind::Produce(_) => {
                    source(&mut self.topology, owner)?.on_produce(&mut self.scheduler, event.id);
                }
                EventKind::ServiceRequest(load) => {
                    source(&mut self.topology, owner)?
                        .on_service_start(&mut self.scheduler, event.id);
                    let load_id = load.id;
                    let target_group = load.target_group;
                    let served = self
                        .topology
                        .try_serve(target_group, load, &mut self.scheduler)?;
                    let source = source(&mut self.topology, owner)?;
                    if served {
                        source.on_accept(&mut self.scheduler, event.id, load_id);
                    } else {
                        source.on_drop(&mut self.scheduler, event.id);
                    }
                }
                EventKind::ServiceEnd(load) => {
                    self.topology.take_off(&load, event.time)?;
                    source(&mut self.topology, owner)?.on_service_end(&mut self.scheduler, &load)?;
                }
            }
        }
        Ok(())
    }

    /// Run to completion and return the final, validated, statistics.
    ///
    /// Unless `quiet`, a snapshot is logged every
    /// [`PROGRESS_SNAPSHOT_STEP`] of the configured duration.
    pub fn run(&mut self, quiet: bool) -> Result<Stats, SimulationError> {
        self.init();

        let mut next_snapshot = PROGRESS_SNAPSHOT_STEP;
        while self.next_iteration()? {
            if !quiet && self.progress() >= next_snapshot {
                self.log_snapshot();
                while next_snapshot <= self.progress() {
                    next_snapshot += PROGRESS_SNAPSHOT_STEP;
                }
            }
        }

        let stats = self.stats();
        stats.validate()?;
        if !quiet {
            self.log_snapshot();
        }
        Ok(stats)
    }

    fn log_snapshot(&self) {
        let stats = self.stats();
        let progress = format!("{:.0}%", self.progress() * 100.0);
        for (tc_id, lost_served) in stats.by_traffic_class() {
            let LostServedStats {
                lost,
                served,
                forwarded,
            } = lost_served;
            info!(
                time = %stats.time,
                progress = %progress,
                tc = %tc_id,
                produced = %stats.produced(tc_id),
                served = %served.count,
                lost = %lost.count,
                forwarded = %forwarded.count,
                "snapshot"
            );
        }
    }

    /// Snapshot of the statistics at the current clock.
    pub fn stats(&self) -> Stats {
        let now = self.scheduler.time();
        let groups = self
            .topology
            .groups()
            .iter()
            .map(|group| {
                let by_traffic_class = group.stats.snapshot(now);
                let total = by_traffic_class
                    .values()
                    .fold(LostServedStats::default(), |acc, stats| acc + stats.lost_served);
                GroupStats {
                    id: group.id(),
                    name: group.name().to_owned(),
                    layer: group.layer(),
                    capacities: group.capacities().to_vec(),
                    total,
                    by_traffic_class,
                }
            })
            .collect();
        let sources = self
            .topology
            .sources()
            .iter()
            .map(|source| SourceStats {
                id: source.id(),
                name: source.name().to_owned(),
                traffic_class: source.traffic_class().id,
                target_group: source.target_group(),
                loads_produced: source.loads_produced(),
            })
            .collect();

        Stats {
            time: now,
            events_in_queue: self.scheduler.pending(),
            groups,
            sources,
        }
    }
}

impl WorldConfig {
    /// An iteration must move the clock forward, or a run with an empty
    /// queue would never reach its duration.
    pub fn check_tick_length(&self) -> Result<(), SimulationError> {
        let tick = self.tick_length.into_f64();
        if tick.is_finite() && tick > 0.0 {
            Ok(())
        } else {
            Err(SimulationError::InvalidTickLength(self.tick_length))
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            duration: DEFAULT_DURATION,
            tick_length: DEFAULT_TICK_LENGTH,
        }
    }
}
