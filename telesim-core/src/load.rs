use crate::{
    group::CompressionRatio,
    id::{GroupId, LoadId, SourceId},
    measure::{Size, Time},
    traffic_class::TrafficClassId,
};
use std::fmt;

/// # One in-flight request
///
/// A [`Load`] is created by a [`SourceStream`] at arrival and travels
/// with its service-request event to the target group, possibly on to
/// overflow groups, and finally with its service-end event. It is
/// consumed when that terminal event (service end or final drop) is
/// processed.
///
/// [`SourceStream`]: crate::source::SourceStream
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub id: LoadId,
    pub tc_id: TrafficClassId,
    pub send_time: Time,
    /// resource units requested; rewritten when admitted under compression
    pub size: Size,
    /// bucket of the serving group that admitted the load
    pub bucket: usize,
    /// set once the load has been admitted
    pub end_time: Option<Time>,
    /// the load must not be forwarded any further
    pub drop: bool,
    pub compression_ratio: Option<CompressionRatio>,
    /// every group the load has been offered to, in order
    pub served_by: Vec<GroupId>,
    pub produced_by: SourceId,
    pub target_group: GroupId,
}

impl Load {
    pub(crate) fn new(
        id: LoadId,
        tc_id: TrafficClassId,
        send_time: Time,
        size: Size,
        produced_by: SourceId,
        target_group: GroupId,
    ) -> Self {
        Self {
            id,
            tc_id,
            send_time,
            size,
            bucket: 0,
            end_time: None,
            drop: false,
            compression_ratio: None,
            served_by: Vec::with_capacity(4),
            produced_by,
            target_group,
        }
    }

    /// number of groups the load has been offered to so far
    #[inline]
    pub fn path_length(&self) -> u64 {
        self.served_by.len() as u64
    }

    /// `true` if the load has already been offered to `group`
    #[inline]
    pub fn visited(&self, group: GroupId) -> bool {
        self.served_by.contains(&group)
    }

    /// the last group the load has been offered to
    #[inline]
    pub fn current_group(&self) -> Option<GroupId> {
        self.served_by.last().copied()
    }
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_time {
            None => write!(
                f,
                "[Load: id={}, tc={}, size={}, st={}]",
                self.id, self.tc_id, self.size, self.send_time
            ),
            Some(end_time) => write!(
                f,
                "[Load: id={}, tc={}, size={}, st={}, dt={}]",
                self.id,
                self.tc_id,
                self.size,
                self.send_time,
                end_time - self.send_time
            ),
        }
    }
}
