//! Centerline crossing state machine.
//!
//! The tracker keeps the vertical centroid of the active blob across cycles and decides
//! whether the trajectory crossed the counting line. Only the first and last buffered
//! positions are compared, so jitter in between never blocks a count.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::CounterConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Crossing {
    /// Moved from below the line to above it.
    Enter,
    /// Moved from above the line to below it.
    Leave,
}

/// Running totals. Both fields only ever increase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub enter: u64,
    pub leave: u64,
}

impl Counts {
    fn record(&mut self, crossing: Crossing) {
        match crossing {
            Crossing::Enter => self.enter += 1,
            Crossing::Leave => self.leave += 1,
        }
    }
}

/// Ordered vertical centroid history of one episode.
///
/// The first point is held apart from the tail. When full, the oldest tail point is
/// dropped so the first entry survives.
#[derive(Clone, Debug)]
pub struct TrajectoryBuffer {
    first: Option<i32>,
    tail: VecDeque<i32>,
    capacity: usize,
}

impl TrajectoryBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            first: None,
            tail: VecDeque::with_capacity((capacity - 1).min(64)),
            capacity,
        }
    }

    pub fn push(&mut self, cy: i32) {
        if self.first.is_none() {
            self.first = Some(cy);
            return;
        }
        if self.tail.len() + 1 >= self.capacity {
            self.tail.pop_front();
        }
        self.tail.push_back(cy);
    }

    pub fn clear(&mut self) {
        self.first = None;
        self.tail.clear();
    }

    pub fn len(&self) -> usize {
        usize::from(self.first.is_some()) + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// First and last points, once at least two are buffered.
    pub fn endpoints(&self) -> Option<(i32, i32)> {
        Some((self.first?, *self.tail.back()?))
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.first.iter().chain(self.tail.iter()).copied().collect()
    }
}

/// Decide whether a trajectory crossed the line at `center_y`.
///
/// Needs at least two points. A leave starts on or above the line and ends more than
/// `margin` below it; an enter starts below the line and ends more than `margin` above it.
pub fn evaluate(trajectory: &[i32], center_y: i32, margin: i32) -> Option<Crossing> {
    match trajectory {
        [first, .., last] => crossing_between(*first, *last, center_y, margin),
        _ => None,
    }
}

fn crossing_between(first: i32, last: i32, center_y: i32, margin: i32) -> Option<Crossing> {
    if first <= center_y && last > center_y + margin {
        Some(Crossing::Leave)
    } else if first > center_y && last < center_y - margin {
        Some(Crossing::Enter)
    } else {
        None
    }
}

#[derive(Clone, Debug)]
pub struct CrossingTracker {
    trajectory: TrajectoryBuffer,
    last_motion: Option<Instant>,
    center_y: i32,
    margin: i32,
    inactivity_timeout: Duration,
}

impl CrossingTracker {
    pub fn new(cfg: &CounterConfig) -> Self {
        Self::with_geometry(
            cfg.center_y(),
            cfg.crossing_margin(),
            cfg.inactivity_timeout,
            cfg.max_trajectory,
        )
    }

    pub fn with_geometry(
        center_y: i32,
        margin: i32,
        inactivity_timeout: Duration,
        max_trajectory: usize,
    ) -> Self {
        Self {
            trajectory: TrajectoryBuffer::with_capacity(max_trajectory),
            last_motion: None,
            center_y,
            margin,
            inactivity_timeout,
        }
    }

    /// Feed the centroid of this cycle's blob.
    ///
    /// A stale trajectory (previous blob at least `inactivity_timeout` ago) is dropped
    /// before `cy` is appended. When a crossing fires the trajectory is cleared and the
    /// matching counter is incremented.
    pub fn on_blob_found(
        &mut self,
        cy: i32,
        now: Instant,
        counts: &mut Counts,
    ) -> Option<Crossing> {
        if let Some(last) = self.last_motion {
            let idle = now.saturating_duration_since(last);
            if idle >= self.inactivity_timeout && !self.trajectory.is_empty() {
                log::debug!(
                    "trajectory reset after {} ms without motion ({} points dropped)",
                    idle.as_millis(),
                    self.trajectory.len()
                );
                self.trajectory.clear();
            }
        }
        self.last_motion = Some(now);
        self.trajectory.push(cy);

        let (first, last) = self.trajectory.endpoints()?;
        let crossing = crossing_between(first, last, self.center_y, self.margin)?;
        self.trajectory.clear();
        counts.record(crossing);
        Some(crossing)
    }

    /// A cycle without a blob leaves all tracking state untouched.
    pub fn on_blob_absent(&self) {
        log::trace!(
            "no motion blob; keeping {} buffered centroids",
            self.trajectory.len()
        );
    }

    /// Snapshot of the buffered centroids, oldest first.
    pub fn trajectory(&self) -> Vec<i32> {
        self.trajectory.to_vec()
    }

    pub fn last_motion(&self) -> Option<Instant> {
        self.last_motion
    }

    pub fn center_y(&self) -> i32 {
        self.center_y
    }

    pub fn margin(&self) -> i32 {
        self.margin
    }
}
