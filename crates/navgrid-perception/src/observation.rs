//! Sliding observation buffers.
//!
//! Each sensor source owns an [`ObservationBuffer`]: incoming point clouds
//! are converted into the global frame, height-filtered, and retained for a
//! configurable persistence window.  The buffer also tracks how recently it
//! was fed, so the update cycle can tell whether the sensor stream is still
//! alive before trusting the grid it produces.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use navgrid_types::{NavError, Observation, Point3, PointCloud};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::transform::{LookupTime, TransformSource};

/// An [`ObservationBuffer`] shared between its feeding source and the
/// update cycle.  Each buffer has its own lock; the grid lock is never
/// taken while one of these is held.
pub type SharedBuffer = Arc<Mutex<ObservationBuffer>>;

/// Construction parameters for an [`ObservationBuffer`].
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Topic the feeding source listens on, used in log output.
    pub topic: String,
    /// Frame observations are converted into.
    pub global_frame: String,
    /// How long buffered observations stay relevant.  Zero keeps only the
    /// most recent one.
    pub observation_persistence: Duration,
    /// Longest acceptable gap between updates.  Zero disables the staleness
    /// check entirely.
    pub expected_interval: Duration,
    /// Height band (in the global frame) outside which points are dropped.
    pub min_obstacle_height: f32,
    pub max_obstacle_height: f32,
    /// Maximum distance from the sensor origin at which points mark
    /// obstacles.
    pub obstacle_range: f32,
    /// Maximum distance from the sensor origin along which free space is
    /// carved out.
    pub raytrace_range: f32,
}

/// Sliding window of [`Observation`]s from a single sensor source.
///
/// Newest observations sit at the front.  Stale entries are purged lazily
/// whenever [`ObservationBuffer::get_observations`] is called.
#[derive(Debug)]
pub struct ObservationBuffer {
    topic: String,
    global_frame: String,
    keep: TimeDelta,
    expected_interval: TimeDelta,
    min_obstacle_height: f32,
    max_obstacle_height: f32,
    obstacle_range: f32,
    raytrace_range: f32,
    observations: VecDeque<Observation>,
    last_updated: DateTime<Utc>,
}

impl ObservationBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            topic: config.topic,
            global_frame: config.global_frame,
            keep: TimeDelta::from_std(config.observation_persistence)
                .unwrap_or(TimeDelta::MAX),
            expected_interval: TimeDelta::from_std(config.expected_interval)
                .unwrap_or(TimeDelta::MAX),
            min_obstacle_height: config.min_obstacle_height,
            max_obstacle_height: config.max_obstacle_height,
            obstacle_range: config.obstacle_range,
            raytrace_range: config.raytrace_range,
            observations: VecDeque::new(),
            last_updated: Utc::now(),
        }
    }

    /// Topic this buffer is fed from.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Frame buffered observations are expressed in.
    pub fn global_frame(&self) -> &str {
        &self.global_frame
    }

    /// Rebind the buffer to a new global frame.
    ///
    /// Observations already held were converted under the old frame; they
    /// are left in place and age out through the persistence window.
    pub fn set_global_frame(&mut self, frame: impl Into<String>) {
        self.global_frame = frame.into();
    }

    /// Convert `cloud` into the global frame and buffer the result.
    ///
    /// The sensor origin is taken as the cloud frame's origin, and points
    /// whose global-frame height falls outside the configured band are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Transform`] when no transform from the cloud's
    /// frame into the global frame is available at the cloud's stamp.  The
    /// buffer is left untouched in that case.
    pub fn buffer_cloud(
        &mut self,
        cloud: &PointCloud,
        tf: &dyn TransformSource,
    ) -> Result<(), NavError> {
        let lookup = tf.lookup_transform(
            &self.global_frame,
            &cloud.frame_id,
            LookupTime::At(cloud.stamp),
        )?;

        let origin = lookup.transform.apply(Point3::default());
        let mut points = Vec::with_capacity(cloud.points.len());
        for p in &cloud.points {
            let global = lookup.transform.apply(*p);
            if global.z >= self.min_obstacle_height && global.z <= self.max_obstacle_height {
                points.push(global);
            }
        }

        debug!(
            topic = %self.topic,
            kept = points.len(),
            received = cloud.points.len(),
            "buffered cloud"
        );

        self.buffer_observation(Observation {
            origin,
            points,
            stamp: cloud.stamp,
            obstacle_range: self.obstacle_range,
            raytrace_range: self.raytrace_range,
        });
        Ok(())
    }

    /// Buffer an observation already expressed in the global frame, dropping
    /// entries that fell out of the persistence window.
    pub fn buffer_observation(&mut self, observation: Observation) {
        self.observations.push_front(observation);
        self.last_updated = Utc::now();
        self.purge_stale();
    }

    /// Append every live observation to `out`, newest first, purging stale
    /// entries on the way.
    pub fn get_observations(&mut self, out: &mut Vec<Observation>) {
        self.purge_stale();
        out.extend(self.observations.iter().cloned());
    }

    /// Whether this buffer has been fed recently enough to trust.
    pub fn is_current(&self) -> bool {
        if self.expected_interval.is_zero() {
            return true;
        }
        let age = Utc::now().signed_duration_since(self.last_updated);
        let current = age <= self.expected_interval;
        if !current {
            warn!(
                topic = %self.topic,
                age_s = age.num_milliseconds() as f64 / 1000.0,
                expected_s = self.expected_interval.num_milliseconds() as f64 / 1000.0,
                "observation buffer has not been updated within its expected interval"
            );
        }
        current
    }

    /// Restart the staleness clock, e.g. when updates resume after a pause.
    pub fn reset_last_updated(&mut self) {
        self.last_updated = Utc::now();
    }

    fn purge_stale(&mut self) {
        if self.observations.is_empty() {
            return;
        }
        if self.keep.is_zero() {
            self.observations.truncate(1);
            return;
        }
        // Ages are measured against the last feed time, not the wall clock.
        let cutoff = self.last_updated;
        if let Some(first_stale) = self
            .observations
            .iter()
            .position(|obs| cutoff.signed_duration_since(obs.stamp) > self.keep)
        {
            self.observations.truncate(first_stale);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
