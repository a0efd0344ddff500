use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A point in 3-D space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`, ignoring z (the grid is planar).
    pub fn planar_distance(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A planar pose: position plus heading, in some world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2 {
    pub x: f32,
    pub y: f32,
    /// Heading in radians, counter-clockwise from +x.
    pub yaw: f32,
}

impl Pose2 {
    pub fn new(x: f32, y: f32, yaw: f32) -> Self {
        Self { x, y, yaw }
    }
}

/// The robot's pose in the global frame together with the time the
/// underlying transform was acquired.  Recomputed every update cycle and
/// never reused across cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotPose {
    pub pose: Pose2,
    pub stamp: DateTime<Utc>,
}

/// Timestamped batch of 3-D points reported in a sensor frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloud {
    /// Frame the points are expressed in.
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    pub points: Vec<Point3>,
}

/// A single planar laser sweep.
///
/// Ray `i` leaves the sensor at angle `angle_min + i * angle_increment`
/// (radians, counter-clockwise).  Ranges outside `[range_min, range_max]`
/// or non-finite are treated as misses and dropped during projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaserScan {
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    pub angle_min: f32,
    pub angle_increment: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
}

impl LaserScan {
    /// Project the sweep into a planar point cloud in the scan's own frame.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::SensorConversion`] when the sweep geometry is
    /// malformed: a non-finite angle, or a zero angle increment with more
    /// than one ray.
    pub fn project(&self) -> Result<PointCloud, NavError> {
        if !self.angle_min.is_finite() || !self.angle_increment.is_finite() {
            return Err(NavError::SensorConversion {
                frame: self.frame_id.clone(),
                reason: "scan carries a non-finite angle".to_string(),
            });
        }
        if self.angle_increment == 0.0 && self.ranges.len() > 1 {
            return Err(NavError::SensorConversion {
                frame: self.frame_id.clone(),
                reason: "zero angle increment for a multi-ray scan".to_string(),
            });
        }

        let mut points = Vec::with_capacity(self.ranges.len());
        for (i, &range) in self.ranges.iter().enumerate() {
            if !range.is_finite() || range < self.range_min || range > self.range_max {
                continue;
            }
            let angle = self.angle_min + i as f32 * self.angle_increment;
            points.push(Point3::new(range * angle.cos(), range * angle.sin(), 0.0));
        }

        Ok(PointCloud {
            frame_id: self.frame_id.clone(),
            stamp: self.stamp,
            points,
        })
    }
}

/// One buffered sensor reading, expressed in the global frame: the sensed
/// points plus the sensor origin they were taken from, and the per-source
/// ranges bounding how far the grid engine may mark or raytrace from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Sensor origin in the global frame.
    pub origin: Point3,
    pub points: Vec<Point3>,
    pub stamp: DateTime<Utc>,
    /// Maximum distance from the origin at which points mark obstacles.
    pub obstacle_range: f32,
    /// Maximum distance from the origin along which free space is cleared.
    pub raytrace_range: f32,
}

/// A full occupancy-grid snapshot pushed by an external map provider.
/// Transient: consumed into live grid state or rejected, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Frame the map is expressed in.
    pub frame_id: String,
    pub stamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    /// Cell edge length in meters.
    pub resolution: f32,
    /// World coordinates of the lower-left cell corner.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Rotation of the map about its origin.  Anything non-zero is rejected
    /// during reconciliation; the grid only supports axis-aligned maps.
    pub origin_yaw: f32,
    /// Row-major occupancy bytes, `width * height` cells.
    pub data: Vec<u8>,
}

/// Plain-data copy of live grid state handed to readers and publication
/// sinks.  Row-major, `size_x * size_y` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub size_x: u32,
    pub size_y: u32,
    pub resolution: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub cells: Vec<u8>,
}

impl GridSnapshot {
    /// Cost at cell `(mx, my)`, or `None` outside the snapshot.
    pub fn cost_at(&self, mx: u32, my: u32) -> Option<u8> {
        if mx >= self.size_x || my >= self.size_y {
            return None;
        }
        self.cells.get((my * self.size_x + mx) as usize).copied()
    }
}

/// Envelope for everything carried over the sensor hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SensorMessage {
    Cloud(PointCloud),
    Scan(LaserScan),
    Map(MapSnapshot),
}

/// Cell cost conventions shared with the grid engine.
pub mod cost {
    /// Known-free cell.
    pub const FREE_SPACE: u8 = 0;
    /// Cell inside the inscribed radius of an obstacle.
    pub const INSCRIBED_INFLATED_OBSTACLE: u8 = 253;
    /// Cell occupied by an obstacle.
    pub const LETHAL_OBSTACLE: u8 = 254;
    /// Cell with no information.
    pub const NO_INFORMATION: u8 = 255;
}

/// Failure modes of a transform lookup between two frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("no transform from '{from}' to '{to}': frame is not in the graph")]
    NoPath { from: String, to: String },

    #[error("frames '{from}' and '{to}' exist but are not connected")]
    Disconnected { from: String, to: String },

    #[error("transform from '{from}' to '{to}' would extrapolate beyond recorded history")]
    ExtrapolationOutOfRange { from: String, to: String },
}

/// Error taxonomy for the costmap controller and its collaborators.
///
/// Only [`NavError::Config`] is fatal, and only during construction; every
/// other variant is recoverable and leaves previous state intact.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("robot pose is {age:?} old, tolerance is {tolerance:?}")]
    StalePose { age: Duration, tolerance: Duration },

    #[error("cannot convert message from '{frame}': {reason}")]
    SensorConversion { frame: String, reason: String },

    #[error("static map rejected: {0}")]
    MapRejected(String),

    #[error("footprint recompute failed: {0}")]
    FootprintRecompute(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
