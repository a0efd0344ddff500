//! Frame graph and stamped transform lookups.
//!
//! Maintains a directed graph of named reference frames and the 3-D
//! rigid-body transforms (translation + quaternion rotation) that relate
//! them.  Given any two frame names the graph composes a chain of transforms
//! via BFS to produce the combined [`Transform3D`], together with the stamp
//! of the oldest edge along the path.
//!
//! Consumers depend on the [`TransformSource`] trait rather than on
//! [`FrameGraph`] directly, so tests and embedders can substitute their own
//! lookup machinery.
//!
//! # Example
//!
//! ```rust
//! use navgrid_perception::transform::{
//!     FrameGraph, LookupTime, Quaternion, Transform3D, TransformSource,
//! };
//! use navgrid_types::Point3;
//! use chrono::Utc;
//!
//! let tf = FrameGraph::default();
//!
//! // base_link is 1 m forward of the map origin, same orientation.
//! tf.set_transform("map", "base_link",
//!     Transform3D::new(Point3::new(1.0, 0.0, 0.0), Quaternion::identity()),
//!     Utc::now());
//!
//! let stamped = tf.lookup_transform("map", "base_link", LookupTime::Latest).unwrap();
//! assert!((stamped.transform.translation.x - 1.0).abs() < 1e-5);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use navgrid_types::{Point3, TransformError};
use parking_lot::RwLock;

// ────────────────────────────────────────────────────────────────────────────
// Rotation and transform primitives
// ────────────────────────────────────────────────────────────────────────────

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// A pure yaw rotation of `yaw` radians about the vertical axis.
    pub fn from_yaw(yaw: f32) -> Self {
        let half = yaw * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a point by this quaternion: p' = q * p * q*.
    pub fn rotate(self, p: Point3) -> Point3 {
        // Express p as a pure quaternion.
        let pure = Self::new(0.0, p.x, p.y, p.z);
        let rotated = self.mul(pure).mul(self.conjugate());
        Point3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Extract the yaw component (rotation about the vertical axis).
    pub fn yaw(self) -> f32 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Point3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Point3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Point3::default(), Quaternion::identity())
    }

    /// Convert a point expressed in the child frame into the parent frame.
    pub fn apply(&self, p: Point3) -> Point3 {
        let rotated = self.rotation.rotate(p);
        Point3::new(
            rotated.x + self.translation.x,
            rotated.y + self.translation.y,
            rotated.z + self.translation.z,
        )
    }

    /// Compose two transforms: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.apply(other.translation);
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// The inverse transform: if `self` = T_A_B, the result is T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        let t = inv_rot.rotate(self.translation);
        Self::new(Point3::new(-t.x, -t.y, -t.z), inv_rot)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lookup seam
// ────────────────────────────────────────────────────────────────────────────

/// The time a transform lookup should be answered for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupTime {
    /// The most recent transform available, whatever its stamp.
    Latest,
    /// The transform valid at the given instant.  Lookups too far past the
    /// newest recorded edge fail with
    /// [`TransformError::ExtrapolationOutOfRange`].
    At(DateTime<Utc>),
}

/// A composed transform together with the stamp it is valid for.
///
/// The stamp is the oldest edge stamp along the composed path; the whole
/// chain is known at least as of that instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedTransform {
    pub transform: Transform3D,
    pub stamp: DateTime<Utc>,
}

/// Source of transforms between named frames.
///
/// The returned transform maps points expressed in `source_frame` into
/// `target_frame`.
pub trait TransformSource: Send + Sync {
    /// Compute the stamped transform from `source_frame` into `target_frame`.
    ///
    /// # Errors
    ///
    /// - [`TransformError::NoPath`] when either frame is not in the graph.
    /// - [`TransformError::Disconnected`] when both frames exist but no
    ///   chain of edges joins them.
    /// - [`TransformError::ExtrapolationOutOfRange`] when a
    ///   [`LookupTime::At`] query is newer than the recorded history allows.
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: LookupTime,
    ) -> Result<StampedTransform, TransformError>;
}

// ────────────────────────────────────────────────────────────────────────────
// FrameGraph
// ────────────────────────────────────────────────────────────────────────────

/// How far past the newest recorded edge an [`LookupTime::At`] query may
/// reach before it is rejected.
const DEFAULT_EXTRAPOLATION_LIMIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
struct Edge {
    transform: Transform3D,
    stamp: DateTime<Utc>,
}

/// A graph of named reference frames and the stamped [`Transform3D`]s that
/// relate them.
///
/// Frames are identified by arbitrary string names (e.g. `"map"`,
/// `"base_link"`, `"laser"`).  Registering `"A" → "B"` also registers the
/// inverse edge, so lookups work in either direction.
///
/// The graph is internally locked and can be shared across tasks behind an
/// `Arc<dyn TransformSource>`.
#[derive(Debug)]
pub struct FrameGraph {
    /// `edges[from][to] = Edge`
    edges: RwLock<HashMap<String, HashMap<String, Edge>>>,
    extrapolation_limit: TimeDelta,
}

impl FrameGraph {
    /// Create an empty graph with the given extrapolation limit.
    pub fn new(extrapolation_limit: Duration) -> Self {
        Self {
            edges: RwLock::new(HashMap::new()),
            extrapolation_limit: TimeDelta::from_std(extrapolation_limit)
                .unwrap_or(TimeDelta::MAX),
        }
    }

    /// Register or update the transform from `parent_frame` to `child_frame`,
    /// stamped with the time it was measured.  The inverse edge is kept in
    /// step automatically.
    pub fn set_transform(
        &self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
        stamp: DateTime<Utc>,
    ) {
        let mut edges = self.edges.write();
        edges.entry(parent_frame.to_string()).or_default().insert(
            child_frame.to_string(),
            Edge { transform, stamp },
        );
        edges.entry(child_frame.to_string()).or_default().insert(
            parent_frame.to_string(),
            Edge {
                transform: transform.inverse(),
                stamp,
            },
        );
    }
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRAPOLATION_LIMIT)
    }
}

impl TransformSource for FrameGraph {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        time: LookupTime,
    ) -> Result<StampedTransform, TransformError> {
        if target_frame == source_frame {
            let stamp = match time {
                LookupTime::Latest => Utc::now(),
                LookupTime::At(t) => t,
            };
            return Ok(StampedTransform {
                transform: Transform3D::identity(),
                stamp,
            });
        }

        let edges = self.edges.read();
        if !edges.contains_key(target_frame) || !edges.contains_key(source_frame) {
            return Err(TransformError::NoPath {
                from: source_frame.to_string(),
                to: target_frame.to_string(),
            });
        }

        // BFS over the graph; each queue item carries the transform composed
        // from target_frame to the current node and the oldest edge stamp
        // seen along the way.
        let mut queue: VecDeque<(String, Transform3D, DateTime<Utc>)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((
            target_frame.to_string(),
            Transform3D::identity(),
            DateTime::<Utc>::MAX_UTC,
        ));
        visited.insert(target_frame.to_string());

        while let Some((current, accumulated, oldest)) = queue.pop_front() {
            if let Some(neighbours) = edges.get(&current) {
                for (next, edge) in neighbours {
                    if visited.contains(next) {
                        continue;
                    }
                    let composed = accumulated.compose(edge.transform);
                    let stamp = oldest.min(edge.stamp);
                    if next == source_frame {
                        if let LookupTime::At(t) = time
                            && t.signed_duration_since(stamp) > self.extrapolation_limit
                        {
                            return Err(TransformError::ExtrapolationOutOfRange {
                                from: source_frame.to_string(),
                                to: target_frame.to_string(),
                            });
                        }
                        return Ok(StampedTransform {
                            transform: composed,
                            stamp,
                        });
                    }
                    visited.insert(next.clone());
                    queue.push_back((next.clone(), composed, stamp));
                }
            }
        }

        Err(TransformError::Disconnected {
            from: source_frame.to_string(),
            to: target_frame.to_string(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
