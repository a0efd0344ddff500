//! Robot footprint geometry.
//!
//! The robot's collision outline is a convex polygon in the base frame.
//! [`FootprintTracker`] owns that polygon, optionally extends it each update
//! cycle with the live positions of articulated parts (arms, grippers,
//! payloads), and derives the inscribed and circumscribed radii the grid
//! uses for inflation.
//!
//! A footprint with fewer than three vertices degrades to a circle of the
//! configured robot radius.

use navgrid_types::{NavError, Point3, Pose2};
use tracing::warn;

use crate::transform::{LookupTime, TransformSource};

// ────────────────────────────────────────────────────────────────────────────
// Polygon helpers
// ────────────────────────────────────────────────────────────────────────────

/// Number of vertices used when a degenerate footprint is approximated by a
/// circle.
const CIRCLE_SEGMENTS: u32 = 72;

fn sign(v: f32) -> f32 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

/// Push every vertex outward from the base-frame origin by `padding` meters
/// along each axis.
pub fn pad_footprint(points: &[Point3], padding: f32) -> Vec<Point3> {
    points
        .iter()
        .map(|pt| {
            Point3::new(
                pt.x + sign(pt.x) * padding,
                pt.y + sign(pt.y) * padding,
                pt.z,
            )
        })
        .collect()
}

/// Convex hull of a planar point set (monotone chain), counter-clockwise.
///
/// Inputs with fewer than three points are returned unchanged.
pub fn convex_hull(mut points: Vec<Point3>) -> Vec<Point3> {
    if points.len() < 3 {
        return points;
    }

    points.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    fn cross(o: &Point3, a: &Point3, b: &Point3) -> f32 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    }

    let mut hull: Vec<Point3> = Vec::with_capacity(points.len() * 2);
    for p in &points {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower = hull.len() + 1;
    for p in points.iter().rev().skip(1) {
        while hull.len() >= lower && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Distance from `(px, py)` to the segment `(x0, y0)`–`(x1, y1)`, measuring
/// to the nearest endpoint when the perpendicular foot falls outside it.
pub fn distance_to_line(px: f32, py: f32, x0: f32, y0: f32, x1: f32, y1: f32) -> f32 {
    let a = px - x0;
    let b = py - y0;
    let c = x1 - x0;
    let d = y1 - y0;

    let dot = a * c + b * d;
    let len_sq = c * c + d * d;
    if len_sq <= f32::EPSILON {
        return (a * a + b * b).sqrt();
    }

    let param = dot / len_sq;
    let (xx, yy) = if param < 0.0 {
        (x0, y0)
    } else if param > 1.0 {
        (x1, y1)
    } else {
        (x0 + param * c, y0 + param * d)
    };

    let dx = px - xx;
    let dy = py - yy;
    (dx * dx + dy * dy).sqrt()
}

/// Distances from the base-frame origin to the footprint's nearest and
/// farthest features: `(inscribed, circumscribed)`.
///
/// Every vertex and every edge is considered, including the closing edge
/// from the last vertex back to the first.
pub fn compute_radii(footprint: &[Point3]) -> (f32, f32) {
    let n = footprint.len();
    if n == 0 {
        return (0.0, 0.0);
    }

    let mut min_dist = f32::MAX;
    let mut max_dist = 0.0_f32;
    for i in 0..n {
        let vertex = &footprint[i];
        let next = &footprint[(i + 1) % n];
        let vertex_dist = (vertex.x * vertex.x + vertex.y * vertex.y).sqrt();
        let edge_dist = distance_to_line(0.0, 0.0, vertex.x, vertex.y, next.x, next.y);
        min_dist = min_dist.min(vertex_dist.min(edge_dist));
        max_dist = max_dist.max(vertex_dist.max(edge_dist));
    }
    (min_dist, max_dist)
}

/// Place a base-frame footprint at `pose` in the world: rotate by the yaw,
/// then translate.
pub fn oriented_footprint(footprint: &[Point3], pose: Pose2) -> Vec<Point3> {
    let cos_th = pose.yaw.cos();
    let sin_th = pose.yaw.sin();
    footprint
        .iter()
        .map(|pt| {
            Point3::new(
                pose.x + pt.x * cos_th - pt.y * sin_th,
                pose.y + pt.x * sin_th + pt.y * cos_th,
                0.0,
            )
        })
        .collect()
}

/// Approximate a circle of `radius` around `pose` as a polygon.
pub fn circle_footprint(pose: Pose2, radius: f32) -> Vec<Point3> {
    let step = 2.0 * std::f32::consts::PI / CIRCLE_SEGMENTS as f32;
    (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = i as f32 * step;
            Point3::new(
                radius * angle.cos() + pose.x,
                radius * angle.sin() + pose.y,
                0.0,
            )
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// FootprintTracker
// ────────────────────────────────────────────────────────────────────────────

/// A named frame whose origin is folded into the footprint on recompute.
///
/// Providers model parts that move relative to the base: an extended arm, a
/// towed payload, a pan-tilt sensor mast.
#[derive(Debug, Clone)]
pub struct FootprintProvider {
    pub name: String,
    /// Frame whose origin marks the part's current position.
    pub frame: String,
}

/// Owns the robot's collision outline and its derived radii.
///
/// The `base` polygon never changes after construction.  [`recompute`]
/// rebuilds the `active` polygon as the convex hull of the base plus every
/// reachable provider point; readers see the swap only through
/// [`footprint`], [`oriented`] and the radius accessors.
///
/// [`recompute`]: FootprintTracker::recompute
/// [`footprint`]: FootprintTracker::footprint
/// [`oriented`]: FootprintTracker::oriented
#[derive(Debug)]
pub struct FootprintTracker {
    base: Vec<Point3>,
    active: Vec<Point3>,
    inscribed: f32,
    circumscribed: f32,
    providers: Vec<FootprintProvider>,
    provider_padding: f32,
    base_frame: String,
    robot_radius: f32,
}

impl FootprintTracker {
    /// Build a tracker around an already padded base polygon.
    ///
    /// With fewer than three base vertices both radii fall back to
    /// `robot_radius` and the footprint is treated as a circle.
    pub fn new(
        base: Vec<Point3>,
        robot_radius: f32,
        base_frame: impl Into<String>,
        providers: Vec<FootprintProvider>,
        provider_padding: f32,
    ) -> Self {
        let (inscribed, circumscribed) = if base.len() >= 3 {
            compute_radii(&base)
        } else {
            (robot_radius, robot_radius)
        };
        Self {
            active: base.clone(),
            base,
            inscribed,
            circumscribed,
            providers,
            provider_padding,
            base_frame: base_frame.into(),
            robot_radius,
        }
    }

    /// The currently active footprint polygon, in the base frame.
    pub fn footprint(&self) -> &[Point3] {
        &self.active
    }

    pub fn inscribed_radius(&self) -> f32 {
        self.inscribed
    }

    pub fn circumscribed_radius(&self) -> f32 {
        self.circumscribed
    }

    /// Rebuild the active footprint from the base polygon and the current
    /// provider positions.
    ///
    /// Providers without a usable transform are skipped with a warning.
    /// Returns `Ok(true)` when the footprint (and therefore the radii) was
    /// rebuilt, `Ok(false)` when there are no providers to fold in.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::FootprintRecompute`] when every provider lookup
    /// failed.  The previous footprint stays active.
    pub fn recompute(&mut self, tf: &dyn TransformSource) -> Result<bool, NavError> {
        if self.providers.is_empty() {
            return Ok(false);
        }

        let mut extra = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match tf.lookup_transform(&self.base_frame, &provider.frame, LookupTime::Latest) {
                Ok(lookup) => {
                    let mut pt = lookup.transform.apply(Point3::default());
                    pt.x += sign(pt.x) * self.provider_padding;
                    pt.y += sign(pt.y) * self.provider_padding;
                    pt.z = 0.0;
                    extra.push(pt);
                }
                Err(err) => {
                    warn!(
                        provider = %provider.name,
                        frame = %provider.frame,
                        error = %err,
                        "skipping footprint provider without a transform"
                    );
                }
            }
        }

        if extra.is_empty() {
            return Err(NavError::FootprintRecompute(
                "no footprint provider transform is available".to_string(),
            ));
        }

        let mut union = self.base.clone();
        union.extend(extra);
        let hull = convex_hull(union);
        let (inscribed, circumscribed) = if hull.len() >= 3 {
            compute_radii(&hull)
        } else {
            (self.robot_radius, self.robot_radius)
        };
        self.active = hull;
        self.inscribed = inscribed;
        self.circumscribed = circumscribed;
        Ok(true)
    }

    /// The active footprint placed at `pose` in the world.
    ///
    /// A degenerate footprint comes back as a circle of the inscribed
    /// radius around the pose.
    pub fn oriented(&self, pose: Pose2) -> Vec<Point3> {
        if self.active.len() < 3 {
            circle_footprint(pose, self.inscribed)
        } else {
            oriented_footprint(&self.active, pose)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
