//! Robot pose resolution against the transform tree.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use navgrid_perception::transform::{LookupTime, TransformSource};
use navgrid_types::{NavError, Pose2, RobotPose};
use tracing::{error, warn};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resolves the robot's planar pose in a target frame, rejecting transforms
/// older than a configured tolerance.
pub struct PoseResolver {
    tf: Arc<dyn TransformSource>,
    base_frame: String,
    tolerance: Duration,
}

impl PoseResolver {
    pub fn new(
        tf: Arc<dyn TransformSource>,
        base_frame: impl Into<String>,
        tolerance: Duration,
    ) -> Self {
        Self {
            tf,
            base_frame: base_frame.into(),
            tolerance,
        }
    }

    pub fn base_frame(&self) -> &str {
        &self.base_frame
    }

    /// Look up the latest base frame pose in `global_frame`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Transform`] when no transform is available and
    /// [`NavError::StalePose`] when the latest one is older than the
    /// tolerance.
    pub fn resolve(&self, global_frame: &str) -> Result<RobotPose, NavError> {
        let stamped = match self
            .tf
            .lookup_transform(global_frame, &self.base_frame, LookupTime::Latest)
        {
            Ok(stamped) => stamped,
            Err(err) => {
                error!(
                    global_frame,
                    base_frame = %self.base_frame,
                    error = %err,
                    "cannot resolve the robot pose"
                );
                return Err(err.into());
            }
        };

        let age = Utc::now()
            .signed_duration_since(stamped.stamp)
            .to_std()
            .unwrap_or_default();
        if age > self.tolerance {
            warn!(
                age_s = age.as_secs_f64(),
                tolerance_s = self.tolerance.as_secs_f64(),
                stamp = %stamped.stamp,
                "robot pose transform is older than the configured tolerance"
            );
            return Err(NavError::StalePose {
                age,
                tolerance: self.tolerance,
            });
        }

        let translation = stamped.transform.translation;
        let yaw = stamped.transform.rotation.yaw();
        Ok(RobotPose {
            pose: Pose2::new(translation.x, translation.y, yaw),
            stamp: stamped.stamp,
        })
    }
}

/// Poll until a transform from `source_frame` into `target_frame` becomes
/// available or `timeout` elapses. Returns whether it became available.
pub async fn wait_for_transform(
    tf: &dyn TransformSource,
    target_frame: &str,
    source_frame: &str,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tf
            .lookup_transform(target_frame, source_frame, LookupTime::Latest)
            .is_ok()
        {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use navgrid_perception::transform::{FrameGraph, Quaternion, Transform3D};
    use navgrid_types::Point3;

    fn graph_with_pose(x: f32, y: f32) -> Arc<FrameGraph> {
        let graph = FrameGraph::default();
        graph.set_transform(
            "map",
            "base_link",
            Transform3D::new(Point3::new(x, y, 0.0), Quaternion::identity()),
            Utc::now(),
        );
        Arc::new(graph)
    }

    #[test]
    fn resolves_a_fresh_pose() {
        let resolver = PoseResolver::new(
            graph_with_pose(1.5, -2.0),
            "base_link",
            Duration::from_secs_f32(0.3),
        );
        let robot = resolver.resolve("map").unwrap();
        assert!((robot.pose.x - 1.5).abs() < 1e-6);
        assert!((robot.pose.y + 2.0).abs() < 1e-6);
    }

    #[test]
    fn missing_transform_is_an_error() {
        let resolver = PoseResolver::new(
            Arc::new(FrameGraph::default()),
            "base_link",
            Duration::from_secs_f32(0.3),
        );
        assert!(matches!(
            resolver.resolve("map"),
            Err(NavError::Transform(_))
        ));
    }

    #[test]
    fn stale_transform_is_rejected() {
        let graph = FrameGraph::default();
        graph.set_transform(
            "map",
            "base_link",
            Transform3D::identity(),
            Utc::now() - TimeDelta::seconds(5),
        );
        let resolver = PoseResolver::new(
            Arc::new(graph),
            "base_link",
            Duration::from_secs_f32(0.3),
        );
        match resolver.resolve("map") {
            Err(NavError::StalePose { age, tolerance }) => {
                assert!(age > tolerance);
            }
            other => panic!("expected a stale pose, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_succeeds_once_the_transform_appears() {
        let graph = Arc::new(FrameGraph::default());
        let writer = graph.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            writer.set_transform("map", "base_link", Transform3D::identity(), Utc::now());
        });
        assert!(
            wait_for_transform(
                graph.as_ref(),
                "map",
                "base_link",
                Duration::from_millis(500)
            )
            .await
        );
    }

    #[tokio::test]
    async fn wait_times_out_without_a_transform() {
        let graph = FrameGraph::default();
        assert!(
            !wait_for_transform(&graph, "map", "base_link", Duration::from_millis(50)).await
        );
    }
}
