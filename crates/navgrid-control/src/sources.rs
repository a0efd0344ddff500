//! Sensor fan-out and pull-based observation sources.
//!
//! The [`SensorHub`] is a topic-keyed broadcast switchboard: drivers publish
//! [`SensorMessage`]s, sources subscribe. Sources hold their subscription
//! passively; nothing moves until the update cycle calls
//! [`ObservationSource::pump`], which drains whatever queued up since the
//! last cycle into the source's observation buffer.

use std::collections::HashMap;
use std::sync::Arc;

use navgrid_perception::observation::SharedBuffer;
use navgrid_perception::transform::TransformSource;
use navgrid_types::SensorMessage;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Messages retained per topic for slow consumers.
const DEFAULT_CAPACITY: usize = 64;

/// Topic-keyed broadcast hub carrying sensor messages.
///
/// Cloning is cheap and clones share the same channels. Publishing to a
/// topic nobody subscribes to is not an error; the message is dropped.
#[derive(Clone)]
pub struct SensorHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<SensorMessage>>>>,
    capacity: usize,
}

impl SensorHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a message, returning how many subscribers received it.
    pub fn publish(&self, topic: &str, message: SensorMessage) -> usize {
        self.sender_for(topic).send(message).unwrap_or(0)
    }

    /// Subscribe to a topic, creating its channel on first use.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<SensorMessage> {
        self.sender_for(topic).subscribe()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<SensorMessage> {
        self.channels
            .lock()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for SensorHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A pull-based feed from the hub into an observation buffer.
pub trait ObservationSource: Send {
    fn name(&self) -> &str;

    /// Begin listening on the hub. Idempotent while already started.
    fn start(&mut self, hub: &SensorHub);

    /// Stop listening and drop anything still queued.
    fn stop(&mut self);

    /// Drain queued messages into the buffer, converting them with `tf`.
    /// Returns how many observations were buffered. Messages that cannot
    /// be converted are logged and dropped.
    fn pump(&mut self, tf: &dyn TransformSource) -> usize;

    /// The buffer this source feeds.
    fn buffer(&self) -> &SharedBuffer;
}

/// Source decoding [`SensorMessage::Cloud`] messages.
pub struct PointCloudSource {
    name: String,
    topic: String,
    buffer: SharedBuffer,
    rx: Option<broadcast::Receiver<SensorMessage>>,
}

impl PointCloudSource {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, buffer: SharedBuffer) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            buffer,
            rx: None,
        }
    }
}

impl ObservationSource for PointCloudSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, hub: &SensorHub) {
        if self.rx.is_none() {
            self.rx = Some(hub.subscribe(&self.topic));
        }
    }

    fn stop(&mut self) {
        self.rx = None;
    }

    fn pump(&mut self, tf: &dyn TransformSource) -> usize {
        let Some(rx) = self.rx.as_mut() else {
            return 0;
        };
        let mut buffered = 0;
        loop {
            match rx.try_recv() {
                Ok(SensorMessage::Cloud(cloud)) => {
                    match self.buffer.lock().buffer_cloud(&cloud, tf) {
                        Ok(()) => buffered += 1,
                        Err(err) => warn!(
                            source = %self.name,
                            error = %err,
                            "dropping a cloud that could not be converted"
                        ),
                    }
                }
                Ok(_) => debug!(
                    source = %self.name,
                    topic = %self.topic,
                    "ignoring a non-cloud message"
                ),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(source = %self.name, lagged_by = n, "source fell behind; skipping missed messages");
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        buffered
    }

    fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

/// Source decoding [`SensorMessage::Scan`] messages by projecting each scan
/// to a point cloud in the scan's own frame first.
pub struct LaserScanSource {
    name: String,
    topic: String,
    buffer: SharedBuffer,
    rx: Option<broadcast::Receiver<SensorMessage>>,
}

impl LaserScanSource {
    pub fn new(name: impl Into<String>, topic: impl Into<String>, buffer: SharedBuffer) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            buffer,
            rx: None,
        }
    }
}

impl ObservationSource for LaserScanSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, hub: &SensorHub) {
        if self.rx.is_none() {
            self.rx = Some(hub.subscribe(&self.topic));
        }
    }

    fn stop(&mut self) {
        self.rx = None;
    }

    fn pump(&mut self, tf: &dyn TransformSource) -> usize {
        let Some(rx) = self.rx.as_mut() else {
            return 0;
        };
        let mut buffered = 0;
        loop {
            match rx.try_recv() {
                Ok(SensorMessage::Scan(scan)) => {
                    let cloud = match scan.project() {
                        Ok(cloud) => cloud,
                        Err(err) => {
                            warn!(
                                source = %self.name,
                                error = %err,
                                "dropping a scan that could not be projected"
                            );
                            continue;
                        }
                    };
                    match self.buffer.lock().buffer_cloud(&cloud, tf) {
                        Ok(()) => buffered += 1,
                        Err(err) => warn!(
                            source = %self.name,
                            error = %err,
                            "dropping a scan that could not be converted"
                        ),
                    }
                }
                Ok(_) => debug!(
                    source = %self.name,
                    topic = %self.topic,
                    "ignoring a non-scan message"
                ),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(source = %self.name, lagged_by = n, "source fell behind; skipping missed messages");
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        buffered
    }

    fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use navgrid_perception::observation::{BufferConfig, ObservationBuffer};
    use navgrid_perception::transform::{FrameGraph, Transform3D};
    use navgrid_types::{LaserScan, Point3, PointCloud};

    fn new_buffer() -> SharedBuffer {
        Arc::new(Mutex::new(ObservationBuffer::new(BufferConfig {
            topic: "points".to_string(),
            global_frame: "map".to_string(),
            observation_persistence: Duration::from_secs(60),
            expected_interval: Duration::ZERO,
            min_obstacle_height: 0.0,
            max_obstacle_height: 2.0,
            obstacle_range: 2.5,
            raytrace_range: 3.0,
        })))
    }

    fn identity_graph(frames: &[&str]) -> FrameGraph {
        let graph = FrameGraph::default();
        for frame in frames {
            graph.set_transform("map", frame, Transform3D::identity(), Utc::now());
        }
        graph
    }

    fn cloud_at(x: f32, y: f32) -> SensorMessage {
        SensorMessage::Cloud(PointCloud {
            frame_id: "laser".to_string(),
            stamp: Utc::now(),
            points: vec![Point3::new(x, y, 0.5)],
        })
    }

    #[test]
    fn publishing_without_subscribers_reaches_nobody() {
        let hub = SensorHub::default();
        assert_eq!(hub.publish("points", cloud_at(1.0, 0.0)), 0);
    }

    #[test]
    fn pump_moves_published_clouds_into_the_buffer() {
        let hub = SensorHub::default();
        let tf = identity_graph(&["laser"]);
        let mut source = PointCloudSource::new("cloud_source", "points", new_buffer());
        source.start(&hub);

        assert_eq!(hub.publish("points", cloud_at(1.0, 2.0)), 1);
        assert_eq!(hub.publish("points", cloud_at(3.0, 4.0)), 1);
        assert_eq!(source.pump(&tf), 2);

        let mut observations = Vec::new();
        source.buffer().lock().get_observations(&mut observations);
        assert_eq!(observations.len(), 2);
    }

    #[test]
    fn pump_before_start_is_a_no_op() {
        let hub = SensorHub::default();
        let tf = identity_graph(&["laser"]);
        let mut source = PointCloudSource::new("cloud_source", "points", new_buffer());
        hub.publish("points", cloud_at(1.0, 2.0));
        assert_eq!(source.pump(&tf), 0);
    }

    #[test]
    fn stopping_drops_queued_messages() {
        let hub = SensorHub::default();
        let tf = identity_graph(&["laser"]);
        let mut source = PointCloudSource::new("cloud_source", "points", new_buffer());
        source.start(&hub);
        hub.publish("points", cloud_at(1.0, 2.0));
        source.stop();
        source.start(&hub);
        assert_eq!(source.pump(&tf), 0);
    }

    #[test]
    fn untransformable_clouds_are_dropped() {
        let hub = SensorHub::default();
        let tf = FrameGraph::default();
        let mut source = PointCloudSource::new("cloud_source", "points", new_buffer());
        source.start(&hub);
        hub.publish("points", cloud_at(1.0, 2.0));
        assert_eq!(source.pump(&tf), 0);
    }

    #[test]
    fn mismatched_message_kinds_are_skipped() {
        let hub = SensorHub::default();
        let tf = identity_graph(&["laser"]);
        let mut source = LaserScanSource::new("scan_source", "scans", new_buffer());
        source.start(&hub);
        hub.publish("scans", cloud_at(1.0, 2.0));
        assert_eq!(source.pump(&tf), 0);
    }

    #[test]
    fn scans_are_projected_then_buffered() {
        let hub = SensorHub::default();
        let tf = identity_graph(&["laser"]);
        let mut source = LaserScanSource::new("scan_source", "scans", new_buffer());
        source.start(&hub);

        hub.publish(
            "scans",
            SensorMessage::Scan(LaserScan {
                frame_id: "laser".to_string(),
                stamp: Utc::now(),
                angle_min: 0.0,
                angle_increment: std::f32::consts::FRAC_PI_2,
                range_min: 0.1,
                range_max: 10.0,
                ranges: vec![2.0, 3.0],
            }),
        );
        assert_eq!(source.pump(&tf), 1);

        let mut observations = Vec::new();
        source.buffer().lock().get_observations(&mut observations);
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].points.len(), 2);
        // second ray points along +y after projection
        assert!((observations[0].points[1].y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn lagged_sources_skip_to_the_newest_messages() {
        let hub = SensorHub::new(1);
        let tf = identity_graph(&["laser"]);
        let mut source = PointCloudSource::new("cloud_source", "points", new_buffer());
        source.start(&hub);

        hub.publish("points", cloud_at(1.0, 0.0));
        hub.publish("points", cloud_at(2.0, 0.0));
        hub.publish("points", cloud_at(3.0, 0.0));

        // only the retained message survives the overflow
        assert_eq!(source.pump(&tf), 1);
        let mut observations = Vec::new();
        source.buffer().lock().get_observations(&mut observations);
        assert!((observations[0].points[0].x - 3.0).abs() < 1e-6);
    }
}
