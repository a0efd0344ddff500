//! Static map reconciliation.
//!
//! Maps can arrive at any time, long after the grid was seeded. Each one is
//! reconciled against the live grid: compatible maps refresh the static
//! layer in place, maps in a new frame replace the grid wholesale, and
//! incompatible maps are rejected with the grid left untouched.

use std::sync::{Arc, OnceLock};

use navgrid_types::{MapSnapshot, NavError, SensorMessage};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::controller::MapState;
use crate::fusion::ObservationFusionSet;

/// Tolerance when comparing an incoming map's resolution to the grid's.
const RESOLUTION_EPSILON: f32 = 1e-6;
/// Largest origin rotation accepted on an incoming map.
const ROTATION_EPSILON: f32 = 1e-6;

/// What a successful reconciliation did to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The map arrived in a new frame; the grid was rebuilt from it.
    Replaced,
    /// The map was merged into the static layer in place.
    WindowUpdated,
}

/// Applies incoming maps to the shared grid state.
pub struct StaticMapSynchronizer {
    state: Arc<Mutex<MapState>>,
    fusion: Arc<ObservationFusionSet>,
}

impl StaticMapSynchronizer {
    pub(crate) fn new(state: Arc<Mutex<MapState>>, fusion: Arc<ObservationFusionSet>) -> Self {
        Self { state, fusion }
    }

    /// Fold `map` into the grid.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::MapRejected`] when the map's geometry cannot be
    /// reconciled with the running grid. The grid is left as it was.
    pub fn reconcile(&self, map: &MapSnapshot) -> Result<ReconcileOutcome, NavError> {
        let mut st = self.state.lock();

        let grid_resolution = st.grid.resolution();
        if (map.resolution - grid_resolution).abs() > RESOLUTION_EPSILON {
            error!(
                incoming = map.resolution,
                current = grid_resolution,
                "static map resolution does not match the running grid"
            );
            return Err(NavError::MapRejected(format!(
                "resolution {} does not match the grid's {}",
                map.resolution, grid_resolution
            )));
        }
        if map.origin_yaw.abs() > ROTATION_EPSILON {
            error!(
                origin_yaw = map.origin_yaw,
                "rotated static maps are not supported"
            );
            return Err(NavError::MapRejected(format!(
                "origin rotated by {} radians",
                map.origin_yaw
            )));
        }

        if map.frame_id != st.global_frame {
            // Rebind the buffers before touching the grid. The buffer locks
            // and the grid lock are never held together.
            drop(st);
            self.fusion.set_global_frame(&map.frame_id);

            let mut st = self.state.lock();
            st.grid.replace_full_map(map);
            let old_frame = std::mem::replace(&mut st.global_frame, map.frame_id.clone());
            info!(
                old_frame = %old_frame,
                new_frame = %map.frame_id,
                "static map arrived in a new frame; grid replaced"
            );
            Ok(ReconcileOutcome::Replaced)
        } else {
            st.grid.update_static_window(map);
            Ok(ReconcileOutcome::WindowUpdated)
        }
    }
}

/// Listen for maps on an already-subscribed receiver.
///
/// Until a synchronizer is installed in `slot`, maps are parked in
/// `pending` (newest wins) for the controller's startup path to consume.
/// Afterwards each map is reconciled directly.
pub(crate) fn spawn_map_listener(
    mut rx: broadcast::Receiver<SensorMessage>,
    slot: Arc<OnceLock<Arc<StaticMapSynchronizer>>>,
    pending: Arc<Mutex<Option<MapSnapshot>>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = rx.recv() => match received {
                    Ok(SensorMessage::Map(map)) => match slot.get() {
                        Some(sync) => {
                            if let Err(err) = sync.reconcile(&map) {
                                error!(error = %err, "dropping an unusable static map");
                            }
                        }
                        None => *pending.lock() = Some(map),
                    },
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "map listener fell behind; skipping missed maps");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use navgrid_grid::engine::GridSeed;
    use navgrid_grid::sim::SimGrid;
    use navgrid_perception::footprint::FootprintTracker;
    use navgrid_perception::observation::{BufferConfig, ObservationBuffer, SharedBuffer};
    use navgrid_types::cost;
    use std::time::Duration;

    fn seed_4x4() -> GridSeed {
        GridSeed {
            size_x_cells: 4,
            size_y_cells: 4,
            resolution: 0.1,
            origin_x: 0.0,
            origin_y: 0.0,
            data: None,
            default_cost: cost::FREE_SPACE,
            lethal_threshold: 100,
            unknown_cost_value: 255,
            inscribed_radius: 0.1,
            circumscribed_radius: 0.1,
            inflation_radius: 0.0,
        }
    }

    fn map_state(global_frame: &str) -> Arc<Mutex<MapState>> {
        Arc::new(Mutex::new(MapState {
            grid: SimGrid::from_seed(&seed_4x4()),
            footprint: FootprintTracker::new(Vec::new(), 0.1, "base_link", Vec::new(), 0.0),
            global_frame: global_frame.to_string(),
        }))
    }

    fn shared_buffer(global_frame: &str) -> SharedBuffer {
        Arc::new(Mutex::new(ObservationBuffer::new(BufferConfig {
            topic: "points".to_string(),
            global_frame: global_frame.to_string(),
            observation_persistence: Duration::ZERO,
            expected_interval: Duration::ZERO,
            min_obstacle_height: 0.0,
            max_obstacle_height: 2.0,
            obstacle_range: 2.5,
            raytrace_range: 3.0,
        })))
    }

    fn map(frame: &str, resolution: f32, width: u32, height: u32, data: Vec<u8>) -> MapSnapshot {
        MapSnapshot {
            frame_id: frame.to_string(),
            stamp: Utc::now(),
            width,
            height,
            resolution,
            origin_x: 0.0,
            origin_y: 0.0,
            origin_yaw: 0.0,
            data,
        }
    }

    fn synchronizer(global_frame: &str) -> (StaticMapSynchronizer, SharedBuffer) {
        let buffer = shared_buffer(global_frame);
        let mut fusion = ObservationFusionSet::default();
        fusion.add(buffer.clone(), true, false);
        let sync = StaticMapSynchronizer::new(map_state(global_frame), Arc::new(fusion));
        (sync, buffer)
    }

    #[test]
    fn mismatched_resolution_is_rejected() {
        let (sync, _buffer) = synchronizer("map");
        let incoming = map("map", 0.2, 4, 4, vec![0; 16]);
        assert!(matches!(
            sync.reconcile(&incoming),
            Err(NavError::MapRejected(_))
        ));
    }

    #[test]
    fn rotated_maps_are_rejected() {
        let (sync, _buffer) = synchronizer("map");
        let mut incoming = map("map", 0.1, 4, 4, vec![0; 16]);
        incoming.origin_yaw = 0.2;
        assert!(matches!(
            sync.reconcile(&incoming),
            Err(NavError::MapRejected(_))
        ));
    }

    #[test]
    fn same_frame_maps_update_the_static_layer() {
        let (sync, _buffer) = synchronizer("map");
        let mut data = vec![0u8; 16];
        data[5] = 100;
        let incoming = map("map", 0.1, 4, 4, data);

        assert_eq!(
            sync.reconcile(&incoming).unwrap(),
            ReconcileOutcome::WindowUpdated
        );
        let snapshot = sync.state.lock().grid.snapshot();
        assert_eq!(snapshot.cost_at(1, 1), Some(cost::LETHAL_OBSTACLE));
    }

    #[test]
    fn new_frame_replaces_the_grid_and_rebinds_buffers() {
        let (sync, buffer) = synchronizer("map");
        let incoming = map("odom", 0.1, 6, 6, vec![0; 36]);

        assert_eq!(
            sync.reconcile(&incoming).unwrap(),
            ReconcileOutcome::Replaced
        );
        let st = sync.state.lock();
        assert_eq!(st.global_frame, "odom");
        assert_eq!(st.grid.size_in_cells_x(), 6);
        drop(st);
        assert_eq!(buffer.lock().global_frame(), "odom");
    }

    #[tokio::test]
    async fn listener_parks_maps_until_a_synchronizer_exists() {
        let (tx, rx) = broadcast::channel(4);
        let slot = Arc::new(OnceLock::new());
        let pending = Arc::new(Mutex::new(None));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn_map_listener(rx, slot.clone(), pending.clone(), shutdown_rx);

        tx.send(SensorMessage::Map(map("map", 0.1, 4, 4, vec![0; 16])))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pending.lock().is_some());

        let (sync, _buffer) = synchronizer("map");
        let _ = slot.set(Arc::new(sync));
        let mut data = vec![0u8; 16];
        data[0] = 200;
        tx.send(SensorMessage::Map(map("map", 0.1, 4, 4, data)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let slot_sync = slot.get().unwrap();
        let snapshot = slot_sync.state.lock().grid.snapshot();
        assert_eq!(snapshot.cost_at(0, 0), Some(cost::LETHAL_OBSTACLE));

        let _ = shutdown_tx.send(true);
        let _ = task.await;
    }
}
