//! The costmap controller.
//!
//! [`CostmapController`] owns the occupancy grid and keeps it in sync with
//! the world: it pulls sensor data through its sources, resolves the robot
//! pose, folds observations into the grid on a fixed schedule, keeps the
//! robot's own footprint clear, and reconciles static maps as they arrive.
//!
//! All grid state sits behind one mutex, in [`MapState`]. Every entry point
//! locks it once and hands the guard down; no path takes the lock twice, and
//! no path holds it across an await point.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use navgrid_control::{CostmapConfig, CostmapController, NullSink, SensorHub};
//! use navgrid_grid::sim::SimGrid;
//! use navgrid_perception::transform::FrameGraph;
//!
//! # async fn run() -> Result<(), navgrid_types::NavError> {
//! let tf = Arc::new(FrameGraph::default());
//! let hub = SensorHub::default();
//! let controller = CostmapController::new(
//!     CostmapConfig::default(),
//!     tf,
//!     hub.clone(),
//!     |seed| SimGrid::from_seed(seed),
//!     Box::new(NullSink),
//! )
//! .await?;
//! let snapshot = controller.snapshot();
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use navgrid_grid::engine::{GridEngine, GridSeed};
use navgrid_perception::footprint::{FootprintProvider, FootprintTracker};
use navgrid_perception::observation::{BufferConfig, ObservationBuffer, SharedBuffer};
use navgrid_perception::transform::{LookupTime, TransformSource};
use navgrid_types::{cost, GridSnapshot, MapSnapshot, NavError, Point3, Pose2, RobotPose};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{CostmapConfig, MapType, SourceKind};
use crate::fusion::ObservationFusionSet;
use crate::pose::{wait_for_transform, PoseResolver};
use crate::publish::{write_pgm, SnapshotSink};
use crate::sources::{LaserScanSource, ObservationSource, PointCloudSource, SensorHub};
use crate::static_map::{spawn_map_listener, StaticMapSynchronizer};

/// How long each transform availability check runs before re-warning.
const STARTUP_TRANSFORM_WAIT: Duration = Duration::from_secs(5);
const MAP_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Poll counts between "still waiting" logs while expecting the first map.
const MAP_WAIT_LOG_EVERY: u32 = 10;
const INIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything guarded by the grid lock.
///
/// The global frame lives here next to the grid so a static map arriving in
/// a new frame swaps both under one guard.
pub(crate) struct MapState {
    pub(crate) grid: Box<dyn GridEngine>,
    pub(crate) footprint: FootprintTracker,
    pub(crate) global_frame: String,
}

struct RunFlags {
    /// Scheduled cycles are skipped while set. Foreground updates still run.
    stop_updates: AtomicBool,
    /// Set after each completed update; cleared by [`CostmapController::pause`]
    /// and [`CostmapController::stop`] so resumption can block on the next one.
    initialized: AtomicBool,
    /// Whether sources are unsubscribed and need a restart.
    stopped: AtomicBool,
    /// Result of the last cycle's staleness check across all buffers.
    current: AtomicBool,
}

struct Inner {
    name: String,
    state: Arc<Mutex<MapState>>,
    fusion: Arc<ObservationFusionSet>,
    sources: Mutex<Vec<Box<dyn ObservationSource>>>,
    pose: PoseResolver,
    tf: Arc<dyn TransformSource>,
    hub: SensorHub,
    sink: Mutex<Box<dyn SnapshotSink>>,
    flags: RunFlags,
    rolling_window: bool,
    inflation_radius: f32,
    update_period: Option<Duration>,
    publish_period: Option<Duration>,
    last_publish: Mutex<Option<Instant>>,
    debug_dump: Option<PathBuf>,
}

/// Owns the grid, its sensor plumbing and the scheduled update task.
pub struct CostmapController {
    inner: Arc<Inner>,
    update_task: Option<JoinHandle<()>>,
    map_task: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl CostmapController {
    /// Build a controller and start its scheduled update task.
    ///
    /// Blocks until the robot base transform resolves in the global frame
    /// and, when `static_map` is set, until the first map arrives on the
    /// hub. The grid itself comes from `grid_factory`, seeded either from
    /// that first map or from the configured geometry.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Config`] for configurations the controller
    /// cannot start from, and [`NavError::Io`] when the debug dump
    /// directory cannot be created.
    pub async fn new(
        config: CostmapConfig,
        tf: Arc<dyn TransformSource>,
        hub: SensorHub,
        grid_factory: impl FnOnce(&GridSeed) -> Box<dyn GridEngine>,
        sink: Box<dyn SnapshotSink>,
    ) -> Result<Self, NavError> {
        config.validate()?;

        let mut global_frame = config.global_frame.clone();

        let providers = config
            .footprint_providers
            .iter()
            .map(|p| FootprintProvider {
                name: p.name.clone(),
                frame: p.frame.clone(),
            })
            .collect();
        let tracker = FootprintTracker::new(
            config.padded_footprint(),
            config.robot_radius,
            &config.robot_base_frame,
            providers,
            config.provider_padding,
        );
        if tracker.inscribed_radius() > config.inflation_radius
            || tracker.circumscribed_radius() > config.inflation_radius
        {
            warn!(
                inscribed = tracker.inscribed_radius(),
                circumscribed = tracker.circumscribed_radius(),
                inflation_radius = config.inflation_radius,
                "inflation radius is smaller than the robot's radii; obstacles may be under-inflated"
            );
        }

        let mut fusion = ObservationFusionSet::default();
        let mut sources: Vec<Box<dyn ObservationSource>> = Vec::new();
        for source_cfg in &config.sources {
            let buffer: SharedBuffer = Arc::new(Mutex::new(ObservationBuffer::new(BufferConfig {
                topic: source_cfg.topic().to_string(),
                global_frame: global_frame.clone(),
                observation_persistence: Duration::from_secs_f32(
                    source_cfg.observation_persistence,
                ),
                expected_interval: Duration::from_secs_f32(source_cfg.expected_update_rate),
                min_obstacle_height: source_cfg.min_obstacle_height,
                max_obstacle_height: source_cfg.max_obstacle_height,
                obstacle_range: source_cfg.obstacle_range,
                raytrace_range: source_cfg.raytrace_range,
            })));
            fusion.add(buffer.clone(), source_cfg.marking, source_cfg.clearing);

            let mut source: Box<dyn ObservationSource> = match source_cfg.kind {
                SourceKind::PointCloud => Box::new(PointCloudSource::new(
                    &source_cfg.name,
                    source_cfg.topic(),
                    buffer,
                )),
                SourceKind::LaserScan => Box::new(LaserScanSource::new(
                    &source_cfg.name,
                    source_cfg.topic(),
                    buffer,
                )),
            };
            source.start(&hub);
            info!(
                source = %source_cfg.name,
                topic = %source_cfg.topic(),
                marking = source_cfg.marking,
                clearing = source_cfg.clearing,
                "registered observation source"
            );
            sources.push(source);
        }
        let fusion = Arc::new(fusion);

        loop {
            if wait_for_transform(
                tf.as_ref(),
                &global_frame,
                &config.robot_base_frame,
                STARTUP_TRANSFORM_WAIT,
            )
            .await
            {
                break;
            }
            let detail = tf
                .lookup_transform(&global_frame, &config.robot_base_frame, LookupTime::Latest)
                .err()
                .map(|err| err.to_string())
                .unwrap_or_default();
            warn!(
                base_frame = %config.robot_base_frame,
                global_frame = %global_frame,
                error = %detail,
                "waiting on the robot base transform before running the costmap"
            );
        }

        let (shutdown_tx, _) = watch::channel(false);
        let sync_slot: Arc<OnceLock<Arc<StaticMapSynchronizer>>> = Arc::new(OnceLock::new());
        let pending: Arc<Mutex<Option<MapSnapshot>>> = Arc::new(Mutex::new(None));

        let map_task = if config.static_map {
            info!(topic = %config.map_topic, "waiting for the first static map");
            Some(spawn_map_listener(
                hub.subscribe(&config.map_topic),
                sync_slot.clone(),
                pending.clone(),
                shutdown_tx.subscribe(),
            ))
        } else {
            None
        };

        let seed = if config.static_map {
            let map = wait_for_first_map(&pending).await;
            if map.frame_id != global_frame {
                info!(
                    configured = %global_frame,
                    adopted = %map.frame_id,
                    "adopting the static map's frame as the global frame"
                );
                global_frame = map.frame_id.clone();
                fusion.set_global_frame(&global_frame);
            }
            seed_from_map(&config, &tracker, &map)
        } else {
            seed_from_config(&config, &tracker)
        };
        let grid = grid_factory(&seed);

        let state = Arc::new(Mutex::new(MapState {
            grid,
            footprint: tracker,
            global_frame: global_frame.clone(),
        }));

        if config.static_map {
            let sync = Arc::new(StaticMapSynchronizer::new(state.clone(), fusion.clone()));
            let _ = sync_slot.set(sync.clone());
            // a second map may have arrived while the grid was being built
            if let Some(map) = pending.lock().take() {
                if let Err(err) = sync.reconcile(&map) {
                    error!(error = %err, "dropping an unusable static map");
                }
            }
        }

        let debug_dump = match &config.debug_dump_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Some(dir.join(format!("{}.pgm", config.name)))
            }
            None => None,
        };

        let inner = Arc::new(Inner {
            name: config.name.clone(),
            state,
            fusion,
            sources: Mutex::new(sources),
            pose: PoseResolver::new(
                tf.clone(),
                &config.robot_base_frame,
                config.transform_tolerance(),
            ),
            tf,
            hub,
            sink: Mutex::new(sink),
            flags: RunFlags {
                stop_updates: AtomicBool::new(false),
                initialized: AtomicBool::new(true),
                stopped: AtomicBool::new(false),
                current: AtomicBool::new(false),
            },
            rolling_window: config.rolling_window,
            inflation_radius: config.inflation_radius,
            update_period: config.update_period(),
            publish_period: config.publish_period(),
            last_publish: Mutex::new(None),
            debug_dump,
        });

        let update_task = inner.update_period.map(|period| {
            let inner = inner.clone();
            let rx = shutdown_tx.subscribe();
            tokio::spawn(update_loop(inner, period, rx))
        });

        info!(
            name = %config.name,
            global_frame = %global_frame,
            update_hz = config.update_frequency,
            rolling = config.rolling_window,
            "costmap controller running"
        );

        Ok(Self {
            inner,
            update_task,
            map_task,
            shutdown: shutdown_tx,
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn global_frame(&self) -> String {
        self.inner.state.lock().global_frame.clone()
    }

    pub fn base_frame(&self) -> &str {
        self.inner.pose.base_frame()
    }

    pub fn resolution(&self) -> f32 {
        self.inner.state.lock().grid.resolution()
    }

    pub fn size_in_cells_x(&self) -> u32 {
        self.inner.state.lock().grid.size_in_cells_x()
    }

    pub fn size_in_cells_y(&self) -> u32 {
        self.inner.state.lock().grid.size_in_cells_y()
    }

    pub fn inflation_radius(&self) -> f32 {
        self.inner.inflation_radius
    }

    /// Whether every marking and clearing buffer was fresh at the last
    /// completed update cycle.
    pub fn is_current(&self) -> bool {
        self.inner.flags.current.load(Ordering::SeqCst)
    }

    /// The robot's current pose in the global frame.
    pub fn robot_pose(&self) -> Result<RobotPose, NavError> {
        self.inner.pose.resolve(&self.global_frame())
    }

    /// The padded footprint polygon in the base frame, or empty for a
    /// circular robot.
    pub fn footprint(&self) -> Vec<Point3> {
        self.inner.state.lock().footprint.footprint().to_vec()
    }

    /// The footprint placed at the robot's current pose in the global frame.
    pub fn oriented_footprint(&self) -> Result<Vec<Point3>, NavError> {
        let pose = self.robot_pose()?;
        Ok(self.inner.state.lock().footprint.oriented(pose.pose))
    }

    pub fn inscribed_radius(&self) -> f32 {
        self.inner.state.lock().footprint.inscribed_radius()
    }

    pub fn circumscribed_radius(&self) -> f32 {
        self.inner.state.lock().footprint.circumscribed_radius()
    }

    /// Plain-data copy of the whole grid.
    pub fn snapshot(&self) -> GridSnapshot {
        self.inner.state.lock().grid.snapshot()
    }

    /// Copy of the cells in a window centered on the robot.
    pub fn window_copy(&self, size_x: f32, size_y: f32) -> Result<GridSnapshot, NavError> {
        let pose = self.robot_pose()?;
        Ok(self.window_copy_at(pose.pose.x, pose.pose.y, size_x, size_y))
    }

    /// Copy of the cells in a window centered on a world point.
    ///
    /// Both corners are clamped to the grid independently, so a window
    /// reaching past an edge comes back truncated rather than shifted.
    pub fn window_copy_at(
        &self,
        center_x: f32,
        center_y: f32,
        size_x: f32,
        size_y: f32,
    ) -> GridSnapshot {
        let st = self.inner.state.lock();
        let min_x = st.grid.origin_x();
        let min_y = st.grid.origin_y();
        let max_x = min_x + st.grid.size_in_meters_x();
        let max_y = min_y + st.grid.size_in_meters_y();
        let ll_x = (center_x - size_x / 2.0).clamp(min_x, max_x);
        let ll_y = (center_y - size_y / 2.0).clamp(min_y, max_y);
        let ur_x = (center_x + size_x / 2.0).clamp(min_x, max_x);
        let ur_y = (center_y + size_y / 2.0).clamp(min_y, max_y);
        st.grid.window_snapshot(ll_x, ll_y, ur_x - ll_x, ur_y - ll_y)
    }

    /// Run one full update cycle immediately, regardless of the schedule.
    pub fn force_update(&self) {
        self.inner.update_map();
    }

    /// Reset every non-lethal cell, unknown included, in a window around
    /// the robot, then run an update so sensor data is re-applied.
    pub fn clear_non_lethal_window(&self, size_x: f32, size_y: f32) -> Result<(), NavError> {
        let pose = self.robot_pose()?;
        {
            let mut st = self.inner.state.lock();
            st.grid
                .clear_non_lethal(pose.pose.x, pose.pose.y, size_x, size_y, true);
        }
        self.inner.update_map();
        Ok(())
    }

    /// Restore the static layer everywhere outside a window around the
    /// robot, then run an update.
    pub fn reset_map_outside_window(&self, size_x: f32, size_y: f32) -> Result<(), NavError> {
        let pose = self.robot_pose()?;
        {
            let mut st = self.inner.state.lock();
            st.grid
                .reset_outside_window(pose.pose.x, pose.pose.y, size_x, size_y);
        }
        self.inner.update_map();
        Ok(())
    }

    /// Stamp a cost over a convex polygon, then run an update so the rest
    /// of the grid reflects current sensor data.
    ///
    /// Returns whether the polygon fit on the grid; the update runs either
    /// way.
    pub fn set_convex_polygon_cost(&self, polygon: &[Point3], cost_value: u8) -> bool {
        let success = {
            let mut st = self.inner.state.lock();
            st.grid.set_convex_polygon_cost(polygon, cost_value)
        };
        self.inner.update_map();
        success
    }

    /// Stop consuming sensor data and freeze the grid.
    pub fn stop(&self) {
        self.inner.flags.stop_updates.store(true, Ordering::SeqCst);
        let mut sources = self.inner.sources.lock();
        for source in sources.iter_mut() {
            source.stop();
        }
        self.inner.flags.initialized.store(false, Ordering::SeqCst);
        self.inner.flags.stopped.store(true, Ordering::SeqCst);
    }

    /// Undo a [`stop`](Self::stop): resubscribe the sources, restart every
    /// staleness clock, and wait for one completed update cycle.
    pub async fn start(&self) {
        {
            let mut sources = self.inner.sources.lock();
            if self.inner.flags.stopped.load(Ordering::SeqCst) {
                for source in sources.iter_mut() {
                    source.start(&self.inner.hub);
                }
                self.inner.flags.stopped.store(false, Ordering::SeqCst);
            }
        }
        self.inner.fusion.reset_staleness_clocks();
        self.inner.flags.stop_updates.store(false, Ordering::SeqCst);
        self.wait_for_update().await;
    }

    /// Skip scheduled updates while keeping sensor subscriptions alive.
    pub fn pause(&self) {
        self.inner.flags.stop_updates.store(true, Ordering::SeqCst);
        self.inner.flags.initialized.store(false, Ordering::SeqCst);
    }

    /// Undo a [`pause`](Self::pause) and wait for one completed update
    /// cycle.
    pub async fn resume(&self) {
        self.inner.flags.stop_updates.store(false, Ordering::SeqCst);
        self.wait_for_update().await;
    }

    /// Stop the scheduled tasks and wait for them to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.update_task.take() {
            let _ = task.await;
        }
        if let Some(task) = self.map_task.take() {
            let _ = task.await;
        }
        info!(name = %self.inner.name, "costmap controller shut down");
    }

    async fn wait_for_update(&self) {
        match self.inner.update_period {
            // no scheduled task to wait on; bring the grid up to date inline
            None => {
                self.inner.update_map();
                self.inner.flags.initialized.store(true, Ordering::SeqCst);
            }
            Some(_) => {
                while !self.inner.flags.initialized.load(Ordering::SeqCst) {
                    tokio::time::sleep(INIT_POLL_INTERVAL).await;
                }
            }
        }
    }
}

impl Drop for CostmapController {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.update_task.take() {
            task.abort();
        }
        if let Some(task) = self.map_task.take() {
            task.abort();
        }
    }
}

impl Inner {
    /// One full update cycle.
    fn update_map(&self) {
        {
            let mut sources = self.sources.lock();
            for source in sources.iter_mut() {
                source.pump(self.tf.as_ref());
            }
        }

        let global_frame = self.state.lock().global_frame.clone();
        let pose = match self.pose.resolve(&global_frame) {
            Ok(pose) => pose,
            Err(err) => {
                warn!(error = %err, "skipping the update cycle without a robot pose");
                return;
            }
        };

        let marking = self.fusion.marking_observations();
        let clearing = self.fusion.clearing_observations();
        self.flags
            .current
            .store(self.fusion.is_current(), Ordering::SeqCst);

        let due = self.publish_due();
        let mut st = self.state.lock();
        if self.rolling_window {
            let new_origin_x = pose.pose.x - st.grid.size_in_meters_x() / 2.0;
            let new_origin_y = pose.pose.y - st.grid.size_in_meters_y() / 2.0;
            st.grid.update_origin(new_origin_x, new_origin_y);
        }
        st.grid
            .update_world(pose.pose.x, pose.pose.y, &marking, &clearing);
        self.clear_robot_footprint(&mut st, pose.pose);
        debug!(
            marking = marking.len(),
            clearing = clearing.len(),
            "updated the grid"
        );

        let snapshot = (due || self.debug_dump.is_some()).then(|| st.grid.snapshot());
        let oriented = if due {
            st.footprint.oriented(pose.pose)
        } else {
            Vec::new()
        };
        drop(st);

        let Some(snapshot) = snapshot else { return };
        if let Some(path) = &self.debug_dump {
            if let Err(err) = write_pgm(&snapshot, path) {
                warn!(error = %err, path = %path.display(), "failed to write the grid dump");
            }
        }
        if due {
            if let Err(err) = self.sink.lock().publish(&snapshot, &oriented, pose.pose) {
                warn!(error = %err, "snapshot publication failed");
            }
            *self.last_publish.lock() = Some(Instant::now());
        }
    }

    /// Re-fit the footprint, stamp it free, and rebuild costs around it.
    fn clear_robot_footprint(&self, st: &mut MapState, pose: Pose2) {
        match st.footprint.recompute(self.tf.as_ref()) {
            Ok(true) => {
                let inscribed = st.footprint.inscribed_radius();
                let circumscribed = st.footprint.circumscribed_radius();
                st.grid.update_radii(inscribed, circumscribed);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "keeping the previous footprint for this cycle");
            }
        }

        let polygon = st.footprint.oriented(pose);
        if !st.grid.set_convex_polygon_cost(&polygon, cost::FREE_SPACE) {
            debug!("the robot footprint reaches outside the grid; not clearing it");
            return;
        }

        // everything the footprint's obstacles could have inflated into
        let clear_size = 2.0 * (self.inflation_radius + st.footprint.circumscribed_radius());
        st.grid
            .clear_non_lethal(pose.x, pose.y, clear_size, clear_size, false);
        let reinflate_size = clear_size + 2.0 * self.inflation_radius;
        st.grid
            .reinflate_window(pose.x, pose.y, reinflate_size, reinflate_size, false);
    }

    fn publish_due(&self) -> bool {
        let Some(period) = self.publish_period else {
            return false;
        };
        match *self.last_publish.lock() {
            None => true,
            Some(at) => at.elapsed() >= period,
        }
    }
}

async fn update_loop(inner: Arc<Inner>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let target_hz = 1.0 / period.as_secs_f64();
    loop {
        if *shutdown.borrow() {
            break;
        }
        let started = Instant::now();
        if !inner.flags.stop_updates.load(Ordering::SeqCst) {
            inner.update_map();
            inner.flags.initialized.store(true, Ordering::SeqCst);
        }
        let elapsed = started.elapsed();
        if elapsed > period {
            warn!(
                target_hz,
                actual_s = elapsed.as_secs_f64(),
                "map update loop missed its desired rate"
            );
        } else {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(period - elapsed) => {}
            }
        }
    }
    debug!("map update loop exited");
}

async fn wait_for_first_map(pending: &Arc<Mutex<Option<MapSnapshot>>>) -> MapSnapshot {
    let mut polls = 0u32;
    loop {
        if let Some(map) = pending.lock().take() {
            return map;
        }
        tokio::time::sleep(MAP_POLL_INTERVAL).await;
        polls += 1;
        if polls % MAP_WAIT_LOG_EVERY == 0 {
            info!("still waiting on the first static map");
        }
    }
}

fn default_cost_for(map_type: MapType, unknown_threshold: u32) -> u8 {
    match map_type {
        MapType::Voxel if unknown_threshold > 0 => cost::NO_INFORMATION,
        _ => cost::FREE_SPACE,
    }
}

fn seed_from_config(config: &CostmapConfig, tracker: &FootprintTracker) -> GridSeed {
    GridSeed {
        size_x_cells: (config.width / config.resolution) as u32,
        size_y_cells: (config.height / config.resolution) as u32,
        resolution: config.resolution,
        origin_x: config.origin_x,
        origin_y: config.origin_y,
        data: None,
        default_cost: default_cost_for(config.map_type, config.unknown_threshold()),
        lethal_threshold: config.lethal_cost_threshold,
        unknown_cost_value: config.unknown_cost_value,
        inscribed_radius: tracker.inscribed_radius(),
        circumscribed_radius: tracker.circumscribed_radius(),
        inflation_radius: config.inflation_radius,
    }
}

fn seed_from_map(config: &CostmapConfig, tracker: &FootprintTracker, map: &MapSnapshot) -> GridSeed {
    GridSeed {
        size_x_cells: map.width,
        size_y_cells: map.height,
        resolution: map.resolution,
        origin_x: map.origin_x,
        origin_y: map.origin_y,
        data: Some(map.data.clone()),
        default_cost: default_cost_for(config.map_type, config.unknown_threshold()),
        lethal_threshold: config.lethal_cost_threshold,
        unknown_cost_value: config.unknown_cost_value,
        inscribed_radius: tracker.inscribed_radius(),
        circumscribed_radius: tracker.circumscribed_radius(),
        inflation_radius: config.inflation_radius,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
