//! `navgrid-control` – the costmap maintenance controller.
//!
//! Ties the sensing and grid layers together: sensor messages flow through
//! the [`sources::SensorHub`] into per-source observation buffers, and the
//! [`controller::CostmapController`] folds them into an occupancy grid on a
//! fixed schedule while keeping the robot's own footprint clear and
//! reconciling static maps as they arrive.
//!
//! # Modules
//!
//! - [`config`] – TOML configuration and validation.
//! - [`controller`] – the controller and its update cycle.
//! - [`fusion`] – role-tagged fan-in over observation buffers.
//! - [`pose`] – robot pose resolution.
//! - [`publish`] – snapshot sinks and PGM dumps.
//! - [`sources`] – the sensor hub and pull-based sources.
//! - [`static_map`] – static map reconciliation.
//! - [`telemetry`] – tracing setup.

pub mod config;
pub mod controller;
pub mod fusion;
pub mod pose;
pub mod publish;
pub mod sources;
pub mod static_map;
pub mod telemetry;

pub use config::{CostmapConfig, MapType, ProviderConfig, SourceConfig, SourceKind};
pub use controller::CostmapController;
pub use publish::{NullSink, PgmDumpSink, SnapshotSink};
pub use sources::{LaserScanSource, ObservationSource, PointCloudSource, SensorHub};
