//! Snapshot publication.
//!
//! The controller hands each due snapshot, together with the robot's
//! oriented footprint and pose, to a [`SnapshotSink`]. Embedders bring
//! their own sink; [`NullSink`] discards everything and [`PgmDumpSink`]
//! writes a viewable image for debugging.

use std::fs;
use std::path::{Path, PathBuf};

use navgrid_types::{cost, GridSnapshot, NavError, Point3, Pose2};
use tracing::debug;

/// Receives grid snapshots as they are published.
pub trait SnapshotSink: Send {
    /// # Errors
    ///
    /// Delivery failures are logged by the caller and do not stop the
    /// update cycle.
    fn publish(
        &mut self,
        snapshot: &GridSnapshot,
        footprint: &[Point3],
        pose: Pose2,
    ) -> Result<(), NavError>;
}

/// Sink that discards every snapshot.
#[derive(Debug, Default)]
pub struct NullSink;

impl SnapshotSink for NullSink {
    fn publish(
        &mut self,
        _snapshot: &GridSnapshot,
        _footprint: &[Point3],
        _pose: Pose2,
    ) -> Result<(), NavError> {
        Ok(())
    }
}

/// Sink that overwrites a PGM image with every published snapshot.
pub struct PgmDumpSink {
    path: PathBuf,
}

impl PgmDumpSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSink for PgmDumpSink {
    fn publish(
        &mut self,
        snapshot: &GridSnapshot,
        _footprint: &[Point3],
        _pose: Pose2,
    ) -> Result<(), NavError> {
        write_pgm(snapshot, &self.path)?;
        debug!(path = %self.path.display(), "wrote grid image");
        Ok(())
    }
}

/// Write a snapshot as a binary PGM image.
///
/// Rows are written north-up, so the origin cell lands in the bottom-left
/// corner of the image. Free space renders near-white, lethal cells black,
/// unknown cells mid-gray.
pub fn write_pgm(snapshot: &GridSnapshot, path: &Path) -> Result<(), NavError> {
    let header = format!("P5\n{} {}\n255\n", snapshot.size_x, snapshot.size_y);
    let mut out = Vec::with_capacity(header.len() + snapshot.cells.len());
    out.extend_from_slice(header.as_bytes());
    for my in (0..snapshot.size_y).rev() {
        for mx in 0..snapshot.size_x {
            let value = snapshot.cost_at(mx, my).unwrap_or(cost::NO_INFORMATION);
            let pixel = if value == cost::NO_INFORMATION {
                205
            } else {
                cost::LETHAL_OBSTACLE - value
            };
            out.push(pixel);
        }
    }
    fs::write(path, out)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
