//! Generic `GridEngine` trait for costmap implementations.
//!
//! Engines own the cell array and every algorithm that touches it (marking,
//! raytracing, inflation, static-map merges).  The controller holds an
//! engine behind its grid lock and drives it through this trait, so the
//! same scheduling and sensing machinery runs against any implementation.

use navgrid_types::{GridSnapshot, MapSnapshot, Observation, Point3};

/// Construction parameters for a grid engine.
///
/// Built by the controller from its configuration, or from the first static
/// map when one is expected.  `data` carries raw occupancy bytes in the map
/// provider's encoding; the engine translates them into cell costs using
/// `lethal_threshold` and `unknown_cost_value`.
#[derive(Debug, Clone)]
pub struct GridSeed {
    pub size_x_cells: u32,
    pub size_y_cells: u32,
    /// Cell edge length in meters.
    pub resolution: f32,
    /// World coordinates of the lower-left corner.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Raw occupancy bytes seeding the static layer, row-major.  `None`
    /// starts the grid uniformly at `default_cost`.
    pub data: Option<Vec<u8>>,
    /// Cost given to cells with no other information.
    pub default_cost: u8,
    /// Occupancy values at or above this mark a lethal obstacle.
    pub lethal_threshold: u8,
    /// Occupancy value the map provider uses for unknown cells.
    pub unknown_cost_value: u8,
    pub inscribed_radius: f32,
    pub circumscribed_radius: f32,
    pub inflation_radius: f32,
}

/// The mutation and snapshot surface of a costmap implementation.
///
/// World-space windows are always given as a center point plus extents in
/// meters, and are clipped to the grid.  None of these methods lock; the
/// caller serializes access.
pub trait GridEngine: Send {
    /// Fold buffered observations into the grid: carve free space along
    /// clearing rays, mark obstacles from marking points, and inflate
    /// around the newly marked cells.
    fn update_world(
        &mut self,
        robot_x: f32,
        robot_y: f32,
        marking: &[Observation],
        clearing: &[Observation],
    );

    /// Shift a rolling grid so its lower-left corner lands at the given
    /// world coordinates (snapped to whole cells).  Cells that remain under
    /// the window keep their costs; newly revealed cells start at the
    /// default cost.
    fn update_origin(&mut self, new_origin_x: f32, new_origin_y: f32);

    /// Stamp `cost` over every cell covered by the convex polygon.
    ///
    /// Returns `false` without touching the grid when any vertex lies
    /// outside it.
    fn set_convex_polygon_cost(&mut self, polygon: &[Point3], cost: u8) -> bool;

    /// Reset every non-lethal cell in the window centered at `(wx, wy)` to
    /// free space.  Unknown cells are only cleared when `clear_no_info` is
    /// set.  A center point off the grid is ignored.
    fn clear_non_lethal(
        &mut self,
        wx: f32,
        wy: f32,
        w_size_x: f32,
        w_size_y: f32,
        clear_no_info: bool,
    );

    /// Recompute inflation inside the window centered at `(wx, wy)`.  When
    /// `clear` is set, inflation already present in the window is removed
    /// first.
    fn reinflate_window(&mut self, wx: f32, wy: f32, w_size_x: f32, w_size_y: f32, clear: bool);

    /// Restore every cell outside the window centered at `(wx, wy)` to its
    /// static-layer value, leaving the window itself untouched.
    fn reset_outside_window(&mut self, wx: f32, wy: f32, w_size_x: f32, w_size_y: f32);

    /// Adopt `map` wholesale: geometry, static layer and live cells.
    fn replace_full_map(&mut self, map: &MapSnapshot);

    /// Merge `map` into the region it covers, clipped to the grid, and
    /// re-inflate that region.  Cells elsewhere are untouched.
    fn update_static_window(&mut self, map: &MapSnapshot);

    /// Plain-data copy of the whole grid.
    fn snapshot(&self) -> GridSnapshot;

    /// Plain-data copy of the cells under the world-space rectangle with
    /// lower-left corner `(ll_x, ll_y)`, clipped to the grid.
    fn window_snapshot(&self, ll_x: f32, ll_y: f32, size_x: f32, size_y: f32) -> GridSnapshot;

    fn size_in_cells_x(&self) -> u32;
    fn size_in_cells_y(&self) -> u32;
    fn size_in_meters_x(&self) -> f32;
    fn size_in_meters_y(&self) -> f32;
    fn resolution(&self) -> f32;
    fn origin_x(&self) -> f32;
    fn origin_y(&self) -> f32;
    fn inscribed_radius(&self) -> f32;
    fn circumscribed_radius(&self) -> f32;

    /// Adopt freshly recomputed footprint radii for future inflation.
    fn update_radii(&mut self, inscribed: f32, circumscribed: f32);
}
