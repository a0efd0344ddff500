//! Flat-array grid engine for headless tests and development.
//!
//! [`SimGrid`] implements the full [`GridEngine`] surface over a single
//! `Vec<u8>` with deliberately simple algorithms: obstacles are marked one
//! cell per point, clearing rays are traced with Bresenham, and inflation
//! paints the inscribed radius around each lethal cell.  Rays or polygons
//! reaching outside the grid are clipped or dropped rather than split.
//!
//! The engine also counts re-inflation requests so tests can assert that
//! callers asked for them.

use navgrid_types::{GridSnapshot, MapSnapshot, Observation, Point3, cost};
use tracing::debug;

use crate::engine::{GridEngine, GridSeed};

fn point_in_convex(px: f32, py: f32, polygon: &[Point3]) -> bool {
    let n = polygon.len();
    let mut has_pos = false;
    let mut has_neg = false;
    for i in 0..n {
        let a = &polygon[i];
        let b = &polygon[(i + 1) % n];
        let cross = (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x);
        if cross > 0.0 {
            has_pos = true;
        }
        if cross < 0.0 {
            has_neg = true;
        }
        if has_pos && has_neg {
            return false;
        }
    }
    true
}

// ────────────────────────────────────────────────────────────────────────────
// SimGrid
// ────────────────────────────────────────────────────────────────────────────

/// In-memory costmap with a static layer and a live layer.
///
/// The static layer holds the last reconciled map (or a uniform default)
/// and is what [`GridEngine::reset_outside_window`] restores to; the live
/// layer is what sensors and clearing operations mutate.
pub struct SimGrid {
    size_x: u32,
    size_y: u32,
    resolution: f32,
    origin_x: f32,
    origin_y: f32,
    cells: Vec<u8>,
    static_cells: Vec<u8>,
    default_cost: u8,
    lethal_threshold: u8,
    unknown_cost_value: u8,
    inscribed: f32,
    circumscribed: f32,
    inflation: f32,
    reinflate_calls: usize,
}

impl SimGrid {
    /// Build a grid from a seed, translating any seed occupancy data into
    /// cell costs and inflating the obstacles it contains.
    pub fn from_seed(seed: &GridSeed) -> Box<Self> {
        let len = seed.size_x_cells as usize * seed.size_y_cells as usize;
        let mut grid = Box::new(Self {
            size_x: seed.size_x_cells,
            size_y: seed.size_y_cells,
            resolution: seed.resolution,
            origin_x: seed.origin_x,
            origin_y: seed.origin_y,
            cells: Vec::new(),
            static_cells: Vec::new(),
            default_cost: seed.default_cost,
            lethal_threshold: seed.lethal_threshold,
            unknown_cost_value: seed.unknown_cost_value,
            inscribed: seed.inscribed_radius,
            circumscribed: seed.circumscribed_radius,
            inflation: seed.inflation_radius,
            reinflate_calls: 0,
        });
        grid.static_cells = match &seed.data {
            Some(data) => data.iter().map(|&v| grid.interpret(v)).collect(),
            None => vec![grid.default_cost; len],
        };
        grid.static_cells.resize(len, seed.default_cost);
        grid.cells = grid.static_cells.clone();
        if seed.data.is_some() {
            grid.inflate_cells(0, 0, grid.size_x, grid.size_y, false);
        }
        grid
    }

    /// Cost at cell `(mx, my)`, or `None` outside the grid.
    pub fn cost_at(&self, mx: u32, my: u32) -> Option<u8> {
        if mx >= self.size_x || my >= self.size_y {
            return None;
        }
        Some(self.cells[self.index(mx, my)])
    }

    /// Cost at the cell under the world point `(wx, wy)`.
    pub fn cost_at_world(&self, wx: f32, wy: f32) -> Option<u8> {
        let (mx, my) = self.world_to_cell(wx, wy)?;
        Some(self.cells[self.index(mx, my)])
    }

    /// How many times [`GridEngine::reinflate_window`] has been called.
    pub fn reinflate_calls(&self) -> usize {
        self.reinflate_calls
    }

    fn interpret(&self, value: u8) -> u8 {
        if value == self.unknown_cost_value {
            if self.default_cost == cost::NO_INFORMATION {
                cost::NO_INFORMATION
            } else {
                cost::FREE_SPACE
            }
        } else if value >= self.lethal_threshold {
            cost::LETHAL_OBSTACLE
        } else {
            cost::FREE_SPACE
        }
    }

    fn index(&self, mx: u32, my: u32) -> usize {
        (my * self.size_x + mx) as usize
    }

    fn world_to_cell(&self, wx: f32, wy: f32) -> Option<(u32, u32)> {
        if wx < self.origin_x || wy < self.origin_y {
            return None;
        }
        let mx = ((wx - self.origin_x) / self.resolution) as u32;
        let my = ((wy - self.origin_y) / self.resolution) as u32;
        if mx < self.size_x && my < self.size_y {
            Some((mx, my))
        } else {
            None
        }
    }

    fn cell_center(&self, mx: u32, my: u32) -> (f32, f32) {
        (
            self.origin_x + (mx as f32 + 0.5) * self.resolution,
            self.origin_y + (my as f32 + 0.5) * self.resolution,
        )
    }

    /// Cell bounds of the window centered at `(wx, wy)`: inclusive start,
    /// exclusive end, clipped to the grid.
    fn window_bounds(&self, wx: f32, wy: f32, w_size_x: f32, w_size_y: f32) -> (u32, u32, u32, u32) {
        let to_cell = |w: f32, origin: f32, limit: u32, round_up: bool| -> u32 {
            let c = (w - origin) / self.resolution;
            let c = if round_up { c.ceil() } else { c.floor() };
            (c.max(0.0) as u32).min(limit)
        };
        (
            to_cell(wx - w_size_x / 2.0, self.origin_x, self.size_x, false),
            to_cell(wy - w_size_y / 2.0, self.origin_y, self.size_y, false),
            to_cell(wx + w_size_x / 2.0, self.origin_x, self.size_x, true),
            to_cell(wy + w_size_y / 2.0, self.origin_y, self.size_y, true),
        )
    }

    /// Carve free space from `origin` toward `target`, stopping at the
    /// raytrace range.  The endpoint cell itself is left for the marking
    /// pass.
    fn raytrace_free(&mut self, origin: Point3, target: Point3, range: f32) {
        let Some((x0, y0)) = self.world_to_cell(origin.x, origin.y) else {
            return;
        };
        let dist = origin.planar_distance(&target);
        let (tx, ty) = if dist > range && dist > 0.0 {
            let scale = range / dist;
            (
                origin.x + (target.x - origin.x) * scale,
                origin.y + (target.y - origin.y) * scale,
            )
        } else {
            (target.x, target.y)
        };
        let Some((x1, y1)) = self.world_to_cell(tx, ty) else {
            return;
        };

        let mut x = x0 as i64;
        let mut y = y0 as i64;
        let x1 = x1 as i64;
        let y1 = y1 as i64;
        let dx = (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        while x != x1 || y != y1 {
            let idx = self.index(x as u32, y as u32);
            self.cells[idx] = cost::FREE_SPACE;
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Paint the inscribed radius around every lethal cell in the given
    /// cell range.
    fn inflate_cells(&mut self, sx: u32, sy: u32, ex: u32, ey: u32, clear: bool) {
        if clear {
            for my in sy..ey {
                for mx in sx..ex {
                    let idx = self.index(mx, my);
                    if self.cells[idx] == cost::INSCRIBED_INFLATED_OBSTACLE {
                        self.cells[idx] = cost::FREE_SPACE;
                    }
                }
            }
        }

        let radius_cells = (self.inscribed / self.resolution).ceil() as i64;
        if radius_cells == 0 {
            return;
        }

        let mut lethal = Vec::new();
        for my in sy..ey {
            for mx in sx..ex {
                if self.cells[self.index(mx, my)] == cost::LETHAL_OBSTACLE {
                    lethal.push((mx as i64, my as i64));
                }
            }
        }

        for (lx, ly) in lethal {
            for dy in -radius_cells..=radius_cells {
                for dx in -radius_cells..=radius_cells {
                    let nx = lx + dx;
                    let ny = ly + dy;
                    if nx < 0 || ny < 0 || nx >= self.size_x as i64 || ny >= self.size_y as i64 {
                        continue;
                    }
                    let world_dist = ((dx * dx + dy * dy) as f32).sqrt() * self.resolution;
                    if world_dist > self.inscribed {
                        continue;
                    }
                    let idx = self.index(nx as u32, ny as u32);
                    if self.cells[idx] != cost::LETHAL_OBSTACLE
                        && self.cells[idx] != cost::NO_INFORMATION
                    {
                        self.cells[idx] = cost::INSCRIBED_INFLATED_OBSTACLE;
                    }
                }
            }
        }
    }
}

impl GridEngine for SimGrid {
    fn update_world(
        &mut self,
        robot_x: f32,
        robot_y: f32,
        marking: &[Observation],
        clearing: &[Observation],
    ) {
        debug!(
            robot_x,
            robot_y,
            marking = marking.len(),
            clearing = clearing.len(),
            "updating world"
        );

        for obs in clearing {
            for pt in &obs.points {
                self.raytrace_free(obs.origin, *pt, obs.raytrace_range);
            }
        }

        let mut marked: Option<(u32, u32, u32, u32)> = None;
        for obs in marking {
            for pt in &obs.points {
                if pt.planar_distance(&obs.origin) > obs.obstacle_range {
                    continue;
                }
                if let Some((mx, my)) = self.world_to_cell(pt.x, pt.y) {
                    let idx = self.index(mx, my);
                    self.cells[idx] = cost::LETHAL_OBSTACLE;
                    marked = Some(match marked {
                        None => (mx, my, mx, my),
                        Some((sx, sy, ex, ey)) => {
                            (sx.min(mx), sy.min(my), ex.max(mx), ey.max(my))
                        }
                    });
                }
            }
        }

        // Newly marked obstacles inflate immediately.
        if let Some((sx, sy, ex, ey)) = marked {
            self.inflate_cells(sx, sy, ex + 1, ey + 1, false);
        }
    }

    fn update_origin(&mut self, new_origin_x: f32, new_origin_y: f32) {
        // Snap the shift to whole cells, truncating toward zero.
        let cell_dx = ((new_origin_x - self.origin_x) / self.resolution) as i64;
        let cell_dy = ((new_origin_y - self.origin_y) / self.resolution) as i64;
        if cell_dx == 0 && cell_dy == 0 {
            return;
        }

        let mut cells = vec![self.default_cost; self.cells.len()];
        let mut statics = vec![self.default_cost; self.static_cells.len()];
        for my in 0..self.size_y as i64 {
            let src_y = my + cell_dy;
            if src_y < 0 || src_y >= self.size_y as i64 {
                continue;
            }
            for mx in 0..self.size_x as i64 {
                let src_x = mx + cell_dx;
                if src_x < 0 || src_x >= self.size_x as i64 {
                    continue;
                }
                let dst = (my * self.size_x as i64 + mx) as usize;
                let src = (src_y * self.size_x as i64 + src_x) as usize;
                cells[dst] = self.cells[src];
                statics[dst] = self.static_cells[src];
            }
        }
        self.cells = cells;
        self.static_cells = statics;
        self.origin_x += cell_dx as f32 * self.resolution;
        self.origin_y += cell_dy as f32 * self.resolution;
    }

    fn set_convex_polygon_cost(&mut self, polygon: &[Point3], cost: u8) -> bool {
        let mut vertex_cells = Vec::with_capacity(polygon.len());
        for v in polygon {
            match self.world_to_cell(v.x, v.y) {
                Some(cell) => vertex_cells.push(cell),
                None => return false,
            }
        }

        if polygon.len() >= 3 {
            let min_x = vertex_cells.iter().map(|c| c.0).min().unwrap_or(0);
            let max_x = vertex_cells.iter().map(|c| c.0).max().unwrap_or(0);
            let min_y = vertex_cells.iter().map(|c| c.1).min().unwrap_or(0);
            let max_y = vertex_cells.iter().map(|c| c.1).max().unwrap_or(0);
            for my in min_y..=max_y {
                for mx in min_x..=max_x {
                    let (cx, cy) = self.cell_center(mx, my);
                    if point_in_convex(cx, cy, polygon) {
                        let idx = self.index(mx, my);
                        self.cells[idx] = cost;
                    }
                }
            }
        }
        // The vertex cells themselves are always covered, even when the
        // polygon is thinner than a cell.
        for (mx, my) in vertex_cells {
            let idx = self.index(mx, my);
            self.cells[idx] = cost;
        }
        true
    }

    fn clear_non_lethal(
        &mut self,
        wx: f32,
        wy: f32,
        w_size_x: f32,
        w_size_y: f32,
        clear_no_info: bool,
    ) {
        if self.world_to_cell(wx, wy).is_none() {
            return;
        }
        let (sx, sy, ex, ey) = self.window_bounds(wx, wy, w_size_x, w_size_y);
        for my in sy..ey {
            for mx in sx..ex {
                let idx = self.index(mx, my);
                let value = self.cells[idx];
                if value != cost::LETHAL_OBSTACLE && (clear_no_info || value != cost::NO_INFORMATION)
                {
                    self.cells[idx] = cost::FREE_SPACE;
                }
            }
        }
    }

    fn reinflate_window(&mut self, wx: f32, wy: f32, w_size_x: f32, w_size_y: f32, clear: bool) {
        self.reinflate_calls += 1;
        let (sx, sy, ex, ey) = self.window_bounds(wx, wy, w_size_x, w_size_y);
        self.inflate_cells(sx, sy, ex, ey, clear);
    }

    fn reset_outside_window(&mut self, wx: f32, wy: f32, w_size_x: f32, w_size_y: f32) {
        let (sx, sy, ex, ey) = self.window_bounds(wx, wy, w_size_x, w_size_y);
        for my in 0..self.size_y {
            for mx in 0..self.size_x {
                if mx >= sx && mx < ex && my >= sy && my < ey {
                    continue;
                }
                let idx = self.index(mx, my);
                self.cells[idx] = self.static_cells[idx];
            }
        }
    }

    fn replace_full_map(&mut self, map: &MapSnapshot) {
        self.size_x = map.width;
        self.size_y = map.height;
        self.resolution = map.resolution;
        self.origin_x = map.origin_x;
        self.origin_y = map.origin_y;

        let len = map.width as usize * map.height as usize;
        let mut cells: Vec<u8> = map.data.iter().map(|&v| self.interpret(v)).collect();
        cells.resize(len, self.default_cost);
        self.static_cells = cells.clone();
        self.cells = cells;
        self.inflate_cells(0, 0, self.size_x, self.size_y, false);
    }

    fn update_static_window(&mut self, map: &MapSnapshot) {
        let off_x = ((map.origin_x - self.origin_x) / self.resolution).round() as i64;
        let off_y = ((map.origin_y - self.origin_y) / self.resolution).round() as i64;

        for wy in 0..map.height as i64 {
            let gy = wy + off_y;
            if gy < 0 || gy >= self.size_y as i64 {
                continue;
            }
            for wx in 0..map.width as i64 {
                let gx = wx + off_x;
                if gx < 0 || gx >= self.size_x as i64 {
                    continue;
                }
                let Some(&raw) = map.data.get((wy * map.width as i64 + wx) as usize) else {
                    continue;
                };
                let value = self.interpret(raw);
                let idx = self.index(gx as u32, gy as u32);
                self.static_cells[idx] = value;
                self.cells[idx] = value;
            }
        }

        let sx = (off_x.max(0) as u32).min(self.size_x);
        let sy = (off_y.max(0) as u32).min(self.size_y);
        let ex = ((off_x + map.width as i64).max(0) as u32).min(self.size_x);
        let ey = ((off_y + map.height as i64).max(0) as u32).min(self.size_y);
        self.inflate_cells(sx, sy, ex, ey, true);
    }

    fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            size_x: self.size_x,
            size_y: self.size_y,
            resolution: self.resolution,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            cells: self.cells.clone(),
        }
    }

    fn window_snapshot(&self, ll_x: f32, ll_y: f32, size_x: f32, size_y: f32) -> GridSnapshot {
        let to_cell = |w: f32, origin: f32, limit: u32, round_up: bool| -> u32 {
            let c = (w - origin) / self.resolution;
            let c = if round_up { c.ceil() } else { c.floor() };
            (c.max(0.0) as u32).min(limit)
        };
        let sx = to_cell(ll_x, self.origin_x, self.size_x, false);
        let sy = to_cell(ll_y, self.origin_y, self.size_y, false);
        let ex = to_cell(ll_x + size_x, self.origin_x, self.size_x, true);
        let ey = to_cell(ll_y + size_y, self.origin_y, self.size_y, true);

        let w = ex.saturating_sub(sx);
        let h = ey.saturating_sub(sy);
        let mut cells = Vec::with_capacity(w as usize * h as usize);
        for my in sy..ey {
            for mx in sx..ex {
                cells.push(self.cells[self.index(mx, my)]);
            }
        }
        GridSnapshot {
            size_x: w,
            size_y: h,
            resolution: self.resolution,
            origin_x: self.origin_x + sx as f32 * self.resolution,
            origin_y: self.origin_y + sy as f32 * self.resolution,
            cells,
        }
    }

    fn size_in_cells_x(&self) -> u32 {
        self.size_x
    }

    fn size_in_cells_y(&self) -> u32 {
        self.size_y
    }

    fn size_in_meters_x(&self) -> f32 {
        self.size_x as f32 * self.resolution
    }

    fn size_in_meters_y(&self) -> f32 {
        self.size_y as f32 * self.resolution
    }

    fn resolution(&self) -> f32 {
        self.resolution
    }

    fn origin_x(&self) -> f32 {
        self.origin_x
    }

    fn origin_y(&self) -> f32 {
        self.origin_y
    }

    fn inscribed_radius(&self) -> f32 {
        self.inscribed
    }

    fn circumscribed_radius(&self) -> f32 {
        self.circumscribed
    }

    fn update_radii(&mut self, inscribed: f32, circumscribed: f32) {
        self.inscribed = inscribed;
        self.circumscribed = circumscribed;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// 10 x 10 cells at 0.1 m, origin at (0, 0), all free, no inflation.
    fn empty_seed() -> GridSeed {
        GridSeed {
            size_x_cells: 10,
            size_y_cells: 10,
            resolution: 0.1,
            origin_x: 0.0,
            origin_y: 0.0,
            data: None,
            default_cost: cost::FREE_SPACE,
            lethal_threshold: 100,
            unknown_cost_value: 255,
            inscribed_radius: 0.0,
            circumscribed_radius: 0.0,
            inflation_radius: 0.0,
        }
    }

    fn observation(origin: Point3, points: Vec<Point3>) -> Observation {
        Observation {
            origin,
            points,
            stamp: Utc::now(),
            obstacle_range: 2.5,
            raytrace_range: 3.0,
        }
    }

    fn set_cell(grid: &mut SimGrid, mx: u32, my: u32, value: u8) {
        let idx = grid.index(mx, my);
        grid.cells[idx] = value;
    }

    #[test]
    fn seed_without_data_starts_uniform() {
        let grid = SimGrid::from_seed(&empty_seed());
        assert_eq!(grid.size_in_cells_x(), 10);
        assert!((grid.size_in_meters_x() - 1.0).abs() < 1e-6);
        assert!(grid.snapshot().cells.iter().all(|&c| c == cost::FREE_SPACE));
    }

    #[test]
    fn seed_data_is_interpreted() {
        let mut seed = empty_seed();
        seed.size_x_cells = 2;
        seed.size_y_cells = 2;
        seed.default_cost = cost::NO_INFORMATION;
        seed.data = Some(vec![0, 100, 255, 40]);
        let grid = SimGrid::from_seed(&seed);
        assert_eq!(grid.cost_at(0, 0), Some(cost::FREE_SPACE));
        assert_eq!(grid.cost_at(1, 0), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at(0, 1), Some(cost::NO_INFORMATION));
        assert_eq!(grid.cost_at(1, 1), Some(cost::FREE_SPACE));
    }

    #[test]
    fn marking_respects_obstacle_range() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        let obs = observation(
            Point3::new(0.05, 0.05, 0.0),
            vec![
                Point3::new(0.55, 0.05, 0.0), // 0.5 m away, marked
                Point3::new(0.05, 0.95, 0.0), // 0.9 m away, marked
            ],
        );
        let far = Observation {
            obstacle_range: 0.3,
            ..observation(Point3::new(0.05, 0.05, 0.0), vec![Point3::new(0.55, 0.05, 0.0)])
        };

        grid.update_world(0.05, 0.05, &[obs], &[]);
        assert_eq!(grid.cost_at_world(0.55, 0.05), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at_world(0.05, 0.95), Some(cost::LETHAL_OBSTACLE));

        let mut grid2 = SimGrid::from_seed(&empty_seed());
        grid2.update_world(0.05, 0.05, &[far], &[]);
        assert_eq!(grid2.cost_at_world(0.55, 0.05), Some(cost::FREE_SPACE));
    }

    #[test]
    fn marking_inflates_new_obstacles() {
        let mut seed = empty_seed();
        seed.inscribed_radius = 0.1;
        seed.circumscribed_radius = 0.15;
        seed.inflation_radius = 0.2;
        let mut grid = SimGrid::from_seed(&seed);

        let obs = observation(
            Point3::new(0.05, 0.05, 0.0),
            vec![Point3::new(0.55, 0.55, 0.0)],
        );
        grid.update_world(0.05, 0.05, &[obs], &[]);
        assert_eq!(grid.cost_at(5, 5), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at(4, 5), Some(cost::INSCRIBED_INFLATED_OBSTACLE));
        assert_eq!(grid.cost_at(5, 6), Some(cost::INSCRIBED_INFLATED_OBSTACLE));
        assert_eq!(grid.cost_at(3, 5), Some(cost::FREE_SPACE));
    }

    #[test]
    fn clearing_rays_carve_free_space() {
        let mut seed = empty_seed();
        seed.default_cost = cost::NO_INFORMATION;
        let mut grid = SimGrid::from_seed(&seed);

        let obs = observation(
            Point3::new(0.05, 0.05, 0.0),
            vec![Point3::new(0.85, 0.05, 0.0)],
        );
        grid.update_world(0.05, 0.05, &[obs.clone()], &[obs]);

        // Cells along the ray are carved free; the endpoint is marked.
        assert_eq!(grid.cost_at_world(0.45, 0.05), Some(cost::FREE_SPACE));
        assert_eq!(grid.cost_at_world(0.85, 0.05), Some(cost::LETHAL_OBSTACLE));
        // Off-ray cells stay unknown.
        assert_eq!(grid.cost_at_world(0.45, 0.55), Some(cost::NO_INFORMATION));
    }

    #[test]
    fn origin_shift_preserves_overlap() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        grid.update_world(
            0.0,
            0.0,
            &[observation(
                Point3::new(0.05, 0.05, 0.0),
                vec![Point3::new(0.55, 0.55, 0.0)],
            )],
            &[],
        );
        assert_eq!(grid.cost_at(5, 5), Some(cost::LETHAL_OBSTACLE));

        grid.update_origin(0.2, 0.2);
        assert!((grid.origin_x() - 0.2).abs() < 1e-6);
        // The obstacle keeps its world position, two cells closer to the
        // new origin.
        assert_eq!(grid.cost_at(3, 3), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at_world(0.55, 0.55), Some(cost::LETHAL_OBSTACLE));
    }

    #[test]
    fn polygon_cost_requires_vertices_on_grid() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        let off = vec![
            Point3::new(0.1, 0.1, 0.0),
            Point3::new(5.0, 0.1, 0.0),
            Point3::new(0.1, 5.0, 0.0),
        ];
        assert!(!grid.set_convex_polygon_cost(&off, cost::LETHAL_OBSTACLE));
        assert!(grid.snapshot().cells.iter().all(|&c| c == cost::FREE_SPACE));
    }

    #[test]
    fn polygon_cost_fills_interior() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        let square = vec![
            Point3::new(0.2, 0.2, 0.0),
            Point3::new(0.7, 0.2, 0.0),
            Point3::new(0.7, 0.7, 0.0),
            Point3::new(0.2, 0.7, 0.0),
        ];
        assert!(grid.set_convex_polygon_cost(&square, cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at_world(0.45, 0.45), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at_world(0.85, 0.85), Some(cost::FREE_SPACE));
    }

    #[test]
    fn clear_non_lethal_keeps_lethal_and_unknown() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        set_cell(&mut grid, 4, 4, cost::LETHAL_OBSTACLE);
        set_cell(&mut grid, 5, 4, cost::INSCRIBED_INFLATED_OBSTACLE);
        set_cell(&mut grid, 6, 4, cost::NO_INFORMATION);

        grid.clear_non_lethal(0.5, 0.5, 1.0, 1.0, false);
        assert_eq!(grid.cost_at(4, 4), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at(5, 4), Some(cost::FREE_SPACE));
        assert_eq!(grid.cost_at(6, 4), Some(cost::NO_INFORMATION));

        grid.clear_non_lethal(0.5, 0.5, 1.0, 1.0, true);
        assert_eq!(grid.cost_at(6, 4), Some(cost::FREE_SPACE));
    }

    #[test]
    fn clear_non_lethal_ignores_offgrid_center() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        set_cell(&mut grid, 5, 4, cost::INSCRIBED_INFLATED_OBSTACLE);
        grid.clear_non_lethal(50.0, 50.0, 200.0, 200.0, true);
        assert_eq!(grid.cost_at(5, 4), Some(cost::INSCRIBED_INFLATED_OBSTACLE));
    }

    #[test]
    fn reinflation_paints_inscribed_ring() {
        let mut seed = empty_seed();
        seed.inscribed_radius = 0.1;
        seed.circumscribed_radius = 0.15;
        seed.inflation_radius = 0.2;
        let mut grid = SimGrid::from_seed(&seed);
        set_cell(&mut grid, 5, 5, cost::LETHAL_OBSTACLE);

        grid.reinflate_window(0.55, 0.55, 0.6, 0.6, false);
        assert_eq!(grid.reinflate_calls(), 1);
        assert_eq!(grid.cost_at(5, 5), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at(4, 5), Some(cost::INSCRIBED_INFLATED_OBSTACLE));
        assert_eq!(grid.cost_at(5, 6), Some(cost::INSCRIBED_INFLATED_OBSTACLE));
        // Beyond the inscribed radius nothing is painted.
        assert_eq!(grid.cost_at(8, 5), Some(cost::FREE_SPACE));
    }

    #[test]
    fn reset_outside_window_restores_static_layer() {
        let mut seed = empty_seed();
        seed.data = Some(vec![0; 100]);
        let mut grid = SimGrid::from_seed(&seed);
        set_cell(&mut grid, 1, 1, cost::LETHAL_OBSTACLE);
        set_cell(&mut grid, 5, 5, cost::LETHAL_OBSTACLE);

        // Window around (0.55, 0.55) keeps the second obstacle only.
        grid.reset_outside_window(0.55, 0.55, 0.3, 0.3);
        assert_eq!(grid.cost_at(1, 1), Some(cost::FREE_SPACE));
        assert_eq!(grid.cost_at(5, 5), Some(cost::LETHAL_OBSTACLE));
    }

    #[test]
    fn replace_full_map_adopts_geometry() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        let map = MapSnapshot {
            frame_id: "map".to_string(),
            stamp: Utc::now(),
            width: 4,
            height: 3,
            resolution: 0.5,
            origin_x: -1.0,
            origin_y: -1.0,
            origin_yaw: 0.0,
            data: vec![0, 0, 100, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        };
        grid.replace_full_map(&map);
        assert_eq!(grid.size_in_cells_x(), 4);
        assert_eq!(grid.size_in_cells_y(), 3);
        assert!((grid.origin_x() + 1.0).abs() < 1e-6);
        assert_eq!(grid.cost_at(2, 0), Some(cost::LETHAL_OBSTACLE));
    }

    #[test]
    fn static_window_merge_is_clipped() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        // 2 x 2 window whose left column falls off the grid.
        let map = MapSnapshot {
            frame_id: "map".to_string(),
            stamp: Utc::now(),
            width: 2,
            height: 2,
            resolution: 0.1,
            origin_x: -0.1,
            origin_y: 0.0,
            origin_yaw: 0.0,
            data: vec![100, 100, 100, 100],
        };
        grid.update_static_window(&map);
        assert_eq!(grid.cost_at(0, 0), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at(0, 1), Some(cost::LETHAL_OBSTACLE));
        assert_eq!(grid.cost_at(1, 0), Some(cost::FREE_SPACE));
    }

    #[test]
    fn window_snapshot_is_cell_aligned_and_clipped() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        set_cell(&mut grid, 2, 2, cost::LETHAL_OBSTACLE);

        // [0.15, 0.45] partially covers cells 1 through 4 on each axis.
        let snap = grid.window_snapshot(0.15, 0.15, 0.3, 0.3);
        assert_eq!(snap.size_x, 4);
        assert_eq!(snap.size_y, 4);
        assert!((snap.origin_x - 0.1).abs() < 1e-6);
        assert_eq!(snap.cost_at(1, 1), Some(cost::LETHAL_OBSTACLE));

        // Reaching past the edge clips to the grid.
        let clipped = grid.window_snapshot(0.85, 0.85, 1.0, 1.0);
        assert_eq!(clipped.size_x, 2);
        assert_eq!(clipped.size_y, 2);
    }

    #[test]
    fn update_radii_feeds_future_inflation() {
        let mut grid = SimGrid::from_seed(&empty_seed());
        set_cell(&mut grid, 5, 5, cost::LETHAL_OBSTACLE);
        grid.reinflate_window(0.55, 0.55, 0.4, 0.4, false);
        // No inscribed radius yet, nothing painted.
        assert_eq!(grid.cost_at(4, 5), Some(cost::FREE_SPACE));

        grid.update_radii(0.1, 0.15);
        assert!((grid.inscribed_radius() - 0.1).abs() < 1e-6);
        grid.reinflate_window(0.55, 0.55, 0.4, 0.4, false);
        assert_eq!(grid.cost_at(4, 5), Some(cost::INSCRIBED_INFLATED_OBSTACLE));
    }
}
