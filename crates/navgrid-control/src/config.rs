//! Controller configuration.
//!
//! Every knob the costmap controller exposes lives here, with defaults
//! matching a mid-size indoor robot. Configs are plain TOML:
//!
//! ```toml
//! global_frame = "map"
//! robot_base_frame = "base_link"
//! rolling_window = true
//! static_map = false
//!
//! [[sources]]
//! name = "base_laser"
//! kind = "laser_scan"
//! clearing = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use navgrid_types::{NavError, Point3};
use serde::{Deserialize, Serialize};

use navgrid_perception::footprint::pad_footprint;

/// Underlying grid representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    /// Voxel grid projected down to 2-D, able to track unknown space.
    #[default]
    Voxel,
    /// Flat 2-D costmap.
    Costmap,
}

/// Wire format a sensor source decodes from its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    PointCloud,
    LaserScan,
}

/// One sensor feed and the buffering policy applied to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Topic to subscribe to. Empty means "use the source name".
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// How long buffered observations stay usable, in seconds. Zero keeps
    /// only the most recent observation.
    #[serde(default)]
    pub observation_persistence: f32,
    /// Longest acceptable gap between two updates, in seconds. Zero
    /// disables the staleness check.
    #[serde(default)]
    pub expected_update_rate: f32,
    #[serde(default)]
    pub min_obstacle_height: f32,
    #[serde(default = "default_max_obstacle_height")]
    pub max_obstacle_height: f32,
    #[serde(default = "default_obstacle_range")]
    pub obstacle_range: f32,
    #[serde(default = "default_raytrace_range")]
    pub raytrace_range: f32,
    /// Whether this source's observations carve out free space.
    #[serde(default)]
    pub clearing: bool,
    /// Whether this source's observations mark obstacles.
    #[serde(default = "default_marking")]
    pub marking: bool,
}

impl SourceConfig {
    /// Source with the default buffering policy, marking but not clearing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: String::new(),
            kind: SourceKind::default(),
            observation_persistence: 0.0,
            expected_update_rate: 0.0,
            min_obstacle_height: 0.0,
            max_obstacle_height: default_max_obstacle_height(),
            obstacle_range: default_obstacle_range(),
            raytrace_range: default_raytrace_range(),
            clearing: false,
            marking: default_marking(),
        }
    }

    pub fn topic(&self) -> &str {
        if self.topic.is_empty() { &self.name } else { &self.topic }
    }
}

/// An auxiliary frame whose position is folded into the robot footprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub frame: String,
}

/// Full configuration for a [`CostmapController`](crate::CostmapController).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostmapConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_global_frame")]
    pub global_frame: String,
    #[serde(default = "default_robot_base_frame")]
    pub robot_base_frame: String,
    /// Oldest acceptable robot pose transform, in seconds.
    #[serde(default = "default_transform_tolerance")]
    pub transform_tolerance: f32,
    /// Map update rate in Hz. Zero disables the scheduled update task.
    #[serde(default = "default_update_frequency")]
    pub update_frequency: f32,
    /// Snapshot publication rate in Hz. Zero disables publication.
    #[serde(default)]
    pub publish_frequency: f32,
    /// Seed the grid from the first map received on `map_topic`.
    #[serde(default = "default_static_map")]
    pub static_map: bool,
    #[serde(default = "default_map_topic")]
    pub map_topic: String,
    /// Keep the grid centered on the robot instead of fixed in the world.
    #[serde(default)]
    pub rolling_window: bool,
    /// Grid width in meters, used when no static map seeds the grid.
    #[serde(default = "default_width")]
    pub width: f32,
    /// Grid height in meters, used when no static map seeds the grid.
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default = "default_resolution")]
    pub resolution: f32,
    #[serde(default)]
    pub origin_x: f32,
    #[serde(default)]
    pub origin_y: f32,
    #[serde(default)]
    pub map_type: MapType,
    /// Vertical cell count of the voxel grid.
    #[serde(default = "default_z_voxels")]
    pub z_voxels: u32,
    #[serde(default = "default_z_resolution")]
    pub z_resolution: f32,
    #[serde(default)]
    pub origin_z: f32,
    /// Voxel columns with at least this many unknown cells project to
    /// unknown. Defaults to `z_voxels`.
    #[serde(default)]
    pub unknown_threshold: Option<u32>,
    /// Voxel columns with more than this many marked cells project to
    /// lethal.
    #[serde(default)]
    pub mark_threshold: u32,
    /// Radius of the fallback circular footprint.
    #[serde(default = "default_robot_radius")]
    pub robot_radius: f32,
    #[serde(default = "default_inflation_radius")]
    pub inflation_radius: f32,
    /// Padding applied outward to every footprint vertex.
    #[serde(default = "default_footprint_padding")]
    pub footprint_padding: f32,
    /// Robot outline in the base frame, counter-clockwise. Empty means a
    /// circle of `robot_radius`.
    #[serde(default)]
    pub footprint: Vec<[f32; 2]>,
    /// Padding applied to points contributed by footprint providers.
    #[serde(default = "default_provider_padding")]
    pub provider_padding: f32,
    #[serde(default)]
    pub footprint_providers: Vec<ProviderConfig>,
    /// Static map occupancy at or above this value becomes a lethal cell.
    #[serde(default = "default_lethal_cost_threshold")]
    pub lethal_cost_threshold: u8,
    /// Static map value that stands for "unknown".
    #[serde(default = "default_unknown_cost_value")]
    pub unknown_cost_value: u8,
    /// Directory for per-cycle PGM dumps of the grid. Unset disables them.
    #[serde(default)]
    pub debug_dump_dir: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_name() -> String {
    "costmap".to_string()
}

fn default_global_frame() -> String {
    "map".to_string()
}

fn default_robot_base_frame() -> String {
    "base_link".to_string()
}

fn default_transform_tolerance() -> f32 {
    0.3
}

fn default_update_frequency() -> f32 {
    5.0
}

fn default_static_map() -> bool {
    true
}

fn default_map_topic() -> String {
    "map".to_string()
}

fn default_width() -> f32 {
    10.0
}

fn default_height() -> f32 {
    10.0
}

fn default_resolution() -> f32 {
    0.05
}

fn default_z_voxels() -> u32 {
    10
}

fn default_z_resolution() -> f32 {
    0.2
}

fn default_robot_radius() -> f32 {
    0.46
}

fn default_inflation_radius() -> f32 {
    0.55
}

fn default_footprint_padding() -> f32 {
    0.01
}

fn default_provider_padding() -> f32 {
    0.1
}

fn default_lethal_cost_threshold() -> u8 {
    100
}

fn default_unknown_cost_value() -> u8 {
    255
}

fn default_max_obstacle_height() -> f32 {
    2.0
}

fn default_obstacle_range() -> f32 {
    2.5
}

fn default_raytrace_range() -> f32 {
    3.0
}

fn default_marking() -> bool {
    true
}

impl Default for CostmapConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            global_frame: default_global_frame(),
            robot_base_frame: default_robot_base_frame(),
            transform_tolerance: default_transform_tolerance(),
            update_frequency: default_update_frequency(),
            publish_frequency: 0.0,
            static_map: default_static_map(),
            map_topic: default_map_topic(),
            rolling_window: false,
            width: default_width(),
            height: default_height(),
            resolution: default_resolution(),
            origin_x: 0.0,
            origin_y: 0.0,
            map_type: MapType::default(),
            z_voxels: default_z_voxels(),
            z_resolution: default_z_resolution(),
            origin_z: 0.0,
            unknown_threshold: None,
            mark_threshold: 0,
            robot_radius: default_robot_radius(),
            inflation_radius: default_inflation_radius(),
            footprint_padding: default_footprint_padding(),
            footprint: Vec::new(),
            provider_padding: default_provider_padding(),
            footprint_providers: Vec::new(),
            lethal_cost_threshold: default_lethal_cost_threshold(),
            unknown_cost_value: default_unknown_cost_value(),
            debug_dump_dir: None,
            sources: Vec::new(),
        }
    }
}

impl CostmapConfig {
    /// Parse a TOML document and validate the result.
    pub fn from_toml_str(raw: &str) -> Result<Self, NavError> {
        let config: Self =
            toml::from_str(raw).map_err(|err| NavError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load_from_path(path: &Path) -> Result<Self, NavError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Reject configurations the controller cannot start from.
    pub fn validate(&self) -> Result<(), NavError> {
        if self.resolution <= 0.0 {
            return Err(NavError::Config(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(NavError::Config(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.update_frequency < 0.0
            || self.publish_frequency < 0.0
            || self.transform_tolerance < 0.0
        {
            return Err(NavError::Config(
                "rates and tolerances must not be negative".to_string(),
            ));
        }
        if !self.footprint.is_empty() && self.footprint.len() < 3 {
            return Err(NavError::Config(format!(
                "a footprint needs at least three points, got {}",
                self.footprint.len()
            )));
        }
        if self.map_type == MapType::Voxel {
            if !(1..=16).contains(&self.z_voxels) {
                return Err(NavError::Config(format!(
                    "z_voxels must be between 1 and 16, got {}",
                    self.z_voxels
                )));
            }
            if self.z_resolution <= 0.0 {
                return Err(NavError::Config(format!(
                    "z_resolution must be positive, got {}",
                    self.z_resolution
                )));
            }
            if self.unknown_threshold() > self.z_voxels || self.mark_threshold > self.z_voxels {
                return Err(NavError::Config(
                    "voxel thresholds cannot exceed z_voxels".to_string(),
                ));
            }
        }
        for source in &self.sources {
            if source.name.is_empty() {
                return Err(NavError::Config("sources must be named".to_string()));
            }
            if source.min_obstacle_height > source.max_obstacle_height {
                return Err(NavError::Config(format!(
                    "source {}: min_obstacle_height exceeds max_obstacle_height",
                    source.name
                )));
            }
            if source.observation_persistence < 0.0 || source.expected_update_rate < 0.0 {
                return Err(NavError::Config(format!(
                    "source {}: durations must not be negative",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// The configured footprint, padded outward by `footprint_padding`.
    /// Empty when the robot falls back to a circle.
    pub fn padded_footprint(&self) -> Vec<Point3> {
        let points: Vec<Point3> = self
            .footprint
            .iter()
            .map(|[x, y]| Point3::new(*x, *y, 0.0))
            .collect();
        pad_footprint(&points, self.footprint_padding)
    }

    pub fn unknown_threshold(&self) -> u32 {
        self.unknown_threshold.unwrap_or(self.z_voxels)
    }

    pub fn update_period(&self) -> Option<Duration> {
        (self.update_frequency > 0.0).then(|| Duration::from_secs_f32(1.0 / self.update_frequency))
    }

    pub fn publish_period(&self) -> Option<Duration> {
        (self.publish_frequency > 0.0)
            .then(|| Duration::from_secs_f32(1.0 / self.publish_frequency))
    }

    pub fn transform_tolerance(&self) -> Duration {
        Duration::from_secs_f32(self.transform_tolerance)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_describe_a_static_global_costmap() {
        let config = CostmapConfig::default();
        assert_eq!(config.global_frame, "map");
        assert_eq!(config.robot_base_frame, "base_link");
        assert!(config.static_map);
        assert!(!config.rolling_window);
        assert_eq!(config.update_frequency, 5.0);
        assert_eq!(config.publish_frequency, 0.0);
        assert_eq!(config.resolution, 0.05);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config = CostmapConfig::from_toml_str("").unwrap();
        assert_eq!(config.name, "costmap");
        assert_eq!(config.map_topic, "map");
        assert!(config.sources.is_empty());
    }

    #[test]
    fn source_topic_defaults_to_its_name() {
        let raw = r#"
            [[sources]]
            name = "base_scan"
            kind = "laser_scan"
            clearing = true

            [[sources]]
            name = "tilt_cloud"
            topic = "tilt_scan_cloud"
        "#;
        let config = CostmapConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.sources[0].topic(), "base_scan");
        assert_eq!(config.sources[0].kind, SourceKind::LaserScan);
        assert!(config.sources[0].clearing);
        assert!(config.sources[0].marking);
        assert_eq!(config.sources[1].topic(), "tilt_scan_cloud");
        assert_eq!(config.sources[1].kind, SourceKind::PointCloud);
    }

    #[test]
    fn two_point_footprint_is_rejected() {
        let mut config = CostmapConfig::default();
        config.footprint = vec![[1.0, 0.0], [-1.0, 0.0]];
        assert!(matches!(config.validate(), Err(NavError::Config(_))));
    }

    #[test]
    fn voxel_thresholds_are_bounded() {
        let mut config = CostmapConfig::default();
        config.z_voxels = 0;
        assert!(config.validate().is_err());

        config.z_voxels = 10;
        config.unknown_threshold = Some(11);
        assert!(config.validate().is_err());

        config.unknown_threshold = None;
        config.mark_threshold = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_threshold_falls_back_to_z_voxels() {
        let mut config = CostmapConfig::default();
        assert_eq!(config.unknown_threshold(), 10);
        config.unknown_threshold = Some(3);
        assert_eq!(config.unknown_threshold(), 3);
    }

    #[test]
    fn zero_frequencies_disable_their_periods() {
        let mut config = CostmapConfig::default();
        config.update_frequency = 0.0;
        assert_eq!(config.update_period(), None);
        assert_eq!(config.publish_period(), None);

        config.update_frequency = 4.0;
        config.publish_frequency = 2.0;
        assert_eq!(config.update_period(), Some(Duration::from_secs_f32(0.25)));
        assert_eq!(config.publish_period(), Some(Duration::from_secs_f32(0.5)));
    }

    #[test]
    fn padded_footprint_grows_outward() {
        let mut config = CostmapConfig::default();
        config.footprint = vec![[1.0, 1.0], [-1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];
        config.footprint_padding = 0.1;
        let padded = config.padded_footprint();
        assert_eq!(padded.len(), 4);
        assert!((padded[0].x - 1.1).abs() < 1e-6);
        assert!((padded[2].y + 1.1).abs() < 1e-6);
    }

    #[test]
    fn load_from_path_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "name = \"local_costmap\"\nrolling_window = true\nstatic_map = false\nwidth = 6.0\nheight = 6.0\n"
        )
        .unwrap();

        let config = CostmapConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.name, "local_costmap");
        assert!(config.rolling_window);
        assert!(!config.static_map);
        assert_eq!(config.width, 6.0);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let missing = Path::new("/nonexistent/navgrid.toml");
        assert!(matches!(
            CostmapConfig::load_from_path(missing),
            Err(NavError::Io(_))
        ));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(matches!(
            CostmapConfig::from_toml_str("resolution = \"fast\""),
            Err(NavError::Config(_))
        ));
    }
}
