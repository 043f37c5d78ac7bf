//! Decomposition configuration.
//!
//! A [`Config`] is one immutable value passed explicitly to every stage.
//! Build it in code with [`Config::builder`], or load it from TOML/JSON:
//!
//! ```
//! use mesh_split::{Axis, Config};
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     output_dir = "parts"
//!     target_height = 24
//!     unit = "inches"
//!     height_axis = "Y"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.height_axis, Axis::Y);
//! assert!((config.target_height_mm() - 609.6).abs() < 1e-9);
//! assert_eq!(config.max_piece_size(), 295.0);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Principal axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Coordinate index (0, 1, 2).
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Axis> {
        Axis::ALL.get(index).copied()
    }

    /// The other two axes, in increasing order. They span planes normal to `self`.
    pub fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            _ => Err(ConfigError::InvalidAxis {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Axis {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Axis> for String {
    fn from(axis: Axis) -> Self {
        axis.as_str().to_string()
    }
}

/// Unit of [`Config::target_height`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    #[serde(alias = "ft", alias = "foot")]
    Feet,
    #[serde(alias = "in", alias = "inch")]
    Inches,
    #[serde(alias = "mm")]
    Millimeters,
    #[serde(alias = "m")]
    Meters,
}

impl Unit {
    /// Millimeters per unit.
    pub fn to_mm(self) -> f64 {
        match self {
            Unit::Feet => 304.8,
            Unit::Inches => 25.4,
            Unit::Millimeters => 1.0,
            Unit::Meters => 1000.0,
        }
    }
}

impl FromStr for Unit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feet" | "foot" | "ft" => Ok(Unit::Feet),
            "inches" | "inch" | "in" => Ok(Unit::Inches),
            "millimeters" | "mm" => Ok(Unit::Millimeters),
            "meters" | "m" => Ok(Unit::Meters),
            _ => Err(ConfigError::InvalidUnit {
                value: s.to_string(),
            }),
        }
    }
}

/// Which splitter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Cross-section guided grid, retried with a shrinking bed.
    Grid,
    /// Repeated midpoint bisection.
    Recursive,
    /// Grid attempts first, then one recursive attempt.
    #[default]
    Auto,
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(Strategy::Grid),
            "recursive" => Ok(Strategy::Recursive),
            "auto" => Ok(Strategy::Auto),
            _ => Err(ConfigError::InvalidStrategy {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Grid => "grid",
            Strategy::Recursive => "recursive",
            Strategy::Auto => "auto",
        })
    }
}

/// Dovetail connector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub enabled: bool,
    /// Peg width and height as a fraction of the smaller in-plane extent.
    pub size_fraction: f64,
    /// Peg depth as a fraction of the smaller extent along the cut axis.
    pub depth_fraction: f64,
    /// Socket enlargement factor on every dimension.
    pub clearance: f64,
    /// Cells per side of the placement search grid.
    pub grid_resolution: usize,
    pub radial_samples: usize,
    pub angular_samples: usize,
    /// Cut axes that get connectors. Empty means the height axis only.
    pub axes: Vec<Axis>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size_fraction: 0.08,
            depth_fraction: 0.10,
            clearance: 1.05,
            grid_resolution: 50,
            radial_samples: 10,
            angular_samples: 16,
            axes: Vec::new(),
        }
    }
}

mod defaults {
    use super::{Axis, ConnectorConfig};

    pub fn target_height() -> f64 {
        2.0
    }
    pub fn height_axis() -> Axis {
        Axis::Z
    }
    pub fn bed_size() -> f64 {
        300.0
    }
    pub fn safety_margin() -> f64 {
        5.0
    }
    pub fn cross_section_samples() -> usize {
        10
    }
    pub fn max_attempts() -> usize {
        3
    }
    pub fn bed_shrink_factor() -> f64 {
        0.95
    }
    pub fn volume_tolerance() -> f64 {
        0.01
    }
    pub fn min_volume_fraction() -> f64 {
        0.001
    }
    pub fn extremity_volume_fraction() -> f64 {
        0.0001
    }
    pub fn extremity_percentile() -> f64 {
        98.0
    }
    pub fn merge_tolerance() -> f64 {
        1e-6
    }
    pub fn parallel() -> bool {
        true
    }
    pub fn timeout_secs() -> u64 {
        900
    }
    pub fn connectors() -> ConnectorConfig {
        ConnectorConfig::default()
    }
}

/// Complete settings for one decomposition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target size along `height_axis`, in `unit`.
    #[serde(default = "defaults::target_height")]
    pub target_height: f64,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default = "defaults::height_axis")]
    pub height_axis: Axis,
    /// Printer bed edge length (mm).
    #[serde(default = "defaults::bed_size")]
    pub bed_size: f64,
    /// Subtracted from the bed size to get the largest allowed piece (mm).
    #[serde(default = "defaults::safety_margin")]
    pub safety_margin: f64,
    #[serde(default = "defaults::cross_section_samples")]
    pub cross_section_samples: usize,
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: usize,
    /// Bed size multiplier applied on each retry.
    #[serde(default = "defaults::bed_shrink_factor")]
    pub bed_shrink_factor: f64,
    /// Accepted |1 - ratio| between fragment and original volume.
    #[serde(default = "defaults::volume_tolerance")]
    pub volume_tolerance: f64,
    /// Fragments below this share of the total volume are dropped.
    #[serde(default = "defaults::min_volume_fraction")]
    pub min_volume_fraction: f64,
    /// Lower threshold for fragments holding extremity vertices.
    #[serde(default = "defaults::extremity_volume_fraction")]
    pub extremity_volume_fraction: f64,
    #[serde(default = "defaults::extremity_percentile")]
    pub extremity_percentile: f64,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "defaults::connectors")]
    pub connectors: ConnectorConfig,
    /// Run the repair path before decomposing.
    #[serde(default)]
    pub repair: bool,
    /// Vertex merge distance used by the repair path (mm).
    #[serde(default = "defaults::merge_tolerance")]
    pub merge_tolerance: f64,
    /// Split grid cells in parallel when the kernel allows it.
    #[serde(default = "defaults::parallel")]
    pub parallel: bool,
    /// Wall-clock budget for one decomposition.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
    pub output_dir: PathBuf,
}

impl Config {
    /// Start a builder with every default set.
    pub fn builder(output_dir: impl Into<PathBuf>) -> ConfigBuilder {
        ConfigBuilder {
            config: Config {
                target_height: defaults::target_height(),
                unit: Unit::default(),
                height_axis: defaults::height_axis(),
                bed_size: defaults::bed_size(),
                safety_margin: defaults::safety_margin(),
                cross_section_samples: defaults::cross_section_samples(),
                max_attempts: defaults::max_attempts(),
                bed_shrink_factor: defaults::bed_shrink_factor(),
                volume_tolerance: defaults::volume_tolerance(),
                min_volume_fraction: defaults::min_volume_fraction(),
                extremity_volume_fraction: defaults::extremity_volume_fraction(),
                extremity_percentile: defaults::extremity_percentile(),
                strategy: Strategy::default(),
                connectors: ConnectorConfig::default(),
                repair: false,
                merge_tolerance: defaults::merge_tolerance(),
                parallel: defaults::parallel(),
                timeout_secs: defaults::timeout_secs(),
                output_dir: output_dir.into(),
            },
        }
    }

    pub fn target_height_mm(&self) -> f64 {
        self.target_height * self.unit.to_mm()
    }

    /// Largest allowed piece dimension: bed size minus safety margin.
    pub fn max_piece_size(&self) -> f64 {
        self.bed_size - self.safety_margin
    }

    /// Axes that receive connectors.
    pub fn connector_axes(&self) -> Vec<Axis> {
        if self.connectors.axes.is_empty() {
            vec![self.height_axis]
        } else {
            self.connectors.axes.clone()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s).map_err(|e| ConfigError::Parse {
            format: "TOML",
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(s).map_err(|e| ConfigError::Parse {
            format: "JSON",
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            format: "TOML",
            details: e.to_string(),
        })
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            format: "JSON",
            details: e.to_string(),
        })
    }

    /// Check every field. Runs before any geometry work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("target_height", self.target_height)?;
        positive("bed_size", self.bed_size)?;
        if !self.safety_margin.is_finite() || self.safety_margin < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "safety_margin",
                value: self.safety_margin,
                min: 0.0,
                max: self.bed_size,
            });
        }
        if self.safety_margin >= self.bed_size {
            return Err(ConfigError::MarginExceedsBed {
                safety_margin: self.safety_margin,
                bed_size: self.bed_size,
            });
        }

        at_least("cross_section_samples", self.cross_section_samples, 2)?;
        at_least("max_attempts", self.max_attempts, 1)?;
        open_unit("bed_shrink_factor", self.bed_shrink_factor)?;
        open_unit("volume_tolerance", self.volume_tolerance)?;
        within("min_volume_fraction", self.min_volume_fraction, 0.0, 1.0)?;
        within(
            "extremity_volume_fraction",
            self.extremity_volume_fraction,
            0.0,
            1.0,
        )?;
        within("extremity_percentile", self.extremity_percentile, 0.0, 100.0)?;
        positive("merge_tolerance", self.merge_tolerance)?;
        positive("timeout_secs", self.timeout_secs as f64)?;

        let c = &self.connectors;
        open_unit("connectors.size_fraction", c.size_fraction)?;
        open_unit("connectors.depth_fraction", c.depth_fraction)?;
        within("connectors.clearance", c.clearance, 1.0, 2.0)?;
        at_least("connectors.grid_resolution", c.grid_resolution, 2)?;
        at_least("connectors.radial_samples", c.radial_samples, 1)?;
        at_least("connectors.angular_samples", c.angular_samples, 1)?;

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn within(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn open_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { field, value, min })
    }
}

/// Builder for [`Config`]. `build` validates.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn target_height(mut self, height: f64, unit: Unit) -> Self {
        self.config.target_height = height;
        self.config.unit = unit;
        self
    }

    pub fn height_axis(mut self, axis: Axis) -> Self {
        self.config.height_axis = axis;
        self
    }

    pub fn bed_size(mut self, bed_size: f64) -> Self {
        self.config.bed_size = bed_size;
        self
    }

    pub fn safety_margin(mut self, margin: f64) -> Self {
        self.config.safety_margin = margin;
        self
    }

    pub fn cross_section_samples(mut self, samples: usize) -> Self {
        self.config.cross_section_samples = samples;
        self
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn bed_shrink_factor(mut self, factor: f64) -> Self {
        self.config.bed_shrink_factor = factor;
        self
    }

    pub fn volume_tolerance(mut self, tolerance: f64) -> Self {
        self.config.volume_tolerance = tolerance;
        self
    }

    pub fn volume_thresholds(mut self, general: f64, extremity: f64) -> Self {
        self.config.min_volume_fraction = general;
        self.config.extremity_volume_fraction = extremity;
        self
    }

    pub fn extremity_percentile(mut self, percentile: f64) -> Self {
        self.config.extremity_percentile = percentile;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn connectors(mut self, connectors: ConnectorConfig) -> Self {
        self.config.connectors = connectors;
        self
    }

    pub fn repair(mut self, repair: bool) -> Self {
        self.config.repair = repair;
        self
    }

    pub fn merge_tolerance(mut self, tolerance: f64) -> Self {
        self.config.merge_tolerance = tolerance;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
