//! Error types for the decomposition engine.
//!
//! One enum per failure kind, plus [`DecomposeError`] which wraps them for
//! the top-level call:
//!
//! - [`ConfigError`]: bad configuration, fatal before any geometry work
//! - [`GeometryError`]: kernel load/boolean/slice/export failures
//! - [`ValidationFailure`]: a decomposition attempt was rejected
//! - [`RepairFailure`]: the explicit repair path could not produce a mesh
//!
//! Every variant carries the numbers needed to report it, so callers can
//! match on variants instead of messages.

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::Axis;
use crate::fragment::GridIndex;

/// Boxed error coming out of a [`GeometryKernel`](crate::GeometryKernel).
pub type KernelError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for top-level engine calls.
pub type SplitResult<T> = Result<T, DecomposeError>;

/// Invalid configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid height axis {value:?}")]
    #[diagnostic(code(split::config::axis), help("Use one of: x, y, z"))]
    InvalidAxis { value: String },

    #[error("invalid unit {value:?}")]
    #[diagnostic(
        code(split::config::unit),
        help("Use one of: feet, inches, millimeters, meters")
    )]
    InvalidUnit { value: String },

    #[error("invalid strategy {value:?}")]
    #[diagnostic(code(split::config::strategy), help("Use one of: grid, recursive, auto"))]
    InvalidStrategy { value: String },

    #[error("{field} must be positive, got {value}")]
    #[diagnostic(code(split::config::non_positive))]
    NonPositive { field: &'static str, value: f64 },

    #[error("safety margin {safety_margin} mm leaves no room on a {bed_size} mm bed")]
    #[diagnostic(
        code(split::config::margin),
        help("The safety margin must be smaller than the bed size")
    )]
    MarginExceedsBed { safety_margin: f64, bed_size: f64 },

    #[error("{field} must be within [{min}, {max}], got {value}")]
    #[diagnostic(code(split::config::range))]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be at least {min}, got {value}")]
    #[diagnostic(code(split::config::count))]
    TooSmall {
        field: &'static str,
        value: usize,
        min: usize,
    },

    #[error("failed to parse {format} configuration: {details}")]
    #[diagnostic(code(split::config::parse))]
    Parse { format: &'static str, details: String },

    #[error("unsupported configuration file {path}")]
    #[diagnostic(code(split::config::format), help("Use a .toml or .json file"))]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read configuration from {path}")]
    #[diagnostic(code(split::config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kernel-level failure while loading, cutting or exporting geometry.
#[derive(Debug, Error, Diagnostic)]
pub enum GeometryError {
    #[error("failed to load mesh from {path}")]
    #[diagnostic(
        code(split::geometry::load),
        help("Check that the file exists and is a valid STL or OBJ")
    )]
    Load {
        path: PathBuf,
        #[source]
        source: KernelError,
    },

    #[error("failed to export mesh to {path}")]
    #[diagnostic(code(split::geometry::export))]
    Export {
        path: PathBuf,
        #[source]
        source: KernelError,
    },

    #[error("mesh has no extent along {axis} (extent {extent})")]
    #[diagnostic(
        code(split::geometry::zero_extent),
        help("A flat mesh cannot be scaled to a height along this axis")
    )]
    ZeroExtent { axis: Axis, extent: f64 },

    #[error("mesh is empty or encloses no volume (volume {volume})")]
    #[diagnostic(
        code(split::geometry::empty),
        help("Run `mesh-split check` to inspect the mesh")
    )]
    EmptyMesh { volume: f64 },

    #[error("slicing along {axis} at {position:.3} failed")]
    #[diagnostic(code(split::geometry::slice))]
    Slice {
        axis: Axis,
        position: f64,
        #[source]
        source: KernelError,
    },

    #[error("intersection with grid cell {index} failed")]
    #[diagnostic(code(split::geometry::intersect))]
    Intersect {
        index: GridIndex,
        #[source]
        source: KernelError,
    },

    #[error("boolean {operation} for fragment {index} failed")]
    #[diagnostic(code(split::geometry::boolean))]
    Boolean {
        operation: &'static str,
        index: GridIndex,
        #[source]
        source: KernelError,
    },
}

/// A decomposition attempt was rejected.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ValidationFailure {
    #[error(
        "volume mismatch: fragments hold {total:.3} of {original:.3} (ratio {ratio:.4}, tolerance {tolerance})"
    )]
    #[diagnostic(code(split::validation::volume))]
    VolumeMismatch {
        original: f64,
        total: f64,
        ratio: f64,
        tolerance: f64,
    },

    #[error("{count} gap(s) between grid cells, first at {missing} next to {from}")]
    #[diagnostic(code(split::validation::gap))]
    GapsDetected {
        count: usize,
        from: GridIndex,
        missing: GridIndex,
    },

    #[error("piece {piece} along {axis} is {length:.3} mm, larger than {max:.3} mm")]
    #[diagnostic(code(split::validation::interval))]
    OversizedInterval {
        axis: Axis,
        piece: usize,
        length: f64,
        max: f64,
    },

    #[error("decomposition produced no fragments")]
    #[diagnostic(code(split::validation::empty))]
    NoFragments,
}

/// The explicit repair path failed.
#[derive(Debug, Error, Diagnostic)]
pub enum RepairFailure {
    #[error("repair removed all {faces_before} faces")]
    #[diagnostic(
        code(split::repair::empty),
        help("The mesh may be too damaged to repair automatically")
    )]
    EmptyResult { faces_before: usize },

    #[error("repair step '{step}' failed")]
    #[diagnostic(code(split::repair::kernel))]
    Kernel {
        step: &'static str,
        #[source]
        source: KernelError,
    },
}

/// Error returned by [`decompose`](crate::decompose).
#[derive(Debug, Error, Diagnostic)]
pub enum DecomposeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Repair(#[from] RepairFailure),

    #[error("no valid decomposition found after {attempts} attempt(s): {last}")]
    #[diagnostic(
        code(split::no_valid_decomposition),
        help("Try a larger bed, a smaller target height, or repair the mesh first")
    )]
    NoValidDecomposition {
        attempts: usize,
        last: ValidationFailure,
    },

    #[error("decomposition exceeded its budget of {budget:?} after {elapsed:?} ({exported} part(s) exported)")]
    #[diagnostic(
        code(split::timeout),
        help("Already exported parts are left in the output directory")
    )]
    Timeout {
        elapsed: Duration,
        budget: Duration,
        exported: usize,
    },

    #[error("failed to write {path}")]
    #[diagnostic(code(split::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DecomposeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DecomposeError::Io {
            path: path.into(),
            source,
        }
    }
}
