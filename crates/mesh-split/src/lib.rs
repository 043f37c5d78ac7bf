//! Bed-constrained mesh decomposition.
//!
//! Takes a closed triangle mesh, scales it to a physical target height and
//! splits it into parts that each fit a 3-D printer bed. Cuts are planned
//! per axis and pulled toward thin cross-sections; every attempt is
//! validated by volume conservation and a gap check before anything is
//! written. Optional dovetail connectors align neighbouring parts.
//!
//! # Pipeline
//!
//! 1. **Assess** - topology problems become structured [`Warning`]s
//! 2. **Repair** (optional) - merge, clean, fill, orient, keep largest shell
//! 3. **Scale** - move to the origin and scale to the target height
//! 4. **Analyze** - sample cross-section areas along each axis
//! 5. **Plan** - choose cut positions so no piece exceeds the bed
//! 6. **Split** - grid cells in parallel, or recursive bisection
//! 7. **Validate** - volume ratio and missing-neighbour gaps; retry on a
//!    smaller bed if rejected
//! 8. **Connect** (optional) - peg above the cut, socket below
//! 9. **Export** - `part_{n}.stl`, `manifest.json`, `warnings.json`
//!
//! All geometry goes through the [`GeometryKernel`] trait. [`NativeKernel`]
//! implements it on top of `mesh-kernel`.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_split::{Config, MeshSource, NativeKernel, Unit, decompose};
//!
//! let config = Config::builder("parts")
//!     .target_height(24.0, Unit::Inches)
//!     .bed_size(256.0)
//!     .build()?;
//!
//! let result = decompose(&NativeKernel, MeshSource::Path("statue.stl".into()), &config)?;
//! println!("{} parts, volume ratio {:.4}", result.parts.len(), result.volume_ratio);
//! # Ok::<(), mesh_split::DecomposeError>(())
//! ```

pub mod advisor;
pub mod analysis;
pub mod config;
pub mod connector;
pub mod deadline;
pub mod decompose;
pub mod error;
pub mod extremity;
pub mod fragment;
pub mod grid;
pub mod kernel;
pub mod plan;
pub mod recursive;
pub mod scale;
pub mod volume;
pub mod warning;

pub use advisor::{RepairReport, assess, repair};
pub use analysis::{AxisProfile, CrossSectionSample, analyze, sample_axis};
pub use config::{Axis, Config, ConfigBuilder, ConnectorConfig, Strategy, Unit};
pub use connector::{ConnectorKind, ConnectorSpec, add_connectors};
pub use deadline::Deadline;
pub use decompose::{
    Decomposition, DecompositionPlan, ExportedPart, MANIFEST_FILE, Manifest, MeshSource,
    WARNINGS_FILE, decompose, plan, read_manifest,
};
pub use error::{
    ConfigError, DecomposeError, GeometryError, KernelError, RepairFailure, SplitResult,
    ValidationFailure,
};
pub use extremity::ExtremityRegion;
pub use fragment::{Fragment, GridIndex};
pub use grid::{GridLayout, KeepThresholds, split_grid};
pub use kernel::{GeometryKernel, NativeKernel, SerializedKernel, TopologyReport};
pub use plan::{CutPlan, min_pieces, plan_axis, plan_cuts};
pub use recursive::split_recursive;
pub use scale::{Scaled, normalize, scale_factor};
pub use volume::{Gap, VolumeCheck, check_volume, find_gaps};
pub use warning::{Warning, WarningKind};
