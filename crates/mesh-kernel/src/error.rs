//! Error types for kernel operations with rich diagnostics.
//!
//! Every error carries a machine-readable code in the format `MESH-XXXX`:
//! - `MESH-1xxx`: I/O errors (file reading, writing, parsing)
//! - `MESH-2xxx`: Validation errors (topology, coordinates)
//! - `MESH-3xxx`: Operation errors (repair, clipping, booleans)
//! - `MESH-4xxx`: Format errors
//!
//! ```
//! use mesh_kernel::{ErrorCode, MeshError};
//!
//! let err = MeshError::invalid_vertex_index(5, 100, 50);
//! assert_eq!(err.code(), ErrorCode::InvalidVertexIndex);
//! assert_eq!(err.code().as_str(), "MESH-2001");
//! ```

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kernel operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,
    /// MESH-1003: Failed to parse file contents
    ParseError = 1003,

    /// MESH-2001: Face references invalid vertex index
    InvalidVertexIndex = 2001,
    /// MESH-2002: Vertex has NaN or Infinity coordinate
    InvalidCoordinate = 2002,
    /// MESH-2003: Mesh has no vertices or faces
    EmptyMesh = 2003,

    /// MESH-3001: Repair operation failed
    RepairFailed = 3001,
    /// MESH-3002: Hole filling failed
    HoleFillFailed = 3002,
    /// MESH-3006: Boolean operation failed
    BooleanFailed = 3006,
    /// MESH-3007: Plane clipping failed
    ClipFailed = 3007,

    /// MESH-4001: Unsupported file format
    UnsupportedFormat = 4001,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "MESH-1001",
            ErrorCode::IoWrite => "MESH-1002",
            ErrorCode::ParseError => "MESH-1003",
            ErrorCode::InvalidVertexIndex => "MESH-2001",
            ErrorCode::InvalidCoordinate => "MESH-2002",
            ErrorCode::EmptyMesh => "MESH-2003",
            ErrorCode::RepairFailed => "MESH-3001",
            ErrorCode::HoleFillFailed => "MESH-3002",
            ErrorCode::BooleanFailed => "MESH-3006",
            ErrorCode::ClipFailed => "MESH-3007",
            ErrorCode::UnsupportedFormat => "MESH-4001",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for kernel errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export the file from the original software.
    ReexportFile { format: Option<String> },
    /// Run repair operations to fix the issue.
    RunRepair { operations: Vec<String> },
    /// Use a different file format.
    UseDifferentFormat { suggested: Vec<String> },
    /// Check the source mesh or environment.
    CheckSourceMesh { checks: Vec<String> },
    /// Manual intervention may be required.
    ManualIntervention { description: String },
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile { format } => {
                if let Some(fmt) = format {
                    write!(
                        f,
                        "Try re-exporting the mesh as {} from the original software",
                        fmt
                    )
                } else {
                    write!(f, "Try re-exporting the mesh from the original software")
                }
            }
            RecoverySuggestion::RunRepair { operations } => {
                write!(f, "Run repair operations: {}", operations.join(", "))
            }
            RecoverySuggestion::UseDifferentFormat { suggested } => {
                write!(f, "Try using a different format: {}", suggested.join(", "))
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Check the source mesh for: {}", checks.join(", "))
            }
            RecoverySuggestion::ManualIntervention { description } => {
                write!(f, "{}", description)
            }
        }
    }
}

/// Location information for kernel errors.
#[derive(Debug, Clone)]
pub enum MeshLocation {
    /// Error at a specific vertex.
    Vertex { index: usize },
    /// Error at a specific face.
    Face { index: usize },
    /// Error in a file.
    File { path: PathBuf },
    /// Error on a cutting plane.
    Plane { origin: [f64; 3], normal: [f64; 3] },
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshLocation::Vertex { index } => write!(f, "vertex {}", index),
            MeshLocation::Face { index } => write!(f, "face {}", index),
            MeshLocation::File { path } => write!(f, "{}", path.display()),
            MeshLocation::Plane { origin, normal } => write!(
                f,
                "plane through ({:.3}, {:.3}, {:.3}) with normal ({:.3}, {:.3}, {:.3})",
                origin[0], origin[1], origin[2], normal[0], normal[1], normal[2]
            ),
        }
    }
}

/// Errors that can occur during kernel operations.
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a mesh file.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file may be corrupted. Try re-exporting from the original software.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unsupported file format.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(code(mesh::format::unsupported), help("Supported formats: STL, OBJ"))]
    UnsupportedFormat { extension: Option<String> },

    /// Empty mesh (no vertices or faces).
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(mesh::validation::empty),
        help("The mesh must have at least one vertex and one face.")
    )]
    EmptyMesh { details: String },

    /// Invalid vertex index in face data.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(mesh::validation::vertex_index),
        help("Check the mesh export settings.")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Invalid coordinate value (NaN or Infinity).
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(mesh::validation::coordinate),
        help("Check for numerical issues in the source data.")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// Mesh repair failed.
    #[error("mesh repair failed: {details}")]
    #[diagnostic(
        code(mesh::repair::failed),
        help("Try running individual repair operations to identify the specific issue.")
    )]
    RepairFailed { details: String },

    /// Hole filling failed.
    #[error("hole filling failed: {details}")]
    #[diagnostic(
        code(mesh::repair::hole_fill),
        help("The hole boundary may be self-intersecting.")
    )]
    HoleFillFailed { details: String },

    /// Boolean operation failed.
    #[error("boolean {operation} failed: {details}")]
    #[diagnostic(
        code(mesh::boolean::failed),
        help("Ensure both meshes are watertight. Convex operands are required for intersection.")
    )]
    BooleanFailed { operation: String, details: String },

    /// Plane clipping failed.
    #[error("clipping by plane at offset {offset:.4} failed: {details}")]
    #[diagnostic(
        code(mesh::clip::failed),
        help("The cut may graze a degenerate region. Try repairing the mesh first.")
    )]
    ClipFailed {
        origin: [f64; 3],
        normal: [f64; 3],
        offset: f64,
        details: String,
    },
}

impl MeshError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            MeshError::IoRead { .. } => ErrorCode::IoRead,
            MeshError::IoWrite { .. } => ErrorCode::IoWrite,
            MeshError::ParseError { .. } => ErrorCode::ParseError,
            MeshError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            MeshError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            MeshError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            MeshError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            MeshError::RepairFailed { .. } => ErrorCode::RepairFailed,
            MeshError::HoleFillFailed { .. } => ErrorCode::HoleFillFailed,
            MeshError::BooleanFailed { .. } => ErrorCode::BooleanFailed,
            MeshError::ClipFailed { .. } => ErrorCode::ClipFailed,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            MeshError::IoWrite { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            MeshError::ParseError { .. } => RecoverySuggestion::ReexportFile {
                format: Some("binary STL".into()),
            },
            MeshError::UnsupportedFormat { .. } => RecoverySuggestion::UseDifferentFormat {
                suggested: vec!["STL".into(), "OBJ".into()],
            },
            MeshError::EmptyMesh { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["mesh has geometry".into(), "correct export settings".into()],
            },
            MeshError::ClipFailed { .. } => RecoverySuggestion::RunRepair {
                operations: vec![
                    "merge_vertices".into(),
                    "fill_holes".into(),
                    "fix_normals".into(),
                ],
            },
            MeshError::InvalidVertexIndex { .. } | MeshError::InvalidCoordinate { .. } => {
                RecoverySuggestion::ReexportFile { format: None }
            }
            MeshError::RepairFailed { .. } | MeshError::HoleFillFailed { .. } => {
                RecoverySuggestion::ManualIntervention {
                    description: "Repair the mesh in a 3D editor before decomposing".into(),
                }
            }
            MeshError::BooleanFailed { .. } => RecoverySuggestion::RunRepair {
                operations: vec!["repair both meshes".into()],
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<MeshLocation> {
        match self {
            MeshError::InvalidVertexIndex { face_index, .. } => {
                Some(MeshLocation::Face { index: *face_index })
            }
            MeshError::InvalidCoordinate { vertex_index, .. } => Some(MeshLocation::Vertex {
                index: *vertex_index,
            }),
            MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. }
            | MeshError::ParseError { path, .. } => {
                Some(MeshLocation::File { path: path.clone() })
            }
            MeshError::ClipFailed { origin, normal, .. } => Some(MeshLocation::Plane {
                origin: *origin,
                normal: *normal,
            }),
            _ => None,
        }
    }

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidVertexIndex error.
    pub fn invalid_vertex_index(face_index: usize, vertex_index: u32, vertex_count: usize) -> Self {
        MeshError::InvalidVertexIndex {
            face_index,
            vertex_index,
            vertex_count,
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        MeshError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create a RepairFailed error.
    pub fn repair_failed(details: impl Into<String>) -> Self {
        MeshError::RepairFailed {
            details: details.into(),
        }
    }

    /// Create a HoleFillFailed error.
    pub fn hole_fill_failed(details: impl Into<String>) -> Self {
        MeshError::HoleFillFailed {
            details: details.into(),
        }
    }

    /// Create a BooleanFailed error.
    pub fn boolean_failed(operation: impl Into<String>, details: impl Into<String>) -> Self {
        MeshError::BooleanFailed {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Create a ClipFailed error for the given plane.
    pub fn clip_failed(plane: &crate::Plane, details: impl Into<String>) -> Self {
        MeshError::ClipFailed {
            origin: [plane.origin.x, plane.origin.y, plane.origin.z],
            normal: [plane.normal.x, plane.normal.y, plane.normal.z],
            offset: plane.origin.coords.dot(&plane.normal),
            details: details.into(),
        }
    }

    /// Create an UnsupportedFormat error.
    pub fn unsupported_format(extension: Option<String>) -> Self {
        MeshError::UnsupportedFormat { extension }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Plane;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_error_codes() {
        let err = MeshError::invalid_vertex_index(5, 100, 50);
        assert_eq!(err.code(), ErrorCode::InvalidVertexIndex);
        assert_eq!(err.code().as_str(), "MESH-2001");
        assert_eq!(
            MeshError::boolean_failed("intersect", "x").code().as_str(),
            "MESH-3006"
        );
    }

    #[test]
    fn test_clip_failed_carries_plane() {
        let plane = Plane::new(Point3::new(0.0, 0.0, 12.5), Vector3::z());
        let err = MeshError::clip_failed(&plane, "open cap loop");
        assert_eq!(err.code(), ErrorCode::ClipFailed);
        match err.location() {
            Some(MeshLocation::Plane { origin, normal }) => {
                assert_eq!(origin[2], 12.5);
                assert_eq!(normal, [0.0, 0.0, 1.0]);
            }
            other => panic!("expected plane location, got {:?}", other),
        }
        assert!(err.to_string().contains("12.5000"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = MeshError::clip_failed(&Plane::axis_aligned(0, 1.0, true), "open cap loop");
        match err.recovery_suggestion() {
            RecoverySuggestion::RunRepair { operations } => {
                assert!(!operations.is_empty());
            }
            other => panic!("Expected RunRepair suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let err = MeshError::invalid_vertex_index(5, 100, 50);
        let display = format!("{}", err);
        assert!(display.contains("face 5"));
        assert!(display.contains("vertex 100"));
        assert!(display.contains("50 vertices"));
    }
}
