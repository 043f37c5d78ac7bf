//! Structured warnings surfaced alongside the output parts.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DecomposeError;

/// What went wrong. Serialized as a readable phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    #[serde(rename = "non-manifold edges detected")]
    NonManifoldEdges,
    #[serde(rename = "inconsistent face orientation")]
    InconsistentOrientation,
    #[serde(rename = "inverted normals")]
    InvertedNormals,
    #[serde(rename = "multiple components")]
    MultipleComponents,
    #[serde(rename = "repair failed")]
    RepairFailed,
    #[serde(rename = "grid cell failed")]
    CellFailed,
    #[serde(rename = "split step failed")]
    SplitFailed,
    #[serde(rename = "oversized fragment")]
    OversizedFragment,
    #[serde(rename = "connector skipped")]
    ConnectorSkipped,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WarningKind::NonManifoldEdges => "non-manifold edges detected",
            WarningKind::InconsistentOrientation => "inconsistent face orientation",
            WarningKind::InvertedNormals => "inverted normals",
            WarningKind::MultipleComponents => "multiple components",
            WarningKind::RepairFailed => "repair failed",
            WarningKind::CellFailed => "grid cell failed",
            WarningKind::SplitFailed => "split step failed",
            WarningKind::OversizedFragment => "oversized fragment",
            WarningKind::ConnectorSkipped => "connector skipped",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub details: String,
    pub suggestion: String,
}

impl Warning {
    pub fn new(kind: WarningKind, details: impl Into<String>, suggestion: impl Into<String>) -> Self {
        let warning = Self {
            kind,
            details: details.into(),
            suggestion: suggestion.into(),
        };
        warn!(kind = %warning.kind, details = %warning.details, "Decomposition warning");
        warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.details, self.suggestion)
    }
}

/// Write warnings as a JSON array.
pub fn write_warnings(warnings: &[Warning], path: &Path) -> Result<(), DecomposeError> {
    let json = serde_json::to_string_pretty(warnings)
        .map_err(|e| DecomposeError::io(path, std::io::Error::other(e)))?;
    std::fs::write(path, json).map_err(|e| DecomposeError::io(path, e))
}
