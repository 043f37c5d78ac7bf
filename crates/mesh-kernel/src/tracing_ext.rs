//! Tracing helpers for timing and mesh-state logging.
//!
//! Enable output by installing a subscriber in the application, e.g.
//! `RUST_LOG=mesh_kernel::timing=info` to see per-stage timings.
//!
//! # Log Levels
//!
//! - **INFO**: Stage summaries and timings
//! - **DEBUG**: Mesh state between stages
//! - **TRACE**: Per-call detail inside hot loops

use std::time::Instant;
use tracing::{Span, debug, info};

use crate::Mesh;

/// A performance timer that logs its duration on drop.
///
/// ```
/// use mesh_kernel::tracing_ext::OperationTimer;
///
/// {
///     let _timer = OperationTimer::new("load");
///     // ... do work ...
/// } // logs "Operation completed" with elapsed_ms
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("mesh_operation", operation = name);
        debug!(target: "mesh_kernel::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Timer whose span also records the size of the mesh being processed.
    pub fn with_mesh(name: &'static str, mesh: &Mesh) -> Self {
        let span = tracing::info_span!(
            "mesh_operation",
            operation = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count()
        );
        debug!(
            target: "mesh_kernel::timing",
            operation = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        info!(
            target: "mesh_kernel::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Operation completed"
        );
    }
}

/// Log vertex/face counts and dimensions at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let dims = mesh.aabb().map(|b| b.extents()).unwrap_or_default();

    debug!(
        target: "mesh_kernel::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.2} x {:.2} x {:.2}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_log_mesh_stats_on_empty_mesh() {
        log_mesh_stats(&Mesh::new(), "test");
    }
}
