//! Error taxonomy for the export pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::vertex::{Semantic, VertexSlot};

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised while building, packing or writing an asset.
///
/// Everything except [`ExportError::ArtifactWrites`] is raised on the first
/// violation; no partially built buffers escape.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Malformed input delivered by the scene traversal
    #[error("invalid input in '{context}': {message}")]
    InvalidInput { context: String, message: String },

    /// A corner produced a dedup key with no components (empty slot mask)
    #[error("vertex key for corner {corner} has no components (empty slot usage)")]
    EmptyVertexKey { corner: usize },

    /// More attribute slots than fit into the 64-bit usage mask
    #[error("mesh '{mesh}' uses {count} vertex slots, at most 64 are supported")]
    TooManySlots { mesh: String, count: usize },

    /// Flat component array whose length is not a multiple of the semantic dimension
    #[error("{semantic:?} set {set_index} has {len} components, not a multiple of {dimension}")]
    ComponentCount {
        semantic: Semantic,
        set_index: u32,
        len: usize,
        dimension: usize,
    },

    /// Element index pointing past the end of its component array
    #[error("corner {corner} references element {index} of {slot}, which has {available} elements")]
    IndexOutOfRange {
        corner: usize,
        slot: VertexSlot,
        index: u32,
        available: usize,
    },

    /// `pack_accessors` called on an asset that was already packed
    #[error("accessors have already been packed for this asset")]
    AlreadyPacked,

    /// File system failure, always carrying the offending path
    #[error("I/O failure on '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// One or more loose artifacts failed to write; the others were still attempted
    #[error("{} artifact(s) failed to write: {}", failed.len(), display_paths(failed))]
    ArtifactWrites { failed: Vec<PathBuf> },
}

impl ExportError {
    /// Shorthand for [`ExportError::InvalidInput`]
    pub fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path being accessed
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = ExportError::io(
            "out/scene.glb",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("out/scene.glb"));
    }

    #[test]
    fn test_artifact_writes_lists_every_path() {
        let err = ExportError::ArtifactWrites {
            failed: vec![PathBuf::from("a.png"), PathBuf::from("b.bin")],
        };
        let message = err.to_string();
        assert!(message.starts_with("2 artifact(s)"));
        assert!(message.contains("'a.png'"));
        assert!(message.contains("'b.bin'"));
    }
}
