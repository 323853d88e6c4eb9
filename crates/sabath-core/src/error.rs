//! Error taxonomy for the fetch, setup and run pipeline.

use std::path::PathBuf;

/// Kind of entity a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Model,
    Dataset,
}

impl EntityKind {
    /// Catalog subdirectory holding descriptors of this kind.
    pub fn catalog_dir(&self) -> &'static str {
        match self {
            EntityKind::Model => "models",
            EntityKind::Dataset => "datasets",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Model => write!(f, "model"),
            EntityKind::Dataset => write!(f, "dataset"),
        }
    }
}

/// SABATH errors.
#[derive(Debug, thiserror::Error)]
pub enum SabathError {
    #[error("unknown {kind} '{id}' (no descriptor at {path:?})")]
    UnknownEntity {
        kind: EntityKind,
        id: String,
        path: PathBuf,
    },

    #[error("command failed: {command}")]
    CommandFailed {
        command: String,
        cwd: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("failed to spawn command {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown acquisition type for '{id}' (had no 'git' or 'shell' keys)")]
    UnknownAcquisition { id: String },

    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SabathError {
    /// The failing command text, when this error came from a command.
    pub fn failed_command(&self) -> Option<&str> {
        match self {
            SabathError::CommandFailed { command, .. } | SabathError::Spawn { command, .. } => {
                Some(command)
            }
            _ => None,
        }
    }
}

/// Result type for SABATH operations.
pub type Result<T> = std::result::Result<T, SabathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display_carries_command() {
        let err = SabathError::CommandFailed {
            command: "make all".to_string(),
            cwd: PathBuf::from("/tmp"),
            exit_code: Some(2),
        };
        assert_eq!(err.to_string(), "command failed: make all");
        assert_eq!(err.failed_command(), Some("make all"));
    }

    #[test]
    fn test_unknown_entity_display() {
        let err = SabathError::UnknownEntity {
            kind: EntityKind::Model,
            id: "CloudMask-0".to_string(),
            path: PathBuf::from("db/models/CloudMask-0.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("unknown model"));
        assert!(msg.contains("CloudMask-0"));
    }

    #[test]
    fn test_unknown_acquisition_display() {
        let err = SabathError::UnknownAcquisition {
            id: "D1".to_string(),
        };
        assert!(err.to_string().contains("unknown acquisition type"));
        assert!(err.failed_command().is_none());
    }
}
