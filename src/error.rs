use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::publish::PublishError;

/// Everything that can abandon an ingestion job.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("workspace I/O error: {0}")]
    Workspace(#[from] std::io::Error),
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with status {status}")]
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
    },
    #[error("expected artifact missing: {}", path.display())]
    MissingArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("{name} exceeds the {limit} byte limit")]
    Oversized { name: String, limit: u64 },
    #[error("completion channel closed")]
    ChannelClosed,
}
