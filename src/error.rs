//! Crate-wide build errors

use crate::cluster::{ClusterError, WaitError};
use crate::maven::MavenError;
use crate::util::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no base image defined")]
    MissingBaseImage,

    #[error("build interrupted")]
    Interrupted,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Maven(#[from] MavenError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Terminal failure reported by an external build mechanism
    #[error("{tool} failed: {message}")]
    External { tool: &'static str, message: String },

    #[error("image assembly failed: {0}")]
    Assemble(String),
}

impl BuildError {
    pub fn is_cancellation(&self) -> bool {
        match self {
            BuildError::Interrupted => true,
            BuildError::Wait(WaitError::Cancelled { .. }) => true,
            BuildError::Maven(e) => e.is_cancellation(),
            BuildError::Process(ProcessError::Cancelled { .. }) => true,
            _ => false,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn external(tool: &'static str, message: impl Into<String>) -> Self {
        Self::External {
            tool,
            message: message.into(),
        }
    }
}

/// True when any error in the chain represents a cancellation
pub fn is_interruption(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<BuildError>() {
            return e.is_cancellation();
        }
        if let Some(e) = cause.downcast_ref::<MavenError>() {
            return e.is_cancellation();
        }
        matches!(
            cause.downcast_ref::<WaitError>(),
            Some(WaitError::Cancelled { .. })
        ) || matches!(
            cause.downcast_ref::<ProcessError>(),
            Some(ProcessError::Cancelled { .. })
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_interruption_detected_through_context() {
        let err = Err::<(), _>(BuildError::Interrupted)
            .context("step builder/quarkus/BuildQuarkusRunner")
            .unwrap_err();
        assert!(is_interruption(&err));

        let err: anyhow::Error = WaitError::Cancelled {
            what: "pod kit-a-kaniko".to_string(),
        }
        .into();
        assert!(is_interruption(&err));
    }

    #[test]
    fn test_failures_are_not_interruptions() {
        let err: anyhow::Error = BuildError::MissingBaseImage.into();
        assert!(!is_interruption(&err));
        assert_eq!(err.to_string(), "no base image defined");

        let err = BuildError::external("kaniko", "pod kit-a-kaniko failed");
        assert!(!err.is_cancellation());
        assert_eq!(err.to_string(), "kaniko failed: pod kit-a-kaniko failed");
    }
}
