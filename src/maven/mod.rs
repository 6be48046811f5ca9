//! Maven project generation, dependency mapping and invocation

pub mod command;
pub mod dependencies;
pub mod gav;
pub mod project;
pub mod settings;

pub use command::MavenContext;
pub use dependencies::{manage_integration_dependencies, sanitize_dependencies};
pub use gav::{parse_gav, Dependency, Exclusion, GavError};
pub use project::{create_structure, Project};

use crate::util::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MavenError {
    #[error(transparent)]
    Gav(#[from] GavError),

    #[error("unknown dependency type: {0}")]
    UnknownDependency(String),

    #[error("invalid dependency: {0}")]
    InvalidDependency(String),

    #[error("invalid maven settings: {0}")]
    InvalidSettings(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl MavenError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, MavenError::Process(ProcessError::Cancelled { .. }))
    }
}
