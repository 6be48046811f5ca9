//! kitbuilder - container image build engine for integration kits
//!
//! A build is an ordered list of tasks. The builder task generates a maven
//! project, resolves its dependencies and lays out the image context by
//! running phase-ordered steps; the publishing tasks then turn that context
//! into an image through one of several strategies.
//!
//! # Core Concepts
//!
//! - **Steps**: Named actions registered under an ID and a numeric phase.
//!   The scheduler runs them in `(phase, registration order)` and stops at
//!   the first failure
//! - **Tasks**: Units of a build (builder, package, S2I, Kaniko, Jib,
//!   Spectrum, custom). Each one returns a [`api::BuildStatus`]
//! - **Incremental images**: A previously published image that already
//!   holds most of the required dependencies is reused as base image, so
//!   only the missing artifacts are layered on top
//! - **Queues**: Bounded single-worker queues that service build requests
//!   in arrival order
//!
//! # Example Usage
//!
//! ```no_run
//! use kitbuilder::api::Build;
//! use kitbuilder::builder::{run_build, StepRegistry, TaskEnv};
//! use kitbuilder::cluster::LocalCluster;
//! use kitbuilder::BuilderConfig;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(build: Build) -> anyhow::Result<()> {
//! let env = TaskEnv::new(
//!     build,
//!     Arc::new(LocalCluster::new()),
//!     Arc::new(BuilderConfig::default()),
//!     Arc::new(StepRegistry::with_defaults()?),
//! );
//!
//! let status = run_build(&env, &CancellationToken::new()).await;
//! println!("{} {}", status.phase, status.image);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`api`]: Build, task, artifact and catalog types
//! - [`builder`]: Step registry, scheduler, base image selection, tasks and queues
//! - [`cluster`]: Cluster operations used by the publishing tasks
//! - [`maven`]: Maven project model, settings and invocation

pub mod api;
pub mod builder;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod maven;
pub mod progress;
pub mod util;

// Re-export key types for convenient access
pub use api::{Artifact, Build, BuildPhase, BuildStatus, Task};
pub use builder::{StepRegistry, StepScheduler, TaskEnv};
pub use config::{BuilderConfig, ConfigError};
pub use error::BuildError;
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_kitbuilder() {
        assert_eq!(NAME, "kitbuilder");
    }
}
