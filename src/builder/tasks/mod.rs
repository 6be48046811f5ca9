//! Task dispatch
//!
//! Every [`Task`] variant maps to one runner implementing [`BuildTask`].
//! A runner never fails: whatever happens is reported through the returned
//! [`BuildStatus`].

mod builder;
mod custom;
mod jib;
mod kaniko;
mod pod;
mod s2i;
mod spectrum;

pub use builder::BuilderRunner;
pub use custom::CustomRunner;
pub use jib::{jib_maven_args, JibRunner};
pub use kaniko::{kaniko_args, KanikoRunner};
pub use s2i::S2iRunner;
pub use spectrum::SpectrumRunner;

use crate::api::{Build, BuildPhase, BuildStatus, Task};
use crate::builder::assembler::{DockerAssembler, ImageAssembler};
use crate::builder::registry::StepRegistry;
use crate::cluster::ClusterClient;
use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::util::fs::directory_empty_except;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DOCKERFILE: &str = "Dockerfile";

#[async_trait]
pub trait BuildTask: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, cancel: &CancellationToken) -> BuildStatus;
}

/// Everything a runner needs besides its own task configuration
#[derive(Clone)]
pub struct TaskEnv {
    pub build: Build,
    pub cluster: Arc<dyn ClusterClient>,
    pub config: Arc<BuilderConfig>,
    pub registry: Arc<StepRegistry>,
    pub assembler: Arc<dyn ImageAssembler>,
    pub progress: Option<Arc<dyn ProgressHandler>>,
    /// Directory shared by the tasks of the build. Relative task
    /// directories resolve against it, or against the current directory
    /// when unset.
    pub work_dir: Option<PathBuf>,
}

impl TaskEnv {
    pub fn new(
        build: Build,
        cluster: Arc<dyn ClusterClient>,
        config: Arc<BuilderConfig>,
        registry: Arc<StepRegistry>,
    ) -> Self {
        Self {
            build,
            cluster,
            config,
            registry,
            assembler: Arc::new(DockerAssembler::new()),
            progress: None,
            work_dir: None,
        }
    }

    pub fn with_assembler(mut self, assembler: Arc<dyn ImageAssembler>) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = Some(handler);
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Namespace of the build, or the configured one
    pub fn namespace(&self) -> &str {
        if self.build.namespace.is_empty() {
            &self.config.namespace
        } else {
            &self.build.namespace
        }
    }

    /// Bound for a single external wait
    pub fn wait_timeout(&self) -> Duration {
        self.build
            .spec
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(self.config.wait_timeout)
    }

    pub fn resolve_dir(&self, dir: &str) -> Result<PathBuf, BuildError> {
        let path = Path::new(dir);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        match &self.work_dir {
            Some(root) => Ok(root.join(path)),
            None => std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .map_err(|e| BuildError::io(path, e)),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress {
            handler.on_progress(&event);
        }
    }
}

/// True when the context has nothing to add on top of the base image. A
/// generated Dockerfile alone is not content.
pub fn nothing_to_build(context_dir: &Path) -> Result<bool, BuildError> {
    directory_empty_except(context_dir, &[DOCKERFILE])
        .map_err(|e| BuildError::io(context_dir, e))
}

/// Reuses the base image unchanged
pub(crate) fn reuse_base_image(mut status: BuildStatus, build: &str) -> BuildStatus {
    if status.base_image.is_empty() {
        return conclude(status, Err(BuildError::MissingBaseImage));
    }
    status.image = status.base_image.clone();
    info!(build, image = %status.image, "No new image to build, reusing existing image");
    status.succeeded();
    status.finish()
}

/// Turns a runner outcome into a terminal status
pub(crate) fn conclude(mut status: BuildStatus, result: Result<(), BuildError>) -> BuildStatus {
    match result {
        Ok(()) => {
            status.succeeded();
        }
        Err(e) if e.is_cancellation() => {
            status.interrupted().error = e.to_string();
        }
        Err(e) => {
            status.failed(&e);
        }
    }
    status.finish()
}

pub fn new_task(env: &TaskEnv, task: &Task) -> Box<dyn BuildTask> {
    match task {
        Task::Builder(t) => Box::new(BuilderRunner::new(env.clone(), t.clone(), false)),
        Task::Package(t) => Box::new(BuilderRunner::new(env.clone(), t.clone(), true)),
        Task::S2i(t) => Box::new(S2iRunner::new(env.clone(), t.clone())),
        Task::Kaniko(t) => Box::new(KanikoRunner::new(env.clone(), t.clone())),
        Task::Jib(t) => Box::new(JibRunner::new(env.clone(), t.clone())),
        Task::Spectrum(t) => Box::new(SpectrumRunner::new(env.clone(), t.clone())),
        Task::Custom(t) => Box::new(CustomRunner::new(env.clone(), t.clone())),
    }
}

pub fn task_by_name(env: &TaskEnv, name: &str) -> Option<Box<dyn BuildTask>> {
    env.build.task_by_name(name).map(|task| new_task(env, task))
}

/// Runs the named task of the build. A name matching no task yields an
/// `Error` status.
pub async fn run_task(env: &TaskEnv, name: &str, cancel: &CancellationToken) -> BuildStatus {
    let Some(task) = task_by_name(env, name) else {
        let message = format!("missing task runner: build {} task {}", env.build.name, name);
        error!(build = %env.build.name, task = name, "{}", message);
        let mut status = BuildStatus::default();
        status.errored(message);
        return status;
    };

    env.emit(ProgressEvent::TaskStarted {
        build: env.build.name.clone(),
        task: name.to_string(),
    });
    let start = Instant::now();
    let status = task.execute(cancel).await;

    info!(
        build = %env.build.name,
        task = name,
        phase = %status.phase,
        image = %status.image,
        "Task finished"
    );
    env.emit(ProgressEvent::TaskComplete {
        build: env.build.name.clone(),
        task: name.to_string(),
        phase: status.phase.to_string(),
        duration: start.elapsed(),
    });
    status
}

/// Status seen by the next task: fields it left empty keep their previous
/// values
pub fn carry_over(previous: &BuildStatus, next: BuildStatus) -> BuildStatus {
    let keep = |value: String, prev: &String| if value.is_empty() { prev.clone() } else { value };
    BuildStatus {
        image: keep(next.image, &previous.image),
        base_image: keep(next.base_image, &previous.base_image),
        digest: keep(next.digest, &previous.digest),
        artifacts: if next.artifacts.is_empty() {
            previous.artifacts.clone()
        } else {
            next.artifacts
        },
        started_at: previous.started_at.or(next.started_at),
        ..next
    }
}

/// Runs every task of the build in order, stopping at the first one that
/// does not succeed
pub async fn run_build(env: &TaskEnv, cancel: &CancellationToken) -> BuildStatus {
    let mut env = env.clone();
    let names: Vec<String> = env
        .build
        .spec
        .tasks
        .iter()
        .map(|t| t.name().to_string())
        .collect();

    let mut status = BuildStatus::running();
    if names.is_empty() {
        warn!(build = %env.build.name, "Build has no tasks");
        status.succeeded();
        return status.finish();
    }

    for name in names {
        if cancel.is_cancelled() {
            status.interrupted();
            return status.finish();
        }

        let next = run_task(&env, &name, cancel).await;
        status = carry_over(&env.build.status, next);
        if status.phase != BuildPhase::Succeeded {
            return status;
        }
        env.build.status = status.clone();
    }
    status
}
