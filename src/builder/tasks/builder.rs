use super::{BuildTask, TaskEnv};
use crate::api::{BuildStatus, BuilderTask};
use crate::builder::context::BuilderContext;
use crate::builder::scheduler::StepScheduler;
use crate::builder::steps::{default_build_steps, default_package_steps};
use crate::error::{is_interruption, BuildError};
use async_trait::async_trait;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs a step list through the registry and the scheduler. The package
/// flavour starts from the artifacts recorded by the previous task.
pub struct BuilderRunner {
    env: TaskEnv,
    task: BuilderTask,
    package: bool,
}

impl BuilderRunner {
    pub fn new(env: TaskEnv, task: BuilderTask, package: bool) -> Self {
        Self { env, task, package }
    }

    fn step_ids(&self) -> Vec<String> {
        match (self.task.steps.is_empty(), self.package) {
            (false, _) => self.task.steps.clone(),
            (true, false) => default_build_steps(),
            (true, true) => default_package_steps(),
        }
    }

    /// Build directory of the task, the shared work directory, or a fresh
    /// temporary directory living as long as the returned guard
    fn working_dir(&self) -> Result<(PathBuf, Option<TempDir>), BuildError> {
        if let Some(dir) = self.task.build_dir.as_deref().filter(|d| !d.is_empty()) {
            return Ok((PathBuf::from(dir), None));
        }
        if let Some(dir) = &self.env.work_dir {
            return Ok((dir.clone(), None));
        }
        let temp = tempfile::Builder::new()
            .prefix("builder-")
            .tempdir()
            .map_err(|e| BuildError::io(std::env::temp_dir(), e))?;
        Ok((temp.path().to_path_buf(), Some(temp)))
    }
}

#[async_trait]
impl BuildTask for BuilderRunner {
    fn name(&self) -> &str {
        &self.task.name
    }

    async fn execute(&self, cancel: &CancellationToken) -> BuildStatus {
        let env = &self.env;
        let mut status =
            BuildStatus::initialize_from(&env.build.status, self.task.base_image.as_deref());

        let steps = match env.registry.resolve(&self.step_ids()) {
            Ok(steps) => steps,
            Err(e) => {
                status.failed(e);
                return status.finish();
            }
        };

        let (path, _guard) = match self.working_dir() {
            Ok(dir) => dir,
            Err(e) => {
                status.errored(e);
                return status.finish();
            }
        };

        let mut ctx = BuilderContext::new(
            env.build.name.clone(),
            env.namespace().to_string(),
            path,
            self.task.clone(),
            env.cluster.clone(),
            env.config.clone(),
            cancel.clone(),
        );
        if ctx.base_image.is_empty() {
            status.errored(BuildError::MissingBaseImage);
            return status.finish();
        }
        if self.package {
            ctx.artifacts = env.build.status.artifacts.clone();
        }

        debug!(
            build = %ctx.build_name,
            task = %self.task.name,
            path = %ctx.path.display(),
            "Running builder task"
        );
        let scheduler = StepScheduler::new(env.progress.clone());
        let result = scheduler.run(&mut ctx, steps).await;

        status.base_image = ctx.base_image.clone();
        status.artifacts = ctx.artifacts.clone();
        match result {
            Ok(()) => {
                info!(
                    build = %ctx.build_name,
                    base_image = %ctx.base_image,
                    artifacts = ctx.artifacts.len(),
                    selected = ctx.selected_artifacts.len(),
                    "Builder task completed"
                );
                status.succeeded();
            }
            Err(err) => {
                let message = ctx.error.clone().unwrap_or_else(|| format!("{:#}", err));
                if is_interruption(&err) {
                    status.interrupted().error = message;
                } else {
                    status.failed(message);
                }
            }
        }
        status.finish()
    }
}
