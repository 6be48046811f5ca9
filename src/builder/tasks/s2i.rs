use super::{conclude, nothing_to_build, reuse_base_image, BuildTask, TaskEnv};
use crate::api::{BuildStatus, S2iTask};
use crate::cluster::{
    wait_for, ImageStreamRequest, Probe, S2iBuild, S2iBuildConfig, S2iBuildPhase, WaitError,
};
use crate::error::BuildError;
use crate::util::fs::tar_gz_dir;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Binary S2I build: the context is uploaded as a tarball to a BuildConfig
/// that pushes into an image stream
pub struct S2iRunner {
    env: TaskEnv,
    task: S2iTask,
}

impl S2iRunner {
    pub fn new(env: TaskEnv, task: S2iTask) -> Self {
        Self { env, task }
    }

    fn tag(&self) -> &str {
        self.task.tag.as_deref().unwrap_or("latest")
    }

    async fn wait_completion(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<S2iBuild, BuildError> {
        let env = &self.env;
        let namespace = env.namespace().to_string();
        let cluster = env.cluster.clone();

        let waited = wait_for(
            &format!("s2i build {}", name),
            cancel,
            env.wait_timeout(),
            env.config.poll_interval,
            || {
                let cluster = cluster.clone();
                let namespace = namespace.clone();
                let name = name.to_string();
                async move {
                    let build = cluster.get_s2i_build(&namespace, &name).await?;
                    Ok(if build.phase.is_terminal() {
                        Probe::Done(build)
                    } else {
                        Probe::Continue
                    })
                }
            },
        )
        .await;

        match waited {
            Ok(build) => Ok(build),
            Err(e @ (WaitError::Cancelled { .. } | WaitError::Timeout { .. })) => {
                if let Err(cancel_err) = cluster.cancel_s2i_build(&namespace, name).await {
                    error!(build = name, error = %cancel_err, "Cannot cancel s2i build");
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn publish(
        &self,
        status: &mut BuildStatus,
        context_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), BuildError> {
        let env = &self.env;
        let namespace = env.namespace().to_string();
        let name = format!("kit-{}", env.build.name);

        env.cluster
            .replace_build_config(&S2iBuildConfig {
                name: name.clone(),
                namespace: namespace.clone(),
                image_stream: name.clone(),
                tag: self.tag().to_string(),
                labels: env.build.labels.clone(),
            })
            .await?;
        env.cluster
            .replace_image_stream(&ImageStreamRequest {
                name: name.clone(),
                namespace: namespace.clone(),
                labels: env.build.labels.clone(),
            })
            .await?;

        let archive = tar_gz_dir(context_dir).map_err(|e| BuildError::io(context_dir, e))?;
        let s2i_build = env
            .cluster
            .instantiate_binary(&namespace, &name, archive)
            .await?;
        info!(build = %env.build.name, s2i_build = %s2i_build, "Instantiated binary build");

        let build = self.wait_completion(&s2i_build, cancel).await?;
        if build.phase != S2iBuildPhase::Complete {
            let message = build
                .message
                .unwrap_or_else(|| format!("build {} ended in phase {:?}", build.name, build.phase));
            return Err(BuildError::external("s2i", message));
        }

        let repository = env
            .cluster
            .image_stream_repository(&namespace, &name)
            .await?
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                BuildError::external(
                    "s2i",
                    format!("dockerImageRepository not available in image stream {}", name),
                )
            })?;

        status.image = format!("{}:{}", repository, self.tag());
        status.digest = build.digest.unwrap_or_default();
        Ok(())
    }
}

#[async_trait]
impl BuildTask for S2iRunner {
    fn name(&self) -> &str {
        &self.task.name
    }

    async fn execute(&self, cancel: &CancellationToken) -> BuildStatus {
        let mut status = BuildStatus::initialize_from(&self.env.build.status, None);

        let context_dir = match self.env.resolve_dir(&self.task.context_dir) {
            Ok(dir) => dir,
            Err(e) => return conclude(status, Err(e)),
        };
        match nothing_to_build(&context_dir) {
            Ok(true) => return reuse_base_image(status, &self.env.build.name),
            Ok(false) => {}
            Err(e) => return conclude(status, Err(e)),
        }

        let result = self.publish(&mut status, &context_dir, cancel).await;
        conclude(status, result)
    }
}
