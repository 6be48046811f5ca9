use super::{conclude, nothing_to_build, reuse_base_image, BuildTask, TaskEnv};
use crate::api::{BuildStatus, SpectrumTask};
use crate::builder::assembler::AssembleRequest;
use crate::cluster::mount_registry_config;
use crate::error::BuildError;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Layers the context onto the base image in-process
pub struct SpectrumRunner {
    env: TaskEnv,
    task: SpectrumTask,
}

impl SpectrumRunner {
    pub fn new(env: TaskEnv, task: SpectrumTask) -> Self {
        Self { env, task }
    }

    async fn publish(
        &self,
        status: &mut BuildStatus,
        context_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), BuildError> {
        let env = &self.env;
        let publish = &self.task.publish;
        if status.base_image.is_empty() {
            return Err(BuildError::MissingBaseImage);
        }

        let registry_config = match &publish.registry.secret {
            Some(secret) => Some(
                mount_registry_config(env.cluster.as_ref(), env.namespace(), "spectrum-", secret)
                    .await?,
            ),
            None => None,
        };

        let request = AssembleRequest {
            context_dir: context_dir.to_path_buf(),
            base_image: status.base_image.clone(),
            target_image: publish.target_image(env.namespace(), &env.build.name),
            platforms: env.build.spec.configuration.image_platforms.clone(),
            insecure: publish.registry.insecure,
            config_dir: registry_config.as_ref().map(|d| d.path().to_path_buf()),
        };

        let digest = env.assembler.assemble(&request, cancel).await?;
        status.image = request.target_image;
        status.digest = digest;
        Ok(())
    }
}

#[async_trait]
impl BuildTask for SpectrumRunner {
    fn name(&self) -> &str {
        &self.task.publish.name
    }

    async fn execute(&self, cancel: &CancellationToken) -> BuildStatus {
        let mut status = BuildStatus::initialize_from(
            &self.env.build.status,
            self.task.publish.base_image.as_deref(),
        );

        let context_dir = match self.env.resolve_dir(&self.task.publish.context_dir) {
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
