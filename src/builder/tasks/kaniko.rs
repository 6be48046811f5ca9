use super::pod::run_pod;
use super::{conclude, nothing_to_build, reuse_base_image, BuildTask, TaskEnv};
use crate::api::{BuildStatus, KanikoTask};
use crate::builder::steps::image::jvm_dockerfile;
use crate::cluster::{PodRequest, Volume, VolumeSource};
use crate::error::BuildError;
use crate::util::fs::write_file_with_content;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const WORKSPACE: &str = "/workspace";
const DOCKER_CONFIG_DIR: &str = "/kaniko/.docker";
const CACHE_DIR: &str = "/kaniko/cache";

/// Executor arguments for one build
pub fn kaniko_args(task: &KanikoTask, image: &str, platforms: &[String]) -> Vec<String> {
    let mut args = vec![
        "--dockerfile=Dockerfile".to_string(),
        format!("--context=dir://{}", WORKSPACE),
        format!("--destination={}", image),
        "--digest-file=/dev/termination-log".to_string(),
    ];

    if task.cache.enabled {
        args.push("--cache=true".to_string());
        args.push(format!("--cache-dir={}", CACHE_DIR));
    }
    if task.publish.registry.insecure {
        args.push("--insecure".to_string());
        args.push("--insecure-pull".to_string());
    }
    if task.verbose {
        args.push("-v=debug".to_string());
    }
    // the executor builds for a single platform
    if let [platform] = platforms {
        args.push(format!("--custom-platform={}", platform));
    }
    args
}

/// Builds the context with a one-shot Kaniko executor pod
pub struct KanikoRunner {
    env: TaskEnv,
    task: KanikoTask,
}

impl KanikoRunner {
    pub fn new(env: TaskEnv, task: KanikoTask) -> Self {
        Self { env, task }
    }

    fn pod(&self, context_dir: &Path, image: &str) -> PodRequest {
        let env = &self.env;
        let mut volumes = vec![Volume {
            name: "kaniko-context".to_string(),
            source: VolumeSource::HostPath(context_dir.to_path_buf()),
            mount_path: WORKSPACE.to_string(),
        }];

        if let Some(secret) = &self.task.publish.registry.secret {
            volumes.push(Volume {
                name: "kaniko-secret".to_string(),
                source: VolumeSource::Secret {
                    name: secret.clone(),
                    items: vec![(".dockerconfigjson".to_string(), "config.json".to_string())],
                },
                mount_path: DOCKER_CONFIG_DIR.to_string(),
            });
        }

        if let (true, Some(claim)) = (
            self.task.cache.enabled,
            self.task.cache.persistent_volume_claim.as_ref(),
        ) {
            volumes.push(Volume {
                name: "kaniko-cache".to_string(),
                source: VolumeSource::PersistentVolumeClaim(claim.clone()),
                mount_path: CACHE_DIR.to_string(),
            });
        }

        PodRequest {
            name: format!("kit-{}-kaniko", env.build.name),
            namespace: env.namespace().to_string(),
            image: env.config.kaniko_image.clone(),
            args: kaniko_args(&self.task, image, &env.build.spec.configuration.image_platforms),
            volumes,
            labels: env.build.labels.clone(),
            ..Default::default()
        }
    }

    async fn publish(
        &self,
        status: &mut BuildStatus,
        context_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), BuildError> {
        if status.base_image.is_empty() {
            return Err(BuildError::MissingBaseImage);
        }
        if !context_dir.join("Dockerfile").exists() {
            write_file_with_content(
                context_dir,
                "Dockerfile",
                jvm_dockerfile(&status.base_image).as_bytes(),
            )
            .map_err(|e| BuildError::io(context_dir, e))?;
        }

        let image = self
            .task
            .publish
            .target_image(self.env.namespace(), &self.env.build.name);
        let pod = self.pod(context_dir, &image);
        debug!(pod = %pod.name, args = ?pod.args, "Kaniko pod");

        let digest = run_pod(&self.env, "kaniko", &pod, cancel).await?;
        status.image = image;
        status.digest = digest.unwrap_or_default();
        Ok(())
    }
}

#[async_trait]
impl BuildTask for KanikoRunner {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{KanikoCache, PublishTask, RegistrySpec};

    #[test]
    fn test_args() {
        let task = KanikoTask {
            publish: PublishTask {
                registry: RegistrySpec {
                    insecure: true,
                    ..Default::default()
                },
                ..Default::default()
            },
            cache: KanikoCache {
                enabled: true,
                persistent_volume_claim: None,
            },
            verbose: false,
        };

        let args = kaniko_args(&task, "registry:5000/ns/kit-a:latest", &["linux/arm64".to_string()]);
        assert_eq!(args[2], "--destination=registry:5000/ns/kit-a:latest");
        assert!(args.contains(&"--cache=true".to_string()));
        assert!(args.contains(&"--insecure".to_string()));
        assert!(args.contains(&"--custom-platform=linux/arm64".to_string()));
        assert!(!args.contains(&"-v=debug".to_string()));

        let args = kaniko_args(&KanikoTask::default(), "img", &[]);
        assert_eq!(args.len(), 4);
    }
}
