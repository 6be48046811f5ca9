use super::{conclude, nothing_to_build, reuse_base_image, BuildTask, TaskEnv};
use crate::api::{BuildStatus, JibTask};
use crate::builder::context::MAVEN_DIR;
use crate::cluster::mount_registry_config;
use crate::error::BuildError;
use crate::util::run_and_log;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const JIB_GOAL: &str = "jib:build";
const JIB_DIGEST_FILE: &str = "target/jib-image.digest";

/// Maven arguments containerizing the project in `maven_dir`
pub fn jib_maven_args(
    maven_dir: &Path,
    image: &str,
    base_image: &str,
    insecure: bool,
    platforms: &[String],
) -> Vec<String> {
    let mut args = vec![
        JIB_GOAL.to_string(),
        "-Djib.disableUpdateChecks=true".to_string(),
        "-P".to_string(),
        "jib".to_string(),
        format!("-Djib.to.image={}", image),
        format!("-Djib.from.image={}", base_image),
        format!("-Djib.baseImageCache={}/jib", maven_dir.display()),
        "-Djib.container.user=1000".to_string(),
    ];
    if !platforms.is_empty() {
        args.push(format!("-Djib.from.platforms={}", platforms.join(",")));
    }
    if insecure {
        args.push("-Djib.allowInsecureRegistries=true".to_string());
    }
    args
}

/// Containerizes the generated maven project with the Jib plugin
pub struct JibRunner {
    env: TaskEnv,
    task: JibTask,
}

impl JibRunner {
    pub fn new(env: TaskEnv, task: JibTask) -> Self {
        Self { env, task }
    }

    fn maven_dir(context_dir: &Path) -> PathBuf {
        context_dir
            .parent()
            .map(|p| p.join(MAVEN_DIR))
            .unwrap_or_else(|| PathBuf::from(MAVEN_DIR))
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

        let maven_dir = Self::maven_dir(context_dir);
        let image = publish.target_image(env.namespace(), &env.build.name);

        // removed when dropped, whatever the outcome
        let registry_config = match &publish.registry.secret {
            Some(secret) => Some(
                mount_registry_config(env.cluster.as_ref(), env.namespace(), "jib-secret-", secret)
                    .await?,
            ),
            None => None,
        };

        let args = jib_maven_args(
            &maven_dir,
            &image,
            &status.base_image,
            publish.registry.insecure,
            &env.build.spec.configuration.image_platforms,
        );

        let mut cmd = Command::new(&env.config.maven_cmd);
        cmd.args(&args)
            .current_dir(&maven_dir)
            .env("XDG_CONFIG_HOME", maven_dir.join("jib"));
        if let Some(dir) = &registry_config {
            cmd.env("DOCKER_CONFIG", dir.path());
        }

        info!(build = %env.build.name, image = %image, "Running jib containerization");
        debug!(args = ?args, "Jib arguments");
        run_and_log(cmd, cancel).await?;

        let digest_file = maven_dir.join(JIB_DIGEST_FILE);
        let digest =
            fs::read_to_string(&digest_file).map_err(|e| BuildError::io(&digest_file, e))?;

        status.image = image;
        status.digest = digest.trim().to_string();
        Ok(())
    }
}

#[async_trait]
impl BuildTask for JibRunner {
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

    #[test]
    fn test_maven_args() {
        let args = jib_maven_args(
            Path::new("/builds/kit-a/maven"),
            "registry:5000/ns/kit-a:latest",
            "eclipse-temurin:17",
            false,
            &[],
        );
        assert_eq!(
            args,
            vec![
                "jib:build",
                "-Djib.disableUpdateChecks=true",
                "-P",
                "jib",
                "-Djib.to.image=registry:5000/ns/kit-a:latest",
                "-Djib.from.image=eclipse-temurin:17",
                "-Djib.baseImageCache=/builds/kit-a/maven/jib",
                "-Djib.container.user=1000",
            ]
        );
    }

    #[test]
    fn test_platforms_and_insecure() {
        let platforms = vec!["linux/amd64".to_string(), "linux/arm64".to_string()];
        let args = jib_maven_args(Path::new("/m"), "img", "base", true, &platforms);
        assert!(args.contains(&"-Djib.from.platforms=linux/amd64,linux/arm64".to_string()));
        assert_eq!(args.last().unwrap(), "-Djib.allowInsecureRegistries=true");
    }

    #[test]
    fn test_maven_dir_is_sibling_of_context() {
        assert_eq!(
            JibRunner::maven_dir(Path::new("/builds/kit-a/context")),
            PathBuf::from("/builds/kit-a/maven")
        );
    }
}
