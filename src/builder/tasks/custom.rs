use super::pod::run_pod;
use super::{conclude, BuildTask, TaskEnv};
use crate::api::{BuildStatus, CustomTask};
use crate::cluster::{PodRequest, Volume, VolumeSource};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

const WORKSPACE: &str = "/workspace";

/// Runs a user supplied image to completion against the build directory
pub struct CustomRunner {
    env: TaskEnv,
    task: CustomTask,
}

impl CustomRunner {
    pub fn new(env: TaskEnv, task: CustomTask) -> Self {
        Self { env, task }
    }

    fn pod(&self) -> PodRequest {
        let env = &self.env;
        let command = if self.task.container_command.trim().is_empty() {
            Vec::new()
        } else {
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                self.task.container_command.clone(),
            ]
        };

        let (volumes, working_dir) = match &env.work_dir {
            Some(dir) => (
                vec![Volume {
                    name: "workspace".to_string(),
                    source: VolumeSource::HostPath(dir.clone()),
                    mount_path: WORKSPACE.to_string(),
                }],
                Some(WORKSPACE.to_string()),
            ),
            None => (Vec::new(), None),
        };

        PodRequest {
            name: format!("kit-{}-{}", env.build.name, self.task.name),
            namespace: env.namespace().to_string(),
            image: self.task.container_image.clone(),
            command,
            env: self
                .task
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            volumes,
            working_dir,
            labels: env.build.labels.clone(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl BuildTask for CustomRunner {
    fn name(&self) -> &str {
        &self.task.name
    }

    async fn execute(&self, cancel: &CancellationToken) -> BuildStatus {
        let status = BuildStatus::initialize_from(&self.env.build.status, None);
        let pod = self.pod();
        let result = run_pod(&self.env, "custom task", &pod, cancel)
            .await
            .map(|_| ());
        conclude(status, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Build;
    use crate::builder::registry::StepRegistry;
    use crate::cluster::MemoryCluster;
    use crate::config::BuilderConfig;
    use std::sync::Arc;

    #[test]
    fn test_pod_request() {
        let env = TaskEnv::new(
            Build::new("b1", "ns", vec![]),
            Arc::new(MemoryCluster::new()),
            Arc::new(BuilderConfig::default()),
            Arc::new(StepRegistry::new()),
        )
        .with_work_dir("/builds/b1");
        let mut task = CustomTask {
            name: "lint".to_string(),
            container_image: "alpine:3".to_string(),
            container_command: "ls -l".to_string(),
            ..Default::default()
        };
        task.env.insert("A".to_string(), "1".to_string());

        let pod = CustomRunner::new(env, task).pod();
        assert_eq!(pod.name, "kit-b1-lint");
        assert_eq!(pod.command, vec!["/bin/sh", "-c", "ls -l"]);
        assert_eq!(pod.env, vec![("A".to_string(), "1".to_string())]);
        assert_eq!(pod.working_dir.as_deref(), Some("/workspace"));
        assert_eq!(pod.volumes.len(), 1);
    }
}
