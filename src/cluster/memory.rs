//! Scriptable in-memory cluster

use super::{
    ClusterClient, ClusterError, ImageStreamRequest, PodPhase, PodRequest, S2iBuild,
    S2iBuildConfig, S2iBuildPhase,
};
use crate::api::{PublishedImage, RuntimeCatalog, RuntimeSpec};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    published: Vec<(String, PublishedImage)>,
    catalogs: Vec<RuntimeCatalog>,
    secrets: HashMap<(String, String), BTreeMap<String, Vec<u8>>>,
    build_configs: Vec<S2iBuildConfig>,
    image_streams: Vec<ImageStreamRequest>,
    repositories: HashMap<String, String>,
    s2i_phases: VecDeque<S2iBuildPhase>,
    s2i_digest: Option<String>,
    s2i_builds: Vec<String>,
    archives: Vec<Vec<u8>>,
    cancelled_builds: Vec<String>,
    pods: Vec<PodRequest>,
    pod_phases: VecDeque<PodPhase>,
    termination_message: Option<String>,
    deleted_pods: Vec<String>,
}

/// Polled phases are served from a script; the last scripted phase repeats.
/// Without a script, S2I builds complete and pods succeed immediately.
#[derive(Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

fn next_phase<T: Copy>(script: &mut VecDeque<T>, fallback: T) -> T {
    if script.len() > 1 {
        script.pop_front().unwrap_or(fallback)
    } else {
        script.front().copied().unwrap_or(fallback)
    }
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_published_image(&self, namespace: &str, image: PublishedImage) {
        self.state().published.push((namespace.to_string(), image));
    }

    pub fn add_catalog(&self, catalog: RuntimeCatalog) {
        self.state().catalogs.push(catalog);
    }

    pub fn add_secret(&self, namespace: &str, name: &str, entries: Vec<(&str, Vec<u8>)>) {
        let data = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.state()
            .secrets
            .insert((namespace.to_string(), name.to_string()), data);
    }

    pub fn set_image_repository(&self, image_stream: &str, repository: &str) {
        self.state()
            .repositories
            .insert(image_stream.to_string(), repository.to_string());
    }

    pub fn script_s2i_phases(&self, phases: Vec<S2iBuildPhase>) {
        self.state().s2i_phases = phases.into();
    }

    pub fn set_s2i_digest(&self, digest: &str) {
        self.state().s2i_digest = Some(digest.to_string());
    }

    pub fn script_pod_phases(&self, phases: Vec<PodPhase>) {
        self.state().pod_phases = phases.into();
    }

    pub fn set_termination_message(&self, message: &str) {
        self.state().termination_message = Some(message.to_string());
    }

    pub fn build_configs(&self) -> Vec<S2iBuildConfig> {
        self.state().build_configs.clone()
    }

    pub fn image_streams(&self) -> Vec<ImageStreamRequest> {
        self.state().image_streams.clone()
    }

    pub fn archives(&self) -> Vec<Vec<u8>> {
        self.state().archives.clone()
    }

    pub fn cancelled_builds(&self) -> Vec<String> {
        self.state().cancelled_builds.clone()
    }

    pub fn pods(&self) -> Vec<PodRequest> {
        self.state().pods.clone()
    }

    pub fn deleted_pods(&self) -> Vec<String> {
        self.state().deleted_pods.clone()
    }
}

#[async_trait]
impl ClusterClient for MemoryCluster {
    async fn list_published_images(
        &self,
        namespace: &str,
        runtime: &RuntimeSpec,
    ) -> Result<Vec<PublishedImage>, ClusterError> {
        Ok(self
            .state()
            .published
            .iter()
            .filter(|(ns, image)| {
                ns == namespace
                    && image.runtime_version == runtime.version
                    && image.runtime_provider == runtime.provider
            })
            .map(|(_, image)| image.clone())
            .collect())
    }

    async fn runtime_catalog(
        &self,
        _namespace: &str,
        runtime: &RuntimeSpec,
    ) -> Result<Option<RuntimeCatalog>, ClusterError> {
        Ok(self
            .state()
            .catalogs
            .iter()
            .find(|c| {
                c.runtime.version == runtime.version && c.runtime.provider == runtime.provider
            })
            .cloned())
    }

    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ClusterError> {
        self.state()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "secret",
                name: name.to_string(),
            })
    }

    async fn replace_build_config(&self, config: &S2iBuildConfig) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.build_configs.retain(|c| c.name != config.name);
        state.build_configs.push(config.clone());
        Ok(())
    }

    async fn replace_image_stream(&self, stream: &ImageStreamRequest) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.image_streams.retain(|s| s.name != stream.name);
        state.image_streams.push(stream.clone());
        Ok(())
    }

    async fn instantiate_binary(
        &self,
        _namespace: &str,
        build_config: &str,
        archive: Vec<u8>,
    ) -> Result<String, ClusterError> {
        let mut state = self.state();
        if !state.build_configs.iter().any(|c| c.name == build_config) {
            return Err(ClusterError::NotFound {
                kind: "buildconfig",
                name: build_config.to_string(),
            });
        }
        state.archives.push(archive);
        let name = format!("{}-{}", build_config, state.s2i_builds.len() + 1);
        state.s2i_builds.push(name.clone());
        Ok(name)
    }

    async fn get_s2i_build(&self, _namespace: &str, name: &str) -> Result<S2iBuild, ClusterError> {
        let mut state = self.state();
        if !state.s2i_builds.iter().any(|b| b == name) {
            return Err(ClusterError::NotFound {
                kind: "build",
                name: name.to_string(),
            });
        }
        let phase = if state.cancelled_builds.iter().any(|b| b == name) {
            S2iBuildPhase::Cancelled
        } else {
            next_phase(&mut state.s2i_phases, S2iBuildPhase::Complete)
        };
        let digest = (phase == S2iBuildPhase::Complete)
            .then(|| state.s2i_digest.clone())
            .flatten();
        Ok(S2iBuild {
            name: name.to_string(),
            phase,
            message: matches!(phase, S2iBuildPhase::Failed | S2iBuildPhase::Error)
                .then(|| "build failed".to_string()),
            digest,
        })
    }

    async fn cancel_s2i_build(&self, _namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.state().cancelled_builds.push(name.to_string());
        Ok(())
    }

    async fn image_stream_repository(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<String>, ClusterError> {
        Ok(self.state().repositories.get(name).cloned())
    }

    async fn create_pod(&self, pod: &PodRequest) -> Result<(), ClusterError> {
        let mut state = self.state();
        if state.pods.iter().any(|p| p.name == pod.name && !state.deleted_pods.contains(&p.name)) {
            return Err(ClusterError::Api(format!("pod {} already exists", pod.name)));
        }
        state.pods.push(pod.clone());
        Ok(())
    }

    async fn pod_phase(&self, _namespace: &str, name: &str) -> Result<PodPhase, ClusterError> {
        let mut state = self.state();
        if !state.pods.iter().any(|p| p.name == name) {
            return Err(ClusterError::NotFound {
                kind: "pod",
                name: name.to_string(),
            });
        }
        Ok(next_phase(&mut state.pod_phases, PodPhase::Succeeded))
    }

    async fn pod_termination_message(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<String>, ClusterError> {
        Ok(self.state().termination_message.clone())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.state().deleted_pods.push(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_pod_phases() {
        let cluster = MemoryCluster::new();
        cluster.script_pod_phases(vec![PodPhase::Pending, PodPhase::Running, PodPhase::Failed]);
        cluster
            .create_pod(&PodRequest {
                name: "p".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(cluster.pod_phase("ns", "p").await.unwrap(), PodPhase::Pending);
        assert_eq!(cluster.pod_phase("ns", "p").await.unwrap(), PodPhase::Running);
        assert_eq!(cluster.pod_phase("ns", "p").await.unwrap(), PodPhase::Failed);
        assert_eq!(cluster.pod_phase("ns", "p").await.unwrap(), PodPhase::Failed);
        assert!(cluster.pod_phase("ns", "other").await.is_err());
    }

    #[tokio::test]
    async fn test_binary_build_requires_config() {
        let cluster = MemoryCluster::new();
        assert!(cluster.instantiate_binary("ns", "kit-a", vec![]).await.is_err());

        cluster
            .replace_build_config(&S2iBuildConfig {
                name: "kit-a".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let name = cluster.instantiate_binary("ns", "kit-a", vec![1]).await.unwrap();
        assert_eq!(name, "kit-a-1");

        cluster.cancel_s2i_build("ns", &name).await.unwrap();
        let build = cluster.get_s2i_build("ns", &name).await.unwrap();
        assert_eq!(build.phase, S2iBuildPhase::Cancelled);
    }
}
