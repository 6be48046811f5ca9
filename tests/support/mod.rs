//! Shared helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use kitbuilder::api::Build;
use kitbuilder::builder::{AssembleRequest, ImageAssembler, StepRegistry, TaskEnv};
use kitbuilder::cluster::{ClusterClient, MemoryCluster};
use kitbuilder::error::BuildError;
use kitbuilder::progress::{ProgressEvent, ProgressHandler};
use kitbuilder::BuilderConfig;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DIGEST: &str = "sha256:5f4dcc3b5aa765d61d8327deb882cf99";

/// Fast polling, short waits
pub fn test_config() -> BuilderConfig {
    BuilderConfig::default()
        .with_namespace("test")
        .with_base_image("eclipse-temurin:17")
        .with_poll_interval(Duration::from_millis(5))
        .with_wait_timeout(Duration::from_secs(5))
}

pub fn test_env(
    build: Build,
    cluster: Arc<MemoryCluster>,
    registry: StepRegistry,
    work_dir: &Path,
) -> TaskEnv {
    let cluster: Arc<dyn ClusterClient> = cluster;
    TaskEnv::new(build, cluster, Arc::new(test_config()), Arc::new(registry))
        .with_work_dir(work_dir)
}

/// Creates `<work_dir>/context` with one dependency jar
pub fn context_with_dependencies(work_dir: &Path) {
    let deps = work_dir.join("context/dependencies");
    fs::create_dir_all(&deps).unwrap();
    fs::write(deps.join("org.acme.lib-1.0.jar"), b"jar").unwrap();
}

/// Creates `<work_dir>/context` with an empty dependency layer and a
/// generated Dockerfile
pub fn context_without_dependencies(work_dir: &Path) {
    fs::create_dir_all(work_dir.join("context/dependencies")).unwrap();
    fs::write(work_dir.join("context/Dockerfile"), b"FROM scratch\n").unwrap();
}

/// Assembler that records requests and returns [`DIGEST`]
#[derive(Default)]
pub struct RecordingAssembler {
    requests: Mutex<Vec<AssembleRequest>>,
    fail_with: Option<String>,
}

impl RecordingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn requests(&self) -> Vec<AssembleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageAssembler for RecordingAssembler {
    async fn assemble(
        &self,
        request: &AssembleRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BuildError> {
        if cancel.is_cancelled() {
            return Err(BuildError::Interrupted);
        }
        self.requests.lock().unwrap().push(request.clone());
        match &self.fail_with {
            Some(message) => Err(BuildError::Assemble(message.clone())),
            None => Ok(DIGEST.to_string()),
        }
    }
}

/// Progress handler keeping every event
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// IDs of the steps that started, in order
    pub fn started_steps(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::StepStarted { step, .. } => Some(step),
                _ => None,
            })
            .collect()
    }
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
