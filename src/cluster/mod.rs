//! Boundary with the cluster that stores build objects, published images
//! and secrets
//!
//! The builder only talks to the cluster through [`ClusterClient`].
//! [`LocalCluster`] serves a catalog file and a secrets directory for local
//! runs; [`MemoryCluster`] is a scriptable in-memory implementation.

pub mod local;
pub mod memory;
pub mod secret;
pub mod wait;

pub use local::{LocalCatalog, LocalCluster};
pub use memory::MemoryCluster;
pub use secret::mount_registry_config;
pub use wait::{wait_for, Probe, WaitError};

use crate::api::{PublishedImage, RuntimeCatalog, RuntimeSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("operation not supported by this cluster: {0}")]
    Unsupported(&'static str),

    #[error("cluster request failed: {0}")]
    Api(String),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// BuildConfig for a binary S2I build pushing into an image stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct S2iBuildConfig {
    pub name: String,
    pub namespace: String,
    pub image_stream: String,
    pub tag: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageStreamRequest {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum S2iBuildPhase {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
}

impl S2iBuildPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            S2iBuildPhase::Complete
                | S2iBuildPhase::Failed
                | S2iBuildPhase::Error
                | S2iBuildPhase::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct S2iBuild {
    pub name: String,
    pub phase: S2iBuildPhase,
    pub message: Option<String>,
    /// Digest of the pushed image, once complete
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    /// Secret entries projected as files, `(key, path)` pairs
    Secret {
        name: String,
        items: Vec<(String, String)>,
    },
    HostPath(PathBuf),
    PersistentVolumeClaim(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PodRequest {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub volumes: Vec<Volume>,
    pub working_dir: Option<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Published images of the namespace built for the given runtime
    async fn list_published_images(
        &self,
        namespace: &str,
        runtime: &RuntimeSpec,
    ) -> Result<Vec<PublishedImage>, ClusterError>;

    /// Runtime catalog matching the runtime version and provider
    async fn runtime_catalog(
        &self,
        namespace: &str,
        runtime: &RuntimeSpec,
    ) -> Result<Option<RuntimeCatalog>, ClusterError>;

    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ClusterError>;

    /// Deletes any existing BuildConfig of the same name, then creates it
    async fn replace_build_config(&self, config: &S2iBuildConfig) -> Result<(), ClusterError>;

    async fn replace_image_stream(&self, stream: &ImageStreamRequest) -> Result<(), ClusterError>;

    /// Starts a binary build from a tar.gz payload, returning the build name
    async fn instantiate_binary(
        &self,
        namespace: &str,
        build_config: &str,
        archive: Vec<u8>,
    ) -> Result<String, ClusterError>;

    async fn get_s2i_build(&self, namespace: &str, name: &str) -> Result<S2iBuild, ClusterError>;

    async fn cancel_s2i_build(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// `status.dockerImageRepository` of the image stream
    async fn image_stream_repository(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<String>, ClusterError>;

    async fn create_pod(&self, pod: &PodRequest) -> Result<(), ClusterError>;

    async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, ClusterError>;

    /// Termination message of the pod's main container
    async fn pod_termination_message(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<String>, ClusterError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}
