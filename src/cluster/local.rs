//! File-backed cluster for running builds outside of a cluster

use super::{
    ClusterClient, ClusterError, ImageStreamRequest, PodPhase, PodRequest, S2iBuild,
    S2iBuildConfig,
};
use crate::api::{PublishedImage, RuntimeCatalog, RuntimeSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Content of the catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCatalog {
    #[serde(default)]
    pub published_images: Vec<PublishedImage>,
    #[serde(default)]
    pub catalogs: Vec<RuntimeCatalog>,
}

impl LocalCatalog {
    pub fn load(path: &Path) -> Result<Self, ClusterError> {
        let content = fs::read_to_string(path).map_err(|source| ClusterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|e| ClusterError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Published images and runtime catalogs come from a YAML file, secrets from
/// `<secrets_dir>/<secret>/<key>` files. Cluster-side builds and pods are
/// not available.
#[derive(Debug, Clone, Default)]
pub struct LocalCluster {
    catalog_path: Option<PathBuf>,
    secrets_dir: Option<PathBuf>,
}

impl LocalCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    pub fn with_secrets_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets_dir = Some(path.into());
        self
    }

    fn catalog(&self) -> Result<LocalCatalog, ClusterError> {
        match &self.catalog_path {
            Some(path) => LocalCatalog::load(path),
            None => Ok(LocalCatalog::default()),
        }
    }
}

#[async_trait]
impl ClusterClient for LocalCluster {
    async fn list_published_images(
        &self,
        _namespace: &str,
        runtime: &RuntimeSpec,
    ) -> Result<Vec<PublishedImage>, ClusterError> {
        let images: Vec<PublishedImage> = self
            .catalog()?
            .published_images
            .into_iter()
            .filter(|i| i.runtime_version == runtime.version && i.runtime_provider == runtime.provider)
            .collect();
        debug!(count = images.len(), "Listed published images");
        Ok(images)
    }

    async fn runtime_catalog(
        &self,
        _namespace: &str,
        runtime: &RuntimeSpec,
    ) -> Result<Option<RuntimeCatalog>, ClusterError> {
        Ok(self.catalog()?.catalogs.into_iter().find(|c| {
            c.runtime.version == runtime.version && c.runtime.provider == runtime.provider
        }))
    }

    async fn secret_data(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ClusterError> {
        let not_found = || ClusterError::NotFound {
            kind: "secret",
            name: name.to_string(),
        };
        let dir = self.secrets_dir.as_ref().ok_or_else(not_found)?.join(name);
        if !dir.is_dir() {
            return Err(not_found());
        }

        let io = |path: &Path, source| ClusterError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut data = BTreeMap::new();
        for entry in fs::read_dir(&dir).map_err(|e| io(&dir, e))? {
            let path = entry.map_err(|e| io(&dir, e))?.path();
            if path.is_file() {
                let key = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let value = fs::read(&path).map_err(|e| io(&path, e))?;
                data.insert(key, value);
            }
        }
        Ok(data)
    }

    async fn replace_build_config(&self, _config: &S2iBuildConfig) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported("s2i build configs"))
    }

    async fn replace_image_stream(&self, _stream: &ImageStreamRequest) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported("image streams"))
    }

    async fn instantiate_binary(
        &self,
        _namespace: &str,
        _build_config: &str,
        _archive: Vec<u8>,
    ) -> Result<String, ClusterError> {
        Err(ClusterError::Unsupported("s2i builds"))
    }

    async fn get_s2i_build(&self, _namespace: &str, _name: &str) -> Result<S2iBuild, ClusterError> {
        Err(ClusterError::Unsupported("s2i builds"))
    }

    async fn cancel_s2i_build(&self, _namespace: &str, _name: &str) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported("s2i builds"))
    }

    async fn image_stream_repository(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<String>, ClusterError> {
        Err(ClusterError::Unsupported("image streams"))
    }

    async fn create_pod(&self, _pod: &PodRequest) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported("pods"))
    }

    async fn pod_phase(&self, _namespace: &str, _name: &str) -> Result<PodPhase, ClusterError> {
        Err(ClusterError::Unsupported("pods"))
    }

    async fn pod_termination_message(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<String>, ClusterError> {
        Err(ClusterError::Unsupported("pods"))
    }

    async fn delete_pod(&self, _namespace: &str, _name: &str) -> Result<(), ClusterError> {
        Err(ClusterError::Unsupported("pods"))
    }
}
