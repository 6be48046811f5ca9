//! Mutable state of one build invocation

use crate::api::{Artifact, BuilderTask, Resource, RuntimeCatalog, RuntimeSpec};
use crate::cluster::ClusterClient;
use crate::config::BuilderConfig;
use crate::maven::Project;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Directory under the build path holding the image context
pub const CONTEXT_DIR: &str = "context";
/// Directory under the build path holding the generated maven project
pub const MAVEN_DIR: &str = "maven";
/// Directory, relative to the image context, receiving dependency files
pub const DEPENDENCIES_DIR: &str = "dependencies";
/// Location of the application inside the image
pub const DEPLOYMENT_DIR: &str = "/deployments";

#[derive(Debug, Clone, Default)]
pub struct MavenState {
    pub project: Project,
    pub global_settings: Option<String>,
    pub user_settings: Option<String>,
}

/// Owned by exactly one build invocation and threaded through its steps
pub struct BuilderContext {
    pub build_name: String,
    pub namespace: String,
    /// Working directory of the build
    pub path: PathBuf,
    pub build: BuilderTask,
    pub catalog: Option<RuntimeCatalog>,
    pub cluster: Arc<dyn ClusterClient>,
    pub config: Arc<BuilderConfig>,
    pub cancel: CancellationToken,
    pub base_image: String,
    pub artifacts: Vec<Artifact>,
    pub selected_artifacts: Vec<Artifact>,
    pub resources: Vec<Resource>,
    pub maven: MavenState,
    pub error: Option<String>,
}

impl BuilderContext {
    pub fn new(
        build_name: impl Into<String>,
        namespace: impl Into<String>,
        path: impl Into<PathBuf>,
        build: BuilderTask,
        cluster: Arc<dyn ClusterClient>,
        config: Arc<BuilderConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let base_image = build
            .base_image
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| config.base_image.clone());
        let resources = build.resources.clone();

        Self {
            build_name: build_name.into(),
            namespace: namespace.into(),
            path: path.into(),
            build,
            catalog: None,
            cluster,
            config,
            cancel,
            base_image,
            artifacts: Vec::new(),
            selected_artifacts: Vec::new(),
            resources,
            maven: MavenState::default(),
            error: None,
        }
    }

    pub fn catalog(&self) -> Result<&RuntimeCatalog> {
        self.catalog
            .as_ref()
            .ok_or_else(|| anyhow!("runtime catalog not loaded for build {}", self.build_name))
    }

    /// Runtime of the loaded catalog, or the one requested by the build
    pub fn runtime(&self) -> &RuntimeSpec {
        self.catalog
            .as_ref()
            .map(|c| &c.runtime)
            .unwrap_or(&self.build.runtime)
    }

    /// True when the build names its own base image
    pub fn has_required_image(&self) -> bool {
        self.build.base_image.as_deref().is_some_and(|b| !b.is_empty())
    }

    pub fn context_dir(&self) -> PathBuf {
        self.path.join(CONTEXT_DIR)
    }

    pub fn maven_dir(&self) -> PathBuf {
        self.path.join(MAVEN_DIR)
    }

    pub fn build_dir(&self) -> Option<&Path> {
        self.build
            .build_dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(Path::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MemoryCluster;

    fn context(base_image: Option<&str>) -> BuilderContext {
        BuilderContext::new(
            "kit-1",
            "ns",
            "/tmp/kit-1",
            BuilderTask {
                name: "builder".to_string(),
                base_image: base_image.map(str::to_string),
                ..Default::default()
            },
            Arc::new(MemoryCluster::new()),
            Arc::new(BuilderConfig::default().with_base_image("root/base:1")),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_base_image_defaults_to_config() {
        let ctx = context(None);
        assert_eq!(ctx.base_image, "root/base:1");
        assert!(!ctx.has_required_image());

        let ctx = context(Some("custom/base:2"));
        assert_eq!(ctx.base_image, "custom/base:2");
        assert!(ctx.has_required_image());
    }

    #[test]
    fn test_layout() {
        let ctx = context(None);
        assert_eq!(ctx.context_dir(), PathBuf::from("/tmp/kit-1/context"));
        assert_eq!(ctx.maven_dir(), PathBuf::from("/tmp/kit-1/maven"));
        assert!(ctx.catalog().is_err());
        assert!(ctx.build_dir().is_none());
    }
}
