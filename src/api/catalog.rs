use super::artifact::Artifact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuntimeProvider {
    #[default]
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "quarkus")]
    Quarkus,
}

impl std::fmt::Display for RuntimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeProvider::Main => write!(f, "main"),
            RuntimeProvider::Quarkus => write!(f, "quarkus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    pub version: String,
    #[serde(default)]
    pub provider: RuntimeProvider,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Maven coordinates referenced by catalog entries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A component known to the runtime catalog, with its extra dependencies
/// and exclusions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogArtifact {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub dependencies: Vec<CatalogDependency>,
    #[serde(default)]
    pub exclusions: Vec<MavenArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDependency {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default)]
    pub exclusions: Vec<MavenArtifact>,
}

/// Runtime catalog of the build: runtime identity plus known components
/// keyed by artifact id
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCatalog {
    pub runtime: RuntimeSpec,
    #[serde(default)]
    pub artifacts: BTreeMap<String, CatalogArtifact>,
}

impl RuntimeCatalog {
    pub fn new(runtime: RuntimeSpec) -> Self {
        Self {
            runtime,
            artifacts: BTreeMap::new(),
        }
    }

    pub fn is_quarkus(&self) -> bool {
        self.runtime.provider == RuntimeProvider::Quarkus
    }

    /// Version of a runtime metadata entry, e.g. `quarkus.version`
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.runtime.metadata.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KitPhase {
    #[default]
    None,
    Initialization,
    #[serde(rename = "Build Submitted")]
    BuildSubmitted,
    #[serde(rename = "Build Running")]
    BuildRunning,
    Ready,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KitLayout {
    #[default]
    FastJar,
    Native,
}

/// A previously built and published image, read from the cluster catalog
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedImage {
    pub image: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub runtime_version: String,
    #[serde(default)]
    pub runtime_provider: RuntimeProvider,
    #[serde(default)]
    pub phase: KitPhase,
    #[serde(default)]
    pub layout: KitLayout,
}

impl PublishedImage {
    /// Ready, non-native, and built for the same runtime
    pub fn is_eligible(&self, runtime: &RuntimeSpec) -> bool {
        self.phase == KitPhase::Ready
            && self.layout != KitLayout::Native
            && self.runtime_version == runtime.version
            && self.runtime_provider == runtime.provider
    }
}
