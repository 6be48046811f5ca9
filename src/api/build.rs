//! Build specification and status

use super::artifact::{Artifact, Resource};
use super::catalog::RuntimeSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub spec: BuildSpec,
    #[serde(default)]
    pub status: BuildStatus,
}

impl Build {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            spec: BuildSpec {
                tasks,
                ..Default::default()
            },
            status: BuildStatus::default(),
        }
    }

    /// Looks a task up by its stable name
    pub fn task_by_name(&self, name: &str) -> Option<&Task> {
        self.spec.tasks.iter().find(|t| t.name() == name)
    }

    /// The first builder task, which owns dependencies and runtime
    pub fn builder_task(&self) -> Option<&BuilderTask> {
        self.spec.tasks.iter().find_map(|t| match t {
            Task::Builder(b) => Some(b),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub configuration: BuildConfiguration,
    /// Whole-build timeout in seconds, overrides the configured wait timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_platforms: Vec<String>,
}

/// One unit of a build. Exactly one variant per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Task {
    Builder(BuilderTask),
    Package(BuilderTask),
    S2i(S2iTask),
    Kaniko(KanikoTask),
    Jib(JibTask),
    Spectrum(SpectrumTask),
    Custom(CustomTask),
}

impl Task {
    pub fn name(&self) -> &str {
        match self {
            Task::Builder(t) | Task::Package(t) => &t.name,
            Task::S2i(t) => &t.name,
            Task::Kaniko(t) => &t.publish.name,
            Task::Jib(t) => &t.publish.name,
            Task::Spectrum(t) => &t.publish.name,
            Task::Custom(t) => &t.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Builder(_) => "builder",
            Task::Package(_) => "package",
            Task::S2i(_) => "s2i",
            Task::Kaniko(_) => "kaniko",
            Task::Jib(_) => "jib",
            Task::Spectrum(_) => "spectrum",
            Task::Custom(_) => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderTask {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    #[serde(default)]
    pub runtime: RuntimeSpec,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Step IDs in `<group>/<Name>` form
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub maven: MavenBuildSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Extra `application.properties` entries
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenBuildSpec {
    /// User `settings.xml` content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<String>,
    #[serde(default)]
    pub servers: Vec<MavenServer>,
    #[serde(default)]
    pub repositories: Vec<MavenRepository>,
    #[serde(default)]
    pub cli_options: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenServer {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenRepository {
    pub id: String,
    pub url: String,
    #[serde(default = "enabled")]
    pub releases: bool,
    #[serde(default)]
    pub snapshots: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Name of the secret holding registry credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub insecure: bool,
}

impl RegistrySpec {
    /// `<address>/<organization|namespace>/kit-<build>:<tag>`
    pub fn image_name(&self, namespace: &str, build: &str, tag: &str) -> String {
        let org = self.organization.as_deref().unwrap_or(namespace);
        if self.address.is_empty() {
            format!("{}/kit-{}:{}", org, build, tag)
        } else {
            format!("{}/{}/kit-{}:{}", self.address, org, build, tag)
        }
    }
}

/// Shared configuration of image publishing tasks
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishTask {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    /// Target image, derived from the registry when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "default_context_dir")]
    pub context_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub registry: RegistrySpec,
}

fn default_context_dir() -> String {
    "context".to_string()
}

impl PublishTask {
    pub fn target_image(&self, namespace: &str, build: &str) -> String {
        match &self.image {
            Some(image) if !image.is_empty() => image.clone(),
            _ => self.registry.image_name(namespace, build, self.tag()),
        }
    }

    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S2iTask {
    pub name: String,
    #[serde(default = "default_context_dir")]
    pub context_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanikoCache {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanikoTask {
    #[serde(flatten)]
    pub publish: PublishTask,
    #[serde(default)]
    pub cache: KanikoCache,
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JibTask {
    #[serde(flatten)]
    pub publish: PublishTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumTask {
    #[serde(flatten)]
    pub publish: PublishTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTask {
    pub name: String,
    pub container_image: String,
    #[serde(default)]
    pub container_command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildPhase {
    #[default]
    #[serde(rename = "")]
    None,
    Initialization,
    Scheduling,
    Pending,
    Running,
    Succeeded,
    Failed,
    Interrupted,
    Error,
}

impl BuildPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuildPhase::Succeeded | BuildPhase::Failed | BuildPhase::Interrupted | BuildPhase::Error
        )
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildPhase::None => "",
            BuildPhase::Initialization => "Initialization",
            BuildPhase::Scheduling => "Scheduling",
            BuildPhase::Pending => "Pending",
            BuildPhase::Running => "Running",
            BuildPhase::Succeeded => "Succeeded",
            BuildPhase::Failed => "Failed",
            BuildPhase::Interrupted => "Interrupted",
            BuildPhase::Error => "Error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    #[serde(default)]
    pub phase: BuildPhase,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl BuildStatus {
    pub fn running() -> Self {
        Self {
            phase: BuildPhase::Running,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Seeds a status with the base image from task configuration, falling
    /// back to the one recorded in the previous status
    pub fn initialize_from(previous: &BuildStatus, base_image: Option<&str>) -> Self {
        let base_image = base_image
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| previous.base_image.clone());
        Self {
            base_image,
            ..Self::running()
        }
    }

    pub fn failed(&mut self, err: impl fmt::Display) -> &mut Self {
        self.phase = BuildPhase::Failed;
        self.error = err.to_string();
        self
    }

    pub fn errored(&mut self, err: impl fmt::Display) -> &mut Self {
        self.phase = BuildPhase::Error;
        self.error = err.to_string();
        self
    }

    pub fn interrupted(&mut self) -> &mut Self {
        self.phase = BuildPhase::Interrupted;
        self
    }

    pub fn succeeded(&mut self) -> &mut Self {
        self.phase = BuildPhase::Succeeded;
        self
    }

    /// Records the elapsed time since `started_at`
    pub fn finish(mut self) -> Self {
        if let Some(start) = self.started_at {
            let elapsed = Utc::now() - start;
            self.duration = Some(format!("{}ms", elapsed.num_milliseconds().max(0)));
        }
        self
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_json_is_externally_tagged() {
        let json = r#"{
            "name": "kit-1",
            "spec": {
                "tasks": [
                    {"builder": {"name": "builder", "steps": ["builder/project/CleanUpBuildDir"]}},
                    {"spectrum": {"name": "spectrum", "registry": {"address": "registry:5000", "insecure": true}}}
                ]
            }
        }"#;

        let build: Build = serde_json::from_str(json).unwrap();
        assert_eq!(build.spec.tasks.len(), 2);
        assert_eq!(build.spec.tasks[0].kind(), "builder");
        assert_eq!(build.builder_task().unwrap().steps.len(), 1);

        let spectrum = build.task_by_name("spectrum").unwrap();
        match spectrum {
            Task::Spectrum(t) => {
                assert!(t.publish.registry.insecure);
                assert_eq!(t.publish.context_dir, "context");
            }
            other => panic!("unexpected task {:?}", other),
        }
        assert!(build.task_by_name("missing").is_none());
    }

    #[test]
    fn test_image_name() {
        let registry = RegistrySpec {
            address: "registry:5000".to_string(),
            ..Default::default()
        };
        assert_eq!(
            registry.image_name("ns", "b1", "123"),
            "registry:5000/ns/kit-b1:123"
        );

        let registry = RegistrySpec {
            address: "quay.io".to_string(),
            organization: Some("acme".to_string()),
            ..Default::default()
        };
        assert_eq!(registry.image_name("ns", "b1", "latest"), "quay.io/acme/kit-b1:latest");

        let publish = PublishTask {
            image: Some("explicit/image:1".to_string()),
            registry,
            ..Default::default()
        };
        assert_eq!(publish.target_image("ns", "b1"), "explicit/image:1");
    }

    #[test]
    fn test_status_transitions() {
        let previous = BuildStatus {
            base_image: "old/base:1".to_string(),
            ..Default::default()
        };

        let status = BuildStatus::initialize_from(&previous, None);
        assert_eq!(status.base_image, "old/base:1");
        assert_eq!(status.phase, BuildPhase::Running);
        assert!(!status.is_finished());

        let mut status = BuildStatus::initialize_from(&previous, Some("new/base:2"));
        assert_eq!(status.base_image, "new/base:2");

        status.failed("boom");
        assert_eq!(status.phase, BuildPhase::Failed);
        assert_eq!(status.error, "boom");
        assert!(status.is_finished());

        let status = status.finish();
        assert!(status.duration.is_some());
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&BuildPhase::Interrupted).unwrap();
        assert_eq!(json, "\"Interrupted\"");
        assert!(BuildPhase::Error.is_terminal());
        assert!(!BuildPhase::Pending.is_terminal());
    }
}
