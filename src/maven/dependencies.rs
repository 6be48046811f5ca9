//! Mapping of integration dependency strings to Maven coordinates

use super::gav::{parse_gav, Dependency, Exclusion};
use super::project::{Project, Repository};
use super::MavenError;
use crate::api::RuntimeCatalog;
use std::collections::HashSet;
use tracing::debug;

pub const JITPACK_REPO_URL: &str = "https://jitpack.io";
const JITPACK_DEFAULT_VERSION: &str = "main-SNAPSHOT";

const JITPACK_PREFIXES: &[(&str, &str)] = &[
    ("github:", "com.github."),
    ("gitlab:", "com.gitlab."),
    ("bitbucket:", "org.bitbucket."),
    ("gitee:", "com.gitee."),
    ("azure:", "dev.azure."),
];

fn ensure_prefix(id: &str, prefix: &str) -> String {
    if id.starts_with(prefix) {
        id.to_string()
    } else {
        format!("{}{}", prefix, id)
    }
}

/// `github:user/repo[/version]` style coordinates, `None` for other prefixes
pub fn jitpack_dependency(dep: &str) -> Option<Dependency> {
    let (prefix, group_prefix) = JITPACK_PREFIXES
        .iter()
        .find(|(prefix, _)| dep.starts_with(prefix))?;

    let coordinates = dep[prefix.len()..].replace('/', ":");
    let parts: Vec<&str> = coordinates.split(':').collect();
    if parts.len() < 2 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }

    let version = parts
        .get(2)
        .filter(|v| !v.is_empty())
        .copied()
        .unwrap_or(JITPACK_DEFAULT_VERSION);

    Some(Dependency::new(format!("{}{}", group_prefix, parts[0]), parts[1]).with_version(version))
}

fn add_dependencies(
    project: &mut Project,
    dependencies: &[String],
    catalog: &RuntimeCatalog,
) -> Result<(), MavenError> {
    for d in dependencies {
        if let Some(gav) = d.strip_prefix("bom:") {
            let dep = parse_gav(gav)?;
            project.dependency_management.push(Dependency {
                kind: Some("pom".to_string()),
                scope: Some("import".to_string()),
                classifier: None,
                ..dep
            });
        } else if let Some(id) = d.strip_prefix("camel:") {
            if catalog.is_quarkus() {
                let id = if id.starts_with("camel-") {
                    id.to_string()
                } else {
                    format!("camel-quarkus-{}", id)
                };
                project.add_dependency_gav("org.apache.camel.quarkus", &id, "");
            } else {
                project.add_dependency_gav("org.apache.camel", &ensure_prefix(id, "camel-"), "");
            }
        } else if let Some(id) = d.strip_prefix("camel-k:") {
            project.add_dependency_gav("org.apache.camel.k", &ensure_prefix(id, "camel-k-"), "");
        } else if let Some(id) = d.strip_prefix("camel-quarkus:") {
            project.add_dependency_gav(
                "org.apache.camel.quarkus",
                &ensure_prefix(id, "camel-quarkus-"),
                "",
            );
        } else if let Some(gav) = d.strip_prefix("mvn:") {
            project.add_encoded_dependency_gav(&gav.replace('/', ":"))?;
        } else if let Some(id) = d.strip_prefix("runtime:") {
            project.add_dependency_gav(
                "org.apache.camel.k",
                &ensure_prefix(id, "camel-k-runtime-"),
                &catalog.runtime.version,
            );
        } else if let Some(dep) = jitpack_dependency(d) {
            project.add_dependency(dep);
            if !project.has_repository_url(JITPACK_REPO_URL) {
                project.repositories.push(Repository {
                    id: format!("jitpack.io-{}", uuid::Uuid::new_v4().simple()),
                    url: JITPACK_REPO_URL.to_string(),
                    releases: true,
                    snapshots: true,
                    checksum_policy: Some("fail".to_string()),
                });
            }
        } else {
            return Err(MavenError::UnknownDependency(d.clone()));
        }
    }
    Ok(())
}

/// Extra dependencies the catalog declares for already requested components
fn add_dependencies_from_catalog(project: &mut Project, catalog: &RuntimeCatalog) {
    let requested: Vec<Dependency> = project.dependencies.clone();
    for d in &requested {
        let Some(artifact) = catalog.artifacts.get(&d.artifact_id) else {
            continue;
        };
        for extra in &artifact.dependencies {
            let md = Dependency::new(&extra.group_id, &extra.artifact_id);
            project.add_dependency(md.clone());
            for e in &extra.exclusions {
                project.add_dependency_exclusion(
                    &md,
                    Exclusion {
                        group_id: e.group_id.clone(),
                        artifact_id: e.artifact_id.clone(),
                    },
                );
            }
        }
    }
}

fn post_process_dependencies(project: &mut Project, catalog: &RuntimeCatalog) {
    let requested: Vec<Dependency> = project.dependencies.clone();
    for d in &requested {
        let Some(artifact) = catalog.artifacts.get(&d.artifact_id) else {
            continue;
        };
        let md = Dependency::new(&artifact.group_id, &artifact.artifact_id);
        for e in &artifact.exclusions {
            project.add_dependency_exclusion(
                &md,
                Exclusion {
                    group_id: e.group_id.clone(),
                    artifact_id: e.artifact_id.clone(),
                },
            );
        }
    }
}

/// Adds the build's dependencies to the project, then the extra
/// dependencies and exclusions the runtime catalog declares for them
pub fn manage_integration_dependencies(
    project: &mut Project,
    dependencies: &[String],
    catalog: &RuntimeCatalog,
) -> Result<(), MavenError> {
    add_dependencies(project, dependencies, catalog)?;
    add_dependencies_from_catalog(project, catalog);
    post_process_dependencies(project, catalog);
    debug!(count = project.dependencies.len(), "Managed integration dependencies");
    Ok(())
}

/// Drops versions managed by the runtime BOM, removes duplicate
/// coordinates keeping the first, and rejects incomplete coordinates
pub fn sanitize_dependencies(dependencies: &mut Vec<Dependency>) -> Result<(), MavenError> {
    let mut seen = HashSet::new();
    let mut sanitized = Vec::with_capacity(dependencies.len());

    for mut dep in dependencies.drain(..) {
        if dep.group_id.is_empty() || dep.artifact_id.is_empty() {
            return Err(MavenError::InvalidDependency(dep.to_string()));
        }
        if matches!(
            dep.group_id.as_str(),
            "org.apache.camel" | "org.apache.camel.k" | "org.apache.camel.quarkus"
        ) {
            dep.version = None;
        }
        if seen.insert(dep.to_string()) {
            sanitized.push(dep);
        }
    }

    *dependencies = sanitized;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CatalogArtifact, MavenArtifact, RuntimeProvider, RuntimeSpec};
    use yare::parameterized;

    fn catalog(provider: RuntimeProvider) -> RuntimeCatalog {
        RuntimeCatalog::new(RuntimeSpec {
            version: "1.12.0".to_string(),
            provider,
            ..Default::default()
        })
    }

    fn single(dep: &str, provider: RuntimeProvider) -> Dependency {
        let mut project = Project::new("g", "a", "1");
        manage_integration_dependencies(&mut project, &[dep.to_string()], &catalog(provider))
            .unwrap();
        assert_eq!(project.dependencies.len(), 1, "dependencies for {}", dep);
        project.dependencies.remove(0)
    }

    #[parameterized(
        camel_main = { "camel:http", RuntimeProvider::Main, "org.apache.camel:camel-http" },
        camel_prefixed = { "camel:camel-http", RuntimeProvider::Main, "org.apache.camel:camel-http" },
        camel_quarkus_provider = { "camel:http", RuntimeProvider::Quarkus, "org.apache.camel.quarkus:camel-quarkus-http" },
        camel_k = { "camel-k:knative", RuntimeProvider::Main, "org.apache.camel.k:camel-k-knative" },
        camel_quarkus = { "camel-quarkus:timer", RuntimeProvider::Main, "org.apache.camel.quarkus:camel-quarkus-timer" },
        mvn = { "mvn:org.acme:lib:1.0", RuntimeProvider::Main, "org.acme:lib:1.0" },
        mvn_slash = { "mvn:org.acme/lib/1.0", RuntimeProvider::Main, "org.acme:lib:1.0" },
        runtime = { "runtime:jfr", RuntimeProvider::Main, "org.apache.camel.k:camel-k-runtime-jfr:1.12.0" },
    )]
    fn test_dependency_mapping(dep: &str, provider: RuntimeProvider, expected: &str) {
        assert_eq!(single(dep, provider).to_string(), expected);
    }

    #[parameterized(
        github = { "github:apache/camel-sample", "com.github.apache:camel-sample:main-SNAPSHOT" },
        github_version = { "github:apache/camel-sample/1.0", "com.github.apache:camel-sample:1.0" },
        gitlab = { "gitlab:acme:lib:v2", "com.gitlab.acme:lib:v2" },
        bitbucket = { "bitbucket:acme/lib", "org.bitbucket.acme:lib:main-SNAPSHOT" },
        gitee = { "gitee:acme/lib", "com.gitee.acme:lib:main-SNAPSHOT" },
        azure = { "azure:acme/lib", "dev.azure.acme:lib:main-SNAPSHOT" },
    )]
    fn test_jitpack_mapping(dep: &str, expected: &str) {
        assert_eq!(jitpack_dependency(dep).unwrap().to_string(), expected);
    }

    #[test]
    fn test_jitpack_repository_added_once() {
        let mut project = Project::new("g", "a", "1");
        let deps = vec![
            "github:apache/one".to_string(),
            "gitlab:acme/two".to_string(),
        ];
        manage_integration_dependencies(&mut project, &deps, &catalog(RuntimeProvider::Main))
            .unwrap();
        assert_eq!(project.dependencies.len(), 2);
        assert_eq!(project.repositories.len(), 1);
        assert_eq!(project.repositories[0].url, JITPACK_REPO_URL);
        assert!(project.repositories[0].id.starts_with("jitpack.io-"));
    }

    #[test]
    fn test_bom_goes_to_dependency_management() {
        let mut project = Project::new("g", "a", "1");
        manage_integration_dependencies(
            &mut project,
            &["bom:org.acme:acme-bom:2.0".to_string()],
            &catalog(RuntimeProvider::Main),
        )
        .unwrap();

        assert!(project.dependencies.is_empty());
        let bom = &project.dependency_management[0];
        assert_eq!(bom.kind.as_deref(), Some("pom"));
        assert_eq!(bom.scope.as_deref(), Some("import"));
        assert_eq!(bom.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn test_unknown_dependency_type() {
        let mut project = Project::new("g", "a", "1");
        let err = manage_integration_dependencies(
            &mut project,
            &["foo:bar".to_string()],
            &catalog(RuntimeProvider::Main),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "unknown dependency type: foo:bar");
    }

    #[test]
    fn test_catalog_dependencies_and_exclusions() {
        let mut catalog = catalog(RuntimeProvider::Quarkus);
        catalog.artifacts.insert(
            "camel-quarkus-http".to_string(),
            CatalogArtifact {
                group_id: "org.apache.camel.quarkus".to_string(),
                artifact_id: "camel-quarkus-http".to_string(),
                dependencies: vec![crate::api::CatalogDependency {
                    group_id: "org.apache.camel.quarkus".to_string(),
                    artifact_id: "camel-quarkus-attachments".to_string(),
                    exclusions: vec![],
                }],
                exclusions: vec![MavenArtifact {
                    group_id: "commons-logging".to_string(),
                    artifact_id: "commons-logging".to_string(),
                    version: None,
                }],
            },
        );

        let mut project = Project::new("g", "a", "1");
        manage_integration_dependencies(&mut project, &["camel:http".to_string()], &catalog)
            .unwrap();

        assert_eq!(project.dependencies.len(), 2);
        assert_eq!(project.dependencies[0].exclusions.len(), 1);
        assert_eq!(project.dependencies[1].artifact_id, "camel-quarkus-attachments");
    }

    #[test]
    fn test_sanitize_dependencies() {
        let mut deps = vec![
            Dependency::new("org.apache.camel", "camel-http").with_version("3.0"),
            Dependency::new("org.acme", "lib").with_version("1.0"),
            Dependency::new("org.acme", "lib").with_version("1.0"),
            Dependency::new("org.apache.camel", "camel-http"),
        ];
        sanitize_dependencies(&mut deps).unwrap();

        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].version, None);
        assert_eq!(deps[1].to_string(), "org.acme:lib:1.0");

        let mut invalid = vec![Dependency::new("", "lib")];
        assert!(sanitize_dependencies(&mut invalid).is_err());
    }
}
