//! Quarkus fast-jar project generation and build

use crate::builder::context::{BuilderContext, DEPENDENCIES_DIR};
use crate::builder::step::{
    StepAction, StepDefinition, INIT_PHASE, PROJECT_BUILD_PHASE, PROJECT_GENERATION_PHASE,
};
use crate::api::{Artifact, RuntimeSpec};
use crate::maven::project::{Execution, Plugin, Repository};
use crate::maven::{Dependency, MavenContext, Project};
use crate::util::fs::sha256_file;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

pub const GROUP: &str = "builder/quarkus";

pub const LOAD_CATALOG: &str = "builder/quarkus/LoadCamelQuarkusCatalog";
pub const GENERATE_PROJECT: &str = "builder/quarkus/GenerateQuarkusProject";
pub const BUILD_RUNNER: &str = "builder/quarkus/BuildQuarkusRunner";
pub const COMPUTE_DEPENDENCIES: &str = "builder/quarkus/ComputeQuarkusDependencies";

pub const INTEGRATION_GROUP_ID: &str = "org.apache.camel.k.integration";
pub const INTEGRATION_ARTIFACT_ID: &str = "camel-k-integration";
pub const INTEGRATION_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("LoadCamelQuarkusCatalog", INIT_PHASE, LoadCamelQuarkusCatalog),
        StepDefinition::new(
            "GenerateQuarkusProject",
            PROJECT_GENERATION_PHASE,
            GenerateQuarkusProject,
        ),
        StepDefinition::new("BuildQuarkusRunner", PROJECT_BUILD_PHASE, BuildQuarkusRunner),
        StepDefinition::new(
            "ComputeQuarkusDependencies",
            PROJECT_BUILD_PHASE + 1,
            ComputeQuarkusDependencies,
        ),
    ]
}

pub struct LoadCamelQuarkusCatalog;

#[async_trait]
impl StepAction for LoadCamelQuarkusCatalog {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let runtime = &ctx.build.runtime;
        let catalog = ctx
            .cluster
            .runtime_catalog(&ctx.namespace, runtime)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "unable to find catalog matching version requirement: runtime={}, provider={}",
                    runtime.version,
                    runtime.provider
                )
            })?;
        debug!(
            version = %catalog.runtime.version,
            artifacts = catalog.artifacts.len(),
            "Loaded runtime catalog"
        );
        ctx.catalog = Some(catalog);
        Ok(())
    }
}

/// Skeleton fast-jar project for a runtime
pub fn quarkus_project(runtime: &RuntimeSpec) -> Project {
    let mut p = Project::new(INTEGRATION_GROUP_ID, INTEGRATION_ARTIFACT_ID, INTEGRATION_VERSION);

    // routes are loaded at runtime, build time discovery may trip on runtime proxies
    p.properties
        .insert("quarkus.camel.routes-discovery.enabled".to_string(), "false".to_string());
    p.properties
        .insert("quarkus.banner.enabled".to_string(), "false".to_string());
    p.properties
        .insert("quarkus.package.type".to_string(), "fast-jar".to_string());

    p.dependency_management.push(Dependency {
        kind: Some("pom".to_string()),
        scope: Some("import".to_string()),
        ..Dependency::new("org.apache.camel.k", "camel-k-runtime-bom").with_version(&runtime.version)
    });

    p.plugins.push(Plugin {
        group_id: "io.quarkus".to_string(),
        artifact_id: "quarkus-maven-plugin".to_string(),
        version: runtime.metadata.get("quarkus.version").cloned(),
        executions: vec![Execution {
            goals: vec!["build".to_string()],
            ..Default::default()
        }],
    });
    p
}

pub struct GenerateQuarkusProject;

#[async_trait]
impl StepAction for GenerateQuarkusProject {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let mut project = quarkus_project(ctx.runtime());
        let maven = &ctx.build.maven;

        project
            .properties
            .extend(maven.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        project.repositories.extend(maven.repositories.iter().map(|r| Repository {
            id: r.id.clone(),
            url: r.url.clone(),
            releases: r.releases,
            snapshots: r.snapshots,
            checksum_policy: None,
        }));

        ctx.maven.project = project;
        Ok(())
    }
}

fn maven_context(ctx: &BuilderContext) -> MavenContext {
    let mut mc = MavenContext::new(ctx.maven_dir());
    mc.global_settings = ctx.maven.global_settings.clone();
    mc.user_settings = ctx.maven.user_settings.clone();
    mc.local_repository = ctx.build.maven.local_repository.clone();
    mc.additional_arguments = ctx.build.maven.cli_options.clone();
    mc
}

fn application_properties(properties: &std::collections::BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (k, v) in properties {
        let _ = writeln!(out, "{}={}", k, v);
    }
    out
}

/// Runs `package` on the generated project
pub struct BuildQuarkusRunner;

#[async_trait]
impl StepAction for BuildQuarkusRunner {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let mut mc = maven_context(ctx);

        // the quarkus plugin fails when target/classes ends up empty
        let resources = mc.path.join("src").join("main").join("resources");
        fs::create_dir_all(&resources).context("failure while creating resource folder")?;
        fs::write(
            resources.join("application.properties"),
            application_properties(&ctx.build.properties),
        )
        .context("failure while creating application.properties")?;

        mc.add_argument("package");
        info!(build = %ctx.build_name, "Building quarkus runner");
        mc.run(&ctx.config.maven_cmd, Some(&ctx.maven.project), &ctx.cancel)
            .await
            .context("failure while building project")?;
        Ok(())
    }
}

/// One artifact per file of the fast-jar tree
pub fn quarkus_app_artifacts(quarkus_app: &Path) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(quarkus_app).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", quarkus_app.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(quarkus_app)?;
        let checksum = sha256_file(path)
            .with_context(|| format!("failed to compute checksum of {}", path.display()))?;
        let id = entry.file_name().to_string_lossy().into_owned();
        let target = Path::new(DEPENDENCIES_DIR).join(rel);

        artifacts.push(
            Artifact::new(id, path.display().to_string(), target.display().to_string())
                .with_checksum(checksum),
        );
    }
    Ok(artifacts)
}

pub struct ComputeQuarkusDependencies;

#[async_trait]
impl StepAction for ComputeQuarkusDependencies {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let quarkus_app = ctx.maven_dir().join("target").join("quarkus-app");
        let artifacts = quarkus_app_artifacts(&quarkus_app)?;
        debug!(count = artifacts.len(), "Computed quarkus dependencies");
        ctx.artifacts.extend(artifacts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BuilderTask, RuntimeCatalog, RuntimeProvider};
    use crate::cluster::MemoryCluster;
    use crate::config::BuilderConfig;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn runtime() -> RuntimeSpec {
        let mut metadata = BTreeMap::new();
        metadata.insert("quarkus.version".to_string(), "2.7.0".to_string());
        RuntimeSpec {
            version: "1.12.0".to_string(),
            provider: RuntimeProvider::Quarkus,
            metadata,
        }
    }

    fn context(cluster: Arc<MemoryCluster>, path: &Path) -> BuilderContext {
        BuilderContext::new(
            "kit-1",
            "ns",
            path,
            BuilderTask {
                runtime: runtime(),
                ..Default::default()
            },
            cluster,
            Arc::new(BuilderConfig::default()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_quarkus_project() {
        let project = quarkus_project(&runtime());
        let xml = project.to_xml();
        assert!(xml.contains("<artifactId>camel-k-runtime-bom</artifactId>"));
        assert!(xml.contains("<quarkus.package.type>fast-jar</quarkus.package.type>"));
        assert!(xml.contains("<version>2.7.0</version>"));
        assert!(xml.contains("<goal>build</goal>"));
    }

    #[tokio::test]
    async fn test_load_catalog() {
        let temp = TempDir::new().unwrap();
        let cluster = Arc::new(MemoryCluster::new());
        let mut ctx = context(cluster.clone(), temp.path());

        let err = LoadCamelQuarkusCatalog.execute(&mut ctx).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to find catalog matching version requirement: runtime=1.12.0, provider=quarkus"
        );

        cluster.add_catalog(RuntimeCatalog::new(runtime()));
        LoadCamelQuarkusCatalog.execute(&mut ctx).await.unwrap();
        assert!(ctx.catalog().unwrap().is_quarkus());
    }

    #[tokio::test]
    async fn test_compute_dependencies() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("maven/target/quarkus-app");
        fs::create_dir_all(app.join("lib/main")).unwrap();
        fs::write(app.join("quarkus-run.jar"), b"run").unwrap();
        fs::write(app.join("lib/main/org.acme.lib-1.0.jar"), b"lib").unwrap();

        let mut ctx = context(Arc::new(MemoryCluster::new()), temp.path());
        ComputeQuarkusDependencies.execute(&mut ctx).await.unwrap();

        assert_eq!(ctx.artifacts.len(), 2);
        let lib = &ctx.artifacts[0];
        assert_eq!(lib.id, "org.acme.lib-1.0.jar");
        assert_eq!(lib.target, "dependencies/lib/main/org.acme.lib-1.0.jar");
        assert!(lib.checksum().unwrap().starts_with("sha256:"));
        assert_eq!(ctx.artifacts[1].target, "dependencies/quarkus-run.jar");
    }

    #[test]
    fn test_application_properties() {
        let mut props = BTreeMap::new();
        props.insert("b".to_string(), "2".to_string());
        props.insert("a".to_string(), "1".to_string());
        assert_eq!(application_properties(&props), "a=1\nb=2\n");
    }
}
