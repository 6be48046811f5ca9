//! Steps shared by every maven based build

use crate::builder::context::BuilderContext;
use crate::builder::step::{StepAction, StepDefinition, PROJECT_GENERATION_PHASE};
use crate::maven::settings::{default_repositories, global_settings, inject_servers, validate_settings};
use crate::maven::{manage_integration_dependencies, sanitize_dependencies};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use tracing::{debug, info};

pub const GROUP: &str = "builder/project";

pub const CLEAN_UP_BUILD_DIR: &str = "builder/project/CleanUpBuildDir";
pub const GENERATE_SETTINGS: &str = "builder/project/GenerateProjectSettings";
pub const INJECT_DEPENDENCIES: &str = "builder/project/InjectDependencies";
pub const SANITIZE_DEPENDENCIES: &str = "builder/project/SanitizeDependencies";

pub fn steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("CleanUpBuildDir", PROJECT_GENERATION_PHASE - 1, CleanUpBuildDir),
        StepDefinition::new(
            "GenerateProjectSettings",
            PROJECT_GENERATION_PHASE + 1,
            GenerateProjectSettings,
        ),
        StepDefinition::new("InjectDependencies", PROJECT_GENERATION_PHASE + 2, InjectDependencies),
        StepDefinition::new(
            "SanitizeDependencies",
            PROJECT_GENERATION_PHASE + 3,
            SanitizeDependencies,
        ),
    ]
}

/// Empties the persistent build directory, if the build has one
pub struct CleanUpBuildDir;

#[async_trait]
impl StepAction for CleanUpBuildDir {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let Some(dir) = ctx.build_dir() else {
            return Ok(());
        };
        if dir.exists() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("failed to remove build dir {}", dir.display()))?;
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create build dir {}", dir.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
        }

        debug!(dir = %dir.display(), "Cleaned build dir");
        Ok(())
    }
}

/// User settings with the build's servers injected, global settings with
/// the default and build repositories
pub struct GenerateProjectSettings;

#[async_trait]
impl StepAction for GenerateProjectSettings {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let maven = &ctx.build.maven;

        if let Some(settings) = maven.settings.as_deref().filter(|s| !s.trim().is_empty()) {
            validate_settings(settings)?;
            ctx.maven.user_settings = Some(inject_servers(settings, &maven.servers));
        }

        let mut repositories = default_repositories();
        for repo in &maven.repositories {
            if !repositories.iter().any(|r| r.url == repo.url) {
                repositories.push(repo.clone());
            }
        }
        ctx.maven.global_settings = Some(global_settings(&repositories));

        info!(
            user_settings = ctx.maven.user_settings.is_some(),
            repositories = repositories.len(),
            "Generated maven settings"
        );
        Ok(())
    }
}

pub struct InjectDependencies;

#[async_trait]
impl StepAction for InjectDependencies {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let catalog = ctx.catalog()?.clone();
        manage_integration_dependencies(&mut ctx.maven.project, &ctx.build.dependencies, &catalog)?;
        Ok(())
    }
}

pub struct SanitizeDependencies;

#[async_trait]
impl StepAction for SanitizeDependencies {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        sanitize_dependencies(&mut ctx.maven.project.dependencies)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BuilderTask, MavenBuildSpec, MavenServer, RuntimeCatalog, RuntimeSpec};
    use crate::cluster::MemoryCluster;
    use crate::config::BuilderConfig;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn context(task: BuilderTask, path: &std::path::Path) -> BuilderContext {
        BuilderContext::new(
            "kit-1",
            "ns",
            path,
            task,
            Arc::new(MemoryCluster::new()),
            Arc::new(BuilderConfig::default()),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_clean_up_build_dir() {
        let temp = TempDir::new().unwrap();
        let build_dir = temp.path().join("build");
        fs::create_dir_all(build_dir.join("stale")).unwrap();

        let task = BuilderTask {
            build_dir: Some(build_dir.display().to_string()),
            ..Default::default()
        };
        let mut ctx = context(task, temp.path());
        CleanUpBuildDir.execute(&mut ctx).await.unwrap();

        assert!(build_dir.exists());
        assert!(!build_dir.join("stale").exists());
    }

    #[tokio::test]
    async fn test_clean_up_without_build_dir_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(BuilderTask::default(), temp.path());
        CleanUpBuildDir.execute(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_generate_settings() {
        let temp = TempDir::new().unwrap();
        let task = BuilderTask {
            maven: MavenBuildSpec {
                settings: Some("<settings><servers/></settings>".to_string()),
                servers: vec![MavenServer {
                    id: "private".to_string(),
                    username: "u".to_string(),
                    password: "p".to_string(),
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let mut ctx = context(task, temp.path());
        GenerateProjectSettings.execute(&mut ctx).await.unwrap();

        assert!(ctx.maven.user_settings.unwrap().contains("<id>private</id>"));
        assert!(ctx
            .maven
            .global_settings
            .unwrap()
            .contains("https://repo.maven.apache.org/maven2"));
    }

    #[tokio::test]
    async fn test_malformed_settings_fail() {
        let temp = TempDir::new().unwrap();
        let task = BuilderTask {
            maven: MavenBuildSpec {
                settings: Some("<settings>".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut ctx = context(task, temp.path());
        assert!(GenerateProjectSettings.execute(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_inject_and_sanitize() {
        let temp = TempDir::new().unwrap();
        let task = BuilderTask {
            dependencies: vec![
                "camel:log".to_string(),
                "mvn:org.acme:lib:1.0".to_string(),
                "mvn:org.acme:lib:1.0".to_string(),
            ],
            ..Default::default()
        };
        let mut ctx = context(task, temp.path());
        ctx.catalog = Some(RuntimeCatalog::new(RuntimeSpec {
            version: "1.12.0".to_string(),
            ..Default::default()
        }));

        InjectDependencies.execute(&mut ctx).await.unwrap();
        SanitizeDependencies.execute(&mut ctx).await.unwrap();

        let ids: Vec<String> = ctx
            .maven
            .project
            .dependencies
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(ids, vec!["org.apache.camel:camel-log", "org.acme:lib:1.0"]);
    }

    #[tokio::test]
    async fn test_inject_requires_catalog() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(BuilderTask::default(), temp.path());
        assert!(InjectDependencies.execute(&mut ctx).await.is_err());
    }
}
