//! Image context and Dockerfile generation

use crate::api::{Artifact, PublishedImage};
use crate::builder::context::{BuilderContext, DEPLOYMENT_DIR, MAVEN_DIR};
use crate::builder::selector::select_base;
use crate::builder::step::{StepAction, StepDefinition, APPLICATION_PACKAGE_PHASE};
use crate::builder::steps::quarkus::{INTEGRATION_ARTIFACT_ID, INTEGRATION_VERSION};
use crate::error::BuildError;
use crate::util::fs::{copy_file, write_file_with_content};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const GROUP: &str = "builder/image";

pub const INCREMENTAL_IMAGE_CONTEXT: &str = "builder/image/IncrementalImageContext";
pub const NATIVE_IMAGE_CONTEXT: &str = "builder/image/NativeImageContext";
pub const STANDARD_IMAGE_CONTEXT: &str = "builder/image/StandardImageContext";
pub const EXECUTABLE_DOCKERFILE: &str = "builder/image/ExecutableDockerfile";
pub const JVM_DOCKERFILE: &str = "builder/image/JvmDockerfile";

pub const NATIVE_BASE_IMAGE: &str = "quay.io/quarkus/quarkus-distroless-image:1.0";

pub fn steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new(
            "IncrementalImageContext",
            APPLICATION_PACKAGE_PHASE,
            IncrementalImageContext,
        ),
        StepDefinition::new("NativeImageContext", APPLICATION_PACKAGE_PHASE, NativeImageContext),
        StepDefinition::new(
            "StandardImageContext",
            APPLICATION_PACKAGE_PHASE,
            StandardImageContext,
        ),
        StepDefinition::new(
            "ExecutableDockerfile",
            APPLICATION_PACKAGE_PHASE + 1,
            ExecutableDockerfile,
        ),
        StepDefinition::new("JvmDockerfile", APPLICATION_PACKAGE_PHASE + 1, JvmDockerfile),
    ]
}

/// Copies the selected artifacts and injected resources into the context
/// directory
fn image_context(ctx: &BuilderContext) -> Result<()> {
    let context_dir = ctx.context_dir();
    fs::create_dir_all(&context_dir)
        .with_context(|| format!("failed to create {}", context_dir.display()))?;

    for entry in &ctx.selected_artifacts {
        let dst = context_dir.join(&entry.target);
        copy_file(Path::new(&entry.location), &dst)
            .with_context(|| format!("failed to copy artifact {}", entry.id))?;
    }

    for resource in &ctx.resources {
        let target = Path::new(&resource.target);
        let dir = match target.parent() {
            Some(parent) => context_dir.join(parent),
            None => context_dir.clone(),
        };
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_file_with_content(&dir, &name, resource.content.as_bytes())
            .with_context(|| format!("failed to write resource {}", resource.target))?;
    }

    debug!(
        artifacts = ctx.selected_artifacts.len(),
        resources = ctx.resources.len(),
        "Prepared image context"
    );
    Ok(())
}

/// Every artifact goes into the image
pub struct StandardImageContext;

#[async_trait]
impl StepAction for StandardImageContext {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        ctx.selected_artifacts = ctx.artifacts.clone();
        image_context(ctx)
    }
}

/// Published images of the namespace usable as a base for this build
async fn list_published_images(ctx: &BuilderContext) -> Result<Vec<PublishedImage>> {
    let runtime = ctx.runtime();
    let images = ctx
        .cluster
        .list_published_images(&ctx.namespace, runtime)
        .await
        .context("failed to list published images")?;
    Ok(images.into_iter().filter(|i| i.is_eligible(runtime)).collect())
}

/// Layers only the artifacts missing from the best published image
pub struct IncrementalImageContext;

#[async_trait]
impl StepAction for IncrementalImageContext {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        if ctx.has_required_image() {
            return StandardImageContext.execute(ctx).await;
        }

        let images = list_published_images(ctx).await?;
        let default_base = if ctx.base_image.is_empty() {
            ctx.config.base_image.clone()
        } else {
            ctx.base_image.clone()
        };
        let selection = select_base(&images, &ctx.artifacts, &default_base);

        info!(
            build = %ctx.build_name,
            candidates = images.len(),
            base_image = %selection.base_image,
            reused = selection.reused.is_some(),
            selected = selection.selected_artifacts.len(),
            "Selected base image"
        );

        ctx.base_image = selection.base_image;
        ctx.selected_artifacts = selection.selected_artifacts;
        image_context(ctx)
    }
}

/// Single native runner on a distroless base
pub struct NativeImageContext;

#[async_trait]
impl StepAction for NativeImageContext {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        let runner = format!("{}-{}-runner", INTEGRATION_ARTIFACT_ID, INTEGRATION_VERSION);
        let location = ctx.path.join(MAVEN_DIR).join("target").join(&runner);

        ctx.base_image = NATIVE_BASE_IMAGE.to_string();
        ctx.artifacts = vec![Artifact::new(
            runner.clone(),
            location.display().to_string(),
            runner,
        )];
        ctx.selected_artifacts = ctx.artifacts.clone();
        image_context(ctx)
    }
}

pub fn jvm_dockerfile(base_image: &str) -> String {
    format!(
        "FROM {base}\nADD . {dir}\nUSER 1000\n",
        base = base_image,
        dir = DEPLOYMENT_DIR
    )
}

pub fn executable_dockerfile(base_image: &str) -> String {
    format!(
        "FROM {base}\nWORKDIR {dir}\nCOPY --chown=nonroot:root . {dir}\nUSER nonroot\n",
        base = base_image,
        dir = DEPLOYMENT_DIR
    )
}

fn write_dockerfile(ctx: &BuilderContext, content: String) -> Result<()> {
    if ctx.base_image.is_empty() {
        return Err(BuildError::MissingBaseImage.into());
    }
    let context_dir = ctx.context_dir();
    write_file_with_content(&context_dir, "Dockerfile", content.as_bytes())
        .with_context(|| format!("failed to write Dockerfile in {}", context_dir.display()))?;
    Ok(())
}

pub struct JvmDockerfile;

#[async_trait]
impl StepAction for JvmDockerfile {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        write_dockerfile(ctx, jvm_dockerfile(&ctx.base_image))
    }
}

pub struct ExecutableDockerfile;

#[async_trait]
impl StepAction for ExecutableDockerfile {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        write_dockerfile(ctx, executable_dockerfile(&ctx.base_image))
    }
}
