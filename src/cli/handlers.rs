use super::commands::{RunArgs, SelectArgs, StepsArgs};
use crate::api::{Artifact, Build, BuildPhase, BuildStatus};
use crate::builder::{run_build, run_task, select_base, StepRegistry, TaskEnv};
use crate::cluster::{LocalCatalog, LocalCluster};
use crate::config::BuilderConfig;
use crate::progress::LoggingHandler;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Exit code of a build that ended in `phase`
pub fn exit_code(phase: BuildPhase) -> i32 {
    match phase {
        BuildPhase::Succeeded => 0,
        BuildPhase::Interrupted => 130,
        _ => 1,
    }
}

fn load_build(path: &Path) -> Result<Build> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read build file {}", path.display()))?;
    let build: Build = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse build file {}", path.display()))?;
    if build.name.is_empty() {
        anyhow::bail!("Build file {} has no name", path.display());
    }
    Ok(build)
}

fn run_config(args: &RunArgs) -> Result<BuilderConfig> {
    let mut config = BuilderConfig::default();
    if let Some(dir) = &args.build_dir {
        config = config.with_build_dir(dir);
    }
    if let Some(raw) = &args.wait_timeout {
        config = config.with_wait_timeout(BuilderConfig::parse_timeout("wait-timeout", raw)?);
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(args: &RunArgs) -> Result<BuildStatus> {
    let config = run_config(args)?;
    debug!("{}", config);
    let build = load_build(&args.build)?;

    let mut cluster = LocalCluster::new();
    if let Some(catalog) = &args.catalog {
        cluster = cluster.with_catalog(catalog);
    }
    if let Some(secrets) = &args.secrets_dir {
        cluster = cluster.with_secrets_dir(secrets);
    }

    let registry = StepRegistry::with_defaults()?;
    let work_dir = config.build_dir.join(&build.name);
    fs::create_dir_all(&work_dir)
        .with_context(|| format!("Failed to create build directory {}", work_dir.display()))?;

    let env = TaskEnv::new(
        build,
        Arc::new(cluster),
        Arc::new(config),
        Arc::new(registry),
    )
    .with_work_dir(work_dir)
    .with_progress(Arc::new(LoggingHandler));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping build");
            on_signal.cancel();
        }
    });

    let status = match &args.task {
        Some(task) => run_task(&env, task, &cancel).await,
        None => run_build(&env, &cancel).await,
    };
    Ok(status)
}

pub async fn handle_run(args: &RunArgs, quiet: bool) -> i32 {
    match run(args).await {
        Ok(status) => {
            if !quiet {
                if let Err(e) = print_json(&status) {
                    error!("Failed to print build status: {}", e);
                    return 1;
                }
            }
            if !status.error.is_empty() {
                error!(phase = %status.phase, "{}", status.error);
            } else {
                info!(phase = %status.phase, image = %status.image, "Build finished");
            }
            exit_code(status.phase)
        }
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

#[derive(Debug, Serialize)]
struct StepInfo<'a> {
    id: &'a str,
    phase: i32,
}

pub fn handle_steps(args: &StepsArgs) -> i32 {
    let registry = match StepRegistry::with_defaults() {
        Ok(registry) => registry,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let steps: Vec<StepInfo> = registry
        .steps()
        .map(|s| StepInfo {
            id: s.id(),
            phase: s.phase(),
        })
        .collect();

    if args.json {
        if let Err(e) = print_json(&steps) {
            error!("{}", e);
            return 1;
        }
    } else {
        for step in &steps {
            println!("{:>4}  {}", step.phase, step.id);
        }
    }
    0
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectOutput {
    base_image: String,
    reused: Option<String>,
    selected_artifacts: Vec<Artifact>,
}

fn select(args: &SelectArgs) -> Result<SelectOutput> {
    let catalog = LocalCatalog::load(&args.catalog)?;
    let content = fs::read_to_string(&args.artifacts)
        .with_context(|| format!("Failed to read {}", args.artifacts.display()))?;
    let required: Vec<Artifact> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", args.artifacts.display()))?;

    let default_base = match &args.base_image {
        Some(image) => image.clone(),
        None => BuilderConfig::default().base_image,
    };

    let selection = select_base(&catalog.published_images, &required, &default_base);
    Ok(SelectOutput {
        base_image: selection.base_image,
        reused: selection.reused,
        selected_artifacts: selection.selected_artifacts,
    })
}

pub fn handle_select(args: &SelectArgs) -> i32 {
    match select(args).and_then(|out| print_json(&out)) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}
