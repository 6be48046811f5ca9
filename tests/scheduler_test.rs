//! Step registry and scheduler integration tests

mod support;

use anyhow::anyhow;
use kitbuilder::api::BuilderTask;
use kitbuilder::builder::step::{FnStep, PROJECT_BUILD_PHASE, PROJECT_GENERATION_PHASE};
use kitbuilder::builder::steps::{default_build_steps, default_package_steps};
use kitbuilder::builder::{
    BuilderContext, RegistryError, StepDefinition, StepRegistry, StepScheduler,
};
use kitbuilder::cluster::MemoryCluster;
use kitbuilder::error::is_interruption;
use kitbuilder::progress::ProgressEvent;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use support::{test_config, RecordingHandler};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn noop(name: &'static str, phase: i32) -> StepDefinition {
    StepDefinition::new(name, phase, FnStep::new(|_ctx: &mut BuilderContext| Ok(())))
}

fn context(dir: &TempDir, cancel: CancellationToken) -> BuilderContext {
    BuilderContext::new(
        "kit-test",
        "test",
        dir.path(),
        BuilderTask {
            name: "builder".to_string(),
            ..Default::default()
        },
        Arc::new(MemoryCluster::new()),
        Arc::new(test_config()),
        cancel,
    )
}

fn ids(steps: &[&str]) -> Vec<String> {
    steps.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_steps_run_by_phase_then_registration_order() {
    let mut registry = StepRegistry::new();
    registry
        .register(
            "a",
            vec![noop("Late", PROJECT_BUILD_PHASE), noop("Early", PROJECT_GENERATION_PHASE)],
        )
        .unwrap();
    registry
        .register("b", vec![noop("Middle", PROJECT_GENERATION_PHASE)])
        .unwrap();

    let steps = registry.resolve(&ids(&["a/Late", "b/Middle", "a/Early"])).unwrap();

    let handler = Arc::new(RecordingHandler::new());
    let scheduler = StepScheduler::new(Some(handler.clone()));
    let temp = TempDir::new().unwrap();
    let mut ctx = context(&temp, CancellationToken::new());

    scheduler.run(&mut ctx, steps).await.unwrap();

    assert_eq!(handler.started_steps(), vec!["a/Early", "b/Middle", "a/Late"]);
    assert!(ctx.error.is_none());
    assert!(matches!(
        handler.events().last(),
        Some(ProgressEvent::BuildCompleted { .. })
    ));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = StepRegistry::new();
    registry.register("a", vec![noop("One", 0)]).unwrap();

    let err = registry
        .register("a", vec![noop("Two", 0), noop("One", 0)])
        .unwrap_err();

    assert_eq!(err, RegistryError::DuplicateStep("a/One".to_string()));
    // the group is rejected as a whole
    assert_eq!(registry.ids(), vec!["a/One"]);
}

#[test]
fn test_duplicate_within_group() {
    let mut registry = StepRegistry::new();
    let err = registry
        .register("a", vec![noop("Same", 0), noop("Same", 1)])
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateStep("a/Same".to_string()));
    assert!(registry.is_empty());
}

#[test]
fn test_same_name_in_different_groups() {
    let mut registry = StepRegistry::new();
    registry.register("a", vec![noop("Same", 0)]).unwrap();
    registry.register("b", vec![noop("Same", 0)]).unwrap();

    assert_eq!(registry.len(), 2);
    let steps = registry.resolve(&ids(&["a/Same", "b/Same"])).unwrap();
    let resolved: Vec<&str> = steps.iter().map(|s| s.id()).collect();
    assert_eq!(resolved, vec!["a/Same", "b/Same"]);
}

#[test]
fn test_unknown_step() {
    let registry = StepRegistry::with_defaults().unwrap();
    let err = registry.resolve(&ids(&["nope/Missing"])).unwrap_err();
    assert_eq!(err, RegistryError::UnknownStep("nope/Missing".to_string()));
}

#[test]
fn test_default_step_lists_resolve() {
    let registry = StepRegistry::with_defaults().unwrap();
    assert!(!registry.is_empty());
    assert!(registry.resolve(&default_build_steps()).is_ok());
    assert!(registry.resolve(&default_package_steps()).is_ok());
}

#[tokio::test]
async fn test_first_failure_stops_the_pipeline() {
    let later_runs = Arc::new(AtomicUsize::new(0));
    let counter = later_runs.clone();

    let mut registry = StepRegistry::new();
    registry
        .register(
            "g",
            vec![
                StepDefinition::new(
                    "Broken",
                    10,
                    FnStep::new(|_ctx: &mut BuilderContext| Err(anyhow!("boom"))),
                ),
                StepDefinition::new(
                    "After",
                    20,
                    FnStep::new(move |_ctx: &mut BuilderContext| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                ),
            ],
        )
        .unwrap();

    let steps = registry.resolve(&ids(&["g/After", "g/Broken"])).unwrap();
    let handler = Arc::new(RecordingHandler::new());
    let temp = TempDir::new().unwrap();
    let mut ctx = context(&temp, CancellationToken::new());

    let err = StepScheduler::new(Some(handler.clone()))
        .run(&mut ctx, steps)
        .await
        .unwrap_err();

    assert_eq!(later_runs.load(Ordering::SeqCst), 0);
    assert!(!is_interruption(&err));
    let message = ctx.error.unwrap();
    assert!(message.contains("g/Broken"));
    assert!(message.contains("boom"));
    assert!(handler
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::StepFailed { step, .. } if step == "g/Broken")));
    assert!(handler
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::BuildFailed { .. })));
}

#[tokio::test]
async fn test_cancellation_between_steps() {
    let mut registry = StepRegistry::new();
    registry
        .register(
            "g",
            vec![
                StepDefinition::new(
                    "CancelBuild",
                    10,
                    FnStep::new(|ctx: &mut BuilderContext| {
                        ctx.cancel.cancel();
                        Ok(())
                    }),
                ),
                noop("NeverRuns", 20),
            ],
        )
        .unwrap();

    let steps = registry.resolve(&ids(&["g/CancelBuild", "g/NeverRuns"])).unwrap();
    let handler = Arc::new(RecordingHandler::new());
    let temp = TempDir::new().unwrap();
    let mut ctx = context(&temp, CancellationToken::new());

    let err = StepScheduler::new(Some(handler.clone()))
        .run(&mut ctx, steps)
        .await
        .unwrap_err();

    assert!(is_interruption(&err));
    assert_eq!(handler.started_steps(), vec!["g/CancelBuild"]);
    assert!(handler
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::BuildInterrupted { .. })));
}

#[tokio::test]
async fn test_empty_step_list_succeeds() {
    let temp = TempDir::new().unwrap();
    let mut ctx = context(&temp, CancellationToken::new());
    StepScheduler::default().run(&mut ctx, Vec::new()).await.unwrap();
    assert!(ctx.error.is_none());
}
