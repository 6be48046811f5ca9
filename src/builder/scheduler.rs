use super::context::BuilderContext;
use super::step::Step;
use crate::error::{is_interruption, BuildError};
use crate::progress::{ProgressEvent, ProgressHandler};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs resolved steps against a context in ascending phase order
#[derive(Default)]
pub struct StepScheduler {
    progress_handler: Option<Arc<dyn ProgressHandler>>,
}

/// Stable order of execution: by phase, then by registration order
pub fn execution_order(mut steps: Vec<Step>) -> Vec<Step> {
    steps.sort_by_key(|s| (s.phase(), s.seq()));
    steps
}

impl StepScheduler {
    pub fn new(progress_handler: Option<Arc<dyn ProgressHandler>>) -> Self {
        Self { progress_handler }
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.progress_handler {
            handler.on_progress(&event);
        }
    }

    /// Stops at the first failing step or on cancellation of the context's
    /// token. Either way the error is recorded on the context and returned.
    pub async fn run(&self, ctx: &mut BuilderContext, steps: Vec<Step>) -> Result<()> {
        let start = Instant::now();
        let steps = execution_order(steps);
        let build = ctx.build_name.clone();

        info!(
            build = %build,
            steps = ?steps.iter().map(|s| s.id()).collect::<Vec<_>>(),
            "Running build steps"
        );
        self.emit(ProgressEvent::BuildStarted {
            build: build.clone(),
            steps: steps.len(),
        });

        for step in &steps {
            if ctx.cancel.is_cancelled() {
                return Err(self.fail(ctx, step, BuildError::Interrupted.into()));
            }

            self.emit(ProgressEvent::StepStarted {
                step: step.id().to_string(),
                phase: step.phase(),
            });

            let step_start = Instant::now();
            if let Err(err) = step.execute(ctx).await {
                let err = err.context(format!("step {} failed", step.id()));
                return Err(self.fail(ctx, step, err));
            }

            debug!(
                step = step.id(),
                phase = step.phase(),
                duration_ms = step_start.elapsed().as_millis(),
                "Step done"
            );
            self.emit(ProgressEvent::StepComplete {
                step: step.id().to_string(),
                duration: step_start.elapsed(),
            });
        }

        self.emit(ProgressEvent::BuildCompleted {
            build,
            total_time: start.elapsed(),
        });
        Ok(())
    }

    fn fail(&self, ctx: &mut BuilderContext, step: &Step, err: anyhow::Error) -> anyhow::Error {
        let message = format!("{:#}", err);
        ctx.error = Some(message.clone());

        if is_interruption(&err) {
            self.emit(ProgressEvent::BuildInterrupted {
                build: ctx.build_name.clone(),
            });
        } else {
            self.emit(ProgressEvent::StepFailed {
                step: step.id().to_string(),
                error: message.clone(),
            });
            self.emit(ProgressEvent::BuildFailed {
                build: ctx.build_name.clone(),
                error: message,
            });
        }
        err
    }
}
