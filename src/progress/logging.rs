//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { build, steps } => {
                info!(build = %build, steps, "Starting build");
            }
            ProgressEvent::StepStarted { step, phase } => {
                info!(step = %step, phase, "Executing step");
            }
            ProgressEvent::StepComplete { step, duration } => {
                debug!(
                    step = %step,
                    duration_ms = duration.as_millis(),
                    "Step complete"
                );
            }
            ProgressEvent::StepFailed { step, error } => {
                warn!(step = %step, error = %error, "Step failed");
            }
            ProgressEvent::TaskStarted { build, task } => {
                info!(build = %build, task = %task, "Starting task");
            }
            ProgressEvent::TaskComplete {
                build,
                task,
                phase,
                duration,
            } => {
                info!(
                    build = %build,
                    task = %task,
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Task complete"
                );
            }
            ProgressEvent::BuildCompleted { build, total_time } => {
                info!(
                    build = %build,
                    total_time_ms = total_time.as_millis(),
                    "Build complete"
                );
            }
            ProgressEvent::BuildFailed { build, error } => {
                warn!(build = %build, error = %error, "Build failed");
            }
            ProgressEvent::BuildInterrupted { build } => {
                warn!(build = %build, "Build interrupted");
            }
        }
    }
}
