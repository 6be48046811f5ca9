//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a build runs
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Step pipeline started
    BuildStarted { build: String, steps: usize },

    /// Step started
    StepStarted { step: String, phase: i32 },

    /// Step completed
    StepComplete { step: String, duration: Duration },

    /// Step returned an error, no further steps run
    StepFailed { step: String, error: String },

    /// Task dispatched
    TaskStarted { build: String, task: String },

    /// Task reached a terminal phase
    TaskComplete {
        build: String,
        task: String,
        phase: String,
        duration: Duration,
    },

    /// All steps completed
    BuildCompleted { build: String, total_time: Duration },

    /// Pipeline stopped on a step error
    BuildFailed { build: String, error: String },

    /// Pipeline stopped on cancellation
    BuildInterrupted { build: String },
}

/// Trait for handling progress events during a build
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::BuildStarted {
            build: "kit-1".to_string(),
            steps: 3,
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::StepStarted {
            step: "builder/project/CleanUpBuildDir".to_string(),
            phase: 9,
        });
        handler.on_progress(&ProgressEvent::StepComplete {
            step: "builder/project/CleanUpBuildDir".to_string(),
            duration: Duration::from_millis(5),
        });
        handler.on_progress(&ProgressEvent::BuildCompleted {
            build: "kit-1".to_string(),
            total_time: Duration::from_secs(1),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::StepStarted {
            step: "builder/image/JvmDockerfile".to_string(),
            phase: 31,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("StepStarted"));
        assert!(debug_str.contains("phase: 31"));
    }
}
