//! Build orchestration
//!
//! Steps are registered once in a [`StepRegistry`], resolved per build and
//! run by the [`StepScheduler`] against a [`BuilderContext`]. Tasks wrap
//! either a step pipeline or an external publishing mechanism and report a
//! [`BuildStatus`](crate::api::BuildStatus).

pub mod assembler;
pub mod context;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod step;
pub mod steps;
pub mod tasks;

pub use assembler::{AssembleRequest, DockerAssembler, ImageAssembler};
pub use context::BuilderContext;
pub use queue::{BuildQueue, LocalBuilder, LocalBuilderDeps, QueueError, TaskRequest};
pub use registry::{RegistryError, StepRegistry};
pub use scheduler::StepScheduler;
pub use selector::{find_best_image, select_base, Selection};
pub use step::{Step, StepAction, StepDefinition};
pub use tasks::{new_task, run_build, run_task, task_by_name, BuildTask, TaskEnv};
