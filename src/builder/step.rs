//! Phase-tagged units of work operating on a [`BuilderContext`]

use super::context::BuilderContext;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub const INIT_PHASE: i32 = 0;
pub const PROJECT_GENERATION_PHASE: i32 = 10;
pub const PROJECT_BUILD_PHASE: i32 = 20;
pub const APPLICATION_PACKAGE_PHASE: i32 = 30;
pub const APPLICATION_PUBLISH_PHASE: i32 = 40;
pub const NOTIFY_PHASE: i32 = i32::MAX;

#[async_trait]
pub trait StepAction: Send + Sync {
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()>;
}

/// Adapts a synchronous closure into a step action
pub struct FnStep<F>(F);

impl<F> FnStep<F>
where
    F: Fn(&mut BuilderContext) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> StepAction for FnStep<F>
where
    F: Fn(&mut BuilderContext) -> Result<()> + Send + Sync,
{
    async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        (self.0)(ctx)
    }
}

/// `<group>/<name>`
pub fn step_id(group: &str, name: &str) -> String {
    format!("{}/{}", group, name)
}

/// A step as declared by its group, before the registry assigns its ID
pub struct StepDefinition {
    pub name: &'static str,
    pub phase: i32,
    pub action: Arc<dyn StepAction>,
}

impl StepDefinition {
    pub fn new(name: &'static str, phase: i32, action: impl StepAction + 'static) -> Self {
        Self {
            name,
            phase,
            action: Arc::new(action),
        }
    }
}

/// A registered step. `seq` is the registration order, used to keep steps
/// of the same phase stable.
#[derive(Clone)]
pub struct Step {
    id: String,
    phase: i32,
    seq: usize,
    action: Arc<dyn StepAction>,
}

impl Step {
    pub(crate) fn new(id: String, phase: i32, seq: usize, action: Arc<dyn StepAction>) -> Self {
        Self {
            id,
            phase,
            seq,
            action,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> i32 {
        self.phase
    }

    pub fn seq(&self) -> usize {
        self.seq
    }

    pub async fn execute(&self, ctx: &mut BuilderContext) -> Result<()> {
        self.action.execute(ctx).await
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .finish()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.phase)
    }
}
