use super::step::{step_id, Step, StepDefinition};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a step with ID {0} is already registered")]
    DuplicateStep(String),

    #[error("unknown build step: {0}")]
    UnknownStep(String),
}

/// Named steps, written once at start-up and read-only afterwards
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<String, Step>,
    order: Vec<String>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in step group
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        super::steps::register_defaults(&mut registry)?;
        Ok(registry)
    }

    /// Registers every step of `group` under `<group>/<name>`. Nothing is
    /// registered if any ID of the group is already taken.
    pub fn register(
        &mut self,
        group: &str,
        definitions: Vec<StepDefinition>,
    ) -> Result<(), RegistryError> {
        let mut ids = Vec::with_capacity(definitions.len());
        for def in &definitions {
            let id = step_id(group, def.name);
            if self.steps.contains_key(&id) || ids.contains(&id) {
                return Err(RegistryError::DuplicateStep(id));
            }
            ids.push(id);
        }

        for (id, def) in ids.into_iter().zip(definitions) {
            let step = Step::new(id.clone(), def.phase, self.order.len(), def.action);
            debug!(step = %id, phase = def.phase, "Registered step");
            self.order.push(id.clone());
            self.steps.insert(id, step);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    /// Looks up each requested ID, keeping request order
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Step>, RegistryError> {
        ids.iter()
            .map(|id| {
                self.get(id)
                    .cloned()
                    .ok_or_else(|| RegistryError::UnknownStep(id.clone()))
            })
            .collect()
    }

    /// Registered steps in registration order
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.order.iter().filter_map(|id| self.steps.get(id))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::step::{FnStep, INIT_PHASE, PROJECT_BUILD_PHASE};

    fn noop(name: &'static str, phase: i32) -> StepDefinition {
        StepDefinition::new(name, phase, FnStep::new(|_| Ok(())))
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = StepRegistry::new();
        registry
            .register("test", vec![noop("A", INIT_PHASE), noop("B", PROJECT_BUILD_PHASE)])
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec!["test/A", "test/B"]);

        let steps = registry
            .resolve(&["test/B".to_string(), "test/A".to_string()])
            .unwrap();
        assert_eq!(steps[0].id(), "test/B");
        assert_eq!(steps[1].seq(), 0);
    }

    #[test]
    fn test_unknown_step() {
        let registry = StepRegistry::new();
        let err = registry.resolve(&["test/Missing".to_string()]).unwrap_err();
        assert_eq!(err, RegistryError::UnknownStep("test/Missing".to_string()));
    }

    #[test]
    fn test_duplicate_group_is_rejected_whole() {
        let mut registry = StepRegistry::new();
        registry.register("test", vec![noop("A", INIT_PHASE)]).unwrap();

        let err = registry
            .register("test", vec![noop("C", INIT_PHASE), noop("A", INIT_PHASE)])
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateStep("test/A".to_string()));
        assert!(registry.get("test/C").is_none());

        let err = registry
            .register("other", vec![noop("D", INIT_PHASE), noop("D", INIT_PHASE)])
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateStep("other/D".to_string()));
    }

    #[test]
    fn test_defaults_register_cleanly() {
        let registry = StepRegistry::with_defaults().unwrap();
        assert!(registry.get("builder/project/CleanUpBuildDir").is_some());
        assert!(registry.get("builder/image/IncrementalImageContext").is_some());
        assert!(registry.get("builder/quarkus/BuildQuarkusRunner").is_some());
    }
}
