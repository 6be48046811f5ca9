//! Built-in step groups

pub mod image;
pub mod project;
pub mod quarkus;

use super::registry::{RegistryError, StepRegistry};

pub fn register_defaults(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    registry.register(project::GROUP, project::steps())?;
    registry.register(quarkus::GROUP, quarkus::steps())?;
    registry.register(image::GROUP, image::steps())?;
    Ok(())
}

/// Step IDs of a JVM build that reuses published images as bases
pub fn default_build_steps() -> Vec<String> {
    [
        quarkus::LOAD_CATALOG,
        project::CLEAN_UP_BUILD_DIR,
        quarkus::GENERATE_PROJECT,
        project::GENERATE_SETTINGS,
        project::INJECT_DEPENDENCIES,
        project::SANITIZE_DEPENDENCIES,
        quarkus::BUILD_RUNNER,
        quarkus::COMPUTE_DEPENDENCIES,
    ]
    .iter()
    .map(|id| id.to_string())
    .collect()
}

/// Step IDs of the package task following [`default_build_steps`]
pub fn default_package_steps() -> Vec<String> {
    [image::INCREMENTAL_IMAGE_CONTEXT, image::JVM_DOCKERFILE]
        .iter()
        .map(|id| id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lists_resolve() {
        let registry = StepRegistry::with_defaults().unwrap();
        assert!(registry.resolve(&default_build_steps()).is_ok());
        assert!(registry.resolve(&default_package_steps()).is_ok());
    }

    #[test]
    fn test_registering_defaults_twice_fails() {
        let mut registry = StepRegistry::with_defaults().unwrap();
        assert!(matches!(
            register_defaults(&mut registry),
            Err(RegistryError::DuplicateStep(_))
        ));
    }
}
