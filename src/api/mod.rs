//! Value types threaded through a build: artifacts, the published image
//! catalog, build specifications and status

pub mod artifact;
pub mod build;
pub mod catalog;

pub use artifact::{artifact_ids, Artifact, Resource};
pub use build::{
    Build, BuildConfiguration, BuildPhase, BuildSpec, BuildStatus, BuilderTask, CustomTask,
    JibTask, KanikoCache, KanikoTask, MavenBuildSpec, MavenRepository, MavenServer, PublishTask,
    RegistrySpec, S2iTask, SpectrumTask, Task,
};
pub use catalog::{
    CatalogArtifact, CatalogDependency, KitLayout, KitPhase, MavenArtifact, PublishedImage,
    RuntimeCatalog, RuntimeProvider, RuntimeSpec,
};
