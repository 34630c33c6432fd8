//! Training domain: model families, candidate selection and artifact storage.

pub mod cv;
pub mod domain;
pub mod knn;
pub mod linear;
pub mod repo_fs;
pub mod service;
pub mod tree;

pub use domain::{
    ArtifactMetadata, ModelArtifact, ModelKind, ModelParams, ModelRepo, ModelSpec, ParamGrid,
    Regressor, TrainedModel, Trainer, TrainerConfig,
};
pub use repo_fs::FsModelRepo;
