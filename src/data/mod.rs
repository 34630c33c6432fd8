//! Data domain: raw dataset ingestion and train/test splitting.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{is_missing, DatasetRepo, IngestionConfig, Record, Split, Table};
pub use repo_fs::FsDatasetRepo;
