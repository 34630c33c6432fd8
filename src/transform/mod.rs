//! Transformation domain: imputation, scaling and encoding of tabular features.

pub mod domain;
pub mod service;

pub use domain::{ColumnEncoder, FeatureMatrix, Preprocessor, TransformationConfig};
