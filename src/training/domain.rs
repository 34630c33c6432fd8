//! Domain types for model selection, fitting and persisted artifacts.

use std::fmt;
use std::path::Path;

use ndarray::{aview1, Array1, ArrayView1, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::common::config::{decode, ConfigError};
use crate::common::error::{PipelineError, PipelineResult};
use crate::data::domain::Record;
use crate::transform::domain::{FeatureMatrix, Preprocessor};

use super::knn::KnnModel;
use super::linear::LinearModel;
use super::tree::TreeModel;

/// Supported model families.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    Knn,
    DecisionTree,
}

impl ModelKind {
    /// Candidate order used by `auto` selection; earlier kinds win ties.
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LinearRegression,
        ModelKind::Knn,
        ModelKind::DecisionTree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::Knn => "knn",
            ModelKind::DecisionTree => "decision_tree",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearParams {
    /// Ridge penalty on the feature weights; the intercept is not penalized.
    pub alpha: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { alpha: 1e-6 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KnnParams {
    pub k: usize,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self { k: 5 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_split: 2,
        }
    }
}

/// Hyper-parameters for one model family.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelParams {
    LinearRegression(LinearParams),
    Knn(KnnParams),
    DecisionTree(TreeParams),
}

impl ModelParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelParams::LinearRegression(_) => ModelKind::LinearRegression,
            ModelParams::Knn(_) => ModelKind::Knn,
            ModelParams::DecisionTree(_) => ModelKind::DecisionTree,
        }
    }

    /// Decode the params node for `kind`; an absent node means defaults.
    pub fn from_node(kind: ModelKind, key: &str, node: Option<&Value>) -> Result<Self, ConfigError> {
        let params = match kind {
            ModelKind::LinearRegression => ModelParams::LinearRegression(params_or_default(key, node)?),
            ModelKind::Knn => ModelParams::Knn(params_or_default(key, node)?),
            ModelKind::DecisionTree => ModelParams::DecisionTree(params_or_default(key, node)?),
        };
        params.validate(key)?;
        Ok(params)
    }

    fn validate(&self, key: &str) -> Result<(), ConfigError> {
        let reason = match self {
            ModelParams::LinearRegression(p) if !(p.alpha >= 0.0 && p.alpha.is_finite()) => {
                Some("alpha must be a finite number >= 0")
            }
            ModelParams::Knn(p) if p.k == 0 => Some("k must be at least 1"),
            ModelParams::DecisionTree(p) if p.max_depth == 0 => Some("max_depth must be at least 1"),
            ModelParams::DecisionTree(p) if p.min_samples_split < 2 => {
                Some("min_samples_split must be at least 2")
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn params_or_default<T>(key: &str, node: Option<&Value>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    node.map(|n| decode(key, n))
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Expand a params node into every combination of its list values, in key order.
///
/// `{k: [3, 5], weights: x}` yields `{k: 3, weights: x}` then `{k: 5, weights: x}`.
/// An absent node is one point with all defaults.
fn expand_grid(key: &str, node: Option<&Value>) -> Result<Vec<Option<Value>>, ConfigError> {
    let Some(map) = node.and_then(Value::as_mapping) else {
        return Ok(vec![node.cloned()]);
    };

    let mut points = vec![Mapping::new()];
    for (field, value) in map {
        let options = match value {
            Value::Sequence(items) if items.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("empty value list for {field:?}"),
                });
            }
            Value::Sequence(items) => items.clone(),
            other => vec![other.clone()],
        };
        points = points
            .into_iter()
            .flat_map(|point| {
                options.iter().map(move |option| {
                    let mut next = point.clone();
                    next.insert(field.clone(), option.clone());
                    next
                })
            })
            .collect();
    }
    Ok(points.into_iter().map(|p| Some(Value::Mapping(p))).collect())
}

/// One model family with the parameter points to search.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamGrid {
    kind: ModelKind,
    points: Vec<ModelParams>,
}

impl ParamGrid {
    /// A grid with exactly one point; no search happens.
    pub fn single(params: ModelParams) -> Self {
        Self {
            kind: params.kind(),
            points: vec![params],
        }
    }

    pub fn from_node(kind: ModelKind, key: &str, node: Option<&Value>) -> Result<Self, ConfigError> {
        let points = expand_grid(key, node)?
            .iter()
            .map(|point| ModelParams::from_node(kind, key, point.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { kind, points })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn points(&self) -> &[ModelParams] {
        &self.points
    }
}

/// What `model.type` asked for.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSpec {
    Single(ParamGrid),
    /// Fit every candidate and keep the best test score.
    Auto(Vec<ParamGrid>),
}

impl ModelSpec {
    /// Build from `model.type` and the optional `model.params` node.
    ///
    /// For `auto`, `model.params` maps each kind name to that kind's params.
    /// Any param given as a list becomes a grid searched by cross-validation.
    pub fn from_config(model_type: &str, params: Option<&Value>) -> Result<Self, ConfigError> {
        if model_type == "auto" {
            if let Some(map) = params.and_then(Value::as_mapping) {
                for key in map.keys() {
                    let known = key.as_str().and_then(ModelKind::parse).is_some();
                    if !known {
                        return Err(ConfigError::InvalidValue {
                            key: "model.params".into(),
                            reason: format!("unknown model kind {key:?} for auto selection"),
                        });
                    }
                }
            }
            let candidates = ModelKind::ALL
                .into_iter()
                .map(|kind| {
                    let key = format!("model.params.{kind}");
                    ParamGrid::from_node(kind, &key, params.and_then(|p| p.get(kind.as_str())))
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ModelSpec::Auto(candidates));
        }

        let kind = ModelKind::parse(model_type).ok_or_else(|| ConfigError::InvalidValue {
            key: "model.type".into(),
            reason: format!(
                "unknown model type `{model_type}`, expected one of linear_regression, knn, decision_tree, auto"
            ),
        })?;
        Ok(ModelSpec::Single(ParamGrid::from_node(
            kind,
            "model.params",
            params,
        )?))
    }

    pub fn candidates(&self) -> &[ParamGrid] {
        match self {
            ModelSpec::Single(grid) => std::slice::from_ref(grid),
            ModelSpec::Auto(all) => all,
        }
    }
}

/// Anything that maps an encoded feature row to a numeric prediction.
pub trait Regressor {
    fn n_features(&self) -> usize;

    fn predict_one(&self, features: ArrayView1<f64>) -> f64;

    /// One prediction per row of `rows`.
    fn predict(&self, rows: ArrayView2<f64>) -> Array1<f64> {
        rows.outer_iter().map(|row| self.predict_one(row)).collect()
    }
}

/// Interface for components that can fit a model.
pub trait Trainer {
    fn fit(&self, data: &FeatureMatrix) -> PipelineResult<TrainedModel>;
}

/// Fitted model, tagged by family in its serialized form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainedModel {
    LinearRegression(LinearModel),
    Knn(KnnModel),
    DecisionTree(TreeModel),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
            TrainedModel::Knn(_) => ModelKind::Knn,
            TrainedModel::DecisionTree(_) => ModelKind::DecisionTree,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::DecisionTree(m) => m,
        }
    }
}

impl Regressor for TrainedModel {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        self.inner().predict_one(features)
    }

    fn predict(&self, rows: ArrayView2<f64>) -> Array1<f64> {
        self.inner().predict(rows)
    }
}

impl Trainer for ModelParams {
    fn fit(&self, data: &FeatureMatrix) -> PipelineResult<TrainedModel> {
        if data.is_empty() {
            return Err(PipelineError::invalid("cannot fit a model on zero rows"));
        }
        Ok(match self {
            ModelParams::LinearRegression(p) => TrainedModel::LinearRegression(LinearModel::fit(data, p)?),
            ModelParams::Knn(p) => TrainedModel::Knn(KnnModel::fit(data, p)),
            ModelParams::DecisionTree(p) => TrainedModel::DecisionTree(TreeModel::fit(data, p)),
        })
    }
}

pub const DEFAULT_CV_FOLDS: usize = 3;

/// Settings of the model fitting stage.
#[derive(Clone, Debug)]
pub struct TrainerConfig {
    pub spec: ModelSpec,
    /// Minimum test R² the chosen model must reach.
    pub min_score: Option<f64>,
    /// Folds used to pick a point from a parameter grid.
    pub cv_folds: usize,
    /// Seeds the fold assignment.
    pub random_state: u64,
}

/// Descriptive metadata stored next to the fitted state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub crate_version: String,
    pub model_kind: ModelKind,
    pub trained_at: String,
    pub target_column: String,
    pub feature_names: Vec<String>,
    pub dataset_fingerprint: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_score: f64,
}

/// Everything prediction needs: metadata, preprocessor and model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub preprocessor: Preprocessor,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn predict_record(&self, record: &Record) -> PipelineResult<f64> {
        let features = self.preprocessor.transform_record(record)?;
        if features.len() != self.model.n_features() {
            return Err(PipelineError::invalid(format!(
                "artifact is inconsistent: preprocessor yields {} features, model expects {}",
                features.len(),
                self.model.n_features()
            )));
        }
        Ok(self.model.predict_one(aview1(&features)))
    }
}

/// Repository contract for model artifacts.
pub trait ModelRepo {
    fn save(&self, path: &Path, artifact: &ModelArtifact) -> PipelineResult<()>;
    fn load(&self, path: &Path) -> PipelineResult<ModelArtifact>;
}
