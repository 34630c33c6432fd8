//! Model fitting stage: search each family's grid, score on the test split, keep the best.

use serde::Serialize;
use tracing::{info, warn};

use crate::common::error::{PipelineError, PipelineResult, ResultExt};
use crate::evaluation::service::r2_score;
use crate::transform::domain::FeatureMatrix;

use super::cv::{grid_search, kfold};
use super::domain::{
    ModelKind, ModelParams, ModelSpec, ParamGrid, Regressor, TrainedModel, Trainer, TrainerConfig,
};

/// Scores of one fitted candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateScore {
    pub model: ModelKind,
    /// Parameter point that was fitted.
    pub params: ModelParams,
    /// Mean validation R² of that point; absent when the grid had a single point.
    pub cv_r2: Option<f64>,
    pub train_r2: f64,
    /// Test R², the selection criterion.
    pub r2: f64,
}

#[derive(Clone, Debug)]
pub struct TrainOutput {
    pub model: TrainedModel,
    pub test_score: f64,
    /// Every candidate, best first.
    pub leaderboard: Vec<CandidateScore>,
}

impl TrainOutput {
    pub fn kind(&self) -> ModelKind {
        self.model.kind()
    }
}

/// Pick the grid point to fit on the whole training split.
fn choose_point<'a>(
    cfg: &TrainerConfig,
    grid: &'a ParamGrid,
    train: &FeatureMatrix,
) -> PipelineResult<(&'a ModelParams, Option<f64>)> {
    match grid.points() {
        [only] => Ok((only, None)),
        points => {
            let folds = kfold(train.len(), cfg.cv_folds, cfg.random_state)?;
            let (params, score) = grid_search(points, train, &folds)?;
            info!(
                model = %grid.kind(),
                points = points.len(),
                params = ?params,
                cv_r2 = score,
                "grid search finished"
            );
            Ok((params, Some(score)))
        }
    }
}

/// Fit the configured candidates and return the one with the highest test R².
///
/// Families with several parameter points are first narrowed to one point by
/// k-fold cross-validation on the training split. Ties keep the earliest
/// candidate. A configured `min_score` that the winner misses turns into
/// [`PipelineError::QualityGate`].
pub fn train(
    cfg: &TrainerConfig,
    train: &FeatureMatrix,
    test: &FeatureMatrix,
) -> PipelineResult<TrainOutput> {
    if train.width() != test.width() {
        return Err(PipelineError::invalid(format!(
            "train has {} features but test has {}",
            train.width(),
            test.width()
        )));
    }

    let mut best: Option<(TrainedModel, f64)> = None;
    let mut scores = Vec::with_capacity(cfg.spec.candidates().len());
    for grid in cfg.spec.candidates() {
        let kind = grid.kind();
        let (params, cv_r2) =
            choose_point(cfg, grid, train).wrap_err_with(|| format!("searching {kind} parameters"))?;
        let model = params
            .fit(train)
            .wrap_err_with(|| format!("fitting {kind}"))?;
        let train_r2 = r2_score(train.targets.view(), model.predict(train.rows.view()).view());
        let r2 = r2_score(test.targets.view(), model.predict(test.rows.view()).view());
        info!(model = %kind, train_r2, r2, "candidate scored");
        scores.push(CandidateScore {
            model: kind,
            params: params.clone(),
            cv_r2,
            train_r2,
            r2,
        });

        let better = best.as_ref().map_or(true, |(_, top)| r2 > *top);
        if better {
            best = Some((model, r2));
        }
    }

    let (model, test_score) =
        best.ok_or_else(|| PipelineError::invalid("no model candidates configured"))?;

    let mut leaderboard = scores;
    // Stable sort keeps configuration order among equal scores.
    leaderboard.sort_by(|a, b| b.r2.total_cmp(&a.r2));
    if matches!(cfg.spec, ModelSpec::Auto(_)) {
        let ranking: Vec<String> = leaderboard
            .iter()
            .map(|c| format!("{}={:.4} (train {:.4})", c.model, c.r2, c.train_r2))
            .collect();
        info!(ranking = %ranking.join(", "), "model leaderboard");
    }
    info!(model = %model.kind(), r2 = test_score, "best model selected");

    if let Some(threshold) = cfg.min_score {
        if test_score < threshold {
            warn!(model = %model.kind(), r2 = test_score, threshold, "quality gate failed");
            return Err(PipelineError::QualityGate {
                model: model.kind().to_string(),
                score: test_score,
                threshold,
            });
        }
    }

    Ok(TrainOutput {
        model,
        test_score,
        leaderboard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorCode;
    use crate::training::domain::{KnnParams, DEFAULT_CV_FOLDS};

    fn line(range: std::ops::Range<i32>, noise: f64) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec!["x".into()],
            range.clone().map(|i| vec![i as f64]).collect(),
            range
                .map(|i| 2.0 * i as f64 + 1.0 + if i % 2 == 0 { noise } else { -noise })
                .collect(),
        )
        .unwrap()
    }

    fn linear_data(range: std::ops::Range<i32>) -> FeatureMatrix {
        line(range, 0.0)
    }

    fn config(spec: ModelSpec, min_score: Option<f64>) -> TrainerConfig {
        TrainerConfig {
            spec,
            min_score,
            cv_folds: DEFAULT_CV_FOLDS,
            random_state: 42,
        }
    }

    fn named(model_type: &str, min_score: Option<f64>) -> TrainerConfig {
        config(ModelSpec::from_config(model_type, None).unwrap(), min_score)
    }

    #[test]
    fn auto_picks_linear_for_linear_data() {
        let out = train(&named("auto", None), &linear_data(0..40), &linear_data(40..50)).unwrap();
        assert_eq!(out.kind(), ModelKind::LinearRegression);
        assert!(out.test_score > 0.999);
        assert_eq!(out.leaderboard.len(), 3);
        assert_eq!(out.leaderboard[0].model, ModelKind::LinearRegression);
        assert!(out
            .leaderboard
            .windows(2)
            .all(|w| w[0].r2 >= w[1].r2));
        assert!(out.leaderboard.iter().all(|c| c.cv_r2.is_none()));
    }

    #[test]
    fn single_model_is_used_as_is() {
        let cfg = config(
            ModelSpec::Single(ParamGrid::single(ModelParams::Knn(KnnParams { k: 1 }))),
            None,
        );
        let out = train(&cfg, &linear_data(0..20), &linear_data(0..5)).unwrap();
        assert_eq!(out.kind(), ModelKind::Knn);
        assert_eq!(out.test_score, 1.0);
        assert_eq!(out.leaderboard.len(), 1);
        // one neighbour reproduces the training targets exactly
        assert_eq!(out.leaderboard[0].train_r2, 1.0);
    }

    #[test]
    fn grid_point_is_chosen_by_cross_validation() {
        let params: serde_yaml::Value = serde_yaml::from_str("k: [1, 4]").unwrap();
        let cfg = config(ModelSpec::from_config("knn", Some(&params)).unwrap(), None);
        let out = train(&cfg, &line(0..60, 3.0), &line(60..70, 3.0)).unwrap();

        let winner = &out.leaderboard[0];
        assert_eq!(winner.params, ModelParams::Knn(KnnParams { k: 4 }));
        assert!(winner.cv_r2.is_some());
        // k = 4 no longer memorises the noise
        assert!(winner.train_r2 < 1.0);
        match &out.model {
            TrainedModel::Knn(m) => assert_eq!(m.k, 4),
            other => panic!("expected knn, got {other:?}"),
        }
    }

    #[test]
    fn grid_search_needs_enough_rows_per_fold() {
        let params: serde_yaml::Value = serde_yaml::from_str("k: [1, 2]").unwrap();
        let mut cfg = config(ModelSpec::from_config("knn", Some(&params)).unwrap(), None);
        cfg.cv_folds = 5;
        let err = train(&cfg, &linear_data(0..3), &linear_data(3..5)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }

    #[test]
    fn quality_gate_rejects_weak_models() {
        // Extrapolating far outside the training range ruins the tree.
        let err = train(
            &named("decision_tree", Some(0.6)),
            &linear_data(0..20),
            &linear_data(100..120),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::QualityGate);
    }

    #[test]
    fn width_mismatch_is_invalid_input() {
        let test = FeatureMatrix::from_rows(
            vec!["x".into(), "extra".into()],
            (0..5).map(|i| vec![i as f64, 0.0]).collect(),
            vec![0.0; 5],
        )
        .unwrap();
        let err = train(&named("knn", None), &linear_data(0..10), &test).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }
}
