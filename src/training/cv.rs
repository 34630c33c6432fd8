//! Seeded k-fold cross-validation used to pick a point from a parameter grid.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::common::error::{PipelineError, PipelineResult, ResultExt};
use crate::evaluation::service::r2_score;
use crate::transform::domain::FeatureMatrix;

use super::domain::{ModelParams, Regressor, Trainer};

/// Train and validation row indices of one fold.
#[derive(Clone, Debug, PartialEq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and cut it into `k` contiguous validation blocks.
///
/// Every row lands in exactly one validation block. Needs `k >= 2` and `n >= k`.
pub fn kfold(n: usize, k: usize, seed: u64) -> PipelineResult<Vec<Fold>> {
    if k < 2 {
        return Err(PipelineError::invalid(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if n < k {
        return Err(PipelineError::invalid(format!(
            "cross-validation with {k} folds needs at least {k} training rows, got {n}"
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    // The first n % k folds take one extra row.
    let (base, extra) = (n / k, n % k);
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let end = start + base + usize::from(fold < extra);
        let mut train = Vec::with_capacity(n - (end - start));
        train.extend_from_slice(&order[..start]);
        train.extend_from_slice(&order[end..]);
        folds.push(Fold {
            train,
            validation: order[start..end].to_vec(),
        });
        start = end;
    }
    Ok(folds)
}

/// Mean validation R² of `params` over `folds`.
pub fn cross_val_score(
    params: &ModelParams,
    data: &FeatureMatrix,
    folds: &[Fold],
) -> PipelineResult<f64> {
    let mut total = 0.0;
    for (idx, fold) in folds.iter().enumerate() {
        let train = data.select(&fold.train);
        let validation = data.select(&fold.validation);
        let model = params
            .fit(&train)
            .wrap_err_with(|| format!("fold {idx}"))?;
        let pred = model.predict(validation.rows.view());
        total += r2_score(validation.targets.view(), pred.view());
    }
    let score = total / folds.len().max(1) as f64;
    debug!(model = %params.kind(), params = ?params, cv_r2 = score, "grid point scored");
    Ok(score)
}

/// Best point of `points` by mean CV R²; the first one wins ties.
pub fn grid_search<'a>(
    points: &'a [ModelParams],
    data: &FeatureMatrix,
    folds: &[Fold],
) -> PipelineResult<(&'a ModelParams, f64)> {
    let mut best: Option<(&ModelParams, f64)> = None;
    for params in points {
        let score = cross_val_score(params, data, folds)?;
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((params, score));
        }
    }
    best.ok_or_else(|| PipelineError::invalid("parameter grid is empty"))
}
