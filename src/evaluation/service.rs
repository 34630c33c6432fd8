//! Metric computation and the evaluation stage.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};

use ndarray::ArrayView1;
use tracing::{info, warn};

use crate::common::error::{PipelineError, PipelineResult};
use crate::training::domain::Regressor;
use crate::transform::domain::FeatureMatrix;

use super::domain::{
    ClassificationMetrics, EvaluationConfig, EvaluationReport, Metrics, RegressionMetrics, Task,
};

/// Coefficient of determination.
///
/// A constant truth scores 1 when predicted exactly and 0 otherwise.
pub fn r2_score(truth: ArrayView1<f64>, pred: ArrayView1<f64>) -> f64 {
    let Some(mean) = truth.mean() else {
        return 0.0;
    };
    let ss_res = (&truth - &pred).mapv(|d| d * d).sum();
    let ss_tot = truth.mapv(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn regression_metrics(truth: ArrayView1<f64>, pred: ArrayView1<f64>) -> RegressionMetrics {
    let residuals = &truth - &pred;
    let mse = residuals.mapv(|d| d * d).mean().unwrap_or(0.0);
    RegressionMetrics {
        mse,
        mae: residuals.mapv(f64::abs).mean().unwrap_or(0.0),
        rmse: mse.sqrt(),
        r2: r2_score(truth, pred),
    }
}

fn label(value: f64) -> i64 {
    value.round() as i64
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Predictions are rounded to the nearest integer label before comparison.
pub fn classification_metrics(truth: ArrayView1<f64>, pred: ArrayView1<f64>) -> ClassificationMetrics {
    #[derive(Default)]
    struct Counts {
        tp: usize,
        predicted: usize,
        support: usize,
    }

    let mut per_label: BTreeMap<i64, Counts> = BTreeMap::new();
    let mut correct = 0;
    for (&t, &p) in truth.iter().zip(pred.iter()) {
        let (t, p) = (label(t), label(p));
        per_label.entry(t).or_default().support += 1;
        per_label.entry(p).or_default().predicted += 1;
        if t == p {
            correct += 1;
            per_label.entry(t).or_default().tp += 1;
        }
    }

    let total = truth.len();
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for counts in per_label.values().filter(|c| c.support > 0) {
        let weight = ratio(counts.support, total);
        let p = ratio(counts.tp, counts.predicted);
        let r = ratio(counts.tp, counts.support);
        let f = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    ClassificationMetrics {
        accuracy: ratio(correct, total),
        precision,
        recall,
        f1,
    }
}

/// Score `model` on the test split and optionally write the report as JSON.
///
/// Missing the threshold is reported, not fatal.
pub fn evaluate(
    cfg: &EvaluationConfig,
    model: &dyn Regressor,
    test: &FeatureMatrix,
) -> PipelineResult<EvaluationReport> {
    if test.is_empty() {
        return Err(PipelineError::invalid("cannot evaluate on an empty test split"));
    }
    let pred = model.predict(test.rows.view());
    let metrics = match cfg.task {
        Task::Regression => Metrics::Regression(regression_metrics(test.targets.view(), pred.view())),
        Task::Classification => {
            Metrics::Classification(classification_metrics(test.targets.view(), pred.view()))
        }
    };
    let score = metrics.score();
    let report = EvaluationReport {
        metrics,
        score,
        threshold: cfg.threshold,
        meets_threshold: score >= cfg.threshold,
        test_rows: test.len(),
    };

    info!(task = %cfg.task, score, metrics = ?report.metrics, "model evaluated");
    if !report.meets_threshold {
        warn!(
            score,
            threshold = cfg.threshold,
            "model score is below the evaluation threshold"
        );
    }

    if let Some(path) = &cfg.report_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writer.flush().map_err(|e| PipelineError::io(path, e))?;
        info!(path = %path.display(), "evaluation report written");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::aview1;
    use tempfile::tempdir;

    struct Constant(f64);

    impl Regressor for Constant {
        fn n_features(&self) -> usize {
            1
        }

        fn predict_one(&self, _features: ArrayView1<f64>) -> f64 {
            self.0
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn regression_metrics_match_hand_computation() {
        let m = regression_metrics(aview1(&[1.0, 2.0, 3.0, 4.0]), aview1(&[1.0, 2.0, 4.0, 2.0]));
        assert!(close(m.mse, 1.25));
        assert!(close(m.mae, 0.75));
        assert!(close(m.rmse, 1.25f64.sqrt()));
        assert!(close(m.r2, 0.0));
    }

    #[test]
    fn r2_handles_constant_truth() {
        assert_eq!(r2_score(aview1(&[2.0, 2.0]), aview1(&[2.0, 2.0])), 1.0);
        assert_eq!(r2_score(aview1(&[2.0, 2.0]), aview1(&[2.0, 3.0])), 0.0);
        assert_eq!(r2_score(aview1(&[1.0, 3.0]), aview1(&[1.0, 3.0])), 1.0);
        assert_eq!(r2_score(aview1(&[]), aview1(&[])), 0.0);
    }

    #[test]
    fn classification_metrics_are_support_weighted() {
        // truth: 0,0,1,1 ; pred: 0,1,1,1
        let m = classification_metrics(
            aview1(&[0.0, 0.0, 1.0, 1.0]),
            aview1(&[0.1, 0.9, 1.2, 0.6]),
        );
        assert!(close(m.accuracy, 0.75));
        // label 0: p=1, r=0.5 ; label 1: p=2/3, r=1
        assert!(close(m.precision, 0.5 * 1.0 + 0.5 * (2.0 / 3.0)));
        assert!(close(m.recall, 0.5 * 0.5 + 0.5 * 1.0));
        let f0 = 2.0 * 0.5 / 1.5;
        let f1 = 2.0 * (2.0 / 3.0) / (5.0 / 3.0);
        assert!(close(m.f1, 0.5 * f0 + 0.5 * f1));
    }

    #[test]
    fn evaluate_writes_report_and_flags_threshold() {
        let dir = tempdir().unwrap();
        let cfg = EvaluationConfig {
            report_path: Some(dir.path().join("reports").join("eval.json")),
            ..EvaluationConfig::default()
        };
        let test =
            FeatureMatrix::from_rows(vec!["x".into()], vec![vec![0.0], vec![1.0]], vec![1.0, 3.0])
                .unwrap();
        let report = evaluate(&cfg, &Constant(2.0), &test).unwrap();
        assert_eq!(report.score, 0.0);
        assert!(!report.meets_threshold);

        let written: EvaluationReport = serde_json::from_str(
            &fs::read_to_string(cfg.report_path.as_ref().unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(written, report);
    }
}
