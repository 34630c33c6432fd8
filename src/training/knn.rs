//! K-nearest-neighbours regressor over the encoded training rows.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::transform::domain::FeatureMatrix;

use super::domain::{KnnParams, Regressor};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnnModel {
    pub k: usize,
    pub rows: Array2<f64>,
    pub targets: Array1<f64>,
}

impl KnnModel {
    /// Memorizes the training set; `k` is clamped to the row count.
    pub fn fit(data: &FeatureMatrix, params: &KnnParams) -> Self {
        Self {
            k: params.k.clamp(1, data.len().max(1)),
            rows: data.rows.clone(),
            targets: data.targets.clone(),
        }
    }
}

impl Regressor for KnnModel {
    fn n_features(&self) -> usize {
        self.rows.ncols()
    }

    fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        if self.rows.nrows() == 0 {
            return 0.0;
        }
        let mut distances: Vec<(f64, usize)> = self
            .rows
            .outer_iter()
            .enumerate()
            .map(|(idx, row)| (squared_distance(row, features), idx))
            .collect();
        // Ties go to the row seen first during training.
        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = self.k.min(distances.len());
        distances[..k]
            .iter()
            .map(|&(_, idx)| self.targets[idx])
            .sum::<f64>()
            / k as f64
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let diff = &a - &b;
    diff.dot(&diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::aview1;

    fn data() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec!["x".into()],
            vec![vec![0.0], vec![1.0], vec![2.0], vec![10.0]],
            vec![0.0, 10.0, 20.0, 100.0],
        )
        .unwrap()
    }

    #[test]
    fn averages_nearest_targets() {
        let model = KnnModel::fit(&data(), &KnnParams { k: 2 });
        assert_eq!(model.predict_one(aview1(&[0.2])), 5.0);
        assert_eq!(model.predict_one(aview1(&[9.0])), 60.0);
        assert_eq!(model.n_features(), 1);
    }

    #[test]
    fn k_is_clamped_and_ties_prefer_earlier_rows() {
        let model = KnnModel::fit(&data(), &KnnParams { k: 50 });
        assert_eq!(model.k, 4);
        assert_eq!(model.predict_one(aview1(&[0.0])), 32.5);

        let one = KnnModel::fit(&data(), &KnnParams { k: 1 });
        // 0.5 is equidistant from rows 0 and 1.
        assert_eq!(one.predict_one(aview1(&[0.5])), 0.0);
    }

    #[test]
    fn batch_prediction_walks_every_row() {
        let data = data();
        let model = KnnModel::fit(&data, &KnnParams { k: 1 });
        assert_eq!(model.predict(data.rows.view()), data.targets);
    }
}
