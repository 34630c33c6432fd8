//! Ridge regression solved through the normal equations.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::common::error::{PipelineError, PipelineResult};
use crate::transform::domain::FeatureMatrix;

use super::domain::{LinearParams, Regressor};

const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Array1<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Solve `(XᵀX + αI) w = Xᵀy` with an unpenalized intercept column.
    pub fn fit(data: &FeatureMatrix, params: &LinearParams) -> PipelineResult<Self> {
        let p = data.width() + 1;
        let mut design = Array2::<f64>::ones((data.len(), p));
        design.slice_mut(s![.., 1..]).assign(&data.rows);

        let mut gram = design.t().dot(&design);
        let rhs = design.t().dot(&data.targets);
        for i in 1..p {
            gram[[i, i]] += params.alpha;
        }

        let solution = solve(gram, rhs).ok_or_else(|| {
            PipelineError::invalid("linear system is singular; raise model.params.alpha")
        })?;
        Ok(Self {
            intercept: solution[0],
            weights: solution.slice(s![1..]).to_owned(),
        })
    }
}

impl Regressor for LinearModel {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        self.intercept + self.weights.dot(&features)
    }

    fn predict(&self, rows: ArrayView2<f64>) -> Array1<f64> {
        rows.dot(&self.weights) + self.intercept
    }
}

/// Gaussian elimination with partial pivoting. `None` when the matrix is singular.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < PIVOT_EPSILON {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        let head = a.row(col).to_owned();
        for row in col + 1..n {
            let factor = a[[row, col]] / head[col];
            if factor == 0.0 {
                continue;
            }
            a.row_mut(row).scaled_add(-factor, &head);
            let delta = factor * b[col];
            b[row] -= delta;
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1..]));
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, aview1};

    fn matrix(rows: Vec<Vec<f64>>, targets: Vec<f64>) -> FeatureMatrix {
        let width = rows.first().map_or(0, Vec::len);
        FeatureMatrix::from_rows((0..width).map(|i| format!("f{i}")).collect(), rows, targets)
            .unwrap()
    }

    #[test]
    fn recovers_exact_linear_relation() {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let targets = rows.iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let data = matrix(rows, targets);
        let model = LinearModel::fit(&data, &LinearParams { alpha: 0.0 }).unwrap();

        assert!((model.intercept - 3.0).abs() < 1e-8);
        assert!((model.weights[0] - 2.0).abs() < 1e-8);
        assert!((model.weights[1] + 0.5).abs() < 1e-8);
        assert!((model.predict_one(aview1(&[10.0, 1.0])) - 22.5).abs() < 1e-8);

        let batch = model.predict(data.rows.view());
        assert!((&batch - &data.targets).iter().all(|d| d.abs() < 1e-8));
    }

    #[test]
    fn ridge_penalty_handles_collinear_columns() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, i as f64]).collect();
        let targets: Vec<f64> = (0..10).map(|i| 4.0 * i as f64).collect();
        let data = matrix(rows, targets);

        assert!(LinearModel::fit(&data, &LinearParams { alpha: 0.0 }).is_err());
        let model = LinearModel::fit(&data, &LinearParams::default()).unwrap();
        assert!((model.weights[0] - model.weights[1]).abs() < 1e-4);
        assert!((model.predict_one(aview1(&[5.0, 5.0])) - 20.0).abs() < 1e-3);
    }

    #[test]
    fn solver_pivots_on_the_largest_entry() {
        // a zero in the first pivot position needs a row swap
        let a = array![[0.0, 2.0], [3.0, 1.0]];
        let b = array![4.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }
}
