//! CART regression tree grown by greedy variance reduction.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::transform::domain::FeatureMatrix;

use super::domain::{Regressor, TreeParams};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    pub n_features: usize,
    pub root: Node,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl TreeModel {
    pub fn fit(data: &FeatureMatrix, params: &TreeParams) -> Self {
        let indices: Vec<usize> = (0..data.len()).collect();
        Self {
            n_features: data.width(),
            root: grow(data, &indices, 0, params),
        }
    }
}

impl Regressor for TreeModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features.get(*feature).copied().unwrap_or(0.0);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn mean_of(data: &FeatureMatrix, indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| data.targets[i]).sum::<f64>() / indices.len() as f64
}

fn sse_of(data: &FeatureMatrix, indices: &[usize]) -> f64 {
    let mean = mean_of(data, indices);
    indices
        .iter()
        .map(|&i| (data.targets[i] - mean).powi(2))
        .sum()
}

fn grow(data: &FeatureMatrix, indices: &[usize], depth: usize, params: &TreeParams) -> Node {
    let leaf = Node::Leaf {
        value: mean_of(data, indices),
    };
    if depth >= params.max_depth || indices.len() < params.min_samples_split {
        return leaf;
    }
    let current = sse_of(data, indices);
    if current <= f64::EPSILON {
        return leaf;
    }

    let Some(best) = best_split(data, indices) else {
        return leaf;
    };
    if best.sse >= current {
        return leaf;
    }

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| data.rows[[i, best.feature]] <= best.threshold);
    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(grow(data, &left, depth + 1, params)),
        right: Box::new(grow(data, &right, depth + 1, params)),
    }
}

/// Scans every feature with prefix sums; keeps the first split with the lowest SSE.
fn best_split(data: &FeatureMatrix, indices: &[usize]) -> Option<BestSplit> {
    let n = indices.len();
    let mut best: Option<BestSplit> = None;

    for feature in 0..data.width() {
        let column = data.rows.column(feature);
        let mut sorted: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (column[i], data.targets[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total_sum: f64 = sorted.iter().map(|p| p.1).sum();
        let total_sq: f64 = sorted.iter().map(|p| p.1 * p.1).sum();
        let (mut left_sum, mut left_sq) = (0.0, 0.0);

        for pos in 0..n - 1 {
            let (x, y) = sorted[pos];
            left_sum += y;
            left_sq += y * y;
            let next_x = sorted[pos + 1].0;
            if next_x <= x {
                continue;
            }

            let left_n = (pos + 1) as f64;
            let right_n = (n - pos - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                best = Some(BestSplit {
                    feature,
                    threshold: (x + next_x) / 2.0,
                    sse,
                });
            }
        }
    }
    best
}
