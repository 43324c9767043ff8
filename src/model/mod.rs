//! Multiclass probability model: softmax regression over the prepared feature
//! matrix, trained by full-batch gradient descent with L2 and a decaying
//! learning rate. Deliberately dependency-light and deterministic: the same
//! data, hyperparameters, and seed always produce the same artifact.
//!
//! The serialized artifact carries everything scoring needs: the exact one-hot
//! feature schema, the z-score normalisation, and the code-to-point-value table
//! for converting class probabilities into expected points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlowstateError, Result};

pub mod prep;
pub mod train;

use prep::{ClassMap, DesignMatrix, Prepared};

/// Gradient-descent hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    /// Seed for the evaluation split shuffle; the fit itself is full-batch and
    /// needs no randomness.
    pub seed: u64,
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            epochs: 400,
            learning_rate: 0.2,
            l2: 1e-3,
            seed: 42,
        }
    }
}

/// A trained multiclass model plus the metadata required to score features
/// prepared from a different run (schema reindex contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub tag: String,
    pub trained_at: DateTime<Utc>,
    /// Exact training-time column schema; scoring reindexes to this.
    pub feature_names: Vec<String>,
    pub feature_mean: Vec<f64>,
    pub feature_std: Vec<f64>,
    /// Maps each class code to its original point value. EPV converts through
    /// this table, never
    /// assuming code i means i points.
    pub class_values: Vec<i64>,
    /// Weights, shape [num_classes][num_features].
    pub weights: Vec<Vec<f64>>,
    /// Bias, shape [num_classes].
    pub bias: Vec<f64>,
}

impl ModelArtifact {
    /// Fail fast on shape-inconsistent artifacts (hand-edited or truncated
    /// files) before they produce garbage probabilities.
    pub fn validate(&self) -> Result<()> {
        let d = self.feature_names.len();
        let k = self.class_values.len();
        if k < 2 {
            return Err(FlowstateError::InvalidArtifact(format!(
                "artifact '{}' has {k} classes, need at least 2",
                self.tag
            )));
        }
        if self.feature_mean.len() != d || self.feature_std.len() != d {
            return Err(FlowstateError::InvalidArtifact(format!(
                "artifact '{}' normalisation length mismatch (features {d})",
                self.tag
            )));
        }
        if self.weights.len() != k || self.bias.len() != k {
            return Err(FlowstateError::InvalidArtifact(format!(
                "artifact '{}' weight rows {} / bias {} != classes {k}",
                self.tag,
                self.weights.len(),
                self.bias.len()
            )));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != d) {
            return Err(FlowstateError::InvalidArtifact(format!(
                "artifact '{}' weight row length {} != features {d}",
                self.tag,
                row.len()
            )));
        }
        Ok(())
    }

    /// Per-row class probability vectors. The incoming matrix is reindexed to
    /// the training schema first, so callers can pass features prepared from
    /// any game.
    pub fn predict_proba(&self, matrix: &DesignMatrix) -> Vec<Vec<f64>> {
        let aligned = matrix.reindex(&self.feature_names);
        aligned
            .rows
            .iter()
            .map(|row| {
                let z: Vec<f64> = self
                    .weights
                    .iter()
                    .zip(&self.bias)
                    .map(|(w, b)| {
                        b + w
                            .iter()
                            .zip(row.iter().zip(self.feature_mean.iter().zip(&self.feature_std)))
                            .map(|(wj, (x, (m, s)))| wj * ((x - m) / s))
                            .sum::<f64>()
                    })
                    .collect();
                softmax(&z)
            })
            .collect()
    }

    /// Expected points per row: probabilities dotted against the original
    /// point values (not the contiguous codes).
    pub fn expected_points(&self, matrix: &DesignMatrix) -> Vec<f64> {
        self.predict_proba(matrix)
            .iter()
            .map(|probs| {
                probs
                    .iter()
                    .zip(&self.class_values)
                    .map(|(p, &v)| p * v as f64)
                    .sum()
            })
            .collect()
    }
}

/// Fit a softmax classifier on prepared features.
///
/// Fails with `DegenerateData` on an empty table or fewer than 2 distinct
/// classes. Single-class games are an input-data condition, not something to
/// paper over with a constant model.
pub fn fit(tag: &str, prepared: &Prepared, params: &FitParams) -> Result<ModelArtifact> {
    fit_subset(tag, &prepared.matrix, &prepared.codes, &prepared.class_map, params)
}

/// Fit on an explicit matrix/code slice (used by the evaluation split, which
/// trains on a subset while keeping the full dataset's class map).
pub fn fit_subset(
    tag: &str,
    matrix: &DesignMatrix,
    codes: &[usize],
    class_map: &ClassMap,
    params: &FitParams,
) -> Result<ModelArtifact> {
    let n = matrix.n_rows();
    let d = matrix.n_cols();
    let k = class_map.num_classes();

    if n == 0 {
        return Err(FlowstateError::DegenerateData(
            "empty feature table".to_string(),
        ));
    }
    if k < 2 {
        return Err(FlowstateError::DegenerateData(format!(
            "{k} distinct label class(es); need at least 2 to fit a classifier"
        )));
    }

    let (mean, std) = column_moments(matrix);
    let x: Vec<Vec<f64>> = matrix
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(mean.iter().zip(&std))
                .map(|(v, (m, s))| (v - m) / s)
                .collect()
        })
        .collect();

    let mut weights = vec![vec![0.0; d]; k];
    let mut bias = vec![0.0; k];

    for epoch in 0..params.epochs.max(1) {
        let lr = params.learning_rate / (1.0 + 0.01 * epoch as f64);
        let mut grad_w = vec![vec![0.0; d]; k];
        let mut grad_b = vec![0.0; k];

        for (row, &code) in x.iter().zip(codes) {
            let z: Vec<f64> = weights
                .iter()
                .zip(&bias)
                .map(|(w, b)| b + w.iter().zip(row).map(|(wj, xj)| wj * xj).sum::<f64>())
                .collect();
            let probs = softmax(&z);
            for c in 0..k {
                let err = probs[c] - if c == code { 1.0 } else { 0.0 };
                grad_b[c] += err;
                for (g, xj) in grad_w[c].iter_mut().zip(row) {
                    *g += err * xj;
                }
            }
        }

        let n_f = n as f64;
        for c in 0..k {
            bias[c] -= lr * grad_b[c] / n_f;
            for j in 0..d {
                weights[c][j] -= lr * (grad_w[c][j] / n_f + params.l2 * weights[c][j]);
            }
        }

        if bias.iter().any(|b| !b.is_finite())
            || weights.iter().flatten().any(|w| !w.is_finite())
        {
            return Err(FlowstateError::DegenerateData(
                "fit diverged to non-finite parameters".to_string(),
            ));
        }
    }

    Ok(ModelArtifact {
        tag: tag.to_string(),
        trained_at: Utc::now(),
        feature_names: matrix.columns.clone(),
        feature_mean: mean,
        feature_std: std,
        class_values: class_map.values().to_vec(),
        weights,
        bias,
    })
}

/// Column mean and standard deviation; constant columns get std 1 so they
/// z-score to 0 instead of dividing by zero.
fn column_moments(matrix: &DesignMatrix) -> (Vec<f64>, Vec<f64>) {
    let n = matrix.n_rows() as f64;
    let d = matrix.n_cols();
    let mut mean = vec![0.0; d];
    for row in &matrix.rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n;
    }
    let mut var = vec![0.0; d];
    for row in &matrix.rows {
        for ((v, m), x) in var.iter_mut().zip(&mean).zip(row) {
            *v += (x - m) * (x - m);
        }
    }
    let std = var
        .into_iter()
        .map(|v| {
            let s = (v / n).sqrt();
            if s > 0.0 {
                s
            } else {
                1.0
            }
        })
        .collect();
    (mean, std)
}

/// Numerically stable softmax.
fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use super::prep::prepare;
    use crate::features::fixtures::three_possession_game;
    use crate::features::baseline_rows;
    use crate::store::models::BaselineRow;

    fn separable_rows() -> Vec<BaselineRow> {
        // Near-rim possessions score, deep ones don't: linearly separable on
        // the shot_bucket dummies and score_diff.
        (0..24)
            .map(|i| {
                let scores = i % 2 == 0;
                BaselineRow {
                    poss_id: i + 1,
                    period: 1 + (i / 12) as u32,
                    clock_start_sec: 700 - 25 * i,
                    clock_end_sec: 700 - 25 * i - 15,
                    offense_team_id: 1,
                    defense_team_id: 2,
                    score_diff_start: if scores { 4 } else { -4 },
                    shot_bucket: if scores { "restricted_area" } else { "non_corner_three" }
                        .to_string(),
                    points_scored: if scores { 2 } else { 0 },
                }
            })
            .collect()
    }

    #[test]
    fn softmax_sums_to_one_and_orders_by_logit() {
        let p = softmax(&[1.0, 2.0, 0.5]);
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(p[1] > p[0] && p[0] > p[2]);
    }

    #[test]
    fn softmax_is_stable_for_large_logits() {
        let p = softmax(&[1000.0, 999.0]);
        assert!(p.iter().all(|v| v.is_finite()));
        assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn fit_learns_a_separable_pattern() {
        let prepared = prepare(&separable_rows());
        let model = fit("baseline", &prepared, &FitParams::default()).unwrap();
        let probs = model.predict_proba(&prepared.matrix);

        // Scoring rows should put most mass on the 2-point class (code 1).
        for (row, &code) in probs.iter().zip(&prepared.codes) {
            let argmax = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i)
                .unwrap();
            assert_eq!(argmax, code);
        }
    }

    #[test]
    fn probabilities_are_normalised() {
        let prepared = prepare(&separable_rows());
        let model = fit("baseline", &prepared, &FitParams::default()).unwrap();
        for row in model.predict_proba(&prepared.matrix) {
            assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn expected_points_uses_original_values_not_codes() {
        // Classes present: {0, 2} → codes {0, 1}. EPV must dot against
        // [0, 2], so every EPV lies in [0, 2] and exceeds the code-based
        // ceiling of 1 for confident scoring rows.
        let prepared = prepare(&separable_rows());
        let model = fit("baseline", &prepared, &FitParams::default()).unwrap();
        assert_eq!(model.class_values, vec![0, 2]);
        let epv = model.expected_points(&prepared.matrix);
        assert!(epv.iter().all(|&e| (0.0..=2.0).contains(&e)));
        let scoring_epv = epv[0]; // row 0 scores in the fixture
        assert!(
            scoring_epv > 1.5,
            "confident 2-point row should have EPV near 2, got {scoring_epv}"
        );
    }

    #[test]
    fn single_class_data_is_degenerate() {
        let mut rows = separable_rows();
        for row in &mut rows {
            row.points_scored = 2;
        }
        let prepared = prepare(&rows);
        let err = fit("baseline", &prepared, &FitParams::default()).unwrap_err();
        assert!(matches!(err, FlowstateError::DegenerateData(_)));
    }

    #[test]
    fn empty_table_is_degenerate() {
        let prepared = prepare::<BaselineRow>(&[]);
        let err = fit("baseline", &prepared, &FitParams::default()).unwrap_err();
        assert!(matches!(err, FlowstateError::DegenerateData(_)));
    }

    #[test]
    fn fit_is_deterministic() {
        let prepared = prepare(&separable_rows());
        let params = FitParams::default();
        let a = fit("baseline", &prepared, &params).unwrap();
        let b = fit("baseline", &prepared, &params).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn scoring_reindexes_to_training_schema() {
        let prepared = prepare(&separable_rows());
        let model = fit("baseline", &prepared, &FitParams::default()).unwrap();

        // Score the three-possession fixture, whose one-hot columns differ
        // (it has paint, which training never saw, and lacks others).
        let other = prepare(&baseline_rows(&three_possession_game()));
        let probs = model.predict_proba(&other.matrix);
        assert_eq!(probs.len(), 3);
        for row in probs {
            assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn artifact_validation_catches_shape_mismatch() {
        let prepared = prepare(&separable_rows());
        let mut model = fit("baseline", &prepared, &FitParams::default()).unwrap();
        assert!(model.validate().is_ok());
        model.weights[0].pop();
        assert!(matches!(
            model.validate().unwrap_err(),
            FlowstateError::InvalidArtifact(_)
        ));
    }

    #[test]
    fn artifact_round_trips_through_json() {
        let prepared = prepare(&separable_rows());
        let model = fit("baseline", &prepared, &FitParams::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: ModelArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.feature_names, model.feature_names);
        assert_eq!(back.weights, model.weights);
        assert_eq!(back.class_values, model.class_values);
    }
}
