//! Training driver: fits the baseline and sequence models for a game, scores
//! held-out log-loss for each, saves both artifacts, and reports how much the
//! short-history features buy.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::prep::{prepare, Prepared};
use crate::model::{fit, fit_subset, FitParams, ModelArtifact};
use crate::store::{Store, TAG_BASELINE, TAG_SEQUENCE};

/// Below this row count a split would leave a handful of test rows (or none),
/// so evaluation trains and scores on the same set.
const MIN_SPLIT_ROWS: usize = 8;
/// Held-out fraction for the evaluation split.
const TEST_FRACTION: f64 = 0.25;

/// Probability floor for log-loss, mirroring the clamp used elsewhere in the
/// probability code.
const EPS: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub game_id: String,
    pub baseline_logloss: f64,
    pub sequence_logloss: f64,
    pub improvement_pct: f64,
    pub classes_baseline: usize,
    pub classes_sequence: usize,
}

/// Train both models for a game: evaluate each with a held-out split, then
/// refit on the full table and persist the artifact.
pub fn train_game(store: &Store, game_id: &str, params: &FitParams) -> Result<TrainReport> {
    let baseline = prepare(&store.read_baseline(game_id)?);
    let sequence = prepare(&store.read_sequence(game_id)?);

    let ll_base = holdout_logloss(TAG_BASELINE, &baseline, params)?;
    let ll_seq = holdout_logloss(TAG_SEQUENCE, &sequence, params)?;

    let base_model = fit(TAG_BASELINE, &baseline, params)?;
    let seq_model = fit(TAG_SEQUENCE, &sequence, params)?;
    store.save_model(&base_model)?;
    store.save_model(&seq_model)?;

    let improvement_pct = if ll_base > 0.0 {
        (ll_base - ll_seq) / ll_base * 100.0
    } else {
        0.0
    };
    info!(
        "Trained {game_id}: baseline logloss {ll_base:.5}, sequence logloss {ll_seq:.5} ({improvement_pct:+.2}%)"
    );

    Ok(TrainReport {
        game_id: game_id.to_string(),
        baseline_logloss: ll_base,
        sequence_logloss: ll_seq,
        improvement_pct,
        classes_baseline: baseline.class_map.num_classes(),
        classes_sequence: sequence.class_map.num_classes(),
    })
}

/// Seeded 75/25 split, fit on train, multiclass log-loss on test. Tiny demo
/// datasets (< MIN_SPLIT_ROWS) train and evaluate on the same rows rather
/// than producing a degenerate split.
fn holdout_logloss(tag: &str, prepared: &Prepared, params: &FitParams) -> Result<f64> {
    let n = prepared.matrix.n_rows();

    let (train_idx, test_idx): (Vec<usize>, Vec<usize>) = if n < MIN_SPLIT_ROWS {
        let all: Vec<usize> = (0..n).collect();
        (all.clone(), all)
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);
        indices.shuffle(&mut rng);
        let test_n = ((n as f64 * TEST_FRACTION).round() as usize).max(1);
        let (test, train) = indices.split_at(test_n);
        (train.to_vec(), test.to_vec())
    };

    let train_matrix = prepared.matrix.select(&train_idx);
    let train_codes: Vec<usize> = train_idx.iter().map(|&i| prepared.codes[i]).collect();

    // The class map stays the full dataset's map: a small train split may
    // miss a class, but code meanings must not shift between fit and score.
    let model = fit_subset(tag, &train_matrix, &train_codes, &prepared.class_map, params)?;

    let test_matrix = prepared.matrix.select(&test_idx);
    let test_codes: Vec<usize> = test_idx.iter().map(|&i| prepared.codes[i]).collect();
    Ok(log_loss(&model, &test_matrix, &test_codes))
}

/// Mean multiclass negative log-likelihood.
fn log_loss(
    model: &ModelArtifact,
    matrix: &crate::model::prep::DesignMatrix,
    codes: &[usize],
) -> f64 {
    let probs = model.predict_proba(matrix);
    let total: f64 = probs
        .iter()
        .zip(codes)
        .map(|(row, &code)| -row[code].clamp(EPS, 1.0 - EPS).ln())
        .sum();
    total / codes.len() as f64
}
