//! Sequence (memory-3) feature augmenter.
//!
//! Adds short-history features on top of the baseline table. Every added
//! feature is strictly causal: the row for possession p only ever reads rows
//! with smaller poss_id. Rows are sorted by poss_id before any shift or
//! rolling operation; the lag features are order-dependent.

use std::path::PathBuf;

use crate::error::Result;
use crate::store::models::{BaselineRow, SequenceRow};
use crate::store::Store;

/// How many prior possessions the lag features look back.
pub const MEMORY: usize = 3;

/// Sentinel bucket for "no prior possession exists".
const NO_PRIOR_BUCKET: &str = "none";

/// Derive sequence rows from baseline rows.
pub fn sequence_rows(baseline: &[BaselineRow]) -> Vec<SequenceRow> {
    let mut sorted: Vec<&BaselineRow> = baseline.iter().collect();
    sorted.sort_by_key(|r| r.poss_id);

    let tempo: Vec<i64> = sorted
        .iter()
        .map(|r| r.clock_start_sec - r.clock_end_sec)
        .collect();

    sorted
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let prev_pts = |k: usize| if i >= k { sorted[i - k].points_scored } else { 0 };
            let prev_pts_1 = prev_pts(1);
            let prev_pts_2 = prev_pts(2);
            let prev_pts_3 = prev_pts(3);

            let prev_bucket_1 = if i >= 1 {
                sorted[i - 1].shot_bucket.clone()
            } else {
                NO_PRIOR_BUCKET.to_string()
            };

            // Rolling mean of tempo over a 3-wide window, shifted by one row:
            // the average of the 1-3 possessions immediately before this one.
            // Undefined on the first row.
            let tempo_mean_last3 = if i == 0 {
                None
            } else {
                let window = &tempo[i.saturating_sub(MEMORY)..i];
                Some(window.iter().sum::<i64>() as f64 / window.len() as f64)
            };

            let streak_scored_last3 =
                i64::from(prev_pts_1 > 0 && prev_pts_2 > 0 && prev_pts_3 > 0);

            SequenceRow {
                poss_id: row.poss_id,
                period: row.period,
                clock_start_sec: row.clock_start_sec,
                clock_end_sec: row.clock_end_sec,
                offense_team_id: row.offense_team_id,
                defense_team_id: row.defense_team_id,
                score_diff_start: row.score_diff_start,
                shot_bucket: row.shot_bucket.clone(),
                points_scored: row.points_scored,
                prev_pts_1,
                prev_pts_2,
                prev_pts_3,
                prev_bucket_1,
                tempo_sec: tempo[i],
                tempo_mean_last3,
                streak_scored_last3,
            }
        })
        .collect()
}

/// Build and persist the sequence feature table for one game.
pub fn add_sequence_features(store: &Store, game_id: &str) -> Result<PathBuf> {
    let baseline = store.read_baseline(game_id)?;
    let rows = sequence_rows(&baseline);
    store.write_sequence(game_id, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::three_possession_game;
    use crate::features::baseline_rows;
    use approx::assert_relative_eq;

    fn three_rows() -> Vec<SequenceRow> {
        sequence_rows(&baseline_rows(&three_possession_game()))
    }

    #[test]
    fn lag_points_shift_with_zero_fill() {
        let rows = three_rows();
        let col = |f: fn(&SequenceRow) -> i64| rows.iter().map(f).collect::<Vec<_>>();
        assert_eq!(col(|r| r.prev_pts_1), vec![0, 2, 0]);
        assert_eq!(col(|r| r.prev_pts_2), vec![0, 0, 2]);
        assert_eq!(col(|r| r.prev_pts_3), vec![0, 0, 0]);
    }

    #[test]
    fn previous_bucket_uses_none_sentinel() {
        let rows = three_rows();
        let buckets: Vec<&str> = rows.iter().map(|r| r.prev_bucket_1.as_str()).collect();
        assert_eq!(buckets, vec!["none", "paint", "non_corner_three"]);
    }

    #[test]
    fn tempo_and_trailing_mean() {
        let rows = three_rows();
        let tempos: Vec<i64> = rows.iter().map(|r| r.tempo_sec).collect();
        assert_eq!(tempos, vec![28, 22, 17]);

        assert!(rows[0].tempo_mean_last3.is_none());
        assert_relative_eq!(rows[1].tempo_mean_last3.unwrap(), 28.0, epsilon = 1e-9);
        assert_relative_eq!(rows[2].tempo_mean_last3.unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn streak_requires_all_three_priors_to_score() {
        let rows = three_rows();
        assert!(rows.iter().all(|r| r.streak_scored_last3 == 0));

        // Four scoring possessions in a row: the fifth row sees a full streak.
        let mut baseline = baseline_rows(&three_possession_game());
        for (i, row) in baseline.iter_mut().enumerate() {
            row.poss_id = i as i64 + 1;
            row.points_scored = 2;
        }
        let mut extended = baseline.clone();
        let mut fourth = baseline[2].clone();
        fourth.poss_id = 4;
        let mut fifth = baseline[2].clone();
        fifth.poss_id = 5;
        extended.push(fourth);
        extended.push(fifth);

        let rows = sequence_rows(&extended);
        assert_eq!(
            rows.iter().map(|r| r.streak_scored_last3).collect::<Vec<_>>(),
            vec![0, 0, 0, 1, 1]
        );
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut shuffled = baseline_rows(&three_possession_game());
        shuffled.reverse();
        assert_eq!(sequence_rows(&shuffled), three_rows());
    }

    /// Causality: perturbing a future possession must leave every earlier
    /// row's features unchanged.
    #[test]
    fn features_never_depend_on_future_rows() {
        let baseline = baseline_rows(&three_possession_game());
        let original = sequence_rows(&baseline);

        let mut perturbed = baseline.clone();
        perturbed[2].points_scored = 99;
        perturbed[2].shot_bucket = "non_corner_three".into();
        perturbed[2].clock_end_sec = perturbed[2].clock_start_sec - 1;
        let after = sequence_rows(&perturbed);

        for (a, b) in original.iter().zip(after.iter()).take(2) {
            assert_eq!(a, b, "row {} changed after future perturbation", a.poss_id);
        }
    }

    #[test]
    fn missing_baseline_table_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::new(dir.path().join("data"), dir.path().join("models"));
        let err = add_sequence_features(&store, "nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("baseline_nope.csv"));
    }
}
