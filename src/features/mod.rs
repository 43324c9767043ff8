//! Baseline (memory-0) feature builder.
//!
//! Turns the raw event log into one row per possession: period, clocks, score
//! differential, shot-location bucket, and the points-scored label. Each row is
//! a pure function of that possession's own fields; no history enters here.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::Result;
use crate::store::models::{BaselineRow, RawGame};
use crate::store::Store;

pub mod normalize;
pub mod sequence;

use normalize::{clock_to_seconds, shot_bucket};

/// Derive baseline rows from a raw game log.
///
/// Possessions are left-joined to shots on `last_event_num == event_num`; a
/// possession that ended without a shot (turnover, end of period) gets a null
/// distance and lands in the `no_shot` bucket.
pub fn baseline_rows(raw: &RawGame) -> Vec<BaselineRow> {
    let shot_by_event: HashMap<i64, Option<f64>> = raw
        .shots
        .iter()
        .map(|s| (s.event_num, s.distance))
        .collect();

    raw.possessions
        .iter()
        .map(|p| {
            let clock_start_sec = clock_to_seconds(&p.time_remaining_in_period);
            let distance = shot_by_event.get(&p.last_event_num).copied().flatten();
            BaselineRow {
                poss_id: p.poss_id,
                period: p.period,
                clock_start_sec,
                clock_end_sec: clock_start_sec - p.duration,
                offense_team_id: p.offense_team_id,
                defense_team_id: p.defense_team_id,
                score_diff_start: p.offense_start_score - p.defense_start_score,
                shot_bucket: shot_bucket(distance).to_string(),
                points_scored: p.points,
            }
        })
        .collect()
}

/// Build and persist the baseline feature table for one game.
pub fn build_baseline(store: &Store, game_id: &str) -> Result<PathBuf> {
    let raw = store.load_raw(game_id)?;
    let rows = baseline_rows(&raw);
    store.write_baseline(game_id, &rows)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::store::models::{RawGame, RawPossession, RawShot};

    /// Three-possession game matching the worked example in the test suite:
    /// points [2, 0, 3], tempos [28, 22, 17], buckets paint /
    /// non_corner_three / restricted_area.
    pub fn three_possession_game() -> RawGame {
        let poss = |poss_id, clock: &str, duration, off_score, def_score, points, last_event| {
            RawPossession {
                poss_id,
                period: 1,
                time_remaining_in_period: clock.to_string(),
                duration,
                offense_start_score: off_score,
                defense_start_score: def_score,
                offense_team_id: if poss_id % 2 == 1 { 1610612749 } else { 1610612738 },
                defense_team_id: if poss_id % 2 == 1 { 1610612738 } else { 1610612749 },
                points,
                last_event_num: last_event,
            }
        };
        RawGame {
            possessions: vec![
                poss(1, "PT11M32.00S", 28, 0, 0, 2, 10),
                poss(2, "PT10M45.00S", 22, 2, 0, 0, 17),
                poss(3, "PT10M03.00S", 17, 2, 0, 3, 25),
            ],
            shots: vec![
                RawShot { event_num: 10, distance: Some(8.0), period: 1 },
                RawShot { event_num: 17, distance: Some(26.0), period: 1 },
                RawShot { event_num: 25, distance: Some(1.5), period: 1 },
            ],
            pbp: vec![],
        }
    }
}
