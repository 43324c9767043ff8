use serde::{Deserialize, Serialize};

/// Raw event log for one game, as produced by the ingestion step
/// (`data/raw_<game_id>.json`). The play-by-play collection is carried for
/// completeness but nothing downstream reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGame {
    pub possessions: Vec<RawPossession>,
    pub shots: Vec<RawShot>,
    #[serde(default)]
    pub pbp: Vec<serde_json::Value>,
}

/// One offensive possession as ingested. `time_remaining_in_period` is an
/// ISO8601 duration string ("PT11M32.00S"); `duration` is seconds elapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPossession {
    pub poss_id: i64,
    pub period: u32,
    pub time_remaining_in_period: String,
    pub duration: i64,
    pub offense_start_score: i64,
    pub defense_start_score: i64,
    pub offense_team_id: i64,
    pub defense_team_id: i64,
    pub points: i64,
    pub last_event_num: i64,
}

/// One shot attempt. `distance` is feet from the rim; missing for events the
/// provider logs without coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawShot {
    pub event_num: i64,
    pub distance: Option<f64>,
    pub period: u32,
}

/// One row of the baseline (memory-0) feature table. Field order here is the
/// CSV column order; the label stays last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineRow {
    pub poss_id: i64,
    pub period: u32,
    pub clock_start_sec: i64,
    pub clock_end_sec: i64,
    pub offense_team_id: i64,
    pub defense_team_id: i64,
    pub score_diff_start: i64,
    pub shot_bucket: String,
    pub points_scored: i64,
}

/// One row of the sequence (memory-3) feature table: the baseline columns plus
/// strictly causal history features. `tempo_mean_last3` is empty on the first
/// row, where no prior possession exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRow {
    pub poss_id: i64,
    pub period: u32,
    pub clock_start_sec: i64,
    pub clock_end_sec: i64,
    pub offense_team_id: i64,
    pub defense_team_id: i64,
    pub score_diff_start: i64,
    pub shot_bucket: String,
    pub points_scored: i64,
    pub prev_pts_1: i64,
    pub prev_pts_2: i64,
    pub prev_pts_3: i64,
    pub prev_bucket_1: String,
    pub tempo_sec: i64,
    pub tempo_mean_last3: Option<f64>,
    pub streak_scored_last3: i64,
}
