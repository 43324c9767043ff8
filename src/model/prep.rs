//! Label and feature preparation shared by the training and scoring paths.
//!
//! The contract here is strict: clipping, leakage-column removal, one-hot
//! encoding, and the contiguous class-code remap must be applied identically
//! wherever features are prepared. [`prepare`] is the single entry point for
//! both paths; call sites never re-implement any of these steps.

use crate::store::models::{BaselineRow, SequenceRow};

/// Rare 4+ point plays (and-one fouls on threes, flagrant stacking) are capped
/// into the 3 bucket; a single game has too few of them to model.
pub const LABEL_CAP: i64 = 3;

/// Columns ending in this suffix identify teams directly; in a single-game
/// dataset that encodes the outcome too directly, so they are dropped.
const LEAKAGE_SUFFIX: &str = "_team_id";

pub fn clip_label(points: i64) -> i64 {
    points.clamp(0, LABEL_CAP)
}

/// A tabular row that can enter the preparation pipeline.
pub trait FeatureRecord {
    fn poss_id(&self) -> i64;
    fn points_scored(&self) -> i64;
    /// Numeric columns, in stable declaration order.
    fn numeric_fields(&self) -> Vec<(&'static str, f64)>;
    /// Categorical columns to be one-hot encoded.
    fn categorical_fields(&self) -> Vec<(&'static str, &str)>;
}

impl FeatureRecord for BaselineRow {
    fn poss_id(&self) -> i64 {
        self.poss_id
    }

    fn points_scored(&self) -> i64 {
        self.points_scored
    }

    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("poss_id", self.poss_id as f64),
            ("period", self.period as f64),
            ("clock_start_sec", self.clock_start_sec as f64),
            ("clock_end_sec", self.clock_end_sec as f64),
            ("offense_team_id", self.offense_team_id as f64),
            ("defense_team_id", self.defense_team_id as f64),
            ("score_diff_start", self.score_diff_start as f64),
        ]
    }

    fn categorical_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("shot_bucket", self.shot_bucket.as_str())]
    }
}

impl FeatureRecord for SequenceRow {
    fn poss_id(&self) -> i64 {
        self.poss_id
    }

    fn points_scored(&self) -> i64 {
        self.points_scored
    }

    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("poss_id", self.poss_id as f64),
            ("period", self.period as f64),
            ("clock_start_sec", self.clock_start_sec as f64),
            ("clock_end_sec", self.clock_end_sec as f64),
            ("offense_team_id", self.offense_team_id as f64),
            ("defense_team_id", self.defense_team_id as f64),
            ("score_diff_start", self.score_diff_start as f64),
            ("prev_pts_1", self.prev_pts_1 as f64),
            ("prev_pts_2", self.prev_pts_2 as f64),
            ("prev_pts_3", self.prev_pts_3 as f64),
            ("tempo_sec", self.tempo_sec as f64),
            // Undefined on the first row; imputed to 0 for modeling, the CSV
            // keeps the cell empty.
            ("tempo_mean_last3", self.tempo_mean_last3.unwrap_or(0.0)),
            ("streak_scored_last3", self.streak_scored_last3 as f64),
        ]
    }

    fn categorical_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("shot_bucket", self.shot_bucket.as_str()),
            ("prev_bucket_1", self.prev_bucket_1.as_str()),
        ]
    }
}

/// Contiguous class-code mapping: sorted distinct clipped point values mapped
/// to 0..k-1. Each trained model carries its own copy, so two models trained
/// on differently shaped datasets never have to agree on code meanings. EPV
/// always converts codes back through `value_of`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap {
    values: Vec<i64>,
}

impl ClassMap {
    pub fn from_labels(clipped: &[i64]) -> Self {
        let mut values: Vec<i64> = clipped.to_vec();
        values.sort_unstable();
        values.dedup();
        ClassMap { values }
    }

    pub fn num_classes(&self) -> usize {
        self.values.len()
    }

    /// Code for a clipped label value. Labels are drawn from the same data the
    /// map was built from, so the lookup always succeeds.
    ///
    /// # Panics
    ///
    /// Panics if `value` was not among the labels the map was built from.
    pub fn code_of(&self, value: i64) -> usize {
        self.values
            .binary_search(&value)
            .unwrap_or_else(|_| unreachable!("label {value} absent from class map"))
    }

    pub fn value_of(&self, code: usize) -> i64 {
        self.values[code]
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

/// Dense feature matrix with named columns, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl DesignMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Reindex this matrix to an exact target schema: columns absent here are
    /// filled with 0, columns not in the schema are dropped. This is the
    /// contract that lets a model trained on one game's one-hot column set
    /// score features whose categorical levels differ.
    pub fn reindex(&self, schema: &[String]) -> DesignMatrix {
        let source: Vec<Option<usize>> = schema
            .iter()
            .map(|name| self.columns.iter().position(|c| c == name))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                source
                    .iter()
                    .map(|idx| idx.map(|i| row[i]).unwrap_or(0.0))
                    .collect()
            })
            .collect();
        DesignMatrix {
            columns: schema.to_vec(),
            rows,
        }
    }

    /// Select a subset of rows by index (train/test splitting).
    pub fn select(&self, indices: &[usize]) -> DesignMatrix {
        DesignMatrix {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

/// Output of the shared preparation pipeline.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub poss_ids: Vec<i64>,
    pub matrix: DesignMatrix,
    /// Contiguous class codes, aligned with `matrix.rows`.
    pub codes: Vec<usize>,
    pub class_map: ClassMap,
}

/// Prepare a feature table for training or scoring:
/// 1. clip the label to [0, LABEL_CAP] and drop it from the features,
/// 2. drop every column whose name ends in `_team_id`,
/// 3. one-hot encode categoricals, dropping the first (sorted) level of each,
/// 4. recompute the contiguous class-code map from the clipped labels.
pub fn prepare<R: FeatureRecord>(rows: &[R]) -> Prepared {
    let clipped: Vec<i64> = rows.iter().map(|r| clip_label(r.points_scored())).collect();
    let class_map = ClassMap::from_labels(&clipped);
    let codes: Vec<usize> = clipped.iter().map(|&v| class_map.code_of(v)).collect();
    let poss_ids: Vec<i64> = rows.iter().map(|r| r.poss_id()).collect();

    let matrix = design_matrix(rows);

    Prepared {
        poss_ids,
        matrix,
        codes,
        class_map,
    }
}

fn design_matrix<R: FeatureRecord>(rows: &[R]) -> DesignMatrix {
    if rows.is_empty() {
        return DesignMatrix {
            columns: vec![],
            rows: vec![],
        };
    }

    let numeric_names: Vec<&'static str> = rows[0]
        .numeric_fields()
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !name.ends_with(LEAKAGE_SUFFIX))
        .collect();

    // One-hot levels per categorical column: sorted distinct values across the
    // dataset, first level dropped (dummy-variable trap).
    let cat_names: Vec<&'static str> = rows[0]
        .categorical_fields()
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !name.ends_with(LEAKAGE_SUFFIX))
        .collect();
    let mut dummy_columns: Vec<(String, &'static str, String)> = Vec::new();
    for &cat in &cat_names {
        let mut levels: Vec<String> = rows
            .iter()
            .flat_map(|r| {
                r.categorical_fields()
                    .into_iter()
                    .filter(|(name, _)| *name == cat)
                    .map(|(_, value)| value.to_string())
            })
            .collect();
        levels.sort();
        levels.dedup();
        for level in levels.into_iter().skip(1) {
            dummy_columns.push((format!("{cat}_{level}"), cat, level));
        }
    }

    let mut columns: Vec<String> = numeric_names.iter().map(|s| s.to_string()).collect();
    columns.extend(dummy_columns.iter().map(|(name, _, _)| name.clone()));

    let data = rows
        .iter()
        .map(|row| {
            let numeric = row.numeric_fields();
            let cats = row.categorical_fields();
            let mut values: Vec<f64> = numeric
                .iter()
                .filter(|(name, _)| !name.ends_with(LEAKAGE_SUFFIX))
                .map(|(_, v)| *v)
                .collect();
            for (_, cat, level) in &dummy_columns {
                let hit = cats
                    .iter()
                    .any(|(name, value)| name == cat && value == level);
                values.push(if hit { 1.0 } else { 0.0 });
            }
            values
        })
        .collect();

    DesignMatrix {
        columns,
        rows: data,
    }
}
