//! EPV computation and baseline-vs-sequence swing ranking.
//!
//! Each call refits the requested model from its feature table and predicts
//! in-sample; possessions are immutable once ingested and the datasets are
//! single-game sized, so a fresh fit is cheaper than a staleness protocol.
//! The two models are fitted independently and may carry different
//! code-to-point-value tables; the join between them is strictly on poss_id.

use serde::Serialize;

use crate::error::{FlowstateError, Result};
use crate::model::prep::prepare;
use crate::model::{fit, FitParams};
use crate::store::{Store, TAG_BASELINE, TAG_SEQUENCE};

pub mod cache;

pub const DEFAULT_TOP_N: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpvRow {
    pub poss_id: i64,
    pub epv: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingRow {
    pub poss_id: i64,
    pub epv_baseline: f64,
    pub epv_sequence: f64,
    /// Signed: positive when the sequence model is more optimistic.
    pub swing: f64,
}

/// Per-possession EPV for one model tag ("baseline" or "sequence").
///
/// Only the two known tags are accepted; anything else is an error rather
/// than a silent fallback to one of the models.
pub fn epv_table(store: &Store, game_id: &str, tag: &str, params: &FitParams) -> Result<Vec<EpvRow>> {
    let (poss_ids, epv) = match tag {
        TAG_SEQUENCE => {
            let prepared = prepare(&store.read_sequence(game_id)?);
            let model = fit(tag, &prepared, params)?;
            (prepared.poss_ids, model.expected_points(&prepared.matrix))
        }
        TAG_BASELINE => {
            let prepared = prepare(&store.read_baseline(game_id)?);
            let model = fit(tag, &prepared, params)?;
            (prepared.poss_ids, model.expected_points(&prepared.matrix))
        }
        other => return Err(FlowstateError::UnknownTag(other.to_string())),
    };
    Ok(poss_ids
        .into_iter()
        .zip(epv)
        .map(|(poss_id, epv)| EpvRow { poss_id, epv })
        .collect())
}

/// Inner-join two EPV tables on poss_id and rank by swing magnitude.
///
/// A poss_id present in only one table is dropped, not imputed. Ordering is
/// descending |swing| with ascending poss_id breaking ties; the result is
/// truncated to top_n.
pub fn join_swing(baseline: &[EpvRow], sequence: &[EpvRow], top_n: usize) -> Vec<SwingRow> {
    let baseline_by_id: std::collections::HashMap<i64, f64> =
        baseline.iter().map(|b| (b.poss_id, b.epv)).collect();

    let mut rows: Vec<SwingRow> = sequence
        .iter()
        .filter_map(|s| {
            baseline_by_id.get(&s.poss_id).map(|&epv_baseline| SwingRow {
                poss_id: s.poss_id,
                epv_baseline,
                epv_sequence: s.epv,
                swing: s.epv - epv_baseline,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.swing
            .abs()
            .partial_cmp(&a.swing.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.poss_id.cmp(&b.poss_id))
    });
    rows.truncate(top_n);
    rows
}

/// Top-N possessions where the two models disagree the most.
pub fn swing_table(
    store: &Store,
    game_id: &str,
    top_n: usize,
    params: &FitParams,
) -> Result<Vec<SwingRow>> {
    let baseline = epv_table(store, game_id, TAG_BASELINE, params)?;
    let sequence = epv_table(store, game_id, TAG_SEQUENCE, params)?;
    Ok(join_swing(&baseline, &sequence, top_n))
}
