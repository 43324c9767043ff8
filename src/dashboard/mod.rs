use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::epv::cache::EpvCache;
use crate::epv::{self, EpvRow, DEFAULT_TOP_N, SwingRow};
use crate::error::{FlowstateError, Result};
use crate::model::FitParams;
use crate::store::{Store, TAG_BASELINE, TAG_SEQUENCE};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub cache: EpvCache,
    pub fit_params: FitParams,
}

/// Build the Axum router for the dashboard and JSON API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/game/:game_id/epv", get(epv_handler))
        .route("/api/game/:game_id/swing", get(swing_handler))
        .route("/api/game/:game_id/invalidate", post(invalidate_handler))
        .route("/api/cache/clear", post(clear_cache_handler))
        .route("/api/stats", get(stats_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Read-through: serve a cached EPV table or compute and cache it.
async fn epv_cached(state: &AppState, game_id: &str, tag: &str) -> Result<Arc<Vec<EpvRow>>> {
    if let Some(hit) = state.cache.get(game_id, tag).await {
        return Ok(hit);
    }
    let rows = epv::epv_table(&state.store, game_id, tag, &state.fit_params)?;
    Ok(state.cache.insert(game_id, tag, rows).await)
}

fn error_response(err: FlowstateError) -> (StatusCode, String) {
    let status = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, err.to_string())
}

async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

#[derive(Deserialize)]
struct EpvQuery {
    tag: Option<String>,
}

/// GET /api/game/:game_id/epv?tag=sequence
async fn epv_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    Query(query): Query<EpvQuery>,
) -> std::result::Result<Json<Vec<EpvRow>>, (StatusCode, String)> {
    // Anything other than an explicit "baseline" serves the sequence model,
    // matching the CLI default. Keeps arbitrary tags out of the cache keys.
    let tag = if query.tag.as_deref() == Some(TAG_BASELINE) {
        TAG_BASELINE
    } else {
        TAG_SEQUENCE
    };
    epv_cached(&state, &game_id, tag)
        .await
        .map(|rows| Json(rows.as_ref().clone()))
        .map_err(error_response)
}

#[derive(Deserialize)]
struct SwingQuery {
    top_n: Option<usize>,
}

/// GET /api/game/:game_id/swing?top_n=20
async fn swing_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
    Query(query): Query<SwingQuery>,
) -> std::result::Result<Json<Vec<SwingRow>>, (StatusCode, String)> {
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N);
    let baseline = epv_cached(&state, &game_id, TAG_BASELINE)
        .await
        .map_err(error_response)?;
    let sequence = epv_cached(&state, &game_id, TAG_SEQUENCE)
        .await
        .map_err(error_response)?;
    Ok(Json(epv::join_swing(&baseline, &sequence, top_n)))
}

/// POST /api/game/:game_id/invalidate: drop cached tables after regenerating
/// a game's features or models.
async fn invalidate_handler(
    State(state): State<Arc<AppState>>,
    Path(game_id): Path<String>,
) -> impl IntoResponse {
    let removed = state.cache.invalidate_game(&game_id).await;
    Json(json!({ "game_id": game_id, "removed": removed }))
}

/// POST /api/cache/clear: drop every cached table.
async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.cache.clear().await;
    Json(json!({ "cleared": true }))
}

/// GET /api/stats
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "cached_tables": state.cache.len().await }))
}

/// Embedded single-file dashboard (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Flowstate EPV Dashboard</title>
<style>
  :root {
    --bg: #0f1117;
    --card: #1a1d27;
    --border: #2a2d3a;
    --accent: #ff7a45;
    --green: #00c896;
    --red: #ff4f6a;
    --text: #e0e0e0;
    --muted: #8888aa;
  }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { display: flex; align-items: center; gap: 1rem; padding: 1rem 2rem; border-bottom: 1px solid var(--border); }
  header h1 { font-size: 1.4rem; font-weight: 700; }
  main { padding: 1.5rem 2rem; display: grid; gap: 1.5rem; }
  .controls { display: flex; gap: .8rem; align-items: center; }
  input { background: var(--card); border: 1px solid var(--border); color: var(--text); padding: .5rem .8rem; border-radius: 6px; font-size: .9rem; }
  button { background: var(--accent); border: none; color: #000; font-weight: 600; padding: .5rem 1rem; border-radius: 6px; cursor: pointer; }
  button.secondary { background: none; border: 1px solid var(--border); color: var(--muted); }
  button.secondary:hover { border-color: var(--accent); color: var(--accent); }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  .panel-header { padding: .9rem 1.2rem; border-bottom: 1px solid var(--border); font-weight: 600; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  tr:last-child td { border-bottom: none; }
  .pos { color: var(--green); }
  .neg { color: var(--red); }
  .empty { color: var(--muted); text-align: center; padding: 2rem; font-size: .9rem; }
  .two-col { display: grid; grid-template-columns: 2fr 1fr; gap: 1.5rem; }
  @media (max-width: 768px) { .two-col { grid-template-columns: 1fr; } }
</style>
</head>
<body>
<header>
  <h1>&#127936; Flowstate EPV</h1>
  <span style="margin-left:auto;color:var(--muted);font-size:.8rem;" id="status"></span>
</header>

<main>
  <div class="controls">
    <label for="game-id" style="color:var(--muted);font-size:.85rem;">Game ID</label>
    <input id="game-id" value="0022400001" size="12">
    <button onclick="loadAll()">Load</button>
    <button class="secondary" onclick="invalidate()">Invalidate cache</button>
  </div>

  <div class="two-col">
    <div class="panel">
      <div class="panel-header">Top EPV Swings (sequence &minus; baseline)</div>
      <table>
        <thead><tr><th>Poss</th><th>Baseline EPV</th><th>Sequence EPV</th><th>Swing</th></tr></thead>
        <tbody id="swing-tbody"><tr><td colspan="4" class="empty">Load a game</td></tr></tbody>
      </table>
    </div>

    <div class="panel">
      <div class="panel-header">Sequence EPV by Possession</div>
      <table>
        <thead><tr><th>Poss</th><th>EPV</th></tr></thead>
        <tbody id="epv-tbody"><tr><td colspan="2" class="empty">Load a game</td></tr></tbody>
      </table>
    </div>
  </div>
</main>

<script>
const gameId = () => document.getElementById('game-id').value.trim();
const setStatus = msg => document.getElementById('status').textContent = msg;

async function loadSwing() {
  const tbody = document.getElementById('swing-tbody');
  const r = await fetch(`/api/game/${gameId()}/swing?top_n=20`);
  if (!r.ok) { tbody.innerHTML = `<tr><td colspan="4" class="empty">${await r.text()}</td></tr>`; return; }
  const rows = await r.json();
  if (!rows.length) { tbody.innerHTML = '<tr><td colspan="4" class="empty">No possessions</td></tr>'; return; }
  tbody.innerHTML = rows.map(s => `<tr>
    <td>${s.poss_id}</td>
    <td>${s.epv_baseline.toFixed(3)}</td>
    <td>${s.epv_sequence.toFixed(3)}</td>
    <td class="${s.swing >= 0 ? 'pos' : 'neg'}">${(s.swing >= 0 ? '+' : '') + s.swing.toFixed(3)}</td>
  </tr>`).join('');
}

async function loadEpv() {
  const tbody = document.getElementById('epv-tbody');
  const r = await fetch(`/api/game/${gameId()}/epv?tag=sequence`);
  if (!r.ok) { tbody.innerHTML = `<tr><td colspan="2" class="empty">${await r.text()}</td></tr>`; return; }
  const rows = await r.json();
  tbody.innerHTML = rows.map(e => `<tr><td>${e.poss_id}</td><td>${e.epv.toFixed(3)}</td></tr>`).join('');
}

async function invalidate() {
  const r = await fetch(`/api/game/${gameId()}/invalidate`, { method: 'POST' });
  if (r.ok) { const j = await r.json(); setStatus(`Invalidated ${j.removed} cached table(s)`); }
}

async function loadAll() {
  setStatus('Loading…');
  await Promise.all([loadSwing(), loadEpv()]);
  setStatus('Updated ' + new Date().toLocaleTimeString());
}
</script>
</body>
</html>"#;
