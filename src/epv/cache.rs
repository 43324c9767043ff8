//! Read-through cache for computed EPV tables.
//!
//! A dashboard request would otherwise refit a model on every page refresh.
//! Entries are keyed by (game_id, model_tag) and live until an explicit
//! invalidation; nothing watches the underlying files, so an operator who
//! regenerates a game's features must hit the invalidation endpoint (or
//! restart) before the dashboard reflects them.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::EpvRow;

#[derive(Clone, Default)]
pub struct EpvCache {
    inner: Arc<RwLock<HashMap<(String, String), Arc<Vec<EpvRow>>>>>,
}

impl EpvCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, game_id: &str, tag: &str) -> Option<Arc<Vec<EpvRow>>> {
        let inner = self.inner.read().await;
        inner
            .get(&(game_id.to_string(), tag.to_string()))
            .cloned()
    }

    pub async fn insert(&self, game_id: &str, tag: &str, rows: Vec<EpvRow>) -> Arc<Vec<EpvRow>> {
        let rows = Arc::new(rows);
        let mut inner = self.inner.write().await;
        inner.insert((game_id.to_string(), tag.to_string()), rows.clone());
        debug!("EpvCache: cached {game_id}/{tag} ({} entries total)", inner.len());
        rows
    }

    /// Drop every cached table for a game, across tags. Returns how many
    /// entries were removed.
    pub async fn invalidate_game(&self, game_id: &str) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|(gid, _), _| gid != game_id);
        before - inner.len()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
