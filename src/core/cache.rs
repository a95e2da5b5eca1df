//! Read-through cache of project totals for display layers.
//!
//! Entries are computed on first read and dropped when a [`PriceEvent`] says they may
//! be stale. The store stays the source of truth; the cache only saves recomputation.

use crate::{
    core::{
        events::PriceEvent,
        project::{self, ProjectTotals},
    },
    errors::Result,
};
use sea_orm::ConnectionTrait;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{RwLock, broadcast},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<i64, ProjectTotals>,
    // Bumped by every invalidation; a read-through only stores its result if no
    // invalidation happened while it was computing.
    generation: u64,
}

/// Project totals keyed by project id.
#[derive(Debug, Clone, Default)]
pub struct ProjectTotalsCache {
    state: Arc<RwLock<CacheState>>,
}

impl ProjectTotalsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached totals of `project_id`, computing and storing them on a miss.
    ///
    /// # Errors
    /// Returns an error if the totals have to be computed and that fails.
    pub async fn get<C>(&self, db: &C, project_id: i64) -> Result<ProjectTotals>
    where
        C: ConnectionTrait,
    {
        let generation = {
            let state = self.state.read().await;
            if let Some(totals) = state.entries.get(&project_id) {
                trace!(project_id, "Project totals cache hit");
                return Ok(totals.clone());
            }
            state.generation
        };

        let totals = project::project_totals(db, project_id).await?;
        self.store(project_id, &totals, generation).await;
        Ok(totals)
    }

    async fn store(&self, project_id: i64, totals: &ProjectTotals, generation: u64) -> bool {
        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(project_id, "Project totals went stale while computing, not cached");
            return false;
        }
        state.entries.insert(project_id, totals.clone());
        debug!(project_id, "Project totals cached");
        true
    }

    /// Returns the cached totals without touching the store.
    pub async fn peek(&self, project_id: i64) -> Option<ProjectTotals> {
        self.state.read().await.entries.get(&project_id).cloned()
    }

    /// Number of cached projects.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// True when nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Drops the entry of `project_id`.
    pub async fn invalidate(&self, project_id: i64) {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.entries.remove(&project_id);
    }

    /// Drops every entry.
    pub async fn invalidate_all(&self) {
        let mut state = self.state.write().await;
        state.generation += 1;
        let dropped = state.entries.len();
        state.entries.clear();
        info!(dropped, "Project totals cache cleared");
    }

    /// Drops the entries `event` may have made stale.
    ///
    /// A product reprice moves the cost side of every project using the product,
    /// locked or not, so all of them are dropped.
    pub async fn apply(&self, event: &PriceEvent) {
        let mut state = self.state.write().await;
        state.generation += 1;
        let entries = &mut state.entries;
        match event {
            PriceEvent::ComponentRepriced { .. } => {}
            PriceEvent::ProductRepriced { product_id } => {
                entries.retain(|_, totals| totals.product_ids.binary_search(product_id).is_err());
            }
            PriceEvent::DraftProjectsAffected { project_ids, .. } => {
                for project_id in project_ids {
                    entries.remove(project_id);
                }
            }
            PriceEvent::ProjectPricesFrozen { project_id }
            | PriceEvent::ProjectPricesUnfrozen { project_id }
            | PriceEvent::ProjectLinesChanged { project_id } => {
                entries.remove(project_id);
            }
        }
        trace!(?event, remaining = entries.len(), "Applied price event to cache");
    }

    /// Spawns a task applying every event from `events` until the bus closes.
    ///
    /// If the task falls behind and misses events, the whole cache is cleared.
    #[must_use]
    pub fn spawn_listener(&self, mut events: broadcast::Receiver<PriceEvent>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => cache.apply(&event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Project totals cache lagged behind price events");
                        cache.invalidate_all().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Project totals cache listener stopped");
        })
    }
}
