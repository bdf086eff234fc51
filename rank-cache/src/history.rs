//! Keeps each player's ranked history a deduplicated, newest-first copy of
//! upstream, refreshed only when the staleness window has elapsed.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result, UpstreamError};
use crate::models::{MatchHistoryRecord, PlayerIdentity};
use crate::staleness::is_stale;
use crate::store::{HistoryStore, PlayerDirectory, sort_newest_first};
use crate::upstream::Upstream;

/// Upper bound on the entries taken from one upstream fetch.
pub const FETCH_LIMIT: usize = 10;

/// How many records a caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryView {
    Summary,
    Detail,
}

impl HistoryView {
    pub fn limit(self) -> usize {
        match self {
            HistoryView::Summary => 10,
            HistoryView::Detail => 5,
        }
    }
}

#[derive(Debug)]
pub struct SyncReport {
    /// Capped view, newest first.
    pub history: Vec<MatchHistoryRecord>,
    /// Whether upstream was contacted and its result stored.
    pub refreshed: bool,
    /// Records added to the store by this call.
    pub inserted: usize,
    /// Upstream failure absorbed by serving the stored history.
    pub upstream_error: Option<UpstreamError>,
}

#[derive(Debug)]
pub struct HistorySynchronizer<S, U> {
    store: Arc<S>,
    upstream: Arc<U>,
}

impl<S, U> Clone for HistorySynchronizer<S, U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
        }
    }
}

impl<S, U> HistorySynchronizer<S, U>
where
    S: PlayerDirectory + HistoryStore,
    U: Upstream,
{
    pub fn new(store: Arc<S>, upstream: Arc<U>) -> Self {
        Self { store, upstream }
    }

    #[instrument(skip(self, identity), fields(player = %identity.riot_id()))]
    pub async fn synchronize(
        &self,
        identity: &PlayerIdentity,
        view: HistoryView,
    ) -> Result<SyncReport> {
        // The directory holds the latest sync time; the caller's copy may predate it.
        let last_synchronized = match self.store.player(&identity.puuid).await? {
            Some(stored) => stored.last_synchronized,
            None => identity.last_synchronized,
        };
        let stored = self.store.history(&identity.puuid).await?;
        if !is_stale(last_synchronized) {
            counter!("rank_cache.history.refresh.skipped").increment(1);
            debug!("History is fresh, serving {} stored records", stored.len());
            return Ok(SyncReport {
                history: capped(stored, view),
                refreshed: false,
                inserted: 0,
                upstream_error: None,
            });
        }

        let fetched = match self
            .upstream
            .mmr_history(&identity.region, &identity.puuid)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                counter!("rank_cache.history.refresh.failure").increment(1);
                if stored.is_empty() {
                    warn!("History refresh failed without stored fallback: {e}");
                    return Err(Error::UpstreamFetchFailed(e));
                }
                warn!("History refresh failed, serving {} stored records: {e}", stored.len());
                return Ok(SyncReport {
                    history: capped(stored, view),
                    refreshed: false,
                    inserted: 0,
                    upstream_error: Some(e),
                });
            }
        };
        if fetched.is_empty() {
            info!("No ranked history upstream");
            return Err(Error::NoRankedHistory);
        }

        let known = stored
            .iter()
            .map(|r| r.match_id.as_str())
            .collect::<HashSet<_>>();
        let new_records = fetched
            .into_iter()
            .take(FETCH_LIMIT)
            .map(MatchHistoryRecord::from)
            .filter(|r| !known.contains(r.match_id.as_str()))
            .collect::<Vec<_>>();

        let inserted = self
            .store
            .insert_new_history(&identity.puuid, &new_records)
            .await?;
        self.store
            .mark_synchronized(&identity.puuid, Utc::now())
            .await?;
        counter!("rank_cache.history.refresh.success").increment(1);
        counter!("rank_cache.history.inserted").increment(inserted as u64);
        info!("Stored {inserted} new history records");

        let mut history = self.store.history(&identity.puuid).await?;
        sort_newest_first(&mut history);
        Ok(SyncReport {
            history: capped(history, view),
            refreshed: true,
            inserted,
            upstream_error: None,
        })
    }
}

fn capped(mut history: Vec<MatchHistoryRecord>, view: HistoryView) -> Vec<MatchHistoryRecord> {
    history.truncate(view.limit());
    history
}
