use std::sync::Arc;

use futures::StreamExt;
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::models::{MatchDetailRecord, MatchHistoryRecord};
use crate::store::MatchDetailStore;
use crate::upstream::Upstream;

/// Detail fetches issued at once by [`MatchDetailCache::details_for`].
const DETAIL_CONCURRENCY: usize = 2;

/// Fetch-on-miss cache of finished match details.
#[derive(Debug)]
pub struct MatchDetailCache<S, U> {
    store: Arc<S>,
    upstream: Arc<U>,
}

impl<S, U> Clone for MatchDetailCache<S, U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
        }
    }
}

impl<S: MatchDetailStore, U: Upstream> MatchDetailCache<S, U> {
    pub fn new(store: Arc<S>, upstream: Arc<U>) -> Self {
        Self { store, upstream }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, region: &str, match_id: &str) -> Result<MatchDetailRecord> {
        if let Some(detail) = self.store.match_detail(match_id).await? {
            counter!("rank_cache.match_detail.hit").increment(1);
            debug!("Match detail cache hit");
            return Ok(detail);
        }
        counter!("rank_cache.match_detail.miss").increment(1);

        let fetched = self
            .upstream
            .match_detail(region, match_id)
            .await
            .and_then(MatchDetailRecord::try_from);
        let detail = match fetched {
            Ok(detail) => detail,
            Err(source) => {
                counter!("rank_cache.match_detail.failure").increment(1);
                warn!("Failed to fetch match detail: {source}");
                return Err(Error::MatchDetailUnavailable {
                    match_id: match_id.to_string(),
                    source,
                });
            }
        };
        if !self.store.insert_match_detail(&detail).await? {
            debug!("Match detail was stored concurrently");
        }
        Ok(detail)
    }

    /// Details of every entry in `history`, in the same order. Entries whose
    /// detail cannot be fetched are skipped.
    #[instrument(skip(self, history), fields(entries = history.len()))]
    pub async fn details_for(
        &self,
        region: &str,
        history: &[MatchHistoryRecord],
    ) -> Result<Vec<(MatchHistoryRecord, MatchDetailRecord)>> {
        let results = futures::stream::iter(history)
            .map(|record| async move { (record, self.get(region, &record.match_id).await) })
            .buffered(DETAIL_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        let mut details = Vec::with_capacity(results.len());
        for (record, result) in results {
            match result {
                Ok(detail) => details.push((record.clone(), detail)),
                Err(e @ Error::MatchDetailUnavailable { .. }) => {
                    warn!("Skipping match {}: {e}", record.match_id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(details)
    }
}
