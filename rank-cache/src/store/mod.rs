//! Persistence of the player directory, per-player match history and match details.
//!
//! All inserts are insert-if-absent on the record's key, so concurrent writers
//! racing on the same data never produce duplicates.

use core::future::Future;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{MatchDetailRecord, MatchHistoryRecord, PlayerIdentity};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait PlayerDirectory: Send + Sync {
    fn player(
        &self,
        puuid: &str,
    ) -> impl Future<Output = Result<Option<PlayerIdentity>, StoreError>> + Send;

    /// Exact (case-sensitive) match on the stored name and tag.
    fn player_by_name_tag(
        &self,
        name: &str,
        tag: &str,
    ) -> impl Future<Output = Result<Option<PlayerIdentity>, StoreError>> + Send;

    /// Inserts or updates the player keyed by `puuid`. Never modifies
    /// `last_synchronized` of an existing entry.
    fn upsert_player(
        &self,
        identity: &PlayerIdentity,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn mark_synchronized(
        &self,
        puuid: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

pub trait HistoryStore: Send + Sync {
    /// Every stored record of the player, newest first. Records sharing an
    /// occurrence time are ordered by match id.
    fn history(
        &self,
        puuid: &str,
    ) -> impl Future<Output = Result<Vec<MatchHistoryRecord>, StoreError>> + Send;

    /// Stores the records not yet present for the player and returns how many were new.
    fn insert_new_history(
        &self,
        puuid: &str,
        records: &[MatchHistoryRecord],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

pub trait MatchDetailStore: Send + Sync {
    fn match_detail(
        &self,
        match_id: &str,
    ) -> impl Future<Output = Result<Option<MatchDetailRecord>, StoreError>> + Send;

    /// Returns `false` when a detail with the same match id was already stored.
    fn insert_match_detail(
        &self,
        detail: &MatchDetailRecord,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Everything the cache persists.
pub trait Store: PlayerDirectory + HistoryStore + MatchDetailStore {}

impl<T: PlayerDirectory + HistoryStore + MatchDetailStore> Store for T {}

pub(crate) fn sort_newest_first(records: &mut [MatchHistoryRecord]) {
    records.sort_by(|a, b| {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| a.match_id.cmp(&b.match_id))
    });
}
