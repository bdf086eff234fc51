use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;

use super::{HistoryStore, MatchDetailStore, PlayerDirectory, sort_newest_first};
use crate::error::StoreError;
use crate::models::{MatchDetailRecord, MatchHistoryRecord, PlayerIdentity};

/// Process-local store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    players: Arc<DashMap<String, PlayerIdentity>>,
    history: Arc<DashMap<String, HashMap<String, MatchHistoryRecord>>>,
    details: Arc<DashMap<String, MatchDetailRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerDirectory for MemoryStore {
    async fn player(&self, puuid: &str) -> Result<Option<PlayerIdentity>, StoreError> {
        Ok(self.players.get(puuid).map(|p| p.value().clone()))
    }

    async fn player_by_name_tag(
        &self,
        name: &str,
        tag: &str,
    ) -> Result<Option<PlayerIdentity>, StoreError> {
        Ok(self
            .players
            .iter()
            .filter(|p| p.name == name && p.tag == tag)
            // Most recently updated upstream wins; a missing timestamp sorts last.
            .max_by_key(|p| p.upstream_updated_at)
            .map(|p| p.value().clone()))
    }

    async fn upsert_player(&self, identity: &PlayerIdentity) -> Result<(), StoreError> {
        self.players
            .entry(identity.puuid.clone())
            .and_modify(|stored| {
                let last_synchronized = stored.last_synchronized;
                *stored = PlayerIdentity {
                    last_synchronized,
                    ..identity.clone()
                };
            })
            .or_insert_with(|| identity.clone());
        Ok(())
    }

    async fn mark_synchronized(&self, puuid: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(mut stored) = self.players.get_mut(puuid) {
            stored.last_synchronized = Some(at);
        }
        Ok(())
    }
}

impl HistoryStore for MemoryStore {
    async fn history(&self, puuid: &str) -> Result<Vec<MatchHistoryRecord>, StoreError> {
        let mut records = self
            .history
            .get(puuid)
            .map(|h| h.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn insert_new_history(
        &self,
        puuid: &str,
        records: &[MatchHistoryRecord],
    ) -> Result<usize, StoreError> {
        let mut stored = self.history.entry(puuid.to_string()).or_default();
        let mut inserted = 0;
        for record in records {
            if let Entry::Vacant(slot) = stored.entry(record.match_id.clone()) {
                slot.insert(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

impl MatchDetailStore for MemoryStore {
    async fn match_detail(&self, match_id: &str) -> Result<Option<MatchDetailRecord>, StoreError> {
        Ok(self.details.get(match_id).map(|d| d.value().clone()))
    }

    async fn insert_match_detail(&self, detail: &MatchDetailRecord) -> Result<bool, StoreError> {
        match self.details.entry(detail.match_id.clone()) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(slot) => {
                slot.insert(detail.clone());
                Ok(true)
            }
        }
    }
}
