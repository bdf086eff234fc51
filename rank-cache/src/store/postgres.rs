use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use super::{HistoryStore, MatchDetailStore, PlayerDirectory};
use crate::error::StoreError;
use crate::models::{MatchDetailRecord, MatchHistoryRecord, PlayerIdentity};

/// Postgres-backed store. Clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

#[derive(Debug, FromRow)]
struct PlayerRow {
    puuid: String,
    name: String,
    tag: String,
    region: String,
    account_level: i32,
    card_id: Option<String>,
    title_id: Option<String>,
    upstream_updated_at: Option<DateTime<Utc>>,
    last_synchronized: Option<DateTime<Utc>>,
}

impl From<PlayerRow> for PlayerIdentity {
    fn from(row: PlayerRow) -> Self {
        Self {
            puuid: row.puuid,
            name: row.name,
            tag: row.tag,
            region: row.region,
            account_level: u32::try_from(row.account_level).unwrap_or_default(),
            card_id: row.card_id,
            title_id: row.title_id,
            upstream_updated_at: row.upstream_updated_at,
            last_synchronized: row.last_synchronized,
        }
    }
}

const PLAYER_COLUMNS: &str = "puuid, name, tag, region, account_level, card_id, title_id, \
                              upstream_updated_at, last_synchronized";

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

impl PlayerDirectory for PgStore {
    #[instrument(skip(self))]
    async fn player(&self, puuid: &str) -> Result<Option<PlayerIdentity>, StoreError> {
        let row: Option<PlayerRow> =
            sqlx::query_as(&format!("SELECT {PLAYER_COLUMNS} FROM players WHERE puuid = $1"))
                .bind(puuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn player_by_name_tag(
        &self,
        name: &str,
        tag: &str,
    ) -> Result<Option<PlayerIdentity>, StoreError> {
        let row: Option<PlayerRow> = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE name = $1 AND tag = $2 \
             ORDER BY upstream_updated_at DESC NULLS LAST LIMIT 1"
        ))
        .bind(name)
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    #[instrument(skip(self, identity), fields(puuid = %identity.puuid))]
    async fn upsert_player(&self, identity: &PlayerIdentity) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO players ({PLAYER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (puuid) DO UPDATE SET name = EXCLUDED.name, tag = EXCLUDED.tag, \
             region = EXCLUDED.region, account_level = EXCLUDED.account_level, \
             card_id = EXCLUDED.card_id, title_id = EXCLUDED.title_id, \
             upstream_updated_at = EXCLUDED.upstream_updated_at"
        ))
        .bind(&identity.puuid)
        .bind(&identity.name)
        .bind(&identity.tag)
        .bind(&identity.region)
        .bind(i32::try_from(identity.account_level).unwrap_or(i32::MAX))
        .bind(&identity.card_id)
        .bind(&identity.title_id)
        .bind(identity.upstream_updated_at)
        .bind(identity.last_synchronized)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_synchronized(&self, puuid: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE players SET last_synchronized = $2 WHERE puuid = $1")
            .bind(puuid)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

impl HistoryStore for PgStore {
    #[instrument(skip(self))]
    async fn history(&self, puuid: &str) -> Result<Vec<MatchHistoryRecord>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT match_id, map_name, rr_change, occurred_at, tier_name, ranking_in_tier, \
             rank_icon_url FROM match_history WHERE puuid = $1 \
             ORDER BY occurred_at DESC, match_id ASC",
        )
        .bind(puuid)
        .fetch_all(&self.pool)
        .await?)
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn insert_new_history(
        &self,
        puuid: &str,
        records: &[MatchHistoryRecord],
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut query = QueryBuilder::new(
            "INSERT INTO match_history(puuid, match_id, map_name, rr_change, occurred_at, \
             tier_name, ranking_in_tier, rank_icon_url) ",
        );
        query.push_values(records, |mut b, record| {
            b.push_bind(puuid)
                .push_bind(&record.match_id)
                .push_bind(&record.map_name)
                .push_bind(record.rr_change)
                .push_bind(record.occurred_at)
                .push_bind(&record.tier_name)
                .push_bind(record.ranking_in_tier)
                .push_bind(&record.rank_icon_url);
        });
        query.push(" ON CONFLICT (puuid, match_id) DO NOTHING");
        let result = query.build().execute(&self.pool).await?;
        debug!("Inserted {} history records", result.rows_affected());
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }
}

impl MatchDetailStore for PgStore {
    #[instrument(skip(self))]
    async fn match_detail(&self, match_id: &str) -> Result<Option<MatchDetailRecord>, StoreError> {
        let data: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM match_details WHERE match_id = $1")
                .bind(match_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(data.map(serde_json::from_value).transpose()?)
    }

    #[instrument(skip(self, detail), fields(match_id = %detail.match_id))]
    async fn insert_match_detail(&self, detail: &MatchDetailRecord) -> Result<bool, StoreError> {
        let data = serde_json::to_value(detail)?;
        let result = sqlx::query(
            "INSERT INTO match_details(match_id, map_name, started_at, data) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (match_id) DO NOTHING",
        )
        .bind(&detail.match_id)
        .bind(&detail.map_name)
        .bind(detail.started_at)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
