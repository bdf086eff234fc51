//! Response schemas of the upstream statistics API.
//!
//! Every payload is wrapped in a `{"status": .., "data": ..}` envelope. Only the
//! fields the cache needs are declared; unknown fields are ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::UpstreamError;
use crate::models::{
    AbilityCasts, MatchDetailRecord, MatchHistoryRecord, MatchOutcome, ParticipantStats,
    PlayerIdentity, Side,
};

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub puuid: String,
    pub region: String,
    pub account_level: u32,
    pub card: Option<String>,
    pub title: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AccountResponse {
    /// Builds the directory entry for this account. `last_synchronized` is
    /// carried over from the previous entry, if any.
    pub fn into_identity(
        self,
        name: &str,
        tag: &str,
        last_synchronized: Option<DateTime<Utc>>,
    ) -> PlayerIdentity {
        PlayerIdentity {
            puuid: self.puuid,
            name: name.to_string(),
            tag: tag.to_string(),
            region: self.region.to_uppercase(),
            account_level: self.account_level,
            card_id: self.card,
            title_id: self.title,
            upstream_updated_at: Some(self.updated_at),
            last_synchronized,
        }
    }
}

/// Player title from the public game assets API.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerTitle {
    #[serde(rename = "titleText")]
    pub title_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankImages {
    pub small: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MmrHistoryEntry {
    pub match_id: String,
    pub mmr_change_to_last_game: i32,
    pub map: MapRef,
    pub currenttierpatched: String,
    pub ranking_in_tier: i32,
    pub images: RankImages,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date_raw: DateTime<Utc>,
}

impl From<MmrHistoryEntry> for MatchHistoryRecord {
    fn from(entry: MmrHistoryEntry) -> Self {
        Self {
            match_id: entry.match_id,
            map_name: entry.map.name,
            rr_change: entry.mmr_change_to_last_game,
            occurred_at: entry.date_raw,
            tier_name: entry.currenttierpatched,
            ranking_in_tier: entry.ranking_in_tier,
            rank_icon_url: entry.images.small,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchResponse {
    pub metadata: MatchMetadata,
    pub players: Vec<MatchPlayer>,
    pub teams: Vec<MatchTeam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchMetadata {
    pub match_id: String,
    pub map: MapRef,
    pub cluster: Option<String>,
    pub started_at: DateTime<Utc>,
    pub game_length_in_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchPlayer {
    pub name: String,
    pub tag: String,
    pub team_id: Side,
    pub agent: NamedRef,
    pub stats: PlayerStats,
    pub ability_casts: RawAbilityCasts,
    pub tier: NamedRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerStats {
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub legshots: u32,
}

/// Ability counters are `null` for agents or matches where they were not tracked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAbilityCasts {
    pub grenade: Option<u32>,
    pub ability1: Option<u32>,
    pub ability2: Option<u32>,
    pub ultimate: Option<u32>,
}

impl From<RawAbilityCasts> for AbilityCasts {
    fn from(raw: RawAbilityCasts) -> Self {
        Self {
            grenade: raw.grenade.unwrap_or_default(),
            ability1: raw.ability1.unwrap_or_default(),
            ability2: raw.ability2.unwrap_or_default(),
            ultimate: raw.ultimate.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchTeam {
    pub team_id: Side,
    pub rounds: TeamRounds,
    pub won: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRounds {
    pub won: u32,
}

impl From<MatchPlayer> for ParticipantStats {
    fn from(player: MatchPlayer) -> Self {
        Self {
            name: player.name,
            tag: player.tag,
            side: player.team_id,
            agent: player.agent.name,
            kills: player.stats.kills,
            deaths: player.stats.deaths,
            assists: player.stats.assists,
            score: player.stats.score,
            headshots: player.stats.headshots,
            bodyshots: player.stats.bodyshots,
            legshots: player.stats.legshots,
            ability_casts: player.ability_casts.into(),
            tier_name: player.tier.name,
        }
    }
}

impl TryFrom<MatchResponse> for MatchDetailRecord {
    type Error = UpstreamError;

    fn try_from(response: MatchResponse) -> Result<Self, Self::Error> {
        let rounds_of = |side: Side| {
            response
                .teams
                .iter()
                .find(|t| t.team_id == side)
                .map_or(0, |t| t.rounds.won)
        };
        let blue_rounds = rounds_of(Side::Blue);
        let red_rounds = rounds_of(Side::Red);
        let winner = response
            .teams
            .iter()
            .find(|t| t.won == Some(true))
            .map(|t| t.team_id);

        let metadata = response.metadata;
        let started_at = metadata.started_at;
        let ended_at = chrono::TimeDelta::try_milliseconds(metadata.game_length_in_ms)
            .and_then(|length| started_at.checked_add_signed(length))
            .ok_or(UpstreamError::InvalidPayload("game length out of range"))?;
        Ok(Self {
            match_id: metadata.match_id,
            map_name: metadata.map.name,
            server: metadata.cluster,
            blue_rounds,
            red_rounds,
            outcome: MatchOutcome::from(winner),
            participants: response.players.into_iter().map(Into::into).collect(),
            started_at,
            ended_at,
        })
    }
}
