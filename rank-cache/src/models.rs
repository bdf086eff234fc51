use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A player known to the directory, keyed by the upstream `puuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub puuid: String,
    pub name: String,
    pub tag: String,
    /// Upper-cased region code, e.g. `NA`.
    pub region: String,
    pub account_level: u32,
    pub card_id: Option<String>,
    pub title_id: Option<String>,
    /// `updated_at` as last reported by the account endpoint.
    pub upstream_updated_at: Option<DateTime<Utc>>,
    /// Local time of the last successful history refresh.
    pub last_synchronized: Option<DateTime<Utc>>,
}

impl PlayerIdentity {
    pub fn riot_id(&self) -> String {
        format!("{}#{}", self.name, self.tag)
    }

    pub fn card_image_url(&self) -> Option<String> {
        self.card_id
            .as_ref()
            .map(|card| format!("https://media.valorant-api.com/playercards/{card}/smallart.png"))
    }
}

/// One ranked match in a player's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchHistoryRecord {
    pub match_id: String,
    pub map_name: String,
    pub rr_change: i32,
    pub occurred_at: DateTime<Utc>,
    pub tier_name: String,
    pub ranking_in_tier: i32,
    pub rank_icon_url: Option<String>,
}

impl MatchHistoryRecord {
    pub fn rank(&self) -> RankSnapshot {
        RankSnapshot {
            tier_name: self.tier_name.clone(),
            ranking_in_tier: self.ranking_in_tier,
            rank_icon_url: self.rank_icon_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSnapshot {
    pub tier_name: String,
    pub ranking_in_tier: i32,
    pub rank_icon_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Blue,
    Red,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }
}

/// Result of a finished match. Blue is the first side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Blue,
    Red,
    Tie,
}

impl MatchOutcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            MatchOutcome::Blue => Some(Side::Blue),
            MatchOutcome::Red => Some(Side::Red),
            MatchOutcome::Tie => None,
        }
    }
}

impl From<Option<Side>> for MatchOutcome {
    fn from(winner: Option<Side>) -> Self {
        match winner {
            Some(Side::Blue) => MatchOutcome::Blue,
            Some(Side::Red) => MatchOutcome::Red,
            None => MatchOutcome::Tie,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityCasts {
    pub grenade: u32,
    pub ability1: u32,
    pub ability2: u32,
    pub ultimate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub name: String,
    pub tag: String,
    pub side: Side,
    pub agent: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub score: u32,
    pub headshots: u32,
    pub bodyshots: u32,
    pub legshots: u32,
    pub ability_casts: AbilityCasts,
    pub tier_name: String,
}

impl ParticipantStats {
    pub fn riot_id(&self) -> String {
        format!("{}#{}", self.name, self.tag)
    }

    pub fn total_shots(&self) -> u32 {
        self.headshots
            .saturating_add(self.bodyshots)
            .saturating_add(self.legshots)
    }

    /// Share of landed shots that were headshots, in `0.0..=1.0`.
    /// A participant without any recorded shot has a percentage of 0.
    pub fn headshot_percentage(&self) -> f64 {
        match self.total_shots() {
            0 => 0.0,
            total => f64::from(self.headshots) / f64::from(total),
        }
    }

    pub fn kd(&self) -> f64 {
        match self.deaths {
            0 => f64::from(self.kills),
            deaths => f64::from(self.kills) / f64::from(deaths),
        }
    }

    pub fn kda(&self) -> f64 {
        let takedowns = f64::from(self.kills) + f64::from(self.assists);
        match self.deaths {
            0 => takedowns,
            deaths => takedowns / f64::from(deaths),
        }
    }

    pub fn kda_line(&self) -> String {
        format!("{}-{}-{}", self.kills, self.deaths, self.assists)
    }

    /// Score divided by rounds played. This approximates, but is not, the
    /// combat score reported upstream.
    pub fn approximate_combat_score(&self, total_rounds: u32) -> f64 {
        match total_rounds {
            0 => 0.0,
            rounds => f64::from(self.score) / f64::from(rounds),
        }
    }
}

/// Fully resolved detail of one finished match, shared by all participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetailRecord {
    pub match_id: String,
    pub map_name: String,
    pub server: Option<String>,
    pub blue_rounds: u32,
    pub red_rounds: u32,
    pub outcome: MatchOutcome,
    pub participants: Vec<ParticipantStats>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl MatchDetailRecord {
    pub fn total_rounds(&self) -> u32 {
        self.blue_rounds.saturating_add(self.red_rounds)
    }

    pub fn rounds_won(&self, side: Side) -> u32 {
        match side {
            Side::Blue => self.blue_rounds,
            Side::Red => self.red_rounds,
        }
    }

    /// Rounds won by `side` followed by rounds won by its opponent.
    pub fn score_line_for(&self, side: Side) -> (u32, u32) {
        (self.rounds_won(side), self.rounds_won(side.opponent()))
    }

    pub fn winner_side(&self) -> Option<Side> {
        self.outcome.winner()
    }

    /// Side the given player played on. Name and tag compare case-insensitively.
    pub fn side_of(&self, name: &str, tag: &str) -> Option<Side> {
        self.participants
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name) && p.tag.eq_ignore_ascii_case(tag))
            .map(|p| p.side)
    }

    /// Participants of one side, best score first.
    pub fn participants_on(&self, side: Side) -> Vec<&ParticipantStats> {
        let mut players = self
            .participants
            .iter()
            .filter(|p| p.side == side)
            .collect::<Vec<_>>();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}
