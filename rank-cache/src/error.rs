use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Rate limited by upstream")]
    RateLimited,
    #[error("Resource not found upstream")]
    NotFound,
    #[error("Unexpected status code: {0}")]
    Status(StatusCode),
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("JSON parsing error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid payload: {0}")]
    InvalidPayload(&'static str),
    #[error("Upstream base url cannot hold path segments")]
    InvalidBaseUrl,
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    /// The identifier is not of the form `name#tag`.
    #[error("{0} is not a valid player name")]
    InvalidIdentifierFormat(String),
    /// The player exists but upstream reports no recent ranked games.
    #[error("No recently logged ranked games")]
    NoRankedHistory,
    #[error("Upstream fetch failed: {0}")]
    UpstreamFetchFailed(#[source] UpstreamError),
    #[error("Match detail for {match_id} unavailable: {source}")]
    MatchDetailUnavailable {
        match_id: String,
        #[source]
        source: UpstreamError,
    },
    #[error("History window is empty")]
    EmptyHistory,
    #[error("{0} is not in the player directory yet")]
    PlayerNotTracked(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
