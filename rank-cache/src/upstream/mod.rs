use core::future::Future;
use core::time::Duration;

use reqwest::StatusCode;

use crate::error::UpstreamError;

mod client;
pub mod types;

pub use client::HenrikClient;
use types::{AccountResponse, MatchResponse, MmrHistoryEntry};

/// The upstream operations the cache depends on.
pub trait Upstream: Send + Sync {
    fn account(
        &self,
        name: &str,
        tag: &str,
    ) -> impl Future<Output = Result<AccountResponse, UpstreamError>> + Send;

    /// Most recent ranked history entries, newest first.
    fn mmr_history(
        &self,
        region: &str,
        puuid: &str,
    ) -> impl Future<Output = Result<Vec<MmrHistoryEntry>, UpstreamError>> + Send;

    fn match_detail(
        &self,
        region: &str,
        match_id: &str,
    ) -> impl Future<Output = Result<MatchResponse, UpstreamError>> + Send;

    /// Display text of a player title. `None` when the title has no text.
    fn player_title(
        &self,
        title_id: &str,
    ) -> impl Future<Output = Result<Option<String>, UpstreamError>> + Send;
}

/// Maps a response status to the error it represents, if any.
pub fn classify(status: StatusCode) -> Option<UpstreamError> {
    match status {
        s if s.is_success() => None,
        StatusCode::TOO_MANY_REQUESTS => Some(UpstreamError::RateLimited),
        StatusCode::NOT_FOUND => Some(UpstreamError::NotFound),
        s => Some(UpstreamError::Status(s)),
    }
}

/// How a caller reacts to [`UpstreamError::RateLimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// Surface the throttling immediately. Used for user-facing requests.
    #[default]
    Immediate,
    /// Wait the cooldown and retry exactly once. Used by batch jobs.
    CooldownOnce(Duration),
}

impl RateLimitPolicy {
    pub async fn run<F, Fut, T>(self, operation: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        match self {
            RateLimitPolicy::Immediate => {
                let mut operation = operation;
                operation().await
            }
            RateLimitPolicy::CooldownOnce(cooldown) => {
                common::retry_once_after_cooldown(
                    cooldown,
                    UpstreamError::is_rate_limited,
                    operation,
                )
                .await
            }
        }
    }
}
