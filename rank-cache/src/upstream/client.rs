use core::time::Duration;

use metrics::counter;
use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::types::{AccountResponse, Envelope, MatchResponse, MmrHistoryEntry, PlayerTitle};
use super::{RateLimitPolicy, Upstream, classify};
use crate::error::UpstreamError;

/// Public game assets API serving player titles.
pub const DEFAULT_ASSETS_URL: &str = "https://valorant-api.com/v1";

/// Client of the HenrikDev Valorant API.
#[derive(Debug, Clone)]
pub struct HenrikClient {
    http_client: reqwest::Client,
    base_url: Url,
    /// Holds no credential; the assets API is public.
    assets_client: reqwest::Client,
    assets_url: Url,
    policy: RateLimitPolicy,
}

impl HenrikClient {
    /// Builds a client sending `api_key` on every request. Requests that do not
    /// complete within `timeout` fail with [`UpstreamError::Transport`].
    pub fn new(base_url: Url, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidBaseUrl.into());
        }
        let http_client = reqwest::Client::builder()
            .default_headers(default_headers(Some(api_key))?)
            .timeout(timeout)
            .build()?;
        let assets_client = reqwest::Client::builder()
            .default_headers(default_headers(None)?)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http_client,
            base_url,
            assets_client,
            assets_url: Url::parse(DEFAULT_ASSETS_URL)?,
            policy: RateLimitPolicy::Immediate,
        })
    }

    pub fn with_assets_url(mut self, assets_url: Url) -> anyhow::Result<Self> {
        if assets_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidBaseUrl.into());
        }
        self.assets_url = assets_url;
        Ok(self)
    }

    #[must_use]
    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        join_segments(&self.base_url, segments)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        client: &reqwest::Client,
        endpoint: &'static str,
        url: &Url,
    ) -> Result<T, UpstreamError> {
        let response = client.get(url.clone()).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                counter!("rank_cache.upstream.requests", "endpoint" => endpoint, "outcome" => "transport").increment(1);
                warn!("Request to {endpoint} failed: {e}");
                return Err(e.into());
            }
        };
        if let Some(err) = classify(response.status()) {
            counter!("rank_cache.upstream.requests", "endpoint" => endpoint, "outcome" => response.status().as_u16().to_string()).increment(1);
            warn!("Request to {endpoint} returned {}", response.status());
            return Err(err);
        }
        counter!("rank_cache.upstream.requests", "endpoint" => endpoint, "outcome" => "success")
            .increment(1);
        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| UpstreamError::InvalidBaseUrl)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn default_headers(api_key: Option<&str>) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(api_key) = api_key {
        let mut auth = HeaderValue::from_str(api_key)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
    }
    Ok(headers)
}

impl Upstream for HenrikClient {
    #[instrument(skip(self))]
    async fn account(&self, name: &str, tag: &str) -> Result<AccountResponse, UpstreamError> {
        let mut url = self.endpoint(&["v2", "account", name, tag])?;
        url.query_pairs_mut().append_pair("force", "true");
        debug!("Fetching account");
        self.policy
            .run(|| self.get_data(&self.http_client, "account", &url))
            .await
    }

    #[instrument(skip(self))]
    async fn mmr_history(
        &self,
        region: &str,
        puuid: &str,
    ) -> Result<Vec<MmrHistoryEntry>, UpstreamError> {
        let region = region.to_lowercase();
        let url = self.endpoint(&["v1", "by-puuid", "mmr-history", &region, puuid])?;
        debug!("Fetching mmr history");
        self.policy
            .run(|| self.get_data(&self.http_client, "mmr_history", &url))
            .await
    }

    #[instrument(skip(self))]
    async fn match_detail(
        &self,
        region: &str,
        match_id: &str,
    ) -> Result<MatchResponse, UpstreamError> {
        let region = region.to_lowercase();
        let url = self.endpoint(&["v4", "match", &region, match_id])?;
        debug!("Fetching match detail");
        self.policy
            .run(|| self.get_data(&self.http_client, "match", &url))
            .await
    }

    #[instrument(skip(self))]
    async fn player_title(&self, title_id: &str) -> Result<Option<String>, UpstreamError> {
        let url = join_segments(&self.assets_url, &["playertitles", title_id])?;
        debug!("Fetching player title");
        let title: PlayerTitle = self
            .policy
            .run(|| self.get_data(&self.assets_client, "player_title", &url))
            .await?;
        Ok(title.title_text)
    }
}
