use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::models::PlayerIdentity;
use crate::store::PlayerDirectory;
use crate::upstream::Upstream;

/// Splits a `name#tag` identifier. Exactly one `#` is accepted.
pub fn parse_identifier(identifier: &str) -> Result<(&str, &str)> {
    let mut parts = identifier.split('#');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(tag), None) => Ok((name, tag)),
        _ => Err(Error::InvalidIdentifierFormat(identifier.to_string())),
    }
}

/// A resolved player plus the `updated_at` freshly reported by upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: PlayerIdentity,
    pub upstream_updated_at: DateTime<Utc>,
    /// Display text of the player's title, when it could be looked up.
    pub title: Option<String>,
}

/// Turns `name#tag` identifiers into directory entries.
#[derive(Debug)]
pub struct IdentityResolver<S, U> {
    store: Arc<S>,
    upstream: Arc<U>,
}

impl<S, U> Clone for IdentityResolver<S, U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
        }
    }
}

impl<S: PlayerDirectory, U: Upstream> IdentityResolver<S, U> {
    pub fn new(store: Arc<S>, upstream: Arc<U>) -> Self {
        Self { store, upstream }
    }

    /// Looks the account up upstream and creates or refreshes its directory
    /// entry. A renamed player keeps its entry, since entries are keyed by puuid.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<Resolution> {
        let (name, tag) = parse_identifier(identifier)?;

        let known = self.store.player_by_name_tag(name, tag).await?;
        let account = self
            .upstream
            .account(name, tag)
            .await
            .map_err(Error::UpstreamFetchFailed)?;
        let upstream_updated_at = account.updated_at;

        // The name may have moved to a different account, so the previous
        // entry is looked up by the fresh puuid.
        let previous = match known {
            Some(p) if p.puuid == account.puuid => Some(p),
            _ => self.store.player(&account.puuid).await?,
        };
        let identity = account.into_identity(
            name,
            tag,
            previous.as_ref().and_then(|p| p.last_synchronized),
        );
        self.store.upsert_player(&identity).await?;

        match previous {
            Some(p) => {
                counter!("rank_cache.identity.updated").increment(1);
                if p.riot_id() != identity.riot_id() {
                    info!("Player {} is now known as {}", p.riot_id(), identity.riot_id());
                } else {
                    debug!("Refreshed player {}", identity.riot_id());
                }
            }
            None => {
                counter!("rank_cache.identity.created").increment(1);
                info!("Tracking new player {}", identity.riot_id());
            }
        }

        let title = match &identity.title_id {
            Some(title_id) => self.title_text(title_id).await,
            None => None,
        };

        Ok(Resolution {
            identity,
            upstream_updated_at,
            title,
        })
    }

    /// A missing title never fails resolution.
    async fn title_text(&self, title_id: &str) -> Option<String> {
        match self.upstream.player_title(title_id).await {
            Ok(title) => title,
            Err(e) => {
                warn!("Failed to look up title {title_id}: {e}");
                None
            }
        }
    }

    /// Resolves against the directory only, without any upstream call.
    #[instrument(skip(self))]
    pub async fn find_tracked(&self, identifier: &str) -> Result<PlayerIdentity> {
        let (name, tag) = parse_identifier(identifier)?;
        match self.store.player_by_name_tag(name, tag).await? {
            Some(identity) => Ok(identity),
            None => {
                warn!("{identifier} is not tracked");
                Err(Error::PlayerNotTracked(identifier.to_string()))
            }
        }
    }
}
