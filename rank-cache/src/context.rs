use std::sync::Arc;

use crate::history::HistorySynchronizer;
use crate::identity::IdentityResolver;
use crate::match_detail::MatchDetailCache;
use crate::store::Store;
use crate::upstream::Upstream;

/// Store handle and upstream client shared by every component. Built once at
/// startup and handed to each component it creates.
#[derive(Debug)]
pub struct Context<S, U> {
    store: Arc<S>,
    upstream: Arc<U>,
}

impl<S, U> Clone for Context<S, U> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            upstream: Arc::clone(&self.upstream),
        }
    }
}

impl<S: Store, U: Upstream> Context<S, U> {
    pub fn new(store: S, upstream: U) -> Self {
        Self {
            store: Arc::new(store),
            upstream: Arc::new(upstream),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolver(&self) -> IdentityResolver<S, U> {
        IdentityResolver::new(Arc::clone(&self.store), Arc::clone(&self.upstream))
    }

    pub fn synchronizer(&self) -> HistorySynchronizer<S, U> {
        HistorySynchronizer::new(Arc::clone(&self.store), Arc::clone(&self.upstream))
    }

    pub fn match_details(&self) -> MatchDetailCache<S, U> {
        MatchDetailCache::new(Arc::clone(&self.store), Arc::clone(&self.upstream))
    }
}
