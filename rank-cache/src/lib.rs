//! Local cache of Valorant ranked history and match details.
//!
//! Player identities, ranked history and finished match details are pulled
//! from the upstream statistics API on demand and persisted, so repeated
//! lookups inside the staleness window are served without upstream calls.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod aggregate;
pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod identity;
pub mod match_detail;
pub mod models;
pub mod staleness;
pub mod store;
pub mod upstream;

pub use aggregate::{HistorySummary, aggregate};
pub use context::Context;
pub use error::{Error, Result, StoreError, UpstreamError};
pub use history::{HistorySynchronizer, HistoryView, SyncReport};
pub use identity::{IdentityResolver, Resolution, parse_identifier};
pub use match_detail::MatchDetailCache;
pub use staleness::{STALENESS_WINDOW, is_stale};
