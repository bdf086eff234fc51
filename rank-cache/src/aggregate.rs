use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{MatchHistoryRecord, RankSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub games: usize,
    pub net_change: i64,
    /// Mean rating change per game, rounded to two decimals.
    pub average_change: f64,
    /// Rank after the most recent game.
    pub current: RankSnapshot,
}

/// Summarizes a newest-first history window.
pub fn aggregate(history: &[MatchHistoryRecord]) -> Result<HistorySummary> {
    let Some(latest) = history.first() else {
        return Err(Error::EmptyHistory);
    };
    let net_change = history.iter().map(|r| i64::from(r.rr_change)).sum::<i64>();
    let average = net_change as f64 / history.len() as f64;
    Ok(HistorySummary {
        games: history.len(),
        net_change,
        average_change: (average * 100.0).round() / 100.0,
        current: latest.rank(),
    })
}
