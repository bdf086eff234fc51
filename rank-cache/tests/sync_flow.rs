use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rank_cache::error::UpstreamError;
use rank_cache::models::{MatchOutcome, Side};
use rank_cache::store::{HistoryStore, MatchDetailStore, MemoryStore, PlayerDirectory};
use rank_cache::upstream::Upstream;
use rank_cache::upstream::types::{
    AccountResponse, MapRef, MatchMetadata, MatchPlayer, MatchResponse, MatchTeam,
    MmrHistoryEntry, NamedRef, PlayerStats, RankImages, RawAbilityCasts, TeamRounds,
};
use rank_cache::{Context, Error, HistoryView, aggregate};
use reqwest::StatusCode;

const PUUID: &str = "puuid-alpha";

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 2, 12, 0, 0).unwrap()
}

fn account(puuid: &str) -> AccountResponse {
    AccountResponse {
        puuid: puuid.to_string(),
        region: "eu".to_string(),
        account_level: 120,
        card: Some("card-1".to_string()),
        title: None,
        updated_at: base_time(),
    }
}

fn entry(match_id: &str, minute: i64, rr_change: i32) -> MmrHistoryEntry {
    MmrHistoryEntry {
        match_id: match_id.to_string(),
        mmr_change_to_last_game: rr_change,
        map: MapRef {
            name: "Bind".to_string(),
        },
        currenttierpatched: "Gold 3".to_string(),
        ranking_in_tier: 50 + i32::try_from(minute).unwrap(),
        images: RankImages { small: None },
        date_raw: base_time() + Duration::minutes(minute),
    }
}

fn match_response(match_id: &str) -> MatchResponse {
    MatchResponse {
        metadata: MatchMetadata {
            match_id: match_id.to_string(),
            map: MapRef {
                name: "Ascent".to_string(),
            },
            cluster: Some("Frankfurt".to_string()),
            started_at: base_time(),
            game_length_in_ms: 1_800_000,
        },
        players: vec![MatchPlayer {
            name: "Alpha".to_string(),
            tag: "EUW".to_string(),
            team_id: Side::Blue,
            agent: NamedRef {
                name: "Sova".to_string(),
            },
            stats: PlayerStats {
                score: 4200,
                kills: 18,
                deaths: 12,
                assists: 6,
                headshots: 9,
                bodyshots: 27,
                legshots: 0,
            },
            ability_casts: RawAbilityCasts::default(),
            tier: NamedRef {
                name: "Gold 3".to_string(),
            },
        }],
        teams: vec![
            MatchTeam {
                team_id: Side::Blue,
                rounds: TeamRounds { won: 13 },
                won: Some(true),
            },
            MatchTeam {
                team_id: Side::Red,
                rounds: TeamRounds { won: 7 },
                won: Some(false),
            },
        ],
    }
}

#[derive(Default)]
struct FakeState {
    accounts: Mutex<HashMap<(String, String), AccountResponse>>,
    histories: Mutex<HashMap<String, Vec<MmrHistoryEntry>>>,
    missing_matches: Mutex<HashSet<String>>,
    corrupt_matches: Mutex<HashSet<String>>,
    titles: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
    account_calls: AtomicUsize,
    history_calls: AtomicUsize,
    match_calls: AtomicUsize,
}

/// Upstream double that counts its calls. Clones share state.
#[derive(Clone, Default)]
struct FakeUpstream(Arc<FakeState>);

impl FakeUpstream {
    fn with_player(name: &str, tag: &str, history: Vec<MmrHistoryEntry>) -> Self {
        let fake = Self::default();
        fake.add_account(name, tag, PUUID);
        fake.set_history(PUUID, history);
        fake
    }

    fn add_account(&self, name: &str, tag: &str, puuid: &str) {
        self.0
            .accounts
            .lock()
            .unwrap()
            .insert((name.to_string(), tag.to_string()), account(puuid));
    }

    fn set_history(&self, puuid: &str, history: Vec<MmrHistoryEntry>) {
        self.0
            .histories
            .lock()
            .unwrap()
            .insert(puuid.to_string(), history);
    }

    fn set_title(&self, title_id: &str, text: &str) {
        self.0
            .titles
            .lock()
            .unwrap()
            .insert(title_id.to_string(), text.to_string());
    }

    fn fail(&self, failing: bool) {
        self.0.failing.store(failing, Ordering::SeqCst);
    }

    fn account_calls(&self) -> usize {
        self.0.account_calls.load(Ordering::SeqCst)
    }

    fn history_calls(&self) -> usize {
        self.0.history_calls.load(Ordering::SeqCst)
    }

    fn match_calls(&self) -> usize {
        self.0.match_calls.load(Ordering::SeqCst)
    }
}

impl Upstream for FakeUpstream {
    async fn account(&self, name: &str, tag: &str) -> Result<AccountResponse, UpstreamError> {
        self.0.account_calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .accounts
            .lock()
            .unwrap()
            .get(&(name.to_string(), tag.to_string()))
            .cloned()
            .ok_or(UpstreamError::NotFound)
    }

    async fn mmr_history(
        &self,
        _region: &str,
        puuid: &str,
    ) -> Result<Vec<MmrHistoryEntry>, UpstreamError> {
        self.0.history_calls.fetch_add(1, Ordering::SeqCst);
        // Lets a concurrent synchronization observe the same stale state.
        tokio::task::yield_now().await;
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status(StatusCode::BAD_GATEWAY));
        }
        let history = self.0.histories.lock().unwrap().get(puuid).cloned();
        Ok(history.unwrap_or_default())
    }

    async fn match_detail(
        &self,
        _region: &str,
        match_id: &str,
    ) -> Result<MatchResponse, UpstreamError> {
        self.0.match_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.failing.load(Ordering::SeqCst)
            || self.0.missing_matches.lock().unwrap().contains(match_id)
        {
            return Err(UpstreamError::NotFound);
        }
        let mut response = match_response(match_id);
        if self.0.corrupt_matches.lock().unwrap().contains(match_id) {
            response.metadata.game_length_in_ms = i64::MAX;
        }
        Ok(response)
    }

    async fn player_title(&self, title_id: &str) -> Result<Option<String>, UpstreamError> {
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::Status(StatusCode::BAD_GATEWAY));
        }
        self.0
            .titles
            .lock()
            .unwrap()
            .get(title_id)
            .cloned()
            .map(Some)
            .ok_or(UpstreamError::NotFound)
    }
}

fn three_games() -> Vec<MmrHistoryEntry> {
    vec![entry("m3", 30, 15), entry("m2", 20, -12), entry("m1", 10, 20)]
}

fn context(fake: &FakeUpstream) -> Context<MemoryStore, FakeUpstream> {
    Context::new(MemoryStore::new(), fake.clone())
}

/// Moves the player's last refresh out of the staleness window.
async fn expire(ctx: &Context<MemoryStore, FakeUpstream>) {
    ctx.store()
        .mark_synchronized(PUUID, Utc::now() - Duration::minutes(10))
        .await
        .unwrap();
}

#[tokio::test]
async fn resolve_sync_and_aggregate() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);

    let resolution = ctx.resolver().resolve("Alpha#EUW").await.unwrap();
    assert_eq!(resolution.identity.puuid, PUUID);
    assert_eq!(resolution.identity.region, "EU");
    assert_eq!(resolution.upstream_updated_at, base_time());

    let report = ctx
        .synchronizer()
        .synchronize(&resolution.identity, HistoryView::Summary)
        .await
        .unwrap();
    assert!(report.refreshed);
    assert_eq!(report.inserted, 3);
    let ids = report
        .history
        .iter()
        .map(|r| r.match_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["m3", "m2", "m1"]);

    let summary = aggregate(&report.history).unwrap();
    assert_eq!(summary.net_change, 23);
    assert!((summary.average_change - 7.67).abs() < 1e-9);
    assert_eq!(summary.current, report.history[0].rank());
}

#[tokio::test]
async fn second_sync_within_window_is_served_locally() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;
    let synchronizer = ctx.synchronizer();

    let first = synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();
    let second = synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();

    assert_eq!(fake.history_calls(), 1);
    assert!(!second.refreshed);
    assert_eq!(second.inserted, 0);
    assert_eq!(first.history, second.history);
}

#[tokio::test]
async fn refresh_only_stores_the_delta() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;
    let synchronizer = ctx.synchronizer();
    synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();

    let mut newer = vec![entry("m4", 40, 18)];
    newer.extend(three_games());
    fake.set_history(PUUID, newer);
    expire(&ctx).await;

    let report = synchronizer
        .synchronize(&identity, HistoryView::Detail)
        .await
        .unwrap();
    assert!(report.refreshed);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.history[0].match_id, "m4");
    assert_eq!(ctx.store().history(PUUID).await.unwrap().len(), 4);
}

#[tokio::test]
async fn detail_view_is_capped_to_five() {
    let games = (0..8)
        .map(|i| entry(&format!("m{i}"), i, 10))
        .collect::<Vec<_>>();
    let fake = FakeUpstream::with_player("Alpha", "EUW", games);
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;

    let report = ctx
        .synchronizer()
        .synchronize(&identity, HistoryView::Detail)
        .await
        .unwrap();
    assert_eq!(report.inserted, 8);
    assert_eq!(report.history.len(), 5);
    assert_eq!(report.history[0].match_id, "m7");
}

#[tokio::test]
async fn concurrent_syncs_never_duplicate_matches() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;
    let synchronizer = ctx.synchronizer();

    let (a, b) = tokio::join!(
        synchronizer.synchronize(&identity, HistoryView::Summary),
        synchronizer.synchronize(&identity, HistoryView::Summary),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(fake.history_calls(), 2);
    assert_eq!(a.inserted + b.inserted, 3);
    let stored = ctx.store().history(PUUID).await.unwrap();
    let unique = stored
        .iter()
        .map(|r| r.match_id.as_str())
        .collect::<HashSet<_>>();
    assert_eq!(stored.len(), 3);
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn match_detail_is_fetched_once() {
    let fake = FakeUpstream::default();
    let ctx = context(&fake);
    let cache = ctx.match_details();

    let first = cache.get("eu", "m-1").await.unwrap();
    let second = cache.get("eu", "m-1").await.unwrap();

    assert_eq!(fake.match_calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.outcome, MatchOutcome::Blue);
    assert_eq!(first.score_line_for(Side::Red), (7, 13));
}

#[tokio::test]
async fn failed_match_detail_is_not_cached() {
    let fake = FakeUpstream::default();
    let ctx = context(&fake);
    let cache = ctx.match_details();

    fake.fail(true);
    let err = cache.get("eu", "m-1").await.unwrap_err();
    assert!(matches!(
        err,
        Error::MatchDetailUnavailable { ref match_id, .. } if match_id == "m-1"
    ));

    fake.fail(false);
    assert!(cache.get("eu", "m-1").await.is_ok());
    assert_eq!(fake.match_calls(), 2);
}

#[tokio::test]
async fn unavailable_details_are_skipped() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    fake.0
        .missing_matches
        .lock()
        .unwrap()
        .insert("m2".to_string());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;
    let report = ctx
        .synchronizer()
        .synchronize(&identity, HistoryView::Detail)
        .await
        .unwrap();

    let details = ctx
        .match_details()
        .details_for(&identity.region, &report.history)
        .await
        .unwrap();
    let ids = details
        .iter()
        .map(|(record, detail)| {
            assert_eq!(record.match_id, detail.match_id);
            detail.match_id.as_str()
        })
        .collect::<Vec<_>>();
    assert_eq!(ids, ["m3", "m1"]);
}

#[tokio::test]
async fn malformed_identifiers_never_reach_upstream() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);
    let resolver = ctx.resolver();

    for identifier in ["foo", "foo#bar#baz"] {
        assert!(matches!(
            resolver.resolve(identifier).await,
            Err(Error::InvalidIdentifierFormat(_))
        ));
        assert!(matches!(
            resolver.find_tracked(identifier).await,
            Err(Error::InvalidIdentifierFormat(_))
        ));
    }
    assert_eq!(fake.account_calls(), 0);
}

#[tokio::test]
async fn unknown_account_is_an_upstream_failure() {
    let fake = FakeUpstream::default();
    let ctx = context(&fake);
    assert!(matches!(
        ctx.resolver().resolve("Nobody#000").await,
        Err(Error::UpstreamFetchFailed(UpstreamError::NotFound))
    ));
}

#[tokio::test]
async fn upstream_failure_falls_back_to_stored_history() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;
    let synchronizer = ctx.synchronizer();
    let fresh = synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();

    expire(&ctx).await;
    fake.fail(true);
    let report = synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();

    assert!(!report.refreshed);
    assert!(matches!(report.upstream_error, Some(UpstreamError::Status(_))));
    assert_eq!(report.history, fresh.history);
}

#[tokio::test]
async fn upstream_failure_without_stored_history_is_surfaced() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;

    fake.fail(true);
    assert!(matches!(
        ctx.synchronizer()
            .synchronize(&identity, HistoryView::Summary)
            .await,
        Err(Error::UpstreamFetchFailed(_))
    ));
}

#[tokio::test]
async fn empty_upstream_history_is_reported() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", Vec::new());
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;

    assert!(matches!(
        ctx.synchronizer()
            .synchronize(&identity, HistoryView::Summary)
            .await,
        Err(Error::NoRankedHistory)
    ));
}

#[tokio::test]
async fn renamed_player_keeps_entry_and_history() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    fake.add_account("Omega", "EUW", PUUID);
    let ctx = context(&fake);
    let resolver = ctx.resolver();

    let identity = resolver.resolve("Alpha#EUW").await.unwrap().identity;
    ctx.synchronizer()
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();
    let synced_at = ctx.store().player(PUUID).await.unwrap().unwrap().last_synchronized;
    assert!(synced_at.is_some());

    let renamed = resolver.resolve("Omega#EUW").await.unwrap().identity;
    assert_eq!(renamed.puuid, PUUID);
    assert_eq!(renamed.last_synchronized, synced_at);

    let stored = ctx.store().player(PUUID).await.unwrap().unwrap();
    assert_eq!(stored.riot_id(), "Omega#EUW");
    assert!(matches!(
        resolver.find_tracked("Alpha#EUW").await,
        Err(Error::PlayerNotTracked(_))
    ));
    assert_eq!(resolver.find_tracked("Omega#EUW").await.unwrap().puuid, PUUID);
    assert_eq!(ctx.store().history(PUUID).await.unwrap().len(), 3);
}

#[tokio::test]
async fn only_the_newest_ten_games_are_stored() {
    // Newest first, as upstream orders them.
    let games = (0..15)
        .rev()
        .map(|i| entry(&format!("m{i}"), i, 10))
        .collect::<Vec<_>>();
    let fake = FakeUpstream::with_player("Alpha", "EUW", games);
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;

    let report = ctx
        .synchronizer()
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();
    assert_eq!(report.inserted, 10);

    let stored = ctx.store().history(PUUID).await.unwrap();
    let ids = stored
        .iter()
        .map(|r| r.match_id.as_str())
        .collect::<Vec<_>>();
    let newest = (5..15)
        .rev()
        .map(|i| format!("m{i}"))
        .collect::<Vec<_>>();
    assert_eq!(ids, newest);
}

#[tokio::test]
async fn summary_view_is_capped_to_ten() {
    let games = (0..10)
        .rev()
        .map(|i| entry(&format!("m{i}"), i, 10))
        .collect::<Vec<_>>();
    let fake = FakeUpstream::with_player("Alpha", "EUW", games);
    let ctx = context(&fake);
    let identity = ctx.resolver().resolve("Alpha#EUW").await.unwrap().identity;
    let synchronizer = ctx.synchronizer();
    synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();

    let newer = (5..14)
        .rev()
        .map(|i| entry(&format!("m{i}"), i, -5))
        .collect::<Vec<_>>();
    fake.set_history(PUUID, newer);
    expire(&ctx).await;

    let report = synchronizer
        .synchronize(&identity, HistoryView::Summary)
        .await
        .unwrap();
    assert_eq!(report.inserted, 4);
    assert_eq!(ctx.store().history(PUUID).await.unwrap().len(), 14);
    assert_eq!(report.history.len(), 10);
    assert_eq!(report.history[0].match_id, "m13");
    assert_eq!(report.history[9].match_id, "m4");
}

#[tokio::test]
async fn out_of_range_match_detail_is_unavailable_and_not_cached() {
    let fake = FakeUpstream::default();
    fake.0
        .corrupt_matches
        .lock()
        .unwrap()
        .insert("m-1".to_string());
    let ctx = context(&fake);
    let cache = ctx.match_details();

    for _ in 0..2 {
        assert!(matches!(
            cache.get("eu", "m-1").await,
            Err(Error::MatchDetailUnavailable {
                ref match_id,
                source: UpstreamError::InvalidPayload(_),
            }) if match_id == "m-1"
        ));
    }
    assert_eq!(fake.match_calls(), 2);
    assert!(ctx.store().match_detail("m-1").await.unwrap().is_none());
}

#[tokio::test]
async fn resolution_carries_player_title() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let mut titled = account(PUUID);
    titled.title = Some("title-1".to_string());
    fake.0
        .accounts
        .lock()
        .unwrap()
        .insert(("Alpha".to_string(), "EUW".to_string()), titled);
    fake.set_title("title-1", "Sharpshooter");
    let ctx = context(&fake);

    let resolution = ctx.resolver().resolve("Alpha#EUW").await.unwrap();
    assert_eq!(resolution.identity.title_id.as_deref(), Some("title-1"));
    assert_eq!(resolution.title.as_deref(), Some("Sharpshooter"));
}

#[tokio::test]
async fn unknown_title_does_not_fail_resolution() {
    let fake = FakeUpstream::with_player("Alpha", "EUW", three_games());
    let mut titled = account(PUUID);
    titled.title = Some("title-missing".to_string());
    fake.0
        .accounts
        .lock()
        .unwrap()
        .insert(("Alpha".to_string(), "EUW".to_string()), titled);
    let ctx = context(&fake);

    let resolution = ctx.resolver().resolve("Alpha#EUW").await.unwrap();
    assert_eq!(resolution.identity.puuid, PUUID);
    assert_eq!(resolution.identity.title_id.as_deref(), Some("title-missing"));
    assert_eq!(resolution.title, None);
}
