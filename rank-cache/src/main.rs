#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]

use clap::Parser;
use futures::StreamExt;
use rank_cache::config::{Command, Config, PlayerArg};
use rank_cache::models::{MatchDetailRecord, MatchHistoryRecord, ParticipantStats, PlayerIdentity};
use rank_cache::store::{MemoryStore, PgStore, Store};
use rank_cache::upstream::{HenrikClient, RateLimitPolicy};
use rank_cache::{Context, Error, HistorySummary, HistoryView, aggregate};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

type Ctx<S> = Context<S, HenrikClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    let _guard = common::init_tracing(env!("CARGO_PKG_NAME"));
    common::init_metrics(config.metrics_listen)?;

    let policy = match config.command {
        Command::Sync { .. } => RateLimitPolicy::CooldownOnce(config.rate_limit_cooldown()),
        _ => RateLimitPolicy::Immediate,
    };
    let upstream = HenrikClient::new(
        config.val_api_url.clone(),
        &config.val_api_key,
        config.request_timeout(),
    )?
    .with_assets_url(config.val_assets_url.clone())?
    .with_rate_limit_policy(policy);

    let result = if config.ephemeral {
        run(&Context::new(MemoryStore::new(), upstream), config.command).await
    } else {
        let store = PgStore::new(common::get_pg_client().await?);
        store.migrate().await?;
        run(&Context::new(store, upstream), config.command).await
    };
    if let Err(e) = &result {
        error!("Command failed: {e:#}");
    }
    result
}

async fn run<S: Store>(ctx: &Ctx<S>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Stats(PlayerArg { player }) => match stats(ctx, &player).await {
            Ok(output) => print(&output),
            Err(Error::NoRankedHistory) => print(&Notice::no_ranked_history(&player)),
            Err(e) => Err(e.into()),
        },
        Command::History(PlayerArg { player }) => match history(ctx, &player).await {
            Ok(output) => print(&output),
            Err(Error::NoRankedHistory) => print(&Notice::no_ranked_history(&player)),
            Err(e) => Err(e.into()),
        },
        Command::Match { region, match_id } => {
            print(&ctx.match_details().get(&region, &match_id).await?)
        }
        Command::Sync { players } => print(&sync_all(ctx, &players).await),
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct Notice {
    player: String,
    notice: &'static str,
}

impl Notice {
    fn no_ranked_history(player: &str) -> Self {
        Self {
            player: player.to_string(),
            notice: "No recently logged ranked games",
        }
    }
}

#[derive(Serialize)]
struct StatsOutput {
    player: PlayerIdentity,
    card_image_url: Option<String>,
    title: Option<String>,
    summary: HistorySummary,
    history: Vec<MatchHistoryRecord>,
    /// Upstream could not be reached and stored history was served instead.
    served_stale: bool,
}

#[instrument(skip(ctx))]
async fn stats<S: Store>(ctx: &Ctx<S>, player: &str) -> rank_cache::Result<StatsOutput> {
    let resolution = ctx.resolver().resolve(player).await?;
    let report = ctx
        .synchronizer()
        .synchronize(&resolution.identity, HistoryView::Summary)
        .await?;
    let summary = aggregate(&report.history)?;
    Ok(StatsOutput {
        card_image_url: resolution.identity.card_image_url(),
        player: resolution.identity,
        title: resolution.title,
        summary,
        served_stale: report.upstream_error.is_some(),
        history: report.history,
    })
}

#[derive(Serialize)]
struct HistoryOutput {
    player: PlayerIdentity,
    games: Vec<GameView>,
    served_stale: bool,
}

#[derive(Serialize)]
struct GameView {
    #[serde(flatten)]
    record: MatchHistoryRecord,
    /// Rounds won by the player's side first.
    score: Option<(u32, u32)>,
    result: GameResult,
    performance: Option<Performance>,
    detail: MatchDetailRecord,
}

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum GameResult {
    Win,
    Loss,
    Tie,
    Unknown,
}

#[derive(Serialize)]
struct Performance {
    agent: String,
    kda: String,
    kd: f64,
    headshot_percentage: f64,
    approximate_combat_score: f64,
}

impl Performance {
    fn of(participant: &ParticipantStats, total_rounds: u32) -> Self {
        Self {
            agent: participant.agent.clone(),
            kda: participant.kda_line(),
            kd: participant.kd(),
            headshot_percentage: participant.headshot_percentage() * 100.0,
            approximate_combat_score: participant.approximate_combat_score(total_rounds),
        }
    }
}

impl GameView {
    fn new(
        identity: &PlayerIdentity,
        record: MatchHistoryRecord,
        detail: MatchDetailRecord,
    ) -> Self {
        let side = detail.side_of(&identity.name, &identity.tag);
        let result = match (side, detail.winner_side()) {
            (_, None) => GameResult::Tie,
            (Some(side), Some(winner)) if side == winner => GameResult::Win,
            (Some(_), Some(_)) => GameResult::Loss,
            (None, Some(_)) => GameResult::Unknown,
        };
        let performance = detail
            .participants
            .iter()
            .find(|p| {
                p.name.eq_ignore_ascii_case(&identity.name)
                    && p.tag.eq_ignore_ascii_case(&identity.tag)
            })
            .map(|p| Performance::of(p, detail.total_rounds()));
        Self {
            record,
            score: side.map(|s| detail.score_line_for(s)),
            result,
            performance,
            detail,
        }
    }
}

#[instrument(skip(ctx))]
async fn history<S: Store>(ctx: &Ctx<S>, player: &str) -> rank_cache::Result<HistoryOutput> {
    let identity = ctx.resolver().find_tracked(player).await?;
    let report = ctx
        .synchronizer()
        .synchronize(&identity, HistoryView::Detail)
        .await?;
    let games = ctx
        .match_details()
        .details_for(&identity.region, &report.history)
        .await?
        .into_iter()
        .map(|(record, detail)| GameView::new(&identity, record, detail))
        .collect();
    Ok(HistoryOutput {
        player: identity,
        games,
        served_stale: report.upstream_error.is_some(),
    })
}

#[derive(Serialize)]
struct SyncOutcome {
    player: String,
    refreshed: bool,
    inserted: usize,
    error: Option<String>,
}

async fn sync_all<S: Store>(ctx: &Ctx<S>, players: &[String]) -> Vec<SyncOutcome> {
    let resolver = ctx.resolver();
    let synchronizer = ctx.synchronizer();
    futures::stream::iter(players)
        .map(|player| {
            let resolver = resolver.clone();
            let synchronizer = synchronizer.clone();
            async move {
                let report = match resolver.resolve(player).await {
                    Ok(resolution) => {
                        synchronizer
                            .synchronize(&resolution.identity, HistoryView::Summary)
                            .await
                    }
                    Err(e) => Err(e),
                };
                match report {
                    Ok(report) => {
                        info!("Synchronized {player}, {} new records", report.inserted);
                        SyncOutcome {
                            player: player.clone(),
                            refreshed: report.refreshed,
                            inserted: report.inserted,
                            error: report.upstream_error.map(|e| e.to_string()),
                        }
                    }
                    Err(e) => {
                        warn!("Failed to synchronize {player}: {e}");
                        SyncOutcome {
                            player: player.clone(),
                            refreshed: false,
                            inserted: 0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        })
        .buffered(2)
        .collect()
        .await
}
