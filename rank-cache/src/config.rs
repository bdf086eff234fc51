use core::time::Duration;
use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};
use reqwest::Url;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Credential sent with every upstream request.
    #[arg(long, env, hide_env_values = true)]
    pub val_api_key: String,

    #[arg(long, env, default_value = "https://api.henrikdev.xyz/valorant")]
    pub val_api_url: Url,

    /// Public game assets API used for player titles.
    #[arg(long, env, default_value = "https://valorant-api.com/v1")]
    pub val_assets_url: Url,

    #[arg(long, env, default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// Wait before the single retry of a rate limited batch request.
    #[arg(long, env, default_value_t = 60)]
    pub rate_limit_cooldown_secs: u64,

    #[arg(long, env, default_value = "0.0.0.0:9002")]
    pub metrics_listen: SocketAddr,

    /// Keep everything in memory instead of Postgres.
    #[arg(long, env)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank summary over the last ten ranked games
    Stats(PlayerArg),
    /// Last five ranked games of a tracked player with their match details
    History(PlayerArg),
    /// Detail of a single match
    Match {
        /// Region the match was played in, e.g. `eu`
        region: String,
        match_id: String,
    },
    /// Refresh the history of several players, waiting out rate limits
    Sync {
        #[arg(required = true)]
        players: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct PlayerArg {
    /// Riot id in the form `name#tag`
    pub player: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: [&str; 3] = ["rank-cache", "--val-api-key", "HDEV-test"];

    #[test]
    fn defaults_apply() {
        let config =
            Config::try_parse_from(BASE.iter().copied().chain(["stats", "Alpha#EUW"])).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(60));
        assert_eq!(config.val_api_url.as_str(), "https://api.henrikdev.xyz/valorant");
        assert_eq!(config.val_assets_url.as_str(), "https://valorant-api.com/v1");
        assert!(!config.ephemeral);
        assert!(matches!(
            config.command,
            Command::Stats(PlayerArg { player }) if player == "Alpha#EUW"
        ));
    }

    #[test]
    fn sync_needs_a_player() {
        assert!(Config::try_parse_from(BASE.iter().copied().chain(["sync"])).is_err());
        let config = Config::try_parse_from(
            BASE.iter().copied().chain(["--ephemeral", "sync", "A#1", "B#2"]),
        )
        .unwrap();
        assert!(config.ephemeral);
        assert!(matches!(config.command, Command::Sync { players } if players.len() == 2));
    }
}
