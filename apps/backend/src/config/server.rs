use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::timing::{ChannelConfig, LobbyConfig};
use crate::error::AppError;

/// Everything the binary needs, read from `ARENA_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub channel: ChannelConfig,
    pub lobby: LobbyConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults_channel = ChannelConfig::default();
        let mut lobby = LobbyConfig::default();

        let host = lookup("ARENA_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parsed(&lookup, "ARENA_PORT", 3000u16)?;

        let channel = ChannelConfig {
            ping: flag(&lookup, "ARENA_PING", defaults_channel.ping)?,
            ping_interval: millis(&lookup, "ARENA_PING_INTERVAL_MS", defaults_channel.ping_interval)?,
            ping_timeout: millis(&lookup, "ARENA_PING_TIMEOUT_MS", defaults_channel.ping_timeout)?,
            ..defaults_channel
        };

        lobby.bots = parsed(&lookup, "ARENA_BOTS", lobby.bots)?;
        if lobby.bots >= lobby.battle.roster_size {
            return Err(AppError::config(format!(
                "ARENA_BOTS must be below the roster size {}, got {}",
                lobby.battle.roster_size, lobby.bots
            )));
        }
        lobby.battle.seed = lookup("ARENA_SEED")
            .map(|raw| parse_value::<u64>("ARENA_SEED", &raw))
            .transpose()?;

        Ok(Self {
            host,
            port,
            channel,
            lobby,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::config(format!("Environment variable '{name}' has invalid value '{raw}'")))
}

fn parsed<F, T>(lookup: &F, name: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn millis<F>(lookup: &F, name: &str, default: Duration) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let ms = parsed(lookup, name, default.as_millis() as u64)?;
    if ms == 0 {
        return Err(AppError::config(format!("Environment variable '{name}' must be positive")));
    }
    Ok(Duration::from_millis(ms))
}

fn flag<F>(lookup: &F, name: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(AppError::config(format!(
            "Environment variable '{name}' must be a boolean, got '{other}'"
        ))),
    }
}
