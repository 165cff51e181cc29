use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use job_engine::EngineConfig;

/// A YouTube channel watched for new uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub name: String,
    pub channel_id: String,
}

/// How the coordinator hands jobs to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    /// In-process bounded queue drained by a worker pool.
    Queue { workers: usize, capacity: usize },
    /// POST to `{public_base_url}/api/jobs/run`.
    Http { public_base_url: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub insight_ttl_hours: i64,
    pub job_lease_secs: i64,
    pub trigger: TriggerMode,
    pub day_trading_channels: Vec<String>,
    pub youtube_channels: Vec<ChannelConfig>,
}

impl ServerConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;

        let trigger = match get("JOB_TRIGGER").as_deref().unwrap_or("queue") {
            "queue" => TriggerMode::Queue {
                workers: parse_or(&get, "JOB_WORKERS", 4)?,
                capacity: parse_or(&get, "JOB_QUEUE_CAPACITY", 256)?,
            },
            "http" => TriggerMode::Http {
                public_base_url: get("PUBLIC_BASE_URL")
                    .context("PUBLIC_BASE_URL must be set when JOB_TRIGGER=http")?,
            },
            other => bail!("JOB_TRIGGER must be 'queue' or 'http', got '{}'", other),
        };

        let day_trading_channels = get("DAY_TRADING_CHANNELS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["Ross Cameron".to_string()]);

        let youtube_channels = match get("YOUTUBE_CHANNELS") {
            Some(raw) => parse_channels(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            database_url,
            bind_addr: parse_or(&get, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 5)?,
            insight_ttl_hours: parse_or(&get, "INSIGHT_TTL_HOURS", 48)?,
            job_lease_secs: parse_or(&get, "JOB_LEASE_SECS", 900)?,
            trigger,
            day_trading_channels,
            youtube_channels,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            insight_ttl: chrono::Duration::hours(self.insight_ttl_hours),
            lease_ttl: chrono::Duration::seconds(self.job_lease_secs),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

/// `Name=UCid` pairs separated by commas.
fn parse_channels(raw: &str) -> Result<Vec<ChannelConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (name, id) = pair
                .split_once('=')
                .with_context(|| format!("YOUTUBE_CHANNELS entry '{}' is not Name=ChannelId", pair))?;
            let (name, id) = (name.trim(), id.trim());
            if name.is_empty() || id.is_empty() {
                bail!("YOUTUBE_CHANNELS entry '{}' is not Name=ChannelId", pair);
            }
            Ok(ChannelConfig {
                name: name.to_string(),
                channel_id: id.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(
            config.trigger,
            TriggerMode::Queue {
                workers: 4,
                capacity: 256
            }
        );
        assert_eq!(config.day_trading_channels, vec!["Ross Cameron"]);
        assert!(config.youtube_channels.is_empty());

        let engine = config.engine_config();
        assert_eq!(engine.insight_ttl, chrono::Duration::hours(48));
        assert_eq!(engine.lease_ttl, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[("BIND_ADDR", "127.0.0.1:8080")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_number_names_the_key() {
        let err = load(&[("DATABASE_URL", "x"), ("JOB_WORKERS", "many")]).unwrap_err();
        assert!(err.to_string().contains("JOB_WORKERS"));
    }

    #[test]
    fn test_http_trigger_requires_base_url() {
        assert!(load(&[("DATABASE_URL", "x"), ("JOB_TRIGGER", "http")]).is_err());

        let config = load(&[
            ("DATABASE_URL", "x"),
            ("JOB_TRIGGER", "http"),
            ("PUBLIC_BASE_URL", "https://brief.example.com"),
        ])
        .unwrap();
        assert_eq!(
            config.trigger,
            TriggerMode::Http {
                public_base_url: "https://brief.example.com".to_string()
            }
        );
        assert!(load(&[("DATABASE_URL", "x"), ("JOB_TRIGGER", "lambda")]).is_err());
    }

    #[test]
    fn test_channel_lists() {
        let config = load(&[
            ("DATABASE_URL", "x"),
            ("DAY_TRADING_CHANNELS", "Ross Cameron, Warrior Trading ,"),
            (
                "YOUTUBE_CHANNELS",
                "Ross Cameron=UCBayuhgYpKNbhJxfExYkPfA, Meet Kevin=UCUvvj5lwue7PspotMDjk5UA",
            ),
        ])
        .unwrap();
        assert_eq!(
            config.day_trading_channels,
            vec!["Ross Cameron", "Warrior Trading"]
        );
        assert_eq!(config.youtube_channels.len(), 2);
        assert_eq!(config.youtube_channels[1].name, "Meet Kevin");
        assert_eq!(
            config.youtube_channels[1].channel_id,
            "UCUvvj5lwue7PspotMDjk5UA"
        );

        assert!(load(&[("DATABASE_URL", "x"), ("YOUTUBE_CHANNELS", "no-separator")]).is_err());
    }
}
