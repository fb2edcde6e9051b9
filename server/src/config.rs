//! Command-line options and world layout loading.

use clap::Parser;
use serde::{Deserialize, Serialize};
use shared::collision::{default_colliders, StaticCollider};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "20")]
    pub tick_rate: u32,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value = "32")]
    pub max_clients: usize,

    /// JSON file describing static colliders; the built-in arena is used
    /// when omitted
    #[arg(short, long)]
    pub world: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tick rate must be between 1 and 1000, got {0}")]
    InvalidTickRate(u32),
    #[error("max clients must be at least 1")]
    NoClients,
    #[error("failed to read world file {path}: {source}")]
    WorldIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse world file: {0}")]
    WorldParse(#[from] serde_json::Error),
    #[error("collider {index} has a non-positive or non-finite size")]
    InvalidCollider { index: usize },
}

/// On-disk world layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldFile {
    pub colliders: Vec<StaticCollider>,
}

/// Validated settings the server is started with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub colliders: Vec<StaticCollider>,
}

impl ServerConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if args.tick_rate == 0 || args.tick_rate > 1000 {
            return Err(ConfigError::InvalidTickRate(args.tick_rate));
        }
        if args.max_clients == 0 {
            return Err(ConfigError::NoClients);
        }
        let colliders = match &args.world {
            Some(path) => load_world(path)?,
            None => default_colliders(),
        };

        Ok(Self {
            address: format!("{}:{}", args.host, args.port),
            tick_duration: Duration::from_nanos(1_000_000_000 / u64::from(args.tick_rate)),
            max_clients: args.max_clients,
            colliders,
        })
    }

    /// Default arena and tick rate on `address`.
    pub fn local(address: &str) -> Self {
        Self {
            address: address.to_string(),
            tick_duration: Duration::from_millis(50),
            max_clients: 32,
            colliders: default_colliders(),
        }
    }
}

pub fn load_world(path: &Path) -> Result<Vec<StaticCollider>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::WorldIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_world(&text)
}

pub fn parse_world(text: &str) -> Result<Vec<StaticCollider>, ConfigError> {
    let world: WorldFile = serde_json::from_str(text)?;
    for (index, collider) in world.colliders.iter().enumerate() {
        let size = collider.size;
        let valid = collider.position.is_finite()
            && [size.width, size.height, size.depth]
                .iter()
                .all(|v| v.is_finite() && *v > 0.0);
        if !valid {
            return Err(ConfigError::InvalidCollider { index });
        }
    }
    Ok(world.colliders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["server"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_args(&args(&[])).unwrap();
        assert_eq!(config.address, "127.0.0.1:8080");
        assert_eq!(config.tick_duration, Duration::from_millis(50));
        assert_eq!(config.max_clients, 32);
        assert_eq!(config.colliders, default_colliders());
    }

    #[test]
    fn test_custom_arguments() {
        let config =
            ServerConfig::from_args(&args(&["-H", "0.0.0.0", "-p", "9000", "-t", "40", "-m", "4"]))
                .unwrap();
        assert_eq!(config.address, "0.0.0.0:9000");
        assert_eq!(config.tick_duration, Duration::from_millis(25));
        assert_eq!(config.max_clients, 4);
    }

    #[test]
    fn test_invalid_tick_rate() {
        let err = ServerConfig::from_args(&args(&["--tick-rate", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTickRate(0)));
    }

    #[test]
    fn test_parse_world() {
        let text = r#"{"colliders":[
            {"position":{"x":0,"y":0.5,"z":4},"size":{"width":2,"height":1,"depth":2}},
            {"position":{"x":-3,"y":1,"z":0},"size":{"width":1,"height":2,"depth":8}}
        ]}"#;
        let colliders = parse_world(text).unwrap();
        assert_eq!(colliders.len(), 2);
        assert_eq!(colliders[1].size.depth, 8.0);
    }

    #[test]
    fn test_parse_world_rejects_bad_collider() {
        let text = r#"{"colliders":[{"position":{"x":0,"y":0,"z":0},"size":{"width":0,"height":1,"depth":1}}]}"#;
        assert!(matches!(
            parse_world(text),
            Err(ConfigError::InvalidCollider { index: 0 })
        ));
        assert!(matches!(parse_world("{"), Err(ConfigError::WorldParse(_))));
    }

    #[test]
    fn test_missing_world_file() {
        let err = load_world(Path::new("/nonexistent/world.json")).unwrap_err();
        assert!(matches!(err, ConfigError::WorldIo { .. }));
    }
}
