//! Client configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. Deployment-specific values (server, credentials) can also come
//! from `ASHFIRE_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ashfire_board::BoardConfig;
use ashfire_query::QueryConfig;
use ashfire_tick::TickConfig;
use serde::{Deserialize, Serialize};

use crate::metaserver::DEFAULT_METASERVERS;

/// Errors from loading a [`ClientConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything the client needs to know before it connects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host` or `host:port`; the port defaults to 13327.
    pub server: String,

    /// Name sent to the server in the version exchange.
    pub client_name: String,

    pub account: String,
    pub password: String,

    /// Character to enter the game with as soon as the character list
    /// arrives. `None` waits for an explicit [`play`](crate::Client::play).
    pub character: Option<String>,

    /// Image set to select once the server lists its sets. `None` keeps
    /// the lowest-numbered set.
    pub face_set: Option<u8>,

    /// Size of the area the board is drawn into, in pixels. Determines the
    /// map size asked for on entering the game.
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Run the local animation ticker until the server sends ticks itself.
    pub local_ticker: bool,
    pub tick: TickConfig,

    pub board: BoardConfig,

    /// Seed for random animation frames. `None` seeds from the OS.
    pub board_seed: Option<u64>,

    /// Text lines kept in the message log.
    pub scrollback: usize,

    /// Completed queries kept until taken.
    pub completed_queries: usize,

    /// How long a command may wait for its completion, in milliseconds.
    /// `None` waits forever.
    pub query_max_age_ms: Option<u64>,

    /// Metaserver urls asked, in order, for the server list.
    pub metaservers: Vec<String>,

    /// Per-metaserver timeout, in milliseconds.
    pub metaserver_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "localhost".into(),
            client_name: "ashfire".into(),
            account: String::new(),
            password: String::new(),
            character: None,
            face_set: None,
            viewport_width: 800,
            viewport_height: 600,
            local_ticker: true,
            tick: TickConfig::default(),
            board: BoardConfig::default(),
            board_seed: None,
            scrollback: 1000,
            completed_queries: 64,
            query_max_age_ms: None,
            metaservers: DEFAULT_METASERVERS.iter().map(|url| (*url).to_owned()).collect(),
            metaserver_timeout_ms: 5000,
        }
    }
}

impl ClientConfig {
    /// Environment variables read by [`apply_env`](Self::apply_env).
    pub const ENV_SERVER: &'static str = "ASHFIRE_SERVER";
    pub const ENV_ACCOUNT: &'static str = "ASHFIRE_ACCOUNT";
    pub const ENV_PASSWORD: &'static str = "ASHFIRE_PASSWORD";
    pub const ENV_CHARACTER: &'static str = "ASHFIRE_CHARACTER";

    /// Parses a JSON config. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(path = %path.display(), server = %config.server, "config loaded");
        Ok(config)
    }

    /// Overrides server and credentials from `ASHFIRE_*` variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overrides server and credentials from `lookup`. Empty values are
    /// ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(server) = get(Self::ENV_SERVER) {
            self.server = server;
        }
        if let Some(account) = get(Self::ENV_ACCOUNT) {
            self.account = account;
        }
        if let Some(password) = get(Self::ENV_PASSWORD) {
            self.password = password;
        }
        if let Some(character) = get(Self::ENV_CHARACTER) {
            self.character = Some(character);
        }
    }

    /// Correlator settings derived from this config.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            max_age: self.query_max_age_ms.map(Duration::from_millis),
        }
    }

    pub fn metaserver_timeout(&self) -> Duration {
        Duration::from_millis(self.metaserver_timeout_ms)
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }
}
