//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::GameVariant;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Local renderer bridge binding address
    pub render_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Base URL of the remote game service (`/api/v1/...` lives under it)
    pub api_base_url: String,
    /// Base URL of the streaming endpoint; the session path is appended
    pub ws_base_url: String,

    /// Personality refresh interval
    pub personality_poll: Duration,
    /// Timeout applied to every discrete HTTP call
    pub http_timeout: Duration,
    /// Reconnect backoff bounds for the streaming channel
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
    /// Limit on a single streaming connect attempt, handshake included
    pub connect_timeout: Duration,
    /// Keepalive ping period on a live streaming connection
    pub ping_interval: Duration,
    /// A connection silent for this long is considered lost
    pub idle_timeout: Duration,
    /// Outbound messages held while the channel is down
    pub outbound_buffer: usize,

    /// Seed for the session's pseudo-random source (random when unset)
    pub rng_seed: Option<u64>,
    /// Variant active when the session starts
    pub initial_game: GameVariant,

    /// Allowed renderer origins for CORS (comma separated)
    pub client_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render_addr: SocketAddr::from(([127, 0, 0, 1], 8090)),
            log_level: "info".to_string(),
            api_base_url: "http://localhost:8000".to_string(),
            ws_base_url: "ws://localhost:8000".to_string(),
            personality_poll: Duration::from_secs(5),
            http_timeout: Duration::from_millis(5000),
            reconnect_min: Duration::from_millis(500),
            reconnect_max: Duration::from_millis(8000),
            connect_timeout: Duration::from_millis(5000),
            ping_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
            outbound_buffer: 64,
            rng_seed: None,
            initial_game: GameVariant::Fighting,
            client_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Hosting platforms provide PORT, fall back to RENDER_ADDR or default
        let render_addr = if let Ok(port) = env::var("PORT") {
            format!("127.0.0.1:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?
        } else if let Ok(addr) = env::var("RENDER_ADDR") {
            addr.parse().map_err(|_| ConfigError::InvalidAddress)?
        } else {
            defaults.render_addr
        };

        let reconnect_min = Duration::from_millis(parse_var("RECONNECT_MIN_MS", 500)?);
        let reconnect_max = Duration::from_millis(parse_var("RECONNECT_MAX_MS", 8000)?);
        if reconnect_min.is_zero() || reconnect_max < reconnect_min {
            return Err(ConfigError::Invalid("RECONNECT_MAX_MS"));
        }

        let connect_timeout = Duration::from_millis(parse_var("CONNECT_TIMEOUT_MS", 5000)?);
        if connect_timeout.is_zero() {
            return Err(ConfigError::Invalid("CONNECT_TIMEOUT_MS"));
        }
        let ping_interval = Duration::from_millis(parse_var("PING_INTERVAL_MS", 10_000)?);
        let idle_timeout = Duration::from_millis(parse_var("IDLE_TIMEOUT_MS", 30_000)?);
        if ping_interval.is_zero() {
            return Err(ConfigError::Invalid("PING_INTERVAL_MS"));
        }
        if idle_timeout <= ping_interval {
            return Err(ConfigError::Invalid("IDLE_TIMEOUT_MS"));
        }

        let personality_secs: u64 = parse_var("PERSONALITY_POLL_SECS", 5)?;
        if personality_secs == 0 {
            return Err(ConfigError::Invalid("PERSONALITY_POLL_SECS"));
        }

        let outbound_buffer: usize = parse_var("OUTBOUND_BUFFER", defaults.outbound_buffer)?;
        if outbound_buffer == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_BUFFER"));
        }

        Ok(Self {
            render_addr,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            api_base_url: trim_base(env::var("API_BASE_URL").unwrap_or(defaults.api_base_url)),
            ws_base_url: trim_base(env::var("WS_BASE_URL").unwrap_or(defaults.ws_base_url)),
            personality_poll: Duration::from_secs(personality_secs),
            http_timeout: Duration::from_millis(parse_var("HTTP_TIMEOUT_MS", 5000)?),
            reconnect_min,
            reconnect_max,
            connect_timeout,
            ping_interval,
            idle_timeout,
            outbound_buffer,
            rng_seed: match env::var("RNG_SEED") {
                Ok(raw) => Some(raw.trim().parse().map_err(|_| ConfigError::Invalid("RNG_SEED"))?),
                Err(_) => None,
            },
            initial_game: parse_var("INITIAL_GAME", defaults.initial_game)?,
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
        })
    }

    /// Streaming endpoint for one session
    pub fn session_ws_url(&self, session_id: uuid::Uuid) -> String {
        format!("{}/ws/{}", self.ws_base_url, session_id)
    }

    pub fn client_origins(&self) -> Vec<String> {
        self.client_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
