// Configuration loading (config/server.toml plus environment overrides).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value `{value}` for environment variable {var}")]
    InvalidEnv { var: String, value: String },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Assembled config
// ---------------------------------------------------------------------------

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_WS_PORT: u16 = 3002;
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Environment variables that override the file settings.
pub const ENV_HTTP_PORT: &str = "PORT";
pub const ENV_WS_PORT: &str = "WS_PORT";
pub const ENV_HOST: &str = "ASKBOARD_HOST";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub http_port: u16,
    pub ws_port: u16,
    pub api: ApiOptions,
    /// Log destination; stdout when `None`.
    pub log_file: Option<PathBuf>,
}

/// Request handling options shared by the HTTP handlers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiOptions {
    /// Trim submitted text and reject it with 400 when nothing is left.
    pub reject_blank_text: bool,
    /// Buffered events per realtime client before it starts skipping.
    pub event_capacity: usize,
}

impl Default for ApiOptions {
    fn default() -> Self {
        ApiOptions {
            reject_blank_text: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::from([0, 0, 0, 0]),
            http_port: DEFAULT_HTTP_PORT,
            ws_port: DEFAULT_WS_PORT,
            api: ApiOptions::default(),
            log_file: None,
        }
    }
}

impl ServerConfig {
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.http_port)
    }

    pub fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.ws_port)
    }
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for server.toml. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServerFile {
    http: HttpSection,
    websocket: WebsocketSection,
    api: ApiOptions,
    logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HttpSection {
    host: String,
    port: u16,
}

impl Default for HttpSection {
    fn default() -> Self {
        HttpSection {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct WebsocketSection {
    port: u16,
}

impl Default for WebsocketSection {
    fn default() -> Self {
        WebsocketSection {
            port: DEFAULT_WS_PORT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoggingSection {
    file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load configuration from `config/server.toml` under the current directory,
/// applying overrides from the process environment.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
    let base_dir = std::env::current_dir().map_err(|e| ConfigError::ReadError {
        path: PathBuf::from("."),
        source: e,
    })?;
    load_config_from(&base_dir, |var| std::env::var(var).ok())
}

/// Load configuration from `config/server.toml` under `base_dir`, using `env`
/// to look up override variables. A missing file means all defaults.
pub fn load_config_from<F>(base_dir: &Path, env: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = base_dir.join("config").join("server.toml");
    let file = if path.exists() {
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?
    } else {
        ServerFile::default()
    };

    let host_text = env(ENV_HOST).unwrap_or(file.http.host);
    let host = host_text
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::ValidationError {
            field: "http.host".into(),
            message: format!("`{host_text}` is not an IP address"),
        })?;

    let http_port = port_override(&env, ENV_HTTP_PORT)?.unwrap_or(file.http.port);
    let ws_port = port_override(&env, ENV_WS_PORT)?.unwrap_or(file.websocket.port);

    // Relative log paths resolve against the base directory.
    let log_file = file.logging.file.map(|p| {
        if p.is_absolute() {
            p
        } else {
            base_dir.join(p)
        }
    });

    let config = ServerConfig {
        host,
        http_port,
        ws_port,
        api: file.api,
        log_file,
    };

    validate(&config)?;

    Ok(config)
}

fn port_override<F>(env: &F, var: &str) -> Result<Option<u16>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match env(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u16>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var: var.to_string(),
                value,
            }),
    }
}

fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.api.event_capacity == 0 {
        return Err(ConfigError::ValidationError {
            field: "api.event_capacity".into(),
            message: "must be greater than 0".into(),
        });
    }

    // Port 0 asks the OS for an ephemeral port, so two zeros never collide.
    if config.http_port != 0 && config.http_port == config.ws_port {
        return Err(ConfigError::ValidationError {
            field: "websocket.port".into(),
            message: format!(
                "must differ from http.port (both are {})",
                config.http_port
            ),
        });
    }

    Ok(())
}
