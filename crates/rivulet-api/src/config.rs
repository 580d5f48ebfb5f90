use config::{Config as ConfigLoader, ConfigError, Environment, File};
use rivulet_buffer::BufferConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub emitter: EmitterConfig,
    /// Server-side mirror of the emitted stream, served on `/snapshot`
    pub buffer: BufferConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
    #[serde(default = "default_cors_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_cors_max_age_secs() -> u64 {
    21_600
}

/// Pacing of the emitted signal
#[derive(Debug, Clone, Deserialize)]
pub struct EmitterConfig {
    /// Time between two samples of the signal
    pub sample_interval_ms: u64,
    /// Samples collected in this window go out as one event
    pub flush_interval_ms: u64,
    pub keep_alive_secs: u64,
    /// Events a slow subscriber may fall behind before it skips ahead
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (RIVULET_SERVER__PORT, RIVULET_BUFFER__CAPACITY, ...)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name("config/default").required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::with_prefix("RIVULET")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.origins")
                    .with_list_parse_key("buffer.fields")
                    .try_parsing(true),
            );

        let cfg: Config = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let cfg: Config = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.emitter.sample_interval_ms == 0 || self.emitter.flush_interval_ms == 0 {
            return Err(ConfigError::Message(
                "emitter intervals must be positive".to_string(),
            ));
        }
        // tokio's interval panics on a zero period and a zero timeout fails every request
        if self.emitter.keep_alive_secs == 0 {
            return Err(ConfigError::Message(
                "emitter.keep_alive_secs must be positive".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.emitter.channel_capacity == 0 {
            return Err(ConfigError::Message(
                "emitter.channel_capacity must be positive".to_string(),
            ));
        }
        if self.buffer.capacity == Some(0) {
            return Err(ConfigError::Message(
                "buffer.capacity must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}
