//! Layered settings.
//!
//! Sources, later ones winning:
//! - bundled defaults (`guildmaster.toml` at the workspace root)
//! - `~/.config/guildmaster/guildmaster.toml`
//! - `./guildmaster.toml`, or the file passed with `--config`
//! - environment variables (`DISCORD_TOKEN`, `MAX_RETRIES`, ...)
//!
//! Command-line flags are applied on top by the binary.

use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use guildmaster_error::{ConfigError, GuildResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../guildmaster.toml");

/// Log verbosity accepted in `LOG_LEVEL` and `[logging] level`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(try_from = "String")]
pub enum LogLevel {
    /// Failures only
    Error,
    /// Failures and warnings
    Warn,
    /// Lifecycle and operation lines
    #[default]
    Info,
    /// Everything, including request tracing
    Debug,
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value
            .parse()
            .map_err(|_| format!("unknown log level '{}'", value))
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// `[discord]`
#[derive(Debug, Clone, Deserialize, derive_getters::Getters)]
pub struct DiscordSettings {
    /// Bot token
    #[serde(default)]
    token: String,
    /// Guild used when an action omits one
    #[serde(default)]
    guild_id: Option<String>,
    /// Retries for transient failures
    max_retries: usize,
    /// Base delay between retries
    retry_delay_ms: u64,
    /// Bound on each request
    timeout_ms: u64,
    /// REST root
    api_base: String,
}

impl DiscordSettings {
    /// The token, or a configuration error when it is unset.
    pub fn require_token(&self) -> GuildResult<&str> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::missing("DISCORD_TOKEN").into());
        }
        Ok(self.token.trim())
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `[gate]`
#[derive(Debug, Clone, Deserialize, derive_getters::Getters)]
pub struct GateSettings {
    /// When non-empty, the only actions permitted
    #[serde(default)]
    allowed_actions: Vec<String>,
    /// Actions refused when `allowed_actions` is empty
    #[serde(default)]
    denied_actions: Vec<String>,
    /// Wait out exhausted buckets before dispatch
    rate_limit_protection: bool,
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize, derive_getters::Getters)]
pub struct LoggingSettings {
    /// Operation lines at `info`
    enabled: bool,
    /// Default filter when `RUST_LOG` is unset
    level: LogLevel,
}

/// `[server]`
#[derive(Debug, Clone, Deserialize, derive_getters::Getters)]
pub struct ServerSettings {
    /// Serve HTTP instead of stdio
    http: bool,
    /// Bind address
    host: String,
    /// Bind port
    port: u16,
}

impl ServerSettings {
    /// Switch to HTTP on `port`.
    pub fn serve_http(&mut self, port: Option<u16>) {
        self.http = true;
        if let Some(port) = port {
            self.port = port;
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Deserialize, derive_getters::Getters)]
pub struct Settings {
    /// Discord connection
    discord: DiscordSettings,
    /// Pre-dispatch gate
    gate: GateSettings,
    /// Log output
    logging: LoggingSettings,
    /// Transport
    server: ServerSettings,
}

impl Settings {
    /// Load from every source, reading the process environment.
    pub fn load(path: Option<&Path>) -> GuildResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load from every source with `env` standing in for the environment.
    #[instrument(skip(env))]
    pub fn load_with(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> GuildResult<Self> {
        debug!("Loading configuration: env > file > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/guildmaster/guildmaster.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("guildmaster").required(false)),
        };

        builder = apply_env(builder, &env)?;

        builder
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse configuration: {}", e)).into())
    }

    /// Mutable transport section, for command-line overrides.
    pub fn server_mut(&mut self) -> &mut ServerSettings {
        &mut self.server
    }
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn number(name: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map(i64::from)
        .map_err(|_| ConfigError::invalid(name, "a non-negative number"))
}

fn apply_env(
    builder: ConfigBuilder<DefaultState>,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let overriding = |e: config::ConfigError| ConfigError::new(e.to_string());

    let mut builder = builder
        .set_override_option("discord.token", env("DISCORD_TOKEN"))
        .map_err(overriding)?
        .set_override_option(
            "discord.guild_id",
            env("DISCORD_GUILD_ID").filter(|id| !id.trim().is_empty()),
        )
        .map_err(overriding)?;

    for (var, key) in [
        ("MAX_RETRIES", "discord.max_retries"),
        ("RETRY_DELAY", "discord.retry_delay_ms"),
        ("TIMEOUT", "discord.timeout_ms"),
    ] {
        if let Some(value) = env(var) {
            builder = builder
                .set_override(key, number(var, &value)?)
                .map_err(overriding)?;
        }
    }

    if let Some(value) = env("ENABLE_LOGGING") {
        builder = builder
            .set_override("logging.enabled", value == "true")
            .map_err(overriding)?;
    }
    if let Some(value) = env("LOG_LEVEL") {
        builder = builder
            .set_override("logging.level", value)
            .map_err(overriding)?;
    }
    if let Some(value) = env("RATE_LIMIT_PROTECTION") {
        builder = builder
            .set_override("gate.rate_limit_protection", value != "false")
            .map_err(overriding)?;
    }
    for (var, key) in [
        ("ALLOWED_ACTIONS", "gate.allowed_actions"),
        ("DENIED_ACTIONS", "gate.denied_actions"),
    ] {
        if let Some(value) = env(var) {
            builder = builder
                .set_override(key, split_list(&value))
                .map_err(overriding)?;
        }
    }

    if let Some(value) = env("MCP_HTTP_PORT").or_else(|| env("PORT")) {
        // An unparsable port still selects HTTP, on the default port.
        builder = builder.set_override("server.http", true).map_err(overriding)?;
        if let Ok(port) = value.trim().parse::<u16>() {
            builder = builder
                .set_override("server.port", i64::from(port))
                .map_err(overriding)?;
        }
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn empty_file() -> tempfile::NamedTempFile {
        tempfile::Builder::new().suffix(".toml").tempfile().unwrap()
    }

    #[test]
    fn test_bundled_defaults() {
        let file = empty_file();
        let settings = Settings::load_with(Some(file.path()), env_of(&[])).unwrap();
        assert_eq!(*settings.discord().max_retries(), 3);
        assert_eq!(*settings.discord().retry_delay_ms(), 1000);
        assert_eq!(settings.discord().timeout(), Duration::from_secs(30));
        assert!(*settings.gate().rate_limit_protection());
        assert!(!*settings.logging().enabled());
        assert_eq!(*settings.logging().level(), LogLevel::Info);
        assert!(!*settings.server().http());
        assert_eq!(*settings.server().port(), 3000);
    }

    #[test]
    fn test_missing_token_is_a_config_error() {
        let file = empty_file();
        let settings = Settings::load_with(Some(file.path()), env_of(&[])).unwrap();
        let err = settings.discord().require_token().unwrap_err();
        assert_eq!(
            err.kind().to_string(),
            "Configuration error: DISCORD_TOKEN is not set"
        );
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = empty_file();
        writeln!(file, "[discord]\ntoken = \"from-file\"\nmax_retries = 7").unwrap();
        let settings = Settings::load_with(
            Some(file.path()),
            env_of(&[
                ("DISCORD_TOKEN", "from-env"),
                ("DISCORD_GUILD_ID", "100"),
                ("RETRY_DELAY", "250"),
                ("ENABLE_LOGGING", "true"),
                ("LOG_LEVEL", "debug"),
                ("RATE_LIMIT_PROTECTION", "false"),
                ("ALLOWED_ACTIONS", " send_message, get_roles ,"),
                ("MCP_HTTP_PORT", "8080"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.discord().require_token().unwrap(), "from-env");
        assert_eq!(settings.discord().guild_id().as_deref(), Some("100"));
        assert_eq!(*settings.discord().max_retries(), 7);
        assert_eq!(*settings.discord().retry_delay_ms(), 250);
        assert!(*settings.logging().enabled());
        assert_eq!(*settings.logging().level(), LogLevel::Debug);
        assert!(!*settings.gate().rate_limit_protection());
        assert_eq!(
            settings.gate().allowed_actions(),
            &vec!["send_message".to_string(), "get_roles".to_string()]
        );
        assert!(*settings.server().http());
        assert_eq!(*settings.server().port(), 8080);
    }

    #[test]
    fn test_logging_only_for_literal_true() {
        let file = empty_file();
        let settings =
            Settings::load_with(Some(file.path()), env_of(&[("ENABLE_LOGGING", "yes")])).unwrap();
        assert!(!*settings.logging().enabled());
    }

    #[test]
    fn test_non_numeric_retry_count_fails() {
        let file = empty_file();
        let err = Settings::load_with(Some(file.path()), env_of(&[("MAX_RETRIES", "lots")]))
            .unwrap_err();
        assert!(err.kind().to_string().contains("MAX_RETRIES"));
    }

    #[test]
    fn test_bad_log_level_fails() {
        let file = empty_file();
        assert!(Settings::load_with(Some(file.path()), env_of(&[("LOG_LEVEL", "LOUD")])).is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
