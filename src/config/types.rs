//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::dispatch::DispatchConfig;
use super::output::OutputConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server connection and identity.
    pub server: ServerConfig,
    /// Executor pool sizing and rebalancing.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Outbound pacing.
    #[serde(default)]
    pub output: OutputConfig,
    /// Prefix command router.
    #[serde(default)]
    pub commands: CommandsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server connection and bot identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// `host:port` of the IRC server.
    pub address: String,
    /// Nickname to register with.
    pub nick: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Connection password sent as PASS (optional).
    pub password: Option<String>,
    /// Channels joined after RPL_WELCOME.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:6667".to_string(),
            nick: default_username(),
            username: default_username(),
            realname: default_realname(),
            password: None,
            channels: Vec::new(),
        }
    }
}

fn default_username() -> String {
    "relaybot".to_string()
}

fn default_realname() -> String {
    "relaybot IRC bot".to_string()
}

/// Prefix command router configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    /// Prefix marking a channel message as a bot command (default: "!").
    #[serde(default = "default_command_prefix")]
    pub prefix: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: default_command_prefix(),
        }
    }
}

fn default_command_prefix() -> String {
    "!".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[server]
address = "irc.example.net:6667"
nick = "tester"
"#,
        )
        .unwrap();

        assert_eq!(config.server.username, "relaybot");
        assert!(config.server.channels.is_empty());
        assert!(config.server.password.is_none());
        assert_eq!(config.commands.prefix, "!");
        assert_eq!(config.dispatch.backlog_threshold, 50);
        assert_eq!(config.output.max_line_bytes, 400);
    }

    #[test]
    fn missing_server_section_is_a_parse_error() {
        let result: Result<Config, _> = toml::from_str("[commands]\nprefix = \".\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r##"
[server]
address = "127.0.0.1:6667"
nick = "filebot"
channels = ["#one", "#two"]

[commands]
prefix = "."
"##
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.nick, "filebot");
        assert_eq!(config.server.channels, vec!["#one", "#two"]);
        assert_eq!(config.commands.prefix, ".");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/relaybot.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let file = concat!(env!("CARGO_MANIFEST_DIR"), "/relaybot.example.toml");
        let config = Config::load(file).unwrap();
        assert_eq!(config.server.channels, vec!["#relaybot-test"]);
        assert!(crate::config::validate(&config).is_ok());
    }
}
