//! Server Configuration
//!
//! Settings are resolved in two layers:
//!
//! 1. Environment variables: `TCP_HOST`, `TCP_PORT`, `DB_COUNT`. A `.env`
//!    file in the working directory fills in any the process does not set.
//! 2. Command-line flags, which override the environment
//!
//! Unset or empty environment variables keep the defaults. `DB_COUNT=0` is
//! accepted and means [`DEFAULT_DB_COUNT`].

use crate::storage::DEFAULT_DB_COUNT;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Environment variable for the bind host
pub const ENV_HOST: &str = "TCP_HOST";

/// Environment variable for the listening port
pub const ENV_PORT: &str = "TCP_PORT";

/// Environment variable for the number of databases
pub const ENV_DB_COUNT: &str = "DB_COUNT";

/// Optional file of `KEY=VALUE` lines read before the process environment
pub const ENV_FILE: &str = ".env";

/// Errors raised while resolving the configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid port number: {0:?}")]
    InvalidPort(String),

    #[error("invalid database count: {0:?}")]
    InvalidDatabaseCount(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("failed to read {path}: {reason}")]
    EnvFile { path: String, reason: String },
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Number of independent databases
    pub db_count: usize,
}

/// What the process should do after reading its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Startup {
    Serve(Config),
    PrintHelp,
    PrintVersion,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_count: DEFAULT_DB_COUNT,
        }
    }
}

impl Config {
    /// Resolves the configuration from the process environment and arguments.
    pub fn load() -> Result<Startup, ConfigError> {
        Self::from_env()?.with_args(std::env::args().skip(1))
    }

    /// Reads the process environment, then the `.env` file, on top of the
    /// defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = read_env_file(ENV_FILE)?;
        Self::from_lookup(|name| {
            std::env::var(name)
                .ok()
                .or_else(|| file.get(name).cloned())
        })
    }

    /// Reads settings through `lookup` on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let var = |name: &str| lookup(name).filter(|v: &String| !v.trim().is_empty());

        if let Some(host) = var(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = var(ENV_PORT) {
            config.port = parse_port(&port)?;
        }
        if let Some(count) = var(ENV_DB_COUNT) {
            config.db_count = parse_db_count(&count)?;
        }

        Ok(config)
    }

    /// Applies command-line flags (without the program name).
    pub fn with_args<I>(mut self, args: I) -> Result<Startup, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    self.host = args.next().ok_or(ConfigError::MissingValue(arg))?;
                }
                "--port" | "-p" => {
                    let value = args.next().ok_or(ConfigError::MissingValue(arg))?;
                    self.port = parse_port(&value)?;
                }
                "--databases" | "-d" => {
                    let value = args.next().ok_or(ConfigError::MissingValue(arg))?;
                    self.db_count = parse_db_count(&value)?;
                }
                "--help" => return Ok(Startup::PrintHelp),
                "--version" | "-v" => return Ok(Startup::PrintVersion),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(Startup::Serve(self))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads `KEY=VALUE` pairs from `path`. A missing file yields no pairs.
fn read_env_file(path: impl AsRef<Path>) -> Result<HashMap<String, String>, ConfigError> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_env_file(&contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(ConfigError::EnvFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Parses dotenv-style contents. Blank lines, `#` comments and lines without
/// `=` are skipped; an `export ` prefix and matching outer quotes are removed.
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|&q| value.strip_prefix(q)?.strip_suffix(q))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

fn parse_db_count(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Ok(DEFAULT_DB_COUNT),
        Ok(n) => Ok(n),
        Err(_) => Err(ConfigError::InvalidDatabaseCount(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(env(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.db_count, 16);
    }

    #[test]
    fn test_environment() {
        let config = Config::from_lookup(env(&[
            ("TCP_HOST", "0.0.0.0"),
            ("TCP_PORT", "7000"),
            ("DB_COUNT", "4"),
        ]))
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7000);
        assert_eq!(config.db_count, 4);
    }

    #[test]
    fn test_empty_environment_values_are_ignored() {
        let config = Config::from_lookup(env(&[("TCP_PORT", ""), ("DB_COUNT", " ")])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_zero_db_count_means_default() {
        let config = Config::from_lookup(env(&[("DB_COUNT", "0")])).unwrap();
        assert_eq!(config.db_count, DEFAULT_DB_COUNT);
    }

    #[test]
    fn test_invalid_environment() {
        assert_eq!(
            Config::from_lookup(env(&[("TCP_PORT", "http")])),
            Err(ConfigError::InvalidPort("http".to_string()))
        );
        assert_eq!(
            Config::from_lookup(env(&[("DB_COUNT", "-1")])),
            Err(ConfigError::InvalidDatabaseCount("-1".to_string()))
        );
    }

    #[test]
    fn test_args_override_environment() {
        let config = Config::from_lookup(env(&[("TCP_PORT", "7000"), ("DB_COUNT", "4")])).unwrap();
        let startup = config
            .with_args(args(&["-p", "7001", "--databases", "8", "--host", "::1"]))
            .unwrap();

        assert_eq!(
            startup,
            Startup::Serve(Config {
                host: "::1".to_string(),
                port: 7001,
                db_count: 8,
            })
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(
            Config::default().with_args(args(&["--help"])),
            Ok(Startup::PrintHelp)
        );
        assert_eq!(
            Config::default().with_args(args(&["-p", "1", "-v"])),
            Ok(Startup::PrintVersion)
        );
    }

    #[test]
    fn test_bad_args() {
        assert_eq!(
            Config::default().with_args(args(&["--port"])),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            Config::default().with_args(args(&["-p", "99999"])),
            Err(ConfigError::InvalidPort("99999".to_string()))
        );
        assert_eq!(
            Config::default().with_args(args(&["--verbose"])),
            Err(ConfigError::UnknownArgument("--verbose".to_string()))
        );
    }

    #[test]
    fn test_parse_env_file() {
        let vars = parse_env_file(
            "# server\nTCP_PORT=7000\n\nexport DB_COUNT = \"4\"\nTCP_HOST='0.0.0.0'\nnot a pair\n",
        );

        assert_eq!(vars.len(), 3);
        assert_eq!(vars.get("TCP_PORT").map(String::as_str), Some("7000"));
        assert_eq!(vars.get("DB_COUNT").map(String::as_str), Some("4"));
        assert_eq!(vars.get("TCP_HOST").map(String::as_str), Some("0.0.0.0"));
    }

    #[test]
    fn test_env_file() {
        let path = std::env::temp_dir().join(format!("kvdb-env-{}", std::process::id()));
        std::fs::write(&path, "DB_COUNT=8\n").unwrap();

        let vars = read_env_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let config = Config::from_lookup(|name: &str| vars.get(name).cloned()).unwrap();
        assert_eq!(config.db_count, 8);
    }

    #[test]
    fn test_missing_env_file() {
        let vars = read_env_file("/nonexistent/kvdb/.env").unwrap();
        assert!(vars.is_empty());
    }
}
