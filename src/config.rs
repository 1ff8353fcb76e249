//! Runtime configuration.
//!
//! Resolution order: CLI flags, then the optional TOML config file at
//! `<config dir>/config.toml`, then platform defaults from the project
//! directories. Everything downstream receives the resolved `Config`;
//! nothing reads the home directory at use sites.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub archive_dir: PathBuf,
    pub timeout: Duration,
    pub concurrency: usize,
    pub verbose: bool,
}

/// On-disk shape of config.toml. All keys optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    db_path: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    timeout: Option<String>,
    concurrency: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine a home directory for default paths")]
    NoProjectDirs,
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid timeout {value:?} in config file: {source}")]
    Timeout {
        value: String,
        source: humantime::DurationError,
    },
}

impl Config {
    /// Resolve the effective configuration for this invocation.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let dirs = directories::ProjectDirs::from("", "", "pagewatch")
            .ok_or(ConfigError::NoProjectDirs)?;
        let file = load_file(dirs.config_dir().join("config.toml"))?;

        let file_timeout = match &file.timeout {
            Some(value) => Some(humantime::parse_duration(value).map_err(|source| {
                ConfigError::Timeout {
                    value: value.clone(),
                    source,
                }
            })?),
            None => None,
        };

        Ok(Config {
            db_path: cli
                .db
                .clone()
                .or(file.db_path)
                .unwrap_or_else(|| dirs.data_dir().join("pagewatch.db")),
            archive_dir: cli
                .archive_dir
                .clone()
                .or(file.archive_dir)
                .unwrap_or_else(|| dirs.cache_dir().join("pages")),
            timeout: cli.timeout.or(file_timeout).unwrap_or(DEFAULT_TIMEOUT),
            concurrency: cli
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
            verbose: cli.verbose,
        })
    }
}

fn load_file(path: PathBuf) -> Result<FileConfig, ConfigError> {
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = load_file(dir.path().join("config.toml")).unwrap();
        assert!(file.db_path.is_none());
        assert!(file.timeout.is_none());
    }

    #[test]
    fn file_values_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "db-path = \"/tmp/pw.db\"").unwrap();
        writeln!(f, "timeout = \"45s\"").unwrap();
        writeln!(f, "concurrency = 4").unwrap();

        let file = load_file(path).unwrap();
        assert_eq!(file.db_path, Some(PathBuf::from("/tmp/pw.db")));
        assert_eq!(file.timeout.as_deref(), Some("45s"));
        assert_eq!(file.concurrency, Some(4));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timeout = [not toml").unwrap();

        let err = load_file(path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
