//! Engine configuration.
//!
//! | Key                 | Default | Meaning                                      |
//! |---------------------|---------|----------------------------------------------|
//! | `max_depth`         | 16      | nesting limit for fields, `if`, `(`, `!`     |
//! | `strict_auto_index` | true    | reject mixing `{}` with `{0}` in one string  |
//!
//! A config can be read from JSON; missing keys keep their defaults.
//! `FMTSCRIPT_MAX_DEPTH` overrides the depth from the environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable read by [`Config::from_env`].
pub const MAX_DEPTH_ENV: &str = "FMTSCRIPT_MAX_DEPTH";

const DEFAULT_MAX_DEPTH: usize = 16;

// ── Public API ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("FMTSCRIPT_MAX_DEPTH: '{0}' is not a positive integer")]
    Env(String),
    #[error("invalid config: max_depth must be at least 1")]
    ZeroDepth,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_depth: usize,
    pub strict_auto_index: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_auto_index: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `max_depth` taken from the environment when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config.apply_env()?;
        Ok(config)
    }

    /// Override `max_depth` from `FMTSCRIPT_MAX_DEPTH`, if set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_value(std::env::var(MAX_DEPTH_ENV).ok().as_deref())
    }

    fn apply_env_value(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        let Some(raw) = value else { return Ok(()) };
        match raw.trim().parse::<usize>() {
            Ok(depth) if depth > 0 => {
                self.max_depth = depth;
                Ok(())
            }
            _ => Err(ConfigError::Env(raw.to_owned())),
        }
    }

    /// Parse a JSON config document.
    pub fn load_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(s)?;
        if config.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(config)
    }

    /// Read and parse a JSON config file from disk.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::load_str(&s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.max_depth, 16);
        assert!(c.strict_auto_index);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = Config::load_str(r#"{ "max_depth": 4 }"#).unwrap();
        assert_eq!(c.max_depth, 4);
        assert!(c.strict_auto_index);
        let c = Config::load_str("{}").unwrap();
        assert_eq!(c, Config::default());
    }

    #[test]
    fn full_json() {
        let c = Config::load_str(r#"{ "max_depth": 2, "strict_auto_index": false }"#).unwrap();
        assert_eq!(
            c,
            Config {
                max_depth: 2,
                strict_auto_index: false
            }
        );
    }

    #[test]
    fn zero_depth_rejected() {
        let err = Config::load_str(r#"{ "max_depth": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDepth));
        let mut c = Config::default();
        assert!(matches!(c.apply_env_value(Some("0")), Err(ConfigError::Env(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let err = Config::load_str(r#"{ "depth": 4 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid config:"));
    }

    #[test]
    fn env_value() {
        let mut c = Config::default();
        c.apply_env_value(None).unwrap();
        assert_eq!(c.max_depth, 16);
        c.apply_env_value(Some(" 8 ")).unwrap();
        assert_eq!(c.max_depth, 8);
        assert!(matches!(c.apply_env_value(Some("0")), Err(ConfigError::Env(_))));
        assert!(c.apply_env_value(Some("lots")).is_err());
    }

    #[test]
    fn missing_file() {
        let err = Config::load_file(Path::new("/nonexistent/fmtscript.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
