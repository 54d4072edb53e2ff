//! Command-line argument parsing.
//!
//! Usage:
//!   fmtscript [--max-depth N] [--config FILE] [--lenient] [-v] FORMAT [ARG...]
//!
//! `ARG`s that look like `true`/`false`, an integer or a float are passed as
//! that type; anything else is a string.  `name=value` makes a named
//! argument.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::Parser;

use crate::config::{Config, ConfigError};
use crate::value::access::is_identifier;
use crate::value::{ArgStore, Argument};

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "fmtscript", version, about = "Render a scripted format string")]
pub struct CliArgs {
    /// Nesting limit for fields and scripts (overrides config and environment).
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_depth: Option<usize>,

    /// JSON config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Allow mixing `{}` with explicit indices.
    #[arg(long)]
    pub lenient: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,

    /// The format string.
    pub format: String,

    /// Arguments, positional or `name=value`.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
}

// ── Conversion ────────────────────────────────────────────────────────────────

/// Interpret one command-line word as the most specific argument kind.
pub fn parse_value(raw: &str) -> Argument<'_> {
    match raw {
        "true" => return Argument::Bool(true),
        "false" => return Argument::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Argument::Int(n);
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Argument::Uint(n);
    }
    if raw.contains(|c: char| c.is_ascii_digit()) {
        if let Ok(x) = raw.parse::<f64>() {
            return Argument::Float(x);
        }
    }
    Argument::from(raw)
}

/// Build the argument store from the trailing command-line words.
pub fn build_store(words: &[String]) -> ArgStore<'_> {
    let mut store = ArgStore::new();
    for word in words {
        match word.split_once('=') {
            Some((name, value)) if is_identifier(name) => {
                store.insert(name, parse_value(value));
            }
            _ => store.push(parse_value(word)),
        }
    }
    store
}

/// Layer the config: file (or defaults), then environment, then flags.
pub fn resolve_config(args: &CliArgs) -> Result<Config, ConfigError> {
    let mut config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if args.lenient {
        config.strict_auto_index = false;
    }
    Ok(config)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("fmtscript").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn format_and_args() {
        let a = parse(&["{0} {1}", "x", "-3"]);
        assert_eq!(a.format, "{0} {1}");
        assert_eq!(a.args, vec!["x", "-3"]);
        assert!(a.max_depth.is_none());
        assert!(!a.verbose);
    }

    #[test]
    fn flags() {
        let a = parse(&["--max-depth", "4", "--config", "c.json", "-v", "--lenient", "{}"]);
        assert_eq!(a.max_depth, Some(4));
        assert_eq!(a.config, Some(PathBuf::from("c.json")));
        assert!(a.verbose);
        assert!(a.lenient);
        assert!(a.args.is_empty());
    }

    #[test]
    fn zero_depth_flag_rejected() {
        let argv = ["fmtscript", "--max-depth", "0", "{}"];
        assert!(CliArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn format_is_required() {
        assert!(CliArgs::try_parse_from(["fmtscript"]).is_err());
    }

    #[test]
    fn value_kinds() {
        assert!(matches!(parse_value("true"), Argument::Bool(true)));
        assert!(matches!(parse_value("-12"), Argument::Int(-12)));
        assert!(matches!(parse_value("18446744073709551615"), Argument::Uint(u64::MAX)));
        assert!(matches!(parse_value("2.5"), Argument::Float(x) if x == 2.5));
        assert!(matches!(parse_value("inf"), Argument::Str(_)));
        assert!(matches!(parse_value("hello"), Argument::Str(_)));
        assert!(matches!(parse_value(""), Argument::Str(_)));
    }

    #[test]
    fn store_from_words() {
        let words: Vec<String> = ["1", "who=Ann", "a=b=c", "x y=z"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let store = build_store(&words);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().to_string(), "1");
        assert_eq!(store.get(1).unwrap().to_string(), "x y=z");
        assert_eq!(store.get_named("who").unwrap().to_string(), "Ann");
        assert_eq!(store.get_named("a").unwrap().to_string(), "b=c");
    }

    #[test]
    fn flags_override_config() {
        let a = parse(&["--max-depth", "3", "--lenient", "{}"]);
        let config = resolve_config(&a).unwrap();
        assert_eq!(config.max_depth, 3);
        assert!(!config.strict_auto_index);
    }
}
