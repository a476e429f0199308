use clap::{Parser, Subcommand, ValueEnum};
use linkrelay_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const CONFIG_ENV: &str = "LINKRELAY_CONFIG";
pub const CACHE_PATH_ENV: &str = "LINKRELAY_CACHE_PATH";
pub const LOG_FORMAT_ENV: &str = "LINKRELAY_LOG_FORMAT";
pub const BATCH_TIMEOUT_ENV: &str = "LINKRELAY_BATCH_TIMEOUT_MS";
pub const WAIT_FOR_RATE_LIMIT_ENV: &str = "LINKRELAY_WAIT_FOR_RATE_LIMIT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormatArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormatArg::Text => write!(f, "text"),
            LogFormatArg::Json => write!(f, "json"),
        }
    }
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "linkrelay", version, about = "Shorten URLs through several providers")]
pub struct Cli {
    /// YAML settings file.
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// JSON cache file; overrides `cache.path` from the settings file.
    #[arg(long, global = true, env = CACHE_PATH_ENV)]
    pub cache_path: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one or more URLs as a single batch.
    Shorten {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Cancel whatever is unresolved after this many milliseconds.
        #[arg(long, env = BATCH_TIMEOUT_ENV)]
        batch_timeout_ms: Option<u64>,

        /// Wait for rate-limited providers instead of failing over.
        #[arg(long, env = WAIT_FOR_RATE_LIMIT_ENV)]
        wait_for_rate_limit: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove expired entries from the cache file.
    Purge,
}

/// Prepends `https://` to input that does not start with a `scheme://`.
pub fn with_default_scheme(input: &str) -> String {
    let trimmed = input.trim();
    if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn has_scheme(input: &str) -> bool {
    let Some((scheme, _)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
