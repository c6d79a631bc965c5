//! CLI argument definitions for logward-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Logward log collection daemon.
///
/// Polls configured sources (log files, MySQL, MongoDB), classifies
/// collected records and keeps them in a bounded in-memory buffer
/// mirrored to a durable sink.
#[derive(Parser, Debug)]
#[command(name = "logward-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logward.toml configuration file.
    #[arg(short, long, default_value = "/etc/logward/logward.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the collection interval in seconds.
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["logward-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/logward/logward.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_parse() {
        let cli = DaemonCli::parse_from([
            "logward-daemon",
            "--config",
            "custom.toml",
            "--log-level",
            "debug",
            "--poll-interval-secs",
            "5",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.poll_interval_secs, Some(5));
        assert!(cli.validate);
    }
}
