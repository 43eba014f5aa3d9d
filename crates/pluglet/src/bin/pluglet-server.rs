//! Pluglet server.
//!
//! ```bash
//! pluglet-server --config pluglet.toml --profile production
//! pluglet-server --bind 0.0.0.0:3100 --log-level debug
//! ```
//!
//! Flags override the configuration file and `PLUGLET_` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pluglet::prelude::*;
use pluglet::runtime::config::LogLevel;

#[derive(Debug, Parser)]
#[command(name = "pluglet-server", version, about = "Pluglet plugin pipeline and identity server")]
struct Cli {
    /// Configuration file (TOML, or YAML with the `yaml-config` feature)
    #[arg(long, short, env = "PLUGLET_CONFIG")]
    config: Option<PathBuf>,

    /// Profile whose `pluglet.<profile>.toml` is merged under the main file
    #[arg(long, short)]
    profile: Option<String>,

    /// Listen address, e.g. `0.0.0.0:3100`
    #[arg(long)]
    bind: Option<String>,

    /// Public base URL used in redirects
    #[arg(long)]
    external_url: Option<String>,

    #[arg(long, value_parser = parse_level)]
    log_level: Option<LogLevel>,
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    match value.to_ascii_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(format!("unknown log level '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = PlugletRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    if let Some(bind) = cli.bind {
        builder = builder.set("server.bind", bind);
    }
    if let Some(url) = cli.external_url {
        builder = builder.set("server.external_url", url);
    }
    if let Some(level) = cli.log_level {
        builder = builder.set("logging.level", level);
    }

    let runtime = builder.build().context("failed to load configuration")?;
    tracing::debug!(config = ?cli.config, "Configuration loaded");
    runtime.run().await.context("server terminated with an error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "pluglet-server",
            "-c",
            "conf/pluglet.toml",
            "--bind",
            "0.0.0.0:8080",
            "--log-level",
            "DEBUG",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("conf/pluglet.toml")));
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(cli.profile.is_none());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = Cli::try_parse_from(["pluglet-server", "--log-level", "loud"]).unwrap_err();
        assert!(err.to_string().contains("unknown log level"));
    }
}
