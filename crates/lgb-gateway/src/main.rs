//! line-gemini-bridge: main binary
//!
//! Usage:
//!   line-gemini-bridge                 - Start the webhook server
//!   line-gemini-bridge --config PATH   - Start with an explicit config file
//!   line-gemini-bridge --help          - Show help

use std::path::{Path, PathBuf};

use lgb_core::Config;
use lgb_line::LineBot;
use tracing_subscriber::EnvFilter;

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Webhook server, optionally with an explicit config file
    Server { config: Option<PathBuf> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args(std::env::args().skip(1))?;

    let config_path = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("line-gemini-bridge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server { config } => config,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(load_env(None, EnvFilter::DEFAULT_ENV))
        .init();

    let config = Config::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting line-gemini-bridge...");
    tracing::info!("Model: {}", config.gemini.model);
    if config.router.topic.is_enabled() {
        tracing::info!("Topic filter: {:?}", config.router.topic);
    }

    let bot = LineBot::new(config).map_err(|e| anyhow::anyhow!("Startup failed: {}", e))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        tracing::info!("Shutting down...");
        let _ = shutdown_tx.send(());
    });

    tracing::info!("Press Ctrl+C to exit");
    bot.run(shutdown_rx).await?;

    tracing::info!("line-gemini-bridge stopped");
    Ok(())
}

/// Load the `.env` file, then build the log filter from `filter_var`.
///
/// `.env` は先に読み込むので、そこに書かれた RUST_LOG も有効になります。
/// フィルタ未指定時は `info`。
fn load_env(dotenv_file: Option<&Path>, filter_var: &str) -> EnvFilter {
    let _ = match dotenv_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    EnvFilter::try_from_env(filter_var).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<RunMode> {
    let mut config = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                config = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Server { config })
}

/// Print help message
fn print_help() {
    println!("line-gemini-bridge - LINE webhook bridge to Gemini");
    println!();
    println!("Usage:");
    println!("  line-gemini-bridge                 Start the webhook server");
    println!("  line-gemini-bridge --config PATH   Use PATH instead of ./line-gemini-bridge.toml");
    println!("  line-gemini-bridge --help          Show this help message");
    println!("  line-gemini-bridge --version       Show version");
    println!();
    println!("Environment Variables:");
    println!("  GOOGLE_GEMINI_API_KEY   Gemini API key (required for provider gemini)");
    println!("  GEMINI_MODEL            Model name (default: gemini-1.5-flash)");
    println!("  GEMINI_PROVIDER         gemini or vertex (default: gemini)");
    println!("  VERTEX_PROJECT_ID       Vertex AI project (provider vertex)");
    println!("  VERTEX_LOCATION         Vertex AI region (default: us-central1)");
    println!("  GOOGLE_APPLICATION_CREDENTIALS  authorized_user credentials file (provider vertex)");
    println!("  ChannelSecret           LINE channel secret (required)");
    println!("  ChannelAccessToken      LINE channel access token (required)");
    println!("  PORT                    Listen port (default: 8080)");
    println!("  WEBHOOK_PATH            Webhook path (default: /callback)");
    println!("  TOPIC_KEYWORDS          Comma-separated topic keywords (default: no filter)");
    println!("  IDENTITY_POLICY         sender or conversation (default: sender)");
    println!("  RUST_LOG                Log filter (default: info)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_mode_is_server() {
        assert_eq!(parse_args(args(&[])).unwrap(), RunMode::Server { config: None });
    }

    #[test]
    fn test_config_flag() {
        assert_eq!(
            parse_args(args(&["--config", "bridge.toml"])).unwrap(),
            RunMode::Server {
                config: Some(PathBuf::from("bridge.toml"))
            }
        );
        assert!(parse_args(args(&["-c"])).is_err());
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(args(&["-h"])).unwrap(), RunMode::Help);
        assert_eq!(parse_args(args(&["--version"])).unwrap(), RunMode::Version);
    }

    #[test]
    fn test_log_filter_comes_from_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "LGB_TEST_LOG_FILTER=debug\n").unwrap();

        let filter = load_env(Some(&path), "LGB_TEST_LOG_FILTER");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = load_env(Some(&dir.path().join("missing.env")), "LGB_UNSET_LOG_FILTER");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_unknown_argument() {
        assert!(parse_args(args(&["--cli"])).is_err());
    }
}
