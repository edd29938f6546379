//! Holotree peer binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use holopeer_core::config::AppConfig;
use holopeer_server::lifecycle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Holopeer - serves holotree catalog parts and deltas to other peers
#[derive(Parser, Debug)]
#[command(name = "holopeerd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "HOLOPEER_CONFIG",
        default_value = "config/peer.toml"
    )]
    config: String,

    /// Listen address, overrides `server.bind`
    #[arg(short, long)]
    bind: Option<String>,
}

/// Defaults, then the optional file, then `HOLOPEER_` variables
/// (`HOLOPEER_SERVER__BIND=0.0.0.0:4653`).
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}, using defaults", path);
    }
    figment
        .merge(Env::prefixed("HOLOPEER_").split("__"))
        .extract()
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Holopeer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&args.config)?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    if config.server.metrics_enabled {
        holopeer_server::metrics::register_metrics();
        tracing::info!("Prometheus metrics registered");
    }

    let shutdown = CancellationToken::new();
    let _signals = lifecycle::spawn_signal_listener(shutdown.clone())?;

    lifecycle::run(config, shutdown).await
}
