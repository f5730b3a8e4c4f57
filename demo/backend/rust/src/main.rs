/* demo/backend/rust/src/main.rs */

mod docs;
mod users;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use vessel_server::{ServerConfig, VesselServer, load_config};
use vessel_server_axum::IntoAxumRouter;

#[derive(Parser, Debug)]
#[command(name = "vessel-demo", about = "Vessel demo server: JSON routes and Markdoc pages")]
struct Args {
  /// Path to vessel.toml; defaults apply when the file does not exist
  #[arg(long, default_value = "vessel.toml")]
  config: PathBuf,
  /// Listen address, overrides the config file
  #[arg(long)]
  address: Option<String>,
  /// Development mode: detailed error bodies, per-request pattern compile
  #[arg(long)]
  dev: bool,
  /// Markdown content root
  #[arg(long, default_value = "content")]
  content: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  let mut config =
    if args.config.exists() { load_config(&args.config)? } else { ServerConfig::default() };
  if args.dev {
    config.dev = true;
  }
  if let Some(address) = args.address {
    config.address = address;
  }

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log)))
    .with(fmt::layer())
    .init();

  let markdoc = Arc::new(docs::context(&args.content, &config.markdown)?);

  VesselServer::new()
    .config(&config)
    .http(users::route())
    .http(users::greet_route())
    .http(docs::cache_route(Arc::clone(&markdoc)))
    .app(docs::route(markdoc))
    .renderer(docs::render)
    .on_unexpected_http_error(|url, error| {
      tracing::warn!(url = %url, error = %error, "unexpected error while handling request");
    })
    .serve(&config.address)
    .await
    .map_err(|e| anyhow::anyhow!("server error: {e}"))
}
