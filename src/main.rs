//! Image Relay - upload images to Cloudinary and record them in MongoDB

use clap::Parser;
use image_relay::config::Config;
use image_relay::metrics::server::{MetricsServer, MetricsServerConfig};
use image_relay::record::MongoRecordStore;
use image_relay::server::{AppState, UploadServer};
use image_relay::upload::CloudinaryClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Image Relay - accepts image uploads, hosts them on Cloudinary,
/// records them in MongoDB
#[derive(Parser, Debug)]
#[command(name = "image-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file (defaults to environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .try_init()
        .map_err(anyhow::Error::msg)?;

    info!("Starting Image Relay v{}", image_relay::VERSION);

    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env()?,
    };

    let store = MongoRecordStore::connect(&config.mongodb).await?;

    let uploader = CloudinaryClient::new(config.cloudinary.clone())?;
    if !uploader.is_configured() {
        warn!("Cloudinary credentials are incomplete; uploads will fail");
    }

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(MetricsServerConfig {
            address: format!("{}:{}", config.server.host, config.metrics.port),
        });
        server.start().await?;
        Some(server)
    } else {
        None
    };

    let state = AppState::from_config(&config, Arc::new(uploader), Arc::new(store));
    let server = UploadServer::bind(config.server.socket_addr()?, state).await?;
    let result = server.run().await;

    if let Some(metrics_server) = metrics_server.as_mut() {
        metrics_server.shutdown().await;
    }

    Ok(result?)
}
