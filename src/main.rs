use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use canopy::app::config::AppConfig;
use canopy::app::App;
use canopy::pipeline::{SharedModel, TfliteModel};

#[derive(Parser, Debug)]
#[command(name = "canopy", about = "Tree detection API server")]
struct Args {
    /// Path to a yaml configuration file; built-in defaults otherwise.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> canopy::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    config.validate()?;
    tracing::info!(tiling = %config.tiling, "configuration loaded");

    let model = TfliteModel::new(&config.model)?;
    let model: SharedModel = Arc::new(Mutex::new(model));

    App::start(config, model).await
}
