use std::path::PathBuf;
use std::process::ExitCode;

use annotator::camera::ViewTransform;
use annotator::config::{ConfigError, EngineConfig};
use annotator::data::AnnotationData;
use annotator::doc::{AnnotationKind, Category};
use annotator::engine::{EngineCore, EngineError};
use annotator::persist::FileStore;
use clap::Parser;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("image dimensions must be positive, got {width}x{height}")]
    InvalidImageSize { width: f64, height: f64 },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid annotation JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store failed: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Parser, Debug)]
#[command(name = "annotator", about = "Load, normalise, and re-export annotation records")]
struct Cli {
    /// JSON array of annotation records.
    annotations: PathBuf,

    /// Image width in pixels.
    image_width: f64,

    /// Image height in pixels.
    image_height: f64,

    /// Also store the normalised records as JSON under this directory.
    #[arg(long, env = "ANNOTATOR_STORE_DIR")]
    store: Option<PathBuf>,

    /// Task the stored records belong to; a fresh id when omitted.
    #[arg(long, env = "ANNOTATOR_TASK_ID")]
    task: Option<Uuid>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "annotator failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if !(cli.image_width > 0.0 && cli.image_height > 0.0) {
        return Err(CliError::InvalidImageSize { width: cli.image_width, height: cli.image_height });
    }
    let config = EngineConfig::from_env()?;

    let bytes = tokio::fs::read(&cli.annotations).await?;
    let records: Vec<AnnotationData> = serde_json::from_slice(&bytes)?;
    let total = records.len();

    // One image pixel per screen pixel.
    let (width, height) = (cli.image_width, cli.image_height);
    let view = ViewTransform::new(width, height, width, height);
    let mut engine = EngineCore::new(view, config);
    let loaded = engine.load(records);
    info!(loaded = loaded.len(), skipped = total - loaded.len(), "annotations loaded");
    for category in Category::ALL {
        info!(?category, count = engine.doc.category(category).count(), "category");
    }

    if let Some(dir) = &cli.store {
        let store = FileStore::new(dir);
        let task = cli.task.unwrap_or_else(Uuid::new_v4);
        for kind in AnnotationKind::ALL {
            if !engine.doc.by_kind(kind).is_empty() {
                engine.save_kind(&store, task, kind).await?;
            }
        }
        info!(%task, dir = %dir.display(), "annotations stored");
    }

    println!("{}", serde_json::to_string_pretty(&engine.export_all())?);
    Ok(())
}
