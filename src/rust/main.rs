use emotion_api::{
    evaluation, http, init_logger, remote_source, EmotionClassifier, EmotionService, ModelStore, ServiceConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about = "Emotion detection API", long_about = None)]
struct Args {
    /// Model directory (defaults to the local cache)
    #[arg(short, long, global = true, env = "EMOTION_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Classify a single text
    Predict {
        text: String,
    },
    /// Score the model against a JSON Lines test split
    Evaluate {
        file: PathBuf,
    },
    /// Mirror the remote model store into the model directory
    Download {
        /// Force a fresh download of the model files
        #[arg(short, long)]
        fresh: bool,
    },
}

fn load_classifier(model_dir: &Path, config: &ServiceConfig) -> Result<EmotionClassifier> {
    let start_time = Instant::now();
    info!("Loading classifier from {:?}", model_dir);
    let classifier = EmotionClassifier::builder()
        .with_runtime_config(config.runtime_config())
        .with_max_sequence_length(config.max_sequence_length)
        .with_model_dir(model_dir)?
        .build()?;
    let details = classifier.info();
    info!(
        "Classifier ready (took {:.2?}): {:?}, {} labels, max {} tokens",
        start_time.elapsed(),
        details.model_path,
        details.labels.len(),
        details.max_sequence_length
    );
    Ok(classifier)
}

async fn download(store: &ModelStore, config: &ServiceConfig, fresh: bool) -> Result<()> {
    if fresh {
        info!("Fresh download requested - removing any existing model files...");
        store.remove_download()?;
    }
    let source = remote_source(&config.remote).await;
    if store.ensure_downloaded(source.as_ref()).await? {
        info!("Downloaded model into {:?}", store.model_dir());
    }
    store.require_downloaded()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let config = ServiceConfig::from_env()?;

    let model_dir = args
        .model_dir
        .clone()
        .unwrap_or_else(ModelStore::get_default_model_dir);

    match args.command {
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
            let classifier = load_classifier(&model_dir, &config)?;
            http::serve(EmotionService::new(classifier), addr).await?;
        }
        Command::Predict { text } => {
            let classifier = load_classifier(&model_dir, &config)?;
            let prediction = classifier.predict(&text)?;
            println!("{} ({:.1}%)", prediction.label, prediction.score * 100.0);
        }
        Command::Evaluate { file } => {
            let samples = evaluation::load_dataset(&file)
                .with_context(|| format!("Failed to read dataset {:?}", file))?;
            info!("Loaded {} samples from {:?}", samples.len(), file);
            let classifier = load_classifier(&model_dir, &config)?;
            let start_time = Instant::now();
            let report = evaluation::evaluate(&classifier, &samples)?;
            info!("Evaluation took {:.2?}", start_time.elapsed());
            print!("{}", report);
        }
        Command::Download { fresh } => {
            download(&ModelStore::new(&model_dir), &config, fresh).await?;
        }
    }

    Ok(())
}
