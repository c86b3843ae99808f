use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info};
use voicetrack::config::AppConfig;
use voicetrack::events::ProgressUpdate;
use voicetrack::pipeline::{UnitFilter, check_config, run_batch};
use voicetrack::tts::{CachedSynthesizer, OpenAiSynthesizer, SpeechSynthesizer};
use voicetrack::utils::init_logger;

/// Narrated voiceover tracks for quiz and would-you-rather videos
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize, assemble and export tracks for every (video, language) pair
    Run {
        /// Path to config.json
        #[arg(short, long, default_value = "config/config.json")]
        config: PathBuf,
        /// OpenAI API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Only process these videos (repeatable)
        #[arg(long = "video")]
        videos: Vec<String>,
        /// Only process these language codes (repeatable)
        #[arg(long = "language")]
        languages: Vec<String>,
    },
    /// Validate configuration, data files and format profiles without synthesis
    Check {
        /// Path to config.json
        #[arg(short, long, default_value = "config/config.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.debug);

    let ok = match cli.command {
        Commands::Run {
            config,
            api_key,
            videos,
            languages,
        } => run(&config, api_key.unwrap_or_default(), UnitFilter { videos, languages }).await?,
        Commands::Check { config } => check(&config)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config_path: &Path, api_key: String, filter: UnitFilter) -> anyhow::Result<bool> {
    let config = AppConfig::load(config_path)?;

    let openai = OpenAiSynthesizer::new(&api_key, &config.tts)?;
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.tts_cache_dir() {
        Some(dir) => {
            info!("Using TTS cache at {}", dir.display());
            Arc::new(CachedSynthesizer::new(
                openai,
                dir,
                &config.tts.model,
                config.tts.speed,
            ))
        }
        None => Arc::new(openai),
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel::<ProgressUpdate>(64);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            println!("{}", update);
        }
    });

    let report = run_batch(&config, synthesizer, &filter, Some(tx)).await?;
    printer.await?;

    Ok(!report.has_failures())
}

fn check(config_path: &Path) -> anyhow::Result<bool> {
    let config = AppConfig::load(config_path)?;
    let problems = check_config(&config)?;

    for problem in &problems {
        error!("{}", problem);
    }
    if problems.is_empty() {
        println!("Configuration OK");
    }
    Ok(problems.is_empty())
}
