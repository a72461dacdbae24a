//! Newscast CLI - Two-host news podcast producer
//!
//! Generates a script, voices it with two hosts, publishes the episode and
//! keeps the RSS feed in sync with the episodes directory.

use std::env;
use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use newscast_core::config::default_config;
use newscast_core::{
    Config, ElevenLabsSynthesizer, EpisodeCallback, EpisodeEvent, EpisodeOrchestrator,
    EpisodeReport, FeedOutcome, FfmpegJoiner, HostId, KokoroSynthesizer, OpenAiWriter,
    PodcastError, RunMode, SpeechProvider, SpeechSynthesizer, SplitStats, WriterConfig,
    rebuild_feed,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "newscast.toml";

#[derive(Parser)]
#[command(
    name = "newscast",
    version,
    about = "Two-host news podcast producer",
    long_about = "Generates a weekly two-host news episode with an OpenAI-compatible model, \
                  voices it, and publishes it alongside an RSS feed."
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate an episode in the working directory
    Generate {
        /// Stop after splitting and cleaning the script; write a report instead of audio
        #[arg(long)]
        test: bool,
    },
    /// Generate an episode, move it into the episodes directory and update the feed
    Publish,
    /// Rebuild the RSS feed from the episodes directory
    Feed,
    /// Print the cleaned version of a script file ("-" reads stdin)
    Clean {
        #[arg(value_name = "FILE")]
        input: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let mut config = load_config(cli.config.as_deref())?;
    apply_env_overrides(&mut config);

    match cli.command {
        Command::Generate { test } => {
            let mode = if test { RunMode::Test } else { RunMode::Produce };
            run_episode(config, mode).await?;
        }
        Command::Publish => run_episode(config, RunMode::Publish).await?,
        Command::Feed => update_feed(&config)?,
        Command::Clean { input } => clean(&config, &input)?,
    }

    Ok(())
}

/// Install the console subscriber and, if requested, a file layer.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    // Progress is printed by the console callback; stderr logging is for problems.
    let console_filter = if verbose {
        EnvFilter::new("warn,newscast_core=debug,newscast=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let level = if verbose { "info,newscast_core=debug" } else { "info" };
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new(level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> Result<Config, PodcastError> {
    match path {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            Config::load(path)
        }
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            tracing::info!("Loading config from {}", DEFAULT_CONFIG_FILE);
            Config::load(DEFAULT_CONFIG_FILE)
        }
        None => Ok(default_config()),
    }
}

/// Voice ids from the environment win over the config file.
fn apply_env_overrides(config: &mut Config) {
    for (var, id) in [("VOICE_ID_1", HostId::First), ("VOICE_ID_2", HostId::Second)] {
        if let Ok(voice_id) = env::var(var) {
            if voice_id.trim().is_empty() {
                continue;
            }
            let host = match id {
                HostId::First => &mut config.hosts.first,
                HostId::Second => &mut config.hosts.second,
            };
            tracing::debug!("{} overrides voice for {}", var, host.name);
            host.voice_id = voice_id.trim().to_string();
        }
    }
}

async fn run_episode(config: Config, mode: RunMode) -> Result<(), Box<dyn Error>> {
    if mode != RunMode::Test {
        check_ffmpeg(&FfmpegJoiner::default()).await?;
    }

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    print_header(&config, mode);

    let writer = OpenAiWriter::new(WriterConfig::new(
        api_base,
        api_key,
        &config.generation.model,
    ))?;

    let callback = create_console_callback(
        config.hosts.first.name.clone(),
        config.hosts.second.name.clone(),
    );
    let mut orchestrator =
        EpisodeOrchestrator::new(config.clone(), Box::new(writer))?.with_callback(callback);
    if mode != RunMode::Test {
        orchestrator = orchestrator.with_synthesizer(build_synthesizer(&config).await?);
    }

    let report = orchestrator.run(mode).await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    match &report {
        EpisodeReport::Test { report_path, .. } => {
            println!(
                "{} {}",
                "  Test run complete. Report:".bright_green().bold(),
                report_path.display()
            );
        }
        EpisodeReport::Produced { episode, .. } => {
            println!(
                "{} {}",
                "  Episode ready:".bright_green().bold(),
                episode.display()
            );
        }
        EpisodeReport::Published { episode, .. } => {
            println!(
                "{} {}",
                "  Episode published:".bright_green().bold(),
                episode.display()
            );
        }
    }
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Fail with install hints when ffmpeg cannot be run.
async fn check_ffmpeg(joiner: &FfmpegJoiner) -> Result<(), PodcastError> {
    if let Err(e) = joiner.ensure_available().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        eprintln!("Install it with one of:");
        eprintln!("  macOS:         {}", "brew install ffmpeg".bright_white());
        eprintln!("  Debian/Ubuntu: {}", "sudo apt install ffmpeg".bright_white());
        eprintln!("  Windows:       {}", "winget install ffmpeg".bright_white());
        return Err(e);
    }
    Ok(())
}

async fn build_synthesizer(config: &Config) -> Result<Box<dyn SpeechSynthesizer>, PodcastError> {
    match config.speech.provider {
        SpeechProvider::ElevenLabs => {
            let mut synthesizer = ElevenLabsSynthesizer::new(&config.speech);
            for id in [HostId::First, HostId::Second] {
                let host = config.host(id);
                let Some(var) = host.api_key_env.as_deref() else {
                    continue;
                };
                match env::var(var) {
                    Ok(key) if !key.trim().is_empty() => {
                        synthesizer = synthesizer.with_voice_key(&host.voice_id, key.trim());
                    }
                    _ => eprintln!(
                        "{}",
                        format!("Warning: {} not set for {}.", var, host.name).yellow()
                    ),
                }
            }
            if let Ok(key) = env::var("ELEVENLABS_API_KEY") {
                synthesizer = synthesizer.with_default_key(key.trim());
            }
            Ok(Box::new(synthesizer))
        }
        SpeechProvider::Kokoro => {
            println!("{}", "Loading local TTS model...".dimmed());
            let synthesizer = KokoroSynthesizer::new(&config.speech).await?;
            for id in [HostId::First, HostId::Second] {
                synthesizer.validate_voice(&config.host(id).voice_id)?;
            }
            Ok(Box::new(synthesizer))
        }
    }
}

fn update_feed(config: &Config) -> Result<(), PodcastError> {
    let paths = &config.paths;
    let outcome = rebuild_feed(
        &config.catalog(),
        &config.feed_builder(),
        &paths.episodes_dir,
        &paths.feed_path,
    )?;
    print_feed_outcome(&outcome, &paths.episodes_dir, &paths.feed_path);
    Ok(())
}

fn clean(config: &Config, input: &str) -> Result<(), Box<dyn Error>> {
    let text = if input == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(input).map_err(|e| PodcastError::io(input, e))?
    };

    println!("{}", config.sanitizer()?.sanitize(&text));
    Ok(())
}

fn print_header(config: &Config, mode: RunMode) {
    let action = match mode {
        RunMode::Test => "Test Run",
        RunMode::Produce => "Episode",
        RunMode::Publish => "Publish",
    };

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", config.show.title.bold(), action)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {}",
        "Date:".bold(),
        Local::now().format("%B %-d, %Y").to_string().bright_white()
    );
    println!("{} {}", "Model:".bold(), config.generation.model.dimmed());
    println!("{}", "Hosts:".bold());
    for id in [HostId::First, HostId::Second] {
        let host = config.host(id);
        println!(
            "  {}. {} - voice {}",
            id.index() + 1,
            host.name.bright_cyan(),
            host.voice_id.dimmed()
        );
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

fn print_split_stats(stats: &SplitStats, first: &str, second: &str) {
    println!("  Script length: {} characters", stats.total);
    println!(
        "  {}: {} characters ({:.1}%)",
        first.bright_cyan(),
        stats.first,
        stats.first_percent()
    );
    println!(
        "  {}: {} characters ({:.1}%)",
        second.bright_cyan(),
        stats.second,
        stats.second_percent()
    );
    if stats.degraded {
        println!(
            "  {}",
            "Split markers missing; halves were cut by line count.".yellow()
        );
    }
}

fn print_feed_outcome(outcome: &FeedOutcome, episodes_dir: &Path, feed_path: &Path) {
    match outcome {
        FeedOutcome::Written { episodes } => println!(
            "  {} {} ({} episodes)",
            "✓".green(),
            feed_path.display(),
            episodes
        ),
        FeedOutcome::NoEpisodes => println!(
            "  {}",
            format!(
                "No episodes in {}; feed left unchanged.",
                episodes_dir.display()
            )
            .yellow()
        ),
    }
}

/// Create a callback that prints episode events to the console.
fn create_console_callback(first: String, second: String) -> EpisodeCallback {
    Box::new(move |event| match event {
        EpisodeEvent::StepStarted { step } => {
            println!("{} {}", "▶".bright_cyan(), step.bold());
        }
        EpisodeEvent::ScriptReady { characters } => {
            println!(
                "  {}",
                format!("Script ready ({} characters)", characters).dimmed()
            );
        }
        EpisodeEvent::ScriptSplit { stats } => print_split_stats(&stats, &first, &second),
        EpisodeEvent::AudioReady { host, path } => {
            println!("  {} {} → {}", "✓".green(), host, path.display());
        }
        EpisodeEvent::EpisodeReady { path } => {
            println!("  {} {}", "✓".green(), path.display());
        }
        EpisodeEvent::Published { path } => {
            println!("  {} moved to {}", "✓".green(), path.display());
        }
        EpisodeEvent::FeedRebuilt { outcome } => match outcome {
            FeedOutcome::Written { episodes } => {
                println!("  {} feed lists {} episodes", "✓".green(), episodes);
            }
            FeedOutcome::NoEpisodes => {
                println!("  {}", "No episodes found; feed left unchanged.".yellow());
            }
        },
        EpisodeEvent::Finished => {
            // Handled in run_episode
        }
    })
}
