// Lexvox Command Line Interface
// Narrate statute text from the terminal

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use lexvox_spk::{
    normalize_for_narration, Article, NarrationConfig, NarrationEngine, NarrationOptions,
    NarrationState, Voice,
};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lexvox")]
#[command(about = "Lexvox - narration for statute text", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to <config dir>/lexvox/narration.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print text as it would be narrated
    Normalize {
        text: String,
    },

    /// List the voices the speech backend offers
    Voices {
        /// Only Brazilian and European Portuguese voices
        #[arg(long, short)]
        portuguese: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Narrate text, printing every state change
    Speak {
        text: String,

        #[command(flatten)]
        options: OptionArgs,

        /// Print state changes as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Narrate a statute article the way the reading view does
    Article {
        /// Article number as printed, e.g. "5º"
        number: String,

        content: String,

        /// Print state changes as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

/// Overrides applied on top of the configured defaults
#[derive(Args, Debug, Default)]
struct OptionArgs {
    /// Speaking rate multiplier (1.0 is normal)
    #[arg(long)]
    rate: Option<f32>,

    /// Pitch (0-2, 1.0 is normal)
    #[arg(long)]
    pitch: Option<f32>,

    /// Volume (0-1)
    #[arg(long)]
    volume: Option<f32>,

    /// Language tag, e.g. pt-BR
    #[arg(long)]
    lang: Option<String>,

    /// Voice identifier as listed by `lexvox voices`
    #[arg(long)]
    voice: Option<String>,
}

impl OptionArgs {
    fn apply(self, defaults: &NarrationOptions) -> NarrationOptions {
        NarrationOptions {
            rate: self.rate.unwrap_or(defaults.rate),
            pitch: self.pitch.unwrap_or(defaults.pitch),
            volume: self.volume.unwrap_or(defaults.volume),
            language: self.lang.unwrap_or_else(|| defaults.language.clone()),
            voice: self.voice.or_else(|| defaults.voice.clone()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        command,
        config,
        verbose,
    } = Cli::parse();

    init_logging(verbose);

    match command {
        Commands::Normalize { text } => {
            println!("{}", normalize_for_narration(&text));
        }
        Commands::Voices { portuguese, json } => {
            let engine = build_engine(config.as_deref())?;
            let voices = if portuguese {
                engine.portuguese_voices()
            } else {
                engine.voices()
            };
            print_voices(&voices, json)?;
        }
        Commands::Speak {
            text,
            options,
            json,
        } => {
            let engine = build_engine(config.as_deref())?;
            require_support(&engine)?;
            if normalize_for_narration(&text).trim().is_empty() {
                return Err(anyhow!("Nothing to narrate"));
            }

            let options = options.apply(&engine.config().defaults);
            let updates = engine.watch();
            engine.speak(&text, &options);
            follow_narration(&engine, updates, json).await?;
        }
        Commands::Article {
            number,
            content,
            json,
        } => {
            let engine = build_engine(config.as_deref())?;
            require_support(&engine)?;

            let updates = engine.watch();
            engine.narrate_article(&Article::new(number, content));
            follow_narration(&engine, updates, json).await?;
        }
        Commands::Config => {
            let config = load_config(config.as_deref())?;
            match NarrationConfig::default_path() {
                Some(path) => println!("# default location: {}", path.display()),
                None => println!("# no default location on this platform"),
            }
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

/// `-v` forces debug output; otherwise `RUST_LOG` decides, defaulting to warnings
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NarrationConfig> {
    NarrationConfig::load_or_default(path).context("Failed to load narration config")
}

fn build_engine(path: Option<&Path>) -> anyhow::Result<NarrationEngine> {
    let config = load_config(path)?;
    let engine = NarrationEngine::from_config(config)?;
    debug!(backend = engine.backend_name(), capability = ?engine.capability(), "Engine ready");
    Ok(engine)
}

fn require_support(engine: &NarrationEngine) -> anyhow::Result<()> {
    if engine.is_supported() {
        return Ok(());
    }
    if !engine.config().enabled {
        return Err(anyhow!("Narration is disabled in the configuration"));
    }
    Err(anyhow!(
        "Speech backend '{}' is not available; is espeak-ng installed?",
        engine.backend_name()
    ))
}

/// Print state changes until the engine is idle again; Ctrl-C stops narration
async fn follow_narration(
    engine: &NarrationEngine,
    mut updates: broadcast::Receiver<NarrationState>,
    json: bool,
) -> anyhow::Result<()> {
    // A refused start never leaves idle, so nothing is broadcast
    if updates.is_empty() && engine.state().is_idle() {
        return Err(anyhow!("Narration did not start (run with -v for details)"));
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(state) => {
                    print_state(&state, json)?;
                    if state.is_idle() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} narration updates", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping narration");
                engine.stop();
            }
        }
    }

    Ok(())
}

fn print_state(state: &NarrationState, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
        return Ok(());
    }

    if state.is_idle() {
        println!("[{}]", state.status());
    } else {
        println!(
            "[{}] {}/{} {}",
            state.status(),
            state.position,
            state.text.chars().count(),
            state.remaining_text()
        );
    }
    Ok(())
}

fn print_voices(voices: &[Voice], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(voices)?);
        return Ok(());
    }

    if voices.is_empty() {
        println!("No voices available");
        return Ok(());
    }

    for voice in voices {
        println!("{:<24} {:<10} {}", voice.id, voice.locale, voice.name);
    }
    Ok(())
}
