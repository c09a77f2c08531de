use annotation_quality::{Annotation, ProcessingResult, Settings};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "ANNOQ_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "annoq",
    about = "Validate, score and filter AI-generated design annotations",
    version
)]
struct Cli {
    /// Settings file (defaults to ~/.config/annoq/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the quality pipeline over a JSON file of annotations ("-" for stdin)
    Process(ProcessArgs),
    /// Print the effective phrase tables as TOML
    Vocabulary,
    /// Print the effective settings as TOML
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct ProcessArgs {
    input: PathBuf,
    /// Validate and annotate but keep every annotation
    #[arg(long)]
    no_filter: bool,
    #[arg(long)]
    max_invalid: Option<usize>,
    /// Emit a debug event per validation stage
    #[arg(long)]
    log_details: bool,
    /// Leave the decision log out of the output
    #[arg(long)]
    quiet_log: bool,
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Only print where the settings file is looked up
    #[arg(long)]
    path: bool,
    /// Write the defaults to the settings file if it does not exist yet
    #[arg(long)]
    init: bool,
}

/// Accepts a bare array or an object with an `annotations` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationInput {
    List(Vec<Annotation>),
    Wrapped { annotations: Vec<Annotation> },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    // Neither needs the settings file to exist yet
    if let Commands::Config(args) = &cli.command {
        if args.init {
            return init_config(cli.config.as_deref());
        }
        if args.path {
            println!("{}", settings_path(cli.config.as_deref())?.display());
            return Ok(());
        }
    }
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Process(args) => run_process(settings, args),
        Commands::Vocabulary => {
            let toml = toml::to_string_pretty(&settings.vocabulary)
                .context("Failed to render vocabulary")?;
            print!("{}", toml);
            Ok(())
        }
        Commands::Config(_) => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read annotations from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))
}

fn run_process(mut settings: Settings, args: ProcessArgs) -> Result<()> {
    if args.no_filter {
        settings.processing.enable_filtering = false;
    }
    if let Some(max_invalid) = args.max_invalid {
        settings.processing.max_invalid_annotations = max_invalid;
    }
    if args.log_details {
        settings.processing.log_validation_details = true;
    }

    let raw = read_input(&args.input)?;
    let annotations = match serde_json::from_str::<AnnotationInput>(&raw)
        .context("Input is not a list of annotations")?
    {
        AnnotationInput::List(list) => list,
        AnnotationInput::Wrapped { annotations } => annotations,
    };

    let orchestrator = settings
        .processing_orchestrator()
        .context("Invalid processing settings")?;
    let mut result: ProcessingResult = orchestrator.process(annotations);
    if args.quiet_log {
        result.processing_log.clear();
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", json);
    Ok(())
}

fn settings_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => match Settings::default_path() {
            Some(path) => Ok(path),
            None => bail!("Could not determine a config directory"),
        },
    }
}

fn init_config(explicit: Option<&Path>) -> Result<()> {
    let path = settings_path(explicit)?;
    if path.exists() {
        eprintln!("  Settings file already exists at {}", path.display());
        return Ok(());
    }
    Settings::default()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("  + Wrote default settings to {}", path.display());
    Ok(())
}
