use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use puzzleforge::cli::commands::generate::GenerateOptions;

#[derive(Parser)]
#[command(name = "puzzleforge")]
#[command(
    version,
    about = "Generate and verify logic puzzles and math exercises with an LLM backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the global/project chain
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one puzzle and stream progress
    Generate {
        #[arg(
            long,
            short,
            help = "Family: pattern, sequence, puzzle, graph, spatial, arithmetic"
        )]
        family: String,
        #[arg(
            long,
            short,
            default_value = "intermediate",
            help = "Audience: beginner, elementary, intermediate, advanced, expert"
        )]
        tier: String,
        #[arg(long, help = "Theme or constraint for the puzzle")]
        hint: Option<String>,
        #[arg(long, env = "USER", default_value = "cli", help = "Identity charged for quota")]
        caller: String,
        #[arg(long, help = "Print events as JSON lines")]
        json: bool,
        #[arg(long = "no-save", help = "Do not write the result to the content store")]
        no_save: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a configuration file with all defaults
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mpuzzleforge encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            family,
            tier,
            hint,
            caller,
            json,
            no_save,
        } => {
            let rt = Runtime::new()?;
            let succeeded = rt.block_on(puzzleforge::cli::commands::generate::run(
                GenerateOptions {
                    family,
                    tier,
                    hint,
                    caller,
                    json,
                    no_save,
                    config: cli.config,
                },
            ))?;
            if !succeeded {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                puzzleforge::cli::commands::config::show(global, &format)?;
            }
            ConfigAction::Path => {
                puzzleforge::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                puzzleforge::cli::commands::config::init(global, force)?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
