mod commands;

use bento_runtime::CancellationToken;
use clap::{Parser, Subcommand};
use commands::EXIT_FAILURE;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "bento",
    version,
    about = "Provisioning engine for bundled Python environments"
)]
struct Cli {
    /// Path to the environment declarations file.
    #[arg(long, default_value = "bento.toml", global = true)]
    declarations: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve and install every declared environment (warm start).
    Provision,
    /// List declared environments and their install state.
    List,
    /// Print the install record of one environment.
    Inspect {
        /// Environment name.
        name: String,
    },
    /// Validate that a manifest resolves, printing the lock content.
    Lock {
        /// Path to a manifest TOML file.
        manifest: PathBuf,
        /// Write the lock content to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Update an installed environment to the latest allowed packages.
    Update {
        /// Environment name.
        name: String,
    },
    /// Print the resolved bundling root.
    Root,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BENTO_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let _ = ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                std::process::exit(130);
            }
            cancel.cancel();
            eprintln!("\ncancellation requested, stopping in-flight installs...");
        });
    }

    let result = match cli.command {
        Commands::Provision => commands::provision::run(&cli.declarations, &cancel, cli.json),
        Commands::List => commands::list::run(&cli.declarations, cli.json),
        Commands::Inspect { name } => commands::inspect::run(&name, cli.json),
        Commands::Lock { manifest, output } => {
            commands::lock::run(&manifest, output.as_deref(), &cancel)
        }
        Commands::Update { name } => commands::update::run(&cli.declarations, &name, &cancel),
        Commands::Root => commands::root::run(),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
