//! Command-line entry point of the wiki farm engine.
//!
//! ```text
//! wikifarm resolve --config engine.toml --host en.example.org --path /wiki/Main
//!     → JSON artifact on stdout, soft failures in "log"
//!     → exit 0 found, 2 not found, 1 farm configuration error
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;

use wikifarm::config::load_config;
use wikifarm::engine::{FarmEngine, FarmRequest, Resolution};
use wikifarm::observability::logging::init_logging;
use wikifarm::routing::Farms;
use wikifarm::source::SourceReader;

#[derive(Parser)]
#[command(name = "wikifarm")]
#[command(about = "Resolve and compile the configuration of a wiki farm tenant", long_about = None)]
struct Cli {
    /// Engine configuration file
    #[arg(short, long, global = true, default_value = "wikifarm.toml")]
    config: PathBuf,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one request and print the artifact
    Resolve {
        #[arg(long)]
        host: String,

        #[arg(long, default_value = "/")]
        path: String,

        /// Run as a maintenance entry point (ignore live deployments)
        #[arg(long)]
        maintenance: bool,

        /// Whether the host supports registry activation
        #[arg(long)]
        registry: Option<bool>,
    },
    /// Validate the engine configuration and the farms file
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cannot load {}: {}", cli.config.display(), e);
            return ExitCode::from(1);
        }
    };
    config.observability.json_logs |= cli.json;
    init_logging(&config.observability);

    match cli.command {
        Commands::Resolve {
            host,
            path,
            maintenance,
            registry,
        } => {
            let mut request = if maintenance {
                FarmRequest::maintenance(host, path)
            } else {
                FarmRequest::web(host, path)
            };
            request.registry_supported = registry;

            let response = FarmEngine::new(config).handle(&request);
            let log = response.log.messages();
            let (output, code) = match response.outcome {
                Ok(Resolution::Found(wiki)) => (json!({"found": wiki.artifact, "log": log}), 0),
                Ok(Resolution::NotFound(missing)) => (json!({"not_found": missing, "log": log}), 2),
                Err(e) => (json!({"error": e.to_string(), "log": log}), 1),
            };
            match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("cannot render output: {}", e);
                    return ExitCode::from(1);
                }
            }
            ExitCode::from(code)
        }
        Commands::Check => {
            let mut log = wikifarm::observability::FarmLog::new();
            match Farms::load(&SourceReader::new(None), &config.farms_path(), &mut log) {
                Ok(farms) => {
                    for message in log.messages() {
                        eprintln!("warning: {}", message);
                    }
                    for family in farms.skipped() {
                        eprintln!("warning: family '{}' has no server pattern and is ignored", family);
                    }
                    println!(
                        "{} families: {}",
                        farms.len(),
                        farms.names().collect::<Vec<_>>().join(", ")
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::from(1)
                }
            }
        }
    }
}
