mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Cosmos: log training metrics and sync results with the remote store
#[derive(Parser, Debug)]
#[command(name = "cosmos", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds `cosmos.toml`)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Output directory, relative to the workspace (overrides configuration)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Archive the output directory and upload it
    Save {
        /// Text written to description.txt before archiving
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Download a saved revision into the output directory
    Load {
        /// Revision to fetch (latest if omitted)
        #[arg(short, long)]
        rev: Option<String>,
    },
    /// Append one row of values, matched positionally to the log's keys
    Log {
        /// Keys to use when no result.csv exists yet
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<String>,
        /// Metric values
        #[arg(allow_negative_numbers = true)]
        values: Vec<f64>,
    },
    /// Print result.csv
    Show,
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "cosmos", "cosmos")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "cosmos.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.output_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_accepts_negative_values_and_keys() {
        let cli = Cli::parse_from(["cosmos", "log", "--keys", "acc,loss", "0.5", "-1.25"]);
        match cli.command {
            Commands::Log { keys, values } => {
                assert_eq!(keys, vec!["acc", "loss"]);
                assert_eq!(values, vec![0.5, -1.25]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_load_rev_flag() {
        let cli = Cli::parse_from(["cosmos", "-o", "runs/a", "load", "--rev", "4"]);
        assert_eq!(cli.output_dir, Some(PathBuf::from("runs/a")));
        assert!(matches!(cli.command, Commands::Load { rev: Some(ref r) } if r == "4"));
    }
}
