use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check::CheckArgs, serve::ServeArgs};

#[derive(Parser, Debug)]
#[command(name = "rift", version, about = "Redshift MCP server with guarded queries")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server against a Redshift cluster.
    Serve(ServeArgs),

    /// Validate a statement offline and show how it would be routed.
    Check(CheckArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // stdout belongs to the stdio transport.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Serve(args) => {
            commands::serve::execute(args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check(args) => {
            let accepted = commands::check::execute(&args)?;
            Ok(if accepted {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
