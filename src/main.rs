use clap::Parser;
use payoff::api::{run_http_server, run_simulate_command, run_solve_command};
use payoff::args::{Args, Command};
use payoff::Result;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    match args.into_command() {
        Command::Serve(serve_args) => run_http_server(serve_args.config()).await?,
        Command::Simulate(loan_args) => println!("{}", run_simulate_command(loan_args)?),
        Command::Solve(solve_args) => println!("{}", run_solve_command(solve_args)?),
    }
    Ok(())
}

/// Initializes the tracing subscriber.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        // Without RUST_LOG, only this crate logs, at the requested level.
        None => EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
