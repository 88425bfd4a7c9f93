//! Command-line interface for the payoff binary.

use clap::{Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr};
use tracing_subscriber::filter::LevelFilter;

use crate::api::{LoanArgs, ServeConfig, SolveArgs};

/// payoff: loan amortization planner.
///
/// Simulates a loan month by month with an optional extra monthly payment and scheduled
/// interest-rate changes, reports how much earlier it closes, and solves for the extra
/// payment needed to close it by a target month. Run `serve` for the JSON HTTP API.
#[derive(Debug, Parser, Clone)]
#[command(name = "payoff", version)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the JSON API (`/api/simulate`, `/api/solve`, `/healthz`).
    Serve(ServeArgs),
    /// Simulate one loan and print the summary and schedule as JSON.
    Simulate(LoanArgs),
    /// Find the smallest extra monthly payment that closes the loan by --target-months.
    Solve(SolveArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// RUST_LOG takes precedence when it is set.
    #[arg(long, global = true, env = "PAYOFF_LOG_LEVEL", default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,
}

impl Common {
    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }
}

#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "PAYOFF_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PAYOFF_PORT", default_value_t = 8080)]
    port: u16,
}

impl ServeArgs {
    pub fn config(&self) -> ServeConfig {
        ServeConfig {
            bind: self.bind,
            port: self.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults_to_all_interfaces_on_8080() {
        let args = Args::try_parse_from(["payoff", "serve"]).expect("serve parses");
        let Command::Serve(serve) = args.into_command() else {
            panic!("expected serve command");
        };
        let config = serve.config();
        assert_eq!(config.port, 8080);
        assert_eq!(config.addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn simulate_accepts_repeated_rate_changes() {
        let args = Args::try_parse_from([
            "payoff",
            "--log-level",
            "debug",
            "simulate",
            "--principal",
            "100000",
            "--rate-change",
            "12:8.0",
            "--rate-change",
            "24:7",
            "--schedule",
        ])
        .expect("simulate parses");
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        assert!(matches!(args.into_command(), Command::Simulate(_)));
    }

    #[test]
    fn solve_requires_target_months() {
        assert!(Args::try_parse_from(["payoff", "solve"]).is_err());
        assert!(Args::try_parse_from(["payoff", "solve", "--target-months", "120"]).is_ok());
    }

    #[test]
    fn malformed_rate_change_is_rejected() {
        let parsed = Args::try_parse_from(["payoff", "simulate", "--rate-change", "12-8"]);
        assert!(parsed.is_err());
    }
}
