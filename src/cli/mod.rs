//! CLI module for Txgate
//!
//! Provides commands:
//! - `simulate`: run an approval round trip on a headless host
//! - `config`: view and modify settings

use clap::{Parser, Subcommand};

pub mod config;
pub mod simulate;

/// Txgate transaction approval CLI
#[derive(Parser, Debug)]
#[command(name = "txgate")]
#[command(about = "Cross-context transaction approval")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one approval round trip on a headless host
    Simulate(simulate::SimulateArgs),
    /// View and modify settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Simulate(args)) => simulate::run(args).await,
        Some(Commands::Config { command }) => config::run(command),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txgate_window::PlatformVariant;

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "txgate",
            "simulate",
            "--decision",
            "decline",
            "--variant",
            "replace",
            "--estimate-ms",
            "20",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Simulate(args)) => {
                assert_eq!(args.decision, simulate::Decision::Decline);
                assert_eq!(args.variant, Some(PlatformVariant::ReplaceCurrent));
                assert_eq!(args.estimate_ms, Some(20));
                assert_eq!(args.gas, "60000");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_reject_unknown_variant() {
        assert!(Cli::try_parse_from(["txgate", "simulate", "--variant", "tabbed"]).is_err());
    }

    #[test]
    fn test_log_json_is_global() {
        let cli = Cli::try_parse_from(["txgate", "config", "show", "--log-json"]).unwrap();
        assert!(cli.log_json);
    }
}
