//! # CLI Interface
//!
//! Defines the command-line argument structure for `custody-node` using
//! `clap` derive. Supports two subcommands: `run` and `version`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use custody_ledger::config::{
    DEFAULT_API_PORT, DEFAULT_CUSTODIAN_ADDRESS, DEFAULT_METRICS_PORT,
};

/// Custody vault node.
///
/// Hosts one vault (native currency or a token) on top of a devnet asset
/// ledger, serves the HTTP/WS API, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "custody-node",
    about = "Custody vault node",
    version,
    propagate_version = true
)]
pub struct CustodyNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the custody node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the vault node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Which vault variant to host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VaultVariant {
    /// Custodies the platform's native currency.
    Native,
    /// Custodies a single token; deposits need an approval first.
    Token,
}

/// Log output format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Vault variant to host.
    #[arg(long, value_enum, env = "CUSTODY_VARIANT", default_value = "native")]
    pub variant: VaultVariant,

    /// Owner identity. Fixed for the lifetime of the data directory.
    #[arg(long, env = "CUSTODY_OWNER")]
    pub owner: String,

    /// Token address for the token variant. Ignored for native vaults.
    #[arg(long, env = "CUSTODY_TOKEN_ADDRESS", default_value = "token:ctt")]
    pub token_address: String,

    /// The vault's own account on the asset ledger.
    #[arg(long, env = "CUSTODY_CUSTODIAN", default_value = DEFAULT_CUSTODIAN_ADDRESS)]
    pub custodian: String,

    /// Data directory holding the vault database.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "CUSTODY_DATA_DIR", default_value = "./custody-data")]
    pub data_dir: PathBuf,

    /// Port for the HTTP/WS API.
    #[arg(long, env = "CUSTODY_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "CUSTODY_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log output format.
    #[arg(long, value_enum, env = "CUSTODY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormatArg,

    /// Extra devnet balance the custodian starts with, beyond what restored
    /// claims require. Shows up as reconciliation surplus.
    #[arg(long, env = "CUSTODY_SEED_BALANCE", default_value_t = 0)]
    pub seed_balance: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        CustodyNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = CustodyNodeCli::try_parse_from(["custody-node", "run", "--owner", "alice"])
            .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.variant, VaultVariant::Native);
        assert_eq!(args.owner, "alice");
        assert_eq!(args.custodian, DEFAULT_CUSTODIAN_ADDRESS);
        assert_eq!(args.api_port, DEFAULT_API_PORT);
        assert_eq!(args.seed_balance, 0);
    }

    #[test]
    fn token_variant_parses() {
        let cli = CustodyNodeCli::try_parse_from([
            "custody-node",
            "run",
            "--owner",
            "alice",
            "--variant",
            "token",
            "--token-address",
            "token:usd",
            "--log-format",
            "json",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.variant, VaultVariant::Token);
        assert_eq!(args.token_address, "token:usd");
        assert_eq!(args.log_format, LogFormatArg::Json);
    }
}
