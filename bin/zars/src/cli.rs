use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "zars")]
#[command(
    author,
    version,
    about = "Deploy and initialize the Zars token, airdrop, presale and staking contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "ZARS_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The target network, as named in the configuration (`goerli`, `bsc`, ...).
    ///
    /// Credentials are read from `ZARS_<NETWORK>_*` environment variables.
    #[arg(short, long, env = "ZARS_NETWORK")]
    pub network: String,

    /// Path to a configuration file.
    ///
    /// If not provided, `Zars.toml` in the current directory is used when it exists.
    #[arg(long, alias = "conf", env = "ZARS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip source verification.
    #[arg(long, env = "ZARS_NO_VERIFY")]
    pub no_verify: bool,

    /// The stage to run. Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Command {
    /// Deploy the contracts, initialize them and verify their sources.
    #[default]
    Run,
    /// Deploy and verify the contracts, without initializing them.
    Deploy,
    /// Initialize the contracts listed in the deployment record.
    Init,
    /// Verify the sources of the contracts listed in the deployment record.
    Verify,
}
