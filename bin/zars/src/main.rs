//! zars is a CLI tool to deploy and wire together the Zars contracts.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use zars_deploy::{
    Artifacts, Credentials, DeployConfig, DeploymentPlan, EtherscanVerifier, Orchestrator,
    RpcChain, RunReport, Wallets,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    // Dropping the run future stops polling and never sends another transaction.
    tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping before the next transaction");
            anyhow::bail!("interrupted");
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or_default();

    let mut config = DeployConfig::load(cli.config.as_deref())?;
    if cli.no_verify {
        config.verification.enabled = false;
    }

    let profile = config.profile(&cli.network)?;
    let credentials = Credentials::from_env(&cli.network)?;
    let wallets = Wallets::from_credentials(&credentials, &profile)?;

    let plan = DeploymentPlan::standard(&profile, &config.token);
    let artifacts = Artifacts::load_hardhat(&config.artifacts_dir, plan.artifact_names())?;

    tracing::info!(
        network = %profile.network,
        chain_id = profile.chain_id,
        command = %command,
        gas_price_threshold_gwei = ?profile.gas_price_threshold_gwei,
        "Starting"
    );

    let chain = RpcChain::connect(
        credentials.rpc_url()?.clone(),
        profile.chain_id,
        wallets,
        config.confirmation.clone(),
    )
    .await?;

    let verifier = match (&profile.explorer_api_url, credentials.explorer_api_key()) {
        (Some(url), Some(key)) => Ok(EtherscanVerifier::new(
            url.clone(),
            key,
            &config.verification,
        )?),
        (None, _) => Err(format!(
            "no explorer API configured for {}",
            profile.network
        )),
        (Some(_), None) => Err(format!(
            "{}EXPLORER_API_KEY is not set",
            Credentials::env_prefix(&profile.network)
        )),
    };

    let orchestrator = Orchestrator::new(&chain, &profile, &config, &artifacts)
        .with_verifier(verifier.as_ref().map_err(|reason| reason.clone()));

    let report = match command {
        Command::Run => orchestrator.run().await?,
        Command::Deploy => {
            let registry = orchestrator.deploy().await?;
            let verification = orchestrator.verify(&registry).await;
            RunReport {
                verification,
                deployments: registry.into_contracts(),
                ..RunReport::new(&profile.network)
            }
        }
        Command::Init => {
            let registry = orchestrator.load_registry()?;
            RunReport {
                wiring: orchestrator.wire(&registry).await?,
                ..RunReport::new(&profile.network)
            }
        }
        Command::Verify => {
            let registry = orchestrator.load_registry()?;
            RunReport {
                verification: orchestrator.verify(&registry).await,
                ..RunReport::new(&profile.network)
            }
        }
    };

    println!("{report}");

    let failures = report.verification_failures();
    if failures > 0 {
        tracing::warn!(
            failures,
            "Some contracts could not be verified, retry with `zars verify`"
        );
    }

    Ok(())
}
