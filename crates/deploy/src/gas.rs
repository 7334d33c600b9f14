//! Holds submission back until the network gas price is low enough.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};

use crate::{DeployError, chain::FeeOracle, config::GasSettings};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Convert a gwei amount to wei, rounding to the nearest wei.
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * WEI_PER_GWEI as f64).round() as u128
}

/// Render a wei amount in gwei without trailing zeros (`1500000000` -> `1.5`).
pub fn format_gwei(wei: u128) -> String {
    let whole = wei / WEI_PER_GWEI;
    let fraction = wei % WEI_PER_GWEI;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{fraction:09}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Wait on the gate when a threshold is set, returning the price of the clearing sample.
pub async fn clear_gate<F: FeeOracle>(
    oracle: &F,
    settings: &GasSettings,
    threshold_wei: Option<u128>,
) -> Result<Option<u128>, DeployError> {
    let Some(threshold_wei) = threshold_wei else {
        return Ok(None);
    };
    let sample = GasPriceGate::new(oracle, settings)
        .wait_until_below(threshold_wei)
        .await?;
    Ok(Some(sample.wei))
}

/// A gas price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPriceSample {
    pub wei: u128,
    pub observed_at: DateTime<Utc>,
}

impl GasPriceSample {
    pub fn gwei(&self) -> String {
        format_gwei(self.wei)
    }
}

/// Polls a [`FeeOracle`] until the gas price drops to a threshold.
pub struct GasPriceGate<'a, F> {
    oracle: &'a F,
    poll_interval: Duration,
    max_wait: Option<Duration>,
    backoff: ExponentialBuilder,
}

impl<'a, F: FeeOracle> GasPriceGate<'a, F> {
    pub fn new(oracle: &'a F, settings: &GasSettings) -> Self {
        Self {
            oracle,
            poll_interval: settings.poll_interval(),
            max_wait: settings.max_wait(),
            backoff: settings.fee_query_backoff(),
        }
    }

    /// Wait until a sample is at or below `threshold_wei` and return that sample.
    ///
    /// Samples are taken every poll interval with no upper bound on the number of polls,
    /// unless a maximum wait is configured. Each query is retried with backoff; exhausting the
    /// retries aborts with [`DeployError::FeeQuery`]. Dropping the future cancels the wait.
    pub async fn wait_until_below(&self, threshold_wei: u128) -> Result<GasPriceSample, DeployError> {
        let wait = self.poll(threshold_wei);

        match self.max_wait {
            Some(max_wait) => tokio::time::timeout(max_wait, wait).await.map_err(|_| {
                DeployError::GasPriceTimeout {
                    threshold_gwei: format_gwei(threshold_wei),
                    waited: max_wait,
                }
            })?,
            None => wait.await,
        }
    }

    /// Take a single sample.
    pub async fn sample(&self) -> Result<GasPriceSample, DeployError> {
        let wei = (|| self.oracle.gas_price())
            .retry(self.backoff)
            .sleep(tokio::time::sleep)
            .notify(|err, retry_in| {
                tracing::warn!(error = %err, ?retry_in, "Gas price query failed, retrying");
            })
            .await
            .map_err(DeployError::FeeQuery)?;

        Ok(GasPriceSample {
            wei,
            observed_at: Utc::now(),
        })
    }

    async fn poll(&self, threshold_wei: u128) -> Result<GasPriceSample, DeployError> {
        let threshold_gwei = format_gwei(threshold_wei);
        let mut last_reported = None;

        loop {
            let sample = self.sample().await?;

            if last_reported != Some(sample.wei) {
                tracing::info!(
                    gas_price_gwei = %sample.gwei(),
                    threshold_gwei = %threshold_gwei,
                    "Gas price is {} gwei",
                    sample.gwei()
                );
                last_reported = Some(sample.wei);
            }

            if sample.wei <= threshold_wei {
                return Ok(sample);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
