//! Shared utilities for talking to Ethereum JSON-RPC endpoints.

use std::{future::Future, time::Duration};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// A JSON-RPC `error` object is turned into an error carrying its message and code.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {method} request"))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {method} response"))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error on {method} (code {}): {}",
            error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
        );
    }

    // `null` is a valid result (e.g. a receipt that does not exist yet).
    let result_value = result.get("result").cloned().unwrap_or(Value::Null);

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {method} result"))
}

/// Poll `check_fn` until it yields a value.
///
/// Errors from `check_fn` are logged and retried like a `None`. Fails once `timeout` elapsed.
pub async fn poll_until<T, F, Fut>(
    name: &str,
    timeout: Duration,
    interval: Duration,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>, anyhow::Error>>,
{
    let start = tokio::time::Instant::now();

    loop {
        match check_fn().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => {
                tracing::trace!(error = %e, target = %name, "Poll failed, retrying...");
            }
        }

        if start.elapsed() >= timeout {
            anyhow::bail!("Timeout after {timeout:?} waiting for {name}");
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_returns_first_value() {
        let calls = AtomicUsize::new(0);
        let value = poll_until("counter", Duration::from_secs(60), Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => anyhow::bail!("node not ready"),
                    1 => Ok(None),
                    _ => Ok(Some(n)),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let err = poll_until::<(), _, _>(
            "receipt",
            Duration::from_secs(5),
            Duration::from_secs(1),
            || async { Ok(None) },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("receipt"));
    }
}
