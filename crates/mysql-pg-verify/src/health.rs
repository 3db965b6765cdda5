//! Connectivity check for both engines.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::core::QueryExecutor;
use crate::drivers::{MysqlExecutor, PostgresExecutor};
use crate::error::Result;

/// Result of a health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

#[derive(Debug, Default)]
struct Probe {
    connected: bool,
    latency_ms: u64,
    error: Option<String>,
}

impl Probe {
    fn from_result(result: Result<()>, start: Instant) -> Self {
        let latency_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(()) => Probe {
                connected: true,
                latency_ms,
                error: None,
            },
            Err(e) => Probe {
                connected: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}

async fn ping(executor: &dyn QueryExecutor) -> Result<()> {
    let result = executor.ping().await;
    executor.close().await;
    result
}

/// Open, ping and close each engine independently.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let start = Instant::now();
    let source = match MysqlExecutor::connect(&config.source).await {
        Ok(executor) => ping(&executor).await,
        Err(e) => Err(e),
    };
    let source = Probe::from_result(source, start);

    let start = Instant::now();
    let target = match PostgresExecutor::connect(&config.target).await {
        Ok(executor) => ping(&executor).await,
        Err(e) => Err(e),
    };
    let target = Probe::from_result(target, start);

    let result = combine(source, target);
    info!(
        "Health check: source {} ({}ms), target {} ({}ms)",
        if result.source_connected { "ok" } else { "failed" },
        result.source_latency_ms,
        if result.target_connected { "ok" } else { "failed" },
        result.target_latency_ms
    );
    result
}

fn combine(source: Probe, target: Probe) -> HealthCheckResult {
    HealthCheckResult {
        healthy: source.connected && target.connected,
        source_connected: source.connected,
        source_latency_ms: source.latency_ms,
        source_error: source.error,
        target_connected: target.connected,
        target_latency_ms: target.latency_ms,
        target_error: target.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Engine;
    use crate::error::VerifyError;

    #[test]
    fn test_unhealthy_when_either_side_fails() {
        let ok = Probe::from_result(Ok(()), Instant::now());
        let failed = Probe::from_result(
            Err(VerifyError::connectivity(Engine::Postgres, "refused")),
            Instant::now(),
        );
        let result = combine(ok, failed);
        assert!(!result.healthy);
        assert!(result.source_connected);
        assert_eq!(
            result.target_error.as_deref(),
            Some("PostgreSQL connection error: refused")
        );
    }

    #[test]
    fn test_errors_omitted_from_json_when_healthy() {
        let result = combine(
            Probe::from_result(Ok(()), Instant::now()),
            Probe::from_result(Ok(()), Instant::now()),
        );
        assert!(result.healthy);
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("source_error"));
    }
}
