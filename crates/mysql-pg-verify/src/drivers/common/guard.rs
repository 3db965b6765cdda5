//! Per-query timeout and retry around any [`QueryExecutor`].

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::config::RetryConfig;
use crate::core::{Engine, QueryExecutor, Row, SqlValue};
use crate::error::{Result, VerifyError};

/// Longest SQL prefix quoted in timeout errors and retry warnings.
const SQL_CONTEXT_LEN: usize = 80;

/// Decorator adding a per-query timeout and bounded retry of transient
/// connectivity failures.
///
/// SQL errors, timeouts and mismatches are returned on the first attempt.
pub struct GuardedExecutor<E> {
    inner: E,
    timeout: Duration,
    retry: RetryConfig,
}

impl<E: QueryExecutor> GuardedExecutor<E> {
    pub fn new(inner: E, timeout: Duration, retry: RetryConfig) -> Self {
        Self {
            inner,
            timeout,
            retry,
        }
    }

    /// Access the wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    async fn attempt(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        match tokio::time::timeout(self.timeout, self.inner.execute(sql, params)).await {
            Ok(result) => result,
            Err(_) => Err(VerifyError::Timeout {
                context: sql_context(sql),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for GuardedExecutor<E> {
    fn engine(&self) -> Engine {
        self.inner.engine()
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut attempt = 1;
        loop {
            match self.attempt(sql, params).await {
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    attempt += 1;
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        engine = %self.inner.engine(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying after transient error: {} ({})",
                        e,
                        sql_context(sql)
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

fn sql_context(sql: &str) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(SQL_CONTEXT_LEN) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
