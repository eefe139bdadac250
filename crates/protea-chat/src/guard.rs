//! Timeout and retry guard around agent calls.

use std::future::Future;
use std::time::Duration;

use protea_core::config::LlmConfig;

use crate::error::{AgentError, AgentRole, ChatError};

/// Bounds applied to every agent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Limit for a single attempt.
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Pause before each retry.
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 1,
            backoff: Duration::from_millis(250),
        }
    }
}

impl From<&LlmConfig> for CallPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Run `op` under `policy`.
///
/// Each attempt is cut off after `policy.timeout`. Transient failures are
/// retried up to `policy.retries` times; the last failure, or the first
/// permanent one, is returned as [`ChatError::UpstreamUnavailable`].
pub async fn guarded_call<T, F, Fut>(
    agent: AgentRole,
    policy: &CallPolicy,
    mut op: F,
) -> Result<T, ChatError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(policy.timeout.as_millis() as u64)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.retries => {
                attempt += 1;
                tracing::warn!(%agent, attempt, error = %err, "Agent call failed, retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(err) => {
                return Err(ChatError::UpstreamUnavailable { agent, source: err });
            }
        }
    }
}
