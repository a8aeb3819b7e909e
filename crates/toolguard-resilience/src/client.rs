//! Remote policy client: calls out to a remote decision service, guarded
//! by a circuit breaker and retried with jitter, synthesizing a safe
//! decision when every attempt is exhausted. Network failures never reach
//! the policy decision path raw.

use crate::breaker::{BreakerError, CircuitBreaker};
use crate::retry::{retry_with_jitter, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;
use toolguard_core::config::FailMode;
use toolguard_core::Decision;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RemotePolicyError {
    #[error("remote policy call failed: {0}")]
    Transport(String),
    #[error("remote policy service returned HTTP {status}")]
    Http { status: u16 },
    #[error("circuit breaker rejected the call")]
    CircuitOpen,
    #[error("remote policy call exceeded its deadline")]
    DeadlineExceeded,
}

impl RemotePolicyError {
    /// Non-HTTP failures and HTTP 429/5xx are worth retrying; any other
    /// 4xx is a request the service has already judged and will judge the
    /// same way again.
    pub fn is_retriable(&self) -> bool {
        match self {
            RemotePolicyError::Http { status } => *status == 429 || (500..600).contains(status),
            RemotePolicyError::Transport(_) | RemotePolicyError::CircuitOpen => true,
            RemotePolicyError::DeadlineExceeded => false,
        }
    }
}

/// What the host sends the remote policy service for one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyRequest {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub call_id: Option<String>,
}

/// What a remote policy call returns before it is reconciled with the
/// local [`Decision`] vocabulary. Older policy services reply with the
/// `pass`/`block` vocabulary from before `modify` existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawDecision {
    Allow,
    Deny,
    Modify,
    /// Deprecated: `pass` meant `allow`.
    Pass,
    /// Deprecated: `block` meant `deny`.
    Block,
}

static LEGACY_VOCAB_WARNING: Once = Once::new();

impl RawDecision {
    fn into_decision(self) -> Decision {
        match self {
            RawDecision::Allow => Decision::Allow,
            RawDecision::Deny => Decision::Deny,
            RawDecision::Modify => Decision::Modify,
            RawDecision::Pass => {
                warn_legacy_vocab();
                Decision::Allow
            }
            RawDecision::Block => {
                warn_legacy_vocab();
                Decision::Deny
            }
        }
    }
}

fn warn_legacy_vocab() {
    LEGACY_VOCAB_WARNING.call_once(|| {
        tracing::warn!(
            "remote policy service returned the deprecated pass/block vocabulary; \
             treating pass as allow and block as deny. Update the service to reply \
             with allow/deny/modify."
        );
    });
}

pub struct RemotePolicyClient<F> {
    call: F,
    breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
    fail_mode: FailMode,
    deadline: Option<Duration>,
}

impl<F, Fut> RemotePolicyClient<F>
where
    F: Fn(PolicyRequest) -> Fut,
    Fut: Future<Output = Result<RawDecision, RemotePolicyError>>,
{
    pub fn new(
        call: F,
        breaker: Arc<CircuitBreaker>,
        retry_policy: RetryPolicy,
        fail_mode: FailMode,
    ) -> Self {
        Self {
            call,
            breaker,
            retry_policy,
            fail_mode,
            deadline: None,
        }
    }

    /// Overall deadline for one decision, retries included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attempt the remote call, retrying through the circuit breaker.
    /// Never returns an error: once retries, the breaker, and the
    /// deadline are all exhausted, resolves to `allow` (fail-open) or
    /// `deny` (fail-closed) per the configured fail mode.
    pub async fn decide(&self, request: &PolicyRequest) -> Decision {
        let attempts = retry_with_jitter(
            self.retry_policy,
            || async {
                let attempt = self
                    .breaker
                    .begin_attempt()
                    .map_err(|BreakerError::Open| RemotePolicyError::CircuitOpen)?;
                match (self.call)(request.clone()).await {
                    Ok(raw) => {
                        self.breaker.record_success(attempt);
                        Ok(raw)
                    }
                    Err(err) => {
                        self.breaker.record_failure(attempt);
                        Err(err)
                    }
                }
            },
            RemotePolicyError::is_retriable,
        );

        let result = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, attempts).await {
                Ok(result) => result,
                Err(_) => Err(RemotePolicyError::DeadlineExceeded),
            },
            None => attempts.await,
        };

        match result {
            Ok(raw) => raw.into_decision(),
            Err(err) => {
                tracing::warn!(error = %err, fail_mode = ?self.fail_mode, "remote policy unavailable, synthesizing decision");
                match self.fail_mode {
                    FailMode::FailOpen => Decision::Allow,
                    FailMode::FailClosed => Decision::Deny,
                }
            }
        }
    }
}
