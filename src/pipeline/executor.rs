use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::Stage;
use crate::capabilities::CapabilityError;
use crate::retry::{self, RetryDecision, RetrySettings};

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome<T> {
    pub value: T,
    /// True when the value came from the fallback action instead of the
    /// real capability.
    pub degraded: bool,
}

/// Hard stage failure; terminates the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} stage: {cause}")]
pub struct StageFailure {
    pub stage: Stage,
    pub cause: String,
}

/// The fallback action could not produce a placeholder. There is no further
/// fallback, so this always becomes a [`StageFailure`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FallbackError(pub String);

/// Runs one capability call under the retry policy with a fallback action.
///
/// `existing` is the evaluated "already produced" predicate: when `Some`, the
/// capability is never invoked and the value is returned as a non-degraded
/// success (external calls are expensive; skipping is a cost optimization).
///
/// Retryable errors back off per `settings`; the wait races `cancel`.
/// Exhaustion or a non-retryable error invokes `fallback` exactly once.
pub async fn run_stage<T, Call, CallFut, Fallback>(
    stage: Stage,
    settings: &RetrySettings,
    cancel: &CancellationToken,
    existing: Option<T>,
    mut call: Call,
    fallback: Fallback,
) -> Result<StageOutcome<T>, StageFailure>
where
    T: Send,
    Call: FnMut() -> CallFut + Send,
    CallFut: Future<Output = Result<T, CapabilityError>> + Send,
    Fallback: FnOnce(&CapabilityError) -> Result<T, FallbackError> + Send,
{
    if let Some(value) = existing {
        tracing::info!(stage = %stage, "Output already exists, skipping capability call");
        return Ok(StageOutcome {
            value,
            degraded: false,
        });
    }

    if cancel.is_cancelled() {
        return Err(StageFailure {
            stage,
            cause: "cancelled before stage started".into(),
        });
    }

    let mut attempt = 1u32;
    let last_error = loop {
        match call().await {
            Ok(value) => {
                return Ok(StageOutcome {
                    value,
                    degraded: false,
                })
            }
            Err(error) => match retry::decide(attempt, &error, settings) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        stage = %stage,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying after error"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(StageFailure {
                                stage,
                                cause: "cancelled while waiting to retry".into(),
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                RetryDecision::GiveUp => break error,
            },
        }
    };

    tracing::warn!(
        stage = %stage,
        error = %last_error,
        "Capability exhausted, invoking fallback"
    );
    match fallback(&last_error) {
        Ok(value) => Ok(StageOutcome {
            value,
            degraded: true,
        }),
        Err(e) => Err(StageFailure {
            stage,
            cause: format!("fallback production failed: {e}"),
        }),
    }
}
