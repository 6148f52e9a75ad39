//! Concurrent notification fan-out.
//!
//! All invocations run on the calling task: nothing is spawned, so dropping
//! the publish future drops every in-flight handler with it. The fan-out
//! resolves only after every invocation has finished, including the ones
//! still running when another has already failed.

use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::foundation::{DispatchError, DispatchResult, HandlerResult};

/// How failures of several notification handlers are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the failure of the earliest handler in resolution order.
    #[default]
    FirstFailure,
    /// Report every failure, in resolution order.
    ///
    /// A single failure is still reported as itself.
    Aggregate,
}

/// Runs every invocation to completion and folds the failures per `policy`.
pub async fn fan_out(
    mut invocations: Vec<BoxFuture<'_, HandlerResult<()>>>,
    policy: FailurePolicy,
) -> DispatchResult<()> {
    if invocations.len() <= 1 {
        return match invocations.pop() {
            None => Ok(()),
            Some(only) => only.await.map_err(DispatchError::from_boxed),
        };
    }

    let total = invocations.len();
    let mut failures: Vec<DispatchError> = join_all(invocations)
        .await
        .into_iter()
        .filter_map(Result::err)
        .map(DispatchError::from_boxed)
        .collect();

    if failures.is_empty() {
        return Ok(());
    }

    debug!(total, failed = failures.len(), ?policy, "Notification handlers failed");

    if policy == FailurePolicy::FirstFailure || failures.len() == 1 {
        return Err(failures.swap_remove(0));
    }
    Err(DispatchError::Aggregate(failures))
}
