//! Fan-out of one operation across every shard.
//!
//! Every per-shard operation is issued in ascending shard order and all of
//! them run to completion before the outcome is decided. A failure on one
//! shard never cancels the others, so side effects of successful shards are
//! always applied even when the fan-out as a whole fails.

use crate::core::{BoxError, Result, ShardError, ShardIndex};
use futures::FutureExt;
use futures::future::join_all;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;

/// Runs `op(shard)` for every shard concurrently on the current task.
///
/// Results are index-aligned with the shard index.
pub async fn for_all_shards<T, E, F, Fut>(shard_count: u32, op: F) -> Result<Vec<T>>
where
    F: FnMut(ShardIndex) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxError>,
{
    let pending: Vec<Fut> = (0..shard_count).map(op).collect();
    collect_settled(join_all(pending).await)
}

/// Same as [`for_all_shards`], passing `args` to every invocation.
pub async fn for_all_shards_with<'a, A, T, E, F, Fut>(
    shard_count: u32,
    args: &'a A,
    mut op: F,
) -> Result<Vec<T>>
where
    A: ?Sized,
    F: FnMut(ShardIndex, &'a A) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxError>,
{
    let pending: Vec<Fut> = (0..shard_count).map(|shard| op(shard, args)).collect();
    collect_settled(join_all(pending).await)
}

/// Runs `op(shard)` for every shard as separate tokio tasks.
///
/// Tasks may run in parallel on a multi-threaded runtime. A panicking task
/// counts as a failure of its shard.
pub async fn spawn_for_all_shards<T, E, F, Fut>(shard_count: u32, mut op: F) -> Result<Vec<T>>
where
    F: FnMut(ShardIndex) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for shard in 0..shard_count {
        let fut = AssertUnwindSafe(op(shard)).catch_unwind();
        tasks.spawn(async move {
            let outcome: std::result::Result<T, BoxError> = match fut.await {
                Ok(outcome) => outcome.map_err(Into::into),
                Err(panic) => Err(panic_message(shard, panic.as_ref()).into()),
            };
            (shard, outcome)
        });
    }

    let mut settled: Vec<Option<std::result::Result<T, BoxError>>> =
        (0..shard_count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (shard, outcome) = joined.map_err(|err| ShardError::FanOutFailure {
            shard: 0,
            failed_shards: Vec::new(),
            source: Box::new(err),
        })?;
        settled[shard as usize] = Some(outcome);
    }

    collect_settled(settled.into_iter().enumerate().map(|(shard, outcome)| {
        outcome.unwrap_or_else(|| Err(format!("task for shard {} never settled", shard).into()))
    }))
}

fn panic_message(shard: ShardIndex, panic: &(dyn Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("operation on shard {} panicked: {}", shard, detail)
}

/// Turns settled per-shard outcomes into the aggregate result.
///
/// The lowest failing shard is reported; all failing shards are listed.
fn collect_settled<T, E>(
    settled: impl IntoIterator<Item = std::result::Result<T, E>>,
) -> Result<Vec<T>>
where
    E: Into<BoxError>,
{
    let mut results = Vec::new();
    let mut failed_shards = Vec::new();
    let mut first_failure: Option<(ShardIndex, BoxError)> = None;

    for (shard, outcome) in settled.into_iter().enumerate() {
        let shard = shard as ShardIndex;
        match outcome {
            Ok(value) => results.push(value),
            Err(err) => {
                failed_shards.push(shard);
                if first_failure.is_none() {
                    first_failure = Some((shard, err.into()));
                }
            }
        }
    }

    match first_failure {
        None => Ok(results),
        Some((shard, source)) => Err(ShardError::FanOutFailure {
            shard,
            failed_shards,
            source,
        }),
    }
}
