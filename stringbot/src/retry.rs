//! Flood wait handling for remote calls.

use std::future::Future;
use std::time::Duration;

use crate::BoxFuture;

/// Something that can wait, swapped out in tests to avoid real delays
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// How often a call may be repeated after the server asked to wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloodPolicy {
    /// `None` retries for as long as the server keeps asking
    pub max_retries: Option<u32>,
}

impl FloodPolicy {
    pub fn unbounded() -> FloodPolicy {
        FloodPolicy { max_retries: None }
    }

    pub fn bounded(max_retries: u32) -> FloodPolicy {
        FloodPolicy { max_retries: Some(max_retries) }
    }

    fn allows(&self, retries: u32) -> bool {
        self.max_retries.map(|max| retries < max).unwrap_or(true)
    }
}

/// Wait time from an RPC error name and value (`FLOOD_WAIT_X` is reported as `FLOOD_WAIT` with value X)
pub fn flood_wait(name: &str, value: Option<u32>) -> Option<Duration> {
    match name {
        "FLOOD_WAIT" | "FLOOD_PREMIUM_WAIT" => Some(Duration::from_secs(value.unwrap_or(1) as u64)),
        _ => None
    }
}

/// Run `call` until it succeeds, fails with something other than a flood wait,
/// or the policy runs out of retries. `wait_for` extracts the flood wait from an error.
pub async fn retry_on_flood<T, E, C, F, W>(
    sleeper: &dyn Sleeper,
    policy: FloodPolicy,
    wait_for: W,
    mut call: C,
) -> Result<T, E>
where
    C: FnMut() -> F,
    F: Future<Output = Result<T, E>>,
    W: Fn(&E) -> Option<Duration>,
{
    let mut retries = 0;
    loop {
        let error = match call().await {
            Ok(r) => return Ok(r),
            Err(e) => e,
        };
        let wait = match wait_for(&error) {
            Some(wait) if policy.allows(retries) => wait,
            _ => return Err(error),
        };
        retries += 1;
        warn!("Flood wait of {}s, retry #{retries}", wait.as_secs());
        sleeper.sleep(wait).await;
    }
}
