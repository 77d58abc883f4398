use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::channel::oneshot;
use tracing::warn;

/// Shortest delay the timer fallback uses to emulate an immediate yield.
pub const MIN_TIMER_DELAY: Duration = Duration::from_millis(1);

/// A host-specific way to cede control to the executor.
///
/// Implementations are probed in preference order by
/// [`Scheduler::probe`](super::Scheduler::probe); the first one reporting
/// itself available is used for the rest of the process.
#[async_trait]
pub trait YieldStrategy: Send + Sync + fmt::Debug {
    /// Short identifier used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Whether this strategy can run in the current environment.
    fn is_available(&self) -> bool;

    /// Resolve as soon as possible, but only after ceding control at least once.
    async fn yield_now(&self);

    /// Resolve no earlier than `duration` from now.
    async fn delay(&self, duration: Duration);
}

// ── tokio ────────────────────────────────────────────────────

/// Next-tick yielding through the tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioStrategy;

#[async_trait]
impl YieldStrategy for TokioStrategy {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn is_available(&self) -> bool {
        tokio::runtime::Handle::try_current().is_ok()
    }

    async fn yield_now(&self) {
        tokio::task::yield_now().await;
    }

    async fn delay(&self, duration: Duration) {
        // tokio timers panic outside a runtime.
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::time::sleep(duration).await;
        } else {
            thread_timer(duration).await;
        }
    }
}

// ── waker ────────────────────────────────────────────────────

/// Executor-agnostic yielding: the future wakes itself and returns
/// `Pending` once, which re-queues the task behind everything already
/// scheduled.
#[derive(Debug, Default, Clone, Copy)]
pub struct WakerStrategy;

#[async_trait]
impl YieldStrategy for WakerStrategy {
    fn name(&self) -> &'static str {
        "waker"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn yield_now(&self) {
        YieldOnce::default().await;
    }

    async fn delay(&self, duration: Duration) {
        thread_timer(duration).await;
    }
}

// ── timer ────────────────────────────────────────────────────

/// Last resort: every yield is a minimal timer delay. Inside a tokio
/// runtime the delay runs on the runtime's clock, outside on a helper thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimerStrategy;

#[async_trait]
impl YieldStrategy for TimerStrategy {
    fn name(&self) -> &'static str {
        "timer"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn yield_now(&self) {
        thread_timer(MIN_TIMER_DELAY).await;
    }

    async fn delay(&self, duration: Duration) {
        thread_timer(duration).await;
    }
}

// ── helpers ──────────────────────────────────────────────────

/// Returns `Pending` exactly once after scheduling its own wake-up.
#[derive(Debug, Default)]
pub(crate) struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Sleep on the tokio clock when a runtime is current, otherwise on a
/// helper thread that completes a oneshot channel.
async fn thread_timer(duration: Duration) {
    if duration.is_zero() {
        YieldOnce::default().await;
        return;
    }
    if tokio::runtime::Handle::try_current().is_ok() {
        tokio::time::sleep(duration).await;
        return;
    }

    let deadline = Instant::now() + duration;
    let (tx, rx) = oneshot::channel::<()>();
    let spawned = std::thread::Builder::new()
        .name("stepwise-timer".to_string())
        .spawn(move || {
            std::thread::sleep(duration);
            let _ = tx.send(());
        });

    match spawned {
        Ok(_) => {
            // A dropped sender can only mean the timer thread died early;
            // either way the wait is over.
            let _ = rx.await;
        }
        Err(e) => {
            warn!(error = %e, "failed to spawn timer thread, yielding until deadline");
            yield_until(deadline).await;
        }
    }
}

/// Keep re-queueing behind other work until `deadline` passes.
async fn yield_until(deadline: Instant) {
    while Instant::now() < deadline {
        YieldOnce::default().await;
    }
}
