//! Host-yield primitives for cooperative task execution.
//!
//! The best available [`YieldStrategy`] is picked once per process by
//! probing an ordered candidate list: tokio's next-tick yield, then a
//! self-waking future that works on any executor, then a minimal timer.
//! Call sites only ever see [`Scheduler`].

pub mod strategy;

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use stepwise_core::SchedulerChoice;
use tracing::debug;

pub use strategy::{TimerStrategy, TokioStrategy, WakerStrategy, YieldStrategy, MIN_TIMER_DELAY};

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// Handle to a yield strategy. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    strategy: Arc<dyn YieldStrategy>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl Scheduler {
    pub fn with_strategy(strategy: Arc<dyn YieldStrategy>) -> Self {
        Self { strategy }
    }

    /// Candidate strategies in order of preference.
    pub fn candidates() -> Vec<Arc<dyn YieldStrategy>> {
        vec![
            Arc::new(TokioStrategy),
            Arc::new(WakerStrategy),
            Arc::new(TimerStrategy),
        ]
    }

    /// Pick the first available candidate.
    pub fn probe() -> Self {
        let strategy = Self::candidates()
            .into_iter()
            .find(|s| s.is_available())
            .unwrap_or_else(|| Arc::new(TimerStrategy));
        debug!(strategy = strategy.name(), "scheduler strategy resolved");
        Self { strategy }
    }

    /// Build a scheduler for an explicit configuration choice.
    pub fn from_choice(choice: SchedulerChoice) -> Self {
        match choice {
            SchedulerChoice::Auto => Self::probe(),
            SchedulerChoice::Tokio => Self::with_strategy(Arc::new(TokioStrategy)),
            SchedulerChoice::Waker => Self::with_strategy(Arc::new(WakerStrategy)),
            SchedulerChoice::Timer => Self::with_strategy(Arc::new(TimerStrategy)),
        }
    }

    /// Process-wide scheduler, resolved on first use from `STEPWISE_SCHEDULER`
    /// (default: probe).
    pub fn global() -> &'static Scheduler {
        GLOBAL.get_or_init(|| {
            let choice = stepwise_core::Config::from_env().runtime.scheduler;
            Self::from_choice(choice)
        })
    }

    /// Install the process-wide scheduler before anything resolved it.
    /// Returns the rejected scheduler if one is already installed.
    pub fn install_global(scheduler: Scheduler) -> Result<(), Scheduler> {
        GLOBAL.set(scheduler)
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn yield_now(&self) {
        self.strategy.yield_now().await;
    }

    pub async fn delay(&self, duration: Duration) {
        self.strategy.delay(duration).await;
    }
}

/// Yield through the process-wide scheduler.
pub async fn yield_now() {
    Scheduler::global().yield_now().await;
}

/// Sleep through the process-wide scheduler.
pub async fn delay(duration: Duration) {
    Scheduler::global().delay(duration).await;
}
