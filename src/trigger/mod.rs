//! Pause-driven batch trigger
//!
//! Counts strokes added since the last batch was sent and, once the pen has
//! been idle past the configured interval, fires a callback so the caller can
//! ship the batch for feedback. Polling runs on a Tokio interval task.

use crate::error::{InkpauseError, Result};
use std::sync::{Arc, LockResult, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Trigger timing, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTriggerConfig {
    interval: Duration,
    check_interval: Duration,
}

impl BatchTriggerConfig {
    /// A zero `check_interval` is raised to one millisecond
    pub fn new(interval: Duration, check_interval: Duration) -> Self {
        Self {
            interval,
            check_interval: check_interval.max(Duration::from_millis(1)),
        }
    }

    /// Minimum quiet time since the last sent batch before firing
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How often the fire rule is evaluated
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }
}

impl Default for BatchTriggerConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_millis(500))
    }
}

#[derive(Debug)]
struct TriggerState {
    pending_strokes: u32,
    last_sent: Instant,
    last_fired: Option<Instant>,
}

impl TriggerState {
    fn new(now: Instant) -> Self {
        Self {
            pending_strokes: 0,
            last_sent: now,
            last_fired: None,
        }
    }

    /// Apply the fire rule at `now`, recording the fire if it happens
    fn should_fire(&mut self, now: Instant, interval: Duration) -> bool {
        if self.pending_strokes == 0 {
            return false;
        }
        if now.saturating_duration_since(self.last_sent) < interval {
            return false;
        }
        // Unacknowledged batches fire again only after another full interval
        if let Some(fired) = self.last_fired {
            if now.saturating_duration_since(fired) < interval {
                return false;
            }
        }

        self.last_fired = Some(now);
        true
    }
}

type FireCallback = Arc<dyn Fn() + Send + Sync>;

/// Fires a callback when strokes are pending and the interval has elapsed
pub struct BatchTrigger {
    config: BatchTriggerConfig,
    state: Arc<Mutex<TriggerState>>,
    on_fire: FireCallback,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchTrigger {
    pub fn new<F>(config: BatchTriggerConfig, on_fire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            config,
            state: Arc::new(Mutex::new(TriggerState::new(Instant::now()))),
            on_fire: Arc::new(on_fire),
            ticker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> BatchTriggerConfig {
        self.config
    }

    /// Begin polling. Starting an active trigger does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut ticker = recover(self.ticker.lock());
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("Batch trigger already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            InkpauseError::Trigger(format!("Batch trigger needs a Tokio runtime: {}", e))
        })?;

        let state = Arc::clone(&self.state);
        let on_fire = Arc::clone(&self.on_fire);
        let config = self.config;

        *ticker = Some(runtime.spawn(async move {
            let mut interval = time::interval_at(
                Instant::now() + config.check_interval,
                config.check_interval,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let now = interval.tick().await;
                if poll(&state, &on_fire, now, config.interval) {
                    tracing::debug!("Batch trigger fired");
                }
            }
        }));

        tracing::debug!(
            "Batch trigger started (interval {:?}, checking every {:?})",
            self.config.interval,
            self.config.check_interval
        );
        Ok(())
    }

    /// Halt polling. Counters are left as they are.
    pub fn stop(&self) {
        if let Some(handle) = recover(self.ticker.lock()).take() {
            handle.abort();
            tracing::debug!("Batch trigger stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        recover(self.ticker.lock())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn record_stroke_added(&self) {
        let mut state = recover(self.state.lock());
        state.pending_strokes = state.pending_strokes.saturating_add(1);
    }

    /// The pending batch went out: clear the count and restart the clock
    pub fn record_batch_sent(&self) {
        self.clear(Instant::now());
    }

    /// Clear counters without touching whether polling is active
    pub fn reset(&self) {
        self.clear(Instant::now());
    }

    pub fn pending_strokes(&self) -> u32 {
        recover(self.state.lock()).pending_strokes
    }

    /// Evaluate the fire rule at `now`, invoking the callback if it holds.
    ///
    /// The ticker calls this on every tick; it is public so callers driving
    /// their own clock can do the same.
    pub fn poll_at(&self, now: Instant) -> bool {
        poll(&self.state, &self.on_fire, now, self.config.interval)
    }

    fn clear(&self, now: Instant) {
        let mut state = recover(self.state.lock());
        *state = TriggerState::new(now);
    }
}

impl Drop for BatchTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll(
    state: &Mutex<TriggerState>,
    on_fire: &FireCallback,
    now: Instant,
    interval: Duration,
) -> bool {
    let fire = recover(state.lock()).should_fire(now, interval);
    // Callback runs outside the lock so it may call back into the trigger
    if fire {
        on_fire();
    }
    fire
}

fn recover<T>(result: LockResult<T>) -> T {
    match result {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_trigger() -> (BatchTrigger, Arc<AtomicUsize>) {
        let fires = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fires);
        let trigger = BatchTrigger::new(BatchTriggerConfig::default(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (trigger, fires)
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let (trigger, _) = counting_trigger();
        assert!(matches!(trigger.start(), Err(InkpauseError::Trigger(_))));
        assert!(!trigger.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_rule_without_ticker() {
        let (trigger, fires) = counting_trigger();
        let t0 = Instant::now();

        // Nothing pending: never fires
        assert!(!trigger.poll_at(t0 + Duration::from_secs(10)));

        trigger.record_stroke_added();
        assert!(!trigger.poll_at(t0 + Duration::from_millis(2999)));
        assert!(trigger.poll_at(t0 + Duration::from_secs(3)));
        // Not again until another interval has passed
        assert!(!trigger.poll_at(t0 + Duration::from_secs(5)));
        assert!(trigger.poll_at(t0 + Duration::from_secs(6)));
        assert_eq!(fires.load(Ordering::SeqCst), 2);
        // Firing does not reset the count
        assert_eq!(trigger.pending_strokes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_is_noop() {
        let (trigger, _) = counting_trigger();
        trigger.start().unwrap();
        trigger.start().unwrap();
        assert!(trigger.is_active());

        trigger.stop();
        tokio::task::yield_now().await;
        assert!(!trigger.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_keeps_active_state() {
        let (trigger, _) = counting_trigger();
        trigger.start().unwrap();
        trigger.record_stroke_added();
        trigger.record_stroke_added();

        trigger.reset();
        assert_eq!(trigger.pending_strokes(), 0);
        assert!(trigger.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_preserves_counters() {
        let (trigger, fires) = counting_trigger();
        trigger.start().unwrap();
        trigger.record_stroke_added();
        trigger.stop();

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fires.load(Ordering::SeqCst), 0);
        assert_eq!(trigger.pending_strokes(), 1);
    }
}
