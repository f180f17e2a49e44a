//! Re-armable liveness deadline.
//!
//! A timer thread waits on a condvar until the armed deadline passes, then
//! notifies the observer once. Arming again cancels the pending deadline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;

/// Receives the watchdog fire event on the timer thread.
pub trait LivenessObserver: Send + Sync {
    fn on_liveness_timeout(&self);
}

impl<F> LivenessObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_liveness_timeout(&self) {
        self()
    }
}

struct TimerState {
    deadline: Option<Instant>,
    duration: Duration,
    shutdown: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
    fired: AtomicUsize,
    observer: Option<Arc<dyn LivenessObserver>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Advisory deadline timer.
pub struct Watchdog {
    shared: Arc<Shared>,
    timer: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Create an idle watchdog whose [`feed`](Self::feed) re-arms with
    /// `duration`.
    pub fn new(duration: Duration, observer: Option<Arc<dyn LivenessObserver>>) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState {
                deadline: None,
                duration,
                shutdown: false,
            }),
            wake: Condvar::new(),
            fired: AtomicUsize::new(0),
            observer,
        });
        let timer_shared = Arc::clone(&shared);
        let timer = std::thread::Builder::new()
            .name("dashcan-watchdog".to_string())
            .spawn(move || timer_loop(timer_shared))?;
        Ok(Self {
            shared,
            timer: Some(timer),
        })
    }

    /// Cancel any pending deadline and fire `timeout` from now.
    pub fn arm(&self, timeout: Duration) {
        self.shared.lock().deadline = Some(Instant::now() + timeout);
        self.shared.wake.notify_one();
    }

    /// Cancel the pending deadline without firing.
    pub fn disarm(&self) {
        self.shared.lock().deadline = None;
        self.shared.wake.notify_one();
    }

    /// Re-arm with the stored duration, replacing it first if `timeout` is
    /// non-zero.
    pub fn feed(&self, timeout: Duration) {
        let duration = {
            let mut state = self.shared.lock();
            if !timeout.is_zero() {
                state.duration = timeout;
            }
            state.duration
        };
        self.disarm();
        self.arm(duration);
    }

    pub fn is_armed(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    /// The duration [`feed`](Self::feed) re-arms with.
    pub fn duration(&self) -> Duration {
        self.shared.lock().duration
    }

    /// Number of times the deadline has passed.
    pub fn fired_count(&self) -> usize {
        self.shared.fired.load(Ordering::Acquire)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(timer) = self.timer.take() {
            if timer.thread().id() == std::thread::current().id() {
                return;
            }
            if timer.join().is_err() {
                warn!("watchdog thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Watchdog")
            .field("armed", &state.deadline.is_some())
            .field("duration", &state.duration)
            .field("fired", &self.shared.fired.load(Ordering::Relaxed))
            .finish()
    }
}

fn timer_loop(shared: Arc<Shared>) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }
        let deadline = state.deadline;
        state = match deadline {
            None => shared
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner),
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                } else {
                    state.deadline = None;
                    drop(state);
                    fire(&shared);
                    shared.lock()
                }
            }
        };
    }
}

fn fire(shared: &Shared) {
    shared.fired.fetch_add(1, Ordering::AcqRel);
    match &shared.observer {
        Some(observer) => {
            debug!("watchdog deadline passed");
            observer.on_liveness_timeout();
        }
        None => debug!("watchdog deadline passed with no observer, dropped"),
    }
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;

    use super::*;

    fn counting() -> (Arc<AtomicUsize>, Arc<dyn LivenessObserver>) {
        let count = Arc::new(AtomicUsize::new(0));
        let observer: Arc<dyn LivenessObserver> = {
            let count = Arc::clone(&count);
            Arc::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        (count, observer)
    }

    #[test]
    fn unfed_watchdog_fires_exactly_once() {
        let (count, observer) = counting();
        let watchdog = Watchdog::new(Duration::from_millis(100), Some(observer)).unwrap();
        watchdog.arm(Duration::from_millis(100));

        sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(240));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!watchdog.is_armed());
        assert_eq!(watchdog.fired_count(), 1);
    }

    #[test]
    fn feed_pushes_deadline_back() {
        let (count, observer) = counting();
        let watchdog = Watchdog::new(Duration::from_millis(100), Some(observer)).unwrap();
        watchdog.arm(Duration::from_millis(100));

        sleep(Duration::from_millis(50));
        watchdog.feed(Duration::ZERO);

        // 130 ms after arming, 80 ms after the feed.
        sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn feed_with_timeout_replaces_duration() {
        let watchdog = Watchdog::new(Duration::from_secs(10), None).unwrap();
        watchdog.feed(Duration::from_millis(40));
        assert_eq!(watchdog.duration(), Duration::from_millis(40));
        assert!(watchdog.is_armed());

        sleep(Duration::from_millis(200));
        // No observer: the fire is counted and dropped.
        assert_eq!(watchdog.fired_count(), 1);
    }

    #[test]
    fn disarm_cancels_pending_fire() {
        let (count, observer) = counting();
        let watchdog = Watchdog::new(Duration::from_millis(50), Some(observer)).unwrap();
        watchdog.feed(Duration::ZERO);
        watchdog.disarm();
        assert!(!watchdog.is_armed());

        sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rearm_cancels_previous_deadline() {
        let (count, observer) = counting();
        let watchdog = Watchdog::new(Duration::from_secs(1), Some(observer)).unwrap();
        watchdog.arm(Duration::from_millis(50));
        watchdog.arm(Duration::from_secs(5));

        sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(watchdog.is_armed());
    }

    #[test]
    fn drop_stops_timer_thread() {
        let (count, observer) = counting();
        let watchdog = Watchdog::new(Duration::from_millis(30), Some(observer)).unwrap();
        watchdog.feed(Duration::ZERO);
        drop(watchdog);

        sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
