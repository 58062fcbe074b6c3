//! Polling synchronizer
//!
//! A [`PollingSession`] re-runs a fetch on a fixed interval and publishes the
//! latest result through a `watch` channel. Ticks are serial: the next tick
//! is only scheduled once the previous fetch has resolved. A successful tick
//! replaces the held data wholesale; a failed tick records the error and
//! leaves the data untouched, and polling carries on.
//!
//! Stopping is synchronous. The state is marked closed under the channel's
//! lock and every write checks that flag under the same lock, so a fetch
//! that resolves after [`PollingSession::stop`] can never touch the state.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Smallest interval accepted by a session
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// State held for one polled feed
#[derive(Debug, Clone)]
pub struct FeedState<T> {
    /// Result of the latest successful tick
    pub data: Option<T>,
    /// Error of the latest tick, cleared by the next success
    pub last_error: Option<String>,
    /// Ticks that resolved while the session was open
    pub ticks: u64,
    /// Ticks that resolved with an error
    pub failures: u64,
    pub last_updated: Option<DateTime<Utc>>,
    /// Set once the session is stopped; no further writes happen
    pub closed: bool,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_error: None,
            ticks: 0,
            failures: 0,
            last_updated: None,
            closed: false,
        }
    }
}

impl<T> FeedState<T> {
    /// No tick has resolved yet
    pub fn is_loading(&self) -> bool {
        self.ticks == 0 && !self.closed
    }
}

/// Apply one resolved tick. Returns `false` when the session is closed.
fn apply_tick<T, E: Display>(
    state: &watch::Sender<FeedState<T>>,
    feed: &str,
    outcome: Result<T, E>,
) -> bool {
    let mut open = true;

    state.send_if_modified(|current| {
        if current.closed {
            open = false;
            return false;
        }

        current.ticks += 1;
        match outcome {
            Ok(data) => {
                current.data = Some(data);
                current.last_error = None;
                current.last_updated = Some(Utc::now());
                debug!(feed = feed, tick = current.ticks, "Feed refreshed");
            }
            Err(err) => {
                current.failures += 1;
                warn!(
                    feed = feed,
                    tick = current.ticks,
                    failures = current.failures,
                    error = %err,
                    "Poll failed, keeping previous data"
                );
                current.last_error = Some(err.to_string());
            }
        }
        true
    });

    if !open {
        debug!(feed = feed, "Discarding tick resolved after teardown");
    }
    open
}

/// One live polling loop for one feed
pub struct PollingSession<T> {
    feed: String,
    every: Duration,
    state: Arc<watch::Sender<FeedState<T>>>,
    task: JoinHandle<()>,
}

impl<T> PollingSession<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn the loop. `fetch` runs immediately, then every `every`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut, E>(feed: impl Into<String>, every: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let feed = feed.into();
        let every = every.max(MIN_INTERVAL);
        let (tx, _) = watch::channel(FeedState::default());
        let state = Arc::new(tx);

        let task_state = Arc::clone(&state);
        let task_feed = feed.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let outcome = fetch().await;
                if !apply_tick(&task_state, &task_feed, outcome) {
                    break;
                }
            }
        });

        info!(
            feed = %feed,
            interval_ms = every.as_millis() as u64,
            "Polling session started"
        );

        Self {
            feed,
            every,
            state,
            task,
        }
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.state.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> FeedState<T> {
        self.state.borrow().clone()
    }
}

impl<T> PollingSession<T> {
    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn interval(&self) -> Duration {
        self.every
    }

    pub fn is_active(&self) -> bool {
        !self.state.borrow().closed && !self.task.is_finished()
    }

    /// Tear the session down: no further ticks, late results are discarded
    pub fn stop(&self) {
        let was_open = self.state.send_if_modified(|current| {
            if current.closed {
                return false;
            }
            current.closed = true;
            true
        });
        self.task.abort();

        if was_open {
            info!(feed = %self.feed, "Polling session stopped");
        }
    }
}

impl<T> Drop for PollingSession<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Type-erased handle so one scope can own feeds of different types
trait Teardown: Send + Sync {
    fn stop(&self);
    fn is_active(&self) -> bool;
}

impl<T: Send + Sync> Teardown for PollingSession<T> {
    fn stop(&self) {
        PollingSession::stop(self);
    }

    fn is_active(&self) -> bool {
        PollingSession::is_active(self)
    }
}

/// Polling sessions owned by a single view.
///
/// Holds at most one session per feed name: starting a feed that is already
/// polled stops the previous session first. Dropping the scope stops them all.
pub struct PollingScope {
    name: String,
    sessions: HashMap<String, Box<dyn Teardown>>,
}

impl PollingScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sessions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start (or restart) polling `feed`, returning a receiver for its state
    pub fn start<T, F, Fut, E>(
        &mut self,
        feed: &str,
        every: Duration,
        fetch: F,
    ) -> watch::Receiver<FeedState<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if let Some(previous) = self.sessions.remove(feed) {
            debug!(scope = %self.name, feed = feed, "Replacing existing polling session");
            previous.stop();
        }

        let session = PollingSession::start(feed, every, fetch);
        let receiver = session.subscribe();
        self.sessions.insert(feed.to_string(), Box::new(session));
        receiver
    }

    /// Stop one feed; returns whether it was being polled
    pub fn stop_feed(&mut self, feed: &str) -> bool {
        match self.sessions.remove(feed) {
            Some(session) => {
                session.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self, feed: &str) -> bool {
        self.sessions
            .get(feed)
            .map(|s| s.is_active())
            .unwrap_or(false)
    }

    /// Names of feeds with a live session, sorted
    pub fn active_feeds(&self) -> Vec<String> {
        let mut feeds: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.is_active())
            .map(|(feed, _)| feed.clone())
            .collect();
        feeds.sort();
        feeds
    }

    /// Stop every session owned by this scope
    pub fn teardown(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        for (_, session) in self.sessions.drain() {
            session.stop();
        }
        info!(scope = %self.name, "Polling scope torn down");
    }
}

impl Drop for PollingScope {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};

    const TICK: Duration = Duration::from_millis(20);

    async fn wait_for<T: Clone>(
        rx: &mut watch::Receiver<FeedState<T>>,
        done: impl Fn(&FeedState<T>) -> bool,
    ) -> FeedState<T> {
        timeout(Duration::from_secs(5), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if done(&current) {
                        return current.clone();
                    }
                }
                rx.changed().await.expect("session dropped");
            }
        })
        .await
        .expect("timed out waiting for feed state")
    }

    #[tokio::test]
    async fn test_first_fetch_runs_immediately() {
        let session = PollingSession::start("sensors", Duration::from_secs(60), || async {
            Ok::<_, String>(42)
        });
        let mut rx = session.subscribe();

        // With a one-minute interval only the immediate tick can satisfy this
        let state = wait_for(&mut rx, |s| s.ticks >= 1).await;
        assert_eq!(state.data, Some(42));
        assert!(state.last_updated.is_some());
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_failed_tick_keeps_previous_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let session = PollingSession::start("history", TICK, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(vec!["A", "B"])
                } else {
                    Err("network blip".to_string())
                }
            }
        });
        let mut rx = session.subscribe();

        let state = wait_for(&mut rx, |s| s.failures >= 1).await;

        assert_eq!(state.data, Some(vec!["A", "B"]));
        assert_eq!(state.last_error.as_deref(), Some("network blip"));
        assert!(state.ticks >= 2);
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_polling_survives_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let session = PollingSession::start("history", TICK, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Ok(1),
                    1 | 2 => Err("timeout"),
                    _ => Ok(2),
                }
            }
        });
        let mut rx = session.subscribe();

        let state = wait_for(&mut rx, |s| s.data == Some(2)).await;
        assert_eq!(state.failures, 2);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_late_resolution_after_stop_is_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let counter = Arc::clone(&calls);
        let fetch_gate = Arc::clone(&gate);
        let session = PollingSession::start("sensors", TICK, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&fetch_gate);
            async move {
                if n > 0 {
                    gate.notified().await;
                }
                Ok::<_, String>(n)
            }
        });
        let mut rx = session.subscribe();
        wait_for(&mut rx, |s| s.data == Some(0)).await;

        // Second fetch is now parked on the gate
        timeout(Duration::from_secs(5), async {
            while calls.load(Ordering::SeqCst) < 2 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        session.stop();
        gate.notify_one();
        sleep(TICK * 5).await;

        let state = session.snapshot();
        assert!(state.closed);
        assert_eq!(state.data, Some(0));
        assert_eq!(state.ticks, 1);
        assert!(!session.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_apply_tick_after_close_is_noop() {
        let (tx, rx) = watch::channel(FeedState::default());

        assert!(apply_tick::<_, String>(&tx, "feed", Ok(vec![1, 2])));
        tx.send_modify(|s| s.closed = true);

        assert!(!apply_tick::<_, String>(&tx, "feed", Ok(vec![3])));
        assert!(!apply_tick::<Vec<i32>, _>(&tx, "feed", Err("late".to_string())));

        let state = rx.borrow();
        assert_eq!(state.data, Some(vec![1, 2]));
        assert_eq!(state.ticks, 1);
        assert_eq!(state.failures, 0);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_ticks_never_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let current = Arc::clone(&in_flight);
        let peak = Arc::clone(&max_in_flight);
        let session = PollingSession::start("slow", Duration::from_millis(5), move || {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(30)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            }
        });
        let mut rx = session.subscribe();

        wait_for(&mut rx, |s| s.ticks >= 4).await;
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_closes_session() {
        let session = PollingSession::start("sensors", TICK, || async { Ok::<_, String>(1) });
        let mut rx = session.subscribe();
        wait_for(&mut rx, |s| s.ticks >= 1).await;

        drop(session);

        assert!(rx.borrow().closed);
    }

    #[tokio::test]
    async fn test_scope_replaces_session_for_same_feed() {
        let mut scope = PollingScope::new("riwayat");

        let mut first = scope.start("monitoring/me", TICK, || async { Ok::<_, String>("old") });
        wait_for(&mut first, |s| s.ticks >= 1).await;

        let mut second = scope.start("monitoring/me", TICK, || async { Ok::<_, String>("new") });

        assert!(first.borrow().closed);
        assert_eq!(scope.active_feeds(), vec!["monitoring/me".to_string()]);

        let state = wait_for(&mut second, |s| s.ticks >= 1).await;
        assert_eq!(state.data, Some("new"));

        // The replaced session stays frozen
        let frozen = first.borrow().clone();
        sleep(TICK * 3).await;
        assert_eq!(first.borrow().ticks, frozen.ticks);
        assert_eq!(first.borrow().data, Some("old"));
    }

    #[tokio::test]
    async fn test_scope_teardown_stops_all_feeds() {
        let mut scope = PollingScope::new("monitoring");
        let sensors = scope.start("sensors/latest", TICK, || async { Ok::<_, String>(1.0) });
        let history = scope.start("monitoring/me", TICK, || async {
            Ok::<_, String>(vec![1, 2, 3])
        });

        assert!(scope.is_polling("sensors/latest"));
        assert_eq!(scope.active_feeds().len(), 2);

        assert!(scope.stop_feed("sensors/latest"));
        assert!(!scope.stop_feed("sensors/latest"));
        assert!(sensors.borrow().closed);
        assert!(!scope.is_polling("sensors/latest"));

        drop(scope);
        assert!(history.borrow().closed);
    }
}
