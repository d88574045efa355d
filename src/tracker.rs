//! Resource bookkeeping with guaranteed teardown.
//!
//! Every page-level side effect an instance establishes is either an interval
//! registered here or a deinitializer that reverses it. `run_teardown` runs
//! each of them exactly once no matter how often it is called.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Zero-argument teardown action
pub type Deinitializer = Box<dyn FnOnce() + Send>;

/// Identifier of a tracked interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalId(u64);

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a single `run_teardown` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    pub deinitializers_run: usize,
    pub intervals_cleared: usize,
    pub quit_listeners_notified: usize,
}

impl TeardownSummary {
    pub fn is_empty(&self) -> bool {
        *self == TeardownSummary::default()
    }
}

#[derive(Default)]
struct TrackerState {
    next_interval: u64,
    intervals: HashMap<IntervalId, JoinHandle<()>>,
    deinitializers: Vec<Deinitializer>,
    quit_listeners: Vec<oneshot::Sender<()>>,
    on_quit: Option<Deinitializer>,
    torn_down: bool,
}

/// Owner of an instance's intervals and deinitializers.
#[derive(Default)]
pub struct ResourceTracker {
    state: Mutex<TrackerState>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that calls `on_quit` once, after the first teardown.
    pub fn with_on_quit(on_quit: impl FnOnce() + Send + 'static) -> Self {
        let tracker = Self::new();
        tracker.lock().on_quit = Some(Box::new(on_quit));
        tracker
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Callbacks never run under this lock
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a repeating timer. The first call happens one period from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register_interval<F>(&self, mut callback: F, period: Duration) -> IntervalId
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));

        let mut state = self.lock();
        state.next_interval += 1;
        let id = IntervalId(state.next_interval);
        if state.torn_down {
            debug!("Not starting interval {}: already torn down", id);
            return id;
        }

        // Spawning never runs the callback inline
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                callback();
            }
        });
        state.intervals.insert(id, task);
        debug!("Registered interval {} every {:?}", id, period);
        id
    }

    /// Cancel a tracked interval. Unknown ids are ignored.
    pub fn clear_interval(&self, id: IntervalId) {
        let task = self.lock().intervals.remove(&id);
        match task {
            Some(task) => {
                task.abort();
                debug!("Cleared interval {}", id);
            }
            None => debug!("clear_interval: unknown interval {}", id),
        }
    }

    pub fn active_intervals(&self) -> usize {
        self.lock().intervals.len()
    }

    /// Append a teardown action; actions run in registration order.
    ///
    /// After teardown the action runs immediately.
    pub fn register_deinitializer(&self, action: impl FnOnce() + Send + 'static) {
        let mut state = self.lock();
        if state.torn_down {
            drop(state);
            debug!("Running late deinitializer immediately");
            action();
        } else {
            state.deinitializers.push(Box::new(action));
        }
    }

    pub fn pending_deinitializers(&self) -> usize {
        self.lock().deinitializers.len()
    }

    /// Wait for teardown. Fires immediately if teardown already happened.
    pub fn add_quit_listener(&self, listener: oneshot::Sender<()>) {
        let mut state = self.lock();
        if state.torn_down {
            drop(state);
            let _ = listener.send(());
        } else {
            state.quit_listeners.push(listener);
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    /// Reverse every side effect registered so far.
    ///
    /// Deinitializers run first in insertion order, then remaining intervals
    /// are cancelled, then quit listeners and the `on_quit` callback fire.
    /// Safe to call repeatedly and from inside any callback the tracker owns.
    pub fn run_teardown(&self) -> TeardownSummary {
        let (deinitializers, intervals, listeners, on_quit) = {
            let mut state = self.lock();
            state.torn_down = true;
            (
                std::mem::take(&mut state.deinitializers),
                std::mem::take(&mut state.intervals),
                std::mem::take(&mut state.quit_listeners),
                state.on_quit.take(),
            )
        };

        let mut summary = TeardownSummary::default();

        for deinitializer in deinitializers {
            deinitializer();
            summary.deinitializers_run += 1;
        }

        for (id, task) in intervals {
            task.abort();
            debug!("Cleared interval {} during teardown", id);
            summary.intervals_cleared += 1;
        }

        for listener in listeners {
            if listener.send(()).is_err() {
                warn!("Quit listener went away before teardown finished");
            }
            summary.quit_listeners_notified += 1;
        }

        if let Some(on_quit) = on_quit {
            on_quit();
        }

        if !summary.is_empty() {
            debug!(
                "Teardown: {} deinitializers, {} intervals, {} quit listeners",
                summary.deinitializers_run, summary.intervals_cleared, summary.quit_listeners_notified
            );
        }
        summary
    }
}
