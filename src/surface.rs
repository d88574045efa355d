//! Render surface abstraction and fullscreen layout preservation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

/// Callback notified with `true` on entering fullscreen and `false` on leaving
pub type FullscreenWatcher = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle for a registered fullscreen watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Inline CSS size of the surface. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineSize {
    pub width: String,
    pub height: String,
}

impl InlineSize {
    pub fn new(width: impl Into<String>, height: impl Into<String>) -> Self {
        Self {
            width: width.into(),
            height: height.into(),
        }
    }

    fn full() -> Self {
        Self::new("100%", "100%")
    }
}

/// The canvas the player renders into.
pub trait RenderSurface: Send + Sync {
    /// Start cancelling the default action of a DOM event on the surface.
    fn suppress_event(&self, event: &str);
    /// Undo one previous `suppress_event`. The event stays suppressed while
    /// other callers still suppress it.
    fn restore_event(&self, event: &str);
    fn inline_size(&self) -> InlineSize;
    fn set_inline_size(&self, size: InlineSize);
    fn watch_fullscreen(&self, watcher: FullscreenWatcher) -> WatchId;
    fn unwatch_fullscreen(&self, id: WatchId);
}

/// Keeps the surface's inline size intact across fullscreen transitions.
///
/// On entering fullscreen an explicitly sized surface is stretched to 100%;
/// on leaving, the saved size is put back.
#[derive(Debug, Default)]
pub struct FullscreenSizeKeeper {
    saved: Mutex<Option<InlineSize>>,
}

impl FullscreenSizeKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_fullscreen_change(&self, surface: &dyn RenderSurface, fullscreen: bool) {
        // The surface is only touched once `saved` is unlocked
        if fullscreen {
            let current = surface.inline_size();
            if current.width.is_empty() {
                return;
            }
            debug!("Entering fullscreen, saving inline size {:?}", current);
            *self.lock() = Some(current);
            surface.set_inline_size(InlineSize::full());
        } else {
            let previous = self.lock().take();
            if let Some(previous) = previous {
                debug!("Leaving fullscreen, restoring inline size {:?}", previous);
                surface.set_inline_size(previous);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<InlineSize>> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn saved(&self) -> Option<InlineSize> {
        self.lock().clone()
    }
}

#[derive(Default)]
struct MemorySurfaceState {
    /// Event name to number of active suppressions
    suppressed: BTreeMap<String, usize>,
    size: InlineSize,
    next_watch: u64,
    watchers: HashMap<WatchId, FullscreenWatcher>,
}

/// In-memory surface for headless hosts and tests.
#[derive(Default)]
pub struct MemorySurface {
    state: Mutex<MemorySurfaceState>,
}

impl MemorySurface {
    pub fn new(size: InlineSize) -> Self {
        let surface = Self::default();
        surface.lock().size = size;
        surface
    }

    fn lock(&self) -> MutexGuard<'_, MemorySurfaceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn suppressed_events(&self) -> Vec<String> {
        self.lock().suppressed.keys().cloned().collect()
    }

    pub fn watcher_count(&self) -> usize {
        self.lock().watchers.len()
    }

    /// Simulate the browser entering or leaving fullscreen.
    pub fn set_fullscreen_state(&self, fullscreen: bool) {
        let watchers: Vec<_> = self.lock().watchers.values().cloned().collect();
        for watcher in watchers {
            watcher(fullscreen);
        }
    }
}

impl RenderSurface for MemorySurface {
    fn suppress_event(&self, event: &str) {
        *self.lock().suppressed.entry(event.to_string()).or_insert(0) += 1;
    }

    fn restore_event(&self, event: &str) {
        let mut state = self.lock();
        match state.suppressed.get_mut(event) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.suppressed.remove(event);
            }
            None => debug!("restore_event: {} was not suppressed", event),
        }
    }

    fn inline_size(&self) -> InlineSize {
        self.lock().size.clone()
    }

    fn set_inline_size(&self, size: InlineSize) {
        self.lock().size = size;
    }

    fn watch_fullscreen(&self, watcher: FullscreenWatcher) -> WatchId {
        let mut state = self.lock();
        state.next_watch += 1;
        let id = WatchId(state.next_watch);
        state.watchers.insert(id, watcher);
        id
    }

    fn unwatch_fullscreen(&self, id: WatchId) {
        self.lock().watchers.remove(&id);
    }
}
