//! Undo/redo over whole-chapter snapshots of the active work.
//!
//! Content edits (keystrokes) are debounced so a burst of typing becomes one
//! entry; structural edits (adding or removing a chapter) are recorded at
//! once. The stack is session-only and rebuilt whenever the active work
//! changes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use crate::models::Chapter;
use crate::services::scheduler::{Debounce, Pending};

pub const HISTORY_CAPACITY: usize = 50;
pub const CONTENT_DEBOUNCE: Duration = Duration::from_millis(800);

pub type HistoryEntry = Vec<Chapter>;

#[derive(Debug, Default)]
struct HistoryStack {
    entries: Vec<HistoryEntry>,
    index: usize,
    /// Latest content snapshot waiting for the debounce window to close.
    pending: Pending<HistoryEntry>,
}

impl HistoryStack {
    fn push(&mut self, entry: HistoryEntry) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(entry);
        if self.entries.len() > HISTORY_CAPACITY {
            // The cursor stays put on eviction. Pushes only overflow when the
            // cursor was at the tail, so it ends up on the new tail.
            self.entries.remove(0);
        } else {
            self.index = self.entries.len() - 1;
        }
        debug!(len = self.entries.len(), index = self.index, "history push");
    }

    fn flush_pending(&mut self) {
        if let Some(entry) = self.pending.take() {
            self.push(entry);
        }
    }

    fn flush_if_current(&mut self, generation: u64) {
        if let Some(entry) = self.pending.take_if_current(generation) {
            self.push(entry);
        }
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    stack: Arc<Mutex<HistoryStack>>,
    debounce: Debounce,
    window: Duration,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::with_window(CONTENT_DEBOUNCE)
    }

    pub fn with_window(window: Duration) -> Self {
        HistoryManager {
            stack: Arc::new(Mutex::new(HistoryStack::default())),
            debounce: Debounce::new(),
            window,
        }
    }

    fn stack(&self) -> MutexGuard<'_, HistoryStack> {
        self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records a text or title edit once the quiet window has passed.
    pub fn record_change(&mut self, chapters: &[Chapter]) {
        let generation = self.stack().pending.set(chapters.to_vec());

        let stack = Arc::clone(&self.stack);
        self.debounce.trigger(self.window, move || {
            stack
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .flush_if_current(generation);
        });
    }

    /// Records a chapter addition or removal immediately.
    pub fn record_structural_change(&mut self, chapters: &[Chapter]) {
        self.debounce.cancel();
        let mut stack = self.stack();
        stack.pending.take();
        stack.push(chapters.to_vec());
    }

    pub fn undo(&mut self) -> Option<HistoryEntry> {
        self.debounce.cancel();
        let mut stack = self.stack();
        stack.flush_pending();
        if stack.index == 0 {
            return None;
        }
        stack.index -= 1;
        debug!(index = stack.index, "undo");
        stack.entries.get(stack.index).cloned()
    }

    pub fn redo(&mut self) -> Option<HistoryEntry> {
        self.debounce.cancel();
        let mut stack = self.stack();
        stack.flush_pending();
        if stack.index + 1 >= stack.entries.len() {
            return None;
        }
        stack.index += 1;
        debug!(index = stack.index, "redo");
        stack.entries.get(stack.index).cloned()
    }

    /// Starts a fresh history seeded with `initial` as entry 0.
    pub fn reset(&mut self, initial: &[Chapter]) {
        self.debounce.cancel();
        let mut stack = self.stack();
        stack.pending.take();
        stack.entries = vec![initial.to_vec()];
        stack.index = 0;
    }

    pub fn clear(&mut self) {
        self.debounce.cancel();
        let mut stack = self.stack();
        stack.pending.take();
        stack.entries.clear();
        stack.index = 0;
    }

    pub fn len(&self) -> usize {
        self.stack().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self) -> usize {
        self.stack().index
    }

    pub fn entry(&self, index: usize) -> Option<HistoryEntry> {
        self.stack().entries.get(index).cloned()
    }

    pub fn can_undo(&self) -> bool {
        let stack = self.stack();
        stack.index > 0 || (stack.pending.is_some() && !stack.entries.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        let stack = self.stack();
        !stack.pending.is_some() && stack.index + 1 < stack.entries.len()
    }

    pub fn has_pending(&self) -> bool {
        self.stack().pending.is_some()
    }
}
