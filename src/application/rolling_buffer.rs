// Fixed-capacity, insertion-ordered sample store for live charts
use std::collections::VecDeque;

/// A rolling history buffer: at most `capacity` items, insertion order is
/// time order, oldest entries evicted first.
///
/// Appends deduplicate against the timestamp key of the most recent append
/// only - the backend may re-deliver the current sample without new data, and
/// that must not produce a duplicate chart point. Earlier keys are not
/// re-checked.
#[derive(Debug)]
pub struct RollingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    last_key: Option<String>,
    paused: bool,
}

impl<T: Clone> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            last_key: None,
            paused: false,
        }
    }

    /// Append one projected point. No-op while paused or when `key` matches
    /// the previous append's key.
    pub fn append(&mut self, item: T, key: &str) {
        if self.paused {
            return;
        }
        if self.last_key.as_deref() == Some(key) {
            return;
        }
        self.items.push_back(item);
        self.last_key = Some(key.to_string());
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Empty the buffer and forget the dedupe key, so a previously seen
    /// timestamp can be appended again.
    pub fn clear(&mut self) {
        self.items.clear();
        self.last_key = None;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Read-only snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}
