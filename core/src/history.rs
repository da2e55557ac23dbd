//! Bounded rolling history of repeated measurements.
//!
//! Owned by whichever caller polls the device; the extraction engine never
//! touches it.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Fixed-capacity FIFO that evicts the oldest sample once full.
///
/// # Examples
///
/// ```
/// use dumpscope_core::RollingHistory;
///
/// let mut history = RollingHistory::new(3);
/// for sample in [1.0, 2.0, 3.0, 4.0] {
///     history.push(sample);
/// }
/// assert_eq!(history.len(), 3);
/// assert_eq!(history.min(), Some(2.0));
/// assert_eq!(history.average(), Some(3.0));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredHistory<T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct RollingHistory<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

/// Serialized form; rebuilt through [`RollingHistory::new`] so a stored
/// capacity of zero or an overfull buffer cannot bypass eviction.
#[derive(Deserialize)]
struct StoredHistory<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> From<StoredHistory<T>> for RollingHistory<T> {
    fn from(stored: StoredHistory<T>) -> Self {
        let mut history = Self::new(stored.capacity);
        for value in stored.buf {
            history.push(value);
        }
        history
    }
}

impl<T> RollingHistory<T> {
    /// Creates an empty history. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest when at capacity.
    pub fn push(&mut self, value: T) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.buf.front()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl RollingHistory<f64> {
    pub fn min(&self) -> Option<f64> {
        self.buf.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.buf.iter().copied().reduce(f64::max)
    }

    pub fn average(&self) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.iter().sum::<f64>() / self.buf.len() as f64)
    }
}
