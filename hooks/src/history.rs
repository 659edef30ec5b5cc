//! Bounded history and trend math shared by the hooks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Fixed-capacity sequence that evicts from the opposite end on overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// Creates an empty history holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends to the back, evicting the oldest item at the front.
    /// Returns the evicted item.
    pub fn push_back(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Prepends to the front, evicting the oldest item at the back.
    /// Returns the evicted item.
    pub fn push_front(&mut self, item: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_back()
        } else {
            None
        };
        self.items.push_front(item);
        evicted
    }

    /// Returns the maximum number of items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the front item.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Returns the back item.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Returns the two items nearest the back, older first.
    #[must_use]
    pub fn last_two(&self) -> Option<(&T, &T)> {
        let len = self.items.len();
        if len < 2 {
            return None;
        }
        Some((self.items.get(len - 2)?, self.items.get(len - 1)?))
    }

    /// Iterates front to back.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    /// Iterates front to back, mutably.
    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Copies the items front to back.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// Direction of change between two samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Increased.
    Up,
    /// Decreased.
    Down,
    /// Unchanged, or no usable baseline.
    Stable,
}

/// Change between the two most recent retained values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    /// Direction of change.
    pub direction: TrendDirection,
    /// Relative change in percent of the previous value.
    pub change_percent: f64,
    /// Absolute change.
    pub change_absolute: f64,
}

impl Trend {
    /// Computes the trend from `previous` to `current`.
    ///
    /// A previous value of zero has no relative baseline: the result is
    /// `Stable` with 0 % (the absolute change is still reported).
    #[must_use]
    pub fn between(previous: f64, current: f64) -> Self {
        let change_absolute = current - previous;

        if previous == 0.0 {
            return Self {
                direction: TrendDirection::Stable,
                change_percent: 0.0,
                change_absolute,
            };
        }

        let direction = if change_absolute > 0.0 {
            TrendDirection::Up
        } else if change_absolute < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        };

        Self {
            direction,
            change_percent: change_absolute / previous.abs() * 100.0,
            change_absolute,
        }
    }
}
