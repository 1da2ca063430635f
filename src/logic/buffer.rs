//! Bounded Event Log
//!
//! Fixed-capacity ring buffer: pushing past capacity evicts the oldest entry.

use std::collections::VecDeque;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Append, evicting from the front when full
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Last `limit` entries, oldest first
    pub fn tail(&self, limit: usize) -> Vec<T> {
        let start = self.items.len().saturating_sub(limit);
        self.items.iter().skip(start).cloned().collect()
    }

    /// Last `limit` entries matching `pred`, oldest first
    pub fn tail_filtered<F>(&self, limit: usize, pred: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut out: Vec<T> =
            self.items.iter().rev().filter(|i| pred(i)).take(limit).cloned().collect();
        out.reverse();
        out
    }
}

impl<T: Serialize> Serialize for BoundedLog<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut log = BoundedLog::new(3);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.tail(10), vec![2, 3, 4]);
        assert_eq!(log.last(), Some(&4));
    }

    #[test]
    fn test_tail_limits() {
        let mut log = BoundedLog::new(10);
        for i in 0..6 {
            log.push(i);
        }
        assert_eq!(log.tail(2), vec![4, 5]);
        assert_eq!(log.tail(0), Vec::<i32>::new());
        assert_eq!(log.tail_filtered(2, |v| v % 2 == 0), vec![2, 4]);
    }

    #[test]
    fn test_serializes_as_array() {
        let mut log = BoundedLog::new(2);
        log.push("a");
        log.push("b");
        assert_eq!(serde_json::to_string(&log).unwrap(), r#"["a","b"]"#);
    }
}
