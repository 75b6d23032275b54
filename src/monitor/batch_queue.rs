//! Frame-budgeted batch queue
//!
//! Requests accumulate until either the size limit is reached or the oldest
//! pending request has waited one time budget, then drain as groups of the
//! same kind in first-seen order.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct BatchQueue<T> {
    pending: Vec<T>,
    /// When the oldest pending request arrived
    opened_at: Option<Instant>,
    max_size: usize,
    budget: Duration,
}

impl<T> BatchQueue<T> {
    pub fn new(max_size: usize, budget: Duration) -> Self {
        Self {
            pending: Vec::with_capacity(max_size),
            opened_at: None,
            max_size,
            budget,
        }
    }

    /// Queue a request. Returns true once the batch should be flushed.
    pub fn push(&mut self, item: T, now: Instant) -> bool {
        self.opened_at.get_or_insert(now);
        self.pending.push(item);
        self.is_due(now)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        if self.pending.len() >= self.max_size {
            return true;
        }
        self.opened_at
            .map_or(false, |opened| now.saturating_duration_since(opened) >= self.budget)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take everything in arrival order
    pub fn drain(&mut self) -> Vec<T> {
        self.opened_at = None;
        std::mem::take(&mut self.pending)
    }

    /// Take everything, coalesced by kind. Groups appear in the order their
    /// first member arrived; members keep arrival order.
    pub fn drain_grouped<K, F>(&mut self, kind_of: F) -> Vec<(K, Vec<T>)>
    where
        K: PartialEq,
        F: Fn(&T) -> K,
    {
        let mut groups: Vec<(K, Vec<T>)> = Vec::new();
        for item in self.drain() {
            let kind = kind_of(&item);
            match groups.iter_mut().find(|(existing, _)| *existing == kind) {
                Some((_, members)) => members.push(item),
                None => groups.push((kind, vec![item])),
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_due_on_size() {
        let now = Instant::now();
        let mut queue = BatchQueue::new(3, Duration::from_millis(16));
        assert!(!queue.push(1, now));
        assert!(!queue.push(2, now));
        assert!(queue.push(3, now));
        assert_eq!(queue.drain(), vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert!(!queue.is_due(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_flush_due_on_budget() {
        let start = Instant::now();
        let mut queue = BatchQueue::new(50, Duration::from_millis(16));
        assert!(!queue.push("a", start));
        assert!(!queue.push("b", start + Duration::from_millis(10)));
        assert!(queue.is_due(start + Duration::from_millis(16)));
    }

    #[test]
    fn test_grouping_keeps_first_seen_order() {
        let now = Instant::now();
        let mut queue = BatchQueue::new(50, Duration::from_millis(16));
        for item in [("hull", 1), ("position", 2), ("hull", 3), ("shield", 4), ("position", 5)] {
            queue.push(item, now);
        }

        let groups = queue.drain_grouped(|(kind, _)| *kind);
        let summary: Vec<(&str, Vec<i32>)> = groups
            .into_iter()
            .map(|(kind, items)| (kind, items.into_iter().map(|(_, n)| n).collect()))
            .collect();
        assert_eq!(
            summary,
            vec![("hull", vec![1, 3]), ("position", vec![2, 5]), ("shield", vec![4])]
        );
    }
}
