//! Per-agent queue of infections waiting out their latent period.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BinaryHeap};

/// Infection scheduled to activate at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Infection<P> {
    pub time: f64,
    pub payload: P,
}

// Reversed so that `BinaryHeap` pops the earliest activation first.
impl<P: PartialEq> Eq for Infection<P> {}

impl<P: PartialEq> Ord for Infection<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time)
    }
}

impl<P: PartialEq> PartialOrd for Infection<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending infection activations.
///
/// Insertion order is irrelevant; events are ordered by activation time only
/// and ties are resolved arbitrarily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfectionScheduler<P: PartialEq> {
    queue: BinaryHeap<Infection<P>>,
}

impl<P: PartialEq> Default for InfectionScheduler<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PartialEq> InfectionScheduler<P> {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
        }
    }

    /// Queue an infection that activates at `time`.
    pub fn schedule(&mut self, time: f64, payload: P) {
        self.queue.push(Infection { time, payload });
    }

    /// Earliest pending infection, if any.
    pub fn peek_earliest(&self) -> Option<&Infection<P>> {
        self.queue.peek()
    }

    /// Remove and return every infection with activation time `<= now`,
    /// earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<Infection<P>> {
        let mut due = Vec::new();
        while self.queue.peek().is_some_and(|inf| inf.time <= now) {
            if let Some(inf) = self.queue.pop() {
                due.push(inf);
            }
        }
        due
    }

    /// Drop every pending infection.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_due_events_in_order() {
        let mut sched = InfectionScheduler::new();
        sched.schedule(2.0, 'c');
        sched.schedule(1.5, 'b');
        sched.schedule(1.0, 'a');

        let due = sched.drain_due(1.5);
        let times: Vec<_> = due.iter().map(|inf| inf.time).collect();
        assert_eq!(times, vec![1.0, 1.5]);
        assert_eq!(due[0].payload, 'a');
        assert_eq!(due[1].payload, 'b');

        assert_eq!(sched.len(), 1);
        assert_eq!(sched.peek_earliest().map(|inf| inf.time), Some(2.0));
    }

    #[test]
    fn peek_returns_smallest_time() {
        let mut sched = InfectionScheduler::new();
        assert!(sched.peek_earliest().is_none());
        sched.schedule(1.0, 1u32);
        sched.schedule(2.0, 2);
        sched.schedule(1.5, 2);
        let top = sched.peek_earliest().copied();
        assert_eq!(top, Some(Infection { time: 1.0, payload: 1 }));
        assert_eq!(sched.len(), 3);
    }

    #[test]
    fn drain_on_empty_queue_is_empty() {
        let mut sched = InfectionScheduler::<u32>::new();
        assert!(sched.drain_due(f64::INFINITY).is_empty());
    }

    #[test]
    fn nothing_due_before_first_time() {
        let mut sched = InfectionScheduler::new();
        sched.schedule(3.0, ());
        assert!(sched.drain_due(2.999).is_empty());
        assert_eq!(sched.drain_due(3.0).len(), 1);
        assert!(sched.is_empty());
    }

    #[test]
    fn clear_empties_queue() {
        let mut sched = InfectionScheduler::new();
        sched.schedule(1.0, ());
        sched.schedule(5.0, ());
        sched.clear();
        assert!(sched.is_empty());
        assert!(sched.drain_due(10.0).is_empty());
    }
}
