use std::collections::VecDeque;

use crate::types::Sample;

/// Default number of samples kept.
pub const HISTORY_CAPACITY: usize = 20;

/// Rolling window of recent samples in arrival order. Strict FIFO: once full,
/// every append evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl History {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append at the tail. Returns the evicted head, if any.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(i: i64) -> Sample {
        Sample {
            observed_at: Utc.timestamp_opt(1_714_560_000 + i * 7, 0).unwrap(),
            temperature: 20.0 + i as f64 * 0.1,
            heater_on: i % 2 == 0,
        }
    }

    #[test]
    fn grows_until_capacity() {
        let mut h = History::default();
        for i in 0..25 {
            h.push(sample(i));
            assert_eq!(h.len(), (i as usize + 1).min(HISTORY_CAPACITY));
        }
    }

    #[test]
    fn twenty_first_append_evicts_head() {
        let mut h = History::default();
        for i in 0..20 {
            assert!(h.push(sample(i)).is_none());
        }
        let before = h.to_vec();

        let evicted = h.push(sample(20));
        assert_eq!(evicted, Some(before[0]));
        let after = h.to_vec();
        assert_eq!(&after[..19], &before[1..]);
        assert_eq!(after[19], sample(20));
    }

    #[test]
    fn keeps_arrival_order_not_timestamp_order() {
        let mut h = History::new(3);
        h.push(sample(5));
        h.push(sample(1));
        h.push(sample(3));
        let temps: Vec<f64> = h.iter().map(|s| s.temperature).collect();
        assert_eq!(temps, vec![sample(5).temperature, sample(1).temperature, sample(3).temperature]);
        assert_eq!(h.latest(), Some(&sample(3)));
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut h = History::new(0);
        h.push(sample(0));
        h.push(sample(1));
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.to_vec(), vec![sample(1)]);
    }
}
