// src/analysis/position_history.rs

use crate::types::{PositionSample, TrackId};
use std::collections::{HashMap, VecDeque};

/// Fixed-capacity FIFO of recent positions for one track.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    samples: VecDeque<PositionSample>,
    capacity: usize,
}

impl PositionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sample, evicting the oldest one once full.
    pub fn push(&mut self, sample: PositionSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn oldest(&self) -> Option<&PositionSample> {
        self.samples.front()
    }

    pub fn newest(&self) -> Option<&PositionSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-track position histories. Entries live for the whole run.
#[derive(Debug, Clone)]
pub struct PositionHistoryStore {
    histories: HashMap<TrackId, PositionHistory>,
    capacity: usize,
}

impl PositionHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            histories: HashMap::new(),
            capacity,
        }
    }

    /// Appends to the track's history, creating it on first sighting.
    pub fn record(&mut self, id: &TrackId, sample: PositionSample) -> &PositionHistory {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(id.clone())
            .or_insert_with(|| PositionHistory::new(capacity));
        history.push(sample);
        history
    }

    pub fn get(&self, id: &TrackId) -> Option<&PositionHistory> {
        self.histories.get(id)
    }

    pub fn tracked_count(&self) -> usize {
        self.histories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: i32, t: f64) -> PositionSample {
        PositionSample {
            x,
            y: 0,
            timestamp_ms: t,
        }
    }

    #[test]
    fn test_history_evicts_oldest_when_full() {
        let mut history = PositionHistory::new(5);
        for i in 0..7 {
            history.push(sample(i, i as f64 * 700.0));
        }
        assert_eq!(history.len(), 5);
        assert_eq!(history.oldest().unwrap().x, 2);
        assert_eq!(history.newest().unwrap().x, 6);
    }

    #[test]
    fn test_store_keeps_tracks_apart() {
        let mut store = PositionHistoryStore::new(5);
        let a = TrackId::from(1);
        let b = TrackId::from(2);

        store.record(&a, sample(10, 0.0));
        store.record(&a, sample(20, 700.0));
        let b_len = store.record(&b, sample(99, 700.0)).len();

        assert_eq!(b_len, 1);
        assert_eq!(store.get(&a).unwrap().len(), 2);
        assert_eq!(store.tracked_count(), 2);
        assert!(store.get(&TrackId::from(3)).is_none());
    }
}
