use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: f64,
}

/// Raw pointer input gathered between two ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingInterval {
    pub positions: VecDeque<PointerSample>,
    pub move_count: u32,
    pub suspicious_event_count: u32,
}

impl SamplingInterval {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity),
            move_count: 0,
            suspicious_event_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.move_count == 0
    }
}

/// Accumulates pointer input for the current interval. Makes no judgment
/// about it; scoring happens at tick time.
#[derive(Debug)]
pub struct SignalCollector {
    current: SamplingInterval,
    capacity: usize,
}

impl SignalCollector {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            current: SamplingInterval::with_capacity(capacity),
            capacity,
        }
    }

    /// `trusted` is the platform's verdict on whether the event came from
    /// real user input (`Event.isTrusted` in browsers).
    pub fn on_pointer_move(&mut self, x: f64, y: f64, timestamp_ms: f64, trusted: bool) {
        if self.current.positions.len() == self.capacity {
            self.current.positions.pop_front();
        }
        self.current.positions.push_back(PointerSample { x, y, timestamp_ms });
        self.current.move_count = self.current.move_count.saturating_add(1);
        if !trusted {
            self.current.suspicious_event_count =
                self.current.suspicious_event_count.saturating_add(1);
        }
    }

    pub fn current(&self) -> &SamplingInterval {
        &self.current
    }

    /// Hands back the finished interval and starts an empty one.
    pub fn reset_interval(&mut self) -> SamplingInterval {
        std::mem::replace(
            &mut self.current,
            SamplingInterval::with_capacity(self.capacity),
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
