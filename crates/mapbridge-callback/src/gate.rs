//! Sequence gate
//!
//! The browser numbers every callback request. Requests fired concurrently
//! may arrive out of order or twice; the gate lets a request through only if
//! its number is strictly greater than every number accepted before.

use parking_lot::Mutex;

/// Strictly increasing sequence filter shared by the listener workers and
/// the polling loop.
#[derive(Debug, Default)]
pub struct SequenceGate {
    last_accepted: Mutex<Option<u64>>,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sequence` and returns true if it is newer than the last
    /// accepted number. Stale and duplicate numbers return false.
    pub fn accept(&self, sequence: u64) -> bool {
        let mut last = self.last_accepted.lock();
        match *last {
            Some(previous) if sequence <= previous => false,
            _ => {
                *last = Some(sequence);
                true
            }
        }
    }

    pub fn last_accepted(&self) -> Option<u64> {
        *self.last_accepted.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_out_of_order_sequences() {
        let gate = SequenceGate::new();
        let accepted: Vec<u64> = [5, 3, 7, 7, 9]
            .into_iter()
            .filter(|&sequence| gate.accept(sequence))
            .collect();
        assert_eq!(accepted, vec![5, 7, 9]);
        assert_eq!(gate.last_accepted(), Some(9));
    }

    #[test]
    fn test_first_sequence_zero_is_accepted() {
        let gate = SequenceGate::new();
        assert!(gate.accept(0));
        assert!(!gate.accept(0));
    }

    #[test]
    fn test_concurrent_accepts_are_unique() {
        let gate = Arc::new(SequenceGate::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || (1..=1000u64).filter(|&s| gate.accept(s)).count())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total <= 1000);
        assert_eq!(gate.last_accepted(), Some(1000));
    }
}
