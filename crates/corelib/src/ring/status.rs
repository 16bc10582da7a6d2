//! Compare-and-swap guarded status values.

use std::fmt::Debug;

use crossbeam::atomic::AtomicCell;

/// A status that only changes by an expected -> new transition.
///
/// There is deliberately no setter: a transition that loses the race is a
/// no-op for the loser.
#[derive(Debug)]
pub struct StatusCell<S: Copy + Eq + Debug> {
    name: &'static str,
    value: AtomicCell<S>,
}

impl<S: Copy + Eq + Debug> StatusCell<S> {
    pub fn new(name: &'static str, initial: S) -> Self {
        Self {
            name,
            value: AtomicCell::new(initial),
        }
    }

    #[inline]
    pub fn get(&self) -> S {
        self.value.load()
    }

    /// Moves from `expected` to `new`. Returns false, changing nothing, if
    /// the current value is not `expected`.
    pub fn transition(&self, expected: S, new: S) -> bool {
        match self.value.compare_exchange(expected, new) {
            Ok(_) => {
                tracing::debug!(status = self.name, from = ?expected, to = ?new, "status transition");
                metrics::counter!("node_status_transitions_total", "status" => self.name)
                    .increment(1);
                true
            }
            Err(actual) => {
                tracing::debug!(
                    status = self.name,
                    expected = ?expected,
                    actual = ?actual,
                    to = ?new,
                    "status transition lost the race"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Copy, Clone, PartialEq, Eq, Debug)]
    enum Phase {
        A,
        B,
    }

    #[test]
    fn test_transition_requires_expected_value() {
        let cell = StatusCell::new("phase", Phase::A);
        assert!(!cell.transition(Phase::B, Phase::A));
        assert!(cell.transition(Phase::A, Phase::B));
        assert_eq!(cell.get(), Phase::B);
    }

    #[test]
    fn test_concurrent_transitions_have_one_winner() {
        let cell = Arc::new(StatusCell::new("phase", Phase::A));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if cell.transition(Phase::A, Phase::B) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}
