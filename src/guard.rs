//! Re-entrancy guard: at most one cycle of a given kind in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    busy: Arc<AtomicBool>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if a cycle is already running. The slot is released when the
    /// returned token is dropped.
    pub fn try_acquire(&self) -> Option<InFlight> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let g = CycleGuard::new();
        let t = g.try_acquire().expect("free");
        assert!(g.is_busy());
        assert!(g.try_acquire().is_none());
        drop(t);
        assert!(!g.is_busy());
        assert!(g.try_acquire().is_some());
    }
}
