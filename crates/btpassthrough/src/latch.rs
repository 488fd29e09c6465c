//! One-shot latches shared between the owning thread and the event pump
//!
//! A latch is raised by one path and consumed by exactly one later check, so
//! each triggering condition produces its effect once.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};

/// Boolean latch with atomic test-and-clear
#[derive(Debug, Default)]
pub struct Latch {
    flag: AtomicBool,
}

impl Latch {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Raise the latch. Returns `true` if it was not already raised.
    pub fn set(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Consume the latch. Returns `true` for exactly one caller per raise.
    pub fn test_and_clear(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Latch that remembers the opcode which raised it
#[derive(Debug, Default)]
pub struct OpcodeLatch {
    latch: Latch,
    opcode: AtomicU16,
}

impl OpcodeLatch {
    pub const fn new() -> Self {
        Self {
            latch: Latch::new(),
            opcode: AtomicU16::new(0),
        }
    }

    pub fn set(&self, opcode: u16) {
        // The opcode must be visible before the flag is
        self.opcode.store(opcode, Ordering::Relaxed);
        self.latch.set();
    }

    pub fn is_set(&self) -> bool {
        self.latch.is_set()
    }

    pub fn test_and_clear(&self) -> Option<u16> {
        self.latch
            .test_and_clear()
            .then(|| self.opcode.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_latch_fires_once_per_raise() {
        let latch = Latch::new();
        assert!(!latch.test_and_clear());
        assert!(latch.set());
        assert!(!latch.set());
        assert!(latch.test_and_clear());
        assert!(!latch.test_and_clear());
    }

    #[test]
    fn test_opcode_latch_remembers_opcode() {
        let latch = OpcodeLatch::new();
        assert_eq!(latch.test_and_clear(), None);
        latch.set(0xFC4C);
        assert!(latch.is_set());
        assert_eq!(latch.test_and_clear(), Some(0xFC4C));
        assert_eq!(latch.test_and_clear(), None);
    }

    #[test]
    fn test_concurrent_consumers_see_one_raise() {
        let latch = Arc::new(Latch::new());
        latch.set();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || latch.test_and_clear())
            })
            .collect();

        let fired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();
        assert_eq!(fired, 1);
    }
}
