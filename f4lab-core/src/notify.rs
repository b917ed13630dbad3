//! Handler-to-foreground notification
//!
//! An interrupt handler raises an [`EventFlag`]; the main loop takes it.
//! This is an optional layer on top of polling: the hardware flags still
//! have to be cleared by the handler itself.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// One-bit event latch shared between a handler and the main loop
pub struct EventFlag {
    raised: AtomicBool,
    count: AtomicU32,
}

impl EventFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            count: AtomicU32::new(0),
        }
    }

    /// Mark the event as having happened (handler side)
    pub fn raise(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.raised.store(true, Ordering::Release);
    }

    /// Consume the event if raised (foreground side)
    ///
    /// Several raises between two takes collapse into one.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::Acquire)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Total raises since construction, wrapping
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for EventFlag {
    fn default() -> Self {
        Self::new()
    }
}
