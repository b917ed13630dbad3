//! Busy-wait polling
//!
//! Every blocking operation in the lessons is a loop on a hardware status bit.
//! By default the loop waits forever: an absent clock or a silent serial peer
//! hangs the caller. [`Timeout::Spins`] bounds the loop instead and turns
//! the hang into a [`TimedOut`] error.

/// How long a busy-wait may spin before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Spin until the condition holds, however long that takes
    #[default]
    Never,
    /// Give up after this many unsuccessful polls
    Spins(u32),
}

/// A bounded busy-wait ran out of polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedOut;

/// Poll `ready` until it returns true or the budget is exhausted
///
/// The predicate is always evaluated at least once, so a condition that is
/// already true succeeds even with `Timeout::Spins(0)`.
pub fn spin_until<F: FnMut() -> bool>(timeout: Timeout, mut ready: F) -> Result<(), TimedOut> {
    match timeout {
        Timeout::Never => {
            while !ready() {
                core::hint::spin_loop();
            }
            Ok(())
        }
        Timeout::Spins(budget) => {
            let mut remaining = budget;
            loop {
                if ready() {
                    return Ok(());
                }
                if remaining == 0 {
                    return Err(TimedOut);
                }
                remaining -= 1;
                core::hint::spin_loop();
            }
        }
    }
}
