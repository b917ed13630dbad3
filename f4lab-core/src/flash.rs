//! Flash access latency
//!
//! Flash reads take longer than one CPU cycle above 30 MHz (at 2.7-3.6 V).
//! The latency has to be raised before SYSCLK goes up, and lowered only
//! after it comes down, or the core fetches garbage.

use f4lab_hal::{spin_until, Field, RegisterBlock, TimedOut, Timeout};

const ACR: usize = 0x00;
const LATENCY: Field = Field::new(0, 3);
const PRFTEN: u8 = 8;
const ICEN: u8 = 9;
const DCEN: u8 = 10;

/// HCLK covered by each additional wait state at 2.7-3.6 V
const HZ_PER_WAIT_STATE: u32 = 30_000_000;

/// Flash wait states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashLatency(u8);

impl FlashLatency {
    pub const ZERO: Self = Self(0);

    /// Fewest wait states that allow running at `hclk_hz`
    pub const fn for_sysclk(hclk_hz: u32) -> Self {
        if hclk_hz == 0 {
            return Self::ZERO;
        }
        let ws = (hclk_hz - 1) / HZ_PER_WAIT_STATE;
        if ws > 7 {
            Self(7)
        } else {
            Self(ws as u8)
        }
    }

    pub const fn wait_states(self) -> u8 {
        self.0
    }
}

/// Owned handle to the flash interface registers
pub struct Flash<B> {
    regs: B,
    timeout: Timeout,
}

impl<B: RegisterBlock> Flash<B> {
    pub fn new(regs: B) -> Self {
        Self {
            regs,
            timeout: Timeout::Never,
        }
    }

    /// Bound the latency read-back wait by `timeout`
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program the wait states and turn on prefetch and both caches
    pub fn set_latency(&mut self, latency: FlashLatency) -> Result<(), TimedOut> {
        self.regs.modify(ACR, |v| {
            LATENCY.insert(v, latency.0 as u32) | (1 << PRFTEN) | (1 << ICEN) | (1 << DCEN)
        });
        // The new latency must be in effect before the clock changes
        spin_until(self.timeout, || {
            self.regs.read_field(ACR, LATENCY) == latency.0 as u32
        })
    }

    pub fn latency(&self) -> FlashLatency {
        FlashLatency(self.regs.read_field(ACR, LATENCY) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBlock;

    #[test]
    fn test_latency_table() {
        assert_eq!(FlashLatency::for_sysclk(16_000_000).wait_states(), 0);
        assert_eq!(FlashLatency::for_sysclk(30_000_000).wait_states(), 0);
        assert_eq!(FlashLatency::for_sysclk(30_000_001).wait_states(), 1);
        assert_eq!(FlashLatency::for_sysclk(84_000_000).wait_states(), 2);
        assert_eq!(FlashLatency::for_sysclk(168_000_000).wait_states(), 5);
    }

    #[test]
    fn test_set_latency() {
        let sim = SimBlock::<1>::new();
        let mut flash = Flash::new(&sim);

        assert_eq!(flash.set_latency(FlashLatency::for_sysclk(168_000_000)), Ok(()));
        assert_eq!(flash.latency().wait_states(), 5);
        assert_eq!(sim.peek(ACR) & 0x7, 5);
        assert!(sim.peek(ACR) & (1 << PRFTEN) != 0);
    }

    /// ACR that never takes a new LATENCY value
    struct StuckAcr;

    impl RegisterBlock for StuckAcr {
        fn read(&self, _offset: usize) -> u32 {
            0
        }

        fn write(&mut self, _offset: usize, _value: u32) {}
    }

    #[test]
    fn test_set_latency_times_out() {
        let mut flash = Flash::new(StuckAcr).with_timeout(Timeout::Spins(100));
        assert_eq!(
            flash.set_latency(FlashLatency::for_sysclk(84_000_000)),
            Err(TimedOut)
        );
        // Already in effect, so the first read-back succeeds
        assert_eq!(flash.set_latency(FlashLatency::ZERO), Ok(()));
    }
}
