//! Reset and clock control
//!
//! The RCC owns three concerns the lessons touch:
//!
//! - bus clock gates for every other peripheral ([`gate`])
//! - the system clock multiplexer, PLL and bus prescalers ([`clocks`])
//! - the clock security system and microcontroller clock output ([`security`])
//!
//! All of them live in one register block, so they hang off a single
//! [`Rcc`] handle.

pub mod clocks;
pub mod gate;
pub mod security;

use f4lab_hal::{Field, RegisterBlock, TimedOut, Timeout};

pub use clocks::{
    AhbPrescaler, ApbPrescaler, BusPrescalers, ClockSource, Clocks, Oscillator, PllConfig, PllP,
    PllSource, SysclkSource,
};
pub use gate::{Bus, Peripheral};
pub use security::{McoPrescaler, McoSource};

use crate::ConfigError;

pub(crate) const CR: usize = 0x00;
pub(crate) const PLLCFGR: usize = 0x04;
pub(crate) const CFGR: usize = 0x08;
pub(crate) const CIR: usize = 0x0C;
pub(crate) const AHB1ENR: usize = 0x30;
pub(crate) const APB1ENR: usize = 0x40;
pub(crate) const APB2ENR: usize = 0x44;

// RCC_CR
pub(crate) const HSION: u8 = 0;
pub(crate) const HSIRDY: u8 = 1;
pub(crate) const HSEON: u8 = 16;
pub(crate) const HSERDY: u8 = 17;
pub(crate) const CSSON: u8 = 19;
pub(crate) const PLLON: u8 = 24;
pub(crate) const PLLRDY: u8 = 25;

// RCC_CFGR
pub(crate) const SW: Field = Field::new(0, 2);
pub(crate) const SWS: Field = Field::new(2, 2);
pub(crate) const HPRE: Field = Field::new(4, 4);
pub(crate) const PPRE1: Field = Field::new(10, 3);
pub(crate) const PPRE2: Field = Field::new(13, 3);
pub(crate) const MCO1: Field = Field::new(21, 2);
pub(crate) const MCO1PRE: Field = Field::new(24, 3);

// RCC_CIR
pub(crate) const CSSF: u8 = 7;
pub(crate) const CSSC: u8 = 23;

/// Errors from clock tree changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// An oscillator or the PLL did not report ready within the poll budget
    Timeout,
    /// The requested configuration cannot be represented
    Config(ConfigError),
    /// The requested system clock source has not reported ready
    SourceNotReady(SysclkSource),
    /// The PLL cannot be reprogrammed while it drives the system clock
    PllInUse,
}

impl From<TimedOut> for ClockError {
    fn from(_: TimedOut) -> Self {
        ClockError::Timeout
    }
}

impl From<ConfigError> for ClockError {
    fn from(e: ConfigError) -> Self {
        ClockError::Config(e)
    }
}

/// Owned handle to the RCC register block
pub struct Rcc<B> {
    regs: B,
    timeout: Timeout,
}

impl<B: RegisterBlock> Rcc<B> {
    /// Wrap the RCC register block
    ///
    /// Ready-bit waits never time out; see [`with_timeout`](Self::with_timeout).
    pub fn new(regs: B) -> Self {
        Self {
            regs,
            timeout: Timeout::Never,
        }
    }

    /// Bound every ready-bit wait by `timeout`
    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Give the register block back
    pub fn release(self) -> B {
        self.regs
    }
}
