//! Configuration errors
//!
//! Raised when a caller asks for something the hardware cannot represent.
//! These are checked up front, before any register is written, so a rejected
//! configuration leaves the peripheral as it was.

/// A configuration parameter the hardware cannot represent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// GPIO pin index outside 0..=15
    PinOutOfRange,
    /// Alternate function selector outside 0..=15
    InvalidAlternateFunction,
    /// A PLL divider or multiplier outside its documented range
    PllOutOfRange,
    /// PLL VCO input or output frequency outside its documented range
    VcoOutOfRange,
    /// Data bits, parity and stop bits that do not make a valid frame
    FrameFormat,
    /// Baud rate of zero, or too high or too low for the bus clock
    BaudRate,
    /// Bus prescalers that would run a bus above its maximum frequency
    BusTooFast,
    /// Auto-reload or compare value wider than the timer's counter
    AutoReloadTooWide,
    /// The peripheral's bus clock is not enabled
    NotClocked,
    /// A pin name that is not of the form `P<port><index>`
    InvalidPinName,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ConfigError::PinOutOfRange => "pin index out of range",
            ConfigError::InvalidAlternateFunction => "alternate function out of range",
            ConfigError::PllOutOfRange => "PLL parameter out of range",
            ConfigError::VcoOutOfRange => "PLL VCO frequency out of range",
            ConfigError::FrameFormat => "unsupported frame format",
            ConfigError::BaudRate => "baud rate not reachable from bus clock",
            ConfigError::BusTooFast => "bus clock above its maximum",
            ConfigError::AutoReloadTooWide => "auto-reload value too wide for timer",
            ConfigError::NotClocked => "peripheral clock not enabled",
            ConfigError::InvalidPinName => "invalid pin name",
        };
        f.write_str(msg)
    }
}
