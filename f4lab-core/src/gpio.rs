//! GPIO ports and pin configuration
//!
//! Each port has one 2-bit mode, speed and pull field per pin, one output
//! type bit per pin, and a 4-bit alternate function selector split across
//! AFRL (pins 0-7) and AFRH (pins 8-15). Output levels are driven through
//! BSRR so setting or clearing one pin never disturbs the others.

use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::gpio::{OutputType, Pull, Speed};
use f4lab_hal::{Field, RegisterBlock};

use crate::rcc::{Peripheral, Rcc};
use crate::ConfigError;

const MODER: usize = 0x00;
const OTYPER: usize = 0x04;
const OSPEEDR: usize = 0x08;
const PUPDR: usize = 0x0C;
const IDR: usize = 0x10;
const ODR: usize = 0x14;
const BSRR: usize = 0x18;
const AFRL: usize = 0x20;
const AFRH: usize = 0x24;

const TWO_BITS: Field = Field::new(0, 2);
const FOUR_BITS: Field = Field::new(0, 4);

/// Number of GPIO ports on the STM32F407
pub const PORT_COUNT: usize = 9;

/// A GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
}

impl Port {
    /// Zero-based port number (A = 0), as used by SYSCFG_EXTICR
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Clock gate of the port
    pub const fn peripheral(self) -> Peripheral {
        match self {
            Port::A => Peripheral::GpioA,
            Port::B => Peripheral::GpioB,
            Port::C => Peripheral::GpioC,
            Port::D => Peripheral::GpioD,
            Port::E => Peripheral::GpioE,
            Port::F => Peripheral::GpioF,
            Port::G => Peripheral::GpioG,
            Port::H => Peripheral::GpioH,
            Port::I => Peripheral::GpioI,
        }
    }

    /// Inverse of [`index`](Self::index)
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Port::A),
            1 => Some(Port::B),
            2 => Some(Port::C),
            3 => Some(Port::D),
            4 => Some(Port::E),
            5 => Some(Port::F),
            6 => Some(Port::G),
            7 => Some(Port::H),
            8 => Some(Port::I),
            _ => None,
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Port::A),
            'B' => Some(Port::B),
            'C' => Some(Port::C),
            'D' => Some(Port::D),
            'E' => Some(Port::E),
            'F' => Some(Port::F),
            'G' => Some(Port::G),
            'H' => Some(Port::H),
            'I' => Some(Port::I),
            _ => None,
        }
    }
}

/// A single pin, identified by port and index 0..=15
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pin {
    pub port: Port,
    pub index: u8,
}

impl Pin {
    /// Panics (at compile time in a `const`) if `index > 15`
    pub const fn new(port: Port, index: u8) -> Self {
        assert!(index < 16);
        Self { port, index }
    }

    pub const fn try_new(port: Port, index: u8) -> Result<Self, ConfigError> {
        if index < 16 {
            Ok(Self { port, index })
        } else {
            Err(ConfigError::PinOutOfRange)
        }
    }

    pub const fn mask(self) -> u16 {
        1 << self.index
    }
}

/// Parse a pin name
///
/// Supports formats:
/// - "PA0" -> Port A, Pin 0
/// - "pd15" -> Port D, Pin 15
impl FromStr for Pin {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();

        match chars.next() {
            Some('P') | Some('p') => {}
            _ => return Err(ConfigError::InvalidPinName),
        }
        let port = chars
            .next()
            .and_then(Port::from_letter)
            .ok_or(ConfigError::InvalidPinName)?;

        let index_str = chars.as_str();
        if index_str.is_empty() || !index_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidPinName);
        }
        let index: u8 = index_str.parse().map_err(|_| ConfigError::PinOutOfRange)?;
        Pin::try_new(port, index)
    }
}

/// Alternate function selector, 0..=15
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlternateFunction(u8);

impl AlternateFunction {
    /// AF0: system functions (MCO1, SWD, ...)
    pub const SYSTEM: Self = Self(0);
    /// AF2: TIM3, TIM4, TIM5 channels
    pub const TIM3_5: Self = Self(2);
    /// AF5: SPI1, SPI2
    pub const SPI1_2: Self = Self(5);
    /// AF7: USART1, USART2, USART3
    pub const USART1_3: Self = Self(7);

    pub const fn new(af: u8) -> Result<Self, ConfigError> {
        if af < 16 {
            Ok(Self(af))
        } else {
            Err(ConfigError::InvalidAlternateFunction)
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }
}

/// Pin mode (MODER)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    Input,
    Output,
    Alternate(AlternateFunction),
    Analog,
}

impl Mode {
    pub const fn code(self) -> u32 {
        match self {
            Mode::Input => 0b00,
            Mode::Output => 0b01,
            Mode::Alternate(_) => 0b10,
            Mode::Analog => 0b11,
        }
    }
}

const fn speed_code(speed: Speed) -> u32 {
    match speed {
        Speed::Low => 0b00,
        Speed::Medium => 0b01,
        Speed::High => 0b10,
        Speed::VeryHigh => 0b11,
    }
}

const fn pull_code(pull: Pull) -> u32 {
    match pull {
        Pull::None => 0b00,
        Pull::Up => 0b01,
        Pull::Down => 0b10,
    }
}

/// Full electrical configuration of one pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PinConfig {
    pub mode: Mode,
    pub output_type: OutputType,
    pub speed: Speed,
    pub pull: Pull,
}

impl PinConfig {
    /// Floating digital input
    pub const fn input() -> Self {
        Self {
            mode: Mode::Input,
            output_type: OutputType::PushPull,
            speed: Speed::Low,
            pull: Pull::None,
        }
    }

    /// Push-pull output, medium speed, no pull
    pub const fn output() -> Self {
        Self {
            mode: Mode::Output,
            output_type: OutputType::PushPull,
            speed: Speed::Medium,
            pull: Pull::None,
        }
    }

    /// Push-pull alternate function, very high speed, no pull
    pub const fn alternate(af: AlternateFunction) -> Self {
        Self {
            mode: Mode::Alternate(af),
            output_type: OutputType::PushPull,
            speed: Speed::VeryHigh,
            pull: Pull::None,
        }
    }

    pub const fn analog() -> Self {
        Self {
            mode: Mode::Analog,
            output_type: OutputType::PushPull,
            speed: Speed::Low,
            pull: Pull::None,
        }
    }

    pub const fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    pub const fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    pub const fn open_drain(mut self) -> Self {
        self.output_type = OutputType::OpenDrain;
        self
    }
}

/// Owned handle to one GPIO port
pub struct GpioPort<B> {
    regs: B,
    port: Port,
}

impl<B: RegisterBlock> GpioPort<B> {
    /// Wrap a port's register block
    ///
    /// Fails with [`ConfigError::NotClocked`] if the port's clock gate is off.
    pub fn new<R: RegisterBlock>(regs: B, port: Port, rcc: &Rcc<R>) -> Result<Self, ConfigError> {
        rcc.assert_clocked(port.peripheral())?;
        Ok(Self { regs, port })
    }

    pub fn port(&self) -> Port {
        self.port
    }

    /// Apply `config` to pin `index`
    ///
    /// The alternate function, output type, speed and pull are written
    /// before the mode, so the pin never drives its new function with stale
    /// electrical settings. The sequence runs in a critical section because a
    /// handler may touch the same port.
    pub fn configure(&mut self, index: u8, config: &PinConfig) -> Result<(), ConfigError> {
        if index > 15 {
            return Err(ConfigError::PinOutOfRange);
        }
        let regs = &mut self.regs;
        critical_section::with(|_| {
            if let Mode::Alternate(af) = config.mode {
                let (reg, slot) = if index < 8 {
                    (AFRL, index)
                } else {
                    (AFRH, index - 8)
                };
                regs.write_field(reg, FOUR_BITS.nth(slot), af.number() as u32);
            }

            let ot = match config.output_type {
                OutputType::PushPull => 0,
                OutputType::OpenDrain => 1,
            };
            regs.write_field(OTYPER, Field::bit(index), ot);
            regs.write_field(OSPEEDR, TWO_BITS.nth(index), speed_code(config.speed));
            regs.write_field(PUPDR, TWO_BITS.nth(index), pull_code(config.pull));
            regs.write_field(MODER, TWO_BITS.nth(index), config.mode.code());
        });
        Ok(())
    }

    /// Raw 2-bit MODER code of pin `index`
    pub fn mode_code(&self, index: u8) -> u32 {
        self.regs.read_field(MODER, TWO_BITS.nth(index & 0xF))
    }

    /// Drive pin `index` high
    pub fn set_high(&mut self, index: u8) {
        self.regs.write(BSRR, 1 << (index & 0xF));
    }

    /// Drive pin `index` low
    pub fn set_low(&mut self, index: u8) {
        self.regs.write(BSRR, 1 << ((index & 0xF) + 16));
    }

    /// Invert the driven level of pin `index`
    pub fn toggle(&mut self, index: u8) {
        if self.is_set_high(index) {
            self.set_low(index);
        } else {
            self.set_high(index);
        }
    }

    /// Level currently driven on pin `index` (ODR)
    pub fn is_set_high(&self, index: u8) -> bool {
        self.regs.is_set(ODR, index & 0xF)
    }

    /// Level read back from pin `index` (IDR)
    pub fn is_high(&self, index: u8) -> bool {
        self.regs.is_set(IDR, index & 0xF)
    }

    /// Borrow pin `index` as a standalone digital pin
    pub fn pin(&mut self, index: u8) -> Result<PortPin<'_, B>, ConfigError> {
        if index > 15 {
            return Err(ConfigError::PinOutOfRange);
        }
        Ok(PortPin { port: self, index })
    }

    /// Give the register block back
    pub fn release(self) -> B {
        self.regs
    }
}

/// One pin of a borrowed [`GpioPort`]
pub struct PortPin<'a, B> {
    port: &'a mut GpioPort<B>,
    index: u8,
}

impl<B: RegisterBlock> f4lab_hal::OutputPin for PortPin<'_, B> {
    fn set_high(&mut self) {
        self.port.set_high(self.index);
    }

    fn set_low(&mut self) {
        self.port.set_low(self.index);
    }

    fn toggle(&mut self) {
        self.port.toggle(self.index);
    }

    fn is_set_high(&self) -> bool {
        self.port.is_set_high(self.index)
    }
}

impl<B: RegisterBlock> f4lab_hal::InputPin for PortPin<'_, B> {
    fn is_high(&self) -> bool {
        self.port.is_high(self.index)
    }
}

impl<B> embedded_hal::digital::ErrorType for PortPin<'_, B> {
    type Error = core::convert::Infallible;
}

impl<B: RegisterBlock> embedded_hal::digital::OutputPin for PortPin<'_, B> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.port.set_low(self.index);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.port.set_high(self.index);
        Ok(())
    }
}

impl<B: RegisterBlock> embedded_hal::digital::StatefulOutputPin for PortPin<'_, B> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.is_set_high(self.index))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.port.is_set_high(self.index))
    }
}

impl<B: RegisterBlock> embedded_hal::digital::InputPin for PortPin<'_, B> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.is_high(self.index))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.port.is_high(self.index))
    }
}

/// A pin is already owned by another peripheral setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlreadyClaimed(pub Pin);

/// Pin ownership tracker
///
/// Nothing in the hardware stops two setup routines from configuring the
/// same pin; the last one silently wins. Bring-up code can record each pin
/// it configures here to catch that.
#[derive(Debug, Default)]
pub struct PinClaims {
    /// One bitmask of claimed pins per port
    claimed: [u16; PORT_COUNT],
}

impl PinClaims {
    pub const fn new() -> Self {
        Self {
            claimed: [0; PORT_COUNT],
        }
    }

    /// Record `pin` as owned
    pub fn claim(&mut self, pin: Pin) -> Result<(), AlreadyClaimed> {
        let slot = &mut self.claimed[pin.port.index() as usize];
        if *slot & pin.mask() != 0 {
            return Err(AlreadyClaimed(pin));
        }
        *slot |= pin.mask();
        Ok(())
    }

    /// Give `pin` up
    pub fn release(&mut self, pin: Pin) {
        self.claimed[pin.port.index() as usize] &= !pin.mask();
    }

    pub fn is_claimed(&self, pin: Pin) -> bool {
        self.claimed[pin.port.index() as usize] & pin.mask() != 0
    }
}
