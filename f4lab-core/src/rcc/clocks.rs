//! System clock selection
//!
//! SYSCLK comes from one of three sources: the 16 MHz internal RC oscillator
//! (HSI), the external crystal (HSE, 8 MHz on the Discovery board) or the
//! main PLL fed from either of them. Switching follows the same sequence for
//! every source:
//!
//! 1. turn the source on
//! 2. wait for its ready bit
//! 3. write SW together with the bus prescalers in one CFGR update
//!
//! The PLL additionally has its dividers written while it is off, and must
//! lock before step 3. Selecting a source that is not ready is never done.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::{spin_until, Field, RegisterBlock};

use super::{
    ClockError, Rcc, CFGR, CR, HPRE, HSEON, HSERDY, HSION, HSIRDY, PLLCFGR, PLLON, PLLRDY,
    PPRE1, PPRE2, SW, SWS,
};
use crate::ConfigError;

/// Internal RC oscillator frequency
pub const HSI_HZ: u32 = 16_000_000;

/// External crystal frequency on the STM32F4-Discovery
pub const HSE_HZ: u32 = 8_000_000;

/// Maximum SYSCLK and AHB frequency
pub const SYSCLK_MAX_HZ: u32 = 168_000_000;

/// Maximum APB1 (low-speed peripheral bus) frequency
pub const PCLK1_MAX_HZ: u32 = 42_000_000;

/// Maximum APB2 (high-speed peripheral bus) frequency
pub const PCLK2_MAX_HZ: u32 = 84_000_000;

// RCC_PLLCFGR
const PLLM: Field = Field::new(0, 6);
const PLLN: Field = Field::new(6, 9);
const PLLP: Field = Field::new(16, 2);
const PLLSRC: Field = Field::bit(22);
const PLLQ: Field = Field::new(24, 4);

/// An oscillator with an enable bit and a ready bit in RCC_CR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oscillator {
    Hsi,
    Hse,
}

impl Oscillator {
    const fn on_bit(self) -> u8 {
        match self {
            Oscillator::Hsi => HSION,
            Oscillator::Hse => HSEON,
        }
    }

    const fn ready_bit(self) -> u8 {
        match self {
            Oscillator::Hsi => HSIRDY,
            Oscillator::Hse => HSERDY,
        }
    }
}

/// Value of the SW/SWS fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SysclkSource {
    Hsi,
    Hse,
    Pll,
}

impl SysclkSource {
    pub const fn code(self) -> u32 {
        match self {
            SysclkSource::Hsi => 0b00,
            SysclkSource::Hse => 0b01,
            SysclkSource::Pll => 0b10,
        }
    }

    /// Decode a SWS value; `0b11` is not a valid source
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0b00 => Some(SysclkSource::Hsi),
            0b01 => Some(SysclkSource::Hse),
            0b10 => Some(SysclkSource::Pll),
            _ => None,
        }
    }

    const fn ready_bit(self) -> u8 {
        match self {
            SysclkSource::Hsi => HSIRDY,
            SysclkSource::Hse => HSERDY,
            SysclkSource::Pll => PLLRDY,
        }
    }
}

/// Reference clock feeding the PLL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PllSource {
    Hsi,
    Hse,
}

impl PllSource {
    pub const fn hz(self) -> u32 {
        match self {
            PllSource::Hsi => HSI_HZ,
            PllSource::Hse => HSE_HZ,
        }
    }

    pub const fn oscillator(self) -> Oscillator {
        match self {
            PllSource::Hsi => Oscillator::Hsi,
            PllSource::Hse => Oscillator::Hse,
        }
    }
}

/// PLL main output divider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PllP {
    Div2,
    Div4,
    Div6,
    Div8,
}

impl PllP {
    pub const fn divisor(self) -> u32 {
        match self {
            PllP::Div2 => 2,
            PllP::Div4 => 4,
            PllP::Div6 => 6,
            PllP::Div8 => 8,
        }
    }

    pub const fn code(self) -> u32 {
        self.divisor() / 2 - 1
    }

    pub const fn from_code(code: u32) -> Self {
        match code & 0b11 {
            0 => PllP::Div2,
            1 => PllP::Div4,
            2 => PllP::Div6,
            _ => PllP::Div8,
        }
    }
}

/// Main PLL dividers and multiplier
///
/// `f_vco = f_in * n / m`, `f_sysclk = f_vco / p`, `f_usb = f_vco / q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PllConfig {
    pub source: PllSource,
    /// Input divider, 2..=63
    pub m: u8,
    /// VCO multiplier, 50..=432
    pub n: u16,
    /// System clock divider
    pub p: PllP,
    /// USB/SDIO/RNG divider, 2..=15
    pub q: u8,
}

impl PllConfig {
    /// 168 MHz SYSCLK and 48 MHz USB clock from the 16 MHz HSI
    pub const HSI_168MHZ: Self = Self {
        source: PllSource::Hsi,
        m: 8,
        n: 168,
        p: PllP::Div2,
        q: 7,
    };

    /// 168 MHz SYSCLK and 48 MHz USB clock from the 8 MHz HSE
    pub const HSE_168MHZ: Self = Self {
        source: PllSource::Hse,
        m: 4,
        n: 168,
        p: PllP::Div2,
        q: 7,
    };

    /// Bits of RCC_PLLCFGR covered by the configuration
    pub const MASK: u32 =
        PLLM.mask() | PLLN.mask() | PLLP.mask() | PLLSRC.mask() | PLLQ.mask();

    /// Check every parameter and the resulting frequencies
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=63).contains(&self.m)
            || !(50..=432).contains(&self.n)
            || !(2..=15).contains(&self.q)
        {
            return Err(ConfigError::PllOutOfRange);
        }
        let vco_in = self.source.hz() / self.m as u32;
        if !(1_000_000..=2_000_000).contains(&vco_in) {
            return Err(ConfigError::VcoOutOfRange);
        }
        if !(100_000_000..=432_000_000).contains(&self.vco_hz()) {
            return Err(ConfigError::VcoOutOfRange);
        }
        if self.sysclk_hz() > SYSCLK_MAX_HZ {
            return Err(ConfigError::PllOutOfRange);
        }
        Ok(())
    }

    pub fn vco_hz(&self) -> u32 {
        (self.source.hz() as u64 * self.n as u64 / self.m as u64) as u32
    }

    pub fn sysclk_hz(&self) -> u32 {
        self.vco_hz() / self.p.divisor()
    }

    pub fn usb_hz(&self) -> u32 {
        self.vco_hz() / self.q as u32
    }

    /// Encode as an RCC_PLLCFGR value (reserved bits zero)
    ///
    /// This is `(Q << 24) | (P << 16) | (N << 6) | M` plus PLLSRC in bit 22,
    /// so an HSE-sourced word differs from that formula by `1 << 22`.
    pub const fn bits(&self) -> u32 {
        let src = match self.source {
            PllSource::Hsi => 0,
            PllSource::Hse => 1,
        };
        ((self.q as u32) << 24)
            | (src << 22)
            | (self.p.code() << 16)
            | ((self.n as u32) << 6)
            | self.m as u32
    }

    /// Decode an RCC_PLLCFGR value
    ///
    /// Only the divider ranges are checked, not the resulting frequencies.
    pub fn from_bits(bits: u32) -> Result<Self, ConfigError> {
        let cfg = Self {
            source: if PLLSRC.extract(bits) == 1 {
                PllSource::Hse
            } else {
                PllSource::Hsi
            },
            m: PLLM.extract(bits) as u8,
            n: PLLN.extract(bits) as u16,
            p: PllP::from_code(PLLP.extract(bits)),
            q: PLLQ.extract(bits) as u8,
        };
        if !(2..=63).contains(&cfg.m) || !(50..=432).contains(&cfg.n) || !(2..=15).contains(&cfg.q)
        {
            return Err(ConfigError::PllOutOfRange);
        }
        Ok(cfg)
    }
}

/// Source to switch SYSCLK to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClockSource {
    Hsi,
    Hse,
    Pll(PllConfig),
}

impl ClockSource {
    pub const fn sysclk_source(&self) -> SysclkSource {
        match self {
            ClockSource::Hsi => SysclkSource::Hsi,
            ClockSource::Hse => SysclkSource::Hse,
            ClockSource::Pll(_) => SysclkSource::Pll,
        }
    }

    pub fn sysclk_hz(&self) -> u32 {
        match self {
            ClockSource::Hsi => HSI_HZ,
            ClockSource::Hse => HSE_HZ,
            ClockSource::Pll(cfg) => cfg.sysclk_hz(),
        }
    }
}

/// AHB prescaler (HPRE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AhbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div64,
    Div128,
    Div256,
    Div512,
}

impl AhbPrescaler {
    pub const fn code(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 0b0000,
            AhbPrescaler::Div2 => 0b1000,
            AhbPrescaler::Div4 => 0b1001,
            AhbPrescaler::Div8 => 0b1010,
            AhbPrescaler::Div16 => 0b1011,
            AhbPrescaler::Div64 => 0b1100,
            AhbPrescaler::Div128 => 0b1101,
            AhbPrescaler::Div256 => 0b1110,
            AhbPrescaler::Div512 => 0b1111,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            AhbPrescaler::Div1 => 1,
            AhbPrescaler::Div2 => 2,
            AhbPrescaler::Div4 => 4,
            AhbPrescaler::Div8 => 8,
            AhbPrescaler::Div16 => 16,
            AhbPrescaler::Div64 => 64,
            AhbPrescaler::Div128 => 128,
            AhbPrescaler::Div256 => 256,
            AhbPrescaler::Div512 => 512,
        }
    }
}

/// APB prescaler (PPRE1/PPRE2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ApbPrescaler {
    #[default]
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbPrescaler {
    const ALL: [ApbPrescaler; 5] = [
        ApbPrescaler::Div1,
        ApbPrescaler::Div2,
        ApbPrescaler::Div4,
        ApbPrescaler::Div8,
        ApbPrescaler::Div16,
    ];

    pub const fn code(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 0b000,
            ApbPrescaler::Div2 => 0b100,
            ApbPrescaler::Div4 => 0b101,
            ApbPrescaler::Div8 => 0b110,
            ApbPrescaler::Div16 => 0b111,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            ApbPrescaler::Div1 => 1,
            ApbPrescaler::Div2 => 2,
            ApbPrescaler::Div4 => 4,
            ApbPrescaler::Div8 => 8,
            ApbPrescaler::Div16 => 16,
        }
    }

    /// Smallest divider that brings `input_hz` down to `max_hz` or below
    fn slowest_needed(input_hz: u32, max_hz: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|p| input_hz / p.divisor() <= max_hz)
            .unwrap_or(ApbPrescaler::Div16)
    }
}

/// AHB, APB1 and APB2 prescalers, written together with SW
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusPrescalers {
    pub ahb: AhbPrescaler,
    pub apb1: ApbPrescaler,
    pub apb2: ApbPrescaler,
}

impl BusPrescalers {
    /// Reset state: every bus at SYSCLK
    pub const UNDIVIDED: Self = Self {
        ahb: AhbPrescaler::Div1,
        apb1: ApbPrescaler::Div1,
        apb2: ApbPrescaler::Div1,
    };

    /// AHB at SYSCLK, each APB bus at the highest frequency its maximum allows
    ///
    /// At 168 MHz this gives AHB/1, APB1/4 (42 MHz) and APB2/2 (84 MHz).
    pub fn for_sysclk(sysclk_hz: u32) -> Self {
        Self {
            ahb: AhbPrescaler::Div1,
            apb1: ApbPrescaler::slowest_needed(sysclk_hz, PCLK1_MAX_HZ),
            apb2: ApbPrescaler::slowest_needed(sysclk_hz, PCLK2_MAX_HZ),
        }
    }

    /// Reject prescalers that would overclock a bus at `sysclk_hz`
    pub fn validate(&self, sysclk_hz: u32) -> Result<(), ConfigError> {
        let clocks = Clocks::new(sysclk_hz, *self);
        if clocks.hclk > SYSCLK_MAX_HZ
            || clocks.pclk1 > PCLK1_MAX_HZ
            || clocks.pclk2 > PCLK2_MAX_HZ
        {
            return Err(ConfigError::BusTooFast);
        }
        Ok(())
    }
}

/// Bus frequencies in effect after a clock switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    pub sysclk: u32,
    pub hclk: u32,
    pub pclk1: u32,
    pub pclk2: u32,
    prescalers: BusPrescalers,
}

impl Clocks {
    /// Clocks out of reset: HSI with every prescaler at /1
    pub const RESET: Self = Self {
        sysclk: HSI_HZ,
        hclk: HSI_HZ,
        pclk1: HSI_HZ,
        pclk2: HSI_HZ,
        prescalers: BusPrescalers::UNDIVIDED,
    };

    pub fn new(sysclk_hz: u32, prescalers: BusPrescalers) -> Self {
        let hclk = sysclk_hz / prescalers.ahb.divisor();
        Self {
            sysclk: sysclk_hz,
            hclk,
            pclk1: hclk / prescalers.apb1.divisor(),
            pclk2: hclk / prescalers.apb2.divisor(),
            prescalers,
        }
    }

    /// Counter clock of timers on APB1 (TIM2..TIM5)
    ///
    /// Timers run at twice the bus clock whenever the bus is divided.
    pub fn apb1_timer_hz(&self) -> u32 {
        match self.prescalers.apb1 {
            ApbPrescaler::Div1 => self.pclk1,
            _ => self.pclk1 * 2,
        }
    }

    /// Counter clock of timers on APB2
    pub fn apb2_timer_hz(&self) -> u32 {
        match self.prescalers.apb2 {
            ApbPrescaler::Div1 => self.pclk2,
            _ => self.pclk2 * 2,
        }
    }
}

impl<B: RegisterBlock> Rcc<B> {
    /// Turn an oscillator on and wait until it is stable
    ///
    /// A missing crystal never reports ready: with the default timeout this
    /// hangs, with [`Timeout::Spins`](f4lab_hal::Timeout::Spins) it fails.
    pub fn enable_oscillator(&mut self, osc: Oscillator) -> Result<(), ClockError> {
        self.regs.set_bit(CR, osc.on_bit());
        spin_until(self.timeout, || self.regs.is_set(CR, osc.ready_bit()))?;
        Ok(())
    }

    /// Whether `source` currently reports ready
    pub fn is_ready(&self, source: SysclkSource) -> bool {
        self.regs.is_set(CR, source.ready_bit())
    }

    /// Source the multiplexer reports as driving SYSCLK
    pub fn current_source(&self) -> Option<SysclkSource> {
        SysclkSource::from_code(self.regs.read_field(CFGR, SWS))
    }

    /// PLL dividers currently programmed
    pub fn pll_config(&self) -> Result<PllConfig, ConfigError> {
        PllConfig::from_bits(self.regs.read(PLLCFGR))
    }

    /// Program and lock the main PLL
    ///
    /// The PLL is stopped, its dividers written, its reference oscillator
    /// started if needed, and then it is restarted and waited on. Refused
    /// while the PLL drives SYSCLK.
    pub fn configure_pll(&mut self, cfg: &PllConfig) -> Result<(), ClockError> {
        cfg.validate()?;
        if self.current_source() == Some(SysclkSource::Pll) {
            return Err(ClockError::PllInUse);
        }

        self.regs.clear_bit(CR, PLLON);
        spin_until(self.timeout, || !self.regs.is_set(CR, PLLRDY))?;

        self.enable_oscillator(cfg.source.oscillator())?;

        let bits = cfg.bits();
        self.regs
            .modify(PLLCFGR, |v| (v & !PllConfig::MASK) | bits);

        self.regs.set_bit(CR, PLLON);
        spin_until(self.timeout, || self.regs.is_set(CR, PLLRDY))?;
        Ok(())
    }

    /// Point SYSCLK at a source that is already running
    ///
    /// SW and the three bus prescalers go out in a single CFGR write, then
    /// the call waits for SWS to confirm the switch.
    pub fn select_sysclk(
        &mut self,
        source: SysclkSource,
        prescalers: BusPrescalers,
    ) -> Result<Clocks, ClockError> {
        if !self.is_ready(source) {
            return Err(ClockError::SourceNotReady(source));
        }
        let sysclk = match source {
            SysclkSource::Hsi => HSI_HZ,
            SysclkSource::Hse => HSE_HZ,
            SysclkSource::Pll => self.pll_config()?.sysclk_hz(),
        };
        prescalers.validate(sysclk)?;

        self.regs.modify(CFGR, |v| {
            let v = SW.insert(v, source.code());
            let v = HPRE.insert(v, prescalers.ahb.code());
            let v = PPRE1.insert(v, prescalers.apb1.code());
            PPRE2.insert(v, prescalers.apb2.code())
        });
        spin_until(self.timeout, || {
            self.regs.read_field(CFGR, SWS) == source.code()
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("SYSCLK now {} at {} Hz", source, sysclk);

        Ok(Clocks::new(sysclk, prescalers))
    }

    /// Start `source`, wait for it and make it SYSCLK
    pub fn switch_to(
        &mut self,
        source: ClockSource,
        prescalers: BusPrescalers,
    ) -> Result<Clocks, ClockError> {
        match source {
            ClockSource::Hsi => self.enable_oscillator(Oscillator::Hsi)?,
            ClockSource::Hse => self.enable_oscillator(Oscillator::Hse)?,
            ClockSource::Pll(cfg) => {
                // Leave the PLL before reprogramming it
                if self.current_source() == Some(SysclkSource::Pll) {
                    let feeder = match self.pll_config()?.source {
                        PllSource::Hsi => SysclkSource::Hsi,
                        PllSource::Hse => SysclkSource::Hse,
                    };
                    self.select_sysclk(feeder, BusPrescalers::UNDIVIDED)?;
                }
                self.configure_pll(&cfg)?;
            }
        }
        self.select_sysclk(source.sysclk_source(), prescalers)
    }
}
