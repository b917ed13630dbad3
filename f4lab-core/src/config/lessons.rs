//! One configuration record per lesson program
//!
//! Each record holds every parameter its program hands to the drivers. The
//! `DISCOVERY` constants are built from [`BoardPins::DISCOVERY`]; a different
//! board calls `for_board` with its own pin map.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::gpio::{Edge, Pull, Speed};
use f4lab_hal::spi::Mode;
use f4lab_hal::uart::UartConfig;
use heapless::Vec;

use super::board::{BoardPins, SpiPins, UartPins};
use crate::debug::LineEnding;
use crate::gpio::{AlreadyClaimed, AlternateFunction, Pin, PinClaims, PinConfig};
use crate::rcc::clocks::HSI_HZ;
use crate::rcc::{
    AhbPrescaler, ApbPrescaler, BusPrescalers, ClockSource, McoPrescaler, McoSource, PllConfig,
};
use crate::spi::{self, SpiConfig};
use crate::timer::{Channel, OcAction, TimerConfig, TimerInstance};
use crate::usart;

/// Most pins any single lesson drives
pub const MAX_LESSON_PINS: usize = 8;

/// Line printed by the UART redirection lesson
pub const UART_MESSAGE: &str = "Test String redirection to UART\n";

/// Line printed by the debugger redirection lesson
pub const DEBUGGER_MESSAGE: &str = "String redirection to STlink Debugger :-)\n";

/// Pins a lesson configures
pub trait LessonPins {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS>;

    /// Claim every pin, failing on the first one used twice
    fn claim_pins(&self) -> Result<PinClaims, AlreadyClaimed> {
        let mut claims = PinClaims::new();
        for pin in self.pins() {
            claims.claim(pin)?;
        }
        Ok(claims)
    }
}

fn pin_list(pins: &[Pin]) -> Vec<Pin, MAX_LESSON_PINS> {
    pins.iter().copied().take(MAX_LESSON_PINS).collect()
}

/// System clock source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockLesson {
    pub source: ClockSource,
    pub prescalers: BusPrescalers,
}

impl ClockLesson {
    /// Internal 16 MHz RC oscillator
    pub const HSI: Self = Self {
        source: ClockSource::Hsi,
        prescalers: BusPrescalers::UNDIVIDED,
    };

    /// External 8 MHz crystal
    pub const HSE: Self = Self {
        source: ClockSource::Hse,
        prescalers: BusPrescalers::UNDIVIDED,
    };

    /// 168 MHz from the HSI through the PLL; APB1 at 42 MHz, APB2 at 84 MHz
    pub const PLL_168MHZ: Self = Self {
        source: ClockSource::Pll(PllConfig::HSI_168MHZ),
        prescalers: BusPrescalers {
            ahb: AhbPrescaler::Div1,
            apb1: ApbPrescaler::Div4,
            apb2: ApbPrescaler::Div2,
        },
    };

    pub const DISCOVERY: Self = Self::PLL_168MHZ;
}

/// HSE as SYSCLK with the clock security system watching it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CssLesson {
    pub source: ClockSource,
    pub prescalers: BusPrescalers,
    /// LED lit by the NMI handler after a crystal failure
    pub fault_led: Pin,
}

impl CssLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            source: ClockSource::Hse,
            prescalers: BusPrescalers::UNDIVIDED,
            fault_led: board.red_led(),
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for CssLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.fault_led])
    }
}

/// Internal clock routed to the MCO1 pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct McoLesson {
    pub pin: Pin,
    pub pin_config: PinConfig,
    pub source: McoSource,
    pub prescaler: McoPrescaler,
}

impl McoLesson {
    /// HSI / 4 = 4 MHz, slow enough for a cheap logic analyzer
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            pin: board.mco1,
            pin_config: PinConfig::alternate(AlternateFunction::SYSTEM).with_speed(Speed::High),
            source: McoSource::Hsi,
            prescaler: McoPrescaler::Div4,
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);

    pub const fn output_hz(&self, source_hz: u32) -> u32 {
        source_hz / self.prescaler.divisor()
    }
}

impl LessonPins for McoLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.pin])
    }
}

/// LED toggled from a busy-wait loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlinkLesson {
    pub led: Pin,
    pub led_config: PinConfig,
    /// Iterations of the delay loop between toggles
    pub delay_spins: u32,
}

impl BlinkLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            led: board.status_led(),
            led_config: PinConfig::output(),
            delay_spins: 100_000,
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for BlinkLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.led])
    }
}

/// LED mirrors a push button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ButtonLesson {
    pub button: Pin,
    /// Pulled down so a released button reads low
    pub button_config: PinConfig,
    pub led: Pin,
    pub led_config: PinConfig,
}

impl ButtonLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            button: board.user_button,
            button_config: PinConfig::input()
                .with_speed(Speed::Medium)
                .with_pull(Pull::Down),
            led: board.status_led(),
            led_config: PinConfig::output(),
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for ButtonLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.button, self.led])
    }
}

/// Edge interrupt driven by another pin of the same board
///
/// `driver` is toggled from the main loop and wired externally to `input`;
/// each armed edge on `input` toggles `indicator` from the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeInterruptLesson {
    pub driver: Pin,
    pub input: Pin,
    pub input_config: PinConfig,
    pub edge: Edge,
    pub indicator: Pin,
    pub led_config: PinConfig,
    pub delay_spins: u32,
}

impl EdgeInterruptLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            driver: board.red_led(),
            input: board.user_button,
            input_config: PinConfig::input()
                .with_speed(Speed::Medium)
                .with_pull(Pull::Down),
            edge: Edge::Rising,
            indicator: board.status_led(),
            led_config: PinConfig::output(),
            delay_spins: 1_000_000,
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for EdgeInterruptLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.driver, self.input, self.indicator])
    }
}

/// Timer update interrupt toggling an LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerBlinkyLesson {
    pub timer: TimerInstance,
    /// 16 MHz / 1000 = 16 kHz counter clock, 8000 ticks = 0.5 s
    pub timer_config: TimerConfig,
    pub led: Pin,
    pub led_config: PinConfig,
}

impl TimerBlinkyLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            timer: TimerInstance::Tim2,
            timer_config: TimerConfig::new(999, 8000),
            led: board.status_led(),
            led_config: PinConfig::output(),
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for TimerBlinkyLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.led])
    }
}

/// Four compare channels of one timer toggling the four LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutputCompareLesson {
    pub timer: TimerInstance,
    pub timer_config: TimerConfig,
    pub action: OcAction,
    /// Channel, compare value and the pin it drives
    pub channels: [(Channel, u32, Pin); 4],
    pub pin_config: PinConfig,
}

impl OutputCompareLesson {
    /// TIM4 CH1..CH4 are hard-wired to PD12..PD15 through AF2
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            timer: TimerInstance::Tim4,
            timer_config: TimerConfig::new(999, 8000),
            action: OcAction::Toggle,
            channels: [
                (Channel::Ch1, 2000, board.leds[0]),
                (Channel::Ch2, 4000, board.leds[1]),
                (Channel::Ch3, 6000, board.leds[2]),
                (Channel::Ch4, 8000, board.leds[3]),
            ],
            pin_config: PinConfig::alternate(AlternateFunction::TIM3_5),
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for OutputCompareLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        self.channels.iter().map(|&(_, _, pin)| pin).collect()
    }
}

/// SPI master and slave on the same chip, wired back to back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiLoopbackLesson {
    pub master: spi::Instance,
    pub master_pins: SpiPins,
    pub slave: spi::Instance,
    pub slave_pins: SpiPins,
    pub pin_config: PinConfig,
    /// Shared by both ends
    pub config: SpiConfig,
    /// Byte the master sends
    pub master_byte: u8,
    /// Byte the slave stages as its reply
    pub slave_byte: u8,
}

impl SpiLoopbackLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            master: spi::Instance::Spi1,
            master_pins: board.spi_master,
            slave: spi::Instance::Spi2,
            slave_pins: board.spi_slave,
            pin_config: PinConfig::alternate(AlternateFunction::SPI1_2),
            config: SpiConfig::new(Mode::Mode2),
            master_byte: 0x55,
            slave_byte: 0xA7,
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for SpiLoopbackLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        let m = self.master_pins.all();
        let s = self.slave_pins.all();
        pin_list(&[m[0], m[1], m[2], s[0], s[1], s[2]])
    }
}

/// USART echoing every received byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartLesson {
    pub instance: usart::Instance,
    pub pins: UartPins,
    /// Pulled up so an idle, unconnected RX reads as a stop bit
    pub pin_config: PinConfig,
    pub config: UartConfig,
    /// Clock of the APB bus feeding the USART
    pub bus_hz: u32,
}

impl UartLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            instance: usart::Instance::Usart3,
            pins: board.uart,
            pin_config: PinConfig::alternate(AlternateFunction::USART1_3)
                .with_speed(Speed::Medium)
                .with_pull(Pull::Up),
            config: UartConfig::new(9600),
            bus_hz: HSI_HZ,
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for UartLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        pin_list(&[self.pins.tx, self.pins.rx])
    }
}

/// Formatted text sent over a USART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrintfUartLesson {
    pub uart: UartLesson,
    pub line_ending: LineEnding,
    /// Iterations of the delay loop between lines
    pub delay_spins: u32,
}

impl PrintfUartLesson {
    pub const fn for_board(board: &BoardPins) -> Self {
        Self {
            uart: UartLesson::for_board(board),
            line_ending: LineEnding::Lf,
            delay_spins: 5000,
        }
    }

    pub const DISCOVERY: Self = Self::for_board(&BoardPins::DISCOVERY);
}

impl LessonPins for PrintfUartLesson {
    fn pins(&self) -> Vec<Pin, MAX_LESSON_PINS> {
        self.uart.pins()
    }
}

/// Formatted text sent to the debugger through ITM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrintfDebuggerLesson {
    /// ITM stimulus port 0..=31
    pub stimulus_port: u8,
    pub delay_spins: u32,
}

impl PrintfDebuggerLesson {
    pub const DISCOVERY: Self = Self {
        stimulus_port: 0,
        delay_spins: 5000,
    };
}
