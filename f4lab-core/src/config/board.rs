//! Board pin map

use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::gpio::{Pin, Port};
use crate::ConfigError;

/// Clock, MISO and MOSI of one SPI endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiPins {
    pub sck: Pin,
    pub miso: Pin,
    pub mosi: Pin,
}

impl SpiPins {
    pub const fn all(&self) -> [Pin; 3] {
        [self.sck, self.miso, self.mosi]
    }
}

/// Transmit and receive pins of one USART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartPins {
    pub tx: Pin,
    pub rx: Pin,
}

/// Where each lesson signal is wired on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoardPins {
    /// Push button, reads high while pressed
    pub user_button: Pin,
    /// Green, orange, red and blue user LEDs, also TIM4 CH1..CH4
    pub leds: [Pin; 4],
    pub spi_master: SpiPins,
    pub spi_slave: SpiPins,
    pub uart: UartPins,
    /// Microcontroller clock output 1
    pub mco1: Pin,
}

impl BoardPins {
    /// STM32F4-Discovery
    pub const DISCOVERY: Self = Self {
        user_button: Pin::new(Port::A, 0),
        leds: [
            Pin::new(Port::D, 12),
            Pin::new(Port::D, 13),
            Pin::new(Port::D, 14),
            Pin::new(Port::D, 15),
        ],
        spi_master: SpiPins {
            sck: Pin::new(Port::A, 5),
            miso: Pin::new(Port::A, 6),
            mosi: Pin::new(Port::A, 7),
        },
        spi_slave: SpiPins {
            sck: Pin::new(Port::B, 10),
            miso: Pin::new(Port::C, 2),
            mosi: Pin::new(Port::C, 3),
        },
        uart: UartPins {
            tx: Pin::new(Port::B, 10),
            rx: Pin::new(Port::B, 11),
        },
        mco1: Pin::new(Port::A, 8),
    };

    pub const fn green_led(&self) -> Pin {
        self.leds[0]
    }

    pub const fn orange_led(&self) -> Pin {
        self.leds[1]
    }

    pub const fn red_led(&self) -> Pin {
        self.leds[2]
    }

    /// Blue LED, used as the status indicator
    pub const fn status_led(&self) -> Pin {
        self.leds[3]
    }

    pub fn pin(&self, role: PinRole) -> Pin {
        match role {
            PinRole::UserButton => self.user_button,
            PinRole::Led(n) => self.leds[n as usize % 4],
            PinRole::SpiMasterSck => self.spi_master.sck,
            PinRole::SpiMasterMiso => self.spi_master.miso,
            PinRole::SpiMasterMosi => self.spi_master.mosi,
            PinRole::SpiSlaveSck => self.spi_slave.sck,
            PinRole::SpiSlaveMiso => self.spi_slave.miso,
            PinRole::SpiSlaveMosi => self.spi_slave.mosi,
            PinRole::UartTx => self.uart.tx,
            PinRole::UartRx => self.uart.rx,
            PinRole::Mco1 => self.mco1,
        }
    }

    /// Copy of the map with `role` moved to `pin`
    pub fn with_pin(mut self, role: PinRole, pin: Pin) -> Self {
        let slot = match role {
            PinRole::UserButton => &mut self.user_button,
            PinRole::Led(n) => &mut self.leds[n as usize % 4],
            PinRole::SpiMasterSck => &mut self.spi_master.sck,
            PinRole::SpiMasterMiso => &mut self.spi_master.miso,
            PinRole::SpiMasterMosi => &mut self.spi_master.mosi,
            PinRole::SpiSlaveSck => &mut self.spi_slave.sck,
            PinRole::SpiSlaveMiso => &mut self.spi_slave.miso,
            PinRole::SpiSlaveMosi => &mut self.spi_slave.mosi,
            PinRole::UartTx => &mut self.uart.tx,
            PinRole::UartRx => &mut self.uart.rx,
            PinRole::Mco1 => &mut self.mco1,
        };
        *slot = pin;
        self
    }

    /// Apply a `role=pin` override such as `"uart_tx=PC10"`
    pub fn with_override(self, assignment: &str) -> Result<Self, ConfigError> {
        let (role, pin) = assignment
            .split_once('=')
            .ok_or(ConfigError::InvalidPinName)?;
        let role = PinRole::from_str(role)?;
        let pin = Pin::from_str(pin)?;
        Ok(self.with_pin(role, pin))
    }
}

impl Default for BoardPins {
    fn default() -> Self {
        Self::DISCOVERY
    }
}

/// A named signal in the board pin map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PinRole {
    UserButton,
    /// LED 0..=3
    Led(u8),
    SpiMasterSck,
    SpiMasterMiso,
    SpiMasterMosi,
    SpiSlaveSck,
    SpiSlaveMiso,
    SpiSlaveMosi,
    UartTx,
    UartRx,
    Mco1,
}

/// Parse a role name
///
/// Supports formats:
/// - "user_button", "mco1", "uart_tx", "spi_slave_miso", ...
/// - "led0" .. "led3"
impl FromStr for PinRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let role = match s {
            "user_button" => PinRole::UserButton,
            "spi_master_sck" => PinRole::SpiMasterSck,
            "spi_master_miso" => PinRole::SpiMasterMiso,
            "spi_master_mosi" => PinRole::SpiMasterMosi,
            "spi_slave_sck" => PinRole::SpiSlaveSck,
            "spi_slave_miso" => PinRole::SpiSlaveMiso,
            "spi_slave_mosi" => PinRole::SpiSlaveMosi,
            "uart_tx" => PinRole::UartTx,
            "uart_rx" => PinRole::UartRx,
            "mco1" => PinRole::Mco1,
            _ => {
                let n = s
                    .strip_prefix("led")
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or(ConfigError::InvalidPinName)?;
                if n > 3 {
                    return Err(ConfigError::PinOutOfRange);
                }
                PinRole::Led(n)
            }
        };
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_map() {
        let board = BoardPins::DISCOVERY;
        assert_eq!(board.user_button, Pin::new(Port::A, 0));
        assert_eq!(board.status_led(), Pin::new(Port::D, 15));
        assert_eq!(board.red_led(), Pin::new(Port::D, 14));
        assert_eq!(
            board.spi_master.all(),
            [Pin::new(Port::A, 5), Pin::new(Port::A, 6), Pin::new(Port::A, 7)]
        );
        assert_eq!(board.uart.tx, Pin::new(Port::B, 10));
        assert_eq!(board.uart.rx, Pin::new(Port::B, 11));
        assert_eq!(BoardPins::default(), board);
    }

    #[test]
    fn test_struct_update_override() {
        const CUSTOM: BoardPins = BoardPins {
            mco1: Pin::new(Port::C, 9),
            ..BoardPins::DISCOVERY
        };
        assert_eq!(CUSTOM.mco1, Pin::new(Port::C, 9));
        assert_eq!(CUSTOM.user_button, BoardPins::DISCOVERY.user_button);
    }

    #[test]
    fn test_string_override() {
        let board = BoardPins::DISCOVERY
            .with_override("uart_tx=PC10")
            .unwrap()
            .with_override(" led3 = pd13 ")
            .unwrap();
        assert_eq!(board.uart.tx, Pin::new(Port::C, 10));
        assert_eq!(board.status_led(), Pin::new(Port::D, 13));
        assert_eq!(board.pin(PinRole::UartRx), Pin::new(Port::B, 11));
    }

    #[test]
    fn test_bad_overrides() {
        let board = BoardPins::DISCOVERY;
        assert_eq!(
            board.with_override("uart_tx"),
            Err(ConfigError::InvalidPinName)
        );
        assert_eq!(
            board.with_override("buzzer=PA1"),
            Err(ConfigError::InvalidPinName)
        );
        assert_eq!(
            board.with_override("led4=PA1"),
            Err(ConfigError::PinOutOfRange)
        );
        assert_eq!(
            board.with_override("mco1=PA16"),
            Err(ConfigError::PinOutOfRange)
        );
    }

    #[test]
    fn test_pin_and_with_pin_agree() {
        let roles = [
            PinRole::UserButton,
            PinRole::Led(0),
            PinRole::Led(3),
            PinRole::SpiMasterSck,
            PinRole::SpiSlaveMosi,
            PinRole::UartRx,
            PinRole::Mco1,
        ];
        let target = Pin::new(Port::E, 7);
        for role in roles {
            let board = BoardPins::DISCOVERY.with_pin(role, target);
            assert_eq!(board.pin(role), target);
        }
    }
}
