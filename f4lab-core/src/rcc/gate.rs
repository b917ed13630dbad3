//! Peripheral clock gates
//!
//! A peripheral's registers only respond once its bus clock is enabled.
//! Until then reads return zero and writes are dropped without any fault,
//! so every handle constructor in this crate checks the gate first.

use f4lab_hal::RegisterBlock;

use super::{Rcc, AHB1ENR, APB1ENR, APB2ENR};
use crate::ConfigError;

/// Peripheral bus a clock gate sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bus {
    Ahb1,
    Apb1,
    Apb2,
}

impl Bus {
    /// Offset of the bus's clock enable register in the RCC block
    pub const fn enable_register(self) -> usize {
        match self {
            Bus::Ahb1 => AHB1ENR,
            Bus::Apb1 => APB1ENR,
            Bus::Apb2 => APB2ENR,
        }
    }
}

/// A peripheral with a clock gate in the RCC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    GpioA,
    GpioB,
    GpioC,
    GpioD,
    GpioE,
    GpioF,
    GpioG,
    GpioH,
    GpioI,
    Tim2,
    Tim3,
    Tim4,
    Tim5,
    Spi2,
    Spi3,
    Usart2,
    Usart3,
    Usart1,
    Spi1,
    Syscfg,
}

impl Peripheral {
    /// Bus the peripheral is clocked from
    pub const fn bus(self) -> Bus {
        match self {
            Peripheral::GpioA
            | Peripheral::GpioB
            | Peripheral::GpioC
            | Peripheral::GpioD
            | Peripheral::GpioE
            | Peripheral::GpioF
            | Peripheral::GpioG
            | Peripheral::GpioH
            | Peripheral::GpioI => Bus::Ahb1,
            Peripheral::Tim2
            | Peripheral::Tim3
            | Peripheral::Tim4
            | Peripheral::Tim5
            | Peripheral::Spi2
            | Peripheral::Spi3
            | Peripheral::Usart2
            | Peripheral::Usart3 => Bus::Apb1,
            Peripheral::Usart1 | Peripheral::Spi1 | Peripheral::Syscfg => Bus::Apb2,
        }
    }

    /// Enable bit in the bus's enable register
    pub const fn enable_bit(self) -> u8 {
        match self {
            Peripheral::GpioA => 0,
            Peripheral::GpioB => 1,
            Peripheral::GpioC => 2,
            Peripheral::GpioD => 3,
            Peripheral::GpioE => 4,
            Peripheral::GpioF => 5,
            Peripheral::GpioG => 6,
            Peripheral::GpioH => 7,
            Peripheral::GpioI => 8,
            Peripheral::Tim2 => 0,
            Peripheral::Tim3 => 1,
            Peripheral::Tim4 => 2,
            Peripheral::Tim5 => 3,
            Peripheral::Spi2 => 14,
            Peripheral::Spi3 => 15,
            Peripheral::Usart2 => 17,
            Peripheral::Usart3 => 18,
            Peripheral::Usart1 => 4,
            Peripheral::Spi1 => 12,
            Peripheral::Syscfg => 14,
        }
    }
}

impl<B: RegisterBlock> Rcc<B> {
    /// Turn on the bus clock to `peripheral`
    ///
    /// Idempotent. Must precede any access to the peripheral's registers.
    pub fn enable(&mut self, peripheral: Peripheral) {
        let reg = peripheral.bus().enable_register();
        self.regs.set_bit(reg, peripheral.enable_bit());
        // The gate takes effect a couple of bus cycles after the write;
        // reading the register back stalls until it has.
        let _ = self.regs.read(reg);
    }

    /// Turn off the bus clock to `peripheral`
    pub fn disable(&mut self, peripheral: Peripheral) {
        self.regs
            .clear_bit(peripheral.bus().enable_register(), peripheral.enable_bit());
    }

    /// Whether `peripheral` is currently clocked
    pub fn is_enabled(&self, peripheral: Peripheral) -> bool {
        self.regs
            .is_set(peripheral.bus().enable_register(), peripheral.enable_bit())
    }

    /// Fail with [`ConfigError::NotClocked`] unless `peripheral` is clocked
    pub fn assert_clocked(&self, peripheral: Peripheral) -> Result<(), ConfigError> {
        if self.is_enabled(peripheral) {
            Ok(())
        } else {
            Err(ConfigError::NotClocked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRcc;

    #[test]
    fn test_enable_sets_only_its_bit() {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);

        rcc.enable(Peripheral::GpioD);
        rcc.enable(Peripheral::Usart3);
        rcc.enable(Peripheral::Syscfg);

        assert_eq!(sim.peek(AHB1ENR), 1 << 3);
        assert_eq!(sim.peek(APB1ENR), 1 << 18);
        assert_eq!(sim.peek(APB2ENR), 1 << 14);
    }

    #[test]
    fn test_enable_is_idempotent() {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);

        rcc.enable(Peripheral::Spi1);
        let once = sim.peek(APB2ENR);
        rcc.enable(Peripheral::Spi1);
        assert_eq!(sim.peek(APB2ENR), once);
        assert!(rcc.is_enabled(Peripheral::Spi1));

        rcc.disable(Peripheral::Spi1);
        rcc.disable(Peripheral::Spi1);
        assert!(!rcc.is_enabled(Peripheral::Spi1));
    }

    #[test]
    fn test_assert_clocked() {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);

        assert_eq!(
            rcc.assert_clocked(Peripheral::Tim4),
            Err(ConfigError::NotClocked)
        );
        rcc.enable(Peripheral::Tim4);
        assert_eq!(rcc.assert_clocked(Peripheral::Tim4), Ok(()));
    }

    #[test]
    fn test_same_bit_on_different_buses() {
        // TIM2 (APB1 bit 0) and GPIOA (AHB1 bit 0) must not alias
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);

        rcc.enable(Peripheral::Tim2);
        assert!(!rcc.is_enabled(Peripheral::GpioA));
    }
}
