//! Polled SPI master and slave
//!
//! Frames are always 8 bits, full duplex, software slave management. Both
//! ends of a link must agree on clock mode and bit order; nothing checks it.
//!
//! The master has no way of knowing whether the slave has been enabled and
//! has its reply staged before the first byte is clocked. If it has not, the
//! slave simply misses the byte and the master reads whatever MISO idles at.
//! Sequencing the two ends is left to the caller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::spi::{BitOrder, Mode, Phase, Polarity};
use f4lab_hal::{spin_until, Field, Irq, RegisterBlock, Timeout, TransferError};

use crate::rcc::{Peripheral, Rcc};
use crate::ConfigError;

const CR1: usize = 0x00;
const SR: usize = 0x08;
const DR: usize = 0x0C;

// SPI_CR1
const CPHA: u8 = 0;
const CPOL: u8 = 1;
const MSTR: u8 = 2;
const BR: Field = Field::new(3, 3);
const SPE: u8 = 6;
const LSBFIRST: u8 = 7;
const SSI: u8 = 8;
const SSM: u8 = 9;

// SPI_SR
const RXNE: u8 = 0;
const TXE: u8 = 1;
const CRCERR: u8 = 4;
const MODF: u8 = 5;
const OVR: u8 = 6;
const BSY: u8 = 7;

/// SPI peripheral instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instance {
    Spi1,
    Spi2,
    Spi3,
}

impl Instance {
    pub const fn peripheral(self) -> Peripheral {
        match self {
            Instance::Spi1 => Peripheral::Spi1,
            Instance::Spi2 => Peripheral::Spi2,
            Instance::Spi3 => Peripheral::Spi3,
        }
    }

    pub const fn irq(self) -> Irq {
        match self {
            Instance::Spi1 => Irq(35),
            Instance::Spi2 => Irq(36),
            Instance::Spi3 => Irq(51),
        }
    }
}

/// Master clock divider applied to the peripheral's bus clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BaudPrescaler {
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
    Div256,
}

impl BaudPrescaler {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn divisor(self) -> u32 {
        2 << self.code()
    }
}

/// Clock mode, bit order and (master only) SCK divider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiConfig {
    pub mode: Mode,
    pub bit_order: BitOrder,
    /// Ignored by a slave
    pub prescaler: BaudPrescaler,
}

impl SpiConfig {
    /// MSB first at bus clock / 16
    pub const fn new(mode: Mode) -> Self {
        Self {
            mode,
            bit_order: BitOrder::MsbFirst,
            prescaler: BaudPrescaler::Div16,
        }
    }

    pub const fn with_prescaler(mut self, prescaler: BaudPrescaler) -> Self {
        self.prescaler = prescaler;
        self
    }

    pub const fn with_bit_order(mut self, bit_order: BitOrder) -> Self {
        self.bit_order = bit_order;
        self
    }

    /// CR1 value shared by both roles: clock mode, bit order, SSM, 8-bit
    /// full duplex, CRC off, SPE clear
    fn cr1_common(&self) -> u32 {
        let (polarity, phase): (Polarity, Phase) = self.mode.into();
        let mut cr1 = 1 << SSM;
        if polarity == Polarity::IdleHigh {
            cr1 |= 1 << CPOL;
        }
        if phase == Phase::CaptureOnSecondTransition {
            cr1 |= 1 << CPHA;
        }
        if self.bit_order == BitOrder::LsbFirst {
            cr1 |= 1 << LSBFIRST;
        }
        cr1
    }
}

/// Translate the error flags in an SR value, if any
fn check_errors(sr: u32) -> Result<(), TransferError> {
    if sr & (1 << MODF) != 0 {
        Err(TransferError::ModeFault)
    } else if sr & (1 << OVR) != 0 {
        Err(TransferError::Overrun)
    } else if sr & (1 << CRCERR) != 0 {
        Err(TransferError::Crc)
    } else {
        Ok(())
    }
}

/// Clear whichever error flag `err` reports
fn clear_error<B: RegisterBlock>(regs: &mut B, err: TransferError) {
    match err {
        // Read SR (already done), then write CR1. The fault also dropped
        // MSTR and SPE, so restore them.
        TransferError::ModeFault => regs.modify(CR1, |v| v | (1 << MSTR) | (1 << SPE)),
        // Read DR, then read SR
        TransferError::Overrun => {
            let _ = regs.read(DR);
            let _ = regs.read(SR);
        }
        TransferError::Crc => regs.clear_bit(SR, CRCERR),
        _ => {}
    }
}

/// SPI bus master with software NSS held high
pub struct SpiMaster<B> {
    regs: B,
    instance: Instance,
    timeout: Timeout,
}

impl<B: RegisterBlock> SpiMaster<B> {
    /// Configure and enable `instance` as master
    pub fn new<R: RegisterBlock>(
        mut regs: B,
        instance: Instance,
        config: &SpiConfig,
        rcc: &Rcc<R>,
    ) -> Result<Self, ConfigError> {
        rcc.assert_clocked(instance.peripheral())?;

        regs.clear_bit(CR1, SPE);
        let cr1 = BR.insert(config.cr1_common(), config.prescaler.code())
            | (1 << MSTR)
            | (1 << SSI);
        regs.write(CR1, cr1);
        regs.set_bit(CR1, SPE);

        Ok(Self {
            regs,
            instance,
            timeout: Timeout::Never,
        })
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    /// Send `out` and return the byte clocked in at the same time
    ///
    /// Waits for TXE before writing DR, then for RXNE, which on a master is
    /// set once all eight bits have been shifted.
    pub fn transfer(&mut self, out: u8) -> Result<u8, TransferError> {
        spin_until(self.timeout, || self.regs.is_set(SR, TXE))?;
        self.regs.write(DR, out as u32);

        let ready = (1 << RXNE) | (1 << MODF);
        spin_until(self.timeout, || self.regs.read(SR) & ready != 0)?;

        let sr = self.regs.read(SR);
        if let Err(e) = check_errors(sr) {
            clear_error(&mut self.regs, e);
            return Err(e);
        }
        Ok(self.regs.read(DR) as u8)
    }

    pub fn is_busy(&self) -> bool {
        self.regs.is_set(SR, BSY)
    }

    /// Wait for the last frame to finish, then turn the peripheral off
    pub fn disable(&mut self) -> Result<(), TransferError> {
        spin_until(self.timeout, || !self.regs.is_set(SR, BSY))?;
        self.regs.clear_bit(CR1, SPE);
        Ok(())
    }

    pub fn release(self) -> B {
        self.regs
    }
}

impl<B: RegisterBlock> f4lab_hal::SpiBus for SpiMaster<B> {
    type Error = TransferError;

    fn transfer_byte(&mut self, byte: u8) -> Result<u8, TransferError> {
        self.transfer(byte)
    }
}

/// SPI slave selected permanently through software NSS
pub struct SpiSlave<B> {
    regs: B,
    instance: Instance,
    timeout: Timeout,
}

impl<B: RegisterBlock> SpiSlave<B> {
    /// Configure and enable `instance` as slave
    pub fn new<R: RegisterBlock>(
        mut regs: B,
        instance: Instance,
        config: &SpiConfig,
        rcc: &Rcc<R>,
    ) -> Result<Self, ConfigError> {
        rcc.assert_clocked(instance.peripheral())?;

        regs.clear_bit(CR1, SPE);
        // SSM with SSI low: NSS reads as asserted
        regs.write(CR1, config.cr1_common());
        regs.set_bit(CR1, SPE);

        Ok(Self {
            regs,
            instance,
            timeout: Timeout::Never,
        })
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    /// Load the byte shifted out during the master's next transfer
    pub fn stage(&mut self, byte: u8) -> Result<(), TransferError> {
        spin_until(self.timeout, || self.regs.is_set(SR, TXE))?;
        self.regs.write(DR, byte as u32);
        Ok(())
    }

    /// Return the last received byte if one is waiting
    pub fn try_read(&mut self) -> Result<Option<u8>, TransferError> {
        let sr = self.regs.read(SR);
        if let Err(e) = check_errors(sr) {
            clear_error(&mut self.regs, e);
            return Err(e);
        }
        if sr & (1 << RXNE) != 0 {
            Ok(Some(self.regs.read(DR) as u8))
        } else {
            Ok(None)
        }
    }

    /// Stage `out`, then wait for the master to clock a byte in
    pub fn transfer(&mut self, out: u8) -> Result<u8, TransferError> {
        self.stage(out)?;
        spin_until(self.timeout, || self.regs.is_set(SR, RXNE))?;
        match self.try_read()? {
            Some(byte) => Ok(byte),
            None => Err(TransferError::Timeout),
        }
    }

    pub fn release(self) -> B {
        self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimRcc, SimSpi, SpiLink};
    use f4lab_hal::SpiBus;

    fn clocked() -> SimRcc {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);
        rcc.enable(Peripheral::Spi1);
        rcc.enable(Peripheral::Spi2);
        sim
    }

    #[test]
    fn test_master_cr1_matches_lesson_setup() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);

        let config = SpiConfig::new(Mode::Mode2);
        let _master = SpiMaster::new(&spi1, Instance::Spi1, &config, &rcc).unwrap();

        // CPOL=1, CPHA=0, MSTR, BR=/16, SPE, SSI, SSM
        let cr1 = spi1.peek(CR1);
        assert_eq!(cr1, 0b11_0101_1110);
    }

    #[test]
    fn test_slave_cr1() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi2 = SimSpi::slave(&link);

        let config = SpiConfig::new(Mode::Mode2);
        let _slave = SpiSlave::new(&spi2, Instance::Spi2, &config, &rcc).unwrap();

        let cr1 = spi2.peek(CR1);
        assert_eq!(cr1 & (1 << MSTR), 0);
        assert_eq!(cr1 & (1 << SSI), 0);
        assert_ne!(cr1 & (1 << SSM), 0);
        assert_ne!(cr1 & (1 << CPOL), 0);
        assert_ne!(cr1 & (1 << SPE), 0);
    }

    #[test]
    fn test_unclocked_spi_rejected() {
        let rcc_sim = SimRcc::new();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);

        let result = SpiMaster::new(&spi1, Instance::Spi1, &SpiConfig::new(Mode::Mode0), &rcc);
        assert!(matches!(result, Err(ConfigError::NotClocked)));
    }

    #[test]
    fn test_loopback_identity() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);
        let spi2 = SimSpi::slave(&link);
        let config = SpiConfig::new(Mode::Mode2);

        let mut slave = SpiSlave::new(&spi2, Instance::Spi2, &config, &rcc).unwrap();
        let mut master = SpiMaster::new(&spi1, Instance::Spi1, &config, &rcc).unwrap();

        slave.stage(0xA7).unwrap();
        assert_eq!(master.transfer(0x55), Ok(0xA7));
        assert_eq!(slave.try_read(), Ok(Some(0x55)));
        assert_eq!(slave.try_read(), Ok(None));
    }

    #[test]
    fn test_master_before_slave_enabled_is_lost() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);
        let spi2 = SimSpi::slave(&link);
        let config = SpiConfig::new(Mode::Mode2);

        let mut master = SpiMaster::new(&spi1, Instance::Spi1, &config, &rcc).unwrap();
        // Slave not up yet: the byte goes nowhere and no flag says so
        assert_eq!(master.transfer(0x55), Ok(0xFF));

        let mut slave = SpiSlave::new(&spi2, Instance::Spi2, &config, &rcc).unwrap();
        assert_eq!(slave.try_read(), Ok(None));
    }

    #[test]
    fn test_slave_overrun_reported() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);
        let spi2 = SimSpi::slave(&link);
        let config = SpiConfig::new(Mode::Mode0);

        let mut slave = SpiSlave::new(&spi2, Instance::Spi2, &config, &rcc).unwrap();
        let mut master = SpiMaster::new(&spi1, Instance::Spi1, &config, &rcc).unwrap();

        master.write(&[0x01, 0x02]).unwrap();
        assert_eq!(slave.try_read(), Err(TransferError::Overrun));
        // Clearing the overrun consumed the stale byte
        assert_eq!(slave.try_read(), Ok(None));
    }

    #[test]
    fn test_mode_fault_reported_and_cleared() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);
        let config = SpiConfig::new(Mode::Mode0);
        let mut master = SpiMaster::new(&spi1, Instance::Spi1, &config, &rcc).unwrap();

        link.raise_mode_fault();
        assert_eq!(master.transfer(0x11), Err(TransferError::ModeFault));
        assert_ne!(spi1.peek(CR1) & (1 << MSTR), 0);
        assert_ne!(spi1.peek(CR1) & (1 << SPE), 0);
    }

    #[test]
    fn test_slave_transfer_times_out_without_master() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi2 = SimSpi::slave(&link);
        let mut slave = SpiSlave::new(&spi2, Instance::Spi2, &SpiConfig::new(Mode::Mode0), &rcc)
            .unwrap()
            .with_timeout(Timeout::Spins(100));

        assert_eq!(slave.transfer(0x00), Err(TransferError::Timeout));
    }

    #[test]
    fn test_bus_trait_buffers() {
        let rcc_sim = clocked();
        let rcc = Rcc::new(&rcc_sim);
        let link = SpiLink::new();
        let spi1 = SimSpi::master(&link);
        let spi2 = SimSpi::slave(&link);
        let config = SpiConfig::new(Mode::Mode3).with_prescaler(BaudPrescaler::Div256);

        let mut slave = SpiSlave::new(&spi2, Instance::Spi2, &config, &rcc).unwrap();
        let mut master = SpiMaster::new(&spi1, Instance::Spi1, &config, &rcc).unwrap();
        assert_eq!(BR.extract(spi1.peek(CR1)), 0b111);

        let mut buf = [0x10, 0x20];
        for expected in buf {
            slave.stage(!expected).unwrap();
            let got = master.transfer_byte(expected).unwrap();
            assert_eq!(got, !expected);
            assert_eq!(slave.try_read(), Ok(Some(expected)));
        }
        buf[0] = 0;
        master.transfer_in_place(&mut buf[..1]).unwrap();
        assert_eq!(slave.try_read(), Ok(Some(0)));
    }
}
