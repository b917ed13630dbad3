//! Polled USART
//!
//! 16x oversampling, no hardware flow control. Transmission waits for TC
//! after every byte, so when [`Usart::send_byte`] returns the byte has left
//! the pin. Reception is polled: [`Usart::poll_receive`] returns `Ok(None)`
//! when nothing has arrived, which is not an error.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::uart::{DataBits, Parity, StopBits, UartConfig};
use f4lab_hal::{spin_until, CharSink, Field, Irq, RegisterBlock, Timeout, TransferError};

use crate::rcc::{Peripheral, Rcc};
use crate::ConfigError;

const SR: usize = 0x00;
const DR: usize = 0x04;
const BRR: usize = 0x08;
const CR1: usize = 0x0C;
const CR2: usize = 0x10;
const CR3: usize = 0x14;

// USART_SR
const PE: u8 = 0;
const FE: u8 = 1;
const NF: u8 = 2;
const ORE: u8 = 3;
const RXNE: u8 = 5;
const TC: u8 = 6;
const TXE: u8 = 7;

// USART_CR1
const RE: u8 = 2;
const TE: u8 = 3;
const PS: u8 = 9;
const PCE: u8 = 10;
const M: u8 = 12;
const UE: u8 = 13;

// USART_CR2
const STOP: Field = Field::new(12, 2);

// USART_CR3
const RTSE: u8 = 8;
const CTSE: u8 = 9;

const ERROR_FLAGS: u32 = (1 << PE) | (1 << FE) | (1 << NF) | (1 << ORE);

/// USART peripheral instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instance {
    Usart1,
    Usart2,
    Usart3,
}

impl Instance {
    pub const fn peripheral(self) -> Peripheral {
        match self {
            Instance::Usart1 => Peripheral::Usart1,
            Instance::Usart2 => Peripheral::Usart2,
            Instance::Usart3 => Peripheral::Usart3,
        }
    }

    pub const fn irq(self) -> Irq {
        match self {
            Instance::Usart1 => Irq(37),
            Instance::Usart2 => Irq(38),
            Instance::Usart3 => Irq(39),
        }
    }
}

/// BRR value for `baud` from a `bus_hz` peripheral clock
///
/// USARTDIV = bus / (16 * baud). The mantissa goes in bits 15:4 and the
/// fraction, rounded to the nearest sixteenth, in bits 3:0. A fraction that
/// rounds up to 16 carries into the mantissa.
pub fn baud_divisor(bus_hz: u32, baud: u32) -> Result<u32, ConfigError> {
    if baud == 0 {
        return Err(ConfigError::BaudRate);
    }
    // USARTDIV in sixteenths, rounded
    let div16 = (bus_hz as u64 + baud as u64 / 2) / baud as u64;
    let mantissa = div16 >> 4;
    if mantissa == 0 || mantissa > 0xFFF {
        return Err(ConfigError::BaudRate);
    }
    Ok(div16 as u32)
}

/// CR1 and CR2 bits for a frame format
///
/// The M bit counts the parity bit, so 7 data bits need parity and 9 data
/// bits cannot have it. 9-bit frames do not fit the byte interface and are
/// refused outright.
fn frame_bits(config: &UartConfig) -> Result<(u32, u32), ConfigError> {
    let parity = config.parity != Parity::None;
    let (m, pce) = match (config.data_bits, parity) {
        (DataBits::Seven, true) => (0, 1),
        (DataBits::Eight, false) => (0, 0),
        (DataBits::Eight, true) => (1, 1),
        _ => return Err(ConfigError::FrameFormat),
    };
    let ps = if config.parity == Parity::Odd { 1 } else { 0 };
    let cr1 = (m << M) | (pce << PCE) | (ps << PS);

    let stop = match config.stop_bits {
        StopBits::One => 0b00,
        StopBits::Half => 0b01,
        StopBits::Two => 0b10,
        StopBits::OneAndHalf => 0b11,
    };
    Ok((cr1, STOP.insert(0, stop)))
}

/// Owned handle to one USART
pub struct Usart<B> {
    regs: B,
    instance: Instance,
    timeout: Timeout,
    data_mask: u8,
}

impl<B: RegisterBlock> Usart<B> {
    /// Configure and enable `instance` for transmit and receive
    ///
    /// `bus_hz` is the clock of the bus the instance sits on (APB2 for
    /// USART1, APB1 otherwise). Everything is validated before the first
    /// register write.
    pub fn new<R: RegisterBlock>(
        mut regs: B,
        instance: Instance,
        config: &UartConfig,
        bus_hz: u32,
        rcc: &Rcc<R>,
    ) -> Result<Self, ConfigError> {
        rcc.assert_clocked(instance.peripheral())?;
        let brr = baud_divisor(bus_hz, config.baudrate)?;
        let (cr1_frame, cr2_stop) = frame_bits(config)?;

        regs.clear_bit(CR1, UE);
        regs.write(BRR, brr);
        regs.modify(CR3, |v| v & !((1 << RTSE) | (1 << CTSE)));
        regs.modify(CR2, |v| (v & !STOP.mask()) | cr2_stop);
        regs.modify(CR1, |v| {
            let keep = v & !((1 << M) | (1 << PCE) | (1 << PS));
            keep | cr1_frame | (1 << TE) | (1 << RE)
        });
        regs.set_bit(CR1, UE);

        let data_mask = if config.data_bits == DataBits::Seven {
            0x7F
        } else {
            0xFF
        };
        Ok(Self {
            regs,
            instance,
            timeout: Timeout::Never,
            data_mask,
        })
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    /// Send one byte and wait until it is completely on the wire
    pub fn send_byte(&mut self, byte: u8) -> Result<(), TransferError> {
        spin_until(self.timeout, || self.regs.is_set(SR, TXE))?;
        self.regs.write(DR, byte as u32);
        spin_until(self.timeout, || self.regs.is_set(SR, TC))?;
        Ok(())
    }

    /// Send every byte of `s` in order
    pub fn send_str(&mut self, s: &str) -> Result<(), TransferError> {
        s.bytes().try_for_each(|b| self.send_byte(b))
    }

    /// Return a received byte if one is waiting
    ///
    /// Error flags are checked first. Reading SR then DR clears them, so the
    /// byte that carried the error is consumed and discarded.
    pub fn poll_receive(&mut self) -> Result<Option<u8>, TransferError> {
        let sr = self.regs.read(SR);
        if sr & ERROR_FLAGS != 0 {
            let _ = self.regs.read(DR);
            return Err(if sr & (1 << ORE) != 0 {
                TransferError::Overrun
            } else if sr & (1 << FE) != 0 {
                TransferError::Framing
            } else if sr & (1 << PE) != 0 {
                TransferError::Parity
            } else {
                TransferError::Noise
            });
        }
        if sr & (1 << RXNE) != 0 {
            Ok(Some(self.regs.read(DR) as u8 & self.data_mask))
        } else {
            Ok(None)
        }
    }

    /// Wait for a byte
    pub fn receive_byte(&mut self) -> Result<u8, TransferError> {
        let ready = (1 << RXNE) | ERROR_FLAGS;
        spin_until(self.timeout, || self.regs.read(SR) & ready != 0)?;
        match self.poll_receive()? {
            Some(byte) => Ok(byte),
            None => Err(TransferError::Timeout),
        }
    }

    /// Wait until the last byte has left the shift register
    pub fn flush(&mut self) -> Result<(), TransferError> {
        spin_until(self.timeout, || self.regs.is_set(SR, TC))?;
        Ok(())
    }

    pub fn release(self) -> B {
        self.regs
    }
}

impl<B: RegisterBlock> CharSink for Usart<B> {
    fn put_char(&mut self, ch: u8) -> Option<u8> {
        self.send_byte(ch).ok()?;
        Some(ch)
    }
}

impl<B: RegisterBlock> f4lab_hal::UartTx for Usart<B> {
    type Error = TransferError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), TransferError> {
        data.iter().try_for_each(|&b| self.send_byte(b))
    }

    fn flush(&mut self) -> Result<(), TransferError> {
        Usart::flush(self)
    }
}

impl<B: RegisterBlock> f4lab_hal::UartRx for Usart<B> {
    type Error = TransferError;

    fn try_read_byte(&mut self) -> Result<Option<u8>, TransferError> {
        self.poll_receive()
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, TransferError> {
        for b in buf.iter_mut() {
            *b = self.receive_byte()?;
        }
        Ok(buf.len())
    }
}

impl<B: RegisterBlock> core::fmt::Write for Usart<B> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.send_str(s).map_err(|_| core::fmt::Error)
    }
}

impl<B> embedded_io::ErrorType for Usart<B> {
    type Error = TransferError;
}

impl<B: RegisterBlock> embedded_io::Write for Usart<B> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, TransferError> {
        for &b in buf {
            self.send_byte(b)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), TransferError> {
        Usart::flush(self)
    }
}

impl<B: RegisterBlock> embedded_io::Read for Usart<B> {
    /// Blocks for the first byte, then takes whatever else is already waiting
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransferError> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };
        *first = self.receive_byte()?;
        let mut n = 1;
        for b in rest {
            match self.poll_receive()? {
                Some(byte) => {
                    *b = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
