//! Transfer errors
//!
//! Drivers check the error flags in the serial status registers after every
//! byte and report what they find instead of handing back a corrupted byte.

use crate::poll::TimedOut;

/// Errors from SPI and USART transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// A received byte was overwritten before it was read
    Overrun,
    /// Stop bit missing (USART)
    Framing,
    /// Parity check failed (USART)
    Parity,
    /// Noise detected on the line (USART)
    Noise,
    /// Another master drove NSS low while this one was master (SPI)
    ModeFault,
    /// Hardware CRC mismatch (SPI)
    Crc,
    /// The peer never completed the exchange within the poll budget
    Timeout,
}

impl From<TimedOut> for TransferError {
    fn from(_: TimedOut) -> Self {
        TransferError::Timeout
    }
}

impl embedded_io::Error for TransferError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            TransferError::Timeout => embedded_io::ErrorKind::TimedOut,
            TransferError::Parity | TransferError::Framing | TransferError::Crc => {
                embedded_io::ErrorKind::InvalidData
            }
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl core::fmt::Display for TransferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            TransferError::Overrun => "receive overrun",
            TransferError::Framing => "framing error",
            TransferError::Parity => "parity error",
            TransferError::Noise => "line noise",
            TransferError::ModeFault => "SPI mode fault",
            TransferError::Crc => "CRC mismatch",
            TransferError::Timeout => "transfer timed out",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn test_timeout_conversion() {
        let err: TransferError = TimedOut.into();
        assert_eq!(err, TransferError::Timeout);
        assert_eq!(err.kind(), embedded_io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_io_kind_mapping() {
        assert_eq!(
            TransferError::Parity.kind(),
            embedded_io::ErrorKind::InvalidData
        );
        assert_eq!(TransferError::Overrun.kind(), embedded_io::ErrorKind::Other);
    }
}
