//! Debug character output
//!
//! A [`CharSink`] accepts one character at a time and blocks until the
//! transport has taken it. Formatted printing on top of a sink lives in
//! `f4lab-core::debug`.

/// Destination for debug characters
///
/// Implemented by the USART driver and by the ITM stimulus port.
pub trait CharSink {
    /// Send one character, blocking until the transport accepted it
    ///
    /// Returns the character that was sent, like a C-style `putchar`, or
    /// `None` where `putchar` would return EOF: the transport failed and the
    /// character was lost.
    fn put_char(&mut self, ch: u8) -> Option<u8>;

    /// Send every byte of `s`, stopping at the first lost character
    fn put_str(&mut self, s: &str) -> Option<()> {
        for &b in s.as_bytes() {
            self.put_char(b)?;
        }
        Some(())
    }
}

impl<T: CharSink + ?Sized> CharSink for &mut T {
    fn put_char(&mut self, ch: u8) -> Option<u8> {
        (**self).put_char(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capture {
        buf: [u8; 16],
        len: usize,
    }

    impl CharSink for Capture {
        fn put_char(&mut self, ch: u8) -> Option<u8> {
            *self.buf.get_mut(self.len)? = ch;
            self.len += 1;
            Some(ch)
        }
    }

    #[test]
    fn test_put_str_sends_every_byte() {
        let mut sink = Capture {
            buf: [0; 16],
            len: 0,
        };
        assert_eq!(sink.put_str("hi!"), Some(()));
        assert_eq!(&sink.buf[..sink.len], b"hi!");
    }

    #[test]
    fn test_put_char_returns_argument() {
        let mut sink = Capture {
            buf: [0; 16],
            len: 0,
        };
        let by_ref = &mut sink;
        assert_eq!(by_ref.put_char(b'x'), Some(b'x'));
        assert_eq!(sink.len, 1);
    }

    #[test]
    fn test_put_str_stops_at_lost_character() {
        let mut sink = Capture {
            buf: [0; 16],
            len: 14,
        };
        assert_eq!(sink.put_str("abcd"), None);
        assert_eq!(sink.len, 16);
        assert_eq!(&sink.buf[14..], b"ab");
    }
}
