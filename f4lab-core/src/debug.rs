//! Formatted debug output
//!
//! [`Printer`] turns any [`CharSink`] into a [`core::fmt::Write`], so
//! `write!`/`writeln!` can target the USART or the ITM stimulus port alike.

use core::fmt;

use f4lab_hal::CharSink;

/// Line ending applied to each `\n` written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LineEnding {
    /// Pass `\n` through unchanged
    #[default]
    Lf,
    /// Expand `\n` to `\r\n` for serial terminals
    CrLf,
}

/// `fmt::Write` adapter over a character sink
pub struct Printer<S> {
    sink: S,
    line_ending: LineEnding,
    written: usize,
}

impl<S: CharSink> Printer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            line_ending: LineEnding::Lf,
            written: 0,
        }
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Characters the sink accepted so far, including inserted `\r`
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn sink(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    fn put(&mut self, ch: u8) -> fmt::Result {
        self.sink.put_char(ch).ok_or(fmt::Error)?;
        self.written += 1;
        Ok(())
    }
}

impl<S: CharSink> fmt::Write for Printer<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            if b == b'\n' && self.line_ending == LineEnding::CrLf {
                self.put(b'\r')?;
            }
            self.put(b)?;
        }
        Ok(())
    }
}
