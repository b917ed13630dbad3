//! Instrumentation trace macrocell output
//!
//! Characters written to an ITM stimulus port reach the debugger over
//! SWO. The debugger enables the ITM and the port when it starts tracing;
//! until then characters are discarded instead of blocking forever.

use cortex_m::peripheral::ITM;
use f4lab_hal::CharSink;

// ITM_TCR
const ITMENA: u32 = 1 << 0;

/// One ITM stimulus port
pub struct ItmSink<'a> {
    itm: &'a mut ITM,
    port: usize,
}

impl<'a> ItmSink<'a> {
    /// `port` is taken modulo 32, the number of stimulus ports
    pub fn new(itm: &'a mut ITM, port: u8) -> Self {
        Self {
            itm,
            port: (port % 32) as usize,
        }
    }

    /// Whether a debugger has enabled tracing on this port
    pub fn is_enabled(&self) -> bool {
        let tcr = self.itm.tcr.read();
        let ter = self.itm.ter[0].read();
        tcr & ITMENA != 0 && ter & (1 << self.port) != 0
    }
}

impl CharSink for ItmSink<'_> {
    /// A disabled port counts as accepted: nobody is listening to lose it
    fn put_char(&mut self, ch: u8) -> Option<u8> {
        if self.is_enabled() {
            let stim = &mut self.itm.stim[self.port];
            while !stim.is_fifo_ready() {
                core::hint::spin_loop();
            }
            stim.write_u8(ch);
        }
        Some(ch)
    }
}
