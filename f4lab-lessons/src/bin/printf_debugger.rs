//! Formatted output to the debugger
//!
//! Same as the UART lesson, but the characters go to ITM stimulus port 0
//! and show up in the debugger's SWO viewer. Without a debugger tracing, the
//! output is dropped and the loop keeps running.

#![no_std]
#![no_main]

use core::convert::Infallible;
use core::fmt::Write;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::{PrintfDebuggerLesson, DEBUGGER_MESSAGE};
use f4lab_core::debug::Printer;
use f4lab_lessons::chip::{ItmSink, Peripherals};
use f4lab_lessons::{report, spin_delay, take_peripherals, BringUpError};

const LESSON: PrintfDebuggerLesson = PrintfDebuggerLesson::DISCOVERY;

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(mut p: Peripherals) -> Result<Infallible, BringUpError> {
    let sink = ItmSink::new(&mut p.itm, LESSON.stimulus_port);
    if !sink.is_enabled() {
        warn!("ITM port {=u8} not enabled; start SWO tracing", LESSON.stimulus_port);
    }
    let mut out = Printer::new(sink);

    loop {
        if write!(out, "{}", DEBUGGER_MESSAGE).is_err() {
            warn!("format error");
        }
        spin_delay(LESSON.delay_spins);
    }
}
