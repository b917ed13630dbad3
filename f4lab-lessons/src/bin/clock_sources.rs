//! Clock sources: HSI, HSE and the PLL as SYSCLK
//!
//! Walks through each source in turn and logs the resulting bus clocks,
//! then stays on the 168 MHz PLL. A board without a crystal reports the
//! HSE timeout and moves on.

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::ClockLesson;
use f4lab_core::flash::Flash;
use f4lab_core::rcc::Rcc;
use f4lab_hal::Timeout;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{park, report, switch_clock, take_peripherals, BringUpError};

/// Polls of a ready bit before an oscillator is declared missing
const READY_SPINS: u32 = 500_000;

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    info!("Clock sources lesson");
    let mut rcc = Rcc::new(p.rcc).with_timeout(Timeout::Spins(READY_SPINS));
    let mut flash = Flash::new(p.flash).with_timeout(Timeout::Spins(READY_SPINS));

    for (name, lesson) in [
        ("HSI", ClockLesson::HSI),
        ("HSE", ClockLesson::HSE),
        ("PLL", ClockLesson::PLL_168MHZ),
    ] {
        match switch_clock(&mut rcc, &mut flash, lesson.source, lesson.prescalers) {
            Ok(clocks) => info!("{=str}: SYSCLK {=u32} Hz", name, clocks.sysclk),
            Err(e) => warn!("{=str}: not available ({})", name, e),
        }
    }

    let lesson = ClockLesson::DISCOVERY;
    let clocks = switch_clock(&mut rcc, &mut flash, lesson.source, lesson.prescalers)?;
    info!(
        "settled at {=u32} Hz, flash latency {=u8}",
        clocks.sysclk,
        flash.latency().wait_states()
    );
    park()
}
