//! Clock output on MCO1
//!
//! Routes HSI / 4 to PA8 so the clock can be checked with a scope.

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::McoLesson;
use f4lab_core::rcc::clocks::HSI_HZ;
use f4lab_core::rcc::Rcc;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{park, report, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: McoLesson = McoLesson::for_board(&BOARD);

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure(&mut rcc, LESSON.pin, &LESSON.pin_config)?;
    rcc.configure_mco1(LESSON.source, LESSON.prescaler);

    info!(
        "MCO1 on {}{=u8}: {} / {=u32} = {=u32} Hz",
        LESSON.pin.port,
        LESSON.pin.index,
        LESSON.source,
        LESSON.prescaler.divisor(),
        LESSON.output_hz(HSI_HZ)
    );
    park()
}
