//! Timer output compare
//!
//! TIM4 drives the four LEDs directly through its compare outputs. Each
//! channel toggles its pin when the counter passes its compare value, so
//! the LEDs change one after another, a quarter period apart, with the CPU
//! idle.

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::OutputCompareLesson;
use f4lab_core::rcc::Rcc;
use f4lab_core::timer::Timer;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{report, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: OutputCompareLesson = OutputCompareLesson::for_board(&BOARD);

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    for (_, _, pin) in LESSON.channels {
        gpio.configure(&mut rcc, pin, &LESSON.pin_config)?;
    }

    rcc.enable(LESSON.timer.peripheral());
    let mut timer = Timer::new(p.tim4, LESSON.timer, &rcc)?;
    timer.configure(&LESSON.timer_config)?;
    for (channel, compare, _) in LESSON.channels {
        timer.set_output_compare(channel, compare, LESSON.action)?;
    }

    for (channel, compare) in timer.compare_schedule() {
        info!("{} toggles at tick {=u32}", channel, compare);
    }
    timer.start();

    loop {
        cortex_m::asm::wfi();
    }
}
