//! GPIO output: blink an LED from a delay loop

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::BlinkLesson;
use f4lab_core::rcc::Rcc;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{report, spin_delay, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: BlinkLesson = BlinkLesson::for_board(&BOARD);

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure(&mut rcc, LESSON.led, &LESSON.led_config)?;
    let led = gpio.port(&mut rcc, LESSON.led.port)?;
    info!("blinking {}{=u8}", LESSON.led.port, LESSON.led.index);

    loop {
        led.toggle(LESSON.led.index);
        spin_delay(LESSON.delay_spins);
    }
}
