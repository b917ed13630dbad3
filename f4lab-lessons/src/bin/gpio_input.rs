//! GPIO input: the LED follows the user button

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::ButtonLesson;
use f4lab_core::rcc::Rcc;
use f4lab_hal::{InputPin, OutputPin};
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{report, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: ButtonLesson = ButtonLesson::for_board(&BOARD);

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure(&mut rcc, LESSON.button, &LESSON.button_config)?;
    gpio.configure(&mut rcc, LESSON.led, &LESSON.led_config)?;
    info!("press the button on {}{=u8}", LESSON.button.port, LESSON.button.index);

    let mut was_pressed = false;
    loop {
        let pressed = gpio
            .port(&mut rcc, LESSON.button.port)?
            .pin(LESSON.button.index)?
            .is_high();
        gpio.port(&mut rcc, LESSON.led.port)?
            .pin(LESSON.led.index)?
            .set_state(pressed);

        if pressed != was_pressed {
            debug!("button {=bool}", pressed);
            was_pressed = pressed;
        }
    }
}
