//! Polled USART echo
//!
//! USART3 on PB10/PB11 at 9600 8N1. Every byte received is sent straight
//! back. Receive errors are logged and the echo continues.

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use embedded_io::{Read, Write};
use f4lab_core::config::UartLesson;
use f4lab_core::rcc::Rcc;
use f4lab_core::usart::Usart;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{report, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: UartLesson = UartLesson::for_board(&BOARD);

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure_all(&mut rcc, &[LESSON.pins.tx, LESSON.pins.rx], &LESSON.pin_config)?;
    rcc.enable(LESSON.instance.peripheral());
    let mut uart = Usart::new(p.usart3, LESSON.instance, &LESSON.config, LESSON.bus_hz, &rcc)?;
    info!("{} echoing at {=u32} baud", LESSON.instance, LESSON.config.baudrate);

    let mut buf = [0u8; 16];
    loop {
        match uart.read(&mut buf) {
            Ok(n) => {
                trace!("echo {=[u8]}", &buf[..n]);
                uart.write_all(&buf[..n])?;
            }
            Err(e) => warn!("receive error: {}", e),
        }
    }
}
