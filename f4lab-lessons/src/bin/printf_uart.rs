//! Formatted output over the USART
//!
//! `core::fmt` writes through a [`Printer`] into USART3, so `write!` works
//! the way `printf` would on a hosted system.

#![no_std]
#![no_main]

use core::convert::Infallible;
use core::fmt::Write;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::{PrintfUartLesson, UART_MESSAGE};
use f4lab_core::debug::Printer;
use f4lab_core::rcc::Rcc;
use f4lab_core::usart::Usart;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{report, spin_delay, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: PrintfUartLesson = PrintfUartLesson::for_board(&BOARD);

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let uart_lesson = LESSON.uart;
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure_all(
        &mut rcc,
        &[uart_lesson.pins.tx, uart_lesson.pins.rx],
        &uart_lesson.pin_config,
    )?;
    rcc.enable(uart_lesson.instance.peripheral());
    let uart = Usart::new(
        p.usart3,
        uart_lesson.instance,
        &uart_lesson.config,
        uart_lesson.bus_hz,
        &rcc,
    )?;
    let mut out = Printer::new(uart).with_line_ending(LESSON.line_ending);
    info!("printing to {}", uart_lesson.instance);

    loop {
        if write!(out, "{}", UART_MESSAGE).is_err() {
            warn!("UART dropped a character");
        }
        spin_delay(LESSON.delay_spins);
        trace!("{=usize} characters sent", out.written());
    }
}
