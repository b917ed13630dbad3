//! Clock security system
//!
//! Runs from the HSE with CSS armed. If the crystal stops, the hardware
//! falls back to the HSI and raises an NMI; the handler acknowledges it and
//! lights the fault LED, and the main loop reports the event.

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::{entry, exception};
use defmt::*;
use f4lab_core::config::CssLesson;
use f4lab_core::flash::Flash;
use f4lab_core::gpio::GpioPort;
use f4lab_core::notify::EventFlag;
use f4lab_core::rcc::Rcc;
use f4lab_hal::Timeout;
use f4lab_lessons::chip::peripherals::addr;
use f4lab_lessons::chip::{Mmio, Peripherals};
use f4lab_lessons::{report, spin_delay, switch_clock, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: CssLesson = CssLesson::for_board(&BOARD);

static HSE_FAILED: EventFlag = EventFlag::new();

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    info!("Clock security lesson");
    let mut rcc = Rcc::new(p.rcc).with_timeout(Timeout::Spins(500_000));
    let mut flash = Flash::new(p.flash).with_timeout(Timeout::Spins(500_000));
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure(&mut rcc, LESSON.fault_led, &f4lab_core::gpio::PinConfig::output())?;
    gpio.port(&mut rcc, LESSON.fault_led.port)?.set_low(LESSON.fault_led.index);

    switch_clock(&mut rcc, &mut flash, LESSON.source, LESSON.prescalers)?;
    rcc.enable_clock_security();
    info!("CSS armed; remove the crystal to trip it");

    loop {
        if HSE_FAILED.take() {
            warn!(
                "HSE failure #{=u32} acknowledged, running from HSI (current source {})",
                HSE_FAILED.count(),
                rcc.current_source()
            );
        }
        spin_delay(1_000_000);
    }
}

#[exception]
fn NonMaskableInt() {
    // SAFETY: an NMI cannot be masked, so no lock could protect handles
    // shared with main. The handler only touches CSSC and one BSRR bit,
    // both write-only side effects main never reads back. No logging here:
    // the NMI can preempt main while it holds the defmt logger.
    let mut rcc = Rcc::new(unsafe { Mmio::new(addr::RCC) });
    if !rcc.clock_security_tripped() {
        return;
    }
    rcc.clear_clock_security();

    let led = LESSON.fault_led;
    // SAFETY: as above
    let regs = unsafe { Mmio::new(addr::gpio(led.port.index() as usize)) };
    if let Ok(mut port) = GpioPort::new(regs, led.port, &rcc) {
        port.set_high(led.index);
    }
    HSE_FAILED.raise();
}
