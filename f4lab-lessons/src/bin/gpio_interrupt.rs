//! GPIO edge interrupt
//!
//! The main loop toggles the driver LED slowly. With a jumper from the
//! driver pin to the button input, every rising edge reaches the EXTI0
//! handler, which toggles the indicator LED. Pressing the button has the
//! same effect.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use f4lab_core::config::EdgeInterruptLesson;
use f4lab_core::exti::{Exti, Line};
use f4lab_core::gpio::GpioPort;
use f4lab_core::notify::EventFlag;
use f4lab_core::rcc::{Peripheral, Rcc};
use f4lab_lessons::chip::interrupt::Interrupt;
use f4lab_lessons::chip::{interrupt, irq, Mmio, Peripherals};
use f4lab_lessons::{report, spin_delay, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: EdgeInterruptLesson = EdgeInterruptLesson::for_board(&BOARD);

/// Everything the handler touches
struct Shared {
    exti: Exti<Mmio, Mmio>,
    line: Line,
    /// Port of the indicator LED
    indicator: GpioPort<Mmio>,
}

static SHARED: Mutex<CriticalSectionRawMutex, RefCell<Option<Shared>>> =
    Mutex::new(RefCell::new(None));

static EDGES: EventFlag = EventFlag::new();

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(mut p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure(&mut rcc, LESSON.driver, &LESSON.led_config)?;
    gpio.configure(&mut rcc, LESSON.indicator, &LESSON.led_config)?;
    gpio.configure(&mut rcc, LESSON.input, &LESSON.input_config)?;

    rcc.enable(Peripheral::Syscfg);
    let mut exti = Exti::new(p.exti, p.syscfg, &rcc)?;
    let indicator = gpio.take_port(LESSON.indicator.port)?;

    // Bound and published under one lock so the handler never sees the
    // line armed without its state
    let line = SHARED.lock(|cell| {
        let line = exti.bind_edge(LESSON.input, LESSON.edge, &mut p.nvic)?;
        cell.replace(Some(Shared {
            exti,
            line,
            indicator,
        }));
        Ok::<_, BringUpError>(line)
    })?;
    // The handler below is EXTI0's
    defmt::assert_eq!(irq(Interrupt::EXTI0), line.irq());
    info!("EXTI{=u8} armed on {} edge", line.index(), LESSON.edge);

    loop {
        toggle_driver(&mut gpio, &mut rcc)?;
        spin_delay(LESSON.delay_spins);
        if EDGES.take() {
            debug!("edges so far: {=u32}", EDGES.count());
        }
    }
}

/// Toggle the driver LED, through the shared port if the indicator lives there
fn toggle_driver(gpio: &mut Gpio, rcc: &mut Rcc<Mmio>) -> Result<(), BringUpError> {
    if LESSON.driver.port == LESSON.indicator.port {
        SHARED.lock(|cell| {
            if let Some(shared) = cell.borrow_mut().as_mut() {
                shared.indicator.toggle(LESSON.driver.index);
            }
        });
    } else {
        gpio.port(rcc, LESSON.driver.port)?.toggle(LESSON.driver.index);
    }
    Ok(())
}

#[interrupt]
fn EXTI0() {
    SHARED.lock(|cell| {
        if let Some(shared) = cell.borrow_mut().as_mut() {
            if shared.exti.is_pending(shared.line) {
                shared.exti.clear_pending(shared.line);
                shared.indicator.toggle(LESSON.indicator.index);
                EDGES.raise();
            }
        }
    });
}
