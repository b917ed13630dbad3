//! Timer interrupt blinky
//!
//! TIM2 counts the 16 MHz HSI down to 16 kHz and overflows every 8000
//! ticks. Each update interrupt toggles the LED, so it changes state
//! twice a second without any delay loop.

#![no_std]
#![no_main]

use core::cell::RefCell;
use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use f4lab_core::config::TimerBlinkyLesson;
use f4lab_core::gpio::GpioPort;
use f4lab_core::notify::EventFlag;
use f4lab_core::rcc::clocks::HSI_HZ;
use f4lab_core::rcc::Rcc;
use f4lab_core::timer::{Event, Timer};
use f4lab_hal::InterruptController;
use f4lab_lessons::chip::interrupt::Interrupt;
use f4lab_lessons::chip::{interrupt, irq, Mmio, Peripherals};
use f4lab_lessons::{report, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: TimerBlinkyLesson = TimerBlinkyLesson::for_board(&BOARD);

struct Blinky {
    timer: Timer<Mmio>,
    led: GpioPort<Mmio>,
}

static BLINKY: Mutex<CriticalSectionRawMutex, RefCell<Option<Blinky>>> =
    Mutex::new(RefCell::new(None));

static PERIODS: EventFlag = EventFlag::new();

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(mut p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure(&mut rcc, LESSON.led, &LESSON.led_config)?;
    let led = gpio.take_port(LESSON.led.port)?;

    rcc.enable(LESSON.timer.peripheral());
    let mut timer = Timer::new(p.tim2, LESSON.timer, &rcc)?;
    timer.configure(&LESSON.timer_config)?;
    timer.listen(Event::Update);

    let config = LESSON.timer_config;
    info!(
        "{}: {=u32} Hz tick, {=u64} ticks per toggle",
        LESSON.timer,
        HSI_HZ / (config.prescaler as u32 + 1),
        config.period_ticks()
    );

    // The handler below is TIM2's
    defmt::assert_eq!(irq(Interrupt::TIM2), LESSON.timer.irq());
    BLINKY.lock(|cell| {
        timer.start();
        cell.replace(Some(Blinky { timer, led }));
    });
    p.nvic.enable(LESSON.timer.irq());

    loop {
        cortex_m::asm::wfi();
        if PERIODS.take() {
            trace!("period {=u32}", PERIODS.count());
        }
    }
}

#[interrupt]
fn TIM2() {
    BLINKY.lock(|cell| {
        if let Some(blinky) = cell.borrow_mut().as_mut() {
            if blinky.timer.is_pending(Event::Update) {
                blinky.timer.clear_pending(Event::Update);
                blinky.led.toggle(LESSON.led.index);
                PERIODS.raise();
            }
        }
    });
}
