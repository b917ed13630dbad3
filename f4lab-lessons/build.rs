//! Build script for f4lab-lessons
//!
//! Checks every lesson record on the host, so a pin clash or an
//! unreachable clock setting fails the build instead of the board.

use f4lab_core::config::*;
use f4lab_core::rcc::ClockSource;
use f4lab_core::usart::baud_divisor;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../f4lab-core/src/config");

    let mut errors = Vec::new();

    check_pins("css", &CssLesson::DISCOVERY, &mut errors);
    check_pins("mco", &McoLesson::DISCOVERY, &mut errors);
    check_pins("gpio_output", &BlinkLesson::DISCOVERY, &mut errors);
    check_pins("gpio_input", &ButtonLesson::DISCOVERY, &mut errors);
    check_pins("gpio_interrupt", &EdgeInterruptLesson::DISCOVERY, &mut errors);
    check_pins("timers_blinky", &TimerBlinkyLesson::DISCOVERY, &mut errors);
    check_pins(
        "timers_output_compare",
        &OutputCompareLesson::DISCOVERY,
        &mut errors,
    );
    check_pins("spi_polling", &SpiLoopbackLesson::DISCOVERY, &mut errors);
    check_pins("uart_polling", &UartLesson::DISCOVERY, &mut errors);
    check_pins("printf_uart", &PrintfUartLesson::DISCOVERY, &mut errors);

    for (name, lesson) in [
        ("HSI", ClockLesson::HSI),
        ("HSE", ClockLesson::HSE),
        ("PLL", ClockLesson::PLL_168MHZ),
    ] {
        check_clock(name, &lesson, &mut errors);
    }
    let css = CssLesson::DISCOVERY;
    if let Err(e) = css.prescalers.validate(css.source.sysclk_hz()) {
        errors.push(format!("css: {}", e));
    }

    for (name, timer, config) in [
        (
            "timers_blinky",
            TimerBlinkyLesson::DISCOVERY.timer,
            TimerBlinkyLesson::DISCOVERY.timer_config,
        ),
        (
            "timers_output_compare",
            OutputCompareLesson::DISCOVERY.timer,
            OutputCompareLesson::DISCOVERY.timer_config,
        ),
    ] {
        if config.auto_reload > timer.max_count() {
            errors.push(format!("{}: period too wide for {:?}", name, timer));
        }
    }

    let uart = UartLesson::DISCOVERY;
    if let Err(e) = baud_divisor(uart.bus_hz, uart.config.baudrate) {
        errors.push(format!("uart_polling: {}", e));
    }

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid lesson configuration                             ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

fn check_pins(name: &str, lesson: &impl LessonPins, errors: &mut Vec<String>) {
    if let Err(clash) = lesson.claim_pins() {
        errors.push(format!(
            "{}: pin P{:?}{} used twice",
            name, clash.0.port, clash.0.index
        ));
    }
}

fn check_clock(name: &str, lesson: &ClockLesson, errors: &mut Vec<String>) {
    let source = lesson.source;
    if let ClockSource::Pll(pll) = source {
        if let Err(e) = pll.validate() {
            errors.push(format!("clock_sources {}: {}", name, e));
        }
    }
    if let Err(e) = lesson.prescalers.validate(source.sysclk_hz()) {
        errors.push(format!("clock_sources {}: {}", name, e));
    }
}
