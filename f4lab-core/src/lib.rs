//! Register-level peripheral logic for the STM32F407
//!
//! This crate contains everything the lessons do to the hardware, written
//! against [`f4lab_hal::RegisterBlock`] rather than raw addresses:
//!
//! - Clock gating, system clock selection, clock security and MCO ([`rcc`])
//! - Flash wait states ([`flash`])
//! - GPIO pin configuration and level control ([`gpio`])
//! - Polled SPI master/slave exchange ([`spi`])
//! - Polled USART transmit/receive ([`usart`])
//! - General-purpose timers with output compare ([`timer`])
//! - External interrupt line binding ([`exti`])
//! - Formatted debug output over any character sink ([`debug`])
//! - Handler-to-foreground notification ([`notify`])
//! - Board pin map and lesson configuration records ([`config`])
//!
//! Each peripheral is an owned handle wrapping its register block. The chip
//! crate hands out exactly one block per peripheral, so two handles to the
//! same hardware cannot coexist.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod debug;
pub mod error;
pub mod exti;
pub mod flash;
pub mod gpio;
pub mod notify;
pub mod rcc;
pub mod spi;
pub mod timer;
pub mod usart;

#[cfg(test)]
pub(crate) mod sim;

pub use error::ConfigError;
