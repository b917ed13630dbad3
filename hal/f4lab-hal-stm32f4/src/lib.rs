//! STM32F407 support for the f4lab lessons
//!
//! The register logic in `f4lab-core` is written against
//! [`f4lab_hal::RegisterBlock`]. This crate supplies the real thing:
//!
//! - [`Mmio`]: volatile word access at a peripheral's base address
//! - [`Peripherals`]: one `Mmio` per peripheral, handed out exactly once
//! - [`Nvic`]: the interrupt controller behind [`f4lab_hal::InterruptController`]
//! - [`ItmSink`]: ITM stimulus port as a [`f4lab_hal::CharSink`]
//!
//! `embassy-stm32` is used only for its PAC, interrupt vector names and
//! linker memory map; `embassy_stm32::init` is never called, since the
//! lessons program the clock tree themselves.

#![no_std]

pub mod itm;
pub mod mmio;
pub mod nvic;
pub mod peripherals;

pub use itm::ItmSink;
pub use mmio::Mmio;
pub use nvic::{irq, Nvic};
pub use peripherals::{GpioBlocks, Peripherals};

/// Interrupt names for `#[interrupt]` handlers
pub use embassy_stm32::interrupt;
