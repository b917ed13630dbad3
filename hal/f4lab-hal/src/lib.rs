//! f4lab Hardware Abstraction Layer
//!
//! This crate defines the traits and value types shared by the register-level
//! peripheral code in `f4lab-core` and the chip support in
//! `f4lab-hal-stm32f4`. Nothing in here touches hardware directly, so the whole
//! crate builds and tests on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Lessons (f4lab-lessons binaries)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  f4lab-core (RCC, GPIO, SPI, USART, ...)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  f4lab-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     ▲
//!                     │
//! ┌─────────────────────────────────────────┐
//! │  f4lab-hal-stm32f4 (MMIO, NVIC, ITM)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`regs::RegisterBlock`] - Bit and field access to a peripheral's registers
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`uart::UartTx`], [`uart::UartRx`] - Serial communication
//! - [`spi::SpiBus`] - SPI bus operations
//! - [`debug::CharSink`] - Single-character debug output
//! - [`interrupt::InterruptController`] - Interrupt line enable/disable

#![no_std]
#![deny(unsafe_code)]

pub mod debug;
pub mod error;
pub mod gpio;
pub mod interrupt;
pub mod poll;
pub mod regs;
pub mod spi;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use debug::CharSink;
pub use error::TransferError;
pub use gpio::{InputPin, OutputPin};
pub use interrupt::{InterruptController, Irq};
pub use poll::{spin_until, TimedOut, Timeout};
pub use regs::{Field, RegisterBlock};
pub use spi::SpiBus;
pub use uart::{UartRx, UartTx};
