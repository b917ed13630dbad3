//! Nested vectored interrupt controller

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use f4lab_hal::{InterruptController, Irq};

#[derive(Clone, Copy)]
struct IrqNumber(u16);

// SAFETY: only constructed from `Irq` values produced by f4lab-core, which
// are device interrupt numbers of the STM32F407
unsafe impl InterruptNumber for IrqNumber {
    fn number(self) -> u16 {
        self.0
    }
}

/// Vector-table position of a named device interrupt
pub fn irq(interrupt: embassy_stm32::interrupt::Interrupt) -> Irq {
    Irq(interrupt.number())
}

/// Owned NVIC
pub struct Nvic {
    _nvic: NVIC,
}

impl Nvic {
    pub fn new(nvic: NVIC) -> Self {
        Self { _nvic: nvic }
    }
}

impl InterruptController for Nvic {
    fn enable(&mut self, irq: Irq) {
        // SAFETY: callers unmask a line only after its source is configured
        unsafe { NVIC::unmask(IrqNumber(irq.number())) }
        #[cfg(feature = "defmt")]
        defmt::trace!("NVIC: IRQ {=u16} enabled", irq.number());
    }

    fn disable(&mut self, irq: Irq) {
        NVIC::mask(IrqNumber(irq.number()));
    }

    fn is_enabled(&self, irq: Irq) -> bool {
        NVIC::is_enabled(IrqNumber(irq.number()))
    }
}
