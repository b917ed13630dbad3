//! Interrupt line control
//!
//! Peripheral drivers only know the position of their interrupt in the
//! vector table. Unmasking it in the interrupt controller is delegated to an
//! [`InterruptController`] so drivers stay testable on the host.

/// Position of a device interrupt in the vector table (IRQ number)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Irq(pub u16);

impl Irq {
    /// Raw IRQ number
    pub const fn number(self) -> u16 {
        self.0
    }
}

/// Enables and disables interrupt lines in the interrupt controller
pub trait InterruptController {
    /// Allow `irq` to reach the core
    fn enable(&mut self, irq: Irq);

    /// Stop `irq` from reaching the core
    fn disable(&mut self, irq: Irq);

    /// Whether `irq` is currently allowed through
    fn is_enabled(&self, irq: Irq) -> bool;
}

impl<T: InterruptController + ?Sized> InterruptController for &mut T {
    fn enable(&mut self, irq: Irq) {
        (**self).enable(irq)
    }

    fn disable(&mut self, irq: Irq) {
        (**self).disable(irq)
    }

    fn is_enabled(&self, irq: Irq) -> bool {
        (**self).is_enabled(irq)
    }
}
