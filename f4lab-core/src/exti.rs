//! External interrupt lines
//!
//! Sixteen EXTI lines serve all GPIO pins: line N is shared by pin N of
//! every port, and SYSCFG_EXTICR selects which port currently drives it.
//! Binding PB0 therefore silently unbinds PA0.
//!
//! An armed edge latches the line's bit in EXTI_PR and, when the line is
//! unmasked, raises its NVIC interrupt. The bit stays set until software
//! writes 1 to it; a handler that returns without clearing it is entered
//! again immediately.

use f4lab_hal::gpio::Edge;
use f4lab_hal::{Field, InterruptController, Irq, RegisterBlock};

use crate::gpio::{Pin, Port};
use crate::rcc::{Peripheral, Rcc};
use crate::ConfigError;

const IMR: usize = 0x00;
const RTSR: usize = 0x08;
const FTSR: usize = 0x0C;
const SWIER: usize = 0x10;
const PR: usize = 0x14;

// SYSCFG_EXTICR1..4, four lines per register
const EXTICR1: usize = 0x08;
const EXTICR_PORT: Field = Field::new(0, 4);

/// Number of GPIO-driven EXTI lines
pub const LINE_COUNT: u8 = 16;

/// One GPIO-driven EXTI line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Line(u8);

impl Line {
    pub const fn new(index: u8) -> Result<Self, ConfigError> {
        if index < LINE_COUNT {
            Ok(Line(index))
        } else {
            Err(ConfigError::PinOutOfRange)
        }
    }

    /// Line shared by `pin` and the same-numbered pin of every other port
    pub const fn of(pin: Pin) -> Result<Self, ConfigError> {
        Self::new(pin.index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    /// Interrupt raised by the line; lines 5..=9 and 10..=15 share one each
    pub const fn irq(self) -> Irq {
        match self.0 {
            0..=4 => Irq(6 + self.0 as u16),
            5..=9 => Irq(23),
            _ => Irq(40),
        }
    }

    const fn exticr(self) -> (usize, Field) {
        let register = EXTICR1 + 4 * (self.0 as usize / 4);
        (register, EXTICR_PORT.nth(self.0 % 4))
    }
}

/// EXTI controller together with the SYSCFG port selection it depends on
pub struct Exti<E, S> {
    exti: E,
    syscfg: S,
}

impl<E: RegisterBlock, S: RegisterBlock> Exti<E, S> {
    /// EXTI itself has no clock gate; SYSCFG does
    pub fn new<R: RegisterBlock>(exti: E, syscfg: S, rcc: &Rcc<R>) -> Result<Self, ConfigError> {
        rcc.assert_clocked(Peripheral::Syscfg)?;
        Ok(Self { exti, syscfg })
    }

    /// Route `pin` to its EXTI line, arm `edge` and enable the line's IRQ
    ///
    /// A stale pending bit is cleared before the line is unmasked so the
    /// first interrupt reflects an edge seen after binding. The NVIC is only
    /// touched once the line is fully configured.
    pub fn bind_edge<C: InterruptController>(
        &mut self,
        pin: Pin,
        edge: Edge,
        nvic: &mut C,
    ) -> Result<Line, ConfigError> {
        let line = Line::of(pin)?;
        let mask = line.mask();
        let (exticr, field) = line.exticr();

        critical_section::with(|_| {
            #[cfg(feature = "defmt")]
            if self.exti.read(IMR) & mask != 0 {
                let previous = field.extract(self.syscfg.read(exticr));
                if previous != pin.port.index() as u32 {
                    defmt::warn!(
                        "EXTI{=u8}: rebinding from port {=u32} to {}",
                        line.index(),
                        previous,
                        pin.port
                    );
                }
            }

            self.syscfg
                .modify(exticr, |v| field.insert(v, pin.port.index() as u32));
            self.exti.modify(RTSR, |v| {
                if edge.rising() {
                    v | mask
                } else {
                    v & !mask
                }
            });
            self.exti.modify(FTSR, |v| {
                if edge.falling() {
                    v | mask
                } else {
                    v & !mask
                }
            });
            self.exti.write(PR, mask);
            self.exti.modify(IMR, |v| v | mask);
        });

        nvic.enable(line.irq());
        #[cfg(feature = "defmt")]
        defmt::debug!("EXTI{=u8} bound to {}", line.index(), pin.port);
        Ok(line)
    }

    /// Mask `line` and disarm both edges
    ///
    /// The NVIC interrupt stays enabled since grouped lines share it.
    pub fn unbind(&mut self, line: Line) {
        let mask = line.mask();
        critical_section::with(|_| {
            self.exti.modify(IMR, |v| v & !mask);
            self.exti.modify(RTSR, |v| v & !mask);
            self.exti.modify(FTSR, |v| v & !mask);
            self.exti.write(PR, mask);
        });
    }

    pub fn is_pending(&self, line: Line) -> bool {
        self.exti.read(PR) & line.mask() != 0
    }

    /// Acknowledge `line` only
    ///
    /// PR is write-1-to-clear, so writing just this line's bit leaves other
    /// pending lines alone. A read-modify-write here would clear them all.
    pub fn clear_pending(&mut self, line: Line) {
        self.exti.write(PR, line.mask());
    }

    /// Lines of `group` that are both unmasked and pending
    pub fn pending_in(&self, group: Irq) -> impl Iterator<Item = Line> {
        let pending = self.exti.read(PR) & self.exti.read(IMR);
        (0..LINE_COUNT)
            .map(Line)
            .filter(move |line| line.irq() == group && pending & line.mask() != 0)
    }

    /// Raise `line` from software, as if its edge had occurred
    pub fn trigger(&mut self, line: Line) {
        self.exti.write(SWIER, line.mask());
    }

    /// Port currently routed to `line`
    pub fn bound_port(&self, line: Line) -> Option<Port> {
        let (exticr, field) = line.exticr();
        Port::from_index(field.extract(self.syscfg.read(exticr)) as u8)
    }

    pub fn is_bound(&self, line: Line) -> bool {
        self.exti.read(IMR) & line.mask() != 0
    }

    pub fn release(self) -> (E, S) {
        (self.exti, self.syscfg)
    }
}
