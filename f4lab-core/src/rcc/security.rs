//! Clock security system and microcontroller clock output
//!
//! With CSS on, a failure of the HSE crystal makes the hardware switch SYSCLK
//! back to HSI, stop HSE and the PLL, and raise CSSF. CSSF is wired to the
//! NMI, so the handler must clear it through CSSC or it re-enters at once.
//!
//! MCO1 puts one of four clocks, divided by 1 to 5, on PA8 (AF0) so it can
//! be measured with a scope.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::RegisterBlock;

use super::{Rcc, CFGR, CIR, CR, CSSC, CSSF, CSSON, MCO1, MCO1PRE};

/// Clock routed to MCO1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum McoSource {
    Hsi,
    Lse,
    Hse,
    Pll,
}

impl McoSource {
    pub const fn code(self) -> u32 {
        match self {
            McoSource::Hsi => 0b00,
            McoSource::Lse => 0b01,
            McoSource::Hse => 0b10,
            McoSource::Pll => 0b11,
        }
    }
}

/// MCO1 output divider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum McoPrescaler {
    Div1,
    Div2,
    Div3,
    Div4,
    Div5,
}

impl McoPrescaler {
    pub const fn code(self) -> u32 {
        match self {
            McoPrescaler::Div1 => 0b000,
            McoPrescaler::Div2 => 0b100,
            McoPrescaler::Div3 => 0b101,
            McoPrescaler::Div4 => 0b110,
            McoPrescaler::Div5 => 0b111,
        }
    }

    pub const fn divisor(self) -> u32 {
        match self {
            McoPrescaler::Div1 => 1,
            McoPrescaler::Div2 => 2,
            McoPrescaler::Div3 => 3,
            McoPrescaler::Div4 => 4,
            McoPrescaler::Div5 => 5,
        }
    }
}

impl<B: RegisterBlock> Rcc<B> {
    /// Arm the clock security system
    ///
    /// Takes effect once HSE is ready.
    pub fn enable_clock_security(&mut self) {
        self.regs.set_bit(CR, CSSON);
    }

    /// Whether the clock security system has detected an HSE failure
    pub fn clock_security_tripped(&self) -> bool {
        self.regs.is_set(CIR, CSSF)
    }

    /// Acknowledge a clock security event
    ///
    /// CSSC is write-only, so the other interrupt-enable bits are written back
    /// with it unchanged. Only registers are touched, so this is safe to call
    /// from the NMI handler.
    pub fn clear_clock_security(&mut self) {
        self.regs.set_bit(CIR, CSSC);
    }

    /// Route `source / prescaler` to the MCO1 output
    pub fn configure_mco1(&mut self, source: McoSource, prescaler: McoPrescaler) {
        self.regs.modify(CFGR, |v| {
            let v = MCO1.insert(v, source.code());
            MCO1PRE.insert(v, prescaler.code())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rcc::clocks::{BusPrescalers, ClockSource, SysclkSource};
    use crate::sim::SimRcc;

    #[test]
    fn test_css_trip_and_clear() {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);

        rcc.enable_clock_security();
        rcc.switch_to(ClockSource::Hse, BusPrescalers::UNDIVIDED)
            .unwrap();
        assert!(!rcc.clock_security_tripped());

        sim.fail_crystal();
        assert!(rcc.clock_security_tripped());
        assert_eq!(rcc.current_source(), Some(SysclkSource::Hsi));

        rcc.clear_clock_security();
        assert!(!rcc.clock_security_tripped());
    }

    #[test]
    fn test_clear_keeps_interrupt_enables() {
        use f4lab_hal::RegisterBlock;

        let sim = SimRcc::new();
        let mut regs = &sim;
        // LSIRDYIE and PLLRDYIE
        regs.write(CIR, (1 << 8) | (1 << 12));

        let mut rcc = Rcc::new(&sim);
        rcc.enable_clock_security();
        sim.fail_crystal();
        rcc.clear_clock_security();

        let cir = (&sim).read(CIR);
        assert_eq!(cir & (1 << CSSF), 0);
        assert_eq!(cir & 0x3F00, (1 << 8) | (1 << 12));
    }

    #[test]
    fn test_css_flag_persists_until_cleared() {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);
        rcc.enable_clock_security();

        sim.fail_crystal();
        // Reading the flag does not clear it; the NMI would re-enter
        assert!(rcc.clock_security_tripped());
        assert!(rcc.clock_security_tripped());
    }

    #[test]
    fn test_mco1_hsi_div4() {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);

        rcc.configure_mco1(McoSource::Hsi, McoPrescaler::Div4);
        let cfgr = sim.peek(CFGR);
        assert_eq!(MCO1.extract(cfgr), 0b00);
        assert_eq!(MCO1PRE.extract(cfgr), 0b110);

        rcc.configure_mco1(McoSource::Pll, McoPrescaler::Div1);
        let cfgr = sim.peek(CFGR);
        assert_eq!(MCO1.extract(cfgr), 0b11);
        assert_eq!(MCO1PRE.extract(cfgr), 0);
        // SW untouched
        assert_eq!(cfgr & 0b11, 0);
    }
}
