//! Simulated register blocks for host tests
//!
//! Each block keeps its registers in `Cell`s so tests can hand a shared
//! reference to a driver (via the `RegisterBlock for &Sim*` impls) and still
//! inspect or poke the registers while the driver holds it. Only the flag
//! behaviour the drivers rely on is modelled.

use core::cell::{Cell, RefCell};

use f4lab_hal::RegisterBlock;
use heapless::Vec;

use crate::rcc::{CFGR, CIR, CR, CSSC, CSSF, CSSON, HSEON, HSERDY, HSION, HSIRDY, PLLON, PLLRDY};

/// Plain memory with no side effects
pub struct SimBlock<const N: usize> {
    words: [Cell<u32>; N],
}

impl<const N: usize> SimBlock<N> {
    pub fn new() -> Self {
        Self {
            words: core::array::from_fn(|_| Cell::new(0)),
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.words[offset / 4].get()
    }

    pub fn poke(&self, offset: usize, value: u32) {
        self.words[offset / 4].set(value)
    }

    fn set(&self, offset: usize, mask: u32) {
        self.poke(offset, self.peek(offset) | mask)
    }

    fn clear(&self, offset: usize, mask: u32) {
        self.poke(offset, self.peek(offset) & !mask)
    }
}

impl<const N: usize> RegisterBlock for &SimBlock<N> {
    fn read(&self, offset: usize) -> u32 {
        self.peek(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.poke(offset, value)
    }
}

const PLLCFGR_OFFSET: usize = 0x04;
const PLLCFGR_RESET: u32 = 0x2400_3010;
const PLLSRC_HSE: u32 = 1 << 22;
const PLLCFGR_MASK: u32 = 0x0F43_7FFF;

/// RCC whose ready bits follow their enable bits
pub struct SimRcc {
    regs: SimBlock<40>,
    crystal: Cell<bool>,
    selected_unready: Cell<bool>,
    pll_locked_with: Cell<Option<u32>>,
}

impl SimRcc {
    /// Reset state: HSI on and selected, crystal fitted
    pub fn new() -> Self {
        let sim = Self {
            regs: SimBlock::new(),
            crystal: Cell::new(true),
            selected_unready: Cell::new(false),
            pll_locked_with: Cell::new(None),
        };
        sim.regs.poke(CR, 1 << HSION);
        sim.regs.poke(PLLCFGR_OFFSET, PLLCFGR_RESET);
        sim
    }

    /// A board whose HSE crystal never starts
    pub fn without_crystal() -> Self {
        let sim = Self::new();
        sim.crystal.set(false);
        sim
    }

    pub fn peek(&self, offset: usize) -> u32 {
        (&self).read(offset)
    }

    pub fn is_on(&self, bit: u8) -> bool {
        self.regs.peek(CR) & (1 << bit) != 0
    }

    /// Whether SW was ever pointed at a source that was not ready
    pub fn selected_unready(&self) -> bool {
        self.selected_unready.get()
    }

    /// PLLCFGR contents at the moment the PLL was last switched on
    pub fn pll_locked_with(&self) -> Option<u32> {
        self.pll_locked_with.get()
    }

    /// Crystal failure: what the clock security system does in hardware
    pub fn fail_crystal(&self) {
        self.crystal.set(false);
        let cr = self.regs.peek(CR);
        if cr & (1 << CSSON) != 0 {
            self.regs.set(CIR, 1 << CSSF);
        }
        self.regs.clear(CR, (1 << HSEON) | (1 << PLLON));
        self.regs.clear(CFGR, 0b11);
    }

    fn hse_ready(&self, cr: u32) -> bool {
        cr & (1 << HSEON) != 0 && self.crystal.get()
    }

    fn source_ready(&self, cr: u32, sw: u32) -> bool {
        match sw {
            0b00 => cr & (1 << HSION) != 0,
            0b01 => self.hse_ready(cr),
            0b10 => self.pll_ready(cr),
            _ => false,
        }
    }

    fn pll_ready(&self, cr: u32) -> bool {
        let feeder_ready = if self.regs.peek(PLLCFGR_OFFSET) & PLLSRC_HSE != 0 {
            self.hse_ready(cr)
        } else {
            cr & (1 << HSION) != 0
        };
        cr & (1 << PLLON) != 0 && feeder_ready
    }
}

impl RegisterBlock for &SimRcc {
    fn read(&self, offset: usize) -> u32 {
        let value = self.regs.peek(offset);
        match offset {
            CR => {
                let mut cr = value & !((1 << HSIRDY) | (1 << HSERDY) | (1 << PLLRDY));
                if cr & (1 << HSION) != 0 {
                    cr |= 1 << HSIRDY;
                }
                if self.hse_ready(value) {
                    cr |= 1 << HSERDY;
                }
                if self.pll_ready(value) {
                    cr |= 1 << PLLRDY;
                }
                cr
            }
            // SWS follows SW once the switch has happened
            CFGR => (value & !0b1100) | ((value & 0b11) << 2),
            _ => value,
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            CR => {
                let before = self.regs.peek(CR);
                if before & (1 << PLLON) == 0 && value & (1 << PLLON) != 0 {
                    self.pll_locked_with
                        .set(Some(self.regs.peek(PLLCFGR_OFFSET) & PLLCFGR_MASK));
                }
                self.regs.poke(CR, value);
            }
            CFGR => {
                let cr = self.regs.peek(CR);
                let previous = self.regs.peek(CFGR) & 0b11;
                let sw = value & 0b11;
                if sw != previous && !self.source_ready(cr, sw) {
                    self.selected_unready.set(true);
                    // Hardware ignores the switch
                    self.regs.poke(CFGR, (value & !0b11) | previous);
                } else {
                    self.regs.poke(CFGR, value);
                }
            }
            CIR => {
                if value & (1 << CSSC) != 0 {
                    self.regs.clear(CIR, 1 << CSSF);
                }
                // Only the interrupt enables (bits 8..=13) are writable
                let flags = self.regs.peek(CIR) & 0xFF;
                self.regs.poke(CIR, flags | (value & 0x3F00));
            }
            _ => self.regs.poke(offset, value),
        }
    }
}

const GPIO_IDR: usize = 0x10;
const GPIO_ODR: usize = 0x14;
const GPIO_BSRR: usize = 0x18;

/// GPIO port with a BSRR that drives ODR and externally driven inputs
pub struct SimGpio {
    regs: SimBlock<10>,
    bsrr_writes: Cell<usize>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self {
            regs: SimBlock::new(),
            bsrr_writes: Cell::new(0),
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.peek(offset)
    }

    /// Drive the external level of pin `index`
    pub fn drive_input(&self, index: u8, high: bool) {
        if high {
            self.regs.set(GPIO_IDR, 1 << index);
        } else {
            self.regs.clear(GPIO_IDR, 1 << index);
        }
    }

    pub fn bsrr_writes(&self) -> usize {
        self.bsrr_writes.get()
    }
}

impl RegisterBlock for &SimGpio {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            GPIO_BSRR => 0,
            _ => self.regs.peek(offset),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            GPIO_BSRR => {
                self.bsrr_writes.set(self.bsrr_writes.get() + 1);
                let set = value & 0xFFFF;
                let reset = (value >> 16) & !set;
                let odr = self.regs.peek(GPIO_ODR);
                self.regs.poke(GPIO_ODR, (odr | set) & !reset);
            }
            GPIO_IDR => {}
            _ => self.regs.poke(offset, value),
        }
    }
}

const EXTI_IMR: usize = 0x00;
const EXTI_RTSR: usize = 0x08;
const EXTI_FTSR: usize = 0x0C;
const EXTI_SWIER: usize = 0x10;
const EXTI_PR: usize = 0x14;

/// EXTI controller with edge detection and a write-1-to-clear PR
pub struct SimExti {
    regs: SimBlock<6>,
}

impl SimExti {
    pub fn new() -> Self {
        Self {
            regs: SimBlock::new(),
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.peek(offset)
    }

    /// Present an edge on `line`; latches PR if that edge is armed
    pub fn edge(&self, line: u8, rising: bool) {
        let armed = if rising { EXTI_RTSR } else { EXTI_FTSR };
        if self.regs.peek(armed) & (1 << line) != 0 {
            self.regs.set(EXTI_PR, 1 << line);
        }
    }
}

impl RegisterBlock for &SimExti {
    fn read(&self, offset: usize) -> u32 {
        self.regs.peek(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            EXTI_PR => {
                self.regs.clear(EXTI_PR, value);
                self.regs.clear(EXTI_SWIER, value);
            }
            EXTI_SWIER => {
                let rising = value & !self.regs.peek(EXTI_SWIER);
                let enabled = rising & self.regs.peek(EXTI_IMR);
                self.regs.set(EXTI_PR, enabled);
                self.regs.poke(EXTI_SWIER, value);
            }
            _ => self.regs.poke(offset, value),
        }
    }
}

const TIM_CR1: usize = 0x00;
const TIM_SR: usize = 0x10;
const TIM_EGR: usize = 0x14;
const TIM_CCMR1: usize = 0x18;
const TIM_CCER: usize = 0x20;
const TIM_CNT: usize = 0x24;
const TIM_ARR: usize = 0x2C;
const TIM_CCR1: usize = 0x34;

/// General-purpose timer advanced one counter clock per [`tick`](Self::tick)
pub struct SimTimer {
    regs: SimBlock<17>,
    outputs: Cell<u8>,
    toggles: RefCell<Vec<(u8, u32), 64>>,
}

impl SimTimer {
    pub fn new() -> Self {
        Self {
            regs: SimBlock::new(),
            outputs: Cell::new(0),
            toggles: RefCell::new(Vec::new()),
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.peek(offset)
    }

    /// Raise status flags as the hardware would
    pub fn poke_sr(&self, flags: u32) {
        self.regs.set(TIM_SR, flags);
    }

    /// Output level of each channel (bit n = channel n + 1)
    pub fn outputs(&self) -> u8 {
        self.outputs.get()
    }

    /// Every output toggle so far as (channel index, counter value)
    pub fn toggles(&self) -> Vec<(u8, u32), 64> {
        self.toggles.borrow().clone()
    }

    /// One counter clock
    pub fn tick(&self) {
        let cr1 = self.regs.peek(TIM_CR1);
        if cr1 & 1 == 0 {
            return;
        }
        let arr = self.regs.peek(TIM_ARR);
        let cnt = self.regs.peek(TIM_CNT);
        let down = cr1 & (1 << 4) != 0;

        let next = if down {
            if cnt == 0 {
                self.regs.set(TIM_SR, 1);
                arr
            } else {
                cnt - 1
            }
        } else if cnt >= arr {
            self.regs.set(TIM_SR, 1);
            0
        } else {
            cnt + 1
        };
        self.regs.poke(TIM_CNT, next);
        self.compare(next);
    }

    fn compare(&self, cnt: u32) {
        let ccer = self.regs.peek(TIM_CCER);
        for ch in 0..4u8 {
            if self.regs.peek(TIM_CCR1 + 4 * ch as usize) != cnt {
                continue;
            }
            self.regs.set(TIM_SR, 1 << (ch + 1));
            if ccer & (1 << (4 * ch)) == 0 {
                continue;
            }
            let ccmr = self.regs.peek(TIM_CCMR1 + 4 * (ch as usize / 2));
            let ocm = (ccmr >> (4 + 8 * (ch as u32 % 2))) & 0b111;
            let bit = 1 << ch;
            let level = self.outputs.get();
            match ocm {
                0b001 => self.outputs.set(level | bit),
                0b010 => self.outputs.set(level & !bit),
                0b011 => {
                    self.outputs.set(level ^ bit);
                    let _ = self.toggles.borrow_mut().push((ch, cnt));
                }
                _ => {}
            }
        }
    }
}

impl RegisterBlock for &SimTimer {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            TIM_EGR => 0,
            _ => self.regs.peek(offset),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            // rc_w0: writing 1 leaves a flag alone
            TIM_SR => self.regs.poke(TIM_SR, self.regs.peek(TIM_SR) & value),
            TIM_EGR => {
                if value & 1 != 0 {
                    let down = self.regs.peek(TIM_CR1) & (1 << 4) != 0;
                    let start = if down { self.regs.peek(TIM_ARR) } else { 0 };
                    self.regs.poke(TIM_CNT, start);
                    self.regs.set(TIM_SR, 1);
                }
            }
            _ => self.regs.poke(offset, value),
        }
    }
}

const SPI_CR1: usize = 0x00;
const SPI_SR: usize = 0x08;
const SPI_DR: usize = 0x0C;
const SPI_RXNE: u32 = 1 << 0;
const SPI_TXE: u32 = 1 << 1;
const SPI_MODF: u32 = 1 << 5;
const SPI_OVR: u32 = 1 << 6;
const SPI_SPE: u32 = 1 << 6;

/// The wires between one simulated SPI master and one slave
pub struct SpiLink {
    slave_enabled: Cell<bool>,
    slave_tx: Cell<Option<u8>>,
    slave_rx: Cell<Option<u8>>,
    slave_overrun: Cell<bool>,
    mode_fault: Cell<bool>,
}

impl SpiLink {
    pub fn new() -> Self {
        Self {
            slave_enabled: Cell::new(false),
            slave_tx: Cell::new(None),
            slave_rx: Cell::new(None),
            slave_overrun: Cell::new(false),
            mode_fault: Cell::new(false),
        }
    }

    /// Another master pulls NSS low
    pub fn raise_mode_fault(&self) {
        self.mode_fault.set(true);
    }
}

/// One end of a simulated SPI link
pub struct SimSpi<'a> {
    regs: SimBlock<8>,
    link: &'a SpiLink,
    master: bool,
    rx: Cell<Option<u8>>,
    overrun: Cell<bool>,
}

impl<'a> SimSpi<'a> {
    pub fn master(link: &'a SpiLink) -> Self {
        Self::new(link, true)
    }

    pub fn slave(link: &'a SpiLink) -> Self {
        Self::new(link, false)
    }

    fn new(link: &'a SpiLink, master: bool) -> Self {
        Self {
            regs: SimBlock::new(),
            link,
            master,
            rx: Cell::new(None),
            overrun: Cell::new(false),
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.peek(offset)
    }

    /// Clock one byte out of the master
    fn exchange(&self, out: u8) {
        let reply = if self.link.slave_enabled.get() {
            if self.link.slave_rx.get().is_some() {
                self.link.slave_overrun.set(true);
            } else {
                self.link.slave_rx.set(Some(out));
            }
            self.link.slave_tx.take().unwrap_or(0)
        } else {
            // Nobody listening: MISO idles high
            0xFF
        };
        if self.rx.get().is_some() {
            self.overrun.set(true);
        } else {
            self.rx.set(Some(reply));
        }
    }
}

impl RegisterBlock for &SimSpi<'_> {
    fn read(&self, offset: usize) -> u32 {
        match (offset, self.master) {
            (SPI_SR, true) => {
                let mut sr = SPI_TXE;
                if self.rx.get().is_some() {
                    sr |= SPI_RXNE;
                }
                if self.overrun.get() {
                    sr |= SPI_OVR;
                }
                if self.link.mode_fault.get() {
                    sr |= SPI_MODF;
                }
                sr
            }
            (SPI_SR, false) => {
                let mut sr = 0;
                if self.link.slave_tx.get().is_none() {
                    sr |= SPI_TXE;
                }
                if self.link.slave_rx.get().is_some() {
                    sr |= SPI_RXNE;
                }
                if self.link.slave_overrun.get() {
                    sr |= SPI_OVR;
                }
                sr
            }
            (SPI_DR, true) => {
                self.overrun.set(false);
                self.rx.take().unwrap_or(0) as u32
            }
            (SPI_DR, false) => {
                self.link.slave_overrun.set(false);
                self.link.slave_rx.take().unwrap_or(0) as u32
            }
            _ => self.regs.peek(offset),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match (offset, self.master) {
            (SPI_DR, true) => {
                if self.regs.peek(SPI_CR1) & SPI_SPE != 0 {
                    self.exchange(value as u8);
                }
            }
            (SPI_DR, false) => self.link.slave_tx.set(Some(value as u8)),
            (SPI_CR1, master) => {
                if master {
                    // Writing CR1 after reading SR completes the MODF clear
                    self.link.mode_fault.set(false);
                } else {
                    self.link.slave_enabled.set(value & SPI_SPE != 0);
                }
                self.regs.poke(SPI_CR1, value);
            }
            _ => self.regs.poke(offset, value),
        }
    }
}

const USART_SR: usize = 0x00;
const USART_DR: usize = 0x04;
const USART_CR1: usize = 0x0C;
const USART_RXNE: u32 = 1 << 5;
const USART_TC: u32 = 1 << 6;
const USART_TXE: u32 = 1 << 7;
const USART_ORE: u32 = 1 << 3;
const USART_ENABLED: u32 = (1 << 13) | (1 << 3);

/// USART with an instant transmitter and an injectable receiver
pub struct SimUsart {
    regs: SimBlock<7>,
    tx_stalled: Cell<bool>,
    rx: Cell<Option<u8>>,
    errors: Cell<u32>,
    sent: RefCell<Vec<u8, 256>>,
}

impl SimUsart {
    pub fn new() -> Self {
        Self {
            regs: SimBlock::new(),
            tx_stalled: Cell::new(false),
            rx: Cell::new(None),
            errors: Cell::new(0),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn peek(&self, offset: usize) -> u32 {
        self.regs.peek(offset)
    }

    pub fn poke(&self, offset: usize, value: u32) {
        self.regs.poke(offset, value)
    }

    /// The transmitter stops draining: TXE and TC stay low
    pub fn stall_tx(&self) {
        self.tx_stalled.set(true);
    }

    /// A byte arrives on RX
    pub fn receive(&self, byte: u8) {
        if self.rx.get().is_some() {
            self.errors.set(self.errors.get() | USART_ORE);
        } else {
            self.rx.set(Some(byte));
        }
    }

    /// A byte arrives with the given SR error flags
    pub fn receive_with_errors(&self, byte: u8, flags: u32) {
        self.receive(byte);
        self.errors.set(self.errors.get() | flags);
    }

    /// Everything transmitted so far
    pub fn sent(&self) -> Vec<u8, 256> {
        self.sent.borrow().clone()
    }
}

impl RegisterBlock for &SimUsart {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            USART_SR => {
                let mut sr = self.errors.get();
                if !self.tx_stalled.get() {
                    sr |= USART_TXE | USART_TC;
                }
                if self.rx.get().is_some() {
                    sr |= USART_RXNE;
                }
                sr
            }
            USART_DR => {
                self.errors.set(0);
                self.rx.take().unwrap_or(0) as u32
            }
            _ => self.regs.peek(offset),
        }
    }

    fn write(&mut self, offset: usize, value: u32) {
        match offset {
            USART_DR => {
                if self.regs.peek(USART_CR1) & USART_ENABLED == USART_ENABLED {
                    let _ = self.sent.borrow_mut().push(value as u8);
                }
            }
            USART_SR => {}
            _ => self.regs.poke(offset, value),
        }
    }
}
