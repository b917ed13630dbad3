//! General-purpose timers (TIM2..TIM5)
//!
//! One free-running counter per timer, clocked at `timer_clock / (PSC + 1)`.
//! Counting up it runs 0..=ARR and wraps; counting down it runs ARR..=0.
//! Each wrap is an update event that sets UIF.
//!
//! Four compare channels share the counter. A channel whose compare value
//! equals the counter changes its output (toggle, set, clear) as a pure
//! hardware action; it only becomes visible to software if its CCxIF
//! interrupt is enabled. A compare value above ARR never matches.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use f4lab_hal::{Field, Irq, RegisterBlock};
use heapless::Vec;

use crate::rcc::{Peripheral, Rcc};
use crate::ConfigError;

const CR1: usize = 0x00;
const DIER: usize = 0x0C;
const SR: usize = 0x10;
const EGR: usize = 0x14;
const CCMR1: usize = 0x18;
const CCER: usize = 0x20;
const CNT: usize = 0x24;
const PSC: usize = 0x28;
const ARR: usize = 0x2C;
const CCR1: usize = 0x34;

// TIMx_CR1
const CEN: u8 = 0;
const DIR: u8 = 4;

// TIMx_EGR
const UG: u8 = 0;

// TIMx_CCMRx, channel 1/3 slot; channel 2/4 is 8 bits up
const CCS: Field = Field::new(0, 2);
const OCM: Field = Field::new(4, 3);

/// Timer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimerInstance {
    Tim2,
    Tim3,
    Tim4,
    Tim5,
}

impl TimerInstance {
    pub const fn peripheral(self) -> Peripheral {
        match self {
            TimerInstance::Tim2 => Peripheral::Tim2,
            TimerInstance::Tim3 => Peripheral::Tim3,
            TimerInstance::Tim4 => Peripheral::Tim4,
            TimerInstance::Tim5 => Peripheral::Tim5,
        }
    }

    pub const fn irq(self) -> Irq {
        match self {
            TimerInstance::Tim2 => Irq(28),
            TimerInstance::Tim3 => Irq(29),
            TimerInstance::Tim4 => Irq(30),
            TimerInstance::Tim5 => Irq(50),
        }
    }

    /// Largest counter value (TIM2 and TIM5 are 32-bit)
    pub const fn max_count(self) -> u32 {
        match self {
            TimerInstance::Tim2 | TimerInstance::Tim5 => u32::MAX,
            TimerInstance::Tim3 | TimerInstance::Tim4 => u16::MAX as u32,
        }
    }
}

/// Count direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    #[default]
    Up,
    Down,
}

/// Prescaler, period and direction of a timer's counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerConfig {
    /// Counter clock is the timer clock divided by `prescaler + 1`
    pub prescaler: u16,
    pub auto_reload: u32,
    pub direction: Direction,
}

impl TimerConfig {
    pub const fn new(prescaler: u16, auto_reload: u32) -> Self {
        Self {
            prescaler,
            auto_reload,
            direction: Direction::Up,
        }
    }

    /// Prescaler for a `tick_hz` counter clock from `timer_hz`
    ///
    /// Returns `None` if the ratio is not a whole number or does not fit.
    pub const fn prescaler_for(timer_hz: u32, tick_hz: u32) -> Option<u16> {
        if tick_hz == 0 || timer_hz % tick_hz != 0 {
            return None;
        }
        let div = timer_hz / tick_hz;
        if div == 0 || div > 0x1_0000 {
            None
        } else {
            Some((div - 1) as u16)
        }
    }

    pub const fn counting(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Counter ticks per update event
    pub const fn period_ticks(&self) -> u64 {
        self.auto_reload as u64 + 1
    }
}

/// Capture/compare channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Channel {
    Ch1,
    Ch2,
    Ch3,
    Ch4,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

    /// Zero-based index
    pub const fn index(self) -> u8 {
        self as u8
    }

    const fn ccmr(self) -> usize {
        CCMR1 + 4 * (self.index() as usize / 2)
    }

    const fn ccmr_shift(self) -> u8 {
        8 * (self.index() % 2)
    }

    const fn ccr(self) -> usize {
        CCR1 + 4 * self.index() as usize
    }

    const fn ccer_enable_bit(self) -> u8 {
        4 * self.index()
    }
}

/// Output reaction to a compare match (OCxM)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OcAction {
    /// Output unaffected
    Frozen,
    /// Drive active on match
    SetActive,
    /// Drive inactive on match
    SetInactive,
    /// Invert on match
    Toggle,
}

impl OcAction {
    pub const fn code(self) -> u32 {
        match self {
            OcAction::Frozen => 0b000,
            OcAction::SetActive => 0b001,
            OcAction::SetInactive => 0b010,
            OcAction::Toggle => 0b011,
        }
    }
}

/// Event that can raise the timer's interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Counter overflow or underflow
    Update,
    /// Compare match on a channel
    Compare(Channel),
}

impl Event {
    /// Bit in DIER and SR
    const fn bit(self) -> u8 {
        match self {
            Event::Update => 0,
            Event::Compare(ch) => 1 + ch.index(),
        }
    }
}

/// Owned handle to one general-purpose timer
pub struct Timer<B> {
    regs: B,
    instance: TimerInstance,
}

impl<B: RegisterBlock> Timer<B> {
    pub fn new<R: RegisterBlock>(
        regs: B,
        instance: TimerInstance,
        rcc: &Rcc<R>,
    ) -> Result<Self, ConfigError> {
        rcc.assert_clocked(instance.peripheral())?;
        Ok(Self { regs, instance })
    }

    pub fn instance(&self) -> TimerInstance {
        self.instance
    }

    /// Program prescaler, period and direction, leaving the counter stopped
    ///
    /// PSC is buffered and only loads on an update event, so one is forced
    /// through UG. That also sets UIF, which is cleared again here so the
    /// first interrupt marks a real period.
    pub fn configure(&mut self, config: &TimerConfig) -> Result<(), ConfigError> {
        if config.auto_reload > self.instance.max_count() {
            return Err(ConfigError::AutoReloadTooWide);
        }
        self.stop();
        self.regs.write(PSC, config.prescaler as u32);
        self.regs.write(ARR, config.auto_reload);
        match config.direction {
            Direction::Up => self.regs.clear_bit(CR1, DIR),
            Direction::Down => self.regs.set_bit(CR1, DIR),
        }
        self.regs.write(EGR, 1 << UG);
        self.clear_pending(Event::Update);
        Ok(())
    }

    pub fn start(&mut self) {
        self.regs.set_bit(CR1, CEN);
    }

    pub fn stop(&mut self) {
        self.regs.clear_bit(CR1, CEN);
    }

    pub fn is_running(&self) -> bool {
        self.regs.is_set(CR1, CEN)
    }

    pub fn counter(&self) -> u32 {
        self.regs.read(CNT)
    }

    pub fn auto_reload(&self) -> u32 {
        self.regs.read(ARR)
    }

    /// Let `event` raise the timer's interrupt
    pub fn listen(&mut self, event: Event) {
        self.regs.set_bit(DIER, event.bit());
    }

    pub fn unlisten(&mut self, event: Event) {
        self.regs.clear_bit(DIER, event.bit());
    }

    pub fn is_pending(&self, event: Event) -> bool {
        self.regs.is_set(SR, event.bit())
    }

    /// Clear `event`'s flag
    ///
    /// SR flags are cleared by writing 0 and unaffected by writing 1, so
    /// this is a single write that cannot lose a flag raised meanwhile.
    pub fn clear_pending(&mut self, event: Event) {
        self.regs.write(SR, !(1u32 << event.bit()));
    }

    /// Put `channel` in output compare mode
    ///
    /// The channel's pin must be routed to the timer through its alternate
    /// function for the action to be visible.
    pub fn set_output_compare(
        &mut self,
        channel: Channel,
        compare: u32,
        action: OcAction,
    ) -> Result<(), ConfigError> {
        if compare > self.instance.max_count() {
            return Err(ConfigError::AutoReloadTooWide);
        }
        let shift = channel.ccmr_shift();
        self.regs.modify(channel.ccmr(), |v| {
            let v = CCS.offset_by(shift).insert(v, 0b00);
            OCM.offset_by(shift).insert(v, action.code())
        });
        self.regs.write(channel.ccr(), compare);
        self.regs.set_bit(CCER, channel.ccer_enable_bit());
        Ok(())
    }

    pub fn disable_output_compare(&mut self, channel: Channel) {
        self.regs.clear_bit(CCER, channel.ccer_enable_bit());
    }

    /// Enabled compare channels in the order they match within one period
    ///
    /// Channels whose compare value exceeds ARR never match and are left out.
    pub fn compare_schedule(&self) -> Vec<(Channel, u32), 4> {
        let arr = self.regs.read(ARR);
        let ccer = self.regs.read(CCER);
        let mut schedule: Vec<(Channel, u32), 4> = Channel::ALL
            .into_iter()
            .filter(|ch| ccer & (1 << ch.ccer_enable_bit()) != 0)
            .map(|ch| (ch, self.regs.read(ch.ccr())))
            .filter(|&(_, compare)| compare <= arr)
            .collect();
        schedule.sort_unstable_by_key(|&(ch, compare)| (compare, ch));
        if self.regs.is_set(CR1, DIR) {
            schedule.reverse();
        }
        schedule
    }

    pub fn release(self) -> B {
        self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimRcc, SimTimer};

    fn clocked(instance: TimerInstance) -> SimRcc {
        let sim = SimRcc::new();
        let mut rcc = Rcc::new(&sim);
        rcc.enable(instance.peripheral());
        sim
    }

    #[test]
    fn test_prescaler_for_half_second() {
        // 16 MHz -> 16 kHz counter clock, 8000 ticks = 0.5 s
        assert_eq!(TimerConfig::prescaler_for(16_000_000, 16_000), Some(999));
        assert_eq!(TimerConfig::prescaler_for(16_000_000, 3), None);
        assert_eq!(TimerConfig::prescaler_for(16_000_000, 100), None);
        assert_eq!(TimerConfig::prescaler_for(16_000_000, 0), None);
    }

    #[test]
    fn test_configure_forces_update_and_clears_flag() {
        let rcc_sim = clocked(TimerInstance::Tim2);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim2, &rcc).unwrap();

        timer.configure(&TimerConfig::new(999, 8000)).unwrap();
        assert_eq!(sim.peek(PSC), 999);
        assert_eq!(sim.peek(ARR), 8000);
        assert!(!timer.is_pending(Event::Update));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_update_event_each_period() {
        let rcc_sim = clocked(TimerInstance::Tim2);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim2, &rcc).unwrap();
        timer.configure(&TimerConfig::new(999, 9)).unwrap();
        timer.listen(Event::Update);
        timer.start();

        for _ in 0..9 {
            sim.tick();
        }
        assert!(!timer.is_pending(Event::Update));
        sim.tick();
        assert!(timer.is_pending(Event::Update));
        assert_eq!(timer.counter(), 0);

        timer.clear_pending(Event::Update);
        assert!(!timer.is_pending(Event::Update));
    }

    #[test]
    fn test_pending_flag_survives_until_cleared() {
        let rcc_sim = clocked(TimerInstance::Tim2);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim2, &rcc).unwrap();
        timer.configure(&TimerConfig::new(0, 1)).unwrap();
        timer.start();

        sim.tick();
        sim.tick();
        assert!(timer.is_pending(Event::Update));
        // A handler that forgets to clear sees it again
        assert!(timer.is_pending(Event::Update));

        // Clearing one flag leaves the others
        sim.poke_sr(0b11);
        timer.clear_pending(Event::Update);
        assert!(timer.is_pending(Event::Compare(Channel::Ch1)));
    }

    #[test]
    fn test_down_counter_underflows() {
        let rcc_sim = clocked(TimerInstance::Tim2);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim2, &rcc).unwrap();
        timer
            .configure(&TimerConfig::new(0, 4).counting(Direction::Down))
            .unwrap();
        timer.start();

        assert_eq!(timer.counter(), 4);
        for _ in 0..4 {
            sim.tick();
        }
        assert_eq!(timer.counter(), 0);
        assert!(!timer.is_pending(Event::Update));
        sim.tick();
        assert!(timer.is_pending(Event::Update));
        assert_eq!(timer.counter(), 4);
    }

    #[test]
    fn test_sixteen_bit_timer_rejects_wide_reload() {
        let rcc_sim = clocked(TimerInstance::Tim4);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim4, &rcc).unwrap();

        assert_eq!(
            timer.configure(&TimerConfig::new(0, 70_000)),
            Err(ConfigError::AutoReloadTooWide)
        );
        assert_eq!(
            timer.set_output_compare(Channel::Ch1, 70_000, OcAction::Toggle),
            Err(ConfigError::AutoReloadTooWide)
        );
    }

    #[test]
    fn test_output_compare_registers() {
        let rcc_sim = clocked(TimerInstance::Tim4);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim4, &rcc).unwrap();

        for (ch, compare) in Channel::ALL.into_iter().zip([2000, 4000, 6000, 8000]) {
            timer.set_output_compare(ch, compare, OcAction::Toggle).unwrap();
        }
        // OC1M/OC2M and OC3M/OC4M = 011, CCxS = 00
        assert_eq!(sim.peek(CCMR1), 0x3030);
        assert_eq!(sim.peek(CCMR1 + 4), 0x3030);
        assert_eq!(sim.peek(CCER), 0x1111);
        assert_eq!(sim.peek(CCR1 + 12), 8000);
    }

    #[test]
    fn test_four_channels_toggle_once_per_period_in_order() {
        let rcc_sim = clocked(TimerInstance::Tim4);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim4, &rcc).unwrap();

        timer.configure(&TimerConfig::new(999, 8000)).unwrap();
        for (ch, compare) in Channel::ALL.into_iter().zip([2000, 4000, 6000, 8000]) {
            timer.set_output_compare(ch, compare, OcAction::Toggle).unwrap();
        }
        timer.start();

        let period = TimerConfig::new(999, 8000).period_ticks();
        for _ in 0..period {
            sim.tick();
        }
        let toggles = sim.toggles();
        assert_eq!(
            toggles.as_slice(),
            &[(0, 2000), (1, 4000), (2, 6000), (3, 8000)]
        );
        assert_eq!(sim.outputs(), 0b1111);

        // Second period toggles each again, restoring the levels
        for _ in 0..period {
            sim.tick();
        }
        assert_eq!(sim.toggles().len(), 8);
        assert_eq!(sim.outputs(), 0);

        let schedule = timer.compare_schedule();
        let order: Vec<Channel, 4> = schedule.iter().map(|&(ch, _)| ch).collect();
        assert_eq!(order.as_slice(), &Channel::ALL);
    }

    #[test]
    fn test_compare_beyond_period_never_matches() {
        let rcc_sim = clocked(TimerInstance::Tim2);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim2, &rcc).unwrap();

        timer.configure(&TimerConfig::new(0, 100)).unwrap();
        timer.set_output_compare(Channel::Ch1, 50, OcAction::Toggle).unwrap();
        timer.set_output_compare(Channel::Ch2, 500, OcAction::Toggle).unwrap();
        timer.start();

        for _ in 0..1000 {
            sim.tick();
        }
        assert!(sim.toggles().iter().all(|&(ch, _)| ch == 0));
        assert_eq!(timer.compare_schedule().as_slice(), &[(Channel::Ch1, 50)]);
    }

    #[test]
    fn test_schedule_reversed_when_counting_down() {
        let rcc_sim = clocked(TimerInstance::Tim3);
        let rcc = Rcc::new(&rcc_sim);
        let sim = SimTimer::new();
        let mut timer = Timer::new(&sim, TimerInstance::Tim3, &rcc).unwrap();

        timer
            .configure(&TimerConfig::new(0, 100).counting(Direction::Down))
            .unwrap();
        timer.set_output_compare(Channel::Ch3, 10, OcAction::SetActive).unwrap();
        timer.set_output_compare(Channel::Ch1, 90, OcAction::SetInactive).unwrap();
        assert_eq!(
            timer.compare_schedule().as_slice(),
            &[(Channel::Ch1, 90), (Channel::Ch3, 10)]
        );

        timer.disable_output_compare(Channel::Ch1);
        assert_eq!(timer.compare_schedule().as_slice(), &[(Channel::Ch3, 10)]);
    }
}
