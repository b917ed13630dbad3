//! Shared bring-up for the lesson binaries
//!
//! Every lesson follows the same steps: take the peripherals, pick a system
//! clock, configure the pins it needs, then set up one peripheral from its
//! configuration record. The steps live here; the binaries in `src/bin`
//! only choose a record and run the loop.

#![no_std]

use core::convert::Infallible;

use f4lab_core::config::BoardPins;
use f4lab_core::flash::{Flash, FlashLatency};
use f4lab_core::gpio::{AlreadyClaimed, GpioPort, Pin, PinClaims, PinConfig, Port, PORT_COUNT};
use f4lab_core::rcc::{BusPrescalers, ClockError, ClockSource, Clocks, Rcc};
use f4lab_core::ConfigError;
use f4lab_hal::TransferError;
use f4lab_hal_stm32f4::{GpioBlocks, Mmio, Peripherals};
use {defmt_rtt as _, panic_probe as _};

pub use f4lab_hal_stm32f4 as chip;

/// Pin map all lessons are built for
pub const BOARD: BoardPins = BoardPins::DISCOVERY;

/// Bring-up failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum BringUpError {
    Config(ConfigError),
    Clock(ClockError),
    Transfer(TransferError),
    /// Two setup steps of one lesson want the same pin
    PinClaimed(Pin),
    /// The port's register block was moved out already
    PortTaken(Port),
}

impl From<ConfigError> for BringUpError {
    fn from(e: ConfigError) -> Self {
        BringUpError::Config(e)
    }
}

impl From<ClockError> for BringUpError {
    fn from(e: ClockError) -> Self {
        BringUpError::Clock(e)
    }
}

impl From<TransferError> for BringUpError {
    fn from(e: TransferError) -> Self {
        BringUpError::Transfer(e)
    }
}

impl From<AlreadyClaimed> for BringUpError {
    fn from(e: AlreadyClaimed) -> Self {
        BringUpError::PinClaimed(e.0)
    }
}

/// Take the peripherals; panics if called twice
pub fn take_peripherals() -> Peripherals {
    defmt::unwrap!(Peripherals::take())
}

/// Switch SYSCLK with the flash latency kept safe on both sides
///
/// Wait states go up before a faster clock is selected and come down only
/// after a slower one is running.
pub fn switch_clock(
    rcc: &mut Rcc<Mmio>,
    flash: &mut Flash<Mmio>,
    source: ClockSource,
    prescalers: BusPrescalers,
) -> Result<Clocks, BringUpError> {
    let target = FlashLatency::for_sysclk(source.sysclk_hz());
    if target > flash.latency() {
        flash.set_latency(target).map_err(ClockError::from)?;
    }
    let clocks = rcc.switch_to(source, prescalers)?;
    if target < flash.latency() {
        flash.set_latency(target).map_err(ClockError::from)?;
    }
    defmt::info!(
        "clocks: sysclk={=u32} hclk={=u32} pclk1={=u32} pclk2={=u32}",
        clocks.sysclk,
        clocks.hclk,
        clocks.pclk1,
        clocks.pclk2
    );
    Ok(clocks)
}

/// GPIO ports opened on demand, with per-lesson pin ownership
pub struct Gpio {
    blocks: GpioBlocks,
    ports: [Option<GpioPort<Mmio>>; PORT_COUNT],
    claims: PinClaims,
}

impl Gpio {
    pub fn new(blocks: GpioBlocks) -> Self {
        Self {
            blocks,
            ports: [const { None }; PORT_COUNT],
            claims: PinClaims::new(),
        }
    }

    /// Port handle, clocking and opening the port on first use
    pub fn port(&mut self, rcc: &mut Rcc<Mmio>, port: Port) -> Result<&mut GpioPort<Mmio>, BringUpError> {
        let slot = &mut self.ports[port.index() as usize];
        if slot.is_none() {
            let regs = self.blocks.take(port).ok_or(BringUpError::PortTaken(port))?;
            rcc.enable(port.peripheral());
            *slot = Some(GpioPort::new(regs, port, rcc)?);
        }
        slot.as_mut().ok_or(BringUpError::PortTaken(port))
    }

    /// Claim `pin` for this lesson and apply `config` to it
    pub fn configure(
        &mut self,
        rcc: &mut Rcc<Mmio>,
        pin: Pin,
        config: &PinConfig,
    ) -> Result<(), BringUpError> {
        self.claims.claim(pin)?;
        self.port(rcc, pin.port)?.configure(pin.index, config)?;
        defmt::debug!("{}{=u8} configured", pin.port, pin.index);
        Ok(())
    }

    /// Configure several pins alike
    pub fn configure_all(
        &mut self,
        rcc: &mut Rcc<Mmio>,
        pins: &[Pin],
        config: &PinConfig,
    ) -> Result<(), BringUpError> {
        pins.iter()
            .try_for_each(|&pin| self.configure(rcc, pin, config))
    }

    /// Move a configured port out, e.g. to share it with a handler
    pub fn take_port(&mut self, port: Port) -> Result<GpioPort<Mmio>, BringUpError> {
        self.ports[port.index() as usize]
            .take()
            .ok_or(BringUpError::PortTaken(port))
    }
}

/// End a lesson whose setup failed
///
/// Lessons run forever, so the only way out of one is a setup error.
pub fn report(outcome: Result<Infallible, BringUpError>) -> ! {
    match outcome {
        Ok(never) => match never {},
        Err(e) => defmt::panic!("lesson setup failed: {}", e),
    }
}

/// Busy-wait for at least `cycles` core clock cycles
pub fn spin_delay(cycles: u32) {
    cortex_m::asm::delay(cycles);
}

/// Stop in the debugger, then idle
pub fn park() -> ! {
    cortex_m::asm::bkpt();
    loop {
        cortex_m::asm::wfi();
    }
}
