//! Polled SPI between two peripherals of the same chip
//!
//! SPI1 is master and SPI2 slave, wired SCK to SCK, MOSI to MOSI and MISO
//! to MISO. The slave stages its reply, the master sends its byte, and
//! each side logs what it received.
//!
//! The slave must be staged before the master starts clocking. Nothing
//! enforces that across two chips; here both ends run in one loop, so it
//! holds by construction.

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m_rt::entry;
use defmt::*;
use f4lab_core::config::SpiLoopbackLesson;
use f4lab_core::rcc::Rcc;
use f4lab_core::spi::{SpiMaster, SpiSlave};
use f4lab_hal::Timeout;
use f4lab_lessons::chip::Peripherals;
use f4lab_lessons::{report, spin_delay, take_peripherals, BringUpError, Gpio, BOARD};

const LESSON: SpiLoopbackLesson = SpiLoopbackLesson::for_board(&BOARD);

/// A missing jumper shows up as a timeout instead of a hang
const TRANSFER_SPINS: u32 = 100_000;

#[entry]
fn main() -> ! {
    report(run(take_peripherals()))
}

fn run(p: Peripherals) -> Result<Infallible, BringUpError> {
    let mut rcc = Rcc::new(p.rcc);
    let mut gpio = Gpio::new(p.gpio);

    gpio.configure_all(&mut rcc, &LESSON.master_pins.all(), &LESSON.pin_config)?;
    gpio.configure_all(&mut rcc, &LESSON.slave_pins.all(), &LESSON.pin_config)?;

    rcc.enable(LESSON.master.peripheral());
    rcc.enable(LESSON.slave.peripheral());
    // Slave first, so it is listening before the master drives SCK
    let mut slave = SpiSlave::new(p.spi2, LESSON.slave, &LESSON.config, &rcc)?
        .with_timeout(Timeout::Spins(TRANSFER_SPINS));
    let mut master = SpiMaster::new(p.spi1, LESSON.master, &LESSON.config, &rcc)?
        .with_timeout(Timeout::Spins(TRANSFER_SPINS));
    info!("{} master, {} slave, {}", LESSON.master, LESSON.slave, LESSON.config.mode);

    let mut round: u8 = 0;
    loop {
        let out = LESSON.master_byte.wrapping_add(round);
        let reply = LESSON.slave_byte.wrapping_add(round);

        let exchanged = slave.stage(reply).and_then(|()| {
            let at_master = master.transfer(out)?;
            let at_slave = slave.try_read()?;
            Ok((at_master, at_slave))
        });
        match exchanged {
            Ok((at_master, Some(at_slave))) => {
                info!("master got {=u8:#x}, slave got {=u8:#x}", at_master, at_slave);
                if at_master != reply || at_slave != out {
                    warn!("mismatch: check the jumpers and both clock modes");
                }
            }
            Ok((at_master, None)) => {
                warn!("master got {=u8:#x}, slave saw nothing", at_master);
            }
            Err(e) => warn!("exchange failed: {}", e),
        }

        round = round.wrapping_add(1);
        spin_delay(16_000_000);
    }
}
