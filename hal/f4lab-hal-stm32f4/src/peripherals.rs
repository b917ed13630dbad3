//! Peripheral singletons

use cortex_m::peripheral::ITM;
use f4lab_core::gpio::{Port, PORT_COUNT};
use portable_atomic::{AtomicBool, Ordering};

use crate::mmio::Mmio;
use crate::nvic::Nvic;

/// Base addresses of the register blocks the lessons use
pub mod addr {
    pub const TIM2: usize = 0x4000_0000;
    pub const TIM3: usize = 0x4000_0400;
    pub const TIM4: usize = 0x4000_0800;
    pub const TIM5: usize = 0x4000_0C00;
    pub const SPI2: usize = 0x4000_3800;
    pub const SPI3: usize = 0x4000_3C00;
    pub const USART2: usize = 0x4000_4400;
    pub const USART3: usize = 0x4000_4800;
    pub const USART1: usize = 0x4001_1000;
    pub const SPI1: usize = 0x4001_3000;
    pub const SYSCFG: usize = 0x4001_3800;
    pub const EXTI: usize = 0x4001_3C00;
    pub const GPIOA: usize = 0x4002_0000;
    pub const RCC: usize = 0x4002_3800;
    pub const FLASH: usize = 0x4002_3C00;

    /// GPIO ports are 1 KiB apart starting at GPIOA
    pub const fn gpio(port: usize) -> usize {
        GPIOA + 0x400 * port
    }
}

static TAKEN: AtomicBool = AtomicBool::new(false);

/// GPIO port blocks, each handed out once
pub struct GpioBlocks {
    ports: [Option<Mmio>; PORT_COUNT],
}

impl GpioBlocks {
    /// Take the register block of `port`, `None` if already taken
    pub fn take(&mut self, port: Port) -> Option<Mmio> {
        self.ports[port.index() as usize].take()
    }
}

/// Every peripheral the lessons touch
pub struct Peripherals {
    pub rcc: Mmio,
    pub flash: Mmio,
    pub gpio: GpioBlocks,
    pub spi1: Mmio,
    pub spi2: Mmio,
    pub spi3: Mmio,
    pub usart1: Mmio,
    pub usart2: Mmio,
    pub usart3: Mmio,
    pub tim2: Mmio,
    pub tim3: Mmio,
    pub tim4: Mmio,
    pub tim5: Mmio,
    pub exti: Mmio,
    pub syscfg: Mmio,
    pub nvic: Nvic,
    pub itm: ITM,
}

impl Peripherals {
    /// Take the peripherals; `None` on every call after the first
    ///
    /// Also takes the Cortex-M core peripherals, so it fails if those were
    /// taken elsewhere.
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        let cp = cortex_m::Peripherals::take()?;
        // SAFETY: guarded by TAKEN, so this runs once and each block below
        // is created exactly once
        Some(unsafe { Self::steal_device(cp.NVIC, cp.ITM) })
    }

    unsafe fn steal_device(nvic: cortex_m::peripheral::NVIC, itm: ITM) -> Self {
        Self {
            rcc: Mmio::new(addr::RCC),
            flash: Mmio::new(addr::FLASH),
            gpio: GpioBlocks {
                ports: core::array::from_fn(|port| Some(Mmio::new(addr::gpio(port)))),
            },
            spi1: Mmio::new(addr::SPI1),
            spi2: Mmio::new(addr::SPI2),
            spi3: Mmio::new(addr::SPI3),
            usart1: Mmio::new(addr::USART1),
            usart2: Mmio::new(addr::USART2),
            usart3: Mmio::new(addr::USART3),
            tim2: Mmio::new(addr::TIM2),
            tim3: Mmio::new(addr::TIM3),
            tim4: Mmio::new(addr::TIM4),
            tim5: Mmio::new(addr::TIM5),
            exti: Mmio::new(addr::EXTI),
            syscfg: Mmio::new(addr::SYSCFG),
            nvic: Nvic::new(nvic),
            itm,
        }
    }
}
