//! Memory-mapped register blocks

use f4lab_hal::RegisterBlock;

/// Peripheral register block at a fixed address
///
/// Not `Clone`: each value stands for exclusive access to its peripheral.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the address of a peripheral register block on this
    /// chip, and no other `Mmio` for the same block may exist.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    pub const fn base(&self) -> usize {
        self.base
    }

    fn register(&self, offset: usize) -> *mut u32 {
        (self.base + offset) as *mut u32
    }
}

impl RegisterBlock for Mmio {
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `new` guarantees the block exists; offsets come from
        // the register maps in f4lab-core and are word aligned
        unsafe { core::ptr::read_volatile(self.register(offset)) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: as for `read`, and `&mut self` makes this the only writer
        unsafe { core::ptr::write_volatile(self.register(offset), value) }
    }
}
