//! Register bank abstractions
//!
//! Every on-chip peripheral is a block of 32-bit control/status registers at
//! fixed byte offsets from a base address. [`RegisterBlock`] abstracts the raw
//! word access so the same peripheral logic runs against volatile MMIO on the
//! target and against simulated blocks in host tests.
//!
//! All bit and field helpers are plain read-modify-write sequences. They are
//! not atomic: a caller sharing a register with an interrupt handler must mask
//! that interrupt (or enter a critical section) around the sequence.

/// A contiguous bit range inside a 32-bit register
///
/// Fields are named after the reference-manual bits they cover, e.g.
/// `Field::bit(16)` for `RCC_CR.HSEON` or `Field::new(4, 4)` for `RCC_CFGR.HPRE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    shift: u8,
    width: u8,
}

impl Field {
    /// Create a field of `width` bits starting at bit `shift`
    ///
    /// Panics (at compile time when used in a `const`) if the field does not
    /// fit in 32 bits.
    pub const fn new(shift: u8, width: u8) -> Self {
        assert!(width >= 1 && width <= 32);
        assert!(shift as u32 + width as u32 <= 32);
        Self { shift, width }
    }

    /// A single-bit field
    pub const fn bit(index: u8) -> Self {
        Self::new(index, 1)
    }

    /// Lowest bit position of the field
    pub const fn shift(self) -> u8 {
        self.shift
    }

    /// Number of bits in the field
    pub const fn width(self) -> u8 {
        self.width
    }

    /// Register mask covering the field
    pub const fn mask(self) -> u32 {
        (u32::MAX >> (32 - self.width as u32)) << self.shift
    }

    /// Same-width field moved up by `bits`
    ///
    /// Registers that pack one field per pin or channel (MODER, AFRL, CCER)
    /// are described by the field for index 0 and offset from there.
    pub const fn offset_by(self, bits: u8) -> Self {
        Self::new(self.shift + bits, self.width)
    }

    /// The `n`th field in a register of back-to-back fields of this width
    pub const fn nth(self, n: u8) -> Self {
        self.offset_by(n * self.width)
    }

    /// Extract this field's value from a register word
    pub const fn extract(self, register: u32) -> u32 {
        (register & self.mask()) >> self.shift
    }

    /// Replace this field inside a register word, leaving other bits intact
    ///
    /// Bits of `value` that do not fit in the field are discarded.
    pub const fn insert(self, register: u32, value: u32) -> u32 {
        (register & !self.mask()) | ((value << self.shift) & self.mask())
    }
}

/// Word access to one peripheral's register block
///
/// Implementations only provide [`read`](Self::read) and
/// [`write`](Self::write); the bit-level helpers are derived from them.
/// Operating on a bit the hardware does not define is caller error and is not
/// detected.
pub trait RegisterBlock {
    /// Read the register `offset` bytes from the block base
    fn read(&self, offset: usize) -> u32;

    /// Write the register `offset` bytes from the block base
    fn write(&mut self, offset: usize, value: u32);

    /// Read, transform and write back a register
    fn modify<F: FnOnce(u32) -> u32>(&mut self, offset: usize, f: F) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    /// Set a single bit (read-modify-write)
    fn set_bit(&mut self, offset: usize, bit: u8) {
        self.modify(offset, |v| v | (1 << bit));
    }

    /// Clear a single bit (read-modify-write)
    fn clear_bit(&mut self, offset: usize, bit: u8) {
        self.modify(offset, |v| v & !(1 << bit));
    }

    /// Invert a single bit (read-modify-write)
    fn toggle_bit(&mut self, offset: usize, bit: u8) {
        self.modify(offset, |v| v ^ (1 << bit));
    }

    /// Read a single bit as 0 or 1
    fn get_bit(&self, offset: usize, bit: u8) -> u8 {
        ((self.read(offset) >> bit) & 1) as u8
    }

    /// Check whether a single bit is set
    fn is_set(&self, offset: usize, bit: u8) -> bool {
        self.get_bit(offset, bit) == 1
    }

    /// Write a field, leaving the rest of the register untouched
    fn write_field(&mut self, offset: usize, field: Field, value: u32) {
        self.modify(offset, |v| field.insert(v, value));
    }

    /// Read a field
    fn read_field(&self, offset: usize, field: Field) -> u32 {
        field.extract(self.read(offset))
    }
}

impl<T: RegisterBlock + ?Sized> RegisterBlock for &mut T {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}
