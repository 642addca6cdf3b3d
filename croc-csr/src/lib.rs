//! Register access primitives and the register map of the Croc SoC
//! peripherals driven by this repository.
//!
//! Offsets are expressed in 32-bit words from the peripheral base, the
//! same way the map is laid out in [`generated`].

#![no_std]

pub mod generated;
pub use generated::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Register {
    /// Offset of this register within this CSR, in words
    offset: usize,
    /// Mask of all the bits in use by this register
    mask: usize,
}

impl Register {
    pub const fn new(offset: usize, mask: usize) -> Register {
        Register { offset, mask }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn mask(&self) -> usize {
        self.mask
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Field {
    /// Right-aligned mask of the field's width
    mask: usize,
    /// Bit position of the lowest bit of the field
    offset: usize,
    register: Register,
}

impl Field {
    /// A field `width` bits wide, starting at bit `offset` of `register`.
    pub const fn new(width: usize, offset: usize, register: Register) -> Field {
        let mask = if width >= usize::BITS as usize {
            usize::MAX
        } else {
            (1 << width) - 1
        };
        Field {
            mask,
            offset,
            register,
        }
    }

    pub const fn mask(&self) -> usize {
        self.mask
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn width(&self) -> u32 {
        self.mask.count_ones()
    }

    pub const fn register(&self) -> Register {
        self.register
    }

    /// Mask of the field in its register position.
    pub const fn shifted_mask(&self) -> u32 {
        (self.mask << self.offset) as u32
    }

    /// Moves `value` into the field position, truncated to the field width.
    pub const fn ms(&self, value: u32) -> u32 {
        ((value as usize & self.mask) << self.offset) as u32
    }

    /// Extracts the field from a full register value.
    pub const fn extract(&self, value: u32) -> u32 {
        ((value as usize >> self.offset) & self.mask) as u32
    }

    /// Returns true if `value` fits in the field without truncation.
    pub const fn fits(&self, value: u32) -> bool {
        value as usize & !self.mask == 0
    }
}

/// Volatile accessor for a block of 32-bit control and status registers.
#[derive(Debug, Copy, Clone)]
pub struct CSR<T> {
    base: *mut T,
}

impl CSR<u32> {
    pub fn new(base: *mut u32) -> Self {
        CSR { base }
    }

    pub fn base(&self) -> *mut u32 {
        self.base
    }

    /// Reads the entire CSR.
    pub fn r(&self, reg: Register) -> u32 {
        unsafe { self.base.add(reg.offset).read_volatile() }
    }

    /// Reads a field out of a CSR.
    pub fn rf(&self, field: Field) -> u32 {
        field.extract(self.r(field.register))
    }

    /// Writes the entire CSR, without reading it first.
    pub fn wo(&mut self, reg: Register, val: u32) {
        unsafe { self.base.add(reg.offset).write_volatile(val) }
    }

    /// Writes a single field, zeroing every other field of the CSR.
    pub fn wfo(&mut self, field: Field, val: u32) {
        self.wo(field.register, field.ms(val));
    }

    /// Read-modify-write of a single field, preserving the other fields.
    pub fn rmwf(&mut self, field: Field, val: u32) {
        let prev = self.r(field.register) & !field.shifted_mask();
        self.wo(field.register, prev | field.ms(val));
    }

    /// Moves a value into the position of `field`, for composing a write.
    pub fn ms(&self, field: Field, value: u32) -> u32 {
        field.ms(value)
    }

    /// Zeroes `field` in `value`.
    pub fn zf(&self, field: Field, value: u32) -> u32 {
        value & !field.shifted_mask()
    }
}
