use crate::architecture::arm::ArmError;

/// An interface to be implemented for drivers that allow target memory access.
///
/// Sub-word values are returned right aligned, and only the low bits of a written
/// value are stored. Halfword and word accesses must be naturally aligned.
pub trait MemoryInterface {
    /// Read a 32bit word at `address`.
    fn read_word(&mut self, address: u32) -> Result<u32, ArmError>;

    /// Read a 16bit halfword at `address`.
    ///
    /// An odd `address` fails with [`ArmError::MemoryNotAligned`] before anything is
    /// sent. It is never turned into an access shifted onto the middle byte lanes.
    fn read_halfword(&mut self, address: u32) -> Result<u32, ArmError>;

    /// Read an 8bit byte at `address`.
    fn read_byte(&mut self, address: u32) -> Result<u32, ArmError>;

    /// Write a 32bit word at `address`.
    fn write_word(&mut self, address: u32, value: u32) -> Result<(), ArmError>;

    /// Write the low 16 bits of `value` at `address`.
    fn write_halfword(&mut self, address: u32, value: u32) -> Result<(), ArmError>;

    /// Write the low 8 bits of `value` at `address`.
    fn write_byte(&mut self, address: u32, value: u32) -> Result<(), ArmError>;

    /// Read `count` consecutive 32bit words starting at `address`.
    fn read_words(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError>;

    /// Read `count` consecutive 16bit halfwords starting at `address`.
    fn read_halfwords(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError>;

    /// Read `count` consecutive bytes starting at `address`.
    fn read_bytes(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError>;
}

impl<T> MemoryInterface for &mut T
where
    T: MemoryInterface + ?Sized,
{
    fn read_word(&mut self, address: u32) -> Result<u32, ArmError> {
        (*self).read_word(address)
    }

    fn read_halfword(&mut self, address: u32) -> Result<u32, ArmError> {
        (*self).read_halfword(address)
    }

    fn read_byte(&mut self, address: u32) -> Result<u32, ArmError> {
        (*self).read_byte(address)
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), ArmError> {
        (*self).write_word(address, value)
    }

    fn write_halfword(&mut self, address: u32, value: u32) -> Result<(), ArmError> {
        (*self).write_halfword(address, value)
    }

    fn write_byte(&mut self, address: u32, value: u32) -> Result<(), ArmError> {
        (*self).write_byte(address, value)
    }

    fn read_words(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError> {
        (*self).read_words(address, count)
    }

    fn read_halfwords(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError> {
        (*self).read_halfwords(address, count)
    }

    fn read_bytes(&mut self, address: u32, count: usize) -> Result<Vec<u32>, ArmError> {
        (*self).read_bytes(address, count)
    }
}
