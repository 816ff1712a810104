use crate::bus::{AddressTrap, Peripheral, PAGE_SIZE};

use super::memory::{Memory, MemoryError, Wordsize};

/// Read-only program memory
///
/// The hart can read it with any access width but every bus write
/// raises a store access fault. Contents are set from the host side
/// with program().
#[derive(Debug)]
pub struct Rom {
    pages: u32,
    memory: Memory,
}

impl Rom {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            memory: Memory::new(pages as usize * PAGE_SIZE as usize),
        }
    }

    /// Write bytes into the ROM starting at offset
    pub fn program(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        self.memory.write_bytes(offset, bytes)
    }

    /// Reset the whole ROM to zero
    pub fn erase(&mut self) {
        self.memory.clear();
    }

    pub fn size(&self) -> usize {
        self.memory.size()
    }

    pub fn read_bytes(&self, offset: u32, len: usize) -> Result<&[u8], MemoryError> {
        self.memory.read_bytes(offset, len)
    }
}

impl Peripheral for Rom {
    fn number_of_pages(&self) -> u32 {
        self.pages
    }

    fn read_byte(&mut self, offset: u32) -> Result<u8, AddressTrap> {
        let value = self.memory.read(offset, Wordsize::Byte);
        value
            .map(|v| v as u8)
            .map_err(|_| AddressTrap::load_fault(offset))
    }

    fn read_halfword(&mut self, offset: u32) -> Result<u16, AddressTrap> {
        let value = self.memory.read(offset, Wordsize::Halfword);
        value
            .map(|v| v as u16)
            .map_err(|_| AddressTrap::load_fault(offset))
    }

    fn read_word(&mut self, offset: u32) -> Result<u32, AddressTrap> {
        self.memory
            .read(offset, Wordsize::Word)
            .map_err(|_| AddressTrap::load_fault(offset))
    }

    fn write_byte(&mut self, offset: u32, _value: u8) -> Result<(), AddressTrap> {
        Err(AddressTrap::store_fault(offset))
    }

    fn write_halfword(&mut self, offset: u32, _value: u16) -> Result<(), AddressTrap> {
        Err(AddressTrap::store_fault(offset))
    }

    fn write_word(&mut self, offset: u32, _value: u32) -> Result<(), AddressTrap> {
        Err(AddressTrap::store_fault(offset))
    }
}
