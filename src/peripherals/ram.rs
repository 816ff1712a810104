use crate::bus::{AddressTrap, Peripheral, PAGE_SIZE};

use super::memory::{Memory, MemoryError, Wordsize};

/// Read/write data memory, little-endian, any access width
#[derive(Debug)]
pub struct Ram {
    pages: u32,
    memory: Memory,
}

impl Ram {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            memory: Memory::new(pages as usize * PAGE_SIZE as usize),
        }
    }

    pub fn size(&self) -> usize {
        self.memory.size()
    }

    pub fn read_bytes(&self, offset: u32, len: usize) -> Result<&[u8], MemoryError> {
        self.memory.read_bytes(offset, len)
    }

    pub fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        self.memory.write_bytes(offset, bytes)
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }
}

impl Peripheral for Ram {
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

    fn write_byte(&mut self, offset: u32, value: u8) -> Result<(), AddressTrap> {
        self.memory
            .write(offset, value.into(), Wordsize::Byte)
            .map_err(|_| AddressTrap::store_fault(offset))
    }

    fn write_halfword(&mut self, offset: u32, value: u16) -> Result<(), AddressTrap> {
        self.memory
            .write(offset, value.into(), Wordsize::Halfword)
            .map_err(|_| AddressTrap::store_fault(offset))
    }

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), AddressTrap> {
        self.memory
            .write(offset, value, Wordsize::Word)
            .map_err(|_| AddressTrap::store_fault(offset))
    }
}
