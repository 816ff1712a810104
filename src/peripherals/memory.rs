use thiserror::Error;

/// Access widths supported by the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wordsize {
    Byte,
    Halfword,
    Word,
}

impl Wordsize {
    fn width(&self) -> usize {
        match self {
            Wordsize::Byte => 1,
            Wordsize::Halfword => 2,
            Wordsize::Word => 4,
        }
    }
}

#[derive(Error, PartialEq, Eq, Debug)]
pub enum MemoryError {
    #[error("access of {len} bytes at offset 0x{offset:x} exceeds memory size 0x{size:x}")]
    OutOfRange { offset: u32, len: usize, size: usize },
}

/// Little-endian byte-addressed backing store for Rom and Ram,
/// initialised to zero.
#[derive(Debug, Clone)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn range(&self, offset: u32, len: usize) -> Result<std::ops::Range<usize>, MemoryError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(MemoryError::OutOfRange {
                offset,
                len,
                size: self.data.len(),
            }),
        }
    }

    pub fn read(&self, offset: u32, word_size: Wordsize) -> Result<u32, MemoryError> {
        let range = self.range(offset, word_size.width())?;
        let value = self.data[range]
            .iter()
            .rev()
            .fold(0, |value, byte| (value << 8) | u32::from(*byte));
        Ok(value)
    }

    pub fn write(
        &mut self,
        offset: u32,
        value: u32,
        word_size: Wordsize,
    ) -> Result<(), MemoryError> {
        let range = self.range(offset, word_size.width())?;
        let width = range.len();
        self.data[range].copy_from_slice(&value.to_le_bytes()[..width]);
        Ok(())
    }

    pub fn read_bytes(&self, offset: u32, len: usize) -> Result<&[u8], MemoryError> {
        let range = self.range(offset, len)?;
        Ok(&self.data[range])
    }

    pub fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Set every byte back to zero
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
