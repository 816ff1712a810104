use thiserror::Error;

/// The 32 integer registers x0-x31. Register x0 is hardwired to
/// zero: writes to it are discarded.
#[derive(Debug, Default, Clone)]
pub struct Registers {
    registers: [u32; 32],
}

#[derive(Error, PartialEq, Eq, Debug)]
pub enum RegisterError {
    #[error("register index {0} exceeds 31")]
    InvalidRegister(usize),
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, which: usize, value: u32) -> Result<(), RegisterError> {
        if which > 31 {
            Err(RegisterError::InvalidRegister(which))
        } else {
            if which != 0 {
                self.registers[which] = value;
            }
            Ok(())
        }
    }

    pub fn read(&self, which: usize) -> Result<u32, RegisterError> {
        if which > 31 {
            Err(RegisterError::InvalidRegister(which))
        } else {
            Ok(self.registers[which])
        }
    }

    /// Read a register named by a decoded instruction field. Only
    /// the low five bits of the index are used, so this cannot fail.
    pub fn get(&self, which: u8) -> u32 {
        self.registers[usize::from(which & 0x1f)]
    }

    /// Write a register named by a decoded instruction field (low
    /// five bits only). Writes to x0 are discarded.
    pub fn set(&mut self, which: u8, value: u32) {
        let which = usize::from(which & 0x1f);
        if which != 0 {
            self.registers[which] = value;
        }
    }

    /// Zero every register
    pub fn clear(&mut self) {
        self.registers = [0; 32];
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.registers
    }
}
