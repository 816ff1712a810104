//! Control and status registers
//!
//! The hart implements the small machine-mode CSR bank below. All
//! CSRs are 32 bits wide.
//!
//! | Address | Name     | Access | Contents                                  |
//! |---------|----------|--------|-------------------------------------------|
//! | 0x300   | mstatus  | RW     | bit 0 ie, bit 3 ie1; other bits read 0x36 |
//! | 0x340   | mscratch | RW     | scratch register for trap handlers        |
//! | 0x341   | mepc     | RW     | pc of the instruction that trapped        |
//! | 0x342   | mcause   | RW     | cause code (bit 31 set for interrupts)    |
//! | 0x343   | mbadaddr | RW     | faulting address for address traps       |
//! | 0xf00   | mcpuid   | RO     | base and extensions (RV32 A, I and M)     |
//! | 0xf01   | mimpid   | RO     | implementation id                         |
//! | 0xf10   | mhartid  | RO     | always 0                                  |
//!
//! The interrupt enable bits form a two-entry stack. On trap entry
//! the current enable ie is pushed into ie1 and ie is cleared, so
//! the handler runs with interrupts disabled. ERET pops the stack
//! (ie = ie1) and sets ie1 back to true.
//!
//! Reading mstatus returns the constant 0x36 (the fixed privilege
//! and extension-state fields of a machine-mode-only hart) combined
//! with the two enable bits. Writing mstatus only changes ie and
//! ie1.
//!
//! An access to any address not in the table, or a write to a
//! read-only CSR, is an error that the hart turns into an illegal
//! instruction exception. Whether an instruction counts as a write
//! is decided by the caller (see the zicsr module): csrrs and csrrc
//! with a zero source only read.

use thiserror::Error;

pub const MSTATUS: u16 = 0x300;
pub const MSCRATCH: u16 = 0x340;
pub const MEPC: u16 = 0x341;
pub const MCAUSE: u16 = 0x342;
pub const MBADADDR: u16 = 0x343;
pub const MCPUID: u16 = 0xf00;
pub const MIMPID: u16 = 0xf01;
pub const MHARTID: u16 = 0xf10;

/// Base RV32 with the A, I and M extension bits
const MCPUID_VALUE: u32 = 0b1_0001_0000_0001;
const MIMPID_VALUE: u32 = 0x0010_8000;
const MSTATUS_FIXED: u32 = 0x36;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsrError {
    #[error("CSR 0x{0:x} does not exist (illegal instruction)")]
    NotPresentCsr(u16),
    #[error("attempted write to read-only CSR 0x{0:x} (illegal instruction)")]
    ReadOnlyCsr(u16),
}

/// Machine-mode control and status registers
#[derive(Debug, Default, Clone)]
pub struct Csr {
    ie: bool,
    ie1: bool,
    mscratch: u32,
    mepc: u32,
    mcause: u32,
    mbadaddr: u32,
}

impl Csr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value from a CSR
    ///
    /// If the CSR is not present, an error is returned.
    pub fn read(&self, csr: u16) -> Result<u32, CsrError> {
        let value = match csr {
            MSTATUS => self.mstatus(),
            MSCRATCH => self.mscratch,
            MEPC => self.mepc,
            MCAUSE => self.mcause,
            MBADADDR => self.mbadaddr,
            MCPUID => MCPUID_VALUE,
            MIMPID => MIMPID_VALUE,
            MHARTID => 0,
            _ => return Err(CsrError::NotPresentCsr(csr)),
        };
        Ok(value)
    }

    /// Write a value to a CSR
    ///
    /// If the CSR is not present or is read-only, an error is
    /// returned and no state changes.
    pub fn write(&mut self, csr: u16, value: u32) -> Result<(), CsrError> {
        match csr {
            MSTATUS => {
                self.ie = value & 0b1 != 0;
                self.ie1 = value & 0b1000 != 0;
            }
            MSCRATCH => self.mscratch = value,
            MEPC => self.mepc = value,
            MCAUSE => self.mcause = value,
            MBADADDR => self.mbadaddr = value,
            MCPUID | MIMPID | MHARTID => return Err(CsrError::ReadOnlyCsr(csr)),
            _ => return Err(CsrError::NotPresentCsr(csr)),
        }
        Ok(())
    }

    fn mstatus(&self) -> u32 {
        MSTATUS_FIXED | u32::from(self.ie) | (u32::from(self.ie1) << 3)
    }

    /// Record a trap and push the interrupt enable stack
    pub fn enter_trap(&mut self, mepc: u32, mcause: u32, bad_address: Option<u32>) {
        self.mepc = mepc;
        self.mcause = mcause;
        if let Some(address) = bad_address {
            self.mbadaddr = address;
        }
        self.ie1 = self.ie;
        self.ie = false;
    }

    /// Pop the interrupt enable stack and return the address to
    /// resume at
    pub fn eret(&mut self) -> u32 {
        self.ie = self.ie1;
        self.ie1 = true;
        self.mepc
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.ie
    }

    pub fn mepc(&self) -> u32 {
        self.mepc
    }

    pub fn mcause(&self) -> u32 {
        self.mcause
    }

    pub fn mbadaddr(&self) -> u32 {
        self.mbadaddr
    }
}
