//! Traps
//!
//! Exceptions are raised synchronously by the instruction being
//! executed; interrupts arrive from outside the hart. Both end up as
//! a Trap, which is returned (not thrown) through fetch, decode and
//! execute so that trap entry happens in exactly one place.

use thiserror::Error;

use crate::bus::{AddressTrap, AddressTrapKind};

/// Synchronous exceptions. Address-related exceptions carry the
/// faulting address, which is written to mbadaddr on trap entry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    #[error("instruction address misaligned (0x{0:08x})")]
    InstructionAddressMisaligned(u32),
    #[error("instruction access fault (0x{0:08x})")]
    InstructionAccessFault(u32),
    #[error("illegal instruction 0x{0:08x}")]
    IllegalInstruction(u32),
    #[error("breakpoint")]
    Breakpoint,
    #[error("load address misaligned (0x{0:08x})")]
    LoadAddressMisaligned(u32),
    #[error("load access fault (0x{0:08x})")]
    LoadAccessFault(u32),
    #[error("store address misaligned (0x{0:08x})")]
    StoreAddressMisaligned(u32),
    #[error("store access fault (0x{0:08x})")]
    StoreAccessFault(u32),
    #[error("environment call from M-mode")]
    MmodeEcall,
}

/// All machine-level interrupts. Only the external interrupt
/// (driven by the interrupt controller) is wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    External,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    #[error("interrupt: {0:?}")]
    Interrupt(Interrupt),
    #[error("exception: {0}")]
    Exception(Exception),
}

impl Exception {
    /// The address to report in mbadaddr, if this exception has one
    pub fn bad_address(&self) -> Option<u32> {
        match *self {
            Self::InstructionAddressMisaligned(address)
            | Self::InstructionAccessFault(address)
            | Self::LoadAddressMisaligned(address)
            | Self::LoadAccessFault(address)
            | Self::StoreAddressMisaligned(address)
            | Self::StoreAccessFault(address) => Some(address),
            Self::IllegalInstruction(_) | Self::Breakpoint | Self::MmodeEcall => None,
        }
    }
}

impl Trap {
    /// The value of the mcause CSR for this trap
    pub fn mcause(&self) -> u32 {
        self.interrupt_bit() | self.cause()
    }

    /// Returns the interrupt-bit component of mcause
    pub fn interrupt_bit(&self) -> u32 {
        match self {
            Self::Interrupt(_) => 0x8000_0000,
            Self::Exception(_) => 0x0000_0000,
        }
    }

    /// The exception code part of mcause
    pub fn cause(&self) -> u32 {
        match self {
            Self::Interrupt(int) => match int {
                Interrupt::External => 11,
            },
            Self::Exception(ex) => match ex {
                Exception::InstructionAddressMisaligned(_) => 0,
                Exception::InstructionAccessFault(_) => 1,
                Exception::IllegalInstruction(_) => 2,
                Exception::Breakpoint => 3,
                Exception::LoadAddressMisaligned(_) => 4,
                Exception::LoadAccessFault(_) => 5,
                Exception::StoreAddressMisaligned(_) => 6,
                Exception::StoreAccessFault(_) => 7,
                Exception::MmodeEcall => 11,
            },
        }
    }

    pub fn bad_address(&self) -> Option<u32> {
        match self {
            Self::Interrupt(_) => None,
            Self::Exception(ex) => ex.bad_address(),
        }
    }
}

impl From<Exception> for Trap {
    fn from(ex: Exception) -> Trap {
        Trap::Exception(ex)
    }
}

impl From<AddressTrap> for Exception {
    fn from(trap: AddressTrap) -> Exception {
        let address = trap.address;
        match trap.kind {
            AddressTrapKind::InstructionMisaligned => Self::InstructionAddressMisaligned(address),
            AddressTrapKind::InstructionAccessFault => Self::InstructionAccessFault(address),
            AddressTrapKind::LoadMisaligned => Self::LoadAddressMisaligned(address),
            AddressTrapKind::LoadAccessFault => Self::LoadAccessFault(address),
            AddressTrapKind::StoreMisaligned => Self::StoreAddressMisaligned(address),
            AddressTrapKind::StoreAccessFault => Self::StoreAccessFault(address),
        }
    }
}

impl From<AddressTrap> for Trap {
    fn from(trap: AddressTrap) -> Trap {
        Trap::Exception(trap.into())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_mcause_values() {
        let expected = [
            (Exception::InstructionAddressMisaligned(0), 0),
            (Exception::InstructionAccessFault(0), 1),
            (Exception::IllegalInstruction(0), 2),
            (Exception::Breakpoint, 3),
            (Exception::LoadAddressMisaligned(0), 4),
            (Exception::LoadAccessFault(0), 5),
            (Exception::StoreAddressMisaligned(0), 6),
            (Exception::StoreAccessFault(0), 7),
            (Exception::MmodeEcall, 11),
        ];
        for (ex, mcause) in expected {
            assert_eq!(Trap::from(ex).mcause(), mcause);
        }
        assert_eq!(Trap::Interrupt(Interrupt::External).mcause(), 0x8000_000b);
    }

    #[test]
    fn check_address_trap_conversion_keeps_address() {
        let trap = AddressTrap::new(AddressTrapKind::StoreAccessFault, 0x1234_5678);
        let trap = Trap::from(trap);
        assert_eq!(trap.mcause(), 7);
        assert_eq!(trap.bad_address(), Some(0x1234_5678));
        assert_eq!(Trap::from(Exception::Breakpoint).bad_address(), None);
    }
}
