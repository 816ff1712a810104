//! Machine-mode SYSTEM instructions: environment call, breakpoint
//! and trap return

use super::trap::Exception;
use super::Hart;

pub fn execute_scall(_hart: &mut Hart) -> Result<(), Exception> {
    Err(Exception::MmodeEcall)
}

pub fn execute_sbreak(_hart: &mut Hart) -> Result<(), Exception> {
    Err(Exception::Breakpoint)
}

/// Return from a trap handler to mepc, restoring the interrupt
/// enable that was in force when the trap was taken
pub fn execute_eret(hart: &mut Hart) -> Result<(), Exception> {
    let pc = hart.csr.eret();
    log::debug!("eret to 0x{pc:08x}");
    hart.pc = pc;
    Ok(())
}
