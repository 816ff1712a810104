//! Execution of the Zicsr instructions
//!
//! Every form reads the old CSR value first, then writes the CSR,
//! then writes the old value to dest. If the CSR access fails no
//! state changes, and the hart raises an illegal instruction
//! exception.
//!
//! csrrw and csrrwi always write. csrrs, csrrc, csrrsi and csrrci
//! only write when the source is not x0 (or the immediate is not
//! zero), which is what makes them usable on read-only CSRs.

use super::csr::CsrError;
use super::Hart;

fn update_csr<F>(hart: &mut Hart, dest: u8, csr: u16, write: bool, op: F) -> Result<(), CsrError>
where
    F: FnOnce(u32) -> u32,
{
    let old = hart.csr.read(csr)?;
    if write {
        hart.csr.write(csr, op(old))?;
    }
    hart.set_x(dest, old);
    hart.increment_pc();
    Ok(())
}

pub fn execute_csrrw(hart: &mut Hart, dest: u8, src: u8, csr: u16) -> Result<(), CsrError> {
    let value = hart.x(src);
    update_csr(hart, dest, csr, true, |_| value)
}

pub fn execute_csrrs(hart: &mut Hart, dest: u8, src: u8, csr: u16) -> Result<(), CsrError> {
    let mask = hart.x(src);
    update_csr(hart, dest, csr, src != 0, |old| old | mask)
}

pub fn execute_csrrc(hart: &mut Hart, dest: u8, src: u8, csr: u16) -> Result<(), CsrError> {
    let mask = hart.x(src);
    update_csr(hart, dest, csr, src != 0, |old| old & !mask)
}

pub fn execute_csrrwi(hart: &mut Hart, dest: u8, uimm: u8, csr: u16) -> Result<(), CsrError> {
    let value = u32::from(uimm & 0x1f);
    update_csr(hart, dest, csr, true, |_| value)
}

pub fn execute_csrrsi(hart: &mut Hart, dest: u8, uimm: u8, csr: u16) -> Result<(), CsrError> {
    let mask = u32::from(uimm & 0x1f);
    update_csr(hart, dest, csr, mask != 0, |old| old | mask)
}

pub fn execute_csrrci(hart: &mut Hart, dest: u8, uimm: u8, csr: u16) -> Result<(), CsrError> {
    let mask = u32::from(uimm & 0x1f);
    update_csr(hart, dest, csr, mask != 0, |old| old & !mask)
}
