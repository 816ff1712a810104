//! Execution of the A extension (atomics)
//!
//! There is one hart, so a read-modify-write is atomic as long as
//! it completes within one instruction. The reservation used by
//! LR.W/SC.W lives on the bus, which clears it whenever a store
//! reaches the reserved word.
//!
//! All atomics need a word-aligned address. A misaligned LR.W is a
//! load address misaligned exception; a misaligned SC.W or AMO is a
//! store address misaligned exception.

use crate::bus::BusAccess;
use crate::utils::interpret_u32_as_signed;

use super::trap::Exception;
use super::Hart;

/// Load reserved
///
/// Load the word at base into dest and reserve that word.
pub fn execute_lr_w(hart: &mut Hart, dest: u8, base: u8) -> Result<(), Exception> {
    let address = hart.x(base);
    if address & 0b11 != 0 {
        return Err(Exception::LoadAddressMisaligned(address));
    }
    let value = hart.bus.load_word(address)?;
    hart.bus.set_reservation(address);
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(())
}

/// Store conditional
///
/// If the word at base is still reserved, store src there and write
/// 0 to dest; otherwise store nothing and write 1 to dest. The
/// reservation is gone afterwards either way.
pub fn execute_sc_w(hart: &mut Hart, dest: u8, base: u8, src: u8) -> Result<(), Exception> {
    let address = hart.x(base);
    if address & 0b11 != 0 {
        hart.bus.clear_reservation();
        return Err(Exception::StoreAddressMisaligned(address));
    }
    let status = if hart.bus.is_reserved(address) {
        let value = hart.x(src);
        hart.bus.store_word(address, value).map(|_| 0)
    } else {
        Ok(1)
    };
    hart.bus.clear_reservation();
    let status = status?;
    log::debug!("sc.w at 0x{address:08x}: status {status}");
    hart.set_x(dest, status);
    hart.increment_pc();
    Ok(())
}

/// Atomic memory operation
///
/// Load the word at base, store op(word, src) back, and write the
/// original word to dest. A fault on the load half is reported as a
/// store access fault, as for any AMO.
pub fn execute_amo<F>(hart: &mut Hart, dest: u8, base: u8, src: u8, op: F) -> Result<(), Exception>
where
    F: FnOnce(u32, u32) -> u32,
{
    let address = hart.x(base);
    if address & 0b11 != 0 {
        return Err(Exception::StoreAddressMisaligned(address));
    }
    let original = hart
        .bus
        .load_word(address)
        .map_err(|_| Exception::StoreAccessFault(address))?;
    let value = op(original, hart.x(src));
    hart.bus.store_word(address, value)?;
    hart.set_x(dest, original);
    hart.increment_pc();
    Ok(())
}

pub fn swap(_original: u32, src: u32) -> u32 {
    src
}

pub fn min(original: u32, src: u32) -> u32 {
    if interpret_u32_as_signed(original) < interpret_u32_as_signed(src) {
        original
    } else {
        src
    }
}

pub fn max(original: u32, src: u32) -> u32 {
    if interpret_u32_as_signed(original) > interpret_u32_as_signed(src) {
        original
    } else {
        src
    }
}

pub fn minu(original: u32, src: u32) -> u32 {
    original.min(src)
}

pub fn maxu(original: u32, src: u32) -> u32 {
    original.max(src)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_signed_and_unsigned_min_max() {
        assert_eq!(min(0xffff_ffff, 1), 0xffff_ffff);
        assert_eq!(minu(0xffff_ffff, 1), 1);
        assert_eq!(max(0xffff_ffff, 1), 1);
        assert_eq!(maxu(0xffff_ffff, 1), 0xffff_ffff);
        assert_eq!(swap(5, 6), 6);
    }
}
