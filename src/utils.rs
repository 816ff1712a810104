//! Bit-level helpers shared by the encoder, the field extractors
//! and the executors

use num::PrimInt;

/// Bits end down to start (inclusive) of value, moved down to bit 0
pub fn extract_field<T: PrimInt>(value: T, end: usize, start: usize) -> T {
    let width = (end - start + 1) as u32;
    let field = value.unsigned_shr(start as u32);
    if width >= T::zero().count_zeros() {
        field
    } else {
        field & !(!T::zero()).unsigned_shl(width)
    }
}

/// Copy bit sign_bit of value into every bit above it
pub fn sign_extend<T: Into<u32>>(value: T, sign_bit: u32) -> u32 {
    let unused = 31 - sign_bit;
    interpret_i32_as_unsigned(interpret_u32_as_signed(value.into() << unused) >> unused)
}

pub fn interpret_u32_as_signed(value: u32) -> i32 {
    value as i32
}

pub fn interpret_i32_as_unsigned(value: i32) -> u32 {
    value as u32
}
