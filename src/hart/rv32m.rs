//! Execution of the M extension (multiplication and division)
//!
//! Division never traps. Division by zero gives all ones for the
//! quotient and the dividend for the remainder; the one signed
//! overflow case (i32::MIN / -1) gives i32::MIN and remainder 0.

use crate::utils::{interpret_i32_as_unsigned, interpret_u32_as_signed};

pub fn mul(src1: u32, src2: u32) -> u32 {
    src1.wrapping_mul(src2)
}

/// Upper 32 bits of the signed x signed product
pub fn mulh(src1: u32, src2: u32) -> u32 {
    let src1 = i64::from(interpret_u32_as_signed(src1));
    let src2 = i64::from(interpret_u32_as_signed(src2));
    (src1.wrapping_mul(src2) >> 32) as u32
}

/// Upper 32 bits of the signed x unsigned product
pub fn mulhsu(src1: u32, src2: u32) -> u32 {
    let src1 = i64::from(interpret_u32_as_signed(src1));
    let src2 = i64::from(src2);
    (src1.wrapping_mul(src2) >> 32) as u32
}

/// Upper 32 bits of the unsigned x unsigned product
pub fn mulhu(src1: u32, src2: u32) -> u32 {
    let src1 = u64::from(src1);
    let src2 = u64::from(src2);
    (src1.wrapping_mul(src2) >> 32) as u32
}

pub fn div(src1: u32, src2: u32) -> u32 {
    let dividend = interpret_u32_as_signed(src1);
    let divisor = interpret_u32_as_signed(src2);
    if divisor == 0 {
        0xffff_ffff
    } else {
        // wrapping_div gives i32::MIN for i32::MIN / -1
        interpret_i32_as_unsigned(dividend.wrapping_div(divisor))
    }
}

pub fn divu(src1: u32, src2: u32) -> u32 {
    if src2 == 0 {
        0xffff_ffff
    } else {
        src1 / src2
    }
}

pub fn rem(src1: u32, src2: u32) -> u32 {
    let dividend = interpret_u32_as_signed(src1);
    let divisor = interpret_u32_as_signed(src2);
    if divisor == 0 {
        src1
    } else {
        interpret_i32_as_unsigned(dividend.wrapping_rem(divisor))
    }
}

pub fn remu(src1: u32, src2: u32) -> u32 {
    if src2 == 0 {
        src1
    } else {
        src1 % src2
    }
}
