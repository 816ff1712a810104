//! Execution of RV32I instructions
//!
//! Each function takes the decoded fields of one instruction and the
//! hart it runs on. On success the function has written its
//! destination register and moved the pc on (pc + 4, or the jump or
//! branch target). On an exception nothing has been written and the
//! pc still points at the instruction, so that trap entry records
//! the right mepc.
//!
//! Instruction behaviour is defined in RISC-V unprivileged
//! specification version 20191213, chapter 2.

use crate::bus::BusAccess;
use crate::utils::{interpret_i32_as_unsigned, interpret_u32_as_signed, sign_extend};

use super::trap::Exception;
use super::Hart;

/// Load upper immediate
///
/// Write imm (whose low 12 bits are already zero) to dest.
pub fn execute_lui(hart: &mut Hart, dest: u8, imm: i32) -> Result<(), Exception> {
    hart.set_x(dest, interpret_i32_as_unsigned(imm));
    hart.increment_pc();
    Ok(())
}

/// Add upper immediate to pc
///
/// Write pc + imm to dest, where pc is the address of this
/// instruction.
pub fn execute_auipc(hart: &mut Hart, dest: u8, imm: i32) -> Result<(), Exception> {
    let value = hart.pc.wrapping_add(interpret_i32_as_unsigned(imm));
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(())
}

/// Jump and link
///
/// Store the address of the next instruction (pc + 4) in dest,
/// then set pc = pc + offset.
pub fn execute_jal(hart: &mut Hart, dest: u8, offset: i32) -> Result<(), Exception> {
    let target = hart.pc.wrapping_add(interpret_i32_as_unsigned(offset));
    hart.jump_and_link(dest, target)
}

/// Jump and link register
///
/// Compute base + offset and clear the least significant bit to get
/// the target. Store pc + 4 in dest and jump to the target. The base
/// register is read before dest is written, so dest may equal base.
pub fn execute_jalr(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let target = 0xffff_fffe & hart.x(base).wrapping_add(interpret_i32_as_unsigned(offset));
    hart.jump_and_link(dest, target)
}

fn do_branch(hart: &mut Hart, branch_taken: bool, offset: i32) -> Result<(), Exception> {
    if branch_taken {
        let target = hart.pc.wrapping_add(interpret_i32_as_unsigned(offset));
        hart.jump_to_address(target)
    } else {
        hart.increment_pc();
        Ok(())
    }
}

fn signed_operands(hart: &Hart, src1: u8, src2: u8) -> (i32, i32) {
    (
        interpret_u32_as_signed(hart.x(src1)),
        interpret_u32_as_signed(hart.x(src2)),
    )
}

pub fn execute_beq(hart: &mut Hart, src1: u8, src2: u8, offset: i32) -> Result<(), Exception> {
    let branch_taken = hart.x(src1) == hart.x(src2);
    do_branch(hart, branch_taken, offset)
}

pub fn execute_bne(hart: &mut Hart, src1: u8, src2: u8, offset: i32) -> Result<(), Exception> {
    let branch_taken = hart.x(src1) != hart.x(src2);
    do_branch(hart, branch_taken, offset)
}

pub fn execute_blt(hart: &mut Hart, src1: u8, src2: u8, offset: i32) -> Result<(), Exception> {
    let (src1, src2) = signed_operands(hart, src1, src2);
    do_branch(hart, src1 < src2, offset)
}

pub fn execute_bge(hart: &mut Hart, src1: u8, src2: u8, offset: i32) -> Result<(), Exception> {
    let (src1, src2) = signed_operands(hart, src1, src2);
    do_branch(hart, src1 >= src2, offset)
}

pub fn execute_bltu(hart: &mut Hart, src1: u8, src2: u8, offset: i32) -> Result<(), Exception> {
    let branch_taken = hart.x(src1) < hart.x(src2);
    do_branch(hart, branch_taken, offset)
}

pub fn execute_bgeu(hart: &mut Hart, src1: u8, src2: u8, offset: i32) -> Result<(), Exception> {
    let branch_taken = hart.x(src1) >= hart.x(src2);
    do_branch(hart, branch_taken, offset)
}

fn effective_address(hart: &Hart, base: u8, offset: i32) -> u32 {
    hart.x(base).wrapping_add(interpret_i32_as_unsigned(offset))
}

/// Load a byte and sign extend it into dest
pub fn execute_lb(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = hart.bus.load_byte(address)?;
    hart.set_x(dest, sign_extend(value, 7));
    hart.increment_pc();
    Ok(())
}

/// Load a halfword and sign extend it into dest
pub fn execute_lh(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = hart.bus.load_halfword(address)?;
    hart.set_x(dest, sign_extend(value, 15));
    hart.increment_pc();
    Ok(())
}

pub fn execute_lw(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = hart.bus.load_word(address)?;
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(())
}

/// Load a byte and zero extend it into dest
pub fn execute_lbu(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = hart.bus.load_byte(address)?;
    hart.set_x(dest, value.into());
    hart.increment_pc();
    Ok(())
}

/// Load a halfword and zero extend it into dest
pub fn execute_lhu(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = hart.bus.load_halfword(address)?;
    hart.set_x(dest, value.into());
    hart.increment_pc();
    Ok(())
}

/// Store the low byte of src
pub fn execute_sb(hart: &mut Hart, src: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = (0xff & hart.x(src)) as u8;
    hart.bus.store_byte(address, value)?;
    hart.increment_pc();
    Ok(())
}

/// Store the low halfword of src
pub fn execute_sh(hart: &mut Hart, src: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = (0xffff & hart.x(src)) as u16;
    hart.bus.store_halfword(address, value)?;
    hart.increment_pc();
    Ok(())
}

pub fn execute_sw(hart: &mut Hart, src: u8, base: u8, offset: i32) -> Result<(), Exception> {
    let address = effective_address(hart, base, offset);
    let value = hart.x(src);
    hart.bus.store_word(address, value)?;
    hart.increment_pc();
    Ok(())
}

/// Register-immediate operations: dest = op(src, imm)
pub fn execute_reg_imm<F>(
    hart: &mut Hart,
    dest: u8,
    src: u8,
    imm: i32,
    op: F,
) -> Result<(), Exception>
where
    F: FnOnce(u32, u32) -> u32,
{
    let value = op(hart.x(src), interpret_i32_as_unsigned(imm));
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(())
}

/// Register-register operations: dest = op(src1, src2)
pub fn execute_reg_reg<F>(
    hart: &mut Hart,
    dest: u8,
    src1: u8,
    src2: u8,
    op: F,
) -> Result<(), Exception>
where
    F: FnOnce(u32, u32) -> u32,
{
    let value = op(hart.x(src1), hart.x(src2));
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(())
}

pub fn add(src1: u32, src2: u32) -> u32 {
    src1.wrapping_add(src2)
}

pub fn sub(src1: u32, src2: u32) -> u32 {
    src1.wrapping_sub(src2)
}

/// Set to 1 if src1 < src2 as signed integers
pub fn slt(src1: u32, src2: u32) -> u32 {
    u32::from(interpret_u32_as_signed(src1) < interpret_u32_as_signed(src2))
}

pub fn sltu(src1: u32, src2: u32) -> u32 {
    u32::from(src1 < src2)
}

pub fn xor(src1: u32, src2: u32) -> u32 {
    src1 ^ src2
}

pub fn or(src1: u32, src2: u32) -> u32 {
    src1 | src2
}

pub fn and(src1: u32, src2: u32) -> u32 {
    src1 & src2
}

// Shifts use only the low five bits of the shift amount

pub fn sll(src1: u32, src2: u32) -> u32 {
    src1 << (src2 & 0x1f)
}

pub fn srl(src1: u32, src2: u32) -> u32 {
    src1 >> (src2 & 0x1f)
}

pub fn sra(src1: u32, src2: u32) -> u32 {
    interpret_i32_as_unsigned(interpret_u32_as_signed(src1) >> (src2 & 0x1f))
}
