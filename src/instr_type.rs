//! Instruction formats
//!
//! Field extraction for the six base instruction formats (R, I, S,
//! B, U and J). Nothing here knows what an instruction does; each
//! function only pulls the bit-fields out of a 32-bit word. All
//! immediates are returned sign-extended to 32 bits, already shifted
//! into the position they occupy as an operand (so the B- and J-type
//! immediates are byte offsets with bit 0 clear, and the U-type
//! immediate has its low 12 bits clear).

use crate::utils::{extract_field, interpret_u32_as_signed, sign_extend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rtype {
    pub funct7: u8,
    pub rs2: u8,
    pub rs1: u8,
    pub funct3: u8,
    pub rd: u8,
    pub opcode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Itype {
    pub imm: i32,
    pub rs1: u8,
    pub funct3: u8,
    pub rd: u8,
    pub opcode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stype {
    pub imm: i32,
    pub rs2: u8,
    pub rs1: u8,
    pub funct3: u8,
    pub opcode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Btype {
    pub imm: i32,
    pub rs2: u8,
    pub rs1: u8,
    pub funct3: u8,
    pub opcode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utype {
    pub imm: i32,
    pub rd: u8,
    pub opcode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jtype {
    pub imm: i32,
    pub rd: u8,
    pub opcode: u8,
}

/// Makes a function called field_name which gets that field from a
/// 32-bit instruction. The function will extract instr[end:start]
/// (verilog notation). Every field here is at most 7 bits wide, so
/// it always fits the u8 result.
macro_rules! make_field_getter {
    ($field_name:ident, $end:expr, $start:expr) => {
        pub fn $field_name(instr: u32) -> u8 {
            extract_field(instr, $end, $start) as u8
        }
    };
}

make_field_getter!(opcode, 6, 0);
make_field_getter!(rd, 11, 7);
make_field_getter!(funct3, 14, 12);
make_field_getter!(rs1, 19, 15);
make_field_getter!(rs2, 24, 20);
make_field_getter!(funct7, 31, 25);

pub fn decode_rtype(instr: u32) -> Rtype {
    Rtype {
        funct7: funct7(instr),
        rs2: rs2(instr),
        rs1: rs1(instr),
        funct3: funct3(instr),
        rd: rd(instr),
        opcode: opcode(instr),
    }
}

pub fn decode_itype(instr: u32) -> Itype {
    Itype {
        imm: imm_itype(instr),
        rs1: rs1(instr),
        funct3: funct3(instr),
        rd: rd(instr),
        opcode: opcode(instr),
    }
}

pub fn decode_stype(instr: u32) -> Stype {
    Stype {
        imm: imm_stype(instr),
        rs2: rs2(instr),
        rs1: rs1(instr),
        funct3: funct3(instr),
        opcode: opcode(instr),
    }
}

pub fn decode_btype(instr: u32) -> Btype {
    Btype {
        imm: imm_btype(instr),
        rs2: rs2(instr),
        rs1: rs1(instr),
        funct3: funct3(instr),
        opcode: opcode(instr),
    }
}

pub fn decode_utype(instr: u32) -> Utype {
    Utype {
        imm: imm_utype(instr),
        rd: rd(instr),
        opcode: opcode(instr),
    }
}

pub fn decode_jtype(instr: u32) -> Jtype {
    Jtype {
        imm: imm_jtype(instr),
        rd: rd(instr),
        opcode: opcode(instr),
    }
}

/// The unsigned 12-bit immediate of an I-type instruction. This is
/// the CSR number for the Zicsr instructions and the function code
/// for the SYSTEM instructions with funct3 = 0.
pub fn imm_itype_unsigned(instr: u32) -> u16 {
    extract_field(instr, 31, 20) as u16
}

fn imm_itype(instr: u32) -> i32 {
    interpret_u32_as_signed(sign_extend(extract_field(instr, 31, 20), 11))
}

/// Get the immediate field in an S-type instruction
fn imm_stype(instr: u32) -> i32 {
    let imm11_5 = extract_field(instr, 31, 25);
    let imm4_0 = extract_field(instr, 11, 7);
    interpret_u32_as_signed(sign_extend((imm11_5 << 5) | imm4_0, 11))
}

/// Get the immediate field in an B-type instruction
fn imm_btype(instr: u32) -> i32 {
    let imm12 = extract_field(instr, 31, 31);
    let imm11 = extract_field(instr, 7, 7);
    let imm10_5 = extract_field(instr, 30, 25);
    let imm4_1 = extract_field(instr, 11, 8);
    let imm = (imm12 << 12) | (imm11 << 11) | (imm10_5 << 5) | (imm4_1 << 1);
    interpret_u32_as_signed(sign_extend(imm, 12))
}

fn imm_utype(instr: u32) -> i32 {
    interpret_u32_as_signed(instr & 0xffff_f000)
}

/// Get the jal instruction offset field from an instruction
fn imm_jtype(instr: u32) -> i32 {
    let imm20 = extract_field(instr, 31, 31);
    let imm19_12 = extract_field(instr, 19, 12);
    let imm11 = extract_field(instr, 20, 20);
    let imm10_1 = extract_field(instr, 30, 21);
    let imm = (imm20 << 20) | (imm19_12 << 12) | (imm11 << 11) | (imm10_1 << 1);
    interpret_u32_as_signed(sign_extend(imm, 20))
}
