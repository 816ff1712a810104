//! Instruction encoders
//!
//! One function per mnemonic, producing the 32-bit instruction word.
//! Registers are given by number (e.g. 1 for x1) and immediates are
//! the operand values as they appear in assembly (branch and jump
//! offsets are byte offsets). These are mostly used to write test
//! programs directly into memory. Arguments are not range-checked;
//! out-of-range values produce garbage encodings.

use crate::utils::{extract_field, interpret_i32_as_unsigned};

pub use super::opcodes::*;

/// Make an I-type instruction. Only produces a valid I-type
/// instruction if the arguments are in range.
pub fn itype(imm: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (imm & 0xfff) << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode
}

/// Make an U- or J-type instruction (if you are making
/// a J-type instruction, make sure to construct the
/// immediate field correctly using jtype_imm_field)
pub fn ujtype(imm: u32, rd: u32, opcode: u32) -> u32 {
    imm << 12 | rd << 7 | opcode
}

/// Make an R- or S-type instruction. These instructions
/// have the same number of fields of the same size. The meaning
/// of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
pub fn rstype(a: u32, rs2: u32, rs1: u32, funct3: u32, b: u32, opcode: u32) -> u32 {
    a << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | b << 7 | opcode
}

/// Takes an immediate and shuffles it into the
/// format required for the 20-bit field of the
/// U-type instruction (making it J-type)
pub fn jtype_imm_field(imm: i32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    let imm20 = extract_field(imm, 20, 20);
    let imm19_12 = extract_field(imm, 19, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_1 = extract_field(imm, 10, 1);
    (imm20 << 19) | (imm10_1 << 9) | (imm11 << 8) | imm19_12
}

/// Returns (a, b) suitable for use with rstype for
/// the conditional branch instructions (btype)
pub fn btype_imm_fields(imm: i32) -> (u32, u32) {
    let imm = interpret_i32_as_unsigned(imm);
    let imm12 = extract_field(imm, 12, 12);
    let imm11 = extract_field(imm, 11, 11);
    let imm10_5 = extract_field(imm, 10, 5);
    let imm4_1 = extract_field(imm, 4, 1);
    let a = (imm12 << 6) | imm10_5;
    let b = (imm4_1 << 1) | imm11;
    (a, b)
}

/// The shift-by-immediate instructions use I-type,
/// but with a special encoding of the immediate that
/// uses the lower 5 bits for the shift amount (shamt)
/// and the upper 7 bits to distinguish between arithmetical
/// and logical right shift
pub fn shifts_imm_field(shamt: u32, upper: u32) -> u32 {
    let shamt = extract_field(shamt, 4, 0);
    (upper << 5) | shamt
}

macro_rules! itype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        pub fn $instruction(rd: u8, rs1: u8, imm: i32) -> u32 {
            let imm = interpret_i32_as_unsigned(imm);
            itype(imm, rs1.into(), $funct3, rd.into(), $opcode)
        }
    };
}

/// Here, upper is the only special value, which is always zero
/// apart from in srai, where it is 0b0100000.
macro_rules! shift_instr {
    ($instruction:ident, $upper:expr, $funct3:expr, $opcode:expr) => {
        pub fn $instruction(rd: u8, rs1: u8, shamt: u32) -> u32 {
            let imm = shifts_imm_field(shamt, $upper);
            itype(imm, rs1.into(), $funct3, rd.into(), $opcode)
        }
    };
}

macro_rules! rtype_instr {
    ($instruction:ident, $funct7:expr, $funct3:expr, $opcode:expr) => {
        pub fn $instruction(rd: u8, rs1: u8, rs2: u8) -> u32 {
            rstype($funct7, rs2.into(), rs1.into(), $funct3, rd.into(), $opcode)
        }
    };
}

macro_rules! stype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        pub fn $instruction(rs2: u8, rs1: u8, imm: i32) -> u32 {
            let imm = interpret_i32_as_unsigned(imm);
            let imm11_5 = extract_field(imm, 11, 5);
            let imm4_0 = extract_field(imm, 4, 0);
            rstype(imm11_5, rs2.into(), rs1.into(), $funct3, imm4_0, $opcode)
        }
    };
}

macro_rules! btype_instr {
    ($instruction:ident, $funct3:expr, $opcode:expr) => {
        pub fn $instruction(rs1: u8, rs2: u8, imm: i32) -> u32 {
            let (a, b) = btype_imm_fields(imm);
            rstype(a, rs2.into(), rs1.into(), $funct3, b, $opcode)
        }
    };
}

/// Note: in these instructions (LUI and AUIPC), the immediate imm
/// is already the upper 20 bits that will be loaded -- it will not
/// be shifted up.
macro_rules! utype_instr {
    ($instruction:ident, $opcode:expr) => {
        pub fn $instruction(rd: u8, imm: u32) -> u32 {
            ujtype(imm & 0xf_ffff, rd.into(), $opcode)
        }
    };
}

/// Atomics are R-type with the operation in funct7[6:2]. The aq
/// and rl bits are left clear.
macro_rules! amo_instr {
    ($instruction:ident, $funct5:expr) => {
        pub fn $instruction(rd: u8, rs1: u8, rs2: u8) -> u32 {
            rstype($funct5 << 2, rs2.into(), rs1.into(), FUNCT3_AMO_W, rd.into(), OP_AMO)
        }
    };
}

/// CSR instructions with a register source
macro_rules! csr_instr {
    ($instruction:ident, $funct3:expr) => {
        pub fn $instruction(rd: u8, rs1: u8, csr: u16) -> u32 {
            itype(csr.into(), rs1.into(), $funct3, rd.into(), OP_SYSTEM)
        }
    };
}

/// Special variant of the CSR instructions where rs1 is replaced
/// by a 5-bit immediate; used for csr*i instructions.
macro_rules! csri_instr {
    ($instruction:ident, $funct3:expr) => {
        pub fn $instruction(rd: u8, uimm: u8, csr: u16) -> u32 {
            itype(csr.into(), u32::from(uimm) & 0x1f, $funct3, rd.into(), OP_SYSTEM)
        }
    };
}

pub fn jal(rd: u8, imm: i32) -> u32 {
    ujtype(jtype_imm_field(imm), rd.into(), OP_JAL)
}

utype_instr!(lui, OP_LUI);
utype_instr!(auipc, OP_AUIPC);
itype_instr!(jalr, 0b000, OP_JALR);

// Conditional branches
btype_instr!(beq, FUNCT3_BEQ, OP_BRANCH);
btype_instr!(bne, FUNCT3_BNE, OP_BRANCH);
btype_instr!(blt, FUNCT3_BLT, OP_BRANCH);
btype_instr!(bge, FUNCT3_BGE, OP_BRANCH);
btype_instr!(bltu, FUNCT3_BLTU, OP_BRANCH);
btype_instr!(bgeu, FUNCT3_BGEU, OP_BRANCH);

// Loads
itype_instr!(lb, FUNCT3_B, OP_LOAD);
itype_instr!(lh, FUNCT3_H, OP_LOAD);
itype_instr!(lw, FUNCT3_W, OP_LOAD);
itype_instr!(lbu, FUNCT3_BU, OP_LOAD);
itype_instr!(lhu, FUNCT3_HU, OP_LOAD);

// Stores
stype_instr!(sb, FUNCT3_B, OP_STORE);
stype_instr!(sh, FUNCT3_H, OP_STORE);
stype_instr!(sw, FUNCT3_W, OP_STORE);

// Integer register-immediate instructions
itype_instr!(addi, FUNCT3_ADDI, OP_IMM);
itype_instr!(slti, FUNCT3_SLTI, OP_IMM);
itype_instr!(sltiu, FUNCT3_SLTIU, OP_IMM);
itype_instr!(xori, FUNCT3_XORI, OP_IMM);
itype_instr!(ori, FUNCT3_ORI, OP_IMM);
itype_instr!(andi, FUNCT3_ANDI, OP_IMM);

shift_instr!(slli, FUNCT7_BASE, FUNCT3_SLLI, OP_IMM);
shift_instr!(srli, FUNCT7_BASE, FUNCT3_SRLI, OP_IMM);
shift_instr!(srai, FUNCT7_SRA, FUNCT3_SRAI, OP_IMM);

// Integer register-register instructions
rtype_instr!(add, FUNCT7_BASE, FUNCT3_ADD, OP);
rtype_instr!(sub, FUNCT7_SUB, FUNCT3_SUB, OP);
rtype_instr!(sll, FUNCT7_BASE, FUNCT3_SLL, OP);
rtype_instr!(slt, FUNCT7_BASE, FUNCT3_SLT, OP);
rtype_instr!(sltu, FUNCT7_BASE, FUNCT3_SLTU, OP);
rtype_instr!(xor, FUNCT7_BASE, FUNCT3_XOR, OP);
rtype_instr!(srl, FUNCT7_BASE, FUNCT3_SRL, OP);
rtype_instr!(sra, FUNCT7_SRA, FUNCT3_SRA, OP);
rtype_instr!(or, FUNCT7_BASE, FUNCT3_OR, OP);
rtype_instr!(and, FUNCT7_BASE, FUNCT3_AND, OP);

// Multiplication and division
rtype_instr!(mul, FUNCT7_MULDIV, FUNCT3_MUL, OP);
rtype_instr!(mulh, FUNCT7_MULDIV, FUNCT3_MULH, OP);
rtype_instr!(mulhsu, FUNCT7_MULDIV, FUNCT3_MULHSU, OP);
rtype_instr!(mulhu, FUNCT7_MULDIV, FUNCT3_MULHU, OP);
rtype_instr!(div, FUNCT7_MULDIV, FUNCT3_DIV, OP);
rtype_instr!(divu, FUNCT7_MULDIV, FUNCT3_DIVU, OP);
rtype_instr!(rem, FUNCT7_MULDIV, FUNCT3_REM, OP);
rtype_instr!(remu, FUNCT7_MULDIV, FUNCT3_REMU, OP);

/// lr.w rd, (rs1)
pub fn lr_w(rd: u8, rs1: u8) -> u32 {
    rstype(FUNCT5_LR << 2, 0, rs1.into(), FUNCT3_AMO_W, rd.into(), OP_AMO)
}

// Atomics: argument order is rd, rs1 (address), rs2 (source)
amo_instr!(sc_w, FUNCT5_SC);
amo_instr!(amoswap_w, FUNCT5_AMOSWAP);
amo_instr!(amoadd_w, FUNCT5_AMOADD);
amo_instr!(amoxor_w, FUNCT5_AMOXOR);
amo_instr!(amoand_w, FUNCT5_AMOAND);
amo_instr!(amoor_w, FUNCT5_AMOOR);
amo_instr!(amomin_w, FUNCT5_AMOMIN);
amo_instr!(amomax_w, FUNCT5_AMOMAX);
amo_instr!(amominu_w, FUNCT5_AMOMINU);
amo_instr!(amomaxu_w, FUNCT5_AMOMAXU);

pub fn scall() -> u32 {
    itype(IMM_SCALL, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

pub fn sbreak() -> u32 {
    itype(IMM_SBREAK, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

pub fn eret() -> u32 {
    itype(IMM_ERET, 0, FUNCT3_PRIV, 0, OP_SYSTEM)
}

csr_instr!(csrrw, FUNCT3_CSRRW);
csr_instr!(csrrs, FUNCT3_CSRRS);
csr_instr!(csrrc, FUNCT3_CSRRC);
csri_instr!(csrrwi, FUNCT3_CSRRWI);
csri_instr!(csrrsi, FUNCT3_CSRRSI);
csri_instr!(csrrci, FUNCT3_CSRRCI);
