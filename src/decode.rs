//! Instruction Decoding
//!
//! This file is where a u32 instruction word is converted into the
//! Instr enum, which holds the mnemonic and only the fields that
//! mnemonic uses, ready for execution.
//!
//! Decoding is total. Any word which is not a supported encoding
//! (compressed, reserved, custom, or a supported opcode with an
//! unsupported funct3/funct7 combination) becomes Instr::Illegal,
//! which raises an illegal instruction exception when it is
//! executed rather than when it is decoded.
//!
//! Field names below are dest (rd), src/src1/src2 (rs1/rs2), base
//! (the address register of loads, stores and atomics), and
//! offset/imm for the sign-extended immediates.

use std::fmt;

use crate::instr_type::*;
use crate::opcodes::*;

/// RV32IMA and machine-mode SYSTEM instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Load imm (low 12 bits already zero) into dest
    Lui { dest: u8, imm: i32 },
    /// Add imm (low 12 bits already zero) to the pc of this
    /// instruction and place the result in dest
    Auipc { dest: u8, imm: i32 },
    /// Store pc+4 in dest and jump to pc + offset
    Jal { dest: u8, offset: i32 },
    /// Store pc+4 in dest and jump to (base + offset) with bit 0
    /// cleared
    Jalr { dest: u8, base: u8, offset: i32 },

    Beq { src1: u8, src2: u8, offset: i32 },
    Bne { src1: u8, src2: u8, offset: i32 },
    Blt { src1: u8, src2: u8, offset: i32 },
    Bge { src1: u8, src2: u8, offset: i32 },
    Bltu { src1: u8, src2: u8, offset: i32 },
    Bgeu { src1: u8, src2: u8, offset: i32 },

    Lb { dest: u8, base: u8, offset: i32 },
    Lh { dest: u8, base: u8, offset: i32 },
    Lw { dest: u8, base: u8, offset: i32 },
    Lbu { dest: u8, base: u8, offset: i32 },
    Lhu { dest: u8, base: u8, offset: i32 },

    Sb { src: u8, base: u8, offset: i32 },
    Sh { src: u8, base: u8, offset: i32 },
    Sw { src: u8, base: u8, offset: i32 },

    Addi { dest: u8, src: u8, imm: i32 },
    Slti { dest: u8, src: u8, imm: i32 },
    Sltiu { dest: u8, src: u8, imm: i32 },
    Xori { dest: u8, src: u8, imm: i32 },
    Ori { dest: u8, src: u8, imm: i32 },
    Andi { dest: u8, src: u8, imm: i32 },
    Slli { dest: u8, src: u8, shamt: u8 },
    Srli { dest: u8, src: u8, shamt: u8 },
    Srai { dest: u8, src: u8, shamt: u8 },

    Add { dest: u8, src1: u8, src2: u8 },
    Sub { dest: u8, src1: u8, src2: u8 },
    Sll { dest: u8, src1: u8, src2: u8 },
    Slt { dest: u8, src1: u8, src2: u8 },
    Sltu { dest: u8, src1: u8, src2: u8 },
    Xor { dest: u8, src1: u8, src2: u8 },
    Srl { dest: u8, src1: u8, src2: u8 },
    Sra { dest: u8, src1: u8, src2: u8 },
    Or { dest: u8, src1: u8, src2: u8 },
    And { dest: u8, src1: u8, src2: u8 },

    Mul { dest: u8, src1: u8, src2: u8 },
    Mulh { dest: u8, src1: u8, src2: u8 },
    Mulhsu { dest: u8, src1: u8, src2: u8 },
    Mulhu { dest: u8, src1: u8, src2: u8 },
    Div { dest: u8, src1: u8, src2: u8 },
    Divu { dest: u8, src1: u8, src2: u8 },
    Rem { dest: u8, src1: u8, src2: u8 },
    Remu { dest: u8, src1: u8, src2: u8 },

    /// Load the word at base into dest and reserve its address
    LrW { dest: u8, base: u8 },
    /// Store src at base if the reservation is still held. dest is
    /// written with 0 on success and 1 on failure.
    ScW { dest: u8, base: u8, src: u8 },
    AmoswapW { dest: u8, base: u8, src: u8 },
    AmoaddW { dest: u8, base: u8, src: u8 },
    AmoxorW { dest: u8, base: u8, src: u8 },
    AmoandW { dest: u8, base: u8, src: u8 },
    AmoorW { dest: u8, base: u8, src: u8 },
    AmominW { dest: u8, base: u8, src: u8 },
    AmomaxW { dest: u8, base: u8, src: u8 },
    AmominuW { dest: u8, base: u8, src: u8 },
    AmomaxuW { dest: u8, base: u8, src: u8 },

    /// Environment call (ecall)
    Scall,
    /// Breakpoint (ebreak)
    Sbreak,
    /// Return from a machine-mode trap handler
    Eret,

    Csrrw { dest: u8, src: u8, csr: u16 },
    Csrrs { dest: u8, src: u8, csr: u16 },
    Csrrc { dest: u8, src: u8, csr: u16 },
    /// As for the register forms, but the source is the 5-bit
    /// zero-extended immediate uimm held in the rs1 field
    Csrrwi { dest: u8, uimm: u8, csr: u16 },
    Csrrsi { dest: u8, uimm: u8, csr: u16 },
    Csrrci { dest: u8, uimm: u8, csr: u16 },

    /// Any word that does not decode to one of the above. The raw
    /// word is kept for diagnostics.
    Illegal(u32),
}

impl Instr {
    /// Decode a 32-bit instruction word. This never fails: words
    /// that are not valid instructions decode to Instr::Illegal.
    pub fn decode(instr: u32) -> Self {
        // No compressed instructions
        if instr & 0b11 != 0b11 {
            return Self::Illegal(instr);
        }
        match instr & 0x7f {
            OP_LOAD => decode_load(instr),
            OP_IMM => decode_op_imm(instr),
            OP_AUIPC => {
                let Utype { imm, rd, .. } = decode_utype(instr);
                Self::Auipc { dest: rd, imm }
            }
            OP_STORE => decode_store(instr),
            OP_AMO => decode_amo(instr),
            OP => decode_op(instr),
            OP_LUI => {
                let Utype { imm, rd, .. } = decode_utype(instr);
                Self::Lui { dest: rd, imm }
            }
            OP_BRANCH => decode_branch(instr),
            OP_JALR => {
                let Itype {
                    imm,
                    rs1,
                    funct3,
                    rd,
                    ..
                } = decode_itype(instr);
                if funct3 == 0 {
                    Self::Jalr {
                        dest: rd,
                        base: rs1,
                        offset: imm,
                    }
                } else {
                    Self::Illegal(instr)
                }
            }
            OP_JAL => {
                let Jtype { imm, rd, .. } = decode_jtype(instr);
                Self::Jal {
                    dest: rd,
                    offset: imm,
                }
            }
            OP_SYSTEM => decode_system(instr),
            _ => Self::Illegal(instr),
        }
    }

    /// True for the illegal instruction variant
    pub fn is_illegal(&self) -> bool {
        matches!(self, Self::Illegal(_))
    }
}

fn decode_load(instr: u32) -> Instr {
    let Itype {
        imm: offset,
        rs1: base,
        funct3,
        rd: dest,
        ..
    } = decode_itype(instr);
    match u32::from(funct3) {
        FUNCT3_B => Instr::Lb { dest, base, offset },
        FUNCT3_H => Instr::Lh { dest, base, offset },
        FUNCT3_W => Instr::Lw { dest, base, offset },
        FUNCT3_BU => Instr::Lbu { dest, base, offset },
        FUNCT3_HU => Instr::Lhu { dest, base, offset },
        _ => Instr::Illegal(instr),
    }
}

fn decode_store(instr: u32) -> Instr {
    let Stype {
        imm: offset,
        rs2: src,
        rs1: base,
        funct3,
        ..
    } = decode_stype(instr);
    match u32::from(funct3) {
        FUNCT3_B => Instr::Sb { src, base, offset },
        FUNCT3_H => Instr::Sh { src, base, offset },
        FUNCT3_W => Instr::Sw { src, base, offset },
        _ => Instr::Illegal(instr),
    }
}

fn decode_op_imm(instr: u32) -> Instr {
    let Itype {
        imm,
        rs1: src,
        funct3,
        rd: dest,
        ..
    } = decode_itype(instr);
    // For the shifts, the shift amount is imm[4:0] and
    // imm[11:5] (which is funct7) selects the shift type
    let shamt = rs2(instr);
    let upper = u32::from(funct7(instr));
    match u32::from(funct3) {
        FUNCT3_ADDI => Instr::Addi { dest, src, imm },
        FUNCT3_SLTI => Instr::Slti { dest, src, imm },
        FUNCT3_SLTIU => Instr::Sltiu { dest, src, imm },
        FUNCT3_XORI => Instr::Xori { dest, src, imm },
        FUNCT3_ORI => Instr::Ori { dest, src, imm },
        FUNCT3_ANDI => Instr::Andi { dest, src, imm },
        FUNCT3_SLLI if upper == FUNCT7_BASE => Instr::Slli { dest, src, shamt },
        FUNCT3_SRLI if upper == FUNCT7_BASE => Instr::Srli { dest, src, shamt },
        FUNCT3_SRAI if upper == FUNCT7_SRA => Instr::Srai { dest, src, shamt },
        _ => Instr::Illegal(instr),
    }
}

fn decode_op(instr: u32) -> Instr {
    let Rtype {
        funct7,
        rs2: src2,
        rs1: src1,
        funct3,
        rd: dest,
        ..
    } = decode_rtype(instr);
    match (u32::from(funct7), u32::from(funct3)) {
        (FUNCT7_BASE, FUNCT3_ADD) => Instr::Add { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_SLL) => Instr::Sll { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_SLT) => Instr::Slt { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_SLTU) => Instr::Sltu { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_XOR) => Instr::Xor { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_SRL) => Instr::Srl { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_OR) => Instr::Or { dest, src1, src2 },
        (FUNCT7_BASE, FUNCT3_AND) => Instr::And { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_MUL) => Instr::Mul { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_MULH) => Instr::Mulh { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_MULHSU) => Instr::Mulhsu { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_MULHU) => Instr::Mulhu { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_DIV) => Instr::Div { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_DIVU) => Instr::Divu { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_REM) => Instr::Rem { dest, src1, src2 },
        (FUNCT7_MULDIV, FUNCT3_REMU) => Instr::Remu { dest, src1, src2 },
        (FUNCT7_SUB, FUNCT3_SUB) => Instr::Sub { dest, src1, src2 },
        (FUNCT7_SRA, FUNCT3_SRA) => Instr::Sra { dest, src1, src2 },
        _ => Instr::Illegal(instr),
    }
}

fn decode_branch(instr: u32) -> Instr {
    let Btype {
        imm: offset,
        rs2: src2,
        rs1: src1,
        funct3,
        ..
    } = decode_btype(instr);
    match u32::from(funct3) {
        FUNCT3_BEQ => Instr::Beq { src1, src2, offset },
        FUNCT3_BNE => Instr::Bne { src1, src2, offset },
        FUNCT3_BLT => Instr::Blt { src1, src2, offset },
        FUNCT3_BGE => Instr::Bge { src1, src2, offset },
        FUNCT3_BLTU => Instr::Bltu { src1, src2, offset },
        FUNCT3_BGEU => Instr::Bgeu { src1, src2, offset },
        _ => Instr::Illegal(instr),
    }
}

fn decode_amo(instr: u32) -> Instr {
    let Rtype {
        funct7,
        rs2: src,
        rs1: base,
        funct3,
        rd: dest,
        ..
    } = decode_rtype(instr);
    if u32::from(funct3) != FUNCT3_AMO_W {
        return Instr::Illegal(instr);
    }
    // The aq and rl bits (funct7[1:0]) carry no meaning for a
    // single in-order hart, so only funct7[6:2] is examined
    match u32::from(funct7 >> 2) {
        FUNCT5_LR => Instr::LrW { dest, base },
        FUNCT5_SC => Instr::ScW { dest, base, src },
        FUNCT5_AMOSWAP => Instr::AmoswapW { dest, base, src },
        FUNCT5_AMOADD => Instr::AmoaddW { dest, base, src },
        FUNCT5_AMOXOR => Instr::AmoxorW { dest, base, src },
        FUNCT5_AMOAND => Instr::AmoandW { dest, base, src },
        FUNCT5_AMOOR => Instr::AmoorW { dest, base, src },
        FUNCT5_AMOMIN => Instr::AmominW { dest, base, src },
        FUNCT5_AMOMAX => Instr::AmomaxW { dest, base, src },
        FUNCT5_AMOMINU => Instr::AmominuW { dest, base, src },
        FUNCT5_AMOMAXU => Instr::AmomaxuW { dest, base, src },
        _ => Instr::Illegal(instr),
    }
}

fn decode_system(instr: u32) -> Instr {
    let Itype {
        rs1, funct3, rd, ..
    } = decode_itype(instr);
    let csr = imm_itype_unsigned(instr);
    match u32::from(funct3) {
        FUNCT3_PRIV => match u32::from(csr) {
            IMM_SCALL => Instr::Scall,
            IMM_SBREAK => Instr::Sbreak,
            IMM_ERET => Instr::Eret,
            _ => Instr::Illegal(instr),
        },
        FUNCT3_CSRRW => Instr::Csrrw { dest: rd, src: rs1, csr },
        FUNCT3_CSRRS => Instr::Csrrs { dest: rd, src: rs1, csr },
        FUNCT3_CSRRC => Instr::Csrrc { dest: rd, src: rs1, csr },
        FUNCT3_CSRRWI => Instr::Csrrwi { dest: rd, uimm: rs1, csr },
        FUNCT3_CSRRSI => Instr::Csrrsi { dest: rd, uimm: rs1, csr },
        FUNCT3_CSRRCI => Instr::Csrrci { dest: rd, uimm: rs1, csr },
        _ => Instr::Illegal(instr),
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Instr::*;
        match *self {
            Lui { dest, imm } => write!(f, "lui x{dest}, 0x{:x}", (imm as u32) >> 12),
            Auipc { dest, imm } => write!(f, "auipc x{dest}, 0x{:x}", (imm as u32) >> 12),
            Jal { dest, offset } => write!(f, "jal x{dest}, {offset}"),
            Jalr { dest, base, offset } => write!(f, "jalr x{dest}, {offset}(x{base})"),
            Beq { src1, src2, offset } => write!(f, "beq x{src1}, x{src2}, {offset}"),
            Bne { src1, src2, offset } => write!(f, "bne x{src1}, x{src2}, {offset}"),
            Blt { src1, src2, offset } => write!(f, "blt x{src1}, x{src2}, {offset}"),
            Bge { src1, src2, offset } => write!(f, "bge x{src1}, x{src2}, {offset}"),
            Bltu { src1, src2, offset } => write!(f, "bltu x{src1}, x{src2}, {offset}"),
            Bgeu { src1, src2, offset } => write!(f, "bgeu x{src1}, x{src2}, {offset}"),
            Lb { dest, base, offset } => write!(f, "lb x{dest}, {offset}(x{base})"),
            Lh { dest, base, offset } => write!(f, "lh x{dest}, {offset}(x{base})"),
            Lw { dest, base, offset } => write!(f, "lw x{dest}, {offset}(x{base})"),
            Lbu { dest, base, offset } => write!(f, "lbu x{dest}, {offset}(x{base})"),
            Lhu { dest, base, offset } => write!(f, "lhu x{dest}, {offset}(x{base})"),
            Sb { src, base, offset } => write!(f, "sb x{src}, {offset}(x{base})"),
            Sh { src, base, offset } => write!(f, "sh x{src}, {offset}(x{base})"),
            Sw { src, base, offset } => write!(f, "sw x{src}, {offset}(x{base})"),
            Addi { dest, src, imm } => write!(f, "addi x{dest}, x{src}, {imm}"),
            Slti { dest, src, imm } => write!(f, "slti x{dest}, x{src}, {imm}"),
            Sltiu { dest, src, imm } => write!(f, "sltiu x{dest}, x{src}, {imm}"),
            Xori { dest, src, imm } => write!(f, "xori x{dest}, x{src}, {imm}"),
            Ori { dest, src, imm } => write!(f, "ori x{dest}, x{src}, {imm}"),
            Andi { dest, src, imm } => write!(f, "andi x{dest}, x{src}, {imm}"),
            Slli { dest, src, shamt } => write!(f, "slli x{dest}, x{src}, {shamt}"),
            Srli { dest, src, shamt } => write!(f, "srli x{dest}, x{src}, {shamt}"),
            Srai { dest, src, shamt } => write!(f, "srai x{dest}, x{src}, {shamt}"),
            Add { dest, src1, src2 } => write!(f, "add x{dest}, x{src1}, x{src2}"),
            Sub { dest, src1, src2 } => write!(f, "sub x{dest}, x{src1}, x{src2}"),
            Sll { dest, src1, src2 } => write!(f, "sll x{dest}, x{src1}, x{src2}"),
            Slt { dest, src1, src2 } => write!(f, "slt x{dest}, x{src1}, x{src2}"),
            Sltu { dest, src1, src2 } => write!(f, "sltu x{dest}, x{src1}, x{src2}"),
            Xor { dest, src1, src2 } => write!(f, "xor x{dest}, x{src1}, x{src2}"),
            Srl { dest, src1, src2 } => write!(f, "srl x{dest}, x{src1}, x{src2}"),
            Sra { dest, src1, src2 } => write!(f, "sra x{dest}, x{src1}, x{src2}"),
            Or { dest, src1, src2 } => write!(f, "or x{dest}, x{src1}, x{src2}"),
            And { dest, src1, src2 } => write!(f, "and x{dest}, x{src1}, x{src2}"),
            Mul { dest, src1, src2 } => write!(f, "mul x{dest}, x{src1}, x{src2}"),
            Mulh { dest, src1, src2 } => write!(f, "mulh x{dest}, x{src1}, x{src2}"),
            Mulhsu { dest, src1, src2 } => write!(f, "mulhsu x{dest}, x{src1}, x{src2}"),
            Mulhu { dest, src1, src2 } => write!(f, "mulhu x{dest}, x{src1}, x{src2}"),
            Div { dest, src1, src2 } => write!(f, "div x{dest}, x{src1}, x{src2}"),
            Divu { dest, src1, src2 } => write!(f, "divu x{dest}, x{src1}, x{src2}"),
            Rem { dest, src1, src2 } => write!(f, "rem x{dest}, x{src1}, x{src2}"),
            Remu { dest, src1, src2 } => write!(f, "remu x{dest}, x{src1}, x{src2}"),
            LrW { dest, base } => write!(f, "lr.w x{dest}, (x{base})"),
            ScW { dest, base, src } => write!(f, "sc.w x{dest}, x{src}, (x{base})"),
            AmoswapW { dest, base, src } => write!(f, "amoswap.w x{dest}, x{src}, (x{base})"),
            AmoaddW { dest, base, src } => write!(f, "amoadd.w x{dest}, x{src}, (x{base})"),
            AmoxorW { dest, base, src } => write!(f, "amoxor.w x{dest}, x{src}, (x{base})"),
            AmoandW { dest, base, src } => write!(f, "amoand.w x{dest}, x{src}, (x{base})"),
            AmoorW { dest, base, src } => write!(f, "amoor.w x{dest}, x{src}, (x{base})"),
            AmominW { dest, base, src } => write!(f, "amomin.w x{dest}, x{src}, (x{base})"),
            AmomaxW { dest, base, src } => write!(f, "amomax.w x{dest}, x{src}, (x{base})"),
            AmominuW { dest, base, src } => write!(f, "amominu.w x{dest}, x{src}, (x{base})"),
            AmomaxuW { dest, base, src } => write!(f, "amomaxu.w x{dest}, x{src}, (x{base})"),
            Scall => write!(f, "scall"),
            Sbreak => write!(f, "sbreak"),
            Eret => write!(f, "eret"),
            Csrrw { dest, src, csr } => write!(f, "csrrw x{dest}, 0x{csr:03x}, x{src}"),
            Csrrs { dest, src, csr } => write!(f, "csrrs x{dest}, 0x{csr:03x}, x{src}"),
            Csrrc { dest, src, csr } => write!(f, "csrrc x{dest}, 0x{csr:03x}, x{src}"),
            Csrrwi { dest, uimm, csr } => write!(f, "csrrwi x{dest}, 0x{csr:03x}, {uimm}"),
            Csrrsi { dest, uimm, csr } => write!(f, "csrrsi x{dest}, 0x{csr:03x}, {uimm}"),
            Csrrci { dest, uimm, csr } => write!(f, "csrrci x{dest}, 0x{csr:03x}, {uimm}"),
            Illegal(word) => write!(f, "illegal 0x{word:08x}"),
        }
    }
}
