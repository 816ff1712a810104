use crate::bus::{BusAccess, SystemBus};
use crate::decode::Instr;

use self::csr::Csr;
use self::registers::Registers;
use self::trap::{Exception, Interrupt, Trap};

pub mod csr;
pub mod registers;
pub mod trap;

mod rv32a;
mod rv32i;
mod rv32m;
mod rv32priv;
mod zicsr;

/// Address of the first instruction executed after reset
pub const RESET_VECTOR: u32 = 0x200;

/// Address every trap (exception or interrupt) jumps to
pub const TRAP_VECTOR: u32 = 0x1c0;

/// RISC-V Hardware Thread
///
/// A single machine-mode hart implementing RV32IMA and the Zicsr
/// instructions, with the small CSR bank described in the csr
/// module. The hart owns the system bus, and every load, store and
/// instruction fetch goes through it.
///
/// The member function step() controls execution of the hart. Each
/// time it is called, either a pending external interrupt is taken
/// (if interrupts are enabled) or the instruction at the current pc
/// is fetched, decoded and executed. Any exception raised along the
/// way is turned into trap entry: mepc and mcause are written, the
/// interrupt enable is pushed and cleared, and the pc moves to the
/// trap vector. The trap is also returned to the caller, who may
/// ignore it.
#[derive(Debug, Default)]
pub struct Hart {
    pub pc: u32,
    pub registers: Registers,
    pub csr: Csr,
    pub bus: SystemBus,
    external_interrupt: bool,
}

impl Hart {
    /// Make a hart in its reset state, connected to bus
    pub fn new(bus: SystemBus) -> Self {
        Self {
            pc: RESET_VECTOR,
            registers: Registers::new(),
            csr: Csr::new(),
            bus,
            external_interrupt: false,
        }
    }

    /// Return the pc, registers and CSRs to their reset state. The
    /// bus and the devices on it are untouched, apart from the
    /// reservation, which is dropped.
    pub fn reset(&mut self) {
        self.pc = RESET_VECTOR;
        self.registers.clear();
        self.csr = Csr::new();
        self.external_interrupt = false;
        self.bus.clear_reservation();
    }

    /// Read the value of the register xn
    pub fn x(&self, n: u8) -> u32 {
        self.registers.get(n)
    }

    /// Write the value of the register xn (writes to x0 are
    /// discarded)
    pub fn set_x(&mut self, n: u8, value: u32) {
        self.registers.set(n, value)
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.csr.interrupts_enabled()
    }

    /// Signal the external interrupt. It is taken at the start of
    /// the next step in which interrupts are enabled.
    pub fn raise_external_interrupt(&mut self) {
        self.external_interrupt = true;
    }

    pub fn external_interrupt_pending(&self) -> bool {
        self.external_interrupt
    }

    /// Add 4 to the program counter, wrapping if necessary
    fn increment_pc(&mut self) {
        self.pc = self.pc.wrapping_add(4);
    }

    /// Set the pc to target, which must be 4-byte aligned. On a
    /// misaligned target the pc is left at the jump.
    fn jump_to_address(&mut self, target: u32) -> Result<(), Exception> {
        if target & 0b11 != 0 {
            return Err(Exception::InstructionAddressMisaligned(target));
        }
        self.pc = target;
        Ok(())
    }

    /// Write pc + 4 to dest and jump to target
    fn jump_and_link(&mut self, dest: u8, target: u32) -> Result<(), Exception> {
        let return_address = self.pc.wrapping_add(4);
        self.jump_to_address(target)?;
        self.set_x(dest, return_address);
        Ok(())
    }

    /// Execute one instruction (or take one interrupt)
    pub fn step(&mut self) -> Result<(), Trap> {
        let pc = self.pc;
        let result = self.fetch_and_execute();
        if let Err(trap) = result {
            self.enter_trap(pc, trap);
        }
        result
    }

    fn fetch_and_execute(&mut self) -> Result<(), Trap> {
        if self.external_interrupt && self.interrupts_enabled() {
            self.external_interrupt = false;
            return Err(Trap::Interrupt(Interrupt::External));
        }
        let word = self.bus.fetch_instruction(self.pc)?;
        let instr = Instr::decode(word);
        log::trace!("0x{:08x}: {word:08x}  {instr}", self.pc);
        self.execute(instr, word)?;
        Ok(())
    }

    fn enter_trap(&mut self, pc: u32, trap: Trap) {
        let mcause = trap.mcause();
        match trap.bad_address() {
            Some(address) => log::debug!(
                "trap at 0x{pc:08x}: {trap} (mcause 0x{mcause:08x}, bad address 0x{address:08x})"
            ),
            None => log::debug!("trap at 0x{pc:08x}: {trap} (mcause 0x{mcause:08x})"),
        }
        self.csr.enter_trap(pc, mcause, trap.bad_address());
        self.pc = TRAP_VECTOR;
    }

    /// Run one decoded instruction. The raw word is only needed for
    /// the illegal instruction exception.
    pub fn execute(&mut self, instr: Instr, word: u32) -> Result<(), Exception> {
        use rv32i::*;
        match instr {
            Instr::Lui { dest, imm } => execute_lui(self, dest, imm),
            Instr::Auipc { dest, imm } => execute_auipc(self, dest, imm),
            Instr::Jal { dest, offset } => execute_jal(self, dest, offset),
            Instr::Jalr { dest, base, offset } => execute_jalr(self, dest, base, offset),

            Instr::Beq { src1, src2, offset } => execute_beq(self, src1, src2, offset),
            Instr::Bne { src1, src2, offset } => execute_bne(self, src1, src2, offset),
            Instr::Blt { src1, src2, offset } => execute_blt(self, src1, src2, offset),
            Instr::Bge { src1, src2, offset } => execute_bge(self, src1, src2, offset),
            Instr::Bltu { src1, src2, offset } => execute_bltu(self, src1, src2, offset),
            Instr::Bgeu { src1, src2, offset } => execute_bgeu(self, src1, src2, offset),

            Instr::Lb { dest, base, offset } => execute_lb(self, dest, base, offset),
            Instr::Lh { dest, base, offset } => execute_lh(self, dest, base, offset),
            Instr::Lw { dest, base, offset } => execute_lw(self, dest, base, offset),
            Instr::Lbu { dest, base, offset } => execute_lbu(self, dest, base, offset),
            Instr::Lhu { dest, base, offset } => execute_lhu(self, dest, base, offset),

            Instr::Sb { src, base, offset } => execute_sb(self, src, base, offset),
            Instr::Sh { src, base, offset } => execute_sh(self, src, base, offset),
            Instr::Sw { src, base, offset } => execute_sw(self, src, base, offset),

            Instr::Addi { dest, src, imm } => execute_reg_imm(self, dest, src, imm, add),
            Instr::Slti { dest, src, imm } => execute_reg_imm(self, dest, src, imm, slt),
            Instr::Sltiu { dest, src, imm } => execute_reg_imm(self, dest, src, imm, sltu),
            Instr::Xori { dest, src, imm } => execute_reg_imm(self, dest, src, imm, xor),
            Instr::Ori { dest, src, imm } => execute_reg_imm(self, dest, src, imm, or),
            Instr::Andi { dest, src, imm } => execute_reg_imm(self, dest, src, imm, and),
            Instr::Slli { dest, src, shamt } => execute_reg_imm(self, dest, src, shamt.into(), sll),
            Instr::Srli { dest, src, shamt } => execute_reg_imm(self, dest, src, shamt.into(), srl),
            Instr::Srai { dest, src, shamt } => execute_reg_imm(self, dest, src, shamt.into(), sra),

            Instr::Add { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, add),
            Instr::Sub { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, sub),
            Instr::Sll { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, sll),
            Instr::Slt { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, slt),
            Instr::Sltu { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, sltu),
            Instr::Xor { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, xor),
            Instr::Srl { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, srl),
            Instr::Sra { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, sra),
            Instr::Or { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, or),
            Instr::And { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, and),

            Instr::Mul { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, rv32m::mul),
            Instr::Mulh { dest, src1, src2 } => {
                execute_reg_reg(self, dest, src1, src2, rv32m::mulh)
            }
            Instr::Mulhsu { dest, src1, src2 } => {
                execute_reg_reg(self, dest, src1, src2, rv32m::mulhsu)
            }
            Instr::Mulhu { dest, src1, src2 } => {
                execute_reg_reg(self, dest, src1, src2, rv32m::mulhu)
            }
            Instr::Div { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, rv32m::div),
            Instr::Divu { dest, src1, src2 } => {
                execute_reg_reg(self, dest, src1, src2, rv32m::divu)
            }
            Instr::Rem { dest, src1, src2 } => execute_reg_reg(self, dest, src1, src2, rv32m::rem),
            Instr::Remu { dest, src1, src2 } => {
                execute_reg_reg(self, dest, src1, src2, rv32m::remu)
            }

            Instr::LrW { dest, base } => rv32a::execute_lr_w(self, dest, base),
            Instr::ScW { dest, base, src } => rv32a::execute_sc_w(self, dest, base, src),
            Instr::AmoswapW { dest, base, src } => {
                rv32a::execute_amo(self, dest, base, src, rv32a::swap)
            }
            Instr::AmoaddW { dest, base, src } => rv32a::execute_amo(self, dest, base, src, add),
            Instr::AmoxorW { dest, base, src } => rv32a::execute_amo(self, dest, base, src, xor),
            Instr::AmoandW { dest, base, src } => rv32a::execute_amo(self, dest, base, src, and),
            Instr::AmoorW { dest, base, src } => rv32a::execute_amo(self, dest, base, src, or),
            Instr::AmominW { dest, base, src } => {
                rv32a::execute_amo(self, dest, base, src, rv32a::min)
            }
            Instr::AmomaxW { dest, base, src } => {
                rv32a::execute_amo(self, dest, base, src, rv32a::max)
            }
            Instr::AmominuW { dest, base, src } => {
                rv32a::execute_amo(self, dest, base, src, rv32a::minu)
            }
            Instr::AmomaxuW { dest, base, src } => {
                rv32a::execute_amo(self, dest, base, src, rv32a::maxu)
            }

            Instr::Scall => rv32priv::execute_scall(self),
            Instr::Sbreak => rv32priv::execute_sbreak(self),
            Instr::Eret => rv32priv::execute_eret(self),

            Instr::Csrrw { dest, src, csr } => zicsr::execute_csrrw(self, dest, src, csr)
                .map_err(|_| Exception::IllegalInstruction(word)),
            Instr::Csrrs { dest, src, csr } => zicsr::execute_csrrs(self, dest, src, csr)
                .map_err(|_| Exception::IllegalInstruction(word)),
            Instr::Csrrc { dest, src, csr } => zicsr::execute_csrrc(self, dest, src, csr)
                .map_err(|_| Exception::IllegalInstruction(word)),
            Instr::Csrrwi { dest, uimm, csr } => zicsr::execute_csrrwi(self, dest, uimm, csr)
                .map_err(|_| Exception::IllegalInstruction(word)),
            Instr::Csrrsi { dest, uimm, csr } => zicsr::execute_csrrsi(self, dest, uimm, csr)
                .map_err(|_| Exception::IllegalInstruction(word)),
            Instr::Csrrci { dest, uimm, csr } => zicsr::execute_csrrci(self, dest, uimm, csr)
                .map_err(|_| Exception::IllegalInstruction(word)),

            Instr::Illegal(word) => Err(Exception::IllegalInstruction(word)),
        }
    }

    /// Read a word through the bus, as the hart would. Useful for
    /// inspecting memory from outside the emulated program.
    pub fn load_word(&mut self, address: u32) -> Result<u32, Trap> {
        Ok(self.bus.load_word(address)?)
    }
}

#[cfg(test)]
mod tests {

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::csr::{MBADADDR, MSCRATCH, MSTATUS};
    use super::*;
    use crate::encode::*;
    use crate::peripherals::ram::Ram;

    const DATA: u32 = 0x1000;

    /// Hart with 8 KiB of RAM at address zero and the program
    /// placed at the reset vector
    fn hart_with_program(program: &[u32]) -> Hart {
        let mut bus = SystemBus::new();
        bus.attach(Rc::new(RefCell::new(Ram::new(8))), 0).unwrap();
        let mut hart = Hart::new(bus);
        for (n, word) in program.iter().enumerate() {
            let address = RESET_VECTOR + 4 * n as u32;
            hart.bus.store_word(address, *word).unwrap();
        }
        hart
    }

    fn run(hart: &mut Hart, steps: usize) {
        for _ in 0..steps {
            let _ = hart.step();
        }
    }

    #[test]
    fn check_reset_state() {
        let hart = Hart::default();
        assert_eq!(hart.pc(), 0);
        let hart = Hart::new(SystemBus::new());
        assert_eq!(hart.pc(), RESET_VECTOR);
        assert!(!hart.interrupts_enabled());
    }

    #[test]
    fn check_addi() {
        let mut hart = hart_with_program(&[addi(1, 0, 1), addi(2, 0, -1), addi(0, 0, 5)]);
        run(&mut hart, 3);
        assert_eq!(hart.x(1), 1);
        assert_eq!(hart.x(2), 0xffff_ffff);
        assert_eq!(hart.x(0), 0);
        assert_eq!(hart.pc(), RESET_VECTOR + 12);
    }

    #[test]
    fn check_lui_auipc() {
        let mut hart = hart_with_program(&[lui(1, 0xabcde), auipc(2, 1)]);
        run(&mut hart, 2);
        assert_eq!(hart.x(1), 0xabcd_e000);
        assert_eq!(hart.x(2), RESET_VECTOR + 4 + 0x1000);
    }

    #[test]
    fn check_blt_signed_taken() {
        let mut hart = hart_with_program(&[addi(1, 0, -1), addi(2, 0, 1), blt(1, 2, 12)]);
        run(&mut hart, 3);
        assert_eq!(hart.pc(), RESET_VECTOR + 8 + 12);
    }

    #[test]
    fn check_bltu_unsigned_not_taken() {
        let mut hart = hart_with_program(&[addi(1, 0, -1), addi(2, 0, 1), bltu(1, 2, 12)]);
        run(&mut hart, 3);
        assert_eq!(hart.pc(), RESET_VECTOR + 12);
    }

    #[test]
    fn check_backwards_branch() {
        let mut hart = hart_with_program(&[addi(1, 0, 1), beq(1, 1, -4)]);
        run(&mut hart, 2);
        assert_eq!(hart.pc(), RESET_VECTOR);
    }

    #[test]
    fn check_jal_links_and_jumps() {
        let mut hart = hart_with_program(&[jal(1, 16)]);
        run(&mut hart, 1);
        assert_eq!(hart.x(1), RESET_VECTOR + 4);
        assert_eq!(hart.pc(), RESET_VECTOR + 16);
    }

    #[test]
    fn check_jalr_with_dest_equal_to_base() {
        let mut hart = hart_with_program(&[addi(5, 0, 0x301), jalr(5, 5, 3)]);
        run(&mut hart, 2);
        assert_eq!(hart.pc(), 0x304);
        assert_eq!(hart.x(5), RESET_VECTOR + 8);
    }

    #[test]
    fn check_misaligned_jump_traps_at_jump() {
        let mut hart = hart_with_program(&[jal(1, 6)]);
        let trap = hart.step().unwrap_err();
        assert_eq!(trap, Trap::Exception(Exception::InstructionAddressMisaligned(0x206)));
        assert_eq!(hart.csr.mepc(), RESET_VECTOR);
        assert_eq!(hart.csr.mcause(), 0);
        assert_eq!(hart.csr.read(MBADADDR).unwrap(), 0x206);
        assert_eq!(hart.x(1), 0);
        assert_eq!(hart.pc(), TRAP_VECTOR);
    }

    #[test]
    fn check_loads_sign_and_zero_extend() {
        let mut hart = hart_with_program(&[
            lui(1, 1),
            lb(2, 1, 0),
            lbu(3, 1, 0),
            lh(4, 1, 0),
            lhu(5, 1, 0),
            lw(6, 1, 0),
        ]);
        hart.bus.store_word(DATA, 0x1234_8081).unwrap();
        run(&mut hart, 6);
        assert_eq!(hart.x(2), 0xffff_ff81);
        assert_eq!(hart.x(3), 0x81);
        assert_eq!(hart.x(4), 0xffff_8081);
        assert_eq!(hart.x(5), 0x8081);
        assert_eq!(hart.x(6), 0x1234_8081);
    }

    #[test]
    fn check_stores() {
        let mut hart = hart_with_program(&[
            lui(1, 1),
            addi(2, 0, -1),
            sw(2, 1, 0),
            sh(0, 1, 0),
            sb(0, 1, 3),
        ]);
        run(&mut hart, 5);
        assert_eq!(hart.load_word(DATA).unwrap(), 0x00ff_0000);
    }

    #[test]
    fn check_misaligned_load_traps() {
        let mut hart = hart_with_program(&[lui(1, 1), lw(2, 1, 2)]);
        run(&mut hart, 1);
        let trap = hart.step().unwrap_err();
        assert_eq!(trap.mcause(), 4);
        assert_eq!(hart.csr.mepc(), RESET_VECTOR + 4);
        assert_eq!(hart.csr.read(MBADADDR).unwrap(), DATA + 2);
    }

    #[test]
    fn check_unmapped_store_traps() {
        let mut hart = hart_with_program(&[lui(1, 0x10000), sw(0, 1, 0)]);
        run(&mut hart, 1);
        let trap = hart.step().unwrap_err();
        assert_eq!(trap.mcause(), 7);
        assert_eq!(hart.csr.read(MBADADDR).unwrap(), 0x1000_0000);
    }

    #[test]
    fn check_fetch_from_unmapped_address() {
        let mut hart = hart_with_program(&[]);
        hart.pc = 0x1000_0000;
        let trap = hart.step().unwrap_err();
        assert_eq!(trap.mcause(), 1);
        assert_eq!(hart.csr.mepc(), 0x1000_0000);
    }

    #[test]
    fn check_illegal_instruction() {
        let mut hart = hart_with_program(&[0xffff_ffff]);
        let trap = hart.step().unwrap_err();
        assert_eq!(trap, Trap::Exception(Exception::IllegalInstruction(0xffff_ffff)));
        assert_eq!(hart.csr.mcause(), 2);
        assert_eq!(hart.pc(), TRAP_VECTOR);
    }

    #[test]
    fn check_lr_sc_succeeds() {
        let mut hart = hart_with_program(&[lui(1, 1), lr_w(2, 1), addi(3, 0, 9), sc_w(4, 1, 3)]);
        hart.bus.store_word(DATA, 5).unwrap();
        run(&mut hart, 2);
        assert_eq!(hart.x(2), 5);
        assert!(hart.bus.is_reserved(DATA));
        run(&mut hart, 2);
        assert_eq!(hart.x(4), 0);
        assert!(!hart.bus.is_reserved(DATA));
        assert_eq!(hart.load_word(DATA).unwrap(), 9);
    }

    #[test]
    fn check_sc_fails_after_intervening_store() {
        let mut hart = hart_with_program(&[
            lui(1, 1),
            lr_w(2, 1),
            sw(0, 1, 0),
            addi(3, 0, 9),
            sc_w(4, 1, 3),
        ]);
        hart.bus.store_word(DATA, 5).unwrap();
        run(&mut hart, 5);
        assert_ne!(hart.x(4), 0);
        assert_eq!(hart.load_word(DATA).unwrap(), 0);
    }

    #[test]
    fn check_misaligned_atomics() {
        let mut hart = hart_with_program(&[addi(1, 0, 0x402), lr_w(2, 1)]);
        run(&mut hart, 1);
        assert_eq!(hart.step().unwrap_err().mcause(), 4);

        let mut hart = hart_with_program(&[addi(1, 0, 0x402), amoadd_w(2, 1, 0)]);
        run(&mut hart, 1);
        assert_eq!(hart.step().unwrap_err().mcause(), 6);
    }

    #[test]
    fn check_amo_returns_original_value() {
        let mut hart = hart_with_program(&[
            lui(1, 1),
            addi(2, 0, 3),
            amoadd_w(3, 1, 2),
            amoswap_w(4, 1, 0),
        ]);
        hart.bus.store_word(DATA, 10).unwrap();
        run(&mut hart, 3);
        assert_eq!(hart.x(3), 10);
        assert_eq!(hart.load_word(DATA).unwrap(), 13);
        run(&mut hart, 1);
        assert_eq!(hart.x(4), 13);
        assert_eq!(hart.load_word(DATA).unwrap(), 0);
    }

    #[test]
    fn check_csrrw_round_trip() {
        let mut hart = hart_with_program(&[
            addi(1, 0, 0x123),
            addi(2, 0, 0x456),
            csrrw(3, 1, MSCRATCH),
            csrrw(4, 2, MSCRATCH),
            csrrw(5, 0, MSCRATCH),
        ]);
        run(&mut hart, 5);
        assert_eq!(hart.x(3), 0);
        assert_eq!(hart.x(4), 0x123);
        assert_eq!(hart.x(5), 0x456);
    }

    #[test]
    fn check_csrrw_same_register() {
        let mut hart = hart_with_program(&[
            addi(1, 0, 7),
            csrrw(0, 1, MSCRATCH),
            addi(1, 0, 8),
            csrrw(1, 1, MSCRATCH),
        ]);
        run(&mut hart, 4);
        assert_eq!(hart.x(1), 7);
        assert_eq!(hart.csr.read(MSCRATCH).unwrap(), 8);
    }

    #[test]
    fn check_csr_set_and_clear() {
        let mut hart = hart_with_program(&[
            csrrsi(0, 0b1100, MSCRATCH),
            addi(1, 0, 0b0100),
            csrrc(2, 1, MSCRATCH),
            csrrs(3, 0, MSCRATCH),
        ]);
        run(&mut hart, 4);
        assert_eq!(hart.x(2), 0b1100);
        assert_eq!(hart.x(3), 0b1000);
    }

    #[test]
    fn check_read_only_csr() {
        let mut hart = hart_with_program(&[csrrs(1, 0, 0xf00), csrrw(2, 0, 0xf00)]);
        run(&mut hart, 1);
        assert_eq!(hart.x(1), 0x1101);
        let trap = hart.step().unwrap_err();
        assert_eq!(trap.mcause(), 2);
        assert_eq!(hart.x(2), 0);
    }

    #[test]
    fn check_missing_csr_is_illegal() {
        let mut hart = hart_with_program(&[csrrs(1, 0, 0x305)]);
        assert_eq!(hart.step().unwrap_err().mcause(), 2);
    }

    #[test]
    fn check_scall_trap_entry() {
        let mut hart = hart_with_program(&[csrrsi(0, 1, MSTATUS), scall()]);
        run(&mut hart, 1);
        assert!(hart.interrupts_enabled());
        let trap = hart.step().unwrap_err();
        assert_eq!(trap, Trap::Exception(Exception::MmodeEcall));
        assert_eq!(hart.csr.mepc(), RESET_VECTOR + 4);
        assert_eq!(hart.csr.mcause(), 11);
        assert_eq!(hart.pc(), TRAP_VECTOR);
        assert!(!hart.interrupts_enabled());
    }

    #[test]
    fn check_sbreak_trap_entry() {
        let mut hart = hart_with_program(&[sbreak()]);
        let trap = hart.step().unwrap_err();
        assert_eq!(trap, Trap::Exception(Exception::Breakpoint));
        assert_eq!(hart.csr.mepc(), RESET_VECTOR);
        assert_eq!(hart.csr.mcause(), 3);
        assert_eq!(hart.pc(), TRAP_VECTOR);
    }

    #[test]
    fn check_eret_returns_and_restores_enable() {
        let mut hart = hart_with_program(&[csrrsi(0, 1, MSTATUS), scall()]);
        // Handler: skip the scall and return
        hart.bus.store_word(TRAP_VECTOR, csrrs(1, 0, 0x341)).unwrap();
        hart.bus.store_word(TRAP_VECTOR + 4, addi(1, 1, 4)).unwrap();
        hart.bus.store_word(TRAP_VECTOR + 8, csrrw(0, 1, 0x341)).unwrap();
        hart.bus.store_word(TRAP_VECTOR + 12, eret()).unwrap();
        run(&mut hart, 6);
        assert_eq!(hart.pc(), RESET_VECTOR + 8);
        assert!(hart.interrupts_enabled());
        assert_eq!(hart.csr.mcause(), 11);
    }

    #[test]
    fn check_external_interrupt_needs_enable() {
        let mut hart = hart_with_program(&[addi(1, 0, 1), csrrsi(0, 1, MSTATUS), addi(1, 0, 2)]);
        hart.raise_external_interrupt();
        run(&mut hart, 2);
        assert!(hart.external_interrupt_pending());
        assert_eq!(hart.x(1), 1);

        let trap = hart.step().unwrap_err();
        assert_eq!(trap, Trap::Interrupt(Interrupt::External));
        assert_eq!(hart.csr.mcause(), 0x8000_000b);
        assert_eq!(hart.csr.mepc(), RESET_VECTOR + 8);
        assert_eq!(hart.pc(), TRAP_VECTOR);
        assert!(!hart.external_interrupt_pending());
        assert!(!hart.interrupts_enabled());
    }

    #[test]
    fn check_m_extension_through_hart() {
        let mut hart = hart_with_program(&[
            addi(1, 0, -7),
            addi(2, 0, 2),
            div(3, 1, 2),
            rem(4, 1, 2),
            divu(5, 1, 0),
            mul(6, 1, 2),
        ]);
        run(&mut hart, 6);
        assert_eq!(hart.x(3), 0xffff_fffd);
        assert_eq!(hart.x(4), 0xffff_ffff);
        assert_eq!(hart.x(5), 0xffff_ffff);
        assert_eq!(hart.x(6), 0xffff_fff2);
    }

    #[test]
    fn check_shift_immediates() {
        let mut hart = hart_with_program(&[
            addi(1, 0, -16),
            srai(2, 1, 2),
            srli(3, 1, 28),
            slli(4, 1, 1),
        ]);
        run(&mut hart, 4);
        assert_eq!(hart.x(2), 0xffff_fffc);
        assert_eq!(hart.x(3), 0xf);
        assert_eq!(hart.x(4), 0xffff_ffe0);
    }

    #[test]
    fn check_reset_clears_state() {
        let mut hart = hart_with_program(&[addi(1, 0, 1), lui(2, 1), lr_w(3, 2)]);
        run(&mut hart, 3);
        hart.reset();
        assert_eq!(hart.pc(), RESET_VECTOR);
        assert_eq!(hart.x(1), 0);
        assert!(!hart.bus.is_reserved(DATA));
    }
}
