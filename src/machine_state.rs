// SPDX-FileCopyrightText: 2023-2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2024 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Observable machine state and the instruction execution entry point.
//!
//! [`MachineCoreState::execute`] dispatches one decoded instruction to its
//! clause and terminates it through the epilogue below. The epilogue is
//! the only place that writes the program counter and bumps `minstret`;
//! instruction clauses communicate their control-flow intent through
//! [`ProgramCounterUpdate`] or by raising an [`Exception`].

pub mod csregisters;
pub mod hart_state;
pub mod instruction;
pub mod memory;
pub mod mode;
pub mod registers;
pub mod xlen;

use arbitrary_int::{u12, u20};

use crate::bits::sign_extend;
use crate::log::debug;
use crate::machine_state::hart_state::HartState;
use crate::machine_state::instruction::Instr;
use crate::machine_state::memory::{Address, Memory};
use crate::machine_state::xlen::Xlen;
use crate::traps::Exception;

/// Width of every instruction in this core; the compressed extension is
/// not implemented.
pub const INSTRUCTION_WIDTH: u64 = 4;

/// How to modify the program counter
#[derive(Debug, PartialEq, Eq)]
pub enum ProgramCounterUpdate {
    /// Jump to a fixed address
    Set(Address),
    /// Proceed to the next instruction
    Next,
}

/// Why the simulation has come to a halt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A trap was taken while the selected trap vector held 0, meaning no
    /// handler has been installed.
    UnhandledTrap(Exception),
}

/// The machine state: everything required to run instructions.
pub struct MachineCoreState<M: Memory> {
    pub hart: HartState,
    pub main_memory: M,
    stop: Option<StopReason>,
}

/// Sign-extend a raw 12-bit I/S-type immediate.
#[inline(always)]
pub fn imm_i(imm: u12) -> i64 {
    sign_extend(imm.value() as u64, 12)
}

/// Sign-extend a raw 12-bit branch immediate, restoring its implicit low
/// zero bit.
#[inline(always)]
pub fn imm_b(imm: u12) -> i64 {
    sign_extend((imm.value() as u64) << 1, 13)
}

/// Sign-extend a raw 20-bit U-type immediate into bits 31:12.
#[inline(always)]
pub fn imm_u(imm: u20) -> i64 {
    sign_extend((imm.value() as u64) << 12, 32)
}

/// Sign-extend a raw 20-bit jump immediate, restoring its implicit low
/// zero bit.
#[inline(always)]
pub fn imm_j(imm: u20) -> i64 {
    sign_extend((imm.value() as u64) << 1, 21)
}

impl<M: Memory> MachineCoreState<M> {
    pub fn new(xlen: Xlen, main_memory: M) -> Self {
        Self {
            hart: HartState::new(xlen),
            main_memory,
            stop: None,
        }
    }

    /// Reset the machine state, pointing the program counter at `pc`.
    pub fn reset(&mut self, pc: Address) {
        self.hart.reset(pc);
        self.stop = None;
    }

    /// Terminate the simulation.
    pub fn stop_write(&mut self, reason: StopReason) {
        debug!(?reason, "simulation stopped");
        self.stop = Some(reason);
    }

    /// Why the simulation has stopped, if it has.
    pub fn stopped(&self) -> Option<StopReason> {
        self.stop
    }

    /// Execute precisely one decoded instruction to completion,
    /// transforming the machine state.
    ///
    /// Exit conditions visible to the driver are [`Self::stopped`] and the
    /// updated program counter.
    pub fn execute(&mut self, instr: &Instr) {
        let instr_pc = self.hart.pc;
        let result = self.run_instr(instr);
        self.handle_step_result(instr_pc, result);
    }

    /// Dispatch a decoded instruction to its clause.
    ///
    /// Raw immediates are sign-extended here, on entry to the clause that
    /// consumes them.
    fn run_instr(&mut self, instr: &Instr) -> Result<ProgramCounterUpdate, Exception> {
        use ProgramCounterUpdate::{Next, Set};

        match instr {
            // RV32I/RV64I R-type instructions
            Instr::Add(args) => {
                self.hart.xregisters.run_add(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Sub(args) => {
                self.hart.xregisters.run_sub(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Xor(args) => {
                self.hart.xregisters.run_xor(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Or(args) => {
                self.hart.xregisters.run_or(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::And(args) => {
                self.hart.xregisters.run_and(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Sll(args) => {
                self.hart.xregisters.run_sll(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Srl(args) => {
                self.hart.xregisters.run_srl(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Sra(args) => {
                self.hart.xregisters.run_sra(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Slt(args) => {
                self.hart.xregisters.run_slt(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Sltu(args) => {
                self.hart.xregisters.run_sltu(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }

            // RV64I R-type instructions
            Instr::Addw(args) => {
                self.hart.xregisters.run_addw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Subw(args) => {
                self.hart.xregisters.run_subw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Sllw(args) => {
                self.hart.xregisters.run_sllw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Srlw(args) => {
                self.hart.xregisters.run_srlw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Sraw(args) => {
                self.hart.xregisters.run_sraw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }

            // RV32I/RV64I I-type instructions
            Instr::Addi(args) => {
                self.hart.xregisters.run_addi(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Slti(args) => {
                self.hart.xregisters.run_slti(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Sltiu(args) => {
                self.hart.xregisters.run_sltiu(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Xori(args) => {
                self.hart.xregisters.run_xori(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Ori(args) => {
                self.hart.xregisters.run_ori(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Andi(args) => {
                self.hart.xregisters.run_andi(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Slli(args) => {
                self.hart.xregisters.run_slli(args.shamt.value() as u64, args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Srli(args) => {
                self.hart.xregisters.run_srli(args.shamt.value() as u64, args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Srai(args) => {
                self.hart.xregisters.run_srai(args.shamt.value() as u64, args.rs1, args.rd);
                Ok(Next)
            }

            // RV64I I-type instructions
            Instr::Addiw(args) => {
                self.hart.xregisters.run_addiw(imm_i(args.imm), args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Slliw(args) => {
                self.hart.xregisters.run_slliw(args.shamt.value() as u64, args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Srliw(args) => {
                self.hart.xregisters.run_srliw(args.shamt.value() as u64, args.rs1, args.rd);
                Ok(Next)
            }
            Instr::Sraiw(args) => {
                self.hart.xregisters.run_sraiw(args.shamt.value() as u64, args.rs1, args.rd);
                Ok(Next)
            }

            // Loads
            Instr::Lb(args) => self.run_lb(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),
            Instr::Lh(args) => self.run_lh(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),
            Instr::Lw(args) => self.run_lw(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),
            Instr::Lbu(args) => self.run_lbu(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),
            Instr::Lhu(args) => self.run_lhu(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),
            Instr::Lwu(args) => self.run_lwu(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),
            Instr::Ld(args) => self.run_ld(imm_i(args.imm), args.rs1, args.rd).map(|()| Next),

            // Stores
            Instr::Sb(args) => self.run_sb(imm_i(args.imm), args.rs1, args.rs2).map(|()| Next),
            Instr::Sh(args) => self.run_sh(imm_i(args.imm), args.rs1, args.rs2).map(|()| Next),
            Instr::Sw(args) => self.run_sw(imm_i(args.imm), args.rs1, args.rs2).map(|()| Next),
            Instr::Sd(args) => self.run_sd(imm_i(args.imm), args.rs1, args.rs2).map(|()| Next),

            // U-type instructions
            Instr::Lui(args) => {
                self.hart.xregisters.run_lui(imm_u(args.imm), args.rd);
                Ok(Next)
            }
            Instr::Auipc(args) => {
                self.hart.run_auipc(imm_u(args.imm), args.rd);
                Ok(Next)
            }

            // Jumps
            Instr::Jal(args) => self.hart.run_jal(imm_j(args.imm), args.rd).map(Set),
            Instr::Jalr(args) => self.hart.run_jalr(imm_i(args.imm), args.rs1, args.rd).map(Set),

            // Branches
            Instr::Beq(args) => self.hart.run_beq(imm_b(args.imm), args.rs1, args.rs2),
            Instr::Bne(args) => self.hart.run_bne(imm_b(args.imm), args.rs1, args.rs2),
            Instr::Blt(args) => self.hart.run_blt(imm_b(args.imm), args.rs1, args.rs2),
            Instr::Bge(args) => self.hart.run_bge(imm_b(args.imm), args.rs1, args.rs2),
            Instr::Bltu(args) => self.hart.run_bltu(imm_b(args.imm), args.rs1, args.rs2),
            Instr::Bgeu(args) => self.hart.run_bgeu(imm_b(args.imm), args.rs1, args.rs2),

            // RV32M/RV64M multiplication and division
            Instr::Mul(args) => {
                self.hart.xregisters.run_mul(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Mulh(args) => {
                self.hart.xregisters.run_mulh(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Mulhsu(args) => {
                self.hart.xregisters.run_mulhsu(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Mulhu(args) => {
                self.hart.xregisters.run_mulhu(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Div(args) => {
                self.hart.xregisters.run_div(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Divu(args) => {
                self.hart.xregisters.run_divu(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Rem(args) => {
                self.hart.xregisters.run_rem(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Remu(args) => {
                self.hart.xregisters.run_remu(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Mulw(args) => {
                self.hart.xregisters.run_mulw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Divw(args) => {
                self.hart.xregisters.run_divw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Divuw(args) => {
                self.hart.xregisters.run_divuw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Remw(args) => {
                self.hart.xregisters.run_remw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }
            Instr::Remuw(args) => {
                self.hart.xregisters.run_remuw(args.rs1, args.rs2, args.rd);
                Ok(Next)
            }

            // Zicsr instructions
            Instr::Csrrw(args) => self.hart.run_csrrw(args.csr, args.rs1, args.rd).map(|()| Next),
            Instr::Csrrs(args) => self.hart.run_csrrs(args.csr, args.rs1, args.rd).map(|()| Next),
            Instr::Csrrc(args) => self.hart.run_csrrc(args.csr, args.rs1, args.rd).map(|()| Next),
            Instr::Csrrwi(args) => {
                self.hart.run_csrrwi(args.csr, args.imm, args.rd).map(|()| Next)
            }
            Instr::Csrrsi(args) => {
                self.hart.run_csrrsi(args.csr, args.imm, args.rd).map(|()| Next)
            }
            Instr::Csrrci(args) => {
                self.hart.run_csrrci(args.csr, args.imm, args.rd).map(|()| Next)
            }

            // Memory ordering
            Instr::Fence(args) => {
                self.run_fence(args.pred, args.succ);
                Ok(Next)
            }
            Instr::FenceI => {
                self.run_fencei();
                Ok(Next)
            }

            // Privileged instructions
            Instr::Ecall => Err(self.hart.run_ecall()),
            Instr::Ebreak => Err(self.hart.run_ebreak()),
            Instr::Mret => self.hart.run_mret().map(Set),
            Instr::Sret => self.hart.run_sret().map(Set),
            Instr::Uret => self.hart.run_uret().map(Set),
            Instr::SFenceVm { rs1 } => {
                self.run_sfence_vm(*rs1);
                Ok(Next)
            }

            Instr::Illegal => Err(Exception::IllegalInstruction),
        }
    }

    /// The instruction epilogue: commit the program counter and count the
    /// retired instruction. Exceptions divert through trap entry first.
    ///
    /// No other place writes `pc` or `minstret`.
    fn handle_step_result(
        &mut self,
        instr_pc: Address,
        result: Result<ProgramCounterUpdate, Exception>,
    ) {
        let pc = match result {
            Ok(ProgramCounterUpdate::Next) => instr_pc.wrapping_add(INSTRUCTION_WIDTH),
            Ok(ProgramCounterUpdate::Set(address)) => address,
            Err(exception) => self.address_on_exception(exception, instr_pc),
        };

        self.hart.pc = self.hart.xlen().truncate_address(pc);
        self.hart.csregisters.increment_minstret();
    }

    /// Handle an [`Exception`] risen during execution of an instruction
    /// (also known as a synchronous exception) by taking a trap.
    ///
    /// Returns the new address of the program counter, becoming the address
    /// of a trap handler. A trap taken while the selected trap vector holds
    /// 0 has no handler to go to; the simulation is stopped.
    fn address_on_exception(&mut self, exception: Exception, current_pc: Address) -> Address {
        let handler = self.hart.take_trap(exception, current_pc);
        if handler == 0 {
            self.stop_write(StopReason::UnhandledTrap(exception));
        }
        handler
    }
}

#[cfg(test)]
mod tests {
    use super::instruction::*;
    use super::*;
    use crate::machine_state::csregisters::CSRegister;
    use crate::machine_state::memory::MainMemory;
    use crate::machine_state::mode::Mode;
    use crate::machine_state::registers::{a0, t0, t1, x0, x1, x2, x3};
    use arbitrary_int::{u12, u5};

    fn state(xlen: Xlen) -> MachineCoreState<MainMemory> {
        let mut state = MachineCoreState::new(xlen, MainMemory::new(4096));
        state.reset(0);
        state
    }

    #[test]
    fn test_addi_from_reset() {
        let mut state = state(Xlen::Rv64);

        // ADDI x1, x0, 7
        state.execute(&Instr::Addi(ITypeArgs {
            rd: x1,
            rs1: x0,
            imm: u12::new(7),
        }));

        assert_eq!(state.hart.xregisters.read(x1), 7);
        assert_eq!(state.hart.pc, 4);
        assert_eq!(state.hart.csregisters.read(CSRegister::minstret), 1);
        assert!(state.stopped().is_none());
    }

    #[test]
    fn test_x0_stays_zero() {
        let mut state = state(Xlen::Rv64);

        state.execute(&Instr::Addi(ITypeArgs {
            rd: x0,
            rs1: x0,
            imm: u12::new(0xFF),
        }));

        assert_eq!(state.hart.xregisters.read(x0), 0);
        assert_eq!(state.hart.pc, 4);
        assert_eq!(state.hart.csregisters.read(CSRegister::minstret), 1);
    }

    #[test]
    fn test_addiw_sign_extends() {
        let mut state = state(Xlen::Rv64);

        state.hart.xregisters.write(x1, 0xFFFF_FFFF_FFFF_FFFE);
        // ADDIW x2, x1, 3
        state.execute(&Instr::Addiw(ITypeArgs {
            rd: x2,
            rs1: x1,
            imm: u12::new(3),
        }));

        assert_eq!(state.hart.xregisters.read(x2), 1);
    }

    #[test]
    fn test_div_overflow() {
        let mut state = state(Xlen::Rv64);

        state.hart.xregisters.write(x1, 0x8000_0000_0000_0000);
        state.hart.xregisters.write(x2, 0xFFFF_FFFF_FFFF_FFFF);
        state.execute(&Instr::Div(RTypeArgs {
            rd: x3,
            rs1: x1,
            rs2: x2,
        }));

        assert_eq!(state.hart.xregisters.read(x3), 0x8000_0000_0000_0000);
        assert_eq!(state.hart.csregisters.read(CSRegister::minstret), 1);
    }

    #[test]
    fn test_remu_by_zero() {
        let mut state = state(Xlen::Rv64);

        state.hart.xregisters.write(x1, 5);
        state.execute(&Instr::Remu(RTypeArgs {
            rd: x3,
            rs1: x1,
            rs2: x2,
        }));

        assert_eq!(state.hart.xregisters.read(x3), 5);
    }

    #[test]
    fn test_jalr_misaligned_traps() {
        let mut state = state(Xlen::Rv64);

        state.hart.pc = 0x100;
        state.hart.xregisters.write(x1, 0x200);
        // JALR x2, x1, 7 computes the misaligned target 0x207
        state.execute(&Instr::Jalr(ITypeArgs {
            rd: x2,
            rs1: x1,
            imm: u12::new(7),
        }));

        // The link register is written even though the jump traps.
        assert_eq!(state.hart.xregisters.read(x2), 0x104);
        assert_eq!(state.hart.csregisters.read(CSRegister::mepc), 0x100);
        assert_eq!(state.hart.csregisters.read(CSRegister::mcause), 0);
        assert_eq!(state.hart.csregisters.read(CSRegister::mtval), 0x207);
        assert_eq!(state.hart.csregisters.read(CSRegister::minstret), 1);

        // No handler is installed in the reset state.
        assert_eq!(state.hart.pc, 0);
        assert_eq!(
            state.stopped(),
            Some(StopReason::UnhandledTrap(
                Exception::InstructionAddressMisaligned(0x207)
            ))
        );
    }

    #[test]
    fn test_csrrs_zero_source_on_read_only_csr() {
        let mut state = state(Xlen::Rv64);
        state.hart.csregisters.write(CSRegister::mcycle, 99);
        state.hart.mode = Mode::User;

        // CSRRS x1, cycle, x0: read-only CSR, but the source is zero.
        state.execute(&Instr::Csrrs(CsrArgs {
            rd: x1,
            rs1: x0,
            csr: u12::new(CSRegister::cycle as u16),
        }));

        assert!(state.stopped().is_none());
        assert_eq!(state.hart.xregisters.read(x1), 99);
        assert_eq!(state.hart.pc, 4);

        // The same access with a non-zero source is an illegal instruction.
        state.hart.xregisters.write(t0, 1);
        state.execute(&Instr::Csrrs(CsrArgs {
            rd: x1,
            rs1: t0,
            csr: u12::new(CSRegister::cycle as u16),
        }));

        assert_eq!(state.hart.csregisters.read(CSRegister::mcause), 2);
        assert_eq!(
            state.stopped(),
            Some(StopReason::UnhandledTrap(Exception::IllegalInstruction))
        );
    }

    #[test]
    fn test_trap_enters_installed_handler() {
        let mut state = state(Xlen::Rv64);
        state.hart.csregisters.write(CSRegister::mtvec, 0x4000);
        state.hart.mode = Mode::User;
        state.hart.pc = 0x80;

        state.execute(&Instr::Ecall);

        assert!(state.stopped().is_none());
        assert_eq!(state.hart.pc, 0x4000);
        assert_eq!(state.hart.mode, Mode::Machine);
        assert_eq!(state.hart.csregisters.read(CSRegister::mcause), 8);
        assert_eq!(state.hart.csregisters.read(CSRegister::mepc), 0x80);
        assert_eq!(state.hart.csregisters.read(CSRegister::minstret), 1);
    }

    #[test]
    fn test_illegal_instruction() {
        let mut state = state(Xlen::Rv64);
        state.hart.pc = 0x44;

        state.execute(&Instr::Illegal);

        assert_eq!(state.hart.csregisters.read(CSRegister::mcause), 2);
        assert_eq!(state.hart.csregisters.read(CSRegister::mtval), 0);
        assert_eq!(state.hart.csregisters.read(CSRegister::mepc), 0x44);
        assert_eq!(
            state.stopped(),
            Some(StopReason::UnhandledTrap(Exception::IllegalInstruction))
        );
    }

    #[test]
    fn test_fences_advance_pc() {
        let mut state = state(Xlen::Rv64);

        let all = FenceSet {
            i: true,
            o: true,
            r: true,
            w: true,
        };
        state.execute(&Instr::Fence(FenceArgs { pred: all, succ: all }));
        state.execute(&Instr::FenceI);
        state.execute(&Instr::SFenceVm { rs1: t1 });

        assert_eq!(state.hart.pc, 12);
        assert_eq!(state.hart.csregisters.read(CSRegister::minstret), 3);
        assert!(state.stopped().is_none());
    }

    #[test]
    fn test_rv32_pc_wraps() {
        let mut state = state(Xlen::Rv32);

        state.hart.pc = 0xFFFF_FFFC;
        state.execute(&Instr::Addi(ITypeArgs {
            rd: a0,
            rs1: x0,
            imm: u12::new(1),
        }));

        assert_eq!(state.hart.pc, 0);
    }

    #[test]
    fn test_csrrwi_roundtrip() {
        let mut state = state(Xlen::Rv64);

        state.execute(&Instr::Csrrwi(CsriArgs {
            rd: x0,
            imm: u5::new(21),
            csr: u12::new(CSRegister::mscratch as u16),
        }));
        assert_eq!(state.hart.csregisters.read(CSRegister::mscratch), 21);

        state.execute(&Instr::Csrrw(CsrArgs {
            rd: x1,
            rs1: x0,
            csr: u12::new(CSRegister::mscratch as u16),
        }));
        assert_eq!(state.hart.xregisters.read(x1), 21);
        assert_eq!(state.hart.csregisters.read(CSRegister::mscratch), 0);
    }
}
