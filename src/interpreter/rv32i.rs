// SPDX-FileCopyrightText: 2023-2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of RV_32_I extension for RISC-V
//!
//! Chapter 2 - Unprivileged spec
//!
//! These are the base integer instructions shared by RV32 and RV64. All
//! arithmetic operates on 64-bit register values; on an RV32 hart the
//! register file keeps values canonical (sign-extended from bit 31), so
//! only the width-dependent sites below branch on [`Xlen`].

use crate::machine_state::hart_state::HartState;
use crate::machine_state::instruction::FenceSet;
use crate::machine_state::memory::{Address, Memory};
use crate::machine_state::registers::{XRegister, XRegisters};
use crate::machine_state::xlen::Xlen;
use crate::machine_state::{MachineCoreState, ProgramCounterUpdate, INSTRUCTION_WIDTH};
use crate::traps::Exception;

impl XRegisters {
    /// Add `imm` to val(rs1) and store the result in `rd`
    ///
    /// Relevant RISC-V opcodes:
    /// - `ADDI`
    pub fn run_addi(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        // Return the lower XLEN bits of the addition
        // Irrespective of sign, the result is the same, casting to u64 for addition
        let rval = self.read(rs1);
        let result = rval.wrapping_add(imm as u64);
        self.write(rd, result)
    }

    /// Perform `val(rs1) + val(rs2)` and store the result in `rd`
    ///
    /// Relevant RISC-V opcodes:
    /// - `ADD`
    pub fn run_add(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let lhs = self.read(rs1);
        let rhs = self.read(rs2);
        // Wrapped addition in two's complement behaves the same for signed and unsigned
        let result = lhs.wrapping_add(rhs);
        self.write(rd, result)
    }

    /// Perform `val(rs1) - val(rs2)` and store the result in `rd`
    ///
    /// Relevant RISC-V opcodes:
    /// - `SUB`
    pub fn run_sub(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let lhs = self.read(rs1);
        let rhs = self.read(rs2);
        // Wrapped subtraction in two's complement behaves the same for signed and unsigned
        let result = lhs.wrapping_sub(rhs);
        self.write(rd, result)
    }

    /// `LUI` U-type instruction
    ///
    /// Set the upper 20 bits of the `rd` register with the `U-type`
    /// formatted immediate `imm`
    pub fn run_lui(&mut self, imm: i64, rd: XRegister) {
        // The dispatch layer has already placed the immediate in bits 31:12
        // and sign-extended it to 64 bits.
        self.write(rd, imm as u64);
    }

    /// Saves in `rd` the bitwise AND between the value in `rs1` and `imm`
    ///
    /// Relevant RISC-V opcodes:
    /// - `ANDI`
    pub fn run_andi(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        let result = self.read(rs1) & (imm as u64);
        self.write(rd, result)
    }

    /// Saves in `rd` the bitwise OR between the value in `rs1` and `imm`
    ///
    /// Relevant RISC-V opcodes:
    /// - `ORI`
    pub fn run_ori(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        let result = self.read(rs1) | (imm as u64);
        self.write(rd, result)
    }

    /// Saves in `rd` the bitwise XOR between the value in `rs1` and `imm`
    ///
    /// Relevant RISC-V opcodes:
    /// - `XORI`
    pub fn run_xori(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        let result = self.read(rs1) ^ (imm as u64);
        self.write(rd, result)
    }

    /// Saves in `rd` the bitwise AND between the values in `rs1` and `rs2`
    ///
    /// Relevant RISC-V opcodes:
    /// - `AND`
    pub fn run_and(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = self.read(rs1) & self.read(rs2);
        self.write(rd, result)
    }

    /// Saves in `rd` the bitwise OR between the values in `rs1` and `rs2`
    ///
    /// Relevant RISC-V opcodes:
    /// - `OR`
    pub fn run_or(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = self.read(rs1) | self.read(rs2);
        self.write(rd, result)
    }

    /// Saves in `rd` the bitwise XOR between the values in `rs1` and `rs2`
    ///
    /// Relevant RISC-V opcodes:
    /// - `XOR`
    pub fn run_xor(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = self.read(rs1) ^ self.read(rs2);
        self.write(rd, result)
    }

    /// `SLTI` I-type instruction
    ///
    /// Places the value 1 in `rd` if val(rs1) is less than the immediate
    /// when treated as signed integers, 0 otherwise
    pub fn run_slti(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        // Canonical form makes the 64-bit signed comparison exact on RV32 too.
        let result = if (self.read(rs1) as i64) < imm { 1 } else { 0 };
        self.write(rd, result)
    }

    /// `SLTIU` I-type instruction
    ///
    /// Places the value 1 in `rd` if val(rs1) is less than the immediate
    /// when treated as unsigned integers, 0 otherwise. Note that the
    /// immediate is still sign-extended first.
    pub fn run_sltiu(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        let result = if self.read(rs1) < (imm as u64) { 1 } else { 0 };
        self.write(rd, result)
    }

    /// `SLT` R-type instruction
    ///
    /// Places the value 1 in `rd` if val(rs1) < val(rs2)
    /// when treated as signed integers, 0 otherwise
    pub fn run_slt(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = if (self.read(rs1) as i64) < (self.read(rs2) as i64) {
            1
        } else {
            0
        };
        self.write(rd, result)
    }

    /// `SLTU` R-type instruction
    ///
    /// Places the value 1 in `rd` if val(rs1) < val(rs2)
    /// when treated as unsigned integers, 0 otherwise
    pub fn run_sltu(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = if self.read(rs1) < self.read(rs2) { 1 } else { 0 };
        self.write(rd, result)
    }

    /// `SLLI` I-type instruction
    ///
    /// Shift the value in `rs1` left by `shamt` (zeros are shifted into the
    /// lower bits)
    pub fn run_slli(&mut self, shamt: u64, rs1: XRegister, rd: XRegister) {
        let sh = shamt & self.xlen().shift_mask();
        // Shifting left on the full width is exact: canonicalisation of the
        // write truncates on RV32.
        let result = self.read(rs1) << sh;
        self.write(rd, result)
    }

    /// `SRLI` I-type instruction
    ///
    /// Shift the value in `rs1` right by `shamt` (zeros are shifted into
    /// the upper bits)
    pub fn run_srli(&mut self, shamt: u64, rs1: XRegister, rd: XRegister) {
        let sh = shamt & self.xlen().shift_mask();
        // A logical shift must not pull down the canonical upper bits, so
        // RV32 shifts the 32-bit view.
        let result = match self.xlen() {
            Xlen::Rv32 => ((self.read(rs1) as u32) >> sh) as u64,
            Xlen::Rv64 => self.read(rs1) >> sh,
        };
        self.write(rd, result)
    }

    /// `SRAI` I-type instruction
    ///
    /// Shift the value in `rs1` right by `shamt` (the sign bit is shifted
    /// into the upper bits)
    pub fn run_srai(&mut self, shamt: u64, rs1: XRegister, rd: XRegister) {
        let sh = shamt & self.xlen().shift_mask();
        // Canonical form makes the 64-bit arithmetic shift exact on RV32 too.
        let result = ((self.read(rs1) as i64) >> sh) as u64;
        self.write(rd, result)
    }

    /// `SLL` R-type instruction
    ///
    /// Shift the value in `rs1` left by the lower bits of `rs2`
    pub fn run_sll(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        self.run_slli(self.read(rs2), rs1, rd)
    }

    /// `SRL` R-type instruction
    ///
    /// Shift the value in `rs1` right by the lower bits of `rs2` (zeros are
    /// shifted into the upper bits)
    pub fn run_srl(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        self.run_srli(self.read(rs2), rs1, rd)
    }

    /// `SRA` R-type instruction
    ///
    /// Shift the value in `rs1` right by the lower bits of `rs2` (the sign
    /// bit is shifted into the upper bits)
    pub fn run_sra(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        self.run_srai(self.read(rs2), rs1, rd)
    }
}

impl HartState {
    /// `AUIPC` U-type instruction
    pub fn run_auipc(&mut self, imm: i64, rd: XRegister) {
        // The dispatch layer has already placed the immediate in bits 31:12
        // and sign-extended it to 64 bits.
        let rval = self.pc.wrapping_add(imm as u64);
        self.xregisters.write(rd, rval);
    }

    /// Store the next instruction address in `rd` and jump to the target
    /// address `pc + imm`.
    ///
    /// The link register is written first; a misaligned target raises
    /// [`Exception::InstructionAddressMisaligned`] with `rd` already
    /// updated.
    pub fn run_jal(&mut self, imm: i64, rd: XRegister) -> Result<Address, Exception> {
        let current_pc = self.pc;
        let target = self
            .xlen()
            .truncate_address(current_pc.wrapping_add(imm as u64));
        self.xregisters
            .write(rd, current_pc.wrapping_add(INSTRUCTION_WIDTH));
        if target % 4 != 0 {
            return Err(Exception::InstructionAddressMisaligned(target));
        }
        Ok(target)
    }

    /// `JALR` I-type instruction
    ///
    /// Store the next instruction address in `rd` and jump to the target
    /// address `val(rs1) + imm`. The least-significant bit of the target is
    /// NOT cleared.
    ///
    /// The link register is written first; a misaligned target raises
    /// [`Exception::InstructionAddressMisaligned`] with `rd` already
    /// updated.
    pub fn run_jalr(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<Address, Exception> {
        // The target is computed before the link register write so that
        // rd = rs1 still jumps to the old value.
        let target = self
            .xlen()
            .truncate_address(self.xregisters.read(rs1).wrapping_add(imm as u64));
        self.xregisters
            .write(rd, self.pc.wrapping_add(INSTRUCTION_WIDTH));
        if target % 4 != 0 {
            return Err(Exception::InstructionAddressMisaligned(target));
        }
        Ok(target)
    }

    /// Take the branch to `pc + imm` if `taken` holds, otherwise proceed to
    /// the next instruction. An untaken branch never checks alignment.
    fn branch(&self, imm: i64, taken: bool) -> Result<ProgramCounterUpdate, Exception> {
        if !taken {
            return Ok(ProgramCounterUpdate::Next);
        }

        let target = self.xlen().truncate_address(self.pc.wrapping_add(imm as u64));
        if target % 4 != 0 {
            return Err(Exception::InstructionAddressMisaligned(target));
        }
        Ok(ProgramCounterUpdate::Set(target))
    }

    /// `BEQ` B-type instruction
    ///
    /// Branches if `val(rs1) == val(rs2)`
    pub fn run_beq(
        &mut self,
        imm: i64,
        rs1: XRegister,
        rs2: XRegister,
    ) -> Result<ProgramCounterUpdate, Exception> {
        self.branch(imm, self.xregisters.read(rs1) == self.xregisters.read(rs2))
    }

    /// `BNE` B-type instruction
    ///
    /// Branches if `val(rs1) != val(rs2)`
    pub fn run_bne(
        &mut self,
        imm: i64,
        rs1: XRegister,
        rs2: XRegister,
    ) -> Result<ProgramCounterUpdate, Exception> {
        self.branch(imm, self.xregisters.read(rs1) != self.xregisters.read(rs2))
    }

    /// `BLT` B-type instruction
    ///
    /// Branches if `val(rs1) < val(rs2)` in signed comparison
    pub fn run_blt(
        &mut self,
        imm: i64,
        rs1: XRegister,
        rs2: XRegister,
    ) -> Result<ProgramCounterUpdate, Exception> {
        let lhs = self.xregisters.read(rs1) as i64;
        let rhs = self.xregisters.read(rs2) as i64;
        self.branch(imm, lhs < rhs)
    }

    /// `BGE` B-type instruction
    ///
    /// Branches if `val(rs1) >= val(rs2)` in signed comparison
    pub fn run_bge(
        &mut self,
        imm: i64,
        rs1: XRegister,
        rs2: XRegister,
    ) -> Result<ProgramCounterUpdate, Exception> {
        let lhs = self.xregisters.read(rs1) as i64;
        let rhs = self.xregisters.read(rs2) as i64;
        self.branch(imm, lhs >= rhs)
    }

    /// `BLTU` B-type instruction
    ///
    /// Branches if `val(rs1) < val(rs2)` in unsigned comparison
    pub fn run_bltu(
        &mut self,
        imm: i64,
        rs1: XRegister,
        rs2: XRegister,
    ) -> Result<ProgramCounterUpdate, Exception> {
        self.branch(imm, self.xregisters.read(rs1) < self.xregisters.read(rs2))
    }

    /// `BGEU` B-type instruction
    ///
    /// Branches if `val(rs1) >= val(rs2)` in unsigned comparison
    pub fn run_bgeu(
        &mut self,
        imm: i64,
        rs1: XRegister,
        rs2: XRegister,
    ) -> Result<ProgramCounterUpdate, Exception> {
        self.branch(imm, self.xregisters.read(rs1) >= self.xregisters.read(rs2))
    }
}

impl<M: Memory> MachineCoreState<M> {
    /// Effective address of a memory access: `val(rs1) + imm`, truncated to
    /// the width of the machine.
    pub(crate) fn effective_address(&self, imm: i64, rs1: XRegister) -> Address {
        let base = self.hart.xregisters.read(rs1);
        self.hart.xlen().truncate_address(base.wrapping_add(imm as u64))
    }

    /// Loads a single byte from the address given by `val(rs1) + imm`,
    /// sign-extending the result
    ///
    /// Relevant RISC-V opcodes:
    /// - `LB`
    pub fn run_lb(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u8(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        // i8 as u64 sign-extends to 64 bits
        self.hart.xregisters.write(rd, value as i8 as u64);
        Ok(())
    }

    /// Loads a half-word (2 bytes) starting from address `val(rs1) + imm`,
    /// sign-extending the result
    ///
    /// Relevant RISC-V opcodes:
    /// - `LH`
    pub fn run_lh(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u16(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        // i16 as u64 sign-extends to 64 bits
        self.hart.xregisters.write(rd, value as i16 as u64);
        Ok(())
    }

    /// Loads a word (4 bytes) starting from address `val(rs1) + imm`,
    /// sign-extending the result
    ///
    /// Relevant RISC-V opcodes:
    /// - `LW`
    pub fn run_lw(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u32(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        // i32 as u64 sign-extends to 64 bits
        self.hart.xregisters.write(rd, value as i32 as u64);
        Ok(())
    }

    /// Loads a single byte from the address given by `val(rs1) + imm`,
    /// zero-extending the result
    ///
    /// Relevant RISC-V opcodes:
    /// - `LBU`
    pub fn run_lbu(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u8(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        // u8 as u64 zero-extends to 64 bits
        self.hart.xregisters.write(rd, value as u64);
        Ok(())
    }

    /// Loads a half-word (2 bytes) starting from address `val(rs1) + imm`,
    /// zero-extending the result
    ///
    /// Relevant RISC-V opcodes:
    /// - `LHU`
    pub fn run_lhu(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u16(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        // u16 as u64 zero-extends to 64 bits
        self.hart.xregisters.write(rd, value as u64);
        Ok(())
    }

    /// Stores a byte (lowest 1 byte from rs2) to the address `val(rs1) + imm`
    ///
    /// Relevant RISC-V opcodes:
    /// - `SB`
    pub fn run_sb(&mut self, imm: i64, rs1: XRegister, rs2: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self.hart.xregisters.read(rs2);
        // u64 as u8 is truncated, getting the lowest 8 bits
        self.main_memory
            .write_u8(addr, value as u8)
            .map_err(|_| Exception::StoreAccessFault(addr))
    }

    /// Stores a half-word (lowest 2 bytes from rs2) to the address
    /// `val(rs1) + imm`
    ///
    /// Relevant RISC-V opcodes:
    /// - `SH`
    pub fn run_sh(&mut self, imm: i64, rs1: XRegister, rs2: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self.hart.xregisters.read(rs2);
        // u64 as u16 is truncated, getting the lowest 16 bits
        self.main_memory
            .write_u16(addr, value as u16)
            .map_err(|_| Exception::StoreAccessFault(addr))
    }

    /// Stores a word (lowest 4 bytes from rs2) to the address `val(rs1) + imm`
    ///
    /// Relevant RISC-V opcodes:
    /// - `SW`
    pub fn run_sw(&mut self, imm: i64, rs1: XRegister, rs2: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self.hart.xregisters.read(rs2);
        // u64 as u32 is truncated, getting the lowest 32 bits
        self.main_memory
            .write_u32(addr, value as u32)
            .map_err(|_| Exception::StoreAccessFault(addr))
    }

    /// `FENCE` I-type instruction
    ///
    /// Orders Device I/O, Memory R/W operations. For all harts, for all
    /// instructions in the successor sets, instructions in the predecessor
    /// sets are visible.
    /// NOTE: Since our interpreter is single-threaded (only one hart), the
    /// `FENCE` instruction is a no-op
    #[inline(always)]
    pub fn run_fence(&self, _pred: FenceSet, _succ: FenceSet) {
        // no-op
    }
}
