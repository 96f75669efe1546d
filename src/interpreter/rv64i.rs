// SPDX-FileCopyrightText: 2023-2024 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of RV_64_I extension for RISC-V
//!
//! Chapter 5 - Unprivileged spec
//!
//! Instructions in this module only exist on RV64 harts; a conforming
//! decoder never produces them for RV32.

use crate::machine_state::memory::Memory;
use crate::machine_state::registers::{XRegister, XRegisters};
use crate::machine_state::MachineCoreState;
use crate::traps::Exception;

impl XRegisters {
    /// `ADDIW` I-type instruction
    ///
    /// Add `imm` to val(rs1) only on lowest 32 bits
    /// and store the sign-extended result in `rd`
    pub fn run_addiw(&mut self, imm: i64, rs1: XRegister, rd: XRegister) {
        // We do not need to explicitly truncate for the lower bits since wrapping_add
        // has the same semantics & result on the lower 32 bits irrespective of bit width
        let rval = self.read(rs1);
        let result = rval.wrapping_add(imm as u64);
        // Truncate result to use only the lower 32 bits, then sign-extend to 64 bits.
        let result = result as i32 as u64;
        self.write(rd, result);
    }

    /// `ADDW` R-type instruction
    ///
    /// Perform val(rs1) + val(rs2) but only on lowest 32 bits
    /// and store the sign-extended result in `rd`
    pub fn run_addw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let lhs = self.read(rs1);
        let rhs = self.read(rs2);
        // Truncate result to use only the lower 32 bits, then sign-extend to 64 bits.
        let result = lhs.wrapping_add(rhs) as i32 as u64;
        self.write(rd, result)
    }

    /// `SUBW` R-type instruction
    ///
    /// Perform val(rs1) - val(rs2) but only on lowest 32 bits
    /// and store the sign-extended result in `rd`
    pub fn run_subw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let lhs = self.read(rs1);
        let rhs = self.read(rs2);
        // Truncate result to use only the lower 32 bits, then sign-extend to 64 bits.
        let result = lhs.wrapping_sub(rhs) as i32 as u64;
        self.write(rd, result)
    }

    /// `SLLIW` I-type instruction
    ///
    /// Shift left logically only on lower 32 bits
    /// (zeros are shifted in the lower bits)
    pub fn run_slliw(&mut self, shamt: u64, rs1: XRegister, rd: XRegister) {
        let sh_amt = shamt & 0b1_1111;
        // Since we are shifting left, we can operate directly on u64
        let result = self.read(rs1) << sh_amt;

        // Even though SLLIW operates only on lowest 32 bits, RISC-V convention
        // mandates for register values to be saved in a sign-extended manner
        // Note: u64 as i32 as u64 will sign-extend the lowest 32 bits
        self.write(rd, result as i32 as u64)
    }

    /// `SRLIW` I-type instruction
    ///
    /// Shift right logically only on lower 32 bits
    /// (zeros are shifted in the upper bits)
    pub fn run_srliw(&mut self, shamt: u64, rs1: XRegister, rd: XRegister) {
        let sh_amt = shamt & 0b1_1111;
        let result = (self.read(rs1) as u32) >> sh_amt;

        // Note: u32 as i32 as u64 will sign-extend the lowest 32 bits
        self.write(rd, result as i32 as u64)
    }

    /// `SRAIW` I-type instruction
    ///
    /// Shift right arithmetically only on lower 32 bits
    /// (sign-bits are shifted in the upper bits)
    pub fn run_sraiw(&mut self, shamt: u64, rs1: XRegister, rd: XRegister) {
        let sh_amt = shamt & 0b1_1111;
        // Right shift on i32 is an arithmetic shift
        let result = (self.read(rs1) as i32) >> sh_amt;

        // Note: i32 as u64 will sign-extend the lowest 32 bits
        self.write(rd, result as u64)
    }

    /// `SLLW` R-type instruction
    ///
    /// Shift left logically only lowest 32 bits in rs1
    /// by shift_amount = val(rs2)\[4:0\] saving the result in rd
    /// (zeros are shifted in the lower bits)
    pub fn run_sllw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        self.run_slliw(self.read(rs2), rs1, rd)
    }

    /// `SRLW` R-type instruction
    ///
    /// Shift right logically only the lowest 32 bits in rs1
    /// by shift_amount = val(rs2)\[4:0\] saving the result in rd
    /// (zeros are shifted in the upper bits)
    pub fn run_srlw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        self.run_srliw(self.read(rs2), rs1, rd)
    }

    /// `SRAW` R-type instruction
    ///
    /// Shift right arithmetically only the lowest 32 bits in rs1
    /// by shift_amount = val(rs2)\[4:0\] saving the result in rd
    /// (sign-bits are shifted in the upper bits)
    pub fn run_sraw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        self.run_sraiw(self.read(rs2), rs1, rd)
    }
}

impl<M: Memory> MachineCoreState<M> {
    /// `LD` I-type instruction
    ///
    /// Loads a double-word (8 bytes) starting from address given by
    /// `val(rs1) + imm`
    pub fn run_ld(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u64(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        self.hart.xregisters.write(rd, value);
        Ok(())
    }

    /// `LWU` I-type instruction
    ///
    /// Loads a word (4 bytes) starting from address given by
    /// `val(rs1) + imm`, zero-extending the result
    pub fn run_lwu(&mut self, imm: i64, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self
            .main_memory
            .read_u32(addr)
            .map_err(|_| Exception::LoadAccessFault(addr))?;
        // u32 as u64 zero-extends to 64 bits
        self.hart.xregisters.write(rd, value as u64);
        Ok(())
    }

    /// `SD` S-type instruction
    ///
    /// Stores a double-word (8 bytes from rs2) to the address starting at
    /// `val(rs1) + imm`
    pub fn run_sd(&mut self, imm: i64, rs1: XRegister, rs2: XRegister) -> Result<(), Exception> {
        let addr = self.effective_address(imm, rs1);
        let value = self.hart.xregisters.read(rs2);
        self.main_memory
            .write_u64(addr, value)
            .map_err(|_| Exception::StoreAccessFault(addr))
    }
}
