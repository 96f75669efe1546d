// SPDX-FileCopyrightText: 2024 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of Zicsr extension for RISC-V
//!
//! Chapter 9 - Unprivileged spec
//!
//! Access rights are resolved per access site from the current privilege
//! level and the CSR address. The set/clear forms relax the required
//! permission to read-only and suppress the write entirely when the source
//! value is zero; `x0` as a source register always yields a zero value, so
//! `CSRRS rd, csr, x0` never traps on a readable register.

use arbitrary_int::{u12, u5};

use crate::machine_state::csregisters::{permission, try_parse_csregister, CSRValue, Permission};
use crate::machine_state::hart_state::HartState;
use crate::machine_state::registers::XRegister;
use crate::traps::Exception;

impl HartState {
    /// `CSRRW` instruction
    ///
    /// Atomically swap the CSR with val(rs1). If `rd` is `x0` the CSR is
    /// not read at all; otherwise `rd` receives the pre-modification value.
    pub fn run_csrrw(&mut self, csr: u12, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let src = self.xregisters.read(rs1);
        self.csr_replace(csr, src, rd)
    }

    /// `CSRRS` instruction
    ///
    /// Set the bits of val(rs1) in the CSR; `rd` receives the
    /// pre-modification value. A zero source suppresses the write.
    pub fn run_csrrs(&mut self, csr: u12, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let src = self.xregisters.read(rs1);
        self.csr_update(csr, src, rd, |old, src| old | src)
    }

    /// `CSRRC` instruction
    ///
    /// Clear the bits of val(rs1) in the CSR; `rd` receives the
    /// pre-modification value. A zero source suppresses the write.
    pub fn run_csrrc(&mut self, csr: u12, rs1: XRegister, rd: XRegister) -> Result<(), Exception> {
        let src = self.xregisters.read(rs1);
        self.csr_update(csr, src, rd, |old, src| old & !src)
    }

    /// `CSRRWI` instruction
    ///
    /// Like `CSRRW`, with the zero-extended 5-bit immediate as the source.
    pub fn run_csrrwi(&mut self, csr: u12, imm: u5, rd: XRegister) -> Result<(), Exception> {
        self.csr_replace(csr, imm.value() as CSRValue, rd)
    }

    /// `CSRRSI` instruction
    ///
    /// Like `CSRRS`, with the zero-extended 5-bit immediate as the source.
    pub fn run_csrrsi(&mut self, csr: u12, imm: u5, rd: XRegister) -> Result<(), Exception> {
        self.csr_update(csr, imm.value() as CSRValue, rd, |old, src| old | src)
    }

    /// `CSRRCI` instruction
    ///
    /// Like `CSRRC`, with the zero-extended 5-bit immediate as the source.
    pub fn run_csrrci(&mut self, csr: u12, imm: u5, rd: XRegister) -> Result<(), Exception> {
        self.csr_update(csr, imm.value() as CSRValue, rd, |old, src| old & !src)
    }

    /// Shared implementation of `CSRRW`/`CSRRWI`: the write happens
    /// unconditionally, so read-write permission is always required.
    fn csr_replace(&mut self, csr: u12, src: CSRValue, rd: XRegister) -> Result<(), Exception> {
        let reg = try_parse_csregister(csr).ok_or(Exception::IllegalInstruction)?;

        if permission(reg, self.mode) != Permission::ReadWrite {
            return Err(Exception::IllegalInstruction);
        }

        // If rd = x0 the CSR shall not be read and no read side effects
        // shall occur.
        let old = if rd.is_zero() {
            0
        } else {
            self.csregisters.read(reg)
        };

        self.csregisters.write(reg, src);
        self.xregisters.write(rd, old);
        Ok(())
    }

    /// Shared implementation of the set/clear forms. The CSR is always
    /// read; the write is suppressed, and read-only access suffices, when
    /// the source value is zero.
    fn csr_update(
        &mut self,
        csr: u12,
        src: CSRValue,
        rd: XRegister,
        update: fn(CSRValue, CSRValue) -> CSRValue,
    ) -> Result<(), Exception> {
        let reg = try_parse_csregister(csr).ok_or(Exception::IllegalInstruction)?;

        let write_intended = src != 0;
        match permission(reg, self.mode) {
            Permission::None => return Err(Exception::IllegalInstruction),
            Permission::ReadOnly if write_intended => return Err(Exception::IllegalInstruction),
            _ => {}
        }

        let old = self.csregisters.read(reg);
        if write_intended {
            self.csregisters.write(reg, update(old, src));
        }
        self.xregisters.write(rd, old);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine_state::csregisters::CSRegister;
    use crate::machine_state::mode::Mode;
    use crate::machine_state::registers::{a0, a1, t0, x0};
    use crate::machine_state::xlen::Xlen;

    fn csr(reg: CSRegister) -> u12 {
        u12::new(reg as u16)
    }

    #[test]
    fn test_csrrw() {
        let mut state = HartState::new(Xlen::Rv64);

        state.xregisters.write(a0, 0xABCD);
        state.run_csrrw(csr(CSRegister::mscratch), a0, a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xABCD);
        assert_eq!(state.xregisters.read(a1), 0);

        // A zero source still writes.
        state.run_csrrw(csr(CSRegister::mscratch), x0, a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0);
        assert_eq!(state.xregisters.read(a1), 0xABCD);
    }

    #[test]
    fn test_csrrw_rd_x0_still_writes() {
        let mut state = HartState::new(Xlen::Rv64);

        state.xregisters.write(a0, 42);
        state.run_csrrw(csr(CSRegister::mscratch), a0, x0).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 42);
    }

    #[test]
    fn test_csrrs_csrrc() {
        let mut state = HartState::new(Xlen::Rv64);

        state.csregisters.write(CSRegister::mscratch, 0b1100);
        state.xregisters.write(a0, 0b0110);

        state.run_csrrs(csr(CSRegister::mscratch), a0, a1).unwrap();
        assert_eq!(state.xregisters.read(a1), 0b1100);
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0b1110);

        state.run_csrrc(csr(CSRegister::mscratch), a0, a1).unwrap();
        assert_eq!(state.xregisters.read(a1), 0b1110);
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0b1000);
    }

    #[test]
    fn test_set_clear_zero_source_never_writes() {
        let mut state = HartState::new(Xlen::Rv64);

        state.csregisters.write(CSRegister::mscratch, 0xFF);

        state.run_csrrs(csr(CSRegister::mscratch), x0, a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xFF);
        assert_eq!(state.xregisters.read(a1), 0xFF);

        state.run_csrrc(csr(CSRegister::mscratch), x0, a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xFF);
        assert_eq!(state.xregisters.read(a1), 0xFF);

        state.run_csrrsi(csr(CSRegister::mscratch), u5::new(0), a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xFF);

        // A non-zero register holding zero also counts as a zero source.
        state.run_csrrs(csr(CSRegister::mscratch), t0, a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xFF);
    }

    #[test]
    fn test_read_only_relaxation() {
        let mut state = HartState::new(Xlen::Rv64);
        state.csregisters.write(CSRegister::mcycle, 1234);
        state.mode = Mode::User;

        // Zero source: read-only access suffices.
        state.run_csrrs(csr(CSRegister::cycle), x0, a1).unwrap();
        assert_eq!(state.xregisters.read(a1), 1234);
        state.run_csrrci(csr(CSRegister::cycle), u5::new(0), a1).unwrap();

        // Non-zero source: the write is an illegal instruction.
        state.xregisters.write(a0, 1);
        assert_eq!(
            state.run_csrrs(csr(CSRegister::cycle), a0, a1),
            Err(Exception::IllegalInstruction)
        );
        assert_eq!(
            state.run_csrrsi(csr(CSRegister::cycle), u5::new(1), a1),
            Err(Exception::IllegalInstruction)
        );

        // CSRRW always needs write access, even with a zero source.
        assert_eq!(
            state.run_csrrw(csr(CSRegister::cycle), x0, a1),
            Err(Exception::IllegalInstruction)
        );
    }

    #[test]
    fn test_insufficient_privilege() {
        let mut state = HartState::new(Xlen::Rv64);
        state.mode = Mode::User;

        // Inaccessible registers trap even with a zero source.
        assert_eq!(
            state.run_csrrs(csr(CSRegister::mscratch), x0, a1),
            Err(Exception::IllegalInstruction)
        );
        assert_eq!(
            state.run_csrrw(csr(CSRegister::sscratch), x0, a1),
            Err(Exception::IllegalInstruction)
        );

        state.mode = Mode::Supervisor;
        state.run_csrrw(csr(CSRegister::sscratch), x0, a1).unwrap();
        assert_eq!(
            state.run_csrrw(csr(CSRegister::mscratch), x0, a1),
            Err(Exception::IllegalInstruction)
        );
    }

    #[test]
    fn test_unknown_csr_is_illegal() {
        let mut state = HartState::new(Xlen::Rv64);

        assert_eq!(
            state.run_csrrw(u12::new(0x5C0), a0, a1),
            Err(Exception::IllegalInstruction)
        );
        assert_eq!(
            state.run_csrrsi(u12::new(0x7FF), u5::new(0), a1),
            Err(Exception::IllegalInstruction)
        );
    }

    #[test]
    fn test_old_value_with_shared_registers() {
        let mut state = HartState::new(Xlen::Rv64);

        state.csregisters.write(CSRegister::mscratch, 7);
        state.xregisters.write(a0, 0xF0);

        // rd = rs1: rd must receive the pre-modification CSR value.
        state.run_csrrw(csr(CSRegister::mscratch), a0, a0).unwrap();
        assert_eq!(state.xregisters.read(a0), 7);
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xF0);

        state.run_csrrs(csr(CSRegister::mscratch), a0, a0).unwrap();
        assert_eq!(state.xregisters.read(a0), 0xF0);
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0xF7);
    }

    #[test]
    fn test_csrrwi_csrrci() {
        let mut state = HartState::new(Xlen::Rv64);

        state.run_csrrwi(csr(CSRegister::mscratch), u5::new(0b11111), a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0b11111);

        state.run_csrrci(csr(CSRegister::mscratch), u5::new(0b00101), a1).unwrap();
        assert_eq!(state.csregisters.read(CSRegister::mscratch), 0b11010);
        assert_eq!(state.xregisters.read(a1), 0b11111);
    }
}
