// SPDX-FileCopyrightText: 2024 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of RV_64_M extension for RISC-V
//!
//! Chapter 7 - Unprivileged spec

use crate::machine_state::registers::{XRegister, XRegisters};

impl XRegisters {
    /// `MULW` R-type instruction
    ///
    /// Multiply the lower 32 bits of val(rs1) with the lower 32 bits of
    /// val(rs2), and store the sign-extended lower 32 bits of the result
    /// in register `rd`.
    pub fn run_mulw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let rval1 = self.read(rs1) as i32;
        let rval2 = self.read(rs2) as i32;

        let result = rval1.wrapping_mul(rval2);

        // i32 as u64 sign-extends to 64 bits
        self.write(rd, result as u64);
    }

    /// `DIVW` R-type instruction
    ///
    /// Divide the lower 32 bits of val(rs1) by the lower 32 bits of
    /// val(rs2). The sign-extended result is stored in `rd`. In case the
    /// divisor is zero, the result is `-1`. In case the dividend is
    /// `i32::MIN` and the divisor is `-1`, the result is `i32::MIN` as
    /// well. All values are _signed integers_.
    pub fn run_divw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let rval1 = self.read(rs1) as i32;
        let rval2 = self.read(rs2) as i32;

        let result = if rval2 == 0 {
            -1
        } else if rval2 == -1 && rval1 == i32::MIN {
            i32::MIN
        } else {
            rval1 / rval2
        };

        self.write(rd, result as u64);
    }

    /// `DIVUW` R-type instruction
    ///
    /// Divide the lower 32 bits of val(rs1) by the lower 32 bits of
    /// val(rs2). The sign-extended result is stored in `rd`. In case the
    /// divisor is zero, the result is `u32::MAX`. All values are
    /// _unsigned integers_.
    pub fn run_divuw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let rval1 = self.read(rs1) as u32;
        let rval2 = self.read(rs2) as u32;

        let result = if rval2 == 0 { u32::MAX } else { rval1 / rval2 };

        self.write(rd, result as i32 as u64);
    }

    /// `REMW` R-type instruction
    ///
    /// Compute the remainder of the lower 32 bits of val(rs1) divided by
    /// the lower 32 bits of val(rs2), and store the sign-extended result in
    /// `rd`. In case the divisor is zero, the result is the dividend. In
    /// case of overflow the result is zero. All values are
    /// _signed integers_.
    pub fn run_remw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let rval1 = self.read(rs1) as i32;
        let rval2 = self.read(rs2) as i32;

        let result = if rval2 == 0 {
            rval1
        } else if rval2 == -1 && rval1 == i32::MIN {
            0
        } else {
            rval1 % rval2
        };

        self.write(rd, result as u64);
    }

    /// `REMUW` R-type instruction
    ///
    /// Compute the remainder of the lower 32 bits of val(rs1) divided by
    /// the lower 32 bits of val(rs2), and store the sign-extended result in
    /// `rd`. In case the divisor is zero, the result is the dividend. All
    /// values are _unsigned integers_.
    pub fn run_remuw(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let rval1 = self.read(rs1) as u32;
        let rval2 = self.read(rs2) as u32;

        let result = if rval2 == 0 { rval1 } else { rval1 % rval2 };

        self.write(rd, result as i32 as u64);
    }
}
