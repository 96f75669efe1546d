// SPDX-FileCopyrightText: 2024 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of RV_32_M extension for RISC-V
//!
//! Chapter 7 - Unprivileged spec
//!
//! The XLEN-wide multiply/divide forms. High halves of products are taken
//! from a double-width intermediate (`i128`/`u128` on RV64, 64 bits on
//! RV32); they are never synthesised from narrower multiplications.

use crate::machine_state::registers::{XRegister, XRegisters};
use crate::machine_state::xlen::Xlen;

impl XRegisters {
    /// `MUL` R-type instruction
    ///
    /// Multiply val(rs1) with val(rs2) and store the lower XLEN bits of the
    /// result in register `rd`. Truncation makes operand signedness
    /// irrelevant for the low half.
    pub fn run_mul(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let rval1 = self.read(rs1);
        let rval2 = self.read(rs2);

        let result = rval1.wrapping_mul(rval2);

        self.write(rd, result);
    }

    /// `MULH` R-type instruction
    ///
    /// Multiply val(rs1) with val(rs2) and store the upper XLEN bits of the
    /// result in register `rd`. Both operands are _signed integers_.
    pub fn run_mulh(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1) as i64 as i128;
                let rval2 = self.read(rs2) as i64 as i128;
                (rval1.wrapping_mul(rval2) >> 64) as u64
            }
            Xlen::Rv32 => {
                // Canonical values are already sign-extended from 32 bits,
                // so the product fits in 64 bits.
                let rval1 = self.read(rs1) as i64;
                let rval2 = self.read(rs2) as i64;
                (rval1.wrapping_mul(rval2) >> 32) as u64
            }
        };

        self.write(rd, result);
    }

    /// `MULHSU` R-type instruction
    ///
    /// Multiply val(rs1) with val(rs2) and store the upper XLEN bits of the
    /// result in register `rd`. val(rs1) is treated as a _signed integer_,
    /// while val(rs2) is treated as an _unsigned integer_.
    pub fn run_mulhsu(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1) as i64 as i128;
                let rval2 = self.read(rs2) as u128 as i128;
                (rval1.wrapping_mul(rval2) >> 64) as u64
            }
            Xlen::Rv32 => {
                let rval1 = self.read(rs1) as i64;
                let rval2 = (self.read(rs2) as u32) as i64;
                (rval1.wrapping_mul(rval2) >> 32) as u64
            }
        };

        self.write(rd, result);
    }

    /// `MULHU` R-type instruction
    ///
    /// Multiply val(rs1) with val(rs2) and store the upper XLEN bits of the
    /// result in register `rd`. Both operands are _unsigned integers_.
    pub fn run_mulhu(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1) as u128;
                let rval2 = self.read(rs2) as u128;
                (rval1.wrapping_mul(rval2) >> 64) as u64
            }
            Xlen::Rv32 => {
                let rval1 = (self.read(rs1) as u32) as u64;
                let rval2 = (self.read(rs2) as u32) as u64;
                rval1.wrapping_mul(rval2) >> 32
            }
        };

        self.write(rd, result);
    }

    /// `DIV` R-type instruction
    ///
    /// Divide val(rs1) by val(rs2). The result is stored in `rd`. In case
    /// val(rs2) is zero, the result is `-1`. In case of signed overflow the
    /// result is the dividend. The quotient truncates towards zero. All
    /// values are _signed integers_.
    pub fn run_div(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1) as i64;
                let rval2 = self.read(rs2) as i64;

                if rval2 == 0 {
                    -1
                } else if rval2 == -1 && rval1 == i64::MIN {
                    i64::MIN
                } else {
                    rval1 / rval2
                }
            }
            Xlen::Rv32 => {
                let rval1 = self.read(rs1) as i32;
                let rval2 = self.read(rs2) as i32;

                let result = if rval2 == 0 {
                    -1
                } else if rval2 == -1 && rval1 == i32::MIN {
                    i32::MIN
                } else {
                    rval1 / rval2
                };
                result as i64
            }
        };

        self.write(rd, result as u64);
    }

    /// `DIVU` R-type instruction
    ///
    /// Divide val(rs1) by val(rs2). The result is stored in `rd`. In case
    /// val(rs2) is zero, the result is all ones. All values are
    /// _unsigned integers_.
    pub fn run_divu(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1);
                let rval2 = self.read(rs2);

                if rval2 == 0 { u64::MAX } else { rval1 / rval2 }
            }
            Xlen::Rv32 => {
                let rval1 = self.read(rs1) as u32;
                let rval2 = self.read(rs2) as u32;

                let result = if rval2 == 0 { u32::MAX } else { rval1 / rval2 };
                result as u64
            }
        };

        self.write(rd, result);
    }

    /// `REM` R-type instruction
    ///
    /// Compute the remainder of val(rs1) divided by val(rs2). Store result
    /// in `rd`. In case val(rs2) is zero, the result is val(rs1). In case
    /// of signed overflow the result is zero. The remainder follows the
    /// truncating quotient. All values are _signed integers_.
    pub fn run_rem(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1) as i64;
                let rval2 = self.read(rs2) as i64;

                if rval2 == 0 {
                    rval1
                } else if rval2 == -1 && rval1 == i64::MIN {
                    0
                } else {
                    rval1 % rval2
                }
            }
            Xlen::Rv32 => {
                let rval1 = self.read(rs1) as i32;
                let rval2 = self.read(rs2) as i32;

                let result = if rval2 == 0 {
                    rval1
                } else if rval2 == -1 && rval1 == i32::MIN {
                    0
                } else {
                    rval1 % rval2
                };
                result as i64
            }
        };

        self.write(rd, result as u64);
    }

    /// `REMU` R-type instruction
    ///
    /// Compute the remainder of val(rs1) divided by val(rs2) and store the
    /// result in register `rd`. In case val(rs2) is zero, the result is
    /// val(rs1). All values are _unsigned integers_.
    pub fn run_remu(&mut self, rs1: XRegister, rs2: XRegister, rd: XRegister) {
        let result = match self.xlen() {
            Xlen::Rv64 => {
                let rval1 = self.read(rs1);
                let rval2 = self.read(rs2);

                if rval2 == 0 { rval1 } else { rval1 % rval2 }
            }
            Xlen::Rv32 => {
                let rval1 = self.read(rs1) as u32;
                let rval2 = self.read(rs2) as u32;

                let result = if rval2 == 0 { rval1 } else { rval1 % rval2 };
                result as u64
            }
        };

        self.write(rd, result);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::machine_state::registers::{a0, a1, a2, a3};
    use proptest::{prelude::any, prop_assert_eq, proptest};

    #[test]
    fn test_div_rem_invariant() {
        proptest!(|(
            r1_val in any::<u64>(),
            r2_val in any::<u64>(),
        )| {
            let mut state = XRegisters::new(Xlen::Rv64);

            state.write(a0, r1_val);
            state.write(a1, r2_val);
            state.run_div(a0, a1, a2);
            state.run_rem(a0, a1, a3);

            prop_assert_eq!(
                state.read(a0),
                state.read(a1)
                    .wrapping_mul(state.read(a2))
                    .wrapping_add(state.read(a3)));
        })
    }

    #[test]
    fn test_divu_remu_invariant() {
        proptest!(|(
            r1_val in any::<u64>(),
            r2_val in any::<u64>(),
        )| {
            let mut state = XRegisters::new(Xlen::Rv64);

            state.write(a0, r1_val);
            state.write(a1, r2_val);
            state.run_divu(a0, a1, a2);
            state.run_remu(a0, a1, a3);

            prop_assert_eq!(
                state.read(a0),
                state.read(a1)
                    .wrapping_mul(state.read(a2))
                    .wrapping_add(state.read(a3)));
        })
    }

    #[test]
    fn test_div_edge_cases() {
        let mut state = XRegisters::new(Xlen::Rv64);

        // Division by zero
        state.write(a0, 5);
        state.write(a1, 0);
        state.run_div(a0, a1, a2);
        assert_eq!(state.read(a2), u64::MAX);
        state.run_divu(a0, a1, a2);
        assert_eq!(state.read(a2), u64::MAX);
        state.run_rem(a0, a1, a2);
        assert_eq!(state.read(a2), 5);
        state.run_remu(a0, a1, a2);
        assert_eq!(state.read(a2), 5);

        // Signed overflow
        state.write(a0, i64::MIN as u64);
        state.write(a1, -1_i64 as u64);
        state.run_div(a0, a1, a2);
        assert_eq!(state.read(a2), i64::MIN as u64);
        state.run_rem(a0, a1, a2);
        assert_eq!(state.read(a2), 0);

        // The quotient truncates towards zero.
        state.write(a0, -7_i64 as u64);
        state.write(a1, 2);
        state.run_div(a0, a1, a2);
        assert_eq!(state.read(a2), -3_i64 as u64);
        state.run_rem(a0, a1, a2);
        assert_eq!(state.read(a2), -1_i64 as u64);
    }

    #[test]
    fn test_div_edge_cases_rv32() {
        let mut state = XRegisters::new(Xlen::Rv32);

        state.write(a0, i32::MIN as u64);
        state.write(a1, -1_i64 as u64);
        state.run_div(a0, a1, a2);
        assert_eq!(state.read(a2), i32::MIN as i64 as u64);
        state.run_rem(a0, a1, a2);
        assert_eq!(state.read(a2), 0);

        state.write(a1, 0);
        state.run_divu(a0, a1, a2);
        assert_eq!(state.read(a2), u32::MAX as i32 as i64 as u64);
        state.run_remu(a0, a1, a2);
        assert_eq!(state.read(a2), i32::MIN as i64 as u64);
    }

    #[test]
    fn test_mulh() {
        proptest!(|(
            r1_val in any::<i64>(),
            r2_val in any::<i64>(),
        )| {
            let mut state = XRegisters::new(Xlen::Rv64);

            state.write(a0, r1_val as u64);
            state.write(a1, r2_val as u64);

            state.run_mulh(a0, a1, a2);
            let expected = ((r1_val as i128 * r2_val as i128) >> 64) as u64;
            prop_assert_eq!(state.read(a2), expected);

            state.run_mulhu(a0, a1, a2);
            let expected = ((r1_val as u64 as u128 * r2_val as u64 as u128) >> 64) as u64;
            prop_assert_eq!(state.read(a2), expected);

            state.run_mulhsu(a0, a1, a2);
            let expected = ((r1_val as i128).wrapping_mul(r2_val as u64 as u128 as i128) >> 64) as u64;
            prop_assert_eq!(state.read(a2), expected);

            // The low half is sign-agnostic.
            state.run_mul(a0, a1, a2);
            prop_assert_eq!(state.read(a2), (r1_val as u64).wrapping_mul(r2_val as u64));
        })
    }

    #[test]
    fn test_mulh_rv32() {
        proptest!(|(
            r1_val in any::<i32>(),
            r2_val in any::<i32>(),
        )| {
            let mut state = XRegisters::new(Xlen::Rv32);

            state.write(a0, r1_val as u64);
            state.write(a1, r2_val as u64);

            state.run_mulh(a0, a1, a2);
            let expected = ((r1_val as i64 * r2_val as i64) >> 32) as i32 as u64;
            prop_assert_eq!(state.read(a2), expected);

            state.run_mulhu(a0, a1, a2);
            let expected = (((r1_val as u32 as u64) * (r2_val as u32 as u64)) >> 32) as i32 as u64;
            prop_assert_eq!(state.read(a2), expected);

            state.run_mulhsu(a0, a1, a2);
            let expected = (((r1_val as i64) * (r2_val as u32 as i64)) >> 32) as i32 as u64;
            prop_assert_eq!(state.read(a2), expected);

            state.run_mul(a0, a1, a2);
            prop_assert_eq!(state.read(a2), r1_val.wrapping_mul(r2_val) as i64 as u64);
        })
    }
}
