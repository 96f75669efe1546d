// SPDX-FileCopyrightText: 2023-2024 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2024 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Synchronous exceptions and their trap-entry encoding.
//!
//! Exceptions are the only traps this core raises: there are no external
//! devices and hence no asynchronous interrupts. Every exception carries
//! enough information to derive the `xcause` and `xtval` values written
//! on trap entry.

use std::fmt::Formatter;

use crate::machine_state::csregisters::CSRValue;
use crate::machine_state::memory::Address;

/// RISC-V Exceptions (also known as synchronous exceptions)
#[derive(PartialEq, Eq, thiserror::Error, strum::Display, Clone, Copy)]
pub enum Exception {
    /// `InstructionAddressMisaligned(addr)` where `addr` is the misaligned target
    InstructionAddressMisaligned(Address),
    IllegalInstruction,
    /// `Breakpoint(addr)` where `addr` is the address of the EBREAK itself
    Breakpoint(Address),
    /// `LoadAccessFault(addr)` where `addr` is the faulting load address
    LoadAccessFault(Address),
    /// `StoreAccessFault(addr)` where `addr` is the faulting store address
    StoreAccessFault(Address),
    EnvCallFromUMode,
    EnvCallFromSMode,
    EnvCallFromMMode,
}

impl core::fmt::Debug for Exception {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::InstructionAddressMisaligned(addr) => {
                write!(f, "InstructionAddressMisaligned({addr:#X})")
            }
            Self::Breakpoint(addr) => write!(f, "Breakpoint({addr:#X})"),
            Self::LoadAccessFault(addr) => write!(f, "LoadAccessFault({addr:#X})"),
            Self::StoreAccessFault(addr) => write!(f, "StoreAccessFault({addr:#X})"),
            other => write!(f, "{other}"),
        }
    }
}

impl Exception {
    /// Code of the exception, also known as cause, given by table 3.6
    pub fn exception_code(&self) -> CSRValue {
        match self {
            Exception::InstructionAddressMisaligned(_) => 0,
            Exception::IllegalInstruction => 2,
            Exception::Breakpoint(_) => 3,
            Exception::LoadAccessFault(_) => 5,
            Exception::StoreAccessFault(_) => 7,
            Exception::EnvCallFromUMode => 8,
            Exception::EnvCallFromSMode => 9,
            Exception::EnvCallFromMMode => 11,
        }
    }

    /// `xcause` value, i.e. what is written to the `xcause` register when
    /// taking the trap. Exceptions never set the interrupt bit.
    pub fn xcause(&self) -> CSRValue {
        self.exception_code()
    }

    /// Trap value to be stored in the `xtval` register when taking the trap.
    /// See sections 3.1.16 & 5.1.9
    pub fn xtval(&self) -> CSRValue {
        match self {
            Exception::IllegalInstruction
            | Exception::EnvCallFromUMode
            | Exception::EnvCallFromSMode
            | Exception::EnvCallFromMMode => 0,
            Exception::InstructionAddressMisaligned(addr) => *addr,
            Exception::Breakpoint(addr) => *addr,
            Exception::LoadAccessFault(addr) => *addr,
            Exception::StoreAccessFault(addr) => *addr,
        }
    }

    /// Computes the address pc is set to when entering the trap.
    ///
    /// Exceptions are never vectored, the handler is always the `xtvec` base.
    pub fn trap_handler_address(&self, xtvec_val: CSRValue) -> Address {
        // MODE = xtvec[1:0]
        // BASE[xLEN-1:2] = xtvec[xLEN-1:2]
        xtvec_val & !0b11
    }
}
