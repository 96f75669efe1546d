// SPDX-FileCopyrightText: 2024 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of the privileged instructions
//!
//! Chapters 3 & 5 - Privileged spec

use crate::log::trace;
use crate::machine_state::csregisters::xstatus::{MPPValue, SPPValue};
use crate::machine_state::csregisters::CSRegister;
use crate::machine_state::hart_state::HartState;
use crate::machine_state::memory::{Address, Memory};
use crate::machine_state::mode::Mode;
use crate::machine_state::registers::XRegister;
use crate::machine_state::MachineCoreState;
use crate::traps::Exception;

impl HartState {
    /// `ECALL` instruction
    ///
    /// The exception code encodes the privilege level the call was made
    /// from.
    pub fn run_ecall(&self) -> Exception {
        match self.mode {
            Mode::User => Exception::EnvCallFromUMode,
            Mode::Supervisor => Exception::EnvCallFromSMode,
            Mode::Machine => Exception::EnvCallFromMMode,
        }
    }

    /// `EBREAK` instruction
    ///
    /// The address of the breakpoint itself becomes the trap value.
    pub fn run_ebreak(&self) -> Exception {
        Exception::Breakpoint(self.pc)
    }

    /// `MRET` instruction
    ///
    /// If successful, returns the next instruction address, read from `MEPC`
    pub fn run_mret(&mut self) -> Result<Address, Exception> {
        // Only M-mode can run mret
        match self.mode {
            Mode::User | Mode::Supervisor => return Err(Exception::IllegalInstruction),
            Mode::Machine => (),
        }

        let mstatus = self.csregisters.mstatus();
        // get MPP
        let prev_privilege = mstatus.mpp();
        // Set MIE to MPIE
        let mstatus = mstatus.with_mie(mstatus.mpie());
        // set MPIE to 1
        let mstatus = mstatus.with_mpie(true);
        // Set MPP to the least-privileged supported mode
        let mstatus = mstatus.with_mpp(MPPValue::User);
        // Set MPRV to 0 when leaving M-mode. (MPP != M-mode)
        let mstatus = if prev_privilege != MPPValue::Machine {
            mstatus.with_mprv(false)
        } else {
            mstatus
        };
        self.csregisters.set_mstatus(mstatus);

        // Set the mode after handling mret, according to MPP read initially
        self.mode = match prev_privilege {
            MPPValue::User => Mode::User,
            MPPValue::Supervisor => Mode::Supervisor,
            MPPValue::Machine => Mode::Machine,
        };
        trace!(mode = ?self.mode, "mret");

        // set pc to MEPC (we just have to return it)
        Ok(self.csregisters.read(CSRegister::mepc))
    }

    /// `SRET` instruction
    ///
    /// If successful, returns the next instruction address, read from `SEPC`
    pub fn run_sret(&mut self) -> Result<Address, Exception> {
        // Only M and S mode can run SRET
        match self.mode {
            Mode::User => return Err(Exception::IllegalInstruction),
            Mode::Supervisor | Mode::Machine => (),
        }

        let mstatus = self.csregisters.mstatus();
        // Section 3.1.6.5
        // SRET raises IllegalInstruction when executed in S-mode and the
        // TSR (Trap SRET) bit is on.
        if self.mode == Mode::Supervisor && mstatus.tsr() {
            return Err(Exception::IllegalInstruction);
        }

        // get SPP
        let prev_privilege = mstatus.spp();
        // Set SIE to SPIE
        let mstatus = mstatus.with_sie(mstatus.spie());
        // set SPIE to 1
        let mstatus = mstatus.with_spie(true);
        // Set SPP to the least-privileged supported mode
        let mstatus = mstatus.with_spp(SPPValue::User);
        // Set MPRV to 0 when leaving M-mode.
        // Since SPP can only hold User / Supervisor, it is always cleared.
        let mstatus = mstatus.with_mprv(false);
        self.csregisters.set_mstatus(mstatus);

        // Set the mode after handling sret, according to SPP read initially
        self.mode = match prev_privilege {
            SPPValue::User => Mode::User,
            SPPValue::Supervisor => Mode::Supervisor,
        };
        trace!(mode = ?self.mode, "sret");

        // set pc to SEPC (we just have to return it)
        Ok(self.csregisters.read(CSRegister::sepc))
    }

    /// `URET` instruction
    ///
    /// User-level trap return: restore the UIE stack and return to `UEPC`.
    /// Any mode may execute it.
    pub fn run_uret(&mut self) -> Result<Address, Exception> {
        let mstatus = self.csregisters.mstatus();
        // Set UIE to UPIE
        let mstatus = mstatus.with_uie(mstatus.upie());
        // set UPIE to 1
        let mstatus = mstatus.with_upie(true);
        self.csregisters.set_mstatus(mstatus);

        // User-level traps always return to user mode.
        self.mode = Mode::User;
        trace!(mode = ?self.mode, "uret");

        Ok(self.csregisters.read(CSRegister::uepc))
    }
}

impl<M: Memory> MachineCoreState<M> {
    /// `SFENCE.VM` instruction
    ///
    /// Synchronises updates to in-memory memory-management data structures
    /// with current execution. Address translation is not modelled and
    /// loads/stores are never cached, so over-fencing to a no-op is
    /// always legal. Section 5.2.1
    #[inline(always)]
    pub fn run_sfence_vm(&mut self, _vaddr: XRegister) {
        // no-op
    }
}
