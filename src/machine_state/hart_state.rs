// SPDX-FileCopyrightText: 2024 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2024 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

use crate::log::trace;
use crate::machine_state::csregisters::{self, CSRegister};
use crate::machine_state::csregisters::xstatus::{MPPValue, SPPValue};
use crate::machine_state::memory::Address;
use crate::machine_state::mode::{Mode, TrapMode};
use crate::machine_state::registers::XRegisters;
use crate::machine_state::xlen::Xlen;
use crate::traps::Exception;

/// RISC-V hart state
pub struct HartState {
    /// Integer registers
    pub xregisters: XRegisters,

    /// Control and state registers
    pub csregisters: csregisters::CSRegisters,

    /// Current running mode of hart
    pub mode: Mode,

    /// Program counter
    pub pc: Address,

    xlen: Xlen,
}

impl HartState {
    pub fn new(xlen: Xlen) -> Self {
        Self {
            xregisters: XRegisters::new(xlen),
            csregisters: csregisters::CSRegisters::new(xlen),
            mode: Mode::default(),
            pc: 0,
            xlen,
        }
    }

    /// Width of the architectural word, fixed for the lifetime of the hart.
    #[inline(always)]
    pub fn xlen(&self) -> Xlen {
        self.xlen
    }

    /// Reset the hart state.
    pub fn reset(&mut self, pc: Address) {
        self.xregisters.reset();
        self.csregisters.reset(self.xlen);
        self.mode = Mode::default();
        self.pc = self.xlen.truncate_address(pc);
    }

    /// Given a trap source and a return address, take a trap on the machine.
    ///
    /// Returns the address of the trap handler the hart transfers to.
    pub fn take_trap(&mut self, exception: Exception, return_pc: Address) -> Address {
        self.take_trap_from_mode(exception, self.mode, return_pc)
    }

    /// Given a trap source, a return address and a mode to trap from, take a
    /// trap on the machine.
    fn take_trap_from_mode(
        &mut self,
        exception: Exception,
        current_mode: Mode,
        return_pc: Address,
    ) -> Address {
        let trap_mode = self.csregisters.trap_mode(&exception, current_mode);
        let (xtvec_reg, xepc_reg, xcause_reg, xtval_reg) = match trap_mode {
            TrapMode::Supervisor => (
                CSRegister::stvec,
                CSRegister::sepc,
                CSRegister::scause,
                CSRegister::stval,
            ),
            TrapMode::Machine => (
                CSRegister::mtvec,
                CSRegister::mepc,
                CSRegister::mcause,
                CSRegister::mtval,
            ),
        };

        trace!(
            cause = %exception,
            ?trap_mode,
            return_pc,
            "taking trap"
        );

        // Setting xepc allows the trap handler to resume the previous computation
        self.csregisters.write(xepc_reg, return_pc);

        // The trap handler wants to know what caused the trap
        self.csregisters.write(xcause_reg, exception.xcause());
        self.csregisters.write(xtval_reg, exception.xtval());

        // Configure machine status for the trap handler
        let mstatus = self.csregisters.mstatus();
        let mstatus = match trap_mode {
            TrapMode::Supervisor => {
                // Remember whether interrupts were enabled before taking the trap
                let interrupts_enabled = mstatus.sie();
                let mstatus = mstatus.with_spie(interrupts_enabled);

                // Disable interrupts for the trap handler
                let mstatus = mstatus.with_sie(false);

                // Remember the previous privilege mode
                mstatus.with_spp(match current_mode {
                    Mode::User => SPPValue::User,
                    Mode::Supervisor => SPPValue::Supervisor,
                    Mode::Machine => {
                        unreachable!("Traps from machine mode are never delegated")
                    }
                })
            }

            TrapMode::Machine => {
                // Remember whether interrupts were enabled before taking the trap
                let interrupts_enabled = mstatus.mie();
                let mstatus = mstatus.with_mpie(interrupts_enabled);

                // Disable interrupts for the trap handler
                let mstatus = mstatus.with_mie(false);

                // Remember the previous privilege mode
                mstatus.with_mpp(match current_mode {
                    Mode::User => MPPValue::User,
                    Mode::Supervisor => MPPValue::Supervisor,
                    Mode::Machine => MPPValue::Machine,
                })
            }
        };
        self.csregisters.set_mstatus(mstatus);

        // Escalate the privilege to the corresponding mode
        self.mode = trap_mode.as_mode();

        exception.trap_handler_address(self.csregisters.read(xtvec_reg))
    }
}
