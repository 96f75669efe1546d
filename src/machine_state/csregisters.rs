// SPDX-FileCopyrightText: 2023-2024 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2024 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Control and status registers.
//!
//! The bank stores one 64-bit cell per underlying register. Shadow
//! registers (`sstatus`, `sie`, `sip`, their user-level counterparts and
//! the unprivileged counter aliases) resolve to their root register with a
//! restricting mask applied on read and a merging mask on write.
//!
//! Access control is fully determined by the CSR address: bits 11:10
//! encode read-only registers, bits 9:8 the minimum privilege, as laid out
//! in section 2.1 and table 2.1 of the privileged spec.

pub mod xstatus;

use num_enum::TryFromPrimitive;

use crate::bits::bit;
use crate::machine_state::mode::{Mode, TrapMode};
use crate::machine_state::xlen::Xlen;
use crate::traps::Exception;
use self::xstatus::{MStatus, MSTATUS_WRITE_MASK, SSTATUS_MASK, USTATUS_MASK};

/// Representation of a value in a CSR
pub type CSRValue = u64;

/// Privilege required to access a CSR
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Privilege {
    Unprivileged = 0,
    Supervisor = 1,
    Hypervisor = 2,
    Machine = 3,
}

/// CSR index
#[allow(non_camel_case_types)] // To make names consistent with specification
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumIter,
    strum::Display,
    TryFromPrimitive,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(usize)]
pub enum CSRegister {
    // User trap setup & handling
    ustatus = 0x000,
    uie = 0x004,
    utvec = 0x005,
    uscratch = 0x040,
    uepc = 0x041,
    ucause = 0x042,
    utval = 0x043,
    uip = 0x044,

    // Supervisor trap setup & handling
    sstatus = 0x100,
    sie = 0x104,
    stvec = 0x105,
    scounteren = 0x106,
    sscratch = 0x140,
    sepc = 0x141,
    scause = 0x142,
    stval = 0x143,
    sip = 0x144,

    // Supervisor protection and translation
    satp = 0x180,

    // Machine trap setup
    mstatus = 0x300,
    misa = 0x301,
    medeleg = 0x302,
    mideleg = 0x303,
    mie = 0x304,
    mtvec = 0x305,
    mcounteren = 0x306,

    // Machine trap handling
    mscratch = 0x340,
    mepc = 0x341,
    mcause = 0x342,
    mtval = 0x343,
    mip = 0x344,

    // Machine counters
    mcycle = 0xB00,
    minstret = 0xB02,

    // Unprivileged counters
    cycle = 0xC00,
    time = 0xC01,
    instret = 0xC02,

    // Machine information
    mvendorid = 0xF11,
    marchid = 0xF12,
    mimpid = 0xF13,
    mhartid = 0xF14,
}

/// Parse a 12-bit CSR address as delivered by the decoder.
///
/// Returns `None` for addresses this machine does not implement; accessing
/// those raises an illegal instruction exception at the access site.
pub fn try_parse_csregister(address: arbitrary_int::u12) -> Option<CSRegister> {
    CSRegister::try_from(address.value() as usize).ok()
}

impl CSRegister {
    /// Determine the privilege level required to access this CSR.
    ///
    /// The minimum privilege is encoded in bits 9:8 of the address.
    /// Section 2.1 - privileged spec
    #[inline(always)]
    pub fn privilege(self) -> Privilege {
        match (self as usize >> 8) & 0b11 {
            0b00 => Privilege::Unprivileged,
            0b01 => Privilege::Supervisor,
            0b10 => Privilege::Hypervisor,
            _ => Privilege::Machine,
        }
    }

    /// Determines if the register is read-only.
    ///
    /// Rules & table of read-write / read-only ranges are in section 2.1 & table 2.1
    #[inline(always)]
    pub fn is_read_only(self) -> bool {
        (self as usize >> 10) & 0b11 == 0b11
    }

    /// Resolve shadow registers to the register holding the ground truth.
    /// Sections 3.1.6 & 4.1.1
    fn root(self) -> CSRegister {
        match self {
            CSRegister::ustatus | CSRegister::sstatus => CSRegister::mstatus,
            CSRegister::uie | CSRegister::sie => CSRegister::mie,
            CSRegister::uip | CSRegister::sip => CSRegister::mip,
            CSRegister::cycle => CSRegister::mcycle,
            CSRegister::instret => CSRegister::minstret,
            reg => reg,
        }
    }

    /// Enforce the WPRI and WARL field specifications.
    ///
    /// Either return the value to be written, or `None` to signify that no
    /// write is necessary, leaving the existing value in its place.
    #[inline(always)]
    fn make_value_writable(self, value: CSRValue) -> Option<CSRValue> {
        match self {
            CSRegister::mstatus | CSRegister::sstatus | CSRegister::ustatus => {
                Some(value & MSTATUS_WRITE_MASK)
            }
            // IALIGN=32, the low two bits of an exception pc never read non-zero
            CSRegister::mepc | CSRegister::sepc | CSRegister::uepc => Some(value & !0b11),
            // misa and the machine-information registers are fixed for this machine
            CSRegister::misa
            | CSRegister::mvendorid
            | CSRegister::marchid
            | CSRegister::mimpid
            | CSRegister::mhartid => None,
            // Counter aliases are written through their machine-level roots
            CSRegister::cycle | CSRegister::instret => None,
            _ => Some(value),
        }
    }
}

/// Resolved access rights for one `(privilege level, CSR)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// The privilege level cannot access the register at all.
    None,
    /// The register may be read but never written.
    ReadOnly,
    /// The register may be read and written.
    ReadWrite,
}

/// Resolve the access policy of `reg` as seen from `mode`.
#[inline(always)]
pub fn permission(reg: CSRegister, mode: Mode) -> Permission {
    if reg.privilege() > mode.privilege() {
        return Permission::None;
    }

    if reg.is_read_only() {
        Permission::ReadOnly
    } else {
        Permission::ReadWrite
    }
}

/// Bits of `mip`/`mie` visible through the supervisor views: SSIP, STIP, SEIP.
const WARL_MASK_SIP_SIE: CSRValue = 0x222;

/// Bits of `mip`/`mie` visible through the user views: USIP, UTIP, UEIP.
const WARL_MASK_UIP_UIE: CSRValue = 0x111;

// misa extension bits
const MISA_EXT_I: CSRValue = 1 << 8;
const MISA_EXT_M: CSRValue = 1 << 12;
const MISA_EXT_S: CSRValue = 1 << 18;
const MISA_EXT_U: CSRValue = 1 << 20;

/// Reset value of `misa`: MXL matching the hart width, IMSU extensions.
fn misa_value(xlen: Xlen) -> CSRValue {
    let mxl = match xlen {
        Xlen::Rv32 => 0b01 << 30,
        Xlen::Rv64 => 0b10 << 62,
    };
    mxl | MISA_EXT_I | MISA_EXT_M | MISA_EXT_S | MISA_EXT_U
}

/// Backing cells, one per underlying (non-shadow) register.
#[derive(Debug, Clone, Default)]
struct CSRValues {
    utvec: CSRValue,
    uscratch: CSRValue,
    uepc: CSRValue,
    ucause: CSRValue,
    utval: CSRValue,
    stvec: CSRValue,
    scounteren: CSRValue,
    sscratch: CSRValue,
    sepc: CSRValue,
    scause: CSRValue,
    stval: CSRValue,
    satp: CSRValue,
    mstatus: CSRValue,
    misa: CSRValue,
    medeleg: CSRValue,
    mideleg: CSRValue,
    mie: CSRValue,
    mtvec: CSRValue,
    mcounteren: CSRValue,
    mscratch: CSRValue,
    mepc: CSRValue,
    mcause: CSRValue,
    mtval: CSRValue,
    mip: CSRValue,
    mcycle: CSRValue,
    minstret: CSRValue,
    time: CSRValue,
}

/// CSRs
#[derive(Debug, Clone, Default)]
pub struct CSRegisters {
    values: CSRValues,
}

impl CSRegisters {
    pub fn new(xlen: Xlen) -> Self {
        let mut registers = Self::default();
        registers.reset(xlen);
        registers
    }

    /// Reset the control and status registers.
    pub fn reset(&mut self, xlen: Xlen) {
        self.values = CSRValues::default();
        self.values.misa = misa_value(xlen);
    }

    /// Read the raw cell of a root register. The machine-information
    /// registers have no cell and read as zero.
    fn raw_read(&self, reg: CSRegister) -> CSRValue {
        let values = &self.values;
        match reg {
            CSRegister::utvec => values.utvec,
            CSRegister::uscratch => values.uscratch,
            CSRegister::uepc => values.uepc,
            CSRegister::ucause => values.ucause,
            CSRegister::utval => values.utval,
            CSRegister::stvec => values.stvec,
            CSRegister::scounteren => values.scounteren,
            CSRegister::sscratch => values.sscratch,
            CSRegister::sepc => values.sepc,
            CSRegister::scause => values.scause,
            CSRegister::stval => values.stval,
            CSRegister::satp => values.satp,
            CSRegister::mstatus => values.mstatus,
            CSRegister::misa => values.misa,
            CSRegister::medeleg => values.medeleg,
            CSRegister::mideleg => values.mideleg,
            CSRegister::mie => values.mie,
            CSRegister::mtvec => values.mtvec,
            CSRegister::mcounteren => values.mcounteren,
            CSRegister::mscratch => values.mscratch,
            CSRegister::mepc => values.mepc,
            CSRegister::mcause => values.mcause,
            CSRegister::mtval => values.mtval,
            CSRegister::mip => values.mip,
            CSRegister::mcycle => values.mcycle,
            CSRegister::minstret => values.minstret,
            CSRegister::time => values.time,
            CSRegister::mvendorid
            | CSRegister::marchid
            | CSRegister::mimpid
            | CSRegister::mhartid => 0,
            shadow => unreachable!("{shadow} resolves to a root register"),
        }
    }

    fn raw_write(&mut self, reg: CSRegister, value: CSRValue) {
        let values = &mut self.values;
        match reg {
            CSRegister::utvec => values.utvec = value,
            CSRegister::uscratch => values.uscratch = value,
            CSRegister::uepc => values.uepc = value,
            CSRegister::ucause => values.ucause = value,
            CSRegister::utval => values.utval = value,
            CSRegister::stvec => values.stvec = value,
            CSRegister::scounteren => values.scounteren = value,
            CSRegister::sscratch => values.sscratch = value,
            CSRegister::sepc => values.sepc = value,
            CSRegister::scause => values.scause = value,
            CSRegister::stval => values.stval = value,
            CSRegister::satp => values.satp = value,
            CSRegister::mstatus => values.mstatus = value,
            CSRegister::misa => values.misa = value,
            CSRegister::medeleg => values.medeleg = value,
            CSRegister::mideleg => values.mideleg = value,
            CSRegister::mie => values.mie = value,
            CSRegister::mtvec => values.mtvec = value,
            CSRegister::mcounteren => values.mcounteren = value,
            CSRegister::mscratch => values.mscratch = value,
            CSRegister::mepc => values.mepc = value,
            CSRegister::mcause => values.mcause = value,
            CSRegister::mtval => values.mtval = value,
            CSRegister::mip => values.mip = value,
            CSRegister::mcycle => values.mcycle = value,
            CSRegister::minstret => values.minstret = value,
            CSRegister::time => values.time = value,
            reg => unreachable!("{reg} has no writable cell"),
        }
    }

    /// Transform a read to account for shadow registers.
    /// Sections 3.1.6 & 4.1.1
    #[inline(always)]
    fn transform_read(&self, reg: CSRegister, source_reg_value: CSRValue) -> CSRValue {
        match reg {
            CSRegister::sstatus => source_reg_value & SSTATUS_MASK,
            CSRegister::ustatus => source_reg_value & USTATUS_MASK,
            CSRegister::sie | CSRegister::sip => source_reg_value & WARL_MASK_SIP_SIE,
            CSRegister::uie | CSRegister::uip => source_reg_value & WARL_MASK_UIP_UIE,
            _ => source_reg_value,
        }
    }

    /// Transform a write to account for shadow registers: the shadowed
    /// fields come from `value`, every other field keeps the value of the
    /// underlying register.
    /// Sections 3.1.6 & 4.1.1
    #[inline(always)]
    fn transform_write(&self, reg: CSRegister, value: CSRValue) -> CSRValue {
        let merge = |mask: CSRValue| {
            let root_value = self.raw_read(reg.root());
            (value & mask) | (root_value & !mask)
        };

        match reg {
            CSRegister::sstatus => merge(SSTATUS_MASK),
            CSRegister::ustatus => merge(USTATUS_MASK),
            CSRegister::sie | CSRegister::sip => merge(WARL_MASK_SIP_SIE),
            CSRegister::uie | CSRegister::uip => merge(WARL_MASK_UIP_UIE),
            _ => value,
        }
    }

    /// Read from a CSR.
    ///
    /// This is the unchecked read: access rights are the caller's business,
    /// resolved through [`permission`] beforehand.
    #[inline(always)]
    pub fn read(&self, reg: CSRegister) -> CSRValue {
        self.transform_read(reg, self.raw_read(reg.root()))
    }

    /// Write to a CSR.
    ///
    /// This is the unchecked write: access rights are the caller's business,
    /// resolved through [`permission`] beforehand. WARL legalisation still
    /// applies, so writes to fixed registers are dropped.
    #[inline(always)]
    pub fn write(&mut self, reg: CSRegister, value: CSRValue) {
        if let Some(value) = reg.make_value_writable(value) {
            let value = self.transform_write(reg, value);
            self.raw_write(reg.root(), value);
        }
    }

    /// Typed view of the current `mstatus` value.
    #[inline(always)]
    pub fn mstatus(&self) -> MStatus {
        MStatus::from_bits(self.values.mstatus)
    }

    /// Replace `mstatus` with the given typed value.
    #[inline(always)]
    pub fn set_mstatus(&mut self, mstatus: MStatus) {
        self.values.mstatus = mstatus.to_bits() & MSTATUS_WRITE_MASK;
    }

    /// Count one retired instruction.
    #[inline(always)]
    pub fn increment_minstret(&mut self) {
        self.values.minstret = self.values.minstret.wrapping_add(1);
    }

    /// Select the mode a trap is taken in: exceptions raised in S or U
    /// whose cause bit is set in `medeleg` are handled in supervisor mode,
    /// everything else in machine mode. Section 3.1.8
    pub fn trap_mode(&self, exception: &Exception, current_mode: Mode) -> TrapMode {
        if current_mode <= Mode::Supervisor
            && bit(self.values.medeleg, exception.exception_code() as usize)
        {
            TrapMode::Supervisor
        } else {
            TrapMode::Machine
        }
    }
}
