// SPDX-FileCopyrightText: 2023-2024 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

use crate::machine_state::csregisters::Privilege;

/// Modes the hardware state can be in when running code
#[derive(
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Copy,
    Clone,
    strum::EnumIter,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(u8)]
pub enum Mode {
    User = 0b000,
    Supervisor = 0b001,
    Machine = 0b011,
}

impl Mode {
    /// Obtain the corresponding [`Privilege`] for [`Mode`].
    pub fn privilege(&self) -> Privilege {
        match self {
            Mode::User => Privilege::Unprivileged,
            Mode::Supervisor => Privilege::Supervisor,
            Mode::Machine => Privilege::Machine,
        }
    }
}

impl From<u8> for Mode {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0 => Mode::User,
            1 => Mode::Supervisor,
            _ => Mode::Machine,
        }
    }
}

impl Default for Mode {
    #[inline]
    fn default() -> Self {
        Self::Machine
    }
}

impl From<Mode> for u8 {
    #[inline]
    fn from(value: Mode) -> Self {
        value as u8
    }
}

/// Modes the hardware state can trap into, a sub-enum of [`Mode`]
#[derive(Debug, PartialEq, PartialOrd, Eq, Copy, Clone)]
#[repr(u8)]
pub enum TrapMode {
    Supervisor = Mode::Supervisor as u8,
    Machine = Mode::Machine as u8,
}

impl TrapMode {
    /// Construct the mode corresponding to the trap mode.
    pub fn as_mode(&self) -> Mode {
        match self {
            Self::Supervisor => Mode::Supervisor,
            Self::Machine => Mode::Machine,
        }
    }
}
