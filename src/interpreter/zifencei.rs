// SPDX-FileCopyrightText: 2024-2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of Zifencei extension for RISC-V

use crate::machine_state::memory::Memory;
use crate::machine_state::MachineCoreState;

impl<M: Memory> MachineCoreState<M> {
    /// Execute a `fence.i` instruction.
    ///
    /// Instructions are fetched and decoded by an outer layer that holds no
    /// fetch cache, so there is nothing to invalidate.
    #[inline(always)]
    pub fn run_fencei(&mut self) {
        // no-op
    }
}
