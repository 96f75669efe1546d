// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Logging helpers for the interpreter.
//!
//! All logging goes through the proxies below so that the execution path
//! carries no logging machinery unless the `log` feature is enabled.

#[cfg(feature = "log")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "log"))]
mod noop {
    macro_rules! trace {
        ($($ignore:tt)*) => {};
    }

    macro_rules! debug {
        ($($ignore:tt)*) => {};
    }

    pub(crate) use debug;
    pub(crate) use trace;
}

#[cfg(not(feature = "log"))]
pub(crate) use noop::{debug, trace};
