// Copyright (C) 2025 Farlink Project
//
// MIT License

//! farlink-tap library
//!
//! Wire-level ARM SWD and JTAG tap engines for the farlink debug probe.
//!
//! This crate implements the signal transport underneath a debug probe: the
//! bit-banged
//! [SWD](https://developer.arm.com/documentation/ihi0031/latest/) and JTAG
//! wire protocols, with interchangeable hardware backends behind a single
//! operation-table contract.  Everything above the wire level - ADIv5
//! register semantics, memory access, the network bridge to the host tool -
//! lives elsewhere and consumes this crate through [`SwdOps`] and
//! [`JtagOps`].
//!
//! The following diagram shows the key concepts.
//!
//! ```text
//!    Protocol/target layer  (out of scope)
//!   ------------------------------------
//!      SwdOps        JtagOps              <- operation tables
//!   ------------------------------------
//!          Transport<B: TapBus>           <- engines, turnaround state,
//!   ------------------------------------     frequency/delay model
//!     BitBangBus<P>  |  BundleBus<P>      <- backends
//!   ------------------------------------
//!      TapPin        |  BundlePort        <- hardware seam
//!   ------------------------------------
//!        SWDIO/TMS  SWCLK/TCK  TDI  TDO
//! ```
//!
//! * [`Transport`] owns the selected backend and all per-session wire state.
//!   One backend is chosen from [`ProbeConfig`] at startup and never swapped
//!   while the transport is active.
//! * [`BitBangBus`] drives each line through an individual [`TapPin`].
//! * [`BundleBus`] drives all lines through one packed [`BundlePort`]
//!   read/write, for lower per-bit overhead on hardware that supports it.
//!
//! The crate is `no_std` and host-testable.  An adapter for the ESP32-C3
//! GPIO matrix is available behind the `esp32c3` feature.

#![cfg_attr(not(test), no_std)]

pub mod bits;
pub mod bundle;
pub mod bus;
pub mod config;
pub mod jtag;
pub mod swd;
pub mod transport;

#[cfg(feature = "esp32c3")]
pub mod hal;

#[cfg(test)]
pub(crate) mod test_bus;

#[doc(inline)]
pub use crate::bundle::{BundleBus, BundlePort};
#[doc(inline)]
pub use crate::bus::{BitBangBus, TapBus, TapPin};
#[doc(inline)]
pub use crate::config::{Backend, PinMap, ProbeConfig};
#[doc(inline)]
pub use crate::jtag::JtagOps;
#[doc(inline)]
pub use crate::swd::SwdOps;
#[doc(inline)]
pub use crate::transport::{Pacer, TapMode, Transport};

use core::fmt;

/// Errors produced by the tap engines.
///
/// Configuration problems are the only unrecoverable condition in this
/// crate, and are caught by [`ProbeConfig::validate()`] before the transport
/// starts serving.  Everything else is either recoverable by the caller or
/// handled internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapError {
    /// The sampled parity bit disagreed with the odd parity of the data
    /// read.  The data cannot be trusted; the caller should retry the
    /// operation or reset the target.
    Parity,

    /// JTAG operations were requested but the configuration carries no
    /// TDI/TDO assignment.
    JtagUnavailable,

    /// The probe configuration is invalid.
    Config(ConfigError),
}

/// Invalid pin-pairing combinations in a [`ProbeConfig`].
///
/// These mirror the wiring rules of the probe hardware: direction-control
/// lines only exist on level-shifted boards, which always wire the full
/// JTAG set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// TDI was assigned without TDO.
    TdiWithoutTdo,

    /// A SWDIO/TMS direction pin was assigned without TDO (no JTAG wiring).
    DirWithoutJtag,

    /// A SWCLK/TCK direction pin was assigned without a SWDIO/TMS direction
    /// pin.
    TckDirWithoutTmsDir,
}

impl fmt::Display for TapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapError::Parity => write!(f, "read parity mismatch"),
            TapError::JtagUnavailable => write!(f, "jtag not available on this configuration"),
            TapError::Config(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::TdiWithoutTdo => write!(f, "TDI assigned without TDO"),
            ConfigError::DirWithoutJtag => {
                write!(f, "SWDIO direction pin assigned without JTAG wiring")
            }
            ConfigError::TckDirWithoutTmsDir => {
                write!(f, "SWCLK direction pin assigned without SWDIO direction pin")
            }
        }
    }
}

impl From<ConfigError> for TapError {
    fn from(e: ConfigError) -> Self {
        TapError::Config(e)
    }
}
