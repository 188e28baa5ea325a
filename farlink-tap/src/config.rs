// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Probe configuration and the frequency/delay model.
//!
//! A [`ProbeConfig`] is supplied once at startup by the external
//! configuration store.  It selects the hardware backend, assigns the
//! debug-port pins, and carries the maximum wire frequency from which the
//! per-half-cycle delay is derived.  [`ProbeConfig::validate()`] must pass
//! before the transport begins serving - pin-pairing mistakes are the only
//! unrecoverable error in this crate and are never checked again at
//! runtime.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::ConfigError;

/// Lowest accepted wire frequency, in Hz.
pub const MIN_FREQUENCY_HZ: u32 = 100;

/// Highest accepted wire frequency, in Hz.
pub const MAX_FREQUENCY_HZ: u32 = 48_000_000;

/// Default maximum wire frequency, in Hz.
pub const DEFAULT_FREQUENCY_HZ: u32 = 4_000_000;

/// Which hardware backend drives the tap lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Backend {
    /// One GPIO operation per line per edge.
    #[default]
    BitBang,

    /// Single packed multi-line read/write per edge.
    Bundle,
}

/// Per-signal pin assignments.
///
/// SWDIO/TMS and SWCLK/TCK are always wired.  The JTAG data pins and the
/// level-shifter direction controls are optional; `None` means the board
/// does not route the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PinMap {
    /// SWDIO/TMS - the shared bidirectional data/mode line.
    pub swdio: u8,

    /// SWCLK/TCK.
    pub swclk: u8,

    /// JTAG TDI.
    pub tdi: Option<u8>,

    /// JTAG TDO, also the SWO trace input.
    pub tdo: Option<u8>,

    /// Direction control for a level-shifted SWDIO/TMS line.
    pub swdio_dir: Option<u8>,

    /// Direction control for a level-shifted SWCLK/TCK line.
    pub swclk_dir: Option<u8>,
}

impl PinMap {
    /// A SWD-only pin map - just SWDIO and SWCLK.
    pub const fn swd_only(swdio: u8, swclk: u8) -> Self {
        PinMap {
            swdio,
            swclk,
            tdi: None,
            tdo: None,
            swdio_dir: None,
            swclk_dir: None,
        }
    }

    /// Whether the map carries the full JTAG set.
    pub fn has_jtag(&self) -> bool {
        self.tdi.is_some() && self.tdo.is_some()
    }
}

/// Static probe configuration, supplied once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProbeConfig {
    /// Hardware backend selection.
    pub backend: Backend,

    /// Pin assignments.
    pub pins: PinMap,

    /// Maximum wire frequency in Hz.  Out-of-range requests are clamped.
    max_frequency: u32,
}

impl ProbeConfig {
    /// Creates a configuration with the given backend and pins at the
    /// default frequency.
    pub fn new(backend: Backend, pins: PinMap) -> Self {
        ProbeConfig {
            backend,
            pins,
            max_frequency: DEFAULT_FREQUENCY_HZ,
        }
    }

    /// Validates the pin pairing rules.
    ///
    /// - TDI without TDO is rejected: a half-wired JTAG port cannot shift.
    /// - A SWDIO direction pin without TDO is rejected: direction control
    ///   only exists on boards that wire the full JTAG set.
    /// - A SWCLK direction pin without a SWDIO direction pin is rejected.
    ///
    /// Returns `Ok(())` if the configuration can serve, or the first
    /// violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.tdi.is_some() && self.pins.tdo.is_none() {
            return Err(ConfigError::TdiWithoutTdo);
        }
        if self.pins.swdio_dir.is_some() && self.pins.tdo.is_none() {
            return Err(ConfigError::DirWithoutJtag);
        }
        if self.pins.swclk_dir.is_some() && self.pins.swdio_dir.is_none() {
            return Err(ConfigError::TckDirWithoutTmsDir);
        }
        Ok(())
    }

    /// Sets the maximum wire frequency, clamping to the supported range.
    pub fn set_max_frequency(&mut self, freq: u32) {
        let clamped = freq.clamp(MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ);
        if clamped != freq {
            warn!("requested frequency {freq}Hz clamped to {clamped}Hz");
        }
        self.max_frequency = clamped;
    }

    /// The configured maximum wire frequency in Hz.
    pub fn max_frequency(&self) -> u32 {
        self.max_frequency
    }

    /// The per-half-cycle delay, in microseconds, derived from the maximum
    /// frequency.
    ///
    /// Zero means "fastest achievable": no timed delay, just an ordering
    /// fence per half cycle.  Any request above 500kHz derives to zero
    /// because a half cycle is then under a microsecond.
    pub fn half_cycle_delay_us(&self) -> u32 {
        500_000 / self.max_frequency
    }
}
