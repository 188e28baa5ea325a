// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Line-level bus abstraction and the per-pin bit-bang backend.
//!
//! [`TapBus`] is the contract the SWD and JTAG engines drive: direction
//! control on SWDIO/TMS, level writes, level reads, and a clock line.  It
//! has two implementations - [`BitBangBus`] here, touching one pin per
//! operation, and [`crate::bundle::BundleBus`], issuing a single packed
//! multi-line access per operation.  The engines are identical over both.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// A single GPIO line as the bit-bang backend sees it.
///
/// Implementations exist for `esp_hal::gpio::Flex` behind the `esp32c3`
/// feature, and for test mocks on the host.
pub trait TapPin {
    /// Drive the line from the probe side.
    fn set_as_output(&mut self);

    /// Release the line for the target to drive.
    fn set_as_input(&mut self);

    /// Set the output level.  Only meaningful while driven.
    fn set(&mut self, high: bool);

    /// Sample the line level.
    fn is_high(&mut self) -> bool;
}

/// What the protocol engines need from a hardware backend.
///
/// SWDIO and TMS share a physical line, so `write_tms` writes the same
/// line as `write_swdio`; the split exists so a backend may route them
/// differently if its hardware does.
pub trait TapBus {
    /// Stop driving SWDIO/TMS so the target can drive it.
    fn swdio_float(&mut self);

    /// Take SWDIO/TMS back under probe control.
    fn swdio_drive(&mut self);

    /// Set the SWDIO level.  Only meaningful while driven.
    fn write_swdio(&mut self, high: bool);

    /// Sample SWDIO.  Only meaningful while floating.
    fn read_swdio(&mut self) -> bool;

    /// Set the SWCLK/TCK level.
    fn set_swclk(&mut self, high: bool);

    /// Set the TMS level.
    fn write_tms(&mut self, high: bool);

    /// Set the TDI level.  No-op without JTAG wiring.
    fn write_tdi(&mut self, high: bool);

    /// Sample TDO.  Reads low without JTAG wiring.
    fn read_tdo(&mut self) -> bool;

    /// Whether TDI and TDO are both wired.
    fn has_jtag(&self) -> bool;
}

/// Bit-bang backend: one GPIO operation per line per half cycle.
///
/// The direction pins, when present, control external level shifters:
/// driven high the shifter points at the probe (line floats from the
/// target's view), driven low it points at the target.
pub struct BitBangBus<P: TapPin> {
    swdio: P,
    swclk: P,
    tdi: Option<P>,
    tdo: Option<P>,
    swdio_dir: Option<P>,
    swclk_dir: Option<P>,
}

impl<P: TapPin> BitBangBus<P> {
    /// Builds the backend and parks every line in a known state: clock
    /// low and driven, SWDIO floating.
    pub fn new(
        mut swdio: P,
        mut swclk: P,
        tdi: Option<P>,
        tdo: Option<P>,
        swdio_dir: Option<P>,
        swclk_dir: Option<P>,
    ) -> Self {
        swclk.set(false);
        swclk.set_as_output();
        swdio.set_as_input();
        let mut bus = BitBangBus {
            swdio,
            swclk,
            tdi,
            tdo,
            swdio_dir,
            swclk_dir,
        };
        if let Some(tdi) = bus.tdi.as_mut() {
            tdi.set(false);
            tdi.set_as_output();
        }
        if let Some(tdo) = bus.tdo.as_mut() {
            tdo.set_as_input();
        }
        if let Some(dir) = bus.swclk_dir.as_mut() {
            dir.set(false);
            dir.set_as_output();
        }
        if let Some(dir) = bus.swdio_dir.as_mut() {
            dir.set(true);
            dir.set_as_output();
        }
        bus
    }
}

impl<P: TapPin> TapBus for BitBangBus<P> {
    fn swdio_float(&mut self) {
        self.swdio.set_as_input();
        if let Some(dir) = self.swdio_dir.as_mut() {
            dir.set(true);
        }
    }

    fn swdio_drive(&mut self) {
        if let Some(dir) = self.swdio_dir.as_mut() {
            dir.set(false);
        }
        self.swdio.set_as_output();
    }

    fn write_swdio(&mut self, high: bool) {
        self.swdio.set(high);
    }

    fn read_swdio(&mut self) -> bool {
        self.swdio.is_high()
    }

    fn set_swclk(&mut self, high: bool) {
        self.swclk.set(high);
    }

    fn write_tms(&mut self, high: bool) {
        self.swdio.set(high);
    }

    fn write_tdi(&mut self, high: bool) {
        if let Some(tdi) = self.tdi.as_mut() {
            tdi.set(high);
        }
    }

    fn read_tdo(&mut self) -> bool {
        match self.tdo.as_mut() {
            Some(tdo) => tdo.is_high(),
            None => false,
        }
    }

    fn has_jtag(&self) -> bool {
        self.tdi.is_some() && self.tdo.is_some()
    }
}
