// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Packed multi-line backend.
//!
//! Some GPIO blocks can read or write a small bundle of pins in a single
//! register access.  [`BundleBus`] maps the tap lines onto fixed indices
//! within such a bundle and implements [`TapBus`] with one packed access
//! per operation instead of one access per pin.
//!
//! The indices are fixed by construction: SWDIO/TMS must sit at bit 0 so
//! a level sample is `read_in() & 1` with no shifting on the hot path.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::bus::TapBus;

/// Bundle bit index of SWDIO/TMS.  Must be 0.
pub const LINE_SWDIO: u8 = 0;
/// Bundle bit index of SWCLK/TCK.
pub const LINE_SWCLK: u8 = 1;
/// Bundle bit index of TDO.
pub const LINE_TDO: u8 = 2;
/// Bundle bit index of TDI.
pub const LINE_TDI: u8 = 3;
/// Bundle bit index of the SWDIO direction control.
pub const LINE_SWDIO_DIR: u8 = 4;
/// Bundle bit index of the SWCLK direction control.
pub const LINE_SWCLK_DIR: u8 = 5;

const MASK_SWDIO: u8 = 1 << LINE_SWDIO;
const MASK_SWCLK: u8 = 1 << LINE_SWCLK;
const MASK_TDO: u8 = 1 << LINE_TDO;
const MASK_TDI: u8 = 1 << LINE_TDI;
const MASK_SWDIO_DIR: u8 = 1 << LINE_SWDIO_DIR;

/// A hardware pin bundle: up to 8 lines accessed as one word.
///
/// Implementations exist for the ESP32-C3 dedicated-GPIO block behind the
/// `esp32c3` feature, and for test mocks on the host.
pub trait BundlePort {
    /// Writes `bits` to the lines selected by `mask`, leaving the rest
    /// unchanged.
    fn write_mask(&mut self, mask: u8, bits: u8);

    /// Samples all input lines at once.
    fn read_in(&mut self) -> u8;

    /// Enables output drivers on the lines selected by `mask`, disables
    /// them on the rest of the tap lines.
    fn enable_output(&mut self, mask: u8);
}

/// Packed backend over a [`BundlePort`].
///
/// `output_mask` tracks which lines are currently driven so direction
/// flips on SWDIO preserve the other lines' drivers.
pub struct BundleBus<P: BundlePort> {
    port: P,
    output_mask: u8,
    has_jtag: bool,
    has_dir: bool,
}

impl<P: BundlePort> BundleBus<P> {
    /// Builds the backend and parks the lines: clock low and driven,
    /// SWDIO floating, TDI driven low when wired.
    pub fn new(mut port: P, has_jtag: bool, has_dir: bool) -> Self {
        let mut output_mask = MASK_SWCLK;
        if has_jtag {
            output_mask |= MASK_TDI;
        }
        if has_dir {
            // Direction drivers are always on; high points the shifter at
            // the probe so SWDIO floats from the target's view.
            output_mask |= MASK_SWDIO_DIR | (1 << LINE_SWCLK_DIR);
        }
        port.enable_output(output_mask);
        port.write_mask(MASK_SWCLK | MASK_TDI, 0);
        if has_dir {
            port.write_mask(MASK_SWDIO_DIR, MASK_SWDIO_DIR);
            port.write_mask(1 << LINE_SWCLK_DIR, 0);
        }
        BundleBus {
            port,
            output_mask,
            has_jtag,
            has_dir,
        }
    }
}

impl<P: BundlePort> TapBus for BundleBus<P> {
    fn swdio_float(&mut self) {
        self.output_mask &= !MASK_SWDIO;
        self.port.enable_output(self.output_mask);
        if self.has_dir {
            self.port.write_mask(MASK_SWDIO_DIR, MASK_SWDIO_DIR);
        }
    }

    fn swdio_drive(&mut self) {
        if self.has_dir {
            self.port.write_mask(MASK_SWDIO_DIR, 0);
        }
        self.output_mask |= MASK_SWDIO;
        self.port.enable_output(self.output_mask);
    }

    fn write_swdio(&mut self, high: bool) {
        self.port
            .write_mask(MASK_SWDIO, if high { MASK_SWDIO } else { 0 });
    }

    fn read_swdio(&mut self) -> bool {
        // SWDIO sits at bit 0 so no shift is needed here.
        self.port.read_in() & MASK_SWDIO != 0
    }

    fn set_swclk(&mut self, high: bool) {
        self.port
            .write_mask(MASK_SWCLK, if high { MASK_SWCLK } else { 0 });
    }

    fn write_tms(&mut self, high: bool) {
        self.write_swdio(high);
    }

    fn write_tdi(&mut self, high: bool) {
        if self.has_jtag {
            self.port.write_mask(MASK_TDI, if high { MASK_TDI } else { 0 });
        }
    }

    fn read_tdo(&mut self) -> bool {
        if self.has_jtag {
            self.port.read_in() & MASK_TDO != 0
        } else {
            false
        }
    }

    fn has_jtag(&self) -> bool {
        self.has_jtag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat register model of a bundle: output enables plus levels.
    struct FlatPort {
        out_enable: u8,
        levels: u8,
        input: u8,
    }

    impl FlatPort {
        fn new() -> Self {
            FlatPort {
                out_enable: 0,
                levels: 0,
                input: 0,
            }
        }
    }

    impl BundlePort for FlatPort {
        fn write_mask(&mut self, mask: u8, bits: u8) {
            self.levels = (self.levels & !mask) | (bits & mask);
        }

        fn read_in(&mut self) -> u8 {
            self.input
        }

        fn enable_output(&mut self, mask: u8) {
            self.out_enable = mask;
        }
    }

    #[test]
    fn park_state() {
        let bus = BundleBus::new(FlatPort::new(), true, true);
        // SWDIO floats, everything else drives.
        assert_eq!(bus.port.out_enable & MASK_SWDIO, 0);
        assert_ne!(bus.port.out_enable & MASK_SWCLK, 0);
        assert_ne!(bus.port.out_enable & MASK_TDI, 0);
        // Shifter points at the probe while floating.
        assert_ne!(bus.port.levels & MASK_SWDIO_DIR, 0);
        assert_eq!(bus.port.levels & MASK_SWCLK, 0);
    }

    #[test]
    fn direction_flips_preserve_other_drivers() {
        let mut bus = BundleBus::new(FlatPort::new(), true, true);

        bus.swdio_drive();
        assert_ne!(bus.port.out_enable & MASK_SWDIO, 0);
        assert_ne!(bus.port.out_enable & MASK_SWCLK, 0);
        assert_eq!(bus.port.levels & MASK_SWDIO_DIR, 0);

        bus.swdio_float();
        assert_eq!(bus.port.out_enable & MASK_SWDIO, 0);
        assert_ne!(bus.port.out_enable & MASK_TDI, 0);
        assert_ne!(bus.port.levels & MASK_SWDIO_DIR, 0);
    }

    #[test]
    fn swdio_sample_is_bit_zero() {
        let mut bus = BundleBus::new(FlatPort::new(), false, false);
        bus.port.input = MASK_SWDIO | MASK_TDO;
        assert!(bus.read_swdio());
        // No JTAG wiring means TDO always reads low.
        assert!(!bus.read_tdo());

        bus.port.input = MASK_TDO;
        assert!(!bus.read_swdio());
    }

    #[test]
    fn tdo_needs_jtag() {
        let mut bus = BundleBus::new(FlatPort::new(), true, false);
        bus.port.input = MASK_TDO;
        assert!(bus.read_tdo());
        bus.port.input = 0;
        assert!(!bus.read_tdo());
    }
}
