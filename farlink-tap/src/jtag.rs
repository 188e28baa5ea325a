// Copyright (C) 2025 Farlink Project
//
// MIT License

//! JTAG bit sequence engine.
//!
//! TMS and TDI change while TCK is low and the target samples them on the
//! rising edge; TDO is sampled while TCK is high.  Scan primitives work on
//! byte buffers, LSB first within each byte, and raise TMS only on the
//! final cycle when asked so a scan can exit Shift-DR/Shift-IR in the same
//! pass.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::bits::get_bit;
use crate::bus::TapBus;
use crate::transport::Transport;

/// Soft reset: five TMS-high cycles reach Test-Logic-Reset from any
/// state, plus one spare.
const SOFT_RESET_TMS: u32 = 0x3F;
const SOFT_RESET_CYCLES: usize = 6;

/// The JTAG operation set served by [`Transport::jtag()`].
pub trait JtagOps {
    /// Drives the state machine to Test-Logic-Reset.
    fn reset(&mut self);

    /// One clock cycle with the given TMS and TDI levels.  Returns the
    /// TDO level sampled during the high phase.
    fn next(&mut self, tms: bool, tdi: bool) -> bool;

    /// Clocks out up to 32 TMS states, LSB first, with TDI held high.
    fn tms_seq(&mut self, states: u32, clock_cycles: usize);

    /// Shifts `clock_cycles` bits out of `data_in` while capturing TDO
    /// into `data_out`, TMS low except on the final cycle when
    /// `final_tms` is set.  Buffers are LSB first within each byte and
    /// must each hold at least `clock_cycles` bits.
    fn tdi_tdo_seq(
        &mut self,
        data_out: &mut [u8],
        final_tms: bool,
        data_in: &[u8],
        clock_cycles: usize,
    );

    /// Shifts `clock_cycles` bits out of `data_in`, discarding TDO.
    fn tdi_seq(&mut self, final_tms: bool, data_in: &[u8], clock_cycles: usize);

    /// Clocks `clock_cycles` cycles holding the given TMS and TDI
    /// levels.
    fn cycle(&mut self, tms: bool, tdi: bool, clock_cycles: usize);

    /// Extra idle clock cycles a caller should append after each scan.
    fn idle_cycles(&self) -> usize;
}

impl<B: TapBus> Transport<B> {
    pub(crate) fn next_raw(&mut self, tms: bool, tdi: bool) -> bool {
        self.ensure_drive();
        self.bus.write_tms(tms);
        self.bus.write_tdi(tdi);
        self.bus.set_swclk(true);
        self.half_cycle();
        let tdo = self.bus.read_tdo();
        self.bus.set_swclk(false);
        self.half_cycle();
        tdo
    }

    pub(crate) fn tms_seq_raw(&mut self, states: u32, clock_cycles: usize) {
        self.ensure_drive();
        self.bus.write_tdi(true);
        for i in 0..clock_cycles {
            self.bus.write_tms(states >> i & 1 != 0);
            self.bus.set_swclk(true);
            self.half_cycle();
            self.bus.set_swclk(false);
            self.half_cycle();
        }
    }
}

impl<B: TapBus> JtagOps for Transport<B> {
    fn reset(&mut self) {
        trace!("jtag soft reset");
        self.tms_seq(SOFT_RESET_TMS, SOFT_RESET_CYCLES);
    }

    fn next(&mut self, tms: bool, tdi: bool) -> bool {
        self.paced(|t| t.next_raw(tms, tdi))
    }

    fn tms_seq(&mut self, states: u32, clock_cycles: usize) {
        self.paced(|t| t.tms_seq_raw(states, clock_cycles));
    }

    fn tdi_tdo_seq(
        &mut self,
        data_out: &mut [u8],
        final_tms: bool,
        data_in: &[u8],
        clock_cycles: usize,
    ) {
        self.paced(|t| {
            t.ensure_drive();
            t.bus.write_tms(false);
            t.bus.write_tdi(false);
            let mut value = 0u8;
            for cycle in 0..clock_cycles {
                let bit = cycle & 7;
                let byte = cycle >> 3;
                let last = cycle + 1 == clock_cycles;
                t.bus.write_tms(last && final_tms);
                t.bus.write_tdi(get_bit(data_in, cycle));
                t.bus.set_swclk(true);
                t.half_cycle();
                if t.bus.read_tdo() {
                    value |= 1 << bit;
                }
                if bit == 7 {
                    data_out[byte] = value;
                    value = 0;
                }
                t.bus.set_swclk(false);
                t.half_cycle();
            }
            // Write back a trailing partial byte.
            if clock_cycles & 7 != 0 {
                data_out[(clock_cycles - 1) >> 3] = value;
            }
        });
    }

    fn tdi_seq(&mut self, final_tms: bool, data_in: &[u8], clock_cycles: usize) {
        self.paced(|t| {
            t.ensure_drive();
            t.bus.write_tms(false);
            for cycle in 0..clock_cycles {
                let last = cycle + 1 == clock_cycles;
                t.bus.write_tms(last && final_tms);
                t.bus.write_tdi(get_bit(data_in, cycle));
                t.bus.set_swclk(true);
                t.half_cycle();
                t.bus.set_swclk(false);
                t.half_cycle();
            }
        });
    }

    fn cycle(&mut self, tms: bool, tdi: bool, clock_cycles: usize) {
        if clock_cycles == 0 {
            return;
        }
        self.paced(|t| {
            t.next_raw(tms, tdi);
            for _ in 1..clock_cycles {
                t.bus.set_swclk(true);
                t.half_cycle();
                t.bus.set_swclk(false);
                t.half_cycle();
            }
        });
    }

    fn idle_cycles(&self) -> usize {
        self.idle_cycles
    }
}
