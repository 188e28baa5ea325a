// Copyright (C) 2025 Farlink Project
//
// MIT License

//! SWD bit sequence engine.
//!
//! Four primitives, all LSB first with data changing on the falling clock
//! edge and sampled before the rising edge.  Bus turnarounds are memoized
//! in the transport: a sequence in the same direction as the previous one
//! pays no turnaround cycle.
//!
//! At zero half-cycle delay each sequence runs inside a critical section
//! so an interrupt cannot stretch a clock phase mid-word.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::TapError;
use crate::bits::odd_parity;
use crate::bus::TapBus;
use crate::transport::{SwdioDir, Transport};

/// The SWD operation set served by [`Transport::swd()`].
///
/// `clock_cycles` is at most 32 for all operations.
pub trait SwdOps {
    /// Clocks in up to 32 bits, LSB first.  Zero cycles reads nothing
    /// and returns 0.
    fn seq_in(&mut self, clock_cycles: usize) -> u32;

    /// Clocks in up to 32 bits followed by a parity bit, then turns the
    /// bus around to drive.  Fails with [`TapError::Parity`] when the
    /// sampled parity disagrees with the data.
    fn seq_in_parity(&mut self, clock_cycles: usize) -> Result<u32, TapError>;

    /// Clocks out up to 32 bits, LSB first.
    fn seq_out(&mut self, value: u32, clock_cycles: usize);

    /// Clocks out up to 32 bits followed by an odd parity bit.
    fn seq_out_parity(&mut self, value: u32, clock_cycles: usize);
}

impl<B: TapBus> Transport<B> {
    fn seq_in_raw(&mut self, clock_cycles: usize) -> u32 {
        self.turnaround(SwdioDir::Float);
        let mut value = 0u32;
        for i in 0..clock_cycles {
            self.half_cycle();
            if self.bus.read_swdio() {
                value |= 1 << i;
            }
            self.bus.set_swclk(true);
            self.half_cycle();
            self.bus.set_swclk(false);
        }
        value
    }

    fn seq_in_parity_raw(&mut self, clock_cycles: usize) -> Result<u32, TapError> {
        let value = self.seq_in_raw(clock_cycles);
        self.half_cycle();
        let parity = self.bus.read_swdio();
        self.bus.set_swclk(true);
        self.half_cycle();
        self.bus.set_swclk(false);
        self.turnaround(SwdioDir::Drive);
        if parity == odd_parity(value) {
            Ok(value)
        } else {
            warn!("parity mismatch on {clock_cycles} bit read");
            Err(TapError::Parity)
        }
    }

    fn seq_out_raw(&mut self, value: u32, clock_cycles: usize) {
        self.turnaround(SwdioDir::Drive);
        for i in 0..clock_cycles {
            self.bus.write_swdio(value >> i & 1 != 0);
            self.half_cycle();
            self.bus.set_swclk(true);
            self.half_cycle();
            self.bus.set_swclk(false);
        }
    }

    fn seq_out_parity_raw(&mut self, value: u32, clock_cycles: usize) {
        self.seq_out_raw(value, clock_cycles);
        self.bus.write_swdio(odd_parity(value));
        self.half_cycle();
        self.bus.set_swclk(true);
        self.half_cycle();
        self.bus.set_swclk(false);
    }
}

impl<B: TapBus> SwdOps for Transport<B> {
    fn seq_in(&mut self, clock_cycles: usize) -> u32 {
        self.paced(|t| t.seq_in_raw(clock_cycles))
    }

    fn seq_in_parity(&mut self, clock_cycles: usize) -> Result<u32, TapError> {
        self.paced(|t| t.seq_in_parity_raw(clock_cycles))
    }

    fn seq_out(&mut self, value: u32, clock_cycles: usize) {
        self.paced(|t| t.seq_out_raw(value, clock_cycles));
    }

    fn seq_out_parity(&mut self, value: u32, clock_cycles: usize) {
        self.paced(|t| t.seq_out_parity_raw(value, clock_cycles));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, PinMap, ProbeConfig};
    use crate::test_bus::{BusEvent, MockBus};

    fn transport() -> Transport<MockBus> {
        let config = ProbeConfig::new(Backend::BitBang, PinMap::swd_only(0, 1));
        Transport::new(MockBus::new(false), &config).unwrap()
    }

    #[test]
    fn seq_out_is_lsb_first() {
        let mut t = transport();
        t.seq_out(0b1011_0010_1100_0101, 16);
        let written = t.bus.swdio_writes();
        assert_eq!(written.len(), 16);
        for (i, &bit) in written.iter().enumerate() {
            assert_eq!(bit, 0b1011_0010_1100_0101u32 >> i & 1 != 0, "bit {i}");
        }
    }

    #[test]
    fn seq_in_reassembles_scripted_bits() {
        for cycles in 1usize..=32 {
            let mut t = transport();
            let value = 0xA5C3_96F1u32 & ((1u64 << cycles) - 1) as u32;
            t.bus.script_reads(value as u64, cycles);
            assert_eq!(t.seq_in(cycles), value, "{cycles} cycles");
        }
    }

    #[test]
    fn seq_in_zero_cycles() {
        let mut t = transport();
        assert_eq!(t.seq_in(0), 0);
    }

    #[test]
    fn parity_round_trip() {
        for value in [0u32, 1, 0xA5A5_A5A5, 0xFFFF_FFFF, 0x8000_0001] {
            let mut t = transport();
            t.seq_out_parity(value, 32);
            let written = t.bus.swdio_writes();
            assert_eq!(written.len(), 33);
            assert_eq!(written[32], odd_parity(value), "parity of {value:#x}");

            let mut t = transport();
            t.bus.script_reads(value as u64, 32);
            t.bus.script_read_bit(odd_parity(value));
            assert_eq!(t.seq_in_parity(32), Ok(value));
        }
    }

    #[test]
    fn bad_parity_detected() {
        let mut t = transport();
        t.bus.script_reads(0x1234_5678, 32);
        t.bus.script_read_bit(!odd_parity(0x1234_5678u32));
        assert_eq!(t.seq_in_parity(32), Err(TapError::Parity));
    }

    #[test]
    fn turnaround_memoized_across_sequences() {
        let mut t = transport();
        // Transport starts floating, so the first out pays a turnaround.
        t.seq_out(0xF, 4);
        let events = t.bus.take_events();
        assert_eq!(events.iter().filter(|e| **e == BusEvent::Drive).count(), 1);

        // Same direction again, no turnaround.
        t.seq_out(0x0, 4);
        let events = t.bus.take_events();
        assert!(!events.contains(&BusEvent::Drive));
        assert!(!events.contains(&BusEvent::Float));

        // Direction change pays exactly one.
        t.bus.script_reads(0, 4);
        t.seq_in(4);
        let events = t.bus.take_events();
        assert_eq!(events.iter().filter(|e| **e == BusEvent::Float).count(), 1);
    }
}
