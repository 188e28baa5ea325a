// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Recording [`TapBus`] mock shared by the engine unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use crate::bus::TapBus;

/// One observable bus action, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BusEvent {
    Float,
    Drive,
    Clk(bool),
    Swdio(bool),
    Tms(bool),
    Tdi(bool),
}

/// Scriptable bus: records every action, serves scripted SWDIO reads,
/// and optionally loops TDI back to TDO with a one-cycle register.
pub(crate) struct MockBus {
    has_jtag: bool,
    events: Vec<BusEvent>,
    read_bits: VecDeque<bool>,
    tdi_level: bool,
}

impl MockBus {
    pub(crate) fn new(has_jtag: bool) -> Self {
        MockBus {
            has_jtag,
            events: Vec::new(),
            read_bits: VecDeque::new(),
            tdi_level: false,
        }
    }

    /// Queues the SWDIO levels the next reads will see, LSB first.
    pub(crate) fn script_reads(&mut self, value: u64, bits: usize) {
        for i in 0..bits {
            self.read_bits.push_back(value >> i & 1 != 0);
        }
    }

    pub(crate) fn script_read_bit(&mut self, bit: bool) {
        self.read_bits.push_back(bit);
    }

    pub(crate) fn events(&self) -> &[BusEvent] {
        &self.events
    }

    pub(crate) fn take_events(&mut self) -> Vec<BusEvent> {
        core::mem::take(&mut self.events)
    }

    /// The SWDIO levels written, in order.
    pub(crate) fn swdio_writes(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Swdio(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// The TMS levels written, in order.
    pub(crate) fn tms_writes(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Tms(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    /// The TDI levels written, in order.
    pub(crate) fn tdi_writes(&self) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Tdi(b) => Some(*b),
                _ => None,
            })
            .collect()
    }
}

impl TapBus for MockBus {
    fn swdio_float(&mut self) {
        self.events.push(BusEvent::Float);
    }

    fn swdio_drive(&mut self) {
        self.events.push(BusEvent::Drive);
    }

    fn write_swdio(&mut self, high: bool) {
        self.events.push(BusEvent::Swdio(high));
    }

    fn read_swdio(&mut self) -> bool {
        self.read_bits.pop_front().unwrap_or(false)
    }

    fn set_swclk(&mut self, high: bool) {
        self.events.push(BusEvent::Clk(high));
    }

    fn write_tms(&mut self, high: bool) {
        self.events.push(BusEvent::Tms(high));
    }

    fn write_tdi(&mut self, high: bool) {
        self.events.push(BusEvent::Tdi(high));
        self.tdi_level = high;
    }

    fn read_tdo(&mut self) -> bool {
        // Wired loopback: TDO follows the last TDI level.
        self.tdi_level
    }

    fn has_jtag(&self) -> bool {
        self.has_jtag
    }
}
