// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Manchester decoder for SWO trace.
//!
//! The capture peripheral reports edge durations in fixed clock ticks;
//! the decoder recovers the bit clock from the stream itself.  The first
//! edge after a stop calibrates the half-bit time.  A duration within one
//! tick of the half-bit time is one half bit; within one tick of twice it
//! is two collapsed identical half bits and is expanded to two bit-clock
//! ticks.  Anything else desyncs the decoder, which silently resets and
//! recalibrates on the next edge.
//!
//! A bit is the level of the second half of its cell, and the two halves
//! must differ; two equal half-bit levels are a stop condition.  Bytes
//! assemble LSB first.  The transmitter restarts its framing after every
//! 8 bytes, so one bit is discarded there, as one is after each initial
//! start condition.  Both quirks are load-bearing; they match observed
//! transmitter behaviour rather than any written-down encoding rule.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Bytes staged between drains of the edge ring.
const STAGING_SIZE: usize = 1024;

/// Bytes the transmitter sends before restarting its framing.
const FRAME_BYTES: u8 = 8;

fn is_short(bit_time: u16, duration: u16) -> bool {
    // One tick of slack either way for capture rounding.
    (bit_time as i32 - duration as i32).abs() < 2
}

fn is_long(bit_time: u16, duration: u16) -> bool {
    is_short(bit_time, duration / 2)
}

fn is_end(bit_time: u16, duration: u16) -> bool {
    bit_time != 0 && (duration == 0 || (!is_short(bit_time, duration) && !is_long(bit_time, duration)))
}

/// Streaming Manchester decoder.
///
/// Feed it `(duration, level)` half bits with [`process()`]; collect
/// assembled bytes from [`pending()`] and discard them with
/// [`consume()`].  A full staging buffer drops further bytes until
/// consumed.
///
/// [`process()`]: ManchesterDecoder::process
/// [`pending()`]: ManchesterDecoder::pending
/// [`consume()`]: ManchesterDecoder::consume
pub struct ManchesterDecoder {
    bit_time: u16,
    stopped: bool,
    previous: bool,
    second: bool,
    clock: bool,
    acc: u8,
    offset: u8,
    skip_counter: u8,
    byte_counter: u8,
    staging: [u8; STAGING_SIZE],
    staged: usize,
}

impl ManchesterDecoder {
    pub const fn new() -> Self {
        ManchesterDecoder {
            bit_time: 0,
            stopped: true,
            previous: false,
            second: false,
            clock: false,
            acc: 0,
            offset: 0,
            skip_counter: 0,
            byte_counter: 0,
            staging: [0u8; STAGING_SIZE],
            staged: 0,
        }
    }

    /// Resets the decode state, keeping staged bytes.  The next edge
    /// recalibrates the half-bit time.
    pub fn reset(&mut self) {
        self.stopped = true;
        self.second = false;
        self.previous = false;
        self.clock = false;
        self.acc = 0;
        self.offset = 0;
        self.skip_counter = 0;
        self.byte_counter = 0;
    }

    /// Bytes assembled since the last [`consume()`].
    ///
    /// [`consume()`]: ManchesterDecoder::consume
    pub fn pending(&self) -> &[u8] {
        &self.staging[..self.staged]
    }

    /// Discards the staged bytes.
    pub fn consume(&mut self) {
        self.staged = 0;
    }

    /// Processes one half bit: the line sat at `level` for `duration`
    /// capture ticks.
    pub fn process(&mut self, duration: u16, level: bool) {
        if self.stopped {
            // Calibrate off the first edge and schedule the start bit
            // for discard.
            self.bit_time = duration;
            self.stopped = false;
            self.skip_counter = 1;
            self.previous = level;
            self.second = true;
            return;
        }

        self.clock = !self.clock;
        self.half_bit(level);

        if is_end(self.bit_time, duration) {
            self.reset();
            return;
        }

        if is_long(self.bit_time, duration) {
            // Two collapsed half bits at the same level.
            self.clock = !self.clock;
            self.half_bit(level);
        }
    }

    fn half_bit(&mut self, level: bool) {
        if self.second {
            self.append(level);
            self.second = false;
        } else {
            self.previous = level;
            self.second = true;
        }
    }

    /// Completes a bit cell from the stored first half and `second`.
    fn append(&mut self, second: bool) {
        let first = self.previous;
        if first == second {
            // Stop condition, either polarity.
            self.reset();
            return;
        }
        if self.skip_counter > 0 {
            self.skip_counter -= 1;
            return;
        }
        if second {
            self.acc |= 1 << self.offset;
        }
        self.offset += 1;
        if self.offset >= 8 {
            self.byte_counter += 1;
            if self.staged < STAGING_SIZE {
                self.staging[self.staged] = self.acc;
                self.staged += 1;
            }
            // The transmitter restarts framing here; one bit goes with it.
            if self.byte_counter == FRAME_BYTES {
                self.byte_counter = 0;
                self.skip_counter = 1;
            }
            self.offset = 0;
            self.acc = 0;
        }
    }
}

impl Default for ManchesterDecoder {
    fn default() -> Self {
        ManchesterDecoder::new()
    }
}
