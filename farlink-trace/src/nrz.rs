// Copyright (C) 2025 Farlink Project
//
// MIT License

//! NRZ trace reception: baud detection and the re-detect hysteresis.
//!
//! NRZ SWO is plain asynchronous framing, so reception itself is just a
//! UART at the right rate.  The interesting parts are finding that rate
//! without asking the target, and noticing when it drifts.
//!
//! Detection uses the UART block's edge counters: wait for enough line
//! transitions, then derive the rate from the measured minimum pulse
//! widths.  A target that is silent or mid-reconfiguration produces no
//! edges; detection then times out with a zero sentinel and the caller
//! stays in its retry loop.
//!
//! [`BaudHealth`] decides when a detected rate has gone stale.  Framing
//! errors score three, good reads atone one; crossing the threshold
//! triggers a fresh detection.  Isolated glitches never accumulate
//! enough score to cause a re-detect storm.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use embassy_time::Timer;

/// Baud returned when detection times out.
pub const BAUD_UNDETECTED: u32 = 0;

/// Edge transitions a detection pass waits for.
pub const AUTOBAUD_SAMPLE_EDGES: u32 = 20;

/// Delay between detection polls, in milliseconds.
const AUTOBAUD_POLL_MS: u64 = 10;

/// Error score at which a re-detect fires.
const BAUD_HEALTH_THRESHOLD: u32 = 10;
const FRAMING_ERROR_SCORE: u32 = 3;

/// The autobaud measurement hardware: edge and pulse-width counters on
/// the receive line.
///
/// Measurement and reception share the line, so a detection pass must
/// run with receive interrupts masked: [`restart()`] saves and masks
/// them, [`stop()`] restores them.  An ISR firing mid-measurement would
/// consume edges the counters rely on.
///
/// [`restart()`]: AutobaudPort::restart
/// [`stop()`]: AutobaudPort::stop
pub trait AutobaudPort {
    /// Clears the counters and starts measuring.  Masks the receive
    /// interrupts for the duration of the pass.
    fn restart(&mut self);

    /// Stops measuring and restores the receive interrupt mask saved by
    /// [`restart()`].
    ///
    /// [`restart()`]: AutobaudPort::restart
    fn stop(&mut self);

    /// Line transitions observed since [`restart()`].
    ///
    /// [`restart()`]: AutobaudPort::restart
    fn edge_count(&mut self) -> u32;

    /// Shortest low pulse observed, in reference clock ticks.
    fn low_pulse_ticks(&mut self) -> u32;

    /// Shortest high pulse observed, in reference clock ticks.
    fn high_pulse_ticks(&mut self) -> u32;

    /// The clock the pulse counters tick at, in Hz.
    fn reference_clock_hz(&self) -> u32;
}

/// Derives a baud rate from measured minimum pulse widths.
///
/// The shortest pulse either way is one bit time; averaging the two
/// measurements halves the sampling error, and the +2 rounds the
/// average up by one tick.
pub fn baud_from_pulses(clock_hz: u32, low_ticks: u32, high_ticks: u32) -> u32 {
    let divisor = (low_ticks + high_ticks + 2) / 2;
    if divisor == 0 {
        return BAUD_UNDETECTED;
    }
    clock_hz / divisor
}

/// Measures the line rate.
///
/// Polls until `sample_edges` transitions have been counted, sleeping
/// between polls, bounded by `max_tries`.  Returns the derived baud, or
/// [`BAUD_UNDETECTED`] on timeout.  Measurement is stopped before
/// returning either way.
pub async fn autobaud_detect(port: &mut dyn AutobaudPort, sample_edges: u32, max_tries: u32) -> u32 {
    port.restart();
    debug!("autobaud: waiting for {sample_edges} edges");
    let mut tries = 0;
    while port.edge_count() < sample_edges {
        if tries >= max_tries {
            port.stop();
            debug!("autobaud: no signal after {max_tries} polls");
            return BAUD_UNDETECTED;
        }
        tries += 1;
        Timer::after_millis(AUTOBAUD_POLL_MS).await;
    }
    let low = port.low_pulse_ticks();
    let high = port.high_pulse_ticks();
    port.stop();
    let baud = baud_from_pulses(port.reference_clock_hz(), low, high);
    info!("autobaud: detected {baud} baud (pulses {low}/{high})");
    baud
}

/// Byte reception at a programmed rate, with framing-error reporting.
pub trait NrzUart {
    /// Reads available bytes into `buf`, returning how many.  Waits for
    /// at least one byte.
    async fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Returns and clears the framing errors seen since the last call.
    fn take_framing_errors(&mut self) -> u32;

    /// Reprograms the line rate.
    fn set_baud(&mut self, baud: u32);
}

/// Error-score hysteresis deciding when to re-detect the baud rate.
#[derive(Debug, Default)]
pub struct BaudHealth {
    score: u32,
}

impl BaudHealth {
    pub const fn new() -> Self {
        BaudHealth { score: 0 }
    }

    /// Records one framing error.  Returns `true` when the score
    /// crosses the threshold; the score resets so the next decision
    /// starts clean.
    pub fn framing_error(&mut self) -> bool {
        self.score += FRAMING_ERROR_SCORE;
        if self.score >= BAUD_HEALTH_THRESHOLD {
            warn!("framing error score hit {}, re-detecting baud", self.score);
            self.score = 0;
            true
        } else {
            false
        }
    }

    /// Records one clean read.
    pub fn good_read(&mut self) {
        self.score = self.score.saturating_sub(1);
    }
}
