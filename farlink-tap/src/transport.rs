// Copyright (C) 2025 Farlink Project
//
// MIT License

//! The transport: one owned engine over a [`TapBus`] backend.
//!
//! A [`Transport`] holds the backend plus the small amount of state the
//! protocol engines share - the memoized SWDIO direction, the derived
//! half-cycle delay and the idle-cycle count.  The SWD operations are
//! always available through [`Transport::swd()`]; the JTAG operations are
//! only handed out when the backend has the pins, through
//! [`Transport::jtag()`].

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use core::sync::atomic::{Ordering, compiler_fence};

use embassy_time::{Duration, Instant};

use crate::TapError;
use crate::bus::TapBus;
use crate::config::ProbeConfig;
use crate::jtag::JtagOps;
use crate::swd::SwdOps;

/// How often long wire operations yield to the executor.
const PACE_PERIOD_MS: u64 = 500;

/// Number of TMS-high cycles driven to force the JTAG state machine into
/// Test-Logic-Reset from any state, with margin.
const JTAG_ENTRY_RESET_CYCLES: usize = 51;

/// SWD-to-JTAG switch sequence, shifted LSB first.
const JTAG_ENTRY_SEQUENCE: u32 = 0xE73C;

/// Which protocol the shared lines currently speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapMode {
    Swd,
    Jtag,
}

/// Memoized direction of the shared SWDIO/TMS line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwdioDir {
    /// Target drives, probe samples.
    Float,
    /// Probe drives.
    Drive,
}

/// One owned protocol engine over a hardware backend.
pub struct Transport<B: TapBus> {
    pub(crate) bus: B,
    pub(crate) swdio_dir: SwdioDir,
    pub(crate) delay_us: u32,
    pub(crate) idle_cycles: usize,
    mode: TapMode,
}

impl<B: TapBus> Transport<B> {
    /// Builds a transport over `bus`, validated against `config`.
    ///
    /// The backend constructor parks SWDIO floating, which is what the
    /// direction memo starts at.
    pub fn new(bus: B, config: &ProbeConfig) -> Result<Self, TapError> {
        config.validate()?;
        let delay_us = config.half_cycle_delay_us();
        debug!(
            "transport up: {}Hz max, {delay_us}us half cycle, jtag {}",
            config.max_frequency(),
            bus.has_jtag()
        );
        Ok(Transport {
            bus,
            swdio_dir: SwdioDir::Float,
            delay_us,
            idle_cycles: 0,
            mode: TapMode::Swd,
        })
    }

    /// The SWD operation set.  Always available.
    pub fn swd(&mut self) -> &mut dyn SwdOps {
        self
    }

    /// The JTAG operation set, or `None` when TDI/TDO are not wired.
    pub fn jtag(&mut self) -> Option<&mut dyn JtagOps> {
        if self.bus.has_jtag() {
            Some(self)
        } else {
            None
        }
    }

    /// The currently selected wire protocol.
    pub fn mode(&self) -> TapMode {
        self.mode
    }

    /// Sets the extra idle clock cycles appended to JTAG scans.
    pub fn set_idle_cycles(&mut self, cycles: usize) {
        self.idle_cycles = cycles;
    }

    /// Updates the half-cycle delay from a changed configuration.
    pub fn set_frequency(&mut self, config: &ProbeConfig) {
        self.delay_us = config.half_cycle_delay_us();
        debug!("half cycle delay now {}us", self.delay_us);
    }

    /// Switches the shared lines to JTAG: drives the state machine to
    /// Test-Logic-Reset from any state, then shifts the SWD-to-JTAG
    /// switch sequence.
    ///
    /// Fails with [`TapError::JtagUnavailable`] when TDI/TDO are not
    /// wired.
    pub fn enter_jtag(&mut self) -> Result<(), TapError> {
        if !self.bus.has_jtag() {
            return Err(TapError::JtagUnavailable);
        }
        info!("switching to jtag");
        self.paced(|t| {
            t.ensure_drive();
            for _ in 0..JTAG_ENTRY_RESET_CYCLES {
                t.next_raw(true, false);
            }
            t.tms_seq_raw(JTAG_ENTRY_SEQUENCE, 16);
        });
        self.mode = TapMode::Jtag;
        Ok(())
    }

    /// Marks the shared lines as back in SWD mode.  The SWD line reset
    /// itself is the caller's business.
    pub fn enter_swd(&mut self) {
        info!("switching to swd");
        self.mode = TapMode::Swd;
    }

    /// Releases the backend.
    pub fn into_bus(self) -> B {
        self.bus
    }

    /// One half-cycle pause.  At zero delay this is just a compiler
    /// fence so the pin writes cannot be reordered or merged; otherwise
    /// a busy wait for the derived duration.
    #[inline]
    pub(crate) fn half_cycle(&self) {
        if self.delay_us == 0 {
            compiler_fence(Ordering::SeqCst);
        } else {
            embassy_time::block_for(Duration::from_micros(self.delay_us as u64));
        }
    }

    /// Runs `f` inside a critical section when there is no timed delay,
    /// so an interrupt cannot stretch a clock phase mid-word.  Timed
    /// sequences run unmasked.
    #[inline]
    pub(crate) fn paced<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.delay_us == 0 {
            critical_section::with(|_| f(self))
        } else {
            f(self)
        }
    }

    /// Ensures the probe drives SWDIO, turning the bus around if the
    /// target had it.
    pub(crate) fn ensure_drive(&mut self) {
        if self.swdio_dir == SwdioDir::Float {
            self.turnaround(SwdioDir::Drive);
        }
    }

    /// Turns the shared SWDIO line around if it is not already pointing
    /// the requested way.  A turnaround costs one clock cycle during
    /// which neither side drives the line.
    pub(crate) fn turnaround(&mut self, dir: SwdioDir) {
        if dir == self.swdio_dir {
            return;
        }
        trace!("turnaround to {dir:?}");
        if dir == SwdioDir::Float {
            self.bus.swdio_float();
        }
        self.half_cycle();
        self.bus.set_swclk(true);
        self.half_cycle();
        self.bus.set_swclk(false);
        if dir == SwdioDir::Drive {
            self.bus.swdio_drive();
        }
        self.swdio_dir = dir;
    }
}

/// Cooperative pacing for long-running wire work.
///
/// The protocol engines are synchronous and can monopolise the core for
/// as long as a caller keeps streaming.  Callers driving bulk transfers
/// hold a `Pacer` and call [`Pacer::pace()`] between operations; it
/// yields to the executor at most once per period, well inside a
/// typical task watchdog timeout.
pub struct Pacer {
    last: Instant,
    period: Duration,
}

impl Pacer {
    pub fn new() -> Self {
        Pacer {
            last: Instant::now(),
            period: Duration::from_millis(PACE_PERIOD_MS),
        }
    }

    /// Yields to the executor if a full period has elapsed since the
    /// last yield.
    pub async fn pace(&mut self) {
        let now = Instant::now();
        if now - self.last >= self.period {
            self.last = now;
            embassy_futures::yield_now().await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Pacer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Backend, PinMap};
    use crate::test_bus::{BusEvent, MockBus};

    fn swd_config() -> ProbeConfig {
        ProbeConfig::new(Backend::BitBang, PinMap::swd_only(0, 1))
    }

    #[test]
    fn jtag_gated_on_wiring() {
        let mut transport = Transport::new(MockBus::new(false), &swd_config()).unwrap();
        assert!(transport.jtag().is_none());
        assert_eq!(transport.enter_jtag(), Err(TapError::JtagUnavailable));

        let mut transport = Transport::new(MockBus::new(true), &swd_config()).unwrap();
        assert!(transport.jtag().is_some());
    }

    #[test]
    fn invalid_pins_rejected() {
        let mut pins = PinMap::swd_only(0, 1);
        pins.tdi = Some(3);
        let config = ProbeConfig::new(Backend::BitBang, pins);
        assert!(Transport::new(MockBus::new(false), &config).is_err());
    }

    #[test]
    fn turnaround_only_on_change() {
        let mut transport = Transport::new(MockBus::new(false), &swd_config()).unwrap();

        transport.turnaround(SwdioDir::Float);
        assert!(transport.bus.events().is_empty());

        transport.turnaround(SwdioDir::Drive);
        assert_eq!(
            transport.bus.take_events(),
            &[
                BusEvent::Clk(true),
                BusEvent::Clk(false),
                BusEvent::Drive,
            ]
        );

        transport.turnaround(SwdioDir::Drive);
        assert!(transport.bus.events().is_empty());

        transport.turnaround(SwdioDir::Float);
        assert_eq!(
            transport.bus.take_events(),
            &[BusEvent::Float, BusEvent::Clk(true), BusEvent::Clk(false)]
        );
    }

    #[test]
    fn pacer_completes_inside_period() {
        // Inside the period pace() must return without suspending, so
        // bulk transfer loops pay nothing between yields.
        let mut pacer = Pacer::new();
        embassy_futures::block_on(pacer.pace());
        embassy_futures::block_on(pacer.pace());
    }

    #[test]
    fn jtag_entry_sequence() {
        let mut transport = Transport::new(MockBus::new(true), &swd_config()).unwrap();
        transport.enter_jtag().unwrap();
        assert_eq!(transport.mode(), TapMode::Jtag);

        let tms: Vec<bool> = transport.bus.tms_writes().to_vec();
        // 51 reset cycles then 0xE73C LSB first.
        assert_eq!(tms.len(), 51 + 16);
        assert!(tms[..51].iter().all(|&b| b));
        let mut switch = 0u32;
        for (i, &b) in tms[51..].iter().enumerate() {
            if b {
                switch |= 1 << i;
            }
        }
        assert_eq!(switch, 0xE73C);
    }
}
