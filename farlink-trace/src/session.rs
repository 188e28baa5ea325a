// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Trace sessions: the long-running decode tasks.
//!
//! One session runs per active trace capture.  It owns the decoder state,
//! reacts to commands arriving over a channel and pushes decoded bytes to
//! the sink, optionally through the ITM demux.  State the receive loop
//! reads is never mutated from outside; baud changes and teardown travel
//! as [`TraceCommand`]s and take effect at the loop's next wake.
//!
//! Teardown is cooperative.  A [`TraceCommand::Stop`] is observed at the
//! next wake; the session drains what it has, resets its decoder and
//! returns, at which point the caller can release the hardware.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::itm::ItmDemux;
use crate::manchester::ManchesterDecoder;
use crate::nrz::{AUTOBAUD_SAMPLE_EDGES, AutobaudPort, BAUD_UNDETECTED, BaudHealth, NrzUart, autobaud_detect};
use crate::ring::EdgeConsumer;

/// Commands queued to a running session.
const COMMAND_QUEUE_DEPTH: usize = 4;

/// Polls allowed for the first detection pass after session start.
const AUTOBAUD_INITIAL_TRIES: u32 = 10;

/// Polls allowed for detection passes triggered while running.
const AUTOBAUD_RETRY_TRIES: u32 = 50;

/// Wherever decoded trace bytes end up.  The broadcaster behind this is
/// external; raw NRZ passthrough and ITM-filtered payloads arrive
/// through the same call.
pub trait TraceSink {
    fn post(&mut self, bytes: &[u8]);
}

/// Control messages for a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCommand {
    /// Reprogram the NRZ line rate.  Zero requests a fresh detection
    /// instead.
    SetBaud(u32),

    /// Force a fresh baud detection.
    Redetect,

    /// Tear the session down.
    Stop,
}

/// The channel a session takes commands over.
pub type CommandChannel = Channel<CriticalSectionRawMutex, TraceCommand, COMMAND_QUEUE_DEPTH>;

/// The signal the edge-capture interrupt wakes the decode task with.
pub type WakeSignal = Signal<CriticalSectionRawMutex, ()>;

/// Manchester decode task state.
///
/// The capture interrupt pushes edge pairs into the ring and raises the
/// wake signal; [`run()`] drains and decodes on each wake.
///
/// [`run()`]: ManchesterSession::run
pub struct ManchesterSession<'a, const N: usize> {
    edges: EdgeConsumer<'a, N>,
    decoder: ManchesterDecoder,
    demux: Option<ItmDemux>,
    wake: &'a WakeSignal,
    commands: &'a CommandChannel,
}

impl<'a, const N: usize> ManchesterSession<'a, N> {
    /// Builds a session.  A nonzero `itm_mask` engages ITM filtering;
    /// zero passes raw decoded bytes through.
    pub fn new(
        edges: EdgeConsumer<'a, N>,
        itm_mask: u32,
        wake: &'a WakeSignal,
        commands: &'a CommandChannel,
    ) -> Self {
        let demux = if itm_mask != 0 {
            Some(ItmDemux::new(itm_mask))
        } else {
            None
        };
        ManchesterSession {
            edges,
            decoder: ManchesterDecoder::new(),
            demux,
            wake,
            commands,
        }
    }

    /// Runs until a [`TraceCommand::Stop`] arrives.
    pub async fn run(&mut self, sink: &mut dyn TraceSink) {
        info!("manchester session up, itm {}", self.demux.is_some());
        loop {
            match select(self.wake.wait(), self.commands.receive()).await {
                Either::First(()) => self.drain(sink),
                Either::Second(TraceCommand::Stop) => break,
                Either::Second(cmd) => {
                    // Rate is recovered from the stream; baud commands
                    // have nothing to configure here.
                    debug!("ignoring {cmd:?} on manchester session");
                }
            }
        }
        self.drain(sink);
        self.decoder.reset();
        info!("manchester session down");
    }

    fn drain(&mut self, sink: &mut dyn TraceSink) {
        while let Some(pair) = self.edges.pop() {
            self.decoder.process(pair.low, false);
            self.decoder.process(pair.high, true);
        }
        let dropped = self.edges.take_dropped();
        if dropped > 0 {
            warn!("{dropped} edge samples lost to ring overflow");
        }
        let bytes = self.decoder.pending();
        if !bytes.is_empty() {
            match self.demux.as_mut() {
                Some(demux) => demux.feed(bytes, sink),
                None => sink.post(bytes),
            }
            self.decoder.consume();
        }
    }
}

/// NRZ decode task state.
///
/// Bytes arrive framed on a UART; the session keeps the UART programmed
/// at a working rate, re-detecting when the framing-error score says the
/// rate has gone stale.
pub struct NrzSession<'a, U: NrzUart, A: AutobaudPort> {
    uart: U,
    autobaud: A,
    baud: u32,
    health: BaudHealth,
    demux: Option<ItmDemux>,
    commands: &'a CommandChannel,
}

impl<'a, U: NrzUart, A: AutobaudPort> NrzSession<'a, U, A> {
    /// Builds a session.  A `baud` of [`BAUD_UNDETECTED`] defers to
    /// detection at startup; a nonzero `itm_mask` engages ITM filtering.
    pub fn new(uart: U, autobaud: A, baud: u32, itm_mask: u32, commands: &'a CommandChannel) -> Self {
        let demux = if itm_mask != 0 {
            Some(ItmDemux::new(itm_mask))
        } else {
            None
        };
        NrzSession {
            uart,
            autobaud,
            baud,
            health: BaudHealth::new(),
            demux,
            commands,
        }
    }

    /// Runs until a [`TraceCommand::Stop`] arrives.
    pub async fn run(&mut self, sink: &mut dyn TraceSink) {
        if self.baud == BAUD_UNDETECTED {
            self.redetect(AUTOBAUD_INITIAL_TRIES).await;
        } else {
            self.uart.set_baud(self.baud);
        }
        info!("nrz session up at {} baud", self.baud);

        let mut buf = [0u8; 256];
        loop {
            match select(self.commands.receive(), self.uart.read(&mut buf)).await {
                Either::First(TraceCommand::Stop) => break,
                Either::First(TraceCommand::SetBaud(baud)) if baud != BAUD_UNDETECTED => {
                    info!("baud set to {baud}");
                    self.baud = baud;
                    self.uart.set_baud(baud);
                }
                Either::First(_) => self.redetect(AUTOBAUD_RETRY_TRIES).await,
                Either::Second(count) => {
                    let errors = self.uart.take_framing_errors();
                    if errors == 0 {
                        self.health.good_read();
                    } else {
                        let mut redetect = false;
                        for _ in 0..errors {
                            redetect |= self.health.framing_error();
                        }
                        if redetect {
                            self.redetect(AUTOBAUD_RETRY_TRIES).await;
                        }
                    }
                    if count > 0 {
                        let bytes = &buf[..count];
                        match self.demux.as_mut() {
                            Some(demux) => demux.feed(bytes, sink),
                            None => sink.post(bytes),
                        }
                    }
                }
            }
        }
        self.health = BaudHealth::new();
        info!("nrz session down");
    }

    async fn redetect(&mut self, max_tries: u32) {
        let baud = autobaud_detect(&mut self.autobaud, AUTOBAUD_SAMPLE_EDGES, max_tries).await;
        if baud != BAUD_UNDETECTED {
            self.baud = baud;
            self.uart.set_baud(baud);
        } else {
            // Keep the previous rate; detection retries on the next
            // trigger.
            debug!("baud detection timed out, staying at {}", self.baud);
        }
    }
}
