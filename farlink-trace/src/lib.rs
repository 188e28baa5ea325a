// Copyright (C) 2025 Farlink Project
//
// MIT License

//! SWO trace capture.
//!
//! Targets emit trace over the SWO line in one of two encodings, and this
//! crate turns either into a byte stream, optionally filtered through the
//! ITM stimulus-port demultiplexer:
//!
//! ```text
//!   edge capture (ISR) --> EdgeRing --> ManchesterDecoder \
//!                                                          +--> ItmDemux --> TraceSink
//!   UART at detected baud -----------> NrzUart           /
//! ```
//!
//! - [`ring::EdgeRing`] carries raw edge durations from the capture
//!   interrupt to the decode task without blocking either side.
//! - [`manchester::ManchesterDecoder`] recovers bytes from self-clocked
//!   Manchester edges, calibrating the bit time from the stream itself.
//! - [`nrz::autobaud_detect()`] measures the line rate of NRZ trace so
//!   the UART can be programmed without asking the target first.
//! - [`itm::ItmDemux`] filters the byte stream down to the ITM stimulus
//!   ports the caller asked for.
//! - [`session`] ties each pipeline together as a long-running task
//!   driven by commands over a channel.
//!
//! The crate is `no_std` and host-testable; nothing here touches
//! hardware directly.

#![cfg_attr(not(test), no_std)]

pub mod itm;
pub mod manchester;
pub mod nrz;
pub mod ring;
pub mod session;

#[doc(inline)]
pub use crate::itm::ItmDemux;
#[doc(inline)]
pub use crate::manchester::ManchesterDecoder;
#[doc(inline)]
pub use crate::nrz::{AutobaudPort, BaudHealth, NrzUart, autobaud_detect};
#[doc(inline)]
pub use crate::ring::{EdgeConsumer, EdgePair, EdgeProducer, EdgeRing};
#[doc(inline)]
pub use crate::session::{
    CommandChannel, ManchesterSession, NrzSession, TraceCommand, TraceSink, WakeSignal,
};

/// Which SWO encoding a session decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TraceMode {
    /// Self-clocked Manchester at an unknown rate.
    Manchester,

    /// NRZ (UART framing) at a fixed or auto-detected baud rate.
    Nrz,
}
