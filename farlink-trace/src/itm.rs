// Copyright (C) 2025 Farlink Project
//
// MIT License

//! ITM stimulus-port demultiplexer.
//!
//! ITM software packets interleave on the single SWO stream; each starts
//! with a header byte carrying the stimulus port and a payload size code.
//! The demux walks the decoded byte stream, keeps the payloads of the
//! ports selected in the channel mask and drops everything else.  It has
//! no packet-type table beyond software packets: a byte that is not a
//! valid software header resets the decode state and is not forwarded.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::session::TraceSink;

/// Software packet payloads are at most 4 bytes.
const DECODE_BUFFER_SIZE: usize = 4;

/// Filters an ITM byte stream down to the selected stimulus ports.
pub struct ItmDemux {
    mask: u32,
    remaining: u8,
    forward: bool,
    buf: [u8; DECODE_BUFFER_SIZE],
    idx: usize,
}

impl ItmDemux {
    /// Creates a demux forwarding the ports set in `mask` (bit n is
    /// stimulus port n).
    pub const fn new(mask: u32) -> Self {
        ItmDemux {
            mask,
            remaining: 0,
            forward: false,
            buf: [0u8; DECODE_BUFFER_SIZE],
            idx: 0,
        }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Changes the port mask.  Takes effect at the next packet header.
    pub fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    /// Feeds decoded SWO bytes through the demux, posting selected
    /// payloads to `sink` as each packet completes.
    pub fn feed(&mut self, bytes: &[u8], sink: &mut dyn TraceSink) {
        for &byte in bytes {
            if self.remaining == 0 {
                // Software packet header: bit 2 clear, size code nonzero.
                if byte & 0x04 == 0 && byte & 0x03 != 0 {
                    let stream = byte >> 3;
                    // Size codes 1, 2, 3 map to 1, 2, 4 payload bytes.
                    self.remaining = 1 << ((byte & 0x03) - 1);
                    self.forward = self.mask & (1 << stream) != 0;
                } else {
                    self.forward = false;
                    self.idx = 0;
                }
            } else {
                if self.forward {
                    self.buf[self.idx] = byte;
                    self.idx += 1;
                }
                self.remaining -= 1;
                if self.remaining == 0 && self.idx > 0 {
                    sink.post(&self.buf[..self.idx]);
                    self.idx = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectingSink {
        posts: Vec<Vec<u8>>,
    }

    impl TraceSink for CollectingSink {
        fn post(&mut self, bytes: &[u8]) {
            self.posts.push(bytes.to_vec());
        }
    }

    fn header(stream: u8, size_code: u8) -> u8 {
        stream << 3 | size_code
    }

    #[test]
    fn single_byte_packet_on_selected_port() {
        let mut demux = ItmDemux::new(1);
        let mut sink = CollectingSink::default();
        demux.feed(&[header(0, 1), 0x41], &mut sink);
        assert_eq!(sink.posts, [[0x41].to_vec()]);
    }

    #[test]
    fn size_codes_map_to_payload_lengths() {
        for (code, len) in [(1u8, 1usize), (2, 2), (3, 4)] {
            let mut demux = ItmDemux::new(1 << 5);
            let mut sink = CollectingSink::default();
            let mut stream = vec![header(5, code)];
            stream.extend((0..len as u8).map(|i| 0x30 + i));
            demux.feed(&stream, &mut sink);
            assert_eq!(sink.posts.len(), 1, "size code {code}");
            assert_eq!(sink.posts[0].len(), len, "size code {code}");
        }
    }

    #[test]
    fn unselected_port_is_dropped() {
        let mut demux = ItmDemux::new(1 << 2);
        let mut sink = CollectingSink::default();
        demux.feed(&[header(0, 2), 0x01, 0x02, header(2, 1), 0x99], &mut sink);
        assert_eq!(sink.posts, [[0x99].to_vec()]);
    }

    #[test]
    fn invalid_header_is_not_data() {
        let mut demux = ItmDemux::new(!0);
        let mut sink = CollectingSink::default();
        // 0x00 has a zero size code; 0x04 has bit 2 set.  Neither may
        // open a packet, and the byte after them is a fresh header.
        demux.feed(&[0x00, 0x04, header(1, 1), 0x7E], &mut sink);
        assert_eq!(sink.posts, [[0x7E].to_vec()]);
    }

    #[test]
    fn packet_split_across_feeds() {
        let mut demux = ItmDemux::new(1);
        let mut sink = CollectingSink::default();
        demux.feed(&[header(0, 3), 0xDE, 0xAD], &mut sink);
        assert!(sink.posts.is_empty());
        demux.feed(&[0xBE, 0xEF], &mut sink);
        assert_eq!(sink.posts, [[0xDE, 0xAD, 0xBE, 0xEF].to_vec()]);
    }

    #[test]
    fn mask_change_applies_at_next_header() {
        let mut demux = ItmDemux::new(0);
        let mut sink = CollectingSink::default();
        demux.feed(&[header(0, 1), 0x01], &mut sink);
        assert!(sink.posts.is_empty());
        demux.set_mask(1);
        demux.feed(&[header(0, 1), 0x02], &mut sink);
        assert_eq!(sink.posts, [[0x02].to_vec()]);
    }
}
