//! Packet framing, handshake, and the streaming parser.
//!
//! Frame format: `0x2A 0xA2 <type tag> <body>`. The parser never blocks
//! and tolerates garbage and arbitrary chunking of the underlying byte
//! stream.

use std::thread;
use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::radio::packet::Packet;
use crate::radio::transport::RadioTransport;

const PREAMBLE: u8 = 0x2A;
const PREAMBLE2: u8 = 0xA2;

pub struct RadioLink {
    transport: RadioTransport,
    unhandled: Vec<u8>,
    current_packet: Option<Packet>,
}

impl RadioLink {
    pub fn new(transport: RadioTransport) -> RadioLink {
        RadioLink {
            transport,
            unhandled: Vec::new(),
            current_packet: None,
        }
    }

    /// Blocks until both ends have exchanged the `Hi` handshake. Bytes
    /// following the match are kept for the packet parser.
    pub fn connect(&mut self) -> Result<()> {
        self.transport.write(b"Hi")?;

        loop {
            let mut chunk = [0u8; 256];
            let n = self.transport.read_into(&mut chunk)?;
            if n > 0 {
                self.unhandled.extend_from_slice(&chunk[..n]);
            }
            if let Some(pos) = find_subslice(&self.unhandled, b"Hi") {
                self.unhandled.drain(0..pos + 2);
                break;
            }
            thread::sleep(Duration::from_millis(500));
        }

        self.transport.write(b"Hi")?;
        debug!("radio handshake complete");
        Ok(())
    }

    /// Drains all available transport bytes and advances the parser by at
    /// most one packet. Never blocks.
    pub fn receive(&mut self) -> Result<Option<Packet>> {
        let mut chunk = [0u8; 256];
        loop {
            let n = self.transport.read_into(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.unhandled.extend_from_slice(&chunk[..n]);
        }

        if let Some(mut packet) = self.current_packet.take() {
            if packet.feed(&mut self.unhandled) {
                return Ok(Some(packet));
            } else {
                self.current_packet = Some(packet);
                return Ok(None);
            }
        }

        loop {
            if self.unhandled.len() < 3 {
                return Ok(None);
            }

            let start = match self.unhandled.iter().position(|&b| b == PREAMBLE) {
                Some(idx) => idx,
                None => {
                    self.unhandled.clear();
                    return Ok(None);
                }
            };

            if start > self.unhandled.len() - 3 {
                self.unhandled.drain(0..start);
                return Ok(None);
            }

            if self.unhandled[start + 1] != PREAMBLE2 {
                self.unhandled.drain(0..start + 1);
                continue;
            }

            let tag = self.unhandled[start + 2];
            match Packet::from_tag(tag) {
                None => {
                    self.unhandled.drain(0..start + 2);
                    continue;
                }
                Some(mut packet) => {
                    self.unhandled.drain(0..start + 3);
                    if packet.feed(&mut self.unhandled) {
                        return Ok(Some(packet));
                    } else {
                        self.current_packet = Some(packet);
                        return Ok(None);
                    }
                }
            }
        }
    }

    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        let mut message = vec![PREAMBLE, PREAMBLE2, packet.tag()];
        message.extend(packet.serialize());
        self.transport.write(&message)?;
        Ok(())
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::packet::Motion;

    fn motion_bytes(x: i8, y: i8, z: i8, rot: i8) -> Vec<u8> {
        let mut out = vec![PREAMBLE, PREAMBLE2, crate::radio::packet::TAG_MOTION];
        out.extend(Motion::new(x, y, z, rot).serialize());
        out
    }

    /// Exercises only the parser half of RadioLink: feeds bytes directly
    /// into `unhandled` the way `receive()` would after a transport read,
    /// bypassing the actual serial transport.
    struct ParserHarness {
        unhandled: Vec<u8>,
        current_packet: Option<Packet>,
    }

    impl ParserHarness {
        fn new() -> Self {
            ParserHarness { unhandled: Vec::new(), current_packet: None }
        }

        fn feed(&mut self, bytes: &[u8]) -> Option<Packet> {
            self.unhandled.extend_from_slice(bytes);
            self.step()
        }

        fn step(&mut self) -> Option<Packet> {
            if let Some(mut packet) = self.current_packet.take() {
                if packet.feed(&mut self.unhandled) {
                    return Some(packet);
                } else {
                    self.current_packet = Some(packet);
                    return None;
                }
            }
            loop {
                if self.unhandled.len() < 3 {
                    return None;
                }
                let start = match self.unhandled.iter().position(|&b| b == PREAMBLE) {
                    Some(idx) => idx,
                    None => {
                        self.unhandled.clear();
                        return None;
                    }
                };
                if start > self.unhandled.len() - 3 {
                    self.unhandled.drain(0..start);
                    return None;
                }
                if self.unhandled[start + 1] != PREAMBLE2 {
                    self.unhandled.drain(0..start + 1);
                    continue;
                }
                let tag = self.unhandled[start + 2];
                match Packet::from_tag(tag) {
                    None => {
                        self.unhandled.drain(0..start + 2);
                        continue;
                    }
                    Some(mut packet) => {
                        self.unhandled.drain(0..start + 3);
                        if packet.feed(&mut self.unhandled) {
                            return Some(packet);
                        } else {
                            self.current_packet = Some(packet);
                            return None;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn frame_sync_after_garbage() {
        let mut h = ParserHarness::new();
        let mut bytes = vec![0x00, PREAMBLE, 0x01, 0x02];
        bytes.extend(motion_bytes(1, 2, 3, 4));
        let result = h.feed(&bytes);
        assert_eq!(result, Some(Packet::Motion(Motion::new(1, 2, 3, 4))));
    }

    #[test]
    fn chunked_arrival_yields_none_until_last_byte() {
        let mut h = ParserHarness::new();
        let bytes = motion_bytes(1, 2, 3, 4);
        for (i, b) in bytes.iter().enumerate() {
            let result = h.feed(&[*b]);
            if i + 1 < bytes.len() {
                assert_eq!(result, None);
            } else {
                assert_eq!(result, Some(Packet::Motion(Motion::new(1, 2, 3, 4))));
            }
        }
    }

    #[test]
    fn unknown_type_tag_is_discarded() {
        let mut h = ParserHarness::new();
        let mut bytes = vec![PREAMBLE, PREAMBLE2, 0xFF];
        bytes.extend(motion_bytes(5, 6, 7, 8));
        let result = h.feed(&bytes);
        assert_eq!(result, Some(Packet::Motion(Motion::new(5, 6, 7, 8))));
    }

    #[test]
    fn pure_garbage_is_eventually_discarded() {
        let mut h = ParserHarness::new();
        assert_eq!(h.feed(&[0x00, 0x01, 0x02, 0x03]), None);
        assert!(h.unhandled.is_empty());
    }
}
