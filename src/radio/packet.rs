//! Wire packet taxonomy. Integers in the motion packet are raw signed
//! bytes; the diagnostic packet's floats are little-endian, unlike the
//! transport's big-endian integer helpers.

use crate::byteorder;

pub const TAG_MOTION: u8 = 0xA0;
pub const TAG_DIAGNOSTIC: u8 = 0xA1;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub x: i8,
    pub y: i8,
    pub z: i8,
    pub rot: i8,
    fields_filled: usize,
}

impl Motion {
    pub fn new(x: i8, y: i8, z: i8, rot: i8) -> Motion {
        Motion { x, y, z, rot, fields_filled: 4 }
    }

    /// Consumes bytes from the front of `buffer`, filling remaining
    /// fields in order `x, y, z, rot`. Returns true once complete.
    /// Re-feeding a complete packet restarts it from the beginning.
    fn feed(&mut self, buffer: &mut Vec<u8>) -> bool {
        if self.fields_filled == 4 {
            self.fields_filled = 0;
        }
        let mut drained = 0;
        for byte in buffer.iter() {
            if self.fields_filled == 4 {
                break;
            }
            let value = *byte as i8;
            match self.fields_filled {
                0 => self.x = value,
                1 => self.y = value,
                2 => self.z = value,
                3 => self.rot = value,
                _ => unreachable!(),
            }
            self.fields_filled += 1;
            drained += 1;
        }
        buffer.drain(0..drained);
        self.fields_filled == 4
    }

    fn serialize(&self) -> Vec<u8> {
        vec![self.x as u8, self.y as u8, self.z as u8, self.rot as u8]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Diagnostic {
    pub battery: u8,
    pub a: f32,
    pub b: f32,
    pub c: f32,
    fields_filled: usize,
}

impl Diagnostic {
    pub fn new(battery: u8, a: f32, b: f32, c: f32) -> Diagnostic {
        Diagnostic { battery, a, b, c, fields_filled: 4 }
    }

    fn feed(&mut self, buffer: &mut Vec<u8>) -> bool {
        if self.fields_filled == 4 {
            self.fields_filled = 0;
        }
        loop {
            if self.fields_filled == 4 {
                break;
            }
            if self.fields_filled == 0 {
                if buffer.is_empty() {
                    break;
                }
                self.battery = buffer[0];
                buffer.drain(0..1);
                self.fields_filled += 1;
            } else if buffer.len() >= 4 {
                let mut host = [0u8; 4];
                byteorder::le_to_host(&mut host, &buffer[0..4]).expect("host endianness is supported");
                let value = f32::from_ne_bytes(host);
                match self.fields_filled {
                    1 => self.a = value,
                    2 => self.b = value,
                    3 => self.c = value,
                    _ => unreachable!(),
                }
                buffer.drain(0..4);
                self.fields_filled += 1;
            } else {
                break;
            }
        }
        self.fields_filled == 4
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(13);
        out.push(self.battery);
        for value in [self.a, self.b, self.c] {
            let native = value.to_ne_bytes();
            let mut le = [0u8; 4];
            byteorder::host_to_le(&mut le, &native).expect("host endianness is supported");
            out.extend_from_slice(&le);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Motion(Motion),
    Diagnostic(Diagnostic),
}

impl Packet {
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Motion(_) => TAG_MOTION,
            Packet::Diagnostic(_) => TAG_DIAGNOSTIC,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Packet> {
        match tag {
            TAG_MOTION => Some(Packet::Motion(Motion::default())),
            TAG_DIAGNOSTIC => Some(Packet::Diagnostic(Diagnostic::default())),
            _ => None,
        }
    }

    /// Feeds `buffer` into whichever variant this is. Returns true when
    /// the packet is complete.
    pub fn feed(&mut self, buffer: &mut Vec<u8>) -> bool {
        match self {
            Packet::Motion(m) => m.feed(buffer),
            Packet::Diagnostic(d) => d.feed(buffer),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Packet::Motion(m) => m.serialize(),
            Packet::Diagnostic(d) => d.serialize(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_round_trips() {
        let m = Motion::new(1, -2, 3, -4);
        let bytes = m.serialize();
        let mut buf = bytes.clone();
        let mut fresh = Motion::default();
        assert!(fresh.feed(&mut buf));
        assert_eq!(fresh, Motion::new(1, -2, 3, -4));
        assert!(buf.is_empty());
    }

    #[test]
    fn motion_feed_can_be_chunked() {
        let bytes = Motion::new(1, 2, 3, 4).serialize();
        let mut motion = Motion::default();
        let mut buf = vec![bytes[0]];
        assert!(!motion.feed(&mut buf));
        let mut buf2 = bytes[1..].to_vec();
        assert!(motion.feed(&mut buf2));
        assert_eq!(motion, Motion::new(1, 2, 3, 4));
    }

    #[test]
    fn diagnostic_round_trips_with_little_endian_floats() {
        let d = Diagnostic::new(200, 1.5, -2.25, 3.0);
        let bytes = d.serialize();
        assert_eq!(bytes.len(), 13);
        let mut buf = bytes.clone();
        let mut fresh = Diagnostic::default();
        assert!(fresh.feed(&mut buf));
        assert_eq!(fresh, d);
    }

    #[test]
    fn refeeding_complete_packet_restarts() {
        let mut motion = Motion::new(1, 2, 3, 4);
        let mut buf = Motion::new(9, 8, 7, 6).serialize();
        assert!(motion.feed(&mut buf));
        assert_eq!(motion, Motion::new(9, 8, 7, 6));
    }
}
