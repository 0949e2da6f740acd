//! Host endianness detection and byte-swapping helpers for the wire formats
//! used by the radio link.
//!
//! Integers sent over the radio link are big-endian; the diagnostic
//! packet's floats are little-endian. This module underlies both.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
    Unsupported,
}

fn host_endian() -> Endian {
    static HOST: OnceLock<Endian> = OnceLock::new();
    *HOST.get_or_init(|| {
        let probe: u32 = 0x11223344;
        let bytes = probe.to_ne_bytes();
        if bytes == 0x11223344u32.to_be_bytes() {
            Endian::Big
        } else if bytes == 0x11223344u32.to_le_bytes() {
            Endian::Little
        } else {
            Endian::Unsupported
        }
    })
}

/// Reverses `src` into `dest`. `src` and `dest` may be the same slice.
pub fn swap_endian(dest: &mut [u8], src: &[u8]) {
    assert_eq!(dest.len(), src.len());
    let tmp: Vec<u8> = src.to_vec();
    for (i, b) in tmp.iter().rev().enumerate() {
        dest[i] = *b;
    }
}

fn convert(dest: &mut [u8], src: &[u8], target: Endian) -> crate::error::Result<()> {
    match host_endian() {
        Endian::Unsupported => Err(crate::error::FlightError::Config(
            "host endianness is neither big nor little".into(),
        )),
        host if host == target => {
            dest.copy_from_slice(src);
            Ok(())
        }
        _ => {
            swap_endian(dest, src);
            Ok(())
        }
    }
}

pub fn host_to_be(dest: &mut [u8], src: &[u8]) -> crate::error::Result<()> {
    convert(dest, src, Endian::Big)
}

pub fn host_to_le(dest: &mut [u8], src: &[u8]) -> crate::error::Result<()> {
    convert(dest, src, Endian::Little)
}

pub fn be_to_host(dest: &mut [u8], src: &[u8]) -> crate::error::Result<()> {
    host_to_be(dest, src)
}

pub fn le_to_host(dest: &mut [u8], src: &[u8]) -> crate::error::Result<()> {
    host_to_le(dest, src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_aliased() {
        let mut buf = [0x11u8, 0x22, 0x33, 0x44];
        let src = buf.clone();
        swap_endian(&mut buf, &src);
        assert_eq!(buf, [0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn roundtrip_be() {
        let x = 0x01020304u32.to_ne_bytes();
        let mut be = [0u8; 4];
        host_to_be(&mut be, &x).unwrap();
        let mut back = [0u8; 4];
        be_to_host(&mut back, &be).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn roundtrip_le() {
        let x = 0x01020304u32.to_ne_bytes();
        let mut le = [0u8; 4];
        host_to_le(&mut le, &x).unwrap();
        let mut back = [0u8; 4];
        le_to_host(&mut back, &le).unwrap();
        assert_eq!(back, x);
    }
}
