//! Byte-level non-blocking transport over a serial port.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::SerialPort;

use crate::byteorder;
use crate::bytequeue::ByteQueue;
use crate::config::Parity;
use crate::error::{FlightError, Result};

const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400,
];

pub struct RadioTransport {
    port: Box<dyn SerialPort>,
    inbound: ByteQueue,
}

impl RadioTransport {
    pub fn open(path: &str, baud: u32, parity: Parity) -> Result<RadioTransport> {
        if !SUPPORTED_BAUD_RATES.contains(&baud) {
            return Err(FlightError::Config(format!("unsupported baud rate {baud}")));
        }

        let port = serialport::new(path, baud)
            .parity(match parity {
                Parity::None => serialport::Parity::None,
                Parity::Odd => serialport::Parity::Odd,
                Parity::Even => serialport::Parity::Even,
            })
            .timeout(Duration::from_millis(10))
            .open()?;

        Ok(RadioTransport { port, inbound: ByteQueue::new() })
    }

    /// Non-blocking write: a timeout is treated as zero bytes written, not
    /// an error.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        match self.port.write(bytes) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                Ok(0)
            }
            Err(e) => Err(FlightError::RadioIo(e)),
        }
    }

    fn fill_queue(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.inbound.push(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    break;
                }
                Err(e) => return Err(FlightError::RadioIo(e)),
            }
        }
        Ok(())
    }

    /// Drains all currently available bytes into `dst`, up to `dst.len()`.
    /// Pass a large enough buffer to read "everything currently queued".
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.fill_queue()?;
        Ok(self.inbound.pop_into(dst))
    }

    pub fn queued_size(&mut self) -> Result<usize> {
        self.fill_queue()?;
        Ok(self.inbound.size())
    }

    pub fn read_be16(&mut self) -> Result<Option<u16>> {
        self.fill_queue()?;
        if self.inbound.size() < 2 {
            return Ok(None);
        }
        let mut raw = [0u8; 2];
        self.inbound.pop_into(&mut raw);
        let mut host = [0u8; 2];
        byteorder::be_to_host(&mut host, &raw)?;
        Ok(Some(u16::from_ne_bytes(host)))
    }

    pub fn write_be16(&mut self, value: u16) -> Result<()> {
        let native = value.to_ne_bytes();
        let mut be = [0u8; 2];
        byteorder::host_to_be(&mut be, &native)?;
        self.write(&be)?;
        Ok(())
    }

    pub fn read_be32(&mut self) -> Result<Option<u32>> {
        self.fill_queue()?;
        if self.inbound.size() < 4 {
            return Ok(None);
        }
        let mut raw = [0u8; 4];
        self.inbound.pop_into(&mut raw);
        let mut host = [0u8; 4];
        byteorder::be_to_host(&mut host, &raw)?;
        Ok(Some(u32::from_ne_bytes(host)))
    }

    pub fn write_be32(&mut self, value: u32) -> Result<()> {
        let native = value.to_ne_bytes();
        let mut be = [0u8; 4];
        byteorder::host_to_be(&mut be, &native)?;
        self.write(&be)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SUPPORTED_BAUD_RATES;

    #[test]
    fn supported_baud_rates_include_the_link_default() {
        assert!(SUPPORTED_BAUD_RATES.contains(&57600));
    }
}
