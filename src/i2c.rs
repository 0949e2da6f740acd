//! I2C bus wrapper: address-sticky reads/writes plus batched transactions.
//!
//! Grounded on the original's `I2C` class: a single open file descriptor
//! reconfigured via `ioctl(I2C_SLAVE, ...)` only when the target slave
//! address changes, plus a write/read queue flushed as one atomic
//! `I2C_RDWR` transfer.

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CMessage};
use log::warn;

use crate::error::{FlightError, Result};

enum QueuedOp {
    Write(u8, Vec<u8>),
    Read(u8, usize),
}

pub struct I2CBus {
    path: String,
    device: Option<LinuxI2CDevice>,
    last_slave: Option<u8>,
    queue: Vec<QueuedOp>,
}

impl I2CBus {
    pub fn new(path: &str) -> I2CBus {
        I2CBus {
            path: path.to_string(),
            device: None,
            last_slave: None,
            queue: Vec::new(),
        }
    }

    fn device_for(&mut self, slave: u8) -> Result<&mut LinuxI2CDevice> {
        if self.last_slave != Some(slave) || self.device.is_none() {
            let dev = LinuxI2CDevice::new(&self.path, slave as u16).map_err(|e| FlightError::I2c {
                slave,
                source: to_io_error(e),
            })?;
            self.device = Some(dev);
            self.last_slave = Some(slave);
        }
        Ok(self.device.as_mut().unwrap())
    }

    pub fn write(&mut self, slave: u8, bytes: &[u8]) -> Result<()> {
        self.device_for(slave)?
            .write(bytes)
            .map_err(|e| FlightError::I2c { slave, source: to_io_error(e) })
    }

    pub fn read(&mut self, slave: u8, buf: &mut [u8]) -> Result<usize> {
        self.device_for(slave)?
            .read(buf)
            .map_err(|e| FlightError::I2c { slave, source: to_io_error(e) })?;
        Ok(buf.len())
    }

    pub fn enqueue_write(&mut self, slave: u8, data: &[u8]) {
        self.queue.push(QueuedOp::Write(slave, data.to_vec()));
    }

    pub fn enqueue_read(&mut self, slave: u8, len: usize) {
        self.queue.push(QueuedOp::Read(slave, len));
    }

    /// Submits every queued operation as a single atomic multi-message
    /// transfer, each message carrying its own slave address (so a batch
    /// may span multiple devices on the bus). On success the queue drains;
    /// on failure it is preserved for retry, matching the original's
    /// `sendTransaction()`.
    pub fn send_transaction(&mut self) -> Result<Vec<Vec<u8>>> {
        if self.queue.is_empty() {
            return Ok(Vec::new());
        }

        let queue = std::mem::take(&mut self.queue);
        let primary_slave = match queue[0] {
            QueuedOp::Write(slave, _) => slave,
            QueuedOp::Read(slave, _) => slave,
        };

        let mut read_bufs: Vec<Vec<u8>> = queue
            .iter()
            .filter_map(|op| match op {
                QueuedOp::Read(_, len) => Some(vec![0u8; *len]),
                QueuedOp::Write(_, _) => None,
            })
            .collect();

        let result = {
            let dev = self.device_for(primary_slave)?;
            let mut read_iter = read_bufs.iter_mut();
            let mut messages: Vec<LinuxI2CMessage> = Vec::with_capacity(queue.len());
            for op in &queue {
                match op {
                    QueuedOp::Write(slave, data) => {
                        messages.push(LinuxI2CMessage::write(data).with_address(*slave as u16));
                    }
                    QueuedOp::Read(slave, len) => {
                        let buf = read_iter.next().expect("one buffer per queued read");
                        messages.push(LinuxI2CMessage::read(buf).with_len(*len as u16).with_address(*slave as u16));
                    }
                }
            }
            dev.transfer(&mut messages)
                .map_err(|e| FlightError::I2c { slave: primary_slave, source: to_io_error(e) })
        };

        if result.is_err() {
            // Preserve the queue for retry, per the original's semantics.
            self.queue = queue;
            result?;
        }

        Ok(read_bufs)
    }
}

fn to_io_error(e: i2cdev::linux::LinuxI2CError) -> std::io::Error {
    match e {
        i2cdev::linux::LinuxI2CError::Io(io_err) => io_err,
        other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
    }
}

impl Drop for I2CBus {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            warn!("I2CBus dropped with {} unsent queued operations", self.queue.len());
        }
    }
}
