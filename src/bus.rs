//! Chunked, retrying I2C transactions against SYZYGY peripheral MCUs.
//!
//! The SYZYGY DNA spec allows a peripheral MCU to NAK a write while it is
//! still committing a previous one, so writes here resend the same frame up
//! to [`WRITE_ATTEMPTS`] times before giving up. Reads set the sub-address
//! with a plain write and then clock the data out; a short read is fatal.

use crate::error::{Error, Result};
use embedded_io::{Error as _, ErrorKind};

/// How many times a write is re-attempted while the peripheral NAKs.
///
/// This is a liveness bound, not a backoff schedule; there is no delay
/// between attempts.
pub const WRITE_ATTEMPTS: usize = 2000;

/// Largest payload a single bus transaction may carry.
pub const CHUNK_SIZE: usize = 32;

/// One logical I2C bus segment.
///
/// Implementations map a device NAK to [`ErrorKind::ConnectionRefused`];
/// the transaction layer retries those and treats every other error kind as
/// a fatal bus fault.
pub trait I2cBus {
    type Error: embedded_io::Error;

    /// Write `bytes` to the peripheral at `addr` as one transaction.
    fn write(&mut self, addr: u8, bytes: &[u8]) -> core::result::Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes from the peripheral at `addr`, returning
    /// how many were actually transferred.
    fn read(&mut self, addr: u8, buf: &mut [u8]) -> core::result::Result<usize, Self::Error>;
}

/// A peripheral register sub-address together with its wire width.
///
/// SYZYGY MCUs take a two-byte sub-address (the DNA lives at 0x8000); the
/// supply controller takes a single register byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAddr {
    OneByte(u8),
    TwoByte(u16),
}

impl SubAddr {
    /// Number of address bytes this sub-address occupies on the wire.
    pub const fn width(self) -> usize {
        match self {
            SubAddr::OneByte(_) => 1,
            SubAddr::TwoByte(_) => 2,
        }
    }

    /// The same sub-address advanced by `n` bytes, for chunked transfers.
    pub const fn advance(self, n: u16) -> SubAddr {
        match self {
            SubAddr::OneByte(a) => SubAddr::OneByte(a.wrapping_add(n as u8)),
            SubAddr::TwoByte(a) => SubAddr::TwoByte(a.wrapping_add(n)),
        }
    }

    /// Big-endian wire encoding, as the DNA spec transmits sub-addresses.
    fn encode(self, out: &mut heapless::Vec<u8, { CHUNK_SIZE + 2 }>) {
        match self {
            SubAddr::OneByte(a) => {
                let _ = out.push(a);
            }
            SubAddr::TwoByte(a) => {
                let _ = out.push((a >> 8) as u8);
                let _ = out.push(a as u8);
            }
        }
    }
}

/// You can create a SyzygyBus over anything which implements [`I2cBus`].
///
/// The bus handle is owned by the caller for the lifetime of the process;
/// this type only borrows its use, it never opens or closes anything.
pub struct SyzygyBus<B: I2cBus> {
    bus: B,
}

impl<B: I2cBus> SyzygyBus<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Check whether a peripheral answers at `addr`.
    ///
    /// Issues a marker write of a zero sub-address. Any failure means the
    /// peripheral is absent; absence is not an error.
    pub fn probe(&mut self, addr: u8) -> bool {
        self.bus.write(addr, &[0x00, 0x00]).is_ok()
    }

    /// Write up to [`CHUNK_SIZE`] bytes at a peripheral sub-address.
    ///
    /// The identical frame is resent while the peripheral NAKs, up to
    /// [`WRITE_ATTEMPTS`] times. Any other bus error is immediately fatal.
    pub fn write_at(&mut self, addr: u8, sub: SubAddr, bytes: &[u8]) -> Result<(), B::Error> {
        debug_assert!(bytes.len() <= CHUNK_SIZE);

        let mut frame: heapless::Vec<u8, { CHUNK_SIZE + 2 }> = heapless::Vec::new();
        sub.encode(&mut frame);
        frame
            .extend_from_slice(bytes)
            .map_err(|_| Error::BufferTooSmall)?;

        for _ in 0..WRITE_ATTEMPTS {
            match self.bus.write(addr, &frame) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::ConnectionRefused => continue,
                Err(e) => return Err(Error::Bus(e)),
            }
        }
        Err(Error::RetriesExhausted)
    }

    /// Read exactly `buf.len()` bytes from a peripheral sub-address.
    ///
    /// Sets the sub-address with a write, then reads. A short read is a
    /// hard failure and is never retried.
    pub fn read_at(&mut self, addr: u8, sub: SubAddr, buf: &mut [u8]) -> Result<(), B::Error> {
        debug_assert!(buf.len() <= CHUNK_SIZE);

        self.write_at(addr, sub, &[])?;

        let got = self.bus.read(addr, buf).map_err(Error::Bus)?;
        if got != buf.len() {
            return Err(Error::ShortRead {
                expected: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// Write a transfer longer than one transaction, in consecutive chunks.
    ///
    /// The sub-address advances by the chunk size between transactions. A
    /// failed chunk aborts the transfer; bytes already written stay written.
    pub fn write_large(&mut self, addr: u8, sub: SubAddr, bytes: &[u8]) -> Result<(), B::Error> {
        for (i, chunk) in bytes.chunks(CHUNK_SIZE).enumerate() {
            self.write_at(addr, sub.advance((i * CHUNK_SIZE) as u16), chunk)?;
        }
        Ok(())
    }

    /// Read a transfer longer than one transaction, in consecutive chunks.
    pub fn read_large(&mut self, addr: u8, sub: SubAddr, buf: &mut [u8]) -> Result<(), B::Error> {
        for (i, chunk) in buf.chunks_mut(CHUNK_SIZE).enumerate() {
            self.read_at(addr, sub.advance((i * CHUNK_SIZE) as u16), chunk)?;
        }
        Ok(())
    }

    /// Access the underlying bus handle.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
