//! Our error types for SmartVIO negotiation.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for SYZYGY bus and DNA operations.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    /// A bus-level fault (addressing, driver). Never retried.
    #[error("I2C bus fault")]
    Bus(I),
    /// The peripheral kept NAKing a write past the retry budget.
    #[error("peripheral did not accept write within retry budget")]
    RetriesExhausted,
    /// The peripheral returned fewer bytes than requested. Fatal, no retry.
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    /// The descriptor declares a length over the protocol maximum.
    #[error("DNA length {0} exceeds protocol maximum")]
    DnaTooLong(u16),
    /// A descriptor field points past the declared descriptor length.
    #[error("DNA truncated or inconsistent")]
    DnaTruncated,
    /// Only DNA major version 1 is understood.
    #[error("unsupported DNA version {major}.{minor}")]
    UnsupportedDnaVersion { major: u8, minor: u8 },
    /// An identification string was not valid UTF-8.
    #[error("identification string is not valid UTF-8")]
    BadString,
    /// A requested VIO voltage lies outside the supply's absolute bounds.
    #[error("VIO voltage {0} outside supply bounds")]
    VioOutOfBounds(u16),
    /// A caller-provided buffer was too small for the transfer.
    #[error("buffer too small for transfer")]
    BufferTooSmall,
}
