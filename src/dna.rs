//! DNA descriptor decoding and descriptor blob transfer.
//!
//! Every SYZYGY peripheral exposes its DNA at sub-address [`DNA_BASE`]. The
//! decode is two-pass: the fixed 32-byte v1 header is read first and
//! establishes the declared total length and the string-table layout; only
//! when that length is inside the protocol bound does anything read further
//! into the descriptor. Length fields come from the device and are never
//! trusted without a bounds check.
//!
//! v1 header layout:
//!
//! | bytes  | field                                            |
//! |--------|--------------------------------------------------|
//! | 0..2   | total DNA length, LE, at most [`MAX_DNA_LENGTH`]  |
//! | 2..4   | header length, LE (32 for v1)                    |
//! | 4..6   | DNA version, major then minor                    |
//! | 6..8   | attribute flags, LE                              |
//! | 8..24  | four VIO ranges, min/max u16 LE each             |
//! | 24..29 | five ID string lengths, one byte each            |
//! | 29..32 | reserved                                         |
//!
//! The five identification strings follow the header consecutively in
//! declaration order: manufacturer, product name, product model, product
//! version, serial number.

use crate::bus::{I2cBus, SubAddr, SyzygyBus};
use crate::error::{Error, Result};
use modular_bitfield::prelude::*;

/// Sub-address where a peripheral's DNA memory starts.
pub const DNA_BASE: u16 = 0x8000;

/// Largest DNA any conforming peripheral may declare.
pub const MAX_DNA_LENGTH: usize = 1318;

/// Size of the fixed v1 DNA header.
pub const HEADER_LENGTH_V1: usize = 32;

/// A peripheral advertises up to this many VIO ranges, in preference order.
pub const MAX_VIO_RANGES: usize = 4;

/// DNA attribute flag word.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeFlags {
    /// Module signals over LVDS and needs exactly 2.5 V, non-negotiable.
    pub lvds: bool,
    /// Module spans two mated ports.
    pub doublewide: bool,
    /// Module uses the TXR4 transceiver pinout.
    pub txr4: bool,
    #[skip]
    __: B13,
}

/// DNA format revision, major.minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DnaVersion {
    pub major: u8,
    pub minor: u8,
}

/// One acceptable VIO operating range, closed, in tenths of a volt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VioRange {
    pub min: u16,
    pub max: u16,
}

impl VioRange {
    /// The all-zero range marks an unused slot in the DNA range table.
    pub const EMPTY: VioRange = VioRange { min: 0, max: 0 };

    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// An exact, single-point range.
    pub const fn single(vio: u16) -> Self {
        Self { min: vio, max: vio }
    }

    /// Closed-interval intersection; `None` when the result is empty.
    pub fn intersect(self, other: Self) -> Option<Self> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(Self { min, max })
    }
}

/// Where one identification string lives inside the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringLocator {
    /// Offset from the start of the descriptor.
    pub offset: u16,
    pub length: u8,
}

/// Locators for the five identification strings, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringTable {
    pub manufacturer: StringLocator,
    pub product_name: StringLocator,
    pub product_model: StringLocator,
    pub product_version: StringLocator,
    pub serial: StringLocator,
}

/// One decoded identification string. Locator lengths are a single byte, so
/// 255 bytes always suffices.
pub type IdString = heapless::String<255>;

/// The identification strings of one peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortIdentity {
    pub manufacturer: IdString,
    pub product_name: IdString,
    pub product_model: IdString,
    pub product_version: IdString,
    pub serial: IdString,
}

/// The decoded fixed portion of a peripheral's DNA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnaHeader {
    pub total_length: u16,
    pub header_length: u16,
    pub version: DnaVersion,
    pub attr: AttributeFlags,
    pub ranges: [VioRange; MAX_VIO_RANGES],
    /// Leading entries of `ranges` that are in use.
    pub range_count: u8,
    pub strings: StringTable,
}

impl DnaHeader {
    /// Decode a v1 header from raw descriptor bytes.
    ///
    /// Rejects a declared total length over [`MAX_DNA_LENGTH`] before
    /// anything else is interpreted, so callers never chunk-read based on an
    /// unchecked device-supplied length. Every string locator is checked
    /// against the declared total length here, not at read time.
    pub fn parse<I: embedded_io::Error>(buf: &[u8]) -> Result<Self, I> {
        if buf.len() < HEADER_LENGTH_V1 {
            return Err(Error::DnaTruncated);
        }

        let total_length = u16::from_le_bytes([buf[0], buf[1]]);
        if total_length as usize > MAX_DNA_LENGTH {
            return Err(Error::DnaTooLong(total_length));
        }

        let header_length = u16::from_le_bytes([buf[2], buf[3]]);
        let version = DnaVersion {
            major: buf[4],
            minor: buf[5],
        };
        if version.major != 1 {
            return Err(Error::UnsupportedDnaVersion {
                major: version.major,
                minor: version.minor,
            });
        }
        if header_length < HEADER_LENGTH_V1 as u16 || header_length > total_length {
            return Err(Error::DnaTruncated);
        }

        let attr = AttributeFlags::from_bytes([buf[6], buf[7]]);

        let mut ranges = [VioRange::EMPTY; MAX_VIO_RANGES];
        let mut range_count = 0u8;
        for (i, slot) in ranges.iter_mut().enumerate() {
            let at = 8 + i * 4;
            let range = VioRange {
                min: u16::from_le_bytes([buf[at], buf[at + 1]]),
                max: u16::from_le_bytes([buf[at + 2], buf[at + 3]]),
            };
            // An all-zero entry terminates the table.
            if range == VioRange::EMPTY {
                break;
            }
            *slot = range;
            range_count += 1;
        }

        // Strings are packed back to back after the header; each locator is
        // the running offset plus its declared length.
        let mut offset = header_length;
        let mut next = |length: u8| {
            let locator = StringLocator { offset, length };
            offset += length as u16;
            locator
        };
        let strings = StringTable {
            manufacturer: next(buf[24]),
            product_name: next(buf[25]),
            product_model: next(buf[26]),
            product_version: next(buf[27]),
            serial: next(buf[28]),
        };
        if offset > total_length {
            return Err(Error::DnaTruncated);
        }

        Ok(DnaHeader {
            total_length,
            header_length,
            version,
            attr,
            ranges,
            range_count,
            strings,
        })
    }
}

impl<B: I2cBus> SyzygyBus<B> {
    /// Read and decode the fixed DNA header of the peripheral at `addr`.
    pub fn read_dna_header(&mut self, addr: u8) -> Result<DnaHeader, B::Error> {
        let mut buf = [0u8; HEADER_LENGTH_V1];
        self.read_large(addr, SubAddr::TwoByte(DNA_BASE), &mut buf)?;
        DnaHeader::parse(&buf)
    }

    /// Read a peripheral's full DNA into `buf`, returning its length.
    ///
    /// The declared length is bounds-checked before the chunked read starts.
    pub fn dump_dna(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, B::Error> {
        let mut len_bytes = [0u8; 2];
        self.read_at(addr, SubAddr::TwoByte(DNA_BASE), &mut len_bytes)?;

        let length = u16::from_le_bytes(len_bytes);
        if length as usize > MAX_DNA_LENGTH {
            return Err(Error::DnaTooLong(length));
        }
        let length = length as usize;
        if buf.len() < length {
            return Err(Error::BufferTooSmall);
        }

        self.read_large(addr, SubAddr::TwoByte(DNA_BASE), &mut buf[..length])?;
        Ok(length)
    }

    /// Program a DNA blob into the peripheral at `addr`.
    ///
    /// The blob's first two bytes declare its length, little-endian, exactly
    /// as a persisted descriptor file stores it. Nothing is written unless
    /// the declared length fits both the protocol bound and the slice.
    pub fn write_dna(&mut self, addr: u8, blob: &[u8]) -> Result<(), B::Error> {
        if blob.len() < 2 {
            return Err(Error::DnaTruncated);
        }
        let length = u16::from_le_bytes([blob[0], blob[1]]);
        if length as usize > MAX_DNA_LENGTH {
            return Err(Error::DnaTooLong(length));
        }
        if blob.len() < length as usize {
            return Err(Error::DnaTruncated);
        }

        self.write_large(addr, SubAddr::TwoByte(DNA_BASE), &blob[..length as usize])
    }

    /// Read all five identification strings of one peripheral.
    pub fn read_identity(&mut self, addr: u8, strings: &StringTable) -> Result<PortIdentity, B::Error> {
        Ok(PortIdentity {
            manufacturer: self.read_dna_string(addr, strings.manufacturer)?,
            product_name: self.read_dna_string(addr, strings.product_name)?,
            product_model: self.read_dna_string(addr, strings.product_model)?,
            product_version: self.read_dna_string(addr, strings.product_version)?,
            serial: self.read_dna_string(addr, strings.serial)?,
        })
    }

    /// Read one identification string: exactly its declared length, then
    /// truncated at the first NUL. Never reads past the locator.
    fn read_dna_string(&mut self, addr: u8, locator: StringLocator) -> Result<IdString, B::Error> {
        let mut buf = [0u8; 255];
        let raw = &mut buf[..locator.length as usize];
        self.read_large(addr, SubAddr::TwoByte(DNA_BASE + locator.offset), raw)?;

        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = core::str::from_utf8(&raw[..end]).map_err(|_| Error::BadString)?;

        let mut out = IdString::new();
        out.push_str(text).map_err(|_| Error::BufferTooSmall)?;
        Ok(out)
    }
}
