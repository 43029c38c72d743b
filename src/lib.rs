//! This crate implements the SYZYGY SmartVIO negotiation stack for host boards
//! that carry pluggable SYZYGY peripherals on a shared I2C bus.
//!
//! Every SYZYGY peripheral stores a self-describing binary descriptor (its
//! "DNA") in MCU memory at sub-address 0x8000. The DNA advertises which VIO
//! voltages the module can operate at, in preference order. The host reads the
//! DNA of every attached module, intersects the advertised ranges per power
//! rail, and programs the agreed voltage into the supply controller.
//!
//! The crate is split along those lines:
//! * [`bus`] - chunked, NAK-retrying I2C transactions against peripheral MCUs
//! * [`dna`] - DNA header decoding and descriptor blob read/write
//! * [`svio`] - the per-rail voltage solver and the negotiation run itself
//! * [`vio`] - bounds-checked voltage application to the supply controller
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! Host boards this is known to model:
//! * SYZYGY Brain 1 (2 rails, 4 peripheral ports), see
//!   [`svio::SvioConfig::brain1`]
//!
//! All voltages are handled as integers in tenths of a volt, e.g. `330` is
//! 3.3 V, matching the units used in the DNA itself.

#![cfg_attr(feature = "no_std", no_std)]

pub mod bus;
pub mod dna;
pub mod error;
pub mod svio;
pub mod vio;

#[cfg(test)]
mod mock_bus;
