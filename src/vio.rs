//! Applying a negotiated VIO voltage set to the supply controller.
//!
//! The negotiation core only consumes the controller's logical contract:
//! unlock configuration writes, then program one voltage per rail. The
//! register-level encoding for the TPS65400 used on the Brain boards lives
//! in [`Tps65400`]; any other supply can slot in behind [`VioController`].

use crate::bus::{I2cBus, SubAddr, SyzygyBus};
use crate::error::{Error, Result};
use strum_macros::EnumIter;

/// Lowest VIO the supply may drive, in tenths of a volt.
pub const VIO_MIN: u16 = 120;

/// Highest VIO the supply may drive, in tenths of a volt.
pub const VIO_MAX: u16 = 330;

/// The logical contract a voltage-supply controller has to offer.
pub trait VioController {
    type Error: embedded_io::Error;

    /// Unlock the controller's configuration registers.
    fn disable_write_protect(&mut self) -> Result<(), Self::Error>;

    /// Drive rail `rail` at `vio` tenths of a volt.
    fn set_rail(&mut self, rail: u8, vio: u16) -> Result<(), Self::Error>;
}

/// Program a resolved voltage set into a controller.
///
/// `None` rails are left alone, never defaulted; that is how a no-solution
/// rail stays undriven. Every requested voltage is bounds-checked before
/// the first controller write goes out, and rails are programmed in
/// increasing index order. A controller failure aborts the remaining rails.
pub fn apply_vio<C: VioController>(
    controller: &mut C,
    rails: &[Option<u16>],
) -> Result<(), C::Error> {
    for &vio in rails.iter().flatten() {
        if !(VIO_MIN..=VIO_MAX).contains(&vio) {
            return Err(Error::VioOutOfBounds(vio));
        }
    }

    if rails.iter().all(Option::is_none) {
        return Ok(());
    }

    controller.disable_write_protect()?;
    for (rail, vio) in rails.iter().enumerate() {
        if let Some(vio) = vio {
            controller.set_rail(rail as u8, *vio)?;
        }
    }
    Ok(())
}

/// Default bus address of the TPS65400 on the Brain boards.
pub const TPS65400_ADDR: u8 = 0x6A;

/// Registers of the TPS65400 this crate touches. One-byte sub-addresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u8)]
pub enum Tps65400Register {
    /// __W__ - Rail/page select for the paged configuration registers.
    Page = 0x00,
    /// __W__ - Write protect control.
    WriteProtect = 0x10,
    /// __W__ - Output reference trim for the selected rail.
    VrefTrim = 0xD8,
}

impl From<Tps65400Register> for u8 {
    fn from(value: Tps65400Register) -> Self {
        value as u8
    }
}

/// Value that unlocks the TPS65400 configuration registers.
const WRITE_PROTECT_OFF: u8 = 0x20;

/// VREF trim for a VIO in tenths of a volt, from the TPS65400 feedback
/// equation `VREF = VIO * 531 / 1000 - 60`.
///
/// Only valid for VIO within the supply bounds; callers check first.
const fn vref_for(vio: u16) -> u8 {
    (vio as u32 * 531 / 1000 - 60) as u8
}

/// The TPS65400 supply controller, addressed over the same I2C segment as
/// the SYZYGY ports.
pub struct Tps65400<'a, B: I2cBus> {
    bus: &'a mut SyzygyBus<B>,
    addr: u8,
}

impl<'a, B: I2cBus> Tps65400<'a, B> {
    pub fn new(bus: &'a mut SyzygyBus<B>) -> Self {
        Self::with_address(bus, TPS65400_ADDR)
    }

    pub fn with_address(bus: &'a mut SyzygyBus<B>, addr: u8) -> Self {
        Self { bus, addr }
    }

    fn write_reg(&mut self, reg: Tps65400Register, value: u8) -> Result<(), B::Error> {
        self.bus.write_at(self.addr, SubAddr::OneByte(reg.into()), &[value])
    }
}

impl<B: I2cBus> VioController for Tps65400<'_, B> {
    type Error = B::Error;

    fn disable_write_protect(&mut self) -> Result<(), B::Error> {
        self.write_reg(Tps65400Register::WriteProtect, WRITE_PROTECT_OFF)
    }

    fn set_rail(&mut self, rail: u8, vio: u16) -> Result<(), B::Error> {
        if !(VIO_MIN..=VIO_MAX).contains(&vio) {
            return Err(Error::VioOutOfBounds(vio));
        }
        self.write_reg(Tps65400Register::Page, rail)?;
        self.write_reg(Tps65400Register::VrefTrim, vref_for(vio))
    }
}
