//! FlashPrimitives port - driven port for raw flash access.
//!
//! The platform flash driver owns the physical erase, program and read
//! operations. Adapters expose them through this trait; the region logic
//! depends on nothing else.

use crate::domain::value_objects::FlashGeometry;
use core::fmt::Debug;

/// Raw flash operations consumed by the region.
///
/// All calls are blocking and run to completion. A program or erase that
/// returns an error may or may not have changed the medium; the region
/// protocol is built so that either outcome leaves a committed generation
/// readable.
///
/// # Example
///
/// ```ignore
/// fn blank_check<F: FlashPrimitives>(flash: &mut F, addr: u32) -> Result<bool, F::Error> {
///     let mut word = [0u8; 4];
///     flash.raw_read(addr, &mut word)?;
///     Ok(word == [0xFF; 4])
/// }
/// ```
pub trait FlashPrimitives {
    /// Error reported by the device.
    type Error: Debug;

    /// Physical properties of the device.
    fn geometry(&self) -> FlashGeometry;

    /// Erase the granule starting at `granule_addr`.
    ///
    /// Devices with [`Medium::Rewritable`](crate::domain::Medium::Rewritable)
    /// storage are never asked to erase.
    fn erase(&mut self, granule_addr: u32) -> Result<(), Self::Error>;

    /// Program `bytes` at `addr`.
    ///
    /// `addr` and `bytes.len()` are multiples of the geometry's `write_size`.
    fn program(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes starting at `addr`.
    fn raw_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
}

impl<T: FlashPrimitives + ?Sized> FlashPrimitives for &mut T {
    type Error = T::Error;

    fn geometry(&self) -> FlashGeometry {
        (**self).geometry()
    }

    fn erase(&mut self, granule_addr: u32) -> Result<(), Self::Error> {
        (**self).erase(granule_addr)
    }

    fn program(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).program(addr, bytes)
    }

    fn raw_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).raw_read(addr, buf)
    }
}
