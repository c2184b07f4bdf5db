//! NOR Flash adapter for embedded-storage traits
//!
//! This module wraps types implementing the `embedded-storage` NOR flash
//! traits and exposes them as [`FlashPrimitives`], so platform drivers
//! (internal flash controllers, SPI NOR chips) can back an
//! [`OtpNvRegion`](crate::OtpNvRegion) directly.
//!
//! # Example
//!
//! ```ignore
//! use esp_storage::FlashStorage as EspFlash;
//! use otpnv::{AreaConfig, LayoutConfig, NorFlashAdapter, OtpNvRegion, RegionLayout};
//!
//! const LAYOUT: RegionLayout = RegionLayout::resolve_or_panic(&LayoutConfig::tfm_default());
//!
//! let flash = NorFlashAdapter::new(EspFlash::new());
//! let mut region = OtpNvRegion::new(flash, LAYOUT, AreaConfig::contiguous(0x3F_E000, 0x1000));
//! region.init()?;
//! ```

use crate::domain::{FlashGeometry, FlashPrimitives, Medium};
use embedded_storage::nor_flash::{NorFlash, NorFlashErrorKind, ReadNorFlash};

/// Bounce buffer used for reads that are not aligned to `READ_SIZE`.
const BOUNCE_SIZE: usize = 64;

/// Error type for NOR flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NorFlashError {
    kind: NorFlashErrorKind,
}

impl NorFlashError {
    /// The underlying `embedded-storage` error kind.
    pub fn kind(&self) -> NorFlashErrorKind {
        self.kind
    }
}

impl core::fmt::Display for NorFlashError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NOR flash error: {:?}", self.kind)
    }
}

impl core::error::Error for NorFlashError {}

/// Adapter that wraps embedded-storage NOR flash as [`FlashPrimitives`]
///
/// Erases map to `NorFlash::erase` over one `ERASE_SIZE` granule, programs
/// to `NorFlash::write`. Reads of any offset and length are served even when
/// the device requires `READ_SIZE` alignment.
pub struct NorFlashAdapter<F> {
    flash: F,
}

impl<F> NorFlashAdapter<F> {
    /// Create a new NOR flash adapter
    pub fn new(flash: F) -> Self {
        Self { flash }
    }

    /// Get a mutable reference to the underlying flash
    pub fn inner_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Consume the adapter and return the underlying flash
    pub fn into_inner(self) -> F {
        self.flash
    }
}

#[inline]
fn map_err<E: embedded_storage::nor_flash::NorFlashError>(e: E) -> NorFlashError {
    NorFlashError { kind: e.kind() }
}

impl<F> FlashPrimitives for NorFlashAdapter<F>
where
    F: NorFlash + ReadNorFlash,
{
    type Error = NorFlashError;

    fn geometry(&self) -> FlashGeometry {
        FlashGeometry {
            capacity: self.flash.capacity() as u32,
            granule_size: F::ERASE_SIZE as u32,
            write_size: F::WRITE_SIZE as u32,
            medium: Medium::EraseBeforeWrite,
        }
    }

    fn erase(&mut self, granule_addr: u32) -> Result<(), Self::Error> {
        self.flash
            .erase(granule_addr, granule_addr + F::ERASE_SIZE as u32)
            .map_err(map_err)
    }

    fn program(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.flash.write(addr, bytes).map_err(map_err)
    }

    fn raw_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let align = F::READ_SIZE as u32;
        if align <= 1 || (addr % align == 0 && buf.len() as u32 % align == 0) {
            return self.flash.read(addr, buf).map_err(map_err);
        }
        if BOUNCE_SIZE as u32 % align != 0 {
            return Err(NorFlashError {
                kind: NorFlashErrorKind::NotAligned,
            });
        }

        let mut bounce = [0u8; BOUNCE_SIZE];
        let mut done = 0usize;
        while done < buf.len() {
            let pos = addr + done as u32;
            let start = pos - pos % align;
            let skip = (pos - start) as usize;
            let want = (buf.len() - done).min(BOUNCE_SIZE - skip);
            let span = (skip + want).div_ceil(align as usize) * align as usize;

            self.flash
                .read(start, &mut bounce[..span])
                .map_err(map_err)?;
            buf[done..done + want].copy_from_slice(&bounce[skip..skip + want]);
            done += want;
        }
        Ok(())
    }
}
