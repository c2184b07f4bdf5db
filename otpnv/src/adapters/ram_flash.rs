//! In-memory flash device.
//!
//! `RamFlash` backs the region with a byte slice, either with NOR semantics
//! (programming only clears bits, erase sets a granule to `0xFF`) or as
//! freely rewritable memory. It counts mutating operations and can be told
//! to lose power after a given number of them, which is how the commit
//! protocol is exercised against interruption.
//!
//! The operation that hits the power cut has no effect on the memory.

use crate::domain::{FlashGeometry, FlashPrimitives, Medium};
use core::fmt;

/// Erase granule of [`RamFlash`].
pub const RAM_FLASH_ERASE_SIZE: usize = 512;

/// Program granularity of [`RamFlash`].
pub const RAM_FLASH_WRITE_SIZE: usize = 4;

/// Errors reported by [`RamFlash`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamFlashError {
    /// Access beyond the end of the memory.
    OutOfBounds,
    /// Address or length not aligned to the erase or program granule.
    Misaligned,
    /// Power was cut; every operation fails until `restore_power`.
    PowerLoss,
    /// A one-shot program fault armed with `fail_program_at`.
    InjectedFault,
}

impl fmt::Display for RamFlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "Access out of bounds"),
            Self::Misaligned => write!(f, "Misaligned access"),
            Self::PowerLoss => write!(f, "Power lost"),
            Self::InjectedFault => write!(f, "Injected program fault"),
        }
    }
}

impl core::error::Error for RamFlashError {}

/// Flash device over a borrowed byte slice.
///
/// # Example
///
/// ```
/// use otpnv::{FlashPrimitives, RamFlash};
///
/// let mut mem = [0xFFu8; 1024];
/// let mut flash = RamFlash::nor(&mut mem);
///
/// flash.program(0, &[0x0F, 0xF0, 0xFF, 0x00]).unwrap();
/// flash.program(0, &[0xFF, 0x0F, 0xFF, 0xFF]).unwrap();
///
/// let mut word = [0u8; 4];
/// flash.raw_read(0, &mut word).unwrap();
/// assert_eq!(word, [0x0F, 0x00, 0xFF, 0x00]);
/// ```
pub struct RamFlash<'a> {
    mem: &'a mut [u8],
    medium: Medium,
    operations: u32,
    cut_after: Option<u32>,
    powered: bool,
    fault_at: Option<u32>,
}

impl<'a> RamFlash<'a> {
    /// NOR flash over `mem`. Fresh NOR memory should be filled with `0xFF`.
    pub fn nor(mem: &'a mut [u8]) -> Self {
        Self::with_medium(mem, Medium::EraseBeforeWrite)
    }

    /// Byte-rewritable memory over `mem`.
    pub fn rewritable(mem: &'a mut [u8]) -> Self {
        Self::with_medium(mem, Medium::Rewritable)
    }

    fn with_medium(mem: &'a mut [u8], medium: Medium) -> Self {
        Self {
            mem,
            medium,
            operations: 0,
            cut_after: None,
            powered: true,
            fault_at: None,
        }
    }

    /// Erase and program operations performed so far.
    pub fn operations(&self) -> u32 {
        self.operations
    }

    /// Let `n` more erase or program operations succeed, then lose power.
    pub fn power_cut_after(&mut self, n: u32) {
        self.cut_after = Some(self.operations + n);
    }

    /// Fail the next program that starts at `addr`, leaving memory untouched.
    pub fn fail_program_at(&mut self, addr: u32) {
        self.fault_at = Some(addr);
    }

    /// Clear any pending or triggered fault.
    pub fn restore_power(&mut self) {
        self.cut_after = None;
        self.powered = true;
        self.fault_at = None;
    }

    /// Whether the simulated power cut has happened.
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// The backing memory.
    pub fn memory(&self) -> &[u8] {
        self.mem
    }

    /// Count a mutating operation, tripping the power cut if it is due.
    fn begin_mutation(&mut self) -> Result<(), RamFlashError> {
        if !self.powered {
            return Err(RamFlashError::PowerLoss);
        }
        if self.cut_after.is_some_and(|limit| self.operations >= limit) {
            self.powered = false;
            return Err(RamFlashError::PowerLoss);
        }
        self.operations += 1;
        Ok(())
    }

    fn span(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>, RamFlashError> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or(RamFlashError::OutOfBounds)?;
        if end > self.mem.len() {
            return Err(RamFlashError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl FlashPrimitives for RamFlash<'_> {
    type Error = RamFlashError;

    fn geometry(&self) -> FlashGeometry {
        FlashGeometry {
            capacity: self.mem.len() as u32,
            granule_size: RAM_FLASH_ERASE_SIZE as u32,
            write_size: RAM_FLASH_WRITE_SIZE as u32,
            medium: self.medium,
        }
    }

    fn erase(&mut self, granule_addr: u32) -> Result<(), Self::Error> {
        if granule_addr as usize % RAM_FLASH_ERASE_SIZE != 0 {
            return Err(RamFlashError::Misaligned);
        }
        let span = self.span(granule_addr, RAM_FLASH_ERASE_SIZE)?;
        self.begin_mutation()?;
        self.mem[span].fill(0xFF);
        Ok(())
    }

    fn program(&mut self, addr: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if addr as usize % RAM_FLASH_WRITE_SIZE != 0 || bytes.len() % RAM_FLASH_WRITE_SIZE != 0 {
            return Err(RamFlashError::Misaligned);
        }
        let span = self.span(addr, bytes.len())?;
        self.begin_mutation()?;
        if self.fault_at == Some(addr) {
            self.fault_at = None;
            return Err(RamFlashError::InjectedFault);
        }

        let target = &mut self.mem[span];
        match self.medium {
            Medium::EraseBeforeWrite => {
                for (cell, byte) in target.iter_mut().zip(bytes) {
                    *cell &= *byte;
                }
            }
            Medium::Rewritable => target.copy_from_slice(bytes),
        }
        Ok(())
    }

    fn raw_read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        if !self.powered {
            return Err(RamFlashError::PowerLoss);
        }
        let span = self.span(addr, buf.len())?;
        buf.copy_from_slice(&self.mem[span]);
        Ok(())
    }
}

#[cfg(feature = "embedded-storage")]
mod nor_traits {
    use super::{RAM_FLASH_ERASE_SIZE, RAM_FLASH_WRITE_SIZE, RamFlash, RamFlashError};
    use crate::domain::FlashPrimitives;
    use embedded_storage::nor_flash::{
        ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
    };

    impl NorFlashError for RamFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Self::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                Self::Misaligned => NorFlashErrorKind::NotAligned,
                Self::PowerLoss | Self::InjectedFault => NorFlashErrorKind::Other,
            }
        }
    }

    impl ErrorType for RamFlash<'_> {
        type Error = RamFlashError;
    }

    impl ReadNorFlash for RamFlash<'_> {
        // Word reads only, like most memory-mapped flash controllers.
        const READ_SIZE: usize = 4;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            if offset as usize % Self::READ_SIZE != 0 || bytes.len() % Self::READ_SIZE != 0 {
                return Err(RamFlashError::Misaligned);
            }
            self.raw_read(offset, bytes)
        }

        fn capacity(&self) -> usize {
            self.mem.len()
        }
    }

    impl NorFlash for RamFlash<'_> {
        const WRITE_SIZE: usize = RAM_FLASH_WRITE_SIZE;
        const ERASE_SIZE: usize = RAM_FLASH_ERASE_SIZE;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if from > to || to as usize % RAM_FLASH_ERASE_SIZE != 0 {
                return Err(RamFlashError::Misaligned);
            }
            let mut granule = from;
            while granule < to {
                FlashPrimitives::erase(self, granule)?;
                granule += RAM_FLASH_ERASE_SIZE as u32;
            }
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            self.program(offset, bytes)
        }
    }
}
