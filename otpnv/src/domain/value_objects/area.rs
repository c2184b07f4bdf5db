//! Flash geometry and area placement.

use core::fmt;

/// Value of a word that has been erased and never programmed.
///
/// A copy whose `swap_count` reads as this value holds no committed
/// generation.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// Rewrite behavior of the backing medium.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    /// NOR-style flash: a program can only clear bits, so a granule must be
    /// erased to `0xFF` before it is reprogrammed.
    EraseBeforeWrite,
    /// Byte-rewritable storage (FRAM, EEPROM emulation, RAM).
    Rewritable,
}

/// Physical properties reported by a flash adapter.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Device size in bytes.
    pub capacity: u32,
    /// Erase granule in bytes.
    pub granule_size: u32,
    /// Program granularity in bytes. Must divide 4.
    pub write_size: u32,
    /// Rewrite behavior.
    pub medium: Medium,
}

impl FlashGeometry {
    /// Start of the granule containing `addr`.
    #[inline]
    pub const fn granule_start(&self, addr: u32) -> u32 {
        addr - addr % self.granule_size
    }
}

/// Where the region lives in flash.
///
/// The region is kept in two equally sized areas. The primary area holds
/// the live copy; the staging area receives a snapshot of the committed
/// generation before the primary is rewritten, so an interrupted write can
/// be rolled back.
///
/// # Example
///
/// ```
/// use otpnv::AreaConfig;
///
/// let area = AreaConfig::contiguous(0x7_E000, 0x1000);
/// assert_eq!(area.staging, 0x7_F000);
/// ```
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaConfig {
    /// Start of the primary area.
    pub primary: u32,
    /// Start of the staging area.
    pub staging: u32,
    /// Size of each area in bytes.
    pub size: u32,
}

impl AreaConfig {
    /// Create an area configuration.
    pub const fn new(primary: u32, staging: u32, size: u32) -> Self {
        Self {
            primary,
            staging,
            size,
        }
    }

    /// Primary area at `base`, staging area directly after it.
    pub const fn contiguous(base: u32, size: u32) -> Self {
        Self::new(base, base + size, size)
    }

    /// Total bytes covered by both areas.
    #[inline]
    pub const fn footprint(&self) -> u32 {
        self.size * 2
    }

    /// Check the areas against a region size and device geometry.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self, region_size: u32, geometry: &FlashGeometry) -> Result<(), AreaError> {
        if geometry.write_size == 0 || 4 % geometry.write_size != 0 {
            return Err(AreaError::UnsupportedWriteSize(geometry.write_size));
        }
        if geometry.granule_size == 0 {
            return Err(AreaError::Misaligned {
                offset: self.size,
                granule: 0,
            });
        }
        if region_size > self.size {
            return Err(AreaError::RegionTooLarge {
                required: region_size,
                available: self.size,
            });
        }
        for offset in [self.primary, self.staging, self.size] {
            if offset % geometry.granule_size != 0 {
                return Err(AreaError::Misaligned {
                    offset,
                    granule: geometry.granule_size,
                });
            }
        }
        for start in [self.primary, self.staging] {
            let end = start as u64 + self.size as u64;
            if end > geometry.capacity as u64 {
                return Err(AreaError::OutsideDevice {
                    end,
                    capacity: geometry.capacity,
                });
            }
        }
        let (lo, hi) = if self.primary <= self.staging {
            (self.primary, self.staging)
        } else {
            (self.staging, self.primary)
        };
        if lo as u64 + self.size as u64 > hi as u64 {
            return Err(AreaError::Overlap);
        }
        Ok(())
    }
}

/// Inconsistency between the layout, the areas and the device.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaError {
    /// The resolved layout does not fit in an area.
    RegionTooLarge {
        /// Layout size.
        required: u32,
        /// Area size.
        available: u32,
    },
    /// An area boundary is not on an erase granule.
    Misaligned {
        /// Offending offset or size.
        offset: u32,
        /// Erase granule.
        granule: u32,
    },
    /// An area extends past the end of the device.
    OutsideDevice {
        /// End of the area.
        end: u64,
        /// Device capacity.
        capacity: u32,
    },
    /// Primary and staging areas share bytes.
    Overlap,
    /// The device cannot program 4-byte words at 4-byte alignment.
    UnsupportedWriteSize(u32),
}

impl fmt::Display for AreaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionTooLarge {
                required,
                available,
            } => write!(
                f,
                "Region needs {} bytes but the area holds {}",
                required, available
            ),
            Self::Misaligned { offset, granule } => write!(
                f,
                "Offset {:#x} is not aligned to the {} byte erase granule",
                offset, granule
            ),
            Self::OutsideDevice { end, capacity } => write!(
                f,
                "Area ends at {:#x}, past the device capacity {:#x}",
                end, capacity
            ),
            Self::Overlap => write!(f, "Primary and staging areas overlap"),
            Self::UnsupportedWriteSize(size) => {
                write!(f, "Program granularity of {} bytes is not supported", size)
            }
        }
    }
}

impl core::error::Error for AreaError {}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: FlashGeometry = FlashGeometry {
        capacity: 0x10_000,
        granule_size: 0x1000,
        write_size: 4,
        medium: Medium::EraseBeforeWrite,
    };

    #[test]
    fn test_contiguous_area_is_valid() {
        let area = AreaConfig::contiguous(0xE000, 0x1000);
        assert_eq!(area.footprint(), 0x2000);
        assert_eq!(area.validate(980, &GEOMETRY), Ok(()));
    }

    #[test]
    fn test_region_too_large() {
        let area = AreaConfig::contiguous(0, 0x1000);
        assert_eq!(
            area.validate(0x1004, &GEOMETRY),
            Err(AreaError::RegionTooLarge {
                required: 0x1004,
                available: 0x1000
            })
        );
    }

    #[test]
    fn test_misaligned_area() {
        let area = AreaConfig::new(0x100, 0x2000, 0x1000);
        assert_eq!(
            area.validate(64, &GEOMETRY),
            Err(AreaError::Misaligned {
                offset: 0x100,
                granule: 0x1000
            })
        );
    }

    #[test]
    fn test_outside_device() {
        let area = AreaConfig::contiguous(0xF000, 0x1000);
        assert!(matches!(
            area.validate(64, &GEOMETRY),
            Err(AreaError::OutsideDevice { end: 0x11_000, .. })
        ));
    }

    #[test]
    fn test_overlap() {
        let area = AreaConfig::new(0x2000, 0x1000, 0x2000);
        assert_eq!(area.validate(64, &GEOMETRY), Err(AreaError::Overlap));
    }

    #[test]
    fn test_write_size() {
        let wide = FlashGeometry {
            write_size: 16,
            ..GEOMETRY
        };
        let area = AreaConfig::contiguous(0, 0x1000);
        assert_eq!(area.validate(64, &wide), Err(AreaError::UnsupportedWriteSize(16)));
    }

    #[test]
    fn test_granule_start() {
        assert_eq!(GEOMETRY.granule_start(0x1FFF), 0x1000);
        assert_eq!(GEOMETRY.granule_start(0x2000), 0x2000);
    }
}
