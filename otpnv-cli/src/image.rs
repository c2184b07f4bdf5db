//! Flash image files
//!
//! An image holds the primary area followed by the staging area, each sized
//! to the layout rounded up to the `RamFlash` erase granule.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use otpnv::{
    AreaConfig, ERASED_WORD, Medium, OTP_NV_COUNTERS_INITIALIZED, OtpNvRegion, RAM_FLASH_ERASE_SIZE,
    RamFlash, RegionLayout,
};

/// State of one copy inside an image, read without touching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    /// Marker and generation are both programmed.
    Committed(u32),
    /// Anything else.
    Invalid,
}

/// A flash image loaded into memory.
pub struct Image {
    path: PathBuf,
    bytes: Vec<u8>,
    layout: RegionLayout,
    medium: Medium,
}

impl Image {
    /// Area placement used for every image of `layout`.
    pub fn area(layout: &RegionLayout) -> AreaConfig {
        let granule = RAM_FLASH_ERASE_SIZE as u32;
        let size = layout.size().div_ceil(granule) * granule;
        AreaConfig::contiguous(0, size)
    }

    /// Load an existing image.
    pub fn open(path: &Path, layout: RegionLayout, medium: Medium) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let expected = Self::area(&layout).footprint() as usize;
        if bytes.len() != expected {
            bail!(
                "{} is {} bytes but this layout needs a {} byte image",
                path.display(),
                bytes.len(),
                expected
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            layout,
            medium,
        })
    }

    /// Load an image, or start from blank flash if the file does not exist.
    pub fn open_or_blank(path: &Path, layout: RegionLayout, medium: Medium) -> Result<Self> {
        if path.exists() {
            return Self::open(path, layout, medium);
        }
        log::info!("{} does not exist, starting from blank flash", path.display());
        let blank = match medium {
            Medium::EraseBeforeWrite => 0xFF,
            Medium::Rewritable => 0x00,
        };
        Ok(Self {
            path: path.to_path_buf(),
            bytes: vec![blank; Self::area(&layout).footprint() as usize],
            layout,
            medium,
        })
    }

    /// Write the image back to its file.
    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, &self.bytes)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Inspect the primary and staging copies.
    pub fn copies(&self) -> (CopyState, CopyState) {
        let area = Self::area(&self.layout);
        (self.copy_state(area.primary), self.copy_state(area.staging))
    }

    fn copy_state(&self, base: u32) -> CopyState {
        let word = |offset: u32| {
            let at = (base + offset) as usize;
            let mut w = [0u8; 4];
            w.copy_from_slice(&self.bytes[at..at + 4]);
            u32::from_le_bytes(w)
        };
        let generation = word(self.layout.swap_count_offset());
        if word(0) == OTP_NV_COUNTERS_INITIALIZED && generation != ERASED_WORD {
            CopyState::Committed(generation)
        } else {
            CopyState::Invalid
        }
    }

    /// Initialized region over the in-memory image.
    pub fn region(&mut self) -> Result<OtpNvRegion<RamFlash<'_>>> {
        let area = Self::area(&self.layout);
        let flash = match self.medium {
            Medium::EraseBeforeWrite => RamFlash::nor(&mut self.bytes),
            Medium::Rewritable => RamFlash::rewritable(&mut self.bytes),
        };
        let mut region = OtpNvRegion::new(flash, self.layout, area);
        region.init().context("Failed to initialize region")?;
        Ok(region)
    }
}
