//! OtpNvRegion domain service - the initializer and accessor.
//!
//! The region is stored twice: a primary copy that normally serves every
//! request, and a staging copy that holds a snapshot of the committed
//! generation while the primary is rewritten. A copy is committed when its
//! `init_value` holds the marker and its trailing `swap_count` has been
//! programmed (is not [`ERASED_WORD`]).
//!
//! Reads always come from the authoritative copy, so they never observe a
//! write that has not reached its commit step.

mod commit;
mod init;

use crate::domain::{
    counter::COUNTER_FIELD_MAX,
    error::OtpError,
    layout::{FieldEntry, FieldId, RegionLayout, OTP_NV_COUNTERS_INITIALIZED},
    ports::FlashPrimitives,
    value_objects::{AreaConfig, ERASED_WORD},
};

/// Bytes moved per flash operation when copying or filling a copy.
const CHUNK: usize = 64;

/// Copy currently holding the committed generation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveCopy {
    /// Normal operation.
    Primary,
    /// A write was interrupted after the primary was invalidated.
    Staging,
}

/// Externally visible state of the region.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    /// `init` has not succeeded yet.
    Uninitialized,
    /// The primary copy is committed.
    Committed,
    /// A write failed mid-way; the previous generation is served from the
    /// staging copy until the next write or `init` rebuilds the primary.
    RollbackPending,
}

/// OTP / NV counter region over a flash device.
///
/// Every operation is blocking. Callers must serialize access; holding the
/// region behind `&mut` does that within one execution context.
///
/// # Examples
///
/// ```
/// use otpnv::{AreaConfig, FieldId, LayoutConfig, OtpNvRegion, RamFlash, RegionLayout};
///
/// const LAYOUT: RegionLayout = RegionLayout::resolve_or_panic(&LayoutConfig::nv_counters_only());
///
/// let mut mem = [0xFFu8; 1024];
/// let area = AreaConfig::contiguous(0, 512);
/// let mut region = OtpNvRegion::new(RamFlash::nor(&mut mem), LAYOUT, area);
///
/// region.init().unwrap();
/// region.set_counter(FieldId::FlashNvCounter(0), 5).unwrap();
/// assert_eq!(region.read_counter(FieldId::FlashNvCounter(0)).unwrap(), 5);
/// assert_eq!(region.generation().unwrap(), 1);
/// ```
pub struct OtpNvRegion<F> {
    flash: F,
    layout: RegionLayout,
    area: AreaConfig,
    active: Option<ActiveCopy>,
}

impl<F> OtpNvRegion<F> {
    /// Create a region. Call [`init`](Self::init) before any access.
    pub const fn new(flash: F, layout: RegionLayout, area: AreaConfig) -> Self {
        Self {
            flash,
            layout,
            area,
            active: None,
        }
    }

    /// The resolved layout.
    pub const fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    /// The area placement.
    pub const fn area(&self) -> &AreaConfig {
        &self.area
    }

    /// Copy currently serving reads, if any.
    pub const fn active_copy(&self) -> Option<ActiveCopy> {
        self.active
    }

    /// Current region state.
    pub const fn status(&self) -> RegionStatus {
        match self.active {
            None => RegionStatus::Uninitialized,
            Some(ActiveCopy::Primary) => RegionStatus::Committed,
            Some(ActiveCopy::Staging) => RegionStatus::RollbackPending,
        }
    }

    /// Get a reference to the underlying flash.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Get a mutable reference to the underlying flash.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Consume the region and return the underlying flash.
    pub fn into_inner(self) -> F {
        self.flash
    }

    #[inline]
    const fn base(&self, copy: ActiveCopy) -> u32 {
        match copy {
            ActiveCopy::Primary => self.area.primary,
            ActiveCopy::Staging => self.area.staging,
        }
    }
}

impl<F: FlashPrimitives> OtpNvRegion<F> {
    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Errors
    ///
    /// - Invalid input if the length is zero, above the element size bound,
    ///   or the range leaves the region.
    /// - [`OtpError::NotInitialized`] before a successful `init`.
    /// - [`OtpError::Flash`] if the device read fails.
    pub fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), OtpError<F::Error>> {
        self.check_range(offset, buf.len())?;
        let copy = self.active.ok_or(OtpError::NotInitialized)?;
        let base = self.base(copy);
        self.flash
            .raw_read(base + offset, buf)
            .map_err(OtpError::Flash)
    }

    /// Look up a field of this layout.
    pub fn field(&self, id: FieldId) -> Result<FieldEntry, OtpError<F::Error>> {
        self.layout.field(id).ok_or(OtpError::FieldAbsent(id))
    }

    /// Read the leading `buf.len()` bytes of a field.
    pub fn read_field(&mut self, id: FieldId, buf: &mut [u8]) -> Result<(), OtpError<F::Error>> {
        let entry = self.field_for(id, buf.len())?;
        self.read(entry.offset, buf)
    }

    /// Write `data` at the start of a field.
    pub fn write_field(&mut self, id: FieldId, data: &[u8]) -> Result<(), OtpError<F::Error>> {
        let entry = self.field_for(id, data.len())?;
        self.write(entry.offset, data)
    }

    /// Decode a monotonic counter.
    pub fn read_counter(&mut self, id: FieldId) -> Result<u32, OtpError<F::Error>> {
        let entry = self.field(id)?;
        let encoding = id.counter_encoding().ok_or(OtpError::NotACounter(id))?;
        let mut bytes = [0u8; COUNTER_FIELD_MAX];
        let bytes = &mut bytes[..entry.size as usize];
        self.read(entry.offset, bytes)?;
        Ok(encoding.decode(bytes))
    }

    /// Store a new counter value.
    ///
    /// The whole field is rewritten in its canonical encoding. Lower values
    /// than the stored one are rejected like any other rollback.
    pub fn set_counter(&mut self, id: FieldId, value: u32) -> Result<(), OtpError<F::Error>> {
        let entry = self.field(id)?;
        let encoding = id.counter_encoding().ok_or(OtpError::NotACounter(id))?;
        let mut bytes = [0u8; COUNTER_FIELD_MAX];
        let bytes = &mut bytes[..entry.size as usize];
        encoding
            .encode(value, bytes)
            .ok_or(OtpError::CounterOverflow {
                field: id,
                value,
                capacity: encoding.capacity(entry.size as usize),
            })?;
        self.write(entry.offset, bytes)
    }

    /// Committed `swap_count`: the number of writes committed since init.
    pub fn generation(&mut self) -> Result<u32, OtpError<F::Error>> {
        let copy = self.active.ok_or(OtpError::NotInitialized)?;
        self.read_word(self.base(copy), self.layout.swap_count_offset())
    }

    fn field_for(&self, id: FieldId, len: usize) -> Result<FieldEntry, OtpError<F::Error>> {
        let entry = self.field(id)?;
        if len > entry.size as usize {
            return Err(OtpError::FieldOverrun {
                field: id,
                len,
                size: entry.size,
            });
        }
        Ok(entry)
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), OtpError<F::Error>> {
        if len == 0 {
            return Err(OtpError::ZeroLength);
        }
        let max = self.layout.element_size_max();
        if len > max as usize {
            return Err(OtpError::ElementTooLarge { len, max });
        }
        let region_size = self.layout.size();
        if offset as u64 + len as u64 > region_size as u64 {
            return Err(OtpError::OutOfBounds {
                offset,
                len,
                region_size,
            });
        }
        Ok(())
    }

    /// Generation held by `copy`, or `None` if that copy is not committed.
    fn probe(&mut self, copy: ActiveCopy) -> Result<Option<u32>, OtpError<F::Error>> {
        let base = self.base(copy);
        let marker = self.read_word(base, 0)?;
        let generation = self.read_word(base, self.layout.swap_count_offset())?;
        Ok((marker == OTP_NV_COUNTERS_INITIALIZED && generation != ERASED_WORD).then_some(generation))
    }

    fn read_word(&mut self, base: u32, offset: u32) -> Result<u32, OtpError<F::Error>> {
        let mut word = [0u8; 4];
        self.flash
            .raw_read(base + offset, &mut word)
            .map_err(OtpError::Flash)?;
        Ok(u32::from_le_bytes(word))
    }

    fn program_word(&mut self, base: u32, offset: u32, value: u32) -> Result<(), OtpError<F::Error>> {
        self.flash
            .program(base + offset, &value.to_le_bytes())
            .map_err(OtpError::Flash)
    }
}

/// Copy the part of `data` (placed at region offset `at`) that falls inside
/// `chunk` (placed at region offset `chunk_offset`).
fn overlay(chunk: &mut [u8], chunk_offset: u32, at: u32, data: &[u8]) {
    let chunk_end = chunk_offset as u64 + chunk.len() as u64;
    let data_end = at as u64 + data.len() as u64;
    let lo = (chunk_offset as u64).max(at as u64);
    let hi = chunk_end.min(data_end);
    if lo >= hi {
        return;
    }
    let dst = (lo - chunk_offset as u64) as usize..(hi - chunk_offset as u64) as usize;
    let src = (lo - at as u64) as usize..(hi - at as u64) as usize;
    chunk[dst].copy_from_slice(&data[src]);
}

#[cfg(test)]
mod tests;
