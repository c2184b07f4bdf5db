//! Atomic write protocol.
//!
//! A write goes through three phases:
//!
//! 1. Stage: the committed primary is snapshotted into the staging area,
//!    including its `swap_count`. From here on the staging copy is
//!    authoritative.
//! 2. Rebuild: the primary is blanked (the granule holding `swap_count`
//!    first) and refilled from the snapshot with the new bytes merged in.
//!    `swap_count` stays erased.
//! 3. Commit: the primary `swap_count` is programmed with the next
//!    generation. This single word program is the commit point.
//!
//! A cut anywhere before step 3 leaves the primary uncommitted and the
//! staging copy committed, so `init` restores the previous generation. A
//! cut after it leaves the new generation in the primary.

use super::{ActiveCopy, CHUNK, OtpNvRegion, overlay};
use crate::domain::{
    counter::COUNTER_FIELD_MAX,
    error::OtpError,
    ports::FlashPrimitives,
    value_objects::{ERASED_WORD, Medium},
};

impl<F: FlashPrimitives> OtpNvRegion<F> {
    /// Atomically replace `data.len()` bytes starting at `offset`.
    ///
    /// On success the new bytes and an incremented generation are visible
    /// to every later read. On failure reads keep returning the previous
    /// generation.
    ///
    /// # Errors
    ///
    /// - Invalid input, with nothing written, if the range is empty, too
    ///   long or out of bounds, touches `init_value` or `swap_count`, or
    ///   would lower a counter.
    /// - [`OtpError::NotInitialized`] before a successful `init`.
    /// - [`OtpError::GenerationExhausted`] once `swap_count` cannot grow.
    /// - [`OtpError::Flash`] if a primitive fails mid-way.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), OtpError<F::Error>> {
        self.check_range(offset, data.len())?;
        let control = self
            .layout
            .overlapping(offset, data.len() as u32)
            .find(|entry| entry.id.is_control())
            .map(|entry| entry.id);
        if let Some(id) = control {
            return Err(OtpError::ControlWord(id));
        }

        let source = self.active.ok_or(OtpError::NotInitialized)?;
        let generation = self.read_word(self.base(source), self.layout.swap_count_offset())?;
        if generation >= ERASED_WORD - 1 {
            return Err(OtpError::GenerationExhausted);
        }
        self.check_counters(source, offset, data)?;

        if source == ActiveCopy::Primary {
            self.snapshot(generation)?;
            self.active = Some(ActiveCopy::Staging);
        }
        self.rebuild_primary(Some((offset, data)))?;

        self.program_word(self.area.primary, self.layout.swap_count_offset(), generation + 1)?;
        self.active = Some(ActiveCopy::Primary);
        trace!(
            "Committed {} bytes at {}, generation {}",
            data.len(),
            offset,
            generation + 1
        );
        Ok(())
    }

    /// Reject writes that would decrease any counter they touch.
    fn check_counters(
        &mut self,
        source: ActiveCopy,
        offset: u32,
        data: &[u8],
    ) -> Result<(), OtpError<F::Error>> {
        let base = self.base(source);
        for entry in self.layout.overlapping(offset, data.len() as u32) {
            let Some(encoding) = entry.id.counter_encoding() else {
                continue;
            };
            let size = entry.size as usize;

            let mut stored_buf = [0u8; COUNTER_FIELD_MAX];
            let stored = &mut stored_buf[..size];
            self.flash
                .raw_read(base + entry.offset, stored)
                .map_err(OtpError::Flash)?;

            let mut updated_buf = [0u8; COUNTER_FIELD_MAX];
            let updated = &mut updated_buf[..size];
            updated.copy_from_slice(stored);
            overlay(updated, entry.offset, offset, data);

            let stored = encoding.decode(stored);
            let requested = encoding.decode(updated);
            if requested < stored {
                warn!(
                    "Rejected rollback of {} from {} to {}",
                    entry.id.name(),
                    stored,
                    requested
                );
                return Err(OtpError::CounterRollback {
                    field: entry.id,
                    stored,
                    requested,
                });
            }
        }
        Ok(())
    }

    /// Copy the committed primary, `swap_count` included, into staging.
    fn snapshot(&mut self, generation: u32) -> Result<(), OtpError<F::Error>> {
        self.blank(ActiveCopy::Staging)?;
        self.copy_payload(ActiveCopy::Primary, ActiveCopy::Staging, None)?;
        self.program_word(self.area.staging, self.layout.swap_count_offset(), generation)
    }

    /// Rebuild the primary from staging after an interrupted write.
    pub(super) fn restore_primary(&mut self, generation: u32) -> Result<(), OtpError<F::Error>> {
        self.rebuild_primary(None)?;
        self.program_word(self.area.primary, self.layout.swap_count_offset(), generation)?;
        self.active = Some(ActiveCopy::Primary);
        Ok(())
    }

    /// Refill the primary from staging, leaving `swap_count` erased.
    fn rebuild_primary(&mut self, patch: Option<(u32, &[u8])>) -> Result<(), OtpError<F::Error>> {
        self.blank(ActiveCopy::Primary)?;
        self.copy_payload(ActiveCopy::Staging, ActiveCopy::Primary, patch)
    }

    /// Invalidate a copy and make it programmable.
    ///
    /// The `swap_count` word is invalidated before anything else, so a copy
    /// that is only partly blanked already reads as uncommitted.
    pub(super) fn blank(&mut self, copy: ActiveCopy) -> Result<(), OtpError<F::Error>> {
        let base = self.base(copy);
        let swap = self.layout.swap_count_offset();
        let geometry = self.flash.geometry();

        match geometry.medium {
            Medium::EraseBeforeWrite => {
                let swap_granule = geometry.granule_start(base + swap);
                self.flash.erase(swap_granule).map_err(OtpError::Flash)?;

                let end = base + self.layout.size();
                let mut granule = base;
                while granule < end {
                    if granule != swap_granule {
                        self.flash.erase(granule).map_err(OtpError::Flash)?;
                    }
                    granule += geometry.granule_size;
                }
            }
            Medium::Rewritable => {
                self.program_word(base, swap, ERASED_WORD)?;
                self.program_word(base, 0, ERASED_WORD)?;
            }
        }
        Ok(())
    }

    /// Copy `[0, swap_count)` between copies, merging `patch` on the way.
    fn copy_payload(
        &mut self,
        from: ActiveCopy,
        to: ActiveCopy,
        patch: Option<(u32, &[u8])>,
    ) -> Result<(), OtpError<F::Error>> {
        let src = self.base(from);
        let dst = self.base(to);
        let end = self.layout.swap_count_offset();
        let mut buf = [0u8; CHUNK];

        let mut offset = 0;
        while offset < end {
            let n = (end - offset).min(CHUNK as u32) as usize;
            let chunk = &mut buf[..n];
            self.flash
                .raw_read(src + offset, chunk)
                .map_err(OtpError::Flash)?;
            if let Some((at, data)) = patch {
                overlay(chunk, offset, at, data);
            }
            self.flash
                .program(dst + offset, chunk)
                .map_err(OtpError::Flash)?;
            offset += n as u32;
        }
        Ok(())
    }
}
