//! Region initializer.

use super::{ActiveCopy, CHUNK, OtpNvRegion};
use crate::domain::{
    error::OtpError, layout::OTP_NV_COUNTERS_INITIALIZED, ports::FlashPrimitives,
};

impl<F: FlashPrimitives> OtpNvRegion<F> {
    /// Bring the region into a committed state.
    ///
    /// - Primary committed: nothing is written.
    /// - Only the staging copy committed (a write was interrupted): the
    ///   primary is rebuilt from it, keeping its generation.
    /// - Neither committed: the primary is formatted. Every payload byte is
    ///   zeroed, `swap_count` is set to 0 and the marker is programmed last.
    ///
    /// Calling `init` again is a no-op.
    ///
    /// # Errors
    ///
    /// [`OtpError::Inconsistent`] if the areas do not fit the layout or the
    /// device, [`OtpError::Flash`] if a primitive fails.
    pub fn init(&mut self) -> Result<(), OtpError<F::Error>> {
        let geometry = self.flash.geometry();
        self.area
            .validate(self.layout.size(), &geometry)
            .map_err(|e| {
                error!("Area configuration rejected: {}", e);
                OtpError::Inconsistent(e)
            })?;

        if let Some(generation) = self.probe(ActiveCopy::Primary)? {
            debug!("Region committed at generation {}", generation);
            self.active = Some(ActiveCopy::Primary);
            return Ok(());
        }

        if let Some(generation) = self.probe(ActiveCopy::Staging)? {
            warn!("Interrupted write found, restoring generation {}", generation);
            self.active = Some(ActiveCopy::Staging);
            return self.restore_primary(generation);
        }

        info!("No committed copy, formatting {} byte region", self.layout.size());
        self.format()
    }

    fn format(&mut self) -> Result<(), OtpError<F::Error>> {
        self.active = None;
        let base = self.area.primary;
        self.blank(ActiveCopy::Primary)?;

        let zeros = [0u8; CHUNK];
        let payload = self.layout.payload_range();
        let mut offset = payload.start;
        while offset < payload.end {
            let n = (payload.end - offset).min(CHUNK as u32);
            self.flash
                .program(base + offset, &zeros[..n as usize])
                .map_err(OtpError::Flash)?;
            offset += n;
        }

        self.program_word(base, self.layout.swap_count_offset(), 0)?;
        // Marker last: a cut before this point leaves the copy uncommitted.
        self.program_word(base, 0, OTP_NV_COUNTERS_INITIALIZED)?;
        self.active = Some(ActiveCopy::Primary);
        Ok(())
    }
}
