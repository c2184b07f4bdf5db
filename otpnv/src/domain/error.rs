//! Region errors.
//!
//! Every error falls in one of two classes. Invalid input is always
//! detected before any flash mutation, so the region is unchanged. System
//! errors come from the device or from an inconsistent configuration and
//! may interrupt a write; the commit protocol keeps the last committed
//! generation readable regardless.

use crate::domain::layout::FieldId;
use crate::domain::value_objects::AreaError;
use core::fmt;

/// Coarse classification of an [`OtpError`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was rejected; nothing was written.
    InvalidInput,
    /// The device or the configuration failed.
    SystemError,
}

/// Errors returned by region operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum OtpError<E> {
    /// Zero-length read or write.
    ZeroLength,

    /// Request longer than the layout's element size bound.
    ElementTooLarge {
        /// Requested length.
        len: usize,
        /// Largest accepted length.
        max: u32,
    },

    /// `offset + len` runs past the end of the region.
    OutOfBounds {
        /// Requested offset.
        offset: u32,
        /// Requested length.
        len: usize,
        /// Region size.
        region_size: u32,
    },

    /// Write touches `init_value` or `swap_count`.
    ControlWord(FieldId),

    /// Buffer longer than the addressed field.
    FieldOverrun {
        /// Addressed field.
        field: FieldId,
        /// Buffer length.
        len: usize,
        /// Field size.
        size: u32,
    },

    /// The field is not part of this layout.
    FieldAbsent(FieldId),

    /// The field is not a monotonic counter.
    NotACounter(FieldId),

    /// Write would decrease a monotonic counter.
    CounterRollback {
        /// Counter field.
        field: FieldId,
        /// Currently stored value.
        stored: u32,
        /// Value the write would leave behind.
        requested: u32,
    },

    /// Value does not fit the counter's encoding.
    CounterOverflow {
        /// Counter field.
        field: FieldId,
        /// Requested value.
        value: u32,
        /// Largest representable value.
        capacity: u32,
    },

    /// Flash primitive failure.
    Flash(E),

    /// Layout, areas and device disagree.
    Inconsistent(AreaError),

    /// No committed generation is available; `init` has not succeeded.
    NotInitialized,

    /// `swap_count` cannot be incremented again.
    GenerationExhausted,
}

impl<E> OtpError<E> {
    /// Classify the error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroLength
            | Self::ElementTooLarge { .. }
            | Self::OutOfBounds { .. }
            | Self::ControlWord(_)
            | Self::FieldOverrun { .. }
            | Self::FieldAbsent(_)
            | Self::NotACounter(_)
            | Self::CounterRollback { .. }
            | Self::CounterOverflow { .. } => ErrorKind::InvalidInput,
            Self::Flash(_)
            | Self::Inconsistent(_)
            | Self::NotInitialized
            | Self::GenerationExhausted => ErrorKind::SystemError,
        }
    }

    /// Whether the request was rejected before touching flash.
    #[inline]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidInput)
    }
}

impl<E: fmt::Display> fmt::Display for OtpError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroLength => write!(f, "Zero-length request"),
            Self::ElementTooLarge { len, max } => {
                write!(f, "Request of {} bytes exceeds the {} byte element limit", len, max)
            }
            Self::OutOfBounds {
                offset,
                len,
                region_size,
            } => write!(
                f,
                "Range {:#x}+{} exceeds the {} byte region",
                offset, len, region_size
            ),
            Self::ControlWord(field) => write!(f, "{} is managed by the commit protocol", field),
            Self::FieldOverrun { field, len, size } => {
                write!(f, "{} bytes do not fit the {} byte field {}", len, size, field)
            }
            Self::FieldAbsent(field) => write!(f, "{} is not part of this layout", field),
            Self::NotACounter(field) => write!(f, "{} is not a counter", field),
            Self::CounterRollback {
                field,
                stored,
                requested,
            } => write!(
                f,
                "Refusing to roll {} back from {} to {}",
                field, stored, requested
            ),
            Self::CounterOverflow {
                field,
                value,
                capacity,
            } => write!(f, "{} cannot hold {} (max {})", field, value, capacity),
            Self::Flash(e) => write!(f, "Flash error: {}", e),
            Self::Inconsistent(e) => write!(f, "Inconsistent region configuration: {}", e),
            Self::NotInitialized => write!(f, "Region is not initialized"),
            Self::GenerationExhausted => write!(f, "Generation counter exhausted"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for OtpError<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Inconsistent(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let rollback: OtpError<std::io::Error> = OtpError::CounterRollback {
            field: FieldId::FlashNvCounter(1),
            stored: 5,
            requested: 3,
        };
        assert_eq!(rollback.kind(), ErrorKind::InvalidInput);
        assert!(rollback.is_invalid_input());

        let flash: OtpError<std::io::Error> =
            OtpError::Flash(std::io::Error::new(std::io::ErrorKind::Other, "program fault"));
        assert_eq!(flash.kind(), ErrorKind::SystemError);
        assert_eq!(OtpError::<std::io::Error>::NotInitialized.kind(), ErrorKind::SystemError);
    }

    #[test]
    fn test_rollback_display() {
        let error: OtpError<std::io::Error> = OtpError::CounterRollback {
            field: FieldId::Bl2NvCounter(0),
            stored: 7,
            requested: 3,
        };
        let msg = format!("{}", error);
        assert!(msg.contains("bl2_nv_counter_0"));
        assert!(msg.contains("7"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_inconsistent_has_source() {
        use core::error::Error;

        let error: OtpError<std::io::Error> = OtpError::Inconsistent(AreaError::Overlap);
        assert!(error.source().is_some());
        assert!(format!("{}", error).contains("overlap"));
    }
}
