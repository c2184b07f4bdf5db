//! Region layout model.
//!
//! A [`LayoutConfig`] names which feature blocks a platform carries. It is
//! resolved once, usually in a `const`, into a [`RegionLayout`]: an ordered
//! table of `(field, offset, size)` entries and the total region size.
//! Field placement never depends on compiler struct packing, so two builds
//! with the same configuration agree on every offset. That is what lets a
//! firmware upgrade keep reading data provisioned by an older image.

mod field;

pub use field::{FieldId, UnknownField};

use core::fmt;
use core::ops::Range;

/// Marker stored in `init_value` once the region is initialized.
pub const OTP_NV_COUNTERS_INITIALIZED: u32 = 0xC0DE_8112;

/// Number of generic flash NV counters.
pub const FLASH_NV_COUNTER_AM: usize = 3;

/// Maximum number of non-secure NV counters.
pub const MAX_NS_NV_COUNTERS: u8 = 3;

/// Size of the `init_value` and `swap_count` words.
pub const CONTROL_WORD_SIZE: u32 = 4;

/// Upper bound of [`RegionLayout::element_size_max`] across all configurations.
pub const OTP_ELEMENT_SIZE_LIMIT: usize = 100;

/// Element size bound when no ROTPK slot is larger.
const OTP_ELEMENT_SIZE_FLOOR: u32 = 64;

/// Capacity of the offset table.
const MAX_FIELDS: usize = FieldId::ALL.len();

/// Signature scheme used to verify BL2 images.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// ECDSA P-256.
    Ec256,
    /// ECDSA P-384.
    Ec384,
    /// RSA (only the key hash can be stored).
    Rsa,
}

/// How BL2 ROTPK slots are stored.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotpkRepresentation {
    /// Hash of the public key.
    Hash,
    /// Full public key, padded to a 4-byte multiple.
    BuiltinKey,
}

/// BL2 stage configuration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bl2Config {
    /// Image signature scheme.
    pub algorithm: SignatureAlgorithm,
    /// Key slot representation.
    pub representation: RotpkRepresentation,
}

impl Bl2Config {
    /// Create a BL2 configuration.
    pub const fn new(algorithm: SignatureAlgorithm, representation: RotpkRepresentation) -> Self {
        Self {
            algorithm,
            representation,
        }
    }

    /// Size in bytes of one ROTPK slot.
    ///
    /// # Errors
    ///
    /// RSA keys are only supported as hashes.
    pub const fn rotpk_size(&self) -> Result<u32, LayoutError> {
        match (self.representation, self.algorithm) {
            (RotpkRepresentation::Hash, SignatureAlgorithm::Ec384) => Ok(48),
            (RotpkRepresentation::Hash, _) => Ok(32),
            (RotpkRepresentation::BuiltinKey, SignatureAlgorithm::Ec256) => Ok(68),
            (RotpkRepresentation::BuiltinKey, SignatureAlgorithm::Ec384) => Ok(100),
            (RotpkRepresentation::BuiltinKey, SignatureAlgorithm::Rsa) => {
                Err(LayoutError::UnsupportedBuiltinKey(SignatureAlgorithm::Rsa))
            }
        }
    }
}

/// Build configuration selecting which fields exist.
///
/// Bootloader-stage, non-secure counter, entropy and debug fields belong to
/// the identity block and are only laid out when `default_otp` is set. The
/// BL2 ROTPK size still bounds element requests either way.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Identity and key material block.
    pub default_otp: bool,
    /// Generic flash NV counter block.
    pub default_nv_counters: bool,
    /// BL1 stage key slot and counter.
    pub bl1: bool,
    /// BL2 stage key slots and counters.
    pub bl2: Option<Bl2Config>,
    /// Number of non-secure NV counters (0..=3).
    pub ns_nv_counters: u8,
}

impl LayoutConfig {
    /// Identity block and generic counters, no bootloader stages.
    pub const fn new() -> Self {
        Self {
            default_otp: true,
            default_nv_counters: true,
            bl1: false,
            bl2: None,
            ns_nv_counters: 0,
        }
    }

    /// Typical secure-boot platform: BL2 with EC256 key hashes and three
    /// non-secure counters.
    pub const fn tfm_default() -> Self {
        Self::new()
            .with_bl2(Bl2Config::new(SignatureAlgorithm::Ec256, RotpkRepresentation::Hash))
            .with_ns_nv_counters(3)
    }

    /// Only the generic NV counter block.
    pub const fn nv_counters_only() -> Self {
        Self {
            default_otp: false,
            ..Self::new()
        }
    }

    /// Add the BL1 stage.
    pub const fn with_bl1(mut self) -> Self {
        self.bl1 = true;
        self
    }

    /// Add the BL2 stage.
    pub const fn with_bl2(mut self, bl2: Bl2Config) -> Self {
        self.bl2 = Some(bl2);
        self
    }

    /// Set the number of non-secure counters.
    pub const fn with_ns_nv_counters(mut self, count: u8) -> Self {
        self.ns_nv_counters = count;
        self
    }

    /// Drop the identity block.
    pub const fn without_otp(mut self) -> Self {
        self.default_otp = false;
        self
    }

    /// Drop the generic counter block.
    pub const fn without_nv_counters(mut self) -> Self {
        self.default_nv_counters = false;
        self
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when resolving a [`LayoutConfig`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// The signature scheme has no full-key representation.
    UnsupportedBuiltinKey(SignatureAlgorithm),
    /// More non-secure counters than the layout has slots for.
    TooManyNsCounters(u8),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedBuiltinKey(alg) => {
                write!(f, "{:?} ROTPK cannot be stored as a built-in key", alg)
            }
            Self::TooManyNsCounters(n) => write!(
                f,
                "{} non-secure counters requested, at most {} supported",
                n, MAX_NS_NV_COUNTERS
            ),
        }
    }
}

impl core::error::Error for LayoutError {}

/// One row of the offset table.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldEntry {
    /// Field name.
    pub id: FieldId,
    /// Byte offset from the start of the region.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
}

impl FieldEntry {
    const EMPTY: Self = Self {
        id: FieldId::SwapCount,
        offset: 0,
        size: 0,
    };

    /// One past the last byte of the field.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.offset + self.size
    }

    /// Byte range of the field within the region.
    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.offset as usize..self.end() as usize
    }

    /// Whether `[offset, offset + len)` shares at least one byte with the field.
    #[inline]
    pub const fn overlaps(&self, offset: u32, len: u32) -> bool {
        offset < self.end() && self.offset < offset + len
    }
}

/// Resolved, immutable offset table for one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    entries: [FieldEntry; MAX_FIELDS],
    len: usize,
    size: u32,
    element_size_max: u32,
}

struct Builder {
    entries: [FieldEntry; MAX_FIELDS],
    len: usize,
    offset: u32,
}

impl Builder {
    const fn push(mut self, id: FieldId, size: u32) -> Self {
        self.entries[self.len] = FieldEntry {
            id,
            offset: self.offset,
            size,
        };
        self.len += 1;
        self.offset += size;
        self
    }
}

impl RegionLayout {
    /// Resolve a configuration into an offset table.
    ///
    /// # Errors
    ///
    /// Returns an error for configurations with no valid layout.
    ///
    /// # Examples
    ///
    /// ```
    /// use otpnv::{FieldId, LayoutConfig, RegionLayout};
    ///
    /// let layout = RegionLayout::resolve(&LayoutConfig::nv_counters_only()).unwrap();
    /// assert_eq!(layout.size(), 20);
    /// assert_eq!(layout.field(FieldId::FlashNvCounter(1)).unwrap().offset, 8);
    /// ```
    pub const fn resolve(config: &LayoutConfig) -> Result<Self, LayoutError> {
        let rotpk_size = match config.bl2 {
            Some(bl2) => match bl2.rotpk_size() {
                Ok(size) => size,
                Err(e) => return Err(e),
            },
            None => 0,
        };
        if config.ns_nv_counters > MAX_NS_NV_COUNTERS {
            return Err(LayoutError::TooManyNsCounters(config.ns_nv_counters));
        }

        let mut b = Builder {
            entries: [FieldEntry::EMPTY; MAX_FIELDS],
            len: 0,
            offset: 0,
        };

        b = b.push(FieldId::InitValue, CONTROL_WORD_SIZE);

        if config.default_otp {
            b = b
                .push(FieldId::Huk, 32)
                .push(FieldId::Iak, 32)
                .push(FieldId::IakLen, 4)
                .push(FieldId::IakType, 4)
                .push(FieldId::IakId, 32)
                .push(FieldId::BootSeed, 32)
                .push(FieldId::Lcs, 4)
                .push(FieldId::ImplementationId, 32)
                .push(FieldId::CertRef, 32)
                .push(FieldId::VerificationServiceUrl, 32)
                .push(FieldId::ProfileDefinition, 48);

            if config.bl2.is_some() {
                b = b
                    .push(FieldId::Bl2Rotpk(0), rotpk_size)
                    .push(FieldId::Bl2Rotpk(1), rotpk_size);
                let mut i = 0;
                while i < 4 {
                    b = b.push(FieldId::Bl2NvCounter(i), 64);
                    i += 1;
                }
                b = b
                    .push(FieldId::Bl2Rotpk(2), rotpk_size)
                    .push(FieldId::Bl2Rotpk(3), rotpk_size)
                    .push(FieldId::Bl2RotpkPolicies, 4);
            }

            if config.bl1 {
                b = b.push(FieldId::Bl1Rotpk0, 32).push(FieldId::Bl1NvCounter0, 16);
            }

            let mut i = 0;
            while i < config.ns_nv_counters {
                b = b.push(FieldId::NsNvCounter(i), 64);
                i += 1;
            }

            b = b.push(FieldId::EntropySeed, 64).push(FieldId::SecureDebugPk, 32);
        }

        if config.default_nv_counters {
            let mut i = 0;
            while i < FLASH_NV_COUNTER_AM as u8 {
                b = b.push(FieldId::FlashNvCounter(i), 4);
                i += 1;
            }
        }

        b = b.push(FieldId::SwapCount, CONTROL_WORD_SIZE);

        let element_size_max = if rotpk_size > OTP_ELEMENT_SIZE_FLOOR {
            rotpk_size
        } else {
            OTP_ELEMENT_SIZE_FLOOR
        };

        Ok(Self {
            entries: b.entries,
            len: b.len,
            size: b.offset,
            element_size_max,
        })
    }

    /// Resolve a configuration known to be valid, failing the build otherwise.
    ///
    /// Intended for `const` items, where a panic is a compile error.
    pub const fn resolve_or_panic(config: &LayoutConfig) -> Self {
        match Self::resolve(config) {
            Ok(layout) => layout,
            Err(_) => panic!("invalid OTP / NV counter layout configuration"),
        }
    }

    /// Total region size in bytes.
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Largest byte count accepted by one read or write.
    #[inline]
    pub const fn element_size_max(&self) -> u32 {
        self.element_size_max
    }

    /// Offset of the trailing `swap_count` word.
    #[inline]
    pub const fn swap_count_offset(&self) -> u32 {
        self.size - CONTROL_WORD_SIZE
    }

    /// Bytes between the two control words.
    #[inline]
    pub const fn payload_range(&self) -> Range<u32> {
        CONTROL_WORD_SIZE..self.swap_count_offset()
    }

    /// All fields in layout order.
    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries[..self.len]
    }

    /// Look up a field.
    pub fn field(&self, id: FieldId) -> Option<FieldEntry> {
        self.entries().iter().copied().find(|e| e.id == id)
    }

    /// Fields sharing at least one byte with `[offset, offset + len)`.
    pub fn overlapping(&self, offset: u32, len: u32) -> impl Iterator<Item = &FieldEntry> {
        self.entries()
            .iter()
            .filter(move |e| e.size != 0 && e.overlaps(offset, len))
    }

    /// Monotonic counter fields in layout order.
    pub fn counters(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries()
            .iter()
            .filter(|e| e.id.counter_encoding().is_some())
    }
}
