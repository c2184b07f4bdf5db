//! Field identifiers.

use crate::domain::counter::CounterEncoding;
use core::fmt;
use core::str::FromStr;

/// Name of one byte range in the region.
///
/// Indexed variants carry the slot number (`Bl2Rotpk(0)` is `bl2_rotpk_0`).
/// An identifier that is not part of the resolved layout is simply absent;
/// lookups report it rather than panic.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// Initialization marker, always first.
    InitValue,
    /// Hardware-unique key.
    Huk,
    /// Initial attestation key.
    Iak,
    /// IAK length.
    IakLen,
    /// IAK type.
    IakType,
    /// IAK identifier.
    IakId,
    /// Boot seed.
    BootSeed,
    /// Lifecycle state.
    Lcs,
    /// Implementation identifier.
    ImplementationId,
    /// Certification reference.
    CertRef,
    /// Verification service URL.
    VerificationServiceUrl,
    /// Attestation profile definition.
    ProfileDefinition,
    /// BL2 root-of-trust public key slot (0..=3).
    Bl2Rotpk(u8),
    /// BL2 anti-rollback counter (0..=3).
    Bl2NvCounter(u8),
    /// BL2 ROTPK policy word.
    Bl2RotpkPolicies,
    /// BL1 root-of-trust public key.
    Bl1Rotpk0,
    /// BL1 anti-rollback counter.
    Bl1NvCounter0,
    /// Non-secure image counter (0..=2).
    NsNvCounter(u8),
    /// Entropy seed.
    EntropySeed,
    /// Secure debug public key.
    SecureDebugPk,
    /// Generic platform NV counter (0..=2).
    FlashNvCounter(u8),
    /// Generation counter, always last.
    SwapCount,
}

impl FieldId {
    /// Every identifier any layout can contain, in layout order.
    pub const ALL: [FieldId; 32] = [
        FieldId::InitValue,
        FieldId::Huk,
        FieldId::Iak,
        FieldId::IakLen,
        FieldId::IakType,
        FieldId::IakId,
        FieldId::BootSeed,
        FieldId::Lcs,
        FieldId::ImplementationId,
        FieldId::CertRef,
        FieldId::VerificationServiceUrl,
        FieldId::ProfileDefinition,
        FieldId::Bl2Rotpk(0),
        FieldId::Bl2Rotpk(1),
        FieldId::Bl2NvCounter(0),
        FieldId::Bl2NvCounter(1),
        FieldId::Bl2NvCounter(2),
        FieldId::Bl2NvCounter(3),
        FieldId::Bl2Rotpk(2),
        FieldId::Bl2Rotpk(3),
        FieldId::Bl2RotpkPolicies,
        FieldId::Bl1Rotpk0,
        FieldId::Bl1NvCounter0,
        FieldId::NsNvCounter(0),
        FieldId::NsNvCounter(1),
        FieldId::NsNvCounter(2),
        FieldId::EntropySeed,
        FieldId::SecureDebugPk,
        FieldId::FlashNvCounter(0),
        FieldId::FlashNvCounter(1),
        FieldId::FlashNvCounter(2),
        FieldId::SwapCount,
    ];

    /// Snake-case name used in tooling output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::InitValue => "init_value",
            Self::Huk => "huk",
            Self::Iak => "iak",
            Self::IakLen => "iak_len",
            Self::IakType => "iak_type",
            Self::IakId => "iak_id",
            Self::BootSeed => "boot_seed",
            Self::Lcs => "lcs",
            Self::ImplementationId => "implementation_id",
            Self::CertRef => "cert_ref",
            Self::VerificationServiceUrl => "verification_service_url",
            Self::ProfileDefinition => "profile_definition",
            Self::Bl2Rotpk(0) => "bl2_rotpk_0",
            Self::Bl2Rotpk(1) => "bl2_rotpk_1",
            Self::Bl2Rotpk(2) => "bl2_rotpk_2",
            Self::Bl2Rotpk(3) => "bl2_rotpk_3",
            Self::Bl2NvCounter(0) => "bl2_nv_counter_0",
            Self::Bl2NvCounter(1) => "bl2_nv_counter_1",
            Self::Bl2NvCounter(2) => "bl2_nv_counter_2",
            Self::Bl2NvCounter(3) => "bl2_nv_counter_3",
            Self::Bl2RotpkPolicies => "bl2_rotpk_policies",
            Self::Bl1Rotpk0 => "bl1_rotpk_0",
            Self::Bl1NvCounter0 => "bl1_nv_counter_0",
            Self::NsNvCounter(0) => "ns_nv_counter_0",
            Self::NsNvCounter(1) => "ns_nv_counter_1",
            Self::NsNvCounter(2) => "ns_nv_counter_2",
            Self::EntropySeed => "entropy_seed",
            Self::SecureDebugPk => "secure_debug_pk",
            Self::FlashNvCounter(0) => "flash_nv_counter_0",
            Self::FlashNvCounter(1) => "flash_nv_counter_1",
            Self::FlashNvCounter(2) => "flash_nv_counter_2",
            Self::SwapCount => "swap_count",
            Self::Bl2Rotpk(_)
            | Self::Bl2NvCounter(_)
            | Self::NsNvCounter(_)
            | Self::FlashNvCounter(_) => "<invalid slot>",
        }
    }

    /// Counter encoding, if this field is a monotonic counter.
    pub const fn counter_encoding(self) -> Option<CounterEncoding> {
        match self {
            Self::Bl2NvCounter(_) | Self::Bl1NvCounter0 | Self::NsNvCounter(_) => {
                Some(CounterEncoding::Unary)
            }
            Self::FlashNvCounter(_) => Some(CounterEncoding::LittleEndianU32),
            _ => None,
        }
    }

    /// Whether the field is owned by the commit protocol rather than callers.
    pub const fn is_control(self) -> bool {
        matches!(self, Self::InitValue | Self::SwapCount)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A field name that matches no known identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownField;

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field name")
    }
}

impl core::error::Error for UnknownField {}

impl FromStr for FieldId {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldId::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownField)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        for (i, a) in FieldId::ALL.iter().enumerate() {
            for b in &FieldId::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_parse_names() {
        for id in FieldId::ALL {
            assert_eq!(id.name().parse::<FieldId>(), Ok(id));
        }
        assert_eq!("BL2_NV_COUNTER_3".parse::<FieldId>(), Ok(FieldId::Bl2NvCounter(3)));
        assert_eq!("bl2_nv_counter_4".parse::<FieldId>(), Err(UnknownField));
    }

    #[test]
    fn test_counter_classification() {
        assert_eq!(FieldId::Bl1NvCounter0.counter_encoding(), Some(CounterEncoding::Unary));
        assert_eq!(
            FieldId::FlashNvCounter(2).counter_encoding(),
            Some(CounterEncoding::LittleEndianU32)
        );
        assert_eq!(FieldId::Huk.counter_encoding(), None);
        assert!(FieldId::SwapCount.is_control());
        assert!(!FieldId::Lcs.is_control());
    }
}
