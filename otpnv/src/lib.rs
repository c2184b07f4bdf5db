//! Power-loss safe flash backend for OTP provisioning data and NV counters.
//!
//! A single flash-backed region holds provisioning material (HUK, IAK,
//! ROTPK slots, lifecycle state, entropy seed) next to the anti-rollback
//! counters consumed by secure boot. Its byte layout is fixed per build
//! configuration and every update is atomic across power loss.
//!
//! # Architecture
//!
//! The crate follows a ports-and-adapters split:
//!
//! ## Domain Layer (`domain`)
//! - **Layout**: `LayoutConfig` resolved into a `RegionLayout` offset table
//! - **Value Objects**: `AreaConfig`, `FlashGeometry`
//! - **Ports**: `FlashPrimitives` (erase / program / raw read)
//! - **Services**: `OtpNvRegion` (initializer, accessor, commit protocol)
//!
//! ## Adapter Layer (`adapters`)
//! - **`NorFlashAdapter`**: `embedded-storage` NOR flash behind the port
//! - **`RamFlash`**: in-memory flash with power-cut injection
//!
//! # Region format
//!
//! ```text
//! offset 0                                               size - 4
//! ┌────────────┬──────────────────────────────────────┬────────────┐
//! │ init_value │ payload fields (per LayoutConfig)    │ swap_count │
//! └────────────┴──────────────────────────────────────┴────────────┘
//! ```
//!
//! `init_value` holds [`OTP_NV_COUNTERS_INITIALIZED`] once the region is
//! provisioned and `swap_count` counts committed writes. A write is only
//! visible once its incremented `swap_count` has been programmed.
//!
//! # Quick Start
//!
//! ```ignore
//! use otpnv::{AreaConfig, FieldId, LayoutConfig, OtpNvRegion, RegionLayout};
//!
//! const LAYOUT: RegionLayout = RegionLayout::resolve_or_panic(&LayoutConfig::tfm_default());
//!
//! let area = AreaConfig::contiguous(0x7_0000, 0x1000);
//! let mut region = OtpNvRegion::new(NorFlashAdapter::new(flash), LAYOUT, area);
//! region.init()?;
//!
//! region.set_counter(FieldId::Bl2NvCounter(0), 3)?;
//! assert_eq!(region.read_counter(FieldId::Bl2NvCounter(0))?, 3);
//! ```
//!
//! # Features
//!
//! - `embedded-storage` (default): `NorFlashAdapter` for `embedded-storage` NOR traits
//! - `log`: log through the `log` facade
//! - `defmt`: log through `defmt` for embedded targets

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

pub mod domain;
pub mod adapters;

pub use domain::{
    ActiveCopy, AreaConfig, AreaError, Bl2Config, CounterEncoding, ErrorKind, FieldEntry,
    FieldId, FlashGeometry, FlashPrimitives, LayoutConfig, LayoutError, Medium, OtpError,
    OtpNvRegion, RegionLayout, RegionStatus, RotpkRepresentation, SignatureAlgorithm,
    UnknownField, ERASED_WORD, FLASH_NV_COUNTER_AM, OTP_ELEMENT_SIZE_LIMIT,
    OTP_NV_COUNTERS_INITIALIZED,
};

pub use adapters::{RamFlash, RamFlashError, RAM_FLASH_ERASE_SIZE, RAM_FLASH_WRITE_SIZE};

#[cfg(feature = "embedded-storage")]
pub use adapters::{NorFlashAdapter, NorFlashError};
