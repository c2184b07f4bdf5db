//! Adapter layer - Concrete implementations of the flash port.
//!
//! ```text
//!     ┌──────────────────────────────────┐
//!     │      Domain Layer                │
//!     │  - OtpNvRegion (service)         │
//!     │  - FlashPrimitives (port)        │
//!     └────────────┬─────────────────────┘
//!                  │
//!                  │ implements
//!                  ▼
//!     ┌──────────────────────────────────┐
//!     │      Adapter Layer               │  ◄── This module
//!     │  - NorFlashAdapter               │
//!     │  - RamFlash                      │
//!     └────────────┬─────────────────────┘
//!                  │
//!                  │ uses
//!                  ▼
//!     ┌──────────────────────────────────┐
//!     │  Platform flash driver / memory  │
//!     └──────────────────────────────────┘
//! ```
//!
//! # Available Adapters
//!
//! - **`NorFlashAdapter`**: Adapts `embedded-storage` `NorFlash` to `FlashPrimitives`
//!   (requires `embedded-storage`)
//! - **`RamFlash`**: Byte-slice flash for host tools and tests

mod ram_flash;

#[cfg(feature = "embedded-storage")]
mod nor_flash_adapter;

pub use ram_flash::{RAM_FLASH_ERASE_SIZE, RAM_FLASH_WRITE_SIZE, RamFlash, RamFlashError};

#[cfg(feature = "embedded-storage")]
pub use nor_flash_adapter::{NorFlashAdapter, NorFlashError};
