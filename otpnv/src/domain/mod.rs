//! Domain layer - region layout, protocol rules and the flash port.
//!
//! Nothing in here knows about a concrete flash part. The domain talks to
//! storage only through the [`FlashPrimitives`] port, which the adapter
//! layer implements.
//!
//! ```text
//!     ┌──────────────────────────────────┐
//!     │      Domain Layer (Core)         │
//!     │                                  │
//!     │  ┌────────────────────────────┐  │
//!     │  │  Layout & Value Objects    │  │
//!     │  │  - RegionLayout, FieldId   │  │
//!     │  │  - AreaConfig, Geometry    │  │
//!     │  └────────────────────────────┘  │
//!     │              ▲                   │
//!     │  ┌────────────────────────────┐  │
//!     │  │    OtpNvRegion             │  │
//!     │  │    init / read / write     │  │
//!     │  └────────────────────────────┘  │
//!     │              ▼                   │
//!     │  ┌────────────────────────────┐  │
//!     │  │    FlashPrimitives (port)  │  │
//!     │  └────────────────────────────┘  │
//!     └──────────────────────────────────┘
//!                    ▲
//!                    │ implemented by
//!     ┌──────────────────────────────────┐
//!     │  NorFlashAdapter / RamFlash      │
//!     └──────────────────────────────────┘
//! ```

pub mod counter;
pub mod error;
pub mod layout;
pub mod ports;
pub mod region;
pub mod value_objects;

pub use counter::CounterEncoding;
pub use error::{ErrorKind, OtpError};
pub use layout::{
    Bl2Config, FieldEntry, FieldId, LayoutConfig, LayoutError, RegionLayout,
    RotpkRepresentation, SignatureAlgorithm, UnknownField, FLASH_NV_COUNTER_AM,
    OTP_ELEMENT_SIZE_LIMIT, OTP_NV_COUNTERS_INITIALIZED,
};
pub use ports::FlashPrimitives;
pub use region::{ActiveCopy, OtpNvRegion, RegionStatus};
pub use value_objects::{AreaConfig, AreaError, FlashGeometry, Medium, ERASED_WORD};
