//! Value objects - immutable, validated configuration of the backing flash.

mod area;

pub use area::{AreaConfig, AreaError, FlashGeometry, Medium, ERASED_WORD};
