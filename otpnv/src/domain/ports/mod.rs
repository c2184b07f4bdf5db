//! Ports - interfaces the domain needs from the outside world.

mod flash;

pub use flash::FlashPrimitives;
