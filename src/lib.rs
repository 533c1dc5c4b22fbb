//! Reading layer for decoded METAR reports: visibility normalization, sky/visibility
//! classification, wind bearings and narrative condensing, plus a blocking client for the
//! decoding service.

pub mod decoder;
pub mod units;
pub mod weather;

pub use decoder::{ApiStatus, Client, Report};
pub use units::direction::bearing_for;
pub use units::visibility::normalize;
pub use weather::{classify, condense, Condition};
