//! # Prelude

pub use fugit::RateExtU32;
