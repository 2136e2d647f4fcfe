//! 框架集成

#[cfg(feature = "axum")]
pub mod axum;

#[cfg(feature = "tower")]
pub mod outgoing;

#[cfg(feature = "reqwest")]
pub mod reqwest;
