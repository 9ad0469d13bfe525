//! Configuration module
//!
//! Compile-time motor and control parameters. Everything the control core
//! consumes is a constant here; there is no runtime configuration layer.

pub mod motor;
pub mod params;

pub use motor::*;
pub use params::*;
