//! Motor name-plate parameters
//!
//! Hurst DMA0204024B101 (AC300022, "Long Hurst").

/// Number of pole pairs
pub const POLE_PAIRS: u8 = 5;

/// Motor speed at the lowest control input (RPM)
pub const MINIMUM_SPEED_RPM: u16 = 200;

/// Motor speed at the highest control input (RPM)
pub const MAXIMUM_SPEED_RPM: u16 = 3500;

/// Safe speed to change rotation direction (RPM)
pub const DIRECTION_CHANGE_SPEED_RPM: u16 = 50;

/// Rated bus current, RMS amps
pub const NOMINAL_CURRENT_BUS_RMS: f32 = 3.4;
