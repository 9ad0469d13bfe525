//! Control-loop and hardware parameters

use crate::sixstep::q15::q15;
use crate::sixstep::{ControlLoop, PiGains};

use super::motor::{
    DIRECTION_CHANGE_SPEED_RPM, NOMINAL_CURRENT_BUS_RMS, POLE_PAIRS,
};

/// Which loop closes around the motor: open duty, speed or current
pub const CONTROL_LOOP: ControlLoop = ControlLoop::Speed;

/// Control tick period (2.5 kHz)
pub const CONTROL_PERIOD_US: u64 = 400;

const LOOPTIME_SEC: f32 = CONTROL_PERIOD_US as f32 / 1_000_000.0;

/// Board current-sense full scale: amps corresponding to 32767 counts
pub const MAX_BOARD_CURRENT: f32 = 21.3;

/// Convert amps to Q15 counts against the board full scale
const fn norm_current(amps: f32) -> i16 {
    (amps * 32767.0 / MAX_BOARD_CURRENT) as i16
}

/// Rated bus current in Q15 counts
pub const RATED_BUS_CURRENT: i16 = norm_current(NOMINAL_CURRENT_BUS_RMS);

/// Speed control loop PI coefficients
pub const SPEED_PI: PiGains = PiGains {
    kp: 30000,
    ki: 50,
    kc: q15(0.999),
    out_min: 0,
    out_max: q15(0.999),
};

/// Current control loop PI coefficients
pub const CURRENT_PI: PiGains = PiGains {
    kp: 20000,
    ki: 200,
    kc: q15(0.999),
    out_min: 0,
    out_max: q15(0.999),
};

/// Hall-identification current limiter PI coefficients
pub const IDENT_PI: PiGains = PiGains {
    kp: q15(0.8),
    ki: q15(0.003),
    kc: q15(0.999),
    out_min: 0,
    out_max: q15(0.9),
};

/// Current injected while parking the rotor on each vector
pub const IDENT_CURRENT_LIMIT: i16 = norm_current(0.5);

/// Ticks the rotor is given to settle on each voltage vector (1 s)
pub const IDENT_COMMUTATION_INTERVAL: u32 = 2500;

/// Park immediately on a failed sector check instead of finishing the
/// pass for diagnostics
pub const IDENT_ABORT_ON_FAILURE: bool = false;

/// Bus-current offset calibration averages `1 << bits` samples
pub const OFFSET_COUNT_BITS: u8 = 10;

/// Q15 cutoff gain of the bus-current low-pass filter
pub const CURRENT_LPF_GAIN: i16 = q15(0.05);

/// Moving-average window for the hall period: `1 << 4` samples
pub const AVG_FILTER_SCALE: u8 = 4;

/// Hall interval timer rate after prescaling
pub const HALL_TIMER_HZ: u32 = 1_000_000;

/// Speed conversion: rpm = SPEED_MULTIPLIER / period counts
pub const SPEED_MULTIPLIER: u32 =
    (HALL_TIMER_HZ as u64 * 60 / (POLE_PAIRS as u64 * 6)) as u32;

/// Control ticks without a hall edge before the motor counts as stopped:
/// one commutation interval at the safe direction-change speed
pub const MOTOR_STOP_COUNTS: u16 = (60.0
    / ((POLE_PAIRS as u32 * 6) as f32 * (DIRECTION_CHANGE_SPEED_RPM + 1) as f32)
    / LOOPTIME_SEC) as u16;

/// Push-button debounce delay
pub const BUTTON_DEBOUNCE_MS: u64 = 20;

/// PWM settings
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// Switching frequency
    pub const FREQUENCY: Hertz = Hertz(50_000);

    /// Dead time in timer counts
    pub const DEAD_TIME: u16 = 16;
}
