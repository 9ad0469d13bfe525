//! Cross-context shared state
//!
//! The slow context (buttons) writes single-word command cells that the
//! fast control loop reads once per tick. Each cell has exactly one writer,
//! so relaxed atomic store/load is the whole synchronization story. The
//! multi-word status snapshot consumed by the LED task lives behind a
//! mutex instead.

use core::sync::atomic::AtomicBool;

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;

use crate::sixstep::ControlState;

/// Motor run/stop command, toggled by button 1.
pub static RUN_COMMAND: AtomicBool = AtomicBool::new(false);

/// Direction command, toggled by button 2. The motor task latches it only
/// while the motor is stopped.
pub static DIRECTION_COMMAND: AtomicBool = AtomicBool::new(false);

/// Status snapshot published by the motor control task.
#[derive(Clone, Copy)]
pub struct MotorStatus {
    pub state: ControlState,
    pub speed_rpm: u16,
    pub hall_fault: bool,
    pub timer_fault: bool,
    pub ident_failed: bool,
}

impl MotorStatus {
    pub const fn new() -> Self {
        Self {
            state: ControlState::Init,
            speed_rpm: 0,
            hall_fault: false,
            timer_fault: false,
            ident_failed: false,
        }
    }

    /// Anything worth latching the fault LED for, including a failed
    /// hall-sequence identification (the motor then runs on the default
    /// table).
    pub fn fault(&self) -> bool {
        self.hall_fault
            || self.timer_fault
            || self.ident_failed
            || matches!(self.state, ControlState::Fault)
    }
}

pub static MOTOR_STATUS: Mutex<ThreadModeRawMutex, MotorStatus> = Mutex::new(MotorStatus::new());
