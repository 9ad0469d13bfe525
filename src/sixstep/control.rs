// Six-step control state machine
//
// Top-level control loop for one motor: selects open-loop duty, closed
// speed or closed current control, maps the direction-corrected hall
// sector to a PWM override pattern and computes the duty for the active
// loop. Transitions happen at most once per tick; Fault is terminal until
// an external reset.

use crate::fmt::*;

use super::commutation::{commutation_sector, PhaseOverride, SectorTable, FLOAT_ALL};
use super::hall::is_valid_sector;
use super::pi::{PiController, PiGains};
use super::q15::{interp_u16, mul_q15, scale_q15_u16};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Zero all control references
    Init,
    /// Select the configured loop
    Loop,
    /// Direct duty from the control input, no feedback
    OpenLoop,
    /// Closed speed loop
    SpeedLoop,
    /// Closed current loop
    CurrentLoop,
    /// Terminal until external reset
    Fault,
}

/// Configured control scheme, fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLoop {
    OpenLoop,
    Speed,
    Current,
}

/// Static per-motor parameters, immutable after load.
#[derive(Debug, Clone, Copy)]
pub struct MotorParameters {
    pub pole_pairs: u8,
    pub min_speed_rpm: u16,
    pub max_speed_rpm: u16,
    /// Rated bus current, Q15 counts
    pub rated_current: i16,
}

impl MotorParameters {
    /// Degenerate motor parameters are configuration defects; reject them
    /// at init time.
    fn validate(&self) {
        assert!(self.pole_pairs > 0);
        assert!(self.min_speed_rpm < self.max_speed_rpm);
        assert!(self.rated_current > 0);
    }
}

/// Inputs sampled once per tick before the state machine runs.
#[derive(Debug, Clone, Copy)]
pub struct ControlInputs {
    /// Hall value sampled this tick (valid sectors 1-6)
    pub sector: u8,
    pub measured_speed: u16,
    /// Direction command, true = reversed
    pub reverse: bool,
    /// Normalized control input (potentiometer), 0-32767 = 0-100%
    pub control_input: i16,
    /// Filtered bus current for the current loop
    pub avg_current: i16,
}

/// What the tick wants the inverter to do.
#[derive(Debug, Clone, Copy)]
pub struct ControlOutput {
    /// False while initializing or faulted: outputs must stay off
    pub active: bool,
    pub duty: u16,
    pub pattern: [PhaseOverride; 3],
}

impl ControlOutput {
    const INACTIVE: Self = Self {
        active: false,
        duty: 0,
        pattern: FLOAT_ALL,
    };
}

pub struct SixStepControl {
    state: ControlState,
    control_loop: ControlLoop,
    motor: MotorParameters,
    /// PWM period in timer counts, the Q15 duty scaling base
    pwm_period: u16,
    table: SectorTable,
    pi_speed: PiController,
    pi_current: PiController,

    sector: u8,
    commutation_sector: u8,
    measured_speed: u16,
    reverse: bool,
    control_input: i16,
    avg_current: i16,

    target_speed: u16,
    target_current: i16,
    target_duty: u16,
    pwm_duty: u16,
}

impl SixStepControl {
    pub fn new(
        motor: MotorParameters,
        control_loop: ControlLoop,
        pwm_period: u16,
        speed_gains: PiGains,
        current_gains: PiGains,
    ) -> Self {
        motor.validate();
        assert!(pwm_period > 0);
        Self {
            state: ControlState::Init,
            control_loop,
            motor,
            pwm_period,
            table: SectorTable::BLDC,
            pi_speed: PiController::new(speed_gains),
            pi_current: PiController::new(current_gains),
            sector: 0,
            commutation_sector: 0,
            measured_speed: 0,
            reverse: false,
            control_input: 0,
            avg_current: 0,
            target_speed: 0,
            target_current: 0,
            target_duty: 0,
            pwm_duty: 0,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn pwm_duty(&self) -> u16 {
        self.pwm_duty
    }

    pub fn target_speed(&self) -> u16 {
        self.target_speed
    }

    /// Install the sector table learned by the hall sequence identifier.
    pub fn set_table(&mut self, table: SectorTable) {
        self.table = table;
    }

    /// Force the Fault state (supervisor decision on sensor faults).
    pub fn force_fault(&mut self) {
        if self.state != ControlState::Fault {
            error!("six-step control: entering fault state");
            self.state = ControlState::Fault;
        }
    }

    /// External reset out of Fault, back through Init.
    pub fn reset(&mut self) {
        self.state = ControlState::Init;
    }

    /// Read the tick's inputs and derive the loop targets.
    fn get_control_inputs(&mut self, inputs: &ControlInputs) {
        self.sector = inputs.sector;
        self.measured_speed = inputs.measured_speed;
        self.reverse = inputs.reverse;
        self.control_input = inputs.control_input.max(0);
        self.commutation_sector = commutation_sector(self.sector, self.reverse);

        match self.control_loop {
            ControlLoop::Speed => {
                self.target_speed = interp_u16(
                    self.motor.min_speed_rpm,
                    self.motor.max_speed_rpm,
                    self.control_input,
                );
            }
            ControlLoop::Current => {
                self.target_current = mul_q15(self.motor.rated_current, self.control_input);
                self.avg_current = inputs.avg_current;
            }
            ControlLoop::OpenLoop => {}
        }
    }

    /// Override pattern for the present commutation sector, or a forced
    /// Fault when the sector is outside 1-6.
    fn sector_pattern(&mut self) -> Option<[PhaseOverride; 3]> {
        if is_valid_sector(self.commutation_sector) {
            Some(self.table.get(self.commutation_sector))
        } else {
            self.force_fault();
            None
        }
    }

    /// Run one tick of the state machine.
    pub fn step(&mut self, inputs: &ControlInputs) -> ControlOutput {
        match self.state {
            ControlState::Init => {
                self.target_speed = 0;
                self.target_current = 0;
                self.target_duty = 0;
                self.pwm_duty = 0;
                self.commutation_sector = 0;
                self.pi_speed.reset();
                self.pi_current.reset();
                self.state = ControlState::Loop;
                ControlOutput::INACTIVE
            }

            ControlState::Loop => {
                self.state = match self.control_loop {
                    ControlLoop::OpenLoop => ControlState::OpenLoop,
                    ControlLoop::Speed => ControlState::SpeedLoop,
                    ControlLoop::Current => ControlState::CurrentLoop,
                };
                info!("six-step control: loop selected");
                ControlOutput::INACTIVE
            }

            ControlState::OpenLoop => {
                self.get_control_inputs(inputs);
                let Some(pattern) = self.sector_pattern() else {
                    return ControlOutput::INACTIVE;
                };
                self.target_duty = scale_q15_u16(self.control_input, self.pwm_period);
                self.pwm_duty = self.target_duty;
                ControlOutput {
                    active: true,
                    duty: self.pwm_duty,
                    pattern,
                }
            }

            ControlState::SpeedLoop => {
                self.get_control_inputs(inputs);
                let Some(pattern) = self.sector_pattern() else {
                    return ControlOutput::INACTIVE;
                };
                let out = self.pi_speed.update(
                    self.target_speed.min(i16::MAX as u16) as i16,
                    self.measured_speed.min(i16::MAX as u16) as i16,
                );
                self.pwm_duty = scale_q15_u16(out, self.pwm_period);
                ControlOutput {
                    active: true,
                    duty: self.pwm_duty,
                    pattern,
                }
            }

            ControlState::CurrentLoop => {
                self.get_control_inputs(inputs);
                let Some(pattern) = self.sector_pattern() else {
                    return ControlOutput::INACTIVE;
                };
                let out = self.pi_current.update(self.target_current, self.avg_current);
                self.pwm_duty = scale_q15_u16(out, self.pwm_period);
                ControlOutput {
                    active: true,
                    duty: self.pwm_duty,
                    pattern,
                }
            }

            ControlState::Fault => ControlOutput::INACTIVE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sixstep::q15::q15;

    fn motor() -> MotorParameters {
        MotorParameters {
            pole_pairs: 5,
            min_speed_rpm: 200,
            max_speed_rpm: 3500,
            rated_current: 5230,
        }
    }

    fn speed_gains() -> PiGains {
        PiGains {
            kp: 30000,
            ki: 50,
            kc: q15(0.999),
            out_min: 0,
            out_max: q15(0.999),
        }
    }

    fn current_gains() -> PiGains {
        PiGains {
            kp: 20000,
            ki: 200,
            kc: q15(0.999),
            out_min: 0,
            out_max: q15(0.999),
        }
    }

    fn inputs(sector: u8, speed: u16, control: i16) -> ControlInputs {
        ControlInputs {
            sector,
            measured_speed: speed,
            reverse: false,
            control_input: control,
            avg_current: 0,
        }
    }

    #[test]
    fn test_init_to_active_loop() {
        let mut ctl = SixStepControl::new(motor(), ControlLoop::OpenLoop, 3400, speed_gains(), current_gains());
        assert_eq!(ctl.state(), ControlState::Init);
        assert!(!ctl.step(&inputs(1, 0, 0)).active);
        assert_eq!(ctl.state(), ControlState::Loop);
        assert!(!ctl.step(&inputs(1, 0, 0)).active);
        assert_eq!(ctl.state(), ControlState::OpenLoop);
        assert!(ctl.step(&inputs(1, 0, 0)).active);
    }

    #[test]
    fn test_open_loop_half_duty() {
        let mut ctl = SixStepControl::new(motor(), ControlLoop::OpenLoop, 3400, speed_gains(), current_gains());
        ctl.step(&inputs(1, 0, 0));
        ctl.step(&inputs(1, 0, 0));
        // 50% control input maps to half the PWM period, within one LSB
        let out = ctl.step(&inputs(1, 0, 16384));
        assert!(out.active);
        assert!(out.duty >= 1699 && out.duty <= 1700);
    }

    #[test]
    fn test_direction_corrected_sector() {
        let mut ctl = SixStepControl::new(motor(), ControlLoop::OpenLoop, 3400, speed_gains(), current_gains());
        ctl.step(&inputs(3, 0, 0));
        ctl.step(&inputs(3, 0, 0));
        let mut reversed = inputs(3, 0, 1000);
        reversed.reverse = true;
        let out = ctl.step(&reversed);
        assert!(out.active);
        // 7 - 3 = 4
        assert_eq!(out.pattern, SectorTable::BLDC.get(4));
    }

    #[test]
    fn test_invalid_sector_forces_fault() {
        let mut ctl = SixStepControl::new(motor(), ControlLoop::OpenLoop, 3400, speed_gains(), current_gains());
        ctl.step(&inputs(0, 0, 0));
        ctl.step(&inputs(0, 0, 0));
        let out = ctl.step(&inputs(0, 0, 1000));
        assert!(!out.active);
        assert_eq!(ctl.state(), ControlState::Fault);
        // Fault is sticky until an external reset
        assert!(!ctl.step(&inputs(1, 0, 1000)).active);
        ctl.reset();
        assert_eq!(ctl.state(), ControlState::Init);
    }

    #[test]
    fn test_speed_loop_ramps_to_clamp() {
        // Integral-heavy gains so the 100-tick window reaches the clamp
        let gains = PiGains {
            kp: 10000,
            ki: 20000,
            kc: q15(0.999),
            out_min: 0,
            out_max: q15(0.999),
        };
        let mut ctl = SixStepControl::new(motor(), ControlLoop::Speed, 3400, gains, current_gains());
        ctl.step(&inputs(1, 0, 16384));
        ctl.step(&inputs(1, 0, 16384));
        assert_eq!(ctl.state(), ControlState::SpeedLoop);

        // Measured speed pinned below target: PI output and duty rise
        // strictly each tick until the output clamp, and duty never
        // exceeds the period.
        let clamped = scale_q15_u16(q15(0.999), 3400);
        let mut last_duty = 0u16;
        for _ in 0..100 {
            let out = ctl.step(&inputs(1, 100, 16384));
            assert!(out.active);
            assert!(out.duty > last_duty || out.duty == clamped);
            assert!(out.duty < 3400);
            last_duty = out.duty;
        }
        assert_eq!(last_duty, clamped);
        // Target derived from the control input by interpolation
        assert!(ctl.target_speed() >= 1849 && ctl.target_speed() <= 1851);
    }

    #[test]
    fn test_current_loop_tracks_reference() {
        let mut ctl = SixStepControl::new(motor(), ControlLoop::Current, 3400, speed_gains(), current_gains());
        ctl.step(&inputs(1, 0, 16384));
        ctl.step(&inputs(1, 0, 16384));
        assert_eq!(ctl.state(), ControlState::CurrentLoop);
        let mut input = inputs(2, 0, 16384);
        input.avg_current = 0;
        let out = ctl.step(&input);
        assert!(out.active);
        assert!(out.duty > 0);
    }
}
