//! Three-phase inverter abstraction
//!
//! Hides the complementary PWM hardware behind the two operations the
//! control core needs: apply a duty plus a per-phase override pattern, or
//! drop all outputs. A `High` phase carries PWM on the high side, `Low`
//! holds the low side on through the complementary output at zero duty,
//! `Float` disables the channel entirely.

use embassy_stm32::{
    peripherals,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
};

use crate::sixstep::PhaseOverride;

pub const MIN_DUTY: u16 = 0;

const CHANNELS: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

pub struct MotorDriver {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
}

impl MotorDriver {
    pub fn new(pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        let max_duty = pwm.get_max_duty();
        Self { pwm, max_duty }
    }

    /// PWM period in timer counts; the base for Q15 duty scaling.
    pub fn period(&self) -> u16 {
        self.max_duty
    }

    /// Apply one tick of commutation: clamp and load the duty, then drive
    /// each half-bridge according to its override state.
    pub fn apply(&mut self, duty: u16, pattern: [PhaseOverride; 3]) {
        let duty = duty.clamp(MIN_DUTY, self.max_duty - 1);
        for (channel, phase) in CHANNELS.iter().zip(pattern.iter()) {
            match phase {
                PhaseOverride::High => {
                    self.pwm.set_duty(*channel, duty);
                    self.pwm.enable(*channel);
                }
                PhaseOverride::Low => {
                    self.pwm.set_duty(*channel, 0);
                    self.pwm.enable(*channel);
                }
                PhaseOverride::Float => {
                    self.pwm.disable(*channel);
                }
            }
        }
    }

    /// Zero all duties and disable every channel.
    pub fn disable_outputs(&mut self) {
        for channel in CHANNELS {
            self.pwm.set_duty(channel, 0);
            self.pwm.disable(channel);
        }
    }
}
