// Fixed-point PI regulator with anti-windup
//
// Q15 rendition of the classic motor-control PI update: the output clamp
// error is fed back into the integrator through the Kc gain, so the
// integrator tracks the saturated output instead of winding up past it.
// One instance each serves the speed loop, the current loop and the
// hall-identification current limiter.

use super::q15::mul_q15;

/// Gains and output limits for one PI instance, all Q15 unless the
/// controlled quantity dictates otherwise (speed references are plain
/// counts and rely on large Kp).
#[derive(Debug, Clone, Copy)]
pub struct PiGains {
    /// Proportional gain
    pub kp: i16,
    /// Integral gain
    pub ki: i16,
    /// Anti-windup gain applied to the output clamp error, < 1
    pub kc: i16,
    /// Minimum output
    pub out_min: i16,
    /// Maximum output
    pub out_max: i16,
}

/// PI regulator state. Only the integrator persists between updates.
pub struct PiController {
    gains: PiGains,
    integrator: i32,
}

impl PiController {
    /// Create a regulator from a gain set.
    ///
    /// Panics when `out_min > out_max`: inverted clamp bounds are a
    /// configuration defect and must surface at init, not at runtime.
    pub fn new(gains: PiGains) -> Self {
        assert!(gains.out_min <= gains.out_max);
        Self {
            gains,
            integrator: 0,
        }
    }

    /// One control-tick update: `reference` and `measurement` in, clamped
    /// output out. Mutates only the integrator.
    pub fn update(&mut self, reference: i16, measurement: i16) -> i16 {
        let error = (reference as i32 - measurement as i32)
            .clamp(i16::MIN as i32, i16::MAX as i32) as i16;

        let p_term = mul_q15(error, self.gains.kp) as i32;
        self.integrator += mul_q15(error, self.gains.ki) as i32;

        let unclamped = p_term + self.integrator;
        let output = unclamped.clamp(self.gains.out_min as i32, self.gains.out_max as i32);

        // Anti-windup: feed the clamp error back, then hold the integrator
        // inside the output limits.
        let excess = output - unclamped;
        self.integrator += (excess * self.gains.kc as i32) >> 15;
        self.integrator = self
            .integrator
            .clamp(self.gains.out_min as i32, self.gains.out_max as i32);

        output as i16
    }

    /// Zero the integrator.
    pub fn reset(&mut self) {
        self.integrator = 0;
    }

    /// Current integrator value.
    #[allow(dead_code)]
    pub fn integrator(&self) -> i32 {
        self.integrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sixstep::q15::q15;

    fn gains() -> PiGains {
        PiGains {
            kp: 20000,
            ki: 200,
            kc: q15(0.999),
            out_min: 0,
            out_max: q15(0.999),
        }
    }

    #[test]
    fn test_output_approaches_steady_state() {
        let mut pi = PiController::new(gains());
        // Constant positive error: output rises monotonically until clamped
        let mut last = 0i16;
        let mut clamped = false;
        for _ in 0..200 {
            let out = pi.update(30000, 0);
            assert!(out >= last);
            assert!(out <= q15(0.999));
            if out == q15(0.999) {
                clamped = true;
            }
            last = out;
        }
        assert!(clamped);
    }

    #[test]
    fn test_integrator_stays_inside_limits() {
        let mut pi = PiController::new(gains());
        // Drive hard into saturation
        for _ in 0..500 {
            pi.update(i16::MAX, 0);
        }
        assert!(pi.integrator() <= q15(0.999) as i32);
        assert!(pi.integrator() >= 0);
    }

    #[test]
    fn test_no_windup_residue() {
        let mut pi = PiController::new(gains());
        for _ in 0..500 {
            pi.update(i16::MAX, 0);
        }
        // With zero error the output must not exceed the clamp and the
        // integrator holds steady instead of carrying hidden windup.
        let out = pi.update(0, 0);
        assert!(out <= q15(0.999));
        let integrator = pi.integrator();
        pi.update(0, 0);
        assert_eq!(pi.integrator(), integrator);
    }

    #[test]
    #[should_panic]
    fn test_inverted_limits_rejected() {
        let mut bad = gains();
        bad.out_min = 100;
        bad.out_max = -100;
        let _ = PiController::new(bad);
    }
}
