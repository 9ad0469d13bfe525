// Hall sequence identifier
//
// One-shot startup calibration: walk the rotor through the six known
// voltage vectors under a current limit, sample the hall sector once the
// rotor has settled on each, and record which two-phase switching pattern
// belongs to each observed sector. The learned table replaces the fixed
// wiring assumption of `SectorTable::BLDC`.
//
// The estimator's edge detection must be idle while this runs; the
// identifier samples the hall code itself.

use crate::fmt::*;

use super::commutation::{PhaseOverride, SectorTable, BLDC_VECTORS, FLOAT_ALL, SVM_VECTORS};
use super::hall::is_valid_sector;
use super::pi::{PiController, PiGains};
use super::q15::scale_q15_u16;

const VECTOR_COUNT: u8 = 6;

/// Per-tick identifier output. When `done` is set the outputs must be
/// disabled; the motor stays unpowered until the caller hands control to
/// the six-step state machine.
#[derive(Debug, Clone, Copy)]
pub struct IdentOutput {
    pub done: bool,
    pub duty: u16,
    pub pattern: [PhaseOverride; 3],
}

pub struct HallSeqIdentifier {
    /// Voltage vector index, 0-5
    vector: u8,
    /// Ticks spent on the present vector
    interval_count: u32,
    previous_value: u8,
    duty: u16,
    table: SectorTable,
    failure: bool,
    failure_count: u8,
    done: bool,
    /// Keeps the injected current bounded while the rotor is parked
    pi_current: PiController,
    current_limit: i16,
    /// Ticks per vector, long enough for mechanical settling
    interval: u32,
    abort_on_failure: bool,
    pwm_period: u16,
}

impl HallSeqIdentifier {
    pub fn new(
        pwm_period: u16,
        gains: PiGains,
        current_limit: i16,
        interval: u32,
        abort_on_failure: bool,
    ) -> Self {
        assert!(interval > 0);
        Self {
            vector: 0,
            interval_count: 0,
            previous_value: 0,
            duty: 0,
            table: SectorTable::all_float(),
            failure: false,
            failure_count: 0,
            done: false,
            pi_current: PiController::new(gains),
            current_limit,
            interval,
            abort_on_failure,
            pwm_period,
        }
    }

    /// One identification tick. `ibus` is the offset-calibrated bus
    /// current, `hall_code` the freshly sampled hall value.
    pub fn step(&mut self, ibus: i16, hall_code: u8) -> IdentOutput {
        if self.done {
            return IdentOutput {
                done: true,
                duty: 0,
                pattern: FLOAT_ALL,
            };
        }

        if self.vector >= VECTOR_COUNT {
            self.finish();
            return IdentOutput {
                done: true,
                duty: 0,
                pattern: FLOAT_ALL,
            };
        }

        // Current-limit loop: a fixed vector on a stationary rotor at full
        // duty would overheat the winding.
        let out = self.pi_current.update(self.current_limit, ibus);
        self.duty = scale_q15_u16(out, self.pwm_period);
        let pattern = SVM_VECTORS[self.vector as usize];

        self.interval_count += 1;
        if self.interval_count > self.interval {
            // Settling time elapsed: the rotor should sit on a new sector.
            if hall_code == self.previous_value || !is_valid_sector(hall_code) {
                self.failure = true;
                self.failure_count += 1;
                error!(
                    "hall identification: no sector advance at vector {} (hall={})",
                    self.vector, hall_code
                );
                if self.abort_on_failure {
                    self.finish();
                    return IdentOutput {
                        done: true,
                        duty: 0,
                        pattern: FLOAT_ALL,
                    };
                }
            }
            self.previous_value = hall_code;
            self.table.set(hall_code, BLDC_VECTORS[self.vector as usize]);
            self.vector += 1;
            self.interval_count = 0;
        }

        IdentOutput {
            done: false,
            duty: self.duty,
            pattern,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.duty = 0;
        info!(
            "hall identification finished: {} sectors mapped, {} failures",
            self.table.populated(),
            self.failure_count
        );
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Sticky: a vector advance did not produce a new valid hall sector.
    /// Check before trusting the learned table.
    pub fn failed(&self) -> bool {
        self.failure
    }

    pub fn failure_count(&self) -> u8 {
        self.failure_count
    }

    /// The learned sector table.
    pub fn table(&self) -> SectorTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sixstep::q15::q15;

    fn gains() -> PiGains {
        PiGains {
            kp: q15(0.8),
            ki: q15(0.003),
            kc: q15(0.999),
            out_min: 0,
            out_max: q15(0.9),
        }
    }

    fn identifier(abort: bool) -> HallSeqIdentifier {
        HallSeqIdentifier::new(3400, gains(), 769, 3, abort)
    }

    // Hall readings for a healthy motor stepping through the vectors
    const SEQUENCE: [u8; 6] = [6, 4, 5, 1, 3, 2];

    fn run_vector(ident: &mut HallSeqIdentifier, hall: u8) -> IdentOutput {
        let mut out = ident.step(0, hall);
        for _ in 0..3 {
            out = ident.step(0, hall);
        }
        out
    }

    #[test]
    fn test_clean_identification() {
        let mut ident = identifier(false);
        for hall in SEQUENCE {
            let out = run_vector(&mut ident, hall);
            assert!(!out.done);
        }
        // Completion lands on the tick after the sixth advance
        let out = ident.step(0, SEQUENCE[5]);
        assert!(out.done);
        assert!(ident.is_done());
        assert!(!ident.failed());
        assert_eq!(ident.table().populated(), 6);
    }

    #[test]
    fn test_repeated_sector_sets_failure() {
        let mut ident = identifier(false);
        run_vector(&mut ident, 6);
        // Rotor stuck: the same sector shows up on the next vector
        run_vector(&mut ident, 6);
        assert!(ident.failed());
        assert_eq!(ident.failure_count(), 1);
        // Non-aborting mode keeps stepping to completion
        for hall in [5, 1, 3, 2] {
            run_vector(&mut ident, hall);
        }
        let out = ident.step(0, 2);
        assert!(out.done);
    }

    #[test]
    fn test_abort_on_failure() {
        let mut ident = identifier(true);
        run_vector(&mut ident, 6);
        let out = run_vector(&mut ident, 6);
        assert!(out.done);
        assert!(ident.failed());
    }

    #[test]
    fn test_invalid_hall_code_is_failure() {
        let mut ident = identifier(false);
        let out = run_vector(&mut ident, 7);
        assert!(!out.done);
        assert!(ident.failed());
        // Nothing recorded for the invalid code
        assert_eq!(ident.table().populated(), 0);
    }

    #[test]
    fn test_current_limited_duty() {
        let mut ident = identifier(false);
        // Zero measured current: the limiter pushes duty up, bounded by
        // out_max of the identification PI
        let out = ident.step(0, 6);
        assert!(out.duty > 0);
        assert!(out.duty <= scale_q15_u16(q15(0.9), 3400));
        // Measured current far above the limit drives duty back to zero
        let out = ident.step(i16::MAX, 6);
        let _ = out;
        let out = ident.step(i16::MAX, 6);
        assert_eq!(out.duty, 0);
    }
}
