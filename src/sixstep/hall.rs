// Hall position and speed estimation
//
// Three digital hall inputs pack into a 3-bit sector code; codes 1-6 walk
// the six 60-degree commutation intervals, 0 and 7 mean a shorted or open
// sensor. Edge-to-edge spacing measured by the free-running interval timer
// turns into speed through a moving-average filter and a precomputed
// counts-to-rpm multiplier.

use super::filter::MovingAvgFilter;

/// Pack the three hall pin levels into the sector code
/// `(hall_c << 2) | (hall_b << 1) | hall_a`.
pub fn pack_hall_code(hall_a: bool, hall_b: bool, hall_c: bool) -> u8 {
    ((hall_c as u8) << 2) | ((hall_b as u8) << 1) | (hall_a as u8)
}

/// Codes 0 (all low) and 7 (all high) are sensor faults.
pub fn is_valid_sector(code: u8) -> bool {
    (1..=6).contains(&code)
}

/// Per-tick estimator result. `edge` asks the caller to zero the interval
/// timer; the fault bits report what this tick observed (the sticky
/// counterparts live on the estimator).
#[derive(Debug, Clone, Copy, Default)]
pub struct HallStatus {
    pub edge: bool,
    pub hall_failure: bool,
    pub timer_error: bool,
}

pub struct HallEstimator {
    present_value: u8,
    previous_value: u8,
    change_detected: bool,
    /// Last accepted valid sector (1-6)
    sector: u8,
    /// Instantaneous edge-to-edge period in timer counts
    period: u32,
    avg_filter: MovingAvgFilter,
    speed_rpm: u16,
    /// rpm = multiplier / averaged period
    multiplier: u32,
    /// Ticks without an edge before the motor counts as stopped
    stop_counter: u16,
    stop_reload: u16,
    hall_failure: bool,
    timer_error: bool,
}

impl HallEstimator {
    pub fn new(multiplier: u32, stop_reload: u16, avg_scale: u8) -> Self {
        assert!(multiplier > 0);
        assert!(stop_reload > 0);
        Self {
            present_value: 0,
            previous_value: 0,
            change_detected: false,
            sector: 0,
            period: 0,
            avg_filter: MovingAvgFilter::new(avg_scale),
            speed_rpm: 0,
            multiplier,
            stop_counter: 0,
            stop_reload,
            hall_failure: false,
            timer_error: false,
        }
    }

    fn value_update(&mut self, code: u8) {
        self.present_value = code;
        if self.present_value != self.previous_value {
            self.previous_value = self.present_value;
            self.change_detected = !self.change_detected;
        } else {
            self.change_detected = false;
        }
    }

    /// One control-tick update. `code` is the freshly sampled hall code,
    /// `elapsed` the interval-timer count since the last edge. The caller
    /// keeps the timer running every tick and zeroes it when `edge` is set.
    pub fn update(&mut self, code: u8, elapsed: u32) -> HallStatus {
        let mut status = HallStatus::default();

        self.value_update(code);
        if self.change_detected {
            status.edge = true;
            self.period = elapsed;

            // A zero-count edge spacing is physically impossible; flag the
            // glitch instead of publishing an infinite speed.
            if elapsed == 0 {
                self.timer_error = true;
                status.timer_error = true;
            }

            if is_valid_sector(self.present_value) {
                self.sector = self.present_value;
            } else {
                self.hall_failure = true;
                status.hall_failure = true;
            }

            self.stop_counter = self.stop_reload;
            self.change_detected = false;
        } else if self.stop_counter > 0 {
            self.stop_counter -= 1;
            if self.stop_counter == 0 {
                // No edge for the whole window: below the measurable
                // rotation rate the old period is meaningless, so report
                // zero speed rather than a stale value.
                self.speed_rpm = 0;
                self.period = 0;
                self.avg_filter.reset();
            }
        }

        status
    }

    /// Per-tick speed computation: moving-average the captured period,
    /// then divide the multiplier by it. A zero average (startup, stopped)
    /// keeps the previous speed.
    pub fn compute_speed(&mut self) -> u16 {
        let avg_period = self.avg_filter.update(self.period);
        if avg_period != 0 && self.stop_counter > 0 {
            self.speed_rpm = (self.multiplier / avg_period).min(u16::MAX as u32) as u16;
        }
        self.speed_rpm
    }

    /// Raw hall value from the latest tick. This is what commutation runs
    /// on: it tracks the rotor even before the first edge arrives.
    pub fn value(&self) -> u8 {
        self.present_value
    }

    /// Last edge-validated sector (1-6), 0 before the first edge.
    pub fn sector(&self) -> u8 {
        self.sector
    }

    pub fn speed_rpm(&self) -> u16 {
        self.speed_rpm
    }

    /// True when no hall edge arrived for the configured window.
    pub fn motor_stopped(&self) -> bool {
        self.stop_counter == 0
    }

    /// Sticky: an illegal code (0 or 7) was observed on an edge.
    pub fn hall_failure(&self) -> bool {
        self.hall_failure
    }

    /// Sticky: an edge arrived with a degenerate zero period.
    pub fn timer_error(&self) -> bool {
        self.timer_error
    }

    pub fn reset(&mut self) {
        self.present_value = 0;
        self.previous_value = 0;
        self.change_detected = false;
        self.sector = 0;
        self.period = 0;
        self.avg_filter.reset();
        self.speed_rpm = 0;
        self.stop_counter = 0;
        self.hall_failure = false;
        self.timer_error = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> HallEstimator {
        HallEstimator::new(2_000_000, 98, 4)
    }

    #[test]
    fn test_pack_hall_code() {
        assert_eq!(pack_hall_code(true, false, true), 5);
        assert_eq!(pack_hall_code(false, false, false), 0);
        assert_eq!(pack_hall_code(true, true, true), 7);
        assert_eq!(pack_hall_code(false, true, false), 2);
    }

    #[test]
    fn test_valid_sectors() {
        assert!(!is_valid_sector(0));
        assert!(is_valid_sector(1));
        assert!(is_valid_sector(6));
        assert!(!is_valid_sector(7));
    }

    #[test]
    fn test_edge_accepts_valid_sector() {
        let mut est = estimator();
        let status = est.update(3, 5000);
        assert!(status.edge);
        assert!(!status.hall_failure);
        assert_eq!(est.sector(), 3);
        assert!(!est.motor_stopped());
    }

    #[test]
    fn test_invalid_code_keeps_sector() {
        let mut est = estimator();
        est.update(3, 5000);
        let status = est.update(7, 5000);
        assert!(status.hall_failure);
        assert!(est.hall_failure());
        // Sector stays at the last valid value
        assert_eq!(est.sector(), 3);
    }

    #[test]
    fn test_zero_period_flags_timer_error() {
        let mut est = estimator();
        let status = est.update(1, 0);
        assert!(status.timer_error);
        assert!(est.timer_error());
    }

    #[test]
    fn test_zero_average_holds_speed() {
        let mut est = estimator();
        // No edge ever seen: average period is zero, speed must stay zero
        // without dividing
        assert_eq!(est.compute_speed(), 0);
        assert_eq!(est.compute_speed(), 0);
    }

    #[test]
    fn test_speed_from_period() {
        let mut est = estimator();
        // Edges every 10000 counts -> 200 rpm with the test multiplier
        let mut speed = 0;
        for _ in 0..100 {
            est.update(3, 10000);
            est.update(4, 10000);
            speed = est.compute_speed();
        }
        assert!(speed >= 199 && speed <= 201);
    }

    #[test]
    fn test_stop_timeout_zeroes_speed() {
        let mut est = estimator();
        for _ in 0..50 {
            est.update(3, 10000);
            est.update(4, 10000);
            est.compute_speed();
        }
        assert!(est.speed_rpm() > 0);
        // Hold the same code until the stop window expires
        for _ in 0..98 {
            est.update(4, 1_000_000);
            est.compute_speed();
        }
        assert!(est.motor_stopped());
        assert_eq!(est.speed_rpm(), 0);
    }
}
