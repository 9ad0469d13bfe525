// Signal-conditioning filters
//
// Both filters are plain instance state owned by whichever estimator uses
// them: one low-pass on the bus current, one moving average on the hall
// edge period.

/// First-order low-pass IIR:
/// `acc += (input - output) * gain; output = acc >> 15`.
pub struct LowPassFilter {
    gain: i16,
    accumulator: i32,
    output: i16,
}

impl LowPassFilter {
    /// `gain` is the Q15 cutoff coefficient.
    pub const fn new(gain: i16) -> Self {
        Self {
            gain,
            accumulator: 0,
            output: 0,
        }
    }

    pub fn update(&mut self, input: i16) -> i16 {
        let delta = input.wrapping_sub(self.output);
        self.accumulator += delta as i32 * self.gain as i32;
        self.output = (self.accumulator >> 15) as i16;
        self.output
    }

    pub fn output(&self) -> i16 {
        self.output
    }

    pub fn reset(&mut self) {
        self.accumulator = 0;
        self.output = 0;
    }
}

/// Moving-average filter over a `1 << scale` sample window:
/// `acc += input; mean = acc >> scale; acc -= mean`.
pub struct MovingAvgFilter {
    scale: u8,
    accumulator: u32,
    average: u32,
}

impl MovingAvgFilter {
    pub const fn new(scale: u8) -> Self {
        Self {
            scale,
            accumulator: 0,
            average: 0,
        }
    }

    pub fn update(&mut self, input: u32) -> u32 {
        self.accumulator += input;
        let mean = self.accumulator >> self.scale;
        self.accumulator -= mean;
        self.average = mean;
        self.average
    }

    pub fn average(&self) -> u32 {
        self.average
    }

    pub fn reset(&mut self) {
        self.accumulator = 0;
        self.average = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lpf_converges() {
        let mut lpf = LowPassFilter::new(3277); // ~0.1
        let mut out = 0;
        for _ in 0..200 {
            out = lpf.update(10000);
        }
        assert!(out > 9900 && out <= 10000);
    }

    #[test]
    fn test_lpf_starts_at_zero() {
        let lpf = LowPassFilter::new(3277);
        assert_eq!(lpf.output(), 0);
    }

    #[test]
    fn test_moving_avg_settles_on_constant() {
        let mut avg = MovingAvgFilter::new(4);
        let mut out = 0;
        for _ in 0..100 {
            out = avg.update(10000);
        }
        // Settles within one LSB of the input
        assert!(out >= 9999 && out <= 10000);
    }

    #[test]
    fn test_moving_avg_reset() {
        let mut avg = MovingAvgFilter::new(4);
        avg.update(10000);
        avg.reset();
        assert_eq!(avg.average(), 0);
    }
}
