// Bus-current signal conditioning
//
// Startup DC-offset calibration over a fixed sample count, then per-tick
// offset removal and low-pass filtering. The filtered value feeds the
// current control loop and must not be consumed before `offset_done()`
// reports true.

use super::filter::LowPassFilter;

pub struct MeasureCurrent {
    /// Offset accumulation sample count as a power of two
    count_bits: u8,
    counter: u16,
    sum: i32,
    offset: i16,
    done: bool,
    filter: LowPassFilter,
    filtered: i16,
}

impl MeasureCurrent {
    pub fn new(count_bits: u8, lpf_gain: i16) -> Self {
        assert!(count_bits > 0 && count_bits < 16);
        Self {
            count_bits,
            counter: 0,
            sum: 0,
            offset: 0,
            done: false,
            filter: LowPassFilter::new(lpf_gain),
            filtered: 0,
        }
    }

    /// Accumulate one raw sample toward the DC offset. Runs once at
    /// startup; the caller polls `offset_done()` before closing any loop
    /// around the current measurement.
    pub fn offset_update(&mut self, raw: i16) {
        self.sum += raw as i32;
        self.counter += 1;
        if self.counter >= 1 << self.count_bits {
            self.offset = (self.sum >> self.count_bits) as i16;
            self.counter = 0;
            self.sum = 0;
            self.done = true;
        }
    }

    pub fn offset_done(&self) -> bool {
        self.done
    }

    /// Remove the stored offset from a raw sample and run the low-pass
    /// filter. Returns the instantaneous (unfiltered) current; the
    /// filtered value is available via `filtered()`.
    pub fn calibrate(&mut self, raw: i16) -> i16 {
        let ibus = raw.wrapping_sub(self.offset);
        self.filtered = self.filter.update(ibus);
        ibus
    }

    /// Low-pass filtered bus current, Q15 counts.
    pub fn filtered(&self) -> i16 {
        self.filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_calibration() {
        let mut measure = MeasureCurrent::new(4, 3277);
        for _ in 0..15 {
            measure.offset_update(1000);
            assert!(!measure.offset_done());
        }
        measure.offset_update(1000);
        assert!(measure.offset_done());

        // A sample equal to the offset calibrates to zero
        assert_eq!(measure.calibrate(1000), 0);
        // And a step above it comes out offset-free
        assert_eq!(measure.calibrate(1100), 100);
    }

    #[test]
    fn test_filtered_tracks_calibrated_input() {
        let mut measure = MeasureCurrent::new(2, 16384);
        for _ in 0..4 {
            measure.offset_update(0);
        }
        let mut filtered = 0;
        for _ in 0..100 {
            measure.calibrate(2000);
            filtered = measure.filtered();
        }
        assert!(filtered > 1900 && filtered <= 2000);
    }
}
