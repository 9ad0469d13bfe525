// Sector-to-switching-pattern mapping for trapezoidal commutation
//
// A commutation sector (1-6) selects which two of the three half-bridges
// conduct. Each half-bridge is either PWM-driven high, tied low, or left
// floating; the inverter driver translates those states onto the
// complementary PWM channels. The same table shape serves both the
// fixed default mapping and the table learned by the hall sequence
// identifier.

use super::hall::is_valid_sector;

/// Drive state of one half-bridge during a commutation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOverride {
    /// High side carries PWM
    High,
    /// Low side conducts (zero duty on the high side)
    Low,
    /// Both switches off
    Float,
}

/// All-off pattern for the three phases.
pub const FLOAT_ALL: [PhaseOverride; 3] = [PhaseOverride::Float; 3];

/// Two-phase-on voltage vectors for trapezoidal running, indexed by
/// voltage-vector number (0-5). One phase high, one low, one floating.
pub const BLDC_VECTORS: [[PhaseOverride; 3]; 6] = {
    use PhaseOverride::{Float as F, High as H, Low as L};
    [
        [F, H, L],
        [L, H, F],
        [L, F, H],
        [F, L, H],
        [H, L, F],
        [H, F, L],
    ]
};

/// Single-ended voltage vectors used by the hall sequence identifier to
/// park the rotor at known electrical angles, indexed by vector number.
/// Phase patterns [100, 110, 010, 011, 001, 101] correspond to rotor
/// positions [0, 60, 120, 180, 240, 300] electrical degrees.
pub const SVM_VECTORS: [[PhaseOverride; 3]; 6] = {
    use PhaseOverride::{High as H, Low as L};
    [
        [H, L, L],
        [H, H, L],
        [L, H, L],
        [L, H, H],
        [L, L, H],
        [H, L, H],
    ]
};

/// Hall codes observed at vectors 0-5 for the standard sensor wiring
/// (the 1-3-2-6-4-5 sequence over one electrical revolution).
const STANDARD_HALL_SEQUENCE: [u8; 6] = [1, 3, 2, 6, 4, 5];

/// Per-sector override table for the three PWM channels. Indexed by
/// commutation sector; entries 0 and 7 stay all-float so an invalid
/// lookup can never energize the bridge.
#[derive(Debug, Clone, Copy)]
pub struct SectorTable([[PhaseOverride; 3]; 8]);

impl SectorTable {
    /// Empty table, every sector floating.
    pub const fn all_float() -> Self {
        Self([FLOAT_ALL; 8])
    }

    /// Default mapping for the standard hall wiring. The identifier
    /// replaces this with a learned table when it completes cleanly.
    pub const BLDC: Self = {
        let mut entries = [FLOAT_ALL; 8];
        let mut vector = 0;
        while vector < 6 {
            entries[STANDARD_HALL_SEQUENCE[vector] as usize] = BLDC_VECTORS[vector];
            vector += 1;
        }
        Self(entries)
    };

    /// Pattern for a commutation sector; out-of-range sectors float.
    pub fn get(&self, sector: u8) -> [PhaseOverride; 3] {
        if is_valid_sector(sector) {
            self.0[sector as usize]
        } else {
            FLOAT_ALL
        }
    }

    /// Record a pattern for an observed sector. Invalid sectors are
    /// ignored; the caller flags them separately.
    pub fn set(&mut self, sector: u8, pattern: [PhaseOverride; 3]) {
        if is_valid_sector(sector) {
            self.0[sector as usize] = pattern;
        }
    }

    /// Number of sectors (1-6) holding a non-floating entry.
    pub fn populated(&self) -> usize {
        (1..=6).filter(|&s| self.0[s as usize] != FLOAT_ALL).count()
    }
}

/// Direction-corrected commutation sector: reversing the motor mirrors
/// the sector through `7 - sector`.
pub fn commutation_sector(sector: u8, reverse: bool) -> u8 {
    if reverse {
        7 - sector
    } else {
        sector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commutation_sector_mapping() {
        assert_eq!(commutation_sector(3, false), 3);
        assert_eq!(commutation_sector(3, true), 4);
        assert_eq!(commutation_sector(1, true), 6);
    }

    #[test]
    fn test_bldc_vectors_energize_two_phases() {
        for pattern in BLDC_VECTORS.iter() {
            let high = pattern.iter().filter(|p| **p == PhaseOverride::High).count();
            let low = pattern.iter().filter(|p| **p == PhaseOverride::Low).count();
            let float = pattern.iter().filter(|p| **p == PhaseOverride::Float).count();
            assert_eq!((high, low, float), (1, 1, 1));
        }
    }

    #[test]
    fn test_svm_vectors_drive_all_phases() {
        for pattern in SVM_VECTORS.iter() {
            assert!(pattern.iter().all(|p| *p != PhaseOverride::Float));
        }
        // Vector 0 is the 100 pattern
        use PhaseOverride::{High as H, Low as L};
        assert_eq!(SVM_VECTORS[0], [H, L, L]);
    }

    #[test]
    fn test_default_table_covers_all_sectors() {
        assert_eq!(SectorTable::BLDC.populated(), 6);
        // The six entries are pairwise distinct 60-degree intervals
        for a in 1..=6u8 {
            for b in (a + 1)..=6u8 {
                assert!(SectorTable::BLDC.get(a) != SectorTable::BLDC.get(b));
            }
        }
    }

    #[test]
    fn test_invalid_sector_floats() {
        assert_eq!(SectorTable::BLDC.get(0), FLOAT_ALL);
        assert_eq!(SectorTable::BLDC.get(7), FLOAT_ALL);
        let mut table = SectorTable::all_float();
        table.set(7, BLDC_VECTORS[0]);
        assert_eq!(table.populated(), 0);
    }
}
