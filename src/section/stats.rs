//! Running statistics accumulated per section
//!
//! Every value inserted into the matrix is observed exactly once by the
//! statistics of the section that owns its row or column. Normalization reads
//! these numbers but never modifies them.

/// Count/min/max/sum/sum-of-squares accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionStats {
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
    sum_sq: f64,
}

impl Default for SectionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Reconstructs an accumulator from persisted fields.
    pub fn from_raw(count: u64, min: f64, max: f64, sum: f64, sum_sq: f64) -> Self {
        Self {
            count,
            min,
            max,
            sum,
            sum_sq,
        }
    }

    /// Folds one inserted value into the running statistics.
    pub fn observe(&mut self, value: f64) {
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// Zeroes the accumulator.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Smallest observed value; positive infinity when nothing was observed.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest observed value; negative infinity when nothing was observed.
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }
}
