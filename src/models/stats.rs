use crate::models::Tenths;
use serde::{Deserialize, Serialize};

/// Running statistics of one station, all values in tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStats {
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    pub count: i64,
}

impl Default for StationStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StationStats {
    /// The identity element: merging it into anything is a no-op.
    pub const fn new() -> Self {
        Self {
            min: i32::MAX,
            max: i32::MIN,
            sum: 0,
            count: 0,
        }
    }

    #[inline(always)]
    pub fn accumulate(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += i64::from(value);
        self.count += 1;
    }

    /// Commutative, associative fold of two partial results.
    pub fn merge(&mut self, other: &StationStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Tenths {
        Tenths(i64::from(self.min))
    }

    pub fn max(&self) -> Tenths {
        Tenths(i64::from(self.max))
    }

    /// Mean in tenths, rounded half toward positive infinity.
    ///
    /// Returns `None` before the first accumulation.
    pub fn mean(&self) -> Option<Tenths> {
        if self.count == 0 {
            return None;
        }
        let doubled = 2 * self.count;
        Some(Tenths((2 * self.sum + self.count).div_euclid(doubled)))
    }
}
