//! StatValue - Accumulator for one stat during derived-stat recomputation

use serde::{Deserialize, Serialize};

/// Represents a stat following the Base + Flat → Multipliers model
///
/// Final value is calculated as:
/// `(base + flat) × Π(multipliers)`
///
/// - `base`: The value before dependencies (base sheet plus dynamic additions)
/// - `flat`: Sum of contributions derived from other stats
/// - `multipliers`: Raw factors (e.g., 1.10 = +10%), applied in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatValue {
    pub base: f64,
    pub flat: f64,
    pub multipliers: Vec<f64>,
}

impl StatValue {
    /// Create a new StatValue with the given base
    pub fn with_base(base: f64) -> Self {
        StatValue {
            base,
            flat: 0.0,
            multipliers: Vec::new(),
        }
    }

    /// Calculate final value: (base + flat) × Π(multipliers)
    pub fn compute(&self) -> f64 {
        self.total_flat() * self.total_multiplier()
    }

    /// Add a flat bonus
    pub fn add_flat(&mut self, value: f64) {
        self.flat += value;
    }

    /// Add a multiplicative factor
    pub fn add_multiplier(&mut self, factor: f64) {
        self.multipliers.push(factor);
    }

    /// Get the total flat value (base + flat additions)
    pub fn total_flat(&self) -> f64 {
        self.base + self.flat
    }

    /// Get the product of all multipliers
    pub fn total_multiplier(&self) -> f64 {
        self.multipliers.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_basic() {
        let stat = StatValue::with_base(100.0);
        assert!((stat.compute() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compute_with_flat() {
        let mut stat = StatValue::with_base(100.0);
        stat.add_flat(50.0);
        assert!((stat.compute() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_flat_applies_before_multipliers() {
        // (100 + 50) × 1.1 × 1.2 = 198
        let mut stat = StatValue::with_base(100.0);
        stat.add_flat(50.0);
        stat.add_multiplier(1.1);
        stat.add_multiplier(1.2);
        assert!((stat.compute() - 198.0).abs() < 0.0001);
    }

    #[test]
    fn test_multipliers_stack_multiplicatively() {
        let mut stat = StatValue::with_base(100.0);
        stat.add_multiplier(1.2);
        stat.add_multiplier(1.3);
        // 100 * 1.2 * 1.3 = 156, not 100 * 1.5
        assert!((stat.compute() - 156.0).abs() < 0.0001);
    }
}
