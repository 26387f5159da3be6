//! Discount, eligibility and forget factors

use serde::{Deserialize, Serialize};

use crate::{Result, RlError};

/// A factor in [0, 1].
///
/// The same validated scalar serves as discount factor (gamma), eligibility
/// factor (lambda) and forget factor (kappa).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factor(f64);

impl Factor {
    /// Factor of exactly zero
    pub const ZERO: Factor = Factor(0.0);
    /// Factor of exactly one
    pub const ONE: Factor = Factor(1.0);

    /// Create a factor, rejecting values outside [0, 1]
    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(RlError::InvalidArgument(format!(
                "factor must be in [0,1], got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// The underlying scalar
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Blend `a` toward `b`: `v*a + (1-v)*b`.
    ///
    /// With a forget factor kappa this partially resets a statistic `a`
    /// toward its initial value `b`; kappa=1 keeps `a`, kappa=0 yields `b`.
    #[must_use]
    pub fn mixture(self, a: f64, b: f64) -> f64 {
        self.0 * a + (1.0 - self.0) * b
    }
}
