//! Samples and episode recordings

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Factor, Result, RlError};

/// A single interaction sample `(x, u, xn, r, terminal)`.
///
/// Immutable per call; dimensions must match the consumer's configured
/// state/action dimensionality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    /// State
    pub x: Array1<f64>,
    /// Action
    pub u: Array1<f64>,
    /// Next state
    pub xn: Array1<f64>,
    /// Reward
    pub r: f64,
    /// Whether this sample ends the episode
    pub terminal: bool,
}

impl Sample {
    /// Create a sample
    #[must_use]
    pub fn new(x: Array1<f64>, u: Array1<f64>, xn: Array1<f64>, r: f64, terminal: bool) -> Self {
        Self { x, u, xn, r, terminal }
    }

    /// Check the sample against expected state/action dimensions
    pub fn check_dims(&self, x_dim: usize, u_dim: usize) -> Result<()> {
        if self.x.len() != x_dim || self.xn.len() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: self.x.len(),
            });
        }
        if self.u.len() != u_dim {
            return Err(RlError::DimensionMismatch {
                expected: u_dim,
                actual: self.u.len(),
            });
        }
        Ok(())
    }
}

/// An ordered recording of samples sharing a start state and a maximum
/// horizon.
///
/// Appending is rejected past the horizon or after a terminal sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    id: Uuid,
    max_len: usize,
    x_dim: usize,
    u_dim: usize,
    samples: Vec<Sample>,
    terminated: bool,
}

impl Episode {
    /// Create an empty episode with the given horizon and dimensions
    #[must_use]
    pub fn new(max_len: usize, x_dim: usize, u_dim: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            max_len,
            x_dim,
            u_dim,
            samples: Vec::with_capacity(max_len),
            terminated: false,
        }
    }

    /// Unique identifier of this episode
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Append a sample in temporal order
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        if self.samples.len() >= self.max_len {
            return Err(RlError::Episode("maximum horizon reached".into()));
        }
        if self.terminated {
            return Err(RlError::Episode("episode already terminated".into()));
        }
        sample.check_dims(self.x_dim, self.u_dim)?;
        self.terminated = sample.terminal;
        self.samples.push(sample);
        Ok(())
    }

    /// The recorded samples, in temporal order
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of recorded samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the episode ended on a terminal sample
    #[must_use]
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// Mean reward over the recorded samples
    #[must_use]
    pub fn average_reward(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.r).sum::<f64>() / self.samples.len() as f64
    }

    /// Discounted return `sum_t gamma^t r_t` of the episode
    #[must_use]
    pub fn discounted_return(&self, gamma: Factor) -> f64 {
        let mut ret = 0.0;
        let mut discount = 1.0;
        for sample in &self.samples {
            ret += discount * sample.r;
            discount *= gamma.value();
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::arr1;

    use super::*;

    fn sample(r: f64, terminal: bool) -> Sample {
        Sample::new(arr1(&[0.0]), arr1(&[0.0]), arr1(&[1.0]), r, terminal)
    }

    #[test]
    fn push_respects_horizon() {
        let mut ep = Episode::new(2, 1, 1);
        ep.push(sample(1.0, false)).unwrap();
        ep.push(sample(1.0, false)).unwrap();
        assert!(ep.push(sample(1.0, false)).is_err());
    }

    #[test]
    fn push_rejects_after_terminal() {
        let mut ep = Episode::new(10, 1, 1);
        ep.push(sample(0.0, true)).unwrap();
        assert!(ep.terminated());
        assert!(ep.push(sample(0.0, false)).is_err());
    }

    #[test]
    fn push_rejects_wrong_dimensions() {
        let mut ep = Episode::new(10, 2, 1);
        assert!(ep.push(sample(0.0, false)).is_err());
    }

    #[test]
    fn discounted_return_weights_by_step() {
        let mut ep = Episode::new(10, 1, 1);
        ep.push(sample(1.0, false)).unwrap();
        ep.push(sample(2.0, false)).unwrap();
        ep.push(sample(4.0, true)).unwrap();
        let gamma = Factor::new(0.5).unwrap();
        assert_relative_eq!(ep.discounted_return(gamma), 1.0 + 1.0 + 1.0);
        assert_relative_eq!(ep.average_reward(), 7.0 / 3.0);
    }

    #[test]
    fn episode_round_trips_through_serde() {
        let mut ep = Episode::new(4, 1, 1);
        ep.push(sample(1.0, false)).unwrap();
        let json = serde_json::to_string(&ep).unwrap();
        let back: Episode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), ep.id());
        assert_eq!(back.len(), 1);
    }
}
