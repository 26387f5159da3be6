//! Value iteration

use ndarray::{Array1, Array2};
use tracing::debug;

use rlinc_core::{Factor, Result, RlError};

use crate::mdp::DiscreteMdp;

/// Value iteration: iterates `Q <- R + gamma * P * max_u Q` to the optimal
/// state-action values.
///
/// Stops when the squared change of `Q` between iterations drops below
/// `epsilon` or after `max_iter` iterations; a negative `epsilon` disables
/// the early stop entirely.
pub struct ValueIteration {
    q: Array2<f64>,
    v: Array1<f64>,
    policy: Vec<usize>,
    converged: Option<usize>,
}

impl ValueIteration {
    /// Run value iteration on `mdp`
    pub fn solve(mdp: &DiscreteMdp, gamma: Factor, max_iter: usize, epsilon: f64) -> Result<Self> {
        if max_iter == 0 {
            return Err(RlError::InvalidArgument(
                "the maximum number of iterations must be greater than zero".into(),
            ));
        }
        let n = mdp.n_states();
        let m = mdp.n_actions();
        let mut q: Array2<f64> = Array2::zeros((n, m));
        let mut v: Array1<f64> = Array1::zeros(n);
        let mut policy = vec![0usize; n];
        let mut converged = None;

        for iter in 1..=max_iter {
            let q_old = q.clone();
            // The optimal state value is the maximum of Q over actions
            for x in 0..n {
                v[x] = (0..m).map(|u| q[[x, u]]).fold(f64::NEG_INFINITY, f64::max);
            }
            q = mdp.q_from_v(&v, gamma);
            policy = mdp.greedy_policy(&q);

            if epsilon >= 0.0 {
                let delta: f64 = q
                    .iter()
                    .zip(q_old.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                if delta < epsilon {
                    converged = Some(iter);
                    debug!(iterations = iter, "value iteration converged");
                    break;
                }
            }
        }
        // State values of the final greedy policy
        for x in 0..n {
            v[x] = q[[x, policy[x]]];
        }
        Ok(Self {
            q,
            v,
            policy,
            converged,
        })
    }

    /// The optimal state-action value table
    #[must_use]
    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }

    /// The optimal state value table
    #[must_use]
    pub fn v(&self) -> &Array1<f64> {
        &self.v
    }

    /// The greedy policy of the final value table
    #[must_use]
    pub fn policy(&self) -> &[usize] {
        &self.policy
    }

    /// The iteration at which the early-stop criterion was met, if it was
    #[must_use]
    pub fn converged_after(&self) -> Option<usize> {
        self.converged
    }

    /// Whether the early-stop criterion was met before `max_iter`
    #[must_use]
    pub fn has_converged(&self) -> bool {
        self.converged.is_some()
    }
}
