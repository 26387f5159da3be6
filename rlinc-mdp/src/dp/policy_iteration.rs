//! Policy iteration

use ndarray::{Array1, Array2};
use rand::{Rng, RngCore};
use tracing::debug;

use rlinc_core::{linalg, Factor, Result, RlError};

use crate::mdp::DiscreteMdp;

/// Policy iteration: alternates exact evaluation of the current
/// deterministic policy (a direct matrix solve) with greedy improvement,
/// until the policy is a fixed point or `max_iter` is reached.
pub struct PolicyIteration {
    q: Array2<f64>,
    v: Array1<f64>,
    policy: Vec<usize>,
    converged: Option<usize>,
}

impl PolicyIteration {
    /// Run policy iteration on `mdp`, starting from a uniformly random
    /// deterministic policy
    pub fn solve(
        mdp: &DiscreteMdp,
        gamma: Factor,
        max_iter: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        if max_iter == 0 {
            return Err(RlError::InvalidArgument(
                "the maximum number of iterations must be greater than zero".into(),
            ));
        }
        let n = mdp.n_states();
        let m = mdp.n_actions();
        let mut policy: Vec<usize> = (0..n).map(|_| rng.gen_range(0..m)).collect();
        let mut q: Array2<f64> = Array2::zeros((n, m));
        let mut v: Array1<f64> = Array1::zeros(n);
        let mut converged = None;

        for iter in 1..=max_iter {
            // Evaluate the current deterministic policy exactly:
            // (I - gamma*P_pol) V = R_pol
            let r_pol = Array1::from_shape_fn(n, |x| mdp.reward(x, policy[x]));
            let mut system = Array2::eye(n);
            for x in 0..n {
                for xn in 0..n {
                    system[[x, xn]] -= gamma.value() * mdp.transition(x, policy[x], xn);
                }
            }
            v = linalg::solve(&system, r_pol.view())?;

            // Greedy improvement
            q = mdp.q_from_v(&v, gamma);
            let improved = mdp.greedy_policy(&q);
            if improved == policy {
                converged = Some(iter);
                debug!(iterations = iter, "policy iteration converged");
                break;
            }
            policy = improved;
        }
        // State values of the final policy
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

    /// The state-action value table of the final policy
    #[must_use]
    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }

    /// The state value table of the final policy
    #[must_use]
    pub fn v(&self) -> &Array1<f64> {
        &self.v
    }

    /// The final deterministic policy
    #[must_use]
    pub fn policy(&self) -> &[usize] {
        &self.policy
    }

    /// The iteration at which the policy stopped changing, if it did
    #[must_use]
    pub fn converged_after(&self) -> Option<usize> {
        self.converged
    }

    /// Whether the policy reached a fixed point before `max_iter`
    #[must_use]
    pub fn has_converged(&self) -> bool {
        self.converged.is_some()
    }
}
