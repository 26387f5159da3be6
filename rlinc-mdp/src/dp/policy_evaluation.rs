//! Exact evaluation of a fixed stochastic policy

use ndarray::{Array1, Array2};

use rlinc_core::{linalg, Factor, Result};

use crate::mdp::DiscreteMdp;

/// Exact state and state-action values of a fixed stochastic policy.
///
/// One-shot: builds the policy's transition kernel, solves
/// `(I - gamma*K) V = R_pi` directly, and derives `Q` from `V`.
pub struct PolicyEvaluation {
    v: Array1<f64>,
    q: Array2<f64>,
}

impl PolicyEvaluation {
    /// Evaluate `pol` (an `n x m` stochastic policy table) on `mdp`
    pub fn evaluate(mdp: &DiscreteMdp, pol: &Array2<f64>, gamma: Factor) -> Result<Self> {
        let n = mdp.n_states();
        let m = mdp.n_actions();
        let kernel = mdp.transition_kernel(pol);

        let r_pi = Array1::from_shape_fn(n, |x| {
            (0..m).map(|u| pol[[x, u]] * mdp.reward(x, u)).sum()
        });
        let mut system = Array2::eye(n);
        for x in 0..n {
            for xn in 0..n {
                system[[x, xn]] -= gamma.value() * kernel[[x, xn]];
            }
        }
        let v = linalg::solve(&system, r_pi.view())?;
        let q = mdp.q_from_v(&v, gamma);
        Ok(Self { v, q })
    }

    /// The state value table
    #[must_use]
    pub fn v(&self) -> &Array1<f64> {
        &self.v
    }

    /// The state-action value table
    #[must_use]
    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }
}
