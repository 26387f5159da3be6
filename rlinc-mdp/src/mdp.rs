//! Discrete Markov decision processes

use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

use rlinc_core::{Factor, Result, RlError};

/// Tolerance on probability rows summing to one
const PROB_TOLERANCE: f64 = 1e-9;

/// A Markov decision process with finite states and actions and a
/// deterministic reward function.
///
/// Immutable after construction; consumed wholesale by the dynamic
/// programming solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscreteMdp {
    /// Initial state distribution, length `n`
    p0: Array1<f64>,
    /// Transition tensor, `n x m x n`
    p: Array3<f64>,
    /// Reward table, `n x m`
    r: Array2<f64>,
}

impl DiscreteMdp {
    /// Create an MDP from its initial distribution, transition tensor and
    /// reward table.
    ///
    /// Shapes must be consistent and every `(state, action)` transition row
    /// must sum to one.
    pub fn new(p0: Array1<f64>, p: Array3<f64>, r: Array2<f64>) -> Result<Self> {
        let n = p0.len();
        let (pn, m, pnn) = p.dim();
        if pn != n || pnn != n {
            return Err(RlError::InvalidArgument(
                "transition tensor shape is not consistent with the initial distribution".into(),
            ));
        }
        if r.dim() != (n, m) {
            return Err(RlError::InvalidArgument(
                "reward table shape is not consistent with the transition tensor".into(),
            ));
        }
        for x in 0..n {
            for u in 0..m {
                let sum: f64 = (0..n).map(|xn| p[[x, u, xn]]).sum();
                if (sum - 1.0).abs() > PROB_TOLERANCE {
                    return Err(RlError::InvalidArgument(format!(
                        "transition probabilities for state {x}, action {u} sum to {sum}"
                    )));
                }
            }
        }
        Ok(Self { p0, p, r })
    }

    /// Number of states
    #[must_use]
    pub fn n_states(&self) -> usize {
        self.p0.len()
    }

    /// Number of actions
    #[must_use]
    pub fn n_actions(&self) -> usize {
        self.r.ncols()
    }

    /// Initial state distribution
    #[must_use]
    pub fn p0(&self) -> &Array1<f64> {
        &self.p0
    }

    /// Transition probability of `(x, u) -> xn`
    #[must_use]
    pub fn transition(&self, x: usize, u: usize, xn: usize) -> f64 {
        self.p[[x, u, xn]]
    }

    /// Reward of taking action `u` in state `x`
    #[must_use]
    pub fn reward(&self, x: usize, u: usize) -> f64 {
        self.r[[x, u]]
    }

    /// The state transition kernel `K[x][xn]` induced by a stochastic
    /// policy table (`n x m`, rows summing to one)
    #[must_use]
    pub fn transition_kernel(&self, pol: &Array2<f64>) -> Array2<f64> {
        let n = self.n_states();
        let m = self.n_actions();
        Array2::from_shape_fn((n, n), |(x, xn)| {
            (0..m).map(|u| pol[[x, u]] * self.p[[x, u, xn]]).sum()
        })
    }

    /// The state-action value table derived from a state value table:
    /// `Q[x][u] = R[x][u] + gamma * P[x][u] . V`
    #[must_use]
    pub fn q_from_v(&self, v: &Array1<f64>, gamma: Factor) -> Array2<f64> {
        let n = self.n_states();
        let m = self.n_actions();
        Array2::from_shape_fn((n, m), |(x, u)| {
            let future: f64 = (0..n).map(|xn| self.p[[x, u, xn]] * v[xn]).sum();
            self.r[[x, u]] + gamma.value() * future
        })
    }

    /// The greedy deterministic policy with respect to a state-action value
    /// table; ties break toward the lowest action index.
    #[must_use]
    pub fn greedy_policy(&self, q: &Array2<f64>) -> Vec<usize> {
        (0..self.n_states())
            .map(|x| {
                let mut best = 0;
                for u in 1..self.n_actions() {
                    if q[[x, u]] > q[[x, best]] {
                        best = u;
                    }
                }
                best
            })
            .collect()
    }

    /// The expected discounted reward of a state value table under the
    /// initial state distribution
    #[must_use]
    pub fn expected_discounted_reward(&self, v: &Array1<f64>) -> f64 {
        v.dot(&self.p0)
    }

    /// Squared Bellman residual of a state-action value table under a
    /// stochastic policy
    #[must_use]
    pub fn q_bellman_error(&self, q: &Array2<f64>, pol: &Array2<f64>, gamma: Factor) -> f64 {
        let n = self.n_states();
        let m = self.n_actions();
        let mut error = 0.0;
        for x in 0..n {
            for u in 0..m {
                let mut next_q = 0.0;
                for xn in 0..n {
                    for un in 0..m {
                        next_q += self.p[[x, u, xn]] * pol[[xn, un]] * q[[xn, un]];
                    }
                }
                error += (self.r[[x, u]] + gamma.value() * next_q - q[[x, u]]).powi(2);
            }
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2, Array3};

    use super::*;

    fn two_state() -> DiscreteMdp {
        // Two states, two actions: action 0 stays, action 1 switches
        let mut p = Array3::zeros((2, 2, 2));
        p[[0, 0, 0]] = 1.0;
        p[[0, 1, 1]] = 1.0;
        p[[1, 0, 1]] = 1.0;
        p[[1, 1, 0]] = 1.0;
        let r = arr2(&[[0.0, 1.0], [2.0, 0.0]]);
        DiscreteMdp::new(arr1(&[1.0, 0.0]), p, r).unwrap()
    }

    #[test]
    fn rejects_inconsistent_shapes() {
        let p = Array3::zeros((2, 1, 3));
        let r = arr2(&[[0.0], [0.0]]);
        assert!(DiscreteMdp::new(arr1(&[1.0, 0.0]), p, r).is_err());
    }

    #[test]
    fn rejects_non_normalized_transitions() {
        let mut p = Array3::zeros((1, 1, 1));
        p[[0, 0, 0]] = 0.5;
        let r = arr2(&[[0.0]]);
        assert!(DiscreteMdp::new(arr1(&[1.0]), p, r).is_err());
    }

    #[test]
    fn kernel_mixes_actions_by_policy() {
        let mdp = two_state();
        let pol = arr2(&[[0.5, 0.5], [1.0, 0.0]]);
        let k = mdp.transition_kernel(&pol);
        assert!((k[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((k[[0, 1]] - 0.5).abs() < 1e-12);
        assert!((k[[1, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn q_from_v_adds_discounted_future() {
        let mdp = two_state();
        let gamma = Factor::new(0.5).unwrap();
        let v = arr1(&[1.0, 2.0]);
        let q = mdp.q_from_v(&v, gamma);
        // Q[0][1] = R[0][1] + 0.5 * V[1]
        assert!((q[[0, 1]] - 2.0).abs() < 1e-12);
        // Q[1][0] = R[1][0] + 0.5 * V[1]
        assert!((q[[1, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn greedy_policy_takes_the_argmax() {
        let mdp = two_state();
        let q = arr2(&[[0.0, 1.0], [2.0, 0.5]]);
        assert_eq!(mdp.greedy_policy(&q), vec![1, 0]);
    }
}
