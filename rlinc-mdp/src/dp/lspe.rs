//! Least-squares policy evaluation

use ndarray::{arr1, Array2};

use rlinc_core::value::LinearQFunction;
use rlinc_core::{linalg, Factor, Features, ParametricFunction, Result};

use crate::mdp::DiscreteMdp;

/// Least-squares policy evaluation over the full discrete state-action
/// space.
///
/// Stacks the feature, transition and policy matrices of the whole grid and
/// solves one linear system through the pseudo-inverse:
/// `w = pinv(Phi^T (Phi - gamma*P*Pi*Phi)) * Phi^T R`. A structural,
/// non-incremental alternative to the streaming state-action learners for
/// small discrete problems.
pub struct Lspe;

impl Lspe {
    /// Fit `q_function` to the values of `pol` (an `n x m` stochastic
    /// policy table) on `mdp`
    pub fn solve(
        mdp: &DiscreteMdp,
        pol: &Array2<f64>,
        q_function: &mut LinearQFunction,
        gamma: Factor,
    ) -> Result<()> {
        let n = mdp.n_states();
        let m = mdp.n_actions();
        let k = q_function.params_len();

        // One row per (state, action) pair, indexed x + n*u
        let mut phi = Array2::zeros((n * m, k));
        let mut p = Array2::zeros((n * m, n));
        let mut pi = Array2::zeros((n, n * m));
        let mut r = ndarray::Array1::zeros(n * m);
        for x in 0..n {
            for u in 0..m {
                let row = x + n * u;
                let feat = q_function
                    .features()
                    .phi(arr1(&[x as f64, u as f64]).view());
                phi.row_mut(row).assign(&feat);
                r[row] = mdp.reward(x, u);
                pi[[x, row]] = pol[[x, u]];
                for xn in 0..n {
                    p[[row, xn]] = mdp.transition(x, u, xn);
                }
            }
        }

        // A = Phi^T (Phi - gamma*P*Pi*Phi), b = Phi^T R
        let p_pi_phi = p.dot(&pi).dot(&phi);
        let a = phi.t().dot(&(&phi - &(p_pi_phi * gamma.value())));
        let b = phi.t().dot(&r);
        let w = linalg::pinv(&a)?.dot(&b);
        q_function.set_params(w.view());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2, Array3};

    use rlinc_core::features::TabularStateActionFeatures;
    use rlinc_core::value::QFunction;

    use crate::dp::PolicyEvaluation;

    use super::*;

    #[test]
    fn matches_exact_policy_evaluation_with_tabular_features() {
        // Two states, two actions: action 0 stays, action 1 switches
        let mut p = Array3::zeros((2, 2, 2));
        p[[0, 0, 0]] = 1.0;
        p[[0, 1, 1]] = 1.0;
        p[[1, 0, 1]] = 1.0;
        p[[1, 1, 0]] = 1.0;
        let r = arr2(&[[0.0, 1.0], [2.0, 0.0]]);
        let mdp = DiscreteMdp::new(arr1(&[1.0, 0.0]), p, r).unwrap();
        let pol = arr2(&[[0.5, 0.5], [0.5, 0.5]]);
        let gamma = Factor::new(0.9).unwrap();

        let mut qf = LinearQFunction::new(
            Box::new(TabularStateActionFeatures::new(2, 2).unwrap()),
            1,
            1,
        )
        .unwrap();
        Lspe::solve(&mdp, &pol, &mut qf, gamma).unwrap();
        let pe = PolicyEvaluation::evaluate(&mdp, &pol, gamma).unwrap();

        for x in 0..2 {
            for u in 0..2 {
                assert_relative_eq!(
                    qf.get(arr1(&[x as f64]).view(), arr1(&[u as f64]).view()),
                    pe.q()[[x, u]],
                    epsilon = 1e-6
                );
            }
        }
    }
}
