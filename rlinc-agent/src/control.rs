//! Off- and on-policy action-value learners

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, Array2, ArrayView1};
use rand::RngCore;

use rlinc_core::value::{LinearQFunction, QFunction};
use rlinc_core::{
    EnvironmentListener, Factor, Features, ParametricFunction, Policy, Sample, StepSize,
};

use crate::learner::QFunctionLearner;

/// Watkins Q(lambda) over a finite action set.
///
/// The behavior action is compared against the greedy action by value
/// equality of the action vectors; an exploratory action cuts the
/// eligibility trace back to the instantaneous state-action features.
pub struct QLearning<S: StepSize> {
    qf: LinearQFunction,
    /// One candidate action per row
    actions: Array2<f64>,
    gamma: Factor,
    lambda: Factor,
    step: S,
    eligib: Array1<f64>,
    psixu: Array1<f64>,
}

impl<S: StepSize> QLearning<S> {
    /// Create a Q(lambda) learner over the action rows of `actions`
    #[must_use]
    pub fn new(
        qf: LinearQFunction,
        actions: Array2<f64>,
        gamma: Factor,
        lambda: Factor,
        step: S,
    ) -> Self {
        let n = qf.params_len();
        Self {
            qf,
            actions,
            gamma,
            lambda,
            step,
            eligib: Array1::zeros(n),
            psixu: Array1::zeros(n),
        }
    }

    /// Index of the greedy action in state `x`
    fn greedy_action(&self, x: ArrayView1<f64>) -> usize {
        let mut best = 0;
        let mut best_q = self.qf.get(x, self.actions.row(0));
        for i in 1..self.actions.nrows() {
            let q = self.qf.get(x, self.actions.row(i));
            if q > best_q {
                best = i;
                best_q = q;
            }
        }
        best
    }
}

impl<S: StepSize> EnvironmentListener for QLearning<S> {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {
        self.eligib.fill(0.0);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.step.advance();
        let best = self.greedy_action(sample.x.view());
        let best_action = self.actions.row(best);
        // Was the behavior action greedy? Compare the action vectors by
        // value, not by identity.
        let greedy = sample.u.view() == best_action;
        let current_q = if greedy {
            self.qf.get(sample.x.view(), best_action)
        } else {
            self.qf.get(sample.x.view(), sample.u.view())
        };
        let mut td_err = sample.r - current_q;
        if !sample.terminal {
            let next_best = self.greedy_action(sample.xn.view());
            td_err += self.gamma.value() * self.qf.get(sample.xn.view(), self.actions.row(next_best));
        }
        let xu = self.qf.concat_input(sample.x.view(), sample.u.view());
        self.qf.features().phi_into(xu.view(), self.psixu.view_mut());
        if greedy {
            let decay = self.gamma.value() * self.lambda.value();
            for i in 0..self.eligib.len() {
                self.eligib[i] = decay * self.eligib[i] + self.psixu[i];
            }
        } else {
            // Exploratory action: the trace no longer backs up to earlier
            // greedy choices
            self.eligib.assign(&self.psixu);
        }
        self.qf
            .update_for_features(self.eligib.view(), self.step.current() * td_err);
    }

    fn end_episode(&mut self) {}
}

impl<S: StepSize> QFunctionLearner for QLearning<S> {
    fn q_function(&self) -> &LinearQFunction {
        &self.qf
    }
}

/// SARSA(lambda): on-policy action-value learning with the follow-up
/// action drawn from the evaluated policy.
pub struct SarsaLambda<P: Policy, R: RngCore, S: StepSize> {
    qf: LinearQFunction,
    policy: Rc<RefCell<P>>,
    rng: R,
    gamma: Factor,
    lambda: Factor,
    step: S,
    eligib: Array1<f64>,
    psixu: Array1<f64>,
}

impl<P: Policy, R: RngCore, S: StepSize> SarsaLambda<P, R, S> {
    /// Create a SARSA(lambda) learner evaluating `policy`
    #[must_use]
    pub fn new(
        qf: LinearQFunction,
        policy: Rc<RefCell<P>>,
        rng: R,
        gamma: Factor,
        lambda: Factor,
        step: S,
    ) -> Self {
        let n = qf.params_len();
        Self {
            qf,
            policy,
            rng,
            gamma,
            lambda,
            step,
            eligib: Array1::zeros(n),
            psixu: Array1::zeros(n),
        }
    }
}

impl<P: Policy, R: RngCore, S: StepSize> EnvironmentListener for SarsaLambda<P, R, S> {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {
        self.eligib.fill(0.0);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.step.advance();
        let un = {
            let mut pol = self.policy.borrow_mut();
            pol.prepare(sample.xn.view());
            pol.draw(&mut self.rng)
        };
        let td_err = self.qf.td_error(
            sample.x.view(),
            sample.u.view(),
            sample.xn.view(),
            un.view(),
            sample.r,
            sample.terminal,
            self.gamma,
        );
        let xu = self.qf.concat_input(sample.x.view(), sample.u.view());
        self.qf.features().phi_into(xu.view(), self.psixu.view_mut());
        let decay = self.gamma.value() * self.lambda.value();
        for i in 0..self.eligib.len() {
            self.eligib[i] = decay * self.eligib[i] + self.psixu[i];
        }
        self.qf
            .update_for_features(self.eligib.view(), self.step.current() * td_err);
    }

    fn end_episode(&mut self) {}
}

impl<P: Policy, R: RngCore, S: StepSize> QFunctionLearner for SarsaLambda<P, R, S> {
    fn q_function(&self) -> &LinearQFunction {
        &self.qf
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use rand::{rngs::StdRng, SeedableRng};

    use rlinc_core::features::TabularStateActionFeatures;
    use rlinc_core::{ConstantActionPolicy, ConstantStepSize};

    use super::*;

    fn qf(n_states: usize, n_actions: usize) -> LinearQFunction {
        LinearQFunction::new(
            Box::new(TabularStateActionFeatures::new(n_states, n_actions).unwrap()),
            1,
            1,
        )
        .unwrap()
    }

    #[test]
    fn q_learning_backs_up_the_greedy_value() {
        let actions = arr2(&[[0.0], [1.0]]);
        let gamma = Factor::new(0.5).unwrap();
        let mut q = QLearning::new(
            qf(2, 2),
            actions,
            gamma,
            Factor::ZERO,
            ConstantStepSize::new(0.5),
        );
        q.new_episode(arr1(&[0.0]).view(), 10);
        // Make Q(1, u=1) attractive, then check the bootstrap picks it up
        q.receive_sample(&Sample::new(arr1(&[1.0]), arr1(&[1.0]), arr1(&[0.0]), 2.0, true));
        assert_relative_eq!(q.q_function().get(arr1(&[1.0]).view(), arr1(&[1.0]).view()), 1.0);
        q.receive_sample(&Sample::new(arr1(&[0.0]), arr1(&[0.0]), arr1(&[1.0]), 0.0, false));
        // td = 0 + 0.5*max_u Q(1,u) - 0 = 0.5
        assert_relative_eq!(q.q_function().get(arr1(&[0.0]).view(), arr1(&[0.0]).view()), 0.25);
    }

    #[test]
    fn exploratory_action_cuts_the_trace() {
        let actions = arr2(&[[0.0], [1.0]]);
        let gamma = Factor::ONE;
        let lambda = Factor::ONE;
        let mut q = QLearning::new(qf(3, 2), actions, gamma, lambda, ConstantStepSize::new(0.1));
        q.new_episode(arr1(&[0.0]).view(), 10);
        // Make action 1 the greedy choice in state 1
        q.receive_sample(&Sample::new(arr1(&[1.0]), arr1(&[1.0]), arr1(&[2.0]), 1.0, true));
        // Take the now non-greedy action 0 in state 1
        q.receive_sample(&Sample::new(arr1(&[1.0]), arr1(&[0.0]), arr1(&[2.0]), 0.0, false));
        // The trace must only carry the last state-action pair
        let expected: Vec<f64> = {
            let xu = q.qf.concat_input(arr1(&[1.0]).view(), arr1(&[0.0]).view());
            q.qf.features().phi(xu.view()).to_vec()
        };
        assert_eq!(q.eligib.to_vec(), expected);
    }

    #[test]
    fn sarsa_lambda_zero_uses_instantaneous_features() {
        let gamma = Factor::new(0.9).unwrap();
        let pol = Rc::new(RefCell::new(ConstantActionPolicy::new(arr1(&[0.0]), 1)));
        let rng = StdRng::seed_from_u64(3);
        let mut sarsa = SarsaLambda::new(
            qf(2, 1),
            pol,
            rng,
            gamma,
            Factor::ZERO,
            ConstantStepSize::new(0.5),
        );
        sarsa.new_episode(arr1(&[0.0]).view(), 10);
        sarsa.receive_sample(&Sample::new(arr1(&[0.0]), arr1(&[0.0]), arr1(&[1.0]), 1.0, false));
        let xu = sarsa.qf.concat_input(arr1(&[0.0]).view(), arr1(&[0.0]).view());
        let psi = sarsa.qf.features().phi(xu.view());
        // With lambda = 0 the trace equals psi(x, u)
        assert_eq!(sarsa.eligib, psi);
        assert_relative_eq!(
            sarsa.q_function().get(arr1(&[0.0]).view(), arr1(&[0.0]).view()),
            0.5
        );
    }
}
