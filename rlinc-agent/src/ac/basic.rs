//! TD-error actor-critic

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

use rlinc_core::value::VFunction;
use rlinc_core::{
    Agent, EnvironmentListener, Factor, LogDifferentiablePolicy, ParametricFunction, Result,
    RlError, Sample, StepSize,
};

use crate::learner::{TdLearner, VFunctionLearner};

/// Basic actor-critic: the critic is any TD learner and the actor follows
/// `beta * delta * grad log pi(u|x)`, the TD error standing in for the
/// advantage in the policy gradient.
pub struct BasicAc<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> {
    policy: Rc<RefCell<P>>,
    critic: C,
    step: S,
    gamma: Factor,
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> BasicAc<P, C, S> {
    /// Create a basic actor-critic.
    ///
    /// The critic's state dimension must match the policy's; a mismatch is
    /// rejected here rather than at update time.
    pub fn new(policy: Rc<RefCell<P>>, critic: C, step: S) -> Result<Self> {
        let x_dim = policy.borrow().x_dim();
        if critic.v_function().x_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: critic.v_function().x_dim(),
            });
        }
        let gamma = critic.discount();
        Ok(Self {
            policy,
            critic,
            step,
            gamma,
        })
    }

    /// The critic
    #[must_use]
    pub fn critic(&self) -> &C {
        &self.critic
    }
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> EnvironmentListener
    for BasicAc<P, C, S>
{
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize) {
        self.critic.new_episode(x0, max_t);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.critic.receive_sample(sample);
        self.step.advance();
        let td_err = self.critic.v_function().td_error(
            sample.x.view(),
            sample.xn.view(),
            sample.r,
            sample.terminal,
            self.gamma,
        );
        let beta = self.step.current();
        let mut dj = self
            .policy
            .borrow()
            .d_log_d_theta(sample.x.view(), sample.u.view());
        dj *= beta * td_err;
        self.policy.borrow_mut().update_params(dj.view());
    }

    fn end_episode(&mut self) {
        self.critic.end_episode();
    }
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> Agent for BasicAc<P, C, S> {
    fn take_action(&mut self, x: ArrayView1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
        let mut policy = self.policy.borrow_mut();
        policy.prepare(x);
        policy.draw(rng)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use rlinc_core::features::{IdentityFeatures, TabularStateFeatures};
    use rlinc_core::value::LinearVFunction;
    use rlinc_core::{ConstantStepSize, LinearGaussianPolicy};

    use crate::td::TdZero;

    use super::*;

    fn policy() -> Rc<RefCell<LinearGaussianPolicy>> {
        let feat = Box::new(IdentityFeatures::new(1).unwrap());
        Rc::new(RefCell::new(
            LinearGaussianPolicy::new(feat, arr1(&[1.0])).unwrap(),
        ))
    }

    fn critic(n: usize) -> TdZero<ConstantStepSize> {
        let vf = LinearVFunction::new(Box::new(TabularStateFeatures::new(n).unwrap()));
        TdZero::new(vf, ConstantStepSize::new(0.1), Factor::new(0.9).unwrap())
    }

    #[test]
    fn rejects_state_dimension_mismatch() {
        // Policy over 1-dimensional states, critic over a 2-component state
        let feat = Box::new(IdentityFeatures::new(2).unwrap());
        let pol = Rc::new(RefCell::new(
            LinearGaussianPolicy::new(feat, arr1(&[1.0])).unwrap(),
        ));
        assert!(BasicAc::new(pol, critic(2), ConstantStepSize::new(0.01)).is_err());
    }

    #[test]
    fn positive_td_error_reinforces_the_action_direction() {
        let pol = policy();
        let mut ac = BasicAc::new(pol.clone(), critic(2), ConstantStepSize::new(0.1)).unwrap();
        // r > 0 from a zero-value start gives a positive TD error; an action
        // above the current mean must push the mean upward.
        let sample = Sample::new(arr1(&[1.0]), arr1(&[1.0]), arr1(&[0.0]), 1.0, false);
        ac.receive_sample(&sample);
        let mean = pol.borrow().mean_action(arr1(&[1.0]).view())[0];
        assert!(mean > 0.0);
    }
}
