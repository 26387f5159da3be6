//! Advantage actor-critic

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

use rlinc_core::features::CompatibleFeatures;
use rlinc_core::value::{LinearQFunction, QFunction, VFunction};
use rlinc_core::{
    Agent, EnvironmentListener, LogDifferentiablePolicy, ParametricFunction, Result, RlError,
    Sample, StepSize,
};

use crate::advantage::AdvantageTdBootstrap;
use crate::learner::{QFunctionLearner, TdLearner, VFunctionLearner};

/// Vanilla actor-critic: the actor scales the policy log-gradient by an
/// advantage estimate instead of the raw TD error, reducing the variance of
/// the gradient estimate.
///
/// The advantage approximator lives on the policy's compatible features and
/// is bootstrapped from the TD error of the wrapped state value learner.
pub struct Vac<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> {
    policy: Rc<RefCell<P>>,
    bootstrap: AdvantageTdBootstrap<C, S>,
    actor_step: S,
}

impl<P: LogDifferentiablePolicy + 'static, C: TdLearner, S: StepSize> Vac<P, C, S> {
    /// Create a vanilla actor-critic.
    ///
    /// The critic's state dimension must match the policy's; the critic
    /// bootstrap and the actor advance their own step-size schedules.
    pub fn new(
        policy: Rc<RefCell<P>>,
        td: C,
        critic_step: S,
        actor_step: S,
        x_dim: usize,
        u_dim: usize,
    ) -> Result<Self> {
        if policy.borrow().x_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: policy.borrow().x_dim(),
            });
        }
        if td.v_function().x_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: td.v_function().x_dim(),
            });
        }
        let a_function = LinearQFunction::new(
            Box::new(CompatibleFeatures::new(policy.clone(), x_dim, u_dim)),
            x_dim,
            u_dim,
        )?;
        let bootstrap = AdvantageTdBootstrap::new(a_function, td, critic_step);
        Ok(Self {
            policy,
            bootstrap,
            actor_step,
        })
    }

    /// The advantage estimate backing the actor updates
    #[must_use]
    pub fn a_function(&self) -> &LinearQFunction {
        self.bootstrap.q_function()
    }
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> EnvironmentListener for Vac<P, C, S> {
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize) {
        self.bootstrap.new_episode(x0, max_t);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.bootstrap.receive_sample(sample);
        self.actor_step.advance();
        let beta = self.actor_step.current();
        let advantage = self
            .bootstrap
            .q_function()
            .get(sample.x.view(), sample.u.view());
        let mut dj = self
            .policy
            .borrow()
            .d_log_d_theta(sample.x.view(), sample.u.view());
        dj *= beta * advantage;
        self.policy.borrow_mut().update_params(dj.view());
    }

    fn end_episode(&mut self) {
        self.bootstrap.end_episode();
    }
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> Agent for Vac<P, C, S> {
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
    use rlinc_core::{ConstantStepSize, Factor, LinearGaussianPolicy};

    use crate::td::TdZero;

    use super::*;

    fn policy(x_dim: usize) -> Rc<RefCell<LinearGaussianPolicy>> {
        let feat = Box::new(IdentityFeatures::new(x_dim).unwrap());
        Rc::new(RefCell::new(
            LinearGaussianPolicy::new(feat, arr1(&[1.0])).unwrap(),
        ))
    }

    fn critic() -> TdZero<ConstantStepSize> {
        let vf = LinearVFunction::new(Box::new(TabularStateFeatures::new(2).unwrap()));
        TdZero::new(vf, ConstantStepSize::new(0.2), Factor::new(0.9).unwrap())
    }

    #[test]
    fn rejects_mismatched_policy_dimensions() {
        assert!(Vac::new(
            policy(2),
            critic(),
            ConstantStepSize::new(0.1),
            ConstantStepSize::new(0.01),
            1,
            1
        )
        .is_err());
    }

    #[test]
    fn advantage_feeds_the_actor_update() {
        let pol = policy(1);
        let mut vac = Vac::new(
            pol.clone(),
            critic(),
            ConstantStepSize::new(0.5),
            ConstantStepSize::new(0.1),
            1,
            1,
        )
        .unwrap();
        let sample = Sample::new(arr1(&[1.0]), arr1(&[1.0]), arr1(&[0.0]), 1.0, false);
        vac.receive_sample(&sample);
        // The bootstrap saw a positive TD error, so the advantage of the
        // taken action is positive and the mean moves toward it.
        assert!(vac.a_function().get(arr1(&[1.0]).view(), arr1(&[1.0]).view()) > 0.0);
        assert!(pol.borrow().mean_action(arr1(&[1.0]).view())[0] > 0.0);
    }
}
