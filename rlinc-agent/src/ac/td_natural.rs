//! TD-based natural actor-critic

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

use rlinc_core::features::CompatibleFeatures;
use rlinc_core::value::{LinearQFunction, VFunction};
use rlinc_core::{
    Agent, EnvironmentListener, Factor, LogDifferentiablePolicy, ParametricFunction, Result,
    RlError, Sample, StepSize,
};

use crate::advantage::AdvantageTdBootstrap;
use crate::learner::{QFunctionLearner, TdLearner, VFunctionLearner};

/// TD-based natural actor-critic.
///
/// The compatible advantage weights bootstrapped from the TD error are
/// themselves the natural-gradient estimate: each sample the actor moves by
/// `beta * w`, then `w` is softly forgotten in place (`w <- kappa * w`)
/// rather than resetting the whole critic.
pub struct TdNac<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> {
    policy: Rc<RefCell<P>>,
    bootstrap: AdvantageTdBootstrap<C, S>,
    actor_step: S,
    kappa: Factor,
}

impl<P: LogDifferentiablePolicy + 'static, C: TdLearner, S: StepSize> TdNac<P, C, S> {
    /// Create a TD-based natural actor-critic
    pub fn new(
        policy: Rc<RefCell<P>>,
        td: C,
        critic_step: S,
        actor_step: S,
        kappa: Factor,
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
            kappa,
        })
    }

    /// The advantage estimate backing the actor updates
    #[must_use]
    pub fn a_function(&self) -> &LinearQFunction {
        self.bootstrap.q_function()
    }
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> EnvironmentListener
    for TdNac<P, C, S>
{
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize) {
        self.bootstrap.new_episode(x0, max_t);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.bootstrap.receive_sample(sample);
        self.actor_step.advance();
        let beta = self.actor_step.current();
        let mut w: Array1<f64> = self.bootstrap.q_function().params().to_owned();
        let mut dj = w.clone();
        dj *= beta;
        self.policy.borrow_mut().update_params(dj.view());
        // Soft forget applied directly to the advantage weights
        w *= self.kappa.value();
        self.bootstrap.q_function_mut().set_params(w.view());
    }

    fn end_episode(&mut self) {
        self.bootstrap.end_episode();
    }
}

impl<P: LogDifferentiablePolicy, C: TdLearner, S: StepSize> Agent for TdNac<P, C, S> {
    fn take_action(&mut self, x: ArrayView1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
        let mut policy = self.policy.borrow_mut();
        policy.prepare(x);
        policy.draw(rng)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
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

    fn critic() -> TdZero<ConstantStepSize> {
        let vf = LinearVFunction::new(Box::new(TabularStateFeatures::new(2).unwrap()));
        TdZero::new(vf, ConstantStepSize::new(0.2), Factor::new(0.9).unwrap())
    }

    #[test]
    fn kappa_zero_clears_the_advantage_weights_each_sample() {
        let mut agent = TdNac::new(
            policy(),
            critic(),
            ConstantStepSize::new(0.5),
            ConstantStepSize::new(0.1),
            Factor::ZERO,
            1,
            1,
        )
        .unwrap();
        let sample = Sample::new(arr1(&[1.0]), arr1(&[1.0]), arr1(&[0.0]), 1.0, false);
        agent.receive_sample(&sample);
        for &w in agent.a_function().params() {
            assert_relative_eq!(w, 0.0);
        }
    }

    #[test]
    fn actor_follows_the_advantage_weights() {
        let pol = policy();
        let mut agent = TdNac::new(
            pol.clone(),
            critic(),
            ConstantStepSize::new(0.5),
            ConstantStepSize::new(0.1),
            Factor::ONE,
            1,
            1,
        )
        .unwrap();
        let sample = Sample::new(arr1(&[1.0]), arr1(&[1.0]), arr1(&[0.0]), 1.0, false);
        agent.receive_sample(&sample);
        // w is positive after a positive TD error on a positive psi, and
        // theta moved by 0.1 * w
        let w = agent.a_function().params()[0];
        assert!(w > 0.0);
        assert_relative_eq!(pol.borrow().params()[0], 0.1 * w);
    }
}
