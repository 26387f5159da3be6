//! Kalman natural actor-critic

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

use rlinc_core::features::CompatibleFeatures;
use rlinc_core::value::{LinearQFunction, LinearVFunction, VFunction};
use rlinc_core::{
    Agent, EnvironmentListener, Factor, LogDifferentiablePolicy, ParametricFunction, Result,
    RlError, Sample, StepSize,
};

use crate::ktd::KtdAv;
use crate::learner::QFunctionLearner;

/// Kalman natural actor-critic.
///
/// A Kalman advantage/value critic tracks the compatible advantage weights;
/// the actor follows them every sample. There is no explicit forgetting:
/// the filter's process noise keeps the estimate adaptive as the policy
/// drifts.
pub struct Knac<P: LogDifferentiablePolicy, S: StepSize> {
    policy: Rc<RefCell<P>>,
    critic: KtdAv,
    step: S,
}

impl<P: LogDifferentiablePolicy + 'static, S: StepSize> Knac<P, S> {
    /// Create a Kalman natural actor-critic around an externally built
    /// state value approximator
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: Rc<RefCell<P>>,
        v_function: LinearVFunction,
        step: S,
        gamma: Factor,
        lambda: Factor,
        p_evo_init: f64,
        eta: f64,
        p_obs_step: f64,
        k: f64,
        sigma_squared: f64,
        x_dim: usize,
        u_dim: usize,
    ) -> Result<Self> {
        if policy.borrow().x_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: policy.borrow().x_dim(),
            });
        }
        if v_function.x_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: v_function.x_dim(),
            });
        }
        let a_function = LinearQFunction::new(
            Box::new(CompatibleFeatures::new(policy.clone(), x_dim, u_dim)),
            x_dim,
            u_dim,
        )?;
        let critic = KtdAv::new(
            a_function,
            v_function,
            gamma,
            lambda,
            p_evo_init,
            eta,
            p_obs_step,
            k,
            sigma_squared,
        )?;
        Ok(Self {
            policy,
            critic,
            step,
        })
    }

    /// The critic
    #[must_use]
    pub fn critic(&self) -> &KtdAv {
        &self.critic
    }
}

impl<P: LogDifferentiablePolicy, S: StepSize> EnvironmentListener for Knac<P, S> {
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize) {
        self.critic.new_episode(x0, max_t);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.critic.receive_sample(sample);
        self.step.advance();
        let beta = self.step.current();
        let mut dj: Array1<f64> = self.critic.q_function().params().to_owned();
        dj *= beta;
        self.policy.borrow_mut().update_params(dj.view());
    }

    fn end_episode(&mut self) {
        self.critic.end_episode();
    }
}

impl<P: LogDifferentiablePolicy, S: StepSize> Agent for Knac<P, S> {
    fn take_action(&mut self, x: ArrayView1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
        let mut policy = self.policy.borrow_mut();
        policy.prepare(x);
        policy.draw(rng)
    }
}
