//! Natural-gradient actor-critic

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

use rlinc_core::features::{CompatibleFeatures, Features};
use rlinc_core::value::{LinearQFunction, LinearVFunction};
use rlinc_core::{
    Agent, EnvironmentListener, Factor, LogDifferentiablePolicy, ParametricFunction, Result,
    RlError, Sample, StepSize,
};

use crate::learner::QFunctionLearner;
use crate::lstd::IlstdAv;

/// Natural actor-critic.
///
/// The critic is an incremental LSTD learner estimating the advantage (on
/// compatible features) and the state value function jointly. For a
/// log-differentiable policy the materialized advantage weights are the
/// natural-gradient direction, so the actor periodically shifts its
/// parameters by `alpha * w` and partially forgets the critic statistics.
pub struct Nac<P: LogDifferentiablePolicy, S: StepSize> {
    policy: Rc<RefCell<P>>,
    critic: IlstdAv,
    step: S,
    kappa: Factor,
    /// Samples per actor update; zero disables actor updates entirely
    nb_samples_before_update: usize,
    samples_since_update: usize,
}

impl<P: LogDifferentiablePolicy + 'static, S: StepSize> Nac<P, S> {
    /// Create a natural actor-critic.
    ///
    /// `state_features` feed the state value half of the critic and must
    /// consume the same state dimension as the policy.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        policy: Rc<RefCell<P>>,
        state_features: Box<dyn Features>,
        step: S,
        gamma: Factor,
        lambda: Factor,
        kappa: Factor,
        nb_samples_before_update: usize,
        diag_ainv0: f64,
        x_dim: usize,
        u_dim: usize,
    ) -> Result<Self> {
        if policy.borrow().x_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: policy.borrow().x_dim(),
            });
        }
        if state_features.in_dim() != x_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim,
                actual: state_features.in_dim(),
            });
        }
        let a_function = LinearQFunction::new(
            Box::new(CompatibleFeatures::new(policy.clone(), x_dim, u_dim)),
            x_dim,
            u_dim,
        )?;
        let v_function = LinearVFunction::new(state_features);
        let critic = IlstdAv::new(
            a_function,
            v_function,
            gamma,
            lambda,
            nb_samples_before_update,
            diag_ainv0,
        )?;
        Ok(Self {
            policy,
            critic,
            step,
            kappa,
            nb_samples_before_update,
            samples_since_update: 0,
        })
    }

    /// The critic
    #[must_use]
    pub fn critic(&self) -> &IlstdAv {
        &self.critic
    }
}

impl<P: LogDifferentiablePolicy, S: StepSize> EnvironmentListener for Nac<P, S> {
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize) {
        self.critic.new_episode(x0, max_t);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.step.advance();
        self.samples_since_update += 1;

        self.critic.receive_sample(sample);

        if self.nb_samples_before_update == 0
            || self.samples_since_update < self.nb_samples_before_update
        {
            return;
        }
        // The critic has seen a full batch: follow the natural gradient,
        // then partially forget the statistics gathered under the old policy.
        let alpha = self.step.current();
        let mut w: Array1<f64> = self.critic.q_function().params().to_owned();
        w *= alpha;
        self.policy.borrow_mut().update_params(w.view());
        self.critic.apply_forget_factor(self.kappa);
        self.samples_since_update = 0;
    }

    fn end_episode(&mut self) {
        self.critic.end_episode();
    }
}

impl<P: LogDifferentiablePolicy, S: StepSize> Agent for Nac<P, S> {
    fn take_action(&mut self, x: ArrayView1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
        let mut policy = self.policy.borrow_mut();
        policy.prepare(x);
        policy.draw(rng)
    }
}
