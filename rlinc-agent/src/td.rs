//! TD(0) and TD(lambda) state value learners

use ndarray::{Array1, ArrayView1};

use rlinc_core::value::{LinearVFunction, VFunction};
use rlinc_core::{EnvironmentListener, Factor, Features, ParametricFunction, Sample, StepSize};

use crate::learner::{TdLearner, VFunctionLearner};

/// TD(0): on each sample the weights move by `alpha * delta * phi(x)`,
/// where `delta` is the one-step TD error.
pub struct TdZero<S: StepSize> {
    vf: LinearVFunction,
    step: S,
    gamma: Factor,
}

impl<S: StepSize> TdZero<S> {
    /// Create a TD(0) learner around a linear value function
    #[must_use]
    pub fn new(vf: LinearVFunction, step: S, gamma: Factor) -> Self {
        Self { vf, step, gamma }
    }

    /// Process one `(x, xn, r, terminal)` transition
    pub fn add_sample(&mut self, x: ArrayView1<f64>, xn: ArrayView1<f64>, r: f64, terminal: bool) {
        self.step.advance();
        let td_err = self.vf.td_error(x, xn, r, terminal, self.gamma);
        self.vf.update_for_state(x, self.step.current() * td_err);
    }
}

impl<S: StepSize> EnvironmentListener for TdZero<S> {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {}

    fn receive_sample(&mut self, sample: &Sample) {
        self.add_sample(sample.x.view(), sample.xn.view(), sample.r, sample.terminal);
    }

    fn end_episode(&mut self) {}
}

impl<S: StepSize> VFunctionLearner for TdZero<S> {
    fn v_function(&self) -> &LinearVFunction {
        &self.vf
    }
}

impl<S: StepSize> TdLearner for TdZero<S> {
    fn discount(&self) -> Factor {
        self.gamma
    }
}

/// TD(lambda): a single TD error is spread over recently visited states
/// through an eligibility trace `e <- gamma*lambda*e + phi(x)`.
///
/// With `lambda = 0` the trace degenerates to the instantaneous feature
/// vector and the learner reproduces [`TdZero`] exactly.
pub struct TdLambda<S: StepSize> {
    vf: LinearVFunction,
    step: S,
    gamma: Factor,
    lambda: Factor,
    eligib: Array1<f64>,
    phix: Array1<f64>,
}

impl<S: StepSize> TdLambda<S> {
    /// Create a TD(lambda) learner around a linear value function
    #[must_use]
    pub fn new(vf: LinearVFunction, step: S, gamma: Factor, lambda: Factor) -> Self {
        let n = vf.params_len();
        Self {
            vf,
            step,
            gamma,
            lambda,
            eligib: Array1::zeros(n),
            phix: Array1::zeros(n),
        }
    }

    /// Process one `(x, xn, r, terminal)` transition
    pub fn add_sample(&mut self, x: ArrayView1<f64>, xn: ArrayView1<f64>, r: f64, terminal: bool) {
        self.step.advance();
        let td_err = self.vf.td_error(x, xn, r, terminal, self.gamma);
        self.vf.features().phi_into(x, self.phix.view_mut());
        let decay = self.gamma.value() * self.lambda.value();
        for i in 0..self.eligib.len() {
            self.eligib[i] = decay * self.eligib[i] + self.phix[i];
        }
        self.vf
            .update_for_features(self.eligib.view(), self.step.current() * td_err);
    }
}

impl<S: StepSize> EnvironmentListener for TdLambda<S> {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {
        self.eligib.fill(0.0);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.add_sample(sample.x.view(), sample.xn.view(), sample.r, sample.terminal);
    }

    fn end_episode(&mut self) {}
}

impl<S: StepSize> VFunctionLearner for TdLambda<S> {
    fn v_function(&self) -> &LinearVFunction {
        &self.vf
    }
}

impl<S: StepSize> TdLearner for TdLambda<S> {
    fn discount(&self) -> Factor {
        self.gamma
    }
}
