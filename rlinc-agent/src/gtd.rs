//! Gradient-TD learners

use ndarray::{Array1, ArrayView1};

use rlinc_core::value::{LinearVFunction, VFunction};
use rlinc_core::{EnvironmentListener, Factor, Features, ParametricFunction, Sample, StepSize};

use crate::learner::{TdLearner, VFunctionLearner};

/// Linear TD with gradient correction.
///
/// Alongside the value weights, a secondary vector `w` estimates the
/// projection of the TD error onto the features; the correction term makes
/// the update follow the gradient of the projected Bellman error. This is
/// the only learner of the TD family that converges under an arbitrary
/// (off-policy) sampling distribution.
pub struct Tdc<S: StepSize> {
    vf: LinearVFunction,
    /// Secondary weight vector
    w: Array1<f64>,
    alpha_step: S,
    beta_over_alpha: f64,
    gamma: Factor,
    delta: Array1<f64>,
}

impl<S: StepSize> Tdc<S> {
    /// Create a TDC learner; `beta_over_alpha` is the ratio between the
    /// secondary and primary step sizes.
    #[must_use]
    pub fn new(vf: LinearVFunction, gamma: Factor, alpha_step: S, beta_over_alpha: f64) -> Self {
        let n = vf.params_len();
        Self {
            vf,
            w: Array1::zeros(n),
            alpha_step,
            beta_over_alpha,
            gamma,
            delta: Array1::zeros(n),
        }
    }

    /// Process one `(x, xn, r, terminal)` transition
    pub fn add_sample(&mut self, x: ArrayView1<f64>, xn: ArrayView1<f64>, r: f64, terminal: bool) {
        self.alpha_step.advance();
        let alpha = self.alpha_step.current();
        let beta = self.beta_over_alpha * alpha;
        let phix = self.vf.features().phi(x);
        let phixn = self.vf.features().phi(xn);
        let td_err = self.vf.td_error(x, xn, r, terminal, self.gamma);
        let phix_w = phix.dot(&self.w);
        for i in 0..self.delta.len() {
            self.delta[i] = alpha * (td_err * phix[i] - self.gamma.value() * phixn[i] * phix_w);
        }
        self.vf.update_params(self.delta.view());
        for i in 0..self.w.len() {
            self.w[i] += beta * (td_err - phix_w) * phix[i];
        }
    }
}

impl<S: StepSize> EnvironmentListener for Tdc<S> {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {}

    fn receive_sample(&mut self, sample: &Sample) {
        self.add_sample(sample.x.view(), sample.xn.view(), sample.r, sample.terminal);
    }

    fn end_episode(&mut self) {}
}

impl<S: StepSize> VFunctionLearner for Tdc<S> {
    fn v_function(&self) -> &LinearVFunction {
        &self.vf
    }
}

impl<S: StepSize> TdLearner for Tdc<S> {
    fn discount(&self) -> Factor {
        self.gamma
    }
}
