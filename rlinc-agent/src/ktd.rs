//! Kalman temporal-difference learners
//!
//! The value parameters are treated as the hidden state of a Kalman filter
//! whose observation is the reward; the filter's process noise takes the
//! role that step sizes and forget factors play elsewhere.

use ndarray::{s, Array1, Array2, ArrayView1};
use tracing::warn;

use rlinc_core::linalg;
use rlinc_core::value::{LinearQFunction, LinearVFunction, QFunction, VFunction};
use rlinc_core::{
    EnvironmentListener, Factor, Features, ParametricFunction, Result, RlError, Sample,
};

use crate::learner::{QFunctionLearner, VFunctionLearner};

fn check_noise(name: &str, value: f64) -> Result<()> {
    if value <= 0.0 {
        return Err(RlError::InvalidArgument(format!(
            "{name} must be positive"
        )));
    }
    Ok(())
}

/// KTD-V for linear value approximators.
///
/// Being an exact filter for the linear observation model, no sigma points
/// are needed: the observation row is `H = phi(x) - gamma*phi(xn)` and the
/// gain follows from the predicted covariance directly. Not suitable for
/// stochastic transitions.
pub struct LinearKtdZero {
    vf: LinearVFunction,
    gamma: Factor,
    p_evo: Array2<f64>,
    p_evo_step: f64,
    p_obs_step: f64,
    h: Array1<f64>,
    s: Array1<f64>,
}

impl LinearKtdZero {
    /// Create a linear KTD-V learner.
    ///
    /// `p_evo_init` seeds the evolution covariance diagonal, `p_evo_step` is
    /// added to it at every sample, and `p_obs_step` is the observation
    /// noise; the seed and observation noise must be positive.
    pub fn new(
        vf: LinearVFunction,
        gamma: Factor,
        p_evo_init: f64,
        p_evo_step: f64,
        p_obs_step: f64,
    ) -> Result<Self> {
        check_noise("the evolution covariance seed", p_evo_init)?;
        check_noise("the observation noise", p_obs_step)?;
        let n = vf.params_len();
        Ok(Self {
            vf,
            gamma,
            p_evo: Array2::eye(n) * p_evo_init,
            p_evo_step,
            p_obs_step,
            h: Array1::zeros(n),
            s: Array1::zeros(n),
        })
    }
}

impl EnvironmentListener for LinearKtdZero {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {}

    fn receive_sample(&mut self, sample: &Sample) {
        let n = self.s.len();
        // Prediction step
        self.s.assign(&self.vf.params());
        for i in 0..n {
            self.p_evo[[i, i]] += self.p_evo_step;
        }
        // Observation row H = phi(x) - gamma*phi(xn)
        self.vf
            .features()
            .phi_into(sample.x.view(), self.h.view_mut());
        if !sample.terminal {
            let phixn = self.vf.features().phi(sample.xn.view());
            self.h.scaled_add(-self.gamma.value(), &phixn);
        }
        let r_predict = self.h.dot(&self.s);
        let p_s_r = self.p_evo.dot(&self.h);
        let p_r = self.h.dot(&p_s_r) + self.p_obs_step;
        // Optimal gain and correction
        let td_err = sample.r - r_predict;
        let gain = &p_s_r / p_r;
        self.s.scaled_add(td_err, &gain);
        let k_p_r = &gain * p_r;
        for i in 0..n {
            for j in 0..n {
                self.p_evo[[i, j]] -= k_p_r[i] * gain[j];
            }
        }
        self.vf.set_params(self.s.view());
    }

    fn end_episode(&mut self) {}
}

impl VFunctionLearner for LinearKtdZero {
    fn v_function(&self) -> &LinearVFunction {
        &self.vf
    }
}

/// Unscented KTD estimating the advantage and the state value function
/// jointly.
///
/// The filter state stacks the advantage parameters, the state value
/// parameters and two observation-noise components coupled through the
/// evolution matrix. Sigma points are spread along the columns of a
/// Cholesky factor of the scaled predicted covariance; a non-positive-
/// definite covariance is reported and the sample is skipped.
pub struct KtdAv {
    a_function: LinearQFunction,
    v_function: LinearVFunction,
    gamma: Factor,
    /// Scaling of the adaptive evolution noise
    eta: f64,
    p_obs_step: f64,
    /// Sigma-point spread
    k: f64,
    /// Advantage parameter count
    m: usize,
    /// State value parameter count
    n: usize,
    p_evo: Array2<f64>,
    p_evo_step: Array2<f64>,
    f: Array2<f64>,
    s: Array1<f64>,
}

impl KtdAv {
    /// Create a KTD advantage/value learner.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a_function: LinearQFunction,
        v_function: LinearVFunction,
        gamma: Factor,
        lambda: Factor,
        p_evo_init: f64,
        eta: f64,
        p_obs_step: f64,
        k: f64,
        sigma_squared: f64,
    ) -> Result<Self> {
        check_noise("the evolution covariance seed", p_evo_init)?;
        check_noise("the observation noise", p_obs_step)?;
        let m = a_function.params_len();
        let n = v_function.params_len();
        let dim = m + n + 2;

        let p_evo = Array2::eye(dim) * p_evo_init;

        let mut p_evo_step = Array2::zeros((dim, dim));
        let g = gamma.value();
        if eta == 0.0 {
            p_evo_step[[m + n, m + n]] = sigma_squared;
            p_evo_step[[m + n + 1, m + n]] = sigma_squared;
            p_evo_step[[m + n, m + n + 1]] = sigma_squared;
            p_evo_step[[m + n + 1, m + n + 1]] = sigma_squared;
        } else {
            p_evo_step[[m + n, m + n]] = sigma_squared;
            p_evo_step[[m + n + 1, m + n]] = -g * sigma_squared;
            p_evo_step[[m + n, m + n + 1]] = -g * sigma_squared;
            p_evo_step[[m + n + 1, m + n + 1]] = g * g * sigma_squared;
        }

        let mut s = Array1::zeros(dim);
        s.slice_mut(ndarray::s![..m]).assign(&a_function.params());
        s.slice_mut(ndarray::s![m..m + n])
            .assign(&v_function.params());

        let mut f = Array2::eye(dim);
        f[[m + n, m + n]] = g * lambda.value();
        f[[m + n + 1, m + n]] = 0.0;
        f[[m + n, m + n + 1]] = -g * (1.0 - lambda.value());
        f[[m + n + 1, m + n + 1]] = 0.0;

        Ok(Self {
            a_function,
            v_function,
            gamma,
            eta,
            p_obs_step,
            k,
            m,
            n,
            p_evo,
            p_evo_step,
            f,
            s,
        })
    }

    /// The current state value function estimate
    #[must_use]
    pub fn v_function(&self) -> &LinearVFunction {
        &self.v_function
    }

    /// Evaluate the observation model at one sigma point
    fn observe_point(&mut self, point: ArrayView1<f64>, sample: &Sample) -> f64 {
        self.a_function.set_params(point.slice(s![..self.m]));
        self.v_function
            .set_params(point.slice(s![self.m..self.m + self.n]));
        let axu = self.a_function.get(sample.x.view(), sample.u.view());
        let vx = self.v_function.get(sample.x.view());
        let mut predicted = axu + vx + point[self.m + self.n + 1];
        if !sample.terminal {
            predicted -= self.gamma.value() * self.v_function.get(sample.xn.view());
        }
        predicted
    }
}

impl EnvironmentListener for KtdAv {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {}

    fn receive_sample(&mut self, sample: &Sample) {
        let dim = self.m + self.n + 2;

        // Prediction step: s <- F*s, P <- F*P*F^T + P_step
        self.s = self.f.dot(&self.s);
        let block = self.m + self.n;
        for i in 0..block {
            for j in 0..block {
                self.p_evo_step[[i, j]] *= self.eta;
            }
        }
        self.p_evo = self.f.dot(&self.p_evo).dot(&self.f.t()) + &self.p_evo_step;

        // Sigma points along the columns of the Cholesky factor of the
        // scaled covariance
        let scale = (self.m + self.n) as f64 + self.k;
        let scaled = &self.p_evo * scale;
        let l = match linalg::cholesky(&scaled) {
            Ok(l) => l,
            Err(err) => {
                warn!(%err, "KTDAV covariance not positive definite, sample skipped");
                return;
            }
        };
        let weight = 1.0 / (2.0 * scale);
        let mut sigpts = Vec::with_capacity(2 * dim);
        for i in 0..dim {
            let col = l.column(i);
            sigpts.push(&self.s + &col);
            sigpts.push(&self.s - &col);
        }

        // Propagate the sigma points through the observation model
        let mean = self.s.clone();
        let predictions: Vec<f64> = sigpts
            .iter()
            .map(|p| self.observe_point(p.view(), sample))
            .collect();
        let r_predict: f64 = predictions.iter().map(|p| weight * p).sum();

        // Cross-covariance and innovation variance
        let mut p_s_r = Array1::<f64>::zeros(dim);
        let mut p_r = self.p_obs_step;
        for (point, &pred) in sigpts.iter().zip(&predictions) {
            let dp = pred - r_predict;
            for j in 0..dim {
                p_s_r[j] += weight * (point[j] - mean[j]) * dp;
            }
            p_r += weight * dp * dp;
        }

        // Optimal gain and correction
        let td_err = sample.r - r_predict;
        let gain = &p_s_r / p_r;
        self.s = &mean + &(&gain * td_err);
        let k_p_r = &gain * p_r;
        for i in 0..dim {
            for j in 0..dim {
                self.p_evo[[i, j]] -= k_p_r[i] * gain[j];
            }
        }
        let corrected = self.s.clone();
        self.a_function.set_params(corrected.slice(s![..self.m]));
        self.v_function
            .set_params(corrected.slice(s![self.m..self.m + self.n]));
    }

    fn end_episode(&mut self) {}
}

impl QFunctionLearner for KtdAv {
    fn q_function(&self) -> &LinearQFunction {
        &self.a_function
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::arr1;

    use rlinc_core::features::{TabularStateActionFeatures, TabularStateFeatures};

    use super::*;

    fn linear_vf(n: usize) -> LinearVFunction {
        LinearVFunction::new(Box::new(TabularStateFeatures::new(n).unwrap()))
    }

    fn sample(x: f64, xn: f64, r: f64, terminal: bool) -> Sample {
        Sample::new(arr1(&[x]), arr1(&[0.0]), arr1(&[xn]), r, terminal)
    }

    #[test]
    fn linear_ktd_rejects_bad_noise() {
        let gamma = Factor::new(0.9).unwrap();
        assert!(LinearKtdZero::new(linear_vf(2), gamma, 0.0, 0.1, 0.1).is_err());
        assert!(LinearKtdZero::new(linear_vf(2), gamma, 0.1, 0.1, 0.0).is_err());
    }

    #[test]
    fn linear_ktd_converges_on_a_deterministic_chain() {
        let gamma = Factor::new(0.5).unwrap();
        let mut ktd = LinearKtdZero::new(linear_vf(2), gamma, 10.0, 0.001, 0.5).unwrap();
        for _ in 0..300 {
            ktd.receive_sample(&sample(0.0, 1.0, 1.0, false));
            ktd.receive_sample(&sample(1.0, 0.0, 0.0, true));
        }
        assert_relative_eq!(
            ktd.v_function().get(arr1(&[0.0]).view()),
            1.0,
            epsilon = 0.05
        );
        assert_relative_eq!(
            ktd.v_function().get(arr1(&[1.0]).view()),
            0.0,
            epsilon = 0.05
        );
    }

    #[test]
    fn ktdav_tracks_a_constant_reward() {
        let qf = LinearQFunction::new(
            Box::new(TabularStateActionFeatures::new(1, 1).unwrap()),
            1,
            1,
        )
        .unwrap();
        let vf = linear_vf(1);
        let gamma = Factor::new(0.5).unwrap();
        let mut ktdav = KtdAv::new(
            qf,
            vf,
            gamma,
            Factor::new(0.5).unwrap(),
            1.0,
            1.0,
            0.1,
            1.0,
            1e-2,
        )
        .unwrap();
        let s = Sample::new(arr1(&[0.0]), arr1(&[0.0]), arr1(&[0.0]), 2.0, false);
        for _ in 0..200 {
            ktdav.receive_sample(&s);
        }
        // On a self-looping state the predicted observation is
        // A(x,u) + (1 - gamma)*V(x), which should settle near the reward.
        let estimate = ktdav
            .q_function()
            .get(arr1(&[0.0]).view(), arr1(&[0.0]).view())
            + (1.0 - gamma.value()) * ktdav.v_function().get(arr1(&[0.0]).view());
        assert_relative_eq!(estimate, 2.0, epsilon = 0.2);
    }
}
