//! Policy traits and basic parameterized policies

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use crate::features::Features;
use crate::parametric::ParametricFunction;
use crate::{Result, RlError};

/// A distribution over actions given a state.
///
/// The job is split in two: `prepare` computes the action distribution for a
/// state, and `draw` samples from the prepared distribution. This avoids
/// recomputing the distribution when several actions are drawn for the same
/// state.
pub trait Policy {
    /// State-space dimension
    fn x_dim(&self) -> usize;

    /// Action-space dimension
    fn u_dim(&self) -> usize;

    /// Compute the action distribution for state `x`
    fn prepare(&mut self, x: ArrayView1<f64>);

    /// Draw an action from the prepared distribution
    fn draw(&mut self, rng: &mut dyn RngCore) -> Array1<f64>;
}

/// A policy backed by a real parameter vector
pub trait ParametricPolicy: Policy + ParametricFunction {}

impl<P: Policy + ParametricFunction> ParametricPolicy for P {}

/// A parametric policy whose log-probability is differentiable with respect
/// to its parameters
pub trait LogDifferentiablePolicy: ParametricPolicy {
    /// Gradient of `log pi(u|x)` with respect to the policy parameters
    fn d_log_d_theta(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64>;
}

/// A policy that always plays the same action, for uncontrolled environments
#[derive(Debug, Clone)]
pub struct ConstantActionPolicy {
    action: Array1<f64>,
    x_dim: usize,
}

impl ConstantActionPolicy {
    /// Create a policy that always returns `action`
    #[must_use]
    pub fn new(action: Array1<f64>, x_dim: usize) -> Self {
        Self { action, x_dim }
    }
}

impl Policy for ConstantActionPolicy {
    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn u_dim(&self) -> usize {
        self.action.len()
    }

    fn prepare(&mut self, _x: ArrayView1<f64>) {}

    fn draw(&mut self, _rng: &mut dyn RngCore) -> Array1<f64> {
        self.action.clone()
    }
}

/// A uniform random policy over a finite action set
#[derive(Debug, Clone)]
pub struct DiscreteRandomPolicy {
    /// One action per row
    actions: Array2<f64>,
    x_dim: usize,
}

impl DiscreteRandomPolicy {
    /// Create a uniform policy over the rows of `actions`
    pub fn new(actions: Array2<f64>, x_dim: usize) -> Result<Self> {
        if actions.nrows() == 0 {
            return Err(RlError::InvalidArgument("empty action set".into()));
        }
        Ok(Self { actions, x_dim })
    }
}

impl Policy for DiscreteRandomPolicy {
    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn u_dim(&self) -> usize {
        self.actions.ncols()
    }

    fn prepare(&mut self, _x: ArrayView1<f64>) {}

    fn draw(&mut self, rng: &mut dyn RngCore) -> Array1<f64> {
        let idx = rng.gen_range(0..self.actions.nrows());
        self.actions.row(idx).to_owned()
    }
}

/// A Boltzmann (softmax) distribution over a finite action set, weighted by
/// linear state-action preferences.
///
/// `pi(u|x)` is proportional to `exp(theta . psi(x,u) / temp)`; the higher
/// the temperature, the closer to uniform the distribution. Suitable for
/// discrete environments with the set of all possible actions.
pub struct BoltzmannPolicy {
    features: Box<dyn Features>,
    /// One candidate action per row
    actions: Array2<f64>,
    temp: f64,
    theta: Array1<f64>,
    /// Distribution prepared for the last state
    prob: Array1<f64>,
    x_dim: usize,
    u_dim: usize,
}

impl BoltzmannPolicy {
    /// Create a Boltzmann policy over the rows of `actions`, using
    /// state-action `features`; `temp` must be positive.
    pub fn new(features: Box<dyn Features>, actions: Array2<f64>, temp: f64) -> Result<Self> {
        if temp <= 0.0 {
            return Err(RlError::InvalidArgument(
                "temperature must be positive".into(),
            ));
        }
        if actions.nrows() == 0 {
            return Err(RlError::InvalidArgument("empty action set".into()));
        }
        let u_dim = actions.ncols();
        if features.in_dim() <= u_dim {
            return Err(RlError::InvalidArgument(
                "state-action features input dimension must exceed the action dimension".into(),
            ));
        }
        let x_dim = features.in_dim() - u_dim;
        let n_actions = actions.nrows();
        let n_params = features.out_dim();
        Ok(Self {
            features,
            actions,
            temp,
            theta: Array1::zeros(n_params),
            prob: Array1::from_elem(n_actions, 1.0 / n_actions as f64),
            x_dim,
            u_dim,
        })
    }

    /// State-action features of every candidate action in state `x`
    fn action_features(&self, x: ArrayView1<f64>) -> Vec<Array1<f64>> {
        let mut xu = Array1::zeros(self.x_dim + self.u_dim);
        xu.slice_mut(ndarray::s![..self.x_dim]).assign(&x);
        (0..self.actions.nrows())
            .map(|i| {
                xu.slice_mut(ndarray::s![self.x_dim..])
                    .assign(&self.actions.row(i));
                self.features.phi(xu.view())
            })
            .collect()
    }

    /// The Boltzmann distribution over the action set in state `x`
    #[must_use]
    pub fn distribution(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let psis = self.action_features(x);
        let prefs: Array1<f64> =
            Array1::from_shape_fn(psis.len(), |i| psis[i].dot(&self.theta) / self.temp);
        let max_pref = prefs.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mut prob = prefs.mapv(|p| (p - max_pref).exp());
        let total = prob.sum();
        prob /= total;
        prob
    }
}

impl Policy for BoltzmannPolicy {
    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn u_dim(&self) -> usize {
        self.u_dim
    }

    fn prepare(&mut self, x: ArrayView1<f64>) {
        self.prob = self.distribution(x);
    }

    fn draw(&mut self, rng: &mut dyn RngCore) -> Array1<f64> {
        let sample: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (i, &p) in self.prob.iter().enumerate() {
            cumulative += p;
            if sample < cumulative {
                return self.actions.row(i).to_owned();
            }
        }
        self.actions.row(self.actions.nrows() - 1).to_owned()
    }
}

impl ParametricFunction for BoltzmannPolicy {
    fn params(&self) -> ArrayView1<'_, f64> {
        self.theta.view()
    }

    fn set_params(&mut self, params: ArrayView1<f64>) {
        assert_eq!(params.len(), self.theta.len(), "parameter count is fixed");
        self.theta.assign(&params);
    }

    fn update_params(&mut self, delta: ArrayView1<f64>) {
        assert_eq!(delta.len(), self.theta.len(), "parameter count is fixed");
        self.theta += &delta;
        self.bound_params();
    }
}

impl LogDifferentiablePolicy for BoltzmannPolicy {
    fn d_log_d_theta(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        let psis = self.action_features(x);
        let prob = self.distribution(x);
        // Locate u in the action set by value, falling back to the closest
        // action in L2 distance
        let mut ind = None;
        for i in 0..self.actions.nrows() {
            if u == self.actions.row(i) {
                ind = Some(i);
                break;
            }
        }
        let ind = ind.unwrap_or_else(|| {
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for i in 0..self.actions.nrows() {
                let dist: f64 = self
                    .actions
                    .row(i)
                    .iter()
                    .zip(u.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum();
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }
            best
        });
        let mut grad = psis[ind].clone();
        for (psi, &p) in psis.iter().zip(prob.iter()) {
            grad.scaled_add(-p, psi);
        }
        grad / self.temp
    }
}

/// A Gaussian policy whose mean action is linear in state features.
///
/// Parameters are the flattened `u_dim x n_feat` mean coefficients; the
/// per-dimension standard deviation is fixed. The log-probability gradient
/// is `d log pi / d theta[i*n_feat+j] = phi(x)[j] * (u[i] - mu[i]) / sigma[i]^2`.
pub struct LinearGaussianPolicy {
    features: Box<dyn Features>,
    theta: Array1<f64>,
    sigma: Array1<f64>,
    /// Mean action of the prepared distribution
    mu: Array1<f64>,
    n_feat: usize,
    u_dim: usize,
}

impl LinearGaussianPolicy {
    /// Create a linear Gaussian policy with zero-initialized mean
    /// coefficients; `sigma` entries must be positive.
    pub fn new(features: Box<dyn Features>, sigma: Array1<f64>) -> Result<Self> {
        if sigma.iter().any(|&s| s <= 0.0) {
            return Err(RlError::InvalidArgument(
                "standard deviations must be positive".into(),
            ));
        }
        let n_feat = features.out_dim();
        let u_dim = sigma.len();
        Ok(Self {
            features,
            theta: Array1::zeros(u_dim * n_feat),
            mu: Array1::zeros(u_dim),
            sigma,
            n_feat,
            u_dim,
        })
    }

    /// Mean action for state `x` under the current parameters
    #[must_use]
    pub fn mean_action(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let phi = self.features.phi(x);
        Array1::from_shape_fn(self.u_dim, |i| {
            let row = self.theta.slice(ndarray::s![i * self.n_feat..(i + 1) * self.n_feat]);
            row.dot(&phi)
        })
    }
}

impl Policy for LinearGaussianPolicy {
    fn x_dim(&self) -> usize {
        self.features.in_dim()
    }

    fn u_dim(&self) -> usize {
        self.u_dim
    }

    fn prepare(&mut self, x: ArrayView1<f64>) {
        self.mu = self.mean_action(x);
    }

    fn draw(&mut self, rng: &mut dyn RngCore) -> Array1<f64> {
        Array1::from_shape_fn(self.u_dim, |i| {
            let z: f64 = StandardNormal.sample(rng);
            self.mu[i] + self.sigma[i] * z
        })
    }
}

impl ParametricFunction for LinearGaussianPolicy {
    fn params(&self) -> ArrayView1<'_, f64> {
        self.theta.view()
    }

    fn set_params(&mut self, params: ArrayView1<f64>) {
        assert_eq!(params.len(), self.theta.len(), "parameter count is fixed");
        self.theta.assign(&params);
    }

    fn update_params(&mut self, delta: ArrayView1<f64>) {
        assert_eq!(delta.len(), self.theta.len(), "parameter count is fixed");
        self.theta += &delta;
        self.bound_params();
    }
}

impl LogDifferentiablePolicy for LinearGaussianPolicy {
    fn d_log_d_theta(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        debug_assert_eq!(u.len(), self.u_dim);
        let phi = self.features.phi(x);
        let mu = self.mean_action(x);
        let mut grad = Array1::zeros(self.theta.len());
        for i in 0..self.u_dim {
            let coeff = (u[i] - mu[i]) / (self.sigma[i] * self.sigma[i]);
            for j in 0..self.n_feat {
                grad[i * self.n_feat + j] = phi[j] * coeff;
            }
        }
        grad
    }
}
