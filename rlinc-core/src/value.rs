//! State-value and state-action-value function approximators

use ndarray::{Array1, ArrayView1};

use crate::features::Features;
use crate::parametric::ParametricFunction;
use crate::{Factor, Result, RlError};

/// A state value function V(x)
pub trait VFunction {
    /// State-space dimension
    fn x_dim(&self) -> usize;

    /// The value of state `x`
    fn get(&self, x: ArrayView1<f64>) -> f64;

    /// Add `delta` to the value of state `x`
    fn update_for_state(&mut self, x: ArrayView1<f64>, delta: f64);

    /// One-step temporal-difference error for `(x, xn, r)`:
    /// `r - V(x)` on a terminal sample, `r + gamma*V(xn) - V(x)` otherwise.
    fn td_error(
        &self,
        x: ArrayView1<f64>,
        xn: ArrayView1<f64>,
        r: f64,
        terminal: bool,
        gamma: Factor,
    ) -> f64 {
        if terminal {
            r - self.get(x)
        } else {
            r + gamma.value() * self.get(xn) - self.get(x)
        }
    }
}

/// A state-action value function Q(x, u), also used for advantage functions
pub trait QFunction {
    /// State-space dimension
    fn x_dim(&self) -> usize;

    /// Action-space dimension
    fn u_dim(&self) -> usize;

    /// The value of taking action `u` in state `x`
    fn get(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> f64;

    /// Add `delta` to the value of the pair `(x, u)`
    fn update_for_state_action(&mut self, x: ArrayView1<f64>, u: ArrayView1<f64>, delta: f64);

    /// One-step temporal-difference error for `(x, u, xn, un, r)`
    fn td_error(
        &self,
        x: ArrayView1<f64>,
        u: ArrayView1<f64>,
        xn: ArrayView1<f64>,
        un: ArrayView1<f64>,
        r: f64,
        terminal: bool,
        gamma: Factor,
    ) -> f64 {
        if terminal {
            r - self.get(x, u)
        } else {
            r + gamma.value() * self.get(xn, un) - self.get(x, u)
        }
    }
}

/// State value function linear in a feature basis: `V(x) = w . phi(x)`.
///
/// The weight vector is owned by the function and keeps
/// `weights.len() == features.out_dim()` for its entire lifetime.
pub struct LinearVFunction {
    features: Box<dyn Features>,
    weights: Array1<f64>,
}

impl LinearVFunction {
    /// Create a linear value function with zero-initialized weights
    #[must_use]
    pub fn new(features: Box<dyn Features>) -> Self {
        let weights = Array1::zeros(features.out_dim());
        Self { features, weights }
    }

    /// Create a linear value function with explicit weights.
    ///
    /// Rejects a weight vector whose length differs from the feature
    /// output dimension.
    pub fn with_weights(features: Box<dyn Features>, weights: Array1<f64>) -> Result<Self> {
        if weights.len() != features.out_dim() {
            return Err(RlError::DimensionMismatch {
                expected: features.out_dim(),
                actual: weights.len(),
            });
        }
        Ok(Self { features, weights })
    }

    /// The feature basis
    #[must_use]
    pub fn features(&self) -> &dyn Features {
        self.features.as_ref()
    }

    /// Update the weights by `delta * phi`, for a precomputed feature or
    /// eligibility vector. This is the hot-loop variant of
    /// [`VFunction::update_for_state`].
    pub fn update_for_features(&mut self, phi: ArrayView1<f64>, delta: f64) {
        debug_assert_eq!(phi.len(), self.weights.len());
        self.weights.scaled_add(delta, &phi);
    }
}

impl ParametricFunction for LinearVFunction {
    fn params(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    fn set_params(&mut self, params: ArrayView1<f64>) {
        assert_eq!(params.len(), self.weights.len(), "parameter count is fixed");
        self.weights.assign(&params);
    }

    fn update_params(&mut self, delta: ArrayView1<f64>) {
        assert_eq!(delta.len(), self.weights.len(), "parameter count is fixed");
        self.weights += &delta;
        self.bound_params();
    }
}

impl VFunction for LinearVFunction {
    fn x_dim(&self) -> usize {
        self.features.in_dim()
    }

    fn get(&self, x: ArrayView1<f64>) -> f64 {
        self.features.phi(x).dot(&self.weights)
    }

    fn update_for_state(&mut self, x: ArrayView1<f64>, delta: f64) {
        let phi = self.features.phi(x);
        self.update_for_features(phi.view(), delta);
    }
}

/// Tabular state value function over a discrete state space.
///
/// The input is a single component holding the state index.
#[derive(Debug, Clone)]
pub struct TabularVFunction {
    values: Array1<f64>,
}

impl TabularVFunction {
    /// Create a zero-initialized table over `n_states` states
    pub fn new(n_states: usize) -> Result<Self> {
        if n_states == 0 {
            return Err(RlError::InvalidArgument(
                "state cardinality must be positive".into(),
            ));
        }
        Ok(Self {
            values: Array1::zeros(n_states),
        })
    }

    /// Create a table from explicit per-state values
    #[must_use]
    pub fn from_values(values: Array1<f64>) -> Self {
        Self { values }
    }
}

impl VFunction for TabularVFunction {
    fn x_dim(&self) -> usize {
        1
    }

    fn get(&self, x: ArrayView1<f64>) -> f64 {
        self.values[x[0] as usize]
    }

    fn update_for_state(&mut self, x: ArrayView1<f64>, delta: f64) {
        self.values[x[0] as usize] += delta;
    }
}

/// State-action value function linear in a state-action feature basis:
/// `Q(x, u) = w . psi(x, u)`.
pub struct LinearQFunction {
    features: Box<dyn Features>,
    weights: Array1<f64>,
    x_dim: usize,
    u_dim: usize,
}

impl LinearQFunction {
    /// Create a linear Q-function with zero-initialized weights.
    ///
    /// The feature input dimension must equal `x_dim + u_dim`.
    pub fn new(features: Box<dyn Features>, x_dim: usize, u_dim: usize) -> Result<Self> {
        if features.in_dim() != x_dim + u_dim {
            return Err(RlError::DimensionMismatch {
                expected: x_dim + u_dim,
                actual: features.in_dim(),
            });
        }
        let weights = Array1::zeros(features.out_dim());
        Ok(Self {
            features,
            weights,
            x_dim,
            u_dim,
        })
    }

    /// The feature basis
    #[must_use]
    pub fn features(&self) -> &dyn Features {
        self.features.as_ref()
    }

    /// Update the weights by `delta * psi`, for a precomputed state-action
    /// feature or eligibility vector.
    pub fn update_for_features(&mut self, psi: ArrayView1<f64>, delta: f64) {
        debug_assert_eq!(psi.len(), self.weights.len());
        self.weights.scaled_add(delta, &psi);
    }

    /// Concatenate `(x, u)` into the feature input layout
    #[must_use]
    pub fn concat_input(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        debug_assert_eq!(x.len(), self.x_dim);
        debug_assert_eq!(u.len(), self.u_dim);
        let mut xu = Array1::zeros(self.x_dim + self.u_dim);
        xu.slice_mut(ndarray::s![..self.x_dim]).assign(&x);
        xu.slice_mut(ndarray::s![self.x_dim..]).assign(&u);
        xu
    }
}

impl ParametricFunction for LinearQFunction {
    fn params(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    fn set_params(&mut self, params: ArrayView1<f64>) {
        assert_eq!(params.len(), self.weights.len(), "parameter count is fixed");
        self.weights.assign(&params);
    }

    fn update_params(&mut self, delta: ArrayView1<f64>) {
        assert_eq!(delta.len(), self.weights.len(), "parameter count is fixed");
        self.weights += &delta;
        self.bound_params();
    }
}

impl QFunction for LinearQFunction {
    fn x_dim(&self) -> usize {
        self.x_dim
    }

    fn u_dim(&self) -> usize {
        self.u_dim
    }

    fn get(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> f64 {
        let xu = self.concat_input(x, u);
        self.features.phi(xu.view()).dot(&self.weights)
    }

    fn update_for_state_action(&mut self, x: ArrayView1<f64>, u: ArrayView1<f64>, delta: f64) {
        let xu = self.concat_input(x, u);
        let psi = self.features.phi(xu.view());
        self.update_for_features(psi.view(), delta);
    }
}
