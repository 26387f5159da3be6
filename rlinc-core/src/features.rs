//! Feature maps from raw state/action vectors to basis-function outputs

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1};

use crate::parametric::ParametricFunction;
use crate::policy::LogDifferentiablePolicy;
use crate::{Result, RlError};

/// A vector function of a real input space, generally the state or the
/// state-action space. Feature maps are the basis for linear function
/// approximators; the core only requires fixed input/output dimensions and
/// a pure evaluation.
pub trait Features {
    /// Input dimension of the feature map
    fn in_dim(&self) -> usize;

    /// Output dimension of the feature map
    fn out_dim(&self) -> usize;

    /// Compute the feature vector for `x` into a caller-provided buffer.
    ///
    /// This is the hot-loop variant; `out` must have length `out_dim`.
    fn phi_into(&self, x: ArrayView1<f64>, out: ArrayViewMut1<f64>);

    /// Compute the feature vector for `x` in a fresh allocation
    fn phi(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.out_dim());
        self.phi_into(x, out.view_mut());
        out
    }
}

/// The identity map: features equal the raw input vector
#[derive(Debug, Clone)]
pub struct IdentityFeatures {
    dim: usize,
}

impl IdentityFeatures {
    /// Create an identity feature map of the given dimension
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(RlError::InvalidArgument(
                "feature dimension must be positive".into(),
            ));
        }
        Ok(Self { dim })
    }
}

impl Features for IdentityFeatures {
    fn in_dim(&self) -> usize {
        self.dim
    }

    fn out_dim(&self) -> usize {
        self.dim
    }

    fn phi_into(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        debug_assert_eq!(x.len(), self.dim);
        out.assign(&x);
    }
}

/// One-hot features over a discrete state space.
///
/// The input is a single component holding the state index.
#[derive(Debug, Clone)]
pub struct TabularStateFeatures {
    n_states: usize,
}

impl TabularStateFeatures {
    /// Create one-hot features over `n_states` states
    pub fn new(n_states: usize) -> Result<Self> {
        if n_states == 0 {
            return Err(RlError::InvalidArgument(
                "state cardinality must be positive".into(),
            ));
        }
        Ok(Self { n_states })
    }
}

impl Features for TabularStateFeatures {
    fn in_dim(&self) -> usize {
        1
    }

    fn out_dim(&self) -> usize {
        self.n_states
    }

    fn phi_into(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        debug_assert_eq!(x.len(), 1);
        let idx = x[0] as usize;
        debug_assert!(idx < self.n_states);
        out.fill(0.0);
        out[idx] = 1.0;
    }
}

/// One-hot features over a discrete state-action space.
///
/// The input is a two-component (state index, action index) vector.
#[derive(Debug, Clone)]
pub struct TabularStateActionFeatures {
    n_states: usize,
    n_actions: usize,
}

impl TabularStateActionFeatures {
    /// Create one-hot features over an `n_states` x `n_actions` grid
    pub fn new(n_states: usize, n_actions: usize) -> Result<Self> {
        if n_states == 0 || n_actions == 0 {
            return Err(RlError::InvalidArgument(
                "state/action cardinalities must be positive".into(),
            ));
        }
        Ok(Self { n_states, n_actions })
    }
}

impl Features for TabularStateActionFeatures {
    fn in_dim(&self) -> usize {
        2
    }

    fn out_dim(&self) -> usize {
        self.n_states * self.n_actions
    }

    fn phi_into(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        debug_assert_eq!(x.len(), 2);
        let state = x[0] as usize;
        let action = x[1] as usize;
        debug_assert!(state < self.n_states && action < self.n_actions);
        out.fill(0.0);
        out[action * self.n_states + state] = 1.0;
    }
}

/// Features looked up in a fixed table, one row per discrete state.
///
/// Useful for hand-crafted interpolating bases over small chains.
#[derive(Debug, Clone)]
pub struct TableFeatures {
    table: Array2<f64>,
}

impl TableFeatures {
    /// Create table features; row `i` is the feature vector of state `i`
    pub fn new(table: Array2<f64>) -> Result<Self> {
        if table.nrows() == 0 || table.ncols() == 0 {
            return Err(RlError::InvalidArgument(
                "feature table must be non-empty".into(),
            ));
        }
        Ok(Self { table })
    }
}

impl Features for TableFeatures {
    fn in_dim(&self) -> usize {
        1
    }

    fn out_dim(&self) -> usize {
        self.table.ncols()
    }

    fn phi_into(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        debug_assert_eq!(x.len(), 1);
        let idx = x[0] as usize;
        debug_assert!(idx < self.table.nrows());
        out.assign(&self.table.row(idx));
    }
}

/// Compatible state-action features: the gradient of the log of a
/// log-differentiable policy, per the policy gradient theorem.
///
/// An advantage approximator built on these features has weights aligned
/// with the natural policy gradient. The input is the concatenated `(x, u)`
/// vector; the policy is shared with the agent that improves it, so it is
/// held behind `Rc<RefCell<..>>` (the engine is single-threaded).
pub struct CompatibleFeatures<P: LogDifferentiablePolicy> {
    policy: Rc<RefCell<P>>,
    x_dim: usize,
    u_dim: usize,
    n_params: usize,
}

impl<P: LogDifferentiablePolicy> CompatibleFeatures<P> {
    /// Create compatible features from a shared policy
    #[must_use]
    pub fn new(policy: Rc<RefCell<P>>, x_dim: usize, u_dim: usize) -> Self {
        let n_params = policy.borrow().params_len();
        Self {
            policy,
            x_dim,
            u_dim,
            n_params,
        }
    }
}

impl<P: LogDifferentiablePolicy> Features for CompatibleFeatures<P> {
    fn in_dim(&self) -> usize {
        self.x_dim + self.u_dim
    }

    fn out_dim(&self) -> usize {
        self.n_params
    }

    fn phi_into(&self, x: ArrayView1<f64>, mut out: ArrayViewMut1<f64>) {
        debug_assert_eq!(x.len(), self.x_dim + self.u_dim);
        let state = x.slice(s![..self.x_dim]);
        let action = x.slice(s![self.x_dim..]);
        let grad = self.policy.borrow().d_log_d_theta(state, action);
        out.assign(&grad);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr1;

    use super::*;

    #[test]
    fn identity_passes_input_through() {
        let f = IdentityFeatures::new(3).unwrap();
        assert_eq!(f.phi(arr1(&[1.0, -2.0, 0.5]).view()), arr1(&[1.0, -2.0, 0.5]));
    }

    #[test]
    fn tabular_state_features_are_one_hot() {
        let f = TabularStateFeatures::new(4).unwrap();
        assert_eq!(f.phi(arr1(&[2.0]).view()), arr1(&[0.0, 0.0, 1.0, 0.0]));
    }

    #[test]
    fn tabular_state_action_features_index_the_grid() {
        let f = TabularStateActionFeatures::new(3, 2).unwrap();
        let phi = f.phi(arr1(&[1.0, 1.0]).view());
        assert_eq!(phi.len(), 6);
        assert_eq!(phi[3 + 1], 1.0);
        assert_eq!(phi.sum(), 1.0);
    }

    #[test]
    fn table_features_look_up_rows() {
        let table = ndarray::arr2(&[[1.0, 0.0], [0.25, 0.75]]);
        let f = TableFeatures::new(table).unwrap();
        assert_eq!(f.phi(arr1(&[1.0]).view()), arr1(&[0.25, 0.75]));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(IdentityFeatures::new(0).is_err());
        assert!(TabularStateFeatures::new(0).is_err());
        assert!(TabularStateActionFeatures::new(0, 2).is_err());
    }
}
