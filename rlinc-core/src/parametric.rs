//! Parameter-vector access shared by value functions and policies

use ndarray::ArrayView1;

/// A function backed by a real parameter vector, possibly bounded.
///
/// The parameter buffer is owned by the implementing type; callers only see
/// read-only views. Mutation happens through `set_params`/`update_params`,
/// which keep any configured bounds satisfied.
pub trait ParametricFunction {
    /// Read-only view of the parameters
    fn params(&self) -> ArrayView1<'_, f64>;

    /// Number of parameters
    fn params_len(&self) -> usize {
        self.params().len()
    }

    /// Overwrite the parameters by copy.
    ///
    /// Panics if `params` does not match the parameter count; dimensions are
    /// fixed at construction for the lifetime of the function.
    fn set_params(&mut self, params: ArrayView1<f64>);

    /// Add `delta` to the parameters, then re-apply bounds.
    ///
    /// Panics if `delta` does not match the parameter count.
    fn update_params(&mut self, delta: ArrayView1<f64>);

    /// Clamp the parameters to their bounds, if any.
    ///
    /// Returns true when something was out of bounds.
    fn bound_params(&mut self) -> bool {
        false
    }
}
