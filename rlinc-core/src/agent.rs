//! Agent trait

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

/// Something that interacts with an environment by choosing actions from
/// states
pub trait Agent {
    /// The action chosen by the agent in state `x`
    fn take_action(&mut self, x: ArrayView1<f64>, rng: &mut dyn RngCore) -> Array1<f64>;
}
