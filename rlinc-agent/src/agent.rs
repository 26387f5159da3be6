//! Acting wrappers around policies

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{Array1, ArrayView1};
use rand::RngCore;

use rlinc_core::{Agent, Policy};

/// An agent that behaves according to a given policy, without learning
pub struct PolicyAgent<P: Policy> {
    policy: Rc<RefCell<P>>,
}

impl<P: Policy> PolicyAgent<P> {
    /// Create an agent acting from a shared policy
    #[must_use]
    pub fn new(policy: Rc<RefCell<P>>) -> Self {
        Self { policy }
    }

    /// Create an agent from an owned policy
    #[must_use]
    pub fn from_policy(policy: P) -> Self {
        Self {
            policy: Rc::new(RefCell::new(policy)),
        }
    }
}

impl<P: Policy> Agent for PolicyAgent<P> {
    fn take_action(&mut self, x: ArrayView1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
        let mut policy = self.policy.borrow_mut();
        policy.prepare(x);
        policy.draw(rng)
    }
}
