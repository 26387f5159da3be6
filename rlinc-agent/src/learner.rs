//! Learner capability traits

use rlinc_core::value::{LinearQFunction, LinearVFunction};
use rlinc_core::{EnvironmentListener, Factor};

/// A learner that maintains a state value function estimate.
///
/// The learner owns the function it mutates; callers only get shared
/// access to the current estimate.
pub trait VFunctionLearner: EnvironmentListener {
    /// The current state value function estimate
    fn v_function(&self) -> &LinearVFunction;
}

/// A state value function learner driven by the one-step TD error
pub trait TdLearner: VFunctionLearner {
    /// The reward discount factor the TD error is computed with
    fn discount(&self) -> Factor;
}

/// A learner that maintains a state-action (or advantage) value function
/// estimate
pub trait QFunctionLearner: EnvironmentListener {
    /// The current state-action value function estimate
    fn q_function(&self) -> &LinearQFunction;
}
