//! Advantage estimation bootstrapped from a TD error

use ndarray::ArrayView1;

use rlinc_core::value::{LinearQFunction, QFunction, VFunction};
use rlinc_core::{EnvironmentListener, Factor, Sample, StepSize};

use crate::learner::{QFunctionLearner, TdLearner, VFunctionLearner};

/// Learns an advantage function by chasing the TD error of a wrapped state
/// value learner: `A(x,u) <- A(x,u) + beta * (delta - A(x,u))`.
///
/// This is a second-order bootstrap: the advantage estimate tracks an
/// already-approximate target, trading bias for variance reduction compared
/// to Monte-Carlo returns.
pub struct AdvantageTdBootstrap<C: TdLearner, S: StepSize> {
    a_function: LinearQFunction,
    td: C,
    step: S,
    gamma: Factor,
}

impl<C: TdLearner, S: StepSize> AdvantageTdBootstrap<C, S> {
    /// Create an advantage learner around an advantage approximator and a
    /// TD learner supplying the error signal
    #[must_use]
    pub fn new(a_function: LinearQFunction, td: C, step: S) -> Self {
        let gamma = td.discount();
        Self {
            a_function,
            td,
            step,
            gamma,
        }
    }

    /// The wrapped TD learner
    #[must_use]
    pub fn td_learner(&self) -> &C {
        &self.td
    }

    /// Mutable access to the advantage approximator, for agents that decay
    /// its weights in place
    pub fn q_function_mut(&mut self) -> &mut LinearQFunction {
        &mut self.a_function
    }
}

impl<C: TdLearner, S: StepSize> EnvironmentListener for AdvantageTdBootstrap<C, S> {
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize) {
        self.td.new_episode(x0, max_t);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.td.receive_sample(sample);
        self.step.advance();
        let td_err = self.td.v_function().td_error(
            sample.x.view(),
            sample.xn.view(),
            sample.r,
            sample.terminal,
            self.gamma,
        );
        let a = self.a_function.get(sample.x.view(), sample.u.view());
        self.a_function.update_for_state_action(
            sample.x.view(),
            sample.u.view(),
            self.step.current() * (td_err - a),
        );
    }

    fn end_episode(&mut self) {
        self.td.end_episode();
    }
}

impl<C: TdLearner, S: StepSize> QFunctionLearner for AdvantageTdBootstrap<C, S> {
    fn q_function(&self) -> &LinearQFunction {
        &self.a_function
    }
}
