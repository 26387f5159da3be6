//! Incremental value-function learners and actor-critic agents
//!
//! This crate implements the per-sample learning algorithms:
//! - the TD family (TD(0), TD(lambda), TDC) and the advantage bootstrap
//! - the least-squares family (LSTD, ILSTD, ILSTDQ, ILSTDAV)
//! - Kalman temporal-difference learners (linear KTD-V, KTDAV)
//! - action-value control learners (Q(lambda), SARSA(lambda))
//! - the actor-critic compositions built on top of them
//!
//! Every learner consumes one sample at a time through the
//! [`rlinc_core::EnvironmentListener`] contract and mutates only its own
//! weight and statistics buffers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod ac;
pub mod advantage;
pub mod agent;
pub mod control;
pub mod gtd;
pub mod ktd;
pub mod learner;
pub mod lstd;
pub mod td;

// Re-export learners
pub use advantage::AdvantageTdBootstrap;
pub use control::{QLearning, SarsaLambda};
pub use gtd::Tdc;
pub use ktd::{KtdAv, LinearKtdZero};
pub use lstd::{Ilstd, IlstdAv, IlstdQ, Lstd};
pub use td::{TdLambda, TdZero};

// Re-export agents
pub use ac::{BasicAc, Knac, Nac, TdNac, Vac};
pub use agent::PolicyAgent;

// Re-export capability traits
pub use learner::{QFunctionLearner, TdLearner, VFunctionLearner};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BasicAc, Ilstd, IlstdAv, Lstd, Nac, PolicyAgent, QFunctionLearner, TdLambda, TdLearner,
        TdZero, VFunctionLearner, Vac,
    };
    pub use rlinc_core::prelude::*;
}
