//! Discrete MDP model, dynamic-programming solvers and sample-stream driver
//!
//! This crate provides the batch side of the toolkit: a fully specified
//! discrete MDP, the offline solvers consuming it (value iteration, policy
//! iteration, exact policy evaluation, least-squares policy evaluation),
//! and a driver that turns an MDP into the sample stream the incremental
//! learners consume.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod dp;
pub mod env;
pub mod mdp;

pub use dp::{Lspe, PolicyEvaluation, PolicyIteration, ValueIteration};
pub use env::DiscreteMdpEnvironment;
pub use mdp::DiscreteMdp;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DiscreteMdp, DiscreteMdpEnvironment, Lspe, PolicyEvaluation, PolicyIteration,
        ValueIteration,
    };
    pub use rlinc_core::prelude::*;
}
