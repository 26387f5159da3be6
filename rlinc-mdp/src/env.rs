//! Sample-stream driver for discrete MDPs

use ndarray::arr1;
use rand::{Rng, RngCore};
use tracing::info;

use rlinc_core::{Agent, EnvironmentListener, Result, RlError, Sample};

use crate::mdp::DiscreteMdp;

/// Turns a [`DiscreteMdp`] into a stream of `(x, u, xn, r)` samples.
///
/// States and actions cross the listener boundary as one-component vectors
/// holding the discrete index. Episodes never end on a terminal sample;
/// they are bounded by the driver's horizon.
pub struct DiscreteMdpEnvironment {
    mdp: DiscreteMdp,
}

impl DiscreteMdpEnvironment {
    /// Create a driver over an MDP
    #[must_use]
    pub fn new(mdp: DiscreteMdp) -> Self {
        Self { mdp }
    }

    /// The underlying MDP
    #[must_use]
    pub fn mdp(&self) -> &DiscreteMdp {
        &self.mdp
    }

    /// Draw a start state from the initial distribution
    pub fn draw_initial_state(&self, rng: &mut dyn RngCore) -> usize {
        draw_discrete(self.mdp.p0().iter().copied(), rng)
    }

    fn draw_next_state(&self, x: usize, u: usize, rng: &mut dyn RngCore) -> usize {
        let n = self.mdp.n_states();
        draw_discrete((0..n).map(|xn| self.mdp.transition(x, u, xn)), rng)
    }

    /// Run `nb_episodes` episodes of at most `max_t` steps, with `agent`
    /// choosing actions and every listener receiving the stream.
    pub fn interact(
        &self,
        agent: &mut dyn Agent,
        listeners: &mut [&mut dyn EnvironmentListener],
        nb_episodes: usize,
        max_t: usize,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        if max_t == 0 {
            return Err(RlError::InvalidArgument(
                "the episode horizon must be greater than zero".into(),
            ));
        }
        for episode in 0..nb_episodes {
            let mut x = self.draw_initial_state(rng);
            let x0 = arr1(&[x as f64]);
            for listener in listeners.iter_mut() {
                listener.new_episode(x0.view(), max_t);
            }
            for _ in 0..max_t {
                let u = agent.take_action(arr1(&[x as f64]).view(), rng);
                let u_idx = u[0] as usize;
                assert!(
                    u_idx < self.mdp.n_actions(),
                    "action index out of range for this MDP"
                );
                let xn = self.draw_next_state(x, u_idx, rng);
                let sample = Sample::new(
                    arr1(&[x as f64]),
                    u,
                    arr1(&[xn as f64]),
                    self.mdp.reward(x, u_idx),
                    false,
                );
                for listener in listeners.iter_mut() {
                    listener.receive_sample(&sample);
                }
                x = xn;
            }
            for listener in listeners.iter_mut() {
                listener.end_episode();
            }
            info!(episode, "episode finished");
        }
        Ok(())
    }

    /// Like [`DiscreteMdpEnvironment::interact`] for agents that both act
    /// and listen to their own sample stream (the actor-critic agents)
    pub fn interact_learning<A: Agent + EnvironmentListener>(
        &self,
        agent: &mut A,
        nb_episodes: usize,
        max_t: usize,
        rng: &mut dyn RngCore,
    ) -> Result<()> {
        if max_t == 0 {
            return Err(RlError::InvalidArgument(
                "the episode horizon must be greater than zero".into(),
            ));
        }
        for _ in 0..nb_episodes {
            let mut x = self.draw_initial_state(rng);
            agent.new_episode(arr1(&[x as f64]).view(), max_t);
            for _ in 0..max_t {
                let u = agent.take_action(arr1(&[x as f64]).view(), rng);
                let u_idx = u[0] as usize;
                assert!(
                    u_idx < self.mdp.n_actions(),
                    "action index out of range for this MDP"
                );
                let xn = self.draw_next_state(x, u_idx, rng);
                let sample = Sample::new(
                    arr1(&[x as f64]),
                    u,
                    arr1(&[xn as f64]),
                    self.mdp.reward(x, u_idx),
                    false,
                );
                agent.receive_sample(&sample);
                x = xn;
            }
            agent.end_episode();
        }
        Ok(())
    }
}

/// Draw an index from a discrete probability table
fn draw_discrete(probs: impl Iterator<Item = f64>, rng: &mut dyn RngCore) -> usize {
    let sample: f64 = rng.gen();
    let mut cumulative = 0.0;
    let mut last = 0;
    for (i, p) in probs.enumerate() {
        cumulative += p;
        last = i;
        if sample < cumulative {
            return i;
        }
    }
    // Rounding left a sliver of probability mass at the end of the table
    last
}
