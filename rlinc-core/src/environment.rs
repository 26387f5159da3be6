//! The sample-delivery contract between drivers and learners

use ndarray::ArrayView1;

use crate::sample::Sample;

/// Receiver of an environment's sample stream.
///
/// A driver brackets each episode with `new_episode`/`end_episode` and
/// delivers the samples of that episode in temporal order in between.
/// Learners respond to these calls and never initiate them.
///
/// Eligibility traces and recursive statistics are order-sensitive:
/// out-of-order delivery silently corrupts the learned estimate, so a
/// listener must only ever be driven by a single stream at a time.
pub trait EnvironmentListener {
    /// An episode starts in state `x0` with horizon `max_t`.
    ///
    /// Trace-carrying learners reset their eligibility vector exactly here.
    fn new_episode(&mut self, x0: ArrayView1<f64>, max_t: usize);

    /// One sample of the current episode, in temporal order
    fn receive_sample(&mut self, sample: &Sample);

    /// The current episode is over
    fn end_episode(&mut self);
}
