//! Convergence of the value learners on a 14-state absorbing chain.
//!
//! The chain starts at state 13 and walks down by 1 or 2 uniformly at
//! random (reward -3) until state 2, which moves to 1 (reward -2); state 0
//! absorbs. Values are approximated over a 4-component interpolating basis
//! whose anchor weights have known values, and each learner must drive the
//! summed squared error across all states under a common bound.

use ndarray::{arr1, Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use rlinc_agent::{Ilstd, LinearKtdZero, Lstd, TdLambda, TdZero, Tdc, VFunctionLearner};
use rlinc_core::features::TableFeatures;
use rlinc_core::value::{LinearVFunction, VFunction};
use rlinc_core::{DecreasingStepSize, EnvironmentListener, Factor, Sample};

const CHAIN_LENGTH: usize = 14;
const NB_EPISODES: usize = 100;
const TARGET_SSE: f64 = 1800.0;

#[rustfmt::skip]
const PHI_TABLE: [[f64; 4]; CHAIN_LENGTH] = [
    [0.0,  0.0,  0.0,  0.0],
    [0.0,  0.0,  0.0,  1.0],
    [0.0,  0.0,  0.25, 0.75],
    [0.0,  0.0,  0.5,  0.5],
    [0.0,  0.0,  0.75, 0.25],
    [0.0,  0.0,  1.0,  0.0],
    [0.0,  0.25, 0.75, 0.0],
    [0.0,  0.5,  0.5,  0.0],
    [0.0,  0.75, 0.25, 0.0],
    [0.0,  1.0,  0.0,  0.0],
    [0.25, 0.75, 0.0,  0.0],
    [0.5,  0.5,  0.0,  0.0],
    [0.75, 0.25, 0.0,  0.0],
    [1.0,  0.0,  0.0,  0.0],
];

fn chain_features() -> Box<TableFeatures> {
    let flat: Vec<f64> = PHI_TABLE.iter().flatten().copied().collect();
    let table = Array2::from_shape_vec((CHAIN_LENGTH, 4), flat).unwrap();
    Box::new(TableFeatures::new(table).unwrap())
}

fn linear_vf() -> LinearVFunction {
    LinearVFunction::new(chain_features())
}

fn true_vf() -> LinearVFunction {
    LinearVFunction::with_weights(chain_features(), arr1(&[-24.0, -16.0, -8.0, 0.0])).unwrap()
}

fn next_state(x: usize, rng: &mut StdRng) -> usize {
    if x >= 3 {
        x - 1 - rng.gen_range(0..2)
    } else if x == 2 {
        1
    } else {
        0
    }
}

fn reward(x: usize) -> f64 {
    if x >= 3 {
        -3.0
    } else if x == 2 {
        -2.0
    } else {
        0.0
    }
}

/// Drive a learner through the chain and return the summed squared error
/// of its estimate against the anchor values, over all states.
fn chain_error<L: VFunctionLearner>(mut learner: L, seed: u64) -> f64 {
    let mut rng = StdRng::seed_from_u64(seed);
    let true_v = true_vf();
    for _ in 0..NB_EPISODES {
        let mut x = CHAIN_LENGTH - 1;
        learner.new_episode(arr1(&[x as f64]).view(), CHAIN_LENGTH);
        for _ in 0..CHAIN_LENGTH {
            let terminal = x == 0;
            let xn = next_state(x, &mut rng);
            let sample = Sample::new(
                arr1(&[x as f64]),
                Array1::zeros(1),
                arr1(&[xn as f64]),
                reward(x),
                terminal,
            );
            learner.receive_sample(&sample);
            if terminal {
                break;
            }
            x = xn;
        }
        learner.end_episode();
    }
    let mut error = 0.0;
    for j in 0..CHAIN_LENGTH {
        let x = arr1(&[j as f64]);
        let diff = learner.v_function().get(x.view()) - true_v.get(x.view());
        error += diff * diff;
    }
    error
}

fn gamma() -> Factor {
    Factor::new(0.01).unwrap()
}

fn step() -> DecreasingStepSize {
    DecreasingStepSize::new(1.0, 100.0)
}

#[test]
fn td_zero_converges_on_the_chain() {
    let learner = TdZero::new(linear_vf(), step(), gamma());
    let error = chain_error(learner, 1);
    assert!(error < TARGET_SSE, "TD(0) error {error} above target");
}

#[test]
fn td_lambda_converges_on_the_chain() {
    let lambda = Factor::new(0.01).unwrap();
    let learner = TdLambda::new(linear_vf(), step(), gamma(), lambda);
    let error = chain_error(learner, 2);
    assert!(error < TARGET_SSE, "TD(lambda) error {error} above target");
}

#[test]
fn tdc_converges_on_the_chain() {
    let learner = Tdc::new(linear_vf(), gamma(), step(), 0.0);
    let error = chain_error(learner, 3);
    assert!(error < TARGET_SSE, "TDC error {error} above target");
}

#[test]
fn lstd_converges_on_the_chain() {
    let learner = Lstd::new(linear_vf(), gamma(), NB_EPISODES, 0.0).unwrap();
    let error = chain_error(learner, 4);
    assert!(error < TARGET_SSE, "LSTD error {error} above target");
}

#[test]
fn ilstd_converges_on_the_chain() {
    let lambda = Factor::ZERO;
    let learner = Ilstd::new(linear_vf(), gamma(), lambda, 1, 1.0).unwrap();
    let error = chain_error(learner, 5);
    assert!(error < TARGET_SSE, "ILSTD error {error} above target");
}

#[test]
fn linear_ktd_converges_on_the_chain() {
    let learner = LinearKtdZero::new(linear_vf(), gamma(), 0.1, 0.1, 0.1).unwrap();
    let error = chain_error(learner, 6);
    assert!(error < TARGET_SSE, "KTD error {error} above target");
}
