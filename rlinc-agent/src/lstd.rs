//! Least-squares temporal-difference learners
//!
//! The incremental variants keep an inverse statistics matrix up to date
//! with Sherman-Morrison rank-one updates, so the value parameters can be
//! materialized at any time for the cost of a matrix-vector product.

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::{s, Array1, Array2, ArrayView1};
use rand::RngCore;
use tracing::{debug, warn};

use rlinc_core::linalg::{self, RankOneUpdate};
use rlinc_core::value::{LinearQFunction, LinearVFunction};
use rlinc_core::{
    EnvironmentListener, Factor, Features, ParametricFunction, Policy, Result, RlError, Sample,
    StepSize,
};

use crate::learner::{QFunctionLearner, VFunctionLearner};

fn check_diag_seed(diag_ainv0: f64) -> Result<()> {
    if diag_ainv0 <= 0.0 {
        return Err(RlError::InvalidArgument(
            "the initial diagonal of the statistics matrix must be positive".into(),
        ));
    }
    Ok(())
}

/// Batch LSTD: accumulates the full `A` and `b` statistics and periodically
/// solves `A*w = b`, resetting the statistics afterwards.
pub struct Lstd {
    vf: LinearVFunction,
    gamma: Factor,
    nb_steps_before_update: usize,
    steps_before_update: usize,
    reg_factor: f64,
    a: Array2<f64>,
    b: Array1<f64>,
    phix: Array1<f64>,
    d: Array1<f64>,
}

impl Lstd {
    /// Create an LSTD learner solving every `nb_steps_before_update`
    /// samples, with optional L2 regularization `reg_factor`.
    pub fn new(
        vf: LinearVFunction,
        gamma: Factor,
        nb_steps_before_update: usize,
        reg_factor: f64,
    ) -> Result<Self> {
        if nb_steps_before_update == 0 {
            return Err(RlError::InvalidArgument(
                "the solve cadence must be positive".into(),
            ));
        }
        if reg_factor < 0.0 {
            return Err(RlError::InvalidArgument(
                "the regularization factor must be non-negative".into(),
            ));
        }
        let n = vf.params_len();
        Ok(Self {
            vf,
            gamma,
            nb_steps_before_update,
            steps_before_update: nb_steps_before_update,
            reg_factor,
            a: Array2::zeros((n, n)),
            b: Array1::zeros(n),
            phix: Array1::zeros(n),
            d: Array1::zeros(n),
        })
    }

    fn solve_and_reset(&mut self) {
        let mut system = self.a.clone();
        if self.reg_factor > 0.0 {
            for i in 0..system.nrows() {
                system[[i, i]] += self.reg_factor;
            }
        }
        match linalg::solve(&system, self.b.view()) {
            Ok(w) => {
                debug!(samples = self.nb_steps_before_update, "LSTD solve");
                self.vf.set_params(w.view());
                self.a.fill(0.0);
                self.b.fill(0.0);
            }
            Err(err) => {
                // Keep accumulating; more data may make the system regular.
                warn!(%err, "LSTD solve skipped");
            }
        }
        self.steps_before_update = self.nb_steps_before_update;
    }
}

impl EnvironmentListener for Lstd {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {}

    fn receive_sample(&mut self, sample: &Sample) {
        self.vf
            .features()
            .phi_into(sample.x.view(), self.phix.view_mut());
        self.d.assign(&self.phix);
        if !sample.terminal {
            let phixn = self.vf.features().phi(sample.xn.view());
            self.d.scaled_add(-self.gamma.value(), &phixn);
        }
        let n = self.phix.len();
        for i in 0..n {
            for j in 0..n {
                self.a[[i, j]] += self.phix[i] * self.d[j];
            }
        }
        self.b.scaled_add(sample.r, &self.phix);
        self.steps_before_update -= 1;
        if self.steps_before_update == 0 {
            self.solve_and_reset();
        }
    }

    fn end_episode(&mut self) {}
}

impl VFunctionLearner for Lstd {
    fn v_function(&self) -> &LinearVFunction {
        &self.vf
    }
}

/// Incremental LSTD of the state value function.
///
/// The inverse statistics matrix follows each rank-one change through the
/// Sherman-Morrison formula, so `compute_value_parameters` can be called at
/// any time without a fresh inversion. A degenerate update denominator is
/// reported and the offending sample's statistics are skipped; learning
/// continues with the next sample.
pub struct Ilstd {
    vf: LinearVFunction,
    gamma: Factor,
    lambda: Factor,
    nb_steps_before_update: usize,
    steps_before_update: usize,
    ainv: Array2<f64>,
    b: Array1<f64>,
    z: Array1<f64>,
    phix: Array1<f64>,
    d: Array1<f64>,
}

impl Ilstd {
    /// Create an ILSTD learner.
    ///
    /// `diag_ainv0` seeds the inverse statistics diagonal and must be
    /// positive; `nb_steps_before_update == 0` materializes the parameters
    /// on every sample.
    pub fn new(
        vf: LinearVFunction,
        gamma: Factor,
        lambda: Factor,
        nb_steps_before_update: usize,
        diag_ainv0: f64,
    ) -> Result<Self> {
        check_diag_seed(diag_ainv0)?;
        let n = vf.params_len();
        Ok(Self {
            vf,
            gamma,
            lambda,
            nb_steps_before_update,
            steps_before_update: nb_steps_before_update,
            ainv: Array2::eye(n) * diag_ainv0,
            b: Array1::zeros(n),
            z: Array1::zeros(n),
            phix: Array1::zeros(n),
            d: Array1::zeros(n),
        })
    }

    /// Solve for the value parameters from the current statistics without
    /// resetting them
    pub fn compute_value_parameters(&mut self) {
        let w = self.ainv.dot(&self.b);
        self.vf.set_params(w.view());
    }
}

impl EnvironmentListener for Ilstd {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {
        self.z.fill(0.0);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        self.vf
            .features()
            .phi_into(sample.x.view(), self.phix.view_mut());
        let decay = self.lambda.value() * self.gamma.value();
        for i in 0..self.z.len() {
            self.z[i] = decay * self.z[i] + self.phix[i];
        }
        self.d.assign(&self.phix);
        if !sample.terminal {
            let phixn = self.vf.features().phi(sample.xn.view());
            self.d.scaled_add(-self.gamma.value(), &phixn);
        }
        match linalg::sherman_morrison(&mut self.ainv, self.z.view(), self.d.view()) {
            RankOneUpdate::Applied => {
                self.b.scaled_add(sample.r, &self.z);
            }
            RankOneUpdate::Degenerate => {
                warn!("ILSTD rank-one update degenerate, sample skipped");
            }
        }
        if self.nb_steps_before_update == 0 {
            self.compute_value_parameters();
        } else {
            self.steps_before_update -= 1;
            if self.steps_before_update == 0 {
                self.compute_value_parameters();
                self.steps_before_update = self.nb_steps_before_update;
            }
        }
    }

    fn end_episode(&mut self) {}
}

impl VFunctionLearner for Ilstd {
    fn v_function(&self) -> &LinearVFunction {
        &self.vf
    }
}

/// Incremental LSTD of the state-action value function.
///
/// The follow-up action entering the temporal difference is drawn from the
/// policy under evaluation.
pub struct IlstdQ<P: Policy, R: RngCore> {
    qf: LinearQFunction,
    policy: Rc<RefCell<P>>,
    rng: R,
    gamma: Factor,
    lambda: Factor,
    nb_steps_before_update: usize,
    steps_before_update: usize,
    ainv: Array2<f64>,
    b: Array1<f64>,
    z: Array1<f64>,
    psixu: Array1<f64>,
    d: Array1<f64>,
}

impl<P: Policy, R: RngCore> IlstdQ<P, R> {
    /// Create an ILSTDQ learner evaluating `policy`
    pub fn new(
        qf: LinearQFunction,
        policy: Rc<RefCell<P>>,
        rng: R,
        gamma: Factor,
        lambda: Factor,
        nb_steps_before_update: usize,
        diag_ainv0: f64,
    ) -> Result<Self> {
        check_diag_seed(diag_ainv0)?;
        let m = qf.params_len();
        Ok(Self {
            qf,
            policy,
            rng,
            gamma,
            lambda,
            nb_steps_before_update,
            steps_before_update: nb_steps_before_update,
            ainv: Array2::eye(m) * diag_ainv0,
            b: Array1::zeros(m),
            z: Array1::zeros(m),
            psixu: Array1::zeros(m),
            d: Array1::zeros(m),
        })
    }

    /// Solve for the Q-function parameters from the current statistics
    /// without resetting them
    pub fn compute_value_parameters(&mut self) {
        let w = self.ainv.dot(&self.b);
        self.qf.set_params(w.view());
    }
}

impl<P: Policy, R: RngCore> EnvironmentListener for IlstdQ<P, R> {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {
        self.z.fill(0.0);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        // Draw the follow-up action from the evaluated policy
        let un = {
            let mut pol = self.policy.borrow_mut();
            pol.prepare(sample.xn.view());
            pol.draw(&mut self.rng)
        };
        let xu = self.qf.concat_input(sample.x.view(), sample.u.view());
        let xnun = self.qf.concat_input(sample.xn.view(), un.view());
        self.qf.features().phi_into(xu.view(), self.psixu.view_mut());
        let psixnun = self.qf.features().phi(xnun.view());

        let decay = self.lambda.value() * self.gamma.value();
        for i in 0..self.z.len() {
            self.z[i] = decay * self.z[i] + self.psixu[i];
            self.d[i] = self.psixu[i] - self.gamma.value() * psixnun[i];
        }
        match linalg::sherman_morrison(&mut self.ainv, self.z.view(), self.d.view()) {
            RankOneUpdate::Applied => {
                self.b.scaled_add(sample.r, &self.z);
            }
            RankOneUpdate::Degenerate => {
                warn!("ILSTDQ rank-one update degenerate, sample skipped");
            }
        }
        if self.nb_steps_before_update == 0 {
            self.compute_value_parameters();
        } else {
            self.steps_before_update -= 1;
            if self.steps_before_update == 0 {
                self.compute_value_parameters();
                self.steps_before_update = self.nb_steps_before_update;
            }
        }
    }

    fn end_episode(&mut self) {}
}

impl<P: Policy, R: RngCore> QFunctionLearner for IlstdQ<P, R> {
    fn q_function(&self) -> &LinearQFunction {
        &self.qf
    }
}

/// Incremental LSTD learning the advantage and the state value function
/// jointly over stacked `(m + n)` compatible/state features.
///
/// The advantage weights of the materialized solution are the natural
/// policy gradient direction for the policy generating the compatible
/// features.
pub struct IlstdAv {
    a_function: LinearQFunction,
    v_function: LinearVFunction,
    gamma: Factor,
    lambda: Factor,
    nb_steps_before_update: usize,
    steps_before_update: usize,
    diag_ainv0: f64,
    /// Advantage parameter count
    m: usize,
    /// State value parameter count
    n: usize,
    ainv: Array2<f64>,
    b: Array1<f64>,
    z: Array1<f64>,
    stacked: Array1<f64>,
    d: Array1<f64>,
}

impl IlstdAv {
    /// Create an ILSTDAV learner.
    ///
    /// `nb_steps_before_update == 0` disables the internal materialization
    /// cadence entirely; the owner then decides when to call
    /// [`IlstdAv::compute_value_parameters`].
    pub fn new(
        a_function: LinearQFunction,
        v_function: LinearVFunction,
        gamma: Factor,
        lambda: Factor,
        nb_steps_before_update: usize,
        diag_ainv0: f64,
    ) -> Result<Self> {
        check_diag_seed(diag_ainv0)?;
        let m = a_function.params_len();
        let n = v_function.params_len();
        Ok(Self {
            a_function,
            v_function,
            gamma,
            lambda,
            nb_steps_before_update,
            steps_before_update: nb_steps_before_update,
            diag_ainv0,
            m,
            n,
            ainv: Array2::eye(m + n) * diag_ainv0,
            b: Array1::zeros(m + n),
            z: Array1::zeros(m + n),
            stacked: Array1::zeros(m + n),
            d: Array1::zeros(m + n),
        })
    }

    /// Solve for the advantage and state value parameters from the current
    /// statistics without resetting them
    pub fn compute_value_parameters(&mut self) {
        let w = self.ainv.dot(&self.b);
        self.a_function.set_params(w.slice(s![..self.m]));
        self.v_function.set_params(w.slice(s![self.m..]));
    }

    /// Partially forget the statistics with factor `kappa`.
    ///
    /// `z` and `b` are scaled by kappa and the diagonal of the inverse
    /// statistics matrix is blended toward its initial seed. Kappa of zero
    /// resets the statistics completely, kappa of one leaves them
    /// untouched. Used when the evaluated policy drifts by small
    /// increments, to stop averaging over stale data.
    pub fn apply_forget_factor(&mut self, kappa: Factor) {
        for i in 0..self.m + self.n {
            self.z[i] *= kappa.value();
            self.b[i] *= kappa.value();
            self.ainv[[i, i]] = kappa.mixture(self.ainv[[i, i]], self.diag_ainv0);
        }
    }

    /// The current state value function estimate
    #[must_use]
    pub fn v_function(&self) -> &LinearVFunction {
        &self.v_function
    }
}

impl EnvironmentListener for IlstdAv {
    fn new_episode(&mut self, _x0: ArrayView1<f64>, _max_t: usize) {
        self.z.fill(0.0);
    }

    fn receive_sample(&mut self, sample: &Sample) {
        let xu = self
            .a_function
            .concat_input(sample.x.view(), sample.u.view());
        let psixu = self.a_function.features().phi(xu.view());
        let phix = self.v_function.features().phi(sample.x.view());
        self.stacked.slice_mut(s![..self.m]).assign(&psixu);
        self.stacked.slice_mut(s![self.m..]).assign(&phix);

        let decay = self.lambda.value() * self.gamma.value();
        for i in 0..self.z.len() {
            self.z[i] = decay * self.z[i] + self.stacked[i];
        }
        self.d.assign(&self.stacked);
        if !sample.terminal {
            let phixn = self.v_function.features().phi(sample.xn.view());
            for i in 0..self.n {
                self.d[self.m + i] -= self.gamma.value() * phixn[i];
            }
        }
        match linalg::sherman_morrison(&mut self.ainv, self.z.view(), self.d.view()) {
            RankOneUpdate::Applied => {
                self.b.scaled_add(sample.r, &self.z);
            }
            RankOneUpdate::Degenerate => {
                warn!("ILSTDAV rank-one update degenerate, sample skipped");
            }
        }
        if self.nb_steps_before_update > 0 {
            self.steps_before_update -= 1;
            if self.steps_before_update == 0 {
                self.compute_value_parameters();
                self.steps_before_update = self.nb_steps_before_update;
            }
        }
    }

    fn end_episode(&mut self) {}
}

impl QFunctionLearner for IlstdAv {
    fn q_function(&self) -> &LinearQFunction {
        &self.a_function
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use rand::{rngs::StdRng, SeedableRng};

    use rlinc_core::features::{TabularStateActionFeatures, TabularStateFeatures};
    use rlinc_core::value::{QFunction, VFunction};
    use rlinc_core::ConstantActionPolicy;

    use super::*;

    fn linear_vf(n: usize) -> LinearVFunction {
        LinearVFunction::new(Box::new(TabularStateFeatures::new(n).unwrap()))
    }

    fn sample(x: f64, xn: f64, r: f64, terminal: bool) -> Sample {
        Sample::new(arr1(&[x]), arr1(&[0.0]), arr1(&[xn]), r, terminal)
    }

    #[test]
    fn lstd_rejects_zero_cadence() {
        let gamma = Factor::new(0.9).unwrap();
        assert!(Lstd::new(linear_vf(2), gamma, 0, 0.0).is_err());
    }

    #[test]
    fn lstd_solves_a_two_state_chain() {
        // Deterministic chain: 0 -> 1 (r = 1), 1 terminal (r = 0).
        // Fixed point: V(1) = 0, V(0) = 1 + gamma*V(1) = 1.
        let gamma = Factor::new(0.5).unwrap();
        let mut lstd = Lstd::new(linear_vf(2), gamma, 20, 0.0).unwrap();
        for _ in 0..10 {
            lstd.receive_sample(&sample(0.0, 1.0, 1.0, false));
            lstd.receive_sample(&sample(1.0, 0.0, 0.0, true));
        }
        assert_relative_eq!(
            lstd.v_function().get(arr1(&[0.0]).view()),
            1.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            lstd.v_function().get(arr1(&[1.0]).view()),
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn ilstd_rejects_non_positive_seed() {
        let gamma = Factor::new(0.9).unwrap();
        assert!(Ilstd::new(linear_vf(2), gamma, Factor::ZERO, 1, 0.0).is_err());
    }

    #[test]
    fn ilstd_converges_on_a_two_state_chain() {
        let gamma = Factor::new(0.5).unwrap();
        let mut ilstd = Ilstd::new(linear_vf(2), gamma, Factor::ZERO, 1, 1.0).unwrap();
        ilstd.new_episode(arr1(&[0.0]).view(), 2);
        for _ in 0..200 {
            ilstd.receive_sample(&sample(0.0, 1.0, 1.0, false));
            ilstd.receive_sample(&sample(1.0, 0.0, 0.0, true));
        }
        assert_relative_eq!(
            ilstd.v_function().get(arr1(&[0.0]).view()),
            1.0,
            epsilon = 1e-2
        );
        assert_relative_eq!(
            ilstd.v_function().get(arr1(&[1.0]).view()),
            0.0,
            epsilon = 1e-2
        );
    }

    #[test]
    fn ilstdq_converges_on_a_two_state_chain() {
        // Constant action, deterministic cycle treated as continuing:
        // Q(0) = 1 + gamma*Q(1), Q(1) = gamma*Q(0)
        let gamma = Factor::new(0.5).unwrap();
        let qf = LinearQFunction::new(
            Box::new(TabularStateActionFeatures::new(2, 1).unwrap()),
            1,
            1,
        )
        .unwrap();
        let pol = Rc::new(RefCell::new(ConstantActionPolicy::new(arr1(&[0.0]), 1)));
        let rng = StdRng::seed_from_u64(9);
        let mut ilstdq =
            IlstdQ::new(qf, pol, rng, gamma, Factor::ZERO, 1, 1.0).unwrap();
        ilstdq.new_episode(arr1(&[0.0]).view(), 2);
        for _ in 0..300 {
            ilstdq.receive_sample(&sample(0.0, 1.0, 1.0, false));
            ilstdq.receive_sample(&sample(1.0, 0.0, 0.0, false));
        }
        assert_relative_eq!(
            ilstdq.q_function().get(arr1(&[0.0]).view(), arr1(&[0.0]).view()),
            4.0 / 3.0,
            epsilon = 1e-2
        );
        assert_relative_eq!(
            ilstdq.q_function().get(arr1(&[1.0]).view(), arr1(&[0.0]).view()),
            2.0 / 3.0,
            epsilon = 1e-2
        );
    }

    fn ilstdav() -> IlstdAv {
        let qf = LinearQFunction::new(
            Box::new(TabularStateActionFeatures::new(2, 2).unwrap()),
            1,
            1,
        )
        .unwrap();
        let vf = linear_vf(2);
        IlstdAv::new(
            qf,
            vf,
            Factor::new(0.9).unwrap(),
            Factor::new(0.5).unwrap(),
            0,
            2.0,
        )
        .unwrap()
    }

    #[test]
    fn forget_factor_zero_resets_statistics_to_seed() {
        let mut av = ilstdav();
        av.new_episode(arr1(&[0.0]).view(), 10);
        for _ in 0..5 {
            av.receive_sample(&Sample::new(
                arr1(&[0.0]),
                arr1(&[1.0]),
                arr1(&[1.0]),
                1.0,
                false,
            ));
        }
        av.apply_forget_factor(Factor::ZERO);
        let dim = av.m + av.n;
        for i in 0..dim {
            assert_relative_eq!(av.z[i], 0.0);
            assert_relative_eq!(av.b[i], 0.0);
            assert_relative_eq!(av.ainv[[i, i]], 2.0);
        }
    }

    #[test]
    fn forget_factor_one_is_the_identity() {
        let mut av = ilstdav();
        av.new_episode(arr1(&[0.0]).view(), 10);
        for _ in 0..5 {
            av.receive_sample(&Sample::new(
                arr1(&[0.0]),
                arr1(&[1.0]),
                arr1(&[1.0]),
                1.0,
                false,
            ));
        }
        let (z, b, ainv) = (av.z.clone(), av.b.clone(), av.ainv.clone());
        av.apply_forget_factor(Factor::ONE);
        assert_eq!(av.z, z);
        assert_eq!(av.b, b);
        assert_eq!(av.ainv, ainv);
    }
}
