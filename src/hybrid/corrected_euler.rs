use crate::hybrid::{OdeSolver, OdeSystem};
use crate::model::Value;

///
/// Second order Runge-Kutta (corrected Euler) with adaptive step sizing
/// for error control.
///
pub struct CorrectedEuler {
    err_tol: f64,
    h_max: f64,
    /// Last step size that satisfied the error constraint.
    h_cur: f64,
    dq: Vec<f64>,
    qq: Vec<f64>,
    t: Vec<f64>,
    k: [Vec<f64>; 2],
}

impl CorrectedEuler {
    /// Creates an integrator with a per-step error tolerance and a
    /// maximum step size.
    #[must_use]
    pub fn new(err_tol: f64, h_max: f64) -> Self {
        Self {
            err_tol,
            h_max,
            h_cur: h_max,
            dq: Vec::new(),
            qq: Vec::new(),
            t: Vec::new(),
            k: [Vec::new(), Vec::new()],
        }
    }

    fn resize(&mut self, n: usize) {
        self.dq.resize(n, 0.0);
        self.qq.resize(n, 0.0);
        self.t.resize(n, 0.0);
        self.k[0].resize(n, 0.0);
        self.k[1].resize(n, 0.0);
    }

    /// One trial step of size `step` on the scratch state, returning the
    /// error estimate.
    fn trial_step<V: Value>(&mut self, sys: &mut dyn OdeSystem<V>, step: f64) -> f64 {
        let n = self.qq.len();
        sys.der_func(&self.qq, &mut self.dq);
        for j in 0..n {
            self.k[0][j] = step * self.dq[j];
        }
        for j in 0..n {
            self.t[j] = self.qq[j] + 0.5 * self.k[0][j];
        }
        sys.der_func(&self.t, &mut self.dq);
        for j in 0..n {
            self.k[1][j] = step * self.dq[j];
        }
        let mut err: f64 = 0.0;
        for j in 0..n {
            self.qq[j] += self.k[1][j];
            err = err.max((self.k[0][j] - self.k[1][j]).abs());
        }
        err
    }
}

impl<V: Value> OdeSolver<V> for CorrectedEuler {
    fn integrate(&mut self, sys: &mut dyn OdeSystem<V>, q: &mut [f64], h_lim: f64) -> f64 {
        self.resize(q.len());
        let mut h = (self.h_cur * 1.1).min(self.h_max).min(h_lim);
        loop {
            self.qq.copy_from_slice(q);
            let err = self.trial_step(sys, h);
            if err <= self.err_tol {
                // Keep h if it was only shrunk to respect h_lim.
                if h_lim >= self.h_cur {
                    self.h_cur = h;
                }
                break;
            }
            let h_guess = 0.8 * self.err_tol * h / err.abs();
            if h < h_guess {
                h *= 0.8;
            } else {
                h = h_guess;
            }
        }
        q.copy_from_slice(&self.qq);
        h
    }

    fn advance(&mut self, sys: &mut dyn OdeSystem<V>, q: &mut [f64], h: f64) {
        let mut remaining = h;
        loop {
            let dt = self.integrate(sys, q, remaining);
            if dt >= remaining {
                return;
            }
            remaining -= dt;
        }
    }
}
