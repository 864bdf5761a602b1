use crate::hybrid::{OdeSolver, OdeSystem};
use crate::model::Value;

///
/// Adaptive 4th/5th order Runge-Kutta integrator. The step size shrinks
/// until the estimated per-step truncation error satisfies the
/// tolerance; the solution is advanced with the fifth order scheme.
///
pub struct RungeKutta45 {
    err_tol: f64,
    h_max: f64,
    /// Last step size that satisfied the error constraint.
    h_cur: f64,
    dq: Vec<f64>,
    qq: Vec<f64>,
    t: Vec<f64>,
    k: [Vec<f64>; 6],
}

impl RungeKutta45 {
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
            k: Default::default(),
        }
    }

    fn resize(&mut self, n: usize) {
        self.dq.resize(n, 0.0);
        self.qq.resize(n, 0.0);
        self.t.resize(n, 0.0);
        for k in &mut self.k {
            k.resize(n, 0.0);
        }
    }

    /// One trial step of size `step` on the scratch state, returning the
    /// truncation error estimate.
    fn trial_step<V: Value>(&mut self, sys: &mut dyn OdeSystem<V>, step: f64) -> f64 {
        let n = self.qq.len();
        // k1
        sys.der_func(&self.qq, &mut self.dq);
        for j in 0..n {
            self.k[0][j] = step * self.dq[j];
        }
        // k2
        for j in 0..n {
            self.t[j] = self.qq[j] + 0.5 * self.k[0][j];
        }
        sys.der_func(&self.t, &mut self.dq);
        for j in 0..n {
            self.k[1][j] = step * self.dq[j];
        }
        // k3
        for j in 0..n {
            self.t[j] = self.qq[j] + 0.25 * (self.k[0][j] + self.k[1][j]);
        }
        sys.der_func(&self.t, &mut self.dq);
        for j in 0..n {
            self.k[2][j] = step * self.dq[j];
        }
        // k4
        for j in 0..n {
            self.t[j] = self.qq[j] - self.k[1][j] + 2.0 * self.k[2][j];
        }
        sys.der_func(&self.t, &mut self.dq);
        for j in 0..n {
            self.k[3][j] = step * self.dq[j];
        }
        // k5
        for j in 0..n {
            self.t[j] = self.qq[j]
                + (7.0 / 27.0) * self.k[0][j]
                + (10.0 / 27.0) * self.k[1][j]
                + (1.0 / 27.0) * self.k[3][j];
        }
        sys.der_func(&self.t, &mut self.dq);
        for j in 0..n {
            self.k[4][j] = step * self.dq[j];
        }
        // k6
        for j in 0..n {
            self.t[j] = self.qq[j] + (28.0 / 625.0) * self.k[0][j] - 0.2 * self.k[1][j]
                + (546.0 / 625.0) * self.k[2][j]
                + (54.0 / 625.0) * self.k[3][j]
                - (378.0 / 625.0) * self.k[4][j];
        }
        sys.der_func(&self.t, &mut self.dq);
        for j in 0..n {
            self.k[5][j] = step * self.dq[j];
        }
        // Fifth order solution and componentwise error bound.
        let mut err: f64 = 0.0;
        for j in 0..n {
            self.qq[j] += (1.0 / 24.0) * self.k[0][j]
                + (5.0 / 48.0) * self.k[3][j]
                + (27.0 / 56.0) * self.k[4][j]
                + (125.0 / 336.0) * self.k[5][j];
            err = err.max(
                (self.k[0][j] / 8.0 + 2.0 * self.k[2][j] / 3.0 + self.k[3][j] / 16.0
                    - 27.0 * self.k[4][j] / 56.0
                    - 125.0 * self.k[5][j] / 336.0)
                    .abs(),
            );
        }
        err
    }
}

impl<V: Value> OdeSolver<V> for RungeKutta45 {
    fn integrate(&mut self, sys: &mut dyn OdeSystem<V>, q: &mut [f64], h_lim: f64) -> f64 {
        self.resize(q.len());
        let mut h = (self.h_cur * 1.1).min(self.h_max).min(h_lim);
        loop {
            self.qq.copy_from_slice(q);
            let err = self.trial_step(sys, h);
            if err <= self.err_tol {
                if self.h_cur <= h_lim {
                    self.h_cur = h;
                }
                break;
            }
            let h_guess = 0.8 * (self.err_tol * h.powi(4) / err.abs()).powf(0.25);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::Bag;

    /// Harmonic oscillator: q'' = -q.
    struct Oscillator;

    impl OdeSystem<i32> for Oscillator {
        fn num_vars(&self) -> usize {
            2
        }
        fn num_events(&self) -> usize {
            0
        }
        fn init(&mut self, q: &mut [f64]) {
            q[0] = 1.0;
            q[1] = 0.0;
        }
        fn der_func(&mut self, q: &[f64], dq: &mut [f64]) {
            dq[0] = q[1];
            dq[1] = -q[0];
        }
        fn state_event_func(&mut self, _q: &[f64], _z: &mut [f64]) {}
        fn time_event_func(&mut self, _q: &[f64]) -> f64 {
            f64::INFINITY
        }
        fn internal_event(&mut self, _q: &mut [f64], _events: &[bool]) {}
        fn external_event(&mut self, _q: &mut [f64], _e: f64, _xb: &Bag<i32>) {}
        fn confluent_event(&mut self, _q: &mut [f64], _events: &[bool], _xb: &Bag<i32>) {}
        fn output_func(&mut self, _q: &[f64], _events: &[bool], _yb: &mut Bag<i32>) {}
    }

    #[test]
    fn oscillator_completes_a_period() {
        let mut sys = Oscillator;
        let mut solver = RungeKutta45::new(1e-10, 0.1);
        let mut q = [1.0, 0.0];
        OdeSolver::<i32>::advance(&mut solver, &mut sys, &mut q, 2.0 * std::f64::consts::PI);
        assert!((q[0] - 1.0).abs() < 1e-5);
        assert!(q[1].abs() < 1e-5);
    }
}
