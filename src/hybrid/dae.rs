use crate::hybrid::OdeSystem;
use crate::model::Value;
use crate::pin::Bag;

///
/// A semi-explicit differential algebraic system of index 1:
/// `dx/dt = f(x, y)` constrained by `y = g(x, y)`.
///
/// Implementors describe the system in terms of both the differential
/// state `q` and the algebraic variables `a`; wrapping the system in
/// [`SemiExplicitDae`] produces an [`OdeSystem`] that solves the
/// algebraic constraint by iteration whenever the state is consulted.
///
pub trait DaeSystem<V: Value> {
    /// Number of differential state variables.
    fn num_vars(&self) -> usize;

    /// Number of state event indicator functions.
    fn num_events(&self) -> usize;

    /// Number of algebraic variables.
    fn num_alg_vars(&self) -> usize;

    /// Writes the initial differential and algebraic state.
    fn init(&mut self, q: &mut [f64], a: &mut [f64]);

    /// Evaluates `g(q, a)` into `af`; the constraint solver iterates on
    /// this function until `g(q, a) = a` within tolerance.
    fn alg_func(&mut self, q: &[f64], a: &[f64], af: &mut [f64]);

    /// Computes the derivative of `q` into `dq`.
    fn der_func(&mut self, q: &[f64], a: &[f64], dq: &mut [f64]);

    /// Computes the event indicators into `z`.
    fn state_event_func(&mut self, q: &[f64], a: &[f64], z: &mut [f64]);

    /// Time remaining until the next scheduled time event.
    fn time_event_func(&mut self, q: &[f64], a: &[f64]) -> f64;

    /// Refreshes derived quantities after a committed step or discrete
    /// transition. Does nothing by default.
    fn post_step(&mut self, q: &mut [f64], a: &[f64]) {
        let _ = (q, a);
    }

    /// Discrete internal transition at a state or time event.
    fn internal_event(&mut self, q: &mut [f64], a: &[f64], events: &[bool]);

    /// Discrete external transition on input.
    fn external_event(&mut self, q: &mut [f64], a: &[f64], e: f64, xb: &Bag<V>);

    /// Discrete confluent transition.
    fn confluent_event(&mut self, q: &mut [f64], a: &[f64], events: &[bool], xb: &Bag<V>);

    /// Discrete output at a state or time event.
    fn output_func(&mut self, q: &[f64], a: &[f64], events: &[bool], yb: &mut Bag<V>);
}

///
/// Adapter that turns a [`DaeSystem`] into an [`OdeSystem`] by solving
/// `y = g(x, y)` with conjugate gradient iteration on `g(x, y) - y`
/// before every consultation of the continuous dynamics.
///
/// Iteration failures do not abort the simulation; they are counted and
/// the worst residual is retained for inspection through
/// [`iteration_failures`](SemiExplicitDae::iteration_failures) and
/// [`worst_residual`](SemiExplicitDae::worst_residual).
///
pub struct SemiExplicitDae<V: Value> {
    sys: Box<dyn DaeSystem<V>>,
    err_tol: f64,
    max_iters: usize,
    alpha: f64,
    a: Vec<f64>,
    a_prev: Vec<f64>,
    d: Vec<f64>,
    f: [Vec<f64>; 2],
    failures: usize,
    worst: f64,
}

impl<V: Value> SemiExplicitDae<V> {
    /// Wraps `sys` with the default tolerance `1e-10`, iteration limit
    /// 30 and initial search parameter `-1.0`.
    #[must_use]
    pub fn new(sys: Box<dyn DaeSystem<V>>) -> Self {
        Self::with_tolerance(sys, 1e-10, 30, -1.0)
    }

    /// Wraps `sys` with an explicit residual tolerance, iteration limit
    /// and initial line search parameter.
    #[must_use]
    pub fn with_tolerance(
        sys: Box<dyn DaeSystem<V>>,
        err_tol: f64,
        max_iters: usize,
        alpha: f64,
    ) -> Self {
        let na = sys.num_alg_vars();
        Self {
            sys,
            err_tol,
            max_iters,
            alpha,
            a: vec![0.0; na],
            a_prev: vec![0.0; na],
            d: vec![0.0; na],
            f: [vec![0.0; na], vec![0.0; na]],
            failures: 0,
            worst: 0.0,
        }
    }

    /// The current value of the `i`-th algebraic variable.
    #[must_use]
    pub fn alg_var(&self, i: usize) -> f64 {
        self.a[i]
    }

    /// How many times the constraint solver hit its iteration limit
    /// without meeting the tolerance.
    #[must_use]
    pub fn iteration_failures(&self) -> usize {
        self.failures
    }

    /// The largest residual left behind by a failed solve, zero if the
    /// solver never failed.
    #[must_use]
    pub fn worst_residual(&self) -> f64 {
        self.worst
    }

    /// Solves `g(q, a) = a` by conjugate gradient iteration on the
    /// residual, restarting with a damped search parameter whenever the
    /// residual grows.
    fn solve(&mut self, q: &[f64]) {
        let na = self.a.len();
        if na == 0 {
            return;
        }
        let mut iter_count = 0;
        let mut alpha = self.alpha;
        let mut err = 0.0_f64;
        'restart: loop {
            let mut alt = 0;
            let mut good = 1;
            let mut prev_err = f64::MAX;
            // First move by steepest descent.
            self.sys.alg_func(q, &self.a, &mut self.f[alt]);
            for i in 0..na {
                self.f[alt][i] -= self.a[i];
                self.d[i] = -self.f[alt][i];
                self.a_prev[i] = self.a[i];
                self.a[i] += alpha * self.d[i];
            }
            // Finish the search by conjugate gradient.
            while iter_count < self.max_iters {
                iter_count += 1;
                err = 0.0;
                self.sys.alg_func(q, &self.a, &mut self.f[good]);
                for i in 0..na {
                    self.f[good][i] -= self.a[i];
                    err = err.max(self.f[good][i].abs());
                }
                if err < self.err_tol {
                    return;
                }
                if err > prev_err {
                    // Not converging: back out and restart with a new
                    // search parameter.
                    self.a.copy_from_slice(&self.a_prev);
                    if alpha < 0.0 {
                        alpha = -alpha;
                    } else {
                        alpha *= -0.5;
                    }
                    continue 'restart;
                }
                prev_err = err;
                let mut g2 = 0.0;
                let mut beta = 0.0;
                for i in 0..na {
                    g2 += self.f[alt][i] * self.f[alt][i];
                }
                for i in 0..na {
                    beta += self.f[good][i] * (self.f[good][i] - self.f[alt][i]);
                }
                beta /= g2;
                for i in 0..na {
                    self.d[i] = beta * self.d[i] - self.f[good][i];
                    self.a_prev[i] = self.a[i];
                    self.a[i] += alpha * self.d[i];
                }
                std::mem::swap(&mut good, &mut alt);
            }
            break;
        }
        self.failures += 1;
        if err > self.worst {
            self.worst = err;
        }
    }
}

impl<V: Value> OdeSystem<V> for SemiExplicitDae<V> {
    fn num_vars(&self) -> usize {
        self.sys.num_vars()
    }

    fn num_events(&self) -> usize {
        self.sys.num_events()
    }

    fn init(&mut self, q: &mut [f64]) {
        let mut a = std::mem::take(&mut self.a);
        self.sys.init(q, &mut a);
        self.a = a;
    }

    fn der_func(&mut self, q: &[f64], dq: &mut [f64]) {
        self.solve(q);
        self.sys.der_func(q, &self.a, dq);
    }

    fn state_event_func(&mut self, q: &[f64], z: &mut [f64]) {
        self.solve(q);
        self.sys.state_event_func(q, &self.a, z);
    }

    fn time_event_func(&mut self, q: &[f64]) -> f64 {
        self.solve(q);
        self.sys.time_event_func(q, &self.a)
    }

    fn post_step(&mut self, q: &mut [f64]) {
        self.solve(q);
        self.sys.post_step(q, &self.a);
    }

    fn internal_event(&mut self, q: &mut [f64], events: &[bool]) {
        self.sys.internal_event(q, &self.a, events);
        self.solve(q);
        self.sys.post_step(q, &self.a);
    }

    fn external_event(&mut self, q: &mut [f64], e: f64, xb: &Bag<V>) {
        self.sys.external_event(q, &self.a, e, xb);
        self.solve(q);
        self.sys.post_step(q, &self.a);
    }

    fn confluent_event(&mut self, q: &mut [f64], events: &[bool], xb: &Bag<V>) {
        self.sys.confluent_event(q, &self.a, events, xb);
        self.solve(q);
        self.sys.post_step(q, &self.a);
    }

    fn output_func(&mut self, q: &[f64], events: &[bool], yb: &mut Bag<V>) {
        self.sys.output_func(q, &self.a, events, yb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// dx/dt = -y with the algebraic constraint y = g(x) = x.
    struct Constrained;

    impl DaeSystem<i32> for Constrained {
        fn num_vars(&self) -> usize {
            1
        }
        fn num_events(&self) -> usize {
            0
        }
        fn num_alg_vars(&self) -> usize {
            1
        }
        fn init(&mut self, q: &mut [f64], a: &mut [f64]) {
            q[0] = 1.0;
            a[0] = 0.0;
        }
        fn alg_func(&mut self, q: &[f64], _a: &[f64], af: &mut [f64]) {
            af[0] = q[0];
        }
        fn der_func(&mut self, _q: &[f64], a: &[f64], dq: &mut [f64]) {
            dq[0] = -a[0];
        }
        fn state_event_func(&mut self, _q: &[f64], _a: &[f64], _z: &mut [f64]) {}
        fn time_event_func(&mut self, _q: &[f64], _a: &[f64]) -> f64 {
            f64::INFINITY
        }
        fn internal_event(&mut self, _q: &mut [f64], _a: &[f64], _events: &[bool]) {}
        fn external_event(&mut self, _q: &mut [f64], _a: &[f64], _e: f64, _xb: &Bag<i32>) {}
        fn confluent_event(&mut self, _q: &mut [f64], _a: &[f64], _events: &[bool], _xb: &Bag<i32>) {
        }
        fn output_func(&mut self, _q: &[f64], _a: &[f64], _events: &[bool], _yb: &mut Bag<i32>) {}
    }

    #[test]
    fn constraint_is_solved_before_derivatives() {
        let mut dae = SemiExplicitDae::new(Box::new(Constrained));
        let mut q = [1.0];
        OdeSystem::<i32>::init(&mut dae, &mut q);
        let mut dq = [0.0];
        OdeSystem::<i32>::der_func(&mut dae, &q, &mut dq);
        // y converges to x = 1, so dx/dt = -1.
        assert!((dae.alg_var(0) - 1.0).abs() < 1e-8);
        assert!((dq[0] + 1.0).abs() < 1e-8);
        assert_eq!(dae.iteration_failures(), 0);
    }

    #[test]
    fn decay_with_constraint_matches_exponential() {
        use crate::hybrid::{CorrectedEuler, OdeSolver};
        let mut dae = SemiExplicitDae::new(Box::new(Constrained));
        let mut q = [1.0];
        OdeSystem::<i32>::init(&mut dae, &mut q);
        let mut solver = CorrectedEuler::new(1e-8, 0.05);
        OdeSolver::<i32>::advance(&mut solver, &mut dae, &mut q, 1.0);
        assert!((q[0] - (-1.0_f64).exp()).abs() < 1e-4);
    }
}
