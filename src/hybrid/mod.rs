//!
//! Hybrid models: piecewise-continuous dynamics inside a discrete event
//! simulation.
//!
//! An [`OdeSystem`] describes continuous state variables, their
//! derivatives, and the discrete side of the model: state events (zero
//! crossings of indicator functions), scheduled time events, and the
//! transition/output callbacks that fire when an event occurs. An
//! [`OdeSolver`] advances the continuous state; an [`EventLocator`]
//! narrows an integration interval down to the first event instant.
//! [`Hybrid`] wraps the three into an [`Atomic`] whose internal events
//! coincide with the located state and time events.
//!

use crate::model::Atomic;
use crate::model::Value;
use crate::pin::Bag;

mod corrected_euler;
pub use corrected_euler::CorrectedEuler;

mod rk45;
pub use rk45::RungeKutta45;

mod locators;
pub use locators::{LocatorMode, NullLocator, ZeroCrossingLocator};

mod dae;
pub use dae::{DaeSystem, SemiExplicitDae};

///
/// A system of ordinary differential equations with discrete events.
///
/// Continuous state lives in a vector of `num_vars` doubles. State
/// events are zero crossings of the `num_events` indicator functions
/// written by [`state_event_func`](OdeSystem::state_event_func); time
/// events are scheduled by [`time_event_func`](OdeSystem::time_event_func).
///
/// The `events` slice passed to the discrete callbacks holds one flag
/// per indicator function plus a final flag for the time event.
///
pub trait OdeSystem<V: Value> {
    /// Number of continuous state variables.
    fn num_vars(&self) -> usize;

    /// Number of state event indicator functions.
    fn num_events(&self) -> usize;

    /// Writes the initial continuous state into `q`.
    fn init(&mut self, q: &mut [f64]);

    /// Computes the derivative of `q` into `dq`.
    fn der_func(&mut self, q: &[f64], dq: &mut [f64]);

    /// Computes the event indicators for `q` into `z`. An event occurs
    /// at a zero crossing of any component.
    fn state_event_func(&mut self, q: &[f64], z: &mut [f64]);

    /// Time remaining until the next scheduled time event, infinity if
    /// none.
    fn time_event_func(&mut self, q: &[f64]) -> f64;

    /// Invoked after every committed update of the continuous state;
    /// the place to refresh algebraic quantities. Does nothing by
    /// default.
    fn post_step(&mut self, q: &mut [f64]) {
        let _ = q;
    }

    /// Discrete internal transition at a state or time event.
    fn internal_event(&mut self, q: &mut [f64], events: &[bool]);

    /// Discrete external transition on input `xb` after elapsed time `e`.
    fn external_event(&mut self, q: &mut [f64], e: f64, xb: &Bag<V>);

    /// Discrete confluent transition: an event and input coincide.
    fn confluent_event(&mut self, q: &mut [f64], events: &[bool], xb: &Bag<V>);

    /// Discrete output at a state or time event.
    fn output_func(&mut self, q: &[f64], events: &[bool], yb: &mut Bag<V>);
}

///
/// A numerical integrator for an [`OdeSystem`].
///
/// Implementations may control truncation error or not; the only
/// contract is that [`integrate`](OdeSolver::integrate) advances by some
/// `h <= h_lim` and reports the `h` it chose, and that
/// [`advance`](OdeSolver::advance) covers exactly the requested span.
///
pub trait OdeSolver<V: Value> {
    /// Advances `q` by at most `h_lim` and returns the step actually
    /// taken.
    fn integrate(&mut self, sys: &mut dyn OdeSystem<V>, q: &mut [f64], h_lim: f64) -> f64;

    /// Advances `q` through exactly `h` units of time.
    fn advance(&mut self, sys: &mut dyn OdeSystem<V>, q: &mut [f64], h: f64);
}

///
/// A strategy that pinpoints the first state event inside an
/// integration interval.
///
pub trait EventLocator<V: Value> {
    /// Searches `[0, h]` from `qstart` for the first state event.
    ///
    /// On success, returns whether an event was found; `events` flags
    /// the indicator functions that triggered, `qend` holds the state
    /// at the event instant (or at `h` when none was found) and `h` is
    /// overwritten with the event time.
    ///
    /// # Errors
    ///
    /// A diagnostic when a detected sign change cannot be bracketed.
    fn find_events(
        &mut self,
        sys: &mut dyn OdeSystem<V>,
        events: &mut [bool],
        qstart: &[f64],
        qend: &mut [f64],
        solver: &mut dyn OdeSolver<V>,
        h: &mut f64,
    ) -> Result<bool, String>;
}

///
/// An atomic model that wraps an [`OdeSystem`] together with the solver
/// and locator that drive it.
///
/// After every committed state the model takes a tentative integration
/// step bounded by the time-event horizon, asks the locator for state
/// events inside it, and sets its time advance to the located interval.
/// Output is produced only when an event was actually found. External
/// input re-integrates from the committed state through the elapsed
/// time, catching any state event that the input would otherwise have
/// skipped over.
///
pub struct Hybrid<V: Value> {
    sys: Box<dyn OdeSystem<V>>,
    solver: Box<dyn OdeSolver<V>>,
    locator: Box<dyn EventLocator<V>>,
    /// Committed and tentative continuous states.
    q: Vec<f64>,
    q_trial: Vec<f64>,
    /// One flag per indicator function, plus the time-event flag.
    events: Vec<bool>,
    sigma: f64,
    event_exists: bool,
    event_happened: bool,
    /// Elapsed time accumulated since the last discrete event.
    e_accum: f64,
    /// Output that an external event discovered was missed; replayed at
    /// an immediate internal event.
    missed_output: Bag<V>,
    fault: Option<String>,
}

impl<V: Value> Hybrid<V> {
    /// Wraps a system with its solver and locator, computes the initial
    /// state and takes the first tentative step.
    pub fn new(
        mut sys: Box<dyn OdeSystem<V>>,
        solver: Box<dyn OdeSolver<V>>,
        locator: Box<dyn EventLocator<V>>,
    ) -> Self {
        let n = sys.num_vars();
        let m = sys.num_events();
        let mut q_trial = vec![0.0; n];
        sys.init(&mut q_trial);
        let q = q_trial.clone();
        let mut this = Self {
            sys,
            solver,
            locator,
            q,
            q_trial,
            events: vec![false; m + 1],
            sigma: f64::INFINITY,
            event_exists: false,
            event_happened: false,
            e_accum: 0.0,
            missed_output: Bag::new(),
            fault: None,
        };
        this.tentative_step();
        this
    }

    /// The committed value of the `k`-th continuous state variable.
    #[must_use]
    pub fn state(&self, k: usize) -> f64 {
        self.q[k]
    }

    /// The committed continuous state vector.
    #[must_use]
    pub fn state_vec(&self) -> &[f64] {
        &self.q
    }

    /// Whether the last transition executed a discrete event of the
    /// wrapped system.
    #[must_use]
    pub fn event_happened(&self) -> bool {
        self.event_happened
    }

    /// The wrapped system.
    pub fn system(&self) -> &dyn OdeSystem<V> {
        self.sys.as_ref()
    }

    /// The wrapped system, mutably.
    pub fn system_mut(&mut self) -> &mut dyn OdeSystem<V> {
        self.sys.as_mut()
    }

    /// Integrates a tentative step bounded by the time-event horizon,
    /// locates state events inside it, and derives the time advance.
    fn tentative_step(&mut self) {
        if self.fault.is_some() {
            return;
        }
        let time_event = self.sys.time_event_func(&self.q);
        let step_size = self
            .solver
            .integrate(self.sys.as_mut(), &mut self.q_trial, time_event);
        let mut h = step_size;
        let found = self.locator.find_events(
            self.sys.as_mut(),
            &mut self.events[..],
            &self.q,
            &mut self.q_trial,
            self.solver.as_mut(),
            &mut h,
        );
        match found {
            Ok(state_event) => {
                self.sigma = h.min(time_event);
                let m = self.sys.num_events();
                self.events[m] = time_event <= self.sigma;
                self.event_exists = self.events[m] || state_event;
            }
            Err(fault) => {
                self.sigma = f64::INFINITY;
                self.event_exists = false;
                self.fault = Some(fault);
            }
        }
    }
}

impl<V: Value> Atomic<V, f64> for Hybrid<V> {
    fn ta(&self) -> f64 {
        if self.missed_output.is_empty() {
            self.sigma
        } else {
            0.0
        }
    }

    fn delta_int(&mut self) {
        if !self.missed_output.is_empty() {
            self.missed_output.clear();
            return;
        }
        self.e_accum += self.sigma;
        self.event_happened = self.event_exists;
        if self.event_exists {
            self.sys.internal_event(&mut self.q_trial, &self.events);
            self.e_accum = 0.0;
        }
        self.q.copy_from_slice(&self.q_trial);
        self.tentative_step();
    }

    fn delta_ext(&mut self, e: f64, xb: &Bag<V>) {
        let mut state_event_exists = false;
        self.event_happened = true;
        // The input may arrive before the tentative step completes; if
        // an event was pending inside the elapsed interval it has been
        // missed and must be replayed.
        if self.event_exists {
            self.q_trial.copy_from_slice(&self.q);
            self.solver.advance(self.sys.as_mut(), &mut self.q_trial, e);
            let mut h = e;
            match self.locator.find_events(
                self.sys.as_mut(),
                &mut self.events[..],
                &self.q,
                &mut self.q_trial,
                self.solver.as_mut(),
                &mut h,
            ) {
                Ok(found) => state_event_exists = found,
                Err(fault) => {
                    self.fault = Some(fault);
                    return;
                }
            }
            if state_event_exists {
                let mut missed = Bag::new();
                self.sys
                    .output_func(&self.q_trial, &self.events, &mut missed);
                self.missed_output = missed;
                self.sys.confluent_event(&mut self.q_trial, &self.events, xb);
                self.q.copy_from_slice(&self.q_trial);
            }
        }
        if !state_event_exists {
            self.solver.advance(self.sys.as_mut(), &mut self.q, e);
            self.sys.post_step(&mut self.q);
            self.sys.external_event(&mut self.q, e + self.e_accum, xb);
        }
        self.e_accum = 0.0;
        self.q_trial.copy_from_slice(&self.q);
        self.tentative_step();
    }

    fn delta_conf(&mut self, xb: &Bag<V>) {
        if !self.missed_output.is_empty() {
            self.missed_output.clear();
            if self.sigma > 0.0 {
                self.event_exists = false;
            }
        }
        self.event_happened = true;
        if self.event_exists {
            self.sys.confluent_event(&mut self.q_trial, &self.events, xb);
        } else {
            self.sys
                .external_event(&mut self.q_trial, self.e_accum + self.sigma, xb);
        }
        self.e_accum = 0.0;
        self.q.copy_from_slice(&self.q_trial);
        self.tentative_step();
    }

    fn output_func(&mut self, yb: &mut Bag<V>) {
        if !self.missed_output.is_empty() {
            yb.extend(self.missed_output.iter().cloned());
            if self.sigma == 0.0 {
                // The replay coincides with the next located event.
                self.sys.output_func(&self.q_trial, &self.events, yb);
            }
        } else {
            self.sys.post_step(&mut self.q_trial);
            if self.event_exists {
                self.sys.output_func(&self.q_trial, &self.events, yb);
            }
        }
    }

    fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }
}
