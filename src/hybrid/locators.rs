use crate::hybrid::{EventLocator, OdeSolver, OdeSystem};
use crate::model::Value;

/// How [`ZeroCrossingLocator`] narrows the interval around a sign change.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LocatorMode {
    /// Linear interpolation on the indicator values. Indicators must be
    /// continuous.
    Interpolate,
    /// Interval halving. Indicators must be continuous.
    Bisect,
    /// Interval halving that terminates on interval width instead of
    /// indicator magnitude, for discontinuous indicators.
    Discontinuous,
}

///
/// Locates state events by narrowing `[0, h]` to the first instant where
/// an indicator function changes sign: an event triggers at the first
/// `t' >= t` with `z(t) * z(t') <= 0` and `|z(t')|` below the tolerance
/// (or, in discontinuous mode, with the bracket narrower than the
/// tolerance).
///
pub struct ZeroCrossingLocator {
    err_tol: f64,
    mode: LocatorMode,
    max_refinements: usize,
    z_start: Vec<f64>,
    z_end: Vec<f64>,
}

impl ZeroCrossingLocator {
    /// Creates a locator with the given indicator tolerance and mode.
    #[must_use]
    pub fn new(err_tol: f64, mode: LocatorMode) -> Self {
        Self {
            err_tol,
            mode,
            max_refinements: 200,
            z_start: Vec::new(),
            z_end: Vec::new(),
        }
    }

    /// Convenience constructor for [`LocatorMode::Bisect`].
    #[must_use]
    pub fn bisection(err_tol: f64) -> Self {
        Self::new(err_tol, LocatorMode::Bisect)
    }

    /// Convenience constructor for [`LocatorMode::Interpolate`].
    #[must_use]
    pub fn interpolation(err_tol: f64) -> Self {
        Self::new(err_tol, LocatorMode::Interpolate)
    }

    /// Convenience constructor for [`LocatorMode::Discontinuous`].
    #[must_use]
    pub fn discontinuous(err_tol: f64) -> Self {
        Self::new(err_tol, LocatorMode::Discontinuous)
    }

    /// Replaces the refinement bound (default 200) after which a sign
    /// change that still cannot be pinned down is reported as a failure.
    #[must_use]
    pub fn max_refinements(mut self, bound: usize) -> Self {
        self.max_refinements = bound;
        self
    }

    fn sign(x: f64) -> i32 {
        if x < 0.0 {
            -1
        } else if x > 0.0 {
            1
        } else {
            0
        }
    }
}

impl<V: Value> EventLocator<V> for ZeroCrossingLocator {
    fn find_events(
        &mut self,
        sys: &mut dyn OdeSystem<V>,
        events: &mut [bool],
        qstart: &[f64],
        qend: &mut [f64],
        solver: &mut dyn OdeSolver<V>,
        h: &mut f64,
    ) -> Result<bool, String> {
        let m = sys.num_events();
        if m == 0 {
            return Ok(false);
        }
        self.z_start.resize(m, 0.0);
        self.z_end.resize(m, 0.0);
        sys.state_event_func(qstart, &mut self.z_start);
        for refinement in 0.. {
            let mut t_guess = *h;
            let mut event_in_interval = false;
            let mut found_event = false;
            sys.state_event_func(qend, &mut self.z_end);
            for i in 0..m {
                events[i] = false;
                let (z0, z1) = (self.z_start[i], self.z_end[i]);
                if Self::sign(z1) == Self::sign(z0) {
                    continue;
                }
                if !z0.is_finite() || !z1.is_finite() {
                    return Err(format!(
                        "indicator {i} is not finite over [0, {h}]; cannot bracket the crossing"
                    ));
                }
                let pinned = match self.mode {
                    LocatorMode::Discontinuous => *h <= self.err_tol,
                    _ => z1.abs() <= self.err_tol,
                };
                if pinned {
                    events[i] = true;
                    found_event = true;
                } else {
                    if self.mode == LocatorMode::Interpolate {
                        let mut t_candidate = z0 * *h / (z0 - z1);
                        // Keep the step from collapsing to zero.
                        if t_candidate < *h / 4.0 {
                            t_candidate = *h / 4.0;
                        }
                        if t_candidate < t_guess {
                            t_guess = t_candidate;
                        }
                    }
                    event_in_interval = true;
                }
            }
            if !event_in_interval {
                return Ok(found_event);
            }
            if refinement >= self.max_refinements {
                return Err(format!(
                    "sign change not bracketed after {} refinements (interval {h})",
                    self.max_refinements
                ));
            }
            match self.mode {
                LocatorMode::Interpolate => *h = t_guess,
                _ => *h /= 2.0,
            }
            qend.copy_from_slice(qstart);
            solver.advance(sys, qend, *h);
        }
        unreachable!()
    }
}

///
/// The locator for systems without state events; finds nothing.
///
#[derive(Default)]
pub struct NullLocator;

impl NullLocator {
    /// Creates the locator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<V: Value> EventLocator<V> for NullLocator {
    fn find_events(
        &mut self,
        _sys: &mut dyn OdeSystem<V>,
        _events: &mut [bool],
        _qstart: &[f64],
        _qend: &mut [f64],
        _solver: &mut dyn OdeSolver<V>,
        _h: &mut f64,
    ) -> Result<bool, String> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hybrid::CorrectedEuler;
    use crate::pin::Bag;

    /// dq/dt = 1 with an indicator crossing zero at q = 1.
    struct Ramp;

    impl OdeSystem<i32> for Ramp {
        fn num_vars(&self) -> usize {
            1
        }
        fn num_events(&self) -> usize {
            1
        }
        fn init(&mut self, q: &mut [f64]) {
            q[0] = 0.0;
        }
        fn der_func(&mut self, _q: &[f64], dq: &mut [f64]) {
            dq[0] = 1.0;
        }
        fn state_event_func(&mut self, q: &[f64], z: &mut [f64]) {
            z[0] = q[0] - 1.0;
        }
        fn time_event_func(&mut self, _q: &[f64]) -> f64 {
            f64::INFINITY
        }
        fn internal_event(&mut self, _q: &mut [f64], _events: &[bool]) {}
        fn external_event(&mut self, _q: &mut [f64], _e: f64, _xb: &Bag<i32>) {}
        fn confluent_event(&mut self, _q: &mut [f64], _events: &[bool], _xb: &Bag<i32>) {}
        fn output_func(&mut self, _q: &[f64], _events: &[bool], _yb: &mut Bag<i32>) {}
    }

    fn locate(mut locator: ZeroCrossingLocator) -> (bool, f64, Vec<bool>) {
        let mut sys = Ramp;
        let mut solver = CorrectedEuler::new(1e-9, 10.0);
        let qstart = [0.0];
        let mut qend = [2.0];
        let mut h = 2.0;
        let mut events = [false, false];
        let found = locator
            .find_events(
                &mut sys,
                &mut events[..],
                &qstart,
                &mut qend,
                &mut solver,
                &mut h,
            )
            .unwrap();
        (found, h, events.to_vec())
    }

    #[test]
    fn bisection_pins_the_crossing() {
        let (found, h, events) = locate(ZeroCrossingLocator::bisection(1e-6));
        assert!(found);
        assert!(events[0]);
        assert!((h - 1.0).abs() < 1e-5);
    }

    #[test]
    fn interpolation_pins_the_crossing() {
        let (found, h, events) = locate(ZeroCrossingLocator::interpolation(1e-6));
        assert!(found);
        assert!(events[0]);
        assert!((h - 1.0).abs() < 1e-5);
    }

    #[test]
    fn discontinuous_mode_pins_by_interval_width() {
        // Crossing just ahead of the interval start, so halving keeps
        // it bracketed until the interval itself is below tolerance.
        let mut sys = Ramp;
        let mut solver = CorrectedEuler::new(1e-9, 10.0);
        let mut locator = ZeroCrossingLocator::discontinuous(1e-6);
        let qstart = [1.0 - 1e-8];
        let mut qend = [3.0 - 1e-8];
        let mut h = 2.0;
        let mut events = [false, false];
        let found = EventLocator::<i32>::find_events(
            &mut locator,
            &mut sys,
            &mut events[..],
            &qstart,
            &mut qend,
            &mut solver,
            &mut h,
        )
        .unwrap();
        assert!(found);
        assert!(events[0]);
        assert!(h <= 1e-6);
        assert!(h >= 1e-8);
    }

    #[test]
    fn discontinuous_mode_narrows_without_losing_progress() {
        // A crossing in the right half falls out of the bracket; the
        // locator reports no event and leaves a shorter valid step.
        let (found, h, events) = locate(ZeroCrossingLocator::discontinuous(1e-6));
        assert!(!found);
        assert!(!events[0]);
        assert!(h < 1.0 + 1e-12);
    }

    #[test]
    fn no_crossing_reports_nothing() {
        let mut sys = Ramp;
        let mut solver = CorrectedEuler::new(1e-9, 10.0);
        let mut locator = ZeroCrossingLocator::bisection(1e-6);
        let qstart = [0.0];
        let mut qend = [0.5];
        let mut h = 0.5;
        let mut events = [false, false];
        let found = EventLocator::<i32>::find_events(
            &mut locator,
            &mut sys,
            &mut events[..],
            &qstart,
            &mut qend,
            &mut solver,
            &mut h,
        )
        .unwrap();
        assert!(!found);
        assert!(!events[0]);
        assert_eq!(h, 0.5);
    }
}
