use crate::time::Time;

///
/// Options controlling a simulator, independent of the model it runs.
///
/// # Examples
///
/// ```
/// use devs::SimOptions;
///
/// let opts = SimOptions::default()
///     .start_time(10.0)
///     .max_mealy_revisions(32)
///     .max_steps_at_instant(1_000);
/// assert_eq!(opts.start_time, 10.0);
/// ```
///
#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions<T: Time> {
    /// The instant the simulation clock starts on.
    pub start_time: T,

    /// Upper bound on Mealy output revision passes within one step.
    /// Exceeding it aborts the step with
    /// [`MealyDivergence`](crate::SimulationError::MealyDivergence).
    pub max_mealy_revisions: usize,

    /// Upper bound on consecutive steps executed at a single instant,
    /// the only way to detect a zero-time-advance loop that makes no
    /// progress. Exceeding it aborts with
    /// [`InstantOverflow`](crate::SimulationError::InstantOverflow).
    pub max_steps_at_instant: usize,
}

impl<T: Time> SimOptions<T> {
    /// Sets the instant the clock starts on (default: zero).
    #[must_use]
    pub fn start_time(mut self, t: T) -> Self {
        self.start_time = t;
        self
    }

    /// Sets the Mealy revision bound (default: 100).
    #[must_use]
    pub fn max_mealy_revisions(mut self, bound: usize) -> Self {
        self.max_mealy_revisions = bound;
        self
    }

    /// Sets the same-instant step bound (default: 100 000).
    #[must_use]
    pub fn max_steps_at_instant(mut self, bound: usize) -> Self {
        self.max_steps_at_instant = bound;
        self
    }
}

impl<T: Time> Default for SimOptions<T> {
    fn default() -> Self {
        Self {
            start_time: T::zero(),
            max_mealy_revisions: 100,
            max_steps_at_instant: 100_000,
        }
    }
}
