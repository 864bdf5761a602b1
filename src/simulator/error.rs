use crate::model::ModelId;
use thiserror::Error;

///
/// An error raised while building or running a simulation.
///
/// Every error aborts the call that produced it. A failed
/// [`exec_next_event`](crate::Simulator::exec_next_event) or
/// [`exec_until`](crate::Simulator::exec_until) fires no listener
/// callbacks and leaves the simulator poisoned: further calls return
/// [`Poisoned`](SimulationError::Poisoned) and the caller decides
/// whether to discard or rebuild.
///
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A `connect` call referenced a pin or child that does not belong
    /// to the coupled model.
    #[error("invalid coupling: {0}")]
    InvalidCoupling(String),

    /// The Mealy output revision loop exceeded its iteration bound
    /// without reaching a fixpoint.
    #[error("mealy output revision around {model} exceeded {limit} passes without converging")]
    MealyDivergence {
        /// One of the models whose output was still changing.
        model: ModelId,
        /// The configured revision bound.
        limit: usize,
    },

    /// A model computed a time advance that schedules it before the
    /// current simulation time.
    #[error("time regression at {model}: {detail}")]
    TimeRegression {
        /// The offending model.
        model: ModelId,
        /// What was computed.
        detail: String,
    },

    /// A model latched an internal fault, e.g. an event locator that
    /// could not bracket a detected crossing.
    #[error("fault in {model}: {fault}")]
    ModelFault {
        /// The offending model.
        model: ModelId,
        /// The latched diagnostic.
        fault: String,
    },

    /// A structure change request left the model graph inconsistent.
    #[error("structure change violation: {0}")]
    Structure(String),

    /// The simulation executed more consecutive steps at one instant
    /// than the configured bound allows.
    #[error("{steps} consecutive steps executed at {instant} without the clock advancing")]
    InstantOverflow {
        /// Steps taken at the instant.
        steps: usize,
        /// The instant, rendered for diagnostics.
        instant: String,
    },

    /// `set_next_time` named an instant before the current time.
    #[error("injected event time precedes the current simulation time")]
    TimeTravel,

    /// The simulator aborted an earlier step; its state is no longer
    /// consistent.
    #[error("simulator poisoned by an earlier error; discard or rebuild it")]
    Poisoned,
}
