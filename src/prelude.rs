//!
//! The commonly used surface of the crate in one import.
//!
//! ```
//! use devs::prelude::*;
//! ```
//!

pub use crate::hybrid::{
    CorrectedEuler, DaeSystem, EventLocator, Hybrid, LocatorMode, NullLocator, OdeSolver,
    OdeSystem, RungeKutta45, SemiExplicitDae, ZeroCrossingLocator,
};
pub use crate::model::{Atomic, ChildKey, Coupled, Link, MealyAtomic, ModelId, Value};
pub use crate::pin::{Bag, Pin, PinValue};
pub use crate::simulator::{
    shared, EventListener, ListenerId, Route, Shared, SimOptions, SimulationError, Simulator,
    StructureContext,
};
pub use crate::time::Time;
