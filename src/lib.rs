//!
//! A simulation kernel for discrete event systems.
//!
//! Models follow the DEVS formalism: [`Atomic`] leaves expose a time
//! advance, an output function and internal/external/confluent
//! transitions; [`Coupled`] containers wire children together through
//! [`Pin`] labels; the [`Simulator`] advances the network through time
//! in correct causal order.
//!
//! Beyond the classic formalism the kernel supports
//!
//! - [`MealyAtomic`] models whose output depends on pending input,
//!   resolved by fixpoint revision inside each simultaneous event set,
//! - [`hybrid`] models whose state evolves continuously between events,
//!   with numerically located state and time events,
//! - structure changes (adding and removing models) requested from
//!   transitions and applied between steps,
//! - injection of external input through the root's input surface, and
//! - synchronous [`EventListener`] observation of outputs and state
//!   changes.
//!
//! # Example
//!
//! ```
//! use devs::{Atomic, Bag, Coupled, Pin, PinValue, Simulator};
//!
//! /// Emits an increasing counter on `out` every `period` units.
//! struct Ticker {
//!     period: f64,
//!     count: i32,
//!     out: Pin,
//! }
//!
//! impl Atomic<i32, f64> for Ticker {
//!     fn ta(&self) -> f64 {
//!         self.period
//!     }
//!     fn delta_int(&mut self) {
//!         self.count += 1;
//!     }
//!     fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {}
//!     fn delta_conf(&mut self, xb: &Bag<i32>) {
//!         self.delta_int();
//!         self.delta_ext(0.0, xb);
//!     }
//!     fn output_func(&mut self, yb: &mut Bag<i32>) {
//!         yb.push(PinValue::new(self.out, self.count));
//!     }
//! }
//!
//! let mut root = Coupled::new();
//! root.add_atomic(Ticker { period: 2.0, count: 0, out: Pin::new() });
//! let mut sim = Simulator::new(root).unwrap();
//! sim.exec_until(10.0).unwrap();
//! assert_eq!(sim.current_time(), 10.0);
//! ```
//!

pub mod hybrid;
pub mod model;
pub mod pin;
mod schedule;
pub mod simulator;
pub mod time;

pub mod prelude;

pub use crate::model::{Atomic, ChildKey, Coupled, Link, MealyAtomic, ModelId, Value};
pub use crate::pin::{Bag, Pin, PinValue};
pub use crate::simulator::{
    shared, EventListener, ListenerId, Route, Shared, SimOptions, SimulationError, Simulator,
    StructureContext,
};
pub use crate::time::Time;
