//!
//! Model behaviour contracts.
//!
//! A simulation is a tree of models: [`Atomic`] leaves (possibly with the
//! [`MealyAtomic`] extension) and [`Coupled`] containers that wire their
//! children together through pins.
//!

use crate::pin::Bag;
use crate::simulator::StructureContext;
use crate::time::Time;
use std::fmt;
use std::fmt::Debug;

mod coupled;
pub use coupled::{ChildKey, Coupled, Link};

pub(crate) use coupled::Child;

///
/// Payload carried on events.
///
/// Blanket-implemented for every type with clone and equality semantics.
/// Equality is what the simulator uses to recognise value collisions when
/// Mealy outputs are revised.
///
pub trait Value: Clone + PartialEq + Debug + 'static {}

impl<X: Clone + PartialEq + Debug + 'static> Value for X {}

///
/// Identity of a model inside a running simulator.
///
/// Ids are assigned when the model enters the simulation and are not
/// reused for the lifetime of the simulator, so an id held across a
/// structure change can never alias a different model.
///
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ModelId(pub(crate) usize);

impl ModelId {
    /// The arena index behind this id.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

///
/// Behaviour of an atomic DEVS model.
///
/// An atomic holds mutable state and exposes the classic quadruple: a
/// time advance, an output function, and internal, external and
/// confluent transitions. The simulator is the only caller of these
/// methods once the model has entered a simulation.
///
/// With state `q` last changed at time `t`:
///
/// - [`ta`](Atomic::ta) returns the duration until the next autonomous
///   event; [`Time::infinity`] makes the model passive, zero requests an
///   immediate event.
/// - at `t + ta()` with no input, [`output_func`](Atomic::output_func)
///   runs and then [`delta_int`](Atomic::delta_int).
/// - input arriving strictly before `t + ta()` triggers
///   [`delta_ext`](Atomic::delta_ext) with the elapsed time `e`.
/// - input arriving exactly at `t + ta()` triggers
///   [`output_func`](Atomic::output_func) and then
///   [`delta_conf`](Atomic::delta_conf) in place of the two separate
///   transitions.
///
pub trait Atomic<V: Value, T: Time> {
    /// Duration until the next autonomous event.
    fn ta(&self) -> T;

    /// Internal transition, taken when the time advance expires with no
    /// input present.
    fn delta_int(&mut self);

    /// External transition, taken when input `xb` arrives after elapsed
    /// time `e < ta()`.
    fn delta_ext(&mut self, e: T, xb: &Bag<V>);

    /// Confluent transition, taken when input arrives exactly when the
    /// time advance expires.
    fn delta_conf(&mut self, xb: &Bag<V>);

    /// Output function, run immediately before an internal or confluent
    /// transition. May update scratch data but must not change state
    /// observable through the transition functions.
    fn output_func(&mut self, yb: &mut Bag<V>);

    /// Called after every transition of this model; record structure
    /// change requests on `ctx` and return `true` if anything was
    /// requested. The default does nothing.
    fn model_transition(&mut self, ctx: &mut StructureContext<'_, V, T>) -> bool {
        let _ = ctx;
        false
    }

    /// A diagnostic latched by a model whose internals failed (for
    /// example a hybrid model whose event locator could not bracket a
    /// crossing). The simulator polls this after every callback and
    /// turns `Some` into a simulation error.
    fn fault(&self) -> Option<&str> {
        None
    }
}

///
/// An atomic model whose output may depend on pending input.
///
/// When a Mealy atomic receives input in a simultaneous-event set, the
/// simulator replaces the output produced by
/// [`output_func`](Atomic::output_func) with the result of one of these
/// functions and revises iteratively until the outputs of all involved
/// Mealy models stop changing.
///
/// Neither function may mutate state observable through the transition
/// functions: a revision is a recomputation of output under a
/// hypothetical input, not a transition.
///
pub trait MealyAtomic<V: Value, T: Time>: Atomic<V, T> {
    /// Output produced when the model is not imminent and input `xb`
    /// arrives at elapsed time `e`. The same `e` and `xb` are passed to
    /// the [`delta_ext`](Atomic::delta_ext) that follows.
    fn external_output(&mut self, e: T, xb: &Bag<V>, yb: &mut Bag<V>);

    /// Output produced when the model is imminent and also receives
    /// input. The same `xb` is passed to the
    /// [`delta_conf`](Atomic::delta_conf) that follows.
    fn confluent_output(&mut self, xb: &Bag<V>, yb: &mut Bag<V>);
}
