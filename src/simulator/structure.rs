use crate::model::{Atomic, Coupled, MealyAtomic, ModelId, Value};
use crate::pin::Pin;
use crate::time::Time;

///
/// Destination of a coupling added during a structure change. Unlike
/// [`Link`](crate::Link), which names children of one coupled model
/// being built, a `Route` names models by their simulation-wide id —
/// including ids reserved for models added in the same batch.
///
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Route {
    /// Deliver on the input of a direct child of the coupled model.
    Model(ModelId),
    /// Relabel to another pin.
    Pin(Pin),
}

pub(crate) enum PendingNode<V: Value, T: Time> {
    Atomic(Box<dyn Atomic<V, T>>),
    Mealy(Box<dyn MealyAtomic<V, T>>),
    Coupled(Coupled<V, T>),
}

pub(crate) struct PendingAdd<V: Value, T: Time> {
    pub parent: ModelId,
    pub id: ModelId,
    pub node: PendingNode<V, T>,
}

pub(crate) struct StructureChanges<V: Value, T: Time> {
    next_id: usize,
    pub adds: Vec<PendingAdd<V, T>>,
    pub removes: Vec<ModelId>,
    pub connects: Vec<(ModelId, Pin, Route)>,
}

impl<V: Value, T: Time> StructureChanges<V, T> {
    pub fn new(next_id: usize) -> Self {
        Self {
            next_id,
            adds: Vec::new(),
            removes: Vec::new(),
            connects: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty() && self.connects.is_empty()
    }

    fn reserve(&mut self, count: usize) -> ModelId {
        let id = ModelId(self.next_id);
        self.next_id += count;
        id
    }
}

///
/// Collector for structure change requests, handed to
/// [`Atomic::model_transition`] after every transition.
///
/// Requests are not applied immediately: the simulator gathers them over
/// the whole step and applies the batch after the listener phase. Models
/// added and removed in the same batch never enter the simulation.
///
pub struct StructureContext<'a, V: Value, T: Time> {
    pub(crate) model: ModelId,
    pub(crate) parent: ModelId,
    pub(crate) changes: &'a mut StructureChanges<V, T>,
}

impl<V: Value, T: Time> StructureContext<'_, V, T> {
    /// The id of the model whose transition is running.
    #[must_use]
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// The id of the coupled model enclosing the transitioning model.
    #[must_use]
    pub fn parent(&self) -> ModelId {
        self.parent
    }

    /// Requests the addition of an atomic model under `parent` and
    /// returns the id the model will occupy once the batch is applied.
    pub fn add_atomic<M: Atomic<V, T> + 'static>(&mut self, parent: ModelId, model: M) -> ModelId {
        let id = self.changes.reserve(1);
        self.changes.adds.push(PendingAdd {
            parent,
            id,
            node: PendingNode::Atomic(Box::new(model)),
        });
        id
    }

    /// Requests the addition of a Mealy atomic model under `parent`.
    pub fn add_mealy<M: MealyAtomic<V, T> + 'static>(
        &mut self,
        parent: ModelId,
        model: M,
    ) -> ModelId {
        let id = self.changes.reserve(1);
        self.changes.adds.push(PendingAdd {
            parent,
            id,
            node: PendingNode::Mealy(Box::new(model)),
        });
        id
    }

    /// Requests the addition of a coupled model (and its whole subtree)
    /// under `parent`. The returned id is the coupled model's own;
    /// descendants receive the ids directly following it, in the order
    /// the children were added.
    pub fn add_coupled(&mut self, parent: ModelId, model: Coupled<V, T>) -> ModelId {
        let id = self.changes.reserve(model.subtree_size());
        self.changes.adds.push(PendingAdd {
            parent,
            id,
            node: PendingNode::Coupled(model),
        });
        id
    }

    /// Requests a new coupling edge on the coupled model `coupled`.
    /// `Route::Model` destinations must be direct children of `coupled`
    /// when the batch is applied.
    pub fn connect(&mut self, coupled: ModelId, source: Pin, destination: Route) {
        self.changes.connects.push((coupled, source, destination));
    }

    /// Requests the removal of a model. Removing a coupled model removes
    /// its descendants transitively; couplings referencing removed
    /// models are pruned.
    pub fn remove(&mut self, model: ModelId) {
        self.changes.removes.push(model);
    }
}
