use crate::model::{ModelId, Value};
use crate::pin::Pin;
use crate::time::Time;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared single-threaded handle, the shape listeners are registered in
/// so the embedder keeps access to them while the simulator runs.
pub type Shared<L> = Rc<RefCell<L>>;

/// Wraps a value into a [`Shared`] handle.
pub fn shared<L>(listener: L) -> Shared<L> {
    Rc::new(RefCell::new(listener))
}

///
/// Observer of simulation activity.
///
/// Both callbacks run synchronously on the simulator thread, after all
/// transitions of a successfully completed step: first every output of
/// the step, then every state change. A step that aborts with an error
/// notifies nothing.
///
pub trait EventListener<V: Value, T: Time> {
    /// An output `value` appeared on `pin`, produced by `model` at time
    /// `t`. Also fired, with the root model's id, for values that leave
    /// the root through its output surface.
    fn output_event(&mut self, model: ModelId, pin: Pin, value: &V, t: T) {
        let _ = (model, pin, value, t);
    }

    /// `model` executed a state transition at time `t`.
    fn state_change(&mut self, model: ModelId, t: T) {
        let _ = (model, t);
    }
}

/// Token returned by listener registration, used to unregister.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ListenerId(usize);

pub(crate) struct ListenerBus<V: Value, T: Time> {
    entries: Vec<(ListenerId, Shared<dyn EventListener<V, T>>)>,
    next: usize,
}

impl<V: Value, T: Time> ListenerBus<V, T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next: 0,
        }
    }

    pub fn add(&mut self, listener: Shared<dyn EventListener<V, T>>) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) {
        self.entries.retain(|(lid, _)| *lid != id);
    }

    pub fn output_event(&self, model: ModelId, pin: Pin, value: &V, t: T) {
        for (_, l) in &self.entries {
            l.borrow_mut().output_event(model, pin, value, t);
        }
    }

    pub fn state_change(&self, model: ModelId, t: T) {
        for (_, l) in &self.entries {
            l.borrow_mut().state_change(model, t);
        }
    }
}
