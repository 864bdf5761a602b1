//!
//! The sequential simulation engine.
//!
//! A [`Simulator`] owns the whole model tree, flattened into an arena at
//! construction, together with the schedule of next-event times, the
//! listener bus, the injection queue and the pending structure changes.
//! One call to [`Simulator::exec_next_event`] executes one simultaneous
//! event set: outputs are collected, routed through the coupling graph,
//! Mealy outputs are revised to a fixpoint, transitions run, listeners
//! fire, and structure change requests are applied in one batch.
//!

use crate::model::{Atomic, Child, ChildKey, Coupled, MealyAtomic, ModelId, Value};
use crate::pin::{Bag, Pin, PinValue};
use crate::schedule::Schedule;
use crate::time::Time;
use fxhash::{FxHashMap, FxHashSet};
use log::{trace, warn};

mod error;
pub use error::SimulationError;

mod options;
pub use options::SimOptions;

mod listener;
pub use listener::{shared, EventListener, ListenerId, Shared};
pub(crate) use listener::ListenerBus;

mod structure;
pub use structure::{Route, StructureContext};
pub(crate) use structure::{PendingNode, StructureChanges};

mod router;
use router::route_value;

pub(crate) enum Leaf<V: Value, T: Time> {
    Atomic(Box<dyn Atomic<V, T>>),
    Mealy(Box<dyn MealyAtomic<V, T>>),
}

impl<V: Value, T: Time> Leaf<V, T> {
    fn behaviour(&self) -> &dyn Atomic<V, T> {
        match self {
            Leaf::Atomic(m) => m.as_ref(),
            Leaf::Mealy(m) => m.as_ref(),
        }
    }

    fn behaviour_mut(&mut self) -> &mut dyn Atomic<V, T> {
        match self {
            Leaf::Atomic(m) => m.as_mut(),
            Leaf::Mealy(m) => m.as_mut(),
        }
    }

    fn mealy_mut(&mut self) -> Option<&mut dyn MealyAtomic<V, T>> {
        match self {
            Leaf::Atomic(_) => None,
            Leaf::Mealy(m) => Some(m.as_mut()),
        }
    }

    fn is_mealy(&self) -> bool {
        matches!(self, Leaf::Mealy(_))
    }
}

pub(crate) struct AtomicNode<V: Value, T: Time> {
    pub leaf: Leaf<V, T>,
    pub t_last: T,
    pub input: Bag<V>,
    pub output: Bag<V>,
    pub imminent: bool,
    pub receiving: bool,
}

pub(crate) struct CoupledNode {
    pub children: Vec<ModelId>,
    pub input_pins: FxHashSet<Pin>,
    pub output_pins: FxHashSet<Pin>,
    pub table: FxHashMap<Pin, Vec<RouteLink>>,
    /// Registered input pins of direct coupled children, for descent.
    pub child_inputs: FxHashMap<Pin, ModelId>,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum RouteLink {
    Model(ModelId),
    Pin(Pin),
}

pub(crate) enum Node<V: Value, T: Time> {
    Atomic(AtomicNode<V, T>),
    Coupled(CoupledNode),
}

pub(crate) struct Slot<V: Value, T: Time> {
    pub parent: Option<ModelId>,
    pub node: Node<V, T>,
}

///
/// Drives a network of DEVS models through time.
///
/// # Examples
///
/// ```no_run
/// use devs::{Coupled, SimOptions, Simulator};
///
/// # fn build() -> Coupled<i32, f64> { Coupled::new() }
/// let root = build();
/// let mut sim = Simulator::new(root).unwrap();
/// while sim.next_event_time() < 100.0 {
///     sim.exec_next_event().unwrap();
/// }
/// ```
///
pub struct Simulator<V: Value, T: Time = f64> {
    arena: Vec<Option<Slot<V, T>>>,
    root: ModelId,
    schedule: Schedule<T>,
    bus: ListenerBus<V, T>,
    options: SimOptions<T>,
    time: T,
    last_instant: Option<T>,
    steps_at_instant: usize,
    inject_time: Option<T>,
    inject_bag: Bag<V>,
    poisoned: bool,
}

impl<V: Value, T: Time> Simulator<V, T> {
    /// Builds a simulator around `root`, computing the initial schedule
    /// entry of every descendant atomic from its initial time advance.
    ///
    /// # Errors
    ///
    /// Fails if a model reports a fault or a negative time advance
    /// during initialization.
    pub fn new(root: Coupled<V, T>) -> Result<Self, SimulationError> {
        Self::new_with(root, SimOptions::default())
    }

    /// Builds a simulator with explicit [`SimOptions`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`Simulator::new`].
    pub fn new_with(root: Coupled<V, T>, options: SimOptions<T>) -> Result<Self, SimulationError> {
        let start = options.start_time;
        let mut sim = Self {
            arena: Vec::new(),
            root: ModelId(0),
            schedule: Schedule::new(),
            bus: ListenerBus::new(),
            options,
            time: start,
            last_instant: None,
            steps_at_instant: 0,
            inject_time: None,
            inject_bag: Bag::new(),
            poisoned: false,
        };
        sim.root = sim.flatten(None, root);
        sim.schedule_new_atomics(0, start)?;
        if sim.schedule.len() == 0 {
            warn!("simulation starts quiescent: every atomic is passive");
        }
        Ok(sim)
    }

    /// The current simulation time: the instant of the last executed
    /// event, or the start time before any event has run.
    pub fn current_time(&self) -> T {
        self.time
    }

    /// The instant of the next event, infinity when quiescent.
    pub fn next_event_time(&self) -> T {
        let t = self.schedule.min_time();
        match self.inject_time {
            Some(ti) if ti < t => ti,
            _ => t,
        }
    }

    /// The id of the root coupled model.
    pub fn root(&self) -> ModelId {
        self.root
    }

    /// Resolves a path of child keys from the root to the id of the
    /// model it denotes.
    pub fn id_of(&self, path: &[ChildKey]) -> Option<ModelId> {
        let mut current = self.root;
        for key in path {
            let slot = self.arena.get(current.0)?.as_ref()?;
            let Node::Coupled(c) = &slot.node else {
                return None;
            };
            current = *c.children.get(key.0)?;
        }
        Some(current)
    }

    /// Whether `model` currently holds a schedule entry (i.e. is alive
    /// and not passive).
    pub fn is_scheduled(&self, model: ModelId) -> bool {
        self.schedule.contains(model)
    }

    /// Number of models currently alive, coupled models included.
    pub fn live_model_count(&self) -> usize {
        self.arena.iter().flatten().count()
    }

    /// Registers a listener and returns the token that removes it.
    pub fn add_event_listener<L: EventListener<V, T> + 'static>(
        &mut self,
        listener: Shared<L>,
    ) -> ListenerId {
        let dynamic: Shared<dyn EventListener<V, T>> = listener;
        self.bus.add(dynamic)
    }

    /// Unregisters a listener.
    pub fn remove_event_listener(&mut self, id: ListenerId) {
        self.bus.remove(id);
    }

    /// Announces that injected input will arrive at `t`, which becomes a
    /// candidate for the next event time. `t` may equal the current
    /// time but must not precede it.
    ///
    /// # Errors
    ///
    /// [`SimulationError::TimeTravel`] if `t` lies in the past.
    pub fn set_next_time(&mut self, t: T) -> Result<(), SimulationError> {
        if t < self.time {
            return Err(SimulationError::TimeTravel);
        }
        self.inject_time = Some(t);
        Ok(())
    }

    /// Queues a value for delivery through the root's input pins at the
    /// instant announced by [`set_next_time`](Simulator::set_next_time).
    pub fn inject_input(&mut self, pv: PinValue<V>) {
        self.inject_bag.push(pv);
    }

    /// Executes every event up to and including `t_end`.
    ///
    /// # Errors
    ///
    /// Propagates the first simulation error; the simulator is poisoned
    /// afterwards.
    pub fn exec_until(&mut self, t_end: T) -> Result<(), SimulationError> {
        loop {
            let t_n = self.next_event_time();
            if t_n.is_infinity() || t_n > t_end {
                return Ok(());
            }
            self.exec_next_event()?;
        }
    }

    /// Executes the next simultaneous event set and returns its instant,
    /// or `Ok(None)` when the simulation is quiescent.
    ///
    /// # Errors
    ///
    /// Any [`SimulationError`]; the step commits nothing observable and
    /// the simulator is poisoned afterwards.
    pub fn exec_next_event(&mut self) -> Result<Option<T>, SimulationError> {
        if self.poisoned {
            return Err(SimulationError::Poisoned);
        }
        let t_n = self.next_event_time();
        if t_n.is_infinity() {
            return Ok(None);
        }
        match self.last_instant {
            Some(t) if t == t_n => self.steps_at_instant += 1,
            _ => {
                self.last_instant = Some(t_n);
                self.steps_at_instant = 1;
            }
        }
        if self.steps_at_instant > self.options.max_steps_at_instant {
            self.poisoned = true;
            return Err(SimulationError::InstantOverflow {
                steps: self.steps_at_instant,
                instant: format!("{t_n:?}"),
            });
        }
        match self.step(t_n) {
            Ok(()) => {
                self.time = t_n;
                Ok(Some(t_n))
            }
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // step execution
    // ------------------------------------------------------------------

    fn step(&mut self, t_n: T) -> Result<(), SimulationError> {
        let imminent = if self.schedule.min_time() == t_n {
            self.schedule.imminent()
        } else {
            Vec::new()
        };

        // Collect the ordinary outputs of the imminent set.
        for &m in &imminent {
            if let Some(node) = self.atomic_mut(m) {
                node.imminent = true;
                node.output.clear();
                let AtomicNode { leaf, output, .. } = node;
                leaf.behaviour_mut().output_func(output);
            }
            self.check_fault(m)?;
        }

        let injected: Bag<V> = if self.inject_time == Some(t_n) {
            self.inject_time = None;
            std::mem::take(&mut self.inject_bag)
        } else {
            Bag::new()
        };

        trace!(
            "step at {t_n:?}: {} imminent, {} injected",
            imminent.len(),
            injected.len()
        );

        let mut producers = imminent.clone();
        let (mut receivers, mut escapes) = self.route_outputs(&producers, &injected, &[]);

        // Mealy revision: recompute the outputs of every Mealy receiver
        // against the routed inputs until a pass changes nothing.
        let mealy_involved = imminent
            .iter()
            .chain(receivers.iter())
            .any(|&m| self.is_mealy(m));
        if mealy_involved {
            let mut revisions = 0usize;
            loop {
                let mut changed = false;
                let mut last_changed = self.root;
                for &m in &receivers.clone() {
                    if !self.is_mealy(m) {
                        continue;
                    }
                    let fresh = self.mealy_recompute(m, t_n);
                    self.check_fault(m)?;
                    if let Some(node) = self.atomic_mut(m) {
                        if fresh != node.output {
                            node.output = fresh;
                            changed = true;
                            last_changed = m;
                            if !producers.contains(&m) {
                                producers.push(m);
                            }
                        }
                    }
                }
                // A Mealy model that revised earlier but no longer
                // receives anything falls back to its ordinary output:
                // the plain output function when imminent, nothing at
                // all otherwise.
                for &m in &producers.clone() {
                    let Some(node) = self.atomic_mut(m) else {
                        continue;
                    };
                    if !node.leaf.is_mealy() || node.receiving {
                        continue;
                    }
                    let mut fresh = Bag::new();
                    if node.imminent {
                        node.leaf.behaviour_mut().output_func(&mut fresh);
                    }
                    if fresh != node.output {
                        node.output = fresh;
                        changed = true;
                        last_changed = m;
                    }
                }
                if !changed {
                    break;
                }
                revisions += 1;
                if revisions > self.options.max_mealy_revisions {
                    return Err(SimulationError::MealyDivergence {
                        model: last_changed,
                        limit: self.options.max_mealy_revisions,
                    });
                }
                if revisions * 2 > self.options.max_mealy_revisions {
                    warn!(
                        "mealy revision pass {revisions} of at most {}",
                        self.options.max_mealy_revisions
                    );
                }
                let prev = std::mem::take(&mut receivers);
                let routed = self.route_outputs(&producers, &injected, &prev);
                receivers = routed.0;
                escapes = routed.1;
            }
        }

        // Transitions, in schedule order for the imminent set followed
        // by the pure receivers; semantically the union is a set.
        let union: Vec<ModelId> = imminent
            .iter()
            .copied()
            .chain(
                receivers
                    .iter()
                    .copied()
                    .filter(|&m| !self.is_imminent(m)),
            )
            .collect();
        let mut transitioned = Vec::with_capacity(union.len());
        for m in union {
            let Some(node) = self.atomic_mut(m) else {
                continue;
            };
            let xb = std::mem::take(&mut node.input);
            let e = t_n - node.t_last;
            let behaviour = node.leaf.behaviour_mut();
            if node.imminent && !xb.is_empty() {
                behaviour.delta_conf(&xb);
            } else if node.imminent {
                behaviour.delta_int();
            } else {
                behaviour.delta_ext(e, &xb);
            }
            node.t_last = t_n;
            self.check_fault(m)?;
            self.reschedule(m, t_n)?;
            transitioned.push(m);
        }

        // Listener callbacks, buffered to the end of the step: every
        // output first, then every state change.
        for &m in &producers {
            if let Some(Slot {
                node: Node::Atomic(node),
                ..
            }) = self.arena.get(m.0).and_then(Option::as_ref)
            {
                for pv in &node.output {
                    self.bus.output_event(m, pv.pin, &pv.value, t_n);
                }
            }
        }
        for pv in &escapes {
            self.bus.output_event(self.root, pv.pin, &pv.value, t_n);
        }
        for &m in &transitioned {
            self.bus.state_change(m, t_n);
        }

        // Gather structure change requests from everything that moved.
        let mut changes = StructureChanges::new(self.arena.len());
        for &m in &transitioned {
            let Some(slot) = self.arena.get_mut(m.0).and_then(Option::as_mut) else {
                continue;
            };
            let parent = slot.parent.unwrap_or(self.root);
            if let Node::Atomic(node) = &mut slot.node {
                let mut ctx = StructureContext {
                    model: m,
                    parent,
                    changes: &mut changes,
                };
                node.leaf.behaviour_mut().model_transition(&mut ctx);
            }
        }

        // Reset per-step scratch.
        for &m in producers.iter().chain(receivers.iter()) {
            if let Some(node) = self.atomic_mut(m) {
                node.imminent = false;
                node.receiving = false;
                node.output.clear();
                node.input.clear();
            }
        }

        self.apply_structure_changes(changes, t_n)
    }

    fn reschedule(&mut self, m: ModelId, t_n: T) -> Result<(), SimulationError> {
        let Some(node) = self.atomic_ref(m) else {
            return Ok(());
        };
        let ta = node.leaf.behaviour().ta();
        if ta < T::zero() {
            return Err(SimulationError::TimeRegression {
                model: m,
                detail: format!("negative time advance {ta:?}"),
            });
        }
        let t_next = t_n.advance(ta);
        if t_next < t_n {
            return Err(SimulationError::TimeRegression {
                model: m,
                detail: format!("next event at {t_next:?} precedes {t_n:?}"),
            });
        }
        self.schedule.schedule(m, t_next);
        Ok(())
    }

    /// Clears the bags of the previous receiver set, routes the outputs
    /// of `producers` plus the injected values, and returns the new
    /// receiver set together with the values escaping the root.
    fn route_outputs(
        &mut self,
        producers: &[ModelId],
        injected: &Bag<V>,
        prev_receivers: &[ModelId],
    ) -> (Vec<ModelId>, Vec<PinValue<V>>) {
        for &m in prev_receivers {
            if let Some(node) = self.atomic_mut(m) {
                node.input.clear();
                node.receiving = false;
            }
        }
        let mut deliveries = Vec::new();
        let mut escapes = Vec::new();
        {
            let arena = &self.arena;
            for &m in producers {
                let Some(slot) = arena.get(m.0).and_then(Option::as_ref) else {
                    continue;
                };
                let (Some(parent), Node::Atomic(node)) = (slot.parent, &slot.node) else {
                    continue;
                };
                for pv in &node.output {
                    let mut visited = FxHashSet::default();
                    route_value(
                        arena,
                        parent,
                        pv.pin,
                        &pv.value,
                        &mut visited,
                        &mut deliveries,
                        &mut escapes,
                    );
                }
            }
            for pv in injected {
                let mut visited = FxHashSet::default();
                route_value(
                    arena,
                    self.root,
                    pv.pin,
                    &pv.value,
                    &mut visited,
                    &mut deliveries,
                    &mut escapes,
                );
            }
        }
        let mut receivers = Vec::new();
        for (m, pv) in deliveries {
            if let Some(node) = self.atomic_mut(m) {
                if !node.receiving {
                    node.receiving = true;
                    receivers.push(m);
                }
                node.input.push(pv);
            }
        }
        (receivers, escapes)
    }

    fn mealy_recompute(&mut self, m: ModelId, t_n: T) -> Bag<V> {
        let mut fresh = Bag::new();
        if let Some(node) = self.atomic_mut(m) {
            let AtomicNode {
                leaf,
                input,
                imminent,
                t_last,
                ..
            } = node;
            if let Some(mealy) = leaf.mealy_mut() {
                if *imminent {
                    mealy.confluent_output(input, &mut fresh);
                } else {
                    mealy.external_output(t_n - *t_last, input, &mut fresh);
                }
            }
        }
        fresh
    }

    // ------------------------------------------------------------------
    // structure changes
    // ------------------------------------------------------------------

    fn apply_structure_changes(
        &mut self,
        changes: StructureChanges<V, T>,
        t_n: T,
    ) -> Result<(), SimulationError> {
        if changes.is_empty() {
            return Ok(());
        }
        trace!(
            "applying structure changes: {} adds, {} removes, {} connects",
            changes.adds.len(),
            changes.removes.len(),
            changes.connects.len()
        );
        let first_new = self.arena.len();

        for add in changes.adds {
            // Parents added earlier in the same batch are live by now.
            if !self.is_live_coupled(add.parent) {
                return Err(SimulationError::Structure(format!(
                    "{} is not a coupled model in the simulation",
                    add.parent
                )));
            }
            let actual = match add.node {
                PendingNode::Atomic(b) => self.push_leaf(add.parent, Leaf::Atomic(b)),
                PendingNode::Mealy(b) => self.push_leaf(add.parent, Leaf::Mealy(b)),
                PendingNode::Coupled(c) => self.flatten(Some(add.parent), c),
            };
            if actual != add.id {
                return Err(SimulationError::Structure(format!(
                    "reserved id {} resolved to {actual}",
                    add.id
                )));
            }
            self.attach_child(add.parent, actual);
        }
        self.schedule_new_atomics(first_new, t_n)?;

        for (cid, pin, route) in changes.connects {
            let link = match route {
                Route::Pin(p) => RouteLink::Pin(p),
                Route::Model(mid) => {
                    let is_child = self
                        .coupled_ref(cid)
                        .map_or(false, |c| c.children.contains(&mid));
                    if !is_child {
                        return Err(SimulationError::Structure(format!(
                            "{mid} is not a direct child of {cid}"
                        )));
                    }
                    RouteLink::Model(mid)
                }
            };
            let Some(coupled) = self.coupled_mut(cid) else {
                return Err(SimulationError::Structure(format!(
                    "{cid} is not a coupled model in the simulation"
                )));
            };
            coupled.table.entry(pin).or_default().push(link);
        }

        for id in changes.removes {
            if id == self.root {
                return Err(SimulationError::Structure(
                    "the root model cannot be removed".into(),
                ));
            }
            if self.arena.get(id.0).and_then(Option::as_ref).is_none() {
                if id.0 >= self.arena.len() {
                    return Err(SimulationError::Structure(format!(
                        "{id} is not part of the simulation"
                    )));
                }
                // already swept by an earlier removal in this batch
                continue;
            }
            self.remove_subtree(id);
        }
        Ok(())
    }

    fn attach_child(&mut self, parent: ModelId, child: ModelId) {
        let child_pins: Vec<Pin> = self
            .coupled_ref(child)
            .map(|c| c.input_pins.iter().copied().collect())
            .unwrap_or_default();
        if let Some(p) = self.coupled_mut(parent) {
            p.children.push(child);
            for pin in child_pins {
                p.child_inputs.insert(pin, child);
            }
        }
    }

    fn remove_subtree(&mut self, id: ModelId) {
        // Detach from the parent before sweeping.
        let parent = self
            .arena
            .get(id.0)
            .and_then(Option::as_ref)
            .and_then(|s| s.parent);
        if let Some(p) = parent {
            if let Some(coupled) = self.coupled_mut(p) {
                coupled.children.retain(|&c| c != id);
                coupled.child_inputs.retain(|_, &mut c| c != id);
                for links in coupled.table.values_mut() {
                    links.retain(|l| *l != RouteLink::Model(id));
                }
            }
        }
        let mut stack = vec![id];
        while let Some(m) = stack.pop() {
            let Some(slot) = self.arena.get_mut(m.0).and_then(Option::take) else {
                continue;
            };
            self.schedule.remove(m);
            trace!("removed {m}");
            if let Node::Coupled(c) = slot.node {
                stack.extend(c.children);
            }
        }
    }

    // ------------------------------------------------------------------
    // arena plumbing
    // ------------------------------------------------------------------

    fn flatten(&mut self, parent: Option<ModelId>, model: Coupled<V, T>) -> ModelId {
        let id = ModelId(self.arena.len());
        self.arena.push(None);
        let mut child_ids = Vec::with_capacity(model.children.len());
        for child in model.children {
            let cid = match child {
                Child::Atomic(b) => self.push_leaf(id, Leaf::Atomic(b)),
                Child::Mealy(b) => self.push_leaf(id, Leaf::Mealy(b)),
                Child::Coupled(c) => self.flatten(Some(id), c),
            };
            child_ids.push(cid);
        }
        let mut child_inputs = FxHashMap::default();
        for &cid in &child_ids {
            if let Some(c) = self.coupled_ref(cid) {
                for &pin in &c.input_pins {
                    child_inputs.insert(pin, cid);
                }
            }
        }
        let table = model
            .table
            .into_iter()
            .map(|(pin, links)| {
                let resolved = links
                    .into_iter()
                    .map(|l| match l {
                        crate::model::Link::Child(k) => RouteLink::Model(child_ids[k.0]),
                        crate::model::Link::Pin(p) => RouteLink::Pin(p),
                    })
                    .collect();
                (pin, resolved)
            })
            .collect();
        self.arena[id.0] = Some(Slot {
            parent,
            node: Node::Coupled(CoupledNode {
                children: child_ids,
                input_pins: model.input_pins.into_iter().collect(),
                output_pins: model.output_pins.into_iter().collect(),
                table,
                child_inputs,
            }),
        });
        id
    }

    fn push_leaf(&mut self, parent: ModelId, leaf: Leaf<V, T>) -> ModelId {
        let id = ModelId(self.arena.len());
        self.arena.push(Some(Slot {
            parent: Some(parent),
            node: Node::Atomic(AtomicNode {
                leaf,
                t_last: self.time,
                input: Bag::new(),
                output: Bag::new(),
                imminent: false,
                receiving: false,
            }),
        }));
        id
    }

    /// Gives every atomic appended since `first_new` its first schedule
    /// entry at `t + ta`.
    fn schedule_new_atomics(&mut self, first_new: usize, t: T) -> Result<(), SimulationError> {
        for i in first_new..self.arena.len() {
            let m = ModelId(i);
            if let Some(node) = self.atomic_mut(m) {
                node.t_last = t;
            } else {
                continue;
            }
            self.check_fault(m)?;
            self.reschedule(m, t)?;
        }
        Ok(())
    }

    fn atomic_ref(&self, m: ModelId) -> Option<&AtomicNode<V, T>> {
        match self.arena.get(m.0).and_then(Option::as_ref) {
            Some(Slot {
                node: Node::Atomic(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    fn atomic_mut(&mut self, m: ModelId) -> Option<&mut AtomicNode<V, T>> {
        match self.arena.get_mut(m.0).and_then(Option::as_mut) {
            Some(Slot {
                node: Node::Atomic(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    fn coupled_ref(&self, m: ModelId) -> Option<&CoupledNode> {
        match self.arena.get(m.0).and_then(Option::as_ref) {
            Some(Slot {
                node: Node::Coupled(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    fn coupled_mut(&mut self, m: ModelId) -> Option<&mut CoupledNode> {
        match self.arena.get_mut(m.0).and_then(Option::as_mut) {
            Some(Slot {
                node: Node::Coupled(node),
                ..
            }) => Some(node),
            _ => None,
        }
    }

    fn is_live_coupled(&self, m: ModelId) -> bool {
        self.coupled_ref(m).is_some()
    }

    fn is_mealy(&self, m: ModelId) -> bool {
        self.atomic_ref(m).map_or(false, |n| n.leaf.is_mealy())
    }

    fn is_imminent(&self, m: ModelId) -> bool {
        self.atomic_ref(m).map_or(false, |n| n.imminent)
    }

    fn check_fault(&self, m: ModelId) -> Result<(), SimulationError> {
        match self.atomic_ref(m).and_then(|n| n.leaf.behaviour().fault()) {
            Some(fault) => Err(SimulationError::ModelFault {
                model: m,
                fault: fault.to_string(),
            }),
            None => Ok(()),
        }
    }
}
