use crate::model::{Atomic, MealyAtomic, Value};
use crate::pin::Pin;
use crate::simulator::SimulationError;
use crate::time::Time;
use fxhash::FxHashMap;

///
/// Handle to a direct child of one coupled model, returned by the `add_*`
/// methods and accepted as a coupling destination.
///
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ChildKey(pub(crate) usize);

///
/// Destination of a coupling edge: a direct child of the coupled model,
/// or a pin (another routing label at this level, or a pin on the
/// coupled model's own output surface).
///
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Link {
    /// Deliver on the input of a direct child.
    Child(ChildKey),
    /// Relabel to another pin.
    Pin(Pin),
}

impl From<ChildKey> for Link {
    fn from(key: ChildKey) -> Self {
        Link::Child(key)
    }
}

impl From<Pin> for Link {
    fn from(pin: Pin) -> Self {
        Link::Pin(pin)
    }
}

pub(crate) enum Child<V: Value, T: Time> {
    Atomic(Box<dyn Atomic<V, T>>),
    Mealy(Box<dyn MealyAtomic<V, T>>),
    Coupled(Coupled<V, T>),
}

///
/// A coupled DEVS model: an ordered set of child models plus the routing
/// table that wires them together.
///
/// The routing table maps source keys to destinations. A source key is a
/// pin on which a value can appear inside this model: an output pin of a
/// child, or one of this model's own input pins (external input being
/// forwarded inward). Destinations deliver to a child, relabel to
/// another pin at this level, or forward outward through one of this
/// model's own output pins.
///
/// A coupled model has no behaviour of its own; it is consumed by
/// [`Simulator::new`](crate::Simulator::new) or added to a running
/// simulation during a structure change.
///
/// # Examples
///
/// ```
/// use devs::{Coupled, Pin};
/// # use devs::{Atomic, Bag};
/// # struct Null(Pin);
/// # impl Atomic<i32, f64> for Null {
/// #     fn ta(&self) -> f64 { f64::INFINITY }
/// #     fn delta_int(&mut self) {}
/// #     fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {}
/// #     fn delta_conf(&mut self, _xb: &Bag<i32>) {}
/// #     fn output_func(&mut self, _yb: &mut Bag<i32>) {}
/// # }
///
/// let mut network = Coupled::<i32, f64>::new();
/// let input = network.add_input_pin();
/// let rx_pin = Pin::new();
/// let rx = network.add_atomic(Null(rx_pin));
/// network.connect(input, rx_pin).unwrap();
/// network.connect(rx_pin, rx).unwrap();
/// ```
///
pub struct Coupled<V: Value, T: Time> {
    pub(crate) children: Vec<Child<V, T>>,
    pub(crate) input_pins: Vec<Pin>,
    pub(crate) output_pins: Vec<Pin>,
    pub(crate) table: FxHashMap<Pin, Vec<Link>>,
}

impl<V: Value, T: Time> Coupled<V, T> {
    /// Creates an empty coupled model.
    #[must_use]
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            input_pins: Vec::new(),
            output_pins: Vec::new(),
            table: FxHashMap::default(),
        }
    }

    /// Admits an atomic model as a direct child.
    pub fn add_atomic<M: Atomic<V, T> + 'static>(&mut self, model: M) -> ChildKey {
        self.children.push(Child::Atomic(Box::new(model)));
        ChildKey(self.children.len() - 1)
    }

    /// Admits a Mealy atomic model as a direct child. Only models added
    /// through this method take part in output revision.
    pub fn add_mealy<M: MealyAtomic<V, T> + 'static>(&mut self, model: M) -> ChildKey {
        self.children.push(Child::Mealy(Box::new(model)));
        ChildKey(self.children.len() - 1)
    }

    /// Admits another coupled model as a direct child.
    pub fn add_coupled(&mut self, model: Coupled<V, T>) -> ChildKey {
        self.children.push(Child::Coupled(model));
        ChildKey(self.children.len() - 1)
    }

    /// Mints a fresh pin on this model's input surface. Values delivered
    /// to this model on the returned pin are forwarded inward through
    /// the routing table.
    pub fn add_input_pin(&mut self) -> Pin {
        let pin = Pin::new();
        self.input_pins.push(pin);
        pin
    }

    /// Mints a fresh pin on this model's output surface. Values routed
    /// to the returned pin propagate one level outward.
    pub fn add_output_pin(&mut self) -> Pin {
        let pin = Pin::new();
        self.output_pins.push(pin);
        pin
    }

    /// Adds a routing edge from `source` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidCoupling`] if the destination
    /// child does not exist, if the source is one of this model's own
    /// output pins, or if the destination is one of this model's own
    /// input pins.
    pub fn connect(
        &mut self,
        source: Pin,
        destination: impl Into<Link>,
    ) -> Result<(), SimulationError> {
        let destination = destination.into();
        if self.output_pins.contains(&source) {
            return Err(SimulationError::InvalidCoupling(format!(
                "{source} is an output pin of the coupled model itself and cannot be a source key"
            )));
        }
        match destination {
            Link::Child(key) if key.0 >= self.children.len() => {
                return Err(SimulationError::InvalidCoupling(format!(
                    "destination child {} is not a child of the coupled model",
                    key.0
                )));
            }
            Link::Pin(pin) if self.input_pins.contains(&pin) => {
                return Err(SimulationError::InvalidCoupling(format!(
                    "{pin} is an input pin of the coupled model itself and cannot be a destination"
                )));
            }
            _ => {}
        }
        self.table.entry(source).or_default().push(destination);
        Ok(())
    }

    /// Number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether this model has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of models in this subtree, this model included.
    pub(crate) fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| match c {
                Child::Coupled(inner) => inner.subtree_size(),
                _ => 1,
            })
            .sum::<usize>()
    }
}

impl<V: Value, T: Time> Default for Coupled<V, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::Bag;

    struct Passive;

    impl Atomic<i32, f64> for Passive {
        fn ta(&self) -> f64 {
            f64::INFINITY
        }
        fn delta_int(&mut self) {}
        fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {}
        fn delta_conf(&mut self, _xb: &Bag<i32>) {}
        fn output_func(&mut self, _yb: &mut Bag<i32>) {}
    }

    #[test]
    fn connect_rejects_unknown_child() {
        let mut a = Coupled::<i32, f64>::new();
        let mut b = Coupled::<i32, f64>::new();
        let key = b.add_atomic(Passive);
        let pin = Pin::new();
        let err = a.connect(pin, key).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidCoupling(_)));
    }

    #[test]
    fn connect_rejects_own_output_as_source() {
        let mut network = Coupled::<i32, f64>::new();
        let out = network.add_output_pin();
        let err = network.connect(out, Pin::new()).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidCoupling(_)));
    }

    #[test]
    fn connect_rejects_own_input_as_destination() {
        let mut network = Coupled::<i32, f64>::new();
        let input = network.add_input_pin();
        let err = network.connect(Pin::new(), input).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidCoupling(_)));
    }

    #[test]
    fn connect_accepts_fan_out_and_duplicates() {
        let mut network = Coupled::<i32, f64>::new();
        let key = network.add_atomic(Passive);
        let pin = Pin::new();
        network.connect(pin, key).unwrap();
        network.connect(pin, key).unwrap();
        network.connect(pin, Pin::new()).unwrap();
        assert_eq!(network.table[&pin].len(), 3);
    }

    #[test]
    fn subtree_size_counts_nested_models() {
        let mut inner = Coupled::<i32, f64>::new();
        inner.add_atomic(Passive);
        inner.add_atomic(Passive);
        let mut outer = Coupled::<i32, f64>::new();
        outer.add_atomic(Passive);
        outer.add_coupled(inner);
        assert_eq!(outer.subtree_size(), 5);
    }
}
