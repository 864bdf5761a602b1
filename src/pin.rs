//!
//! Routing labels and the values that travel on them.
//!

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PIN: AtomicU64 = AtomicU64::new(0);

///
/// An opaque routing label.
///
/// Pins carry no value of their own; they name an output of an atomic
/// model or a point on the input/output surface of a coupled model, and
/// couplings are looked up by them. Every pin minted by [`Pin::new`] is
/// unique for the lifetime of the process and is never reused.
///
/// # Examples
///
/// ```
/// use devs::Pin;
///
/// let a = Pin::new();
/// let b = Pin::new();
/// assert_ne!(a, b);
/// ```
///
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin(u64);

impl Pin {
    /// Mints a fresh, globally unique pin.
    #[must_use]
    pub fn new() -> Self {
        Pin(NEXT_PIN.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for Pin {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

///
/// A value labelled with the pin it appears on.
///
/// `PinValue` is the unit of model input and output: atomic models emit
/// bags of pin-values and receive bags of pin-values, discriminating
/// between their inputs by pin.
///
#[derive(Clone, Debug, PartialEq)]
pub struct PinValue<V> {
    /// The pin the value appears on.
    pub pin: Pin,
    /// The payload.
    pub value: V,
}

impl<V> PinValue<V> {
    /// Creates a labelled value.
    pub fn new(pin: Pin, value: V) -> Self {
        Self { pin, value }
    }
}

/// A bag of labelled values, used for both model input and model output.
pub type Bag<V> = Vec<PinValue<V>>;
