use crate::model::{ModelId, Value};
use crate::pin::{Pin, PinValue};
use crate::simulator::{Node, RouteLink, Slot};
use crate::time::Time;
use fxhash::FxHashSet;

///
/// Resolves one value appearing on `pin` inside the coupled model
/// `level` into delivery records for atomic leaves, walking the coupling
/// tables depth-first.
///
/// At each level the table of the enclosing coupled model decides:
/// delivery to a child (descending into coupled children with the label
/// unchanged), relabelling to a sibling pin at the same level, climbing
/// through the model's own output surface, or descending through the
/// registered input surface of a coupled child. Values that climb out of
/// the root are collected in `escapes`.
///
/// Routing reads the coupling graph only; it never touches model state,
/// so cyclic pure couplings terminate through the `visited` set — one
/// traversal visits each `(level, pin)` at most once, which is exactly
/// "a cycle contributes at most once per emitted value".
///
pub(crate) fn route_value<V: Value, T: Time>(
    arena: &[Option<Slot<V, T>>],
    level: ModelId,
    pin: Pin,
    value: &V,
    visited: &mut FxHashSet<(ModelId, Pin)>,
    deliveries: &mut Vec<(ModelId, PinValue<V>)>,
    escapes: &mut Vec<PinValue<V>>,
) {
    if !visited.insert((level, pin)) {
        return;
    }
    let Some(slot) = arena.get(level.0).and_then(Option::as_ref) else {
        return;
    };
    let Node::Coupled(coupled) = &slot.node else {
        return;
    };
    let Some(links) = coupled.table.get(&pin) else {
        return;
    };
    for link in links {
        match *link {
            RouteLink::Model(target) => {
                match arena.get(target.0).and_then(Option::as_ref).map(|s| &s.node) {
                    Some(Node::Atomic(_)) => {
                        deliveries.push((target, PinValue::new(pin, value.clone())));
                    }
                    Some(Node::Coupled(_)) => {
                        route_value(arena, target, pin, value, visited, deliveries, escapes);
                    }
                    None => {}
                }
            }
            RouteLink::Pin(next) => {
                if coupled.output_pins.contains(&next) {
                    match slot.parent {
                        Some(up) => {
                            route_value(arena, up, next, value, visited, deliveries, escapes);
                        }
                        None => escapes.push(PinValue::new(next, value.clone())),
                    }
                } else if let Some(&child) = coupled.child_inputs.get(&next) {
                    route_value(arena, child, next, value, visited, deliveries, escapes);
                } else {
                    route_value(arena, level, next, value, visited, deliveries, escapes);
                }
            }
        }
    }
}
