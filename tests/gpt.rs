//! Generator/queue scenarios: exact event times, listener ordering,
//! confluent handling, injection and determinism.

use devs::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

/// Emits `count + 1` on `out` every `period` units.
struct Generator {
    period: f64,
    count: i32,
    out: Pin,
}

impl Generator {
    fn new(period: f64, out: Pin) -> Self {
        Self {
            period,
            count: 0,
            out,
        }
    }
}

impl Atomic<i32, f64> for Generator {
    fn ta(&self) -> f64 {
        self.period
    }

    fn delta_int(&mut self) {
        self.count += 1;
    }

    fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {}

    fn delta_conf(&mut self, xb: &Bag<i32>) {
        self.delta_int();
        self.delta_ext(0.0, xb);
    }

    fn output_func(&mut self, yb: &mut Bag<i32>) {
        yb.push(PinValue::new(self.out, self.count + 1));
    }
}

/// A single-place queue with a fixed service time. Customers arriving
/// while the place is occupied are turned away.
struct Queue {
    service_time: f64,
    input: Pin,
    out: Pin,
    serving: Option<i32>,
    sigma: f64,
    departed: Rc<Cell<i32>>,
}

impl Queue {
    fn new(service_time: f64, input: Pin, out: Pin, departed: Rc<Cell<i32>>) -> Self {
        Self {
            service_time,
            input,
            out,
            serving: None,
            sigma: f64::INFINITY,
            departed,
        }
    }
}

impl Atomic<i32, f64> for Queue {
    fn ta(&self) -> f64 {
        self.sigma
    }

    fn delta_int(&mut self) {
        self.serving = None;
        self.sigma = f64::INFINITY;
        self.departed.set(self.departed.get() + 1);
    }

    fn delta_ext(&mut self, e: f64, xb: &Bag<i32>) {
        match self.serving {
            Some(_) => self.sigma -= e,
            None => {
                if let Some(pv) = xb.iter().find(|pv| pv.pin == self.input) {
                    self.serving = Some(pv.value);
                    self.sigma = self.service_time;
                }
            }
        }
    }

    fn delta_conf(&mut self, xb: &Bag<i32>) {
        self.delta_int();
        self.delta_ext(0.0, xb);
    }

    fn output_func(&mut self, yb: &mut Bag<i32>) {
        if let Some(customer) = self.serving {
            yb.push(PinValue::new(self.out, customer));
        }
    }
}

/// A passive model that must never be touched: its transitions panic.
struct Untouchable;

impl Atomic<i32, f64> for Untouchable {
    fn ta(&self) -> f64 {
        f64::INFINITY
    }
    fn delta_int(&mut self) {
        unreachable!("a passive model without couplings never transitions");
    }
    fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {
        unreachable!("nothing routes to this model");
    }
    fn delta_conf(&mut self, _xb: &Bag<i32>) {
        unreachable!();
    }
    fn output_func(&mut self, _yb: &mut Bag<i32>) {
        unreachable!();
    }
}

#[derive(Default)]
struct Recorder {
    outputs: Vec<(ModelId, Pin, i32, f64)>,
    states: Vec<(ModelId, f64)>,
}

impl EventListener<i32, f64> for Recorder {
    fn output_event(&mut self, model: ModelId, pin: Pin, value: &i32, t: f64) {
        self.outputs.push((model, pin, *value, t));
    }

    fn state_change(&mut self, model: ModelId, t: f64) {
        self.states.push((model, t));
    }
}

fn gq_network(departed: Rc<Cell<i32>>) -> (Coupled<i32, f64>, Pin, Pin) {
    let gen_out = Pin::new();
    let queue_in = Pin::new();
    let queue_out = Pin::new();
    let mut root = Coupled::new();
    root.add_atomic(Generator::new(10.0, gen_out));
    let queue = root.add_atomic(Queue::new(1.0, queue_in, queue_out, departed));
    root.add_atomic(Untouchable);
    root.connect(gen_out, queue_in).unwrap();
    root.connect(queue_in, queue).unwrap();
    (root, gen_out, queue_out)
}

#[test]
fn generator_queue_timeline() {
    let departed = Rc::new(Cell::new(0));
    let (root, gen_out, queue_out) = gq_network(departed.clone());
    let mut sim = Simulator::new(root).unwrap();
    let recorder = shared(Recorder::default());
    sim.add_event_listener(recorder.clone());

    sim.exec_until(100.0).unwrap();
    assert_eq!(sim.current_time(), 100.0);

    let rec = recorder.borrow();
    let arrivals: Vec<(i32, f64)> = rec
        .outputs
        .iter()
        .filter(|(_, pin, _, _)| *pin == gen_out)
        .map(|(_, _, v, t)| (*v, *t))
        .collect();
    let departures: Vec<(i32, f64)> = rec
        .outputs
        .iter()
        .filter(|(_, pin, _, _)| *pin == queue_out)
        .map(|(_, _, v, t)| (*v, *t))
        .collect();

    // Ten customers generated, at exactly 10, 20, ..., 100.
    assert_eq!(arrivals.len(), 10);
    for (i, (v, t)) in arrivals.iter().enumerate() {
        assert_eq!(*v, i as i32 + 1);
        assert_eq!(*t, 10.0 * (i as f64 + 1.0));
    }
    // Departures trail arrivals by the service time.
    assert_eq!(departures.len(), 9);
    for (i, (v, t)) in departures.iter().enumerate() {
        assert_eq!(*v, i as i32 + 1);
        assert_eq!(*t, 10.0 * (i as f64 + 1.0) + 1.0);
    }
    assert_eq!(departed.get(), 9);
    drop(rec);

    // The customer that arrived at 100 departs at 101.
    sim.exec_until(101.0).unwrap();
    assert_eq!(departed.get(), 10);
    assert_eq!(
        recorder
            .borrow()
            .outputs
            .iter()
            .filter(|(_, pin, _, _)| *pin == queue_out)
            .count(),
        10
    );
}

#[test]
fn listener_sees_outputs_before_state_changes_each_step() {
    let departed = Rc::new(Cell::new(0));
    let (root, gen_out, _) = gq_network(departed);
    let mut sim = Simulator::new(root).unwrap();
    let recorder = shared(Recorder::default());
    sim.add_event_listener(recorder.clone());
    sim.exec_next_event().unwrap();
    let rec = recorder.borrow();
    assert_eq!(rec.outputs.len(), 1);
    assert_eq!(rec.outputs[0].1, gen_out);
    assert_eq!(rec.outputs[0].3, 10.0);
    // Generator fired internally, the queue took the arrival.
    assert_eq!(rec.states.len(), 2);
    assert!(rec.states.iter().all(|(_, t)| *t == 10.0));
}

#[test]
fn removed_listeners_hear_nothing_further() {
    let departed = Rc::new(Cell::new(0));
    let (root, _, _) = gq_network(departed);
    let mut sim = Simulator::new(root).unwrap();
    let keeper = shared(Recorder::default());
    let leaver = shared(Recorder::default());
    sim.add_event_listener(keeper.clone());
    let token = sim.add_event_listener(leaver.clone());

    sim.exec_next_event().unwrap();
    sim.remove_event_listener(token);
    sim.exec_next_event().unwrap();

    assert_eq!(leaver.borrow().outputs.len(), 1);
    assert!(keeper.borrow().outputs.len() > leaver.borrow().outputs.len());
}

#[test]
fn identical_runs_produce_identical_callbacks() {
    let run = || {
        let departed = Rc::new(Cell::new(0));
        let (root, _, _) = gq_network(departed);
        let mut sim = Simulator::new(root).unwrap();
        let recorder = shared(Recorder::default());
        sim.add_event_listener(recorder.clone());
        sim.exec_until(55.0).unwrap();
        let rec = recorder.borrow();
        (
            rec.outputs.iter().map(|(m, _, v, t)| (*m, *v, *t)).collect::<Vec<_>>(),
            rec.states.clone(),
        )
    };
    assert_eq!(run(), run());
}

/// Both models imminent at t = 10; the receiver is also receiving, so
/// exactly one confluent transition runs.
struct Confluent {
    input: Pin,
    conf_calls: Rc<Cell<i32>>,
    int_calls: Rc<Cell<i32>>,
    ext_calls: Rc<Cell<i32>>,
    fired: bool,
}

impl Atomic<i32, f64> for Confluent {
    fn ta(&self) -> f64 {
        if self.fired {
            f64::INFINITY
        } else {
            10.0
        }
    }
    fn delta_int(&mut self) {
        self.int_calls.set(self.int_calls.get() + 1);
        self.fired = true;
    }
    fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {
        self.ext_calls.set(self.ext_calls.get() + 1);
    }
    fn delta_conf(&mut self, xb: &Bag<i32>) {
        assert_eq!(xb.len(), 1);
        assert_eq!(xb[0].pin, self.input);
        self.conf_calls.set(self.conf_calls.get() + 1);
        self.fired = true;
    }
    fn output_func(&mut self, _yb: &mut Bag<i32>) {}
}

#[test]
fn simultaneous_internal_and_external_is_confluent() {
    let conf = Rc::new(Cell::new(0));
    let int = Rc::new(Cell::new(0));
    let ext = Rc::new(Cell::new(0));
    let gen_out = Pin::new();
    let conf_in = Pin::new();
    let mut root = Coupled::new();
    root.add_atomic(Generator::new(10.0, gen_out));
    let target = root.add_atomic(Confluent {
        input: conf_in,
        conf_calls: conf.clone(),
        int_calls: int.clone(),
        ext_calls: ext.clone(),
        fired: false,
    });
    root.connect(gen_out, conf_in).unwrap();
    root.connect(conf_in, target).unwrap();
    let mut sim = Simulator::new(root).unwrap();
    sim.exec_next_event().unwrap();
    assert_eq!(conf.get(), 1);
    assert_eq!(int.get(), 0);
    assert_eq!(ext.get(), 0);
}

#[test]
fn injection_enters_through_root_input_pins() {
    let received = Rc::new(Cell::new(0));
    let seen_elapsed = Rc::new(Cell::new(-1.0));

    struct Rx {
        input: Pin,
        received: Rc<Cell<i32>>,
        seen_elapsed: Rc<Cell<f64>>,
    }
    impl Atomic<i32, f64> for Rx {
        fn ta(&self) -> f64 {
            f64::INFINITY
        }
        fn delta_int(&mut self) {}
        fn delta_ext(&mut self, e: f64, xb: &Bag<i32>) {
            assert!(xb.iter().all(|pv| pv.pin == self.input));
            self.received.set(self.received.get() + xb.len() as i32);
            self.seen_elapsed.set(e);
        }
        fn delta_conf(&mut self, xb: &Bag<i32>) {
            self.delta_ext(0.0, xb);
        }
        fn output_func(&mut self, _yb: &mut Bag<i32>) {}
    }

    let rx_in = Pin::new();
    let mut root = Coupled::new();
    let port = root.add_input_pin();
    let rx = root.add_atomic(Rx {
        input: rx_in,
        received: received.clone(),
        seen_elapsed: seen_elapsed.clone(),
    });
    root.connect(port, rx_in).unwrap();
    root.connect(rx_in, rx).unwrap();

    let mut sim = Simulator::new(root).unwrap();
    assert!(sim.next_event_time().is_infinity());

    sim.set_next_time(5.0).unwrap();
    sim.inject_input(PinValue::new(port, 7));
    sim.inject_input(PinValue::new(port, 8));
    assert_eq!(sim.next_event_time(), 5.0);
    assert_eq!(sim.exec_next_event().unwrap(), Some(5.0));
    assert_eq!(received.get(), 2);
    assert_eq!(seen_elapsed.get(), 5.0);

    // Injection at the current instant is allowed through this path.
    sim.set_next_time(5.0).unwrap();
    sim.inject_input(PinValue::new(port, 9));
    assert_eq!(sim.exec_next_event().unwrap(), Some(5.0));
    assert_eq!(received.get(), 3);
    assert_eq!(seen_elapsed.get(), 0.0);

    // The past is off limits.
    assert!(matches!(
        sim.set_next_time(1.0),
        Err(SimulationError::TimeTravel)
    ));

    // Quiescent again afterwards.
    assert!(sim.next_event_time().is_infinity());
    assert_eq!(sim.exec_next_event().unwrap(), None);
}

/// ta = 0 forever: the engine must report the runaway instead of
/// spinning.
struct Flywheel;

impl Atomic<i32, f64> for Flywheel {
    fn ta(&self) -> f64 {
        0.0
    }
    fn delta_int(&mut self) {}
    fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {}
    fn delta_conf(&mut self, _xb: &Bag<i32>) {}
    fn output_func(&mut self, _yb: &mut Bag<i32>) {}
}

#[test]
fn zero_time_advance_runaway_is_detected() {
    let mut root = Coupled::new();
    root.add_atomic(Flywheel);
    let mut sim =
        Simulator::new_with(root, SimOptions::default().max_steps_at_instant(50)).unwrap();
    let err = sim.exec_until(1.0).unwrap_err();
    assert!(matches!(err, SimulationError::InstantOverflow { .. }));
    // The failure poisons the simulator.
    assert!(matches!(
        sim.exec_next_event(),
        Err(SimulationError::Poisoned)
    ));
}

#[test]
fn bounded_zero_time_chains_are_legal() {
    // A model that takes three zero-time steps and then waits.
    struct Burst {
        remaining: i32,
    }
    impl Atomic<i32, f64> for Burst {
        fn ta(&self) -> f64 {
            if self.remaining > 0 {
                0.0
            } else {
                5.0
            }
        }
        fn delta_int(&mut self) {
            self.remaining -= 1;
        }
        fn delta_ext(&mut self, _e: f64, _xb: &Bag<i32>) {}
        fn delta_conf(&mut self, _xb: &Bag<i32>) {}
        fn output_func(&mut self, _yb: &mut Bag<i32>) {}
    }
    let mut root = Coupled::new();
    root.add_atomic(Burst { remaining: 3 });
    let mut sim = Simulator::new(root).unwrap();
    // Three steps at t = 0, then the clock moves.
    for _ in 0..3 {
        assert_eq!(sim.exec_next_event().unwrap(), Some(0.0));
    }
    assert_eq!(sim.exec_next_event().unwrap(), Some(5.0));
}

#[test]
fn integer_clock_simulation() {
    struct Tick {
        out: Pin,
        count: i64,
    }
    impl Atomic<i64, i64> for Tick {
        fn ta(&self) -> i64 {
            3
        }
        fn delta_int(&mut self) {
            self.count += 1;
        }
        fn delta_ext(&mut self, _e: i64, _xb: &Bag<i64>) {}
        fn delta_conf(&mut self, _xb: &Bag<i64>) {}
        fn output_func(&mut self, yb: &mut Bag<i64>) {
            yb.push(PinValue::new(self.out, self.count));
        }
    }
    let mut root = Coupled::<i64, i64>::new();
    root.add_atomic(Tick {
        out: Pin::new(),
        count: 0,
    });
    let mut sim = Simulator::new(root).unwrap();
    sim.exec_until(10).unwrap();
    assert_eq!(sim.current_time(), 9);
    assert_eq!(sim.next_event_time(), 12);
}
