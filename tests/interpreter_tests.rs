//! End-to-end interpreter scenarios: whole programs driven through the
//! public facade, a recording turtle collaborator, and cross-thread
//! pause/resume/interrupt behavior.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use logolang::{Error, Interpreter, Value};

fn capture_prints(interp: &mut Interpreter) -> Rc<RefCell<Vec<String>>> {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = lines.clone();
    interp.on_print(move |s| sink.borrow_mut().push(s.to_owned()));
    lines
}

#[test]
fn test_precedence_and_associativity() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    interp.execute("print 1 + 2 * 3 - 4").unwrap();
    assert_eq!(lines.borrow().as_slice(), ["3"]);
}

/// One recorded pen-down stroke.
#[derive(Debug, Clone, Copy)]
struct Stroke {
    heading: f64,
    from: (f64, f64),
    to: (f64, f64),
}

impl Stroke {
    fn length(&self) -> f64 {
        let dx = self.to.0 - self.from.0;
        let dy = self.to.1 - self.from.1;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Default)]
struct Turtle {
    x: f64,
    y: f64,
    heading: f64,
    pen_up: bool,
    strokes: Vec<Stroke>,
}

impl Turtle {
    fn travel(&mut self, distance: f64) {
        let rad = self.heading.to_radians();
        let to = (
            self.x + distance * rad.sin(),
            self.y + distance * rad.cos(),
        );
        if !self.pen_up {
            self.strokes.push(Stroke {
                heading: self.heading,
                from: (self.x, self.y),
                to,
            });
        }
        (self.x, self.y) = to;
    }
}

fn register_turtle(interp: &mut Interpreter, turtle: &Rc<RefCell<Turtle>>) {
    fn distance(args: &[Value]) -> Result<f64, Error> {
        match args.first() {
            Some(Value::Number(n)) => Ok(*n),
            _ => Err(Error::Type("distance must be a number".into())),
        }
    }

    let t = turtle.clone();
    interp.register_builtin("cs", 0, move |_| {
        *t.borrow_mut() = Turtle::default();
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("forward", 1, move |args| {
        t.borrow_mut().travel(distance(args)?);
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("back", 1, move |args| {
        t.borrow_mut().travel(-distance(args)?);
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("right", 1, move |args| {
        let mut t = t.borrow_mut();
        t.heading = (t.heading + distance(args)?).rem_euclid(360.0);
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("left", 1, move |args| {
        let mut t = t.borrow_mut();
        t.heading = (t.heading - distance(args)?).rem_euclid(360.0);
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("up", 0, move |_| {
        t.borrow_mut().pen_up = true;
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("down", 0, move |_| {
        t.borrow_mut().pen_up = false;
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("seth", 1, move |args| {
        t.borrow_mut().heading = distance(args)?.rem_euclid(360.0);
        Ok(None)
    });
    let t = turtle.clone();
    interp.register_builtin("setpos", 1, move |args| {
        let Some(Value::List(pos)) = args.first() else {
            return Err(Error::Type("pos must be a list".into()));
        };
        let coords: Vec<Value> = pos.iter().collect();
        let [Value::Number(x), Value::Number(y)] = coords.as_slice() else {
            return Err(Error::Type("pos must hold two numbers".into()));
        };
        let mut t = t.borrow_mut();
        t.x = *x;
        t.y = *y;
        Ok(None)
    });
}

#[test]
fn test_repeat_with_turtle_effect() {
    let mut interp = Interpreter::new();
    let turtle = Rc::new(RefCell::new(Turtle::default()));
    register_turtle(&mut interp, &turtle);

    interp
        .execute(
            "cs up seth 0 setpos [0 0] up back 100 right 10 down \
             repeat 18 [ forward 200 right 10 back 200 right 10 ]",
        )
        .unwrap();

    let turtle = turtle.borrow();
    // Each loop iteration draws a forward stroke and a back stroke, all
    // pen-down and all of length 200.
    assert_eq!(turtle.strokes.len(), 36);
    for stroke in &turtle.strokes {
        assert!(
            (stroke.length() - 200.0).abs() < 1e-9,
            "stroke length {}",
            stroke.length()
        );
    }
    // The 18 forward strokes advance by 20 degrees each.
    for (i, stroke) in turtle.strokes.iter().step_by(2).enumerate() {
        let expected = (10.0 + 20.0 * i as f64).rem_euclid(360.0);
        assert!(
            (stroke.heading - expected).abs() < 1e-9,
            "forward stroke {i} heading {} expected {expected}",
            stroke.heading
        );
    }
    // Net rotation over the loop is 360 degrees: the heading is back where
    // it started (within floating-point tolerance).
    assert!(
        (turtle.heading - 10.0).abs() < 1e-9,
        "final heading {}",
        turtle.heading
    );
    // The pen finishes close to where it started drawing.
    let first = turtle.strokes.first().unwrap();
    let last = turtle.strokes.last().unwrap();
    assert!(
        (last.to.0 - first.from.0).abs() < 1e-6 && (last.to.1 - first.from.1).abs() < 1e-6
    );
}

#[test]
fn test_procedure_with_output() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    interp
        .execute("to sq :n output :n * :n end print sq 7")
        .unwrap();
    assert_eq!(lines.borrow().as_slice(), ["49"]);
    // The definition survives in the procedure scope.
    assert!(interp.defined_procedures().contains(&"sq".to_owned()));
    interp.execute("print sq 9").unwrap();
    assert_eq!(lines.borrow().as_slice(), ["49", "81"]);
}

#[test]
fn test_stop_short_circuits_repeat() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    interp
        .execute("to f repeat 10 [ print 1 stop print 2 ] end f")
        .unwrap();
    assert_eq!(lines.borrow().as_slice(), ["1"]);
}

#[test]
fn test_list_manipulation() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    interp.execute("print first butfirst [a b c]").unwrap();
    interp.execute("print count [a [b c] d]").unwrap();
    assert_eq!(lines.borrow().as_slice(), ["b", "3"]);
}

#[test]
fn test_unary_vs_binary_minus() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    interp.execute("print -3 + 4").unwrap();
    assert_eq!(lines.borrow().as_slice(), ["1"]);

    // `3 -4` lexes as two adjacent literals: print consumes the 3, and the
    // dangling -4 is a syntax error after the print has happened.
    let err = interp.execute("print 3 -4").unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }), "got {err:?}");
    assert_eq!(lines.borrow().as_slice(), ["1", "3"]);

    // With whitespace on both sides the minus is the binary operator.
    interp.execute("print 3 - 4").unwrap();
    assert_eq!(lines.borrow().as_slice(), ["1", "3", "-1"]);
}

#[test]
fn test_break_interrupts_wait() {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_in = calls.clone();
    let (handle_tx, handle_rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        let mut interp = Interpreter::new();
        let counter = calls_in;
        interp.on_call(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle_tx.send(interp.control()).expect("send handle");
        let started = Instant::now();
        // Ten seconds of wait, then a print that must never run.
        let result = interp.execute("wait 600 print 1");
        (result, started.elapsed())
    });

    let control = handle_rx.recv().expect("receive handle");
    thread::sleep(Duration::from_millis(50));
    control.interrupt();

    let (result, elapsed) = worker.join().expect("worker panicked");
    assert_eq!(result, Err(Error::Interrupted));
    assert_eq!(result.unwrap_err().to_string(), "Break requested");
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    // Only the wait call was observed; nothing fired after the break.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pause_and_resume() {
    let progress = Arc::new(AtomicUsize::new(0));
    let progress_in = progress.clone();
    let (handle_tx, handle_rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        let mut interp = Interpreter::new();
        let counter = progress_in;
        interp.on_call(move |name, _, _| {
            if name == "make" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        handle_tx.send(interp.control()).expect("send handle");
        interp.execute("make \"i 0 forever [ make \"i :i + 1 ]")
    });

    let control = handle_rx.recv().expect("receive handle");

    // Let it run, then pause and verify progress freezes.
    thread::sleep(Duration::from_millis(50));
    control.pause();
    thread::sleep(Duration::from_millis(100));
    let frozen = progress.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(progress.load(Ordering::SeqCst), frozen, "still advancing while paused");

    // Resume and verify progress continues.
    control.resume();
    thread::sleep(Duration::from_millis(100));
    assert!(progress.load(Ordering::SeqCst) > frozen, "did not resume");

    // Break ends the program.
    control.interrupt();
    assert_eq!(worker.join().expect("worker panicked"), Err(Error::Interrupted));
}

#[test]
fn test_break_while_paused_unparks() {
    let (handle_tx, handle_rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let mut interp = Interpreter::new();
        handle_tx.send(interp.control()).expect("send handle");
        interp.execute("forever [ make \"x 1 ]")
    });

    let control = handle_rx.recv().expect("receive handle");
    thread::sleep(Duration::from_millis(50));
    control.pause();
    thread::sleep(Duration::from_millis(50));
    // Breaking a paused program must wake it so the error can propagate.
    control.interrupt();
    assert_eq!(worker.join().expect("worker panicked"), Err(Error::Interrupted));
}

#[test]
fn test_running_flag_forbids_reentry() {
    let (handle_tx, handle_rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let mut interp = Interpreter::new();
        handle_tx.send(interp.control()).expect("send handle");
        interp.execute("wait 600")
    });

    let control = handle_rx.recv().expect("receive handle");
    thread::sleep(Duration::from_millis(50));
    assert!(control.is_running());
    control.interrupt();
    assert_eq!(worker.join().expect("worker panicked"), Err(Error::Interrupted));
    assert!(!control.is_running());
}

#[test]
fn test_template_iteration_program() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    interp
        .execute(
            "to double :n output :n * 2 end \
             show map \"double [1 2 3] \
             foreach [a b] [[x] print :x]",
        )
        .unwrap();
    assert_eq!(lines.borrow().as_slice(), ["[2 4 6]", "a", "b"]);
}

#[test]
fn test_state_recovers_after_error() {
    let mut interp = Interpreter::new();
    let lines = capture_prints(&mut interp);
    // A failing program must not leave the interpreter running or with
    // stale scopes.
    assert!(interp.execute("to f output 1 / 0 end print :boom").is_err());
    assert!(!interp.is_running());
    interp.execute("make \"x 2 print :x").unwrap();
    assert_eq!(lines.borrow().as_slice(), ["2"]);
}
