use std::cell::RefCell;
use std::panic;
use std::process;
use std::rc::Rc;

use logolang::{Interpreter, Value};
use logolang::{Error, list::format_number};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let result = panic::catch_unwind(run_repl);

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");
        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        }
        process::exit(1);
    }
}

/// Pen segments recorded by the turtle, plus its current state.
#[derive(Default)]
struct Turtle {
    x: f64,
    y: f64,
    heading: f64,
    pen_up: bool,
    segments: Vec<(f64, f64, f64, f64)>,
}

impl Turtle {
    fn travel(&mut self, distance: f64) {
        let rad = self.heading.to_radians();
        let nx = self.x + distance * rad.sin();
        let ny = self.y + distance * rad.cos();
        if !self.pen_up {
            self.segments.push((self.x, self.y, nx, ny));
        }
        self.x = nx;
        self.y = ny;
    }

    /// Rasterize the recorded segments onto a small character grid.
    fn render(&self) -> String {
        const W: usize = 61;
        const H: usize = 25;
        if self.segments.is_empty() {
            return "turtle has drawn nothing yet".to_owned();
        }
        let xs = self.segments.iter().flat_map(|s| [s.0, s.2]);
        let ys = self.segments.iter().flat_map(|s| [s.1, s.3]);
        let (min_x, max_x) = bounds(xs);
        let (min_y, max_y) = bounds(ys);
        let span_x = (max_x - min_x).max(1.0);
        let span_y = (max_y - min_y).max(1.0);

        let mut grid = vec![[b' '; W]; H];
        for (x1, y1, x2, y2) in &self.segments {
            let steps = 2 * W;
            for i in 0..=steps {
                let t = i as f64 / steps as f64;
                let x = x1 + (x2 - x1) * t;
                let y = y1 + (y2 - y1) * t;
                let col = ((x - min_x) / span_x * (W - 1) as f64).round() as usize;
                let row = ((max_y - y) / span_y * (H - 1) as f64).round() as usize;
                grid[row.min(H - 1)][col.min(W - 1)] = b'*';
            }
        }
        grid.iter()
            .map(|row| String::from_utf8_lossy(row).trim_end().to_owned())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Register the turtle vocabulary the canvas embedding exposes.
fn register_turtle(interp: &mut Interpreter, turtle: &Rc<RefCell<Turtle>>) {
    fn num(args: &[Value], what: &str) -> Result<f64, Error> {
        match args.first() {
            Some(Value::Number(n)) => Ok(*n),
            Some(Value::Word(w)) if w.parse::<f64>().is_ok() => Ok(w.parse().unwrap_or(0.0)),
            _ => Err(Error::Type(format!("{what} must be a number"))),
        }
    }

    let t = turtle.clone();
    interp.register_builtin("cs", 0, move |_| {
        *t.borrow_mut() = Turtle::default();
        Ok(None)
    });
    for (name, sign) in [("forward", 1.0), ("fd", 1.0), ("back", -1.0), ("bk", -1.0)] {
        let t = turtle.clone();
        interp.register_builtin(name, 1, move |args| {
            let d = num(args, "distance")?;
            t.borrow_mut().travel(sign * d);
            Ok(None)
        });
    }
    for (name, sign) in [("right", 1.0), ("rt", 1.0), ("left", -1.0), ("lt", -1.0)] {
        let t = turtle.clone();
        interp.register_builtin(name, 1, move |args| {
            let a = num(args, "angle")?;
            let mut t = t.borrow_mut();
            t.heading = (t.heading + sign * a).rem_euclid(360.0);
            Ok(None)
        });
    }
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
        t.borrow_mut().heading = num(args, "heading")?.rem_euclid(360.0);
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
    let t = turtle.clone();
    interp.register_builtin("xcor", 0, move |_| Ok(Some(Value::Number(t.borrow().x))));
    let t = turtle.clone();
    interp.register_builtin("ycor", 0, move |_| Ok(Some(Value::Number(t.borrow().y))));
    let t = turtle.clone();
    interp.register_builtin("heading", 0, move |_| {
        Ok(Some(Value::Number(t.borrow().heading)))
    });
    let t = turtle.clone();
    interp.register_builtin("pos", 0, move |_| {
        let t = t.borrow();
        Ok(Some(Value::List(
            vec![Value::Number(t.x), Value::Number(t.y)].into_iter().collect(),
        )))
    });
    interp.register_builtin("color", 1, |_| Ok(None));
}

fn run_repl() {
    println!("Logo interpreter with a recording ASCII turtle");
    println!("Try: repeat 4 [ forward 100 right 90 ]   then :turtle");
    println!("Type :help for commands, Ctrl-C or Ctrl-D to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("could not initialize line editor");
    let mut interp = Interpreter::new();
    interp.on_print(|s| println!("{s}"));

    let turtle = Rc::new(RefCell::new(Turtle::default()));
    register_turtle(&mut interp, &turtle);

    loop {
        match rl.readline("logo> ") {
            Ok(line) => {
                let mut input = line.trim().to_owned();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&input);

                match input.as_str() {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":procs" => {
                        println!("{}", interp.defined_procedures().join(" "));
                        continue;
                    }
                    ":turtle" => {
                        println!("{}", turtle.borrow().render());
                        continue;
                    }
                    _ => {}
                }

                // A `to` definition may span lines; read until its `end`.
                while starts_definition(&input) && !has_end_token(&input) {
                    match rl.readline("...> ") {
                        Ok(more) => {
                            let _ = rl.add_history_entry(more.trim());
                            input.push('\n');
                            input.push_str(&more);
                        }
                        Err(_) => break,
                    }
                }

                if let Err(e) = interp.execute(&input) {
                    eprintln!("{e}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let t = turtle.borrow();
                if !t.segments.is_empty() {
                    println!(
                        "turtle at ({} {}) heading {}",
                        format_number(t.x),
                        format_number(t.y),
                        format_number(t.heading)
                    );
                }
                break;
            }
            Err(e) => {
                eprintln!("read error: {e}");
                break;
            }
        }
    }
}

fn starts_definition(input: &str) -> bool {
    input
        .split_whitespace()
        .next()
        .is_some_and(|t| t.eq_ignore_ascii_case("to"))
}

fn has_end_token(input: &str) -> bool {
    input
        .split_whitespace()
        .any(|t| t.eq_ignore_ascii_case("end"))
}

fn print_help() {
    println!("Logo REPL commands:");
    println!("  :help     show this message");
    println!("  :procs    list defined procedures");
    println!("  :turtle   render what the turtle has drawn");
    println!();
    println!("Logo examples:");
    println!("  print 1 + 2 * 3");
    println!("  to sq :n output :n * :n end");
    println!("  repeat 18 [ forward 200 right 10 back 200 right 10 ]");
    println!("  make \"x 5  print :x");
}
