//! The recursive-descent evaluator and the host-facing interpreter facade.
//!
//! Evaluation walks the program list with mutable cursors through mutually
//! recursive handlers: sequence evaluation, single-expression parsing with
//! fixed-arity argument collection, the variadic `( … )` form, operator
//! precedence climbing, and `to … end` procedure definition. Every call site
//! funnels through [`Interpreter::perform_call`], which is the cooperative
//! suspension point: it checks the break/pause state and notifies observers
//! before any work becomes visible to the next step.

use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::builtins::{self, BuiltinProc, ProcKind};
use crate::control::{Checkpoint, ControlHandle};
use crate::list::{List, ListBuilder, Value};
use crate::parser::{self, NodeSource, SourceMap};
use crate::scope::{Context, Scope};
use crate::{Error, MAX_EVAL_DEPTH};

/// A user-defined procedure: parameter names and the saved body list.
pub struct UserProc {
    pub name: String,
    pub params: Vec<String>,
    pub body: List,
}

/// An embedder-supplied builtin registered into the procedure scope.
pub struct HostProc {
    pub name: String,
    pub arity: usize,
    func: Box<dyn Fn(&[Value]) -> Result<Option<Value>, Error>>,
}

/// Anything callable from Logo code. Builtins, host procedures and user
/// definitions are indistinguishable at call sites.
#[derive(Clone)]
pub enum Procedure {
    Builtin(&'static BuiltinProc),
    User(Rc<UserProc>),
    Host(Rc<HostProc>),
}

impl Procedure {
    /// Wrap a host callback as a procedure for `Scope::bind_values`.
    pub fn host(
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&[Value]) -> Result<Option<Value>, Error> + 'static,
    ) -> Procedure {
        Procedure::Host(Rc::new(HostProc {
            name: name.into(),
            arity,
            func: Box::new(func),
        }))
    }

    pub fn name(&self) -> &str {
        match self {
            Procedure::Builtin(b) => b.name,
            Procedure::User(u) => &u.name,
            Procedure::Host(h) => &h.name,
        }
    }

    /// Declared positional arity: how many arguments the evaluator collects
    /// outside the `( … )` form, and the minimum inside it.
    pub fn arity(&self) -> usize {
        match self {
            Procedure::Builtin(b) => b.arity,
            Procedure::User(u) => u.params.len(),
            Procedure::Host(h) => h.arity,
        }
    }
}

type PrintFn = Box<dyn FnMut(&str)>;
type CallFn = Box<dyn FnMut(&str, &[Value], &List)>;
type ValueFn = Box<dyn FnMut(&Value, &List)>;
type BreakFn = Box<dyn FnMut(&str)>;
type ContinueFn = Box<dyn FnMut()>;

#[derive(Default)]
struct Observers {
    print: Option<PrintFn>,
    call: Option<CallFn>,
    value: Option<ValueFn>,
    broke: Option<BreakFn>,
    resumed: Option<ContinueFn>,
}

/// Infix operator priorities for precedence climbing.
fn operator_priority(op: &str) -> u8 {
    match op {
        "*" | "/" => 10,
        "+" | "-" => 5,
        _ => 1,
    }
}

fn peek_operator(iter: &List) -> Option<String> {
    match iter.head() {
        Some(Value::Word(w))
            if matches!(w.as_str(), "+" | "-" | "*" | "/" | "<" | ">" | "=") =>
        {
            Some(w.clone())
        }
        _ => None,
    }
}

/// Literals are consumed in place; anything else in expression position is a
/// procedure call.
fn is_literal(value: &Value) -> bool {
    match value {
        Value::List(_) | Value::Bool(_) | Value::Number(_) => true,
        Value::Word(w) => w.starts_with('"') || w.starts_with(':'),
    }
}

fn advance(iter: &mut List) {
    *iter = iter.tail();
}

/// The interpreter: long-lived procedure and variable scopes, the scope and
/// context stacks of the running program, the source map, and the control
/// surface.
pub struct Interpreter {
    procedures: Rc<Scope<Procedure>>,
    globals: Rc<Scope<Value>>,
    scopes: Vec<Rc<Scope<Value>>>,
    contexts: Vec<Rc<Context>>,
    source_map: SourceMap,
    control: ControlHandle,
    observers: Observers,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let procedures = Rc::new(Scope::new());
        builtins::install(&procedures);
        let globals = Rc::new(Scope::new());
        Interpreter {
            procedures,
            scopes: vec![globals.clone()],
            globals,
            contexts: vec![Rc::new(Context::new())],
            source_map: SourceMap::new(),
            control: ControlHandle::new(),
            observers: Observers::default(),
            depth: 0,
        }
    }

    //
    // Host facade
    //

    /// The scope holding every callable procedure. Embedders may register
    /// additional entries with [`Scope::bind_values`] and [`Procedure::host`].
    pub fn procedure_scope(&self) -> &Rc<Scope<Procedure>> {
        &self.procedures
    }

    /// The root variable scope (implicit globals).
    pub fn global_scope(&self) -> &Rc<Scope<Value>> {
        &self.globals
    }

    /// Register one host builtin under `name` with the given declared arity.
    pub fn register_builtin(
        &mut self,
        name: &str,
        arity: usize,
        func: impl Fn(&[Value]) -> Result<Option<Value>, Error> + 'static,
    ) {
        let name = name.to_lowercase();
        let proc = Procedure::host(name.clone(), arity, func);
        self.procedures.bind_value(&name, proc);
    }

    /// Cloneable, thread-safe handle for pause/resume/interrupt.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Names of every defined procedure, builtin and user alike, sorted.
    pub fn defined_procedures(&self) -> Vec<String> {
        self.procedures.names()
    }

    /// Observer for `print`/`show` output. Without one, output goes to
    /// stdout.
    pub fn on_print(&mut self, f: impl FnMut(&str) + 'static) {
        self.observers.print = Some(Box::new(f));
    }

    /// Observer invoked before every procedure call with the procedure name,
    /// evaluated arguments, and the program node of the call.
    pub fn on_call(&mut self, f: impl FnMut(&str, &[Value], &List) + 'static) {
        self.observers.call = Some(Box::new(f));
    }

    /// Observer invoked whenever an expression produces a value.
    pub fn on_value(&mut self, f: impl FnMut(&Value, &List) + 'static) {
        self.observers.value = Some(Box::new(f));
    }

    /// Observer invoked when a requested break takes effect.
    pub fn on_break(&mut self, f: impl FnMut(&str) + 'static) {
        self.observers.broke = Some(Box::new(f));
    }

    /// Observer invoked when a paused program resumes.
    pub fn on_continue(&mut self, f: impl FnMut() + 'static) {
        self.observers.resumed = Some(Box::new(f));
    }

    /// Resolve an opaque program node back to its source span.
    pub fn source_for_node(&self, node: &List) -> Option<NodeSource> {
        self.source_map.resolve(node)
    }

    /// Parse source text into a program list without evaluating it.
    pub fn parse(&self, source: &str) -> Result<List, Error> {
        parser::parse_program(source, &self.source_map)
    }

    /// Parse and evaluate a program to completion or failure. Definitions
    /// accumulate across calls; one program runs at a time.
    pub fn execute(&mut self, source: &str) -> Result<(), Error> {
        self.control.try_begin()?;
        debug!(bytes = source.len(), "executing program");
        let result = self.execute_inner(source);
        // Unwind anything a failed program left on the stacks, then release
        // the control surface.
        self.scopes.truncate(1);
        self.contexts.truncate(1);
        self.depth = 0;
        self.control.finish();
        match &result {
            Ok(()) => debug!("program finished"),
            Err(e) => debug!(error = %e, "program failed"),
        }
        result
    }

    fn execute_inner(&mut self, source: &str) -> Result<(), Error> {
        let program = self.parse(source)?;
        if let Some(value) = self.evaluate(&program)? {
            return Err(Error::syntax(format!(
                "you don't say what to do with {value}"
            )));
        }
        Ok(())
    }

    //
    // Evaluator
    //

    /// Sequence evaluator: runs statements in order, dispatching `to`
    /// definitions, and returns the trailing expression value if the body
    /// ends in one.
    pub(crate) fn evaluate(&mut self, body: &List) -> Result<Option<Value>, Error> {
        let mut iter = body.clone();
        let mut value: Option<Value> = None;
        loop {
            // A stop request returns the context's output before anything
            // else is considered.
            let context = self.current_context();
            if context.is_stopped() {
                return Ok(context.output());
            }
            if value.is_some() && !iter.is_empty() {
                return Err(self.syntax_error_at("extra instructions after a value", &iter));
            }
            if iter.is_empty() {
                return Ok(value);
            }
            let is_to = matches!(iter.head(), Some(Value::Word(w)) if w.eq_ignore_ascii_case("to"));
            if is_to {
                self.handle_to(&mut iter)?;
                continue;
            }
            value = self.handle_arg(&mut iter, 0)?;
        }
    }

    /// Parse one expression: variadic form, literal, or fixed-arity call,
    /// followed by any infix operator tail.
    fn handle_arg(&mut self, iter: &mut List, prio: u8) -> Result<Option<Value>, Error> {
        let head = match iter.head() {
            Some(h) => h.clone(),
            None => return Err(Error::syntax("expected an expression")),
        };
        let value = match &head {
            Value::Word(w) if w == "(" => self.handle_variadic(iter)?,
            Value::Word(w) if w == ")" => {
                return Err(self.syntax_error_at("unexpected )", iter));
            }
            v if is_literal(v) => self.handle_literal(iter)?,
            _ => self.handle_fixed(iter)?,
        };
        self.handle_operator(value, prio, iter)
    }

    /// Consume a literal: lists, booleans and numbers as-is, quoted words
    /// stripped of the quote, variable references resolved in the current
    /// scope.
    fn handle_literal(&mut self, iter: &mut List) -> Result<Option<Value>, Error> {
        let node = iter.clone();
        let Some(head) = iter.head().cloned() else {
            return Err(Error::syntax("expected an expression"));
        };
        advance(iter);
        let value = match head {
            Value::List(_) | Value::Bool(_) | Value::Number(_) => head,
            Value::Word(w) => {
                if let Some(stripped) = w.strip_prefix('"') {
                    Value::Word(stripped.to_owned())
                } else if let Some(name) = w.strip_prefix(':') {
                    self.lookup_variable(&name.to_lowercase())?
                } else {
                    return Err(
                        self.syntax_error_at(format!("unexpected token {w}"), &node)
                    );
                }
            }
        };
        self.notify_value(&value, &node);
        Ok(Some(value))
    }

    /// The head is a procedure name: look it up, collect its declared number
    /// of arguments, and call it. A `-` in expression position becomes the
    /// unary negation procedure.
    fn handle_fixed(&mut self, iter: &mut List) -> Result<Option<Value>, Error> {
        let node = iter.clone();
        let Some(Value::Word(word)) = iter.head().cloned() else {
            return Err(self.syntax_error_at("expected a procedure name", iter));
        };
        advance(iter);
        let name = word.to_lowercase();
        let proc = if name == "-" {
            Procedure::Builtin(builtins::negate_proc())
        } else {
            self.lookup_procedure(&name)?
        };
        let arity = proc.arity();
        let mut args = Vec::with_capacity(arity);
        for i in 0..arity {
            if iter.is_empty() {
                return Err(Error::Arity {
                    proc: proc.name().to_owned(),
                    expected: arity,
                    got: i,
                });
            }
            match self.handle_arg(iter, 0)? {
                Some(v) => args.push(v),
                None => {
                    return Err(self.syntax_error_at(
                        format!(
                            "input {} to {} did not produce a value",
                            i + 1,
                            proc.name()
                        ),
                        &node,
                    ));
                }
            }
        }
        self.perform_call(&proc, args, &node)
    }

    /// The `( … )` form: an optional procedure name with arguments up to the
    /// matching `)` (at least the declared arity), or a single parenthesized
    /// expression.
    fn handle_variadic(&mut self, iter: &mut List) -> Result<Option<Value>, Error> {
        let open = iter.clone();
        advance(iter);

        let mut named: Option<Procedure> = None;
        let head_word = match iter.head() {
            Some(Value::Word(w)) => Some(w.clone()),
            _ => None,
        };
        if let Some(w) = head_word
            && w != "("
            && w != ")"
            && !w.starts_with('"')
            && !w.starts_with(':')
        {
            let name = w.to_lowercase();
            advance(iter);
            named = Some(if name == "-" {
                Procedure::Builtin(builtins::negate_proc())
            } else {
                self.lookup_procedure(&name)?
            });
        }

        match named {
            Some(proc) => {
                let mut args = Vec::new();
                loop {
                    if iter.is_empty() {
                        return Err(self.syntax_error_at("expected ) at end of input", &open));
                    }
                    let closing = matches!(iter.head(), Some(Value::Word(w)) if w == ")");
                    if closing {
                        advance(iter);
                        break;
                    }
                    match self.handle_arg(iter, 0)? {
                        Some(v) => args.push(v),
                        None => {
                            return Err(self.syntax_error_at(
                                format!("input to {} did not produce a value", proc.name()),
                                &open,
                            ));
                        }
                    }
                }
                if args.len() < proc.arity() {
                    return Err(Error::Arity {
                        proc: proc.name().to_owned(),
                        expected: proc.arity(),
                        got: args.len(),
                    });
                }
                self.perform_call(&proc, args, &open)
            }
            None => {
                let value = self.handle_arg(iter, 0)?;
                if iter.is_empty() {
                    return Err(self.syntax_error_at("expected ) at end of input", &open));
                }
                let closing = matches!(iter.head(), Some(Value::Word(w)) if w == ")");
                if !closing {
                    return Err(self.syntax_error_at("expected )", iter));
                }
                advance(iter);
                Ok(value)
            }
        }
    }

    /// Operator-precedence climbing. An operator weaker than `old_prio`
    /// stays for the enclosing level; the right operand absorbs operators of
    /// equal or higher priority.
    fn handle_operator(
        &mut self,
        left: Option<Value>,
        old_prio: u8,
        iter: &mut List,
    ) -> Result<Option<Value>, Error> {
        let mut value = left;
        loop {
            let Some(op) = peek_operator(iter) else {
                return Ok(value);
            };
            let p = operator_priority(&op);
            if p < old_prio {
                return Ok(value);
            }
            let node = iter.clone();
            let left = match value.take() {
                Some(v) => v,
                None => {
                    return Err(
                        self.syntax_error_at(format!("nothing to combine with {op}"), &node)
                    );
                }
            };
            advance(iter);
            let right = match self.handle_arg(iter, p)? {
                Some(v) => v,
                None => {
                    return Err(self.syntax_error_at(
                        format!("{op} needs a value on its right"),
                        &node,
                    ));
                }
            };
            let proc = self.lookup_procedure(&op)?;
            value = self.perform_call(&proc, vec![left, right], &node)?;
        }
    }

    /// `to NAME :arg … <body> end`: collect parameter names and body tokens,
    /// then install a user procedure. Body cells keep their source spans.
    fn handle_to(&mut self, iter: &mut List) -> Result<(), Error> {
        let to_node = iter.clone();
        advance(iter);

        let name = match iter.head() {
            Some(Value::Word(w)) if !w.starts_with('"') && !w.starts_with(':') => {
                w.to_lowercase()
            }
            _ => return Err(self.syntax_error_at("to needs a procedure name", &to_node)),
        };
        advance(iter);

        let mut params = Vec::new();
        loop {
            let param = match iter.head() {
                Some(Value::Word(w)) => w.strip_prefix(':').map(str::to_lowercase),
                _ => None,
            };
            match param {
                Some(p) => {
                    params.push(p);
                    advance(iter);
                }
                None => break,
            }
        }

        let mut body = ListBuilder::new();
        loop {
            let Some(head) = iter.head().cloned() else {
                return Err(
                    self.syntax_error_at("end of input in procedure definition", &to_node)
                );
            };
            if matches!(&head, Value::Word(w) if w.eq_ignore_ascii_case("end")) {
                advance(iter);
                break;
            }
            let cell = body.push(head);
            self.source_map.copy(iter, &cell);
            advance(iter);
        }

        debug!(name = %name, inputs = params.len(), "defined procedure");
        self.procedures.bind_value(
            &name,
            Procedure::User(Rc::new(UserProc {
                name: name.clone(),
                params,
                body: body.list(),
            })),
        );
        Ok(())
    }

    /// The suspension point wrapping every call: break/pause checkpoint,
    /// depth guard, observers, then dispatch on the procedure kind.
    pub(crate) fn perform_call(
        &mut self,
        proc: &Procedure,
        args: Vec<Value>,
        node: &List,
    ) -> Result<Option<Value>, Error> {
        self.check_break()?;
        if self.depth >= MAX_EVAL_DEPTH {
            return Err(Error::Eval(format!(
                "evaluation depth limit exceeded (max {MAX_EVAL_DEPTH})"
            )));
        }
        if let Some(cb) = self.observers.call.as_mut() {
            cb(proc.name(), &args, node);
        }

        self.depth += 1;
        let result = match proc {
            Procedure::Builtin(b) => match &b.kind {
                ProcKind::Function(f) => f(&args).map(Some),
                ProcKind::Special(f) => f(self, &args),
            },
            Procedure::Host(h) => (h.func)(&args),
            Procedure::User(u) => self.call_user(u, args),
        };
        self.depth -= 1;

        let result = result?;
        if let Some(v) = &result {
            self.notify_value(v, node);
        }
        Ok(result)
    }

    /// Invoke a user procedure: fresh variable scope and context, bind
    /// parameters positionally (excess actuals ignored, missing ones left
    /// unbound), evaluate the body, pop both on every exit path, and return
    /// the context's output.
    fn call_user(&mut self, proc: &Rc<UserProc>, args: Vec<Value>) -> Result<Option<Value>, Error> {
        let scope = Scope::with_parent(self.current_scope());
        for (i, param) in proc.params.iter().enumerate() {
            match args.get(i) {
                Some(v) => scope.bind_value(param, v.clone()),
                None => {
                    scope.declare(param);
                }
            }
        }
        self.scopes.push(Rc::new(scope));
        self.contexts.push(Rc::new(Context::new()));

        let result = self.evaluate(&proc.body);

        let context = self
            .contexts
            .pop()
            .expect("context pushed for this call above");
        self.scopes.pop();
        result.map(|_| context.output())
    }

    /// Run a template: a procedure name is called directly; a list template
    /// `[[args…] body…]` pushes only a scope (sharing the enclosing context),
    /// binds the argument names, and returns the body's value.
    pub(crate) fn run_template(
        &mut self,
        template: &Value,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Error> {
        match template {
            Value::Word(w) => {
                let name = w.to_lowercase();
                let proc = self.lookup_procedure(&name)?;
                self.perform_call(&proc, args, &List::empty())
            }
            Value::List(l) => {
                let Some(Value::List(param_list)) = l.head().cloned() else {
                    return Err(Error::Type(
                        "template must begin with an argument list".into(),
                    ));
                };
                let mut params = Vec::new();
                for v in param_list.iter() {
                    match v {
                        Value::Word(w) => {
                            params.push(w.strip_prefix(':').unwrap_or(w.as_str()).to_lowercase());
                        }
                        _ => {
                            return Err(Error::Type(
                                "template argument names must be words".into(),
                            ));
                        }
                    }
                }

                let scope = Scope::with_parent(self.current_scope());
                for (i, param) in params.iter().enumerate() {
                    match args.get(i) {
                        Some(v) => scope.bind_value(param, v.clone()),
                        None => {
                            scope.declare(param);
                        }
                    }
                }
                self.scopes.push(Rc::new(scope));
                let result = self.evaluate(&l.tail());
                self.scopes.pop();
                result
            }
            _ => Err(Error::Type(
                "template must be a procedure name or a list".into(),
            )),
        }
    }

    //
    // Shared state accessors used by builtins
    //

    pub(crate) fn current_scope(&self) -> Rc<Scope<Value>> {
        self.scopes
            .last()
            .cloned()
            .expect("scope stack is never empty")
    }

    pub(crate) fn current_context(&self) -> Rc<Context> {
        self.contexts
            .last()
            .cloned()
            .expect("context stack is never empty")
    }

    /// The current context, failing when execution is at top level where
    /// `stop` and `output` are not allowed.
    pub(crate) fn procedure_context(&self, what: &str) -> Result<Rc<Context>, Error> {
        if self.contexts.len() <= 1 {
            return Err(Error::syntax(format!(
                "{what} can only be used inside a procedure"
            )));
        }
        Ok(self.current_context())
    }

    pub(crate) fn lookup_variable(&self, name: &str) -> Result<Value, Error> {
        self.current_scope()
            .get(name)
            .ok_or_else(|| Error::UnboundVariable(name.to_owned()))
    }

    fn lookup_procedure(&self, name: &str) -> Result<Procedure, Error> {
        self.procedures
            .get(name)
            .ok_or_else(|| Error::UnboundProcedure(name.to_owned()))
    }

    /// Ensure a binding exists in the root scope and alias it in the current
    /// scope.
    pub(crate) fn alias_global(&mut self, name: &str) {
        let binding = match self.globals.get_binding(name) {
            Some(b) => b,
            None => self.globals.declare(name),
        };
        self.current_scope().bind(name, binding);
    }

    pub(crate) fn emit_print(&mut self, line: &str) {
        match self.observers.print.as_mut() {
            Some(cb) => cb(line),
            None => println!("{line}"),
        }
    }

    /// Delay `frames`/60 seconds, abandoned immediately when the host
    /// requests a break.
    pub(crate) fn wait_frames(&mut self, frames: f64) -> Result<(), Error> {
        let seconds = frames.max(0.0) / 60.0;
        let waited = self
            .control
            .wait_interruptible(Duration::from_secs_f64(seconds));
        waited.map_err(|e| self.note_break(e))
    }

    pub(crate) fn check_break(&mut self) -> Result<(), Error> {
        match self.control.checkpoint() {
            Ok(Checkpoint::Proceed) => Ok(()),
            Ok(Checkpoint::Resumed) => {
                debug!("resumed after pause");
                if let Some(cb) = self.observers.resumed.as_mut() {
                    cb();
                }
                Ok(())
            }
            Err(e) => Err(self.note_break(e)),
        }
    }

    fn note_break(&mut self, error: Error) -> Error {
        if matches!(error, Error::Interrupted) {
            debug!("break observed");
            if let Some(cb) = self.observers.broke.as_mut() {
                cb("break requested");
            }
        }
        error
    }

    fn notify_value(&mut self, value: &Value, node: &List) {
        if let Some(cb) = self.observers.value.as_mut() {
            cb(value, node);
        }
    }

    fn syntax_error_at(&self, message: impl Into<String>, node: &List) -> Error {
        match self.source_map.resolve(node) {
            Some(span) => Error::syntax_at(message, &span.source, span.start),
            None => Error::syntax(message),
        }
    }
}
