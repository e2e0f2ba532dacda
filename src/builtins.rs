//! Built-in procedure registry.
//!
//! Builtins are defined once in a static table with their declared positional
//! arity (used by the evaluator to know when to stop collecting arguments)
//! and installed into the procedure scope at interpreter construction, where
//! they are indistinguishable from user-defined procedures at call sites.
//!
//! ## Functions vs evaluator specials
//!
//! - **Functions** receive evaluated arguments and compute a value (`sum`,
//!   `first`, `emptyp`, the infix operator procedures).
//! - **Specials** additionally receive the interpreter, because they evaluate
//!   list bodies (`run`, `repeat`, `if`), touch the scope and context stacks
//!   (`make`, `local`, `stop`, `output`), drive templates, or perform I/O
//!   (`print`, `wait`).
//!
//! Variadic builtins declare a minimum arity; extra arguments reach them only
//! through the `( … )` call form.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::Error;
use crate::interpreter::{Interpreter, Procedure};
use crate::list::{List, ListBuilder, Value, format_number};
use crate::scope::Scope;

/// Pure builtin: evaluated arguments in, value out.
pub type PureFn = fn(&[Value]) -> Result<Value, Error>;

/// Evaluator builtin: needs interpreter access; may be a command (`None`)
/// or produce a value.
pub type SpecialFn = fn(&mut Interpreter, &[Value]) -> Result<Option<Value>, Error>;

/// Implementation of a builtin procedure.
#[derive(Clone, Copy)]
pub enum ProcKind {
    Function(PureFn),
    Special(SpecialFn),
}

/// One entry of the builtin registry.
pub struct BuiltinProc {
    pub name: &'static str,
    /// Declared positional arity; the evaluator collects exactly this many
    /// arguments outside the `( … )` form.
    pub arity: usize,
    /// Whether the `( … )` form may supply extra arguments.
    pub variadic: bool,
    pub kind: ProcKind,
}

//
// Argument coercions. Arithmetic follows the dialect's coercion rule:
// numeric words count as numbers; words and numbers interchange as words.
//

pub(crate) fn number_arg(value: &Value, what: &str) -> Result<f64, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Word(w) => w
            .parse()
            .map_err(|_| Error::Type(format!("{what} must be a number"))),
        _ => Err(Error::Type(format!("{what} must be a number"))),
    }
}

pub(crate) fn word_arg(value: &Value, what: &str) -> Result<String, Error> {
    match value {
        Value::Word(w) => Ok(w.clone()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_owned()),
        Value::List(_) => Err(Error::Type(format!("{what} must be a word"))),
    }
}

pub(crate) fn list_arg(value: &Value, what: &str) -> Result<List, Error> {
    match value {
        Value::List(l) => Ok(l.clone()),
        _ => Err(Error::Type(format!("{what} must be a list"))),
    }
}

/// Truthiness: booleans, or the words `true`/`false` (any case).
pub(crate) fn bool_arg(value: &Value, what: &str) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Word(w) if w.eq_ignore_ascii_case("true") => Ok(true),
        Value::Word(w) if w.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::Type(format!("{what} must be true or false"))),
    }
}

/// Variable and procedure names are case-insensitive: normalize to lowercase.
pub(crate) fn name_arg(value: &Value, what: &str) -> Result<String, Error> {
    Ok(word_arg(value, what)?.to_lowercase())
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::Word(w) => w.parse::<f64>().is_ok(),
        _ => false,
    }
}

/// One element sequence per iteration source: list items, or the characters
/// of a word.
fn source_items(value: &Value, what: &str) -> Result<Vec<Value>, Error> {
    match value {
        Value::List(l) => Ok(l.iter().collect()),
        other => Ok(word_arg(other, what)?
            .chars()
            .map(|c| Value::Word(c.to_string()))
            .collect()),
    }
}

//
// Booleans and logic
//

fn builtin_true(_: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(true))
}

fn builtin_false(_: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(false))
}

fn builtin_and(args: &[Value]) -> Result<Value, Error> {
    for v in args {
        if !bool_arg(v, "and input")? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn builtin_or(args: &[Value]) -> Result<Value, Error> {
    for v in args {
        if bool_arg(v, "or input")? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("not takes one input".into()));
    };
    Ok(Value::Bool(!bool_arg(v, "not input")?))
}

//
// Words and lists
//

fn builtin_word(args: &[Value]) -> Result<Value, Error> {
    let mut out = String::new();
    for v in args {
        out.push_str(&word_arg(v, "word input")?);
    }
    Ok(Value::Word(out))
}

fn builtin_se(args: &[Value]) -> Result<Value, Error> {
    let mut builder = ListBuilder::new();
    for v in args {
        match v {
            Value::List(l) => builder.concat(l.iter()),
            other => {
                builder.push(other.clone());
            }
        }
    }
    Ok(Value::List(builder.list()))
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.iter().cloned().collect()))
}

fn builtin_fput(args: &[Value]) -> Result<Value, Error> {
    let [thing, target] = args else {
        return Err(Error::Type("fput takes two inputs".into()));
    };
    let list = list_arg(target, "list")?;
    Ok(Value::List(List::cons(thing.clone(), list)))
}

fn builtin_lput(args: &[Value]) -> Result<Value, Error> {
    let [thing, target] = args else {
        return Err(Error::Type("lput takes two inputs".into()));
    };
    let list = list_arg(target, "list")?;
    let mut builder = ListBuilder::new();
    builder.concat(list.iter());
    builder.push(thing.clone());
    Ok(Value::List(builder.list()))
}

fn builtin_combine(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("combine takes two inputs".into()));
    };
    match b {
        Value::List(_) => builtin_fput(args),
        _ => {
            let mut out = word_arg(a, "combine input")?;
            out.push_str(&word_arg(b, "combine input")?);
            Ok(Value::Word(out))
        }
    }
}

fn builtin_reverse(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("reverse takes one input".into()));
    };
    match v {
        Value::List(l) => Ok(Value::List(l.reverse())),
        other => Ok(Value::Word(
            word_arg(other, "reverse input")?.chars().rev().collect(),
        )),
    }
}

fn builtin_count(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("count takes one input".into()));
    };
    let n = match v {
        Value::List(l) => l.count(),
        other => word_arg(other, "count input")?.chars().count(),
    };
    Ok(Value::Number(n as f64))
}

fn builtin_first(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("first takes one input".into()));
    };
    match v {
        Value::List(l) => l
            .head()
            .cloned()
            .ok_or_else(|| Error::Type("first of empty list".into())),
        other => {
            let w = word_arg(other, "first input")?;
            w.chars()
                .next()
                .map(|c| Value::Word(c.to_string()))
                .ok_or_else(|| Error::Type("first of empty word".into()))
        }
    }
}

fn builtin_last(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("last takes one input".into()));
    };
    match v {
        Value::List(l) => l
            .end()
            .head()
            .cloned()
            .ok_or_else(|| Error::Type("last of empty list".into())),
        other => {
            let w = word_arg(other, "last input")?;
            w.chars()
                .next_back()
                .map(|c| Value::Word(c.to_string()))
                .ok_or_else(|| Error::Type("last of empty word".into()))
        }
    }
}

fn builtin_butfirst(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("butfirst takes one input".into()));
    };
    match v {
        Value::List(l) => {
            if l.is_empty() {
                Err(Error::Type("butfirst of empty list".into()))
            } else {
                Ok(Value::List(l.tail()))
            }
        }
        other => {
            let w = word_arg(other, "butfirst input")?;
            let mut chars = w.chars();
            if chars.next().is_none() {
                return Err(Error::Type("butfirst of empty word".into()));
            }
            Ok(Value::Word(chars.collect()))
        }
    }
}

fn builtin_butlast(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("butlast takes one input".into()));
    };
    match v {
        Value::List(l) => {
            let n = l.count();
            if n == 0 {
                return Err(Error::Type("butlast of empty list".into()));
            }
            Ok(Value::List(l.iter().take(n - 1).collect()))
        }
        other => {
            // Drop the last character.
            let w = word_arg(other, "butlast input")?;
            let mut chars = w.chars();
            if chars.next_back().is_none() {
                return Err(Error::Type("butlast of empty word".into()));
            }
            Ok(Value::Word(chars.collect()))
        }
    }
}

fn builtin_item(args: &[Value]) -> Result<Value, Error> {
    let [index, target] = args else {
        return Err(Error::Type("item takes two inputs".into()));
    };
    let i = number_arg(index, "item index")?;
    if i < 1.0 || i.fract() != 0.0 {
        return Err(Error::Type("item index out of range".into()));
    }
    let i = i as usize;
    let found = match target {
        Value::List(l) => l.iter().nth(i - 1),
        other => word_arg(other, "item input")?
            .chars()
            .nth(i - 1)
            .map(|c| Value::Word(c.to_string())),
    };
    found.ok_or_else(|| Error::Type("item index out of range".into()))
}

fn builtin_remove(args: &[Value]) -> Result<Value, Error> {
    let [thing, target] = args else {
        return Err(Error::Type("remove takes two inputs".into()));
    };
    match target {
        Value::List(l) => Ok(Value::List(l.filter(|v| v != thing))),
        other => {
            let haystack = word_arg(other, "remove input")?;
            let needle = word_arg(thing, "remove input")?;
            Ok(Value::Word(haystack.replace(&needle, "")))
        }
    }
}

//
// Arithmetic and comparison
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("+ takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "+ input")? + number_arg(b, "+ input")?,
    ))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("- takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "- input")? - number_arg(b, "- input")?,
    ))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("* takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "* input")? * number_arg(b, "* input")?,
    ))
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("/ takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "/ input")? / number_arg(b, "/ input")?,
    ))
}

fn builtin_minus(args: &[Value]) -> Result<Value, Error> {
    let [a] = args else {
        return Err(Error::Type("minus takes one input".into()));
    };
    Ok(Value::Number(-number_arg(a, "minus input")?))
}

fn builtin_sum(args: &[Value]) -> Result<Value, Error> {
    let mut total = 0.0;
    for v in args {
        total += number_arg(v, "sum input")?;
    }
    Ok(Value::Number(total))
}

fn builtin_difference(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("difference takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "difference input")? - number_arg(b, "difference input")?,
    ))
}

fn builtin_product(args: &[Value]) -> Result<Value, Error> {
    let mut total = 1.0;
    for v in args {
        total *= number_arg(v, "product input")?;
    }
    Ok(Value::Number(total))
}

fn builtin_quotient(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("quotient takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "quotient input")? / number_arg(b, "quotient input")?,
    ))
}

fn builtin_remainder(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("remainder takes two inputs".into()));
    };
    Ok(Value::Number(
        number_arg(a, "remainder input")? % number_arg(b, "remainder input")?,
    ))
}

fn builtin_less(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("< takes two inputs".into()));
    };
    Ok(Value::Bool(
        number_arg(a, "< input")? < number_arg(b, "< input")?,
    ))
}

fn builtin_greater(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("> takes two inputs".into()));
    };
    Ok(Value::Bool(
        number_arg(a, "> input")? > number_arg(b, "> input")?,
    ))
}

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("= takes two inputs".into()));
    };
    // Numeric comparison when both sides are numeric, structural otherwise.
    if is_numeric(a) && is_numeric(b) {
        return Ok(Value::Bool(
            number_arg(a, "= input")? == number_arg(b, "= input")?,
        ));
    }
    Ok(Value::Bool(a == b))
}

//
// Predicates
//

fn builtin_emptyp(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("emptyp takes one input".into()));
    };
    let empty = match v {
        Value::List(l) => l.is_empty(),
        Value::Word(w) => w.is_empty(),
        _ => false,
    };
    Ok(Value::Bool(empty))
}

fn builtin_equalp(args: &[Value]) -> Result<Value, Error> {
    let [a, b] = args else {
        return Err(Error::Type("equalp takes two inputs".into()));
    };
    Ok(Value::Bool(a == b))
}

fn builtin_listp(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("listp takes one input".into()));
    };
    Ok(Value::Bool(v.is_list()))
}

fn builtin_memberp(args: &[Value]) -> Result<Value, Error> {
    let [thing, target] = args else {
        return Err(Error::Type("memberp takes two inputs".into()));
    };
    match target {
        Value::List(l) => Ok(Value::Bool(l.iter().any(|v| &v == thing))),
        other => {
            let haystack = word_arg(other, "memberp input")?;
            let needle = word_arg(thing, "memberp input")?;
            Ok(Value::Bool(haystack.contains(&needle)))
        }
    }
}

fn builtin_numberp(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("numberp takes one input".into()));
    };
    Ok(Value::Bool(is_numeric(v)))
}

fn builtin_wordp(args: &[Value]) -> Result<Value, Error> {
    let [v] = args else {
        return Err(Error::Type("wordp takes one input".into()));
    };
    Ok(Value::Bool(!v.is_list()))
}

//
// Output
//

fn join_args(args: &[Value], keep_brackets: bool) -> String {
    args.iter()
        .map(|v| match v {
            Value::List(l) if keep_brackets => l.stringify("[", "]"),
            Value::List(l) => l.stringify("", ""),
            atom => atom.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn special_print(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let line = join_args(args, false);
    interp.emit_print(&line);
    Ok(None)
}

fn special_show(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let line = join_args(args, true);
    interp.emit_print(&line);
    Ok(None)
}

fn special_wait(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [frames] = args else {
        return Err(Error::Type("wait takes one input".into()));
    };
    let frames = number_arg(frames, "wait frames")?;
    interp.wait_frames(frames)?;
    Ok(None)
}

//
// Variables
//

fn special_thing(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [name] = args else {
        return Err(Error::Type("thing takes one input".into()));
    };
    let name = name_arg(name, "thing name")?;
    Ok(Some(interp.lookup_variable(&name)?))
}

fn special_make(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [name, value] = args else {
        return Err(Error::Type("make takes two inputs".into()));
    };
    let name = name_arg(name, "make name")?;
    interp.current_scope().set(&name, value.clone());
    Ok(None)
}

fn special_local(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let scope = interp.current_scope();
    for v in args {
        match v {
            Value::List(names) => {
                for n in names.iter() {
                    scope.declare(&name_arg(&n, "local name")?);
                }
            }
            other => {
                scope.declare(&name_arg(other, "local name")?);
            }
        }
    }
    Ok(None)
}

fn special_global(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    for v in args {
        let name = name_arg(v, "global name")?;
        interp.alias_global(&name);
    }
    Ok(None)
}

fn special_push(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [name, value] = args else {
        return Err(Error::Type("push takes two inputs".into()));
    };
    let name = name_arg(name, "push name")?;
    let current = interp.lookup_variable(&name)?;
    let list = list_arg(&current, "push variable")?;
    interp
        .current_scope()
        .set(&name, Value::List(List::cons(value.clone(), list)));
    Ok(None)
}

//
// Control
//

fn special_stop(interp: &mut Interpreter, _args: &[Value]) -> Result<Option<Value>, Error> {
    interp.procedure_context("stop")?.request_stop();
    Ok(None)
}

fn special_output(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [value] = args else {
        return Err(Error::Type("output takes one input".into()));
    };
    let context = interp.procedure_context("output")?;
    context.set_output(value.clone());
    context.request_stop();
    Ok(None)
}

fn special_run(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [body] = args else {
        return Err(Error::Type("run takes one input".into()));
    };
    let body = list_arg(body, "run body")?;
    interp.evaluate(&body)
}

fn special_runresult(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [body] = args else {
        return Err(Error::Type("runresult takes one input".into()));
    };
    let body = list_arg(body, "runresult body")?;
    let result = match interp.evaluate(&body)? {
        Some(v) => List::cons(v, List::empty()),
        None => List::empty(),
    };
    Ok(Some(Value::List(result)))
}

fn special_repeat(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [count, body] = args else {
        return Err(Error::Type("repeat takes two inputs".into()));
    };
    let count = number_arg(count, "repeat count")?;
    let body = list_arg(body, "repeat body")?;
    let count = if count > 0.0 { count as usize } else { 0 };
    for _ in 0..count {
        interp.check_break()?;
        interp.evaluate(&body)?;
        if interp.current_context().is_stopped() {
            break;
        }
    }
    Ok(None)
}

fn special_forever(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [body] = args else {
        return Err(Error::Type("forever takes one input".into()));
    };
    let body = list_arg(body, "forever body")?;
    loop {
        interp.check_break()?;
        interp.evaluate(&body)?;
        if interp.current_context().is_stopped() {
            return Ok(None);
        }
    }
}

fn special_if(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [cond, body] = args else {
        return Err(Error::Type("if takes two inputs".into()));
    };
    let body = list_arg(body, "if body")?;
    if bool_arg(cond, "if condition")? {
        return interp.evaluate(&body);
    }
    Ok(None)
}

fn special_ifelse(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [cond, then_body, else_body] = args else {
        return Err(Error::Type("ifelse takes three inputs".into()));
    };
    let then_body = list_arg(then_body, "ifelse body")?;
    let else_body = list_arg(else_body, "ifelse body")?;
    if bool_arg(cond, "ifelse condition")? {
        interp.evaluate(&then_body)
    } else {
        interp.evaluate(&else_body)
    }
}

//
// Templates
//

fn special_apply(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [template, inputs] = args else {
        return Err(Error::Type("apply takes two inputs".into()));
    };
    let inputs = list_arg(inputs, "apply inputs")?;
    interp.run_template(template, inputs.iter().collect())
}

fn special_invoke(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [template, inputs @ ..] = args else {
        return Err(Error::Type("invoke takes a template".into()));
    };
    interp.run_template(template, inputs.to_vec())
}

/// Advance the primary source and any additional sources in lock-step,
/// terminating when any source is exhausted.
fn lock_step(sources: &[Vec<Value>]) -> usize {
    sources.iter().map(Vec::len).min().unwrap_or(0)
}

fn special_foreach(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [sources @ .., template] = args else {
        return Err(Error::Type("foreach takes a data input and a template".into()));
    };
    if sources.is_empty() {
        return Err(Error::Type("foreach takes a data input and a template".into()));
    }
    let rows: Vec<Vec<Value>> = sources
        .iter()
        .map(|s| source_items(s, "foreach data"))
        .collect::<Result<_, _>>()?;
    for i in 0..lock_step(&rows) {
        let inputs: Vec<Value> = rows.iter().map(|r| r[i].clone()).collect();
        interp.run_template(template, inputs)?;
        if interp.current_context().is_stopped() {
            break;
        }
    }
    Ok(None)
}

fn special_map(interp: &mut Interpreter, args: &[Value]) -> Result<Option<Value>, Error> {
    let [template, sources @ ..] = args else {
        return Err(Error::Type("map takes a template and a data input".into()));
    };
    if sources.is_empty() {
        return Err(Error::Type("map takes a template and a data input".into()));
    }
    let rows: Vec<Vec<Value>> = sources
        .iter()
        .map(|s| source_items(s, "map data"))
        .collect::<Result<_, _>>()?;
    let mut builder = ListBuilder::new();
    for i in 0..lock_step(&rows) {
        let inputs: Vec<Value> = rows.iter().map(|r| r[i].clone()).collect();
        match interp.run_template(template, inputs)? {
            Some(v) => {
                builder.push(v);
            }
            None => {
                return Err(Error::Eval("map template must output a value".into()));
            }
        }
    }
    Ok(Some(Value::List(builder.list())))
}

/// Global registry of builtin procedures. Kept as one contiguous table for
/// ease of auditing; name lookups go through a lazily built map.
pub(crate) static BUILTIN_PROCS: &[BuiltinProc] = &[
    // Booleans and logic
    BuiltinProc { name: "true", arity: 0, variadic: false, kind: ProcKind::Function(builtin_true) },
    BuiltinProc { name: "false", arity: 0, variadic: false, kind: ProcKind::Function(builtin_false) },
    BuiltinProc { name: "and", arity: 2, variadic: true, kind: ProcKind::Function(builtin_and) },
    BuiltinProc { name: "or", arity: 2, variadic: true, kind: ProcKind::Function(builtin_or) },
    BuiltinProc { name: "not", arity: 1, variadic: false, kind: ProcKind::Function(builtin_not) },
    // Words and lists
    BuiltinProc { name: "word", arity: 2, variadic: true, kind: ProcKind::Function(builtin_word) },
    BuiltinProc { name: "se", arity: 2, variadic: true, kind: ProcKind::Function(builtin_se) },
    BuiltinProc { name: "list", arity: 2, variadic: true, kind: ProcKind::Function(builtin_list) },
    BuiltinProc { name: "fput", arity: 2, variadic: false, kind: ProcKind::Function(builtin_fput) },
    BuiltinProc { name: "lput", arity: 2, variadic: false, kind: ProcKind::Function(builtin_lput) },
    BuiltinProc { name: "combine", arity: 2, variadic: false, kind: ProcKind::Function(builtin_combine) },
    BuiltinProc { name: "reverse", arity: 1, variadic: false, kind: ProcKind::Function(builtin_reverse) },
    BuiltinProc { name: "count", arity: 1, variadic: false, kind: ProcKind::Function(builtin_count) },
    BuiltinProc { name: "first", arity: 1, variadic: false, kind: ProcKind::Function(builtin_first) },
    BuiltinProc { name: "last", arity: 1, variadic: false, kind: ProcKind::Function(builtin_last) },
    BuiltinProc { name: "butfirst", arity: 1, variadic: false, kind: ProcKind::Function(builtin_butfirst) },
    BuiltinProc { name: "bf", arity: 1, variadic: false, kind: ProcKind::Function(builtin_butfirst) },
    BuiltinProc { name: "butlast", arity: 1, variadic: false, kind: ProcKind::Function(builtin_butlast) },
    BuiltinProc { name: "bl", arity: 1, variadic: false, kind: ProcKind::Function(builtin_butlast) },
    BuiltinProc { name: "item", arity: 2, variadic: false, kind: ProcKind::Function(builtin_item) },
    BuiltinProc { name: "remove", arity: 2, variadic: false, kind: ProcKind::Function(builtin_remove) },
    // Output
    BuiltinProc { name: "print", arity: 1, variadic: true, kind: ProcKind::Special(special_print) },
    BuiltinProc { name: "show", arity: 1, variadic: true, kind: ProcKind::Special(special_show) },
    BuiltinProc { name: "wait", arity: 1, variadic: false, kind: ProcKind::Special(special_wait) },
    // Variables
    BuiltinProc { name: "thing", arity: 1, variadic: false, kind: ProcKind::Special(special_thing) },
    BuiltinProc { name: "make", arity: 2, variadic: false, kind: ProcKind::Special(special_make) },
    BuiltinProc { name: "local", arity: 1, variadic: true, kind: ProcKind::Special(special_local) },
    BuiltinProc { name: "global", arity: 1, variadic: true, kind: ProcKind::Special(special_global) },
    BuiltinProc { name: "push", arity: 2, variadic: false, kind: ProcKind::Special(special_push) },
    // Arithmetic
    BuiltinProc { name: "+", arity: 2, variadic: false, kind: ProcKind::Function(builtin_add) },
    BuiltinProc { name: "-", arity: 2, variadic: false, kind: ProcKind::Function(builtin_sub) },
    BuiltinProc { name: "*", arity: 2, variadic: false, kind: ProcKind::Function(builtin_mul) },
    BuiltinProc { name: "/", arity: 2, variadic: false, kind: ProcKind::Function(builtin_div) },
    BuiltinProc { name: "minus", arity: 1, variadic: false, kind: ProcKind::Function(builtin_minus) },
    BuiltinProc { name: "sum", arity: 2, variadic: true, kind: ProcKind::Function(builtin_sum) },
    BuiltinProc { name: "difference", arity: 2, variadic: false, kind: ProcKind::Function(builtin_difference) },
    BuiltinProc { name: "product", arity: 2, variadic: true, kind: ProcKind::Function(builtin_product) },
    BuiltinProc { name: "quotient", arity: 2, variadic: false, kind: ProcKind::Function(builtin_quotient) },
    BuiltinProc { name: "remainder", arity: 2, variadic: false, kind: ProcKind::Function(builtin_remainder) },
    BuiltinProc { name: "<", arity: 2, variadic: false, kind: ProcKind::Function(builtin_less) },
    BuiltinProc { name: ">", arity: 2, variadic: false, kind: ProcKind::Function(builtin_greater) },
    BuiltinProc { name: "=", arity: 2, variadic: false, kind: ProcKind::Function(builtin_equal) },
    // Predicates
    BuiltinProc { name: "emptyp", arity: 1, variadic: false, kind: ProcKind::Function(builtin_emptyp) },
    BuiltinProc { name: "equalp", arity: 2, variadic: false, kind: ProcKind::Function(builtin_equalp) },
    BuiltinProc { name: "listp", arity: 1, variadic: false, kind: ProcKind::Function(builtin_listp) },
    BuiltinProc { name: "memberp", arity: 2, variadic: false, kind: ProcKind::Function(builtin_memberp) },
    BuiltinProc { name: "numberp", arity: 1, variadic: false, kind: ProcKind::Function(builtin_numberp) },
    BuiltinProc { name: "wordp", arity: 1, variadic: false, kind: ProcKind::Function(builtin_wordp) },
    // Control
    BuiltinProc { name: "stop", arity: 0, variadic: false, kind: ProcKind::Special(special_stop) },
    BuiltinProc { name: "output", arity: 1, variadic: false, kind: ProcKind::Special(special_output) },
    BuiltinProc { name: "op", arity: 1, variadic: false, kind: ProcKind::Special(special_output) },
    BuiltinProc { name: "run", arity: 1, variadic: false, kind: ProcKind::Special(special_run) },
    BuiltinProc { name: "runresult", arity: 1, variadic: false, kind: ProcKind::Special(special_runresult) },
    BuiltinProc { name: "repeat", arity: 2, variadic: false, kind: ProcKind::Special(special_repeat) },
    BuiltinProc { name: "forever", arity: 1, variadic: false, kind: ProcKind::Special(special_forever) },
    BuiltinProc { name: "if", arity: 2, variadic: false, kind: ProcKind::Special(special_if) },
    BuiltinProc { name: "ifelse", arity: 3, variadic: false, kind: ProcKind::Special(special_ifelse) },
    // Templates
    BuiltinProc { name: "apply", arity: 2, variadic: false, kind: ProcKind::Special(special_apply) },
    BuiltinProc { name: "invoke", arity: 2, variadic: true, kind: ProcKind::Special(special_invoke) },
    BuiltinProc { name: "foreach", arity: 2, variadic: true, kind: ProcKind::Special(special_foreach) },
    BuiltinProc { name: "map", arity: 2, variadic: true, kind: ProcKind::Special(special_map) },
];

static BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinProc>> =
    LazyLock::new(|| BUILTIN_PROCS.iter().map(|b| (b.name, b)).collect());

/// Find a builtin by name.
pub(crate) fn find_builtin(name: &str) -> Option<&'static BuiltinProc> {
    BY_NAME.get(name).copied()
}

/// The internal unary-negation procedure substituted for `-` in expression
/// position.
pub(crate) fn negate_proc() -> &'static BuiltinProc {
    find_builtin("minus").expect("minus builtin must be registered")
}

/// Install the whole registry into a procedure scope.
pub(crate) fn install(scope: &Scope<Procedure>) {
    scope.bind_values(
        BUILTIN_PROCS
            .iter()
            .map(|b| (b.name, Procedure::Builtin(b))),
    );
}
