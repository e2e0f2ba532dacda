//! Core value model for the interpreter: the [`Value`] enum covering the
//! closed Logo tag set (number, boolean, word, list) and the singly-linked
//! [`List`] built from reference-counted cons cells.
//!
//! Lists are functionally immutable at the tail: builders construct
//! front-to-back without mutating structure already visible to Logo code.
//! The only interior mutation is the [`ListBuilder`]'s end-pointer advance.
//! A unique per-thread empty sentinel terminates every chain; its tail is
//! itself, so iteration needs no null checks beyond the emptiness test.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// A Logo value.
///
/// Words are stored with their source sigils intact (`"quoted`, `:variable`);
/// the evaluator interprets sigils, the data model does not.
#[derive(Clone)]
pub enum Value {
    /// Double-precision numbers (the only numeric type in this dialect).
    Number(f64),
    /// Booleans, produced by comparisons and the `true`/`false` builtins.
    Bool(bool),
    /// Words: atomic strings, including operator and punctuation tokens.
    Word(String),
    /// Lists of values.
    List(List),
}

impl Value {
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Word(_) => "word",
            Value::List(_) => "list",
        }
    }
}

/// Render a number the way Logo prints it: integral values lose the
/// fractional part (`49`, not `49.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Word(a), Value::Word(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Word(w) => write!(f, "{w}"),
            Value::List(l) => write!(f, "{}", l.stringify("[", "]")),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Word(w) => write!(f, "Word({w:?})"),
            Value::List(l) => write!(f, "List({})", l.stringify("[", "]")),
        }
    }
}

pub(crate) struct ListNode {
    cell: Option<ConsCell>,
}

struct ConsCell {
    head: Value,
    tail: RefCell<List>,
}

impl Drop for ListNode {
    fn drop(&mut self) {
        // Unlink iteratively so dropping a long chain does not recurse once
        // per node.
        let mut next = self.cell.take().map(|c| c.tail.into_inner());
        while let Some(list) = next {
            next = match Rc::try_unwrap(list.node) {
                Ok(mut node) => node.cell.take().map(|c| c.tail.into_inner()),
                Err(_) => None,
            };
        }
    }
}

/// A singly-linked list of [`Value`]s.
///
/// Cloning a `List` clones an `Rc` handle to the underlying node; the node
/// itself doubles as the cursor identity used by the parser's source map.
#[derive(Clone)]
pub struct List {
    node: Rc<ListNode>,
}

thread_local! {
    static EMPTY: List = List {
        node: Rc::new(ListNode { cell: None }),
    };
}

impl List {
    /// The unique empty list. Its tail is itself.
    pub fn empty() -> List {
        EMPTY.with(List::clone)
    }

    /// Construct a list from a head value and a tail list.
    pub fn cons(head: Value, tail: List) -> List {
        List {
            node: Rc::new(ListNode {
                cell: Some(ConsCell {
                    head,
                    tail: RefCell::new(tail),
                }),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node.cell.is_none()
    }

    /// First value of the list, or `None` when empty.
    pub fn head(&self) -> Option<&Value> {
        self.node.cell.as_ref().map(|c| &c.head)
    }

    /// Rest of the list. The tail of the empty list is the empty list.
    pub fn tail(&self) -> List {
        match self.node.cell.as_ref() {
            Some(c) => c.tail.borrow().clone(),
            None => List::empty(),
        }
    }

    /// Node-identity comparison. The empty sentinel is unique, so this is
    /// how emptiness-by-identity is checked in tests.
    pub fn ptr_eq(a: &List, b: &List) -> bool {
        Rc::ptr_eq(&a.node, &b.node)
    }

    pub(crate) fn as_ptr(&self) -> *const ListNode {
        Rc::as_ptr(&self.node)
    }

    pub(crate) fn downgrade(&self) -> Weak<ListNode> {
        Rc::downgrade(&self.node)
    }

    /// Replace this node's tail. Used by [`ListBuilder`] to advance its end
    /// pointer; no other code mutates list structure.
    pub(crate) fn set_tail(&self, tail: List) {
        if let Some(cell) = self.node.cell.as_ref() {
            *cell.tail.borrow_mut() = tail;
        }
    }

    /// Iterate over the values of the list.
    pub fn iter(&self) -> Iter {
        Iter {
            cursor: self.clone(),
        }
    }

    /// Iterate over the cursors of the list; each cursor is the list node
    /// itself, so both head and tail remain reachable from it.
    pub fn cursors(&self) -> Cursors {
        Cursors {
            cursor: self.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.cursors().count()
    }

    /// Last non-empty cursor of the list, or the empty list.
    pub fn end(&self) -> List {
        let mut last = self.clone();
        for cursor in self.cursors() {
            last = cursor;
        }
        last
    }

    /// Structural reverse; the receiver is untouched.
    pub fn reverse(&self) -> List {
        let mut out = List::empty();
        for v in self.iter() {
            out = List::cons(v, out);
        }
        out
    }

    /// New list holding the values for which `pred` returns true.
    pub fn filter(&self, pred: impl Fn(&Value) -> bool) -> List {
        self.iter().filter(|v| pred(v)).collect()
    }

    /// New list holding `f` applied to each value.
    pub fn map(&self, f: impl Fn(&Value) -> Value) -> List {
        self.iter().map(|v| f(&v)).collect()
    }

    /// Render the list with the given outer delimiters, separating elements
    /// with a single space. Nested lists always print with brackets.
    /// Reference cycles are detected with an explicit visitation stack and
    /// printed as `<recursive>`.
    pub fn stringify(&self, open: &str, close: &str) -> String {
        let mut out = String::new();
        let mut seen = Vec::new();
        self.stringify_into(&mut out, open, close, &mut seen);
        out
    }

    fn stringify_into(&self, out: &mut String, open: &str, close: &str, seen: &mut Vec<usize>) {
        out.push_str(open);
        let depth_start = seen.len();
        let mut first = true;
        let mut cursor = self.clone();
        while !cursor.is_empty() {
            let id = cursor.as_ptr() as usize;
            if !first {
                out.push(' ');
            }
            first = false;
            if seen.contains(&id) {
                out.push_str("<recursive>");
                break;
            }
            seen.push(id);
            match cursor.head() {
                Some(Value::List(inner)) => inner.stringify_into(out, "[", "]", seen),
                Some(atom) => out.push_str(&atom.to_string()),
                None => break,
            }
            let tail = cursor.tail();
            cursor = tail;
        }
        seen.truncate(depth_start);
        out.push_str(close);
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        loop {
            match (a.head(), b.head()) {
                (None, None) => return true,
                (Some(x), Some(y)) if x == y => {}
                _ => return false,
            }
            let (na, nb) = (a.tail(), b.tail());
            a = na;
            b = nb;
        }
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify("[", "]"))
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify("[", "]"))
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut builder = ListBuilder::new();
        builder.concat(iter);
        builder.list()
    }
}

pub struct Iter {
    cursor: List,
}

impl Iterator for Iter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let head = self.cursor.head()?.clone();
        let tail = self.cursor.tail();
        self.cursor = tail;
        Some(head)
    }
}

pub struct Cursors {
    cursor: List,
}

impl Iterator for Cursors {
    type Item = List;

    fn next(&mut self) -> Option<List> {
        if self.cursor.is_empty() {
            return None;
        }
        let cursor = self.cursor.clone();
        self.cursor = cursor.tail();
        Some(cursor)
    }
}

/// Amortized O(1) list construction: keeps the head of the list being built
/// and an end pointer, and advances the end pointer on every append.
pub struct ListBuilder {
    list: List,
    end: List,
}

impl Default for ListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ListBuilder {
    pub fn new() -> Self {
        ListBuilder {
            list: List::empty(),
            end: List::empty(),
        }
    }

    /// Append one value. Returns the cursor of the appended cell so callers
    /// can record source spans against it.
    pub fn push(&mut self, value: Value) -> List {
        let node = List::cons(value, List::empty());
        if self.list.is_empty() {
            self.list = node.clone();
        } else {
            self.end.set_tail(node.clone());
        }
        self.end = node.clone();
        node
    }

    /// Append every value of an iterable.
    pub fn concat<I: IntoIterator<Item = Value>>(&mut self, values: I) {
        for v in values {
            self.push(v);
        }
    }

    /// Splice an existing list onto the tail, taking ownership of its
    /// structure and advancing the end pointer to its last cell.
    pub fn attach(&mut self, list: List) {
        if list.is_empty() {
            return;
        }
        if self.list.is_empty() {
            self.list = list.clone();
        } else {
            self.end.set_tail(list.clone());
        }
        self.end = list.end();
    }

    /// The list built so far.
    pub fn list(&self) -> List {
        self.list.clone()
    }
}
