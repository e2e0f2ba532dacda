//! Scope chains, bindings, and activation records.
//!
//! Two independent chains exist at runtime: the procedure scope (names to
//! procedures, builtin and user-defined) and the variable scope (names to
//! values). Both use the same generic [`Scope`] machinery.
//!
//! Variables are bound through shared one-slot cells ([`Binding`]) so that
//! `global` can alias a single cell into several scopes at once.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::list::Value;

/// A one-slot mutable cell. `None` means declared but not yet given a value
/// (procedure parameters without actuals, `local` before `make`).
pub type Binding<T> = Rc<RefCell<Option<T>>>;

/// A chain of name-to-binding mappings with a parent pointer.
pub struct Scope<T> {
    bindings: RefCell<HashMap<String, Binding<T>>>,
    parent: Option<Rc<Scope<T>>>,
}

impl<T: Clone> Default for Scope<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Scope<T> {
    pub fn new() -> Self {
        Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        }
    }

    pub fn with_parent(parent: Rc<Scope<T>>) -> Self {
        Scope {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        }
    }

    /// Look up a value, walking parent scopes. Returns `None` when the name
    /// is absent from the chain or bound without a value.
    pub fn get(&self, name: &str) -> Option<T> {
        self.get_binding(name).and_then(|b| b.borrow().clone())
    }

    /// Find the binding record for a name, walking parent scopes.
    pub fn get_binding(&self, name: &str) -> Option<Binding<T>> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|p| p.get_binding(name))
    }

    /// Update an existing binding anywhere in the chain, or create a new one
    /// in the root scope (implicit globals). Never shadows.
    pub fn set(&self, name: &str, value: T) {
        if let Some(binding) = self.get_binding(name) {
            *binding.borrow_mut() = Some(value);
            return;
        }
        let mut scope = self;
        while let Some(parent) = scope.parent.as_deref() {
            scope = parent;
        }
        scope.bind_value(name, value);
    }

    /// Install a binding record in this scope, shadowing any parent binding
    /// of the same name.
    pub fn bind(&self, name: &str, binding: Binding<T>) {
        self.bindings.borrow_mut().insert(name.to_owned(), binding);
    }

    /// Install a fresh binding holding `value` in this scope.
    pub fn bind_value(&self, name: &str, value: T) {
        self.bind(name, Rc::new(RefCell::new(Some(value))));
    }

    /// Install a fresh binding with no value yet, returning it.
    pub fn declare(&self, name: &str) -> Binding<T> {
        let binding: Binding<T> = Rc::new(RefCell::new(None));
        self.bind(name, binding.clone());
        binding
    }

    /// Bulk registration; used to install builtins and embedder APIs.
    pub fn bind_values<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
    {
        let mut bindings = self.bindings.borrow_mut();
        for (name, value) in values {
            bindings.insert(name.into(), Rc::new(RefCell::new(Some(value))));
        }
    }

    /// All names bound in this chain, deduplicated and sorted.
    pub fn names(&self) -> Vec<String> {
        let mut all = Vec::new();
        let mut scope = Some(self);
        while let Some(s) = scope {
            all.extend(s.bindings.borrow().keys().cloned());
            scope = s.parent.as_deref();
        }
        all.sort();
        all.dedup();
        all
    }
}

/// The activation record of one procedure invocation.
///
/// Holds the procedure's return value slot and the stop flag. `if`, `repeat`
/// and template bodies share the enclosing context, so `stop` and `output`
/// inside them return from the surrounding procedure.
pub struct Context {
    output: RefCell<Option<Value>>,
    stop: Cell<bool>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            output: RefCell::new(None),
            stop: Cell::new(false),
        }
    }

    pub fn output(&self) -> Option<Value> {
        self.output.borrow().clone()
    }

    pub fn set_output(&self, value: Value) {
        *self.output.borrow_mut() = Some(value);
    }

    pub fn request_stop(&self) {
        self.stop.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_get_walks_parents() {
        let root = Rc::new(Scope::new());
        root.bind_value("x", num(1.0));
        let child = Scope::with_parent(root.clone());
        assert_eq!(child.get("x"), Some(num(1.0)));
        assert_eq!(child.get("y"), None);
    }

    #[test]
    fn test_set_updates_in_chain_without_shadowing() {
        let root = Rc::new(Scope::new());
        root.bind_value("x", num(1.0));
        let child = Rc::new(Scope::with_parent(root.clone()));
        let grandchild = Scope::with_parent(child.clone());

        // Setting from a descendant updates the root binding in place.
        grandchild.set("x", num(2.0));
        assert_eq!(root.get("x"), Some(num(2.0)));

        // Every descendant sees the new value; no shadow was created.
        let sibling = Scope::with_parent(root.clone());
        assert_eq!(sibling.get("x"), Some(num(2.0)));
    }

    #[test]
    fn test_set_unknown_creates_in_root() {
        let root = Rc::new(Scope::new());
        let child = Scope::with_parent(root.clone());
        child.set("fresh", num(9.0));
        assert_eq!(root.get("fresh"), Some(num(9.0)));
    }

    #[test]
    fn test_bind_shadows_parent() {
        let root = Rc::new(Scope::new());
        root.bind_value("x", num(1.0));
        let child = Scope::with_parent(root.clone());
        child.bind_value("x", num(5.0));
        assert_eq!(child.get("x"), Some(num(5.0)));
        assert_eq!(root.get("x"), Some(num(1.0)));
    }

    #[test]
    fn test_shared_binding_aliases_one_cell() {
        let root = Rc::new(Scope::<Value>::new());
        let binding = root.declare("g");
        let child = Scope::with_parent(root.clone());
        child.bind("g", binding.clone());

        child.set("g", num(7.0));
        assert_eq!(root.get("g"), Some(num(7.0)));
        assert_eq!(child.get("g"), Some(num(7.0)));
    }

    #[test]
    fn test_declared_without_value_reads_as_unbound() {
        let scope = Scope::<Value>::new();
        scope.declare("pending");
        assert!(scope.get_binding("pending").is_some());
        assert_eq!(scope.get("pending"), None);
    }

    #[test]
    fn test_bind_values_bulk() {
        let scope = Scope::new();
        scope.bind_values(vec![("a", num(1.0)), ("b", num(2.0))]);
        assert_eq!(scope.get("a"), Some(num(1.0)));
        assert_eq!(scope.get("b"), Some(num(2.0)));
        assert_eq!(scope.names(), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn test_context_stop_and_output() {
        let ctx = Context::new();
        assert!(!ctx.is_stopped());
        assert_eq!(ctx.output(), None);
        ctx.set_output(num(42.0));
        ctx.request_stop();
        assert!(ctx.is_stopped());
        assert_eq!(ctx.output(), Some(num(42.0)));
    }
}
