//! Scope tree and bindings (spec §4.3 "Scoping"): each Program,
//! FunctionDeclaration, and non-function Block opens a `Scope`.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// From a pattern: a local, a parameter, or a `var`/`let` declarator.
    Variable,
    /// A top-level `fn` declaration.
    ModuleFunction,
    /// Brought in by an `ImportSpecifier`; carries the package and semver
    /// range the import was declared against.
    ImportedFunction,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: BindingKind,
    /// What this binding addresses, meaning depends on `kind`: for
    /// `Variable`, the scope-prefixed key under which the value lives in
    /// the owning frame's locals map (GETVAR/SETVAR key); for
    /// `ModuleFunction`, the function's own top-level name, i.e. the `fp`
    /// string CALL dispatches to and the key it occupies in the
    /// `ObjectFile`; for `ImportedFunction`, the function's name in the
    /// imported package, not the local import alias.
    pub compiled_name: String,
    pub package: Option<String>,
    pub semver: Option<String>,
}

/// One lexical scope. Scopes form a tree via `parent`; `prefix` is this
/// scope's contribution to every binding's compiled name.
pub struct Scope {
    pub parent: Option<Rc<Scope>>,
    pub prefix: String,
    bindings: std::cell::RefCell<HashMap<String, Binding>>,
    next_child: Cell<u32>,
    next_label: Cell<u32>,
}

impl Scope {
    pub fn root(prefix: impl Into<String>) -> Rc<Scope> {
        Rc::new(Scope {
            parent: None,
            prefix: prefix.into(),
            bindings: std::cell::RefCell::new(HashMap::new()),
            next_child: Cell::new(0),
            next_label: Cell::new(0),
        })
    }

    /// Opens a child scope with a unique compiled-name prefix derived from
    /// this scope's own prefix and a per-parent counter.
    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        let n = parent.next_child.get();
        parent.next_child.set(n + 1);
        Rc::new(Scope {
            parent: Some(parent.clone()),
            prefix: format!("{}_{n}", parent.prefix),
            bindings: std::cell::RefCell::new(HashMap::new()),
            next_child: Cell::new(0),
            next_label: Cell::new(0),
        })
    }

    /// Declares `name` in this scope. Returns `Err(())` on a double binding
    /// (spec: "hard compile error") so the caller can attach path context.
    pub fn declare(&self, name: &str, binding: Binding) -> Result<(), ()> {
        let mut bindings = self.bindings.borrow_mut();
        if bindings.contains_key(name) {
            return Err(());
        }
        bindings.insert(name.to_string(), binding);
        Ok(())
    }

    /// Looks up `name` starting at this scope and walking outward through
    /// `parent` pointers.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(b) = self.bindings.borrow().get(name) {
            return Some(b.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn compiled_name(&self, name: &str) -> String {
        format!("{}.{name}", self.prefix)
    }

    pub fn next_label(&self) -> String {
        let n = self.next_label.get();
        self.next_label.set(n + 1);
        format!("{}_L{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaring_the_same_name_twice_is_an_error() {
        let scope = Scope::root("s0");
        let binding = Binding { kind: BindingKind::Variable, compiled_name: "s0.x".into(), package: None, semver: None };
        assert!(scope.declare("x", binding.clone()).is_ok());
        assert!(scope.declare("x", binding).is_err());
    }

    #[test]
    fn lookup_walks_outward_through_parent_scopes() {
        let root = Scope::root("s0");
        root.declare(
            "outer",
            Binding { kind: BindingKind::Variable, compiled_name: "s0.outer".into(), package: None, semver: None },
        )
        .unwrap();
        let inner = Scope::child(&root);
        assert!(inner.lookup("outer").is_some());
        assert!(inner.lookup("nonexistent").is_none());
    }

    #[test]
    fn child_scopes_get_distinct_prefixes() {
        let root = Scope::root("s0");
        let a = Scope::child(&root);
        let b = Scope::child(&root);
        assert_ne!(a.prefix, b.prefix);
    }
}
