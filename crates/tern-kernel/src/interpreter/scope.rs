//! Lexically scoped bindings.
//!
//! An [`Environment`] is a handle to one scope frame plus its enclosing
//! frame. Frames are reference counted, so a closure that captures its
//! defining environment keeps the whole chain alive, and a `go` task can
//! share the environment of its spawner.
//!
//! Each binding lives in its own [`Slot`]. Assignment writes through the
//! slot, which is what lets `&x` alias the binding `x`. A binding may also
//! carry the type it was declared with, which assignments are checked
//! against.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ast::DataType;

/// Shared storage for a single binding.
pub type Slot<T> = Arc<RwLock<T>>;

/// Create a fresh slot holding `value`.
pub fn new_slot<T>(value: T) -> Slot<T> {
    Arc::new(RwLock::new(value))
}

struct Binding<T> {
    slot: Slot<T>,
    ty: Option<DataType>,
}

struct Frame<T> {
    bindings: RwLock<HashMap<String, Binding<T>>>,
    outer: Option<Environment<T>>,
}

/// Chained name-to-slot scope.
///
/// Cloning an `Environment` clones the handle, not the bindings.
pub struct Environment<T> {
    frame: Arc<Frame<T>>,
}

impl<T> Clone for Environment<T> {
    fn clone(&self) -> Self {
        Self {
            frame: Arc::clone(&self.frame),
        }
    }
}

impl<T> std::fmt::Debug for Environment<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("depth", &self.depth())
            .field("locals", &self.frame.bindings.read().len())
            .finish()
    }
}

impl<T> Default for Environment<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Environment<T> {
    /// Create a root scope.
    pub fn new() -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings: RwLock::new(HashMap::new()),
                outer: None,
            }),
        }
    }

    /// Create a child scope of this one.
    ///
    /// Dropping the child leaves the parent untouched.
    pub fn enter(&self) -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings: RwLock::new(HashMap::new()),
                outer: Some(self.clone()),
            }),
        }
    }

    /// Bind `name` in this scope, replacing any local binding of that name.
    pub fn declare(&self, name: impl Into<String>, value: T) {
        self.insert(name.into(), new_slot(value), None);
    }

    /// Bind `name` in this scope with its declared type.
    pub fn declare_typed(&self, name: impl Into<String>, value: T, ty: DataType) {
        self.insert(name.into(), new_slot(value), Some(ty));
    }

    /// Bind `name` in this scope to an existing slot.
    pub fn declare_slot(&self, name: impl Into<String>, slot: Slot<T>) {
        self.insert(name.into(), slot, None);
    }

    fn insert(&self, name: String, slot: Slot<T>, ty: Option<DataType>) {
        self.frame.bindings.write().insert(name, Binding { slot, ty });
    }

    /// The slot for `name`, searching outward.
    pub fn slot(&self, name: &str) -> Option<Slot<T>> {
        self.find(name, |binding| Arc::clone(&binding.slot))
    }

    /// The slot for `name` and the type it was declared with, if any.
    pub fn typed_slot(&self, name: &str) -> Option<(Slot<T>, Option<DataType>)> {
        self.find(name, |binding| (Arc::clone(&binding.slot), binding.ty.clone()))
    }

    fn find<R>(&self, name: &str, f: impl Fn(&Binding<T>) -> R) -> Option<R> {
        let mut env = Some(self);
        while let Some(current) = env {
            if let Some(binding) = current.frame.bindings.read().get(name) {
                return Some(f(binding));
            }
            env = current.frame.outer.as_ref();
        }
        None
    }

    /// Whether any visible scope binds `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Whether this scope itself binds `name`.
    pub fn contains_local(&self, name: &str) -> bool {
        self.frame.bindings.read().contains_key(name)
    }

    /// Overwrite `name` in the nearest scope that binds it.
    ///
    /// Returns `false` when no scope binds `name`.
    pub fn assign(&self, name: &str, value: T) -> bool {
        match self.slot(name) {
            Some(slot) => {
                *slot.write() = value;
                true
            }
            None => false,
        }
    }

    /// Number of enclosing scopes.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut env = self.frame.outer.as_ref();
        while let Some(outer) = env {
            depth += 1;
            env = outer.frame.outer.as_ref();
        }
        depth
    }
}

impl<T: Clone> Environment<T> {
    /// The value bound to `name`, searching outward.
    pub fn lookup(&self, name: &str) -> Option<T> {
        self.slot(name).map(|slot| slot.read().clone())
    }

    /// Every visible binding, innermost first wins, sorted by name.
    pub fn names(&self) -> Vec<(String, T)> {
        let mut seen: HashMap<String, T> = HashMap::new();
        let mut env = Some(self);
        while let Some(current) = env {
            for (name, binding) in current.frame.bindings.read().iter() {
                if !seen.contains_key(name) {
                    seen.insert(name.clone(), binding.slot.read().clone());
                }
            }
            env = current.frame.outer.as_ref();
        }
        let mut names: Vec<_> = seen.into_iter().collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        names
    }
}
