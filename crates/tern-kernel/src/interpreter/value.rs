//! Runtime values.
//!
//! Primitive values compare by content. Functions, slices, references and
//! channels compare by identity: two slices with the same elements are
//! different values unless they are the same allocation.

use std::fmt;
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, bounded};

use crate::ast::{DataType, FunctionLit};

use super::builtins::Builtin;
use super::scope::{Environment, Slot, new_slot};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Str(String),
    Boolean(bool),
    Nil,
    /// A value stored in an `any` binding, kept as its inspection string.
    Any(String),
    Function(Arc<Function>),
    Builtin(Builtin),
    Slice(Arc<Slice>),
    Reference(Reference),
    Channel(Channel),
    /// A type passed as a value, as in `make(chan int)`.
    DataType(DataType),
}

impl Value {
    /// The value's type descriptor.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Int,
            Value::Str(_) => DataType::String,
            Value::Boolean(_) => DataType::Bool,
            Value::Nil => DataType::Nil,
            Value::Any(_) | Value::DataType(_) => DataType::Any,
            Value::Function(func) => func.data_type(),
            Value::Builtin(_) => DataType::Builtin,
            Value::Slice(slice) => DataType::slice_of(slice.elem.clone()),
            Value::Reference(r) => DataType::reference_to(r.elem.clone()),
            Value::Channel(ch) => DataType::channel_of(ch.elem.clone()),
        }
    }

    /// Box this value for storage in an `any` binding.
    pub fn boxed(self) -> Value {
        match self {
            Value::Any(_) => self,
            other => Value::Any(other.to_string()),
        }
    }

    /// The zero value of a type.
    ///
    /// References point at a fresh slot holding the element's zero value;
    /// channels are unconnected.
    pub fn zero(ty: &DataType) -> Value {
        match ty {
            DataType::Int => Value::Integer(0),
            DataType::String => Value::Str(String::new()),
            DataType::Bool => Value::Boolean(false),
            DataType::Any => Value::Any(Value::Nil.to_string()),
            DataType::Slice(elem) => Value::Slice(Arc::new(Slice::new((**elem).clone(), Vec::new()))),
            DataType::Reference(elem) => Value::Reference(Reference::new(
                (**elem).clone(),
                new_slot(Value::zero(elem)),
            )),
            DataType::Channel(elem) => Value::Channel(Channel::unconnected((**elem).clone())),
            DataType::Nil
            | DataType::Function { .. }
            | DataType::Builtin
            | DataType::Return
            | DataType::Error => Value::Nil,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Str(a), Value::Str(b)) | (Value::Any(a), Value::Any(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Slice(a), Value::Slice(b)) => Arc::ptr_eq(a, b),
            (Value::Reference(a), Value::Reference(b)) => a.same_slot(b),
            (Value::Channel(a), Value::Channel(b)) => a.same_channel(b),
            (Value::DataType(a), Value::DataType(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Str(s) | Value::Any(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Nil => write!(f, "nil"),
            Value::Function(func) => write!(f, "{func}"),
            Value::Builtin(builtin) => write!(f, "builtin {}", builtin.name()),
            Value::Slice(slice) => {
                write!(f, "[")?;
                for (i, item) in slice.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Reference(r) => write!(f, "&{}", r.get()),
            Value::Channel(ch) => write!(f, "chan {}", ch.elem),
            Value::DataType(ty) => write!(f, "{ty}"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// A closure: a function literal plus the environment it was created in.
pub struct Function {
    pub literal: Arc<FunctionLit>,
    pub env: Environment<Value>,
}

impl Function {
    pub fn new(literal: Arc<FunctionLit>, env: Environment<Value>) -> Self {
        Self { literal, env }
    }

    pub fn data_type(&self) -> DataType {
        self.literal.data_type()
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &str {
        self.literal.name.as_deref().unwrap_or("func literal")
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.literal.name)
            .field("type", &self.data_type())
            .finish()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signature = self.data_type().to_string();
        match &self.literal.name {
            Some(name) => write!(f, "func {name}{}", &signature["func".len()..]),
            None => write!(f, "{signature}"),
        }
    }
}

/// An immutable slice. `append` builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub elem: DataType,
    pub items: Vec<Value>,
}

impl Slice {
    pub fn new(elem: DataType, items: Vec<Value>) -> Self {
        Self { elem, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A pointer to one slot.
#[derive(Debug, Clone)]
pub struct Reference {
    pub elem: DataType,
    slot: Slot<Value>,
}

impl Reference {
    pub fn new(elem: DataType, slot: Slot<Value>) -> Self {
        Self { elem, slot }
    }

    /// The referent.
    pub fn get(&self) -> Value {
        self.slot.read().clone()
    }

    /// Overwrite the referent.
    pub fn set(&self, value: Value) {
        *self.slot.write() = value;
    }

    pub fn same_slot(&self, other: &Reference) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

#[derive(Debug)]
struct Queue {
    tx: Sender<Value>,
    rx: Receiver<Value>,
}

/// A typed channel, or the unconnected zero channel.
#[derive(Debug, Clone)]
pub struct Channel {
    pub elem: DataType,
    queue: Option<Arc<Queue>>,
}

impl Channel {
    /// A channel buffering up to `capacity` values. Zero is a rendezvous.
    pub fn new(elem: DataType, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            elem,
            queue: Some(Arc::new(Queue { tx, rx })),
        }
    }

    pub fn unconnected(elem: DataType) -> Self {
        Self { elem, queue: None }
    }

    pub fn is_connected(&self) -> bool {
        self.queue.is_some()
    }

    /// Send a value, blocking while the buffer is full.
    ///
    /// Returns `false` on an unconnected channel.
    pub fn send(&self, value: Value) -> bool {
        match &self.queue {
            Some(queue) => queue.tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Receive a value, blocking while the buffer is empty.
    ///
    /// Returns `None` on an unconnected channel.
    pub fn recv(&self) -> Option<Value> {
        self.queue.as_ref().and_then(|queue| queue.rx.recv().ok())
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.rx.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn same_channel(&self, other: &Channel) -> bool {
        match (&self.queue, &other.queue) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::int(DataType::Int, Value::Integer(0))]
    #[case::string(DataType::String, Value::Str(String::new()))]
    #[case::bool(DataType::Bool, Value::Boolean(false))]
    #[case::nil(DataType::Nil, Value::Nil)]
    #[case::any(DataType::Any, Value::Any("nil".into()))]
    fn zero_values(#[case] ty: DataType, #[case] expected: Value) {
        assert_eq!(Value::zero(&ty), expected);
    }

    #[test]
    fn zero_reference_points_at_fresh_slot() {
        let Value::Reference(r) = Value::zero(&DataType::reference_to(DataType::Int)) else {
            panic!("expected reference");
        };
        assert_eq!(r.get(), Value::Integer(0));
        assert_eq!(r.elem, DataType::Int);
    }

    #[test]
    fn zero_channel_is_unconnected() {
        let Value::Channel(ch) = Value::zero(&DataType::channel_of(DataType::Int)) else {
            panic!("expected channel");
        };
        assert!(!ch.is_connected());
        assert!(!ch.send(Value::Integer(1)));
        assert_eq!(ch.recv(), None);
    }

    #[rstest]
    #[case::slice(
        Value::Slice(Arc::new(Slice::new(DataType::Int, vec![Value::Integer(1), Value::Integer(2)]))),
        "[1, 2]"
    )]
    #[case::nested_strings(
        Value::Slice(Arc::new(Slice::new(DataType::String, vec!["a".into(), "b".into()]))),
        "[a, b]"
    )]
    #[case::reference(
        Value::Reference(Reference::new(DataType::Int, new_slot(Value::Integer(3)))),
        "&3"
    )]
    #[case::channel(Value::Channel(Channel::new(DataType::Int, 1)), "chan int")]
    #[case::nil(Value::Nil, "nil")]
    #[case::type_value(Value::DataType(DataType::slice_of(DataType::Int)), "[]int")]
    fn inspection(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn composite_values_compare_by_identity() {
        let a = Arc::new(Slice::new(DataType::Int, vec![Value::Integer(1)]));
        let b = Arc::new(Slice::new(DataType::Int, vec![Value::Integer(1)]));
        assert_eq!(Value::Slice(Arc::clone(&a)), Value::Slice(Arc::clone(&a)));
        assert_ne!(Value::Slice(a), Value::Slice(b));

        let slot = new_slot(Value::Integer(1));
        let r1 = Reference::new(DataType::Int, Arc::clone(&slot));
        let r2 = Reference::new(DataType::Int, slot);
        let r3 = Reference::new(DataType::Int, new_slot(Value::Integer(1)));
        assert!(r1.same_slot(&r2));
        assert!(!r1.same_slot(&r3));
    }

    #[test]
    fn boxing_keeps_inspection() {
        let boxed = Value::Slice(Arc::new(Slice::new(DataType::Int, vec![Value::Integer(7)]))).boxed();
        assert_eq!(boxed, Value::Any("[7]".into()));
        assert_eq!(boxed.clone().boxed(), boxed);
        assert_eq!(boxed.data_type(), DataType::Any);
    }

    #[test]
    fn buffered_channel_round_trip() {
        let ch = Channel::new(DataType::Int, 2);
        assert!(ch.send(Value::Integer(1)));
        assert!(ch.send(Value::Integer(2)));
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.recv(), Some(Value::Integer(1)));
        assert_eq!(ch.len(), 1);
    }

    #[test]
    fn reference_writes_through() {
        let slot = new_slot(Value::Integer(1));
        let r = Reference::new(DataType::Int, Arc::clone(&slot));
        r.set(Value::Integer(9));
        assert_eq!(*slot.read(), Value::Integer(9));
    }
}
