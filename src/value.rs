//! Boxed calling convention: the uniform value carrier and argument cells.
//!
//! Every intercepted call crosses the handler boundary through one erased
//! calling convention: a vector of [`ArgCell`]s in, one [`Value`] out.
//! Arguments are boxed by value; by-address parameters are first converted
//! through an [`AddressCell`] rather than boxed directly, so a handler (or
//! the base implementation) can observe writes through the reference.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::facts;
use crate::model::types::TypeExpr;

/// A type-erased runtime value.
#[derive(Clone)]
pub enum Value {
    /// Absence of a value (void returns, unset object backings).
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An opaque host object tagged with its declared type name.
    Object(ObjectValue),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Whether this value conforms to the declared type expression.
    ///
    /// Object values conform to a named type when their tag matches or the
    /// facts registry declares them assignable to it.
    pub fn conforms_to(&self, ty: &TypeExpr) -> bool {
        match (self, ty) {
            (Value::Void, TypeExpr::Void) => true,
            (Value::Bool(_), TypeExpr::Bool) => true,
            (Value::Int(_), TypeExpr::Int) => true,
            (Value::Float(_), TypeExpr::Float) => true,
            (Value::Str(_), TypeExpr::Str) => true,
            (Value::Object(o), named @ TypeExpr::Named { .. }) => {
                facts::global().name_is_assignable(o.type_name(), named)
            }
            (v, TypeExpr::Address(inner)) => v.conforms_to(inner),
            _ => false,
        }
    }

    /// The zero value for a declared type. Object-typed slots start as
    /// [`Value::Void`] until first written.
    pub fn default_of(ty: &TypeExpr) -> Value {
        match ty {
            TypeExpr::Bool => Value::Bool(false),
            TypeExpr::Int => Value::Int(0),
            TypeExpr::Float => Value::Float(0.0),
            TypeExpr::Str => Value::Str(String::new()),
            _ => Value::Void,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

/// An opaque host object: shared data plus the declared type name used for
/// conformance checks.
#[derive(Clone)]
pub struct ObjectValue {
    type_name: Arc<str>,
    data: Arc<dyn Any + Send + Sync>,
}

impl ObjectValue {
    /// Wrap host data under a declared type name.
    pub fn new<T: Any + Send + Sync>(type_name: &str, data: T) -> Self {
        Self {
            type_name: Arc::from(type_name),
            data: Arc::new(data),
        }
    }

    /// The declared type name this object was tagged with.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Downcast the payload to a concrete host type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectValue({})", self.type_name)
    }
}

/// A mutable slot standing in for a by-address argument.
///
/// Writes through the cell are visible to whoever holds a clone, which is
/// how by-reference semantics survive the boxed calling convention.
#[derive(Clone)]
pub struct AddressCell {
    slot: Arc<Mutex<Value>>,
}

impl AddressCell {
    pub fn new(value: Value) -> Self {
        Self {
            slot: Arc::new(Mutex::new(value)),
        }
    }

    /// Read the current value.
    pub fn load(&self) -> Value {
        self.slot.lock().clone()
    }

    /// Replace the current value.
    pub fn store(&self, value: Value) {
        *self.slot.lock() = value;
    }
}

impl fmt::Debug for AddressCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressCell({:?})", self.load())
    }
}

/// One argument in the boxed calling convention.
#[derive(Debug, Clone)]
pub enum ArgCell {
    /// The argument boxed by value.
    ByValue(Value),
    /// A by-address argument, routed through an address cell.
    ByAddress(AddressCell),
    /// A slot the convention cannot carry (never reaches a thunk for an
    /// interceptable member).
    NotApplicable,
}

impl ArgCell {
    /// Read the argument as a plain value, if the cell carries one.
    pub fn load(&self) -> Option<Value> {
        match self {
            ArgCell::ByValue(v) => Some(v.clone()),
            ArgCell::ByAddress(cell) => Some(cell.load()),
            ArgCell::NotApplicable => None,
        }
    }
}
