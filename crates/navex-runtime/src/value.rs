//! Runtime value types for navex

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::{IndexMap, IndexSet};
use navex_ast::{DynamicSubscript, Literal};
use num_bigint::BigInt;
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::host::HostObject;

/// Name of a runtime type, used as the first half of every member cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The core runtime value type
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    BigDecimal(Decimal),

    /// String (shared, immutable)
    String(Arc<str>),

    /// Array-like sequence, shared and mutable in place
    List(ListRef),

    /// Map-like container (preserves insertion order), shared and mutable in place
    Map(MapRef),

    /// Immutable set snapshot (e.g. the keys of a map)
    Set(Arc<IndexSet<Value>>),

    /// Symbolic array position
    Subscript(DynamicSubscript),

    /// Host-supplied object, accessed through the member resolver
    Object(Arc<dyn HostObject>),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// A size or position: an Int, or a Long once it no longer fits
    pub fn count(n: usize) -> Self {
        match i32::try_from(n) {
            Ok(i) => Value::Int(i),
            Err(_) => Value::Long(i64::try_from(n).unwrap_or(i64::MAX)),
        }
    }

    /// Create a list value
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(ListRef::new(items))
    }

    /// Create a map value
    pub fn map(entries: IndexMap<Value, Value>) -> Self {
        Value::Map(MapRef::new(entries))
    }

    /// Create a map value from string keys
    pub fn map_from<K, I>(entries: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (Value::String(k.into()), v))
            .collect();
        Value::map(map)
    }

    /// Create a set value
    pub fn set(items: IndexSet<Value>) -> Self {
        Value::Set(Arc::new(items))
    }

    /// Wrap a host object
    pub fn object<T: HostObject>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "Boolean",
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Char(_) => "Char",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::BigInteger(_) => "BigInteger",
            Value::BigDecimal(_) => "BigDecimal",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
            Value::Subscript(_) => "DynamicSubscript",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        TypeKey::new(self.type_name())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&IndexSet<Value>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn HostObject>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow the host object as its concrete type
    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        self.as_object()?.as_any().downcast_ref::<T>()
    }
}

impl From<&Literal> for Value {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Boolean(*b),
            Literal::Byte(b) => Value::Byte(*b),
            Literal::Short(s) => Value::Short(*s),
            Literal::Char(c) => Value::Char(*c),
            Literal::Int(i) => Value::Int(*i),
            Literal::Long(l) => Value::Long(*l),
            Literal::Float(f) => Value::Float(*f),
            Literal::Double(d) => Value::Double(*d),
            Literal::BigInteger(i) => Value::BigInteger(i.clone()),
            Literal::BigDecimal(d) => Value::BigDecimal(*d),
            Literal::String(s) => Value::String(Arc::clone(s)),
            Literal::Subscript(s) => Value::Subscript(*s),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    char => Char,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    BigInt => BigInteger,
    Decimal => BigDecimal,
    DynamicSubscript => Subscript,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Shared containers
// =============================================================================

/// Shared, mutable array-like storage
#[derive(Clone, Default)]
pub struct ListRef(Arc<RwLock<Vec<Value>>>);

impl ListRef {
    pub fn new(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.read().get(index).cloned()
    }

    /// Copy of the current elements
    pub fn snapshot(&self) -> Vec<Value> {
        self.read().clone()
    }

    pub fn ptr_eq(&self, other: &ListRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.read().iter()).finish()
    }
}

/// Shared, mutable map-like storage
#[derive(Clone, Default)]
pub struct MapRef(Arc<RwLock<IndexMap<Value, Value>>>);

impl MapRef {
    pub fn new(entries: IndexMap<Value, Value>) -> Self {
        Self(Arc::new(RwLock::new(entries)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, IndexMap<Value, Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, IndexMap<Value, Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Store `value` under `key`. A key that is or contains this map cannot
    /// be hashed while the map is locked for writing, so it is handed back
    /// as the error.
    pub fn insert(&self, key: Value, value: Value) -> Result<Option<Value>, Value> {
        if self.is_part_of(&key) {
            return Err(key);
        }
        Ok(self.write().insert(key, value))
    }

    /// Whether `value` is this map or holds it at any depth
    pub fn is_part_of(&self, value: &Value) -> bool {
        match value {
            Value::Map(m) => {
                m.ptr_eq(self)
                    || m.read()
                        .iter()
                        .any(|(k, v)| self.is_part_of(k) || self.is_part_of(v))
            }
            Value::List(l) => l.read().iter().any(|v| self.is_part_of(v)),
            Value::Set(s) => s.iter().any(|v| self.is_part_of(v)),
            _ => false,
        }
    }

    pub fn remove(&self, key: &Value) -> Option<Value> {
        self.write().shift_remove(key)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.read().contains_key(key)
    }

    pub fn keys(&self) -> IndexSet<Value> {
        self.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.read().values().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.read().iter()).finish()
    }
}

// =============================================================================
// Display (host-facing string form, used for concatenation)
// =============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(i) => write!(f, "{}", i),
            Value::Short(i) => write!(f, "{}", i),
            Value::Char(c) => write!(f, "{}", c),
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(i) => write!(f, "{}", i),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e7 => {
                write!(f, "{:.1}", n)
            }
            Value::Float(n) if n.is_finite() => write!(f, "{}", n),
            Value::Float(n) => write_real(f, f64::from(*n)),
            Value::Double(n) => write_real(f, *n),
            Value::BigInteger(i) => write!(f, "{}", i),
            Value::BigDecimal(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.read().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.read().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Subscript(s) => write!(f, "{}", s),
            Value::Object(obj) => write!(f, "{:?}", obj),
        }
    }
}

fn write_real(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        if n > 0.0 {
            write!(f, "Infinity")
        } else {
            write!(f, "-Infinity")
        }
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{:.1}", n)
    } else {
        write!(f, "{}", n)
    }
}

// =============================================================================
// Equality and hashing (strict: used for map keys and set membership)
// =============================================================================

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits() || a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits() || a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::BigDecimal(a), Value::BigDecimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || *a.read() == *b.read(),
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Subscript(a), Value::Subscript(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Byte(i) => i.hash(state),
            Value::Short(i) => i.hash(state),
            Value::Char(c) => c.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Long(i) => i.hash(state),
            // +0.0 and -0.0 compare equal, so they must hash alike
            Value::Float(n) => (if *n == 0.0 { 0.0f32 } else { *n }).to_bits().hash(state),
            Value::Double(n) => (if *n == 0.0 { 0.0f64 } else { *n }).to_bits().hash(state),
            Value::BigInteger(i) => i.hash(state),
            Value::BigDecimal(d) => d.hash(state),
            Value::String(s) => s.hash(state),
            Value::List(l) => {
                for item in l.read().iter() {
                    item.hash(state);
                }
            }
            // Map and set equality ignores order
            Value::Map(m) => m.len().hash(state),
            Value::Set(s) => s.len().hash(state),
            Value::Subscript(s) => s.hash(state),
            Value::Object(o) => (Arc::as_ptr(o) as *const () as usize).hash(state),
        }
    }
}

// =============================================================================
// Serde serialization
// =============================================================================

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Byte(i) => serializer.serialize_i8(*i),
            Value::Short(i) => serializer.serialize_i16(*i),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::Int(i) => serializer.serialize_i32(*i),
            Value::Long(i) => serializer.serialize_i64(*i),
            Value::Float(n) => serializer.serialize_f32(*n),
            Value::Double(n) => serializer.serialize_f64(*n),
            // Arbitrary precision numbers keep their exact digits as strings
            Value::BigInteger(i) => serializer.serialize_str(&i.to_string()),
            Value::BigDecimal(d) => serializer.serialize_str(&d.to_string()),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let items = items.read();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let entries = entries.read();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    map.serialize_entry(&k.to_string(), v)?;
                }
                map.end()
            }
            Value::Subscript(s) => serializer.serialize_str(s.keyword()),
            Value::Object(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}
