//! Property accessors
//!
//! A property access `target.name` or `target[index]` is dispatched on the
//! target's runtime kind: lists, maps, sets and host objects each have an
//! accessor, and hosts may override any type with their own.

use std::sync::Arc;

use dashmap::DashMap;
use navex_ast::DynamicSubscript;

use crate::cache::{MemberCache, PropertyHandle};
use crate::context::EvalContext;
use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::ops::{self, NumericType};
use crate::value::{ListRef, MapRef, TypeKey, Value};

/// Reads and writes named or indexed properties of one kind of target.
///
/// `indexed` is true for bracket access (`target[key]`), false for dotted
/// access (`target.key`).
pub trait PropertyAccessor: Send + Sync {
    fn get_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<Value>;

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        value: Value,
        indexed: bool,
    ) -> EvalResult<()>;

    /// Source fragment reading the property, appended to the target's source
    fn source_accessor(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<String> {
        let _ = (ctx, target, indexed);
        Err(EvalError::unsupported(format!("no source accessor for property {}", name)))
    }

    /// Source fragment writing `$value` to the property
    fn source_setter(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<String> {
        let _ = (ctx, target, indexed);
        Err(EvalError::unsupported(format!("no source setter for property {}", name)))
    }
}

/// Render a key as a source literal
pub(crate) fn source_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s.as_ref()),
        Value::Char(c) => format!("{:?}", c),
        Value::Long(i) => format!("{}L", i),
        Value::Float(_) => format!("{}f", value),
        other => other.to_string(),
    }
}

fn index_of(name: &Value) -> EvalResult<Option<i64>> {
    if NumericType::of(name) == NumericType::NonNumeric {
        Ok(None)
    } else {
        ops::long_value(name).map(Some)
    }
}

// =============================================================================
// Host objects
// =============================================================================

/// Accessor for host objects, backed by the member cache: properties map to
/// `getName`/`isName`/`setName` methods or to a field of the same name.
pub struct ObjectAccessor {
    cache: Arc<MemberCache>,
}

impl ObjectAccessor {
    pub fn new(cache: Arc<MemberCache>) -> Self {
        Self { cache }
    }

    fn property_name<'a>(target: &Value, name: &'a Value) -> EvalResult<&'a str> {
        name.as_str()
            .ok_or_else(|| EvalError::no_such_property(target.type_name(), name.to_string()))
    }
}

impl PropertyAccessor for ObjectAccessor {
    fn get_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        _indexed: bool,
    ) -> EvalResult<Value> {
        let prop = Self::property_name(target, name)?;
        let ty = target.type_key();
        ctx.set_current_accessor(Some(ty.clone()));

        let handle = self.cache.resolve_property(&ty, prop)?;
        match handle {
            Some(handle) => {
                if let Some(getter) = &handle.getter {
                    self.cache.invoke(getter, target, &[])
                } else if let Some(field) = &handle.field {
                    self.cache.read_field(field, target)
                } else {
                    Err(EvalError::no_such_property(ty.as_str(), prop))
                }
            }
            None => Err(EvalError::no_such_property(ty.as_str(), prop)),
        }
    }

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        value: Value,
        _indexed: bool,
    ) -> EvalResult<()> {
        let prop = Self::property_name(target, name)?;
        let ty = target.type_key();
        ctx.set_current_accessor(Some(ty.clone()));

        let handle = self.cache.resolve_property(&ty, prop)?;
        match handle {
            Some(handle) => {
                if let Some(setter) = &handle.setter {
                    self.cache.invoke(setter, target, &[value]).map(|_| ())
                } else if let Some(field) = handle.field.as_ref().filter(|f| f.is_writable()) {
                    self.cache.write_field(field, target, value)
                } else {
                    Err(EvalError::no_such_property(ty.as_str(), prop))
                }
            }
            None => Err(EvalError::no_such_property(ty.as_str(), prop)),
        }
    }

    fn source_accessor(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        _indexed: bool,
    ) -> EvalResult<String> {
        let prop = Self::property_name(target, name)?;
        let ty = target.type_key();
        ctx.set_current_accessor(Some(ty.clone()));

        let handle = self.cache.resolve_property(&ty, prop)?;
        match handle {
            Some(PropertyHandle { getter: Some(getter), .. }) => Ok(format!(".{}()", getter.name())),
            Some(PropertyHandle { field: Some(_), .. }) => Ok(format!(".{}", prop)),
            _ => Err(EvalError::no_such_property(ty.as_str(), prop)),
        }
    }

    fn source_setter(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        _indexed: bool,
    ) -> EvalResult<String> {
        let prop = Self::property_name(target, name)?;
        let ty = target.type_key();
        ctx.set_current_accessor(Some(ty.clone()));

        let handle = self.cache.resolve_property(&ty, prop)?;
        match handle {
            Some(PropertyHandle { setter: Some(setter), .. }) => {
                Ok(format!(".{}($value)", setter.name()))
            }
            Some(PropertyHandle { field: Some(field), .. }) if field.is_writable() => {
                Ok(format!(".{} = $value", prop))
            }
            _ => Err(EvalError::no_such_property(ty.as_str(), prop)),
        }
    }
}

// =============================================================================
// Lists
// =============================================================================

/// Accessor for lists: `length`, numeric indexes and dynamic subscripts.
/// Other names fall back to the list's host members.
pub struct ArrayAccessor {
    fallback: ObjectAccessor,
}

impl ArrayAccessor {
    pub fn new(cache: Arc<MemberCache>) -> Self {
        Self {
            fallback: ObjectAccessor::new(cache),
        }
    }

    fn list<'a>(target: &'a Value) -> EvalResult<&'a ListRef> {
        target
            .as_list()
            .ok_or_else(|| EvalError::coercion(target.type_name(), "List"))
    }
}

impl PropertyAccessor for ArrayAccessor {
    fn get_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<Value> {
        let list = Self::list(target)?;
        ctx.set_current_accessor(Some(target.type_key()));

        match name {
            Value::String(s) if s.as_ref() == "length" => Ok(Value::count(list.len())),
            Value::String(_) => self.fallback.get_property(ctx, target, name, indexed),
            Value::Subscript(DynamicSubscript::All) => Ok(Value::list(list.snapshot())),
            Value::Subscript(subscript) => {
                let items = list.read();
                Ok(subscript
                    .resolve(items.len())
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Null))
            }
            _ => match index_of(name)? {
                Some(index) if index < 0 => Ok(Value::Null),
                Some(index) => {
                    let items = list.read();
                    items
                        .get(index as usize)
                        .cloned()
                        .ok_or_else(|| {
                            ErrorKind::IndexOutOfBounds {
                                index,
                                length: items.len(),
                            }
                            .into()
                        })
                }
                None => Err(EvalError::no_such_property("List", name.to_string())),
            },
        }
    }

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        value: Value,
        indexed: bool,
    ) -> EvalResult<()> {
        let list = Self::list(target)?;
        ctx.set_current_accessor(Some(target.type_key()));

        match name {
            Value::String(_) => self.fallback.set_property(ctx, target, name, value, indexed),
            Value::Subscript(DynamicSubscript::All) => {
                let replacement = match &value {
                    Value::List(source) if source.ptr_eq(list) => return Ok(()),
                    Value::List(source) => source.snapshot(),
                    other => return Err(EvalError::coercion(other.type_name(), "List")),
                };
                let mut items = list.write();
                if replacement.len() != items.len() {
                    return Err(ErrorKind::LengthMismatch {
                        expected: items.len(),
                        actual: replacement.len(),
                    }
                    .into());
                }
                *items = replacement;
                Ok(())
            }
            Value::Subscript(subscript) => {
                let mut items = list.write();
                if let Some(i) = subscript.resolve(items.len()) {
                    items[i] = value;
                }
                Ok(())
            }
            _ => match index_of(name)? {
                Some(index) if index < 0 => Ok(()),
                Some(index) => {
                    let mut items = list.write();
                    let length = items.len();
                    match items.get_mut(index as usize) {
                        Some(slot) => {
                            *slot = value;
                            Ok(())
                        }
                        None => Err(ErrorKind::IndexOutOfBounds { index, length }.into()),
                    }
                }
                None => Err(EvalError::no_such_property("List", name.to_string())),
            },
        }
    }

    fn source_accessor(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<String> {
        let list = Self::list(target)?;
        ctx.set_current_accessor(Some(target.type_key()));

        match name {
            Value::String(s) if s.as_ref() == "length" => {
                ctx.set_current_type(Some(TypeKey::new("Int")));
                Ok(".length".to_string())
            }
            Value::String(_) => self.fallback.source_accessor(ctx, target, name, indexed),
            Value::Subscript(DynamicSubscript::All) => Ok(String::new()),
            Value::Subscript(subscript) => match subscript.resolve(list.len()) {
                Some(i) => Ok(format!("[{}]", i)),
                None => Err(EvalError::unsupported(format!("{} of an empty list", subscript))),
            },
            _ => match index_of(name)? {
                Some(index) => Ok(format!("[{}]", index)),
                None => Err(EvalError::no_such_property("List", name.to_string())),
            },
        }
    }

    fn source_setter(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<String> {
        match name {
            Value::String(_) => self.fallback.source_setter(ctx, target, name, indexed),
            _ => {
                let index = self.source_accessor(ctx, target, name, indexed)?;
                if index.is_empty() {
                    return Err(EvalError::unsupported("whole-list replacement"));
                }
                Ok(format!("{} = $value", index))
            }
        }
    }
}

// =============================================================================
// Maps
// =============================================================================

/// Accessor for maps. Dotted access to `size`, `keys`, `keySet`, `values`
/// and `isEmpty` reads the map itself; every other read is a key lookup.
/// Writes always store under the key.
#[derive(Debug, Default)]
pub struct MapAccessor;

impl MapAccessor {
    fn map<'a>(target: &'a Value) -> EvalResult<&'a MapRef> {
        target
            .as_map()
            .ok_or_else(|| EvalError::coercion(target.type_name(), "Map"))
    }

    fn pseudo_property(map: &MapRef, name: &str) -> Option<Value> {
        Some(match name {
            "size" => Value::count(map.len()),
            "keys" | "keySet" => Value::set(map.keys()),
            "values" => Value::list(map.values()),
            "isEmpty" => Value::Boolean(map.is_empty()),
            _ => return None,
        })
    }
}

impl PropertyAccessor for MapAccessor {
    fn get_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<Value> {
        let map = Self::map(target)?;
        ctx.set_current_accessor(Some(target.type_key()));

        if let (Value::String(s), false) = (name, indexed) {
            if let Some(value) = Self::pseudo_property(map, s) {
                return Ok(value);
            }
        }
        Ok(map.get(name).unwrap_or(Value::Null))
    }

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        value: Value,
        _indexed: bool,
    ) -> EvalResult<()> {
        let map = Self::map(target)?;
        ctx.set_current_accessor(Some(target.type_key()));
        map.insert(name.clone(), value)
            .map(|_| ())
            .map_err(|_| EvalError::coercion("Map", "a key of itself"))
    }

    fn source_accessor(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<String> {
        Self::map(target)?;
        ctx.set_current_accessor(Some(target.type_key()));

        if let (Value::String(s), false) = (name, indexed) {
            let pseudo = match s.as_ref() {
                "size" => Some(("size", "Int")),
                "keys" | "keySet" => Some(("keySet", "Set")),
                "values" => Some(("values", "List")),
                "isEmpty" => Some(("isEmpty", "Boolean")),
                _ => None,
            };
            if let Some((method, ty)) = pseudo {
                ctx.set_current_type(Some(TypeKey::new(ty)));
                return Ok(format!(".{}()", method));
            }
        }
        Ok(format!(".get({})", source_literal(name)))
    }

    fn source_setter(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        _indexed: bool,
    ) -> EvalResult<String> {
        Self::map(target)?;
        ctx.set_current_accessor(Some(target.type_key()));
        Ok(format!(".put({}, $value)", source_literal(name)))
    }
}

// =============================================================================
// Sets
// =============================================================================

/// Accessor for sets: `size` and `isEmpty`, everything else through the
/// set's host members
pub struct SetAccessor {
    fallback: ObjectAccessor,
}

impl SetAccessor {
    pub fn new(cache: Arc<MemberCache>) -> Self {
        Self {
            fallback: ObjectAccessor::new(cache),
        }
    }
}

impl PropertyAccessor for SetAccessor {
    fn get_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<Value> {
        let set = target
            .as_set()
            .ok_or_else(|| EvalError::coercion(target.type_name(), "Set"))?;
        ctx.set_current_accessor(Some(target.type_key()));

        match (name.as_str(), indexed) {
            (Some("size"), false) => Ok(Value::count(set.len())),
            (Some("isEmpty"), false) => Ok(Value::Boolean(set.is_empty())),
            _ => self.fallback.get_property(ctx, target, name, indexed),
        }
    }

    fn set_property(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        value: Value,
        indexed: bool,
    ) -> EvalResult<()> {
        self.fallback.set_property(ctx, target, name, value, indexed)
    }

    fn source_accessor(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<String> {
        match (name.as_str(), indexed) {
            (Some("size"), false) => {
                ctx.set_current_type(Some(TypeKey::new("Int")));
                Ok(".size()".to_string())
            }
            (Some("isEmpty"), false) => {
                ctx.set_current_type(Some(TypeKey::new("Boolean")));
                Ok(".isEmpty()".to_string())
            }
            _ => self.fallback.source_accessor(ctx, target, name, indexed),
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Accessor table: built-in accessors per target kind plus host overrides
/// keyed by type name, which win over the built-ins.
pub struct Accessors {
    object: Arc<dyn PropertyAccessor>,
    array: Arc<dyn PropertyAccessor>,
    map: Arc<dyn PropertyAccessor>,
    set: Arc<dyn PropertyAccessor>,
    custom: DashMap<TypeKey, Arc<dyn PropertyAccessor>>,
}

impl Accessors {
    pub fn new(cache: Arc<MemberCache>) -> Self {
        Self {
            object: Arc::new(ObjectAccessor::new(cache.clone())),
            array: Arc::new(ArrayAccessor::new(cache.clone())),
            map: Arc::new(MapAccessor),
            set: Arc::new(SetAccessor::new(cache)),
            custom: DashMap::new(),
        }
    }

    pub fn register(&self, ty: TypeKey, accessor: Arc<dyn PropertyAccessor>) {
        self.custom.insert(ty, accessor);
    }

    pub fn unregister(&self, ty: &TypeKey) -> Option<Arc<dyn PropertyAccessor>> {
        self.custom.remove(ty).map(|(_, accessor)| accessor)
    }

    /// The accessor responsible for `target`
    pub fn select(&self, target: &Value) -> Arc<dyn PropertyAccessor> {
        if !self.custom.is_empty() {
            if let Some(accessor) = self.custom.get(target.type_name()) {
                return Arc::clone(accessor.value());
            }
        }
        match target {
            Value::List(_) => Arc::clone(&self.array),
            Value::Map(_) => Arc::clone(&self.map),
            Value::Set(_) => Arc::clone(&self.set),
            _ => Arc::clone(&self.object),
        }
    }
}
