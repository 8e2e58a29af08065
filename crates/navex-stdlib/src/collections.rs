//! List, Map and Set classes

use indexmap::IndexSet;
use navex_runtime::ops;
use navex_runtime::{ClassBuilder, ClassRegistry, HostError, ListRef, MapRef, Value};

use crate::{get_arg, get_int_arg};

pub fn register(registry: &mut ClassRegistry) {
    registry.register(
        ClassBuilder::new("List", Value::as_list)
            .method("size", 0, |this: &ListRef, _: &[Value]| Ok(Value::count(this.len())))
            .method("isEmpty", 0, |this: &ListRef, _: &[Value]| Ok(Value::Boolean(this.is_empty())))
            .method("get", 1, list_get)
            .method("set", 2, list_set)
            .method("add", 1, list_add)
            .method("remove", 1, list_remove)
            .method("contains", 1, list_contains)
            .method("indexOf", 1, list_index_of)
            .method("clear", 0, list_clear)
            .build(),
    );

    registry.register(
        ClassBuilder::new("Map", Value::as_map)
            .method("size", 0, |this: &MapRef, _: &[Value]| Ok(Value::count(this.len())))
            .method("isEmpty", 0, |this: &MapRef, _: &[Value]| Ok(Value::Boolean(this.is_empty())))
            .method("get", 1, map_get)
            .method("put", 2, map_put)
            .method("containsKey", 1, map_contains_key)
            .method("containsValue", 1, map_contains_value)
            .method("remove", 1, map_remove)
            .method("keySet", 0, |this: &MapRef, _: &[Value]| Ok(Value::set(this.keys())))
            .method("values", 0, |this: &MapRef, _: &[Value]| Ok(Value::list(this.values())))
            .build(),
    );

    registry.register(
        ClassBuilder::new("Set", Value::as_set)
            .method("size", 0, |this: &IndexSet<Value>, _: &[Value]| Ok(Value::count(this.len())))
            .method("isEmpty", 0, |this: &IndexSet<Value>, _: &[Value]| Ok(Value::Boolean(this.is_empty())))
            .method("contains", 1, set_contains)
            .build(),
    );
}

fn list_index(this: &ListRef, args: &[Value]) -> Result<usize, HostError> {
    let i = get_int_arg(args, 0)?;
    let len = this.len();
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| HostError::new(format!("index {} out of range for length {}", i, len)))
}

fn list_get(this: &ListRef, args: &[Value]) -> Result<Value, HostError> {
    let i = list_index(this, args)?;
    Ok(this.get(i).unwrap_or_default())
}

fn list_set(this: &ListRef, args: &[Value]) -> Result<Value, HostError> {
    let i = list_index(this, args)?;
    let value = get_arg(args, 1)?.clone();
    let mut items = this.write();
    match items.get_mut(i) {
        Some(slot) => Ok(std::mem::replace(slot, value)),
        None => Err(HostError::new(format!("index {} out of range", i))),
    }
}

fn list_add(this: &ListRef, args: &[Value]) -> Result<Value, HostError> {
    this.write().push(get_arg(args, 0)?.clone());
    Ok(Value::Boolean(true))
}

fn list_remove(this: &ListRef, args: &[Value]) -> Result<Value, HostError> {
    let i = list_index(this, args)?;
    let mut items = this.write();
    if i < items.len() {
        Ok(items.remove(i))
    } else {
        Err(HostError::new(format!("index {} out of range", i)))
    }
}

fn list_contains(this: &ListRef, args: &[Value]) -> Result<Value, HostError> {
    let needle = get_arg(args, 0)?;
    Ok(Value::Boolean(this.read().iter().any(|item| ops::equal(item, needle))))
}

fn list_index_of(this: &ListRef, args: &[Value]) -> Result<Value, HostError> {
    let needle = get_arg(args, 0)?;
    let index = this
        .read()
        .iter()
        .position(|item| ops::equal(item, needle))
        .map_or(Value::Int(-1), Value::count);
    Ok(index)
}

fn list_clear(this: &ListRef, _args: &[Value]) -> Result<Value, HostError> {
    this.write().clear();
    Ok(Value::Null)
}

fn map_get(this: &MapRef, args: &[Value]) -> Result<Value, HostError> {
    Ok(this.get(get_arg(args, 0)?).unwrap_or_default())
}

fn map_put(this: &MapRef, args: &[Value]) -> Result<Value, HostError> {
    let key = get_arg(args, 0)?.clone();
    let value = get_arg(args, 1)?.clone();
    this.insert(key, value)
        .map(Option::unwrap_or_default)
        .map_err(|_| HostError::new("a map cannot be a key of itself"))
}

fn map_contains_key(this: &MapRef, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(this.contains_key(get_arg(args, 0)?)))
}

fn map_contains_value(this: &MapRef, args: &[Value]) -> Result<Value, HostError> {
    let needle = get_arg(args, 0)?;
    Ok(Value::Boolean(this.read().values().any(|v| ops::equal(v, needle))))
}

fn map_remove(this: &MapRef, args: &[Value]) -> Result<Value, HostError> {
    Ok(this.remove(get_arg(args, 0)?).unwrap_or_default())
}

fn set_contains(this: &IndexSet<Value>, args: &[Value]) -> Result<Value, HostError> {
    let needle = get_arg(args, 0)?;
    Ok(Value::Boolean(this.iter().any(|item| ops::equal(item, needle))))
}
