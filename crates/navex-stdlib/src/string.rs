//! String class
//!
//! Indices count characters, not bytes.

use navex_runtime::{ClassBuilder, ClassRegistry, HostError, Value};

use crate::{get_arg, get_int_arg};

pub fn register(registry: &mut ClassRegistry) {
    registry.register(
        ClassBuilder::new("String", Value::as_str)
            .method("length", 0, string_length)
            .method("isEmpty", 0, string_is_empty)
            .method("toUpperCase", 0, string_to_upper_case)
            .method("toLowerCase", 0, string_to_lower_case)
            .method("trim", 0, string_trim)
            .method("substring", 1, string_substring)
            .method("substring", 2, string_substring)
            .method("indexOf", 1, string_index_of)
            .method("lastIndexOf", 1, string_last_index_of)
            .method("contains", 1, string_contains)
            .method("startsWith", 1, string_starts_with)
            .method("endsWith", 1, string_ends_with)
            .method("charAt", 1, string_char_at)
            .method("concat", 1, string_concat)
            .method("replace", 2, string_replace)
            .method("split", 1, string_split)
            .method("equals", 1, string_equals)
            .build(),
    );
}

/// Arguments are read through their display form, so `"a".concat(1)` works
fn text_arg(args: &[Value], idx: usize) -> Result<String, HostError> {
    Ok(get_arg(args, idx)?.to_string())
}

fn char_index(this: &str, args: &[Value], idx: usize) -> Result<usize, HostError> {
    let len = this.chars().count();
    let i = get_int_arg(args, idx)?;
    usize::try_from(i)
        .ok()
        .filter(|&i| i <= len)
        .ok_or_else(|| HostError::new(format!("index {} out of range for length {}", i, len)))
}

/// Character offset of a byte offset
fn chars_before(this: &str, byte: usize) -> Value {
    Value::count(this[..byte].chars().count())
}

fn string_length(this: &str, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::count(this.chars().count()))
}

fn string_is_empty(this: &str, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(this.is_empty()))
}

fn string_to_upper_case(this: &str, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::from(this.to_uppercase()))
}

fn string_to_lower_case(this: &str, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::from(this.to_lowercase()))
}

fn string_trim(this: &str, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::from(this.trim()))
}

fn string_substring(this: &str, args: &[Value]) -> Result<Value, HostError> {
    let start = char_index(this, args, 0)?;
    let end = if args.len() > 1 {
        char_index(this, args, 1)?
    } else {
        this.chars().count()
    };
    if start > end {
        return Err(HostError::new(format!("begin {} is after end {}", start, end)));
    }
    let result: String = this.chars().skip(start).take(end - start).collect();
    Ok(Value::from(result))
}

fn string_index_of(this: &str, args: &[Value]) -> Result<Value, HostError> {
    let needle = text_arg(args, 0)?;
    Ok(this.find(&needle).map_or(Value::Int(-1), |b| chars_before(this, b)))
}

fn string_last_index_of(this: &str, args: &[Value]) -> Result<Value, HostError> {
    let needle = text_arg(args, 0)?;
    Ok(this.rfind(&needle).map_or(Value::Int(-1), |b| chars_before(this, b)))
}

fn string_contains(this: &str, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(this.contains(&text_arg(args, 0)?)))
}

fn string_starts_with(this: &str, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(this.starts_with(&text_arg(args, 0)?)))
}

fn string_ends_with(this: &str, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(this.ends_with(&text_arg(args, 0)?)))
}

fn string_char_at(this: &str, args: &[Value]) -> Result<Value, HostError> {
    let i = get_int_arg(args, 0)?;
    usize::try_from(i)
        .ok()
        .and_then(|i| this.chars().nth(i))
        .map(Value::Char)
        .ok_or_else(|| HostError::new(format!("index {} out of range", i)))
}

fn string_concat(this: &str, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::from(format!("{}{}", this, text_arg(args, 0)?)))
}

fn string_replace(this: &str, args: &[Value]) -> Result<Value, HostError> {
    let from = text_arg(args, 0)?;
    let to = text_arg(args, 1)?;
    Ok(Value::from(this.replace(&from, &to)))
}

fn string_split(this: &str, args: &[Value]) -> Result<Value, HostError> {
    let separator = text_arg(args, 0)?;
    let parts = this.split(separator.as_str()).map(Value::from).collect();
    Ok(Value::list(parts))
}

fn string_equals(this: &str, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(get_arg(args, 0)?.as_str() == Some(this)))
}
