//! Object, Boolean and number classes

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use navex_runtime::ops;
use navex_runtime::registry::OBJECT_CLASS;
use navex_runtime::{ClassBuilder, ClassRegistry, HostError, Value};

use crate::{get_arg, invalid_arg};

const NUMBER_CLASS: &str = "Number";

const NUMBER_TYPES: [&str; 8] = [
    "Byte",
    "Short",
    "Int",
    "Long",
    "Float",
    "Double",
    "BigInteger",
    "BigDecimal",
];

pub fn register(registry: &mut ClassRegistry) {
    registry.register(
        ClassBuilder::for_value(OBJECT_CLASS)
            .method("toString", 0, any_to_string)
            .method("equals", 1, any_equals)
            .method("hashCode", 0, any_hash_code)
            .build(),
    );

    registry.register(
        ClassBuilder::for_value("Boolean")
            .method("booleanValue", 0, bool_value)
            .build(),
    );

    registry.register(
        ClassBuilder::for_value("Char")
            .method("charValue", 0, |this: &Value, _: &[Value]| Ok(this.clone()))
            .build(),
    );

    registry.register(
        ClassBuilder::for_value(NUMBER_CLASS)
            .method("intValue", 0, number_int_value)
            .method("longValue", 0, number_long_value)
            .method("floatValue", 0, number_float_value)
            .method("doubleValue", 0, number_double_value)
            .method("compareTo", 1, number_compare_to)
            .build(),
    );
    for ty in NUMBER_TYPES {
        registry.register(ClassBuilder::for_value(ty).extends(NUMBER_CLASS).build());
    }
}

fn any_to_string(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::from(this.to_string()))
}

fn any_equals(this: &Value, args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(ops::equal(this, get_arg(args, 0)?)))
}

fn any_hash_code(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    let mut hasher = DefaultHasher::new();
    this.hash(&mut hasher);
    Ok(Value::Int(hasher.finish() as i32))
}

fn bool_value(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::Boolean(ops::boolean_value(this)))
}

fn number_int_value(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    let n = ops::long_value(this).map_err(invalid_arg)?;
    Ok(Value::Int(n as i32))
}

fn number_long_value(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    ops::long_value(this).map(Value::Long).map_err(invalid_arg)
}

fn number_float_value(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    let n = ops::double_value(this).map_err(invalid_arg)?;
    Ok(Value::Float(n as f32))
}

fn number_double_value(this: &Value, _args: &[Value]) -> Result<Value, HostError> {
    ops::double_value(this).map(Value::Double).map_err(invalid_arg)
}

fn number_compare_to(this: &Value, args: &[Value]) -> Result<Value, HostError> {
    let ordering = ops::compare(this, get_arg(args, 0)?).map_err(invalid_arg)?;
    Ok(Value::Int(ordering as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_conversions() {
        assert_eq!(number_int_value(&Value::Double(3.9), &[]).unwrap(), Value::Int(3));
        assert_eq!(number_double_value(&Value::Int(2), &[]).unwrap(), Value::Double(2.0));
        assert_eq!(
            number_compare_to(&Value::Int(1), &[Value::Double(2.5)]).unwrap(),
            Value::Int(-1)
        );
    }

    #[test]
    fn test_equals_is_numeric_aware() {
        assert_eq!(
            any_equals(&Value::Int(1), &[Value::Long(1)]).unwrap(),
            Value::Boolean(true)
        );
    }
}
