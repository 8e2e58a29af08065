//! navex Standard Library
//!
//! This crate provides the built-in classes for the values the evaluator
//! produces, registered into a [`ClassRegistry`].

mod base;
mod collections;
mod math;
mod string;

use navex_runtime::{ClassRegistry, EvalError, HostError, Value};

/// Register all standard library classes
pub fn register_stdlib(registry: &mut ClassRegistry) {
    base::register(registry);
    string::register(registry);
    collections::register(registry);
    math::register(registry);
}

/// Create a class registry with all stdlib classes registered
pub fn stdlib_registry() -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    register_stdlib(&mut registry);
    registry
}

fn get_arg(args: &[Value], idx: usize) -> Result<&Value, HostError> {
    args.get(idx)
        .ok_or_else(|| HostError::new(format!("missing argument {}", idx + 1)))
}

fn get_int_arg(args: &[Value], idx: usize) -> Result<i64, HostError> {
    navex_runtime::ops::long_value(get_arg(args, idx)?).map_err(invalid_arg)
}

fn get_double_arg(args: &[Value], idx: usize) -> Result<f64, HostError> {
    navex_runtime::ops::double_value(get_arg(args, idx)?).map_err(invalid_arg)
}

fn invalid_arg(err: EvalError) -> HostError {
    HostError::with_source("invalid argument", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use navex_runtime::{MemberResolver, TypeKey};

    #[test]
    fn test_registry_contents() {
        let registry = stdlib_registry();
        for class in ["Object", "Number", "Int", "String", "List", "Map", "Set", "Math"] {
            assert!(registry.contains(class), "missing {}", class);
        }
        assert_eq!(
            registry.class_for_name("java.lang.Math").unwrap(),
            Some(TypeKey::new("Math"))
        );
    }

    #[test]
    fn test_inherited_to_string() {
        let registry = stdlib_registry();
        let methods = registry.methods(&TypeKey::new("Int"), "toString").unwrap();
        assert_eq!(methods.len(), 1);
        let result = methods[0].invoke(&Value::Int(42), &[]).unwrap();
        assert_eq!(result, Value::from("42"));
    }
}
