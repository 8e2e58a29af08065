//! Closure-backed member resolver
//!
//! Rust has no runtime reflection, so hosts describe their types up front:
//! each class is a set of named closures built with [`ClassBuilder`] and
//! stored in a [`ClassRegistry`], which then serves as the evaluator's
//! [`MemberResolver`].

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::host::{
    ConstructorHandle, FieldHandle, GetterFn, HostError, HostObject, MethodFn, MethodHandle, SetterFn,
};
use crate::resolver::MemberResolver;
use crate::value::{TypeKey, Value};

/// Name of the class every other class implicitly extends
pub const OBJECT_CLASS: &str = "Object";

/// Members of one host type
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: TypeKey,
    parent: Option<String>,
    methods: IndexMap<String, Vec<MethodHandle>>,
    fields: IndexMap<String, FieldHandle>,
    constructors: Vec<ConstructorHandle>,
}

impl ClassDef {
    pub fn name(&self) -> &TypeKey {
        &self.name
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Registry of host classes by name
#[derive(Debug, Default, Clone)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassDef>,
    /// Short aliases for class names, e.g. `Math` for `java.lang.Math`
    aliases: HashMap<String, String>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, merging with any members already registered under its name
    pub fn register(&mut self, class: ClassDef) {
        match self.classes.get_mut(class.name.as_str()) {
            Some(existing) => {
                for (name, handles) in class.methods {
                    existing.methods.entry(name).or_default().extend(handles);
                }
                existing.fields.extend(class.fields);
                existing.constructors.extend(class.constructors);
                if class.parent.is_some() {
                    existing.parent = class.parent;
                }
            }
            None => {
                self.classes.insert(class.name.as_str().to_string(), class);
            }
        }
    }

    pub fn alias(&mut self, alias: &str, class: &str) {
        self.aliases.insert(alias.to_string(), class.to_string());
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// The class and its ancestors, nearest first
    fn lineage(&self, name: &str) -> Vec<&ClassDef> {
        let mut lineage = Vec::new();
        let mut next = Some(name.to_string());
        while let Some(current) = next.take() {
            let Some(class) = self.classes.get(&current) else {
                break;
            };
            if lineage.iter().any(|c: &&ClassDef| c.name == class.name) {
                break;
            }
            lineage.push(class);
            next = match &class.parent {
                Some(parent) => Some(parent.clone()),
                None if current != OBJECT_CLASS => Some(OBJECT_CLASS.to_string()),
                None => None,
            };
        }
        if lineage.is_empty() && name != OBJECT_CLASS {
            lineage.extend(self.classes.get(OBJECT_CLASS));
        }
        lineage
    }
}

impl MemberResolver for ClassRegistry {
    fn class_for_name(&self, name: &str) -> Result<Option<TypeKey>, HostError> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        Ok(self.classes.get(name).map(|class| class.name.clone()))
    }

    fn methods(&self, ty: &TypeKey, name: &str) -> Result<Vec<MethodHandle>, HostError> {
        Ok(self
            .lineage(ty.as_str())
            .into_iter()
            .filter_map(|class| class.methods.get(name))
            .flatten()
            .cloned()
            .collect())
    }

    fn field(&self, ty: &TypeKey, name: &str) -> Result<Option<FieldHandle>, HostError> {
        Ok(self
            .lineage(ty.as_str())
            .into_iter()
            .find_map(|class| class.fields.get(name))
            .cloned())
    }

    fn constructors(&self, ty: &TypeKey) -> Result<Vec<ConstructorHandle>, HostError> {
        Ok(self
            .classes
            .get(ty.as_str())
            .map(|class| class.constructors.clone())
            .unwrap_or_default())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds a [`ClassDef`] whose instance members receive the target already
/// narrowed to `R`.
pub struct ClassBuilder<R: ?Sized + 'static> {
    def: ClassDef,
    cast: fn(&Value) -> Option<&R>,
}

impl<T: HostObject> ClassBuilder<T> {
    /// Builder for a host object type, narrowing targets by downcast
    pub fn for_object(name: &str) -> Self {
        Self::new(name, Value::downcast_ref::<T>)
    }
}

impl ClassBuilder<Value> {
    /// Builder whose members see the raw target value
    pub fn for_value(name: &str) -> Self {
        Self::new(name, as_value)
    }
}

fn as_value(value: &Value) -> Option<&Value> {
    Some(value)
}

impl<R: ?Sized + 'static> ClassBuilder<R> {
    pub fn new(name: &str, cast: fn(&Value) -> Option<&R>) -> Self {
        Self {
            def: ClassDef {
                name: TypeKey::new(name),
                parent: None,
                methods: IndexMap::new(),
                fields: IndexMap::new(),
                constructors: Vec::new(),
            },
            cast,
        }
    }

    pub fn extends(mut self, parent: &str) -> Self {
        self.def.parent = Some(parent.to_string());
        self
    }

    /// Instance method taking exactly `arity` arguments
    pub fn method<F>(mut self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(&R, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let cast = self.cast;
        let class = self.def.name.clone();
        let func: MethodFn = Arc::new(move |target: &Value, args: &[Value]| {
            let this = cast(target).ok_or_else(|| receiver_mismatch(&class, target))?;
            f(this, args)
        });
        self.push_method(MethodHandle::new(self.def.name.clone(), name, arity, false, func));
        self
    }

    pub fn static_method<F>(mut self, name: &str, arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let func: MethodFn = Arc::new(move |_: &Value, args: &[Value]| f(args));
        self.push_method(MethodHandle::new(self.def.name.clone(), name, arity, true, func));
        self
    }

    /// Read-only public field
    pub fn field<F>(mut self, name: &str, get: F) -> Self
    where
        F: Fn(&R) -> Value + Send + Sync + 'static,
    {
        let getter = self.getter(get);
        let handle = FieldHandle::new(self.def.name.clone(), name, false, getter, None);
        self.def.fields.insert(name.to_string(), handle);
        self
    }

    pub fn mutable_field<G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        G: Fn(&R) -> Value + Send + Sync + 'static,
        S: Fn(&R, Value) -> Result<(), HostError> + Send + Sync + 'static,
    {
        let getter = self.getter(get);
        let cast = self.cast;
        let class = self.def.name.clone();
        let setter: SetterFn = Arc::new(move |target: &Value, value: Value| {
            let this = cast(target).ok_or_else(|| receiver_mismatch(&class, target))?;
            set(this, value)
        });
        let handle = FieldHandle::new(self.def.name.clone(), name, false, getter, Some(setter));
        self.def.fields.insert(name.to_string(), handle);
        self
    }

    /// Constant static field
    pub fn static_field(mut self, name: &str, value: Value) -> Self {
        let getter: GetterFn = Arc::new(move |_: &Value| Ok(value.clone()));
        let handle = FieldHandle::new(self.def.name.clone(), name, true, getter, None);
        self.def.fields.insert(name.to_string(), handle);
        self
    }

    pub fn constructor<F>(mut self, arity: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let handle = ConstructorHandle::new(self.def.name.clone(), arity, Arc::new(f));
        self.def.constructors.push(handle);
        self
    }

    pub fn build(self) -> ClassDef {
        self.def
    }

    fn push_method(&mut self, handle: MethodHandle) {
        self.def
            .methods
            .entry(handle.name().to_string())
            .or_default()
            .push(handle);
    }

    fn getter<F>(&self, get: F) -> GetterFn
    where
        F: Fn(&R) -> Value + Send + Sync + 'static,
    {
        let cast = self.cast;
        let class = self.def.name.clone();
        Arc::new(move |target: &Value| {
            let this = cast(target).ok_or_else(|| receiver_mismatch(&class, target))?;
            Ok(get(this))
        })
    }
}

fn receiver_mismatch(class: &TypeKey, target: &Value) -> HostError {
    HostError::new(format!(
        "receiver of type {} is not a {}",
        target.type_name(),
        class
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;

    #[derive(Debug)]
    struct Point {
        x: i32,
    }

    impl HostObject for Point {
        fn type_name(&self) -> &str {
            "Point"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn registry() -> ClassRegistry {
        let mut registry = ClassRegistry::new();
        registry.register(
            ClassBuilder::for_value(OBJECT_CLASS)
                .method("toString", 0, |v, _| Ok(Value::from(v.to_string())))
                .build(),
        );
        registry.register(
            ClassBuilder::<Point>::for_object("Point")
                .method("getX", 0, |p, _| Ok(Value::Int(p.x)))
                .field("x", |p| Value::Int(p.x))
                .constructor(1, |_| Ok(Value::object(Point { x: 1 })))
                .build(),
        );
        registry.alias("geo.Point", "Point");
        registry
    }

    #[test]
    fn test_methods_include_object_members() {
        let registry = registry();
        let ty = TypeKey::new("Point");
        assert_eq!(registry.methods(&ty, "getX").unwrap().len(), 1);
        assert_eq!(registry.methods(&ty, "toString").unwrap().len(), 1);
        assert!(registry.methods(&ty, "getY").unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_types_fall_back_to_object() {
        let registry = registry();
        let methods = registry.methods(&TypeKey::new("Int"), "toString").unwrap();
        let result = methods[0].invoke(&Value::Int(4), &[]).unwrap();
        assert_eq!(result, Value::from("4"));
    }

    #[test]
    fn test_receiver_mismatch_is_host_error() {
        let registry = registry();
        let methods = registry.methods(&TypeKey::new("Point"), "getX").unwrap();
        let err = methods[0].invoke(&Value::Int(1), &[]).unwrap_err();
        assert_eq!(err.message(), "receiver of type Int is not a Point");
    }

    #[test]
    fn test_class_alias() {
        let registry = registry();
        let ty = registry.class_for_name("geo.Point").unwrap();
        assert_eq!(ty, Some(TypeKey::new("Point")));
        assert_eq!(registry.class_for_name("Line").unwrap(), None);
        assert_eq!(registry.constructors(&TypeKey::new("Point")).unwrap().len(), 1);
    }
}
