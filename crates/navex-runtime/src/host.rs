//! Host object model: opaque objects and the member handles the resolver
//! hands back for them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::value::{TypeKey, Value};

/// An object supplied by the host application.
///
/// Properties and methods are never read off the object directly; they are
/// looked up by [`type_name`](HostObject::type_name) through the
/// [`MemberResolver`](crate::resolver::MemberResolver).
pub trait HostObject: Any + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Failure raised by host code (a resolver, getter, setter or method body)
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// =============================================================================
// Member identity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    StaticMethod,
    Field,
    StaticField,
    Constructor,
}

/// Identity of a host member, the key of the permission cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberId {
    pub declaring_type: TypeKey,
    pub name: Arc<str>,
    pub arity: usize,
    pub kind: MemberKind,
}

impl MemberId {
    pub fn new(declaring_type: TypeKey, name: &str, arity: usize, kind: MemberKind) -> Self {
        Self {
            declaring_type,
            name: Arc::from(name),
            arity,
            kind,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, MemberKind::StaticMethod | MemberKind::StaticField)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MemberKind::Method | MemberKind::StaticMethod => {
                write!(f, "invoke.{}.{}", self.declaring_type, self.name)
            }
            MemberKind::Field | MemberKind::StaticField => {
                write!(f, "field.{}.{}", self.declaring_type, self.name)
            }
            MemberKind::Constructor => write!(f, "new.{}/{}", self.declaring_type, self.arity),
        }
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Method body: receives the target (null for statics) and the arguments
pub type MethodFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, HostError> + Send + Sync>;

pub type GetterFn = Arc<dyn Fn(&Value) -> Result<Value, HostError> + Send + Sync>;

pub type SetterFn = Arc<dyn Fn(&Value, Value) -> Result<(), HostError> + Send + Sync>;

pub type ConstructorFn = Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>;

/// A resolved method
#[derive(Clone)]
pub struct MethodHandle {
    id: MemberId,
    func: MethodFn,
}

impl MethodHandle {
    pub fn new(declaring_type: TypeKey, name: &str, arity: usize, is_static: bool, func: MethodFn) -> Self {
        let kind = if is_static {
            MemberKind::StaticMethod
        } else {
            MemberKind::Method
        };
        Self {
            id: MemberId::new(declaring_type, name, arity, kind),
            func,
        }
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn arity(&self) -> usize {
        self.id.arity
    }

    pub fn is_static(&self) -> bool {
        self.id.is_static()
    }

    /// Call the method. Permission checks happen in the member cache, not here.
    pub fn invoke(&self, target: &Value, args: &[Value]) -> Result<Value, HostError> {
        (self.func)(target, args)
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle").field("id", &self.id).finish()
    }
}

/// A resolved field, optionally writable
#[derive(Clone)]
pub struct FieldHandle {
    id: MemberId,
    getter: GetterFn,
    setter: Option<SetterFn>,
}

impl FieldHandle {
    pub fn new(declaring_type: TypeKey, name: &str, is_static: bool, getter: GetterFn, setter: Option<SetterFn>) -> Self {
        let kind = if is_static {
            MemberKind::StaticField
        } else {
            MemberKind::Field
        };
        Self {
            id: MemberId::new(declaring_type, name, 0, kind),
            getter,
            setter,
        }
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn is_static(&self) -> bool {
        self.id.is_static()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn get(&self, target: &Value) -> Result<Value, HostError> {
        (self.getter)(target)
    }

    pub fn set(&self, target: &Value, value: Value) -> Result<(), HostError> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(HostError::new(format!("field {} is read-only", self.id.name))),
        }
    }
}

impl fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandle")
            .field("id", &self.id)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// A resolved constructor
#[derive(Clone)]
pub struct ConstructorHandle {
    id: MemberId,
    func: ConstructorFn,
}

impl ConstructorHandle {
    pub fn new(declaring_type: TypeKey, arity: usize, func: ConstructorFn) -> Self {
        Self {
            id: MemberId::new(declaring_type, "<init>", arity, MemberKind::Constructor),
            func,
        }
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn arity(&self) -> usize {
        self.id.arity
    }

    pub fn construct(&self, args: &[Value]) -> Result<Value, HostError> {
        (self.func)(args)
    }
}

impl fmt::Debug for ConstructorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorHandle").field("id", &self.id).finish()
    }
}
