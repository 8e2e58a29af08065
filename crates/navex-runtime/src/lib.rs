//! navex Runtime
//!
//! This crate provides the evaluation engine for navex expressions: values,
//! numeric coercion, member resolution and caching, property accessors and
//! the per-evaluation context.

pub mod accessor;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod ops;
pub mod registry;
pub mod resolver;
pub mod value;

pub use accessor::{Accessors, ArrayAccessor, MapAccessor, ObjectAccessor, PropertyAccessor, SetAccessor};
pub use cache::{MemberCache, PropertyHandle, ResolutionCache};
pub use compiler::{CompileRequest, CompiledAccessor, CompiledExpression, ExpressionCompiler, SourceFragment};
pub use config::EvaluatorConfig;
pub use context::{ContextSnapshot, EvalContext};
pub use error::{ErrorKind, ErrorLocation, EvalError, EvalResult};
pub use evaluator::Evaluator;
pub use host::{
    ConstructorHandle, FieldHandle, HostError, HostObject, MemberId, MemberKind, MethodHandle,
};
pub use registry::{ClassBuilder, ClassDef, ClassRegistry};
pub use resolver::{AllowAll, MemberResolver, PermissionPolicy};
pub use value::{ListRef, MapRef, TypeKey, Value};
