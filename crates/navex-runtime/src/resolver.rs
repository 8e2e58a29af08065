//! Host capabilities the runtime depends on

use crate::host::{ConstructorHandle, FieldHandle, HostError, MemberId, MethodHandle};
use crate::value::TypeKey;

/// Enumerates the members of host types.
///
/// Results are memoized by the [`MemberCache`](crate::cache::MemberCache), so
/// a resolver may be slow; it must however answer the same question the same
/// way until the host invalidates the cache.
pub trait MemberResolver: Send + Sync {
    /// Look up a type by its class name, as used by `@Class@member` and `new Class()`
    fn class_for_name(&self, name: &str) -> Result<Option<TypeKey>, HostError>;

    /// All methods named `name` on `ty`, static and instance, of any arity
    fn methods(&self, ty: &TypeKey, name: &str) -> Result<Vec<MethodHandle>, HostError>;

    fn field(&self, ty: &TypeKey, name: &str) -> Result<Option<FieldHandle>, HostError>;

    fn constructors(&self, ty: &TypeKey) -> Result<Vec<ConstructorHandle>, HostError>;
}

/// Decides whether a member may be invoked or read
pub trait PermissionPolicy: Send + Sync {
    fn is_allowed(&self, member: &MemberId) -> bool;
}

/// Policy that allows everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl PermissionPolicy for AllowAll {
    fn is_allowed(&self, _member: &MemberId) -> bool {
        true
    }
}

impl<F> PermissionPolicy for F
where
    F: Fn(&MemberId) -> bool + Send + Sync,
{
    fn is_allowed(&self, member: &MemberId) -> bool {
        self(member)
    }
}
