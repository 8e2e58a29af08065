//! Thread-safe memoization of member resolution
//!
//! Every lookup the evaluator makes against the host (methods, fields,
//! constructors, property accessors, classes, permission answers) goes
//! through a [`ResolutionCache`]. Each key is computed at most once: racing
//! threads wait on a per-key slot while the first one resolves it, and the
//! map's shard lock is never held while host code runs.

use std::hash::Hash;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::host::{ConstructorHandle, FieldHandle, HostError, MemberId, MethodHandle};
use crate::resolver::{AllowAll, MemberResolver, PermissionPolicy};
use crate::value::{TypeKey, Value};

struct Slot<V> {
    value: OnceLock<V>,
    init: Mutex<()>,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }
}

/// Concurrent compute-once map.
///
/// Failed computations are not stored, so a transient resolver error is
/// retried by the next caller.
pub struct ResolutionCache<K, V> {
    entries: DashMap<K, Arc<Slot<V>>>,
}

impl<K, V> Default for ResolutionCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> ResolutionCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key)?.value.get().cloned()
    }

    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        // Clone the slot out so the shard guard drops before we block
        let slot = Arc::clone(self.entries.entry(key).or_default().value());
        let _guard = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = slot.value.get() {
            return Ok(value.clone());
        }
        let value = compute()?;
        Ok(slot.value.get_or_init(|| value).clone())
    }

    /// Drop entries whose key fails the predicate
    pub fn retain(&self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of resolved entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().value.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Member cache
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MethodKey {
    ty: TypeKey,
    name: Arc<str>,
    arity: usize,
    is_static: bool,
}

type NamedKey = (TypeKey, Arc<str>);

/// Accessors found for one property name by naming convention
#[derive(Debug, Clone)]
pub struct PropertyHandle {
    pub getter: Option<MethodHandle>,
    pub setter: Option<MethodHandle>,
    pub field: Option<FieldHandle>,
}

impl PropertyHandle {
    pub fn is_readable(&self) -> bool {
        self.getter.is_some() || self.field.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some() || self.field.as_ref().is_some_and(FieldHandle::is_writable)
    }
}

/// Resolved host members, shared by every evaluation that uses the same
/// resolver
pub struct MemberCache {
    resolver: Arc<dyn MemberResolver>,
    policy: Arc<dyn PermissionPolicy>,
    classes: ResolutionCache<Arc<str>, Option<TypeKey>>,
    methods: ResolutionCache<MethodKey, Option<MethodHandle>>,
    fields: ResolutionCache<NamedKey, Option<FieldHandle>>,
    constructors: ResolutionCache<(TypeKey, usize), Option<ConstructorHandle>>,
    properties: ResolutionCache<NamedKey, Option<PropertyHandle>>,
    permissions: ResolutionCache<MemberId, bool>,
}

impl MemberCache {
    pub fn new(resolver: Arc<dyn MemberResolver>) -> Self {
        Self {
            resolver,
            policy: Arc::new(AllowAll),
            classes: ResolutionCache::new(),
            methods: ResolutionCache::new(),
            fields: ResolutionCache::new(),
            constructors: ResolutionCache::new(),
            properties: ResolutionCache::new(),
            permissions: ResolutionCache::new(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn PermissionPolicy>) -> Self {
        self.policy = policy;
        self.permissions.clear();
        self
    }

    pub fn resolver(&self) -> &Arc<dyn MemberResolver> {
        &self.resolver
    }

    pub fn resolve_class(&self, name: &str) -> EvalResult<Option<TypeKey>> {
        self.classes.get_or_try_insert_with(Arc::from(name), || {
            trace!(class = name, "resolving class");
            self.resolver
                .class_for_name(name)
                .map_err(|e| resolution_failed(format!("class {}", name), e))
        })
    }

    /// Look up a class by name, failing if it is unknown
    pub fn require_class(&self, name: &str) -> EvalResult<TypeKey> {
        self.resolve_class(name)?
            .ok_or_else(|| ErrorKind::NoSuchClass(name.to_string()).into())
    }

    /// Find a method by name and arity. Instance lookups fall back to a
    /// static method of the same shape; static lookups see statics only.
    pub fn resolve_method(
        &self,
        ty: &TypeKey,
        name: &str,
        arity: usize,
        is_static: bool,
    ) -> EvalResult<Option<MethodHandle>> {
        let key = MethodKey {
            ty: ty.clone(),
            name: Arc::from(name),
            arity,
            is_static,
        };
        self.methods.get_or_try_insert_with(key, || {
            trace!(%ty, name, arity, is_static, "resolving method");
            let candidates = self
                .resolver
                .methods(ty, name)
                .map_err(|e| resolution_failed(format!("method {}.{}", ty, name), e))?;
            let shaped = |want_static: bool| {
                candidates
                    .iter()
                    .find(|m| m.arity() == arity && m.is_static() == want_static)
                    .cloned()
            };
            Ok(if is_static {
                shaped(true)
            } else {
                shaped(false).or_else(|| shaped(true))
            })
        })
    }

    pub fn resolve_field(&self, ty: &TypeKey, name: &str) -> EvalResult<Option<FieldHandle>> {
        self.fields
            .get_or_try_insert_with((ty.clone(), Arc::from(name)), || {
                trace!(%ty, name, "resolving field");
                self.resolver
                    .field(ty, name)
                    .map_err(|e| resolution_failed(format!("field {}.{}", ty, name), e))
            })
    }

    pub fn resolve_constructor(&self, ty: &TypeKey, arity: usize) -> EvalResult<Option<ConstructorHandle>> {
        self.constructors.get_or_try_insert_with((ty.clone(), arity), || {
            trace!(%ty, arity, "resolving constructor");
            let candidates = self
                .resolver
                .constructors(ty)
                .map_err(|e| resolution_failed(format!("constructor {}", ty), e))?;
            Ok(candidates.into_iter().find(|c| c.arity() == arity))
        })
    }

    /// Resolve the accessors of a property: `isName()`/`getName()` as the
    /// getter, `setName(value)` as the setter, and a field named `name`.
    pub fn resolve_property(&self, ty: &TypeKey, name: &str) -> EvalResult<Option<PropertyHandle>> {
        self.properties
            .get_or_try_insert_with((ty.clone(), Arc::from(name)), || {
                trace!(%ty, name, "resolving property");
                let base = capitalize(name);
                let getter = match self.resolve_method(ty, &format!("is{}", base), 0, false)? {
                    Some(getter) => Some(getter),
                    None => self.resolve_method(ty, &format!("get{}", base), 0, false)?,
                };
                let setter = self.resolve_method(ty, &format!("set{}", base), 1, false)?;
                let field = self.resolve_field(ty, name)?;

                let handle = PropertyHandle {
                    getter,
                    setter,
                    field,
                };
                Ok::<_, EvalError>(
                    (handle.is_readable() || handle.is_writable()).then_some(handle),
                )
            })
    }

    /// Whether the permission policy allows using `member`
    pub fn is_permitted(&self, member: &MemberId) -> bool {
        self.permissions
            .get_or_try_insert_with(member.clone(), || {
                Ok::<_, std::convert::Infallible>(self.policy.is_allowed(member))
            })
            .unwrap_or(false)
    }

    pub fn ensure_permitted(&self, member: &MemberId) -> EvalResult<()> {
        if self.is_permitted(member) {
            Ok(())
        } else {
            debug!(%member, "member access denied");
            Err(ErrorKind::MemberAccessDenied(member.to_string()).into())
        }
    }

    /// Invoke a method after the permission check
    pub fn invoke(&self, method: &MethodHandle, target: &Value, args: &[Value]) -> EvalResult<Value> {
        self.ensure_permitted(method.id())?;
        method
            .invoke(target, args)
            .map_err(|e| invocation_failed(method.id(), e))
    }

    pub fn construct(&self, ctor: &ConstructorHandle, args: &[Value]) -> EvalResult<Value> {
        self.ensure_permitted(ctor.id())?;
        ctor.construct(args).map_err(|e| invocation_failed(ctor.id(), e))
    }

    pub fn read_field(&self, field: &FieldHandle, target: &Value) -> EvalResult<Value> {
        self.ensure_permitted(field.id())?;
        field.get(target).map_err(|e| invocation_failed(field.id(), e))
    }

    pub fn write_field(&self, field: &FieldHandle, target: &Value, value: Value) -> EvalResult<()> {
        self.ensure_permitted(field.id())?;
        field
            .set(target, value)
            .map_err(|e| invocation_failed(field.id(), e))
    }

    /// Forget cached members of one type, or of every type with `None`
    pub fn invalidate(&self, ty: Option<&TypeKey>) {
        match ty {
            Some(ty) => {
                debug!(%ty, "invalidating member cache");
                self.methods.retain(|key| &key.ty != ty);
                self.fields.retain(|(t, _)| t != ty);
                self.constructors.retain(|(t, _)| t != ty);
                self.properties.retain(|(t, _)| t != ty);
                self.permissions.retain(|member| &member.declaring_type != ty);
                // Class names may alias the type under another name
                self.classes.clear();
            }
            None => {
                debug!("clearing member cache");
                self.classes.clear();
                self.methods.clear();
                self.fields.clear();
                self.constructors.clear();
                self.properties.clear();
                self.permissions.clear();
            }
        }
    }

    /// Number of resolved entries across all tables
    pub fn entry_count(&self) -> usize {
        self.classes.len()
            + self.methods.len()
            + self.fields.len()
            + self.constructors.len()
            + self.properties.len()
            + self.permissions.len()
    }
}

impl std::fmt::Debug for MemberCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberCache")
            .field("entries", &self.entry_count())
            .finish_non_exhaustive()
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn resolution_failed(member: String, source: HostError) -> EvalError {
    debug!(%member, error = %source, "member resolution failed");
    ErrorKind::ResolutionFailed { member, source }.into()
}

fn invocation_failed(member: &MemberId, source: HostError) -> EvalError {
    debug!(%member, error = %source, "host invocation failed");
    ErrorKind::HostInvocationFailure {
        member: member.to_string(),
        source,
    }
    .into()
}
