//! Prototype type descriptions.
//!
//! A [`PrototypeType`] is the immutable runtime description a proxy type is
//! synthesized from: kind, visibility, generic context, fields,
//! constructors, and members. Prototypes are built through the fluent
//! builders at the bottom of this module and handed to the type cache;
//! their [`PrototypeId`] is the cache key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::DispatchError;
use crate::instance::ProxyInstance;
use crate::model::types::{GenericParam, TypeExpr};
use crate::value::Value;

/// Process-unique identity of a prototype; the type cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrototypeId(u64);

impl PrototypeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        PrototypeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Whether a prototype describes a class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

/// Declared visibility of a prototype, member, or constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

impl Visibility {
    /// Visible outside the defining unit.
    pub fn is_externally_visible(self) -> bool {
        matches!(self, Visibility::Public)
    }
}

/// Member modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_final: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub visibility: Visibility,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            is_static: false,
            is_final: false,
            is_abstract: false,
            is_virtual: false,
            visibility: Visibility::Public,
        }
    }
}

impl Modifiers {
    /// Whether the member can be overridden on a derived type.
    pub fn is_overridable(&self) -> bool {
        (self.is_virtual || self.is_abstract) && !self.is_final && !self.is_static
    }
}

/// Base implementation of a method member: `(instance, type_args, args)`.
pub type MethodBody =
    Arc<dyn Fn(&ProxyInstance, &[TypeExpr], &[Value]) -> Result<Value, DispatchError> + Send + Sync>;

/// Base implementation of a property getter: `(instance, index_args)`.
pub type GetterBody =
    Arc<dyn Fn(&ProxyInstance, &[Value]) -> Result<Value, DispatchError> + Send + Sync>;

/// Base implementation of a property setter: `(instance, index_args, value)`.
pub type SetterBody =
    Arc<dyn Fn(&ProxyInstance, &[Value], Value) -> Result<(), DispatchError> + Send + Sync>;

/// Constructor body: `(instance, args)` run after fields take their
/// initial values.
pub type CtorBody =
    Arc<dyn Fn(&ProxyInstance, &[Value]) -> Result<(), DispatchError> + Send + Sync>;

/// One declared (non-index) parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub ty: TypeExpr,
}

impl ParamInfo {
    pub fn new(name: &str, ty: TypeExpr) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

/// One instance field with its initial value.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: TypeExpr,
    pub initial: Value,
}

/// One prototype constructor.
#[derive(Clone)]
pub struct ConstructorInfo {
    pub params: Vec<ParamInfo>,
    pub visibility: Visibility,
    pub init: Option<CtorBody>,
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("params", &self.params)
            .field("visibility", &self.visibility)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}

/// Member shape: a method or a property.
#[derive(Clone)]
pub enum MemberKind {
    Method {
        /// Concrete base implementation; `None` marks the member abstract
        /// on a class prototype (interfaces may still carry defaults).
        body: Option<MethodBody>,
    },
    Property {
        getter: Option<GetterBody>,
        setter: Option<SetterBody>,
        readable: bool,
        writable: bool,
        indexed: bool,
        /// Other property names to notify after a write (change-notification
        /// variant only).
        related: Vec<String>,
    },
}

impl fmt::Debug for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Method { body } => f
                .debug_struct("Method")
                .field("has_body", &body.is_some())
                .finish(),
            MemberKind::Property {
                readable,
                writable,
                indexed,
                related,
                getter,
                setter,
            } => f
                .debug_struct("Property")
                .field("readable", readable)
                .field("writable", writable)
                .field("indexed", indexed)
                .field("related", related)
                .field("has_getter", &getter.is_some())
                .field("has_setter", &setter.is_some())
                .finish(),
        }
    }
}

/// One prototype member.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: String,
    pub kind: MemberKind,
    pub modifiers: Modifiers,
    pub generic_params: Vec<GenericParam>,
    pub params: Vec<ParamInfo>,
    /// Return type of a method, or the value type of a property.
    pub return_type: TypeExpr,
}

impl MemberInfo {
    /// Whether any base implementation exists for this member.
    pub fn has_body(&self) -> bool {
        match &self.kind {
            MemberKind::Method { body } => body.is_some(),
            MemberKind::Property { getter, setter, .. } => {
                getter.is_some() || setter.is_some()
            }
        }
    }

    /// Abstract in the context of the declaring prototype: an explicit
    /// abstract modifier, or an interface member without a default body.
    pub fn is_abstract_on(&self, kind: TypeKind) -> bool {
        self.modifiers.is_abstract || (kind == TypeKind::Interface && !self.has_body())
    }

    /// Overridable in the context of the declaring prototype. Interface
    /// members are implicitly overridable.
    pub fn is_overridable_on(&self, kind: TypeKind) -> bool {
        if self.modifiers.is_static || self.modifiers.is_final {
            return false;
        }
        kind == TypeKind::Interface || self.modifiers.is_overridable()
    }
}

/// An immutable prototype description.
#[derive(Debug)]
pub struct PrototypeType {
    id: PrototypeId,
    pub name: String,
    pub kind: TypeKind,
    pub visibility: Visibility,
    pub sealed: bool,
    /// Generic parameters of the type itself, paired one-to-one with the
    /// concrete `type_args` closing them. Both empty for non-generic types.
    pub generic_params: Vec<GenericParam>,
    pub type_args: Vec<TypeExpr>,
    /// Interfaces the prototype implements; registered as assignability
    /// facts when the type is acquired.
    pub implements: Vec<TypeExpr>,
    pub fields: Vec<FieldInfo>,
    pub constructors: Vec<ConstructorInfo>,
    pub members: Vec<MemberInfo>,
    field_indices: FxHashMap<String, usize>,
}

impl PrototypeType {
    pub fn id(&self) -> PrototypeId {
        self.id
    }

    /// Whether the generic context is not fully closed.
    pub fn is_open_generic(&self) -> bool {
        self.generic_params.len() != self.type_args.len()
            || self.type_args.iter().any(TypeExpr::contains_param)
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Look up a declared field's slot index.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_indices.get(name).copied()
    }
}

/// Fluent builder for [`PrototypeType`].
pub struct PrototypeBuilder {
    name: String,
    kind: TypeKind,
    visibility: Visibility,
    sealed: bool,
    generic_params: Vec<GenericParam>,
    type_args: Vec<TypeExpr>,
    implements: Vec<TypeExpr>,
    fields: Vec<FieldInfo>,
    constructors: Vec<ConstructorInfo>,
    members: Vec<MemberInfo>,
}

impl PrototypeBuilder {
    /// Start a class prototype.
    pub fn class(name: &str) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Start an interface prototype.
    pub fn interface(name: &str) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            visibility: Visibility::Public,
            sealed: false,
            generic_params: Vec::new(),
            type_args: Vec::new(),
            implements: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn visibility(mut self, v: Visibility) -> Self {
        self.visibility = v;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Declare the (closed) generic context: the type's own parameters and
    /// the concrete arguments binding them.
    pub fn generic_context(mut self, params: Vec<GenericParam>, args: Vec<TypeExpr>) -> Self {
        self.generic_params = params;
        self.type_args = args;
        self
    }

    pub fn implements(mut self, interface: TypeExpr) -> Self {
        self.implements.push(interface);
        self
    }

    pub fn field(mut self, name: &str, ty: TypeExpr, initial: Value) -> Self {
        self.fields.push(FieldInfo {
            name: name.to_string(),
            ty,
            initial,
        });
        self
    }

    pub fn constructor(mut self, ctor: ConstructorInfo) -> Self {
        self.constructors.push(ctor);
        self
    }

    pub fn member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    pub fn build(self) -> Arc<PrototypeType> {
        let field_indices = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Arc::new(PrototypeType {
            id: PrototypeId::next(),
            name: self.name,
            kind: self.kind,
            visibility: self.visibility,
            sealed: self.sealed,
            generic_params: self.generic_params,
            type_args: self.type_args,
            implements: self.implements,
            fields: self.fields,
            constructors: self.constructors,
            members: self.members,
            field_indices,
        })
    }
}

/// Fluent builder for method members.
pub struct MethodBuilder {
    name: String,
    modifiers: Modifiers,
    generic_params: Vec<GenericParam>,
    params: Vec<ParamInfo>,
    return_type: TypeExpr,
    body: Option<MethodBody>,
}

impl MethodBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modifiers: Modifiers::default(),
            generic_params: Vec::new(),
            params: Vec::new(),
            return_type: TypeExpr::Void,
            body: None,
        }
    }

    pub fn param(mut self, name: &str, ty: TypeExpr) -> Self {
        self.params.push(ParamInfo::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: TypeExpr) -> Self {
        self.return_type = ty;
        self
    }

    pub fn generic_param(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    pub fn virtual_(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    pub fn visibility(mut self, v: Visibility) -> Self {
        self.modifiers.visibility = v;
        self
    }

    /// Supply the concrete base implementation.
    pub fn body(
        mut self,
        f: impl Fn(&ProxyInstance, &[TypeExpr], &[Value]) -> Result<Value, DispatchError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.body = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> MemberInfo {
        MemberInfo {
            name: self.name,
            kind: MemberKind::Method { body: self.body },
            modifiers: self.modifiers,
            generic_params: self.generic_params,
            params: self.params,
            return_type: self.return_type,
        }
    }
}

/// Fluent builder for property members.
pub struct PropertyBuilder {
    name: String,
    value_type: TypeExpr,
    modifiers: Modifiers,
    index_params: Vec<ParamInfo>,
    readable: bool,
    writable: bool,
    related: Vec<String>,
    getter: Option<GetterBody>,
    setter: Option<SetterBody>,
}

impl PropertyBuilder {
    pub fn new(name: &str, value_type: TypeExpr) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            modifiers: Modifiers::default(),
            index_params: Vec::new(),
            readable: true,
            writable: true,
            related: Vec::new(),
            getter: None,
            setter: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Add an index parameter, making the property indexed.
    pub fn index_param(mut self, name: &str, ty: TypeExpr) -> Self {
        self.index_params.push(ParamInfo::new(name, ty));
        self
    }

    /// Declare another property to notify after writes.
    pub fn related(mut self, name: &str) -> Self {
        self.related.push(name.to_string());
        self
    }

    pub fn virtual_(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    pub fn abstract_(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    pub fn static_(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    pub fn visibility(mut self, v: Visibility) -> Self {
        self.modifiers.visibility = v;
        self
    }

    pub fn getter(
        mut self,
        f: impl Fn(&ProxyInstance, &[Value]) -> Result<Value, DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.getter = Some(Arc::new(f));
        self
    }

    pub fn setter(
        mut self,
        f: impl Fn(&ProxyInstance, &[Value], Value) -> Result<(), DispatchError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> MemberInfo {
        let indexed = !self.index_params.is_empty();
        MemberInfo {
            name: self.name,
            kind: MemberKind::Property {
                getter: self.getter,
                setter: self.setter,
                readable: self.readable,
                writable: self.writable,
                indexed,
                related: self.related,
            },
            modifiers: self.modifiers,
            generic_params: Vec::new(),
            params: self.index_params,
            return_type: self.value_type,
        }
    }
}

/// Fluent builder for constructors.
pub struct ConstructorBuilder {
    params: Vec<ParamInfo>,
    visibility: Visibility,
    init: Option<CtorBody>,
}

impl ConstructorBuilder {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            visibility: Visibility::Public,
            init: None,
        }
    }

    pub fn param(mut self, name: &str, ty: TypeExpr) -> Self {
        self.params.push(ParamInfo::new(name, ty));
        self
    }

    pub fn visibility(mut self, v: Visibility) -> Self {
        self.visibility = v;
        self
    }

    pub fn init(
        mut self,
        f: impl Fn(&ProxyInstance, &[Value]) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.init = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> ConstructorInfo {
        ConstructorInfo {
            params: self.params,
            visibility: self.visibility,
            init: self.init,
        }
    }
}

impl Default for ConstructorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
