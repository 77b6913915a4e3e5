//! Type synthesis orchestration.
//!
//! [`TypeSynthesizer`] drives the full pipeline for one prototype through a
//! strict state machine:
//!
//! `Uninitialized -> MembersClassified -> TypeDefined -> MembersSynthesized -> Finalized`
//!
//! Exactly one thread drives a synthesizer (the type cache guarantees it),
//! transitions are sequential and non-reentrant, and `Finalized` is
//! terminal: the produced [`SynthesizedType`] is immutable and cached for
//! the process lifetime.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::SynthesisError;
use crate::model::prototype::{
    CtorBody, MemberInfo, MemberKind, MethodBody, PrototypeType, TypeKind, Visibility,
};
use crate::model::types::{ParamOwner, ParamRef, TypeExpr};
use crate::notify::{self, NotifyProp};
use crate::synth::classify::{classify, ClassifyPolicy, MemberClass};
use crate::synth::constraints::rewrite_generic_params;
use crate::synth::emit::{self, DispatchFn};
use crate::synth::member::{BaseAccessor, InvocationThunk, MemberDescriptor, MemberHolder};
use crate::value::Value;

/// Which override behavior a type was synthesized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyVariant {
    /// Handler-redirecting interception (and the wrap flavor for
    /// interface prototypes).
    Intercept,
    /// Change-notification overrides for properties.
    Notify,
}

impl ProxyVariant {
    fn suffix(self) -> &'static str {
        match self {
            ProxyVariant::Intercept => "Proxy",
            ProxyVariant::Notify => "Observable",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            ProxyVariant::Intercept => "intercept",
            ProxyVariant::Notify => "notify",
        }
    }
}

/// Orchestrator state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    Uninitialized,
    MembersClassified,
    TypeDefined,
    MembersSynthesized,
    Finalized,
}

impl SynthesisState {
    fn name(self) -> &'static str {
        match self {
            SynthesisState::Uninitialized => "Uninitialized",
            SynthesisState::MembersClassified => "MembersClassified",
            SynthesisState::TypeDefined => "TypeDefined",
            SynthesisState::MembersSynthesized => "MembersSynthesized",
            SynthesisState::Finalized => "Finalized",
        }
    }
}

/// One dispatch-table entry of a synthesized type.
pub enum MemberEntry {
    /// Interceptable member with its synthesis unit.
    Intercepted(Arc<MemberHolder>),
    /// Stub-only member: a body that raises "not supported".
    Stubbed(DispatchFn),
}

impl fmt::Debug for MemberEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberEntry::Intercepted(h) => write!(f, "Intercepted({})", h.name()),
            MemberEntry::Stubbed(_) => write!(f, "Stubbed"),
        }
    }
}

/// A constructor mirrored onto the synthesized type.
#[derive(Clone)]
pub struct SynthesizedCtor {
    pub params: Vec<TypeExpr>,
    pub visibility: Visibility,
    pub init: Option<CtorBody>,
}

impl fmt::Debug for SynthesizedCtor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedCtor")
            .field("params", &self.params)
            .field("visibility", &self.visibility)
            .finish()
    }
}

/// The finalized synthesized type: dispatch table, constructors, and field
/// layout. Exactly one exists per (prototype, variant); immutable.
pub struct SynthesizedType {
    name: String,
    variant: ProxyVariant,
    prototype: Arc<PrototypeType>,
    entries: FxHashMap<String, MemberEntry>,
    entry_order: Vec<String>,
    constructors: Vec<SynthesizedCtor>,
    field_initials: Vec<Value>,
    field_indices: FxHashMap<String, usize>,
    notify_props: FxHashMap<String, NotifyProp>,
    notify_order: Vec<String>,
    interceptable_count: usize,
    stub_count: usize,
}

impl SynthesizedType {
    /// Deterministic name derived from the prototype (`Widget$Proxy`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> ProxyVariant {
        self.variant
    }

    pub fn prototype(&self) -> &Arc<PrototypeType> {
        &self.prototype
    }

    /// Look up a dispatch entry. Property accessors are keyed `get_Name`
    /// and `set_Name`.
    pub fn entry(&self, name: &str) -> Option<&MemberEntry> {
        self.entries.get(name)
    }

    /// Entry keys in declaration order.
    pub fn entry_names(&self) -> &[String] {
        &self.entry_order
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_stub(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(MemberEntry::Stubbed(_)))
    }

    /// The synthesis unit of an interceptable entry.
    pub fn holder(&self, name: &str) -> Option<&Arc<MemberHolder>> {
        match self.entries.get(name) {
            Some(MemberEntry::Intercepted(h)) => Some(h),
            _ => None,
        }
    }

    /// Descriptor of a non-generic interceptable entry.
    pub fn descriptor(&self, name: &str) -> Option<Arc<MemberDescriptor>> {
        self.holder(name)
            .and_then(|h| h.plain().ok())
            .map(|c| c.descriptor.clone())
    }

    /// Thunk of a non-generic interceptable entry.
    pub fn thunk(&self, name: &str) -> Option<Arc<InvocationThunk>> {
        self.holder(name)
            .and_then(|h| h.plain().ok())
            .map(|c| c.thunk.clone())
    }

    pub fn interceptable_count(&self) -> usize {
        self.interceptable_count
    }

    pub fn stub_count(&self) -> usize {
        self.stub_count
    }

    pub fn constructors(&self) -> &[SynthesizedCtor] {
        &self.constructors
    }

    /// Total field slots, including synthesized backing fields.
    pub fn field_count(&self) -> usize {
        self.field_initials.len()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_indices.get(name).copied()
    }

    pub(crate) fn field_initials(&self) -> &[Value] {
        &self.field_initials
    }

    /// Notification metadata for a property (notify variant only).
    pub fn notify_prop(&self, name: &str) -> Option<&NotifyProp> {
        self.notify_props.get(name)
    }

    /// Notification-eligible property names in declaration order.
    pub fn notify_property_names(&self) -> &[String] {
        &self.notify_order
    }
}

impl fmt::Debug for SynthesizedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedType")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .field("entries", &self.entry_order)
            .field("field_count", &self.field_count())
            .finish()
    }
}

/// Drives classification, definition, member synthesis, and finalization
/// for one prototype.
pub struct TypeSynthesizer {
    prototype: Arc<PrototypeType>,
    variant: ProxyVariant,
    policy: ClassifyPolicy,
    state: SynthesisState,
    classified: Vec<(usize, MemberClass)>,
    name: String,
    constructors: Vec<SynthesizedCtor>,
    entries: FxHashMap<String, MemberEntry>,
    entry_order: Vec<String>,
    field_initials: Vec<Value>,
    field_indices: FxHashMap<String, usize>,
    notify_props: FxHashMap<String, NotifyProp>,
    notify_order: Vec<String>,
    interceptable_count: usize,
    stub_count: usize,
}

impl TypeSynthesizer {
    pub fn new(prototype: Arc<PrototypeType>, variant: ProxyVariant, policy: ClassifyPolicy) -> Self {
        Self {
            prototype,
            variant,
            policy,
            state: SynthesisState::Uninitialized,
            classified: Vec::new(),
            name: String::new(),
            constructors: Vec::new(),
            entries: FxHashMap::default(),
            entry_order: Vec::new(),
            field_initials: Vec::new(),
            field_indices: FxHashMap::default(),
            notify_props: FxHashMap::default(),
            notify_order: Vec::new(),
            interceptable_count: 0,
            stub_count: 0,
        }
    }

    pub fn state(&self) -> SynthesisState {
        self.state
    }

    /// Run the full pipeline and finalize.
    pub fn run(mut self) -> Result<Arc<SynthesizedType>, SynthesisError> {
        self.classify_members()?;
        self.define_type()?;
        self.synthesize_members()?;
        self.finalize()
    }

    fn advance(
        &mut self,
        expected: SynthesisState,
        next: SynthesisState,
    ) -> Result<(), SynthesisError> {
        if self.state != expected {
            return Err(SynthesisError::InvalidState {
                expected: expected.name(),
                found: self.state.name(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Stage 1: classify every prototype member.
    pub fn classify_members(&mut self) -> Result<(), SynthesisError> {
        self.advance(
            SynthesisState::Uninitialized,
            SynthesisState::MembersClassified,
        )?;
        let proto = self.prototype.clone();
        for (index, member) in proto.members.iter().enumerate() {
            let class = match self.variant {
                ProxyVariant::Intercept => classify(&proto, member, self.policy),
                ProxyVariant::Notify => notify::classify_property(&proto, member),
            };
            self.classified.push((index, class));
        }
        Ok(())
    }

    /// Stage 2: derive the type identity, constructors, and field layout.
    pub fn define_type(&mut self) -> Result<(), SynthesisError> {
        self.advance(SynthesisState::MembersClassified, SynthesisState::TypeDefined)?;
        let proto = &self.prototype;
        self.name = format!("{}${}", proto.name, self.variant.suffix());

        match proto.kind {
            TypeKind::Class => {
                // Mirror every inheritable (non-private) constructor.
                for ctor in &proto.constructors {
                    if ctor.visibility == Visibility::Private {
                        continue;
                    }
                    self.constructors.push(SynthesizedCtor {
                        params: ctor.params.iter().map(|p| p.ty.clone()).collect(),
                        visibility: ctor.visibility,
                        init: ctor.init.clone(),
                    });
                }
                // A class prototype without declared constructors still
                // gets a parameterless one.
                if self.constructors.is_empty() {
                    self.constructors.push(SynthesizedCtor {
                        params: Vec::new(),
                        visibility: Visibility::Public,
                        init: None,
                    });
                }
            }
            TypeKind::Interface => {
                self.constructors.push(SynthesizedCtor {
                    params: Vec::new(),
                    visibility: Visibility::Public,
                    init: None,
                });
            }
        }

        for field in &proto.fields {
            self.field_indices
                .insert(field.name.clone(), self.field_initials.len());
            self.field_initials.push(field.initial.clone());
        }
        Ok(())
    }

    /// Stage 3: synthesize every classified member.
    pub fn synthesize_members(&mut self) -> Result<(), SynthesisError> {
        self.advance(
            SynthesisState::TypeDefined,
            SynthesisState::MembersSynthesized,
        )?;
        let proto = self.prototype.clone();
        let classified = std::mem::take(&mut self.classified);
        for (index, class) in classified {
            let member = &proto.members[index];
            match class {
                MemberClass::Skip => {}
                MemberClass::StubOnly => self.stub_member(member),
                MemberClass::Interceptable => match self.variant {
                    ProxyVariant::Intercept => self.synthesize_intercepted(index, member)?,
                    ProxyVariant::Notify => self.synthesize_notified(member)?,
                },
            }
        }
        Ok(())
    }

    /// Stage 4: freeze into the immutable synthesized type.
    pub fn finalize(mut self) -> Result<Arc<SynthesizedType>, SynthesisError> {
        self.advance(SynthesisState::MembersSynthesized, SynthesisState::Finalized)?;
        Ok(Arc::new(SynthesizedType {
            name: self.name,
            variant: self.variant,
            prototype: self.prototype,
            entries: self.entries,
            entry_order: self.entry_order,
            constructors: self.constructors,
            field_initials: self.field_initials,
            field_indices: self.field_indices,
            notify_props: self.notify_props,
            notify_order: self.notify_order,
            interceptable_count: self.interceptable_count,
            stub_count: self.stub_count,
        }))
    }

    fn insert_entry(&mut self, key: String, entry: MemberEntry) {
        self.entry_order.push(key.clone());
        self.entries.insert(key, entry);
    }

    fn stub_member(&mut self, member: &MemberInfo) {
        self.stub_count += 1;
        match &member.kind {
            MemberKind::Method { .. } => {
                let stub = emit::emit_stub(Arc::from(member.name.as_str()));
                self.insert_entry(member.name.clone(), MemberEntry::Stubbed(stub));
            }
            MemberKind::Property {
                readable, writable, ..
            } => match self.variant {
                ProxyVariant::Intercept => {
                    if *readable {
                        let key = format!("get_{}", member.name);
                        let stub = emit::emit_stub(Arc::from(key.as_str()));
                        self.insert_entry(key, MemberEntry::Stubbed(stub));
                    }
                    if *writable {
                        let key = format!("set_{}", member.name);
                        let stub = emit::emit_stub(Arc::from(key.as_str()));
                        self.insert_entry(key, MemberEntry::Stubbed(stub));
                    }
                }
                ProxyVariant::Notify => {
                    let stub = emit::emit_stub(Arc::from(member.name.as_str()));
                    self.insert_entry(member.name.clone(), MemberEntry::Stubbed(stub));
                }
            },
        }
    }

    fn synthesize_intercepted(
        &mut self,
        index: usize,
        member: &MemberInfo,
    ) -> Result<(), SynthesisError> {
        // Classification should never let these through; reaching here with
        // one is a defect, not a skippable condition.
        if member.modifiers.is_static || member.modifiers.is_final {
            return Err(SynthesisError::InvalidMember {
                member: member.name.clone(),
                declaring: self.prototype.name.clone(),
                reason: "static or final member classified interceptable".to_string(),
            });
        }
        self.interceptable_count += 1;

        match &member.kind {
            MemberKind::Method { body } => {
                let holder = self.build_holder(
                    index,
                    member,
                    member.name.clone(),
                    member.params.iter().map(|p| p.ty.clone()).collect(),
                    member.return_type.clone(),
                    body.clone(),
                )?;
                self.insert_entry(member.name.clone(), MemberEntry::Intercepted(holder));
            }
            MemberKind::Property {
                getter,
                setter,
                readable,
                writable,
                ..
            } => {
                let index_types: Vec<TypeExpr> =
                    member.params.iter().map(|p| p.ty.clone()).collect();
                if *readable {
                    let body: Option<MethodBody> = getter.clone().map(|g| {
                        Arc::new(
                            move |inst: &crate::instance::ProxyInstance,
                                  _ta: &[TypeExpr],
                                  args: &[Value]| g(inst, args),
                        ) as MethodBody
                    });
                    let holder = self.build_holder(
                        index,
                        member,
                        format!("get_{}", member.name),
                        index_types.clone(),
                        member.return_type.clone(),
                        body,
                    )?;
                    self.insert_entry(
                        format!("get_{}", member.name),
                        MemberEntry::Intercepted(holder),
                    );
                }
                if *writable {
                    let body: Option<MethodBody> = setter.clone().map(|s| {
                        Arc::new(
                            move |inst: &crate::instance::ProxyInstance,
                                  _ta: &[TypeExpr],
                                  args: &[Value]| {
                                let (index_args, value) = args.split_at(args.len() - 1);
                                s(inst, index_args, value[0].clone())?;
                                Ok(Value::Void)
                            },
                        ) as MethodBody
                    });
                    let mut param_types = index_types;
                    param_types.push(member.return_type.clone());
                    let holder = self.build_holder(
                        index,
                        member,
                        format!("set_{}", member.name),
                        param_types,
                        TypeExpr::Void,
                        body,
                    )?;
                    self.insert_entry(
                        format!("set_{}", member.name),
                        MemberEntry::Intercepted(holder),
                    );
                }
            }
        }
        Ok(())
    }

    fn build_holder(
        &self,
        index: usize,
        member: &MemberInfo,
        entry_name: String,
        param_types: Vec<TypeExpr>,
        return_type: TypeExpr,
        body: Option<MethodBody>,
    ) -> Result<Arc<MemberHolder>, SynthesisError> {
        let proto = &self.prototype;
        let arity = member.generic_params.len();

        let param_types = param_types
            .iter()
            .map(|t| self.resolve_declaring(t, arity, &entry_name))
            .collect::<Result<Vec<_>, _>>()?;
        let return_type = self.resolve_declaring(&return_type, arity, &entry_name)?;

        // Mirror the member's generic parameter list and carry its
        // constraint shape over, resolved against the enclosing context.
        let mut new_params: Vec<_> = member
            .generic_params
            .iter()
            .map(|p| crate::model::types::GenericParam::new(&p.name, p.index))
            .collect();
        rewrite_generic_params(&mut new_params, &member.generic_params, &proto.type_args)?;

        let name: Arc<str> = Arc::from(entry_name.as_str());
        let holder = Arc::new(MemberHolder::new(
            index,
            name.clone(),
            Arc::from(proto.name.as_str()),
            new_params,
            param_types,
            return_type,
            BaseAccessor::new(name, body),
        ));

        // Non-generic members are fully built (descriptor + thunk + body)
        // before any override can reference them.
        if arity == 0 {
            holder
                .plain()
                .map_err(|e| SynthesisError::InvalidMember {
                    member: entry_name,
                    declaring: proto.name.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(holder)
    }

    fn resolve_declaring(
        &self,
        ty: &TypeExpr,
        member_arity: usize,
        member_name: &str,
    ) -> Result<TypeExpr, SynthesisError> {
        let proto = &self.prototype;
        ty.try_map_params(&mut |r: ParamRef| match r.owner {
            ParamOwner::Member if r.index < member_arity => Ok(TypeExpr::Param(r)),
            ParamOwner::DeclaringType if r.index < proto.type_args.len() => {
                Ok(proto.type_args[r.index].clone())
            }
            _ => Err(SynthesisError::InvalidMember {
                member: member_name.to_string(),
                declaring: proto.name.clone(),
                reason: format!("unresolvable generic parameter reference {}", r.index),
            }),
        })
    }

    fn synthesize_notified(&mut self, member: &MemberInfo) -> Result<(), SynthesisError> {
        let MemberKind::Property {
            getter,
            setter,
            related,
            ..
        } = &member.kind
        else {
            return Err(SynthesisError::InvalidMember {
                member: member.name.clone(),
                declaring: self.prototype.name.clone(),
                reason: "non-property member classified notification-eligible".to_string(),
            });
        };
        self.interceptable_count += 1;

        let value_type = self.resolve_declaring(&member.return_type, 0, &member.name)?;

        // An abstract accessor stores through a synthesized backing field.
        let backing = if getter.is_none() || setter.is_none() {
            let slot = self.field_initials.len();
            self.field_initials.push(Value::default_of(&value_type));
            self.field_indices
                .insert(format!("{}__backing", member.name), slot);
            Some(slot)
        } else {
            None
        };

        let prop = NotifyProp {
            name: member.name.clone(),
            value_type,
            getter: getter.clone(),
            setter: setter.clone(),
            backing,
            related: related.clone(),
        };
        self.notify_order.push(member.name.clone());
        self.notify_props.insert(member.name.clone(), prop);
        Ok(())
    }
}
