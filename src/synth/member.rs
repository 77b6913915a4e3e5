//! Per-member synthesis: descriptors, invocation thunks, and the
//! specialization table for generic members.
//!
//! Each interceptable member yields a [`MemberHolder`]. Closing the holder
//! (with an empty argument list for non-generic members) produces a
//! [`ClosedMember`]: descriptor, thunk, and emitted override body built
//! together as one unit, memoized per closing-argument vector so exactly
//! one descriptor/thunk pair exists per closure.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::DispatchError;
use crate::instance::ProxyInstance;
use crate::model::facts;
use crate::model::prototype::MethodBody;
use crate::model::types::{ConstraintSet, GenericParam, TypeExpr};
use crate::synth::emit::{self, DispatchFn};
use crate::value::{ArgCell, Value};

/// Stable identity of one (possibly closed) synthesized member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberDescriptor {
    /// Position of the member in the prototype's member list.
    pub member_index: usize,
    /// Member name. Property accessors use `get_`/`set_` prefixed names.
    pub name: Arc<str>,
    /// Name of the declaring prototype.
    pub declaring_type: Arc<str>,
    /// Declared parameter types, closed if this descriptor is specialized.
    pub param_types: Vec<TypeExpr>,
    /// Declared return type, closed if specialized.
    pub return_type: TypeExpr,
    /// Number of generic parameters on the member.
    pub generic_arity: usize,
    /// Closing type arguments; empty for non-generic members.
    pub type_args: Vec<TypeExpr>,
}

impl MemberDescriptor {
    /// Rendered name including closing arguments (`largest_Int` style).
    pub fn display_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.type_args {
            write!(f, "_{}", arg)?;
        }
        Ok(())
    }
}

/// The private base-call accessor: invokes the prototype's own
/// implementation, or forwards to the wrap target for composition proxies.
pub struct BaseAccessor {
    member_name: Arc<str>,
    body: Option<MethodBody>,
}

impl BaseAccessor {
    pub(crate) fn new(member_name: Arc<str>, body: Option<MethodBody>) -> Self {
        Self { member_name, body }
    }

    /// Invoke the original member. An abstract prototype member has no
    /// original behavior to call.
    pub fn call(
        &self,
        instance: &ProxyInstance,
        type_args: &[TypeExpr],
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        if let Some(target) = instance.wrap_target() {
            return target.call(&self.member_name, args);
        }
        match &self.body {
            Some(body) => body(instance, type_args, args),
            None => Err(DispatchError::NotImplemented(self.member_name.to_string())),
        }
    }
}

impl fmt::Debug for BaseAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseAccessor")
            .field("member", &self.member_name)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Generated callable invoking one original member given an instance and a
/// boxed argument vector. Counts its invocations.
pub struct InvocationThunk {
    descriptor: Arc<MemberDescriptor>,
    accessor: Arc<BaseAccessor>,
    calls: AtomicU64,
}

impl InvocationThunk {
    fn new(descriptor: Arc<MemberDescriptor>, accessor: Arc<BaseAccessor>) -> Self {
        Self {
            descriptor,
            accessor,
            calls: AtomicU64::new(0),
        }
    }

    /// Invoke the original member with boxed arguments.
    pub fn invoke(
        &self,
        instance: &ProxyInstance,
        args: &[ArgCell],
    ) -> Result<Value, DispatchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let d = &self.descriptor;
        if args.len() != d.param_types.len() {
            return Err(DispatchError::ArityMismatch {
                member: d.name.to_string(),
                expected: d.param_types.len(),
                found: args.len(),
            });
        }
        let mut values = Vec::with_capacity(args.len());
        for (i, cell) in args.iter().enumerate() {
            let value = cell.load().ok_or_else(|| DispatchError::ArgumentMismatch {
                member: d.name.to_string(),
                param: i.to_string(),
                expected: d.param_types[i].to_string(),
            })?;
            values.push(value);
        }
        self.accessor.call(instance, &d.type_args, &values)
    }

    /// How many times this thunk has been invoked.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// The descriptor this thunk dispatches for.
    pub fn descriptor(&self) -> &Arc<MemberDescriptor> {
        &self.descriptor
    }
}

impl fmt::Debug for InvocationThunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationThunk")
            .field("member", &self.descriptor.display_name())
            .field("calls", &self.call_count())
            .finish()
    }
}

/// A fully closed member: descriptor, thunk, and emitted override body.
pub struct ClosedMember {
    pub descriptor: Arc<MemberDescriptor>,
    pub thunk: Arc<InvocationThunk>,
    pub dispatch: DispatchFn,
}

impl fmt::Debug for ClosedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosedMember")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// One interceptable member's synthesis unit.
///
/// Holds the rewritten generic parameters and the open signature; `close`
/// validates closing arguments against the rewritten constraints and
/// memoizes one [`ClosedMember`] per argument vector. Non-generic members
/// close once with an empty vector.
pub struct MemberHolder {
    member_index: usize,
    name: Arc<str>,
    declaring_type: Arc<str>,
    generic_params: Vec<GenericParam>,
    param_types: Vec<TypeExpr>,
    return_type: TypeExpr,
    accessor: Arc<BaseAccessor>,
    specializations: DashMap<Vec<TypeExpr>, Arc<ClosedMember>>,
}

impl MemberHolder {
    pub(crate) fn new(
        member_index: usize,
        name: Arc<str>,
        declaring_type: Arc<str>,
        generic_params: Vec<GenericParam>,
        param_types: Vec<TypeExpr>,
        return_type: TypeExpr,
        accessor: BaseAccessor,
    ) -> Self {
        Self {
            member_index,
            name,
            declaring_type,
            generic_params,
            param_types,
            return_type,
            accessor: Arc::new(accessor),
            specializations: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generic_arity(&self) -> usize {
        self.generic_params.len()
    }

    /// The rewritten generic parameters (constraints already resolved
    /// against the declaring type's arguments).
    pub fn generic_params(&self) -> &[GenericParam] {
        &self.generic_params
    }

    /// Close a non-generic member.
    pub fn plain(&self) -> Result<Arc<ClosedMember>, DispatchError> {
        self.close(&[])
    }

    /// Close the member with concrete type arguments, validating them
    /// against the rewritten constraints. Memoized: repeated closings with
    /// the same arguments yield the same descriptor/thunk pair.
    pub fn close(&self, type_args: &[TypeExpr]) -> Result<Arc<ClosedMember>, DispatchError> {
        if type_args.len() != self.generic_params.len() {
            return Err(DispatchError::TypeArgumentArity {
                member: self.name.to_string(),
                expected: self.generic_params.len(),
                found: type_args.len(),
            });
        }
        match self.specializations.entry(type_args.to_vec()) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(v) => {
                let closed = self.build_closed(type_args)?;
                Ok(v.insert(closed).clone())
            }
        }
    }

    /// Number of distinct closings built so far.
    pub fn specialization_count(&self) -> usize {
        self.specializations.len()
    }

    fn build_closed(&self, type_args: &[TypeExpr]) -> Result<Arc<ClosedMember>, DispatchError> {
        self.check_constraints(type_args)?;

        let descriptor = Arc::new(MemberDescriptor {
            member_index: self.member_index,
            name: self.name.clone(),
            declaring_type: self.declaring_type.clone(),
            param_types: self
                .param_types
                .iter()
                .map(|t| t.close_member_params(type_args))
                .collect(),
            return_type: self.return_type.close_member_params(type_args),
            generic_arity: self.generic_params.len(),
            type_args: type_args.to_vec(),
        });
        let thunk = Arc::new(InvocationThunk::new(
            descriptor.clone(),
            self.accessor.clone(),
        ));
        let dispatch = emit::emit_intercepted(descriptor.clone(), thunk.clone());
        Ok(Arc::new(ClosedMember {
            descriptor,
            thunk,
            dispatch,
        }))
    }

    fn check_constraints(&self, type_args: &[TypeExpr]) -> Result<(), DispatchError> {
        for (param, arg) in self.generic_params.iter().zip(type_args) {
            let resolved = ConstraintSet {
                base_class: param
                    .constraints
                    .base_class
                    .as_ref()
                    .map(|c| c.close_member_params(type_args)),
                interfaces: param
                    .constraints
                    .interfaces
                    .iter()
                    .map(|c| c.close_member_params(type_args))
                    .collect(),
                flags: param.constraints.flags,
            };
            facts::global().satisfies(arg, &resolved).map_err(|constraint| {
                DispatchError::ConstraintViolation {
                    arg: arg.to_string(),
                    constraint,
                    param: param.name.clone(),
                }
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for MemberHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberHolder")
            .field("member", &self.name)
            .field("generic_arity", &self.generic_arity())
            .field("specializations", &self.specialization_count())
            .finish()
    }
}
