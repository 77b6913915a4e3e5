//! Proxy instances.
//!
//! A [`ProxyInstance`] is one object of a synthesized type: a field vector
//! laid out per the prototype (plus synthesized backing slots), an optional
//! handler binding, an optional wrap target, and change listeners for the
//! notify variant. All dispatch enters through [`ProxyInstance::invoke`]
//! and the property accessors, which route through the type's dispatch
//! table.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::DispatchError;
use crate::model::types::TypeExpr;
use crate::synth::emit::CallHandler;
use crate::synth::orchestrator::{MemberEntry, ProxyVariant, SynthesizedType};
use crate::value::{ArgCell, Value};

/// Existing object a composition proxy forwards base calls to.
pub trait WrapTarget: Send + Sync {
    fn call(&self, member: &str, args: &[Value]) -> Result<Value, DispatchError>;
}

/// Change-notification callback: receives the instance and the property
/// name that changed.
pub type ChangeListener = Arc<dyn Fn(&ProxyInstance, &str) + Send + Sync>;

pub struct ProxyInstance {
    ty: Arc<SynthesizedType>,
    fields: RwLock<Vec<Value>>,
    handler: OnceCell<Arc<dyn CallHandler>>,
    wrap_target: Option<Arc<dyn WrapTarget>>,
    listeners: RwLock<Vec<ChangeListener>>,
}

impl ProxyInstance {
    pub(crate) fn new(
        ty: Arc<SynthesizedType>,
        wrap_target: Option<Arc<dyn WrapTarget>>,
    ) -> Arc<Self> {
        let fields = ty.field_initials().to_vec();
        Arc::new(Self {
            ty,
            fields: RwLock::new(fields),
            handler: OnceCell::new(),
            wrap_target,
            listeners: RwLock::new(Vec::new()),
        })
    }

    /// The synthesized type this instance belongs to.
    pub fn synthesized_type(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    /// The bound handler, if any. Unset means pass-through dispatch.
    pub fn handler(&self) -> Option<&Arc<dyn CallHandler>> {
        self.handler.get()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.get().is_some()
    }

    /// Bind the handler. The binding is write-once; returns false if one
    /// is already bound.
    pub(crate) fn bind_handler(&self, handler: Arc<dyn CallHandler>) -> bool {
        self.handler.set(handler).is_ok()
    }

    pub(crate) fn wrap_target(&self) -> Option<&Arc<dyn WrapTarget>> {
        self.wrap_target.as_ref()
    }

    /// Invoke a non-generic member with by-value arguments.
    pub fn invoke(&self, member: &str, args: Vec<Value>) -> Result<Value, DispatchError> {
        self.invoke_cells(member, args.into_iter().map(ArgCell::ByValue).collect())
    }

    /// Invoke a non-generic member with explicit argument cells (by-address
    /// parameters keep their cell across the call).
    pub fn invoke_cells(
        &self,
        member: &str,
        args: Vec<ArgCell>,
    ) -> Result<Value, DispatchError> {
        match self.ty.entry(member) {
            None => Err(DispatchError::UnknownMember(member.to_string())),
            Some(MemberEntry::Stubbed(body)) => body(self, args),
            Some(MemberEntry::Intercepted(holder)) => {
                if holder.generic_arity() != 0 {
                    return Err(DispatchError::MissingTypeArguments {
                        member: member.to_string(),
                    });
                }
                let closed = holder.plain()?;
                (closed.dispatch)(self, args)
            }
        }
    }

    /// Invoke a generic member, closing it with `type_args` first.
    pub fn invoke_generic(
        &self,
        member: &str,
        type_args: &[TypeExpr],
        args: Vec<Value>,
    ) -> Result<Value, DispatchError> {
        match self.ty.entry(member) {
            None => Err(DispatchError::UnknownMember(member.to_string())),
            Some(MemberEntry::Stubbed(body)) => {
                body(self, args.into_iter().map(ArgCell::ByValue).collect())
            }
            Some(MemberEntry::Intercepted(holder)) => {
                if holder.generic_arity() == 0 && !type_args.is_empty() {
                    return Err(DispatchError::NotGeneric {
                        member: member.to_string(),
                    });
                }
                let closed = holder.close(type_args)?;
                (closed.dispatch)(self, args.into_iter().map(ArgCell::ByValue).collect())
            }
        }
    }

    /// Read a property. Takes the notification path on notify-variant
    /// types and the accessor dispatch table otherwise.
    pub fn get_property(&self, name: &str) -> Result<Value, DispatchError> {
        match self.ty.variant() {
            ProxyVariant::Notify => match self.ty.notify_prop(name) {
                Some(prop) => prop.read(self),
                None => match self.ty.entry(name) {
                    Some(MemberEntry::Stubbed(body)) => body(self, Vec::new()),
                    _ => Err(DispatchError::UnknownMember(name.to_string())),
                },
            },
            ProxyVariant::Intercept => {
                let key = format!("get_{name}");
                if self.ty.has_entry(&key) {
                    self.invoke_cells(&key, Vec::new())
                } else if self.ty.has_entry(&format!("set_{name}")) {
                    Err(DispatchError::NoGetter(name.to_string()))
                } else {
                    Err(DispatchError::UnknownMember(name.to_string()))
                }
            }
        }
    }

    /// Write a property. On notify-variant types this stores and then
    /// notifies unconditionally.
    pub fn set_property(&self, name: &str, value: Value) -> Result<(), DispatchError> {
        match self.ty.variant() {
            ProxyVariant::Notify => match self.ty.notify_prop(name) {
                Some(prop) => prop.write(self, value),
                None => match self.ty.entry(name) {
                    Some(MemberEntry::Stubbed(body)) => {
                        body(self, vec![ArgCell::ByValue(value)]).map(|_| ())
                    }
                    _ => Err(DispatchError::UnknownMember(name.to_string())),
                },
            },
            ProxyVariant::Intercept => {
                let key = format!("set_{name}");
                if self.ty.has_entry(&key) {
                    self.invoke_cells(&key, vec![ArgCell::ByValue(value)])
                        .map(|_| ())
                } else if self.ty.has_entry(&format!("get_{name}")) {
                    Err(DispatchError::NoSetter(name.to_string()))
                } else {
                    Err(DispatchError::UnknownMember(name.to_string()))
                }
            }
        }
    }

    /// Read a declared field by name.
    pub fn field(&self, name: &str) -> Option<Value> {
        let slot = self.ty.field_index(name)?;
        self.fields.read().get(slot).cloned()
    }

    /// Write a declared field by name. Returns false if the field does
    /// not exist.
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.ty.field_index(name) {
            Some(slot) => {
                if let Some(cell) = self.fields.write().get_mut(slot) {
                    *cell = value;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    pub(crate) fn field_value(&self, slot: usize) -> Result<Value, DispatchError> {
        self.fields
            .read()
            .get(slot)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownMember(format!("field slot {slot}")))
    }

    pub(crate) fn store_field(&self, slot: usize, value: Value) -> Result<(), DispatchError> {
        match self.fields.write().get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(DispatchError::UnknownMember(format!("field slot {slot}"))),
        }
    }

    /// Register a change listener. Listeners fire in registration order,
    /// after the write lands.
    pub fn subscribe(&self, listener: impl Fn(&ProxyInstance, &str) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    pub(crate) fn raise_changed(&self, property: &str) {
        // Snapshot first: a listener may read properties or subscribe.
        let snapshot: Vec<ChangeListener> = self.listeners.read().clone();
        for listener in snapshot {
            listener(self, property);
        }
    }
}

impl fmt::Debug for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyInstance")
            .field("type", &self.ty.name())
            .field("has_handler", &self.has_handler())
            .field("wrapped", &self.wrap_target.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::prototype::{MethodBuilder, PropertyBuilder, PrototypeBuilder};
    use crate::synth::classify::ClassifyPolicy;
    use crate::synth::orchestrator::TypeSynthesizer;

    fn counter_type() -> Arc<SynthesizedType> {
        let proto = PrototypeBuilder::class("Counter")
            .field("count", TypeExpr::Int, Value::Int(0))
            .member(
                MethodBuilder::new("bump")
                    .virtual_()
                    .param("by", TypeExpr::Int)
                    .returns(TypeExpr::Int)
                    .body(|inst, _, args| {
                        let current = inst.field("count").and_then(|v| v.as_int()).unwrap_or(0);
                        let by = args[0].as_int().unwrap_or(0);
                        inst.set_field("count", Value::Int(current + by));
                        Ok(Value::Int(current + by))
                    })
                    .build(),
            )
            .build();
        TypeSynthesizer::new(proto, ProxyVariant::Intercept, ClassifyPolicy::default())
            .run()
            .unwrap()
    }

    #[test]
    fn test_unbound_instance_passes_through_to_base() {
        let inst = ProxyInstance::new(counter_type(), None);
        let out = inst.invoke("bump", vec![Value::Int(3)]).unwrap();
        assert_eq!(out, Value::Int(3));
        let out = inst.invoke("bump", vec![Value::Int(4)]).unwrap();
        assert_eq!(out, Value::Int(7));
        assert_eq!(inst.field("count"), Some(Value::Int(7)));
    }

    #[test]
    fn test_handler_intercepts_without_touching_the_thunk() {
        let ty = counter_type();
        let inst = ProxyInstance::new(ty.clone(), None);
        assert!(inst.bind_handler(Arc::new(
            |_inst: &ProxyInstance, ctx: &crate::synth::emit::CallContext| {
                let by = ctx.arg(0).and_then(|v| v.as_int()).unwrap_or(0);
                Ok(Value::Int(by * 2))
            }
        )));

        let out = inst.invoke("bump", vec![Value::Int(21)]).unwrap();
        assert_eq!(out, Value::Int(42));
        // The base body never ran.
        assert_eq!(ty.thunk("bump").unwrap().call_count(), 0);
        assert_eq!(inst.field("count"), Some(Value::Int(0)));
    }

    #[test]
    fn test_handler_binding_is_write_once() {
        let inst = ProxyInstance::new(counter_type(), None);
        let h: Arc<dyn CallHandler> = Arc::new(
            |inst: &ProxyInstance, ctx: &crate::synth::emit::CallContext| ctx.call_base(inst),
        );
        assert!(inst.bind_handler(h.clone()));
        assert!(!inst.bind_handler(h));
    }

    #[test]
    fn test_unknown_member_and_missing_type_args() {
        let inst = ProxyInstance::new(counter_type(), None);
        assert!(matches!(
            inst.invoke("nope", Vec::new()),
            Err(DispatchError::UnknownMember(_))
        ));
        assert!(matches!(
            inst.invoke_generic("bump", &[TypeExpr::Int], vec![Value::Int(1)]),
            Err(DispatchError::NotGeneric { .. })
        ));
    }

    #[test]
    fn test_property_accessor_errors() {
        let proto = PrototypeBuilder::class("Gauge")
            .member(
                PropertyBuilder::new("Level", TypeExpr::Int)
                    .virtual_()
                    .read_only()
                    .getter(|_, _| Ok(Value::Int(5)))
                    .build(),
            )
            .build();
        let ty = TypeSynthesizer::new(proto, ProxyVariant::Intercept, ClassifyPolicy::default())
            .run()
            .unwrap();
        let inst = ProxyInstance::new(ty, None);
        assert_eq!(inst.get_property("Level").unwrap(), Value::Int(5));
        assert!(matches!(
            inst.set_property("Level", Value::Int(9)),
            Err(DispatchError::NoSetter(_))
        ));
        assert!(matches!(
            inst.get_property("Missing"),
            Err(DispatchError::UnknownMember(_))
        ));
    }
}
