//! Override body emission.
//!
//! An emitted override body is what actually runs when a call reaches a
//! synthesized member: load the instance's handler binding; when unset,
//! pass straight through to the invocation thunk; otherwise assemble a
//! [`CallContext`] and redirect through the handler, adapting its boxed
//! result back to the declared return type. A handler failure propagates to
//! the caller unchanged.

use std::sync::Arc;

use crate::error::DispatchError;
use crate::instance::ProxyInstance;
use crate::synth::member::{InvocationThunk, MemberDescriptor};
use crate::model::types::TypeExpr;
use crate::value::{AddressCell, ArgCell, Value};

/// An emitted override body.
pub type DispatchFn =
    Arc<dyn Fn(&ProxyInstance, Vec<ArgCell>) -> Result<Value, DispatchError> + Send + Sync>;

/// Host-supplied interception handler.
///
/// Invoked in place of the original member behavior; call
/// [`CallContext::call_base`] to delegate. Handlers invoked concurrently
/// for one instance must themselves be thread-safe.
pub trait CallHandler: Send + Sync {
    fn invoke(&self, instance: &ProxyInstance, ctx: &CallContext)
        -> Result<Value, DispatchError>;
}

impl<F> CallHandler for F
where
    F: Fn(&ProxyInstance, &CallContext) -> Result<Value, DispatchError> + Send + Sync,
{
    fn invoke(
        &self,
        instance: &ProxyInstance,
        ctx: &CallContext,
    ) -> Result<Value, DispatchError> {
        self(instance, ctx)
    }
}

/// Ephemeral per-call record handed to the handler.
pub struct CallContext {
    /// Identity of the called member, closed if generic.
    pub descriptor: Arc<MemberDescriptor>,
    /// Boxed argument vector.
    pub args: Vec<ArgCell>,
    thunk: Arc<InvocationThunk>,
}

impl CallContext {
    /// Closing type arguments of the call (empty for non-generic members).
    pub fn type_args(&self) -> &[TypeExpr] {
        &self.descriptor.type_args
    }

    /// Read argument `i` as a plain value.
    pub fn arg(&self, i: usize) -> Option<Value> {
        self.args.get(i).and_then(ArgCell::load)
    }

    /// Delegate to the original member through the invocation thunk.
    pub fn call_base(&self, instance: &ProxyInstance) -> Result<Value, DispatchError> {
        self.thunk.invoke(instance, &self.args)
    }
}

/// Emit the public override body for an interceptable member.
pub(crate) fn emit_intercepted(
    descriptor: Arc<MemberDescriptor>,
    thunk: Arc<InvocationThunk>,
) -> DispatchFn {
    Arc::new(move |instance, mut args| {
        normalize_args(&descriptor, &mut args)?;
        match instance.handler() {
            // Unset binding means pass-through (wrap variant).
            None => thunk.invoke(instance, &args),
            Some(handler) => {
                let ctx = CallContext {
                    descriptor: descriptor.clone(),
                    args,
                    thunk: thunk.clone(),
                };
                let result = handler.invoke(instance, &ctx)?;
                adapt_result(&descriptor, result)
            }
        }
    })
}

/// Emit a body for a stub-only member: always fails, never reaches a handler.
pub(crate) fn emit_stub(member_name: Arc<str>) -> DispatchFn {
    Arc::new(move |_instance, _args| Err(DispatchError::NotSupported(member_name.to_string())))
}

/// Check arity and convert by-address parameters through an address cell
/// instead of boxing them directly.
fn normalize_args(
    descriptor: &MemberDescriptor,
    args: &mut [ArgCell],
) -> Result<(), DispatchError> {
    if args.len() != descriptor.param_types.len() {
        return Err(DispatchError::ArityMismatch {
            member: descriptor.name.to_string(),
            expected: descriptor.param_types.len(),
            found: args.len(),
        });
    }
    for (cell, ty) in args.iter_mut().zip(&descriptor.param_types) {
        if let TypeExpr::Address(_) = ty {
            if let ArgCell::ByValue(v) = cell {
                *cell = ArgCell::ByAddress(AddressCell::new(v.clone()));
            }
        }
    }
    Ok(())
}

/// Unbox the handler's result to the declared return type. Void members
/// discard the result; anything else must conform.
fn adapt_result(descriptor: &MemberDescriptor, result: Value) -> Result<Value, DispatchError> {
    if descriptor.return_type == TypeExpr::Void {
        return Ok(Value::Void);
    }
    if result.conforms_to(&descriptor.return_type) {
        Ok(result)
    } else {
        Err(DispatchError::InvalidCast {
            member: descriptor.name.to_string(),
            expected: descriptor.return_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(params: Vec<TypeExpr>, ret: TypeExpr) -> MemberDescriptor {
        MemberDescriptor {
            member_index: 0,
            name: Arc::from("m"),
            declaring_type: Arc::from("Sample"),
            param_types: params,
            return_type: ret,
            generic_arity: 0,
            type_args: vec![],
        }
    }

    #[test]
    fn test_normalize_rejects_wrong_arity() {
        let d = descriptor(vec![TypeExpr::Int], TypeExpr::Void);
        let mut args = vec![];
        let err = normalize_args(&d, &mut args).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ArityMismatch {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_normalize_converts_by_address() {
        let d = descriptor(vec![TypeExpr::address(TypeExpr::Int)], TypeExpr::Void);
        let mut args = vec![ArgCell::ByValue(Value::Int(7))];
        normalize_args(&d, &mut args).unwrap();
        match &args[0] {
            ArgCell::ByAddress(cell) => assert_eq!(cell.load(), Value::Int(7)),
            other => panic!("expected address cell, got {other:?}"),
        }

        // Plain parameters stay boxed by value.
        let d = descriptor(vec![TypeExpr::Int], TypeExpr::Void);
        let mut args = vec![ArgCell::ByValue(Value::Int(7))];
        normalize_args(&d, &mut args).unwrap();
        assert!(matches!(args[0], ArgCell::ByValue(_)));
    }

    #[test]
    fn test_adapt_result_discards_for_void() {
        let d = descriptor(vec![], TypeExpr::Void);
        assert_eq!(adapt_result(&d, Value::Int(9)).unwrap(), Value::Void);
    }

    #[test]
    fn test_adapt_result_rejects_wrong_type() {
        let d = descriptor(vec![], TypeExpr::Int);
        assert_eq!(adapt_result(&d, Value::Int(9)).unwrap(), Value::Int(9));

        let err = adapt_result(&d, Value::str("nope")).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCast { .. }));
    }
}
