//! Runtime proxy type synthesis.
//!
//! Given an immutable prototype description of a class or interface,
//! proxyforge synthesizes a concrete proxy type whose overridable members
//! redirect through a caller-supplied handler, then caches it process-wide
//! so each (prototype, variant) pair is synthesized exactly once. A
//! secondary variant synthesizes change-notifying types whose property
//! writes fan out to registered listeners.
//!
//! The pipeline per type: classify members, define the type identity and
//! field layout, build a descriptor/thunk/override triple per
//! interceptable member (generic members close lazily per type-argument
//! vector), and finalize into an immutable dispatch table.
//!
//! ```no_run
//! use std::sync::Arc;
//! use proxyforge::{
//!     CallContext, MethodBuilder, PrototypeBuilder, ProxyInstance, TypeExpr, Value,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let proto = PrototypeBuilder::class("Doubler")
//!     .member(
//!         MethodBuilder::new("apply")
//!             .virtual_()
//!             .param("x", TypeExpr::Int)
//!             .returns(TypeExpr::Int)
//!             .body(|_, _, args| Ok(args[0].clone()))
//!             .build(),
//!     )
//!     .build();
//!
//! let provider = proxyforge::of_type(&proto)?;
//! let instance = provider.create_instance(
//!     &[],
//!     Arc::new(|_: &ProxyInstance, ctx: &CallContext| {
//!         let x = ctx.arg(0).and_then(|v| v.as_int()).unwrap_or(0);
//!         Ok(Value::Int(x * 2))
//!     }),
//! )?;
//!
//! assert_eq!(instance.invoke("apply", vec![Value::Int(21)])?, Value::Int(42));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod factory;
pub mod instance;
pub mod model;
pub mod notify;
pub mod synth;
pub mod value;

pub use cache::TypeCache;
pub use error::{ConstructError, DispatchError, SynthesisError};
pub use factory::ProxyProvider;
pub use instance::{ChangeListener, ProxyInstance, WrapTarget};
pub use model::prototype::{
    ConstructorBuilder, FieldInfo, MemberInfo, MethodBuilder, Modifiers, ParamInfo,
    PropertyBuilder, PrototypeBuilder, PrototypeId, PrototypeType, TypeKind, Visibility,
};
pub use model::types::{ConstraintFlags, ConstraintSet, GenericParam, ParamOwner, ParamRef, TypeExpr};
pub use notify::NotifyProp;
pub use synth::{
    CallContext, CallHandler, ClassifyPolicy, MemberClass, MemberDescriptor, ProxyVariant,
    SynthesizedType, TypeSynthesizer,
};
pub use value::{AddressCell, ArgCell, ObjectValue, Value};

use std::sync::Arc;

/// Acquire the interception proxy type for `proto` from the global cache.
pub fn of_type(proto: &Arc<PrototypeType>) -> Result<Arc<ProxyProvider>, SynthesisError> {
    cache::global().of_type(proto)
}

/// Acquire the change-notifying type for `proto` from the global cache.
pub fn observable_of_type(
    proto: &Arc<PrototypeType>,
) -> Result<Arc<ProxyProvider>, SynthesisError> {
    cache::global().observable_of_type(proto)
}
