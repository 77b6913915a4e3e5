//! Data model: type expressions, prototype descriptions, and the
//! assignability facts registry.

pub mod facts;
pub mod prototype;
pub mod types;

pub use facts::TypeFacts;
pub use prototype::{
    ConstructorBuilder, ConstructorInfo, CtorBody, FieldInfo, GetterBody, MemberInfo, MemberKind,
    MethodBody, MethodBuilder, Modifiers, ParamInfo, PropertyBuilder, PrototypeBuilder,
    PrototypeId, PrototypeType, SetterBody, TypeKind, Visibility,
};
pub use types::{ConstraintFlags, ConstraintSet, GenericParam, ParamOwner, ParamRef, TypeExpr};
