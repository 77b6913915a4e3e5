//! Member eligibility classification.
//!
//! Pure predicate deciding, per prototype member, whether an override is
//! synthesized for it ([`MemberClass::Interceptable`]), a failing body is
//! generated ([`MemberClass::StubOnly`]), or it is left alone
//! ([`MemberClass::Skip`]). Never fails for a well-formed member.

use crate::model::prototype::{MemberInfo, PrototypeType};
use crate::model::types::TypeExpr;

/// Outcome of classifying one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberClass {
    /// Overridable and representable in the boxed convention; gets a
    /// descriptor, thunk, and handler-redirecting override.
    Interceptable,
    /// Abstract but not interceptable; still needs a body, which raises
    /// "not supported". Never reaches a handler.
    StubOnly,
    /// Not eligible; contributes nothing to the synthesized type.
    Skip,
}

/// Generic-member eligibility policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifyPolicy {
    /// Reject any generic member that declares constraints.
    Strict,
    /// Accept constraints the rewriter can carry over.
    #[default]
    Permissive,
}

/// Classify one member of `proto` under the given policy.
pub fn classify(proto: &PrototypeType, member: &MemberInfo, policy: ClassifyPolicy) -> MemberClass {
    let m = &member.modifiers;
    if m.is_static || m.is_final || !m.visibility.is_externally_visible() {
        return MemberClass::Skip;
    }
    if !member.is_overridable_on(proto.kind) {
        return MemberClass::Skip;
    }

    if signature_representable(member) && generics_admissible(member, policy) {
        return MemberClass::Interceptable;
    }

    if member.is_abstract_on(proto.kind) {
        MemberClass::StubOnly
    } else {
        MemberClass::Skip
    }
}

/// Every parameter and the return type must be representable in the boxed
/// calling convention.
fn signature_representable(member: &MemberInfo) -> bool {
    member.params.iter().all(|p| representable(&p.ty)) && representable(&member.return_type)
}

pub(crate) fn representable(ty: &TypeExpr) -> bool {
    match ty {
        // Raw pointers cannot be boxed.
        TypeExpr::Pointer(_) => false,
        // By-address types route through an address cell; the pointee must
        // itself be a plain boxable type.
        TypeExpr::Address(inner) => !matches!(
            inner.as_ref(),
            TypeExpr::Pointer(_) | TypeExpr::Address(_)
        ),
        TypeExpr::Named { args, .. } => args.iter().all(representable),
        _ => true,
    }
}

fn generics_admissible(member: &MemberInfo, policy: ClassifyPolicy) -> bool {
    match policy {
        ClassifyPolicy::Strict => member
            .generic_params
            .iter()
            .all(|p| p.constraints.is_empty()),
        ClassifyPolicy::Permissive => member.generic_params.iter().all(|p| {
            p.constraints.base_class.iter().all(constraint_representable)
                && p.constraints.interfaces.iter().all(constraint_representable)
        }),
    }
}

fn constraint_representable(ty: &TypeExpr) -> bool {
    match ty {
        TypeExpr::Pointer(_) | TypeExpr::Address(_) => false,
        TypeExpr::Named { args, .. } => args.iter().all(constraint_representable),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::prototype::{MethodBuilder, PropertyBuilder, PrototypeBuilder, Visibility};
    use crate::model::types::{GenericParam, ParamRef};
    use crate::value::Value;

    fn class_proto() -> std::sync::Arc<PrototypeType> {
        PrototypeBuilder::class("Sample").build()
    }

    #[test]
    fn test_static_and_final_members_skip() {
        let proto = class_proto();
        let static_m = MethodBuilder::new("a").static_().virtual_().build();
        assert_eq!(
            classify(&proto, &static_m, ClassifyPolicy::Permissive),
            MemberClass::Skip
        );

        let final_m = MethodBuilder::new("b").virtual_().final_().build();
        assert_eq!(
            classify(&proto, &final_m, ClassifyPolicy::Permissive),
            MemberClass::Skip
        );
    }

    #[test]
    fn test_inaccessible_member_skips() {
        let proto = class_proto();
        let hidden = MethodBuilder::new("a")
            .virtual_()
            .visibility(Visibility::Internal)
            .build();
        assert_eq!(
            classify(&proto, &hidden, ClassifyPolicy::Permissive),
            MemberClass::Skip
        );
    }

    #[test]
    fn test_non_virtual_class_member_skips() {
        let proto = class_proto();
        let plain = MethodBuilder::new("a").build();
        assert_eq!(
            classify(&proto, &plain, ClassifyPolicy::Permissive),
            MemberClass::Skip
        );
    }

    #[test]
    fn test_virtual_member_interceptable() {
        let proto = class_proto();
        let m = MethodBuilder::new("a")
            .virtual_()
            .param("x", TypeExpr::Int)
            .returns(TypeExpr::Int)
            .body(|_, _, _| Ok(Value::Int(0)))
            .build();
        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Permissive),
            MemberClass::Interceptable
        );
    }

    #[test]
    fn test_interface_member_is_implicitly_overridable() {
        let proto = PrototypeBuilder::interface("ISample").build();
        let m = MethodBuilder::new("a").returns(TypeExpr::Int).build();
        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Permissive),
            MemberClass::Interceptable
        );
    }

    #[test]
    fn test_pointer_parameter_stubs_abstract_member() {
        let proto = class_proto();
        let m = MethodBuilder::new("raw")
            .abstract_()
            .param("p", TypeExpr::pointer(TypeExpr::Int))
            .build();
        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Permissive),
            MemberClass::StubOnly
        );

        // A virtual (non-abstract) member with a pointer is simply skipped.
        let m = MethodBuilder::new("raw2")
            .virtual_()
            .param("p", TypeExpr::pointer(TypeExpr::Int))
            .body(|_, _, _| Ok(Value::Void))
            .build();
        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Permissive),
            MemberClass::Skip
        );
    }

    #[test]
    fn test_by_address_parameter_is_representable() {
        let proto = class_proto();
        let m = MethodBuilder::new("swap")
            .virtual_()
            .param("slot", TypeExpr::address(TypeExpr::Int))
            .body(|_, _, _| Ok(Value::Void))
            .build();
        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Permissive),
            MemberClass::Interceptable
        );
    }

    #[test]
    fn test_policy_split_on_constrained_generics() {
        let proto = class_proto();
        let constrained = GenericParam::new("T", 0).constrained_by(TypeExpr::generic(
            "Comparable",
            vec![TypeExpr::Param(ParamRef::member(0))],
        ));
        let m = MethodBuilder::new("max")
            .abstract_()
            .generic_param(constrained)
            .param("a", TypeExpr::Param(ParamRef::member(0)))
            .returns(TypeExpr::Param(ParamRef::member(0)))
            .build();

        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Strict),
            MemberClass::StubOnly
        );
        assert_eq!(
            classify(&proto, &m, ClassifyPolicy::Permissive),
            MemberClass::Interceptable
        );
    }

    #[test]
    fn test_unconstrained_generic_passes_both_policies() {
        let proto = class_proto();
        let m = MethodBuilder::new("identity")
            .virtual_()
            .generic_param(GenericParam::new("T", 0))
            .param("x", TypeExpr::Param(ParamRef::member(0)))
            .returns(TypeExpr::Param(ParamRef::member(0)))
            .body(|_, _, args| Ok(args[0].clone()))
            .build();

        for policy in [ClassifyPolicy::Strict, ClassifyPolicy::Permissive] {
            assert_eq!(classify(&proto, &m, policy), MemberClass::Interceptable);
        }
    }

    #[test]
    fn test_abstract_property_interceptable() {
        let proto = class_proto();
        let p = PropertyBuilder::new("Name", TypeExpr::Str).abstract_().build();
        assert_eq!(
            classify(&proto, &p, ClassifyPolicy::Permissive),
            MemberClass::Interceptable
        );
    }
}
