//! Change-notification overrides.
//!
//! The notify variant replaces eligible property accessors with bodies
//! that write through to the base accessor (or a synthesized backing
//! field when the prototype accessor is abstract) and then raise a change
//! notification for the property and each of its related properties.
//! Notification is unconditional: writing a value equal to the current one
//! still notifies.

use crate::error::DispatchError;
use crate::instance::ProxyInstance;
use crate::model::prototype::{GetterBody, MemberInfo, MemberKind, PrototypeType, SetterBody};
use crate::model::types::TypeExpr;
use crate::synth::classify::{self, MemberClass};
use crate::value::Value;

/// Notification metadata for one eligible property of a synthesized type.
#[derive(Clone)]
pub struct NotifyProp {
    pub name: String,
    pub value_type: TypeExpr,
    pub getter: Option<GetterBody>,
    pub setter: Option<SetterBody>,
    /// Slot of the synthesized backing field, present when the prototype
    /// accessor pair is incomplete.
    pub backing: Option<usize>,
    /// Properties whose notifications fan out from a write to this one.
    pub related: Vec<String>,
}

impl std::fmt::Debug for NotifyProp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyProp")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("backing", &self.backing)
            .field("related", &self.related)
            .finish()
    }
}

impl NotifyProp {
    pub(crate) fn read(&self, instance: &ProxyInstance) -> Result<Value, DispatchError> {
        if let Some(getter) = &self.getter {
            return getter(instance, &[]);
        }
        match self.backing {
            Some(slot) => instance.field_value(slot),
            None => Err(DispatchError::NotImplemented(self.name.clone())),
        }
    }

    /// Store the value, then notify for this property and its related
    /// properties, in that order.
    pub(crate) fn write(&self, instance: &ProxyInstance, value: Value) -> Result<(), DispatchError> {
        if !value.conforms_to(&self.value_type) {
            return Err(DispatchError::ArgumentMismatch {
                member: self.name.clone(),
                param: "value".to_string(),
                expected: self.value_type.to_string(),
            });
        }
        if let Some(setter) = &self.setter {
            setter(instance, &[], value)?;
        } else {
            match self.backing {
                Some(slot) => instance.store_field(slot, value)?,
                None => return Err(DispatchError::NotImplemented(self.name.clone())),
            }
        }
        instance.raise_changed(&self.name);
        for rel in &self.related {
            instance.raise_changed(rel);
        }
        Ok(())
    }
}

/// Classification for the notify variant: a simplified shape of the
/// intercept classifier scoped to properties.
pub(crate) fn classify_property(proto: &PrototypeType, member: &MemberInfo) -> MemberClass {
    let m = &member.modifiers;
    let eligible = matches!(
        &member.kind,
        MemberKind::Property { indexed: false, .. }
    ) && !m.is_static
        && !m.is_final
        && m.visibility.is_externally_visible()
        && member.is_overridable_on(proto.kind)
        && classify::representable(&member.return_type);

    if eligible {
        MemberClass::Interceptable
    } else if member.is_abstract_on(proto.kind) {
        // A concrete synthesized type cannot leave abstract members
        // unimplemented.
        MemberClass::StubOnly
    } else {
        MemberClass::Skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::prototype::{MethodBuilder, PropertyBuilder, PrototypeBuilder};
    use crate::model::prototype::Visibility;

    #[test]
    fn test_plain_virtual_property_is_eligible() {
        let proto = PrototypeBuilder::class("Person")
            .member(
                PropertyBuilder::new("Name", TypeExpr::Str)
                    .virtual_()
                    .getter(|_, _| Ok(Value::str("")))
                    .setter(|_, _, _| Ok(()))
                    .build(),
            )
            .build();
        assert_eq!(
            classify_property(&proto, &proto.members[0]),
            MemberClass::Interceptable
        );
    }

    #[test]
    fn test_indexed_and_static_properties_are_not_eligible() {
        let proto = PrototypeBuilder::class("Grid")
            .member(
                PropertyBuilder::new("Item", TypeExpr::Int)
                    .virtual_()
                    .index_param("i", TypeExpr::Int)
                    .getter(|_, _| Ok(Value::Int(0)))
                    .build(),
            )
            .member(
                PropertyBuilder::new("Count", TypeExpr::Int)
                    .static_()
                    .getter(|_, _| Ok(Value::Int(0)))
                    .build(),
            )
            .build();
        assert_eq!(
            classify_property(&proto, &proto.members[0]),
            MemberClass::Skip
        );
        assert_eq!(
            classify_property(&proto, &proto.members[1]),
            MemberClass::Skip
        );
    }

    #[test]
    fn test_abstract_method_needs_a_stub() {
        let proto = PrototypeBuilder::class("Shape")
            .member(MethodBuilder::new("area").abstract_().returns(TypeExpr::Float).build())
            .build();
        assert_eq!(
            classify_property(&proto, &proto.members[0]),
            MemberClass::StubOnly
        );
    }

    #[test]
    fn test_internal_property_is_skipped() {
        let proto = PrototypeBuilder::class("Person")
            .member(
                PropertyBuilder::new("Secret", TypeExpr::Str)
                    .virtual_()
                    .visibility(Visibility::Internal)
                    .getter(|_, _| Ok(Value::str("")))
                    .setter(|_, _, _| Ok(()))
                    .build(),
            )
            .build();
        assert_eq!(
            classify_property(&proto, &proto.members[0]),
            MemberClass::Skip
        );
    }
}
