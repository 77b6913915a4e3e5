//! Generic constraint rewriting.
//!
//! Copies a base member's generic parameter constraints onto the synthesized
//! counterpart. Constraints may reference generic parameters; references
//! into the member's own list stay symbolic (the new list mirrors the base
//! list position-for-position), while references into the declaring type's
//! list are substituted with the concrete enclosing arguments. Resolution
//! recurses into constraints that are themselves generic types, e.g.
//! `Comparable<T>`.
//!
//! Inputs come from the orchestrator and are assumed self-consistent;
//! mismatched lists or dangling references are invalid-argument errors.

use crate::error::SynthesisError;
use crate::model::types::{ConstraintSet, GenericParam, ParamOwner, ParamRef, TypeExpr};

/// Rewrite `new_params` to carry constraints equivalent to `base_params`,
/// resolving declaring-type references against `enclosing_args`.
pub fn rewrite_generic_params(
    new_params: &mut [GenericParam],
    base_params: &[GenericParam],
    enclosing_args: &[TypeExpr],
) -> Result<(), SynthesisError> {
    if new_params.len() != base_params.len() {
        return Err(SynthesisError::ParamListMismatch {
            new_len: new_params.len(),
            base_len: base_params.len(),
        });
    }

    let member_len = new_params.len();
    for (new_p, base_p) in new_params.iter_mut().zip(base_params) {
        let mut set = ConstraintSet {
            // Special flags are copied verbatim.
            flags: base_p.constraints.flags,
            ..Default::default()
        };
        if let Some(base_class) = &base_p.constraints.base_class {
            set.base_class = Some(resolve(base_class, member_len, enclosing_args, &base_p.name)?);
        }
        for iface in &base_p.constraints.interfaces {
            set.interfaces
                .push(resolve(iface, member_len, enclosing_args, &base_p.name)?);
        }
        new_p.constraints = set;
    }
    Ok(())
}

fn resolve(
    constraint: &TypeExpr,
    member_len: usize,
    enclosing_args: &[TypeExpr],
    param_name: &str,
) -> Result<TypeExpr, SynthesisError> {
    constraint.try_map_params(&mut |r: ParamRef| match r.owner {
        ParamOwner::Member if r.index < member_len => Ok(TypeExpr::Param(r)),
        ParamOwner::DeclaringType if r.index < enclosing_args.len() => {
            Ok(enclosing_args[r.index].clone())
        }
        _ => Err(SynthesisError::UnresolvedParamRef {
            param: param_name.to_string(),
            index: r.index,
        }),
    })
}
