//! Type expressions and generic parameter descriptions.
//!
//! A [`TypeExpr`] describes the declared type of a parameter, return value,
//! field, or constraint. Generic parameter references are explicit
//! ([`ParamRef`]) and carry which list they belong to: the member's own
//! parameter list or the declaring type's list. Closed generic names render
//! in the `Name_Arg` convention (e.g. `Comparable_Int`).

use std::fmt;

/// Which generic parameter list a [`ParamRef`] points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamOwner {
    /// The member's own generic parameter list.
    Member,
    /// The declaring (prototype) type's generic parameter list.
    DeclaringType,
}

/// A reference to a generic parameter by list and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamRef {
    /// Owning parameter list.
    pub owner: ParamOwner,
    /// Zero-based position within that list.
    pub index: usize,
}

impl ParamRef {
    /// Reference into the member's own parameter list.
    pub fn member(index: usize) -> Self {
        Self {
            owner: ParamOwner::Member,
            index,
        }
    }

    /// Reference into the declaring type's parameter list.
    pub fn declaring(index: usize) -> Self {
        Self {
            owner: ParamOwner::DeclaringType,
            index,
        }
    }
}

/// A declared type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// No value (return position only).
    Void,
    Bool,
    Int,
    Float,
    Str,
    /// A named class or interface, possibly with generic arguments.
    Named { name: String, args: Vec<TypeExpr> },
    /// A generic parameter reference.
    Param(ParamRef),
    /// A by-address (by-reference) type. Representable in the boxed calling
    /// convention through an address cell.
    Address(Box<TypeExpr>),
    /// A raw pointer type. Never representable in the boxed convention.
    Pointer(Box<TypeExpr>),
}

impl TypeExpr {
    /// A named type without generic arguments.
    pub fn named(name: &str) -> Self {
        TypeExpr::Named {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    /// A named type with generic arguments.
    pub fn generic(name: &str, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Named {
            name: name.to_string(),
            args,
        }
    }

    /// A by-address wrapper.
    pub fn address(inner: TypeExpr) -> Self {
        TypeExpr::Address(Box::new(inner))
    }

    /// A raw pointer wrapper.
    pub fn pointer(inner: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(inner))
    }

    /// Whether this expression contains any generic parameter reference.
    pub fn contains_param(&self) -> bool {
        match self {
            TypeExpr::Param(_) => true,
            TypeExpr::Named { args, .. } => args.iter().any(TypeExpr::contains_param),
            TypeExpr::Address(inner) | TypeExpr::Pointer(inner) => inner.contains_param(),
            _ => false,
        }
    }

    /// Rebuild this expression, mapping every parameter reference through `f`.
    ///
    /// The mapping runs depth-first so constraints that are themselves
    /// generic types (e.g. `Comparable<T>`) resolve their nested references.
    pub fn try_map_params<E>(
        &self,
        f: &mut impl FnMut(ParamRef) -> Result<TypeExpr, E>,
    ) -> Result<TypeExpr, E> {
        match self {
            TypeExpr::Param(r) => f(*r),
            TypeExpr::Named { name, args } => {
                let mut mapped = Vec::with_capacity(args.len());
                for a in args {
                    mapped.push(a.try_map_params(f)?);
                }
                Ok(TypeExpr::Named {
                    name: name.clone(),
                    args: mapped,
                })
            }
            TypeExpr::Address(inner) => Ok(TypeExpr::Address(Box::new(inner.try_map_params(f)?))),
            TypeExpr::Pointer(inner) => Ok(TypeExpr::Pointer(Box::new(inner.try_map_params(f)?))),
            other => Ok(other.clone()),
        }
    }

    /// Substitute member-list parameter references with the given closing
    /// arguments. Declaring-type references are left untouched; the caller
    /// validates arity beforehand.
    pub fn close_member_params(&self, type_args: &[TypeExpr]) -> TypeExpr {
        self.try_map_params::<()>(&mut |r| match r.owner {
            ParamOwner::Member if r.index < type_args.len() => Ok(type_args[r.index].clone()),
            _ => Ok(TypeExpr::Param(r)),
        })
        .unwrap_or_else(|_| self.clone())
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Void => write!(f, "Void"),
            TypeExpr::Bool => write!(f, "Bool"),
            TypeExpr::Int => write!(f, "Int"),
            TypeExpr::Float => write!(f, "Float"),
            TypeExpr::Str => write!(f, "Str"),
            TypeExpr::Named { name, args } => {
                write!(f, "{}", name)?;
                for a in args {
                    write!(f, "_{}", a)?;
                }
                Ok(())
            }
            TypeExpr::Param(r) => match r.owner {
                ParamOwner::Member => write!(f, "!!{}", r.index),
                ParamOwner::DeclaringType => write!(f, "!{}", r.index),
            },
            TypeExpr::Address(inner) => write!(f, "{}&", inner),
            TypeExpr::Pointer(inner) => write!(f, "{}*", inner),
        }
    }
}

/// Special constraint flags copied verbatim during rewriting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstraintFlags {
    /// The argument must be a reference type.
    pub reference_only: bool,
    /// The argument must be a value type.
    pub value_only: bool,
    /// The argument must have a parameterless constructor.
    pub parameterless_ctor: bool,
}

/// The constraint shape of one generic parameter: at most one base-class
/// constraint, any number of interface constraints, and the special flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    /// Single reference-type (base class) constraint, if any.
    pub base_class: Option<TypeExpr>,
    /// Interface constraints.
    pub interfaces: Vec<TypeExpr>,
    /// Special flags.
    pub flags: ConstraintFlags,
}

impl ConstraintSet {
    /// Whether no constraints are declared.
    pub fn is_empty(&self) -> bool {
        self.base_class.is_none()
            && self.interfaces.is_empty()
            && self.flags == ConstraintFlags::default()
    }
}

/// One generic parameter with its constraint shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParam {
    /// Parameter name (e.g. "T").
    pub name: String,
    /// Position in the parameter list.
    pub index: usize,
    /// Declared constraints.
    pub constraints: ConstraintSet,
}

impl GenericParam {
    /// An unconstrained parameter.
    pub fn new(name: &str, index: usize) -> Self {
        Self {
            name: name.to_string(),
            index,
            constraints: ConstraintSet::default(),
        }
    }

    /// Add an interface constraint.
    pub fn constrained_by(mut self, interface: TypeExpr) -> Self {
        self.constraints.interfaces.push(interface);
        self
    }

    /// Set the base-class constraint.
    pub fn with_base_class(mut self, base: TypeExpr) -> Self {
        self.constraints.base_class = Some(base);
        self
    }

    /// Set the special flags.
    pub fn with_flags(mut self, flags: ConstraintFlags) -> Self {
        self.constraints.flags = flags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_monomorphized_names() {
        let ty = TypeExpr::generic("Comparable", vec![TypeExpr::Int]);
        assert_eq!(ty.to_string(), "Comparable_Int");

        let ty = TypeExpr::generic("Map", vec![TypeExpr::Str, TypeExpr::Int]);
        assert_eq!(ty.to_string(), "Map_Str_Int");
    }

    #[test]
    fn test_contains_param() {
        assert!(!TypeExpr::Int.contains_param());
        assert!(TypeExpr::Param(ParamRef::member(0)).contains_param());

        let nested = TypeExpr::generic("Comparable", vec![TypeExpr::Param(ParamRef::member(0))]);
        assert!(nested.contains_param());

        let addr = TypeExpr::address(TypeExpr::Param(ParamRef::declaring(1)));
        assert!(addr.contains_param());
    }

    #[test]
    fn test_close_member_params() {
        let ty = TypeExpr::generic("Comparable", vec![TypeExpr::Param(ParamRef::member(0))]);
        let closed = ty.close_member_params(&[TypeExpr::Int]);
        assert_eq!(closed, TypeExpr::generic("Comparable", vec![TypeExpr::Int]));

        // Declaring-type references survive member closing untouched.
        let ty = TypeExpr::Param(ParamRef::declaring(0));
        assert_eq!(ty.close_member_params(&[TypeExpr::Int]), ty);
    }

    #[test]
    fn test_constraint_set_is_empty() {
        assert!(ConstraintSet::default().is_empty());

        let mut set = ConstraintSet::default();
        set.flags.reference_only = true;
        assert!(!set.is_empty());

        let set = ConstraintSet {
            interfaces: vec![TypeExpr::named("Comparable")],
            ..Default::default()
        };
        assert!(!set.is_empty());
    }
}
