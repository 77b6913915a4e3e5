//! Assignability facts used for constraint satisfaction.
//!
//! Closing a generic member must verify that each type argument satisfies
//! the (rewritten) constraints of its parameter. Rust has no runtime type
//! hierarchy to consult, so the engine keeps an explicit, process-wide
//! registry of "type X is assignable to Y" facts. Primitive comparability
//! and equatability are seeded; hosts declare facts for their own types.

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::model::types::{ConstraintSet, TypeExpr};

static GLOBAL_FACTS: Lazy<TypeFacts> = Lazy::new(TypeFacts::with_builtins);

/// The process-wide facts registry.
pub fn global() -> &'static TypeFacts {
    &GLOBAL_FACTS
}

/// Registry of assignability facts: source type name -> target types the
/// source is assignable to (implemented interfaces and base classes alike).
#[derive(Debug, Default)]
pub struct TypeFacts {
    assignable: DashMap<String, Vec<TypeExpr>>,
}

impl TypeFacts {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with primitive facts.
    pub fn with_builtins() -> Self {
        let facts = Self::new();
        for prim in [TypeExpr::Int, TypeExpr::Float, TypeExpr::Str] {
            facts.declare(
                &prim.to_string(),
                TypeExpr::generic("Comparable", vec![prim.clone()]),
            );
            facts.declare(
                &prim.to_string(),
                TypeExpr::generic("Equatable", vec![prim.clone()]),
            );
        }
        facts.declare(
            "Bool",
            TypeExpr::generic("Equatable", vec![TypeExpr::Bool]),
        );
        facts
    }

    /// Declare that values of `type_name` are assignable to `target`.
    pub fn declare(&self, type_name: &str, target: TypeExpr) {
        let mut entry = self.assignable.entry(type_name.to_string()).or_default();
        if !entry.contains(&target) {
            entry.push(target);
        }
    }

    /// Whether `ty` is assignable to `target`. Identity always holds.
    pub fn is_assignable(&self, ty: &TypeExpr, target: &TypeExpr) -> bool {
        if ty == target {
            return true;
        }
        self.assignable
            .get(&ty.to_string())
            .is_some_and(|targets| targets.contains(target))
    }

    /// Whether the type named `source` is assignable to `target`.
    pub fn name_is_assignable(&self, source: &str, target: &TypeExpr) -> bool {
        if source == target.to_string() {
            return true;
        }
        self.assignable
            .get(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Check a closing type argument against a fully resolved constraint set.
    ///
    /// Returns the rendered constraint that failed, for error reporting.
    pub fn satisfies(&self, arg: &TypeExpr, constraints: &ConstraintSet) -> Result<(), String> {
        if constraints.flags.reference_only && !is_reference_type(arg) {
            return Err("reference type".to_string());
        }
        if constraints.flags.value_only && is_reference_type(arg) {
            return Err("value type".to_string());
        }
        if let Some(base) = &constraints.base_class {
            if !self.is_assignable(arg, base) {
                return Err(base.to_string());
            }
        }
        for iface in &constraints.interfaces {
            if !self.is_assignable(arg, iface) {
                return Err(iface.to_string());
            }
        }
        Ok(())
    }

    /// Number of source types with declared facts.
    pub fn len(&self) -> usize {
        self.assignable.len()
    }

    /// Whether no facts are declared.
    pub fn is_empty(&self) -> bool {
        self.assignable.is_empty()
    }
}

fn is_reference_type(ty: &TypeExpr) -> bool {
    matches!(ty, TypeExpr::Named { .. } | TypeExpr::Str)
}
