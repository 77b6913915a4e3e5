//! Process-wide synthesized-type cache.
//!
//! Synthesis is expensive and its product is immutable, so types are
//! memoized per (prototype identity, variant). The dashmap entry lock
//! guarantees exactly-once synthesis under concurrent first requests:
//! one caller runs the orchestrator while the rest block on the shard and
//! then read the finished provider. A synthesis counter backs that
//! guarantee observably.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::SynthesisError;
use crate::factory::ProxyProvider;
use crate::model::facts;
use crate::model::prototype::{PrototypeId, PrototypeType, TypeKind};
use crate::synth::classify::ClassifyPolicy;
use crate::synth::orchestrator::{ProxyVariant, TypeSynthesizer};

static GLOBAL_CACHE: Lazy<TypeCache> = Lazy::new(TypeCache::new);

/// The process-wide cache.
pub fn global() -> &'static TypeCache {
    &GLOBAL_CACHE
}

pub struct TypeCache {
    entries: DashMap<(PrototypeId, ProxyVariant), Arc<ProxyProvider>>,
    syntheses: AtomicU64,
    policy: ClassifyPolicy,
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCache {
    pub fn new() -> Self {
        Self::with_policy(ClassifyPolicy::default())
    }

    pub fn with_policy(policy: ClassifyPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            syntheses: AtomicU64::new(0),
            policy,
        }
    }

    /// Get or synthesize the interception proxy type for `proto`.
    pub fn of_type(
        &self,
        proto: &Arc<PrototypeType>,
    ) -> Result<Arc<ProxyProvider>, SynthesisError> {
        self.acquire(proto, ProxyVariant::Intercept)
    }

    /// Get or synthesize the change-notifying type for `proto`.
    pub fn observable_of_type(
        &self,
        proto: &Arc<PrototypeType>,
    ) -> Result<Arc<ProxyProvider>, SynthesisError> {
        self.acquire(proto, ProxyVariant::Notify)
    }

    fn acquire(
        &self,
        proto: &Arc<PrototypeType>,
        variant: ProxyVariant,
    ) -> Result<Arc<ProxyProvider>, SynthesisError> {
        // Validate before touching the map so failures are never cached.
        self.validate(proto)?;

        match self.entries.entry((proto.id(), variant)) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(v) => {
                // Assignability facts must be visible before any member
                // closing can consult them.
                for interface in &proto.implements {
                    facts::global().declare(&proto.name, interface.clone());
                }
                let ty = TypeSynthesizer::new(proto.clone(), variant, self.policy).run()?;
                self.syntheses.fetch_add(1, Ordering::Relaxed);
                Ok(v.insert(Arc::new(ProxyProvider::new(ty))).clone())
            }
        }
    }

    fn validate(&self, proto: &PrototypeType) -> Result<(), SynthesisError> {
        if !proto.visibility.is_externally_visible() {
            return Err(SynthesisError::NotVisible(proto.name.clone()));
        }
        if proto.kind == TypeKind::Class && proto.sealed {
            return Err(SynthesisError::Sealed(proto.name.clone()));
        }
        if proto.is_open_generic() {
            return Err(SynthesisError::OpenGeneric(proto.name.clone()));
        }
        Ok(())
    }

    /// How many syntheses have actually run (cache hits do not count).
    pub fn synthesis_count(&self) -> u64 {
        self.syntheses.load(Ordering::Relaxed)
    }

    /// Drop the cached types for a prototype. Instances created from them
    /// keep working; the next request synthesizes afresh.
    pub fn unregister(&self, id: PrototypeId) -> bool {
        let a = self.entries.remove(&(id, ProxyVariant::Intercept)).is_some();
        let b = self.entries.remove(&(id, ProxyVariant::Notify)).is_some();
        a || b
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::prototype::{MethodBuilder, PrototypeBuilder, Visibility};
    use crate::model::types::TypeExpr;
    use crate::value::Value;

    fn simple_proto(name: &str) -> Arc<PrototypeType> {
        PrototypeBuilder::class(name)
            .member(
                MethodBuilder::new("ping")
                    .virtual_()
                    .returns(TypeExpr::Str)
                    .body(|_, _, _| Ok(Value::str("pong")))
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_repeated_requests_share_one_type() {
        let cache = TypeCache::new();
        let proto = simple_proto("Echo");
        let a = cache.of_type(&proto).unwrap();
        let b = cache.of_type(&proto).unwrap();
        assert!(Arc::ptr_eq(a.synthesized_type(), b.synthesized_type()));
        assert_eq!(cache.synthesis_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_variants_are_cached_independently() {
        let cache = TypeCache::new();
        let proto = simple_proto("Echo");
        cache.of_type(&proto).unwrap();
        cache.observable_of_type(&proto).unwrap();
        assert_eq!(cache.synthesis_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_validation_rejects_before_caching() {
        let cache = TypeCache::new();

        let sealed = PrototypeBuilder::class("Locked").sealed().build();
        assert!(matches!(
            cache.of_type(&sealed),
            Err(SynthesisError::Sealed(_))
        ));

        let hidden = PrototypeBuilder::class("Hidden")
            .visibility(Visibility::Internal)
            .build();
        assert!(matches!(
            cache.of_type(&hidden),
            Err(SynthesisError::NotVisible(_))
        ));

        let open = PrototypeBuilder::class("Open")
            .generic_context(
                vec![crate::model::types::GenericParam::new("T", 0)],
                Vec::new(),
            )
            .build();
        assert!(matches!(
            cache.of_type(&open),
            Err(SynthesisError::OpenGeneric(_))
        ));

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.synthesis_count(), 0);
    }

    #[test]
    fn test_unregister_forces_resynthesis() {
        let cache = TypeCache::new();
        let proto = simple_proto("Echo");
        let first = cache.of_type(&proto).unwrap();
        assert!(cache.unregister(proto.id()));
        let second = cache.of_type(&proto).unwrap();
        assert!(!Arc::ptr_eq(first.synthesized_type(), second.synthesized_type()));
        assert_eq!(cache.synthesis_count(), 2);
        assert!(!cache.unregister(simple_proto("Fresh").id()));
    }
}
