//! Instance creation and handler binding.
//!
//! A [`ProxyProvider`] wraps one finalized synthesized type and turns it
//! into instances: `create_instance` for handler-redirecting proxies,
//! `wrap` for composition proxies over an existing target, and
//! `create_observable` for the notify variant. The handler is bound before
//! the instance is returned, and before any constructor body runs, so no
//! call can observe a half-bound proxy.

use std::sync::Arc;

use crate::error::ConstructError;
use crate::instance::{ProxyInstance, WrapTarget};
use crate::model::prototype::{TypeKind, Visibility};
use crate::synth::emit::CallHandler;
use crate::synth::orchestrator::{ProxyVariant, SynthesizedCtor, SynthesizedType};
use crate::value::Value;

/// Factory for instances of one synthesized type.
#[derive(Debug)]
pub struct ProxyProvider {
    ty: Arc<SynthesizedType>,
}

impl ProxyProvider {
    pub(crate) fn new(ty: Arc<SynthesizedType>) -> Self {
        Self { ty }
    }

    pub fn synthesized_type(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    pub fn variant(&self) -> ProxyVariant {
        self.ty.variant()
    }

    /// Create an interception proxy, bind `handler`, and run the matching
    /// constructor.
    pub fn create_instance(
        &self,
        args: &[Value],
        handler: Arc<dyn CallHandler>,
    ) -> Result<Arc<ProxyInstance>, ConstructError> {
        self.expect_variant(ProxyVariant::Intercept)?;
        let ctor = self.select_constructor(args)?;
        let instance = ProxyInstance::new(self.ty.clone(), None);
        instance.bind_handler(handler);
        self.run_init(&instance, ctor, args)?;
        Ok(instance)
    }

    /// Create a composition proxy over `target`. Only interface prototypes
    /// can wrap; with no handler, every call passes straight through.
    pub fn wrap(
        &self,
        target: Arc<dyn WrapTarget>,
        handler: Option<Arc<dyn CallHandler>>,
    ) -> Result<Arc<ProxyInstance>, ConstructError> {
        self.expect_variant(ProxyVariant::Intercept)?;
        if self.ty.prototype().kind != TypeKind::Interface {
            return Err(ConstructError::NotWrappable {
                type_name: self.ty.name().to_string(),
            });
        }
        let instance = ProxyInstance::new(self.ty.clone(), Some(target));
        if let Some(handler) = handler {
            instance.bind_handler(handler);
        }
        Ok(instance)
    }

    /// Create a change-notifying instance (notify variant only).
    pub fn create_observable(&self, args: &[Value]) -> Result<Arc<ProxyInstance>, ConstructError> {
        self.expect_variant(ProxyVariant::Notify)?;
        let ctor = self.select_constructor(args)?;
        let instance = ProxyInstance::new(self.ty.clone(), None);
        self.run_init(&instance, ctor, args)?;
        Ok(instance)
    }

    fn expect_variant(&self, expected: ProxyVariant) -> Result<(), ConstructError> {
        if self.ty.variant() != expected {
            return Err(ConstructError::VariantMismatch {
                type_name: self.ty.name().to_string(),
                variant: self.ty.variant().label(),
                expected: expected.label(),
            });
        }
        Ok(())
    }

    /// Pick the constructor whose signature accepts `args`. A match that
    /// exists but is not public is a distinct failure from no match at all.
    fn select_constructor(&self, args: &[Value]) -> Result<&SynthesizedCtor, ConstructError> {
        let mut inaccessible = false;
        for ctor in self.ty.constructors() {
            if ctor.params.len() != args.len() {
                continue;
            }
            let conforms = ctor
                .params
                .iter()
                .zip(args)
                .all(|(ty, arg)| arg.conforms_to(ty));
            if !conforms {
                continue;
            }
            if ctor.visibility == Visibility::Public {
                return Ok(ctor);
            }
            inaccessible = true;
        }
        if inaccessible {
            Err(ConstructError::InaccessibleMember {
                type_name: self.ty.name().to_string(),
            })
        } else {
            Err(ConstructError::MissingMember {
                type_name: self.ty.name().to_string(),
                arg_count: args.len(),
            })
        }
    }

    fn run_init(
        &self,
        instance: &Arc<ProxyInstance>,
        ctor: &SynthesizedCtor,
        args: &[Value],
    ) -> Result<(), ConstructError> {
        if let Some(init) = &ctor.init {
            init(instance, args).map_err(|source| ConstructError::Init {
                type_name: self.ty.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
