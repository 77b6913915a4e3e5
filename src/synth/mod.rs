//! Member classification, constraint rewriting, per-member synthesis,
//! override emission, and the synthesis orchestrator.

pub mod classify;
pub mod constraints;
pub mod emit;
pub mod member;
pub mod orchestrator;

pub use classify::{classify, ClassifyPolicy, MemberClass};
pub use constraints::rewrite_generic_params;
pub use emit::{CallContext, CallHandler, DispatchFn};
pub use member::{
    BaseAccessor, ClosedMember, InvocationThunk, MemberDescriptor, MemberHolder,
};
pub use orchestrator::{
    MemberEntry, ProxyVariant, SynthesisState, SynthesizedCtor, SynthesizedType, TypeSynthesizer,
};
