//! Error types for synthesis, construction, and dispatch.
//!
//! Failures fall into three families with distinct lifetimes:
//! - [`SynthesisError`] is raised once, at type acquisition, before any
//!   instance exists.
//! - [`ConstructError`] is raised at instance creation.
//! - [`DispatchError`] is raised at call time and propagates to the caller
//!   unmodified; handler failures are never wrapped.

/// Errors raised while acquiring a synthesized type from a prototype.
///
/// All variants surface synchronously from the type cache before any
/// generation work is retained; none are retried.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SynthesisError {
    /// The prototype is not visible outside its defining unit.
    #[error("prototype `{0}` is not visible outside its defining unit")]
    NotVisible(String),

    /// The prototype is a sealed class and cannot be extended.
    #[error("prototype `{0}` is sealed and cannot be extended")]
    Sealed(String),

    /// The prototype carries unbound generic parameters.
    #[error("prototype `{0}` is an open generic type")]
    OpenGeneric(String),

    /// A synthesis step received a member its precondition should have
    /// excluded. This is an implementation defect and fails loudly.
    #[error("invalid member `{member}` on `{declaring}`: {reason}")]
    InvalidMember {
        member: String,
        declaring: String,
        reason: String,
    },

    /// The constraint rewriter was handed parameter lists of unequal length.
    #[error("generic parameter list mismatch: {new_len} new vs {base_len} base parameters")]
    ParamListMismatch { new_len: usize, base_len: usize },

    /// A constraint references a generic parameter that belongs to neither
    /// the member's own list nor the declaring type's list.
    #[error("constraint on `{param}` references parameter index {index} outside both lists")]
    UnresolvedParamRef { param: String, index: usize },

    /// The orchestrator was driven out of order.
    #[error("invalid synthesis state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors raised while constructing a proxy instance.
#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    /// No constructor accepts the supplied arguments.
    #[error("no constructor of `{type_name}` accepts the supplied {arg_count} argument(s)")]
    MissingMember { type_name: String, arg_count: usize },

    /// A constructor matches the arguments but is not accessible.
    #[error("the matching constructor of `{type_name}` is not accessible")]
    InaccessibleMember { type_name: String },

    /// The provider's prototype is not an interface, so it cannot wrap.
    #[error("`{type_name}` is not an interface prototype and cannot wrap a target")]
    NotWrappable { type_name: String },

    /// The provider was synthesized for a different variant than requested.
    #[error("`{type_name}` was synthesized as {variant}; requested operation needs {expected}")]
    VariantMismatch {
        type_name: String,
        variant: &'static str,
        expected: &'static str,
    },

    /// A constructor body failed while initializing the instance.
    #[error("constructor of `{type_name}` failed")]
    Init {
        type_name: String,
        #[source]
        source: DispatchError,
    },
}

/// Errors raised while dispatching a call through a synthesized member.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The member does not exist on the synthesized type.
    #[error("unknown member `{0}`")]
    UnknownMember(String),

    /// The member was stubbed during synthesis and has no behavior.
    #[error("member `{0}` is not supported by the synthesized type")]
    NotSupported(String),

    /// The member is abstract on the prototype and has no base implementation.
    #[error("member `{0}` has no base implementation")]
    NotImplemented(String),

    /// Wrong number of call arguments.
    #[error("member `{member}` expects {expected} argument(s), got {found}")]
    ArityMismatch {
        member: String,
        expected: usize,
        found: usize,
    },

    /// An argument does not conform to the declared parameter type.
    #[error("argument `{param}` of `{member}` does not conform to `{expected}`")]
    ArgumentMismatch {
        member: String,
        param: String,
        expected: String,
    },

    /// Wrong number of closing type arguments for a generic member.
    #[error("member `{member}` expects {expected} type argument(s), got {found}")]
    TypeArgumentArity {
        member: String,
        expected: usize,
        found: usize,
    },

    /// A closing type argument does not satisfy a declared constraint.
    #[error("type argument `{arg}` does not satisfy constraint `{constraint}` on parameter `{param}`")]
    ConstraintViolation {
        arg: String,
        constraint: String,
        param: String,
    },

    /// A generic member was invoked without closing type arguments.
    #[error("generic member `{member}` requires explicit type arguments")]
    MissingTypeArguments { member: String },

    /// Type arguments were supplied for a non-generic member.
    #[error("member `{member}` is not generic")]
    NotGeneric { member: String },

    /// The handler's result could not be converted to the declared return type.
    #[error("cannot convert handler result to `{expected}` for member `{member}`")]
    InvalidCast { member: String, expected: String },

    /// The property has no readable accessor.
    #[error("property `{0}` has no getter")]
    NoGetter(String),

    /// The property has no writable accessor.
    #[error("property `{0}` has no setter")]
    NoSetter(String),

    /// A host-raised failure, carried through dispatch unchanged.
    #[error("{0}")]
    Handler(String),
}
