//! End-to-end interception: dispatch-table completeness, call-through
//! equivalence, handler observation, and by-address argument flow.

use std::sync::Arc;

use proxyforge::{
    ArgCell, CallContext, ClassifyPolicy, ConstructorBuilder, DispatchError, MethodBuilder,
    PropertyBuilder, PrototypeBuilder, PrototypeType, ProxyInstance, ProxyVariant, TypeCache,
    TypeExpr, TypeSynthesizer, Value, Visibility,
};

fn passthrough() -> Arc<dyn proxyforge::CallHandler> {
    Arc::new(|inst: &ProxyInstance, ctx: &CallContext| ctx.call_base(inst))
}

fn shape_proto() -> Arc<PrototypeType> {
    PrototypeBuilder::class("Shape")
        .field("sides", TypeExpr::Int, Value::Int(4))
        .constructor(ConstructorBuilder::new().build())
        .member(
            MethodBuilder::new("describe")
                .virtual_()
                .returns(TypeExpr::Str)
                .body(|inst, _, _| {
                    let sides = inst.field("sides").and_then(|v| v.as_int()).unwrap_or(0);
                    Ok(Value::str(format!("{sides}-sided")))
                })
                .build(),
        )
        .member(
            MethodBuilder::new("area")
                .abstract_()
                .returns(TypeExpr::Float)
                .build(),
        )
        .member(
            MethodBuilder::new("raw_measure")
                .abstract_()
                .param("out", TypeExpr::pointer(TypeExpr::Float))
                .build(),
        )
        .member(MethodBuilder::new("internal_id").returns(TypeExpr::Int).build())
        .member(
            MethodBuilder::new("freeze")
                .virtual_()
                .final_()
                .build(),
        )
        .member(
            PropertyBuilder::new("Label", TypeExpr::Str)
                .virtual_()
                .getter(|_, _| Ok(Value::str("shape")))
                .setter(|_, _, _| Ok(()))
                .build(),
        )
        .build()
}

#[test]
fn test_dispatch_table_covers_every_eligible_member() {
    let cache = TypeCache::new();
    let provider = cache.of_type(&shape_proto()).unwrap();
    let ty = provider.synthesized_type();

    // Virtual and abstract-representable members get overrides; accessor
    // entries are keyed separately.
    assert!(ty.holder("describe").is_some());
    assert!(ty.holder("area").is_some());
    assert!(ty.holder("get_Label").is_some());
    assert!(ty.holder("set_Label").is_some());

    // Abstract but unrepresentable members still get a (failing) body.
    assert!(ty.is_stub("raw_measure"));

    // Non-virtual and final members contribute nothing.
    assert!(!ty.has_entry("internal_id"));
    assert!(!ty.has_entry("freeze"));
}

#[test]
fn test_pass_through_handler_is_equivalent_to_base() {
    let cache = TypeCache::new();
    let provider = cache.of_type(&shape_proto()).unwrap();

    let plain = provider.create_instance(&[], passthrough()).unwrap();
    assert_eq!(
        plain.invoke("describe", Vec::new()).unwrap(),
        Value::str("4-sided")
    );
    assert_eq!(plain.get_property("Label").unwrap(), Value::str("shape"));

    // An abstract member has no base behavior; delegating surfaces that.
    assert!(matches!(
        plain.invoke("area", Vec::new()),
        Err(DispatchError::NotImplemented(_))
    ));

    // Stubs fail identically with or without a handler.
    assert!(matches!(
        plain.invoke("raw_measure", vec![Value::Float(0.0)]),
        Err(DispatchError::NotSupported(_))
    ));
}

#[test]
fn test_handler_observes_and_replaces_the_call() {
    let cache = TypeCache::new();
    let provider = cache.of_type(&shape_proto()).unwrap();
    let inst = provider
        .create_instance(
            &[],
            Arc::new(|_: &ProxyInstance, ctx: &CallContext| {
                Ok(Value::str(format!("intercepted {}", ctx.descriptor.name)))
            }),
        )
        .unwrap();

    assert_eq!(
        inst.invoke("describe", Vec::new()).unwrap(),
        Value::str("intercepted describe")
    );
    // The base body never ran.
    assert_eq!(
        provider.synthesized_type().thunk("describe").unwrap().call_count(),
        0
    );

    // A handler gives abstract members behavior.
    assert_eq!(
        inst.invoke("area", Vec::new()).unwrap(),
        Value::str("intercepted area")
    );
}

#[test]
fn test_handler_failure_propagates_verbatim() {
    let cache = TypeCache::new();
    let provider = cache.of_type(&shape_proto()).unwrap();
    let inst = provider
        .create_instance(
            &[],
            Arc::new(|_: &ProxyInstance, _: &CallContext| {
                Err(DispatchError::Handler("host raised".to_string()))
            }),
        )
        .unwrap();

    let err = inst.invoke("describe", Vec::new()).unwrap_err();
    assert_eq!(err.to_string(), "host raised");
}

#[test]
fn test_handler_result_must_conform_to_return_type() {
    let cache = TypeCache::new();
    let provider = cache.of_type(&shape_proto()).unwrap();
    let inst = provider
        .create_instance(
            &[],
            Arc::new(|_: &ProxyInstance, _: &CallContext| Ok(Value::Bool(true))),
        )
        .unwrap();

    assert!(matches!(
        inst.invoke("describe", Vec::new()),
        Err(DispatchError::InvalidCast { .. })
    ));
}

#[test]
fn test_by_address_argument_survives_the_call() {
    let proto = PrototypeBuilder::class("Swapper")
        .member(
            MethodBuilder::new("bump")
                .virtual_()
                .param("slot", TypeExpr::address(TypeExpr::Int))
                .body(|_, _, _| Ok(Value::Void))
                .build(),
        )
        .build();
    let cache = TypeCache::new();
    let provider = cache.of_type(&proto).unwrap();
    let inst = provider
        .create_instance(
            &[],
            Arc::new(|_: &ProxyInstance, ctx: &CallContext| {
                if let Some(ArgCell::ByAddress(cell)) = ctx.args.first() {
                    let current = cell.load().as_int().unwrap_or(0);
                    cell.store(Value::Int(current + 1));
                }
                Ok(Value::Void)
            }),
        )
        .unwrap();

    let cell = proxyforge::AddressCell::new(Value::Int(9));
    inst.invoke_cells("bump", vec![ArgCell::ByAddress(cell.clone())])
        .unwrap();
    assert_eq!(cell.load(), Value::Int(10));

    // A by-value argument for an address parameter is promoted into a
    // fresh cell; the caller's value is untouched but the call succeeds.
    inst.invoke("bump", vec![Value::Int(1)]).unwrap();
}

#[test]
fn test_strict_policy_rejects_constrained_generics() {
    let proto = PrototypeBuilder::class("Sorter")
        .member(
            MethodBuilder::new("largest")
                .virtual_()
                .abstract_()
                .generic_param(
                    proxyforge::GenericParam::new("T", 0).constrained_by(TypeExpr::generic(
                        "Comparable",
                        vec![TypeExpr::Param(proxyforge::ParamRef::member(0))],
                    )),
                )
                .param("a", TypeExpr::Param(proxyforge::ParamRef::member(0)))
                .param("b", TypeExpr::Param(proxyforge::ParamRef::member(0)))
                .returns(TypeExpr::Param(proxyforge::ParamRef::member(0)))
                .build(),
        )
        .build();

    let strict = TypeSynthesizer::new(proto.clone(), ProxyVariant::Intercept, ClassifyPolicy::Strict)
        .run()
        .unwrap();
    assert!(strict.is_stub("largest"));

    let permissive =
        TypeSynthesizer::new(proto, ProxyVariant::Intercept, ClassifyPolicy::Permissive)
            .run()
            .unwrap();
    assert!(permissive.holder("largest").is_some());
}

#[test]
fn test_private_members_are_invisible() {
    let proto = PrototypeBuilder::class("Vault")
        .member(
            MethodBuilder::new("open")
                .virtual_()
                .visibility(Visibility::Private)
                .body(|_, _, _| Ok(Value::Void))
                .build(),
        )
        .build();
    let cache = TypeCache::new();
    let provider = cache.of_type(&proto).unwrap();
    assert!(!provider.synthesized_type().has_entry("open"));

    let inst = provider.create_instance(&[], passthrough()).unwrap();
    assert!(matches!(
        inst.invoke("open", Vec::new()),
        Err(DispatchError::UnknownMember(_))
    ));
}
