//! Save/load round-trip coverage for every guard kind.
//!
//! Each test builds a reference check in save mode, reloads the produced
//! guards state, and asserts the reloaded check agrees with the
//! reference on every probe environment. Never-serializable kinds must
//! instead fail the save by name.

use marten_guards::{
    CheckFunctionManager, GuardDescriptor, GuardKind, GuardParams, GuardPath, KindFilter,
    TraceOutput,
};
use marten_value::{
    Bindings, CallableValue, DType, Device, DictValue, GlobalScope, ObjectValue, TensorMeta,
    TransformKind, TransformState, TypeObject, Value,
};

fn guard(path: GuardPath, params: GuardParams) -> GuardDescriptor {
    GuardDescriptor::new(path, params).expect("guard must construct")
}

/// Build a reference check in save mode (keeping only `kind` guards),
/// reload its guards state, and return both checks.
fn save_and_load(
    guards: Vec<GuardDescriptor>,
    kind: GuardKind,
    scope: &GlobalScope,
) -> (CheckFunctionManager, CheckFunctionManager) {
    let reference = CheckFunctionManager::save(TraceOutput::new(guards), Some(&KindFilter(kind)))
        .expect("save must succeed");
    let blob = reference
        .guards_state()
        .expect("save mode must produce guards state")
        .to_vec();
    let loaded = CheckFunctionManager::load(&blob, scope).expect("load must succeed");
    (reference, loaded)
}

/// The reference check must produce `expected`, and the reloaded check
/// must agree with the reference.
fn assert_check(
    reference: &CheckFunctionManager,
    loaded: &CheckFunctionManager,
    env: &Bindings,
    expected: bool,
) {
    assert_eq!(reference.check(env), expected);
    assert_eq!(reference.check(env), loaded.check(env));
}

fn expect_save_rejection(guards: Vec<GuardDescriptor>, kind: GuardKind, message: &str) {
    let err = CheckFunctionManager::save(TraceOutput::new(guards), Some(&KindFilter(kind)))
        .expect_err("save must be rejected");
    assert_eq!(err.to_string(), message);
}

#[test]
fn tensor_match() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("x"),
            GuardParams::TensorMatch {
                meta: TensorMeta::strided(DType::Float32, [2]),
            },
        )],
        GuardKind::TensorMatch,
        &scope,
    );

    let probe = |v: Value| Bindings::new().bind("x", v);
    assert_check(
        &reference,
        &loaded,
        &probe(Value::tensor(TensorMeta::strided(DType::Float32, [2]))),
        true,
    );
    assert_check(
        &reference,
        &loaded,
        &probe(Value::tensor(TensorMeta::strided(DType::Float32, [3]))),
        false,
    );
    assert_check(
        &reference,
        &loaded,
        &probe(Value::tensor(TensorMeta::strided(DType::Float64, [2]))),
        false,
    );
    assert_check(&reference, &loaded, &probe(Value::none()), false);
}

#[test]
fn not_present_in_generic_dict() {
    let ty = TypeObject::builder("Module")
        .qualified("models.Module")
        .attr("forward")
        .build();
    let m = ObjectValue::new(ty);

    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("m"),
            GuardParams::NotPresentInGenericDict {
                attr: "forward".into(),
            },
        )],
        GuardKind::NotPresentInGenericDict,
        &scope,
    );

    let env = Bindings::new().bind("m", Value::object(m.clone()));
    assert_check(&reference, &loaded, &env, true);

    // Installing an instance override shadows the class method
    m.set_attr("forward", Value::callable(CallableValue::new("patched")));
    assert_check(&reference, &loaded, &env, false);
}

#[test]
fn hasattr() {
    let ty = TypeObject::builder("Module").qualified("models.Module").build();
    let m = ObjectValue::new(ty);
    m.set_attr("a", Value::int(1));

    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("m"),
            GuardParams::HasAttr {
                attr: "a".into(),
                present: true,
            },
        )],
        GuardKind::HasAttr,
        &scope,
    );

    let env = Bindings::new().bind("m", Value::object(m.clone()));
    assert_check(&reference, &loaded, &env, true);

    m.del_attr("a");
    assert_check(&reference, &loaded, &env, false);
}

#[test]
fn type_match_rejects_local_scope_types_at_construction() {
    let local = TypeObject::builder("LocalModule").build();
    let err = GuardDescriptor::new(
        GuardPath::binding("m"),
        GuardParams::TypeMatch { ty: local },
    )
    .expect_err("local-scope type must not construct");
    assert!(err.to_string().contains("define the class at global scope"));
}

#[test]
fn type_match() {
    let global = TypeObject::builder("GlobalModule")
        .qualified("models.GlobalModule")
        .build();
    let base = TypeObject::builder("Module").qualified("models.Module").build();

    let mut scope = GlobalScope::new();
    scope.register(global.clone()).unwrap();
    scope.register(base.clone()).unwrap();

    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("m"),
            GuardParams::TypeMatch { ty: global.clone() },
        )],
        GuardKind::TypeMatch,
        &scope,
    );

    let probe = |obj: ObjectValue| Bindings::new().bind("m", Value::object(obj));
    // Any instance of the same class passes, not just the traced one
    assert_check(&reference, &loaded, &probe(ObjectValue::new(global.clone())), true);
    assert_check(&reference, &loaded, &probe(ObjectValue::new(global)), true);
    assert_check(&reference, &loaded, &probe(ObjectValue::new(base)), false);
}

#[test]
fn type_match_load_fails_on_unresolvable_global() {
    let ty = TypeObject::builder("GlobalModule")
        .qualified("models.GlobalModule")
        .build();
    let reference = CheckFunctionManager::save(
        TraceOutput::new(vec![guard(
            GuardPath::binding("m"),
            GuardParams::TypeMatch { ty },
        )]),
        None,
    )
    .unwrap();

    // A process that never registered models.GlobalModule cannot load
    let err = CheckFunctionManager::load(reference.guards_state().unwrap(), &GlobalScope::new())
        .expect_err("load must fail");
    assert!(err.to_string().contains("models.GlobalModule"));
}

#[test]
fn dict_version_cannot_be_serialized() {
    let d = DictValue::from_entries([("t", Value::int(1))]);
    expect_save_rejection(
        vec![guard(
            GuardPath::binding("x"),
            GuardParams::DictVersion {
                version: d.version(),
            },
        )],
        GuardKind::DictVersion,
        "DICT_VERSION guard cannot be serialized",
    );
}

#[test]
fn dict_contains() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("x"),
            GuardParams::DictContains {
                key: "t".into(),
                contains: true,
            },
        )],
        GuardKind::DictContains,
        &scope,
    );

    let probe = |d: DictValue| Bindings::new().bind("x", Value::dict(d));
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([("t", Value::int(1))])),
        true,
    );
    assert_check(&reference, &loaded, &probe(DictValue::new()), false);
    // Extra keys are fine; only membership is guarded
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([
            ("t", Value::int(1)),
            ("d", Value::int(2)),
        ])),
        true,
    );
}

#[test]
fn bool_match() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("b"),
            GuardParams::BoolMatch { expected: true },
        )],
        GuardKind::BoolMatch,
        &scope,
    );

    let probe = |v: Value| Bindings::new().bind("b", v);
    assert_check(&reference, &loaded, &probe(Value::boolean(true)), true);
    assert_check(&reference, &loaded, &probe(Value::boolean(false)), false);
    // Truthiness is not enough; the type must match too
    assert_check(&reference, &loaded, &probe(Value::none()), false);
}

#[test]
fn none_match() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("b"),
            GuardParams::NoneMatch { is_none: true },
        )],
        GuardKind::NoneMatch,
        &scope,
    );

    let probe = |v: Value| Bindings::new().bind("b", v);
    assert_check(&reference, &loaded, &probe(Value::none()), true);
    assert_check(&reference, &loaded, &probe(Value::boolean(false)), false);
    assert_check(&reference, &loaded, &probe(Value::boolean(true)), false);
}

#[test]
fn id_match_cannot_be_serialized() {
    let x = Value::tensor(TensorMeta::strided(DType::Float32, [3]));
    expect_save_rejection(
        vec![guard(
            GuardPath::binding("x"),
            GuardParams::IdMatch {
                id: x.object_id().unwrap(),
            },
        )],
        GuardKind::IdMatch,
        "ID_MATCH guard cannot be serialized",
    );
}

#[test]
fn dispatch_key_set_match() {
    let cpu = TensorMeta::strided(DType::Float32, [3]);
    let meta_device = TensorMeta::strided(DType::Float32, [3]).with_device(Device::Meta);

    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("dks"),
            GuardParams::DispatchKeySetMatch {
                keys: cpu.dispatch_key_set(),
            },
        )],
        GuardKind::DispatchKeySetMatch,
        &scope,
    );

    let probe = |m: &TensorMeta| {
        Bindings::new().bind("dks", Value::dispatch_keys(m.dispatch_key_set()))
    };
    assert_check(&reference, &loaded, &probe(&cpu), true);
    assert_check(&reference, &loaded, &probe(&meta_device), false);
}

#[test]
fn name_match() {
    let op = CallableValue::new("cond");

    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("op"),
            GuardParams::NameMatch {
                name: op.name(),
            },
        )],
        GuardKind::NameMatch,
        &scope,
    );

    let env = Bindings::new().bind("op", Value::callable(op.clone()));
    assert_check(&reference, &loaded, &env, true);

    // In-place mutation of the name field invalidates the guard even
    // though the callable's identity is unchanged
    op.set_name("");
    assert_check(&reference, &loaded, &env, false);
    op.set_name("cond");
    assert_check(&reference, &loaded, &env, true);
}

#[test]
fn dual_level() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::ambient(),
            GuardParams::DualLevel { level: 0 },
        )],
        GuardKind::DualLevel,
        &scope,
    );

    assert_check(&reference, &loaded, &Bindings::new(), true);

    let mut state = TransformState::new();
    state.enter_dual();
    let nested = Bindings::new().with_transforms(state.clone());
    assert_check(&reference, &loaded, &nested, false);

    state.exit_dual();
    let unwound = Bindings::new().with_transforms(state);
    assert_check(&reference, &loaded, &unwound, true);
}

#[test]
fn functorch_stack_match_empty_capture() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::ambient(),
            GuardParams::FunctorchStackMatch { stack: Vec::new() },
        )],
        GuardKind::FunctorchStackMatch,
        &scope,
    );

    assert_check(&reference, &loaded, &Bindings::new(), true);

    let mut state = TransformState::new();
    state.push(TransformKind::Vmap);
    state.push(TransformKind::Vmap);
    let env = Bindings::new().with_transforms(state);
    assert_check(&reference, &loaded, &env, false);
}

#[test]
fn functorch_stack_match_is_shape_sensitive() {
    // Captured while vmap was active: valid only at exactly that shape
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::ambient(),
            GuardParams::FunctorchStackMatch {
                stack: vec![TransformKind::Vmap],
            },
        )],
        GuardKind::FunctorchStackMatch,
        &scope,
    );

    let with_stack = |kinds: &[TransformKind]| {
        let mut state = TransformState::new();
        for kind in kinds {
            state.push(*kind);
        }
        Bindings::new().with_transforms(state)
    };

    assert_check(&reference, &loaded, &with_stack(&[]), false);
    assert_check(&reference, &loaded, &with_stack(&[TransformKind::Vmap]), true);
    assert_check(
        &reference,
        &loaded,
        &with_stack(&[TransformKind::Vmap, TransformKind::Vmap]),
        false,
    );
    // Same depth, different transform
    assert_check(&reference, &loaded, &with_stack(&[TransformKind::Grad]), false);
}

#[test]
fn functorch_stack_match_layered_transforms() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::ambient(),
            GuardParams::FunctorchStackMatch {
                stack: vec![TransformKind::Jvp, TransformKind::Vmap],
            },
        )],
        GuardKind::FunctorchStackMatch,
        &scope,
    );

    let with_stack = |kinds: &[TransformKind]| {
        let mut state = TransformState::new();
        for kind in kinds {
            state.push(*kind);
        }
        Bindings::new().with_transforms(state)
    };

    assert_check(
        &reference,
        &loaded,
        &with_stack(&[TransformKind::Jvp, TransformKind::Vmap]),
        true,
    );
    // Order of nesting matters
    assert_check(
        &reference,
        &loaded,
        &with_stack(&[TransformKind::Vmap, TransformKind::Jvp]),
        false,
    );
    assert_check(
        &reference,
        &loaded,
        &with_stack(&[TransformKind::Functionalize]),
        false,
    );
}

#[test]
fn duplicate_input_cannot_be_serialized() {
    expect_save_rejection(
        vec![guard(
            GuardPath::binding("x"),
            GuardParams::DuplicateInput {
                other: GuardPath::binding("x_"),
            },
        )],
        GuardKind::DuplicateInput,
        "DUPLICATE_INPUT guard cannot be serialized",
    );
}

#[test]
fn weakref_alive_cannot_be_serialized() {
    expect_save_rejection(
        vec![guard(GuardPath::binding("p"), GuardParams::WeakrefAlive)],
        GuardKind::WeakrefAlive,
        "WEAKREF_ALIVE guard cannot be serialized",
    );
}

#[test]
fn mapping_keys_check() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("mp"),
            GuardParams::MappingKeysCheck {
                keys: vec!["a".into(), "b".into()],
            },
        )],
        GuardKind::MappingKeysCheck,
        &scope,
    );

    let probe = |d: DictValue| Bindings::new().bind("mp", Value::mapping(d));
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([
            ("a", Value::int(1)),
            ("b", Value::int(2)),
        ])),
        true,
    );
    // Same keys, different insertion order
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([
            ("b", Value::int(2)),
            ("a", Value::int(1)),
        ])),
        false,
    );
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([("a", Value::int(1))])),
        false,
    );
}

#[test]
fn dict_keys_match() {
    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(
        vec![guard(
            GuardPath::binding("x"),
            GuardParams::DictKeysMatch {
                keys: vec!["a".into(), "b".into()],
            },
        )],
        GuardKind::DictKeysMatch,
        &scope,
    );

    let probe = |d: DictValue| Bindings::new().bind("x", Value::dict(d));
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([
            ("a", Value::int(1)),
            ("b", Value::int(2)),
        ])),
        true,
    );
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([
            ("b", Value::int(2)),
            ("a", Value::int(1)),
        ])),
        false,
    );
    assert_check(
        &reference,
        &loaded,
        &probe(DictValue::from_entries([("a", Value::int(1))])),
        false,
    );
}

#[test]
fn filter_drops_other_kinds_before_save() {
    // The tracer emits more than one kind; only the selected kind takes
    // part in the compiled check, so a never-serializable extra does not
    // poison the save.
    let x = Value::tensor(TensorMeta::strided(DType::Float32, [2]));
    let guards = vec![
        guard(
            GuardPath::binding("x"),
            GuardParams::TensorMatch {
                meta: TensorMeta::strided(DType::Float32, [2]),
            },
        ),
        guard(
            GuardPath::binding("x"),
            GuardParams::IdMatch {
                id: x.object_id().unwrap(),
            },
        ),
    ];

    let scope = GlobalScope::new();
    let (reference, loaded) = save_and_load(guards, GuardKind::TensorMatch, &scope);
    assert_eq!(reference.guards().len(), 1);

    // A different float32 size-2 tensor passes: the ID_MATCH guard was
    // filtered out, not serialized
    let env = Bindings::new().bind("x", Value::tensor(TensorMeta::strided(DType::Float32, [2])));
    assert_check(&reference, &loaded, &env, true);
}
