//! Integration tests for instance lifecycle
//!
//! Tests cover:
//! - Construct/destruct chain ordering across subclasses and mixins
//! - Dead chain fast path
//! - Junction methods and their return value
//! - Runtime options

mod common;

use amalgam_engine::{Invocation, MetaError, Record, Runtime, RuntimeOptions, Side, Value};
use common::Log;

#[test]
fn test_ctor_runs_ancestor_first_and_dtor_reversed() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();

    let c = rt
        .base()
        .builder("C")
        .method("ctor", log.recorder("C.ctor"))
        .method("dtor", log.recorder("C.dtor"))
        .build()
        .unwrap();
    let d = c
        .builder("D")
        .method("ctor", log.recorder("D.ctor"))
        .method("dtor", log.recorder("D.dtor"))
        .build()
        .unwrap();

    let inst = d.create().unwrap();
    assert_eq!(log.entries(), vec!["C.ctor", "D.ctor"]);

    log.clear();
    inst.destroy().unwrap();
    assert_eq!(log.entries(), vec!["D.dtor", "C.dtor"]);
    assert!(inst.is_destroyed());

    inst.destroy().unwrap();
    assert_eq!(log.len(), 2);
}

#[test]
fn test_unimplemented_chain_goes_dead_after_one_scan() {
    let rt = Runtime::new().unwrap();
    let quiet = rt.base().extend("Quiet");

    quiet.create().unwrap();
    assert_eq!(quiet.chain_scan_count(), 1);
    assert!(!quiet.is_live_chain("ctor"));

    quiet.create().unwrap();
    quiet.create().unwrap();
    assert_eq!(quiet.chain_scan_count(), 1);
    assert_eq!(quiet.instance_count(), 3);
}

#[test]
fn test_dead_mark_does_not_hide_subclass_implementation() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let parent = rt.base().extend("Parent");
    parent.create().unwrap();
    assert!(!parent.is_live_chain("ctor"));

    let child = parent
        .builder("Child")
        .method("ctor", log.recorder("Child.ctor"))
        .build()
        .unwrap();
    child.create().unwrap();

    assert_eq!(log.entries(), vec!["Child.ctor"]);
}

#[test]
fn test_custom_chain_with_arguments() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();

    let a = rt
        .base()
        .builder("A")
        .method("init", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("A.init {}", inv.arg(0)));
                Ok(Value::Undefined)
            }
        })
        .option("chains", "init")
        .build()
        .unwrap();
    let b = a
        .builder("B")
        .method("init", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("B.init {}", inv.arg(0)));
                Ok(Value::Undefined)
            }
        })
        .build()
        .unwrap();

    let inst = b.create().unwrap();
    inst.call_chain("init", &[Value::from(7)]).unwrap();
    assert_eq!(log.entries(), vec!["A.init 7", "B.init 7"]);

    log.clear();
    inst.call_chain_rev("init", &[Value::from(8)]).unwrap();
    assert_eq!(log.entries(), vec!["B.init 8", "A.init 8"]);
}

#[test]
fn test_junction_runs_super_then_mixins_and_keeps_first_result() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();

    let c = rt
        .base()
        .builder("C")
        .method("foo", {
            let log = log.clone();
            move |_: &Invocation<'_>| {
                log.push("C.foo");
                Ok(Value::from(42))
            }
        })
        .method("ctor", log.recorder("C.ctor"))
        .method("dtor", log.recorder("C.dtor"))
        .build()
        .unwrap();
    let m = rt
        .base()
        .builder("M")
        .method("foo", {
            let log = log.clone();
            move |_: &Invocation<'_>| {
                log.push("M.foo");
                Ok(Value::from("m"))
            }
        })
        .method("ctor", log.recorder("M.ctor"))
        .method("dtor", log.recorder("M.dtor"))
        .build()
        .unwrap();
    let d = c
        .builder("D")
        .junction("foo", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                let sup = inv.call_super(inv.args())?;
                log.push("D.foo");
                Ok(Value::from(format!("dc{}", sup)))
            }
        })
        .method("ctor", log.recorder("D.ctor"))
        .method("dtor", log.recorder("D.dtor"))
        .option("mixins", &m)
        .build()
        .unwrap();

    let inst = d.create().unwrap();
    assert_eq!(log.entries(), vec!["C.ctor", "M.ctor", "D.ctor"]);

    log.clear();
    let result = inst.call("foo", &[]).unwrap();
    assert_eq!(result, Value::from("dc42"));
    assert_eq!(log.entries(), vec!["C.foo", "M.foo", "D.foo"]);

    log.clear();
    inst.destroy().unwrap();
    assert_eq!(log.entries(), vec!["D.dtor", "M.dtor", "C.dtor"]);

    assert_eq!(d.junction_participants(Side::Instance, "foo").len(), 1);
    assert!(inst.mixin("m").unwrap().ptr_eq(&m));
}

#[test]
fn test_mixin_chain_methods_are_not_copied() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();

    let m = rt
        .base()
        .builder("M")
        .method("ctor", log.recorder("M.ctor"))
        .build()
        .unwrap();
    let e = rt
        .base()
        .builder("E")
        .option("mixins", &m)
        .build()
        .unwrap();

    assert!(!e.has_own_member(Side::Instance, "ctor"));
    e.create().unwrap();
    assert_eq!(log.entries(), vec!["M.ctor"]);
}

#[test]
fn test_super_call_from_static_method() {
    let rt = Runtime::new().unwrap();
    let a = rt
        .base()
        .builder("A")
        .static_method("describe", |_: &Invocation<'_>| Ok(Value::from("A")))
        .build()
        .unwrap();
    let b = a
        .builder("B")
        .static_method("describe", |inv: &Invocation<'_>| {
            let sup = inv.call_super(&[])?;
            Ok(Value::from(format!("B<{}>", sup)))
        })
        .build()
        .unwrap();

    assert_eq!(b.call("describe", &[]).unwrap(), Value::from("B<A>"));
}

#[test]
fn test_missing_super_method() {
    let rt = Runtime::new().unwrap();
    let a = rt
        .base()
        .builder("A")
        .method("lonely", |inv: &Invocation<'_>| inv.call_super(&[]))
        .build()
        .unwrap();

    let err = a.create().unwrap().call("lonely", &[]).unwrap_err();
    assert!(matches!(err, MetaError::NoSuchMethod { .. }));
}

#[test]
fn test_prototype_is_frozen_after_completion() {
    let rt = Runtime::new().unwrap();
    let class = rt.base().extend("Frozen");
    class.create().unwrap();

    let err = class.proto_set("late", 1).unwrap_err();
    assert!(matches!(err, MetaError::TooLate { .. }));

    class.set("counter", 1).unwrap();
    assert_eq!(class.get("counter").unwrap(), Value::from(1));
}

#[test]
fn test_unknown_option() {
    let rt = Runtime::new().unwrap();
    let err = rt
        .base()
        .extend("Odd")
        .define(Record::new().with("bogus", 1))
        .unwrap_err();

    assert_eq!(
        err,
        MetaError::UnknownOption {
            class: "Odd".to_string(),
            option: "bogus".to_string(),
        }
    );
}

#[test]
fn test_runtime_options_from_json() {
    let options: RuntimeOptions =
        serde_json::from_str(r#"{ "root_name": "Root", "ctor_chain": "init" }"#).unwrap();
    assert_eq!(options.dtor_chain, "dtor");

    let rt = Runtime::with_options(options).unwrap();
    let log = Log::new();
    let class = rt
        .base()
        .builder("Widget")
        .method("init", log.recorder("Widget.init"))
        .build()
        .unwrap();

    class.create().unwrap();
    assert_eq!(rt.base().name(), "Root");
    assert_eq!(log.entries(), vec!["Widget.init"]);
}
