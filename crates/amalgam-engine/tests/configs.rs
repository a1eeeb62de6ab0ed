//! Integration tests for config properties
//!
//! Tests cover:
//! - Shared defaults vs per-instance values
//! - Lazy configs and the apply/update pipeline
//! - Cached defaults on bootstrap and on reconfiguration
//! - Initial defaults shared until a subclass redeclares them
//! - Mixin config precedence and open config sets

mod common;

use amalgam_engine::{
    cached, initial, lazy, open, with_merge, Class, Date, Invocation, MetaError, Record, Runtime,
    Value,
};
use common::Log;

fn config_class(rt: &Runtime, name: &str, configs: Record) -> Class {
    rt.base()
        .extend(name)
        .define(Record::new().with("config", configs))
        .unwrap()
}

/// Hooks that log `apply <new> <old>` / `update <new> <old>` for `name`
fn hooked_class(rt: &Runtime, name: &str, prop: &str, default: Value, log: &Log) -> Class {
    let cap = amalgam_engine::util::capitalize(prop);
    rt.base()
        .builder(name)
        .method(&format!("apply{}", cap), {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("apply {} {}", inv.arg(0), inv.arg(1)));
                Ok(inv.arg(0))
            }
        })
        .method(&format!("update{}", cap), {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("update {} {}", inv.arg(0), inv.arg(1)));
                Ok(Value::Undefined)
            }
        })
        .option("config", Record::new().with(prop, default))
        .build()
        .unwrap()
}

#[test]
fn test_objects_are_per_instance_and_primitives_shared() {
    let rt = Runtime::new().unwrap();
    let when = Date::new(0.0);
    let event = config_class(
        &rt,
        "Event",
        Record::new().with("when", when.clone()).with("count", 1),
    );

    let first = event.create().unwrap();
    let second = event.create().unwrap();

    let a = first.get("when").unwrap();
    let b = second.get("when").unwrap();
    assert!(!a.strict_eq(&b));
    assert!(!a.strict_eq(&Value::from(when)));
    assert_eq!(a.as_date().unwrap().time(), 0.0);

    assert!(!first.has_own_config("count"));
    assert_eq!(first.get("count").unwrap(), Value::from(1));

    first.set("count", 2).unwrap();
    assert!(first.has_own_config("count"));
    assert_eq!(first.get("count").unwrap(), Value::from(2));
    assert_eq!(second.get("count").unwrap(), Value::from(1));
}

#[test]
fn test_lazy_config_runs_hooks_on_first_read() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = hooked_class(&rt, "Lazy", "foo", lazy(5), &log);

    let inst = class.create().unwrap();
    assert_eq!(log.len(), 0);
    assert!(inst.is_pending("foo"));

    assert_eq!(inst.get("foo").unwrap(), Value::from(5));
    assert_eq!(log.entries(), vec!["apply 5 undefined", "update 5 undefined"]);

    inst.get("foo").unwrap();
    assert_eq!(log.len(), 2);
}

#[test]
fn test_eager_config_with_hooks_runs_at_construction() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = hooked_class(&rt, "Eager", "size", Value::from(3), &log);

    let inst = class.create_with(Record::new().with("size", 4)).unwrap();
    assert_eq!(log.entries(), vec!["apply 4 undefined", "update 4 undefined"]);
    assert_eq!(inst.get("size").unwrap(), Value::from(4));

    log.clear();
    inst.set("size", 4).unwrap();
    assert_eq!(log.entries(), vec!["apply 4 4"]);
}

#[test]
fn test_apply_returning_undefined_vetoes() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = rt
        .base()
        .builder("Guarded")
        .method("applyLevel", |inv: &Invocation<'_>| {
            let level = inv.arg(0).as_number().unwrap_or(-1.0);
            Ok(if level < 0.0 { Value::Undefined } else { inv.arg(0) })
        })
        .method("updateLevel", log.recorder("update"))
        .option("config", Record::new().with("level", 1))
        .build()
        .unwrap();

    let inst = class.create().unwrap();
    assert_eq!(log.len(), 1);

    inst.set("level", -5).unwrap();
    assert_eq!(inst.get("level").unwrap(), Value::from(1));
    assert_eq!(log.len(), 1);

    inst.set("level", 9).unwrap();
    assert_eq!(inst.get("level").unwrap(), Value::from(9));
    assert_eq!(log.len(), 2);
}

#[test]
fn test_supplied_record_merges_with_default() {
    let rt = Runtime::new().unwrap();
    let class = config_class(
        &rt,
        "Styled",
        Record::new().with(
            "style",
            Record::new()
                .with("color", "red")
                .with("border", Record::new().with("width", 1)),
        ),
    );

    let inst = class
        .create_with(Record::new().with(
            "style",
            Record::new().with("border", Record::new().with("style", "dashed")),
        ))
        .unwrap();

    let style = inst.get("style").unwrap();
    let style = style.as_record().unwrap();
    assert_eq!(style.get("color"), Some(Value::from("red")));
    let border = style.get("border").unwrap();
    let border = border.as_record().unwrap();
    assert_eq!(border.keys(), vec!["width", "style"]);

    let fresh = class.create().unwrap().get("style").unwrap();
    assert!(fresh.as_record().unwrap().get("border").unwrap().as_record().unwrap().get("style").is_none());
}

#[test]
fn test_custom_merge_policy() {
    let rt = Runtime::new().unwrap();
    let concat = |old: &Value, new: &Value, _: &amalgam_engine::MergeSite| {
        let mut items = old.as_array().map(|a| a.to_vec()).unwrap_or_default();
        items.extend(new.as_array().map(|a| a.to_vec()).unwrap_or_default());
        Value::from(items)
    };
    let class = config_class(
        &rt,
        "Tags",
        Record::new().with("tags", with_merge(vec![Value::from("a")], concat)),
    );

    let inst = class
        .create_with(Record::new().with("tags", vec![Value::from("b")]))
        .unwrap();
    assert_eq!(inst.get("tags").unwrap().to_string(), "a,b");
}

#[test]
fn test_cached_default_bootstraps_once() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = rt
        .base()
        .builder("Cached")
        .method("applySize", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("apply {} {}", inv.arg(0), inv.arg(1)));
                Ok(Value::from(inv.arg(0).as_number().unwrap_or(0.0) * 2.0))
            }
        })
        .option("config", Record::new().with("size", cached(10)))
        .build()
        .unwrap();

    let first = class.create().unwrap();
    let second = class.create().unwrap();

    assert_eq!(log.entries(), vec!["apply 10 undefined"]);
    assert_eq!(first.get("size").unwrap(), Value::from(20));
    assert_eq!(second.get("size").unwrap(), Value::from(20));
    assert!(!first.has_own_config("size"));
    assert!(!second.has_own_config("size"));
}

#[test]
fn test_first_instance_setup_runs_once() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = rt
        .base()
        .builder("Cached")
        .method("applySize", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("apply {} {}", inv.arg(0), inv.arg(1)));
                Ok(Value::from(inv.arg(0).as_number().unwrap_or(0.0) * 2.0))
            }
        })
        .option("config", Record::new().with("size", cached(10)))
        .build()
        .unwrap();

    let first = class.create().unwrap();
    let second = class.create().unwrap();
    class.initialize_first_instance(&second).unwrap();

    assert_eq!(log.entries(), vec!["apply 10 undefined"]);
    assert_eq!(first.get("size").unwrap(), Value::from(20));
    assert_eq!(second.get("size").unwrap(), Value::from(20));
    assert!(!second.has_own_config("size"));
}

#[test]
fn test_cached_reconfigure_sees_shared_value_as_old() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = rt
        .base()
        .builder("Cached")
        .method("applySize", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("apply {} {}", inv.arg(0), inv.arg(1)));
                Ok(Value::from(inv.arg(0).as_number().unwrap_or(0.0) * 2.0))
            }
        })
        .option("config", Record::new().with("size", cached(10)))
        .build()
        .unwrap();

    let first = class.create().unwrap();
    let second = class.create().unwrap();
    log.clear();

    second.configure(Some(Record::new().with("size", 3))).unwrap();
    assert_eq!(log.entries(), vec!["apply 3 20"]);
    assert_eq!(second.get("size").unwrap(), Value::from(6));
    assert!(second.has_own_config("size"));
    assert_eq!(first.get("size").unwrap(), Value::from(20));
    assert_eq!(second.config_gen(), 2);
}

#[test]
fn test_configure_hooks() {
    let rt = Runtime::new().unwrap();
    let log = Log::new();
    let class = rt
        .base()
        .builder("Hooked")
        .method("beforeConfigure", {
            let log = log.clone();
            move |_: &Invocation<'_>| {
                log.push("beforeConfigure");
                Ok(Value::from(Record::new().with("x", 99)))
            }
        })
        .method("afterCachedConfig", log.recorder("afterCachedConfig"))
        .method("beforeInitConfig", log.recorder("beforeInitConfig"))
        .method("afterConfigure", {
            let log = log.clone();
            move |inv: &Invocation<'_>| {
                log.push(format!("afterConfigure {}", inv.get("x")?));
                Ok(Value::Undefined)
            }
        })
        .option("config", Record::new().with("x", 1))
        .build()
        .unwrap();

    class.create_with(Record::new().with("x", 2)).unwrap();
    assert_eq!(
        log.entries(),
        vec![
            "beforeConfigure",
            "afterCachedConfig",
            "beforeInitConfig",
            "afterConfigure 99",
        ]
    );

    log.clear();
    class.create().unwrap();
    assert_eq!(
        log.entries(),
        vec!["beforeConfigure", "beforeInitConfig", "afterConfigure 99"]
    );
}

#[test]
fn test_mixin_config_is_specialized_by_target() {
    let rt = Runtime::new().unwrap();
    let bar = config_class(&rt, "Bar", Record::new().with("foo", 123).with("only", "bar"));
    let foo = rt
        .base()
        .extend("Foo")
        .define(
            Record::new()
                .with("mixins", &bar)
                .with("config", Record::new().with("foo", 456)),
        )
        .unwrap();

    let configs = foo.configs().unwrap();
    let def = configs.def("foo").unwrap();
    assert!(def.owner().unwrap().ptr_eq(&foo));
    assert_eq!(configs.value("foo"), Some(Value::from(456)));

    let inst = foo.create().unwrap();
    assert_eq!(inst.get("foo").unwrap(), Value::from(456));
    assert_eq!(inst.get("only").unwrap(), Value::from("bar"));
    assert_eq!(bar.create().unwrap().get("foo").unwrap(), Value::from(123));
}

#[test]
fn test_target_value_wins_over_later_mixin() {
    let rt = Runtime::new().unwrap();
    let bar = config_class(&rt, "Bar", Record::new().with("foo", 123));
    let foo = rt
        .base()
        .extend("Foo")
        .define(Record::new().with("config", Record::new().with("foo", 456)))
        .unwrap();
    foo.add_mixin(&bar, None).unwrap();

    assert_eq!(foo.configs().unwrap().value("foo"), Some(Value::from(456)));
}

#[test]
fn test_open_configs_accept_unknown_keys() {
    let rt = Runtime::new().unwrap();
    let strict = config_class(&rt, "Strict", Record::new().with("x", 1));
    let loose = rt
        .base()
        .extend("Loose")
        .define(Record::new().with("config", open(Record::new().with("x", 1))))
        .unwrap();

    let s = strict.create_with(Record::new().with("extra", "e")).unwrap();
    let l = loose.create_with(Record::new().with("extra", "e")).unwrap();

    assert_eq!(s.get("extra").unwrap(), Value::Undefined);
    assert_eq!(l.get("extra").unwrap(), Value::from("e"));

    let child = loose.extend("LooseChild");
    let c = child.create_with(Record::new().with("extra", "c")).unwrap();
    assert_eq!(c.get("extra").unwrap(), Value::from("c"));
}

#[test]
fn test_subclass_inherits_configs_with_own_defaults() {
    let rt = Runtime::new().unwrap();
    let parent = config_class(&rt, "Parent", Record::new().with("n", 1));
    let child = parent
        .extend("Child")
        .define(Record::new().with("config", Record::new().with("m", 2).with("n", 5)))
        .unwrap();

    let p = parent.create().unwrap();
    let c = child.create().unwrap();

    assert_eq!(p.get("n").unwrap(), Value::from(1));
    assert_eq!(p.get("m").unwrap(), Value::Undefined);
    assert_eq!(c.get("n").unwrap(), Value::from(5));
    assert_eq!(c.get("m").unwrap(), Value::from(2));
}

#[test]
fn test_initial_object_default_is_shared() {
    let rt = Runtime::new().unwrap();
    let class = config_class(
        &rt,
        "Listed",
        Record::new().with("items", initial(Vec::<Value>::new())),
    );

    let a = class.create().unwrap();
    let b = class.create().unwrap();

    assert!(a.get("items").unwrap().strict_eq(&b.get("items").unwrap()));
    assert!(!a.has_own_config("items"));
    assert!(!b.has_own_config("items"));
}

#[test]
fn test_redeclared_initial_default_is_per_instance() {
    let rt = Runtime::new().unwrap();
    let parent = config_class(
        &rt,
        "Listed",
        Record::new().with("items", initial(Vec::<Value>::new())),
    );
    let child = parent
        .extend("Filled")
        .define(Record::new().with(
            "config",
            Record::new().with("items", vec![Value::from(1)]),
        ))
        .unwrap();

    let a = child.create().unwrap();
    let b = child.create().unwrap();
    let items = a.get("items").unwrap();

    assert_eq!(items.to_string(), "1");
    assert!(!items.strict_eq(&b.get("items").unwrap()));
    assert!(a.has_own_config("items"));
    assert!(b.has_own_config("items"));

    let p = parent.create().unwrap();
    assert!(!p.has_own_config("items"));
}

#[test]
fn test_configs_after_completion_are_too_late() {
    let rt = Runtime::new().unwrap();
    let class = config_class(&rt, "Done", Record::new().with("x", 1));
    class.create().unwrap();

    let err = class
        .define(Record::new().with("config", Record::new().with("y", 2)))
        .unwrap_err();
    assert!(matches!(err, MetaError::TooLate { .. }));
}

#[test]
fn test_merge_configs_respects_open_rule() {
    let rt = Runtime::new().unwrap();
    let class = config_class(
        &rt,
        "Merger",
        Record::new().with("style", Record::new().with("a", 1)),
    );

    let target = Record::new().with("style", Record::new().with("a", 1));
    let source = Record::new()
        .with("style", Record::new().with("b", 2))
        .with("unknown", true);
    let merged = class.merge_configs(&target, &source);

    let style = merged.get("style").unwrap();
    assert_eq!(style.as_record().unwrap().keys(), vec!["a", "b"]);
    assert!(!merged.contains_key("unknown"));
}
