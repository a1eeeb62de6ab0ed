//! Runtime: class registry, shared state and the root `Base` class

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::class::Class;
use crate::config::{Config, ConfigRegistry};
use crate::error::{MetaError, MetaResult};
use crate::meta::{Meta, Side};
use crate::util;
use crate::value::{Function, Invocation, Record, Value};

/// Unique class identifier within a runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    /// Raw index into the class registry
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

/// Runtime options
///
/// Deserializable so hosts can load them from their own config files;
/// missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Name of the root class
    pub root_name: String,
    /// Chain run on construction
    pub ctor_chain: String,
    /// Chain run, reversed, on destruction
    pub dtor_chain: String,
    /// Prefix of generated ids for anonymous mixins
    pub mixin_id_prefix: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            root_name: "Base".to_string(),
            ctor_chain: "ctor".to_string(),
            dtor_chain: "dtor".to_string(),
            mixin_id_prefix: "mixin".to_string(),
        }
    }
}

/// State shared by every class of a runtime
pub struct Shared {
    pub(crate) options: RuntimeOptions,
    pub(crate) configs: ConfigRegistry,
    /// Every class ever created, indexed by `ClassId`
    ///
    /// Entries are never removed. The registry suits classes defined at
    /// setup, not classes created and dropped in loops.
    classes: RefCell<Vec<Weak<Meta>>>,
    name_to_id: RefCell<FxHashMap<String, ClassId>>,
    mixin_counter: Cell<u32>,
}

impl Shared {
    fn new(options: RuntimeOptions) -> Self {
        Self {
            options,
            configs: ConfigRegistry::new(),
            classes: RefCell::new(Vec::new()),
            name_to_id: RefCell::new(FxHashMap::default()),
            mixin_counter: Cell::new(0),
        }
    }

    /// Next available class id
    pub(crate) fn next_class_id(&self) -> ClassId {
        ClassId(self.classes.borrow().len() as u32)
    }

    /// Register a newly created class
    pub(crate) fn register(&self, class: &Class) {
        self.classes.borrow_mut().push(Rc::downgrade(&class.0));
        if !class.name.is_empty() {
            self.name_to_id
                .borrow_mut()
                .entry(class.name.clone())
                .or_insert(class.id);
        }
    }

    /// Get class by id
    pub(crate) fn class(&self, id: ClassId) -> Option<Class> {
        self.classes
            .borrow()
            .get(id.0 as usize)
            .and_then(Weak::upgrade)
            .map(Class)
    }

    /// Get the first class registered under `name`
    pub(crate) fn class_by_name(&self, name: &str) -> Option<Class> {
        let id = *self.name_to_id.borrow().get(name)?;
        self.class(id)
    }

    /// Generated id for an anonymous mixin
    pub(crate) fn next_mixin_id(&self) -> String {
        let n = self.mixin_counter.get() + 1;
        self.mixin_counter.set(n);
        format!("{}{}", self.options.mixin_id_prefix, n)
    }
}

/// A metaclass runtime
///
/// Owns the root class. Every class created through [`Class::extend`] on
/// the root (directly or indirectly) belongs to this runtime.
pub struct Runtime {
    shared: Rc<Shared>,
    base: Class,
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> MetaResult<Self> {
        Self::with_options(RuntimeOptions::default())
    }

    /// Create a runtime and define its root class
    pub fn with_options(options: RuntimeOptions) -> MetaResult<Self> {
        let shared = Rc::new(Shared::new(options));
        let root_name = shared.options.root_name.clone();
        let base = root_class(&shared, &root_name)?;

        let chains = Value::from(vec![
            Value::from(shared.options.ctor_chain.as_str()),
            Value::from(shared.options.dtor_chain.as_str()),
        ]);
        let processors = Record::new()
            .with("properties", Value::Null)
            .with("prototype", "properties")
            .with("static", "prototype")
            .with("chains", "static")
            .with("mixins", "chains")
            .with("config", "mixins");
        let properties =
            Record::new().with("isInstance", Record::new().with("value", true));
        let prototype = Record::new()
            .with("afterConfigure", Value::Null)
            .with("beforeConfigure", Value::Null);

        base.define(
            Record::new()
                .with("chains", chains)
                .with("processors", processors)
                .with("properties", properties)
                .with("prototype", prototype),
        )?;

        tracing::debug!(root = %base.name(), "runtime initialized");
        Ok(Self { shared, base })
    }

    /// The root class
    pub fn base(&self) -> &Class {
        &self.base
    }

    /// Create another root class in this runtime
    ///
    /// The new root carries the option appliers but no chains, processors
    /// or configs. Its subclasses cannot mix in classes from other roots.
    pub fn adopt(&self, name: &str) -> MetaResult<Class> {
        root_class(&self.shared, name)
    }

    /// Get class by id
    pub fn class(&self, id: ClassId) -> Option<Class> {
        self.shared.class(id)
    }

    /// Get the first class registered under `name`
    pub fn class_by_name(&self, name: &str) -> Option<Class> {
        self.shared.class_by_name(name)
    }

    /// Shared config descriptor for `name`
    pub fn config(&self, name: &str) -> Rc<Config> {
        self.shared.configs.get(name)
    }

    /// Metadata handle of a class or instance value
    pub fn get_meta(&self, value: &Value) -> Option<Class> {
        match value {
            Value::Class(class) => Some(class.clone()),
            Value::Instance(instance) => Some(instance.class().clone()),
            _ => None,
        }
    }

    /// Options this runtime was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.shared.options
    }
}

/// Signature of the class-side half of an option applier
type ApplyFn = fn(&Class, &Value) -> MetaResult<()>;

const APPLIERS: &[(&str, ApplyFn)] = &[
    ("chains", |class, v| class.add_chains(v)),
    ("config", |class, v| class.add_configs(v)),
    ("mixinId", apply_mixin_id),
    ("mixins", |class, v| class.add_mixins(v)),
    ("processors", |class, v| class.add_processors(v)),
    ("properties", |class, v| class.add_properties(v)),
    ("prototype", |class, v| class.add_prototype(v)),
    ("static", |class, v| class.add_statics(v)),
];

fn apply_mixin_id(class: &Class, value: &Value) -> MetaResult<()> {
    match value {
        Value::String(id) => {
            class.set_mixin_id(id);
            Ok(())
        }
        other => Err(MetaError::TypeError(format!(
            "mixinId must be a string, got {}",
            other.type_name()
        ))),
    }
}

/// Create a root class with the built-in option appliers as statics
fn root_class(shared: &Rc<Shared>, name: &str) -> MetaResult<Class> {
    let root = Meta::new(shared, name, None);
    for (option, apply) in APPLIERS {
        let apply = *apply;
        let applier = Function::new(&util::applier_name(option), move |inv: &Invocation<'_>| {
            apply(inv.class()?, &inv.arg(0))?;
            Ok(Value::Undefined)
        });
        root.define_method(Side::Static, applier)?;
    }
    Ok(root)
}
