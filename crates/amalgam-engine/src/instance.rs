//! Class instances
//!
//! An instance stores plain fields and its own config values. Config reads
//! fall back to the class defaults shared by every instance. Configs still
//! waiting for their first assignment are tracked as pending; reading or
//! writing one resolves it through the apply/update pipeline.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::class::Class;
use crate::config::{Config, SharedValues, ValueMap};
use crate::error::{MetaError, MetaResult};
use crate::meta::{Member, Side};
use crate::value::{Function, PropertyMap, Record, Value};

/// Handle to an instance
#[derive(Clone)]
pub struct Instance(Rc<InstanceData>);

struct InstanceData {
    class: Class,
    fields: RefCell<PropertyMap>,
    /// Own config values
    values: RefCell<ValueMap>,
    /// Class defaults, attached on configuration
    defaults: RefCell<Option<SharedValues>>,
    pending: RefCell<FxHashSet<String>>,
    /// Merged initial values of pending configs
    init_config: RefCell<ValueMap>,
    configuring: Cell<bool>,
    constructing: Cell<bool>,
    destroying: Cell<bool>,
    destroyed: Cell<bool>,
    config_gen: Cell<u32>,
}

impl Instance {
    pub(crate) fn new(class: Class) -> Self {
        Instance(Rc::new(InstanceData {
            class,
            fields: RefCell::new(PropertyMap::default()),
            values: RefCell::new(ValueMap::default()),
            defaults: RefCell::new(None),
            pending: RefCell::new(FxHashSet::default()),
            init_config: RefCell::new(ValueMap::default()),
            configuring: Cell::new(false),
            constructing: Cell::new(true),
            destroying: Cell::new(false),
            destroyed: Cell::new(false),
            config_gen: Cell::new(0),
        }))
    }

    /// Concrete class
    pub fn class(&self) -> &Class {
        &self.0.class
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// This instance as a [`Value`]
    pub fn value(&self) -> Value {
        Value::Instance(self.clone())
    }

    /// Read a property
    ///
    /// Resolution order: pending configs, own fields, config values, then
    /// prototype members.
    pub fn get(&self, name: &str) -> MetaResult<Value> {
        if self.is_pending(name) {
            self.resolve_pending(name)?;
            return Ok(self.config_value(name));
        }
        if let Some(value) = self.field(name) {
            return Ok(value);
        }
        if self.config_def(name).is_some() {
            return Ok(self.config_value(name));
        }
        match self.class().lookup(Side::Instance, name) {
            Some(Member::Value { value, .. }) => Ok(value),
            Some(Member::Accessor { get: Some(get), .. }) => get.call(&self.value(), &[]),
            Some(Member::Accessor { get: None, .. }) | None => Ok(Value::Undefined),
        }
    }

    /// Write a property
    ///
    /// Declared configs go through the apply/update pipeline. Read-only
    /// prototype members reject the write.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> MetaResult<()> {
        let value = value.into();
        if let Some(config) = self.config_def(name) {
            if self.0.pending.borrow_mut().remove(name) {
                self.0.init_config.borrow_mut().remove(name);
            }
            return self.assign_config(&config, value);
        }
        match self.class().lookup(Side::Instance, name) {
            Some(Member::Accessor { set: Some(set), .. }) => {
                set.call(&self.value(), &[value])?;
                Ok(())
            }
            Some(Member::Accessor { set: None, .. }) => Err(MetaError::TypeError(format!(
                "cannot set {} of {}: property has only a getter",
                name,
                self.class().name()
            ))),
            Some(Member::Value {
                writable: false, ..
            }) => Err(MetaError::TypeError(format!(
                "cannot assign to read only property {} of {}",
                name,
                self.class().name()
            ))),
            _ => {
                self.set_field(name, value);
                Ok(())
            }
        }
    }

    /// Method `name`: an own field holding a function, or a prototype method
    pub fn method(&self, name: &str) -> Option<Function> {
        if let Some(Value::Function(f)) = self.field(name) {
            return Some(f);
        }
        self.class()
            .lookup(Side::Instance, name)
            .and_then(|m| m.as_function().cloned())
    }

    /// Call method `name`
    pub fn call(&self, name: &str, args: &[Value]) -> MetaResult<Value> {
        match self.method(name) {
            Some(func) => func.call(&self.value(), args),
            None => Err(MetaError::NoSuchMethod {
                receiver: format!("{} instance", self.class().name()),
                method: name.to_string(),
            }),
        }
    }

    /// Run construction: configuration, then the construct chain
    pub(crate) fn construct(&self, config: Option<Record>) -> MetaResult<()> {
        let class = self.class().clone();
        if class.configs().is_some() {
            self.configure(config)?;
        } else {
            if let Some(config) = &config {
                self.assign_fields(config);
            }
            self.0.config_gen.set(1);
        }

        let ctor = &class.shared.options.ctor_chain;
        if class.is_live_chain(ctor) {
            class.call_chain(self, ctor, &[], false)?;
        }
        self.0.constructing.set(false);
        Ok(())
    }

    /// Apply `config`: full configuration on the first call, a merge into
    /// the current values afterwards
    pub fn configure(&self, config: Option<Record>) -> MetaResult<()> {
        let class = self.class().clone();
        class.configure(self, config)
    }

    /// Run the destruct chain in reverse class order
    ///
    /// Calling it again on a destroyed instance does nothing.
    pub fn destroy(&self) -> MetaResult<()> {
        if self.0.destroying.get() || self.0.destroyed.get() {
            return Ok(());
        }
        self.0.destroying.set(true);

        let class = self.class().clone();
        let dtor = &class.shared.options.dtor_chain;
        let result = class.call_chain(self, dtor, &[], true);
        self.0.destroyed.set(true);
        result
    }

    /// Invoke chain `method` in class order
    pub fn call_chain(&self, method: &str, args: &[Value]) -> MetaResult<()> {
        self.class().call_chain(self, method, args, false)
    }

    /// Invoke chain `method` in reverse class order
    pub fn call_chain_rev(&self, method: &str, args: &[Value]) -> MetaResult<()> {
        self.class().call_chain(self, method, args, true)
    }

    /// Mixin registered under `id` on the class
    pub fn mixin(&self, id: &str) -> Option<Class> {
        self.class().mixin(id)
    }

    /// Value of the `isInstance` prototype flag
    pub fn is_instance(&self) -> bool {
        matches!(
            self.class().lookup(Side::Instance, "isInstance"),
            Some(Member::Value {
                value: Value::Bool(true),
                ..
            })
        )
    }

    /// Whether a configuration pass is running
    pub fn is_configuring(&self) -> bool {
        self.0.configuring.get()
    }

    /// Whether construction has not finished yet
    pub fn is_constructing(&self) -> bool {
        self.0.constructing.get()
    }

    /// Whether destruction has started; stays set once destroyed
    pub fn is_destroying(&self) -> bool {
        self.0.destroying.get()
    }

    /// Whether the instance has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    /// Number of configuration passes so far
    pub fn config_gen(&self) -> u32 {
        self.0.config_gen.get()
    }

    /// Names of configs holding an own value, sorted
    pub fn own_config_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.values.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether config `name` holds an own value
    pub fn has_own_config(&self, name: &str) -> bool {
        self.0.values.borrow().contains_key(name)
    }

    /// Own plain field
    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.fields.borrow().get(name).cloned()
    }

    /// Whether config `name` is waiting for its first assignment
    pub fn is_pending(&self, name: &str) -> bool {
        self.0.pending.borrow().contains(name)
    }

    fn config_def(&self, name: &str) -> Option<Rc<Config>> {
        self.class().configs().and_then(|set| set.def(name))
    }

    /// Assign a config through the apply/update pipeline
    pub(crate) fn assign_config(&self, config: &Config, value: Value) -> MetaResult<()> {
        let old = self.config_value(config.name());
        self.assign_config_with_old(config, value, old)
    }

    /// Apply/update pipeline with an explicit old value
    ///
    /// `apply<Name>(value, old)` may transform the value; returning
    /// `undefined` vetoes the assignment. A changed value is stored on the
    /// instance and reported to `update<Name>(value, old)`.
    pub(crate) fn assign_config_with_old(
        &self,
        config: &Config,
        value: Value,
        old: Value,
    ) -> MetaResult<()> {
        let this = self.value();
        let mut value = value;
        let mut old = old;

        if let Some(applier) = self.method(config.applier()) {
            let applied = applier.call(&this, &[value, old])?;
            if applied.is_undefined() {
                return Ok(());
            }
            value = applied;
            old = self.config_value(config.name());
        }

        if value.strict_eq(&old) {
            return Ok(());
        }
        self.0
            .values
            .borrow_mut()
            .insert(config.name().to_string(), value.clone());

        if let Some(updater) = self.method(config.updater()) {
            updater.call(&this, &[value, old])?;
        }
        Ok(())
    }

    /// Current value of config `name`: own, then the class default
    pub(crate) fn config_value(&self, name: &str) -> Value {
        if let Some(value) = self.0.values.borrow().get(name) {
            return value.clone();
        }
        self.0
            .defaults
            .borrow()
            .as_ref()
            .and_then(|defaults| defaults.borrow().get(name).cloned())
            .unwrap_or_default()
    }

    pub(crate) fn set_configuring(&self, configuring: bool) {
        self.0.configuring.set(configuring);
    }

    /// Advance the configuration generation, returning the new one
    pub(crate) fn bump_config_gen(&self) -> u32 {
        let gen = self.0.config_gen.get() + 1;
        self.0.config_gen.set(gen);
        gen
    }

    pub(crate) fn assign_fields(&self, record: &Record) {
        for (name, value) in record.entries() {
            self.set_field(&name, value);
        }
    }

    pub(crate) fn set_field(&self, name: &str, value: Value) {
        self.0.fields.borrow_mut().insert(name.to_string(), value);
    }

    pub(crate) fn attach_defaults(&self, defaults: SharedValues) {
        *self.0.defaults.borrow_mut() = Some(defaults);
    }

    pub(crate) fn insert_default(&self, name: &str, value: Value) {
        if let Some(defaults) = self.0.defaults.borrow().as_ref() {
            defaults.borrow_mut().insert(name.to_string(), value);
        }
    }

    pub(crate) fn mark_pending(&self, name: &str) {
        self.0.pending.borrow_mut().insert(name.to_string());
    }

    /// Clear the pending mark of `name`, returning its initial value
    pub(crate) fn take_pending(&self, name: &str) -> Option<Value> {
        if !self.0.pending.borrow_mut().remove(name) {
            return None;
        }
        Some(self.0.init_config.borrow_mut().remove(name).unwrap_or_default())
    }

    /// Assign the initial value of a pending config
    pub(crate) fn resolve_pending(&self, name: &str) -> MetaResult<()> {
        let Some(value) = self.take_pending(name) else {
            return Ok(());
        };
        match self.config_def(name) {
            Some(config) => self.assign_config(&config, value),
            None => Ok(()),
        }
    }

    pub(crate) fn set_init_config(&self, values: ValueMap) {
        *self.0.init_config.borrow_mut() = values;
    }

    pub(crate) fn take_own_config(&self, name: &str) -> Option<Value> {
        self.0.values.borrow_mut().remove(name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class().name())
            .field("fields", &self.0.fields.borrow().len())
            .field("configs", &self.own_config_keys())
            .field("destroyed", &self.0.destroyed.get())
            .finish()
    }
}
