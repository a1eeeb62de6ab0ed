//! Class handles
//!
//! A [`Class`] is a cheap, clonable handle to a class's [`Meta`]. Cloning a
//! handle never copies the class; equality is identity.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::builder::ClassBuilder;
use crate::error::{MetaError, MetaResult};
use crate::instance::Instance;
use crate::meta::{Member, Meta, Side};
use crate::util;
use crate::value::{Record, Value};

/// Handle to a class
#[derive(Clone)]
pub struct Class(pub(crate) Rc<Meta>);

impl Deref for Class {
    type Target = Meta;

    fn deref(&self) -> &Meta {
        &self.0
    }
}

impl Class {
    /// Class metadata
    pub fn meta(&self) -> &Meta {
        &self.0
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Class) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this class is `other` or inherits from it
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        self.ptr_eq(other) || self.inherits_from(other.id)
    }

    /// Create a subclass
    pub fn extend(&self, name: &str) -> Class {
        Meta::new(&self.shared, name, Some(self))
    }

    /// Start building a subclass with members
    pub fn builder(&self, name: &str) -> ClassBuilder {
        ClassBuilder::new(name, self)
    }

    /// Process class options and return the class
    pub fn define(&self, options: Record) -> MetaResult<Class> {
        self.process_options(&options)?;
        Ok(self.clone())
    }

    /// Resolve every option through a processor or an `apply<Key>` static
    ///
    /// The `processors` option is applied first since it can introduce new
    /// processors. Then each processor, in order, consumes its option. Any
    /// remaining key needs a matching applier.
    pub fn process_options(&self, options: &Record) -> MetaResult<()> {
        let options = options.shallow_clone();

        if let Some(processors) = options.remove("processors") {
            self.call("applyProcessors", &[processors])?;
        }

        for proc in self.processors() {
            if let Some(payload) = options.remove(proc.name()) {
                tracing::trace!(class = %self.name, option = proc.name(), "applying option");
                self.call(proc.applier(), &[payload])?;
            }
        }

        let this = Value::Class(self.clone());
        for (key, payload) in options.entries() {
            let applier = self
                .lookup(Side::Static, &util::applier_name(&key))
                .and_then(|m| m.as_function().cloned());
            match applier {
                Some(applier) => {
                    tracing::trace!(class = %self.name, option = %key, "applying option");
                    applier.call(&this, &[payload])?;
                }
                None => {
                    return Err(MetaError::UnknownOption {
                        class: self.name.clone(),
                        option: key,
                    })
                }
            }
        }
        Ok(())
    }

    /// Freeze the class: no more mixins, chains, configs or prototype
    /// members. Completes every ancestor too.
    pub fn complete(&self) {
        if self.completed.get() {
            return;
        }
        self.completed.set(true);

        if !self.has_own_configs() && self.configs().is_some() {
            self.own_configs();
        }

        let mut classes: Vec<_> = self
            .bases
            .borrow()
            .values()
            .map(|c| Rc::downgrade(&c.0))
            .collect();
        classes.push(Rc::downgrade(&self.0));
        let mut reversed = classes.clone();
        reversed.reverse();
        let _ = self.classes.set(classes);
        let _ = self.classes_rev.set(reversed);

        if let Some(sup) = &self.superclass {
            sup.complete();
        }

        let _ = self.vtable.set(self.flatten());
        tracing::debug!(class = %self.name, classes = self.bases.borrow().len() + 1, "class completed");
    }

    /// Construct an instance with no config
    pub fn create(&self) -> MetaResult<Instance> {
        self.instantiate(None)
    }

    /// Construct an instance from a config record
    pub fn create_with(&self, config: Record) -> MetaResult<Instance> {
        self.instantiate(Some(config))
    }

    fn instantiate(&self, config: Option<Record>) -> MetaResult<Instance> {
        self.instances.set(self.instances.get() + 1);
        if !self.is_completed() {
            self.complete();
        }
        let instance = Instance::new(self.clone());
        instance.construct(config)?;
        Ok(instance)
    }

    /// Read a static property
    pub fn get(&self, name: &str) -> MetaResult<Value> {
        match self.lookup(Side::Static, name) {
            Some(Member::Value { value, .. }) => Ok(value),
            Some(Member::Accessor { get: Some(get), .. }) => get.call(&Value::Class(self.clone()), &[]),
            Some(Member::Accessor { get: None, .. }) | None => Ok(Value::Undefined),
        }
    }

    /// Write a static property on this class
    pub fn set(&self, name: &str, value: impl Into<Value>) -> MetaResult<()> {
        let value = value.into();
        if let Some(Member::Accessor { set: Some(set), .. }) = self.lookup(Side::Static, name) {
            set.call(&Value::Class(self.clone()), &[value])?;
            return Ok(());
        }
        self.define_member(Side::Static, name, Member::value(value))
    }

    /// Call a static method
    pub fn call(&self, name: &str, args: &[Value]) -> MetaResult<Value> {
        match self
            .lookup(Side::Static, name)
            .and_then(|m| m.as_function().cloned())
        {
            Some(func) => func.call(&Value::Class(self.clone()), args),
            None => Err(MetaError::NoSuchMethod {
                receiver: self.name.clone(),
                method: name.to_string(),
            }),
        }
    }

    /// Read a prototype data member
    pub fn proto_get(&self, name: &str) -> Value {
        self.lookup(Side::Instance, name)
            .and_then(|m| m.as_value().cloned())
            .unwrap_or_default()
    }

    /// Write a prototype data member
    pub fn proto_set(&self, name: &str, value: impl Into<Value>) -> MetaResult<()> {
        self.define_member(Side::Instance, name, Member::value(value))
    }

    /// Define prototype members from property descriptors
    pub fn add_properties(&self, properties: &Value) -> MetaResult<()> {
        for (name, descriptor) in record_entries(properties, "properties")? {
            let member = Member::from_descriptor(&name, &descriptor)?;
            self.define_member(Side::Instance, &name, member)?;
        }
        Ok(())
    }

    /// Copy plain values onto the prototype
    pub fn add_prototype(&self, members: &Value) -> MetaResult<()> {
        for (name, value) in record_entries(members, "prototype")? {
            self.proto_set(&name, value)?;
        }
        Ok(())
    }

    /// Copy plain values onto the class
    pub fn add_statics(&self, members: &Value) -> MetaResult<()> {
        for (name, value) in record_entries(members, "static")? {
            self.set(&name, value)?;
        }
        Ok(())
    }
}

fn record_entries(value: &Value, option: &str) -> MetaResult<Vec<(String, Value)>> {
    match value {
        Value::Record(record) => Ok(record.entries()),
        Value::Undefined | Value::Null => Ok(Vec::new()),
        other => Err(MetaError::TypeError(format!(
            "{} must be a record, got {}",
            option,
            other.type_name()
        ))),
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({}, {})", self.name, self.id)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
