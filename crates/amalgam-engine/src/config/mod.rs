//! Config property descriptors
//!
//! One [`Config`] is interned per property name in the runtime's
//! [`ConfigRegistry`]. Classes that annotate a config get a specialized
//! descriptor parented to the interned one; unannotated declarations share
//! the interned descriptor.

mod meta;
mod set;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::class::Class;
use crate::meta::Meta;
use crate::util;
use crate::value::Value;

pub use meta::{cached, initial, lazy, open, with_merge, ConfigMeta, MergeFn, MergeSite};
pub use set::{Bootstrap, ConfigSet, SharedValues, ValueMap};

/// Descriptor for one config property
pub struct Config {
    name: String,
    applier: String,
    updater: String,
    owner: Option<Weak<Meta>>,
    parent: Option<Rc<Config>>,
    lazy: bool,
    cached: bool,
    initial: bool,
    initial_value: Value,
    merge: Option<MergeFn>,
}

impl Config {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            applier: util::applier_name(name),
            updater: util::updater_name(name),
            owner: None,
            parent: None,
            lazy: false,
            cached: false,
            initial: false,
            initial_value: Value::Undefined,
            merge: None,
        }
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply hook name (`applyFoo`)
    pub fn applier(&self) -> &str {
        &self.applier
    }

    /// Update hook name (`updateFoo`)
    pub fn updater(&self) -> &str {
        &self.updater
    }

    /// Class that specialized this descriptor; `None` for the shared one
    pub fn owner(&self) -> Option<Class> {
        self.owner.as_ref().and_then(Weak::upgrade).map(Class)
    }

    /// Descriptor this one was specialized from
    pub fn parent(&self) -> Option<&Rc<Config>> {
        self.parent.as_ref()
    }

    /// Check for the lazy flag
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Check for the cached flag
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Check for the initial flag
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Value declared together with the initial flag
    pub fn initial_value(&self) -> &Value {
        &self.initial_value
    }

    /// Check for a custom merge policy
    pub fn has_custom_merge(&self) -> bool {
        self.merge.is_some()
    }

    /// Specialize this descriptor for `owner`
    ///
    /// Flags set in `meta` are added to the inherited ones. When the
    /// `initial` flag is set, `value` becomes the initial value.
    pub fn extend(self: &Rc<Self>, meta: &ConfigMeta, owner: &Class, value: &Value) -> Rc<Config> {
        let initial = self.initial || meta.initial;
        Rc::new(Config {
            name: self.name.clone(),
            applier: self.applier.clone(),
            updater: self.updater.clone(),
            owner: Some(Rc::downgrade(&owner.0)),
            parent: Some(Rc::clone(self)),
            lazy: self.lazy || meta.lazy,
            cached: self.cached || meta.cached,
            initial,
            initial_value: if meta.initial {
                value.clone()
            } else {
                self.initial_value.clone()
            },
            merge: meta.merge.clone().or_else(|| self.merge.clone()),
        })
    }

    /// Merge `new` over `old` using this descriptor's policy
    pub fn merge(&self, old: &Value, new: &Value, site: &MergeSite) -> Value {
        match &self.merge {
            Some(merge) => merge(old, new, site),
            None => util::merge(old, new, site),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("name", &self.name)
            .field("owner", &self.owner().map(|c| c.name().to_string()))
            .field("lazy", &self.lazy)
            .field("cached", &self.cached)
            .field("initial", &self.initial)
            .field("merge", &self.merge.is_some())
            .finish()
    }
}

/// Interned config descriptors, one per property name
#[derive(Default)]
pub struct ConfigRegistry {
    all: RefCell<FxHashMap<String, Rc<Config>>>,
}

impl ConfigRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared descriptor for `name`, created on first use
    pub fn get(&self, name: &str) -> Rc<Config> {
        if let Some(config) = self.all.borrow().get(name) {
            return Rc::clone(config);
        }
        let config = Rc::new(Config::new(name));
        self.all
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&config));
        config
    }

    /// Number of interned descriptors
    pub fn len(&self) -> usize {
        self.all.borrow().len()
    }

    /// Check if nothing is interned yet
    pub fn is_empty(&self) -> bool {
        self.all.borrow().is_empty()
    }
}
