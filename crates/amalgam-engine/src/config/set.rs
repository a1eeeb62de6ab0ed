//! Per-class config tables

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};

use super::Config;
use crate::value::Value;

/// Config values keyed by property name
pub type ValueMap = FxHashMap<String, Value>;

/// Defaults object shared by every instance of one class
pub type SharedValues = Rc<RefCell<ValueMap>>;

/// Config descriptors and declared defaults of one class
///
/// A set is a layer over its superclass's set: lookups fall through to the
/// parent, writes always land in this layer.
pub struct ConfigSet {
    parent: Option<Rc<ConfigSet>>,
    defs: RefCell<IndexMap<String, Rc<Config>, FxBuildHasher>>,
    values: RefCell<IndexMap<String, Value, FxBuildHasher>>,
    mixed_in: RefCell<FxHashSet<String>>,
    has_configs: Cell<bool>,
    open: Cell<Option<bool>>,
    bootstrap: OnceCell<Bootstrap>,
}

/// Result of the first-instance classification
pub struct Bootstrap {
    pub(crate) defaults: SharedValues,
    pub(crate) names: Vec<String>,
    pub(crate) inits: Vec<Rc<Config>>,
    pub(crate) inits_map: FxHashSet<String>,
}

impl Bootstrap {
    /// Sorted names of every declared config
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Configs initialized per instance, in name order
    pub fn inits(&self) -> &[Rc<Config>] {
        &self.inits
    }

    /// Check whether `name` is initialized per instance
    pub fn is_init(&self, name: &str) -> bool {
        self.inits_map.contains(name)
    }

    /// Snapshot of the shared defaults, sorted by name
    pub fn defaults(&self) -> Vec<(String, Value)> {
        let mut entries: Vec<(String, Value)> = self
            .defaults
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Shared default for `name`
    pub fn default_value(&self, name: &str) -> Option<Value> {
        self.defaults.borrow().get(name).cloned()
    }
}

impl ConfigSet {
    /// Create a root set
    pub fn new() -> Rc<Self> {
        Rc::new(Self::layer(None))
    }

    fn layer(parent: Option<Rc<ConfigSet>>) -> Self {
        Self {
            parent,
            defs: RefCell::new(IndexMap::default()),
            values: RefCell::new(IndexMap::default()),
            mixed_in: RefCell::new(FxHashSet::default()),
            has_configs: Cell::new(false),
            open: Cell::new(None),
            bootstrap: OnceCell::new(),
        }
    }

    /// Create a child layer delegating to this set
    pub fn extend(self: &Rc<Self>) -> Rc<ConfigSet> {
        Rc::new(Self::layer(Some(Rc::clone(self))))
    }

    /// Parent layer
    pub fn parent(&self) -> Option<&Rc<ConfigSet>> {
        self.parent.as_ref()
    }

    /// Descriptor for `name`, own or inherited
    pub fn def(&self, name: &str) -> Option<Rc<Config>> {
        if let Some(config) = self.defs.borrow().get(name) {
            return Some(Rc::clone(config));
        }
        self.parent.as_ref().and_then(|p| p.def(name))
    }

    /// Declared default for `name`, own or inherited
    pub fn value(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.value(name))
    }

    /// Names of descriptors declared in this layer, in declaration order
    pub fn own_def_names(&self) -> Vec<String> {
        self.defs.borrow().keys().cloned().collect()
    }

    /// Names with a default declared in this layer, in declaration order
    pub fn own_value_names(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }

    /// Every declared name across all layers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut layer = Some(self);
        while let Some(set) = layer {
            for name in set.defs.borrow().keys() {
                seen.insert(name.clone());
            }
            layer = set.parent.as_deref();
        }
        let mut names: Vec<String> = seen.into_iter().collect();
        names.sort();
        names
    }

    /// Every declared name with its resolved default, in name order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.names()
            .into_iter()
            .map(|name| {
                let value = self.value(&name).unwrap_or_default();
                (name, value)
            })
            .collect()
    }

    /// Whether configs were declared on this layer or an ancestor
    pub fn has_configs(&self) -> bool {
        self.has_configs.get() || self.parent.as_ref().is_some_and(|p| p.has_configs())
    }

    /// Whether unknown instance config keys are copied onto instances
    pub fn is_open(&self) -> bool {
        match self.open.get() {
            Some(open) => open,
            None => self.parent.as_ref().is_some_and(|p| p.is_open()),
        }
    }

    /// First-instance classification, once it has run
    pub fn bootstrap(&self) -> Option<&Bootstrap> {
        self.bootstrap.get()
    }

    /// Whether `name` was adopted from a mixin in this layer
    pub fn is_mixed_in(&self, name: &str) -> bool {
        self.mixed_in.borrow().contains(name)
    }

    pub(crate) fn mark_has_configs(&self) {
        self.has_configs.set(true);
    }

    pub(crate) fn set_open(&self, open: bool) {
        self.open.set(Some(open));
    }

    pub(crate) fn insert_def(&self, name: &str, config: Rc<Config>) {
        self.defs.borrow_mut().insert(name.to_string(), config);
    }

    pub(crate) fn insert_value(&self, name: &str, value: Value) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    pub(crate) fn mark_mixed_in(&self, name: &str) {
        self.mixed_in.borrow_mut().insert(name.to_string());
    }

    pub(crate) fn set_bootstrap(&self, bootstrap: Bootstrap) -> &Bootstrap {
        self.bootstrap.get_or_init(|| bootstrap)
    }
}
