//! Config annotations
//!
//! Annotations are attached to a declared default by wrapping it in a
//! [`Value::Tagged`]. Wrapping an already tagged value adds to its
//! annotations, so helpers compose: `lazy(cached(Value::from(1)))`.

use std::fmt;
use std::rc::Rc;

use crate::class::Class;
use crate::value::{Tagged, Value};

/// Custom merge policy: `(old, new, site) -> merged`
pub type MergeFn = Rc<dyn Fn(&Value, &Value, &MergeSite) -> Value>;

/// Where a merge happens
pub struct MergeSite {
    /// Class whose config values are being merged
    pub owner: Class,
    /// Mixin supplying the new value, for mixin merges
    pub mixin: Option<Class>,
}

impl MergeSite {
    /// Merge of a declaration or instance config on `owner`
    pub fn new(owner: &Class) -> Self {
        Self {
            owner: owner.clone(),
            mixin: None,
        }
    }

    /// Merge of a value contributed by `mixin` into `owner`
    pub fn from_mixin(owner: &Class, mixin: &Class) -> Self {
        Self {
            owner: owner.clone(),
            mixin: Some(mixin.clone()),
        }
    }
}

/// Builder for config annotations
#[derive(Clone, Default)]
pub struct ConfigMeta {
    pub(crate) lazy: bool,
    pub(crate) cached: bool,
    pub(crate) initial: bool,
    pub(crate) open: bool,
    pub(crate) merge: Option<MergeFn>,
}

impl ConfigMeta {
    /// No annotations
    pub fn new() -> Self {
        Self::default()
    }

    /// Defer the first assignment until the property is first read
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Run the apply hook once and share the result between instances
    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// The declared value is the "nothing configured" value
    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Copy unknown instance config keys onto the instance (config records)
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Replace the default merge policy
    pub fn merge<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Value, &MergeSite) -> Value + 'static,
    {
        self.merge = Some(Rc::new(f));
        self
    }

    /// Attach these annotations to `value`
    pub fn wrap(self, value: impl Into<Value>) -> Value {
        Value::Tagged(Rc::new(Tagged {
            meta: self,
            value: value.into(),
        }))
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

    /// Check for the open flag
    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl fmt::Debug for ConfigMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigMeta")
            .field("lazy", &self.lazy)
            .field("cached", &self.cached)
            .field("initial", &self.initial)
            .field("open", &self.open)
            .field("merge", &self.merge.is_some())
            .finish()
    }
}

fn annotate(value: impl Into<Value>, edit: impl FnOnce(ConfigMeta) -> ConfigMeta) -> Value {
    match value.into() {
        Value::Tagged(tagged) => edit(tagged.meta.clone()).wrap(tagged.value.clone()),
        plain => edit(ConfigMeta::new()).wrap(plain),
    }
}

/// Mark a config declaration lazy
pub fn lazy(value: impl Into<Value>) -> Value {
    annotate(value, ConfigMeta::lazy)
}

/// Mark a config declaration cached
pub fn cached(value: impl Into<Value>) -> Value {
    annotate(value, ConfigMeta::cached)
}

/// Mark a config declaration's value as its initial value
pub fn initial(value: impl Into<Value>) -> Value {
    annotate(value, ConfigMeta::initial)
}

/// Give a config declaration a custom merge policy
pub fn with_merge<F>(value: impl Into<Value>, f: F) -> Value
where
    F: Fn(&Value, &Value, &MergeSite) -> Value + 'static,
{
    annotate(value, |meta| meta.merge(f))
}

/// Mark a whole config record open
pub fn open(configs: impl Into<Value>) -> Value {
    annotate(configs, ConfigMeta::open)
}
