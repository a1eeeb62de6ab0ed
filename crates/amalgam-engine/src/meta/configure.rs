//! Config declaration and instance configuration
//!
//! The first instance of a class classifies every declared config:
//! - simple: nullish, equal to its initial value, or a non-object with no
//!   hooks. Shared through the class defaults, never stored per instance.
//! - cached: the apply hook runs once and its result becomes the shared
//!   default.
//! - init: assigned per instance through the apply/update pipeline.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use super::Side;
use crate::class::Class;
use crate::config::{Bootstrap, Config, ConfigMeta, MergeSite, SharedValues, ValueMap};
use crate::error::{MetaError, MetaResult};
use crate::instance::Instance;
use crate::util;
use crate::value::{Record, Value};

impl Class {
    /// Apply a `config` option payload: a record of name to default, or an
    /// [`open`](crate::config::open) record
    pub fn add_configs(&self, configs: &Value) -> MetaResult<()> {
        match configs {
            Value::Record(record) => self.add_configs_from(record, None, None),
            Value::Tagged(tagged) => match &tagged.value {
                Value::Record(record) => {
                    let open = tagged.meta.is_open().then_some(true);
                    self.add_configs_from(record, None, open)
                }
                other => Err(MetaError::TypeError(format!(
                    "config must be a record, got {}",
                    other.type_name()
                ))),
            },
            other => Err(MetaError::TypeError(format!(
                "config must be a record, got {}",
                other.type_name()
            ))),
        }
    }

    /// Declare configs on this class, or merge the configs of `mixin`
    pub(crate) fn add_configs_from(
        &self,
        declared: &Record,
        mixin: Option<&Class>,
        open: Option<bool>,
    ) -> MetaResult<()> {
        if self.is_completed() {
            return Err(MetaError::too_late(&self.name, "add configs to"));
        }

        let configs = self.own_configs();
        configs.mark_has_configs();
        if let Some(open) = open {
            configs.set_open(open);
        }

        for (name, value) in declared.entries() {
            let existing = configs.def(&name);
            let existing_value = configs.value(&name).unwrap_or_default();

            let (config, value) = match mixin {
                Some(mixin) => match &existing {
                    Some(config) => {
                        let site = MergeSite::from_mixin(self, mixin);
                        let merged = config.merge(&existing_value, &value, &site);
                        (Rc::clone(config), merged)
                    }
                    None => {
                        let config = mixin
                            .configs()
                            .and_then(|set| set.def(&name))
                            .unwrap_or_else(|| self.shared.configs.get(&name));
                        configs.mark_mixed_in(&name);
                        (config, value)
                    }
                },
                None => {
                    let mut config = existing
                        .clone()
                        .unwrap_or_else(|| self.shared.configs.get(&name));
                    let mut value = value;

                    if let Value::Tagged(tagged) = value.clone() {
                        value = tagged.value.clone();
                        config = config.extend(&tagged.meta, self, &value);
                    } else if existing.is_some()
                        && configs.is_mixed_in(&name)
                        && !config.owner().is_some_and(|owner| owner.ptr_eq(self))
                    {
                        config = config.extend(&ConfigMeta::new(), self, &value);
                    }

                    if existing.is_some() {
                        value = config.merge(&existing_value, &value, &MergeSite::new(self));
                    }
                    (config, value)
                }
            };

            let changed = existing
                .as_ref()
                .map_or(true, |existing| !Rc::ptr_eq(existing, &config));
            if changed {
                configs.insert_def(&name, config);
            }
            configs.insert_value(&name, value);
        }
        Ok(())
    }

    /// Configure `instance`: full config application on the first call,
    /// reconfiguration afterwards
    pub fn configure(&self, instance: &Instance, config: Option<Record>) -> MetaResult<()> {
        instance.set_configuring(true);
        let result = if instance.bump_config_gen() < 2 {
            self.configure_first(instance, config)
        } else {
            self.reconfigure(instance, config.as_ref())
        };
        instance.set_configuring(false);
        result
    }

    fn configure_first(&self, instance: &Instance, config: Option<Record>) -> MetaResult<()> {
        if self.configs().is_none() {
            if let Some(config) = config {
                instance.assign_fields(&config);
            }
            return Ok(());
        }

        let this = Value::Instance(instance.clone());
        let mut config = config;

        if let Some(hook) = instance.method("beforeConfigure") {
            let arg = config.clone().map(Value::Record).unwrap_or_default();
            if let Value::Record(replacement) = hook.call(&this, &[arg])? {
                config = Some(replacement);
            }
        }

        self.init_config(instance, config.as_ref())?;

        if let Some(hook) = instance.method("afterConfigure") {
            let arg = config.map(Value::Record).unwrap_or_default();
            hook.call(&this, &[arg])?;
        }
        Ok(())
    }

    /// Apply declared defaults and the supplied config to a new instance
    pub fn init_config(&self, instance: &Instance, supplied: Option<&Record>) -> MetaResult<()> {
        let Some(configs) = self.configs() else {
            return Ok(());
        };
        let this = Value::Instance(instance.clone());

        match configs.bootstrap() {
            Some(bootstrap) => instance.attach_defaults(Rc::clone(&bootstrap.defaults)),
            None => {
                self.initialize_first_instance(instance)?;
                if let Some(hook) = instance.method("afterCachedConfig") {
                    hook.call(&this, &[])?;
                }
            }
        }
        let Some(bootstrap) = configs.bootstrap() else {
            return Ok(());
        };

        let mut merged = ValueMap::default();
        for config in &bootstrap.inits {
            let name = config.name();
            instance.mark_pending(name);
            merged.insert(name.to_string(), util::clone(&configs.value(name).unwrap_or_default()));
        }

        if let Some(supplied) = supplied {
            let site = MergeSite::new(self);
            for (name, value) in supplied.entries() {
                match configs.def(&name) {
                    Some(config) => {
                        if !bootstrap.is_init(&name) {
                            instance.mark_pending(&name);
                        }
                        let declared = configs.value(&name).unwrap_or_default();
                        merged.insert(name, config.merge(&declared, &value, &site));
                    }
                    None if configs.is_open() => instance.set_field(&name, value),
                    None => {}
                }
            }
        }

        instance.set_init_config(merged);

        if let Some(hook) = instance.method("beforeInitConfig") {
            hook.call(&this, &[])?;
        }

        for name in &bootstrap.names {
            let wanted =
                bootstrap.is_init(name) || supplied.is_some_and(|s| s.contains_key(name));
            if !wanted {
                continue;
            }
            let Some(config) = configs.def(name) else {
                continue;
            };
            if !config.is_lazy() && instance.is_pending(name) {
                instance.resolve_pending(name)?;
            }
        }
        Ok(())
    }

    /// Classify every declared config and build the shared defaults
    ///
    /// Runs once per class, on its first instance. Later calls only attach
    /// the existing defaults to `instance`.
    pub fn initialize_first_instance(&self, instance: &Instance) -> MetaResult<()> {
        let Some(configs) = self.configs() else {
            return Ok(());
        };
        if let Some(bootstrap) = configs.bootstrap() {
            instance.attach_defaults(Rc::clone(&bootstrap.defaults));
            return Ok(());
        }

        let defaults: SharedValues = Rc::new(RefCell::new(ValueMap::default()));
        instance.attach_defaults(Rc::clone(&defaults));

        let names = configs.names();
        let mut inits = Vec::new();
        let mut inits_map = FxHashSet::default();
        let mut cached = Vec::new();

        for name in &names {
            let Some(config) = configs.def(name) else {
                continue;
            };
            let value = configs.value(name).unwrap_or_default();

            let simple = value.is_nullish()
                || (config.is_initial() && value.strict_eq(config.initial_value()))
                || (!self.has_hook(config.applier())
                    && !self.has_hook(config.updater())
                    && !value.is_object());

            if simple {
                defaults.borrow_mut().insert(name.clone(), value);
            } else if config.is_cached() {
                cached.push((config, value));
            } else {
                inits_map.insert(name.clone());
                inits.push(config);
            }
        }

        for (config, value) in cached {
            self.bootstrap_cached_default(instance, &config, value)?;
        }

        tracing::debug!(
            class = %self.name,
            configs = names.len(),
            inits = inits.len(),
            shared = defaults.borrow().len(),
            "first instance bootstrapped"
        );

        configs.set_bootstrap(Bootstrap {
            defaults,
            names,
            inits,
            inits_map,
        });
        Ok(())
    }

    /// Compute a cached config's shared default on the first instance
    ///
    /// The apply hook sees `undefined` as the old value. The committed
    /// value moves from the instance into the class defaults.
    pub fn bootstrap_cached_default(
        &self,
        instance: &Instance,
        config: &Config,
        value: Value,
    ) -> MetaResult<()> {
        instance.assign_config_with_old(config, value, Value::Undefined)?;
        let hoisted = instance.take_own_config(config.name()).unwrap_or_default();
        instance.insert_default(config.name(), hoisted);
        Ok(())
    }

    /// Reassign a cached config on an instance still sharing the cached
    /// default
    ///
    /// The apply hook sees the shared cached value as the old value; the
    /// result is stored on the instance only.
    pub fn reapply_cached_on_reconfigure(
        &self,
        instance: &Instance,
        config: &Config,
        value: Value,
    ) -> MetaResult<()> {
        let shared = self
            .configs()
            .and_then(|set| set.bootstrap().and_then(|b| b.default_value(config.name())))
            .unwrap_or_default();
        instance.assign_config_with_old(config, value, shared)
    }

    /// Merge `config` into an already configured instance
    ///
    /// Declared configs merge with the current value and go through the
    /// setter in name order. Unknown keys follow the open rule.
    pub fn reconfigure(&self, instance: &Instance, config: Option<&Record>) -> MetaResult<()> {
        let Some(config) = config else {
            return Ok(());
        };
        let Some(configs) = self.configs() else {
            instance.assign_fields(config);
            return Ok(());
        };

        let site = MergeSite::new(self);
        let mut entries = config.entries();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, value) in entries {
            let Some(def) = configs.def(&name) else {
                if configs.is_open() {
                    instance.set_field(&name, value);
                }
                continue;
            };

            let current = match instance.take_pending(&name) {
                Some(pending) => pending,
                None => instance.config_value(&name),
            };
            let merged = def.merge(&current, &value, &site);

            if def.is_cached() && !instance.has_own_config(&name) {
                self.reapply_cached_on_reconfigure(instance, &def, merged)?;
            } else {
                instance.assign_config(&def, merged)?;
            }
        }
        Ok(())
    }

    /// Merge `source` into `target` using each config's merge policy
    ///
    /// Keys that are not declared configs are copied only when the config
    /// set is open.
    pub fn merge_configs(&self, target: &Record, source: &Record) -> Record {
        let configs = self.configs();
        let site = MergeSite::new(self);

        for (name, value) in source.entries() {
            match configs.as_ref().and_then(|set| set.def(&name)) {
                Some(config) => {
                    let current = target.get(&name).unwrap_or_default();
                    target.insert(name, config.merge(&current, &value, &site));
                }
                None if configs.as_ref().is_some_and(|set| set.is_open()) => {
                    target.insert(name, value);
                }
                None => {}
            }
        }
        target.clone()
    }

    fn has_hook(&self, name: &str) -> bool {
        self.lookup(Side::Instance, name)
            .is_some_and(|member| member.as_function().is_some())
    }
}
