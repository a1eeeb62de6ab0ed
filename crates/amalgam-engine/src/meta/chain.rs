//! Method chains
//!
//! A chain method runs once per class that implements it, across the
//! completed class list (ancestors, merged mixins, then the class itself).
//! Chains start out live; the first call that finds no implementation marks
//! the chain dead on that class so later calls return without scanning.

use std::rc::Weak;

use super::{Meta, Side};
use crate::class::Class;
use crate::error::{MetaError, MetaResult};
use crate::instance::Instance;
use crate::util;
use crate::value::Value;

impl Meta {
    /// Declare chain methods on this class
    pub fn add_chains(&self, names: &Value) -> MetaResult<()> {
        if self.is_completed() {
            return Err(MetaError::too_late(&self.name, "add chains to"));
        }

        for name in util::to_list(names) {
            let name = match name {
                Value::String(s) => s.to_string(),
                other => {
                    return Err(MetaError::TypeError(format!(
                        "chain names must be strings, got {}",
                        other.type_name()
                    )))
                }
            };
            self.live_chains.borrow_mut().insert(name.clone(), true);
            self.chains.borrow_mut().insert(name);
        }
        Ok(())
    }

    /// Whether `name` is declared as a chain here or on an ancestor
    pub fn is_chain(&self, name: &str) -> bool {
        self.chains.borrow().contains(name)
            || self.superclass.as_ref().is_some_and(|sup| sup.is_chain(name))
    }

    /// Every visible chain name, ancestors first
    pub fn chains(&self) -> Vec<String> {
        let mut names = self
            .superclass
            .as_ref()
            .map(|sup| sup.chains())
            .unwrap_or_default();
        for name in self.chains.borrow().iter() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Whether calling chain `name` on this class can invoke anything
    ///
    /// A dead mark is local to the class that recorded it, so a subclass
    /// that adds an implementation still sees the chain as live.
    pub fn is_live_chain(&self, name: &str) -> bool {
        match self.live_chains.borrow().get(name) {
            Some(live) => *live,
            None => self.is_chain(name),
        }
    }

    /// Number of full scans `call_chain` has performed on this class
    pub fn chain_scan_count(&self) -> u32 {
        self.chain_scans.get()
    }

    /// Invoke every own implementation of chain `method` for `instance`
    ///
    /// Classes are visited in completion order, or reversed when `reverse`
    /// is set. An instance's class is always complete; calling on an
    /// incomplete class is an error.
    pub fn call_chain(
        &self,
        instance: &Instance,
        method: &str,
        args: &[Value],
        reverse: bool,
    ) -> MetaResult<()> {
        if !self.is_live_chain(method) {
            return Ok(());
        }

        let classes = if reverse {
            self.classes_rev.get()
        } else {
            self.classes.get()
        };
        let Some(classes) = classes else {
            return Err(MetaError::IncompleteClass {
                class: self.name.clone(),
            });
        };

        self.chain_scans.set(self.chain_scans.get() + 1);

        let this = Value::Instance(instance.clone());
        let mut called = false;

        for class in classes.iter().filter_map(Weak::upgrade).map(Class) {
            let Some(func) = class
                .own_member(Side::Instance, method)
                .and_then(|m| m.as_function().cloned())
            else {
                continue;
            };
            called = true;
            func.call(&this, args)?;
        }

        if !called {
            tracing::trace!(class = %self.name, chain = method, "chain marked dead");
            self.live_chains.borrow_mut().insert(method.to_string(), false);
        }
        Ok(())
    }
}
