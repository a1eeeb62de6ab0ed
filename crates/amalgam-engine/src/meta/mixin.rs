//! Mixin application
//!
//! Mixing class `M` into class `T` copies `M`'s members (and those of its
//! ancestors below the common root) into `T`'s own tables. Members `T`
//! already has are left alone, except that a junction method owned by `T`
//! collects the colliding mixin functions and runs them from its super call.

use std::rc::Rc;

use rustc_hash::FxHashSet;

use super::{Member, Side};
use crate::class::Class;
use crate::config::MergeSite;
use crate::error::{MetaError, MetaResult};
use crate::value::{Function, Record, Value};

impl Class {
    /// Apply a `mixins` option payload
    ///
    /// Accepts a class, a list of classes, or `[id, class]` pairs inside the
    /// list.
    pub fn add_mixins(&self, mixins: &Value) -> MetaResult<()> {
        match mixins {
            Value::Undefined | Value::Null => Ok(()),
            Value::Class(mixin) => self.add_mixin(mixin, None),
            Value::Array(items) => {
                for item in items.to_vec() {
                    match &item {
                        Value::Class(mixin) => self.add_mixin(mixin, None)?,
                        Value::Array(pair) => {
                            let id = pair.get(0).unwrap_or_default();
                            let mixin = pair.get(1).unwrap_or_default();
                            match (&id, &mixin) {
                                (Value::String(id), Value::Class(mixin)) => {
                                    self.add_mixin(mixin, Some(&**id))?
                                }
                                _ => {
                                    return Err(MetaError::TypeError(
                                        "mixin pairs must be [id, class]".to_string(),
                                    ))
                                }
                            }
                        }
                        other => {
                            return Err(MetaError::TypeError(format!(
                                "mixins must be classes, got {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(())
            }
            other => Err(MetaError::TypeError(format!(
                "mixins must be classes, got {}",
                other.type_name()
            ))),
        }
    }

    /// Mix `mixin` into this class, registering it under `id` (or the
    /// mixin's own id)
    pub fn add_mixin(&self, mixin: &Class, id: Option<&str>) -> MetaResult<()> {
        if mixin.ptr_eq(self) || self.inherits_from(mixin.id) || mixin.inherits_from(self.id) {
            return Err(MetaError::invalid_mixin(
                &mixin.name,
                &self.name,
                "a class cannot be mixed into its own hierarchy",
            ));
        }
        if mixin.root_id != self.root_id || !mixin.inherits_from(self.root_id) {
            let root = self.shared.class(self.root_id);
            return Err(MetaError::invalid_mixin(
                &mixin.name,
                &self.name,
                format!(
                    "mixins must extend base class {}",
                    root.as_ref().map(|r| r.name()).unwrap_or("?")
                ),
            ));
        }
        if self.is_completed() {
            return Err(MetaError::too_late(&self.name, "apply a mixin to"));
        }

        mixin.complete();

        if let Some(mixin_configs) = mixin.configs() {
            let values: Record = mixin_configs.entries().into_iter().collect();
            self.add_configs_from(&values, Some(mixin), None)?;
        }

        let id = match id {
            Some(id) => id.to_string(),
            None => mixin.mixin_id(),
        };
        if self.mixin(&id).is_none() {
            self.mixins.borrow_mut().insert(id.clone(), mixin.clone());
        }

        let mut instance_seen = FxHashSet::default();
        let mut static_seen = FxHashSet::default();
        let mut current = Some(mixin.clone());

        while let Some(source) = current {
            if source.id == self.root_id || self.has_base(&source) {
                break;
            }

            let members = source.members()?;
            for side in [Side::Instance, Side::Static] {
                let seen = match side {
                    Side::Instance => &mut instance_seen,
                    Side::Static => &mut static_seen,
                };
                for (key, member) in members.side(side) {
                    if side.skips(key) {
                        continue;
                    }
                    let func = member.as_function().cloned();
                    if let Some(f) = &func {
                        f.tag_owner(&source);
                    }
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    if side == Side::Instance && self.is_chain(key) {
                        continue;
                    }
                    self.merge_member(side, key, member, func)?;
                }
            }

            current = source.superclass.clone();
        }

        {
            let mut bases = self.bases.borrow_mut();
            for (id, class) in mixin.bases.borrow().iter() {
                if !bases.contains_key(id) {
                    bases.insert(*id, class.clone());
                }
            }
            bases.insert(mixin.id, mixin.clone());
        }

        tracing::debug!(class = %self.name, mixin = %mixin.name, id = %id, "mixin applied");
        Ok(())
    }

    fn merge_member(
        &self,
        side: Side,
        key: &str,
        member: &Member,
        func: Option<Function>,
    ) -> MetaResult<()> {
        if !self.has_member(side, key) {
            self.table(side)
                .borrow_mut()
                .insert(key.to_string(), member.clone());
            return Ok(());
        }

        let (Some(func), Some(existing)) = (func, self.own_member(side, key)) else {
            return Ok(());
        };
        let Some(existing) = existing.as_function().cloned() else {
            return Ok(());
        };

        existing.tag_owner(self);
        if existing.is_junction() && existing.is_owned_by(self) {
            let junction = (side, key.to_string());
            if !self.junctions.borrow().contains_key(&junction) {
                self.create_junction(side, key);
            }
            if let Some(fns) = self.junctions.borrow_mut().get_mut(&junction) {
                fns.push(func);
            }
        }
        Ok(())
    }

    /// Install the trampoline the junction method `key` reaches through its
    /// super call
    ///
    /// The trampoline calls the real super method (if any) and then every
    /// registered mixin function, returning the result of the first call.
    fn create_junction(&self, side: Side, key: &str) {
        self.junctions
            .borrow_mut()
            .insert((side, key.to_string()), Vec::new());

        let target = Rc::downgrade(&self.0);
        let name = key.to_string();
        let trampoline = Function::new(key, move |inv| {
            let Some(target) = target.upgrade().map(Class) else {
                return Ok(Value::Undefined);
            };
            let sup = target
                .superclass
                .as_ref()
                .and_then(|sup| sup.lookup(side, &name))
                .and_then(|m| m.as_function().cloned());
            let fns = target
                .junctions
                .borrow()
                .get(&(side, name.clone()))
                .cloned()
                .unwrap_or_default();

            let mut called = sup.is_some();
            let mut result = match &sup {
                Some(f) => f.call(inv.this(), inv.args())?,
                None => Value::Undefined,
            };
            for f in &fns {
                let res = f.call(inv.this(), inv.args())?;
                if !called {
                    called = true;
                    result = res;
                }
            }
            Ok(result)
        });

        self.shim_table(side)
            .borrow_mut()
            .insert(key.to_string(), Member::value(trampoline));

        tracing::debug!(class = %self.name, method = key, side = ?side, "junction created");
    }

    /// Functions registered with junction `key`, in registration order
    pub fn junction_participants(&self, side: Side, key: &str) -> Vec<Function> {
        self.junctions
            .borrow()
            .get(&(side, key.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
