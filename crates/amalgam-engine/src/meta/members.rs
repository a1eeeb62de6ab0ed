//! Member tables
//!
//! Each class keeps explicit tables for its own instance-side ("prototype")
//! and static members. Lookups walk the superclass chain, visiting a class's
//! shim layer (junction trampolines) right after the class itself. Once a
//! class completes, its instance side is flattened into a vtable.

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::Meta;
use crate::class::Class;
use crate::error::{MetaError, MetaResult};
use crate::value::{Function, Value};

/// Member table: name to member, in definition order
pub type MemberTable = IndexMap<String, Member, FxBuildHasher>;

/// Instance names never copied from a mixin
pub(crate) const PROTOTYPE_SKIP: &[&str] = &["constructor", "$meta", "super"];

/// Static names never copied from a mixin
pub(crate) const STATIC_SKIP: &[&str] = &["prototype", "length", "name", "$meta", "super"];

/// Which member surface of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Prototype members, seen by instances
    Instance,
    /// Members of the class itself
    Static,
}

impl Side {
    pub(crate) fn skips(self, name: &str) -> bool {
        match self {
            Side::Instance => PROTOTYPE_SKIP.contains(&name),
            Side::Static => STATIC_SKIP.contains(&name),
        }
    }
}

/// A class member
#[derive(Clone)]
pub enum Member {
    /// Data member (methods are data members holding a function)
    Value {
        /// Stored value
        value: Value,
        /// Whether instances may assign over it
        writable: bool,
    },
    /// Getter/setter pair
    Accessor {
        /// Getter, called with the receiver
        get: Option<Function>,
        /// Setter, called with the receiver and the new value
        set: Option<Function>,
    },
}

impl Member {
    /// Writable data member
    pub fn value(value: impl Into<Value>) -> Self {
        Member::Value {
            value: value.into(),
            writable: true,
        }
    }

    /// Read-only data member
    pub fn constant(value: impl Into<Value>) -> Self {
        Member::Value {
            value: value.into(),
            writable: false,
        }
    }

    /// Getter/setter pair
    pub fn accessor(get: Option<Function>, set: Option<Function>) -> Self {
        Member::Accessor { get, set }
    }

    /// Function stored in a data member
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Member::Value {
                value: Value::Function(f),
                ..
            } => Some(f),
            _ => None,
        }
    }

    /// Value stored in a data member
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Member::Value { value, .. } => Some(value),
            Member::Accessor { .. } => None,
        }
    }

    /// Parse a property descriptor record: `{ value, writable }` or
    /// `{ get, set }`
    pub fn from_descriptor(name: &str, descriptor: &Value) -> MetaResult<Self> {
        let record = descriptor.as_record().ok_or_else(|| {
            MetaError::TypeError(format!(
                "property descriptor for {} must be a record, got {}",
                name,
                descriptor.type_name()
            ))
        })?;

        let accessor_fn = |key: &str| -> MetaResult<Option<Function>> {
            match record.get(key) {
                None | Some(Value::Undefined) => Ok(None),
                Some(Value::Function(f)) => Ok(Some(f)),
                Some(other) => Err(MetaError::TypeError(format!(
                    "{} of property {} must be a function, got {}",
                    key,
                    name,
                    other.type_name()
                ))),
            }
        };

        if record.contains_key("get") || record.contains_key("set") {
            return Ok(Member::Accessor {
                get: accessor_fn("get")?,
                set: accessor_fn("set")?,
            });
        }

        Ok(Member::Value {
            value: record.get("value").unwrap_or_default(),
            writable: record
                .get("writable")
                .and_then(|w| w.as_bool())
                .unwrap_or(false),
        })
    }

    /// Tag every function in this member with `class` unless already tagged
    pub(crate) fn tag_owner(&self, class: &Class) {
        match self {
            Member::Value {
                value: Value::Function(f),
                ..
            } => {
                f.tag_owner(class);
            }
            Member::Value { .. } => {}
            Member::Accessor { get, set } => {
                for f in get.iter().chain(set.iter()) {
                    f.tag_owner(class);
                }
            }
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Value { value, writable } => f
                .debug_struct("Value")
                .field("value", value)
                .field("writable", writable)
                .finish(),
            Member::Accessor { get, set } => f
                .debug_struct("Accessor")
                .field("get", &get.as_ref().map(|g| g.name().to_string()))
                .field("set", &set.as_ref().map(|s| s.name().to_string()))
                .finish(),
        }
    }
}

/// Snapshot of a completed class's own members
#[derive(Debug, Clone)]
pub struct Members {
    pub(crate) proto: Vec<(String, Member)>,
    pub(crate) statics: Vec<(String, Member)>,
}

impl Members {
    /// Members of one side, in definition order
    pub fn side(&self, side: Side) -> &[(String, Member)] {
        match side {
            Side::Instance => &self.proto,
            Side::Static => &self.statics,
        }
    }

    /// Member names of one side, in definition order
    pub fn keys(&self, side: Side) -> Vec<&str> {
        self.side(side).iter().map(|(k, _)| k.as_str()).collect()
    }
}

impl Meta {
    pub(crate) fn table(&self, side: Side) -> &RefCell<MemberTable> {
        match side {
            Side::Instance => &self.proto,
            Side::Static => &self.statics,
        }
    }

    pub(crate) fn shim_table(&self, side: Side) -> &RefCell<MemberTable> {
        match side {
            Side::Instance => &self.shim_proto,
            Side::Static => &self.shim_statics,
        }
    }

    /// Own member of this class (shim excluded)
    pub fn own_member(&self, side: Side, name: &str) -> Option<Member> {
        self.table(side).borrow().get(name).cloned()
    }

    /// Whether this class itself defines `name`
    pub fn has_own_member(&self, side: Side, name: &str) -> bool {
        self.table(side).borrow().contains_key(name)
    }

    /// Resolve `name`: own members, the shim, then the superclass chain
    pub fn lookup(&self, side: Side, name: &str) -> Option<Member> {
        if side == Side::Instance {
            if let Some(vtable) = self.vtable.get() {
                return vtable.get(name).cloned();
            }
        }
        if let Some(member) = self.own_member(side, name) {
            return Some(member);
        }
        self.super_lookup(side, name)
    }

    /// Resolve `name` as seen by a super call from this class
    pub fn super_lookup(&self, side: Side, name: &str) -> Option<Member> {
        if let Some(member) = self.shim_table(side).borrow().get(name) {
            return Some(member.clone());
        }
        self.superclass.as_ref().and_then(|sup| sup.lookup(side, name))
    }

    /// Whether `name` resolves on this class
    pub fn has_member(&self, side: Side, name: &str) -> bool {
        self.lookup(side, name).is_some()
    }

    /// Snapshot of own members, only available once completed
    pub fn members(&self) -> MetaResult<&Members> {
        if !self.is_completed() {
            return Err(MetaError::IncompleteClass {
                class: self.name.clone(),
            });
        }
        Ok(self.members.get_or_init(|| Members {
            proto: snapshot(&self.proto.borrow()),
            statics: snapshot(&self.statics.borrow()),
        }))
    }

    /// Instance-side members flattened from the root down to this class
    pub(crate) fn flatten(&self) -> MemberTable {
        let mut table = match &self.superclass {
            Some(sup) => match sup.vtable.get() {
                Some(vtable) => vtable.clone(),
                None => sup.flatten(),
            },
            None => MemberTable::default(),
        };
        for (name, member) in self.shim_proto.borrow().iter() {
            table.insert(name.clone(), member.clone());
        }
        for (name, member) in self.proto.borrow().iter() {
            table.insert(name.clone(), member.clone());
        }
        table
    }
}

fn snapshot(table: &MemberTable) -> Vec<(String, Member)> {
    table.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

impl Class {
    /// Define an own member
    ///
    /// Functions are tagged with this class as their owner. Instance-side
    /// members cannot be added once the class is complete; static members
    /// can.
    pub fn define_member(&self, side: Side, name: &str, member: Member) -> MetaResult<()> {
        if side == Side::Instance && self.is_completed() {
            return Err(MetaError::too_late(&self.name, "add prototype members to"));
        }
        member.tag_owner(self);
        self.table(side).borrow_mut().insert(name.to_string(), member);
        Ok(())
    }

    /// Define an own method
    pub fn define_method(&self, side: Side, function: Function) -> MetaResult<()> {
        let name = function.name().to_string();
        self.define_member(side, &name, Member::value(function))
    }
}
