//! Class metadata
//!
//! One [`Meta`] exists per class. It tracks the superclass chain, the set of
//! merged mixins, method chains, completion state, the class's config set
//! and its resolved processors. The logic that mutates it lives in the
//! submodules:
//!
//! - `members`: per-class member tables, lookups and the completion vtable
//! - `mixin`: mixin application and junction trampolines
//! - `chain`: method chains
//! - `configure`: config declaration and instance configuration

mod chain;
mod configure;
mod members;
mod mixin;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use once_cell::unsync::OnceCell;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::class::Class;
use crate::config::ConfigSet;
use crate::error::MetaResult;
use crate::processor::{self, Processor};
use crate::runtime::{ClassId, Shared};
use crate::util;
use crate::value::{Function, Value};

pub use members::{Member, MemberTable, Members, Side};

/// Metadata of one class
pub struct Meta {
    pub(crate) id: ClassId,
    pub(crate) name: String,
    pub(crate) superclass: Option<Class>,
    pub(crate) root_id: ClassId,
    pub(crate) shared: Rc<Shared>,

    /// Own instance-side members
    pub(crate) proto: RefCell<MemberTable>,
    /// Own static members
    pub(crate) statics: RefCell<MemberTable>,
    /// Shim layer between this class and its superclass, instance side
    pub(crate) shim_proto: RefCell<MemberTable>,
    /// Shim layer between this class and its superclass, static side
    pub(crate) shim_statics: RefCell<MemberTable>,
    /// Mixin participants of each junction, keyed by side and name
    pub(crate) junctions: RefCell<FxHashMap<(Side, String), Vec<Function>>>,
    /// Flattened instance-side members, built on completion
    pub(crate) vtable: OnceCell<MemberTable>,
    /// Snapshot of own members for mixin copying
    pub(crate) members: OnceCell<Members>,

    /// Superclass chain plus every merged mixin (and its bases)
    pub(crate) bases: RefCell<IndexMap<ClassId, Class, FxBuildHasher>>,
    pub(crate) completed: Cell<bool>,
    /// `bases` plus this class, frozen on completion
    pub(crate) classes: OnceCell<Vec<Weak<Meta>>>,
    pub(crate) classes_rev: OnceCell<Vec<Weak<Meta>>>,

    /// Chain names declared on this class
    pub(crate) chains: RefCell<IndexSet<String, FxBuildHasher>>,
    /// Own liveness overrides; see [`Meta::is_live_chain`]
    pub(crate) live_chains: RefCell<FxHashMap<String, bool>>,
    pub(crate) chain_scans: Cell<u32>,

    /// Own mixin registry layer
    pub(crate) mixins: RefCell<IndexMap<String, Class, FxBuildHasher>>,
    pub(crate) mixin_id: RefCell<Option<String>>,

    pub(crate) configs: RefCell<Option<Rc<ConfigSet>>>,
    pub(crate) processors: RefCell<Option<Vec<Processor>>>,

    /// Instances constructed from exactly this class
    pub(crate) instances: Cell<u32>,
}

impl Meta {
    pub(crate) fn new(shared: &Rc<Shared>, name: &str, superclass: Option<&Class>) -> Class {
        let id = shared.next_class_id();
        let (root_id, bases) = match superclass {
            Some(sup) => {
                let mut bases = sup.bases.borrow().clone();
                bases.insert(sup.id, sup.clone());
                (sup.root_id, bases)
            }
            None => (id, IndexMap::default()),
        };

        let meta = Meta {
            id,
            name: name.to_string(),
            superclass: superclass.cloned(),
            root_id,
            shared: Rc::clone(shared),
            proto: RefCell::new(MemberTable::default()),
            statics: RefCell::new(MemberTable::default()),
            shim_proto: RefCell::new(MemberTable::default()),
            shim_statics: RefCell::new(MemberTable::default()),
            junctions: RefCell::new(FxHashMap::default()),
            vtable: OnceCell::new(),
            members: OnceCell::new(),
            bases: RefCell::new(bases),
            completed: Cell::new(false),
            classes: OnceCell::new(),
            classes_rev: OnceCell::new(),
            chains: RefCell::new(IndexSet::default()),
            live_chains: RefCell::new(FxHashMap::default()),
            chain_scans: Cell::new(0),
            mixins: RefCell::new(IndexMap::default()),
            mixin_id: RefCell::new(None),
            configs: RefCell::new(None),
            processors: RefCell::new(None),
            instances: Cell::new(0),
        };

        let class = Class(Rc::new(meta));
        shared.register(&class);

        tracing::debug!(
            class = %class.name,
            id = %class.id,
            superclass = class.superclass.as_ref().map(|s| s.name.as_str()).unwrap_or("-"),
            "class created"
        );
        class
    }

    /// Class id
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct superclass
    pub fn superclass(&self) -> Option<&Class> {
        self.superclass.as_ref()
    }

    /// Whether this class is a root of its hierarchy
    pub fn is_root(&self) -> bool {
        self.superclass.is_none()
    }

    /// Whether the class is frozen against structural mutation
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }

    /// Instances constructed from exactly this class
    pub fn instance_count(&self) -> u32 {
        self.instances.get()
    }

    /// Superclass chain plus merged mixins, in insertion order
    pub fn bases(&self) -> Vec<Class> {
        self.bases.borrow().values().cloned().collect()
    }

    /// Whether `class` is in [`Meta::bases`]
    pub fn has_base(&self, class: &Class) -> bool {
        self.bases.borrow().contains_key(&class.id)
    }

    /// Bases plus this class, once completed
    pub fn classes(&self) -> Vec<Class> {
        self.classes
            .get()
            .map(|list| list.iter().filter_map(Weak::upgrade).map(Class).collect())
            .unwrap_or_default()
    }

    /// Whether `ancestor` is a strict ancestor through the superclass chain
    pub fn inherits_from(&self, ancestor: ClassId) -> bool {
        let mut current = self.superclass.as_ref();
        while let Some(class) = current {
            if class.id == ancestor {
                return true;
            }
            current = class.superclass.as_ref();
        }
        false
    }

    /// Config set in effect, if this class or an ancestor declared configs
    pub fn configs(&self) -> Option<Rc<ConfigSet>> {
        self.config_layer().filter(|set| set.has_configs())
    }

    /// Nearest config layer, own or inherited, regardless of content
    pub(crate) fn config_layer(&self) -> Option<Rc<ConfigSet>> {
        if let Some(set) = self.configs.borrow().as_ref() {
            return Some(Rc::clone(set));
        }
        self.superclass.as_ref().and_then(|sup| sup.config_layer())
    }

    /// Own writable config layer, created on first use
    pub(crate) fn own_configs(&self) -> Rc<ConfigSet> {
        if let Some(set) = self.configs.borrow().as_ref() {
            return Rc::clone(set);
        }
        let set = match &self.superclass {
            Some(sup) => sup.own_configs().extend(),
            None => ConfigSet::new(),
        };
        *self.configs.borrow_mut() = Some(Rc::clone(&set));
        set
    }

    /// Whether the class owns its config layer
    pub fn has_own_configs(&self) -> bool {
        self.configs.borrow().is_some()
    }

    /// Resolved processors, own or inherited
    pub fn processors(&self) -> Vec<Processor> {
        if let Some(procs) = self.processors.borrow().as_ref() {
            return procs.clone();
        }
        self.superclass
            .as_ref()
            .map(|sup| sup.processors())
            .unwrap_or_default()
    }

    /// Replace this class's processors with `declared` merged over the
    /// inherited ones
    pub fn add_processors(&self, declared: &Value) -> MetaResult<()> {
        let inherited = self.processors();
        let resolved = processor::decode(declared, &inherited)?;

        tracing::debug!(
            class = %self.name,
            processors = ?resolved.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "processors resolved"
        );
        *self.processors.borrow_mut() = Some(resolved);
        Ok(())
    }

    /// Id under which this class registers when mixed in
    ///
    /// Defaults to the decapitalized class name; anonymous classes get a
    /// generated id.
    pub fn mixin_id(&self) -> String {
        if let Some(id) = self.mixin_id.borrow().as_ref() {
            return id.clone();
        }
        let id = if self.name.is_empty() {
            self.shared.next_mixin_id()
        } else {
            util::decapitalize(&self.name)
        };
        *self.mixin_id.borrow_mut() = Some(id.clone());
        id
    }

    /// Set the id under which this class registers when mixed in
    pub fn set_mixin_id(&self, id: &str) {
        *self.mixin_id.borrow_mut() = Some(id.to_string());
    }

    /// Registered mixin for `id`, own or inherited
    pub fn mixin(&self, id: &str) -> Option<Class> {
        if let Some(class) = self.mixins.borrow().get(id) {
            return Some(class.clone());
        }
        self.superclass.as_ref().and_then(|sup| sup.mixin(id))
    }

    /// Every registered mixin id, own first, then inherited
    pub fn mixin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.mixins.borrow().keys().cloned().collect();
        if let Some(sup) = &self.superclass {
            for id in sup.mixin_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name.clone()))
            .field("completed", &self.completed.get())
            .field("instances", &self.instances.get())
            .finish()
    }
}
