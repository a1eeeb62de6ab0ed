//! Amalgam Engine
//!
//! A metaclass engine for dynamic class hierarchies: mixins with junction
//! methods, config properties with apply/update hooks, per-class defaults
//! bootstrapped by the first instance, construct/destruct method chains,
//! and class options resolved through dependency-ordered processors.
//!
//! Everything runs on one thread. Classes and instances are reference
//! counted handles; see [`Runtime`] for the entry point.

#![warn(missing_docs)]

pub mod builder;
pub mod class;
pub mod config;
pub mod error;
pub mod instance;
pub mod meta;
pub mod processor;
pub mod runtime;
pub mod util;
pub mod value;

pub use builder::ClassBuilder;
pub use class::Class;
pub use config::{cached, initial, lazy, open, with_merge, Config, ConfigMeta, ConfigSet, MergeSite};
pub use error::{MetaError, MetaResult};
pub use instance::Instance;
pub use meta::{Member, Meta, Side};
pub use processor::Processor;
pub use runtime::{ClassId, Runtime, RuntimeOptions};
pub use value::{Array, Date, Function, Invocation, Record, Value};
