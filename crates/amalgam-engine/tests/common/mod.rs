//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use amalgam_engine::{Invocation, MetaResult, Value};

/// Event log shared between test closures
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Method body that records `entry` and returns `undefined`
    pub fn recorder(
        &self,
        entry: &str,
    ) -> impl Fn(&Invocation<'_>) -> MetaResult<Value> + 'static {
        let log = self.clone();
        let entry = entry.to_string();
        move |_| {
            log.push(entry.clone());
            Ok(Value::Undefined)
        }
    }
}

/// Render an optional value list as strings for compact assertions
pub fn strings(values: &[Value]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
