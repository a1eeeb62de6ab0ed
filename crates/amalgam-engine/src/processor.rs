//! Class-definition processors
//!
//! A processor is a named step of option handling. Processors declare
//! `after`/`before` dependencies on each other and are resolved once per
//! class into a deterministic order:
//! - inherited processors come first, in their resolved order
//! - processors declared by the class follow, in declaration order
//! - a depth-first visit then moves every dependency ahead of its dependents

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{MetaError, MetaResult};
use crate::util;
use crate::value::Value;

/// One named step of class option processing
#[derive(Debug, Clone, PartialEq)]
pub struct Processor {
    name: String,
    applier: String,
    after: Vec<String>,
    before: Vec<String>,
    order: usize,
}

impl Processor {
    /// Create a processor with no dependencies
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            applier: util::applier_name(name),
            after: Vec::new(),
            before: Vec::new(),
            order: 0,
        }
    }

    /// Add an `after` dependency
    pub fn after(mut self, name: &str) -> Self {
        self.after.push(name.to_string());
        self
    }

    /// Add a `before` dependency
    pub fn before(mut self, name: &str) -> Self {
        self.before.push(name.to_string());
        self
    }

    /// Processor name, also the option key it consumes
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static method that consumes the option (`applyFoo`)
    pub fn applier(&self) -> &str {
        &self.applier
    }

    /// Processors this one runs after
    pub fn after_deps(&self) -> &[String] {
        &self.after
    }

    /// Processors this one runs before (empty once sorted)
    pub fn before_deps(&self) -> &[String] {
        &self.before
    }

    /// 1-based position once sorted, 0 before
    pub fn order(&self) -> usize {
        self.order
    }

    /// Copy for a subclass's own processor list
    fn inherit(&self) -> Self {
        Self {
            order: 0,
            ..self.clone()
        }
    }

    fn from_options(name: &str, options: &Value) -> MetaResult<Self> {
        let mut proc = Processor::new(name);
        match options {
            Value::Undefined | Value::Null | Value::Bool(false) | Value::Number(_) => {}
            Value::String(_) | Value::Array(_) => {
                proc.after = names_of(options, name)?;
            }
            Value::Record(record) => {
                proc.after = names_of(&record.get("after").unwrap_or_default(), name)?;
                proc.before = names_of(&record.get("before").unwrap_or_default(), name)?;
            }
            other => {
                return Err(MetaError::TypeError(format!(
                    "invalid dependencies for processor {}: {}",
                    name,
                    other.type_name()
                )))
            }
        }
        Ok(proc)
    }
}

fn names_of(value: &Value, processor: &str) -> MetaResult<Vec<String>> {
    util::to_list(value)
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Ok(s.to_string()),
            other => Err(MetaError::TypeError(format!(
                "processor {} depends on a non-name value: {}",
                processor,
                other.type_name()
            ))),
        })
        .collect()
}

/// Parse a `processors` option payload
///
/// Accepts a single name, a list of names, or a record mapping each name to
/// its dependencies: nothing (`null`/`0`), an `after` name or list, or a
/// record with `after` and/or `before`.
pub fn parse(declared: &Value) -> MetaResult<Vec<Processor>> {
    match declared {
        Value::Undefined | Value::Null => Ok(Vec::new()),
        Value::String(name) => Ok(vec![Processor::new(name)]),
        Value::Array(items) => items
            .to_vec()
            .iter()
            .map(|item| match item {
                Value::String(name) => Ok(Processor::new(name)),
                other => Err(MetaError::TypeError(format!(
                    "processor names must be strings, got {}",
                    other.type_name()
                ))),
            })
            .collect(),
        Value::Record(record) => record
            .entries()
            .iter()
            .map(|(name, options)| Processor::from_options(name, options))
            .collect(),
        other => Err(MetaError::TypeError(format!(
            "invalid processors option: {}",
            other.type_name()
        ))),
    }
}

/// Combine declared processors with inherited ones and sort them
pub fn decode(declared: &Value, inherited: &[Processor]) -> MetaResult<Vec<Processor>> {
    let declared = parse(declared)?;
    let mut list: Vec<Processor> = inherited.iter().map(Processor::inherit).collect();

    for proc in declared {
        match list.iter().position(|p| p.name == proc.name) {
            Some(index) => list[index] = proc,
            None => list.push(proc),
        }
    }

    sort(list)
}

/// Topologically sort processors by their dependencies
///
/// Fails with [`MetaError::CircularDependency`] on a cycle and with
/// [`MetaError::UnknownProcessor`] when a dependency names a missing step.
pub fn sort(mut processors: Vec<Processor>) -> MetaResult<Vec<Processor>> {
    let index: FxHashMap<String, usize> = processors
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.clone(), i))
        .collect();

    // Desugar "before" into "after" edges on the referenced processor
    for i in 0..processors.len() {
        let before = std::mem::take(&mut processors[i].before);
        let name = processors[i].name.clone();

        for target in before {
            let &j = index.get(&target).ok_or_else(|| MetaError::UnknownProcessor {
                processor: name.clone(),
                relation: "before".to_string(),
                target: target.clone(),
            })?;
            if !processors[j].after.contains(&name) {
                processors[j].after.push(name.clone());
            }
        }
    }

    let mut visited = FxHashSet::default();
    let mut rec_stack = FxHashSet::default();
    let mut path = Vec::new();
    let mut sorted = Vec::with_capacity(processors.len());

    for i in 0..processors.len() {
        visit(
            &processors,
            &index,
            i,
            &mut visited,
            &mut rec_stack,
            &mut path,
            &mut sorted,
        )?;
    }

    Ok(sorted
        .into_iter()
        .enumerate()
        .map(|(position, i)| {
            let mut proc = processors[i].clone();
            proc.order = position + 1;
            proc
        })
        .collect())
}

fn visit(
    processors: &[Processor],
    index: &FxHashMap<String, usize>,
    node: usize,
    visited: &mut FxHashSet<usize>,
    rec_stack: &mut FxHashSet<usize>,
    path: &mut Vec<String>,
    sorted: &mut Vec<usize>,
) -> MetaResult<()> {
    if visited.contains(&node) {
        return Ok(());
    }

    let proc = &processors[node];
    path.push(proc.name.clone());

    if rec_stack.contains(&node) {
        return Err(MetaError::CircularDependency { path: path.clone() });
    }

    rec_stack.insert(node);
    for dep in &proc.after {
        let &next = index.get(dep).ok_or_else(|| MetaError::UnknownProcessor {
            processor: proc.name.clone(),
            relation: "after".to_string(),
            target: dep.clone(),
        })?;
        visit(processors, index, next, visited, rec_stack, path, sorted)?;
    }
    rec_stack.remove(&node);

    path.pop();
    visited.insert(node);
    sorted.push(node);
    Ok(())
}
