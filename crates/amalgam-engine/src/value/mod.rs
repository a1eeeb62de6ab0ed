//! Dynamic values
//!
//! Classes, instances and config defaults all traffic in [`Value`]. Primitive
//! variants compare by value; every reference-typed variant compares by
//! identity, which is what the config setter's change check relies on.

mod function;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::class::Class;
use crate::config::ConfigMeta;
use crate::instance::Instance;

pub use function::{Function, Invocation, NativeFn};

/// Insertion-ordered property map backing [`Record`]
pub type PropertyMap = IndexMap<String, Value, FxBuildHasher>;

/// A dynamic value
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// IEEE 754 double
    Number(f64),
    /// Immutable string
    String(Rc<str>),
    /// Shared, mutable list
    Array(Array),
    /// Shared, mutable plain record
    Record(Record),
    /// Shared, mutable date (milliseconds since the epoch)
    Date(Date),
    /// Callable
    Function(Function),
    /// Class handle
    Class(Class),
    /// Class instance
    Instance(Instance),
    /// Value annotated with config metadata (see [`ConfigMeta::wrap`])
    Tagged(Rc<Tagged>),
}

/// A config declaration carrying annotation metadata
pub struct Tagged {
    /// The annotations
    pub meta: ConfigMeta,
    /// The declared value
    pub value: Value,
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    /// `===` semantics
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Record(a), Value::Record(b)) => a.ptr_eq(b),
            (Value::Date(a), Value::Date(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Class(a), Value::Class(b)) => a.ptr_eq(b),
            (Value::Instance(a), Value::Instance(b)) => a.ptr_eq(b),
            (Value::Tagged(a), Value::Tagged(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality: arrays, records and dates compare by content
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.to_vec(), b.to_vec());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.entries(), b.entries());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter()
                            .find(|(bk, _)| bk == k)
                            .is_some_and(|(_, bv)| v.deep_eq(bv))
                    })
            }
            (Value::Date(a), Value::Date(b)) => a.time() == b.time(),
            _ => self.strict_eq(other),
        }
    }

    /// `null` or `undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Check for `undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// `typeof value === 'object'` for non-null values
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Record(_) | Value::Date(_) | Value::Instance(_) | Value::Tagged(_)
        )
    }

    /// Runtime type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Date(_) => "date",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Tagged(_) => "tagged",
        }
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as array handle
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as record handle
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Get as date handle
    pub fn as_date(&self) -> Option<&Date> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Get as function
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Get as class handle
    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Value::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Get as instance
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Get as tagged declaration
    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Value::Tagged(t) => Some(t),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(_) => write!(f, "{}", self),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(a) => f.debug_list().entries(a.to_vec()).finish(),
            Value::Record(r) => f.debug_map().entries(r.entries()).finish(),
            Value::Date(d) => write!(f, "Date({})", d.time()),
            Value::Function(func) => write!(f, "[Function {}]", func.name()),
            Value::Class(c) => write!(f, "[Class {}]", c.name()),
            Value::Instance(i) => write!(f, "[{} instance]", i.class().name()),
            Value::Tagged(t) => write!(f, "Tagged({:?}, {:?})", t.meta, t.value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Array(a) => {
                let parts: Vec<String> = a.to_vec().iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Value::Record(_) => write!(f, "[object Object]"),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Array::from_vec(items))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Self {
        Value::Date(d)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl From<Class> for Value {
    fn from(c: Class) -> Self {
        Value::Class(c)
    }
}

impl From<&Class> for Value {
    fn from(c: &Class) -> Self {
        Value::Class(c.clone())
    }
}

impl From<Instance> for Value {
    fn from(i: Instance) -> Self {
        Value::Instance(i)
    }
}

/// Shared, mutable list
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

impl Array {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a vector
    pub fn from_vec(items: Vec<Value>) -> Self {
        Array(Rc::new(RefCell::new(items)))
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Append an element
    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Snapshot of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared, mutable, insertion-ordered plain record
#[derive(Clone, Default)]
pub struct Record(Rc<RefCell<PropertyMap>>);

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, if present
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Insert or replace `key`
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Remove `key`, preserving the order of the remaining keys
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    /// Check if `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// New record with the same entries (values are shared)
    pub fn shallow_clone(&self) -> Record {
        Record(Rc::new(RefCell::new(self.0.borrow().clone())))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map: PropertyMap = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Record(Rc::new(RefCell::new(map)))
    }
}

/// Shared, mutable date
#[derive(Clone)]
pub struct Date(Rc<Cell<f64>>);

impl Date {
    /// Date at `millis` since the Unix epoch
    pub fn new(millis: f64) -> Self {
        Date(Rc::new(Cell::new(millis)))
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as f64)
            .unwrap_or(0.0);
        Date::new(millis)
    }

    /// Milliseconds since the epoch
    pub fn time(&self) -> f64 {
        self.0.get()
    }

    /// Set milliseconds since the epoch
    pub fn set_time(&self, millis: f64) {
        self.0.set(millis);
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Date) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
