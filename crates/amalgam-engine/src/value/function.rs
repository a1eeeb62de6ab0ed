//! Native functions and their invocation context

use std::fmt;
use std::rc::{Rc, Weak};

use once_cell::unsync::OnceCell;

use crate::class::Class;
use crate::error::{MetaError, MetaResult};
use crate::instance::Instance;
use crate::meta::{Meta, Side};
use crate::value::Value;

/// Signature of a native function body
pub type NativeFn = dyn Fn(&Invocation<'_>) -> MetaResult<Value>;

/// A named, callable member
///
/// Functions compare by identity. The declared owner is the class whose
/// member table first received the function; it is the home class for
/// super calls made from inside the body.
#[derive(Clone)]
pub struct Function(Rc<FunctionData>);

struct FunctionData {
    name: Rc<str>,
    body: Box<NativeFn>,
    junction: bool,
    owner: OnceCell<Weak<Meta>>,
}

impl Function {
    /// Create a plain function
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> MetaResult<Value> + 'static,
    {
        Self::build(name, Box::new(body), false)
    }

    /// Create a junction method: its super call also runs every same-named
    /// method contributed by mixins of the owning class
    pub fn junction<F>(name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> MetaResult<Value> + 'static,
    {
        Self::build(name, Box::new(body), true)
    }

    fn build(name: &str, body: Box<NativeFn>, junction: bool) -> Self {
        Function(Rc::new(FunctionData {
            name: Rc::from(name),
            body,
            junction,
            owner: OnceCell::new(),
        }))
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether this function was declared as a junction
    pub fn is_junction(&self) -> bool {
        self.0.junction
    }

    /// Declared owner, if tagged and still alive
    pub fn owner(&self) -> Option<Class> {
        self.0.owner.get().and_then(Weak::upgrade).map(Class)
    }

    /// Tag the declared owner unless one is already set. Returns true if
    /// this call set it.
    pub(crate) fn tag_owner(&self, class: &Class) -> bool {
        self.0.owner.set(Rc::downgrade(&class.0)).is_ok()
    }

    /// Check whether the declared owner is `class`
    pub(crate) fn is_owned_by(&self, class: &Class) -> bool {
        self.0
            .owner
            .get()
            .is_some_and(|owner| std::ptr::eq(owner.as_ptr(), Rc::as_ptr(&class.0)))
    }

    /// Invoke with an explicit receiver
    pub fn call(&self, this: &Value, args: &[Value]) -> MetaResult<Value> {
        let inv = Invocation {
            this,
            args,
            callee: self,
        };
        (self.0.body)(&inv)
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("junction", &self.is_junction())
            .finish()
    }
}

/// Receiver, arguments and callee of a running function
pub struct Invocation<'a> {
    this: &'a Value,
    args: &'a [Value],
    callee: &'a Function,
}

impl<'a> Invocation<'a> {
    /// The receiver: an instance for prototype members, a class for statics
    pub fn this(&self) -> &Value {
        self.this
    }

    /// All positional arguments
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Argument at `index`, or `undefined`
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// The running function
    pub fn callee(&self) -> &Function {
        self.callee
    }

    /// Receiver as an instance
    pub fn instance(&self) -> MetaResult<&Instance> {
        self.this.as_instance().ok_or_else(|| {
            MetaError::TypeError(format!(
                "{} expects an instance receiver, got {}",
                self.callee.name(),
                self.this.type_name()
            ))
        })
    }

    /// Receiver as a class
    pub fn class(&self) -> MetaResult<&Class> {
        self.this.as_class().ok_or_else(|| {
            MetaError::TypeError(format!(
                "{} expects a class receiver, got {}",
                self.callee.name(),
                self.this.type_name()
            ))
        })
    }

    /// Read a property of the receiver
    pub fn get(&self, name: &str) -> MetaResult<Value> {
        match self.this {
            Value::Instance(inst) => inst.get(name),
            Value::Class(class) => class.get(name),
            other => Err(MetaError::TypeError(format!(
                "cannot read {} of {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// Write a property of the receiver
    pub fn set(&self, name: &str, value: impl Into<Value>) -> MetaResult<()> {
        match self.this {
            Value::Instance(inst) => inst.set(name, value),
            Value::Class(class) => class.set(name, value),
            other => Err(MetaError::TypeError(format!(
                "cannot write {} of {}",
                name,
                other.type_name()
            ))),
        }
    }

    /// Call a method on the receiver
    pub fn call(&self, name: &str, args: &[Value]) -> MetaResult<Value> {
        match self.this {
            Value::Instance(inst) => inst.call(name, args),
            Value::Class(class) => class.call(name, args),
            other => Err(MetaError::NoSuchMethod {
                receiver: other.type_name().to_string(),
                method: name.to_string(),
            }),
        }
    }

    /// Call the super implementation of the running function
    pub fn call_super(&self, args: &[Value]) -> MetaResult<Value> {
        self.call_super_method(self.callee.name(), args)
    }

    /// Call `name` as resolved from the superclass of the running
    /// function's home class
    pub fn call_super_method(&self, name: &str, args: &[Value]) -> MetaResult<Value> {
        let side = match self.this {
            Value::Class(_) => Side::Static,
            _ => Side::Instance,
        };
        let home = self.callee.owner().ok_or_else(|| MetaError::NoSuchMethod {
            receiver: "super of an unowned function".to_string(),
            method: name.to_string(),
        })?;

        let found = home
            .super_lookup(side, name)
            .and_then(|member| member.as_function().cloned());

        match found {
            Some(func) => func.call(self.this, args),
            None => Err(MetaError::NoSuchMethod {
                receiver: format!("super of {}", home.name()),
                method: name.to_string(),
            }),
        }
    }
}
