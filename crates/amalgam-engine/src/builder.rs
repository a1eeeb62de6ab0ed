//! Builder for declaring a subclass with its body in one expression

use crate::class::Class;
use crate::error::MetaResult;
use crate::meta::{Member, Side};
use crate::value::{Function, Invocation, Record, Value};

/// Builder for a subclass: body members plus class options
pub struct ClassBuilder {
    /// Class name
    name: String,
    /// Superclass to extend
    superclass: Class,
    /// Body members, in declaration order
    members: Vec<(Side, String, Member)>,
    /// Options passed to [`Class::define`]
    options: Record,
}

impl ClassBuilder {
    /// Create a builder for a subclass of `superclass`
    pub fn new(name: &str, superclass: &Class) -> Self {
        Self {
            name: name.to_string(),
            superclass: superclass.clone(),
            members: Vec::new(),
            options: Record::new(),
        }
    }

    /// Add an instance method
    pub fn method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> MetaResult<Value> + 'static,
    {
        self.member(Side::Instance, name, Member::value(Function::new(name, body)))
    }

    /// Add an instance junction method
    pub fn junction<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> MetaResult<Value> + 'static,
    {
        self.member(Side::Instance, name, Member::value(Function::junction(name, body)))
    }

    /// Add a static method
    pub fn static_method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> MetaResult<Value> + 'static,
    {
        self.member(Side::Static, name, Member::value(Function::new(name, body)))
    }

    /// Add a static junction method
    pub fn static_junction<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> MetaResult<Value> + 'static,
    {
        self.member(Side::Static, name, Member::value(Function::junction(name, body)))
    }

    /// Add a static data member
    pub fn static_value(self, name: &str, value: impl Into<Value>) -> Self {
        self.member(Side::Static, name, Member::value(value))
    }

    /// Add a prototype data member
    pub fn prototype_value(self, name: &str, value: impl Into<Value>) -> Self {
        self.member(Side::Instance, name, Member::value(value))
    }

    /// Add an arbitrary member
    pub fn member(mut self, side: Side, name: &str, member: Member) -> Self {
        self.members.push((side, name.to_string(), member));
        self
    }

    /// Set one class option
    pub fn option(self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Set every class option from `options`
    pub fn define(self, options: Record) -> Self {
        for (key, value) in options.entries() {
            self.options.insert(key, value);
        }
        self
    }

    /// Create the subclass, install its body, then process its options
    pub fn build(self) -> MetaResult<Class> {
        let class = self.superclass.extend(&self.name);
        for (side, name, member) in self.members {
            class.define_member(side, &name, member)?;
        }
        class.define(self.options)
    }
}

#[cfg(test)]
mod tests {
    use crate::meta::Side;
    use crate::runtime::Runtime;
    use crate::value::Value;

    #[test]
    fn test_build_installs_members_and_options() {
        let rt = Runtime::new().unwrap();
        let class = rt
            .base()
            .builder("Point")
            .method("norm", |inv| {
                let x = inv.get("x")?.as_number().unwrap_or(0.0);
                Ok(Value::from(x.abs()))
            })
            .static_value("dims", 2)
            .option("chains", "init")
            .build()
            .unwrap();

        assert!(class.has_own_member(Side::Instance, "norm"));
        assert_eq!(class.get("dims").unwrap(), Value::from(2));
        assert!(class.is_chain("init"));
        assert!(class.superclass().unwrap().ptr_eq(rt.base()));
    }
}
