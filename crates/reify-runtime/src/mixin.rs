//! Mixin application
//!
//! `mixin(Base, [M1, M2])` builds the chain
//!
//! ```text
//! Base&M1&M2 -> Base&M1 -> Base
//! ```
//!
//! Each link is an ordinary class whose member table is a copy of the
//! mixin's own members, whose supertype is the previous link and which
//! implements the mixin's type. Lookup therefore finds the last mixin
//! first. Copied methods keep their original function objects, so member
//! signatures registered on the mixin still apply, while the holder passed
//! to a running method is the application class, which lets
//! [`Runtime::super_send`] continue past it.

use crate::class::{find_method, ClassDef, ClassRef, GetTarget};
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::{Args, Invocation};
use crate::value::Value;
use reify_types::ClassDescriptor;
use std::sync::Arc;

impl Runtime {
    /// Apply `mixins` to `base` in order (`dart.mixin`)
    pub fn mixin(&self, base: &ClassRef, mixins: &[ClassRef]) -> RtResult<ClassRef> {
        mixins
            .iter()
            .try_fold(base.clone(), |current, mixin| self.apply_mixin(&current, mixin))
    }

    fn apply_mixin(&self, base: &ClassRef, mixin: &ClassRef) -> RtResult<ClassRef> {
        let key = (base.type_id(), mixin.type_id());
        let mut applications = self.mixin_apps.lock();
        if let Some(existing) = applications.get(&key) {
            return Ok(existing.clone());
        }

        let name = format!("{}&{}", base.name(), mixin.name());
        let descriptor = ClassDescriptor::new(base.library(), name.clone())
            .extends(base.type_id())
            .implements(mixin.type_id());
        let type_id = self.register_class(descriptor)?;
        tracing::debug!(class = %name, "applied mixin");

        let application = Arc::new(ClassDef {
            type_id,
            library: base.library().to_string(),
            name,
            superclass: Some(base.clone()),
            fields: mixin.fields.clone(),
            getters: mixin.getters.clone(),
            setters: mixin.setters.clone(),
            methods: mixin.methods.clone(),
        });
        applications.insert(key, application.clone());
        Ok(application)
    }

    /// `super.name(args)` from inside a running method
    ///
    /// Lookup starts at the superclass of the class that supplied the
    /// running method; past the root it falls back to the members every
    /// object has.
    pub fn super_send(&self, invocation: &Invocation, name: &str, args: Args) -> RtResult<Value> {
        let holder = invocation
            .holder
            .as_ref()
            .ok_or_else(|| RuntimeError::State(format!("super.{} used outside a method", name)))?;
        let this = &invocation.this;

        let Some(superclass) = holder.superclass() else {
            return self.object_member(this, name, args);
        };
        match superclass.lookup_get(name) {
            Some(GetTarget::Method(_)) => match find_method(superclass, name) {
                Some((owner, method)) => self.invoke_function(&method, this.clone(), args, Some(owner)),
                None => Err(RuntimeError::no_such_method(name, superclass.name())),
            },
            Some(GetTarget::Getter(getter)) => {
                let callee = getter(self, this)?;
                self.dcall(&callee, args)
            }
            Some(GetTarget::Field(field)) => {
                let callee = self.dload(this, &field.name)?;
                self.dcall(&callee, args)
            }
            None => self.object_member(this, name, args),
        }
    }

    /// `super.name` read from inside a running method
    ///
    /// Past the root, `hashCode` and `runtimeType` read as values and
    /// `toString` and `==` tear off as closures bound to the receiver.
    pub fn super_get(&self, invocation: &Invocation, name: &str) -> RtResult<Value> {
        let holder = invocation
            .holder
            .as_ref()
            .ok_or_else(|| RuntimeError::State(format!("super.{} used outside a method", name)))?;
        let this = &invocation.this;
        match holder.superclass().and_then(|s| s.lookup_get(name)) {
            Some(GetTarget::Getter(getter)) => getter(self, this),
            Some(GetTarget::Field(field)) => self.dload(this, &field.name),
            Some(GetTarget::Method(method)) => Ok(Value::Function(Arc::new(method.bind(this.clone())))),
            None => match name {
                "hashCode" | "runtimeType" => self.object_member(this, name, Args::none()),
                "toString" | "==" => {
                    let receiver = this.clone();
                    let member = name.to_string();
                    Ok(self.closure(name, move |rt, inv| {
                        rt.object_member(&receiver, &member, Args::positional(inv.positional))
                    }))
                }
                _ => Err(RuntimeError::no_such_method(name, self.value_type_name(this))),
            },
        }
    }

    /// Members inherited from `Object`, without user overrides
    fn object_member(&self, this: &Value, name: &str, args: Args) -> RtResult<Value> {
        match name {
            "toString" => Ok(Value::string(match this {
                Value::Object(instance) => format!("Instance of '{}'", instance.class().name()),
                other => self.to_dart_string(other)?,
            })),
            "==" => Ok(Value::Bool(
                this.identical(&args.positional.first().cloned().unwrap_or_default()),
            )),
            "hashCode" => Ok(Value::int(self.identity_hash(this))),
            "runtimeType" => Ok(Value::Type(self.runtime_type(this))),
            _ => Err(RuntimeError::no_such_method(name, self.value_type_name(this))),
        }
    }
}
