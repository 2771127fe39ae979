//! Runtime signatures and argument binding
//!
//! A signature describes what a function accepts at runtime: required
//! positional types, optional positional parameters or named parameters
//! (never both) with default thunks, and the return type. Binding a call
//! validates the supplied arguments and fills omitted parameters by running
//! their default thunks, so defaults are computed at call time.

use crate::class::ClassRef;
use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::function::{Args, FunctionObject, FunctionRef, Invocation, SignatureKey};
use crate::value::Value;
use reify_types::{FunctionType, NamedParam, TypeId};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Computes a parameter default when the argument is omitted
pub type DefaultThunk = Arc<dyn Fn() -> Value + Send + Sync>;

fn null_default() -> DefaultThunk {
    Arc::new(|| Value::Null)
}

/// Optional positional parameter
#[derive(Clone)]
pub struct OptionalParam {
    /// Declared type
    pub ty: TypeId,
    /// Default used when omitted
    pub default: DefaultThunk,
}

/// Named parameter
#[derive(Clone)]
pub struct NamedParamSpec {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: TypeId,
    /// Default used when omitted
    pub default: DefaultThunk,
}

/// Runtime signature of a function or member
#[derive(Clone)]
pub struct SignatureEntry {
    required: Vec<TypeId>,
    optional: Vec<OptionalParam>,
    named: Vec<NamedParamSpec>,
    returns: TypeId,
}

impl SignatureEntry {
    /// Start a signature with the given return type
    pub fn builder(returns: TypeId) -> SignatureBuilder {
        SignatureBuilder {
            entry: SignatureEntry {
                required: Vec::new(),
                optional: Vec::new(),
                named: Vec::new(),
                returns,
            },
        }
    }

    /// Signature equivalent to a structural function type (null defaults)
    pub fn from_function_type(ty: &FunctionType) -> Self {
        SignatureEntry {
            required: ty.required.clone(),
            optional: ty
                .optional
                .iter()
                .map(|&ty| OptionalParam {
                    ty,
                    default: null_default(),
                })
                .collect(),
            named: ty
                .named
                .iter()
                .map(|p| NamedParamSpec {
                    name: p.name.clone(),
                    ty: p.ty,
                    default: null_default(),
                })
                .collect(),
            returns: ty.returns,
        }
    }

    /// Declared return type
    pub fn returns(&self) -> TypeId {
        self.returns
    }

    /// Required positional parameter types
    pub fn required(&self) -> &[TypeId] {
        &self.required
    }

    /// Structural function type of this signature
    pub fn function_type(&self) -> FunctionType {
        FunctionType::new(self.returns, self.required.clone())
            .with_optional(self.optional.iter().map(|p| p.ty).collect())
            .with_named(
                self.named
                    .iter()
                    .map(|p| NamedParam {
                        name: p.name.clone(),
                        ty: p.ty,
                    })
                    .collect(),
            )
    }

    /// Validate call-site arguments and fill omitted parameters
    pub(crate) fn bind(&self, rt: &Runtime, callee: &str, this: Value, args: Args) -> RtResult<Invocation> {
        let Args {
            mut positional,
            mut named,
        } = args;

        let max = self.required.len() + self.optional.len();
        if positional.len() < self.required.len() || positional.len() > max {
            let expected = if self.optional.is_empty() {
                self.required.len().to_string()
            } else {
                format!("{} to {}", self.required.len(), max)
            };
            return Err(RuntimeError::Argument(format!(
                "{}: expected {} positional arguments, got {}",
                callee,
                expected,
                positional.len()
            )));
        }

        if let Some(unknown) = named.keys().find(|k| !self.named.iter().any(|p| &p.name == *k)) {
            return Err(RuntimeError::Argument(format!(
                "{}: no named parameter '{}'",
                callee, unknown
            )));
        }

        for (index, value) in positional.iter().enumerate() {
            let ty = match self.required.get(index) {
                Some(&ty) => ty,
                None => self.optional[index - self.required.len()].ty,
            };
            self.check_argument(rt, callee, &index.to_string(), value, ty)?;
        }
        for param in &self.named {
            if let Some(value) = named.get(&param.name) {
                self.check_argument(rt, callee, &param.name, value, param.ty)?;
            }
        }

        for param in &self.optional[positional.len() - self.required.len()..] {
            positional.push((param.default)());
        }
        for param in &self.named {
            if !named.contains_key(&param.name) {
                named.insert(param.name.clone(), (param.default)());
            }
        }

        Ok(Invocation {
            this,
            positional,
            named,
            holder: None,
        })
    }

    fn check_argument(&self, rt: &Runtime, callee: &str, slot: &str, value: &Value, ty: TypeId) -> RtResult<()> {
        if value.is_null() || rt.is_(value, ty) {
            return Ok(());
        }
        Err(RuntimeError::Argument(format!(
            "{}: argument '{}' of type {} is not a {}",
            callee,
            slot,
            rt.value_type_name(value),
            rt.type_name(ty)
        )))
    }
}

impl fmt::Debug for SignatureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureEntry")
            .field("required", &self.required)
            .field("optional", &self.optional.iter().map(|p| p.ty).collect::<Vec<_>>())
            .field("named", &self.named.iter().map(|p| &p.name).collect::<Vec<_>>())
            .field("returns", &self.returns)
            .finish()
    }
}

/// Builder for [`SignatureEntry`]
pub struct SignatureBuilder {
    entry: SignatureEntry,
}

impl SignatureBuilder {
    /// Add a required positional parameter
    pub fn required(mut self, ty: TypeId) -> Self {
        self.entry.required.push(ty);
        self
    }

    /// Add an optional positional parameter with a default thunk
    pub fn optional<F>(mut self, ty: TypeId, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.entry.optional.push(OptionalParam {
            ty,
            default: Arc::new(default),
        });
        self
    }

    /// Add a named parameter with a default thunk
    pub fn named<F>(mut self, name: impl Into<String>, ty: TypeId, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.entry.named.push(NamedParamSpec {
            name: name.into(),
            ty,
            default: Arc::new(default),
        });
        self
    }

    /// Finish; fails when optional positional and named parameters are mixed
    pub fn build(mut self) -> RtResult<SignatureEntry> {
        if !self.entry.optional.is_empty() && !self.entry.named.is_empty() {
            return Err(RuntimeError::Argument(
                "a signature cannot have both optional positional and named parameters".to_string(),
            ));
        }
        self.entry.named.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(self.entry)
    }
}

/// Signatures attached to functions and class members
#[derive(Debug, Default)]
pub struct SignatureRegistry {
    entries: FxHashMap<SignatureKey, Arc<SignatureEntry>>,
}

impl SignatureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach (or replace) a signature
    pub fn insert(&mut self, key: SignatureKey, entry: SignatureEntry) {
        self.entries.insert(key, Arc::new(entry));
    }

    /// Signature registered under `key`
    pub fn get(&self, key: &SignatureKey) -> Option<Arc<SignatureEntry>> {
        self.entries.get(key).cloned()
    }

    /// Number of registered signatures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no signature is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a call to a function is validated
enum Binding {
    Signature(Arc<SignatureEntry>),
    Unchecked,
}

impl Runtime {
    /// Attach a signature to a function value (`dart.setSignature`)
    pub fn set_signature(&self, function: &Value, entry: SignatureEntry) -> RtResult<()> {
        let Value::Function(func) = function else {
            return Err(RuntimeError::Argument(format!(
                "cannot attach a signature to {}",
                self.value_type_name(function)
            )));
        };
        self.signatures.write().insert(func.sig_key().clone(), entry);
        Ok(())
    }

    /// Attach a signature to a class member
    pub fn set_member_signature(&self, class: &ClassRef, name: &str, entry: SignatureEntry) -> RtResult<()> {
        if !class.methods.contains_key(name) {
            return Err(RuntimeError::no_such_method(name, class.name()));
        }
        self.signatures
            .write()
            .insert(SignatureKey::Member(class.type_id(), name.to_string()), entry);
        Ok(())
    }

    /// Signature attached to a function, if any
    pub fn signature_of(&self, func: &FunctionObject) -> Option<Arc<SignatureEntry>> {
        self.signatures.read().get(func.sig_key())
    }

    fn binding_for(&self, func: &FunctionObject) -> Binding {
        if let Some(entry) = self.signature_of(func) {
            return Binding::Signature(entry);
        }
        let typed = self.with_types(|types| types.get(func.ty()).and_then(|t| t.as_function()).cloned());
        match typed {
            Some(ty) => Binding::Signature(Arc::new(SignatureEntry::from_function_type(&ty))),
            None => Binding::Unchecked,
        }
    }

    /// Call a function with validation, defaults and return checking
    pub(crate) fn invoke_function(
        &self,
        func: &FunctionRef,
        this: Value,
        args: Args,
        holder: Option<ClassRef>,
    ) -> RtResult<Value> {
        let (invocation, returns) = match self.binding_for(func) {
            Binding::Signature(entry) => (entry.bind(self, func.name(), this, args)?, Some(entry.returns())),
            Binding::Unchecked => (
                Invocation {
                    this,
                    positional: args.positional,
                    named: args.named,
                    holder: None,
                },
                None,
            ),
        };
        let invocation = Invocation { holder, ..invocation };

        let result = (func.body())(self, invocation)?;
        match returns {
            Some(ty) => self.check(result, ty),
            None => Ok(result),
        }
    }

    /// `Function.apply`
    pub fn apply(&self, function: &Value, positional: Vec<Value>, named: BTreeMap<String, Value>) -> RtResult<Value> {
        self.dcall(function, Args { positional, named })
    }
}
