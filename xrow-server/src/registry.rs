//! Method registry
//!
//! Maps public method names to handlers and their parameter shapes. A
//! registry is built once for a handler set and then shared read-only; clones
//! share the same table.
//!
//! # Naming
//!
//! Methods are registered under their Rust-side name. Only names carrying the
//! registry prefix (`rpc_` by default) are callable, and the prefix is
//! stripped: `rpc_add` is published as `add`. Other names are skipped, which
//! lets a handler set register helpers without exposing them.
//! [`MethodRegistry::register_as`] publishes a name verbatim, including names
//! such as `nested.test` that no Rust identifier can spell.
//!
//! # Inheritance
//!
//! A derived handler set starts from a copy of its base registry and adds or
//! overrides entries by public name. The base is never modified.
//!
//! ```rust
//! use xrow_server::{from_sync_fn, MethodDef, MethodRegistry, ParamShape, Value};
//!
//! let mut base = MethodRegistry::new();
//! base.register("rpc_version", MethodDef::new(
//!     ParamShape::new(),
//!     from_sync_fn(|_, _| Ok(Value::from("1.0"))),
//! ));
//! base.register("helper", MethodDef::new(
//!     ParamShape::new(),
//!     from_sync_fn(|_, _| Ok(Value::Null)),
//! ));
//!
//! let derived = MethodRegistry::builder()
//!     .inherit(&base)
//!     .method("rpc_version", MethodDef::new(
//!         ParamShape::new(),
//!         from_sync_fn(|_, _| Ok(Value::from("2.0"))),
//!     ))
//!     .build();
//!
//! assert_eq!(base.methods(), vec!["version".to_string()]);
//! assert!(derived.lookup("version").is_ok());
//! assert!(derived.lookup("helper").is_err());
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use xrow_core::{RpcError, Value};

use crate::handler::{self, Args, Handler, Kwargs};

/// What kinds of arguments a method accepts
///
/// The dispatcher consults the shape to decide whether a trailing struct is
/// passed as keyword arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamShape {
    pub accepts_variadic_positional: bool,
    pub accepts_variadic_keyword: bool,
    pub keyword_only_names: BTreeSet<String>,
}

impl ParamShape {
    /// Fixed positional parameters only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variadic_positional(mut self, accepts: bool) -> Self {
        self.accepts_variadic_positional = accepts;
        self
    }

    pub fn variadic_keyword(mut self, accepts: bool) -> Self {
        self.accepts_variadic_keyword = accepts;
        self
    }

    pub fn keyword_only(mut self, names: &[&str]) -> Self {
        self.keyword_only_names
            .extend(names.iter().map(|name| name.to_string()));
        self
    }

    /// Whether a trailing struct should become keyword arguments
    pub fn takes_keywords(&self) -> bool {
        self.accepts_variadic_keyword || !self.keyword_only_names.is_empty()
    }
}

/// A handler together with its parameter shape
#[derive(Clone)]
pub struct MethodDef {
    rust_name: Option<&'static str>,
    public_name: Option<String>,
    shape: ParamShape,
    handler: Arc<dyn Handler>,
}

impl MethodDef {
    pub fn new(shape: ParamShape, handler: Box<dyn Handler>) -> Self {
        Self {
            rust_name: None,
            public_name: None,
            shape,
            handler: Arc::from(handler),
        }
    }

    pub fn from_fn<F, Fut>(shape: ParamShape, func: F) -> Self
    where
        F: Fn(Args, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        Self::new(shape, handler::from_fn(func))
    }

    pub fn from_sync_fn<F>(shape: ParamShape, func: F) -> Self
    where
        F: Fn(Args, Kwargs) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        Self::new(shape, handler::from_sync_fn(func))
    }

    /// Rust-side name, used by [`MethodRegistry::add`]
    pub fn with_rust_name(mut self, name: &'static str) -> Self {
        self.rust_name = Some(name);
        self
    }

    /// Public name that bypasses the prefix rule
    pub fn with_public_name(mut self, name: impl Into<String>) -> Self {
        self.public_name = Some(name.into());
        self
    }

    pub fn shape(&self) -> &ParamShape {
        &self.shape
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("rust_name", &self.rust_name)
            .field("public_name", &self.public_name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct MethodRegistry {
    prefix: String,
    entries: Arc<HashMap<String, MethodDef>>,
}

impl MethodRegistry {
    pub const DEFAULT_PREFIX: &'static str = "rpc_";

    pub fn new() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Arc::new(HashMap::new()),
        }
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register under a Rust-side name, subject to the prefix rule
    ///
    /// Returns whether the method was published. A definition carrying an
    /// explicit public name is published under that name instead.
    pub fn register(&mut self, rust_name: &str, def: MethodDef) -> bool {
        if let Some(public) = def.public_name.clone() {
            return self.register_as(public, def);
        }
        match rust_name.strip_prefix(self.prefix.as_str()) {
            Some(public) if !public.is_empty() => self.register_as(public, def),
            _ => {
                tracing::debug!(name = %rust_name, prefix = %self.prefix, "Skipping non-RPC name");
                false
            }
        }
    }

    /// Register a definition produced by `#[method]`
    pub fn add(&mut self, def: MethodDef) -> bool {
        match def.rust_name {
            Some(rust_name) => self.register(rust_name, def),
            None => match def.public_name.clone() {
                Some(public) => self.register_as(public, def),
                None => {
                    tracing::warn!("Method definition has no name, skipping");
                    false
                }
            },
        }
    }

    /// Publish under `public_name` verbatim, replacing any previous entry
    pub fn register_as(&mut self, public_name: impl Into<String>, def: MethodDef) -> bool {
        let public_name = public_name.into();
        tracing::debug!(method = %public_name, "Registering method");
        Arc::make_mut(&mut self.entries).insert(public_name, def);
        true
    }

    /// Copy the entries of `base` this registry does not define yet
    ///
    /// Entries already present win, whether they were registered before or
    /// after the call.
    pub fn inherit(&mut self, base: &MethodRegistry) {
        let entries = Arc::make_mut(&mut self.entries);
        for (name, def) in base.entries.iter() {
            entries
                .entry(name.clone())
                .or_insert_with(|| def.clone());
        }
    }

    pub fn lookup(&self, method: &str) -> Result<&MethodDef, RpcError> {
        self.entries
            .get(method)
            .ok_or_else(|| RpcError::method_not_found(method))
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// Public names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("prefix", &self.prefix)
            .field("methods", &self.methods())
            .finish()
    }
}

/// Fluent construction of a [`MethodRegistry`]
pub struct RegistryBuilder {
    registry: MethodRegistry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: MethodRegistry::new(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.registry.prefix = prefix.into();
        self
    }

    pub fn inherit(mut self, base: &MethodRegistry) -> Self {
        self.registry.inherit(base);
        self
    }

    pub fn method(mut self, rust_name: &str, def: MethodDef) -> Self {
        self.registry.register(rust_name, def);
        self
    }

    pub fn method_as(mut self, public_name: impl Into<String>, def: MethodDef) -> Self {
        self.registry.register_as(public_name, def);
        self
    }

    pub fn add(mut self, def: MethodDef) -> Self {
        self.registry.add(def);
        self
    }

    pub fn build(self) -> MethodRegistry {
        self.registry
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
