//! Exception kinds and the fault-code registry
//!
//! An XML-RPC fault carries nothing but an integer code and a string. On the
//! Rust side an error is an [`RpcError`]: a [`FaultKind`] plus a message. The
//! [`FaultRegistry`] translates between the two.
//!
//! # Taxonomy
//!
//! Kinds form a tree rooted at [`FaultKind::BASE`]. Codes are attached to
//! some kinds; encoding an error walks from its kind towards the root and uses
//! the first code it finds, so a custom kind derived from `ServerError` is sent
//! as `-32603` without being registered itself.
//!
//! | Kind | Code | Parent |
//! |------|------|--------|
//! | `XmlRpcError` | (fallback `-32500`) | |
//! | `ParseError` | -32700 | `XmlRpcError` |
//! | `UnsupportedEncodingError` | -32701 | `ParseError` |
//! | `InvalidCharacterError` | -32702 | `ParseError` |
//! | `ServerError` | -32603 | `XmlRpcError` |
//! | `InvalidData` | -32600 | `ServerError` |
//! | `MethodNotFound` | -32601 | `ServerError` |
//! | `InvalidArguments` | -32602 | `ServerError` |
//! | `ApplicationError` | -32500 | `XmlRpcError` |
//! | `SystemError` | -32400 | `XmlRpcError` |
//! | `TransportError` | -32300 | `XmlRpcError` |
//!
//! The root shares the fallback code with `ApplicationError`. Only the latter
//! owns it in the bijection, so decoding `-32500` yields `ApplicationError`.
//!
//! # Examples
//!
//! ```rust
//! use xrow_core::{FaultKind, FaultRegistry, RpcError};
//!
//! let mut registry = FaultRegistry::new();
//! let quota = FaultKind::new("QuotaExceeded");
//! registry.register_with_parent(quota.clone(), FaultKind::APPLICATION_ERROR, 1001).unwrap();
//!
//! let (code, message) = registry.encode_exception(&RpcError::new(quota.clone(), "over limit"));
//! assert_eq!(code, 1001);
//! assert_eq!(message, "QuotaExceeded(\"over limit\")");
//!
//! let decoded = registry.decode_fault(1001, "over limit");
//! assert_eq!(decoded.kind(), &quota);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

/// Code used when no registered code is found for a kind
pub const FALLBACK_CODE: i32 = -32500;

/// Name of a class of errors
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultKind(Cow<'static, str>);

impl FaultKind {
    pub const BASE: FaultKind = FaultKind(Cow::Borrowed("XmlRpcError"));
    pub const PARSE_ERROR: FaultKind = FaultKind(Cow::Borrowed("ParseError"));
    pub const UNSUPPORTED_ENCODING: FaultKind =
        FaultKind(Cow::Borrowed("UnsupportedEncodingError"));
    pub const INVALID_CHARACTER: FaultKind = FaultKind(Cow::Borrowed("InvalidCharacterError"));
    pub const SERVER_ERROR: FaultKind = FaultKind(Cow::Borrowed("ServerError"));
    pub const INVALID_DATA: FaultKind = FaultKind(Cow::Borrowed("InvalidData"));
    pub const METHOD_NOT_FOUND: FaultKind = FaultKind(Cow::Borrowed("MethodNotFound"));
    pub const INVALID_ARGUMENTS: FaultKind = FaultKind(Cow::Borrowed("InvalidArguments"));
    pub const APPLICATION_ERROR: FaultKind = FaultKind(Cow::Borrowed("ApplicationError"));
    pub const SYSTEM_ERROR: FaultKind = FaultKind(Cow::Borrowed("SystemError"));
    pub const TRANSPORT_ERROR: FaultKind = FaultKind(Cow::Borrowed("TransportError"));
    /// Default kind for faults whose code is not registered
    pub const REMOTE_SERVER_ERROR: FaultKind = FaultKind(Cow::Borrowed("RemoteServerError"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        FaultKind(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn is_builtin(&self) -> bool {
        BUILTIN_TREE.iter().any(|(kind, _, _)| kind == self) || *self == FaultKind::BASE
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// (kind, parent, code)
const BUILTIN_TREE: [(FaultKind, FaultKind, Option<i32>); 11] = [
    (FaultKind::PARSE_ERROR, FaultKind::BASE, Some(-32700)),
    (FaultKind::UNSUPPORTED_ENCODING, FaultKind::PARSE_ERROR, Some(-32701)),
    (FaultKind::INVALID_CHARACTER, FaultKind::PARSE_ERROR, Some(-32702)),
    (FaultKind::SERVER_ERROR, FaultKind::BASE, Some(-32603)),
    (FaultKind::INVALID_DATA, FaultKind::SERVER_ERROR, Some(-32600)),
    (FaultKind::METHOD_NOT_FOUND, FaultKind::SERVER_ERROR, Some(-32601)),
    (FaultKind::INVALID_ARGUMENTS, FaultKind::SERVER_ERROR, Some(-32602)),
    (FaultKind::APPLICATION_ERROR, FaultKind::BASE, Some(FALLBACK_CODE)),
    (FaultKind::SYSTEM_ERROR, FaultKind::BASE, Some(-32400)),
    (FaultKind::TRANSPORT_ERROR, FaultKind::BASE, Some(-32300)),
    (FaultKind::REMOTE_SERVER_ERROR, FaultKind::BASE, None),
];

/// An error as it travels through the RPC layer
///
/// This is what handlers return on failure and what the client surfaces for
/// a fault response. The display form is `Kind("message")`, which is also the
/// fault string sent on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    kind: FaultKind,
    message: String,
    code: Option<i32>,
}

impl RpcError {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    /// Error with an explicit code that takes precedence over the registry
    pub fn with_code(kind: FaultKind, code: i32, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: Some(code),
        }
    }

    /// Error of the root kind, sent with the fallback code
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(FaultKind::BASE, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::PARSE_ERROR, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            FaultKind::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method),
        )
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(FaultKind::INVALID_ARGUMENTS, message)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(FaultKind::APPLICATION_ERROR, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(FaultKind::SERVER_ERROR, message)
    }

    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Code carried by the error itself, if any
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        err.into_rpc_error()
    }
}

/// Bidirectional table between fault kinds and codes
///
/// Registries are built once and then shared read-only, typically behind an
/// `Arc`. Every registration either fully succeeds or leaves the registry
/// untouched.
#[derive(Debug, Clone)]
pub struct FaultRegistry {
    codes: HashMap<FaultKind, i32>,
    kinds: HashMap<i32, FaultKind>,
    parents: HashMap<FaultKind, FaultKind>,
    default_kind: FaultKind,
}

impl FaultRegistry {
    /// Registry holding the built-in taxonomy
    pub fn new() -> Self {
        let mut registry = Self {
            codes: HashMap::new(),
            kinds: HashMap::new(),
            parents: HashMap::new(),
            default_kind: FaultKind::REMOTE_SERVER_ERROR,
        };

        for (kind, parent, code) in BUILTIN_TREE {
            registry.parents.insert(kind.clone(), parent);
            if let Some(code) = code {
                registry.codes.insert(kind.clone(), code);
                registry.kinds.insert(code, kind);
            }
        }

        registry
    }

    /// Bind `kind` to `code`
    ///
    /// Registering the exact same pair twice is a no-op. Fails if the code
    /// already belongs to another kind or the kind already has another code.
    pub fn register(&mut self, kind: FaultKind, code: i32) -> Result<()> {
        if self.check_register(&kind, code)? {
            return Ok(());
        }
        if !self.is_known(&kind) {
            self.parents.insert(kind.clone(), FaultKind::BASE);
        }
        self.codes.insert(kind.clone(), code);
        self.kinds.insert(code, kind);
        Ok(())
    }

    /// Declare `kind` as a child of `parent` and bind it to `code` in one step
    pub fn register_with_parent(
        &mut self,
        kind: FaultKind,
        parent: FaultKind,
        code: i32,
    ) -> Result<()> {
        let already_bound = self.check_register(&kind, code)?;
        self.check_derive(&kind, &parent)?;
        self.parents.insert(kind.clone(), parent);
        if !already_bound {
            self.codes.insert(kind.clone(), code);
            self.kinds.insert(code, kind);
        }
        Ok(())
    }

    /// Declare `kind` as a child of `parent` without giving it a code
    pub fn derive(&mut self, kind: FaultKind, parent: FaultKind) -> Result<()> {
        self.check_derive(&kind, &parent)?;
        self.parents.insert(kind, parent);
        Ok(())
    }

    /// Remove the code bound to a custom kind
    ///
    /// The kind stays in the tree and falls back to its ancestors' codes.
    pub fn unregister(&mut self, kind: &FaultKind) -> Result<Option<i32>> {
        if kind.is_builtin() {
            return Err(Error::ProtectedFaultKind(kind.clone()));
        }
        let code = self.codes.remove(kind);
        if let Some(code) = code {
            self.kinds.remove(&code);
        }
        Ok(code)
    }

    /// Kind used by [`decode_fault`](Self::decode_fault) for unknown codes
    pub fn set_default_kind(&mut self, kind: FaultKind) {
        if !self.is_known(&kind) {
            self.parents.insert(kind.clone(), FaultKind::BASE);
        }
        self.default_kind = kind;
    }

    pub fn default_kind(&self) -> &FaultKind {
        &self.default_kind
    }

    pub fn code_of(&self, kind: &FaultKind) -> Option<i32> {
        self.codes.get(kind).copied()
    }

    pub fn kind_of(&self, code: i32) -> Option<&FaultKind> {
        self.kinds.get(&code)
    }

    pub fn parent_of(&self, kind: &FaultKind) -> Option<&FaultKind> {
        self.parents.get(kind)
    }

    /// The kind itself followed by its ancestors up to the root
    pub fn ancestors<'a>(&'a self, kind: &'a FaultKind) -> impl Iterator<Item = &'a FaultKind> {
        std::iter::successors(Some(kind), move |current| self.parents.get(*current))
    }

    /// Nearest registered code on the kind's ancestor chain
    pub fn resolve_code(&self, kind: &FaultKind) -> i32 {
        self.ancestors(kind)
            .find_map(|k| self.codes.get(k).copied())
            .unwrap_or(FALLBACK_CODE)
    }

    /// Translate an error into the `(faultCode, faultString)` pair
    pub fn encode_exception(&self, err: &RpcError) -> (i32, String) {
        let code = err.code().unwrap_or_else(|| self.resolve_code(err.kind()));
        (code, err.to_string())
    }

    /// Translate a received fault back into an error
    pub fn decode_fault(&self, code: i32, message: &str) -> RpcError {
        match self.kinds.get(&code) {
            Some(kind) => RpcError::new(kind.clone(), message),
            None => RpcError::with_code(self.default_kind.clone(), code, message),
        }
    }

    fn is_known(&self, kind: &FaultKind) -> bool {
        *kind == FaultKind::BASE || self.parents.contains_key(kind)
    }

    /// Returns `Ok(true)` when the pair is already registered as given
    fn check_register(&self, kind: &FaultKind, code: i32) -> Result<bool> {
        match (self.kinds.get(&code), self.codes.get(kind)) {
            (Some(existing), _) if existing == kind => Ok(true),
            (Some(existing), _) => Err(Error::DuplicateFaultCode {
                code,
                existing: existing.clone(),
            }),
            (None, Some(existing)) => Err(Error::DuplicateFaultKind {
                kind: kind.clone(),
                existing: *existing,
            }),
            (None, None) if *kind == FaultKind::BASE => {
                Err(Error::ProtectedFaultKind(kind.clone()))
            }
            (None, None) => Ok(false),
        }
    }

    fn check_derive(&self, kind: &FaultKind, parent: &FaultKind) -> Result<()> {
        if kind.is_builtin() {
            return Err(Error::ProtectedFaultKind(kind.clone()));
        }
        if !self.is_known(parent) {
            return Err(Error::UnknownFaultKind(parent.clone()));
        }
        if self.ancestors(parent).any(|ancestor| ancestor == kind) {
            return Err(Error::CyclicFaultKind(kind.clone()));
        }
        Ok(())
    }
}

impl Default for FaultRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Arc<FaultRegistry>> = OnceLock::new();

/// Install the process-wide registry
///
/// Succeeds once, and only if nothing has read [`global`] yet.
pub fn install_global(registry: FaultRegistry) -> Result<()> {
    GLOBAL
        .set(Arc::new(registry))
        .map_err(|_| Error::RegistryInstalled)
}

/// The process-wide registry, defaulting to the built-in taxonomy
pub fn global() -> Arc<FaultRegistry> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(FaultRegistry::new())))
}
