//! XML-RPC message types
//!
//! A call is a method name plus an ordered list of positional parameters. A
//! response is either exactly one value or a fault.
//!
//! # Keyword arguments
//!
//! XML-RPC has no keyword arguments. By convention a caller passes them as a
//! trailing `<struct>`; [`MethodCall::with_kwargs`] builds such a call and the
//! server decides, per method, whether a trailing struct is split off again.
//!
//! # Examples
//!
//! ```rust
//! use xrow_core::{MethodCall, MethodResponse, Struct, Value};
//!
//! let mut kwargs = Struct::new();
//! kwargs.insert("verbose", true);
//! let call = MethodCall::with_kwargs("search", vec![Value::from("rust")], kwargs);
//! assert_eq!(call.params().len(), 2);
//!
//! let response = MethodResponse::fault(-32601, "no such method");
//! assert!(response.is_fault());
//! ```

use crate::fault::{FaultRegistry, RpcError};
use crate::value::{Struct, Value};

/// An XML-RPC request
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    method_name: String,
    params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method_name: method_name.into(),
            params,
        }
    }

    /// Call whose keyword arguments travel as a trailing struct
    ///
    /// An empty `kwargs` adds nothing.
    pub fn with_kwargs(method_name: impl Into<String>, mut args: Vec<Value>, kwargs: Struct) -> Self {
        if !kwargs.is_empty() {
            args.push(Value::Struct(kwargs));
        }
        Self::new(method_name, args)
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.method_name, self.params)
    }
}

/// An XML-RPC response
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault { code: i32, message: String },
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        MethodResponse::Success(value.into())
    }

    pub fn fault(code: i32, message: impl Into<String>) -> Self {
        MethodResponse::Fault {
            code,
            message: message.into(),
        }
    }

    /// Fault response for an error, coded through `registry`
    pub fn from_error(err: &RpcError, registry: &FaultRegistry) -> Self {
        let (code, message) = registry.encode_exception(err);
        MethodResponse::Fault { code, message }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MethodResponse::Success(_))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, MethodResponse::Fault { .. })
    }

    pub fn fault_code(&self) -> Option<i32> {
        match self {
            MethodResponse::Fault { code, .. } => Some(*code),
            MethodResponse::Success(_) => None,
        }
    }

    /// The value of a success, or the fault decoded through `registry`
    pub fn into_result(self, registry: &FaultRegistry) -> Result<Value, RpcError> {
        match self {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault { code, message } => Err(registry.decode_fault(code, &message)),
        }
    }
}
