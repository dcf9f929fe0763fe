//! Core XML-RPC types and codec for xrow
//!
//! This crate holds everything that does not depend on a transport:
//!
//! - **Values**: the [`Value`] model and conversions from and to Rust types
//! - **Codec**: [`Value`] to XML-RPC elements and back
//! - **Envelopes**: request and response documents, with structural validation
//! - **Faults**: the fault-kind tree and its code registry
//! - **Observability**: an opt-in `tracing` and OpenTelemetry bootstrap
//!
//! The `xrow-server` and `xrow-client` crates build the dispatcher and the
//! HTTP caller on top of it.
//!
//! # Example
//!
//! ```rust
//! use xrow_core::{envelope, MethodCall, MethodResponse, Value};
//!
//! let call = MethodCall::new("ping", vec![Value::from("hello")]);
//! let bytes = envelope::encode_call(&call).unwrap();
//!
//! let decoded = envelope::decode_call(&bytes, Some("text/xml")).unwrap();
//! assert_eq!(decoded, call);
//!
//! let reply = envelope::encode_response(&MethodResponse::success("pong"), false).unwrap();
//! assert_eq!(
//!     envelope::decode_response(&reply).unwrap(),
//!     MethodResponse::success("pong")
//! );
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod fault;
pub mod observability;
pub mod schema;
pub mod types;
pub mod value;
pub mod xml;

pub use envelope::CONTENT_TYPE;
pub use error::{Error, Result};
pub use fault::{FaultKind, FaultRegistry, RpcError, FALLBACK_CODE};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{MethodCall, MethodResponse};
pub use value::{Binary, FromValue, Struct, Value};
pub use xml::Element;
