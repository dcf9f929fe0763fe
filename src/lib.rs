//! XROW - XML-RPC for Rust
//!
//! This is the convenience crate that re-exports all XROW sub-crates. Use it
//! if you want a single dependency that provides both client and server
//! functionality.
//!
//! # Architecture
//!
//! - **xrow-core**: values, codec, envelopes, fault registry, observability
//! - **xrow-server**: method registry, dispatcher, middleware, HTTP binding
//! - **xrow-client**: `ServerProxy` over HTTP
//! - **xrow-macros**: `#[method]` for deriving method definitions
//!
//! # Quick Start - Server
//!
//! ```rust,no_run
//! use xrow::server::{from_sync_fn, MethodDef, ParamShape};
//! use xrow::{Value, XrowServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = XrowServer::builder()
//!         .bind_str("127.0.0.1:8000")?
//!         .method("rpc_count", MethodDef::new(
//!             ParamShape::new().variadic_positional(true),
//!             from_sync_fn(|args, _| Ok(Value::from(args.len()))),
//!         ))
//!         .build()
//!         .await?;
//!
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Client
//!
//! ```rust,no_run
//! use xrow::{ServerProxy, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proxy = ServerProxy::new("http://localhost:8000/")?;
//!     let count = proxy.call("count", vec![Value::from("a"), Value::from("b")]).await?;
//!     assert_eq!(count, Value::Integer(2));
//!     Ok(())
//! }
//! ```

pub use xrow_client as client;
pub use xrow_core as core;
pub use xrow_macros as macros;
pub use xrow_server as server;

pub use xrow_client::ServerProxy;
pub use xrow_core::{Error, FaultKind, FaultRegistry, Result, RpcError, Struct, Value};
pub use xrow_server::XrowServer;
