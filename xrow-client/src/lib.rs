//! XML-RPC client over HTTP
//!
//! [`ServerProxy`] is the calling side of xrow: it encodes calls with the
//! shared codec in `xrow-core`, posts them with `hyper`, and turns fault
//! responses back into typed errors through the fault registry.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xrow_client::{Error, ServerProxy, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proxy = ServerProxy::new("http://localhost:8000/RPC2")?;
//!
//!     let sum = proxy.call("add", vec![Value::from(1), Value::from(2)]).await?;
//!     println!("1 + 2 = {:?}", sum);
//!
//!     match proxy.call("missing", vec![]).await {
//!         Err(Error::Rpc(fault)) => println!("fault: {}", fault),
//!         other => println!("unexpected: {:?}", other),
//!     }
//!     Ok(())
//! }
//! ```

mod client;

pub use client::{ServerProxy, USER_AGENT};
pub use xrow_core::{Error, FaultKind, FaultRegistry, Result, RpcError, Struct, Value};
