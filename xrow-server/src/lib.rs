//! XML-RPC server: method registry, dispatcher and HTTP binding
//!
//! This crate turns request bodies into handler invocations and handler
//! outcomes back into response documents. The pieces, from the inside out:
//!
//! - **Handlers**: one async contract, with sync closures lifted into it
//! - **Method registry**: public names, parameter shapes, inheritance
//! - **Argument binding**: positional and keyword arguments onto typed params
//! - **Dispatcher**: decode, look up, invoke, encode; one reply per request
//! - **Middleware**: pre/post hooks around every invocation
//! - **HTTP binding**: a `warp` filter over the dispatcher
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xrow_server::{from_sync_fn, ArgBinder, MethodDef, ParamShape, Value, XrowServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let add = MethodDef::new(ParamShape::new(), from_sync_fn(|args, kwargs| {
//!         let mut binder = ArgBinder::new(args, kwargs);
//!         let a: i64 = binder.positional("a")?;
//!         let b: i64 = binder.positional("b")?;
//!         binder.finish()?;
//!         Ok(Value::from(a + b))
//!     }));
//!
//!     let server = XrowServer::builder()
//!         .bind_str("127.0.0.1:8000")?
//!         .method("rpc_add", add)
//!         .build()
//!         .await?;
//!
//!     server.run().await;
//!     Ok(())
//! }
//! ```
//!
//! With `xrow-macros`, the same method is a plain function:
//!
//! ```rust,ignore
//! #[xrow_macros::method]
//! fn rpc_add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! let server = XrowServer::builder().add(rpc_add());
//! ```

mod binding;
mod builder;
mod dispatcher;
mod handler;
pub mod http;
mod metrics;
mod middleware;
mod registry;

pub use binding::ArgBinder;
pub use builder::ServerBuilder;
pub use dispatcher::{
    DispatchConfig, DispatchStage, Dispatcher, HttpReply, KwargsPolicy, DEFAULT_MAX_BODY_SIZE,
};
pub use handler::{from_fn, from_sync_fn, Args, Handler, HandlerResult, Kwargs};
pub use metrics::DispatchMetrics;
pub use middleware::{
    CallResult, LoggingMiddleware, Middleware, MiddlewareAction, MiddlewareChain,
    MiddlewareContext, SyncMiddleware,
};
pub use registry::{MethodDef, MethodRegistry, ParamShape, RegistryBuilder};

// Used by code generated with `#[xrow_macros::method]`
pub use xrow_core::{FromValue, RpcError, Struct, Value};

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

/// XML-RPC server over HTTP
///
/// The listener is bound by [`ServerBuilder::build`]; requests are served
/// once [`XrowServer::run`] or [`XrowServer::spawn`] drives the server.
pub struct XrowServer {
    local_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    serve: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl XrowServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serve requests until the task is dropped
    #[tracing::instrument(skip(self), name = "server.run", fields(addr = %self.local_addr))]
    pub async fn run(self) {
        tracing::info!("Starting XROW server");
        self.serve.await
    }

    /// Serve requests on a background task
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
