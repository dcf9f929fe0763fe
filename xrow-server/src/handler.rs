//! Handler contract for XML-RPC methods
//!
//! A handler receives the positional arguments of a call and the keyword
//! arguments split off by the dispatcher, and eventually produces a [`Value`]
//! or an [`RpcError`]. Everything is type-erased behind [`Handler`] so the
//! registry can hold handlers of any concrete type.
//!
//! # Creating Handlers
//!
//! 1. **from_fn**: wrap an async closure
//! 2. **from_sync_fn**: wrap a plain closure; it runs to completion when the
//!    dispatcher first polls it
//! 3. **#[method]**: derive handler and parameter shape from a Rust fn (via
//!    `xrow-macros`)
//!
//! # Examples
//!
//! ```rust
//! use xrow_server::{from_fn, from_sync_fn, Value};
//!
//! let count = from_sync_fn(|args, _kwargs| Ok(Value::from(args.len())));
//!
//! let echo = from_fn(|args, _kwargs| async move {
//!     Ok(args.into_iter().next().unwrap_or(Value::Null))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use xrow_core::{RpcError, Struct, Value};

/// Positional arguments of a call
pub type Args = Vec<Value>;

/// Keyword arguments of a call
pub type Kwargs = Struct;

/// Boxed future returned by every handler
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Value, RpcError>> + Send>>;

/// A callable RPC method
pub trait Handler: Send + Sync {
    fn call(&self, args: Args, kwargs: Kwargs) -> HandlerResult;
}

pub struct AsyncHandler<F> {
    func: F,
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Args, Kwargs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    fn call(&self, args: Args, kwargs: Kwargs) -> HandlerResult {
        Box::pin((self.func)(args, kwargs))
    }
}

pub struct SyncHandler<F> {
    func: Arc<F>,
}

impl<F> Handler for SyncHandler<F>
where
    F: Fn(Args, Kwargs) -> Result<Value, RpcError> + Send + Sync + 'static,
{
    fn call(&self, args: Args, kwargs: Kwargs) -> HandlerResult {
        let func = Arc::clone(&self.func);
        // deferred so the body runs inside the dispatcher's unwind guard
        Box::pin(async move { func(args, kwargs) })
    }
}

/// Wrap an async closure as a handler
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(Args, Kwargs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    Box::new(AsyncHandler { func })
}

/// Lift a synchronous closure into a handler
pub fn from_sync_fn<F>(func: F) -> Box<dyn Handler>
where
    F: Fn(Args, Kwargs) -> Result<Value, RpcError> + Send + Sync + 'static,
{
    Box::new(SyncHandler {
        func: Arc::new(func),
    })
}
