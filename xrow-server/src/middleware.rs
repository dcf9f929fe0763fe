//! Middleware system for the dispatch pipeline
//!
//! Middleware runs around handler invocation, after the method has been
//! resolved and keyword arguments have been split off. Each middleware can:
//! - Inspect and modify the arguments before the handler
//! - Short-circuit execution with a value, or fail the call with a fault
//! - Inspect the outcome after the handler
//! - Pass metadata to subsequent middleware
//!
//! # Examples
//!
//! ```rust
//! use xrow_server::{LoggingMiddleware, MiddlewareChain};
//!
//! let mut chain = MiddlewareChain::new();
//! chain.add_sync(LoggingMiddleware);
//!
//! // Or with ServerBuilder:
//! // builder.use_sync_middleware(LoggingMiddleware)
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use xrow_core::{RpcError, Value};

use crate::handler::{Args, Kwargs};

/// Outcome of a call as seen by middleware
pub type CallResult = Result<Value, RpcError>;

/// Action to take after middleware pre-processing
#[derive(Debug, Clone)]
pub enum MiddlewareAction {
    /// Continue to next middleware/handler
    Continue,
    /// Skip the handler and answer with this value
    ShortCircuit(Value),
}

/// Context passed to middleware containing the resolved call
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    /// Public name of the method being called
    pub method: String,
    pub args: Args,
    pub kwargs: Kwargs,
    /// Metadata for passing data between middleware
    pub metadata: HashMap<String, Value>,
}

impl MiddlewareContext {
    pub fn new(method: impl Into<String>, args: Args, kwargs: Kwargs) -> Self {
        Self {
            method: method.into(),
            args,
            kwargs,
            metadata: HashMap::new(),
        }
    }

    /// Insert metadata that can be accessed by subsequent middleware
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }
}

/// Trait for async middleware
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before handler execution; an error fails the call
    async fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError>;

    /// Called after handler execution
    async fn post_handle(&self, ctx: &mut MiddlewareContext, result: &CallResult);
}

/// Trait for synchronous middleware
pub trait SyncMiddleware: Send + Sync {
    fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError>;

    fn post_handle(&self, ctx: &mut MiddlewareContext, result: &CallResult);
}

struct SyncMiddlewareAdapter<T: SyncMiddleware> {
    inner: T,
}

#[async_trait]
impl<T: SyncMiddleware + 'static> Middleware for SyncMiddlewareAdapter<T> {
    async fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError> {
        self.inner.pre_handle(ctx)
    }

    async fn post_handle(&self, ctx: &mut MiddlewareContext, result: &CallResult) {
        self.inner.post_handle(ctx, result)
    }
}

/// Chain of middleware to execute in order
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Add a sync middleware to the chain
    pub fn add_sync<T: SyncMiddleware + 'static>(&mut self, middleware: T) {
        self.middlewares.push(Arc::new(SyncMiddlewareAdapter { inner: middleware }));
    }

    /// Run the chain around `handler`
    ///
    /// `post_handle` runs in reverse order for every middleware whose
    /// `pre_handle` ran, including on short-circuit and pre-handle failure.
    pub async fn execute<F, Fut>(&self, mut ctx: MiddlewareContext, handler: F) -> CallResult
    where
        F: FnOnce(MiddlewareContext) -> Fut + Send,
        Fut: std::future::Future<Output = CallResult> + Send,
    {
        let mut entered = 0;
        let mut early = None;
        for middleware in &self.middlewares {
            entered += 1;
            match middleware.pre_handle(&mut ctx).await {
                Ok(MiddlewareAction::Continue) => continue,
                Ok(MiddlewareAction::ShortCircuit(value)) => {
                    early = Some(Ok(value));
                    break;
                }
                Err(err) => {
                    early = Some(Err(err));
                    break;
                }
            }
        }

        let result = match early {
            Some(result) => result,
            None => handler(ctx.clone()).await,
        };

        for middleware in self.middlewares[..entered].iter().rev() {
            middleware.post_handle(&mut ctx, &result).await;
        }

        result
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Built-in logging middleware
///
/// Emits one `tracing` event per call on entry and one on exit. Results are
/// rendered as JSON and cut to 100 characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

fn preview(value: &Value) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| value.type_name().to_string())
        .chars()
        .take(100)
        .collect()
}

impl SyncMiddleware for LoggingMiddleware {
    fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError> {
        tracing::info!(
            method = %ctx.method,
            args = ctx.args.len(),
            kwargs = ctx.kwargs.len(),
            "call received"
        );
        Ok(MiddlewareAction::Continue)
    }

    fn post_handle(&self, ctx: &mut MiddlewareContext, result: &CallResult) {
        match result {
            Ok(value) => tracing::info!(
                method = %ctx.method,
                result = %preview(value),
                "call succeeded"
            ),
            Err(e) => tracing::info!(method = %ctx.method, error = %e, "call failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use xrow_core::Struct;

    struct TestMiddleware {
        name: String,
    }

    impl TestMiddleware {
        fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    impl SyncMiddleware for TestMiddleware {
        fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError> {
            ctx.insert_metadata(format!("{}_pre", self.name), true);
            Ok(MiddlewareAction::Continue)
        }

        fn post_handle(&self, ctx: &mut MiddlewareContext, _result: &CallResult) {
            ctx.insert_metadata(format!("{}_post", self.name), true);
        }
    }

    struct ShortCircuitMiddleware;

    impl SyncMiddleware for ShortCircuitMiddleware {
        fn pre_handle(&self, _ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError> {
            Ok(MiddlewareAction::ShortCircuit(Value::from("short-circuited")))
        }

        fn post_handle(&self, _ctx: &mut MiddlewareContext, _result: &CallResult) {}
    }

    #[derive(Default)]
    struct CountingMiddleware {
        post_calls: AtomicUsize,
    }

    #[async_trait]
    impl Middleware for CountingMiddleware {
        async fn pre_handle(
            &self,
            _ctx: &mut MiddlewareContext,
        ) -> Result<MiddlewareAction, RpcError> {
            Ok(MiddlewareAction::Continue)
        }

        async fn post_handle(&self, _ctx: &mut MiddlewareContext, _result: &CallResult) {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct DenyMiddleware;

    impl SyncMiddleware for DenyMiddleware {
        fn pre_handle(&self, ctx: &mut MiddlewareContext) -> Result<MiddlewareAction, RpcError> {
            Err(RpcError::application(format!("{} is disabled", ctx.method)))
        }

        fn post_handle(&self, _ctx: &mut MiddlewareContext, _result: &CallResult) {}
    }

    fn context() -> MiddlewareContext {
        MiddlewareContext::new("test_method", vec![Value::from(1)], Struct::new())
    }

    #[tokio::test]
    async fn test_middleware_execution_order() {
        let mut chain = MiddlewareChain::new();
        chain.add_sync(TestMiddleware::new("first"));
        chain.add_sync(TestMiddleware::new("second"));

        let result = chain
            .execute(context(), |ctx| async move {
                assert!(ctx.get_metadata("first_pre").is_some());
                assert!(ctx.get_metadata("second_pre").is_some());
                Ok(Value::from("handler result"))
            })
            .await;

        assert_eq!(result, Ok(Value::from("handler result")));
    }

    #[tokio::test]
    async fn test_middleware_short_circuit() {
        let counter = Arc::new(CountingMiddleware::default());
        let mut chain = MiddlewareChain::new();
        chain.add(counter.clone());
        chain.add_sync(ShortCircuitMiddleware);
        chain.add_sync(TestMiddleware::new("third"));

        let result = chain
            .execute(context(), |_ctx| async move {
                panic!("Handler should not be called");
            })
            .await;

        assert_eq!(result, Ok(Value::from("short-circuited")));
        // middleware entered before the short-circuit still sees the result
        assert_eq!(counter.post_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_middleware_can_rewrite_arguments() {
        struct Doubler;

        impl SyncMiddleware for Doubler {
            fn pre_handle(
                &self,
                ctx: &mut MiddlewareContext,
            ) -> Result<MiddlewareAction, RpcError> {
                let extra = ctx.args.clone();
                ctx.args.extend(extra);
                Ok(MiddlewareAction::Continue)
            }

            fn post_handle(&self, _ctx: &mut MiddlewareContext, _result: &CallResult) {}
        }

        let mut chain = MiddlewareChain::new();
        chain.add_sync(Doubler);

        let result = chain
            .execute(context(), |ctx| async move { Ok(Value::from(ctx.args.len())) })
            .await;
        assert_eq!(result, Ok(Value::Integer(2)));
    }

    #[tokio::test]
    async fn test_middleware_rejection_skips_handler() {
        let counter = Arc::new(CountingMiddleware::default());
        let mut chain = MiddlewareChain::new();
        chain.add(counter.clone());
        chain.add_sync(DenyMiddleware);

        let result = chain
            .execute(context(), |_ctx| async move {
                panic!("Handler should not be called");
            })
            .await;

        assert_eq!(result.unwrap_err().message(), "test_method is disabled");
        assert_eq!(counter.post_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_error_reaches_post_handle() {
        let counter = Arc::new(CountingMiddleware::default());
        let mut chain = MiddlewareChain::new();
        chain.add(counter.clone());
        chain.add_sync(LoggingMiddleware::new());

        let result = chain
            .execute(context(), |_ctx| async move {
                Err(RpcError::application("test error"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.post_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preview_is_bounded() {
        let long = Value::from("x".repeat(500));
        assert_eq!(preview(&long).chars().count(), 100);
        assert_eq!(preview(&Value::from(7)), "7");
    }
}
