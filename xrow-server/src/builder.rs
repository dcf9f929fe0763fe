//! Server builder for constructing XML-RPC servers
//!
//! The builder collects everything an [`XrowServer`] needs:
//! - the bind address
//! - the method registry, or methods registered one by one
//! - the fault registry used to code handler errors
//! - dispatch options (keyword-argument policy, pretty printing, body size limit)
//! - middleware, metrics and observability
//!
//! # Examples
//!
//! ```rust,no_run
//! use xrow_server::{from_sync_fn, MethodDef, ParamShape, Value, XrowServer};
//!
//! # async fn example() -> xrow_core::Result<()> {
//! let server = XrowServer::builder()
//!     .bind_str("127.0.0.1:8000")?
//!     .method("rpc_ping", MethodDef::new(
//!         ParamShape::new(),
//!         from_sync_fn(|_, _| Ok(Value::from("pong"))),
//!     ))
//!     .pretty(true)
//!     .with_metrics()
//!     .build()
//!     .await?;
//!
//! server.run().await;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use xrow_core::{fault, Error, FaultRegistry, ObservabilityConfig, Result};

use crate::dispatcher::{DispatchConfig, Dispatcher, KwargsPolicy};
use crate::metrics::DispatchMetrics;
use crate::middleware::{Middleware, MiddlewareChain, SyncMiddleware};
use crate::registry::{MethodDef, MethodRegistry};
use crate::{http, XrowServer};

const DEFAULT_SERVICE_NAME: &str = "xrow-server";

/// Builder for constructing an XML-RPC server
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    registry: MethodRegistry,
    faults: Option<Arc<FaultRegistry>>,
    config: DispatchConfig,
    middleware_chain: MiddlewareChain,
    metrics: bool,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            addr: None,
            registry: MethodRegistry::new(),
            faults: None,
            config: DispatchConfig::default(),
            middleware_chain: MiddlewareChain::new(),
            metrics: false,
            observability_config: None,
            service_name: None,
        }
    }

    /// Set the bind address for the server
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the bind address from a string (e.g., "127.0.0.1:8000")
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid address: {}", e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Replace the method registry (and every method registered so far)
    pub fn registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a method under its prefixed Rust-side name
    pub fn method(mut self, rust_name: &str, def: MethodDef) -> Self {
        self.registry.register(rust_name, def);
        self
    }

    /// Register a method under a verbatim public name
    pub fn method_as(mut self, public_name: impl Into<String>, def: MethodDef) -> Self {
        self.registry.register_as(public_name, def);
        self
    }

    /// Register a method that carries its own name, e.g. from `#[method]`
    pub fn add(mut self, def: MethodDef) -> Self {
        self.registry.add(def);
        self
    }

    /// Code faults through `faults` instead of the global registry
    pub fn faults(mut self, faults: Arc<FaultRegistry>) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn kwargs_policy(mut self, policy: KwargsPolicy) -> Self {
        self.config.kwargs_policy = policy;
        self
    }

    /// Indent response documents
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.config.pretty = pretty;
        self
    }

    /// Refuse request bodies larger than `bytes` with 413
    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.config.max_body_size = bytes;
        self
    }

    /// Add middleware to the server
    pub fn use_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware_chain.add(middleware);
        self
    }

    /// Add sync middleware to the server
    pub fn use_sync_middleware<T: SyncMiddleware + 'static>(mut self, middleware: T) -> Self {
        self.middleware_chain.add_sync(middleware);
        self
    }

    /// Record dispatch metrics through the global meter provider
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    ///
    /// Implies [`ServerBuilder::with_metrics`].
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(self) -> Self {
        self.with_observability(ObservabilityConfig::default())
    }

    /// Set service name for observability and metrics
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the dispatcher alone, without binding a socket
    ///
    /// Useful for embedding in another HTTP stack, see [`http::routes`].
    pub fn build_dispatcher(self) -> Result<Dispatcher> {
        self.into_dispatcher()
    }

    /// Bind the listener and assemble the server
    pub async fn build(self) -> Result<XrowServer> {
        let addr = self
            .addr
            .ok_or_else(|| Error::Internal("No bind address specified".to_string()))?;

        let dispatcher = Arc::new(self.into_dispatcher()?);

        let (local_addr, serve) = warp::serve(http::routes(Arc::clone(&dispatcher)))
            .try_bind_ephemeral(addr)
            .map_err(|e| Error::Io(e.to_string()))?;

        tracing::info!(addr = %local_addr, "Server listening");

        Ok(XrowServer {
            local_addr,
            dispatcher,
            serve: Box::pin(serve),
        })
    }

    fn into_dispatcher(self) -> Result<Dispatcher> {
        let service_name = self
            .service_name
            .clone()
            .or_else(|| self.observability_config.as_ref().map(|c| c.service_name.clone()))
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let metrics = if let Some(mut config) = self.observability_config {
            config.service_name = service_name.clone();
            xrow_core::init_observability(config).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;
            Some(Arc::new(DispatchMetrics::new(service_name)))
        } else if self.metrics {
            Some(Arc::new(DispatchMetrics::new(service_name)))
        } else {
            None
        };

        let mut dispatcher = Dispatcher::new(self.registry)
            .with_faults(self.faults.unwrap_or_else(fault::global))
            .with_config(self.config)
            .with_middleware(self.middleware_chain);
        if let Some(metrics) = metrics {
            dispatcher = dispatcher.with_metrics(metrics);
        }
        Ok(dispatcher)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
