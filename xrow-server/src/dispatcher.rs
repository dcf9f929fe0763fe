//! Request dispatcher
//!
//! The dispatcher turns one request body into exactly one reply. A request
//! moves through these stages:
//!
//! ```text
//! Idle -> Decoding -> Lookup -> Invoking -> Encoding -> Done
//!             |          |          |           |
//!             +----------+----------+-----------+------> Fault
//! ```
//!
//! Only two failures are answered outside XML-RPC: a content type without
//! `xml` and a body that is not well-formed XML. Both produce an HTTP 400 with
//! an empty body. From the first parsed document on, every failure becomes a
//! fault response with status 200:
//!
//! - grammar violations, as `ParseError`
//! - unknown methods, as `MethodNotFound`
//! - handler errors, coded through the [`FaultRegistry`]
//! - handler panics and unencodable results, as generic faults
//!
//! # Keyword arguments
//!
//! XML-RPC has no keyword arguments. When the last positional argument is a
//! struct and the target method accepts keywords (see [`ParamShape`]), the
//! struct is popped and handed over as keyword arguments. [`KwargsPolicy`]
//! can force this on or off.
//!
//! # Examples
//!
//! ```rust
//! use xrow_server::{from_sync_fn, Dispatcher, MethodDef, MethodRegistry, ParamShape, Value};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = MethodRegistry::builder()
//!     .method("rpc_len", MethodDef::new(
//!         ParamShape::new().variadic_positional(true),
//!         from_sync_fn(|args, _| Ok(Value::from(args.len()))),
//!     ))
//!     .build();
//! let dispatcher = Dispatcher::new(registry);
//!
//! let body = b"<methodCall><methodName>len</methodName><params>\
//!     <param><value>a</value></param></params></methodCall>";
//! let reply = dispatcher.handle(body, Some("text/xml")).await;
//!
//! assert_eq!(reply.status, 200);
//! assert!(String::from_utf8(reply.body).unwrap().contains("<i4>1</i4>"));
//! # }
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use xrow_core::{envelope, fault, FaultRegistry, MethodCall, MethodResponse, RpcError, Struct, Value};

use crate::handler::{Args, Kwargs};
use crate::metrics::DispatchMetrics;
use crate::middleware::{MiddlewareChain, MiddlewareContext};
use crate::registry::{MethodRegistry, ParamShape};

/// Sent when not even a generic fault can be encoded
const LAST_RESORT: &[u8] = b"<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<methodResponse><fault><value><struct>\
<member><name>faultCode</name><value><i4>-32500</i4></value></member>\
<member><name>faultString</name><value><string>XmlRpcError(&quot;response could not be encoded&quot;)</string></value></member>\
</struct></value></fault></methodResponse>";

/// When a trailing struct argument becomes keyword arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KwargsPolicy {
    /// Only for methods whose shape takes keywords
    #[default]
    ByShape,
    /// For every method
    Always,
    /// Never; structs always stay positional
    Never,
}

/// Largest request body the HTTP binding accepts, in bytes
pub const DEFAULT_MAX_BODY_SIZE: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub kwargs_policy: KwargsPolicy,
    /// Indent response documents
    pub pretty: bool,
    /// Bodies above this size are refused with 413 before decoding
    pub max_body_size: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            kwargs_policy: KwargsPolicy::default(),
            pretty: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl DispatchConfig {
    pub fn with_max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn with_kwargs_policy(mut self, policy: KwargsPolicy) -> Self {
        self.kwargs_policy = policy;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Idle,
    Decoding,
    Lookup,
    Invoking,
    Encoding,
    Done,
    Fault,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Idle => "idle",
            DispatchStage::Decoding => "decoding",
            DispatchStage::Lookup => "lookup",
            DispatchStage::Invoking => "invoking",
            DispatchStage::Encoding => "encoding",
            DispatchStage::Done => "done",
            DispatchStage::Fault => "fault",
        }
    }

    /// Whether the request has been answered
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchStage::Done | DispatchStage::Fault)
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn enter(stage: DispatchStage) {
    tracing::trace!(stage = %stage, "dispatch stage");
}

/// What the transport sends back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Absent on rejections
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: Some(envelope::CONTENT_TYPE),
            body,
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: 400,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.status == 400
    }
}

/// Routes decoded calls to registered handlers
#[derive(Clone)]
pub struct Dispatcher {
    registry: MethodRegistry,
    faults: Arc<FaultRegistry>,
    config: DispatchConfig,
    middleware: MiddlewareChain,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl Dispatcher {
    /// Dispatcher over `registry`, coding faults through the global registry
    pub fn new(registry: MethodRegistry) -> Self {
        Self {
            registry,
            faults: fault::global(),
            config: DispatchConfig::default(),
            middleware: MiddlewareChain::new(),
            metrics: None,
        }
    }

    pub fn with_faults(mut self, faults: Arc<FaultRegistry>) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn faults(&self) -> &FaultRegistry {
        &self.faults
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Answer one HTTP request body
    #[tracing::instrument(skip(self, body), fields(len = body.len()))]
    pub async fn handle(&self, body: &[u8], content_type: Option<&str>) -> HttpReply {
        enter(DispatchStage::Idle);
        enter(DispatchStage::Decoding);
        let call = match envelope::decode_call(body, content_type) {
            Ok(call) => call,
            Err(err) if err.is_transport_rejection() => {
                tracing::warn!(error = %err, "request rejected");
                if let Some(metrics) = &self.metrics {
                    metrics.record_rejection(rejection_reason(content_type));
                }
                return HttpReply::rejected();
            }
            Err(err) => {
                let err = err.into_rpc_error();
                tracing::warn!(error = %err, "invalid call document");
                let response = self.fault_response("<invalid>", &err);
                return HttpReply::ok(self.encode("<invalid>", response));
            }
        };

        let method = call.method_name().to_string();
        let response = self.dispatch(call).await;
        HttpReply::ok(self.encode(&method, response))
    }

    /// Run a decoded call through lookup and invocation
    #[tracing::instrument(skip_all, fields(method = %call.method_name()))]
    pub async fn dispatch(&self, call: MethodCall) -> MethodResponse {
        let started = Instant::now();
        let (method, args) = call.into_parts();
        tracing::info!(args = args.len(), "dispatching call");

        enter(DispatchStage::Lookup);
        let def = match self.registry.lookup(&method) {
            Ok(def) => def,
            Err(err) => {
                tracing::warn!("unknown method");
                self.record(&method, "fault", started);
                return self.fault_response(&method, &err);
            }
        };

        let (args, kwargs) = self.split_keyword_args(def.shape(), args);

        enter(DispatchStage::Invoking);
        let handler = def.handler();
        let ctx = MiddlewareContext::new(method.clone(), args, kwargs);
        let invocation = self
            .middleware
            .execute(ctx, move |ctx| handler.call(ctx.args, ctx.kwargs));

        let result = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(RpcError::generic(panic_message(panic.as_ref()))),
        };

        match result {
            Ok(value) => {
                self.record(&method, "success", started);
                MethodResponse::Success(value)
            }
            Err(err) => {
                tracing::error!(error = %err, "handler failed");
                self.record(&method, "fault", started);
                self.fault_response(&method, &err)
            }
        }
    }

    /// Pop a trailing struct as keyword arguments when the method takes them
    pub fn split_keyword_args(&self, shape: &ParamShape, mut args: Args) -> (Args, Kwargs) {
        let split = match self.config.kwargs_policy {
            KwargsPolicy::ByShape => shape.takes_keywords(),
            KwargsPolicy::Always => true,
            KwargsPolicy::Never => false,
        };
        if split && matches!(args.last(), Some(Value::Struct(_))) {
            if let Some(Value::Struct(kwargs)) = args.pop() {
                return (args, kwargs);
            }
        }
        (args, Struct::new())
    }

    fn fault_response(&self, method: &str, err: &RpcError) -> MethodResponse {
        let response = MethodResponse::from_error(err, &self.faults);
        if let (Some(metrics), Some(code)) = (&self.metrics, response.fault_code()) {
            metrics.record_fault(method, code);
        }
        response
    }

    fn encode(&self, method: &str, response: MethodResponse) -> Vec<u8> {
        enter(DispatchStage::Encoding);
        let stage = if response.is_fault() {
            DispatchStage::Fault
        } else {
            DispatchStage::Done
        };

        let bytes = match envelope::encode_response(&response, self.config.pretty) {
            Ok(bytes) => {
                enter(stage);
                bytes
            }
            Err(err) => {
                tracing::error!(error = %err, "response could not be encoded");
                let fallback = self.fault_response(method, &RpcError::generic(err.to_string()));
                enter(DispatchStage::Fault);
                envelope::encode_response(&fallback, self.config.pretty)
                    .unwrap_or_else(|_| LAST_RESORT.to_vec())
            }
        };
        tracing::debug!(body = %String::from_utf8_lossy(&bytes), "response");
        bytes
    }

    fn record(&self, method: &str, status: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(method, status, started.elapsed().as_secs_f64());
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

fn rejection_reason(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some(ct) if envelope::is_xml_content_type(ct) => "malformed_xml",
        _ => "content_type",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
