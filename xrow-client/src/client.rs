//! XML-RPC client over HTTP
//!
//! [`ServerProxy`] encodes a call, posts it, and decodes the answer. A fault
//! response comes back as [`Error::Rpc`] carrying the [`RpcError`] the fault
//! registry maps its code to; faults with an unregistered code keep that code.
//!
//! # Cloning
//!
//! `ServerProxy` is cheap to clone. Clones share the underlying `hyper`
//! connection pool.

use std::sync::Arc;

use hyper::client::HttpConnector;
use hyper::{header, Body, Client, Request, Uri};
use xrow_core::{envelope, fault, Error, FaultRegistry, MethodCall, Result, RpcError, Struct, Value};

/// Default `User-Agent` header
pub const USER_AGENT: &str = concat!("xrow/", env!("CARGO_PKG_VERSION"));

/// Handle to a remote XML-RPC endpoint
#[derive(Clone)]
pub struct ServerProxy {
    uri: Uri,
    http: Client<HttpConnector>,
    faults: Arc<FaultRegistry>,
    user_agent: String,
}

impl ServerProxy {
    /// Proxy for the endpoint at `url`, which must be an `http://` URL
    pub fn new(url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::Http(format!("Invalid URL {:?}: {}", url, e)))?;
        match uri.scheme_str() {
            Some("http") => {}
            other => {
                return Err(Error::Http(format!(
                    "Unsupported URL scheme: {}",
                    other.unwrap_or("<none>")
                )))
            }
        }
        Ok(Self {
            uri,
            http: Client::new(),
            faults: fault::global(),
            user_agent: USER_AGENT.to_string(),
        })
    }

    /// Decode faults through `faults` instead of the global registry
    pub fn with_faults(mut self, faults: Arc<FaultRegistry>) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Call `method` with positional arguments
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.send(MethodCall::new(method, args)).await
    }

    /// Call `method` with positional and keyword arguments
    ///
    /// Keywords travel as a trailing struct; an empty `kwargs` adds nothing.
    pub async fn call_with_kwargs(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Struct,
    ) -> Result<Value> {
        self.send(MethodCall::with_kwargs(method, args, kwargs)).await
    }

    #[tracing::instrument(skip_all, fields(method = %call.method_name(), uri = %self.uri))]
    async fn send(&self, call: MethodCall) -> Result<Value> {
        let body = envelope::encode_call(&call)?;
        let request = Request::post(self.uri.clone())
            .header(header::CONTENT_TYPE, envelope::CONTENT_TYPE)
            .header(header::USER_AGENT, self.user_agent.as_str())
            .body(Body::from(body))
            .map_err(|e| Error::Http(e.to_string()))?;

        tracing::debug!("sending call");
        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!(status = %status, "call refused");
            return Err(Error::Http(format!("Server answered {}", status)));
        }

        self.parse_response(&bytes)
    }

    /// Decode a response body into the call's outcome
    pub fn parse_response(&self, body: &[u8]) -> Result<Value> {
        envelope::decode_response(body)?
            .into_result(&self.faults)
            .map_err(|err: RpcError| {
                tracing::debug!(error = %err, "fault received");
                Error::Rpc(err)
            })
    }
}

impl std::fmt::Debug for ServerProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerProxy")
            .field("uri", &self.uri)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
