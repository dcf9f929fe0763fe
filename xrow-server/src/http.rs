//! HTTP binding for the dispatcher
//!
//! A `warp` filter that feeds POST bodies and their `Content-Type` header into
//! [`Dispatcher::handle`] and writes the [`HttpReply`] back. It carries no
//! other HTTP logic: any path is accepted, and non-POST requests fall through
//! to warp's own rejection handling. Bodies larger than
//! [`DispatchConfig::max_body_size`](crate::DispatchConfig) are refused with
//! 413 before any decoding, and a body without `Content-Length` with 411.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xrow_server::{http, Dispatcher, MethodRegistry};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let dispatcher = Arc::new(Dispatcher::new(MethodRegistry::new()));
//! warp::serve(http::routes(dispatcher))
//!     .run(([127, 0, 0, 1], 8000))
//!     .await;
//! # }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::dispatcher::{Dispatcher, HttpReply};

/// Filter answering XML-RPC calls with `dispatcher`
pub fn routes(
    dispatcher: Arc<Dispatcher>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let limit = dispatcher.config().max_body_size;
    warp::post()
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
        .and_then(move |content_type: Option<String>, body: Bytes| {
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                let reply = dispatcher.handle(&body, content_type.as_deref()).await;
                Ok::<_, Infallible>(into_response(reply))
            }
        })
}

/// Convert a dispatcher reply into a warp response
pub fn into_response(reply: HttpReply) -> Response {
    let mut response = Response::new(reply.body.into());
    *response.status_mut() =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if let Some(content_type) = reply.content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}
