//! ServerProxy against a canned HTTP endpoint

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use warp::http::StatusCode;
use warp::Filter;
use xrow_client::{Error, FaultKind, ServerProxy, Struct, Value, USER_AGENT};

/// What the mock endpoint saw on its last request
#[derive(Debug, Default, Clone)]
struct Seen {
    content_type: Option<String>,
    user_agent: Option<String>,
    body: String,
}

/// Serves `status` and `body` for every POST, recording the request
fn mock(status: StatusCode, body: &'static str) -> (SocketAddr, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let record = Arc::clone(&seen);

    let route = warp::post()
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::header::optional::<String>("user-agent"))
        .and(warp::body::bytes())
        .map(
            move |content_type: Option<String>,
                  user_agent: Option<String>,
                  bytes: warp::hyper::body::Bytes| {
                *record.lock().unwrap() = Seen {
                    content_type,
                    user_agent,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                };
                warp::reply::with_status(
                    warp::reply::with_header(body, "content-type", "text/xml"),
                    status,
                )
            },
        );

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, seen)
}

const SUCCESS: &str = r#"<?xml version="1.0"?>
<methodResponse><params><param><value><string>pong</string></value></param></params></methodResponse>"#;

const FAULT: &str = r#"<?xml version="1.0"?>
<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>-32601</int></value></member>
<member><name>faultString</name><value><string>MethodNotFound("nope")</string></value></member>
</struct></value></fault></methodResponse>"#;

#[tokio::test]
async fn test_request_headers_and_body() {
    let (addr, seen) = mock(StatusCode::OK, SUCCESS);
    let proxy = ServerProxy::new(&format!("http://{}/RPC2", addr)).unwrap();

    let value = proxy.call("ping", vec![Value::from(7)]).await.unwrap();
    assert_eq!(value, Value::from("pong"));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.content_type.as_deref(), Some("text/xml"));
    assert_eq!(seen.user_agent.as_deref(), Some(USER_AGENT));
    assert!(seen.body.contains("<methodName>ping</methodName>"));
    assert!(seen.body.contains("<i4>7</i4>"));
}

#[tokio::test]
async fn test_custom_user_agent() {
    let (addr, seen) = mock(StatusCode::OK, SUCCESS);
    let proxy = ServerProxy::new(&format!("http://{}/", addr))
        .unwrap()
        .with_user_agent("tester/1.0");

    proxy.call("ping", vec![]).await.unwrap();
    assert_eq!(seen.lock().unwrap().user_agent.as_deref(), Some("tester/1.0"));
}

#[tokio::test]
async fn test_kwargs_travel_as_trailing_struct() {
    let (addr, seen) = mock(StatusCode::OK, SUCCESS);
    let proxy = ServerProxy::new(&format!("http://{}/", addr)).unwrap();

    let mut kwargs = Struct::new();
    kwargs.insert("verbose", true);
    proxy
        .call_with_kwargs("ping", vec![Value::from("a")], kwargs)
        .await
        .unwrap();

    let body = seen.lock().unwrap().body.clone();
    let string_at = body.find("<string>a</string>").unwrap();
    let struct_at = body.find("<name>verbose</name>").unwrap();
    assert!(string_at < struct_at);
}

#[tokio::test]
async fn test_fault_response() {
    let (addr, _) = mock(StatusCode::OK, FAULT);
    let proxy = ServerProxy::new(&format!("http://{}/", addr)).unwrap();

    match proxy.call("nope", vec![]).await {
        Err(Error::Rpc(err)) => {
            assert_eq!(err.kind(), &FaultKind::METHOD_NOT_FOUND);
            assert_eq!(err.message(), "MethodNotFound(\"nope\")");
        }
        other => panic!("expected fault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_status_is_http_error() {
    let (addr, _) = mock(StatusCode::INTERNAL_SERVER_ERROR, SUCCESS);
    let proxy = ServerProxy::new(&format!("http://{}/", addr)).unwrap();

    match proxy.call("ping", vec![]).await {
        Err(Error::Http(message)) => assert!(message.contains("500"), "{}", message),
        other => panic!("expected http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_body_is_invalid_response() {
    let (addr, _) = mock(StatusCode::OK, "");
    let proxy = ServerProxy::new(&format!("http://{}/", addr)).unwrap();

    assert!(matches!(
        proxy.call("ping", vec![]).await,
        Err(Error::InvalidResponse(_))
    ));
}
