//! Full client-server integration tests over HTTP

use std::sync::Arc;

use xrow_client::{Error, ServerProxy};
use xrow_core::{FaultKind, FaultRegistry};
use xrow_macros::method;
use xrow_server::{from_sync_fn, Kwargs, MethodDef, ParamShape, RpcError, Struct, Value, XrowServer};

#[method]
fn rpc_add(a: i64, b: i64) -> i64 {
    a + b
}

#[method]
async fn rpc_describe(subject: String, extra: Kwargs) -> String {
    let keys: Vec<&str> = extra.keys().collect();
    format!("{} [{}]", subject, keys.join(","))
}

#[method(name = "nested.test")]
fn rpc_nested() -> &'static str {
    "nested"
}

#[method]
fn rpc_quota() -> Result<(), RpcError> {
    Err(RpcError::new(FaultKind::new("QuotaExceeded"), "try later"))
}

/// Start a server on an ephemeral port and return a proxy for it
async fn start(faults: Arc<FaultRegistry>) -> (ServerProxy, tokio::task::JoinHandle<()>) {
    let server = XrowServer::builder()
        .bind(([127, 0, 0, 1], 0))
        .faults(Arc::clone(&faults))
        .add(rpc_add())
        .add(rpc_describe())
        .add(rpc_nested())
        .add(rpc_quota())
        .method(
            "rpc_args",
            MethodDef::new(
                ParamShape::new().variadic_positional(true),
                from_sync_fn(|args, _| Ok(Value::from(args.len()))),
            ),
        )
        .method(
            "rpc_error",
            MethodDef::new(
                ParamShape::new(),
                from_sync_fn(|_, _| Err(RpcError::generic("YEEEEEE!!!"))),
            ),
        )
        .build()
        .await
        .unwrap();

    let url = format!("http://{}/RPC2", server.local_addr());
    let handle = server.spawn();
    let proxy = ServerProxy::new(&url).unwrap().with_faults(faults);
    (proxy, handle)
}

fn shared_faults() -> Arc<FaultRegistry> {
    let mut faults = FaultRegistry::new();
    faults.register(FaultKind::new("QuotaExceeded"), 1001).unwrap();
    Arc::new(faults)
}

#[tokio::test]
async fn test_full_rpc_roundtrip() {
    let (proxy, handle) = start(shared_faults()).await;

    let result = proxy.call("add", vec![Value::from(5), Value::from(3)]).await.unwrap();
    assert_eq!(result, Value::Integer(8));

    let result = proxy
        .call("args", vec![Value::from(1), Value::from(2), Value::from(3)])
        .await
        .unwrap();
    assert_eq!(result, Value::Integer(3));

    handle.abort();
}

#[tokio::test]
async fn test_keyword_arguments_roundtrip() {
    let (proxy, handle) = start(shared_faults()).await;

    let mut kwargs = Struct::new();
    kwargs.insert("color", "red");
    kwargs.insert("size", 3);
    let result = proxy
        .call_with_kwargs("describe", vec![Value::from("box")], kwargs)
        .await
        .unwrap();
    assert_eq!(result, Value::from("box [color,size]"));

    handle.abort();
}

#[tokio::test]
async fn test_dotted_method_name() {
    let (proxy, handle) = start(shared_faults()).await;
    assert_eq!(
        proxy.call("nested.test", vec![]).await.unwrap(),
        Value::from("nested")
    );
    handle.abort();
}

#[tokio::test]
async fn test_error_propagation() {
    let (proxy, handle) = start(shared_faults()).await;

    match proxy.call("nonexistent", vec![]).await {
        Err(Error::Rpc(err)) => {
            assert_eq!(err.kind(), &FaultKind::METHOD_NOT_FOUND);
            assert!(err.message().contains("nonexistent"));
        }
        other => panic!("expected MethodNotFound, got {:?}", other),
    }

    match proxy.call("error", vec![]).await {
        Err(Error::Rpc(err)) => {
            assert_eq!(err.kind(), &FaultKind::APPLICATION_ERROR);
            assert!(err.message().contains("YEEEEEE!!!"));
        }
        other => panic!("expected generic fault, got {:?}", other),
    }

    handle.abort();
}

#[tokio::test]
async fn test_custom_fault_kind_roundtrip() {
    let (proxy, handle) = start(shared_faults()).await;

    match proxy.call("quota", vec![]).await {
        Err(Error::Rpc(err)) => {
            assert_eq!(err.kind().name(), "QuotaExceeded");
            assert_eq!(err.message(), "QuotaExceeded(\"try later\")");
        }
        other => panic!("expected QuotaExceeded, got {:?}", other),
    }

    handle.abort();
}

#[tokio::test]
async fn test_unregistered_fault_code_survives() {
    let (server_side, handle) = start(shared_faults()).await;
    // a client that does not know code 1001
    let proxy = ServerProxy::new(&server_side.uri().to_string())
        .unwrap()
        .with_faults(Arc::new(FaultRegistry::new()));

    match proxy.call("quota", vec![]).await {
        Err(Error::Rpc(err)) => {
            assert_eq!(err.code(), Some(1001));
            assert_eq!(err.kind(), &FaultKind::REMOTE_SERVER_ERROR);
        }
        other => panic!("expected remote fault, got {:?}", other),
    }

    handle.abort();
}

#[tokio::test]
async fn test_multiple_clients_same_server() {
    let (proxy, handle) = start(shared_faults()).await;

    let calls = (0..8).map(|i| {
        let proxy = proxy.clone();
        tokio::spawn(async move { proxy.call("add", vec![Value::from(i), Value::from(i)]).await })
    });
    for (i, call) in calls.enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), Value::from(2 * i));
    }

    handle.abort();
}

#[tokio::test]
async fn test_connection_refused() {
    let (proxy, handle) = start(shared_faults()).await;
    handle.abort();
    let _ = handle.await;

    assert!(matches!(proxy.call("add", vec![]).await, Err(Error::Http(_))));
}
