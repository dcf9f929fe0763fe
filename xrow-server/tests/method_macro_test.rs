//! `#[method]` expansion tests: binding, shapes and naming

use xrow_core::{envelope, FaultKind, MethodCall, MethodResponse};
use xrow_macros::method;
use xrow_server::{Args, Dispatcher, Kwargs, MethodRegistry, ParamShape, RpcError, Struct, Value};

#[method]
fn rpc_add(a: i64, b: i64) -> i64 {
    a + b
}

#[method]
async fn rpc_greet(name: String, greeting: Option<String>) -> String {
    format!("{}, {}!", greeting.unwrap_or_else(|| "Hello".to_string()), name)
}

#[method]
fn rpc_divide(a: f64, b: f64) -> Result<f64, RpcError> {
    if b == 0.0 {
        return Err(RpcError::application("division by zero"));
    }
    Ok(a / b)
}

#[method]
fn rpc_count(items: Args) -> usize {
    items.len()
}

#[method]
fn rpc_scale(x: f64, #[kw] factor: Option<f64>) -> f64 {
    x * factor.unwrap_or(1.0)
}

#[method]
fn rpc_collect(first: i64, rest: Args, label: String, extra: Kwargs) -> Value {
    let mut out = Struct::new();
    out.insert("first", first);
    out.insert("rest", rest);
    out.insert("label", label);
    out.insert("extra", extra);
    Value::Struct(out)
}

#[method(name = "system.ping")]
fn rpc_ping() {}

#[method]
fn rpc_kind(#[kw] r#type: String) -> String {
    r#type
}

#[method]
fn r#rpc_type() -> &'static str {
    "raw"
}

fn registry() -> MethodRegistry {
    MethodRegistry::builder()
        .add(rpc_add())
        .add(rpc_greet())
        .add(rpc_divide())
        .add(rpc_count())
        .add(rpc_scale())
        .add(rpc_collect())
        .add(rpc_ping())
        .build()
}

async fn call(method: &str, params: Vec<Value>) -> MethodResponse {
    let dispatcher = Dispatcher::new(registry());
    dispatcher.dispatch(MethodCall::new(method, params)).await
}

fn kwargs(pairs: &[(&str, Value)]) -> Value {
    Value::Struct(pairs.iter().cloned().collect())
}

#[test]
fn test_public_names() {
    assert_eq!(
        registry().methods(),
        vec!["add", "collect", "count", "divide", "greet", "scale", "system.ping"]
    );
}

#[test]
fn test_shapes() {
    let registry = registry();
    let shape = |name: &str| registry.lookup(name).unwrap().shape().clone();

    assert_eq!(shape("add"), ParamShape::new());
    assert_eq!(shape("count"), ParamShape::new().variadic_positional(true));
    assert_eq!(shape("scale"), ParamShape::new().keyword_only(&["factor"]));
    assert_eq!(
        shape("collect"),
        ParamShape::new()
            .variadic_positional(true)
            .variadic_keyword(true)
            .keyword_only(&["label"])
    );
}

#[tokio::test]
async fn test_positional_binding() {
    assert_eq!(
        call("add", vec![Value::from(2), Value::from(3)]).await,
        MethodResponse::success(5)
    );
    assert_eq!(
        call("greet", vec![Value::from("Ada")]).await,
        MethodResponse::success("Hello, Ada!")
    );
    assert_eq!(
        call("count", vec![Value::Null, Value::Null]).await,
        MethodResponse::success(2)
    );
}

#[tokio::test]
async fn test_result_errors_become_faults() {
    assert_eq!(
        call("divide", vec![Value::from(1.0), Value::from(4.0)]).await,
        MethodResponse::success(0.25)
    );
    let response = call("divide", vec![Value::from(1.0), Value::from(0.0)]).await;
    assert_eq!(
        response,
        MethodResponse::fault(-32500, "ApplicationError(\"division by zero\")")
    );
}

#[tokio::test]
async fn test_argument_errors() {
    let invalid = FaultKind::INVALID_ARGUMENTS;
    let code = xrow_core::fault::global().code_of(&invalid);

    assert_eq!(call("add", vec![Value::from(1)]).await.fault_code(), code);
    assert_eq!(
        call("add", vec![Value::from(1), Value::from(2), Value::from(3)])
            .await
            .fault_code(),
        code
    );
    assert_eq!(
        call("add", vec![Value::from(1), Value::from("2")]).await.fault_code(),
        code
    );
}

#[tokio::test]
async fn test_keyword_only_parameter() {
    assert_eq!(
        call(
            "scale",
            vec![Value::from(2.0), kwargs(&[("factor", Value::from(3.0))])]
        )
        .await,
        MethodResponse::success(6.0)
    );
    assert_eq!(
        call("scale", vec![Value::from(2.0)]).await,
        MethodResponse::success(2.0)
    );
}

#[tokio::test]
async fn test_positional_parameter_rejects_struct_when_not_split() {
    // `add` takes no keywords, so the struct stays positional and fails to bind
    let response = call("add", vec![Value::from(1), kwargs(&[("b", Value::from(2))])]).await;
    assert_eq!(response.fault_code(), Some(-32602));
}

#[tokio::test]
async fn test_collectors() {
    let response = call(
        "collect",
        vec![
            Value::from(1),
            Value::from(2),
            Value::from(3),
            kwargs(&[("label", Value::from("x")), ("mode", Value::from("fast"))]),
        ],
    )
    .await;

    let mut extra = Struct::new();
    extra.insert("mode", "fast");
    let mut expected = Struct::new();
    expected.insert("first", 1);
    expected.insert("rest", vec![2, 3]);
    expected.insert("label", "x");
    expected.insert("extra", extra);
    assert_eq!(response, MethodResponse::success(expected));
}

#[tokio::test]
async fn test_unit_return_and_explicit_name() {
    assert_eq!(call("system.ping", vec![]).await, MethodResponse::success(Value::Null));
    assert_eq!(call("ping", vec![]).await.fault_code(), Some(-32601));
}

#[tokio::test]
async fn test_raw_identifier_parameter() {
    let registry = MethodRegistry::builder().add(rpc_kind()).build();
    assert_eq!(
        registry.lookup("kind").unwrap().shape(),
        &ParamShape::new().keyword_only(&["type"])
    );

    let dispatcher = Dispatcher::new(registry);
    let body = envelope::encode_call(&MethodCall::with_kwargs(
        "kind",
        vec![],
        [("type", "struct")].into_iter().collect(),
    ))
    .unwrap();
    let reply = dispatcher.handle(&body, Some("text/xml")).await;
    assert_eq!(
        envelope::decode_response(&reply.body).unwrap(),
        MethodResponse::success("struct")
    );
}

#[tokio::test]
async fn test_raw_identifier_function_name() {
    let registry = MethodRegistry::builder().add(r#rpc_type()).build();
    assert_eq!(registry.methods(), vec!["type"]);

    let response = Dispatcher::new(registry)
        .dispatch(MethodCall::new("type", vec![]))
        .await;
    assert_eq!(response, MethodResponse::success("raw"));
}
