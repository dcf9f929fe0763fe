//! Simple XML-RPC client example
//!
//! Run `cargo run --example server` first.

use xrow::{Error, ServerProxy, Struct, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Calling XML-RPC server at http://127.0.0.1:8080/\n");

    let proxy = ServerProxy::new("http://127.0.0.1:8080/")?;

    let result = proxy.call("nested.test", vec![]).await?;
    println!("nested.test() = {:?}", result);

    let result = proxy
        .call("args", vec![Value::from(1), Value::from(2), Value::from(3)])
        .await?;
    println!("args(1, 2, 3) = {:?}", result);

    // Keyword arguments travel as a trailing struct
    let mut kwargs = Struct::new();
    kwargs.insert("color", "red");
    kwargs.insert("size", 4);
    let result = proxy
        .call_with_kwargs("args_kwargs", vec![Value::from("a")], kwargs)
        .await?;
    println!("args_kwargs('a', color='red', size=4) = {:?}", result);

    match proxy.call("nested.exception", vec![]).await {
        Err(Error::Rpc(fault)) => println!("nested.exception() raised {}", fault),
        other => println!("nested.exception() = {:?}", other),
    }

    Ok(())
}
