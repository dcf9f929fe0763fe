//! Simple XML-RPC server example

use xrow::macros::method;
use xrow::server::{Args, Kwargs};
use xrow::{RpcError, XrowServer};

#[method(name = "nested.test")]
fn rpc_test() {}

#[method]
fn rpc_args(args: Args) -> usize {
    args.len()
}

#[method]
fn rpc_kwargs(kwargs: Kwargs) -> usize {
    kwargs.len()
}

#[method]
fn rpc_args_kwargs(args: Args, kwargs: Kwargs) -> usize {
    args.len() + kwargs.len()
}

#[method(name = "nested.exception")]
fn rpc_exception() -> Result<(), RpcError> {
    Err(RpcError::generic("YEEEEEE!!!"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting XML-RPC server on http://127.0.0.1:8080/");

    let server = XrowServer::builder()
        .bind_str("127.0.0.1:8080")?
        .add(rpc_test())
        .add(rpc_args())
        .add(rpc_kwargs())
        .add(rpc_args_kwargs())
        .add(rpc_exception())
        .build()
        .await?;

    println!("Server is running. Available methods:");
    for name in server.dispatcher().registry().methods() {
        println!("  - {}", name);
    }
    println!("\nPress Ctrl+C to stop");

    server.run().await;

    Ok(())
}
