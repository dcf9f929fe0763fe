//! Procedural macros for xrow XML-RPC handlers
//!
//! # `#[method]`
//!
//! Turns a plain function into a factory returning an
//! `xrow_server::MethodDef`. The parameter list is read once, at compile
//! time, to produce both the argument binding and the parameter shape the
//! dispatcher uses to decide whether a trailing struct is keyword arguments.
//!
//! | Parameter | Bound from | Shape |
//! |---|---|---|
//! | `x: T` | next positional argument, else keyword `x` | |
//! | `#[kw] x: T` | keyword `x` | keyword-only `x` |
//! | `rest: Args` | all remaining positionals | variadic positional |
//! | any parameter after `Args` | keyword of its name | keyword-only |
//! | `extra: Kwargs` | all remaining keywords | variadic keyword |
//!
//! `T` is anything implementing `FromValue`; `Option<T>` makes a parameter
//! optional. The return type converts into a `Value`; if it is a `Result`,
//! the error converts into an `RpcError`. Both sync and async functions work.
//!
//! The factory keeps the function's name as the Rust-side name, so the
//! registry's `rpc_` prefix rule applies. `#[method(name = "...")]` publishes
//! a verbatim name instead.
//!
//! # Examples
//!
//! ```ignore
//! use xrow_server::{Kwargs, RpcError, XrowServer};
//! use xrow_macros::method;
//!
//! #[method]
//! fn rpc_add(a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! #[method(name = "nested.test")]
//! async fn rpc_nested(#[kw] label: Option<String>, extra: Kwargs) -> Result<String, RpcError> {
//!     Ok(format!("{} with {} extra", label.unwrap_or_default(), extra.len()))
//! }
//!
//! let builder = XrowServer::builder().add(rpc_add()).add(rpc_nested());
//! ```

mod method;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn};

/// Derive an XML-RPC method definition from a function
///
/// See the crate documentation for the parameter rules.
///
/// # Limitations
///
/// - Cannot use `self` (this is for free functions, not methods)
/// - No generic parameters
/// - Parameters must be plain identifiers, not patterns
#[proc_macro_attribute]
pub fn method(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = method::MethodArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);
    let func = parse_macro_input!(item as ItemFn);

    method::expand(args, func)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
