//! Implementation of the `#[method]` attribute
//!
//! The attributed function is kept as a nested item and wrapped twice: a
//! binder that pulls each parameter out of the call's arguments, and a factory
//! that pairs the binder with the parameter shape.
//!
//! Input:
//! ```ignore
//! #[method]
//! async fn rpc_scale(x: f64, #[kw] factor: Option<f64>) -> f64 {
//!     x * factor.unwrap_or(1.0)
//! }
//! ```
//!
//! Generated output:
//! ```ignore
//! fn rpc_scale() -> ::xrow_server::MethodDef {
//!     async fn __xrow_inner(x: f64, factor: Option<f64>) -> f64 {
//!         x * factor.unwrap_or(1.0)
//!     }
//!
//!     async fn __xrow_bind(__args: Args, __kwargs: Kwargs) -> Result<Value, RpcError> {
//!         let mut __binder = ::xrow_server::ArgBinder::new(__args, __kwargs);
//!         let x: f64 = __binder.positional("x")?;
//!         let factor: Option<f64> = __binder.keyword("factor")?;
//!         __binder.finish()?;
//!         let __out = __xrow_inner(x, factor).await;
//!         Ok(::xrow_server::Value::from(__out))
//!     }
//!
//!     ::xrow_server::MethodDef::from_fn(
//!         ::xrow_server::ParamShape::new().keyword_only(&["factor"]),
//!         __xrow_bind,
//!     )
//!     .with_rust_name("rpc_scale")
//! }
//! ```

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Attribute, FnArg, Ident, ItemFn, LitStr, Pat, ReturnType, Type};

/// Options given inside `#[method(...)]`
#[derive(Default)]
pub struct MethodArgs {
    pub name: Option<LitStr>,
}

impl MethodArgs {
    pub fn parse(&mut self, meta: syn::meta::ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported method option, expected `name = \"...\"`"))
        }
    }
}

enum ParamKind {
    Positional,
    KeywordOnly,
    RestPositional,
    RestKeyword,
}

struct Param {
    ident: Ident,
    ty: Type,
    kind: ParamKind,
}

fn is_kw(attr: &Attribute) -> bool {
    attr.path().is_ident("kw")
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == name)
            .unwrap_or(false),
        _ => false,
    }
}

fn collect_params(func: &ItemFn) -> syn::Result<Vec<Param>> {
    let mut params = Vec::new();
    let mut after_rest = false;
    for input in &func.sig.inputs {
        let typed = match input {
            FnArg::Receiver(receiver) => {
                return Err(syn::Error::new(
                    receiver.span(),
                    "#[method] functions cannot take `self`",
                ))
            }
            FnArg::Typed(typed) => typed,
        };
        let ident = match typed.pat.as_ref() {
            Pat::Ident(pat) => pat.ident.clone(),
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "#[method] parameters must be plain identifiers",
                ))
            }
        };
        let ty = typed.ty.as_ref().clone();

        let kind = if last_segment_is(&ty, "Kwargs") {
            ParamKind::RestKeyword
        } else if last_segment_is(&ty, "Args") {
            after_rest = true;
            ParamKind::RestPositional
        } else if after_rest || typed.attrs.iter().any(is_kw) {
            // everything after the positional collector can only be named
            ParamKind::KeywordOnly
        } else {
            ParamKind::Positional
        };
        params.push(Param { ident, ty, kind });
    }
    Ok(params)
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => last_segment_is(ty, "Result"),
        ReturnType::Default => false,
    }
}

pub fn expand(args: MethodArgs, func: ItemFn) -> syn::Result<TokenStream> {
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            func.sig.generics.span(),
            "#[method] functions cannot be generic",
        ));
    }
    let params = collect_params(&func)?;

    let fn_name = &func.sig.ident;
    let fn_vis = &func.vis;
    let fn_attrs = &func.attrs;
    let fn_block = &func.block;
    let output = &func.sig.output;
    let asyncness = &func.sig.asyncness;

    let inner_inputs = func.sig.inputs.iter().map(|input| match input {
        FnArg::Typed(typed) => {
            let mut typed = typed.clone();
            typed.attrs.retain(|attr| !is_kw(attr));
            quote! { #typed }
        }
        FnArg::Receiver(receiver) => quote! { #receiver },
    });

    let mut bindings = Vec::new();
    let mut deferred = Vec::new();
    let mut keyword_only = Vec::new();
    let mut variadic_positional = false;
    let mut variadic_keyword = false;
    for param in &params {
        let ident = &param.ident;
        let ty = &param.ty;
        let name = ident.unraw().to_string();
        match param.kind {
            ParamKind::Positional => bindings.push(quote! {
                let #ident: #ty = __binder.positional(#name)?;
            }),
            ParamKind::KeywordOnly => {
                keyword_only.push(name.clone());
                bindings.push(quote! {
                    let #ident: #ty = __binder.keyword(#name)?;
                });
            }
            ParamKind::RestPositional => {
                variadic_positional = true;
                bindings.push(quote! {
                    let #ident: #ty = __binder.rest_positional();
                });
            }
            ParamKind::RestKeyword => {
                variadic_keyword = true;
                deferred.push(quote! {
                    let #ident: #ty = __binder.rest_keyword();
                });
            }
        }
    }

    let idents = params.iter().map(|param| &param.ident);
    let inner = format_ident!("__xrow_inner");
    let mut invoke = quote! { #inner(#(#idents),*) };
    if asyncness.is_some() {
        invoke = quote! { #invoke.await };
    }
    if returns_result(output) {
        invoke = quote! { #invoke? };
    }

    let rust_name = fn_name.unraw().to_string();
    let public_name = args.name.map(|name| quote! { .with_public_name(#name) });

    Ok(quote! {
        #(#fn_attrs)*
        #fn_vis fn #fn_name() -> ::xrow_server::MethodDef {
            #asyncness fn #inner(#(#inner_inputs),*) #output #fn_block

            async fn __xrow_bind(
                __args: ::xrow_server::Args,
                __kwargs: ::xrow_server::Kwargs,
            ) -> ::std::result::Result<::xrow_server::Value, ::xrow_server::RpcError> {
                #[allow(unused_mut)]
                let mut __binder = ::xrow_server::ArgBinder::new(__args, __kwargs);
                #(#bindings)*
                #(#deferred)*
                __binder.finish()?;
                let __out = #invoke;
                ::std::result::Result::Ok(::xrow_server::Value::from(__out))
            }

            ::xrow_server::MethodDef::from_fn(
                ::xrow_server::ParamShape::new()
                    .variadic_positional(#variadic_positional)
                    .variadic_keyword(#variadic_keyword)
                    .keyword_only(&[#(#keyword_only),*]),
                __xrow_bind,
            )
            .with_rust_name(#rust_name)
            #public_name
        }
    })
}
