//! Request and response documents
//!
//! The server side reads calls with [`decode_call`] and writes answers with
//! [`encode_response`]; the client side mirrors that with [`encode_call`]
//! and [`decode_response`].
//!
//! # Decoding a call
//!
//! 1. The content type must mention `xml`, otherwise the request is refused
//!    at the transport level.
//! 2. The body must be well-formed XML (transport level again) and follow the
//!    `methodCall` grammar (a `ParseError` fault otherwise).
//! 3. The method name is the text of `<methodName>`.
//! 4. Every `params/param/value` becomes one positional argument.
//!
//! Splitting a trailing struct into keyword arguments depends on the target
//! method, so it happens later, in the dispatcher.
//!
//! # Examples
//!
//! ```rust
//! use xrow_core::{envelope, MethodResponse, Value};
//!
//! let body = br#"<?xml version="1.0"?>
//! <methodCall>
//!   <methodName>add</methodName>
//!   <params>
//!     <param><value><i4>1</i4></value></param>
//!     <param><value><i4>2</i4></value></param>
//!   </params>
//! </methodCall>"#;
//!
//! let call = envelope::decode_call(body, Some("text/xml")).unwrap();
//! assert_eq!(call.method_name(), "add");
//! assert_eq!(call.params(), &[Value::Integer(1), Value::Integer(2)]);
//!
//! let bytes = envelope::encode_response(&MethodResponse::success(3), false).unwrap();
//! assert!(String::from_utf8(bytes).unwrap().contains("<i4>3</i4>"));
//! ```

use crate::codec::{self, tag};
use crate::error::{Error, Result};
use crate::schema;
use crate::types::{MethodCall, MethodResponse};
use crate::value::{Struct, Value};
use crate::xml::{self, Element};

/// Content type of every document this crate produces
pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

const FAULT_CODE: &str = "faultCode";
const FAULT_STRING: &str = "faultString";

/// Whether a request content type announces an XML body
pub fn is_xml_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("xml")
}

/// Decode an HTTP request body into a call
pub fn decode_call(body: &[u8], content_type: Option<&str>) -> Result<MethodCall> {
    match content_type {
        Some(ct) if is_xml_content_type(ct) => parse_call(body),
        other => Err(Error::UnsupportedContentType(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// Decode a call document, without looking at the content type
pub fn parse_call(body: &[u8]) -> Result<MethodCall> {
    let root = xml::parse_document(body)?;
    schema::validate_call(&root)?;

    let method_name = root
        .child(tag::METHOD_NAME)
        .map(|name| name.text_or_empty().trim().to_string())
        .unwrap_or_default();

    let params = match root.child(tag::PARAMS) {
        Some(params) => params
            .children_named(tag::PARAM)
            .filter_map(|param| param.child(tag::VALUE))
            .map(codec::decode)
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(MethodCall::new(method_name, params))
}

/// Encode a call document
pub fn encode_call(call: &MethodCall) -> Result<Vec<u8>> {
    let mut params = Element::new(tag::PARAMS);
    for value in call.params() {
        params.push(Element::new(tag::PARAM).with_child(codec::encode_value(value)?));
    }
    let root = Element::new(tag::METHOD_CALL)
        .with_child(Element::with_text(tag::METHOD_NAME, call.method_name()))
        .with_child(params);
    xml::write_document(&root, false)
}

/// Encode a response document, indented when `pretty` is set
pub fn encode_response(response: &MethodResponse, pretty: bool) -> Result<Vec<u8>> {
    let body = match response {
        MethodResponse::Success(value) => Element::new(tag::PARAMS)
            .with_child(Element::new(tag::PARAM).with_child(codec::encode_value(value)?)),
        MethodResponse::Fault { code, message } => {
            let mut fault = Struct::with_capacity(2);
            fault.insert(FAULT_CODE, *code);
            fault.insert(FAULT_STRING, message.as_str());
            Element::new(tag::FAULT).with_child(codec::encode_value(&Value::Struct(fault))?)
        }
    };
    xml::write_document(&Element::new(tag::METHOD_RESPONSE).with_child(body), pretty)
}

/// Decode a response document
///
/// Anything that is not a well-formed `methodResponse` is reported as
/// [`Error::InvalidResponse`].
pub fn decode_response(body: &[u8]) -> Result<MethodResponse> {
    let invalid = |e: Error| Error::InvalidResponse(e.to_string());

    let root = xml::parse_document(body).map_err(invalid)?;
    schema::validate_response(&root).map_err(invalid)?;

    if let Some(fault) = root.child(tag::FAULT) {
        let value = fault
            .child(tag::VALUE)
            .map(codec::decode)
            .transpose()
            .map_err(invalid)?;
        return fault_from_value(value);
    }

    let value = root
        .child(tag::PARAMS)
        .and_then(|params| params.child(tag::PARAM))
        .and_then(|param| param.child(tag::VALUE))
        .ok_or_else(|| Error::InvalidResponse("response carries no value".into()))?;
    codec::decode(value).map(MethodResponse::Success).map_err(invalid)
}

fn fault_from_value(value: Option<Value>) -> Result<MethodResponse> {
    let fault = match value {
        Some(Value::Struct(fault)) => fault,
        _ => return Err(Error::InvalidResponse("fault is not a struct".into())),
    };

    let code = match fault.get(FAULT_CODE) {
        Some(Value::Integer(code)) => i32::try_from(*code).ok(),
        Some(Value::Double(code))
            if code.fract() == 0.0
                && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(code) =>
        {
            Some(*code as i32)
        }
        _ => None,
    }
    .ok_or_else(|| Error::InvalidResponse("fault has no integer faultCode".into()))?;

    let message = match fault.get(FAULT_STRING) {
        Some(Value::String(message)) => message.clone(),
        Some(_) => return Err(Error::InvalidResponse("faultString is not a string".into())),
        None => String::new(),
    };

    Ok(MethodResponse::Fault { code, message })
}
