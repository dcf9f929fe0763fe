//! Structural validation of XML-RPC documents
//!
//! Runs on a parsed tree before any value is decoded and checks the envelope
//! grammar, including the nesting of arrays and structs. A document that
//! passes can be decoded without ever looking at an unexpected element where a
//! wrapper is required; the only remaining failures are unknown value types
//! and malformed scalar text.

use crate::codec::tag;
use crate::error::{Error, Result};
use crate::xml::{Element, MAX_DEPTH};

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidDocument(message.into())
}

fn expect_name(element: &Element, name: &str) -> Result<()> {
    if element.name() == name {
        Ok(())
    } else {
        Err(invalid(format!(
            "expected <{}>, found <{}>",
            name,
            element.name()
        )))
    }
}

/// `methodCall := methodName params?`
pub fn validate_call(root: &Element) -> Result<()> {
    expect_name(root, tag::METHOD_CALL)?;

    let mut children = root.children().iter();
    let method_name = children
        .next()
        .ok_or_else(|| invalid("<methodCall> has no <methodName>"))?;
    expect_name(method_name, tag::METHOD_NAME)?;
    if !method_name.children().is_empty() || method_name.text_or_empty().trim().is_empty() {
        return Err(invalid("<methodName> must hold a non-empty name"));
    }

    if let Some(params) = children.next() {
        expect_name(params, tag::PARAMS)?;
        for param in params.children() {
            validate_param(param)?;
        }
    }

    match children.next() {
        Some(extra) => Err(invalid(format!(
            "unexpected <{}> in <methodCall>",
            extra.name()
        ))),
        None => Ok(()),
    }
}

/// `methodResponse := params(param) | fault(value(struct))`
pub fn validate_response(root: &Element) -> Result<()> {
    expect_name(root, tag::METHOD_RESPONSE)?;

    let body = match root.children() {
        [body] => body,
        [] => return Err(invalid("<methodResponse> is empty")),
        _ => return Err(invalid("<methodResponse> must have exactly one child")),
    };

    match body.name() {
        tag::PARAMS => match body.children() {
            [param] => validate_param(param),
            _ => Err(invalid("a response carries exactly one <param>")),
        },
        tag::FAULT => {
            let value = single_child(body)?;
            validate_value(value, 0)?;
            match value.first_child() {
                Some(inner) if inner.name() == tag::STRUCT => Ok(()),
                _ => Err(invalid("<fault> value must be a <struct>")),
            }
        }
        other => Err(invalid(format!("unexpected <{}> in <methodResponse>", other))),
    }
}

fn single_child(element: &Element) -> Result<&Element> {
    match element.children() {
        [child] => Ok(child),
        _ => Err(invalid(format!(
            "<{}> must have exactly one child",
            element.name()
        ))),
    }
}

fn validate_param(param: &Element) -> Result<()> {
    expect_name(param, tag::PARAM)?;
    validate_value(single_child(param)?, 0)
}

/// `depth` counts the arrays and structs enclosing `value`
fn validate_value(value: &Element, depth: usize) -> Result<()> {
    expect_name(value, tag::VALUE)?;
    if depth > MAX_DEPTH {
        return Err(invalid(format!("values nested deeper than {}", MAX_DEPTH)));
    }
    match value.children() {
        [] => Ok(()),
        [typed] => validate_typed(typed, depth),
        _ => Err(invalid("<value> holds more than one type")),
    }
}

fn validate_typed(element: &Element, depth: usize) -> Result<()> {
    match element.name() {
        tag::ARRAY => {
            let data = single_child(element)?;
            expect_name(data, tag::DATA)?;
            data.children()
                .iter()
                .try_for_each(|value| validate_value(value, depth + 1))
        }
        tag::STRUCT => element
            .children()
            .iter()
            .try_for_each(|member| validate_member(member, depth + 1)),
        _ if element.children().is_empty() => Ok(()),
        other => Err(invalid(format!("<{}> cannot contain elements", other))),
    }
}

fn validate_member(member: &Element, depth: usize) -> Result<()> {
    expect_name(member, tag::MEMBER)?;
    match member.children() {
        [name, value] => {
            expect_name(name, tag::NAME)?;
            if !name.children().is_empty() {
                return Err(invalid("<name> cannot contain elements"));
            }
            validate_value(value, depth)
        }
        _ => Err(invalid("<member> must hold a <name> and a <value>")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    fn call(xml: &str) -> Result<()> {
        validate_call(&parse_document(xml.as_bytes()).unwrap())
    }

    fn response(xml: &str) -> Result<()> {
        validate_response(&parse_document(xml.as_bytes()).unwrap())
    }

    #[test]
    fn test_valid_calls() {
        assert!(call("<methodCall><methodName>ping</methodName></methodCall>").is_ok());
        assert!(call("<methodCall><methodName>ping</methodName><params/></methodCall>").is_ok());
        assert!(call(
            "<methodCall><methodName>add</methodName><params>\
             <param><value><i4>1</i4></value></param>\
             <param><value>bare</value></param>\
             <param><value><array><data><value><struct>\
               <member><name>k</name><value><nil/></value></member>\
             </struct></value></data></array></value></param>\
             </params></methodCall>"
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_calls() {
        let cases = [
            "<methodResponse/>",
            "<methodCall/>",
            "<methodCall><methodName>  </methodName></methodCall>",
            "<methodCall><params/></methodCall>",
            "<methodCall><methodName>x</methodName><params><value/></params></methodCall>",
            "<methodCall><methodName>x</methodName><params><param/></params></methodCall>",
            "<methodCall><methodName>x</methodName><params/><extra/></methodCall>",
            "<methodCall><methodName>x</methodName><params><param><value><i4>1</i4><i4>2</i4></value></param></params></methodCall>",
            "<methodCall><methodName>x</methodName><params><param><value><array><value/></array></value></param></params></methodCall>",
            "<methodCall><methodName>x</methodName><params><param><value><struct><member><name>a</name></member></struct></value></param></params></methodCall>",
            "<methodCall><methodName>x</methodName><params><param><value><i4><b/></i4></value></param></params></methodCall>",
        ];
        for xml in cases {
            assert!(
                matches!(call(xml), Err(Error::InvalidDocument(_))),
                "{}",
                xml
            );
        }
    }

    fn nested_array(depth: usize) -> Element {
        let mut value = Element::new(tag::VALUE).with_child(Element::with_text(tag::I4, "1"));
        for _ in 0..depth {
            let data = Element::new(tag::DATA).with_child(value);
            value = Element::new(tag::VALUE).with_child(Element::new(tag::ARRAY).with_child(data));
        }
        Element::new(tag::METHOD_CALL)
            .with_child(Element::with_text(tag::METHOD_NAME, "deep"))
            .with_child(
                Element::new(tag::PARAMS).with_child(Element::new(tag::PARAM).with_child(value)),
            )
    }

    #[test]
    fn test_nesting_limit() {
        assert!(validate_call(&nested_array(MAX_DEPTH)).is_ok());
        assert!(matches!(
            validate_call(&nested_array(MAX_DEPTH + 1)),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_deep_document_is_invalid_not_malformed() {
        let depth = 10_000;
        let xml = format!(
            "<methodCall><methodName>deep</methodName><params><param>{}<i4>1</i4>{}</param></params></methodCall>",
            "<value><array><data>".repeat(depth),
            "</data></array></value>".repeat(depth),
        );
        assert!(matches!(
            parse_document(xml.as_bytes()),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_valid_responses() {
        assert!(response(
            "<methodResponse><params><param><value><string>ok</string></value></param></params></methodResponse>"
        )
        .is_ok());
        assert!(response(
            "<methodResponse><fault><value><struct>\
             <member><name>faultCode</name><value><i4>1</i4></value></member>\
             <member><name>faultString</name><value><string>x</string></value></member>\
             </struct></value></fault></methodResponse>"
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_responses() {
        let cases = [
            "<methodResponse/>",
            "<methodResponse><params/></methodResponse>",
            "<methodResponse><params><param><value/></param><param><value/></param></params></methodResponse>",
            "<methodResponse><fault><value><i4>1</i4></value></fault></methodResponse>",
            "<methodResponse><params/><fault/></methodResponse>",
        ];
        for xml in cases {
            assert!(response(xml).is_err(), "{}", xml);
        }
    }
}
