//! A minimal XML element tree
//!
//! XML-RPC documents are small and shallow, so the codec works on a plain
//! owned tree instead of streaming. [`parse_document`] builds the tree with
//! `quick-xml`, enforces well-formedness and caps nesting at [`MAX_DEPTH`];
//! [`write_document`] serializes a tree back, with an XML declaration and
//! optional indentation.
//!
//! Attributes, comments and processing instructions are accepted on input and
//! ignored. Text and CDATA sections of one element are concatenated.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// Deepest element nesting a document may have
pub const MAX_DEPTH: usize = 256;

/// An element with its text content and child elements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Text content, or the empty string for an element without text
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First child element, whatever its name
    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Characters allowed by the XML 1.0 `Char` production
pub fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

/// Fail if `text` holds a character XML 1.0 cannot carry
pub fn check_chars(text: &str) -> std::result::Result<(), char> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(c),
        None => Ok(()),
    }
}

fn malformed(err: impl std::fmt::Display) -> Error {
    Error::MalformedXml(err.to_string())
}

/// Parse a complete document into its root element
///
/// Errors that make the input something other than well-formed XML are
/// reported as [`Error::MalformedXml`]. A declared encoding other than UTF-8
/// gives [`Error::UnsupportedEncoding`]; characters outside the XML 1.0 range
/// give [`Error::InvalidCharacter`]. Elements nested more than [`MAX_DEPTH`]
/// levels give [`Error::InvalidDocument`].
pub fn parse_document(bytes: &[u8]) -> Result<Element> {
    let text = std::str::from_utf8(bytes).map_err(malformed)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Decl(decl) => {
                if let Some(encoding) = decl.encoding() {
                    let encoding = encoding.map_err(malformed)?;
                    let encoding = String::from_utf8_lossy(&encoding).to_ascii_lowercase();
                    if !matches!(encoding.as_str(), "utf-8" | "utf8" | "us-ascii" | "ascii") {
                        return Err(Error::UnsupportedEncoding(encoding));
                    }
                }
            }
            Event::Start(start) => {
                let element = open_element(&start, &stack, &root)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start, &stack, &root)?;
                close_element(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::MalformedXml("unexpected closing tag".into()))?;
                close_element(element, &mut stack, &mut root);
            }
            Event::Text(raw) => {
                let content = raw.unescape().map_err(malformed)?;
                append_text(&mut stack, &content)?;
            }
            Event::CData(raw) => {
                let content = String::from_utf8(raw.into_inner().into_owned()).map_err(malformed)?;
                append_text(&mut stack, &content)?;
            }
            Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::MalformedXml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| Error::MalformedXml("document has no root element".into()))
}

fn open_element(start: &BytesStart, stack: &[Element], root: &Option<Element>) -> Result<Element> {
    if stack.is_empty() && root.is_some() {
        return Err(Error::MalformedXml("more than one root element".into()));
    }
    for attribute in start.attributes() {
        attribute.map_err(malformed)?;
    }
    if stack.len() >= MAX_DEPTH {
        return Err(Error::InvalidDocument(format!(
            "elements nested deeper than {}",
            MAX_DEPTH
        )));
    }
    let qname = start.name();
    let name = std::str::from_utf8(qname.as_ref()).map_err(malformed)?;
    Ok(Element::new(name))
}

fn close_element(element: Element, stack: &mut [Element], root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn append_text(stack: &mut [Element], content: &str) -> Result<()> {
    if let Err(c) = check_chars(content) {
        return Err(Error::InvalidCharacter(format!("{:?}", c)));
    }
    match stack.last_mut() {
        Some(element) => {
            element
                .text
                .get_or_insert_with(String::new)
                .push_str(content);
            Ok(())
        }
        None if content.trim().is_empty() => Ok(()),
        None => Err(Error::MalformedXml("text outside the root element".into())),
    }
}

/// Serialize a tree as a UTF-8 document with an XML declaration
pub fn write_document(root: &Element, pretty: bool) -> Result<Vec<u8>> {
    let mut writer = if pretty {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(|e| Error::Io(e.to_string()))?;
    write_element(&mut writer, root)?;

    Ok(writer.into_inner())
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> Result<()> {
    let io = |e: quick_xml::Error| Error::Io(e.to_string());
    let name = element.name.as_str();

    if element.text.is_none() && element.children.is_empty() {
        return writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(io);
    }

    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(io)?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(io)?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(io)
}
