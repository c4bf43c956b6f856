//! Pull-style markup tokens over quick-xml.

use std::collections::VecDeque;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use quick_xml::NsReader;

use crate::error::{DsmlError, Result};
use crate::grammar::Tag;
use crate::value::{BASE64_BINARY, XSD_NAMESPACE, XSI_NAMESPACE};

pub const DSML_NAMESPACE: &str = "urn:oasis:names:tc:DSML:2:0:core";

/// An opening tag with its plain attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: Tag,
    pub attributes: Vec<(String, String)>,
    /// Carries `xsi:type="xsd:base64Binary"`.
    pub binary: bool,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            binary: false,
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Open(Element),
    Close(Tag),
}

pub trait TokenSource {
    /// Next structural token, `None` at end of input. Whitespace between
    /// structural tokens is skipped; any other stray text is an error.
    fn next_token(&mut self) -> Result<Option<Token>>;

    /// Text up to the next structural token, which stays pending.
    fn next_text(&mut self) -> Result<String>;
}

pub struct XmlTokenReader<'i> {
    reader: NsReader<&'i [u8]>,
    pending: VecDeque<Token>,
}

fn tag_of(local: &[u8]) -> Result<Tag> {
    let name = std::str::from_utf8(local)?;
    Tag::from_name(name).ok_or_else(|| DsmlError::UnknownTag(name.to_owned()))
}

fn is_namespace_declaration(key: QName<'_>) -> bool {
    key.as_ref() == b"xmlns" || key.prefix().map_or(false, |p| p.as_ref() == b"xmlns")
}

impl<'i> XmlTokenReader<'i> {
    pub fn new(input: &'i str) -> Self {
        let mut reader = NsReader::from_str(input);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            pending: VecDeque::new(),
        }
    }

    fn is_base64_type(&self, value: &str) -> bool {
        let (ns, local) = self.reader.resolve_element(QName(value.as_bytes()));
        if local.as_ref() != BASE64_BINARY.as_bytes() {
            return false;
        }
        match ns {
            ResolveResult::Bound(Namespace(uri)) => uri == XSD_NAMESPACE.as_bytes(),
            ResolveResult::Unknown(prefix) => prefix == b"xsd",
            ResolveResult::Unbound => false,
        }
    }

    fn element(&self, start: &BytesStart<'_>) -> Result<Element> {
        let mut element = Element::new(tag_of(start.local_name().as_ref())?);
        for attr in start.attributes() {
            let attr = attr?;
            if is_namespace_declaration(attr.key) {
                continue;
            }
            let value = attr.unescape_value()?.into_owned();
            let (ns, local) = self.reader.resolve_attribute(attr.key);
            let local = std::str::from_utf8(local.as_ref())?;
            let is_xsi = match ns {
                ResolveResult::Unbound => {
                    element.attributes.push((local.to_owned(), value));
                    continue;
                }
                ResolveResult::Bound(Namespace(uri)) => uri == XSI_NAMESPACE.as_bytes(),
                ResolveResult::Unknown(prefix) => prefix == b"xsi",
            };
            if is_xsi && local == "type" && self.is_base64_type(&value) {
                element.binary = true;
            }
        }
        Ok(element)
    }

    /// Reads one raw event and turns it into a token, text or nothing.
    fn read(&mut self) -> Result<Read> {
        match self.reader.read_event()? {
            Event::Start(e) => Ok(Read::Token(Token::Open(self.element(&e)?))),
            Event::Empty(e) => {
                let element = self.element(&e)?;
                self.pending.push_back(Token::Close(element.tag));
                Ok(Read::Token(Token::Open(element)))
            }
            Event::End(e) => Ok(Read::Token(Token::Close(tag_of(e.local_name().as_ref())?))),
            Event::Text(e) => Ok(Read::Text(e.unescape()?.into_owned())),
            Event::CData(e) => {
                let raw = e.into_inner();
                let text = std::str::from_utf8(&raw)?;
                Ok(Read::Text(text.to_owned()))
            }
            Event::Eof => Ok(Read::Eof),
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => Ok(Read::Skip),
        }
    }
}

enum Read {
    Token(Token),
    Text(String),
    Skip,
    Eof,
}

impl<'i> TokenSource for XmlTokenReader<'i> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(t) = self.pending.pop_front() {
            return Ok(Some(t));
        }
        loop {
            match self.read()? {
                Read::Token(t) => return Ok(Some(t)),
                Read::Text(text) if text.trim().is_empty() => continue,
                Read::Text(text) => return Err(DsmlError::UnexpectedText(text.trim().to_owned())),
                Read::Skip => continue,
                Read::Eof => return Ok(None),
            }
        }
    }

    fn next_text(&mut self) -> Result<String> {
        let mut text = String::new();
        if !self.pending.is_empty() {
            return Ok(text);
        }
        loop {
            match self.read()? {
                Read::Text(t) => text.push_str(&t),
                Read::Skip => continue,
                Read::Token(t) => {
                    // an Empty element may already have queued its close
                    self.pending.push_front(t);
                    return Ok(text);
                }
                Read::Eof => return Err(DsmlError::UnexpectedEof),
            }
        }
    }
}

#[cfg(test)]
fn tokens(xml: &str) -> Vec<Token> {
    let mut r = XmlTokenReader::new(xml);
    let mut out = Vec::new();
    while let Some(t) = r.next_token().unwrap() {
        out.push(t);
    }
    out
}

#[test]
fn empty_element_test() {
    let t = tokens(r#"<present name="mail"/>"#);
    assert_eq!(
        t,
        vec![
            Token::Open(Element::new(Tag::Present).with_attribute("name", "mail")),
            Token::Close(Tag::Present),
        ]
    );
}

#[test]
fn prefixed_names_test() {
    let t = tokens(r#"<dsml:batchRequest xmlns:dsml="urn:oasis:names:tc:DSML:2:0:core" requestID="1"></dsml:batchRequest>"#);
    assert_eq!(
        t,
        vec![
            Token::Open(Element::new(Tag::BatchRequest).with_attribute("requestID", "1")),
            Token::Close(Tag::BatchRequest),
        ]
    );
}

#[test]
fn binary_marker_test() {
    let xml = r#"<value xmlns:xsd="http://www.w3.org/2001/XMLSchema"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
        xsi:type="xsd:base64Binary">AA==</value>"#;
    let mut r = XmlTokenReader::new(xml);
    match r.next_token().unwrap() {
        Some(Token::Open(e)) => {
            assert!(e.binary);
            assert!(e.attributes.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(r.next_text().unwrap(), "AA==");
    assert_eq!(r.next_token().unwrap(), Some(Token::Close(Tag::Value)));

    let mut r = XmlTokenReader::new(r#"<value xsi:type="xsd:base64Binary">AA==</value>"#);
    assert!(matches!(r.next_token().unwrap(), Some(Token::Open(e)) if e.binary));

    let mut r = XmlTokenReader::new(r#"<value xsi:type="xsd:string">AA==</value>"#);
    assert!(matches!(r.next_token().unwrap(), Some(Token::Open(e)) if !e.binary));
}

#[test]
fn text_is_read_lazily_test() {
    let mut r = XmlTokenReader::new("<value> a &amp; <![CDATA[<b>]]> </value><value/>");
    assert!(matches!(r.next_token().unwrap(), Some(Token::Open(_))));
    assert_eq!(r.next_text().unwrap(), " a & <b> ");
    assert_eq!(r.next_token().unwrap(), Some(Token::Close(Tag::Value)));
    assert!(matches!(r.next_token().unwrap(), Some(Token::Open(_))));
    assert_eq!(r.next_text().unwrap(), "");
    assert_eq!(r.next_token().unwrap(), Some(Token::Close(Tag::Value)));
    assert_eq!(r.next_token().unwrap(), None);
}

#[test]
fn stray_text_and_unknown_tags_test() {
    let mut r = XmlTokenReader::new("<filter>oops</filter>");
    r.next_token().unwrap();
    assert!(matches!(r.next_token(), Err(DsmlError::UnexpectedText(t)) if t == "oops"));

    let mut r = XmlTokenReader::new("<unbindRequest/>");
    assert!(matches!(r.next_token(), Err(DsmlError::UnknownTag(t)) if t == "unbindRequest"));
}
