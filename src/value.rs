//! Text / binary value policy shared by the parser and the serializer.
//!
//! A DSML value is carried either as literal element text or, when flagged with
//! `xsi:type="xsd:base64Binary"`, as base64. Parsing trims literal text, so any
//! text whose edges are whitespace also has to travel as base64.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::error::BuilderError;

pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";
pub const BASE64_BINARY: &str = "base64Binary";

/// Equality is on the payload bytes: the same value may come back as
/// `Binary` after a trip through base64.
#[derive(Debug, Clone, Eq)]
pub enum Value {
    Text(String),
    Binary(Vec<u8>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Value {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Text(s) => s.as_bytes(),
            Value::Binary(b) => b,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

fn is_unsafe_char(c: char) -> bool {
    match c {
        '\t' | '\n' => false,
        '\u{fffe}' | '\u{ffff}' => true,
        c => c.is_control(),
    }
}

/// True when the value cannot be written as literal element text and read
/// back unchanged.
pub fn needs_base64_encoding(value: &Value) -> bool {
    match value {
        Value::Binary(_) => true,
        Value::Text(s) => {
            s.chars().any(is_unsafe_char)
                || s.starts_with(char::is_whitespace)
                || s.ends_with(char::is_whitespace)
        }
    }
}

pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Turns element text into a value. Binary payloads may be wrapped over
/// several lines, so all whitespace is dropped before decoding.
pub fn decode(text: &str, is_binary: bool) -> Result<Value, BuilderError> {
    if is_binary {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64_STANDARD
            .decode(compact.as_bytes())
            .map(Value::Binary)
            .map_err(|e| BuilderError::InvalidBase64(e.to_string()))
    } else {
        Ok(Value::Text(text.trim().to_owned()))
    }
}

#[test]
fn printable_text_stays_literal() {
    assert!(!needs_base64_encoding(&Value::from("cn=John Doe, ou=people")));
    assert!(!needs_base64_encoding(&Value::from("multi\nline\ttext")));
    assert!(!needs_base64_encoding(&Value::from("")));
    assert!(!needs_base64_encoding(&Value::from("żółw")));
}

#[test]
fn unsafe_text_is_flagged() {
    assert!(needs_base64_encoding(&Value::from("nul\0byte")));
    assert!(needs_base64_encoding(&Value::from("bell\u{7}")));
    assert!(needs_base64_encoding(&Value::from(" leading")));
    assert!(needs_base64_encoding(&Value::from("trailing\n")));
    assert!(needs_base64_encoding(&Value::Binary(b"plain".to_vec())));
}

#[test]
fn base64_round_trip() {
    let samples: [&[u8]; 4] = [b"", b"\0", b"\xff\xfe\x00\x01binary", b"plain ascii"];
    for raw in samples {
        let encoded = encode(raw);
        assert_eq!(decode(&encoded, true).unwrap(), Value::Binary(raw.to_vec()));
    }
}

#[test]
fn decode_tolerates_wrapped_base64() {
    assert_eq!(decode(" AAEC\n  AwQ= ", true).unwrap(), Value::Binary(vec![0, 1, 2, 3, 4]));
    assert!(matches!(decode("not base64!", true), Err(BuilderError::InvalidBase64(_))));
}

#[test]
fn literal_text_is_trimmed() {
    assert_eq!(decode("\n   John  \n", false).unwrap(), Value::from("John"));
}

#[test]
fn equality_is_on_bytes() {
    assert_eq!(Value::from("a\rb"), Value::Binary(b"a\rb".to_vec()));
    assert_eq!(Value::Binary(Vec::new()), Value::from(""));
    assert_ne!(Value::from("a"), Value::Binary(b"b".to_vec()));
}
