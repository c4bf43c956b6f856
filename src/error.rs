use thiserror::Error;

use crate::grammar::{Direction, State};

pub type Result<T> = std::result::Result<T, DsmlError>;

/// Errors raised by a builder action after the grammar accepted the token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuilderError {
    #[error("<{element}> requires the `{attribute}` attribute")]
    MissingAttribute { element: &'static str, attribute: &'static str },

    #[error("`{attribute}` must be an integer, got {value:?}")]
    InvalidInteger { attribute: &'static str, value: String },

    #[error("`{attribute}` has unknown value {value:?}")]
    InvalidEnum { attribute: &'static str, value: String },

    #[error("`{attribute}` must be a boolean, got {value:?}")]
    InvalidBoolean { attribute: &'static str, value: String },

    #[error("invalid distinguished name {0:?}")]
    InvalidDn(String),

    #[error("invalid object identifier {0:?}")]
    InvalidOid(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("<{0}> must carry a requestID")]
    MissingRequestId(&'static str),

    #[error("requestID 0 is reserved")]
    ReservedRequestId,

    #[error("malformed filter: {0}")]
    FilterStructure(&'static str),

    #[error("builder expected a {expected} request but the current one differs")]
    WrongRequest { expected: &'static str },
}

#[derive(Debug, Error)]
pub enum DsmlError {
    #[error("unexpected {direction} tag <{tag}> in state {state:?}")]
    Grammar {
        state: State,
        tag: &'static str,
        direction: Direction,
    },

    #[error("unknown tag <{0}>")]
    UnknownTag(String),

    #[error("attribute `{attribute}` is not allowed on <{tag}>")]
    UnexpectedAttribute { tag: &'static str, attribute: String },

    #[error("unexpected text {0:?}")]
    UnexpectedText(String),

    #[error("document ended before </batchRequest>")]
    UnexpectedEof,

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error("cannot serialize: {0}")]
    Incomplete(&'static str),

    #[error("cannot encode: {0}")]
    Encode(&'static str),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::events::attributes::AttrError> for DsmlError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        DsmlError::Xml(e.into())
    }
}

impl DsmlError {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DsmlError::Grammar { .. }
                | DsmlError::UnknownTag(_)
                | DsmlError::UnexpectedAttribute { .. }
                | DsmlError::UnexpectedText(_)
                | DsmlError::UnexpectedEof
        )
    }
}
