//! DSMLv2 `batchRequest` parsing and serialization.
//!
//! A document is tokenized by [`xml::XmlTokenReader`], driven through the
//! table in [`grammar`] by [`parser::Parser`], and assembled into a
//! [`batch::BatchRequest`] of [`ldap::Message`]s. [`serializer`] writes the
//! model back out as DSML and [`codec`] as BER LDAPMessages.

pub mod actions;
pub mod asn1;
pub mod batch;
pub mod codec;
pub mod error;
pub mod filter;
pub mod grammar;
pub mod ldap;
pub mod parser;
pub mod serializer;
pub mod tokiou;
pub mod validate;
pub mod value;
pub mod xml;

pub use batch::BatchRequest;
pub use error::{BuilderError, DsmlError, Result};
pub use parser::{parse_batch_request, parse_batch_request_with, ParserConfig, RequestIdPolicy};
pub use serializer::{to_string, to_string_with, SerializerConfig};
