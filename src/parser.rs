//! Drives a [`TokenSource`] through the DSML grammar.

use tracing::{info, trace};

use crate::batch::{BatchRequest, Processing};
use crate::error::{BuilderError, DsmlError, Result};
use crate::filter::FilterBuilder;
use crate::grammar::{Direction, Grammar, State};
use crate::ldap::{Control, Message, MessageParams, MsgAdd, MsgCompare, MsgExtended, MsgModify, MsgSearch};
use crate::value::{self, Value};
use crate::xml::{Element, Token, TokenSource, XmlTokenReader};

/// Whether each request must carry its own `requestID`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestIdPolicy {
    #[default]
    Optional,
    Required,
    /// Required once the batch declares `processing="parallel"`.
    RequiredWhenParallel,
}

#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    pub request_id: RequestIdPolicy,
}

impl ParserConfig {
    pub fn with_request_id(mut self, policy: RequestIdPolicy) -> Self {
        self.request_id = policy;
        self
    }
}

/// What a builder action sees of the current token.
pub struct ActionInput<'a> {
    element: Option<&'a Element>,
    source: &'a mut dyn TokenSource,
}

impl<'a> ActionInput<'a> {
    pub fn element_name(&self) -> &'static str {
        self.element.map_or("?", |e| e.tag.name())
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.and_then(|e| e.attribute(name))
    }

    pub fn require(&self, name: &'static str) -> std::result::Result<&'a str, BuilderError> {
        self.attr(name).ok_or(BuilderError::MissingAttribute {
            element: self.element_name(),
            attribute: name,
        })
    }

    pub fn is_binary(&self) -> bool {
        self.element.map_or(false, |e| e.binary)
    }

    /// Raw trailing text of the element.
    pub fn text(&mut self) -> Result<String> {
        self.source.next_text()
    }

    /// Trailing text decoded per the element's type marker.
    pub fn value(&mut self) -> Result<Value> {
        let binary = self.is_binary();
        let text = self.text()?;
        Ok(value::decode(&text, binary)?)
    }
}

/// Mutable state of one parse, handed to every builder action.
pub struct ParseContext {
    config: ParserConfig,
    pub(crate) batch: BatchRequest,
    pub(crate) filter: Option<FilterBuilder>,
}

macro_rules! current_params {
    ($fn_name:ident, $variant:ident, $ty:ty, $label:expr) => {
        pub(crate) fn $fn_name(&mut self) -> std::result::Result<&mut $ty, BuilderError> {
            match self.current()?.params {
                MessageParams::$variant(ref mut m) => Ok(m),
                _ => Err(BuilderError::WrongRequest { expected: $label }),
            }
        }
    };
}

impl ParseContext {
    fn new(config: ParserConfig) -> Self {
        Self {
            config,
            batch: BatchRequest::new(),
            filter: None,
        }
    }

    pub fn batch(&self) -> &BatchRequest {
        &self.batch
    }

    pub(crate) fn request_id_required(&self) -> bool {
        match self.config.request_id {
            RequestIdPolicy::Optional => false,
            RequestIdPolicy::Required => true,
            RequestIdPolicy::RequiredWhenParallel => self.batch.processing == Processing::Parallel,
        }
    }

    pub(crate) fn current(&mut self) -> std::result::Result<&mut Message, BuilderError> {
        self.batch
            .current_request_mut()
            .ok_or(BuilderError::WrongRequest { expected: "any" })
    }

    pub(crate) fn current_control(&mut self) -> std::result::Result<&mut Control, BuilderError> {
        self.current()?
            .controls
            .last_mut()
            .ok_or(BuilderError::WrongRequest { expected: "controlled" })
    }

    pub(crate) fn filter_builder(&mut self) -> std::result::Result<&mut FilterBuilder, BuilderError> {
        self.filter
            .as_mut()
            .ok_or(BuilderError::FilterStructure("no filter is open"))
    }

    current_params!(add, Add, MsgAdd, "add");
    current_params!(compare, Compare, MsgCompare, "compare");
    current_params!(extended, Extended, MsgExtended, "extended");
    current_params!(modify, Modify, MsgModify, "modify");
    current_params!(search, Search, MsgSearch, "search");
}

pub struct Parser {
    state: State,
    ctx: ParseContext,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            state: State::Init,
            ctx: ParseContext::new(config),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn batch(&self) -> &BatchRequest {
        self.ctx.batch()
    }

    /// Applies one token: looks up the transition, checks attributes, runs
    /// the builder action and moves to the next state.
    pub fn feed(&mut self, token: Token, source: &mut dyn TokenSource) -> Result<()> {
        let (tag, direction, element) = match &token {
            Token::Open(e) => (e.tag, Direction::Open, Some(e)),
            Token::Close(t) => (*t, Direction::Close, None),
        };
        let transition = Grammar::get()
            .transition(self.state, tag, direction)
            .ok_or(DsmlError::Grammar {
                state: self.state,
                tag: tag.name(),
                direction,
            })?;
        if let Some(e) = element {
            if let Some((name, _)) = e
                .attributes
                .iter()
                .find(|(name, _)| !transition.attributes.contains(&name.as_str()))
            {
                return Err(DsmlError::UnexpectedAttribute {
                    tag: tag.name(),
                    attribute: name.clone(),
                });
            }
        }
        if let Some(action) = transition.action {
            let mut input = ActionInput { element, source };
            action(&mut self.ctx, &mut input)?;
        }
        trace!(from = ?self.state, to = ?transition.next, %tag, %direction, "transition");
        self.state = transition.next;
        Ok(())
    }

    pub fn finish(self) -> Result<BatchRequest> {
        if self.state != State::End {
            return Err(DsmlError::UnexpectedEof);
        }
        info!(requests = self.ctx.batch.requests.len(), "batch request parsed");
        Ok(self.ctx.batch)
    }

    pub fn parse<S: TokenSource>(mut self, source: &mut S) -> Result<BatchRequest> {
        while let Some(token) = source.next_token()? {
            self.feed(token, source)?;
        }
        self.finish()
    }
}

pub fn parse_batch_request(xml: &str) -> Result<BatchRequest> {
    parse_batch_request_with(xml, ParserConfig::default())
}

pub fn parse_batch_request_with(xml: &str, config: ParserConfig) -> Result<BatchRequest> {
    let mut source = XmlTokenReader::new(xml);
    Parser::new(config).parse(&mut source)
}

#[test]
fn feed_test() {
    use crate::grammar::Tag;
    let mut source = XmlTokenReader::new("");
    let mut p = Parser::new(ParserConfig::default());
    p.feed(Token::Open(Element::new(Tag::BatchRequest)), &mut source).unwrap();
    assert_eq!(p.state(), State::Batch);
    let err = p.feed(Token::Open(Element::new(Tag::Value)), &mut source).unwrap_err();
    assert!(err.is_structural());
    assert!(matches!(err, DsmlError::Grammar { state: State::Batch, tag: "value", direction: Direction::Open }));
    p.feed(Token::Open(Element::new(Tag::DelRequest).with_attribute("dn", "o=acme")), &mut source).unwrap();
    p.feed(Token::Close(Tag::DelRequest), &mut source).unwrap();
    assert_eq!(p.batch().requests.len(), 1);
    p.feed(Token::Close(Tag::BatchRequest), &mut source).unwrap();
    assert_eq!(p.finish().unwrap().requests.len(), 1);
}

#[test]
fn unexpected_attribute_test() {
    let err = parse_batch_request(r#"<batchRequest><delRequest dn="o=acme" bogus="1"/></batchRequest>"#)
        .unwrap_err();
    assert!(matches!(err, DsmlError::UnexpectedAttribute { tag: "delRequest", ref attribute } if attribute == "bogus"));
}

#[test]
fn truncated_document_test() {
    assert!(matches!(parse_batch_request(""), Err(DsmlError::UnexpectedEof)));
}
