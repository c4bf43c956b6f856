//! DSMLv2 request grammar.
//!
//! The grammar is a deterministic transition table keyed by
//! `(State, Tag, Direction)`. It is built once on first use and shared,
//! read-only, by every [`Parser`](crate::parser::Parser).

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::actions;
use crate::error::Result;
use crate::parser::{ActionInput, ParseContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    BatchRequest,
    AbandonRequest,
    AddRequest,
    AuthRequest,
    CompareRequest,
    DelRequest,
    ExtendedRequest,
    ModDnRequest,
    ModifyRequest,
    SearchRequest,
    Control,
    ControlValue,
    Attr,
    Value,
    Assertion,
    Filter,
    And,
    Or,
    Not,
    Substrings,
    Initial,
    Any,
    Final,
    EqualityMatch,
    GreaterOrEqual,
    LessOrEqual,
    ApproxMatch,
    Present,
    ExtensibleMatch,
    RequestName,
    RequestValue,
    Modification,
    Attributes,
    Attribute,
}

const TAGS: [Tag; 34] = [
    Tag::BatchRequest,
    Tag::AbandonRequest,
    Tag::AddRequest,
    Tag::AuthRequest,
    Tag::CompareRequest,
    Tag::DelRequest,
    Tag::ExtendedRequest,
    Tag::ModDnRequest,
    Tag::ModifyRequest,
    Tag::SearchRequest,
    Tag::Control,
    Tag::ControlValue,
    Tag::Attr,
    Tag::Value,
    Tag::Assertion,
    Tag::Filter,
    Tag::And,
    Tag::Or,
    Tag::Not,
    Tag::Substrings,
    Tag::Initial,
    Tag::Any,
    Tag::Final,
    Tag::EqualityMatch,
    Tag::GreaterOrEqual,
    Tag::LessOrEqual,
    Tag::ApproxMatch,
    Tag::Present,
    Tag::ExtensibleMatch,
    Tag::RequestName,
    Tag::RequestValue,
    Tag::Modification,
    Tag::Attributes,
    Tag::Attribute,
];

impl Tag {
    pub fn name(self) -> &'static str {
        match self {
            Tag::BatchRequest => "batchRequest",
            Tag::AbandonRequest => "abandonRequest",
            Tag::AddRequest => "addRequest",
            Tag::AuthRequest => "authRequest",
            Tag::CompareRequest => "compareRequest",
            Tag::DelRequest => "delRequest",
            Tag::ExtendedRequest => "extendedRequest",
            Tag::ModDnRequest => "modDNRequest",
            Tag::ModifyRequest => "modifyRequest",
            Tag::SearchRequest => "searchRequest",
            Tag::Control => "control",
            Tag::ControlValue => "controlValue",
            Tag::Attr => "attr",
            Tag::Value => "value",
            Tag::Assertion => "assertion",
            Tag::Filter => "filter",
            Tag::And => "and",
            Tag::Or => "or",
            Tag::Not => "not",
            Tag::Substrings => "substrings",
            Tag::Initial => "initial",
            Tag::Any => "any",
            Tag::Final => "final",
            Tag::EqualityMatch => "equalityMatch",
            Tag::GreaterOrEqual => "greaterOrEqual",
            Tag::LessOrEqual => "lessOrEqual",
            Tag::ApproxMatch => "approxMatch",
            Tag::Present => "present",
            Tag::ExtensibleMatch => "extensibleMatch",
            Tag::RequestName => "requestName",
            Tag::RequestValue => "requestValue",
            Tag::Modification => "modification",
            Tag::Attributes => "attributes",
            Tag::Attribute => "attribute",
        }
    }

    pub fn from_name(name: &str) -> Option<Tag> {
        TAGS.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Open,
    Close,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Open => f.write_str("opening"),
            Direction::Close => f.write_str("closing"),
        }
    }
}

/// Positions inside a request element where `<control>` may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Body {
    Abandon,
    Add,
    Auth,
    Compare,
    CompareAsserted,
    Delete,
    Extended,
    ExtendedNamed,
    ExtendedValued,
    ModifyDn,
    Modify,
    Search,
    SearchFiltered,
    SearchAttributed,
}

const BODIES: [Body; 14] = [
    Body::Abandon,
    Body::Add,
    Body::Auth,
    Body::Compare,
    Body::CompareAsserted,
    Body::Delete,
    Body::Extended,
    Body::ExtendedNamed,
    Body::ExtendedValued,
    Body::ModifyDn,
    Body::Modify,
    Body::Search,
    Body::SearchFiltered,
    Body::SearchAttributed,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Init,
    Batch,
    End,

    InBody(Body),
    Control(Body),
    ControlValue(Body),
    ControlValueEnd(Body),

    AddAttr,
    AddValue,

    CompareAssertion,
    CompareValue,
    CompareValueEnd,

    ExtendedName,
    ExtendedValue,

    Modification,
    ModificationValue,

    SearchAttributes,
    SearchAttribute,

    FilterStart,
    FilterLoop,
    Comparison,
    ComparisonValue,
    ComparisonValueEnd,
    Present,
    Substrings,
    SubstringsInitial,
    SubstringsAfterInitial,
    SubstringsAny,
    SubstringsAfterAny,
    SubstringsFinal,
    SubstringsAfterFinal,
    ExtensibleMatch,
    ExtensibleMatchValue,
    ExtensibleMatchValueEnd,
}

pub type Action = fn(&mut ParseContext, &mut ActionInput<'_>) -> Result<()>;

#[derive(Clone, Copy)]
pub struct Transition {
    pub next: State,
    /// Plain (un-namespaced) attributes the opening tag may carry.
    pub attributes: &'static [&'static str],
    pub action: Option<Action>,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("next", &self.next)
            .field("attributes", &self.attributes)
            .field("action", &self.action.is_some())
            .finish()
    }
}

pub struct Grammar {
    transitions: HashMap<(State, Tag, Direction), Transition>,
}

static GRAMMAR: Lazy<Grammar> = Lazy::new(Grammar::build);

const REQUEST_ID: &[&str] = &["requestID"];
const NAME: &[&str] = &["name"];
const NONE: &[&str] = &[];

const FILTER_ITEM_STATES: [State; 2] = [State::FilterStart, State::FilterLoop];
const COMPARISONS: [(Tag, Action); 4] = [
    (Tag::EqualityMatch, actions::equality_match),
    (Tag::GreaterOrEqual, actions::greater_or_equal),
    (Tag::LessOrEqual, actions::less_or_equal),
    (Tag::ApproxMatch, actions::approx_match),
];

impl Grammar {
    pub fn get() -> &'static Grammar {
        &GRAMMAR
    }

    pub fn transition(&self, state: State, tag: Tag, direction: Direction) -> Option<&Transition> {
        self.transitions.get(&(state, tag, direction))
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    fn open(&mut self, from: State, tag: Tag, next: State, attributes: &'static [&'static str], action: Option<Action>) {
        self.insert((from, tag, Direction::Open), Transition { next, attributes, action });
    }

    fn close(&mut self, from: State, tag: Tag, next: State, action: Option<Action>) {
        self.insert((from, tag, Direction::Close), Transition { next, attributes: NONE, action });
    }

    fn insert(&mut self, key: (State, Tag, Direction), transition: Transition) {
        let previous = self.transitions.insert(key, transition);
        debug_assert!(previous.is_none(), "duplicate transition for {:?}", key);
    }

    fn build() -> Grammar {
        let mut g = Grammar {
            transitions: HashMap::new(),
        };
        g.build_batch();
        g.build_controls();
        g.build_add();
        g.build_compare();
        g.build_extended();
        g.build_modify();
        g.build_search();
        g.build_filter();
        tracing::debug!(transitions = g.len(), "dsml grammar built");
        g
    }

    fn build_batch(&mut self) {
        use State::*;
        self.open(Init, Tag::BatchRequest, Batch,
            &["requestID", "processing", "onError", "responseOrder"], Some(actions::start_batch));
        self.close(Batch, Tag::BatchRequest, End, Some(actions::end_batch));

        self.open(Batch, Tag::AbandonRequest, InBody(Body::Abandon),
            &["requestID", "abandonID"], Some(actions::abandon_request));
        self.open(Batch, Tag::AddRequest, InBody(Body::Add),
            &["requestID", "dn"], Some(actions::add_request));
        self.open(Batch, Tag::AuthRequest, InBody(Body::Auth),
            &["requestID", "principal"], Some(actions::auth_request));
        self.open(Batch, Tag::CompareRequest, InBody(Body::Compare),
            &["requestID", "dn"], Some(actions::compare_request));
        self.open(Batch, Tag::DelRequest, InBody(Body::Delete),
            &["requestID", "dn"], Some(actions::del_request));
        self.open(Batch, Tag::ExtendedRequest, InBody(Body::Extended),
            REQUEST_ID, Some(actions::extended_request));
        self.open(Batch, Tag::ModDnRequest, InBody(Body::ModifyDn),
            &["requestID", "dn", "newrdn", "deleteoldrdn", "newSuperior"], Some(actions::mod_dn_request));
        self.open(Batch, Tag::ModifyRequest, InBody(Body::Modify),
            &["requestID", "dn"], Some(actions::modify_request));
        self.open(Batch, Tag::SearchRequest, InBody(Body::Search),
            &["requestID", "dn", "scope", "derefAliases", "sizeLimit", "timeLimit", "typesOnly"],
            Some(actions::search_request));

        let ends = [
            (Body::Abandon, Tag::AbandonRequest),
            (Body::Add, Tag::AddRequest),
            (Body::Auth, Tag::AuthRequest),
            (Body::CompareAsserted, Tag::CompareRequest),
            (Body::Delete, Tag::DelRequest),
            (Body::ExtendedNamed, Tag::ExtendedRequest),
            (Body::ExtendedValued, Tag::ExtendedRequest),
            (Body::ModifyDn, Tag::ModDnRequest),
            (Body::Modify, Tag::ModifyRequest),
            (Body::SearchFiltered, Tag::SearchRequest),
            (Body::SearchAttributed, Tag::SearchRequest),
        ];
        for (body, tag) in ends {
            self.close(InBody(body), tag, Batch, Some(actions::end_request));
        }
    }

    /// `<control type criticality><controlValue/>?</control>` at every body
    /// position, returning to that position.
    fn build_controls(&mut self) {
        for body in BODIES {
            self.open(State::InBody(body), Tag::Control, State::Control(body),
                &["type", "criticality"], Some(actions::add_control));
            self.open(State::Control(body), Tag::ControlValue, State::ControlValue(body),
                NONE, Some(actions::control_value));
            self.close(State::ControlValue(body), Tag::ControlValue, State::ControlValueEnd(body), None);
            self.close(State::Control(body), Tag::Control, State::InBody(body), None);
            self.close(State::ControlValueEnd(body), Tag::Control, State::InBody(body), None);
        }
    }

    fn build_add(&mut self) {
        use State::*;
        self.open(InBody(Body::Add), Tag::Attr, AddAttr, NAME, Some(actions::add_attr));
        self.open(AddAttr, Tag::Value, AddValue, NONE, Some(actions::add_attr_value));
        self.close(AddValue, Tag::Value, AddAttr, None);
        self.close(AddAttr, Tag::Attr, InBody(Body::Add), None);
    }

    fn build_compare(&mut self) {
        use State::*;
        self.open(InBody(Body::Compare), Tag::Assertion, CompareAssertion, NAME,
            Some(actions::compare_assertion));
        self.open(CompareAssertion, Tag::Value, CompareValue, NONE, Some(actions::compare_value));
        self.close(CompareValue, Tag::Value, CompareValueEnd, None);
        self.close(CompareValueEnd, Tag::Assertion, InBody(Body::CompareAsserted), None);
    }

    fn build_extended(&mut self) {
        use State::*;
        self.open(InBody(Body::Extended), Tag::RequestName, ExtendedName, NONE,
            Some(actions::request_name));
        self.close(ExtendedName, Tag::RequestName, InBody(Body::ExtendedNamed), None);
        self.open(InBody(Body::ExtendedNamed), Tag::RequestValue, ExtendedValue, NONE,
            Some(actions::request_value));
        self.close(ExtendedValue, Tag::RequestValue, InBody(Body::ExtendedValued), None);
    }

    fn build_modify(&mut self) {
        use State::*;
        self.open(InBody(Body::Modify), Tag::Modification, Modification,
            &["name", "operation"], Some(actions::add_modification));
        self.open(Modification, Tag::Value, ModificationValue, NONE, Some(actions::modification_value));
        self.close(ModificationValue, Tag::Value, Modification, None);
        self.close(Modification, Tag::Modification, InBody(Body::Modify), None);
    }

    fn build_search(&mut self) {
        use State::*;
        self.open(InBody(Body::Search), Tag::Filter, FilterStart, NONE, Some(actions::start_filter));
        self.close(FilterLoop, Tag::Filter, InBody(Body::SearchFiltered), Some(actions::end_filter));
        self.open(InBody(Body::SearchFiltered), Tag::Attributes, SearchAttributes, NONE, None);
        self.open(SearchAttributes, Tag::Attribute, SearchAttribute, NAME,
            Some(actions::add_search_attribute));
        self.close(SearchAttribute, Tag::Attribute, SearchAttributes, None);
        self.close(SearchAttributes, Tag::Attributes, InBody(Body::SearchAttributed), None);
    }

    fn build_filter(&mut self) {
        use State::*;
        for from in FILTER_ITEM_STATES {
            self.open(from, Tag::And, FilterLoop, NONE, Some(actions::open_and));
            self.open(from, Tag::Or, FilterLoop, NONE, Some(actions::open_or));
            self.open(from, Tag::Not, FilterLoop, NONE, Some(actions::open_not));
            for (tag, action) in COMPARISONS {
                self.open(from, tag, Comparison, NAME, Some(action));
            }
            self.open(from, Tag::Present, Present, NAME, Some(actions::present));
            self.open(from, Tag::Substrings, Substrings, NAME, Some(actions::substrings));
            self.open(from, Tag::ExtensibleMatch, ExtensibleMatch,
                &["matchingRule", "name", "dnAttributes"], Some(actions::extensible_match));
        }
        for tag in [Tag::And, Tag::Or, Tag::Not] {
            self.close(FilterLoop, tag, FilterLoop, Some(actions::close_connector));
        }

        self.open(Comparison, Tag::Value, ComparisonValue, NONE, Some(actions::filter_value));
        self.close(ComparisonValue, Tag::Value, ComparisonValueEnd, None);
        for (tag, _) in COMPARISONS {
            self.close(ComparisonValueEnd, tag, FilterLoop, None);
        }

        self.close(Present, Tag::Present, FilterLoop, None);

        self.open(Substrings, Tag::Initial, SubstringsInitial, NONE, Some(actions::substrings_initial));
        self.close(SubstringsInitial, Tag::Initial, SubstringsAfterInitial, None);
        for from in [Substrings, SubstringsAfterInitial, SubstringsAfterAny] {
            self.open(from, Tag::Any, SubstringsAny, NONE, Some(actions::substrings_any));
            self.open(from, Tag::Final, SubstringsFinal, NONE, Some(actions::substrings_final));
        }
        self.close(SubstringsAny, Tag::Any, SubstringsAfterAny, None);
        self.close(SubstringsFinal, Tag::Final, SubstringsAfterFinal, None);
        for from in [Substrings, SubstringsAfterInitial, SubstringsAfterAny, SubstringsAfterFinal] {
            self.close(from, Tag::Substrings, FilterLoop, None);
        }

        self.open(ExtensibleMatch, Tag::Value, ExtensibleMatchValue, NONE, Some(actions::filter_value));
        self.close(ExtensibleMatchValue, Tag::Value, ExtensibleMatchValueEnd, None);
        self.close(ExtensibleMatchValueEnd, Tag::ExtensibleMatch, FilterLoop, None);
    }
}

#[test]
fn tag_names_test() {
    for tag in TAGS {
        assert_eq!(Tag::from_name(tag.name()), Some(tag));
    }
    assert_eq!(Tag::from_name("modDNRequest"), Some(Tag::ModDnRequest));
    assert_eq!(Tag::from_name("unbindRequest"), None);
}

#[test]
fn grammar_shape_test() {
    let g = Grammar::get();
    assert!(!g.is_empty());
    let t = g.transition(State::Init, Tag::BatchRequest, Direction::Open).unwrap();
    assert_eq!(t.next, State::Batch);
    assert!(t.attributes.contains(&"onError"));
    assert!(g.transition(State::Init, Tag::SearchRequest, Direction::Open).is_none());
    assert!(g.transition(State::InBody(Body::Compare), Tag::CompareRequest, Direction::Close).is_none());
    for body in BODIES {
        let t = g.transition(State::Control(body), Tag::Control, Direction::Close).unwrap();
        assert_eq!(t.next, State::InBody(body));
    }
}

#[test]
fn grammar_is_shared_test() {
    assert!(std::ptr::eq(Grammar::get(), Grammar::get()));
}
