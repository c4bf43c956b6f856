//! Builder actions attached to grammar transitions.

use tracing::debug;

use crate::batch::{OnError, Processing, ResponseOrder};
use crate::error::{BuilderError, Result};
use crate::filter::FilterBuilder;
use crate::ldap::{
    Attribute, AttributeValueAssertion, ConnectorKind, Control, DerefAliases, ExtensibleMatch,
    Filter, Message, MessageParams, Modification, ModifyOperation, MsgAbandon, MsgAdd, MsgBind,
    MsgCompare, MsgDelete, MsgExtended, MsgModify, MsgModifyDn, MsgSearch, SearchScope,
    SubstringFilter,
};
use crate::parser::{ActionInput, ParseContext};
use crate::validate::{is_valid_dn, is_valid_oid, is_valid_rdn, parse_bool, parse_u32};
use crate::value::Value;

type BuildResult<T> = std::result::Result<T, BuilderError>;

fn integer(input: &ActionInput<'_>, attribute: &'static str) -> BuildResult<Option<u32>> {
    match input.attr(attribute) {
        Some(v) => parse_u32(v).map(Some).ok_or(BuilderError::InvalidInteger {
            attribute,
            value: v.to_owned(),
        }),
        None => Ok(None),
    }
}

fn boolean(input: &ActionInput<'_>, attribute: &'static str, default: bool) -> BuildResult<bool> {
    match input.attr(attribute) {
        Some(v) => parse_bool(v).ok_or(BuilderError::InvalidBoolean {
            attribute,
            value: v.to_owned(),
        }),
        None => Ok(default),
    }
}

fn enumerated<T>(
    input: &ActionInput<'_>,
    attribute: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> BuildResult<Option<T>> {
    match input.attr(attribute) {
        Some(v) => parse(v).map(Some).ok_or(BuilderError::InvalidEnum {
            attribute,
            value: v.to_owned(),
        }),
        None => Ok(None),
    }
}

fn dn(input: &ActionInput<'_>, attribute: &'static str) -> BuildResult<String> {
    let v = input.require(attribute)?;
    if !is_valid_dn(v) {
        return Err(BuilderError::InvalidDn(v.to_owned()));
    }
    Ok(v.to_owned())
}

fn request_id(ctx: &ParseContext, input: &ActionInput<'_>) -> BuildResult<Option<u32>> {
    match integer(input, "requestID")? {
        Some(0) => Err(BuilderError::ReservedRequestId),
        Some(id) => Ok(Some(id)),
        None if ctx.request_id_required() => Err(BuilderError::MissingRequestId(input.element_name())),
        None => Ok(None),
    }
}

fn push_request(ctx: &mut ParseContext, input: &ActionInput<'_>, params: MessageParams) -> Result<()> {
    let id = request_id(ctx, input)?;
    debug!(request = params.tag(), ?id, "request opened");
    ctx.batch.add_request(Message::new(id, params));
    Ok(())
}

pub fn start_batch(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let batch = &mut ctx.batch;
    batch.request_id = integer(input, "requestID")?;
    if let Some(p) = enumerated(input, "processing", Processing::parse)? {
        batch.processing = p;
    }
    if let Some(o) = enumerated(input, "onError", OnError::parse)? {
        batch.on_error = o;
    }
    if let Some(r) = enumerated(input, "responseOrder", ResponseOrder::parse)? {
        batch.response_order = r;
    }
    Ok(())
}

pub fn end_batch(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    debug!(requests = ctx.batch.requests.len(), "batch closed");
    Ok(())
}

pub fn end_request(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    let current = ctx.current()?;
    debug!(request = current.params.tag(), id = ?current.id, controls = current.controls.len(), "request closed");
    Ok(())
}

pub fn abandon_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let abandon_id = integer(input, "abandonID")?.ok_or(BuilderError::MissingAttribute {
        element: "abandonRequest",
        attribute: "abandonID",
    })?;
    push_request(ctx, input, MessageParams::Abandon(MsgAbandon { abandon_id }))
}

pub fn add_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let dn = dn(input, "dn")?;
    push_request(ctx, input, MessageParams::Add(MsgAdd { dn, attributes: Vec::new() }))
}

/// DSML carries only the principal; the bind is an LDAPv3 simple bind with
/// an empty password.
pub fn auth_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let name = input.require("principal")?.to_owned();
    push_request(
        ctx,
        input,
        MessageParams::Bind(MsgBind {
            version: 3,
            name,
            password: String::new(),
        }),
    )
}

pub fn compare_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let dn = dn(input, "dn")?;
    push_request(
        ctx,
        input,
        MessageParams::Compare(MsgCompare {
            dn,
            attribute: String::new(),
            value: Value::Text(String::new()),
        }),
    )
}

pub fn del_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let dn = dn(input, "dn")?;
    push_request(ctx, input, MessageParams::Delete(MsgDelete { dn }))
}

pub fn extended_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    push_request(
        ctx,
        input,
        MessageParams::Extended(MsgExtended {
            name: String::new(),
            value: None,
        }),
    )
}

pub fn mod_dn_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let dn = dn(input, "dn")?;
    let new_rdn = input.require("newrdn")?;
    if !is_valid_rdn(new_rdn) {
        return Err(BuilderError::InvalidDn(new_rdn.to_owned()).into());
    }
    let delete_old_rdn = boolean(input, "deleteoldrdn", true)?;
    let new_superior = match input.attr("newSuperior") {
        Some(s) if is_valid_dn(s) => Some(s.to_owned()),
        Some(s) => return Err(BuilderError::InvalidDn(s.to_owned()).into()),
        None => None,
    };
    push_request(
        ctx,
        input,
        MessageParams::ModifyDn(MsgModifyDn {
            dn,
            new_rdn: new_rdn.to_owned(),
            delete_old_rdn,
            new_superior,
        }),
    )
}

pub fn modify_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let dn = dn(input, "dn")?;
    push_request(ctx, input, MessageParams::Modify(MsgModify { dn, changes: Vec::new() }))
}

fn parse_scope(s: &str) -> Option<SearchScope> {
    match s {
        "baseObject" => Some(SearchScope::BaseObject),
        "singleLevel" => Some(SearchScope::SingleLevel),
        "wholeSubtree" => Some(SearchScope::WholeSubtree),
        _ => None,
    }
}

fn parse_deref(s: &str) -> Option<DerefAliases> {
    match s {
        "neverDerefAliases" => Some(DerefAliases::NeverDerefAliases),
        "derefInSearching" => Some(DerefAliases::DerefInSearching),
        "derefFindingBaseObj" => Some(DerefAliases::DerefFindingBaseObj),
        "derefAlways" => Some(DerefAliases::DerefAlways),
        _ => None,
    }
}

pub fn search_request(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let base_object = dn(input, "dn")?;
    let scope = enumerated(input, "scope", parse_scope)?.ok_or(BuilderError::MissingAttribute {
        element: "searchRequest",
        attribute: "scope",
    })?;
    let deref = enumerated(input, "derefAliases", parse_deref)?.ok_or(BuilderError::MissingAttribute {
        element: "searchRequest",
        attribute: "derefAliases",
    })?;
    let search = MsgSearch {
        base_object,
        scope,
        deref,
        size_limit: integer(input, "sizeLimit")?.unwrap_or(0),
        time_limit: integer(input, "timeLimit")?.unwrap_or(0),
        types_only: boolean(input, "typesOnly", false)?,
        filter: None,
        attributes: Vec::new(),
    };
    push_request(ctx, input, MessageParams::Search(search))
}

pub fn add_control(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let control_type = input.require("type")?;
    if !is_valid_oid(control_type) {
        return Err(BuilderError::InvalidOid(control_type.to_owned()).into());
    }
    let control = Control {
        control_type: control_type.to_owned(),
        criticality: boolean(input, "criticality", false)?,
        value: None,
    };
    ctx.current()?.controls.push(control);
    Ok(())
}

pub fn control_value(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    ctx.current_control()?.value = Some(value);
    Ok(())
}

pub fn add_attr(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let name = input.require("name")?.to_owned();
    ctx.add()?.attributes.push(Attribute { name, values: Vec::new() });
    Ok(())
}

pub fn add_attr_value(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    ctx.add()?
        .attributes
        .last_mut()
        .ok_or(BuilderError::WrongRequest { expected: "add" })?
        .values
        .push(value);
    Ok(())
}

pub fn compare_assertion(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    ctx.compare()?.attribute = input.require("name")?.to_owned();
    Ok(())
}

pub fn compare_value(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    ctx.compare()?.value = input.value()?;
    Ok(())
}

pub fn request_name(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let text = input.text()?;
    let oid = text.trim();
    if !is_valid_oid(oid) {
        return Err(BuilderError::InvalidOid(oid.to_owned()).into());
    }
    ctx.extended()?.name = oid.to_owned();
    Ok(())
}

pub fn request_value(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    ctx.extended()?.value = Some(input.value()?);
    Ok(())
}

fn parse_operation(s: &str) -> Option<ModifyOperation> {
    match s {
        "add" => Some(ModifyOperation::Add),
        "delete" => Some(ModifyOperation::Delete),
        "replace" => Some(ModifyOperation::Replace),
        _ => None,
    }
}

pub fn add_modification(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let operation = enumerated(input, "operation", parse_operation)?.ok_or(BuilderError::MissingAttribute {
        element: "modification",
        attribute: "operation",
    })?;
    let name = input.require("name")?.to_owned();
    ctx.modify()?.changes.push(Modification {
        operation,
        attribute: Attribute { name, values: Vec::new() },
    });
    Ok(())
}

pub fn modification_value(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    ctx.modify()?
        .changes
        .last_mut()
        .ok_or(BuilderError::WrongRequest { expected: "modify" })?
        .attribute
        .values
        .push(value);
    Ok(())
}

pub fn add_search_attribute(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let name = input.require("name")?.to_owned();
    ctx.search()?.attributes.push(name);
    Ok(())
}

pub fn start_filter(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    ctx.filter = Some(FilterBuilder::new());
    Ok(())
}

pub fn end_filter(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    let builder = ctx
        .filter
        .take()
        .ok_or(BuilderError::FilterStructure("no filter is open"))?;
    let filter = builder.finish()?;
    ctx.search()?.filter = Some(filter);
    Ok(())
}

pub fn open_and(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    Ok(ctx.filter_builder()?.open_connector(ConnectorKind::And)?)
}

pub fn open_or(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    Ok(ctx.filter_builder()?.open_connector(ConnectorKind::Or)?)
}

pub fn open_not(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    Ok(ctx.filter_builder()?.open_connector(ConnectorKind::Not)?)
}

pub fn close_connector(ctx: &mut ParseContext, _input: &mut ActionInput<'_>) -> Result<()> {
    Ok(ctx.filter_builder()?.close_connector()?)
}

fn assertion(input: &ActionInput<'_>) -> BuildResult<AttributeValueAssertion> {
    Ok(AttributeValueAssertion {
        name: input.require("name")?.to_owned(),
        value: Value::Text(String::new()),
    })
}

fn add_terminal(ctx: &mut ParseContext, leaf: Filter) -> Result<()> {
    Ok(ctx.filter_builder()?.add_terminal(leaf)?)
}

pub fn equality_match(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    add_terminal(ctx, Filter::EqualityMatch(assertion(input)?))
}

pub fn greater_or_equal(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    add_terminal(ctx, Filter::GreaterOrEqual(assertion(input)?))
}

pub fn less_or_equal(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    add_terminal(ctx, Filter::LessOrEqual(assertion(input)?))
}

pub fn approx_match(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    add_terminal(ctx, Filter::ApproxMatch(assertion(input)?))
}

pub fn present(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let name = input.require("name")?.to_owned();
    add_terminal(ctx, Filter::Present(name))
}

pub fn substrings(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let name = input.require("name")?.to_owned();
    add_terminal(ctx, Filter::Substrings(SubstringFilter { name, ..Default::default() }))
}

pub fn extensible_match(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let leaf = Filter::ExtensibleMatch(ExtensibleMatch {
        matching_rule: input.attr("matchingRule").map(str::to_owned),
        name: input.attr("name").map(str::to_owned),
        value: Value::Text(String::new()),
        dn_attributes: boolean(input, "dnAttributes", false)?,
    });
    add_terminal(ctx, leaf)
}

/// `<value>` of a comparison or extensible match filter.
pub fn filter_value(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    match ctx.filter_builder()?.terminal_mut()? {
        Filter::EqualityMatch(a)
        | Filter::GreaterOrEqual(a)
        | Filter::LessOrEqual(a)
        | Filter::ApproxMatch(a) => a.value = value,
        Filter::ExtensibleMatch(m) => m.value = value,
        _ => return Err(BuilderError::FilterStructure("<value> outside of a value assertion").into()),
    }
    Ok(())
}

fn substring_target(ctx: &mut ParseContext) -> BuildResult<&mut SubstringFilter> {
    match ctx.filter_builder()?.terminal_mut()? {
        Filter::Substrings(s) => Ok(s),
        _ => Err(BuilderError::FilterStructure("substring fragment outside of <substrings>")),
    }
}

pub fn substrings_initial(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    substring_target(ctx)?.initial = Some(value);
    Ok(())
}

pub fn substrings_any(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    substring_target(ctx)?.any.push(value);
    Ok(())
}

pub fn substrings_final(ctx: &mut ParseContext, input: &mut ActionInput<'_>) -> Result<()> {
    let value = input.value()?;
    substring_target(ctx)?.final_ = Some(value);
    Ok(())
}

#[cfg(test)]
use crate::batch::BatchRequest;
#[cfg(test)]
use crate::error::DsmlError;
#[cfg(test)]
use crate::parser::{parse_batch_request, parse_batch_request_with, ParserConfig, RequestIdPolicy};
#[cfg(test)]
use crate::serializer::to_string;

#[cfg(test)]
fn batch_of(body: &str) -> crate::error::Result<BatchRequest> {
    parse_batch_request(&format!(
        r#"<batchRequest xmlns="urn:oasis:names:tc:DSML:2:0:core">{}</batchRequest>"#,
        body
    ))
}

#[cfg(test)]
fn only_params(body: &str) -> MessageParams {
    let mut batch = batch_of(body).unwrap();
    assert_eq!(batch.requests.len(), 1);
    batch.requests.remove(0).params
}

#[cfg(test)]
fn builder_error(body: &str) -> BuilderError {
    match batch_of(body) {
        Err(DsmlError::Builder(e)) => e,
        other => panic!("expected a builder error, got {:?}", other),
    }
}

#[cfg(test)]
fn search_filter(filter: &str) -> Filter {
    let body = format!(
        r#"<searchRequest dn="o=acme" scope="wholeSubtree" derefAliases="neverDerefAliases"><filter>{}</filter></searchRequest>"#,
        filter
    );
    match only_params(&body) {
        MessageParams::Search(s) => s.filter.unwrap(),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn batch_defaults_test() {
    let batch = parse_batch_request("<batchRequest/>").unwrap();
    assert_eq!(batch.processing, Processing::Sequential);
    assert_eq!(batch.on_error, OnError::Exit);
    assert_eq!(batch.response_order, ResponseOrder::Sequential);
    assert_eq!(batch.request_id, None);
    assert!(batch.requests.is_empty());

    let batch = parse_batch_request(
        r#"<batchRequest requestID="3" processing="parallel" onError="resume" responseOrder="unordered"></batchRequest>"#,
    )
    .unwrap();
    assert_eq!(batch.request_id, Some(3));
    assert_eq!(batch.processing, Processing::Parallel);
    assert_eq!(batch.on_error, OnError::Resume);
    assert_eq!(batch.response_order, ResponseOrder::Unordered);
}

#[test]
fn batch_enum_test() {
    let err = parse_batch_request(r#"<batchRequest processing="sideways"/>"#).unwrap_err();
    assert!(matches!(
        err,
        DsmlError::Builder(BuilderError::InvalidEnum { attribute: "processing", .. })
    ));
    let err = parse_batch_request(r#"<batchRequest requestID="x1"/>"#).unwrap_err();
    assert!(matches!(
        err,
        DsmlError::Builder(BuilderError::InvalidInteger { attribute: "requestID", .. })
    ));
}

#[test]
fn abandon_test() {
    match only_params(r#"<abandonRequest abandonID="12"/>"#) {
        MessageParams::Abandon(a) => assert_eq!(a.abandon_id, 12),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        builder_error(r#"<abandonRequest requestID="2"/>"#),
        BuilderError::MissingAttribute { element: "abandonRequest", attribute: "abandonID" }
    );
}

#[test]
fn search_scope_test() {
    assert_eq!(
        builder_error(r#"<searchRequest dn="o=acme" derefAliases="neverDerefAliases"><filter><present name="cn"/></filter></searchRequest>"#),
        BuilderError::MissingAttribute { element: "searchRequest", attribute: "scope" }
    );
    let params = only_params(
        r#"<searchRequest dn="o=acme" scope="wholeSubtree" derefAliases="derefInSearching" timeLimit="30">
             <filter><present name="cn"/></filter>
           </searchRequest>"#,
    );
    match params {
        MessageParams::Search(s) => {
            assert_eq!(s.scope, SearchScope::WholeSubtree);
            assert_eq!(s.deref, DerefAliases::DerefInSearching);
            assert_eq!(s.time_limit, 30);
            assert_eq!(s.size_limit, 0);
            assert!(!s.types_only);
            assert_eq!(s.filter, Some(Filter::Present("cn".to_owned())));
            assert!(s.attributes.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        builder_error(r#"<searchRequest dn="o=acme" scope="everywhere" derefAliases="derefAlways"/>"#),
        BuilderError::InvalidEnum { attribute: "scope", .. }
    ));
}

#[test]
fn search_needs_filter_test() {
    let err = batch_of(r#"<searchRequest dn="o=acme" scope="baseObject" derefAliases="derefAlways"></searchRequest>"#)
        .unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn delete_old_rdn_test() {
    for (literal, expected) in [("1", true), ("true", true), ("0", false), ("false", false)] {
        let body = format!(r#"<modDNRequest dn="cn=a,o=acme" newrdn="cn=b" deleteoldrdn="{}"/>"#, literal);
        match only_params(&body) {
            MessageParams::ModifyDn(m) => assert_eq!(m.delete_old_rdn, expected),
            other => panic!("unexpected {:?}", other),
        }
    }
    match only_params(r#"<modDNRequest dn="cn=a,o=acme" newrdn="cn=b"/>"#) {
        MessageParams::ModifyDn(m) => {
            assert!(m.delete_old_rdn);
            assert_eq!(m.new_superior, None);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        builder_error(r#"<modDNRequest dn="cn=a,o=acme" newrdn="cn=b" deleteoldrdn="maybe"/>"#),
        BuilderError::InvalidBoolean { attribute: "deleteoldrdn", .. }
    ));
    assert!(matches!(
        builder_error(r#"<modDNRequest dn="cn=a,o=acme" newrdn="cn=b,o=x"/>"#),
        BuilderError::InvalidDn(_)
    ));
}

#[test]
fn nested_filter_test() {
    let filter = search_filter(
        r#"<and><or><equalityMatch name="cn"><value>x</value></equalityMatch><equalityMatch name="sn"><value>y</value></equalityMatch></or><not><present name="mail"/></not></and>"#,
    );
    let eq = |name: &str, value: &str| {
        Filter::EqualityMatch(AttributeValueAssertion { name: name.to_owned(), value: Value::from(value) })
    };
    assert_eq!(
        filter,
        Filter::And(vec![
            Filter::Or(vec![eq("cn", "x"), eq("sn", "y")]),
            Filter::Not(Box::new(Filter::Present("mail".to_owned()))),
        ])
    );
}

#[test]
fn filter_terminals_test() {
    let filter = search_filter(
        r#"<or>
             <substrings name="cn"><initial>J</initial><any>o</any><any>h</any><final>n</final></substrings>
             <substrings name="sn"><final>th</final></substrings>
             <extensibleMatch matchingRule="2.5.13.5" dnAttributes="1"><value>Doe</value></extensibleMatch>
             <lessOrEqual name="age"><value>65</value></lessOrEqual>
             <approxMatch name="l"><value>Prag</value></approxMatch>
           </or>"#,
    );
    let items = match filter {
        Filter::Or(items) => items,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(items.len(), 5);
    assert_eq!(
        items[0],
        Filter::Substrings(SubstringFilter {
            name: "cn".to_owned(),
            initial: Some(Value::from("J")),
            any: vec![Value::from("o"), Value::from("h")],
            final_: Some(Value::from("n")),
        })
    );
    assert!(matches!(&items[1], Filter::Substrings(s) if s.initial.is_none() && s.final_.is_some()));
    assert_eq!(
        items[2],
        Filter::ExtensibleMatch(ExtensibleMatch {
            matching_rule: Some("2.5.13.5".to_owned()),
            name: None,
            value: Value::from("Doe"),
            dn_attributes: true,
        })
    );
    assert!(matches!(&items[3], Filter::LessOrEqual(a) if a.name == "age"));
    assert!(matches!(&items[4], Filter::ApproxMatch(a) if a.value == Value::from("Prag")));
}

#[test]
fn filter_structure_test() {
    let body = r#"<searchRequest dn="" scope="baseObject" derefAliases="derefAlways"><filter><not><present name="a"/><present name="b"/></not></filter></searchRequest>"#;
    assert!(matches!(builder_error(body), BuilderError::FilterStructure(_)));
    let body = r#"<searchRequest dn="" scope="baseObject" derefAliases="derefAlways"><filter><present name="a"/><present name="b"/></filter></searchRequest>"#;
    assert!(matches!(builder_error(body), BuilderError::FilterStructure(_)));
    // substring fragments out of order
    let body = r#"<searchRequest dn="" scope="baseObject" derefAliases="derefAlways"><filter><substrings name="cn"><final>a</final><initial>b</initial></substrings></filter></searchRequest>"#;
    assert!(batch_of(body).unwrap_err().is_structural());
}

#[test]
fn binary_value_test() {
    let body = r#"<addRequest dn="cn=a,o=acme"
        xmlns:xsd="http://www.w3.org/2001/XMLSchema"
        xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
      <attr name="jpegPhoto"><value xsi:type="xsd:base64Binary">/9j/
        4AA=</value></attr>
      <attr name="cn"><value>  Alice  </value><value/></attr>
    </addRequest>"#;
    match only_params(body) {
        MessageParams::Add(m) => {
            assert_eq!(m.attributes.len(), 2);
            assert_eq!(m.attributes[0].values, vec![Value::Binary(vec![0xff, 0xd8, 0xff, 0xe0, 0x00])]);
            assert_eq!(m.attributes[1].values, vec![Value::from("Alice"), Value::from("")]);
        }
        other => panic!("unexpected {:?}", other),
    }
    let body = r#"<compareRequest dn="o=acme"><assertion name="x"><value xsi:type="xsd:base64Binary">@@@</value></assertion></compareRequest>"#;
    assert!(matches!(builder_error(body), BuilderError::InvalidBase64(_)));
}

#[test]
fn request_id_policy_test() {
    let doc = r#"<batchRequest processing="parallel"><delRequest dn="o=acme"/></batchRequest>"#;
    let batch = parse_batch_request(doc).unwrap();
    assert_eq!(batch.requests[0].id, None);

    for policy in [RequestIdPolicy::Required, RequestIdPolicy::RequiredWhenParallel] {
        let err = parse_batch_request_with(doc, ParserConfig::default().with_request_id(policy)).unwrap_err();
        assert!(matches!(err, DsmlError::Builder(BuilderError::MissingRequestId("delRequest"))));
    }

    let sequential = r#"<batchRequest><delRequest dn="o=acme"/></batchRequest>"#;
    let config = ParserConfig::default().with_request_id(RequestIdPolicy::RequiredWhenParallel);
    assert!(parse_batch_request_with(sequential, config).is_ok());

    let numbered = r#"<batchRequest><delRequest requestID="5" dn="o=acme"/></batchRequest>"#;
    let config = ParserConfig::default().with_request_id(RequestIdPolicy::Required);
    assert_eq!(parse_batch_request_with(numbered, config).unwrap().requests[0].id, Some(5));

    assert_eq!(builder_error(r#"<delRequest requestID="0" dn="o=acme"/>"#), BuilderError::ReservedRequestId);
}

#[test]
fn controls_test() {
    let mut batch = batch_of(
        r#"<modifyRequest dn="cn=a,o=acme">
             <control type="1.2.840.113556.1.4.1413"/>
             <modification name="mail" operation="add"><value>a@acme.org</value></modification>
             <control type="1.3.6.1.1.13.1" criticality="true"><controlValue>KGNuPSop</controlValue></control>
             <modification name="fax" operation="delete"/>
           </modifyRequest>"#,
    )
    .unwrap();
    let m = batch.requests.remove(0);
    assert_eq!(m.controls.len(), 2);
    assert!(!m.controls[0].criticality);
    assert_eq!(m.controls[0].value, None);
    assert!(m.controls[1].criticality);
    assert_eq!(m.controls[1].value, Some(Value::from("KGNuPSop")));
    match m.params {
        MessageParams::Modify(modify) => {
            assert_eq!(modify.changes.len(), 2);
            assert_eq!(modify.changes[0].operation, ModifyOperation::Add);
            assert_eq!(modify.changes[0].attribute.values, vec![Value::from("a@acme.org")]);
            assert_eq!(modify.changes[1].operation, ModifyOperation::Delete);
            assert!(modify.changes[1].attribute.values.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(
        builder_error(r#"<delRequest dn="o=acme"><control type="pagedResults"/></delRequest>"#),
        BuilderError::InvalidOid(_)
    ));
}

#[test]
fn compare_and_extended_test() {
    match only_params(r#"<compareRequest dn="cn=a,o=acme"><assertion name="sn"><value>Doe</value></assertion></compareRequest>"#) {
        MessageParams::Compare(c) => {
            assert_eq!(c.dn, "cn=a,o=acme");
            assert_eq!(c.attribute, "sn");
            assert_eq!(c.value, Value::from("Doe"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match only_params(r#"<extendedRequest requestID="4"><requestName> 1.3.6.1.4.1.4203.1.11.3 </requestName></extendedRequest>"#) {
        MessageParams::Extended(e) => {
            assert_eq!(e.name, "1.3.6.1.4.1.4203.1.11.3");
            assert_eq!(e.value, None);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(
        builder_error(r#"<extendedRequest><requestName>whoami</requestName></extendedRequest>"#),
        BuilderError::InvalidOid(_)
    ));
    match only_params(r#"<authRequest principal="dn:cn=admin"/>"#) {
        MessageParams::Bind(b) => {
            assert_eq!(b.version, 3);
            assert_eq!(b.name, "dn:cn=admin");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn equals_in_dn_value_test() {
    match only_params(r#"<delRequest dn="cn=a=b,o=acme"/>"#) {
        MessageParams::Delete(d) => assert_eq!(d.dn, "cn=a=b,o=acme"),
        other => panic!("unexpected {:?}", other),
    }
    match only_params(r#"<modDNRequest dn="uid=abc==,o=x" newrdn="uid=x=y"/>"#) {
        MessageParams::ModifyDn(m) => assert_eq!(m.new_rdn, "uid=x=y"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn empty_substrings_test() {
    let filter = search_filter(r#"<substrings name="cn"/>"#);
    assert_eq!(
        filter,
        Filter::Substrings(SubstringFilter { name: "cn".to_owned(), initial: None, any: Vec::new(), final_: None })
    );
    let batch = batch_of(
        r#"<searchRequest dn="o=acme" scope="baseObject" derefAliases="neverDerefAliases"><filter><substrings name="cn"></substrings></filter></searchRequest>"#,
    )
    .unwrap();
    let xml = to_string(&batch).unwrap();
    assert!(xml.contains(r#"<substrings name="cn"/>"#));
    assert_eq!(parse_batch_request(&xml).unwrap(), batch);
}

#[test]
fn invalid_dn_test() {
    assert!(matches!(builder_error(r#"<delRequest dn="not a dn"/>"#), BuilderError::InvalidDn(_)));
    assert_eq!(
        builder_error(r#"<addRequest/>"#),
        BuilderError::MissingAttribute { element: "addRequest", attribute: "dn" }
    );
}

#[test]
fn grammar_error_test() {
    let err = batch_of(r#"<delRequest dn="o=acme"><attr name="cn"/></delRequest>"#).unwrap_err();
    assert!(matches!(err, DsmlError::Grammar { tag: "attr", .. }));
    let err = batch_of(r#"<unbindRequest/>"#).unwrap_err();
    assert!(matches!(err, DsmlError::UnknownTag(ref t) if t == "unbindRequest"));
    let err = batch_of(r#"stray"#).unwrap_err();
    assert!(matches!(err, DsmlError::UnexpectedText(ref t) if t == "stray"));
}

#[test]
fn prefixed_document_test() {
    let batch = parse_batch_request(
        r#"<dsml:batchRequest xmlns:dsml="urn:oasis:names:tc:DSML:2:0:core" requestID="1">
             <dsml:delRequest requestID="2" dn="cn=a,o=acme"/>
             <dsml:searchRequest requestID="3" dn="o=acme" scope="singleLevel" derefAliases="neverDerefAliases">
               <dsml:filter><dsml:present name="cn"/></dsml:filter>
               <dsml:attributes><dsml:attribute name="cn"/></dsml:attributes>
             </dsml:searchRequest>
           </dsml:batchRequest>"#,
    )
    .unwrap();
    assert_eq!(batch.request_id, Some(1));
    assert_eq!(batch.requests.len(), 2);
    assert_eq!(batch.requests[1].id, Some(3));
    match &batch.requests[1].params {
        MessageParams::Search(s) => assert_eq!(s.attributes, vec!["cn".to_owned()]),
        other => panic!("unexpected {:?}", other),
    }
}
