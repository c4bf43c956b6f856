use crate::asn1;
use crate::asn1::Encoder;
use crate::error::DsmlError;
use crate::error::Result;
use crate::ldap::Attribute;
use crate::ldap::AttributeValueAssertion;
use crate::ldap::Control;
use crate::ldap::Filter;
use crate::ldap::Message;
use crate::ldap::MessageParams;
use crate::ldap::MsgSearch;
use crate::ldap::SubstringFilter;

// [APPLICATION n] tags of the request protocol ops
const TAG_BIND_REQUEST: u8 = 0x60;
const TAG_SEARCH_REQUEST: u8 = 0x63;
const TAG_MODIFY_REQUEST: u8 = 0x66;
const TAG_ADD_REQUEST: u8 = 0x68;
const TAG_DEL_REQUEST: u8 = 0x4a;
const TAG_MODDN_REQUEST: u8 = 0x6c;
const TAG_COMPARE_REQUEST: u8 = 0x6e;
const TAG_ABANDON_REQUEST: u8 = 0x50;
const TAG_EXTENDED_REQUEST: u8 = 0x77;
const TAG_CONTROLS: u8 = 0xa0;

/// Encodes one request as an LDAPMessage PDU. Requests without their own
/// `requestID` are numbered with `fallback_id`.
pub fn encode_message(message: &Message, fallback_id: u32) -> Result<Vec<u8>> {
    let mut e = Encoder::new();
    e.start_seq(asn1::TAG_SEQUENCE)?;
    e.write_int(message.id.unwrap_or(fallback_id))?;
    write_params(&mut e, &message.params)?;
    if !message.controls.is_empty() {
        write_controls(&mut e, &message.controls)?;
    }
    e.end_seq()?;
    Ok(e.encode()?)
}

fn write_params(e: &mut Encoder, params: &MessageParams) -> Result<()> {
    match params {
        MessageParams::Abandon(m) => {
            e.write_int_with_tag(TAG_ABANDON_REQUEST, m.abandon_id)?;
        }
        MessageParams::Add(m) => {
            e.start_seq(TAG_ADD_REQUEST)?;
            e.write_octet_string(m.dn.as_bytes())?;
            e.start_seq(asn1::TAG_SEQUENCE)?;
            for attr in &m.attributes {
                write_attribute(e, attr)?;
            }
            e.end_seq()?;
            e.end_seq()?;
        }
        MessageParams::Bind(m) => {
            e.start_seq(TAG_BIND_REQUEST)?;
            e.write_int(m.version)?;
            e.write_octet_string(m.name.as_bytes())?;
            e.write_octet_string_with_tag(0x80, m.password.as_bytes())?; // simple
            e.end_seq()?;
        }
        MessageParams::Compare(m) => {
            e.start_seq(TAG_COMPARE_REQUEST)?;
            e.write_octet_string(m.dn.as_bytes())?;
            e.start_seq(asn1::TAG_SEQUENCE)?;
            e.write_octet_string(m.attribute.as_bytes())?;
            e.write_octet_string(m.value.as_bytes())?;
            e.end_seq()?;
            e.end_seq()?;
        }
        MessageParams::Delete(m) => {
            e.write_octet_string_with_tag(TAG_DEL_REQUEST, m.dn.as_bytes())?;
        }
        MessageParams::Extended(m) => {
            e.start_seq(TAG_EXTENDED_REQUEST)?;
            e.write_octet_string_with_tag(0x80, m.name.as_bytes())?;
            if let Some(value) = &m.value {
                e.write_octet_string_with_tag(0x81, value.as_bytes())?;
            }
            e.end_seq()?;
        }
        MessageParams::Modify(m) => {
            e.start_seq(TAG_MODIFY_REQUEST)?;
            e.write_octet_string(m.dn.as_bytes())?;
            e.start_seq(asn1::TAG_SEQUENCE)?;
            for change in &m.changes {
                e.start_seq(asn1::TAG_SEQUENCE)?;
                e.write_enum(change.operation as u8)?;
                write_attribute(e, &change.attribute)?;
                e.end_seq()?;
            }
            e.end_seq()?;
            e.end_seq()?;
        }
        MessageParams::ModifyDn(m) => {
            e.start_seq(TAG_MODDN_REQUEST)?;
            e.write_octet_string(m.dn.as_bytes())?;
            e.write_octet_string(m.new_rdn.as_bytes())?;
            e.write_bool(m.delete_old_rdn)?;
            if let Some(superior) = &m.new_superior {
                e.write_octet_string_with_tag(0x80, superior.as_bytes())?;
            }
            e.end_seq()?;
        }
        MessageParams::Search(m) => write_search(e, m)?,
    }
    Ok(())
}

fn write_search(e: &mut Encoder, m: &MsgSearch) -> Result<()> {
    let filter = m.filter.as_ref().ok_or(DsmlError::Encode("searchRequest without a filter"))?;
    e.start_seq(TAG_SEARCH_REQUEST)?;
    e.write_octet_string(m.base_object.as_bytes())?;
    e.write_enum(m.scope as u8)?;
    e.write_enum(m.deref as u8)?;
    e.write_int(m.size_limit)?;
    e.write_int(m.time_limit)?;
    e.write_bool(m.types_only)?;
    write_filter(e, filter)?;
    e.start_seq(asn1::TAG_SEQUENCE)?;
    for attr in &m.attributes {
        e.write_octet_string(attr.as_bytes())?;
    }
    e.end_seq()?;
    e.end_seq()?;
    Ok(())
}

fn write_attribute(e: &mut Encoder, attr: &Attribute) -> Result<()> {
    e.start_seq(asn1::TAG_SEQUENCE)?;
    e.write_octet_string(attr.name.as_bytes())?;
    e.start_seq(asn1::TAG_SET)?;
    for value in &attr.values {
        e.write_octet_string(value.as_bytes())?;
    }
    e.end_seq()?;
    e.end_seq()?;
    Ok(())
}

fn write_controls(e: &mut Encoder, controls: &[Control]) -> Result<()> {
    e.start_seq(TAG_CONTROLS)?;
    for control in controls {
        e.start_seq(asn1::TAG_SEQUENCE)?;
        e.write_octet_string(control.control_type.as_bytes())?;
        // criticality is DEFAULT FALSE
        if control.criticality {
            e.write_bool(true)?;
        }
        if let Some(value) = &control.value {
            e.write_octet_string(value.as_bytes())?;
        }
        e.end_seq()?;
    }
    e.end_seq()?;
    Ok(())
}

fn write_assertion(e: &mut Encoder, tag: u8, ava: &AttributeValueAssertion) -> Result<()> {
    e.start_seq(tag)?;
    e.write_octet_string(ava.name.as_bytes())?;
    e.write_octet_string(ava.value.as_bytes())?;
    e.end_seq()?;
    Ok(())
}

fn write_substrings(e: &mut Encoder, s: &SubstringFilter) -> Result<()> {
    e.start_seq(0xa4)?;
    e.write_octet_string(s.name.as_bytes())?;
    e.start_seq(asn1::TAG_SEQUENCE)?;
    if let Some(initial) = &s.initial {
        e.write_octet_string_with_tag(0x80, initial.as_bytes())?;
    }
    for any in &s.any {
        e.write_octet_string_with_tag(0x81, any.as_bytes())?;
    }
    if let Some(final_) = &s.final_ {
        e.write_octet_string_with_tag(0x82, final_.as_bytes())?;
    }
    e.end_seq()?;
    e.end_seq()?;
    Ok(())
}

pub fn write_filter(e: &mut Encoder, filter: &Filter) -> Result<()> {
    match filter {
        Filter::And(items) | Filter::Or(items) => {
            e.start_seq(if matches!(filter, Filter::And(_)) { 0xa0 } else { 0xa1 })?;
            for item in items {
                write_filter(e, item)?;
            }
            e.end_seq()?;
        }
        Filter::Not(inner) => {
            e.start_seq(0xa2)?;
            write_filter(e, inner)?;
            e.end_seq()?;
        }
        Filter::EqualityMatch(ava) => write_assertion(e, 0xa3, ava)?,
        Filter::Substrings(s) => write_substrings(e, s)?,
        Filter::GreaterOrEqual(ava) => write_assertion(e, 0xa5, ava)?,
        Filter::LessOrEqual(ava) => write_assertion(e, 0xa6, ava)?,
        Filter::Present(name) => e.write_octet_string_with_tag(0x87, name.as_bytes())?,
        Filter::ApproxMatch(ava) => write_assertion(e, 0xa8, ava)?,
        Filter::ExtensibleMatch(m) => {
            e.start_seq(0xa9)?;
            if let Some(rule) = &m.matching_rule {
                e.write_octet_string_with_tag(0x81, rule.as_bytes())?;
            }
            if let Some(name) = &m.name {
                e.write_octet_string_with_tag(0x82, name.as_bytes())?;
            }
            e.write_octet_string_with_tag(0x83, m.value.as_bytes())?;
            if m.dn_attributes {
                e.write_bool_with_tag(0x84, true)?;
            }
            e.end_seq()?;
        }
    }
    Ok(())
}

#[cfg(test)]
use crate::ldap::{DerefAliases, MsgAbandon, MsgAdd, MsgBind, MsgDelete, SearchScope};
#[cfg(test)]
use crate::value::Value;

#[cfg(test)]
fn ava(name: &str, value: &str) -> AttributeValueAssertion {
    AttributeValueAssertion { name: name.to_owned(), value: Value::from(value) }
}

#[test]
fn search_test() {
    let search = MsgSearch {
        base_object: String::new(),
        scope: SearchScope::WholeSubtree,
        deref: DerefAliases::NeverDerefAliases,
        size_limit: 0,
        time_limit: 0,
        types_only: false,
        filter: Some(Filter::And(vec![
            Filter::Present("axa".to_owned()),
            Filter::EqualityMatch(ava("ss", "ss")),
        ])),
        attributes: Vec::new(),
    };
    let m = Message::new(Some(2), MessageParams::Search(search));
    let out = encode_message(&m, 1).unwrap();
    assert_eq!(hex::encode(&out), "3029020102632404000a01020a0100020100020100010100a00f8703617861a30804027373040273733000");
    assert_eq!(out.len(), 43);
}

#[test]
fn search_without_filter_test() {
    let search = MsgSearch {
        base_object: "o=a".to_owned(),
        scope: SearchScope::BaseObject,
        deref: DerefAliases::DerefAlways,
        size_limit: 0,
        time_limit: 0,
        types_only: false,
        filter: None,
        attributes: Vec::new(),
    };
    let m = Message::new(Some(1), MessageParams::Search(search));
    assert!(matches!(encode_message(&m, 1), Err(DsmlError::Encode(_))));
}

#[test]
fn bind_test() {
    let bind = MsgBind { version: 3, name: "xx".to_owned(), password: "heslo".to_owned() };
    let out = encode_message(&Message::new(Some(1), MessageParams::Bind(bind)), 7).unwrap();
    assert_eq!(hex::encode(&out), "3013020101600e0201030402787880056865736c6f");

    // authRequest carries no credentials
    let bind = MsgBind { version: 3, name: "xx".to_owned(), password: String::new() };
    let out = encode_message(&Message::new(Some(1), MessageParams::Bind(bind)), 7).unwrap();
    assert_eq!(hex::encode(&out), "300e0201016009020103040278788000");
}

#[test]
fn fallback_id_test() {
    let del = MsgDelete { dn: "cn=a".to_owned() };
    let out = encode_message(&Message::new(None, MessageParams::Delete(del)), 1).unwrap();
    assert_eq!(hex::encode(&out), "30090201014a04636e3d61");

    let abandon = MsgAbandon { abandon_id: 5 };
    let out = encode_message(&Message::new(None, MessageParams::Abandon(abandon)), 2).unwrap();
    assert_eq!(hex::encode(&out), "3006020102500105");
}

#[test]
fn control_test() {
    let oid = "1.2.840.113556.1.4.805";
    let mut m = Message::new(Some(1), MessageParams::Delete(MsgDelete { dn: "cn=a".to_owned() }));
    m.controls.push(Control { control_type: oid.to_owned(), criticality: true, value: None });
    let out = encode_message(&m, 1).unwrap();
    let expected = format!("30280201014a04636e3d61a01d301b0416{}0101ff", hex::encode(oid));
    assert_eq!(hex::encode(&out), expected);
}

#[test]
fn long_add_test() {
    let add = MsgAdd {
        dn: "o=a".to_owned(),
        attributes: vec![Attribute { name: "cn".to_owned(), values: vec![Value::Binary(vec![0x61; 200])] }],
    };
    let out = encode_message(&Message::new(Some(1), MessageParams::Add(add)), 1).unwrap();
    assert_eq!(out.len(), 230);
    assert_eq!(&out[..9], &[0x30, 0x81, 0xe3, 0x02, 0x01, 0x01, 0x68, 0x81, 0xdd]);
}

#[test]
fn filter_test() {
    let filter = Filter::Not(Box::new(Filter::Substrings(SubstringFilter {
        name: "cn".to_owned(),
        initial: Some(Value::from("a")),
        any: vec![Value::from("b")],
        final_: None,
    })));
    let mut e = Encoder::new();
    write_filter(&mut e, &filter).unwrap();
    assert_eq!(hex::encode(e.encode().unwrap()), "a20ea40c0402636e3006800161810162");
}
